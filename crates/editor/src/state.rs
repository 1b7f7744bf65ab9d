//! Editor state snapshots

use crate::settings::Settings;
use puppetry_common::{Project, Suite, TestReport};
use serde::Serialize;

/// Dismissible error banner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBanner {
    pub visible: bool,
    pub message: String,
    pub description: String,
}

impl ErrorBanner {
    pub fn new(message: impl Into<String>, description: impl ToString) -> Self {
        Self {
            visible: true,
            message: message.into(),
            description: description.to_string(),
        }
    }
}

/// Panels open in the main window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AppTab {
    Suite,
    TestReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub loading: bool,
    pub error: Option<ErrorBanner>,
    pub tabs: Vec<AppTab>,
    /// Suite files of the open project
    pub project_files: Vec<String>,
    pub ready_to_run_tests: bool,
    pub test_report: Option<TestReport>,
}

/// Everything the editor holds in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorState {
    pub settings: Settings,
    pub project: Project,
    pub suite: Suite,
    pub app: AppState,
    /// Bumped by every change to the open suite
    #[serde(skip)]
    pub suite_revision: u64,
}

impl EditorState {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Suite has changes that are not on disk
    pub fn is_dirty(&self) -> bool {
        self.suite.modified
    }
}
