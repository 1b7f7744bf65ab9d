//! Editor/host message catalog
//!
//! Requests expect exactly one [`Reply`]; events are fire-and-forget pushes
//! fanned out to subscribers. Frames travel as one JSON document per line.

use crate::report::TestReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Request topics, answered by the peer's responder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum Request {
    BrowseDirectory,

    #[serde(rename_all = "camelCase")]
    BrowseFile { default_path: Option<PathBuf> },

    #[serde(rename = "confirm-unsaved-dialog", rename_all = "camelCase")]
    ConfirmUnsaved { runtime_test_directory: PathBuf },

    #[serde(rename_all = "camelCase")]
    InstallRuntimeTest { runtime_test_directory: PathBuf },

    #[serde(rename_all = "camelCase")]
    RunTests { cwd: PathBuf, target_files: Vec<String> },

    /// Persistent: the host keeps pushing `file-navigator-updated`
    #[serde(rename_all = "camelCase")]
    WatchProjectFiles { project_directory: PathBuf },

    OpenRecorderWindow,
}

impl Request {
    pub fn topic(&self) -> &'static str {
        match self {
            Request::BrowseDirectory => "browse-directory",
            Request::BrowseFile { .. } => "browse-file",
            Request::ConfirmUnsaved { .. } => "confirm-unsaved-dialog",
            Request::InstallRuntimeTest { .. } => "install-runtime-test",
            Request::RunTests { .. } => "run-tests",
            Request::WatchProjectFiles { .. } => "watch-project-files",
            Request::OpenRecorderWindow => "open-recorder-window",
        }
    }
}

/// Answer to the unsaved-changes dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogChoice {
    Save,
    Ignore,
}

/// Reply to a [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Reply {
    Done,
    /// `None` when the user dismissed the picker
    Selection(Option<PathBuf>),
    Choice(DialogChoice),
    Report(TestReport),
    Error { message: String },
}

impl Reply {
    pub fn error(message: impl fmt::Display) -> Self {
        Reply::Error { message: message.to_string() }
    }
}

/// Push topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventTopic {
    FileNavigatorUpdated,
    DirectorySelected,
    FileSelected,
    SuiteListUpdated,
    SuiteLoaded,
    ProjectLoaded,
}

impl EventTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTopic::FileNavigatorUpdated => "file-navigator-updated",
            EventTopic::DirectorySelected => "directory-selected",
            EventTopic::FileSelected => "file-selected",
            EventTopic::SuiteListUpdated => "suite-list-updated",
            EventTopic::SuiteLoaded => "suite-loaded",
            EventTopic::ProjectLoaded => "project-loaded",
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    /// Files in the watched project directory changed and settled
    #[serde(rename_all = "camelCase")]
    FileNavigatorUpdated { project_directory: PathBuf },

    DirectorySelected { path: Option<PathBuf> },

    FileSelected { path: Option<PathBuf> },

    #[serde(rename_all = "camelCase")]
    SuiteListUpdated {
        project_directory: PathBuf,
        filename: Option<String>,
        files: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    SuiteLoaded {
        project_directory: PathBuf,
        filename: String,
        files: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    ProjectLoaded { project_directory: PathBuf },
}

impl Event {
    pub fn topic(&self) -> EventTopic {
        match self {
            Event::FileNavigatorUpdated { .. } => EventTopic::FileNavigatorUpdated,
            Event::DirectorySelected { .. } => EventTopic::DirectorySelected,
            Event::FileSelected { .. } => EventTopic::FileSelected,
            Event::SuiteListUpdated { .. } => EventTopic::SuiteListUpdated,
            Event::SuiteLoaded { .. } => EventTopic::SuiteLoaded,
            Event::ProjectLoaded { .. } => EventTopic::ProjectLoaded,
        }
    }
}

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Request { id: u64, request: Request },
    Reply { id: u64, reply: Reply },
    Event { event: Event },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let frame = Frame::Request {
            id: 7,
            request: Request::RunTests {
                cwd: PathBuf::from("/tmp/rt"),
                target_files: vec!["login.spec.js".into()],
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["frame"], "request");
        assert_eq!(json["request"]["topic"], "run-tests");
        assert_eq!(json["request"]["payload"]["targetFiles"][0], "login.spec.js");
    }

    #[test]
    fn test_topic_names_match_wire_tags() {
        let request = Request::ConfirmUnsaved { runtime_test_directory: PathBuf::from("/rt") };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topic"], request.topic());

        let event = Event::FileNavigatorUpdated { project_directory: PathBuf::from("/p") };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], event.topic().as_str());
    }

    #[test]
    fn test_cancelled_selection_is_explicit() {
        let json = serde_json::to_string(&Reply::Selection(None)).unwrap();
        let reply: Reply = serde_json::from_str(&json).unwrap();
        assert_eq!(reply, Reply::Selection(None));
    }

    #[test]
    fn test_unit_request_parses() {
        let request: Request = serde_json::from_str(r#"{"topic":"browse-directory"}"#).unwrap();
        assert_eq!(request, Request::BrowseDirectory);
    }
}
