//! CLI Commands

pub mod entity;
pub mod project;
pub mod run;
pub mod suite;

use crate::output::OutputFormat;
use crate::state::EditorState;
use crate::workflows::Editor;
use anyhow::{bail, Context as _, Result};
use std::sync::Arc;

/// Shared by every command
pub struct Context {
    pub editor: Editor,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(editor: Editor, format: OutputFormat) -> Self {
        Self { editor, format }
    }

    /// Fail with the error banner a workflow left behind
    pub fn check_banner(&self) -> Result<()> {
        if let Some(banner) = &self.editor.snapshot().app.error {
            bail!("{}: {}", banner.message, banner.description);
        }
        Ok(())
    }

    /// Open the remembered project along with its last suite
    pub async fn open_project(&self) -> Result<Arc<EditorState>> {
        let loaded = self
            .editor
            .load_project(None)
            .await
            .context("no project selected, run `puppetry project open <dir>` first")?;
        if loaded.is_none() {
            let dir = self.editor.snapshot().settings.project_directory.clone().unwrap_or_default();
            bail!("Cannot read the project in {}", dir.display());
        }
        Ok(self.editor.snapshot())
    }

    /// Open the project and require an open suite
    pub async fn open_suite(&self) -> Result<Arc<EditorState>> {
        let state = self.open_project().await?;
        self.check_banner()?;
        if state.suite.filename.is_empty() {
            bail!("No suite is open, run `puppetry suite open <file>` first");
        }
        Ok(state)
    }

    /// Save the open suite or fail with the banner
    pub async fn save_suite(&self) -> Result<()> {
        if self.editor.save_suite(None).await?.is_none() {
            self.check_banner()?;
        }
        Ok(())
    }
}
