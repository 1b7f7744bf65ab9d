//! Directory, file and confirmation dialogs
//!
//! Every dialog resolves to a typed answer; a dismissed picker is `None`.
//! [`ModalDialogs`] makes sure only one dialog is on screen at a time.

use async_trait::async_trait;
use puppetry_common::{DialogChoice, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin};
use tracing::{debug, warn};

#[async_trait]
pub trait Dialogs: Send + Sync {
    async fn pick_directory(&self) -> Result<Option<PathBuf>>;

    async fn pick_file(&self, default_path: Option<&Path>) -> Result<Option<PathBuf>>;

    async fn confirm_unsaved(&self, runtime_test_directory: &Path) -> Result<DialogChoice>;
}

#[async_trait]
impl<D: Dialogs + ?Sized> Dialogs for std::sync::Arc<D> {
    async fn pick_directory(&self) -> Result<Option<PathBuf>> {
        (**self).pick_directory().await
    }

    async fn pick_file(&self, default_path: Option<&Path>) -> Result<Option<PathBuf>> {
        (**self).pick_file(default_path).await
    }

    async fn confirm_unsaved(&self, runtime_test_directory: &Path) -> Result<DialogChoice> {
        (**self).confirm_unsaved(runtime_test_directory).await
    }
}

/// Serializes dialogs from every connection
pub struct ModalDialogs {
    inner: Box<dyn Dialogs>,
    modal: tokio::sync::Mutex<()>,
}

impl ModalDialogs {
    pub fn new(inner: impl Dialogs + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            modal: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl Dialogs for ModalDialogs {
    async fn pick_directory(&self) -> Result<Option<PathBuf>> {
        let _modal = self.modal.lock().await;
        self.inner.pick_directory().await
    }

    async fn pick_file(&self, default_path: Option<&Path>) -> Result<Option<PathBuf>> {
        let _modal = self.modal.lock().await;
        self.inner.pick_file(default_path).await
    }

    async fn confirm_unsaved(&self, runtime_test_directory: &Path) -> Result<DialogChoice> {
        let _modal = self.modal.lock().await;
        self.inner.confirm_unsaved(runtime_test_directory).await
    }
}

/// Line-based prompts
pub struct PromptDialogs<R, W> {
    io: tokio::sync::Mutex<(R, W)>,
}

/// Prompts on the host's terminal
pub type TerminalDialogs = PromptDialogs<BufReader<Stdin>, Stderr>;

impl TerminalDialogs {
    pub fn stdio() -> Self {
        PromptDialogs::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> PromptDialogs<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: tokio::sync::Mutex::new((input, output)),
        }
    }

    /// Show `prompt` and read one trimmed line; `None` at end of input
    async fn ask(&self, prompt: &str) -> Result<Option<String>> {
        let mut io = self.io.lock().await;
        let (input, output) = &mut *io;
        output.write_all(prompt.as_bytes()).await?;
        output.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn ask_path(&self, prompt: &str, want_dir: bool) -> Result<Option<PathBuf>> {
        let Some(answer) = self.ask(prompt).await? else {
            return Ok(None);
        };
        if answer.is_empty() {
            debug!("Dialog dismissed");
            return Ok(None);
        }
        let path = PathBuf::from(answer);
        let valid = if want_dir { path.is_dir() } else { path.is_file() };
        if !valid {
            let kind = if want_dir { "directory" } else { "file" };
            warn!("{} is not an existing {}", path.display(), kind);
            return Ok(None);
        }
        Ok(Some(path))
    }
}

#[async_trait]
impl<R, W> Dialogs for PromptDialogs<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn pick_directory(&self) -> Result<Option<PathBuf>> {
        self.ask_path("Select project directory (empty to cancel): ", true).await
    }

    async fn pick_file(&self, default_path: Option<&Path>) -> Result<Option<PathBuf>> {
        let prompt = match default_path {
            Some(dir) => format!("Select suite file in {} (empty to cancel): ", dir.display()),
            None => "Select suite file (empty to cancel): ".to_string(),
        };
        let Some(path) = self.ask_path(&prompt, false).await? else {
            return Ok(None);
        };
        let path = match default_path {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        };
        Ok(Some(path))
    }

    async fn confirm_unsaved(&self, _runtime_test_directory: &Path) -> Result<DialogChoice> {
        let answer = self
            .ask("You have unsaved changes in the open suite. [S]ave / [I]gnore: ")
            .await?
            .unwrap_or_default()
            .to_lowercase();
        Ok(match answer.as_str() {
            "i" | "ignore" => DialogChoice::Ignore,
            _ => DialogChoice::Save,
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedAnswer, ScriptedDialogs};

/// Queue-driven dialogs for tests, built with the `test-support` feature
#[cfg(any(test, feature = "test-support"))]
mod scripted {
    use super::Dialogs;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use puppetry_common::{DialogChoice, Error, Result};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    /// Canned dialog answers
    #[derive(Debug, Clone, PartialEq)]
    pub enum ScriptedAnswer {
        Directory(Option<PathBuf>),
        File(Option<PathBuf>),
        Confirm(DialogChoice),
    }

    /// Answers dialogs from a queue, in order
    #[derive(Default)]
    pub struct ScriptedDialogs {
        answers: Mutex<VecDeque<ScriptedAnswer>>,
    }

    impl ScriptedDialogs {
        pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().collect()),
            }
        }

        pub fn push(&self, answer: ScriptedAnswer) {
            self.answers.lock().push_back(answer);
        }

        pub fn remaining(&self) -> usize {
            self.answers.lock().len()
        }

        fn next(&self, dialog: &str) -> Result<ScriptedAnswer> {
            self.answers
                .lock()
                .pop_front()
                .ok_or_else(|| Error::Internal(format!("no scripted answer for {}", dialog)))
        }
    }

    #[async_trait]
    impl Dialogs for ScriptedDialogs {
        async fn pick_directory(&self) -> Result<Option<PathBuf>> {
            match self.next("directory picker")? {
                ScriptedAnswer::Directory(path) => Ok(path),
                other => Err(Error::Internal(format!(
                    "expected directory answer, got {:?}",
                    other
                ))),
            }
        }

        async fn pick_file(&self, _default_path: Option<&Path>) -> Result<Option<PathBuf>> {
            match self.next("file picker")? {
                ScriptedAnswer::File(path) => Ok(path),
                other => Err(Error::Internal(format!("expected file answer, got {:?}", other))),
            }
        }

        async fn confirm_unsaved(&self, _runtime_test_directory: &Path) -> Result<DialogChoice> {
            match self.next("unsaved changes dialog")? {
                ScriptedAnswer::Confirm(choice) => Ok(choice),
                other => Err(Error::Internal(format!("expected confirmation, got {:?}", other))),
            }
        }
    }
}
