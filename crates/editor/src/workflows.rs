//! Editor workflows
//!
//! Multi-step operations over the store, the persistence gateway and the
//! host. Save, load and create failures land in the error banner instead
//! of being returned, so those workflows yield `Ok(None)` after a failure
//! that the banner already reports.

use crate::client::HostClient;
use crate::settings::{Settings, SettingsStore};
use crate::state::{AppTab, EditorState, ErrorBanner};
use crate::store::{Action, AppPatch, Applied, ProjectPatch, Store, SuiteAction};
use chrono::Utc;
use puppetry_common::{
    persistence, CommandRef, DialogChoice, Error, Event, EventTopic, Project, Result, Suite,
    TestRef, TestReport,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Subscription key of the file navigator listener
const NAVIGATOR_KEY: &str = "file-navigator";

const CANNOT_SAVE_PROJECT: &str = "Cannot save project";
const INTERNAL_ERROR: &str = "Internal Error";
const CANNOT_OPEN_FILE: &str = "Cannot open file";

#[derive(Clone)]
pub struct Editor {
    store: Store,
    host: Option<HostClient>,
    settings: SettingsStore,
}

impl Editor {
    pub fn new(store: Store, settings: SettingsStore, host: Option<HostClient>) -> Self {
        Self { store, host, settings }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<EditorState> {
        self.store.snapshot()
    }

    fn host(&self) -> Result<&HostClient> {
        self.host
            .as_ref()
            .ok_or_else(|| Error::Channel("not connected to the host".to_string()))
    }

    /// Informational push; a missing or closed host only gets logged
    fn notify_host(&self, event: Event) {
        if let Some(host) = &self.host {
            if let Err(e) = host.emit(event) {
                debug!("Host push dropped: {}", e);
            }
        }
    }

    fn project_directory(&self, directory: Option<&Path>) -> Result<PathBuf> {
        directory
            .map(Path::to_path_buf)
            .or_else(|| self.snapshot().settings.project_directory.clone())
            .ok_or_else(|| Error::InvalidArgument("Empty project directory".to_string()))
    }

    async fn set_loading(&self, loading: bool) -> Result<()> {
        self.store
            .dispatch(Action::UpdateApp(AppPatch { loading: Some(loading), ..Default::default() }))
            .await
            .map(|_| ())
    }

    /// Run `work`, turning its failure into an error banner
    async fn with_banner<T, F>(&self, message: &str, work: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match work.await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("{}: {}", message, e);
                self.store
                    .dispatch(Action::SetError(Some(ErrorBanner::new(message, &e))))
                    .await?;
                Ok(None)
            }
        }
    }

    pub async fn dismiss_error(&self) -> Result<()> {
        self.store.dispatch(Action::SetError(None)).await.map(|_| ())
    }

    // Settings

    pub async fn load_settings(&self) -> Result<Settings> {
        let settings = self.settings.load(&self.snapshot().settings).await?;
        self.store.dispatch(Action::SetSettings(settings.clone())).await?;
        Ok(settings)
    }

    /// Apply `update` to the current settings and persist the result
    pub async fn save_settings<F>(&self, update: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.snapshot().settings.clone();
        update(&mut settings);
        self.settings.save(&settings).await?;
        self.store.dispatch(Action::SetSettings(settings.clone())).await?;
        Ok(settings)
    }

    // Project

    /// Open the project in `directory`, or the one from settings.
    ///
    /// An explicit directory is remembered in settings. Returns `None` when
    /// the project could not be read.
    pub async fn load_project(&self, directory: Option<PathBuf>) -> Result<Option<Project>> {
        let project_directory = self.project_directory(directory.as_deref())?;
        self.set_loading(true).await?;
        let loaded = self.open_project(&project_directory, directory.is_some()).await;
        self.set_loading(false).await?;

        match loaded {
            Ok(project) => Ok(Some(project)),
            Err(e) => {
                warn!("Cannot load project {}: {}", project_directory.display(), e);
                Ok(None)
            }
        }
    }

    async fn open_project(&self, project_directory: &Path, remember: bool) -> Result<Project> {
        let project = persistence::read_project(project_directory).await?;
        self.notify_host(Event::ProjectLoaded {
            project_directory: project_directory.to_path_buf(),
        });
        if remember {
            let dir = project_directory.to_path_buf();
            self.save_settings(|s| s.project_directory = Some(dir)).await?;
        }
        self.store.dispatch(Action::ResetProject(project.clone())).await?;
        self.load_project_files(Some(project_directory.to_path_buf())).await?;
        self.watch_project_files(Some(project_directory.to_path_buf())).await?;
        if let Some(filename) = &project.last_open_suite {
            self.open_suite_file(filename).await?;
        }
        info!("Loaded project {}", project_directory.display());
        Ok(project)
    }

    /// Ask the host to watch the project and refresh the file list on
    /// every settled change. Watching again replaces the previous listener.
    pub async fn watch_project_files(&self, directory: Option<PathBuf>) -> Result<()> {
        let project_directory = self.project_directory(directory.as_deref())?;
        let Some(host) = &self.host else {
            debug!("No host, not watching {}", project_directory.display());
            return Ok(());
        };

        let mut updates = host.subscribe(EventTopic::FileNavigatorUpdated, NAVIGATOR_KEY);
        let editor = self.clone();
        let dir = project_directory.clone();
        tokio::spawn(async move {
            while updates.recv().await.is_some() {
                if let Err(e) = editor.load_project_files(Some(dir.clone())).await {
                    warn!("Cannot refresh project files: {}", e);
                }
            }
            debug!("File navigator listener for {} stopped", dir.display());
        });

        host.watch_project_files(project_directory).await
    }

    /// Re-read the suite list of the project
    pub async fn load_project_files(&self, directory: Option<PathBuf>) -> Result<Vec<String>> {
        let project_directory = self.project_directory(directory.as_deref())?;
        let files = persistence::list_suite_files(&project_directory).await?;
        let current = self.snapshot().suite.filename.clone();
        self.notify_host(Event::SuiteListUpdated {
            project_directory,
            filename: (!current.is_empty()).then_some(current),
            files: files.clone(),
        });
        self.store
            .dispatch(Action::UpdateApp(AppPatch {
                project_files: Some(files.clone()),
                ..Default::default()
            }))
            .await?;
        Ok(files)
    }

    /// Create or rename the project in `project_directory`
    pub async fn save_project(
        &self,
        project_directory: PathBuf,
        name: &str,
    ) -> Result<Option<Project>> {
        self.with_banner(CANNOT_SAVE_PROJECT, self.write_new_project(project_directory, name))
            .await
    }

    async fn write_new_project(&self, project_directory: PathBuf, name: &str) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("Empty project name".to_string()));
        }
        if project_directory.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("Empty project directory".to_string()));
        }

        self.store
            .dispatch(Action::UpdateProject(ProjectPatch {
                project_directory: Some(project_directory.clone()),
                name: Some(name.to_string()),
                ..Default::default()
            }))
            .await?;
        let dir = project_directory.clone();
        self.save_settings(|s| s.project_directory = Some(dir)).await?;
        let saved = persistence::write_project(&project_directory, &self.snapshot().project).await?;
        self.store.dispatch(Action::ResetProject(saved.clone())).await?;

        self.load_project_files(Some(project_directory.clone())).await?;
        self.watch_project_files(Some(project_directory)).await?;
        self.store.dispatch(Action::RemoveAppTab(AppTab::Suite)).await?;
        Ok(saved)
    }

    /// Persist project metadata when a project is open
    async fn write_current_project(&self) -> Result<()> {
        let state = self.snapshot();
        let dir = &state.project.project_directory;
        if dir.as_os_str().is_empty() {
            return Ok(());
        }
        let saved = persistence::write_project(dir, &state.project).await?;
        self.store.dispatch(Action::ResetProject(saved)).await?;
        Ok(())
    }

    pub async fn remove_suite(&self, filename: &str) -> Result<()> {
        if filename.trim().is_empty() {
            return Err(Error::InvalidArgument("Filename is not a string or empty".to_string()));
        }
        let project_directory = self.project_directory(None)?;
        persistence::remove_suite(&project_directory, filename).await
    }

    // Suite

    /// Write a new empty suite and open it. Returns the stored filename.
    pub async fn create_suite(&self, raw_filename: &str, title: &str) -> Result<Option<String>> {
        if raw_filename.trim().is_empty() {
            return Err(Error::InvalidArgument("Filename is not a string or empty".to_string()));
        }
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("Title is not a string or empty".to_string()));
        }
        let filename = persistence::suite_filename(raw_filename)?;
        self.with_banner(INTERNAL_ERROR, self.write_new_suite(filename, title)).await
    }

    async fn write_new_suite(&self, filename: String, title: &str) -> Result<String> {
        let project_directory = self.project_directory(None)?;
        let mut suite = Suite::new(filename.clone(), title);
        suite.saved_at = Some(Utc::now());
        persistence::write_suite(&project_directory, &filename, &suite).await?;

        self.open_suite_file(&filename).await?;
        self.write_current_project().await?;
        Ok(filename)
    }

    /// Read `filename` from the project and make it the open suite
    pub async fn load_suite(&self, filename: &str) -> Result<Suite> {
        let project_directory = self.project_directory(None)?;
        let suite = persistence::read_suite(&project_directory, filename).await?;

        self.store
            .dispatch(Action::UpdateProject(ProjectPatch {
                last_open_suite: Some(filename.to_string()),
                ..Default::default()
            }))
            .await?;
        self.store.dispatch(Action::ResetSuite(suite.clone())).await?;
        self.notify_host(Event::SuiteLoaded {
            project_directory,
            filename: filename.to_string(),
            files: self.snapshot().app.project_files.clone(),
        });
        self.store.dispatch(Action::AddAppTab(AppTab::Suite)).await?;
        debug!("Loaded suite {}", filename);
        Ok(suite)
    }

    /// Save the open suite, under `filename` when given
    pub async fn save_suite(&self, filename: Option<&str>) -> Result<Option<Suite>> {
        self.with_banner(INTERNAL_ERROR, self.write_open_suite(filename)).await
    }

    async fn write_open_suite(&self, filename: Option<&str>) -> Result<Suite> {
        let state = self.snapshot();
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| state.suite.filename.clone());
        if filename.is_empty() {
            return Err(Error::InvalidArgument("Empty suite filename".to_string()));
        }
        let project_directory = self.project_directory(None)?;

        let saved = persistence::write_suite(&project_directory, &filename, &state.suite).await?;
        self.write_current_project().await?;
        self.store
            .dispatch(Action::MarkSuiteSaved {
                revision: state.suite_revision,
                filename,
                saved_at: saved.saved_at,
            })
            .await?;
        Ok(saved)
    }

    pub async fn open_suite_file(&self, filename: &str) -> Result<Option<Suite>> {
        self.set_loading(true).await?;
        let opened = self.with_banner(CANNOT_OPEN_FILE, self.load_suite(filename)).await;
        self.set_loading(false).await?;
        opened
    }

    // Structural shortcuts

    pub async fn clone_target(&self, id: &str) -> Result<String> {
        self.store.edit(SuiteAction::CloneTarget { id: id.to_string() }).await?.created_id()
    }

    pub async fn clone_group(&self, id: &str) -> Result<String> {
        self.store.edit(SuiteAction::CloneGroup { id: id.to_string() }).await?.created_id()
    }

    pub async fn clone_test(&self, test: TestRef) -> Result<String> {
        self.store.edit(SuiteAction::CloneTest(test)).await?.created_id()
    }

    pub async fn clone_command(&self, command: CommandRef) -> Result<String> {
        self.store.edit(SuiteAction::CloneCommand(command)).await?.created_id()
    }

    /// Clear the failure text of every command. Returns how many changed.
    pub async fn reset_command_failures(&self) -> Result<usize> {
        match self.store.edit(SuiteAction::ResetCommandFailures).await? {
            Applied::Reset(count) => Ok(count),
            other => Err(Error::Internal(format!("unexpected result {:?}", other))),
        }
    }

    // Runtime

    /// Record whether the runtime-test directory is usable. A directory
    /// that is not gets removed so the next install starts clean.
    pub async fn check_runtime_test_dir_ready(&self) -> Result<bool> {
        let dir = self.snapshot().settings.runtime_test_directory();
        let ready = persistence::runtime_test_path_ready(&dir);
        if !ready {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => info!("Removed incomplete runtime-test directory {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Cannot remove {}: {}", dir.display(), e),
            }
        }
        self.store
            .dispatch(Action::UpdateApp(AppPatch {
                ready_to_run_tests: Some(ready),
                ..Default::default()
            }))
            .await?;
        Ok(ready)
    }

    pub async fn install_runtime_test(&self) -> Result<bool> {
        let dir = self.snapshot().settings.runtime_test_directory();
        self.host()?.install_runtime_test(dir).await?;
        self.check_runtime_test_dir_ready().await
    }

    /// Run generated test files from the runtime-test directory
    pub async fn run_tests(&self, target_files: Vec<String>) -> Result<TestReport> {
        let cwd = self.snapshot().settings.runtime_test_directory();
        let report = self.host()?.run_tests(cwd, target_files).await?;
        self.store
            .dispatch(Action::UpdateApp(AppPatch {
                test_report: Some(report.clone()),
                ..Default::default()
            }))
            .await?;
        self.store.dispatch(Action::AddAppTab(AppTab::TestReport)).await?;
        Ok(report)
    }

    // Host dialogs and windows

    pub async fn browse_directory(&self) -> Result<Option<PathBuf>> {
        self.host()?.browse_directory().await
    }

    pub async fn browse_file(&self, default_path: Option<PathBuf>) -> Result<Option<PathBuf>> {
        self.host()?.browse_file(default_path).await
    }

    /// Ask what to do with unsaved changes, saving when asked to. A clean
    /// suite needs no answer.
    pub async fn confirm_unsaved_changes(&self) -> Result<DialogChoice> {
        let state = self.snapshot();
        if !state.is_dirty() {
            return Ok(DialogChoice::Ignore);
        }
        let choice = self
            .host()?
            .confirm_unsaved(state.settings.runtime_test_directory())
            .await?;
        if choice == DialogChoice::Save {
            self.save_suite(None).await?;
        }
        Ok(choice)
    }

    pub async fn open_recorder(&self) -> Result<()> {
        self.host()?.open_recorder_window().await
    }

    /// Best-effort project save before exit
    pub async fn close_app(&self) {
        if let Err(e) = self.write_current_project().await {
            debug!("Project not saved on close: {}", e);
        }
        info!("Editor closed");
    }
}
