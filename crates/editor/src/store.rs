//! Single-writer editor store
//!
//! Every mutation is an [`Action`] queued to one task that applies it and
//! publishes the resulting immutable snapshot. Actions are validated before
//! they reach the document, and a failing action leaves the published
//! snapshot untouched.

use crate::settings::Settings;
use crate::state::{AppTab, EditorState, ErrorBanner};
use chrono::{DateTime, Utc};
use puppetry_common::types::*;
use puppetry_common::{validate, Error, Project, Result, Suite, TestReport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace};

/// Structural edits of the open suite
#[derive(Debug, Clone)]
pub enum SuiteAction {
    AddTarget { options: TargetOptions, id: Option<String> },
    InsertAdjacentTarget { options: TargetOptions, position: Position, id: Option<String> },
    UpdateTarget(TargetPatch),
    RemoveTarget { id: String },
    CloneTarget { id: String },
    SwapTargets { source: String, target: String },

    AddGroup { options: GroupOptions, id: Option<String> },
    InsertAdjacentGroup { options: GroupOptions, position: Position, id: Option<String> },
    UpdateGroup(GroupPatch),
    RemoveGroup { id: String },
    CloneGroup { id: String },
    SwapGroups { source: String, target: String },

    AddTest { options: TestOptions, id: Option<String> },
    InsertAdjacentTest { options: TestOptions, position: Position, id: Option<String> },
    UpdateTest(TestPatch),
    RemoveTest(TestRef),
    CloneTest(TestRef),
    SwapTests { group_id: String, source: String, target: String },

    AddCommand { options: CommandOptions, id: Option<String> },
    InsertAdjacentCommand { options: CommandOptions, position: Position, id: Option<String> },
    UpdateCommand(CommandPatch),
    RemoveCommand(CommandRef),
    CloneCommand(CommandRef),
    SwapCommands { group_id: String, test_id: String, source: String, target: String },

    ResetCommandFailures,
}

/// Suite-level fields
#[derive(Debug, Clone, Default)]
pub struct SuitePatch {
    pub filename: Option<String>,
    pub title: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Project-level fields
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub project_directory: Option<PathBuf>,
    pub name: Option<String>,
    pub last_open_suite: Option<String>,
}

/// Application-level fields
#[derive(Debug, Clone, Default)]
pub struct AppPatch {
    pub loading: Option<bool>,
    pub project_files: Option<Vec<String>>,
    pub ready_to_run_tests: Option<bool>,
    pub test_report: Option<TestReport>,
}

#[derive(Debug, Clone)]
pub enum Action {
    SetSettings(Settings),
    SetError(Option<ErrorBanner>),
    UpdateApp(AppPatch),
    AddAppTab(AppTab),
    RemoveAppTab(AppTab),
    ResetProject(Project),
    UpdateProject(ProjectPatch),
    ResetSuite(Suite),
    UpdateSuite(SuitePatch),
    /// The suite as of `revision` was written as `filename`
    MarkSuiteSaved {
        revision: u64,
        filename: String,
        saved_at: Option<DateTime<Utc>>,
    },
    Suite(SuiteAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetSettings(_) => "SET_SETTINGS",
            Action::SetError(_) => "SET_ERROR",
            Action::UpdateApp(_) => "UPDATE_APP",
            Action::AddAppTab(_) => "ADD_APP_TAB",
            Action::RemoveAppTab(_) => "REMOVE_APP_TAB",
            Action::ResetProject(_) => "RESET_PROJECT",
            Action::UpdateProject(_) => "UPDATE_PROJECT",
            Action::ResetSuite(_) => "RESET_SUITE",
            Action::UpdateSuite(_) => "UPDATE_SUITE",
            Action::MarkSuiteSaved { .. } => "MARK_SUITE_SAVED",
            Action::Suite(_) => "SUITE",
        }
    }
}

/// What an applied action produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Done,
    /// Id of the entity an add, insert or clone created
    Created(String),
    /// Number of commands whose failure text was cleared
    Reset(usize),
}

impl Applied {
    pub fn created_id(self) -> Result<String> {
        match self {
            Applied::Created(id) => Ok(id),
            other => Err(Error::Internal(format!("expected a new id, got {:?}", other))),
        }
    }
}

/// Shape checks run before an action is applied
fn check(action: &Action) -> Result<()> {
    match action {
        Action::SetError(Some(banner)) if banner.visible && banner.message.trim().is_empty() => {
            Err(Error::Validation("error banner needs a message".to_string()))
        }
        Action::Suite(edit) => check_suite(edit),
        _ => Ok(()),
    }
}

fn check_suite(edit: &SuiteAction) -> Result<()> {
    match edit {
        SuiteAction::AddTarget { options, id }
        | SuiteAction::InsertAdjacentTarget { options, id, .. } => {
            validate::id(id.as_deref())?;
            validate::target_options(options)
        }
        SuiteAction::UpdateTarget(patch) => validate::target_patch(patch),
        SuiteAction::AddGroup { id, .. } | SuiteAction::InsertAdjacentGroup { id, .. } => {
            validate::id(id.as_deref())
        }
        SuiteAction::UpdateGroup(patch) => validate::group_patch(patch),
        SuiteAction::AddTest { options, id }
        | SuiteAction::InsertAdjacentTest { options, id, .. } => {
            validate::id(id.as_deref())?;
            validate::test_options(options)
        }
        SuiteAction::UpdateTest(patch) => validate::test_patch(patch),
        SuiteAction::RemoveTest(test) | SuiteAction::CloneTest(test) => validate::test_ref(test),
        SuiteAction::AddCommand { options, id }
        | SuiteAction::InsertAdjacentCommand { options, id, .. } => {
            validate::id(id.as_deref())?;
            validate::command_options(options)
        }
        SuiteAction::UpdateCommand(patch) => validate::command_patch(patch),
        SuiteAction::RemoveCommand(command) | SuiteAction::CloneCommand(command) => {
            validate::command_ref(command)
        }
        SuiteAction::RemoveTarget { id }
        | SuiteAction::CloneTarget { id }
        | SuiteAction::RemoveGroup { id }
        | SuiteAction::CloneGroup { id } => validate::remove_id(id),
        SuiteAction::SwapTargets { source, target }
        | SuiteAction::SwapGroups { source, target } => {
            validate::remove_id(source)?;
            validate::remove_id(target)
        }
        SuiteAction::SwapTests { group_id, source, target } => {
            validate::remove_id(group_id)?;
            validate::remove_id(source)?;
            validate::remove_id(target)
        }
        SuiteAction::SwapCommands { group_id, test_id, source, target } => {
            validate::remove_id(group_id)?;
            validate::remove_id(test_id)?;
            validate::remove_id(source)?;
            validate::remove_id(target)
        }
        SuiteAction::ResetCommandFailures => Ok(()),
    }
}

fn apply_suite(suite: &mut Suite, edit: SuiteAction) -> Result<Applied> {
    use SuiteAction::*;

    let applied = match edit {
        AddTarget { options, id } => Applied::Created(suite.add_target(options, id)?),
        InsertAdjacentTarget { options, position, id } => {
            Applied::Created(suite.insert_adjacent_target(options, &position, id)?)
        }
        UpdateTarget(patch) => {
            suite.update_target(patch)?;
            Applied::Done
        }
        RemoveTarget { id } => {
            suite.remove_target(&id)?;
            Applied::Done
        }
        CloneTarget { id } => Applied::Created(suite.clone_target(&id)?),
        SwapTargets { source, target } => {
            suite.swap_targets(&source, &target)?;
            Applied::Done
        }

        AddGroup { options, id } => Applied::Created(suite.add_group(options, id)?),
        InsertAdjacentGroup { options, position, id } => {
            Applied::Created(suite.insert_adjacent_group(options, &position, id)?)
        }
        UpdateGroup(patch) => {
            suite.update_group(patch)?;
            Applied::Done
        }
        RemoveGroup { id } => {
            suite.remove_group(&id)?;
            Applied::Done
        }
        CloneGroup { id } => Applied::Created(suite.clone_group(&id)?),
        SwapGroups { source, target } => {
            suite.swap_groups(&source, &target)?;
            Applied::Done
        }

        AddTest { options, id } => Applied::Created(suite.add_test(options, id)?),
        InsertAdjacentTest { options, position, id } => {
            Applied::Created(suite.insert_adjacent_test(options, &position, id)?)
        }
        UpdateTest(patch) => {
            suite.update_test(patch)?;
            Applied::Done
        }
        RemoveTest(test) => {
            suite.remove_test(&test)?;
            Applied::Done
        }
        CloneTest(test) => Applied::Created(suite.clone_test(&test)?),
        SwapTests { group_id, source, target } => {
            suite.swap_tests(&group_id, &source, &target)?;
            Applied::Done
        }

        AddCommand { options, id } => Applied::Created(suite.add_command(options, id)?),
        InsertAdjacentCommand { options, position, id } => {
            Applied::Created(suite.insert_adjacent_command(options, &position, id)?)
        }
        UpdateCommand(patch) => {
            suite.update_command(patch)?;
            Applied::Done
        }
        RemoveCommand(command) => {
            suite.remove_command(&command)?;
            Applied::Done
        }
        CloneCommand(command) => Applied::Created(suite.clone_command(&command)?),
        SwapCommands { group_id, test_id, source, target } => {
            suite.swap_commands(&group_id, &test_id, &source, &target)?;
            Applied::Done
        }

        ResetCommandFailures => Applied::Reset(suite.reset_command_failures()),
    };
    Ok(applied)
}

/// Apply one action to a state being built
fn reduce(state: &mut EditorState, action: Action) -> Result<Applied> {
    match action {
        Action::SetSettings(settings) => state.settings = settings,
        Action::SetError(banner) => state.app.error = banner,
        Action::UpdateApp(patch) => {
            if let Some(loading) = patch.loading {
                state.app.loading = loading;
            }
            if let Some(files) = patch.project_files {
                state.app.project_files = files;
            }
            if let Some(ready) = patch.ready_to_run_tests {
                state.app.ready_to_run_tests = ready;
            }
            if let Some(report) = patch.test_report {
                state.app.test_report = Some(report);
            }
        }
        Action::AddAppTab(tab) => {
            if !state.app.tabs.contains(&tab) {
                state.app.tabs.push(tab);
            }
        }
        Action::RemoveAppTab(tab) => state.app.tabs.retain(|t| *t != tab),
        Action::ResetProject(project) => state.project = project,
        Action::UpdateProject(patch) => {
            if let Some(dir) = patch.project_directory {
                state.project.project_directory = dir;
            }
            if let Some(name) = patch.name {
                state.project.name = name;
            }
            if let Some(filename) = patch.last_open_suite {
                state.project.last_open_suite = Some(filename);
            }
            state.project.modified = true;
        }
        Action::ResetSuite(suite) => {
            state.suite = suite;
            state.suite_revision += 1;
        }
        Action::UpdateSuite(patch) => {
            if let Some(filename) = patch.filename {
                state.suite.filename = filename;
            }
            if let Some(title) = patch.title {
                state.suite.title = title;
                state.suite.modified = true;
                state.suite_revision += 1;
            }
            if let Some(saved_at) = patch.saved_at {
                state.suite.saved_at = Some(saved_at);
            }
        }
        Action::MarkSuiteSaved { revision, filename, saved_at } => {
            state.suite.filename = filename;
            if let Some(saved_at) = saved_at {
                state.suite.saved_at = Some(saved_at);
            }
            // Edits applied while the write was in flight are not on disk
            if state.suite_revision == revision {
                state.suite.modified = false;
            } else {
                debug!(
                    "Suite changed during save (revision {} -> {}), keeping it modified",
                    revision, state.suite_revision
                );
            }
        }
        Action::Suite(edit) => {
            let applied = apply_suite(&mut state.suite, edit)?;
            state.suite_revision += 1;
            return Ok(applied);
        }
    }
    Ok(Applied::Done)
}

struct Envelope {
    action: Action,
    reply: oneshot::Sender<Result<Applied>>,
}

/// Handle to the store task. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    queue: mpsc::Sender<Envelope>,
    state: watch::Receiver<Arc<EditorState>>,
}

impl Store {
    /// Start the store task. Must be called inside a tokio runtime.
    pub fn spawn(initial: EditorState) -> Self {
        let (queue, rx) = mpsc::channel(64);
        let (publish, state) = watch::channel(Arc::new(initial));
        tokio::spawn(run(rx, publish));
        Self { queue, state }
    }

    /// Queue `action` and wait until it was applied or rejected
    pub async fn dispatch(&self, action: Action) -> Result<Applied> {
        let (reply, applied) = oneshot::channel();
        self.queue
            .send(Envelope { action, reply })
            .await
            .map_err(|_| Error::Internal("store task stopped".to_string()))?;
        applied
            .await
            .map_err(|_| Error::Internal("store task dropped an action".to_string()))?
    }

    pub async fn edit(&self, edit: SuiteAction) -> Result<Applied> {
        self.dispatch(Action::Suite(edit)).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<EditorState> {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<Arc<EditorState>> {
        self.state.clone()
    }
}

async fn run(mut queue: mpsc::Receiver<Envelope>, publish: watch::Sender<Arc<EditorState>>) {
    let mut current = publish.borrow().clone();

    while let Some(Envelope { action, reply }) = queue.recv().await {
        let name = action.name();
        let result = check(&action).and_then(|()| {
            let mut next = current.clone();
            let applied = reduce(Arc::make_mut(&mut next), action)?;
            Ok((next, applied))
        });

        let outcome = match result {
            Ok((next, applied)) => {
                trace!("Applied {}", name);
                current = next;
                publish.send_replace(current.clone());
                Ok(applied)
            }
            Err(e) => {
                debug!("Rejected {}: {}", name, e);
                Err(e)
            }
        };
        let _ = reply.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_group(title: &str) -> SuiteAction {
        SuiteAction::AddGroup { options: GroupOptions { title: title.into() }, id: None }
    }

    async fn store_with_test() -> (Store, String, String) {
        let store = Store::spawn(EditorState::default());
        let group = store
            .edit(add_group("Auth"))
            .await
            .unwrap()
            .created_id()
            .unwrap();
        let test = store
            .edit(SuiteAction::AddTest {
                options: TestOptions { group_id: group.clone(), title: "logs in".into() },
                id: None,
            })
            .await
            .unwrap()
            .created_id()
            .unwrap();
        (store, group, test)
    }

    #[tokio::test]
    async fn test_actions_produce_new_snapshots() {
        let store = Store::spawn(EditorState::default());
        let before = store.snapshot();
        store
            .edit(SuiteAction::AddTarget {
                options: TargetOptions { target: "EMAIL".into(), selector: "#email".into() },
                id: Some("t1".into()),
            })
            .await
            .unwrap();
        let after = store.snapshot();
        assert!(before.suite.targets.is_empty());
        assert!(after.suite.targets.contains_key("t1"));
        assert!(after.is_dirty());
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected_before_apply() {
        let store = Store::spawn(EditorState::default());
        let err = store
            .edit(SuiteAction::AddTarget {
                options: TargetOptions { target: "1 bad".into(), selector: "#x".into() },
                id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.snapshot().is_dirty());
    }

    #[tokio::test]
    async fn test_failed_action_keeps_snapshot() {
        let (store, group, _) = store_with_test().await;
        let before = store.snapshot();
        let err = store
            .edit(SuiteAction::AddGroup {
                options: GroupOptions { title: "dup".into() },
                id: Some(group),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId { .. }));
        assert_eq!(*store.snapshot(), *before);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_is_serialized() {
        let (store, group, test) = store_with_test().await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let (group, test) = (group.clone(), test.clone());
            handles.push(tokio::spawn(async move {
                store
                    .edit(SuiteAction::AddCommand {
                        options: CommandOptions {
                            group_id: group,
                            test_id: test,
                            method: "click".into(),
                            target: format!("T{}", i),
                            ..Default::default()
                        },
                        id: None,
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.suite.test(&group, &test).unwrap().commands.len(), 20);
    }

    #[tokio::test]
    async fn test_reset_command_failures_reports_count() {
        let (store, group, test) = store_with_test().await;
        let command = store
            .edit(SuiteAction::AddCommand {
                options: CommandOptions {
                    group_id: group.clone(),
                    test_id: test.clone(),
                    method: "click".into(),
                    ..Default::default()
                },
                id: None,
            })
            .await
            .unwrap()
            .created_id()
            .unwrap();
        store
            .edit(SuiteAction::UpdateCommand(CommandPatch {
                group_id: group,
                test_id: test,
                id: command,
                failure: Some("timeout".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(store.edit(SuiteAction::ResetCommandFailures).await.unwrap(), Applied::Reset(1));
        assert_eq!(store.edit(SuiteAction::ResetCommandFailures).await.unwrap(), Applied::Reset(0));
    }

    #[tokio::test]
    async fn test_tabs_are_unique() {
        let store = Store::spawn(EditorState::default());
        store.dispatch(Action::AddAppTab(AppTab::Suite)).await.unwrap();
        store.dispatch(Action::AddAppTab(AppTab::Suite)).await.unwrap();
        assert_eq!(store.snapshot().app.tabs, vec![AppTab::Suite]);
        store.dispatch(Action::RemoveAppTab(AppTab::Suite)).await.unwrap();
        assert!(store.snapshot().app.tabs.is_empty());
    }

    #[tokio::test]
    async fn test_mark_saved_keeps_later_edits_modified() {
        let store = Store::spawn(EditorState::default());
        store.edit(add_group("Auth")).await.unwrap();
        let written = store.snapshot().suite_revision;

        store.edit(add_group("Cart")).await.unwrap();
        store
            .dispatch(Action::MarkSuiteSaved {
                revision: written,
                filename: "shop.json".into(),
                saved_at: None,
            })
            .await
            .unwrap();
        let state = store.snapshot();
        assert_eq!(state.suite.filename, "shop.json");
        assert!(state.is_dirty());

        let current = state.suite_revision;
        store
            .dispatch(Action::MarkSuiteSaved {
                revision: current,
                filename: "shop.json".into(),
                saved_at: None,
            })
            .await
            .unwrap();
        assert!(!store.snapshot().is_dirty());
    }

    #[tokio::test]
    async fn test_rejected_edit_keeps_revision() {
        let store = Store::spawn(EditorState::default());
        let before = store.snapshot().suite_revision;
        store.edit(SuiteAction::RemoveGroup { id: "missing".into() }).await.unwrap_err();
        assert_eq!(store.snapshot().suite_revision, before);

        store
            .dispatch(Action::UpdateSuite(SuitePatch {
                title: Some("Shop".into()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(store.snapshot().suite_revision, before + 1);
    }

    #[tokio::test]
    async fn test_banner_requires_message() {
        let store = Store::spawn(EditorState::default());
        let err = store
            .dispatch(Action::SetError(Some(ErrorBanner::new("", "details"))))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
