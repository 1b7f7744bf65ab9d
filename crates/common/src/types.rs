//! Core types for Puppetry
//!
//! A [`Suite`] owns its targets and groups, groups own tests and tests own
//! commands. The `group_id`/`test_id` fields on children are lookup keys that
//! mirror the owning container; they never confer ownership.

use crate::ordered::OrderedMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generate a fresh entity id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Reusable element locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    /// Label the target is referenced by in commands
    pub target: String,
    pub selector: String,
}

/// Automation step within a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub test_id: String,
    pub group_id: String,
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Error text from the last run, empty when it passed
    #[serde(default)]
    pub failure: String,
}

/// Ordered container of commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub group_id: String,
    pub title: String,
    #[serde(default)]
    pub commands: OrderedMap<Command>,
}

/// Ordered container of tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tests: OrderedMap<Test>,
}

/// Persisted suite document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suite {
    pub filename: String,
    pub title: String,
    #[serde(default)]
    pub targets: OrderedMap<Target>,
    #[serde(default)]
    pub groups: OrderedMap<Group>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    /// Version of the application that wrote the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puppetry: Option<String>,
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub modified: bool,
}

impl Default for Suite {
    fn default() -> Self {
        Self {
            filename: String::new(),
            title: String::new(),
            targets: OrderedMap::new(),
            groups: OrderedMap::new(),
            saved_at: None,
            puppetry: None,
            loaded_at: None,
            modified: false,
        }
    }
}

impl Suite {
    pub fn new(filename: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Find a test by its group and id
    pub fn test(&self, group_id: &str, test_id: &str) -> Option<&Test> {
        self.groups.get(group_id)?.tests.get(test_id)
    }

    /// Find a command by its back-references and id
    pub fn command(&self, group_id: &str, test_id: &str, id: &str) -> Option<&Command> {
        self.test(group_id, test_id)?.commands.get(id)
    }

    /// Every command in display order
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.groups
            .values()
            .flat_map(|group| group.tests.values())
            .flat_map(|test| test.commands.values())
    }
}

/// Persisted project metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub project_directory: PathBuf,
    #[serde(default)]
    pub name: String,
    /// Filename of the suite open when the project was last saved
    #[serde(default)]
    pub last_open_suite: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puppetry: Option<String>,
    #[serde(default)]
    pub modified: bool,
}

/// Where a new entity goes relative to its siblings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Place immediately after this sibling; append when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl Position {
    pub fn end() -> Self {
        Self { after: None }
    }

    pub fn after(id: impl Into<String>) -> Self {
        Self { after: Some(id.into()) }
    }
}

/// Fields of a new target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetOptions {
    pub target: String,
    pub selector: String,
}

/// Partial update of a target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPatch {
    pub id: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
}

/// Fields of a new group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupOptions {
    pub title: String,
}

/// Partial update of a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPatch {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Fields of a new test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOptions {
    pub group_id: String,
    pub title: String,
}

/// Partial update of a test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPatch {
    pub group_id: String,
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Fields of a new command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    pub group_id: String,
    pub test_id: String,
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Partial update of a command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPatch {
    pub group_id: String,
    pub test_id: String,
    pub id: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub failure: Option<String>,
}

/// Address of a test inside a suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRef {
    pub group_id: String,
    pub id: String,
}

/// Address of a command inside a suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRef {
    pub group_id: String,
    pub test_id: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_json_shape() {
        let json = r##"{
            "filename": "login.json",
            "title": "Login",
            "targets": {
                "t1": { "id": "t1", "target": "EMAIL", "selector": "#email" }
            },
            "groups": {
                "g1": {
                    "id": "g1",
                    "title": "Form",
                    "tests": {
                        "x1": {
                            "id": "x1",
                            "groupId": "g1",
                            "title": "submits",
                            "commands": {
                                "c1": {
                                    "id": "c1", "testId": "x1", "groupId": "g1",
                                    "target": "EMAIL", "method": "type",
                                    "params": { "value": "a@b.c" }
                                }
                            }
                        }
                    }
                }
            },
            "savedAt": "2024-01-01T00:00:00Z",
            "puppetry": "1.0.0"
        }"##;

        let suite: Suite = serde_json::from_str(json).unwrap();
        assert_eq!(suite.targets.get("t1").unwrap().selector, "#email");
        let command = suite.command("g1", "x1", "c1").unwrap();
        assert_eq!(command.method, "type");
        assert_eq!(command.failure, "");
        assert!(!suite.modified);

        let value = serde_json::to_value(&suite).unwrap();
        assert!(value.get("savedAt").is_some());
        assert!(value.get("modified").is_none());
        assert_eq!(value["groups"]["g1"]["tests"]["x1"]["groupId"], "g1");
    }

    #[test]
    fn test_project_defaults() {
        let project: Project = serde_json::from_str(r#"{"name": "demo"}"#).unwrap();
        assert_eq!(project.name, "demo");
        assert!(project.last_open_suite.is_none());
        assert!(project.files.is_empty());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(generate_id(), generate_id());
    }
}
