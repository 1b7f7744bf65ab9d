//! Target, group, test and command editing
//!
//! Each command opens the current suite, applies one edit through the store
//! and saves the suite again.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use super::Context;
use crate::output::print_success;
use crate::store::{Applied, SuiteAction};
use puppetry_common::types::*;

/// Position flag shared by the add commands
#[derive(Args)]
pub struct PlaceArgs {
    /// Insert right after this sibling instead of appending
    #[arg(long)]
    after: Option<String>,
}

impl PlaceArgs {
    fn position(self) -> Option<Position> {
        self.after.map(Position::after)
    }
}

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Add a target
    Add {
        /// Target name used in commands
        target: String,

        /// CSS selector
        selector: String,

        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Change a target
    Update {
        id: String,

        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        selector: Option<String>,
    },

    /// Remove a target
    Remove { id: String },

    /// Duplicate a target next to the original
    Clone { id: String },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Add a group
    Add {
        title: String,

        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Rename a group
    Update {
        id: String,

        #[arg(long)]
        title: String,
    },

    /// Remove a group with its tests and commands
    Remove { id: String },

    /// Duplicate a group with its tests and commands
    Clone { id: String },
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Add a test to a group
    Add {
        #[arg(short, long)]
        group: String,

        title: String,

        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Rename a test
    Update {
        #[arg(short, long)]
        group: String,

        id: String,

        #[arg(long)]
        title: String,
    },

    /// Remove a test with its commands
    Remove {
        #[arg(short, long)]
        group: String,

        id: String,
    },

    /// Duplicate a test with its commands
    Clone {
        #[arg(short, long)]
        group: String,

        id: String,
    },
}

#[derive(Subcommand)]
pub enum CommandCommands {
    /// Add a command to a test
    Add {
        #[arg(short, long)]
        group: String,

        #[arg(short, long)]
        test: String,

        /// Method, e.g. `click` or `page.goto`
        method: String,

        /// Target the method acts on (empty for page methods)
        #[arg(long, default_value = "")]
        target: String,

        /// Parameter as key=value; the value is read as JSON when it parses
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        #[command(flatten)]
        place: PlaceArgs,
    },

    /// Change a command
    Update {
        #[arg(short, long)]
        group: String,

        #[arg(short, long)]
        test: String,

        id: String,

        #[arg(long)]
        method: Option<String>,

        #[arg(long)]
        target: Option<String>,

        /// Replace all parameters
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },

    /// Remove a command
    Remove {
        #[arg(short, long)]
        group: String,

        #[arg(short, long)]
        test: String,

        id: String,
    },

    /// Duplicate a command next to the original
    Clone {
        #[arg(short, long)]
        group: String,

        #[arg(short, long)]
        test: String,

        id: String,
    },
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got `{}`", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

fn param_map(params: Vec<(String, Value)>) -> Map<String, Value> {
    params.into_iter().collect()
}

/// Apply `action` to the open suite and save it
async fn edit(ctx: &Context, action: SuiteAction) -> Result<Option<String>> {
    ctx.open_suite().await?;
    let created = match ctx.editor.store().edit(action).await? {
        Applied::Created(id) => Some(id),
        _ => None,
    };
    ctx.save_suite().await?;
    Ok(created)
}

fn report(what: &str, created: Option<String>) {
    match created {
        Some(id) => print_success(&format!("{} {}", what, id)),
        None => print_success(what),
    }
}

pub async fn execute_target(cmd: TargetCommands, ctx: &Context) -> Result<()> {
    match cmd {
        TargetCommands::Add { target, selector, place } => {
            let options = TargetOptions { target, selector };
            let action = match place.position() {
                Some(position) => SuiteAction::InsertAdjacentTarget { options, position, id: None },
                None => SuiteAction::AddTarget { options, id: None },
            };
            report("Added target", edit(ctx, action).await?);
        }
        TargetCommands::Update { id, target, selector } => {
            edit(ctx, SuiteAction::UpdateTarget(TargetPatch { id, target, selector })).await?;
            report("Updated target", None);
        }
        TargetCommands::Remove { id } => {
            edit(ctx, SuiteAction::RemoveTarget { id }).await?;
            report("Removed target", None);
        }
        TargetCommands::Clone { id } => {
            report("Cloned target as", edit(ctx, SuiteAction::CloneTarget { id }).await?);
        }
    }
    Ok(())
}

pub async fn execute_group(cmd: GroupCommands, ctx: &Context) -> Result<()> {
    match cmd {
        GroupCommands::Add { title, place } => {
            let options = GroupOptions { title };
            let action = match place.position() {
                Some(position) => SuiteAction::InsertAdjacentGroup { options, position, id: None },
                None => SuiteAction::AddGroup { options, id: None },
            };
            report("Added group", edit(ctx, action).await?);
        }
        GroupCommands::Update { id, title } => {
            edit(ctx, SuiteAction::UpdateGroup(GroupPatch { id, title: Some(title) })).await?;
            report("Updated group", None);
        }
        GroupCommands::Remove { id } => {
            edit(ctx, SuiteAction::RemoveGroup { id }).await?;
            report("Removed group", None);
        }
        GroupCommands::Clone { id } => {
            report("Cloned group as", edit(ctx, SuiteAction::CloneGroup { id }).await?);
        }
    }
    Ok(())
}

pub async fn execute_test(cmd: TestCommands, ctx: &Context) -> Result<()> {
    match cmd {
        TestCommands::Add { group, title, place } => {
            let options = TestOptions { group_id: group, title };
            let action = match place.position() {
                Some(position) => SuiteAction::InsertAdjacentTest { options, position, id: None },
                None => SuiteAction::AddTest { options, id: None },
            };
            report("Added test", edit(ctx, action).await?);
        }
        TestCommands::Update { group, id, title } => {
            let patch = TestPatch { group_id: group, id, title: Some(title) };
            edit(ctx, SuiteAction::UpdateTest(patch)).await?;
            report("Updated test", None);
        }
        TestCommands::Remove { group, id } => {
            edit(ctx, SuiteAction::RemoveTest(TestRef { group_id: group, id })).await?;
            report("Removed test", None);
        }
        TestCommands::Clone { group, id } => {
            let created = edit(ctx, SuiteAction::CloneTest(TestRef { group_id: group, id })).await?;
            report("Cloned test as", created);
        }
    }
    Ok(())
}

pub async fn execute_command(cmd: CommandCommands, ctx: &Context) -> Result<()> {
    match cmd {
        CommandCommands::Add { group, test, method, target, params, place } => {
            let options = CommandOptions {
                group_id: group,
                test_id: test,
                target,
                method,
                params: param_map(params),
            };
            let action = match place.position() {
                Some(position) => {
                    SuiteAction::InsertAdjacentCommand { options, position, id: None }
                }
                None => SuiteAction::AddCommand { options, id: None },
            };
            report("Added command", edit(ctx, action).await?);
        }
        CommandCommands::Update { group, test, id, method, target, params } => {
            let patch = CommandPatch {
                group_id: group,
                test_id: test,
                id,
                target,
                method,
                params: (!params.is_empty()).then(|| param_map(params)),
                failure: None,
            };
            edit(ctx, SuiteAction::UpdateCommand(patch)).await?;
            report("Updated command", None);
        }
        CommandCommands::Remove { group, test, id } => {
            let command = CommandRef { group_id: group, test_id: test, id };
            edit(ctx, SuiteAction::RemoveCommand(command)).await?;
            report("Removed command", None);
        }
        CommandCommands::Clone { group, test, id } => {
            let command = CommandRef { group_id: group, test_id: test, id };
            report("Cloned command as", edit(ctx, SuiteAction::CloneCommand(command)).await?);
        }
    }
    Ok(())
}
