//! Suite Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use super::Context;
use crate::output::{print_json, print_success, print_warning, OutputFormat};
use crate::store::{Action, SuitePatch};
use puppetry_common::Suite;

#[derive(Subcommand)]
pub enum SuiteCommands {
    /// Create an empty suite and open it
    Create {
        /// File name, normalized to lowercase-dashed `.json`
        filename: String,

        /// Suite title
        #[arg(short, long)]
        title: String,
    },

    /// Open a suite of the current project
    Open {
        /// Suite file name
        filename: String,
    },

    /// Print the open suite
    Show,

    /// Save the open suite, optionally under another name
    Save {
        #[arg(long = "as")]
        save_as: Option<String>,
    },

    /// Change the title of the open suite
    Title {
        title: String,
    },

    /// Clear recorded failures of every command
    ResetFailures,

    /// Delete a suite file
    Remove {
        /// Suite file name
        filename: String,
    },
}

fn print_tree(suite: &Suite) {
    println!("{} {}", suite.title.bold(), format!("({})", suite.filename).dimmed());
    if let Some(saved_at) = suite.saved_at {
        println!("  Saved:   {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if suite.modified {
        println!("  {}", "unsaved changes".yellow());
    }

    println!();
    println!("{}", "Targets".bold());
    if suite.targets.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for target in suite.targets.values() {
        println!("  {} {} {}", target.id.dimmed(), target.target.cyan(), target.selector);
    }

    println!();
    println!("{}", "Groups".bold());
    if suite.groups.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for group in suite.groups.values() {
        println!("  {} {}", group.id.dimmed(), group.title);
        for test in group.tests.values() {
            println!("    {} {}", test.id.dimmed(), test.title);
            for command in test.commands.values() {
                let params = if command.params.is_empty() {
                    String::new()
                } else {
                    serde_json::to_string(&command.params).unwrap_or_default()
                };
                let line = format!("{}.{} {}", command.target, command.method, params);
                if command.failure.is_empty() {
                    println!("      {} {}", command.id.dimmed(), line);
                } else {
                    let failure = format!("✗ {}", command.failure).red();
                    println!("      {} {} {}", command.id.dimmed(), line, failure);
                }
            }
        }
    }
}

pub async fn execute(cmd: SuiteCommands, ctx: &Context) -> Result<()> {
    let editor = &ctx.editor;
    match cmd {
        SuiteCommands::Create { filename, title } => {
            ctx.open_project().await?;
            editor.dismiss_error().await?;
            let Some(filename) = editor.create_suite(&filename, &title).await? else {
                return ctx.check_banner();
            };
            ctx.check_banner()?;
            print_success(&format!("Suite '{}' created as {}", title, filename));
        }

        SuiteCommands::Open { filename } => {
            ctx.open_project().await?;
            editor.dismiss_error().await?;
            if editor.open_suite_file(&filename).await?.is_none() {
                return ctx.check_banner();
            }
            print_success(&format!("Opened {}", filename));
        }

        SuiteCommands::Show => {
            let state = ctx.open_suite().await?;
            match ctx.format {
                OutputFormat::Json => print_json(&state.suite),
                _ => print_tree(&state.suite),
            }
        }

        SuiteCommands::Save { save_as } => {
            ctx.open_suite().await?;
            let Some(saved) = editor.save_suite(save_as.as_deref()).await? else {
                return ctx.check_banner();
            };
            print_success(&format!("Saved {}", saved.filename));
        }

        SuiteCommands::Title { title } => {
            if title.trim().is_empty() {
                bail!("Title must not be empty");
            }
            ctx.open_suite().await?;
            editor
                .store()
                .dispatch(Action::UpdateSuite(SuitePatch {
                    title: Some(title.clone()),
                    ..Default::default()
                }))
                .await?;
            ctx.save_suite().await?;
            print_success(&format!("Suite title set to '{}'", title));
        }

        SuiteCommands::ResetFailures => {
            ctx.open_suite().await?;
            let cleared = editor.reset_command_failures().await?;
            if cleared == 0 {
                print_warning("No command failures recorded");
                return Ok(());
            }
            ctx.save_suite().await?;
            print_success(&format!("Cleared {} command failure(s)", cleared));
        }

        SuiteCommands::Remove { filename } => {
            let state = ctx.open_project().await?;
            if state.suite.filename == filename {
                print_warning(&format!("{} is the open suite", filename));
            }
            editor.remove_suite(&filename).await?;
            editor.load_project_files(None).await?;
            print_success(&format!("Removed {}", filename));
        }
    }

    Ok(())
}
