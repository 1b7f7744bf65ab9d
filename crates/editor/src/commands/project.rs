//! Project Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;

use super::Context;
use crate::output::{print_info, print_item, print_list, print_success, TableDisplay};
use puppetry_common::Project;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project in a directory
    Init {
        /// Project directory
        directory: PathBuf,

        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// Open an existing project and remember it
    Open {
        /// Project directory
        directory: PathBuf,
    },

    /// Show the current project
    Show,

    /// List suite files of the current project
    Files,

    /// Follow suite file changes until interrupted
    Watch,
}

#[derive(Serialize)]
pub struct ProjectDisplay {
    pub name: String,
    pub directory: String,
    pub last_open_suite: String,
    pub files: usize,
}

impl ProjectDisplay {
    fn new(project: &Project, files: usize) -> Self {
        Self {
            name: project.name.clone(),
            directory: project.project_directory.display().to_string(),
            last_open_suite: project.last_open_suite.clone().unwrap_or_default(),
            files,
        }
    }
}

impl TableDisplay for ProjectDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Directory", "Last Suite", "Suites"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.directory.clone(),
            self.last_open_suite.clone(),
            self.files.to_string(),
        ]
    }
}

#[derive(Serialize)]
pub struct SuiteFileDisplay {
    pub filename: String,
    pub open: bool,
}

impl TableDisplay for SuiteFileDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Open"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.filename.clone(), if self.open { "*".to_string() } else { String::new() }]
    }
}

fn file_rows(files: &[String], open: &str) -> Vec<SuiteFileDisplay> {
    files
        .iter()
        .map(|f| SuiteFileDisplay { filename: f.clone(), open: f == open })
        .collect()
}

pub async fn execute(cmd: ProjectCommands, ctx: &Context) -> Result<()> {
    let editor = &ctx.editor;
    match cmd {
        ProjectCommands::Init { directory, name } => {
            tokio::fs::create_dir_all(&directory).await?;
            let directory = directory.canonicalize()?;
            let Some(project) = editor.save_project(directory, &name).await? else {
                return ctx.check_banner();
            };
            print_success(&format!("Project '{}' created", project.name));
            let files = editor.snapshot().app.project_files.len();
            print_item(&ProjectDisplay::new(&project, files), ctx.format);
        }

        ProjectCommands::Open { directory } => {
            let directory = directory.canonicalize()?;
            let Some(project) = editor.load_project(Some(directory.clone())).await? else {
                bail!("No project in {}", directory.display());
            };
            print_success(&format!("Opened project '{}'", project.name));
            let state = editor.snapshot();
            let display = ProjectDisplay::new(&state.project, state.app.project_files.len());
            print_item(&display, ctx.format);

            if let Some(banner) = &state.app.error {
                print_info(&format!("{}: {}", banner.message, banner.description));
            }
        }

        ProjectCommands::Show => {
            let state = ctx.open_project().await?;
            let display = ProjectDisplay::new(&state.project, state.app.project_files.len());
            print_item(&display, ctx.format);
        }

        ProjectCommands::Files => {
            let state = ctx.open_project().await?;
            print_list(&file_rows(&state.app.project_files, &state.suite.filename), ctx.format);
        }

        ProjectCommands::Watch => {
            let state = ctx.open_project().await?;
            let mut updates = editor.store().watch();
            let mut files = state.app.project_files.clone();
            print_info(&format!(
                "Watching {} (Ctrl+C to stop)",
                state.project.project_directory.display()
            ));
            print_list(&file_rows(&files, &state.suite.filename), ctx.format);

            let interrupted = tokio::signal::ctrl_c();
            tokio::pin!(interrupted);
            loop {
                tokio::select! {
                    _ = &mut interrupted => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = updates.borrow_and_update().clone();
                        if state.app.project_files != files {
                            files = state.app.project_files.clone();
                            print_list(&file_rows(&files, &state.suite.filename), ctx.format);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
