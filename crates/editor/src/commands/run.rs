//! Test execution, runtime install and host windows

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::Context;
use crate::output::{print_item, print_json, print_list, print_success, print_warning, spinner};
use crate::output::{OutputFormat, TableDisplay};
use puppetry_common::FileResult;

#[derive(Args)]
pub struct RunArgs {
    /// Test files inside the runtime-test directory
    #[arg(required = true)]
    pub files: Vec<String>,
}

#[derive(Subcommand)]
pub enum RuntimeCommands {
    /// Show whether the runtime is installed
    Status,

    /// Install the browser automation runtime through the host
    Install,
}

#[derive(Args)]
pub struct BrowseArgs {
    /// Pick a file instead of a directory
    #[arg(long)]
    pub file: bool,

    /// Directory the file picker starts in
    #[arg(long)]
    pub default_path: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct FileResultDisplay {
    pub file: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: String,
}

impl From<&FileResult> for FileResultDisplay {
    fn from(result: &FileResult) -> Self {
        Self {
            file: result.file.clone(),
            success: result.success,
            duration_ms: result.duration_ms,
            error: result.error.clone().unwrap_or_default(),
        }
    }
}

impl TableDisplay for FileResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["File", "Result", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let result = if self.success {
            "✓ passed".green().to_string()
        } else {
            "✗ failed".red().to_string()
        };
        vec![
            self.file.clone(),
            result,
            format!("{}ms", self.duration_ms),
            self.error.lines().next().unwrap_or_default().to_string(),
        ]
    }
}

#[derive(Serialize)]
pub struct RuntimeStatus {
    pub directory: String,
    pub ready: bool,
}

impl TableDisplay for RuntimeStatus {
    fn headers() -> Vec<&'static str> {
        vec!["Runtime Directory", "Ready"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.directory.clone(), self.ready.to_string()]
    }
}

pub async fn execute_run(args: RunArgs, ctx: &Context) -> Result<()> {
    let editor = &ctx.editor;
    if !editor.check_runtime_test_dir_ready().await? {
        bail!("The runtime is not installed, run `puppetry runtime install` first");
    }

    let progress = spinner(format!("Running {} file(s)", args.files.len()));
    let report = editor.run_tests(args.files).await;
    progress.finish_and_clear();
    let report = report?;

    if matches!(ctx.format, OutputFormat::Json) {
        print_json(&report);
    } else {
        let rows: Vec<FileResultDisplay> =
            report.results.iter().map(FileResultDisplay::from).collect();
        print_list(&rows, ctx.format);
    }

    if let Some(error) = &report.error {
        bail!("Test run failed: {}", error);
    }
    if report.success() {
        print_success(&format!("{} passed in {}ms", report.passed, report.duration_ms));
        Ok(())
    } else {
        bail!("{} of {} file(s) failed", report.failed, report.total)
    }
}

pub async fn execute_runtime(cmd: RuntimeCommands, ctx: &Context) -> Result<()> {
    let editor = &ctx.editor;
    let directory = editor.snapshot().settings.runtime_test_directory();
    match cmd {
        RuntimeCommands::Status => {
            let ready = editor.check_runtime_test_dir_ready().await?;
            let status = RuntimeStatus { directory: directory.display().to_string(), ready };
            print_item(&status, ctx.format);
        }
        RuntimeCommands::Install => {
            let progress = spinner(format!("Installing runtime into {}", directory.display()));
            let installed = editor.install_runtime_test().await;
            progress.finish_and_clear();
            if installed? {
                print_success(&format!("Runtime installed in {}", directory.display()));
            } else {
                bail!("Install finished but {} is not usable", directory.display());
            }
        }
    }
    Ok(())
}

pub async fn execute_browse(args: BrowseArgs, ctx: &Context) -> Result<()> {
    let picked = if args.file {
        ctx.editor.browse_file(args.default_path).await?
    } else {
        ctx.editor.browse_directory().await?
    };
    match picked {
        Some(path) => println!("{}", path.display()),
        None => print_warning("Nothing selected"),
    }
    Ok(())
}

pub async fn execute_recorder(ctx: &Context) -> Result<()> {
    ctx.editor.open_recorder().await?;
    print_success("Recorder window open");
    Ok(())
}
