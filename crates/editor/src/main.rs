//! Puppetry CLI - Main Entry Point
//!
//! Edits suites of a Puppetry project and drives test runs through the
//! host process.

use clap::{Parser, Subcommand};
use puppetry_editor::commands::{entity, project, run, suite, Context};
use puppetry_editor::output::{self, print_error};
use puppetry_editor::{Editor, EditorState, HostClient, SettingsStore, Store};
use std::path::PathBuf;
use tracing::debug;

/// Puppetry - browser automation test suites
#[derive(Parser)]
#[command(name = "puppetry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Host socket
    #[arg(long, env = "PUPPETRY_SOCKET", global = true)]
    socket: Option<PathBuf>,

    /// Settings file (default: ~/.puppetry/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the project
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Manage suites
    #[command(subcommand)]
    Suite(suite::SuiteCommands),

    /// Edit targets of the open suite
    #[command(subcommand)]
    Target(entity::TargetCommands),

    /// Edit groups of the open suite
    #[command(subcommand)]
    Group(entity::GroupCommands),

    /// Edit tests of the open suite
    #[command(subcommand)]
    Test(entity::TestCommands),

    /// Edit commands of the open suite
    #[command(subcommand)]
    Command(entity::CommandCommands),

    /// Run test files through the host
    Run(run::RunArgs),

    /// Browser automation runtime
    #[command(subcommand)]
    Runtime(run::RuntimeCommands),

    /// Show a picker on the host
    Browse(run::BrowseArgs),

    /// Open the recorder window on the host
    Recorder,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Puppetry CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let socket = cli.socket.unwrap_or_else(puppetry_common::default_socket_path);
    let host = match HostClient::connect(&socket).await {
        Ok(host) => Some(host),
        Err(e) => {
            debug!("{}", e);
            None
        }
    };

    let settings_path = cli.settings.unwrap_or_else(puppetry_common::default_settings_path);
    let settings = SettingsStore::new(settings_path);
    let editor = Editor::new(Store::spawn(EditorState::default()), settings, host);
    editor.load_settings().await?;
    let ctx = Context::new(editor, cli.format);

    let result = match cli.command {
        Commands::Project(cmd) => project::execute(cmd, &ctx).await,
        Commands::Suite(cmd) => suite::execute(cmd, &ctx).await,
        Commands::Target(cmd) => entity::execute_target(cmd, &ctx).await,
        Commands::Group(cmd) => entity::execute_group(cmd, &ctx).await,
        Commands::Test(cmd) => entity::execute_test(cmd, &ctx).await,
        Commands::Command(cmd) => entity::execute_command(cmd, &ctx).await,
        Commands::Run(args) => run::execute_run(args, &ctx).await,
        Commands::Runtime(cmd) => run::execute_runtime(cmd, &ctx).await,
        Commands::Browse(args) => run::execute_browse(args, &ctx).await,
        Commands::Recorder => run::execute_recorder(&ctx).await,
        Commands::Version => Ok(()),
    };

    ctx.editor.close_app().await;

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
