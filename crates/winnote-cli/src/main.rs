//! WinNote CLI
//!
//! Command-line interface for the WinNote note store.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use winnote_core::{Config, StorageError, Store};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "winnote")]
#[command(about = "WinNote - local note storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this configuration file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Show storage status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Export the document and all notes as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a previously exported file (or a bare document)
    Import {
        /// JSON file to import
        file: PathBuf,
    },
    /// Repair invalid records and dangling references
    Clean,
    /// Move notes kept inside the document to per-note storage
    Migrate,
    /// Remove all stored data
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Create a new note
    #[command(alias = "add")]
    Create {
        /// Note title (derived from the content when omitted)
        title: Option<String>,
        /// Note body (HTML)
        #[arg(short, long)]
        content: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Folder to place the note in
        #[arg(short, long)]
        folder: Option<String>,
    },
    /// List notes
    #[command(alias = "ls")]
    List {
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Filter by folder
        #[arg(short, long)]
        folder: Option<String>,
        /// Only starred notes
        #[arg(short, long)]
        starred: bool,
    },
    /// Show a note with its content
    Show {
        /// Note ID
        id: String,
    },
    /// Edit a note
    Edit {
        /// Note ID
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New body (HTML); an empty string clears it
        #[arg(short, long)]
        content: Option<String>,
        /// Star the note
        #[arg(long, conflicts_with = "unstar")]
        star: bool,
        /// Remove the star
        #[arg(long)]
        unstar: bool,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without opening the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    let store = match Store::open_with_config(config).await {
        Ok(store) => store,
        Err(e) => {
            print_recovery_hint(&e);
            return Err(e);
        }
    };

    let result = match cli.command {
        Commands::Note { command } => handle_note_command(command, &store, &output).await,
        Commands::Status => commands::status::show(&store, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Export { output: path } => {
            commands::data::export(&store, path.as_deref(), &output).await
        }
        Commands::Import { file } => commands::data::import(&store, &file, &output).await,
        Commands::Clean => commands::data::clean(&store, &output).await,
        Commands::Migrate => commands::data::migrate(&store, &output).await,
        Commands::Clear { yes } => commands::data::clear(&store, yes, &output).await,
    };

    store.close().await;
    if let Err(ref e) = result {
        print_recovery_hint(e);
    }
    result
}

/// Print a hint when the failure came from storage and has a known fix
fn print_recovery_hint(error: &anyhow::Error) {
    let hint = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion);
    if let Some(hint) = hint {
        eprintln!("hint: {}", hint);
    }
}

async fn handle_note_command(command: NoteCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        NoteCommands::Create {
            title,
            content,
            tag,
            folder,
        } => commands::note::create(store, title, content, tag, folder, output).await,
        NoteCommands::List {
            tag,
            folder,
            starred,
        } => commands::note::list(store, tag, folder, starred, output),
        NoteCommands::Show { id } => commands::note::show(store, id, output).await,
        NoteCommands::Edit {
            id,
            title,
            content,
            star,
            unstar,
        } => {
            let starred = match (star, unstar) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::note::edit(store, id, title, content, starred, output).await
        }
        NoteCommands::Delete { id } => commands::note::delete(store, id, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
        Some(ConfigCommands::Path) => commands::config::path(config_path, output),
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins over `-v`. Logs go to the configured file when one is
/// set, otherwise to stderr so they never mix with command output.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("winnote_core={},winnote={}", level, level))
    });

    if let Some(ref log_path) = config.log_file {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file)
                    .try_init();
                return;
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", log_path.display(), e),
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
