//! doc-chat: ask questions about your own PDF, DOCX and TXT files.
//!
//! # Usage
//!
//! ```bash
//! # Start an interactive session, uploading two files up front
//! doc-chat chat report.pdf notes.txt
//!
//! # Store an API key and pick models
//! doc-chat settings set gemini_api_key AIza...
//! doc-chat settings set chat_model openai/gpt-4o-mini
//! doc-chat settings list
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_chat::commands::{self, settings, Flow};
use doc_chat::{AppConfig, Database, Session};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-chat", version, about)]
struct Cli {
    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session (the default)
    Chat {
        /// Files to upload before the first prompt
        files: Vec<PathBuf>,
    },
    /// Manage stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show stored settings (API keys masked)
    List,
    /// Store a setting
    Set { key: String, value: String },
    /// Remove a stored setting
    Unset { key: String },
    /// Show configured models and the ones available with current credentials
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("doc_chat=info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("could not determine a data directory; pass --data-dir")?
            .join("doc-chat"),
    };
    let db = Database::new(&data_dir)
        .with_context(|| format!("opening settings database in {}", data_dir.display()))?;

    match cli.command.unwrap_or(Command::Chat { files: Vec::new() }) {
        Command::Settings { action } => {
            let output = match action {
                SettingsAction::List => settings::list(&db)?,
                SettingsAction::Set { key, value } => settings::set(&db, &key, &value)?,
                SettingsAction::Unset { key } => settings::unset(&db, &key)?,
                SettingsAction::Models => settings::models(&AppConfig::load(&db)?),
            };
            println!("{}", output);
            Ok(())
        }
        Command::Chat { files } => {
            let config = AppConfig::load(&db)?;
            let session = Session::new(&data_dir.join("uploads"), config.index_builder()?);
            run_session(session, files).await
        }
    }
}

async fn run_session(mut session: Session, files: Vec<PathBuf>) -> Result<()> {
    println!("Upload files with /upload, build the index with /rebuild, then ask away. /help lists commands.");

    if !files.is_empty() {
        match commands::knowledge::upload(&mut session, &files) {
            Ok(output) => println!("{}", output),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match commands::execute(&mut session, command).await {
            Ok(Flow::Continue(output)) => {
                if !output.is_empty() {
                    println!("{}", output);
                }
            }
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    session.close()?;
    Ok(())
}
