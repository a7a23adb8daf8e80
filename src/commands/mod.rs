//! Interactive session commands.
//!
//! A line starting with `/` is a command; any other non-blank line is a
//! question for the documents.

pub mod chat;
pub mod knowledge;
pub mod settings;

use crate::session::Session;
use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  /upload PATH...        store files in this session (PDF, DOCX, TXT are indexed)
  /rebuild               build the index from the uploaded files
  /status                show session state
  /preview               preview uploaded files
  /export json|txt [DIR] write the chat history to DIR (default: current directory)
  /reset                 clear files, index and chat history
  /help                  show this help
  /quit                  leave the session
Anything else is sent as a question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ask(String),
    Upload(Vec<PathBuf>),
    Rebuild,
    Reset,
    Status,
    Preview,
    Export {
        format: ExportFormat,
        dir: Option<PathBuf>,
    },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("unexpected argument for /{command}: {argument}")]
    InvalidArgument {
        command: &'static str,
        argument: String,
    },
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Ask(line.to_string())));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    let no_args = |command: &'static str, cmd: Command| match args.first() {
        None => Ok(cmd),
        Some(arg) => Err(CommandError::InvalidArgument {
            command,
            argument: arg.to_string(),
        }),
    };

    let command = match name {
        "upload" => {
            if args.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "upload",
                    argument: "at least one file path",
                });
            }
            Command::Upload(args.iter().map(PathBuf::from).collect())
        }
        "rebuild" => no_args("rebuild", Command::Rebuild)?,
        "reset" => no_args("reset", Command::Reset)?,
        "status" => no_args("status", Command::Status)?,
        "preview" => no_args("preview", Command::Preview)?,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "export" => {
            let format = match args.first() {
                Some(&"json") => ExportFormat::Json,
                Some(&"txt") | Some(&"text") => ExportFormat::Text,
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        command: "export",
                        argument: other.to_string(),
                    })
                }
                None => {
                    return Err(CommandError::MissingArgument {
                        command: "export",
                        argument: "a format (json or txt)",
                    })
                }
            };
            if let Some(extra) = args.get(2) {
                return Err(CommandError::InvalidArgument {
                    command: "export",
                    argument: extra.to_string(),
                });
            }
            Command::Export {
                format,
                dir: args.get(1).map(PathBuf::from),
            }
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// What the REPL should do after a command
#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue(String),
    Quit,
}

/// Run a parsed command against the session
pub async fn execute(session: &mut Session, command: Command) -> anyhow::Result<Flow> {
    let output = match command {
        Command::Ask(question) => chat::ask(session, &question).await?,
        Command::Upload(paths) => knowledge::upload(session, &paths)?,
        Command::Rebuild => knowledge::rebuild(session).await?,
        Command::Reset => knowledge::reset(session)?,
        Command::Status => knowledge::status(session),
        Command::Preview => knowledge::preview(session)?,
        Command::Export { format, dir } => chat::export(session, format, dir.as_deref())?,
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Flow::Quit),
    };
    Ok(Flow::Continue(output))
}
