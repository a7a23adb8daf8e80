use super::ExportFormat;
use crate::llm::StreamChunk;
use crate::session::{AskOutcome, Session};
use crate::transcript::{JSON_EXPORT_FILE, TEXT_EXPORT_FILE};
use anyhow::Context;
use std::io::Write;
use std::path::Path;

pub const REBUILD_REQUIRED: &str = "Please upload files and rebuild the index (/rebuild) first.";

/// Ask a question, streaming the answer to stdout as it arrives
pub async fn ask(session: &mut Session, question: &str) -> anyhow::Result<String> {
    let print_delta = |chunk: StreamChunk| {
        let mut out = std::io::stdout();
        if chunk.done {
            let _ = writeln!(out);
        } else {
            let _ = write!(out, "{}", chunk.delta);
        }
        let _ = out.flush();
    };

    let outcome = session.ask_streaming(question, &print_delta).await?;
    Ok(match outcome {
        AskOutcome::Answered(answer) => {
            let mut sources: Vec<&str> = Vec::new();
            for s in &answer.sources {
                if !sources.contains(&s.source.as_str()) {
                    sources.push(&s.source);
                }
            }
            if sources.is_empty() {
                String::new()
            } else {
                format!("Sources: {}", sources.join(", "))
            }
        }
        AskOutcome::IndexRequired => REBUILD_REQUIRED.to_string(),
        AskOutcome::EmptyQuestion => String::new(),
    })
}

/// Write the transcript to `chat_history.json` or `chat_history.txt` in `dir`
pub fn export(session: &Session, format: ExportFormat, dir: Option<&Path>) -> anyhow::Result<String> {
    let (contents, file_name) = match format {
        ExportFormat::Json => (session.export_json()?, JSON_EXPORT_FILE),
        ExportFormat::Text => (session.export_text()?, TEXT_EXPORT_FILE),
    };

    let dir = dir.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(file_name);
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(path = %path.display(), "exported chat history");
    Ok(format!("Chat history saved to {}", path.display()))
}
