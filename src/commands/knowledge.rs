use crate::doc_processor::FilePreview;
use crate::session::{Session, SessionState, UploadedFile};
use anyhow::Context;
use std::path::PathBuf;

/// Read local files and upload them into the session
pub fn upload(session: &mut Session, paths: &[PathBuf]) -> anyhow::Result<String> {
    let files = paths
        .iter()
        .map(|path| {
            UploadedFile::from_path(path).with_context(|| format!("reading {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let outcome = session.upload(files)?;

    let mut lines = vec![format!("Stored {} file(s).", outcome.stored.len())];
    if !outcome.unindexable.is_empty() {
        lines.push(format!(
            "Not indexable (only PDF, DOCX, TXT): {}",
            outcome.unindexable.join(", ")
        ));
    }
    if outcome.index_invalidated {
        lines.push("New files uploaded. Please rebuild the index with /rebuild.".to_string());
    }
    Ok(lines.join("\n"))
}

pub async fn rebuild(session: &mut Session) -> anyhow::Result<String> {
    let report = session.rebuild_index().await?;

    let mut lines = vec![format!(
        "Index built from {} document(s), {} chunk(s). You can now chat.",
        report.documents, report.chunks
    )];
    for skipped in &report.skipped {
        lines.push(format!("Skipped {}: {}", skipped.name, skipped.reason));
    }
    Ok(lines.join("\n"))
}

pub fn reset(session: &mut Session) -> anyhow::Result<String> {
    session.reset()?;
    Ok("Cleared files, index and chat history.".to_string())
}

pub fn status(session: &Session) -> String {
    let state = match session.state() {
        SessionState::NoFiles => "no files uploaded",
        SessionState::FilesUploadedUnindexed => "files uploaded, index not built",
        SessionState::Ready => "ready",
    };

    let mut lines = vec![
        format!("Session {}: {}", session.id(), state),
        format!("Files: {}", session.uploaded_files().join(", ")),
        format!("Messages: {}", session.transcript().len()),
    ];
    if let Some(index) = session.index() {
        lines.push(format!("Indexed chunks: {}", index.chunk_count()));
    }
    lines.join("\n")
}

pub fn preview(session: &Session) -> anyhow::Result<String> {
    let previews = session.preview()?;
    if previews.is_empty() {
        return Ok("No files uploaded.".to_string());
    }

    let mut out = String::new();
    for preview in previews {
        match preview {
            FilePreview::Pdf {
                name,
                pages,
                truncated,
            } => {
                out.push_str(&format!("== {} ==\n", name));
                for page in pages {
                    out.push_str(&format!("-- Page {} --\n{}\n", page.number, page.text));
                }
                if truncated {
                    out.push_str("(Preview limited to 3 pages.)\n");
                }
            }
            FilePreview::Unsupported { name } => {
                out.push_str(&format!("== {} == (preview not supported yet)\n", name));
            }
        }
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, IndexOptions};
    use crate::test_support::{FakeGenerator, KeywordEmbedder};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_rebuild_status_reset() {
        let root = tempdir().unwrap();
        let inputs = tempdir().unwrap();
        let notes = inputs.path().join("notes.txt");
        let deck = inputs.path().join("deck.pptx");
        std::fs::write(&notes, "meeting notes about the budget").unwrap();
        std::fs::write(&deck, "binary").unwrap();

        let mut session = Session::new(
            root.path(),
            IndexBuilder::new(
                Arc::new(KeywordEmbedder::default()),
                Arc::new(FakeGenerator::answering("ok")),
                IndexOptions::default(),
            ),
        );

        let message = upload(&mut session, &[notes, deck]).unwrap();
        assert!(message.starts_with("Stored 2 file(s)."));
        assert!(message.contains("Not indexable (only PDF, DOCX, TXT): deck.pptx"));
        assert!(message.contains("/rebuild"));

        let message = rebuild(&mut session).await.unwrap();
        assert!(message.starts_with("Index built from 1 document(s), 1 chunk(s)."));
        assert!(message.contains("Skipped deck.pptx"));
        assert!(status(&session).contains(": ready"));

        let message = preview(&session).unwrap();
        assert!(message.contains("== notes.txt == (preview not supported yet)"));

        reset(&mut session).unwrap();
        assert!(status(&session).contains("no files uploaded"));
        assert_eq!(preview(&session).unwrap(), "No files uploaded.");
    }

    #[test]
    fn test_upload_missing_file() {
        let root = tempdir().unwrap();
        let mut session = Session::new(
            root.path(),
            IndexBuilder::new(
                Arc::new(KeywordEmbedder::default()),
                Arc::new(FakeGenerator::answering("ok")),
                IndexOptions::default(),
            ),
        );
        let err = upload(&mut session, &[root.path().join("missing.pdf")]).unwrap_err();
        assert!(err.to_string().contains("missing.pdf"));
        assert_eq!(session.state(), SessionState::NoFiles);
    }
}
