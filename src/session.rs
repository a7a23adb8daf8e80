//! One user's chat session: uploaded files, the index built from them and the
//! chat transcript.
//!
//! The session is a plain value owned by its caller. Every operation takes
//! `&mut self`, so interactions are serialized by construction.
//!
//! Staleness is detected by filename-set equality: re-uploading the same names
//! keeps the index even when the file contents changed.

use crate::doc_processor::{self, FileKind, FilePreview, LoadError, SkippedFile};
use crate::index::{Answer, DocumentIndex, IndexBuilder, IndexError};
use crate::llm::StreamChunk;
use crate::transcript::{self, ChatMessage, Role, Transcript};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NoFiles,
    FilesUploadedUnindexed,
    Ready,
}

/// A file as received from the user
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, keeping only its file name
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            bytes: fs::read(path)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub stored: Vec<StoredFile>,
    /// Stored files that indexing will ignore
    pub unindexable: Vec<String>,
    /// The file set changed: transcript cleared, index dropped
    pub index_invalidated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    Answered(Answer),
    /// No usable index; the user must rebuild first
    IndexRequired,
    EmptyQuestion,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
    #[error("No chat history available")]
    EmptyTranscript,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reduce an uploaded name to a bare file name inside the session folder
fn sanitize_file_name(name: &str) -> Result<String, SessionError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(SessionError::InvalidFileName(name.to_string()));
    }
    Ok(base.to_string())
}

pub struct Session {
    id: Uuid,
    upload_dir: PathBuf,
    /// Recorded upload, in upload order without duplicates
    uploaded: Vec<String>,
    index: Option<DocumentIndex>,
    transcript: Transcript,
    builder: IndexBuilder,
}

impl Session {
    /// Start an empty session storing uploads under `<uploads_root>/<session id>/`
    pub fn new(uploads_root: &Path, builder: IndexBuilder) -> Self {
        let id = Uuid::new_v4();
        let upload_dir = uploads_root.join(id.to_string());
        tracing::info!(session = %id, dir = %upload_dir.display(), "session started");
        Self {
            id,
            upload_dir,
            uploaded: Vec::new(),
            index: None,
            transcript: Transcript::default(),
            builder,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn state(&self) -> SessionState {
        if self.index.is_some() {
            SessionState::Ready
        } else if self.uploaded.is_empty() {
            SessionState::NoFiles
        } else {
            SessionState::FilesUploadedUnindexed
        }
    }

    pub fn uploaded_files(&self) -> &[String] {
        &self.uploaded
    }

    pub fn index(&self) -> Option<&DocumentIndex> {
        self.index.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Store files in the session folder and record the new file set.
    ///
    /// A set different from the recorded one clears the transcript and drops
    /// the index. An empty upload does nothing.
    pub fn upload(&mut self, files: Vec<UploadedFile>) -> Result<UploadOutcome, SessionError> {
        if files.is_empty() {
            return Ok(UploadOutcome::default());
        }

        let mut named = Vec::with_capacity(files.len());
        for file in files {
            named.push((sanitize_file_name(&file.name)?, file.bytes));
        }

        fs::create_dir_all(&self.upload_dir)?;

        // Staged copies move into place only once every write has succeeded
        let mut staged: Vec<PathBuf> = Vec::new();
        for (name, bytes) in &named {
            let part = self.upload_dir.join(format!(".{}.part", name));
            if let Err(e) = fs::write(&part, bytes) {
                for path in staged.iter().chain(std::iter::once(&part)) {
                    let _ = fs::remove_file(path);
                }
                return Err(e.into());
            }
            if !staged.contains(&part) {
                staged.push(part);
            }
        }

        let mut outcome = UploadOutcome::default();
        let mut names: Vec<String> = Vec::new();
        for (name, bytes) in named {
            let path = self.upload_dir.join(&name);
            if !names.contains(&name) {
                fs::rename(self.upload_dir.join(format!(".{}.part", name)), &path)?;
            }
            if FileKind::from_name(&name).is_none() && !outcome.unindexable.contains(&name) {
                outcome.unindexable.push(name.clone());
            }
            outcome.stored.push(StoredFile {
                name: name.clone(),
                path,
                size: bytes.len() as u64,
            });
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let new_set: BTreeSet<&String> = names.iter().collect();
        let old_set: BTreeSet<&String> = self.uploaded.iter().collect();
        if new_set != old_set {
            tracing::warn!(
                session = %self.id,
                files = names.len(),
                "new files uploaded; rebuild the index"
            );
            self.uploaded = names;
            self.transcript.clear();
            self.index = None;
            outcome.index_invalidated = true;
        } else {
            tracing::info!(session = %self.id, "re-uploaded the same files");
        }

        Ok(outcome)
    }

    /// Load every file in the session folder and build a fresh index.
    ///
    /// The current index is dropped first, so a failed build leaves the
    /// session in [`SessionState::FilesUploadedUnindexed`].
    pub async fn rebuild_index(&mut self) -> Result<RebuildReport, SessionError> {
        if self.uploaded.is_empty() {
            return Err(SessionError::NoFiles);
        }
        self.index = None;

        let report = doc_processor::load_all_documents(&self.upload_dir)?;
        let index = self.builder.build(&report.documents).await?;

        let rebuilt = RebuildReport {
            documents: report.documents.len(),
            chunks: index.chunk_count(),
            skipped: report.skipped,
        };
        self.index = Some(index);
        tracing::info!(session = %self.id, chunks = rebuilt.chunks, "index ready");
        Ok(rebuilt)
    }

    fn guard_question(&self, question: &str) -> Option<AskOutcome> {
        if self.index.is_none() {
            return Some(AskOutcome::IndexRequired);
        }
        if question.trim().is_empty() {
            return Some(AskOutcome::EmptyQuestion);
        }
        None
    }

    /// Ask a question. Only answered in [`SessionState::Ready`]; otherwise
    /// nothing is recorded and no provider is called.
    pub async fn ask(&mut self, question: &str) -> Result<AskOutcome, SessionError> {
        if let Some(outcome) = self.guard_question(question) {
            return Ok(outcome);
        }
        let Some(index) = self.index.as_ref() else {
            return Ok(AskOutcome::IndexRequired);
        };

        let asked_at = Local::now();
        let answer = index.query(question).await?;
        self.record_exchange(question, asked_at, &answer);
        Ok(AskOutcome::Answered(answer))
    }

    /// Like [`ask`](Self::ask), streaming the answer to `on_chunk`
    pub async fn ask_streaming(
        &mut self,
        question: &str,
        on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<AskOutcome, SessionError> {
        if let Some(outcome) = self.guard_question(question) {
            return Ok(outcome);
        }
        let Some(index) = self.index.as_ref() else {
            return Ok(AskOutcome::IndexRequired);
        };

        let asked_at = Local::now();
        let answer = index.query_streaming(question, on_chunk).await?;
        self.record_exchange(question, asked_at, &answer);
        Ok(AskOutcome::Answered(answer))
    }

    fn record_exchange(&mut self, question: &str, asked_at: chrono::DateTime<Local>, answer: &Answer) {
        self.transcript.push_exchange(
            ChatMessage::new(Role::User, question, asked_at),
            ChatMessage::new(Role::Assistant, answer.text.clone(), Local::now()),
        );
        tracing::info!(
            session = %self.id,
            sources = answer.sources.len(),
            messages = self.transcript.len(),
            "answered question"
        );
    }

    /// Forget files, index and transcript, and delete the session folder
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.uploaded.clear();
        self.index = None;
        self.transcript.clear();
        remove_dir_if_exists(&self.upload_dir)?;
        tracing::info!(session = %self.id, "session reset");
        Ok(())
    }

    /// End the session and delete its uploads
    pub fn close(self) -> Result<(), SessionError> {
        remove_dir_if_exists(&self.upload_dir)?;
        tracing::info!(session = %self.id, "session closed");
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, SessionError> {
        if self.transcript.is_empty() {
            return Err(SessionError::EmptyTranscript);
        }
        Ok(transcript::export_json(self.transcript.messages())?)
    }

    pub fn export_text(&self) -> Result<String, SessionError> {
        if self.transcript.is_empty() {
            return Err(SessionError::EmptyTranscript);
        }
        Ok(transcript::export_text(self.transcript.messages()))
    }

    /// Preview every recorded file, in upload order
    pub fn preview(&self) -> Result<Vec<FilePreview>, SessionError> {
        self.uploaded
            .iter()
            .map(|name| {
                doc_processor::preview_file(&self.upload_dir.join(name)).map_err(SessionError::from)
            })
            .collect()
    }
}

fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
