use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Pages shown by a PDF preview
pub const PREVIEW_PAGE_LIMIT: usize = 3;
/// Characters shown per previewed page
pub const PREVIEW_CHAR_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
}

impl FileKind {
    /// Indexable kind for a file name, if any. Extensions compare case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }
}

/// Normalized text extracted from one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub source: String,
    pub kind: FileKind,
    pub text: String,
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Result of loading a folder: the documents plus every file that was left out
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF parse error in {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("DOCX parse error in {path}: {message}")]
    Docx { path: PathBuf, message: String },
    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse every file in `folder` into documents.
///
/// Entries are visited in name order. Directories are ignored, files with an
/// unsupported extension are reported in [`LoadReport::skipped`]. A file that
/// fails to parse aborts the whole load.
pub fn load_all_documents(folder: &Path) -> Result<LoadReport, LoadError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(folder).map_err(io_error(folder))? {
        let entry = entry.map_err(io_error(folder))?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut report = LoadReport::default();
    for path in paths {
        let name = file_name(&path);
        match FileKind::from_name(&name) {
            Some(kind) => report.documents.push(parse_file(&path, kind)?),
            None => {
                tracing::debug!(file = %name, "skipping unsupported file");
                report.skipped.push(SkippedFile {
                    reason: format!("unsupported file type: {}", name),
                    name,
                });
            }
        }
    }

    tracing::info!(
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        folder = %folder.display(),
        "loaded documents"
    );
    Ok(report)
}

/// Parse a single file of a known kind
pub fn parse_file(path: &Path, kind: FileKind) -> Result<Document, LoadError> {
    let source = file_name(path);

    match kind {
        FileKind::Txt => {
            let bytes = fs::read(path).map_err(io_error(path))?;
            let text = String::from_utf8(bytes).map_err(|_| LoadError::Encoding {
                path: path.to_path_buf(),
            })?;
            Ok(Document {
                source,
                kind,
                text,
                page_count: None,
            })
        }
        FileKind::Pdf => {
            let bytes = fs::read(path).map_err(io_error(path))?;
            let text =
                pdf_extract::extract_text_from_mem(&bytes).map_err(|e| LoadError::Pdf {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            let page_count = lopdf::Document::load_mem(&bytes)
                .ok()
                .map(|doc| doc.get_pages().len() as u32);
            Ok(Document {
                source,
                kind,
                text,
                page_count,
            })
        }
        FileKind::Docx => {
            let bytes = fs::read(path).map_err(io_error(path))?;
            let text = extract_docx_text(&bytes).map_err(|message| LoadError::Docx {
                path: path.to_path_buf(),
                message,
            })?;
            Ok(Document {
                source,
                kind,
                text,
                page_count: None,
            })
        }
    }
}

/// Text of a DOCX file, one line per paragraph. Hyperlink text is kept and
/// table rows become tab-separated lines.
fn extract_docx_text(data: &[u8]) -> Result<String, String> {
    let doc = docx_rs::read_docx(data).map_err(|e| e.to_string())?;

    let mut text = String::new();
    for child in &doc.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(p) => {
                push_paragraph_text(&p.children, &mut text);
                text.push('\n');
            }
            docx_rs::DocumentChild::Table(table) => push_table_text(table, &mut text),
            _ => {}
        }
    }
    Ok(text)
}

fn push_paragraph_text(children: &[docx_rs::ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for child in &run.children {
                    match child {
                        docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                        docx_rs::RunChild::Tab(_) => text.push('\t'),
                        _ => {}
                    }
                }
            }
            docx_rs::ParagraphChild::Hyperlink(link) => push_paragraph_text(&link.children, text),
            _ => {}
        }
    }
}

fn push_table_text(table: &docx_rs::Table, text: &mut String) {
    for docx_rs::TableChild::TableRow(row) in &table.rows {
        let mut cells = Vec::with_capacity(row.cells.len());
        for docx_rs::TableRowChild::TableCell(cell) in &row.cells {
            let mut cell_text = String::new();
            for content in &cell.children {
                match content {
                    docx_rs::TableCellContent::Paragraph(p) => {
                        if !cell_text.is_empty() {
                            cell_text.push(' ');
                        }
                        push_paragraph_text(&p.children, &mut cell_text);
                    }
                    docx_rs::TableCellContent::Table(nested) => push_table_text(nested, text),
                    _ => {}
                }
            }
            cells.push(cell_text);
        }
        text.push_str(&cells.join("\t"));
        text.push('\n');
    }
}

/// Split text into overlapping chunks for embedding
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePreview {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilePreview {
    Pdf {
        name: String,
        pages: Vec<PagePreview>,
        /// The document has more pages than were previewed
        truncated: bool,
    },
    Unsupported {
        name: String,
    },
}

/// Preview the first pages of a stored file. Only PDFs have a preview.
pub fn preview_file(path: &Path) -> Result<FilePreview, LoadError> {
    let name = file_name(path);
    if FileKind::from_name(&name) != Some(FileKind::Pdf) {
        return Ok(FilePreview::Unsupported { name });
    }

    let bytes = fs::read(path).map_err(io_error(path))?;
    let doc = lopdf::Document::load_mem(&bytes).map_err(|e| LoadError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let mut pages = Vec::new();
    for &number in page_numbers.iter().take(PREVIEW_PAGE_LIMIT) {
        let text = doc.extract_text(&[number]).unwrap_or_default();
        if let Some(text) = preview_text(&text, PREVIEW_CHAR_LIMIT) {
            pages.push(PagePreview { number, text });
        }
    }

    Ok(FilePreview::Pdf {
        name,
        pages,
        truncated: page_numbers.len() > PREVIEW_PAGE_LIMIT,
    })
}

/// Trimmed text cut to `limit` characters, or `None` when blank
fn preview_text(text: &str, limit: usize) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(limit).collect())
    }
}
