//! In-memory retrieval index over uploaded documents.
//!
//! Building chunks every document, embeds the chunks in batches and keeps the
//! vectors in memory. Querying embeds the question, picks the closest chunks
//! by cosine similarity and asks the generator for a grounded answer.

pub mod prompt;

use crate::doc_processor::{chunk_text, Document};
use crate::embedding::{search_similar, Embedder};
use crate::llm::{Generator, LlmError, StreamChunk};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Chunks sent per embedding request
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            top_k: 3,
            batch_size: 20,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Documents are empty or could not be parsed")]
    NoContent,
    #[error("embedding provider returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Builds a [`DocumentIndex`] from documents using the configured providers
#[derive(Clone)]
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    options: IndexOptions,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: IndexOptions,
    ) -> Self {
        Self {
            embedder,
            generator,
            options,
        }
    }

    /// Chunk and embed every document. Always a full rebuild.
    pub async fn build(&self, documents: &[Document]) -> Result<DocumentIndex, IndexError> {
        let mut pending: Vec<(String, usize, String)> = Vec::new();
        for doc in documents {
            let chunks = chunk_text(&doc.text, self.options.chunk_size, self.options.chunk_overlap);
            for (i, content) in chunks.into_iter().enumerate() {
                pending.push((doc.source.clone(), i, content));
            }
        }
        if pending.is_empty() {
            return Err(IndexError::NoContent);
        }

        let mut chunks = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(_, _, c)| c.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != texts.len() {
                return Err(IndexError::EmbeddingCount {
                    expected: texts.len(),
                    actual: embeddings.len(),
                });
            }

            for ((source, chunk_index, content), embedding) in batch.iter().zip(embeddings) {
                chunks.push(IndexedChunk {
                    source: source.clone(),
                    chunk_index: *chunk_index,
                    content: content.clone(),
                    embedding,
                });
            }
        }

        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "built document index"
        );

        Ok(DocumentIndex {
            chunks,
            embedder: Arc::clone(&self.embedder),
            generator: Arc::clone(&self.generator),
            top_k: self.options.top_k,
        })
    }
}

/// A built, queryable index. Owned by exactly one session.
pub struct DocumentIndex {
    chunks: Vec<IndexedChunk>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("chunks", &self.chunks.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl DocumentIndex {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Distinct source file names, in index order
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for chunk in &self.chunks {
            if !sources.contains(&chunk.source.as_str()) {
                sources.push(&chunk.source);
            }
        }
        sources
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<(&IndexedChunk, f32)>, IndexError> {
        let embeddings = self.embedder.embed(&[question.to_string()]).await?;
        let actual = embeddings.len();
        let query = embeddings
            .into_iter()
            .next()
            .ok_or(IndexError::EmbeddingCount { expected: 1, actual })?;

        Ok(search_similar(&query, &self.chunks, |c| c.embedding.as_slice(), self.top_k))
    }

    fn source_refs(hits: &[(&IndexedChunk, f32)]) -> Vec<SourceRef> {
        hits.iter()
            .map(|(chunk, score)| SourceRef {
                source: chunk.source.clone(),
                chunk_index: chunk.chunk_index,
                score: *score,
            })
            .collect()
    }

    /// Answer a question from the indexed documents
    pub async fn query(&self, question: &str) -> Result<Answer, IndexError> {
        let hits = self.retrieve(question).await?;
        let messages = prompt::build_messages(question, &hits);
        let text = self.generator.generate(&messages).await?;

        Ok(Answer {
            text,
            sources: Self::source_refs(&hits),
        })
    }

    /// Like [`query`](Self::query), streaming answer deltas to `on_chunk`
    pub async fn query_streaming(
        &self,
        question: &str,
        on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<Answer, IndexError> {
        let hits = self.retrieve(question).await?;
        let messages = prompt::build_messages(question, &hits);
        let text = self.generator.generate_stream(&messages, on_chunk).await?;

        Ok(Answer {
            text,
            sources: Self::source_refs(&hits),
        })
    }
}
