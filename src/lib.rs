pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod session;
pub mod transcript;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use db::Database;
pub use index::{DocumentIndex, IndexBuilder, IndexOptions};
pub use session::{Session, SessionState};
