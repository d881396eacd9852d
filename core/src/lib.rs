use serde::{Deserialize, Serialize};

pub mod config;
pub mod engine;
pub mod feedback;
pub mod index;
pub mod persist;
pub mod posting;
pub mod query;
pub mod tokenizer;

pub use config::{EngineConfig, IndexConfig, LengthMetric, Normalization, RocchioConfig};
pub use engine::{QueryEngine, QueryType};
pub use index::{IndexBuilder, InvertedIndex};
pub use posting::{Posting, PostingList};
pub use query::Query;

pub type DocId = u32;
pub type Position = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub title: String,
    pub url: Option<String>,
    /// Relative path to the stored full text for snippet extraction, e.g., texts/{doc_id}.txt
    pub text_path: Option<String>,
}
