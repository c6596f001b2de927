//! Per-keyword knowledge collection: ask the user about a keyword before writing.

pub mod collector;
pub mod state;

pub use collector::{
    KnowledgeCollector, fallback_questions, fallback_transcript, is_skip_request,
    normalize_questions,
};
pub use state::CollectionStatus;
