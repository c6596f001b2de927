//! SEO agent: conversational campaign management with scheduled content generation.

pub mod agent;
pub mod campaign;
pub mod channels;
pub mod config;
pub mod content;
pub mod error;
pub mod images;
pub mod intent;
pub mod knowledge;
pub mod llm;
pub mod publish;
pub mod scheduler;
pub mod store;
