//! Error types for the SEO agent.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Content generation errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Generation response missing field: {0}")]
    MissingField(&'static str),

    #[error("Generation returned empty content")]
    Empty,
}

/// Image acquisition errors.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("Image provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Image provider {provider} returned no results for {query}")]
    NoResults { provider: String, query: String },
}

/// Publish webhook errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publish webhook URL is not configured")]
    NotConfigured,

    #[error("Publish webhook timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Publish webhook request failed: {0}")]
    RequestFailed(String),

    #[error("Publish webhook returned HTTP {status}")]
    Status { status: u16 },
}

/// Knowledge-collection errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Keyword {id} has unreadable pending questions: {reason}")]
    CorruptQuestions { id: Uuid, reason: String },

    #[error("Keyword {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Keyword {id} changed state concurrently (expected {expected})")]
    Conflict { id: Uuid, expected: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
