//! Conversational agent: routes each message to knowledge collection or a command.

pub mod dispatcher;
pub mod responses;

pub use dispatcher::{AgentDeps, DEFAULT_SESSION, Dispatcher, DispatcherSettings};
