//! Intent parsing: free text in, typed command out.

pub mod parser;

pub use parser::{Intent, IntentKind, IntentParams, IntentParser};
