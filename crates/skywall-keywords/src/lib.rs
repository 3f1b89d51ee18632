//! # Skywall Keywords
//!
//! Keyword rule engine: compiles textual rule strings into an executable
//! match pipeline over typed byte buffers.
//!
//! A rule is a semicolon-terminated sequence of clauses, each clause a
//! keyword with attributes:
//!
//! ```text
//! data:"Login",nocase,part HTTP_REQUEST_BODY; compare:v,=,10;
//! ```
//!
//! Rules are compiled once at configuration load with [`compile_rule`] and
//! evaluated many times per request against a [`MatchEnv`] holding the active
//! context buffers. Evaluation is total: every path produces one of
//! `Match`, `NoMatch`, or `NoMatchFinal`, where `NoMatchFinal` is a strong
//! pruning signal meaning no rearrangement of the inputs can make the rule
//! succeed.
//!
//! Supported keywords: `data`, `pcre`, `length`, `byte_extract`, `compare`,
//! `jump`, `stateop`, `no_match`.

mod attr;
mod environment;
mod keywords;
mod parser;
mod preconditions;
mod rule;
mod state;

pub use environment::MatchEnv;
pub use preconditions::Preconditions;
pub use rule::{compile_rule, VirtualRule, SCAN_YIELD_BUDGET};
pub use state::StateTable;

/// Outcome of evaluating a keyword pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// The rule matched
    Match,
    /// The rule did not match here, but other inputs could still succeed
    NoMatch,
    /// No rearrangement of the inputs can make the rule succeed
    NoMatchFinal,
}

/// Error produced while compiling a rule
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct KeywordError(pub(crate) String);

impl KeywordError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result alias for rule compilation
pub type Result<T> = std::result::Result<T, KeywordError>;
