//! Match environment
//!
//! The buffers a rule runs against, resolved by context name (for example
//! `HTTP_METHOD` or `HTTP_REQUEST_BODY`), plus the default context for rules
//! compiled without an explicit `part`, and the per-connection state table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::state::StateTable;

/// The active buffers and connection state for one match attempt
#[derive(Default)]
pub struct MatchEnv {
    buffers: HashMap<String, Vec<u8>>,
    default_context: Option<String>,
    state_table: Arc<StateTable>,
}

impl MatchEnv {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context buffer
    #[must_use]
    pub fn with_buffer(mut self, ctx: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.buffers.insert(ctx.into(), data.into());
        self
    }

    /// Set the default context used by keywords without a `part` attribute
    #[must_use]
    pub fn with_default_context(mut self, ctx: impl Into<String>) -> Self {
        self.default_context = Some(ctx.into());
        self
    }

    /// Share a per-connection state table
    #[must_use]
    pub fn with_state_table(mut self, table: Arc<StateTable>) -> Self {
        self.state_table = table;
        self
    }

    /// Look up a context buffer
    pub fn buffer(&self, ctx: &str) -> Option<&[u8]> {
        self.buffers.get(ctx).map(Vec::as_slice)
    }

    /// Resolve the context a keyword should run against
    ///
    /// An explicit `part` wins; otherwise the environment's default context.
    /// `None` means the keyword has no buffer to run on.
    pub(crate) fn resolve_context<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.default_context.as_deref())
    }

    /// The per-connection state table
    pub fn state_table(&self) -> &StateTable {
        &self.state_table
    }

    /// Total size of all registered buffers
    pub fn total_buffer_size(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }
}
