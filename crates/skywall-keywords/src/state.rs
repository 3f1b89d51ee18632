//! Runtime state chain
//!
//! During one match attempt the keywords thread a chain of stack-allocated
//! states: each `data`/`pcre`/`jump` match pushes a new offset for its
//! context, each `byte_extract`/`length` binding pushes a variable value.
//! Lookup walks the chain head-first, so later nodes shadow earlier ones.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::attr::VariableId;

/// State visible to a keyword at evaluation time
pub(crate) trait RuntimeState {
    /// Current offset within the named context
    fn offset(&self, ctx: &str) -> usize;
    /// Value of a bound variable
    fn variable(&self, id: VariableId) -> i64;
}

/// Base of every chain: offset 0 everywhere, no variables bound
///
/// A variable lookup reaching the sentinel is a compiler bug - numeric
/// attributes only reference variables already present in the compile-time
/// mapping.
pub(crate) struct SentinelState;

impl RuntimeState for SentinelState {
    fn offset(&self, _ctx: &str) -> usize {
        0
    }

    fn variable(&self, id: VariableId) -> i64 {
        debug_assert!(false, "Could not find the variable ID: {}", id.0);
        0
    }
}

/// Sets a new offset for one context
pub(crate) struct OffsetState<'a> {
    prev: &'a dyn RuntimeState,
    ctx: &'a str,
    offset: usize,
}

impl<'a> OffsetState<'a> {
    pub(crate) fn new(prev: &'a dyn RuntimeState, ctx: &'a str, offset: usize) -> Self {
        Self { prev, ctx, offset }
    }
}

impl RuntimeState for OffsetState<'_> {
    fn offset(&self, ctx: &str) -> usize {
        if self.ctx == ctx {
            return self.offset;
        }
        self.prev.offset(ctx)
    }

    fn variable(&self, id: VariableId) -> i64 {
        self.prev.variable(id)
    }
}

/// Binds one variable
pub(crate) struct VariableState<'a> {
    prev: &'a dyn RuntimeState,
    var_id: VariableId,
    value: i64,
}

impl<'a> VariableState<'a> {
    pub(crate) fn new(prev: &'a dyn RuntimeState, var_id: VariableId, value: i64) -> Self {
        Self { prev, var_id, value }
    }
}

impl RuntimeState for VariableState<'_> {
    fn offset(&self, ctx: &str) -> usize {
        self.prev.offset(ctx)
    }

    fn variable(&self, id: VariableId) -> i64 {
        if self.var_id == id {
            return self.value;
        }
        self.prev.variable(id)
    }
}

/// Named flags persisted across rules for one connection
///
/// The `stateop` keyword reads and writes this table. It is opaque to every
/// other keyword.
#[derive(Debug, Default)]
pub struct StateTable {
    states: Mutex<HashSet<String>>,
}

impl StateTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `state` is set
    pub fn has(&self, state: &str) -> bool {
        self.states.lock().contains(state)
    }

    /// Set `state`
    pub fn set(&self, state: &str) {
        self.states.lock().insert(state.to_string());
    }

    /// Clear `state`
    pub fn unset(&self, state: &str) {
        self.states.lock().remove(state);
    }
}
