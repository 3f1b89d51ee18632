//! Keyword implementations
//!
//! Each keyword is one node of the compiled pipeline. Evaluation is
//! recursive: a node that succeeds locally calls into the rest of the
//! pipeline with its updated runtime state, so search keywords can backtrack
//! to their next occurrence when the tail fails with a plain `NoMatch`.

use crate::attr::VariablesMapping;
use crate::environment::MatchEnv;
use crate::parser::KeywordParsed;
use crate::state::RuntimeState;
use crate::{KeywordError, MatchStatus, Result};

mod byte_extract;
mod compare;
mod data;
mod jump;
mod length;
mod no_match;
mod regex;
mod stateop;

pub(crate) use byte_extract::ByteExtractKeyword;
pub(crate) use compare::CompareKeyword;
pub(crate) use data::DataKeyword;
pub(crate) use jump::JumpKeyword;
pub(crate) use length::LengthKeyword;
pub(crate) use no_match::NoMatchKeyword;
pub(crate) use regex::RegexKeyword;
pub(crate) use stateop::StateopKeyword;

/// One compiled keyword
pub(crate) trait SingleKeyword: Send + Sync {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus;
}

/// Evaluate the remaining pipeline; an exhausted pipeline is a match
pub(crate) fn run_next(
    rest: &[Box<dyn SingleKeyword>],
    env: &MatchEnv,
    state: &dyn RuntimeState,
) -> MatchStatus {
    match rest.split_first() {
        None => MatchStatus::Match,
        Some((keyword, tail)) => keyword.eval(tail, env, state),
    }
}

/// Build a keyword from its parsed clause
pub(crate) fn keyword_by_name(parsed: &KeywordParsed, vars: &mut VariablesMapping) -> Result<Box<dyn SingleKeyword>> {
    match parsed.name() {
        "data" => Ok(Box::new(DataKeyword::new(parsed.attrs(), vars)?)),
        "pcre" => Ok(Box::new(RegexKeyword::new(parsed.attrs(), vars)?)),
        "length" => Ok(Box::new(LengthKeyword::new(parsed.attrs(), vars)?)),
        "byte_extract" => Ok(Box::new(ByteExtractKeyword::new(parsed.attrs(), vars)?)),
        "compare" => Ok(Box::new(CompareKeyword::new(parsed.attrs(), vars)?)),
        "jump" => Ok(Box::new(JumpKeyword::new(parsed.attrs(), vars)?)),
        "stateop" => Ok(Box::new(StateopKeyword::new(parsed.attrs())?)),
        "no_match" => Ok(Box::new(NoMatchKeyword::new(parsed.attrs())?)),
        other => Err(KeywordError::new(format!("{other} - unknown keyword type"))),
    }
}

/// Add a signed delta to an offset, clamping underflow to the buffer start
pub(crate) fn add_offset(offset: usize, add: i64) -> usize {
    if add < 0 {
        let sub = add.unsigned_abs() as usize;
        if offset < sub {
            return 0;
        }
        return offset - sub;
    }
    offset.saturating_add(add as usize)
}

/// Align `value` up to the next multiple of `align`
pub(crate) fn apply_alignment(value: usize, align: usize) -> usize {
    let remainder = value % align;
    if remainder != 0 {
        return value + (align - remainder);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_offset_positive() {
        assert_eq!(add_offset(4, 3), 7);
    }

    #[test]
    fn test_add_offset_underflow_clamps_to_zero() {
        assert_eq!(add_offset(2, -5), 0);
        assert_eq!(add_offset(5, -5), 0);
    }

    #[test]
    fn test_apply_alignment() {
        assert_eq!(apply_alignment(5, 2), 6);
        assert_eq!(apply_alignment(6, 2), 6);
        assert_eq!(apply_alignment(5, 4), 8);
        assert_eq!(apply_alignment(8, 4), 8);
    }
}
