//! The `no_match` keyword: always fails terminally
//!
//! Used to disable a rule without deleting it from the rulebase.

use crate::environment::MatchEnv;
use crate::keywords::SingleKeyword;
use crate::parser::KeywordAttr;
use crate::state::RuntimeState;
use crate::{KeywordError, MatchStatus, Result};

pub(crate) struct NoMatchKeyword;

impl NoMatchKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr]) -> Result<Self> {
        if !attrs.is_empty() {
            return Err(KeywordError::new("The 'no_match' keyword takes no attributes"));
        }
        Ok(Self)
    }
}

impl SingleKeyword for NoMatchKeyword {
    fn eval(&self, _rest: &[Box<dyn SingleKeyword>], _env: &MatchEnv, _prev: &dyn RuntimeState) -> MatchStatus {
        MatchStatus::NoMatchFinal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_rule;

    #[test]
    fn test_always_final() {
        let rule = compile_rule("no_match;").expect("rule");
        assert_eq!(rule.status(&MatchEnv::new()), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_short_circuits_the_tail() {
        let env = MatchEnv::new().with_buffer("HTTP_REQUEST_BODY", b"x".to_vec());
        let rule = compile_rule(r#"no_match; data:"x",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_attributes_rejected() {
        assert!(compile_rule("no_match:oops;").is_err());
    }
}
