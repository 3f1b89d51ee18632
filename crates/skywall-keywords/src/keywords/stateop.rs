//! The `stateop` keyword: reads and writes named per-connection flags
//!
//! `stateop:state <name>,<isset|set|unset>`

use crate::environment::MatchEnv;
use crate::keywords::{run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::RuntimeState;
use crate::{KeywordError, MatchStatus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    IsSet,
    Set,
    Unset,
}

pub(crate) struct StateopKeyword {
    state_name: String,
    mode: Operation,
}

impl StateopKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr]) -> Result<Self> {
        if attrs.len() != 2 {
            return Err(KeywordError::new("Invalid number of attributes in the 'stateop' keyword"));
        }

        let mut state_name: Option<String> = None;
        let mut mode: Option<Operation> = None;

        for attr in attrs {
            match attr.name() {
                "state" => {
                    let params = attr.params();
                    if params.len() != 2 {
                        return Err(KeywordError::new(
                            "More than one element in the state name in the 'stateop' keyword",
                        ));
                    }
                    state_name = Some(params[1].clone());
                }
                "isset" => Self::set_mode(&mut mode, Operation::IsSet)?,
                "set" => Self::set_mode(&mut mode, Operation::Set)?,
                "unset" => Self::set_mode(&mut mode, Operation::Unset)?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute '{other}' in the 'stateop' keyword"
                    )))
                }
            }
        }

        match (state_name, mode) {
            (Some(state_name), Some(mode)) if !state_name.is_empty() => Ok(Self { state_name, mode }),
            _ => Err(KeywordError::new("Bad 'stateop' attribute configuration")),
        }
    }

    fn set_mode(mode: &mut Option<Operation>, op: Operation) -> Result<()> {
        if mode.is_some() {
            return Err(KeywordError::new("Redefining 'stateop' keyword operation"));
        }
        *mode = Some(op);
        Ok(())
    }
}

impl SingleKeyword for StateopKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let table = env.state_table();
        match self.mode {
            Operation::IsSet => {
                if table.has(&self.state_name) {
                    run_next(rest, env, prev)
                } else {
                    MatchStatus::NoMatchFinal
                }
            }
            Operation::Set => {
                table.set(&self.state_name);
                run_next(rest, env, prev)
            }
            Operation::Unset => {
                table.unset(&self.state_name);
                run_next(rest, env, prev)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_rule;
    use crate::state::StateTable;
    use std::sync::Arc;

    fn env_with_table(table: Arc<StateTable>) -> MatchEnv {
        MatchEnv::new()
            .with_buffer("HTTP_REQUEST_BODY", b"body".to_vec())
            .with_state_table(table)
    }

    #[test]
    fn test_set_then_isset_across_rules() {
        let table = Arc::new(StateTable::new());
        let set_rule = compile_rule("stateop:state seen_auth,set;").expect("rule");
        let check_rule = compile_rule("stateop:state seen_auth,isset;").expect("rule");

        assert_eq!(check_rule.status(&env_with_table(Arc::clone(&table))), MatchStatus::NoMatchFinal);
        assert_eq!(set_rule.status(&env_with_table(Arc::clone(&table))), MatchStatus::Match);
        assert_eq!(check_rule.status(&env_with_table(Arc::clone(&table))), MatchStatus::Match);
    }

    #[test]
    fn test_unset_clears_state() {
        let table = Arc::new(StateTable::new());
        table.set("flag");
        let unset_rule = compile_rule("stateop:state flag,unset;").expect("rule");
        assert_eq!(unset_rule.status(&env_with_table(Arc::clone(&table))), MatchStatus::Match);
        assert!(!table.has("flag"));
    }

    #[test]
    fn test_isset_gates_the_tail() {
        let table = Arc::new(StateTable::new());
        let rule = compile_rule(r#"stateop:state armed,isset; data:"x",part HTTP_REQUEST_BODY;"#)
            .expect("rule");
        let env = MatchEnv::new()
            .with_buffer("HTTP_REQUEST_BODY", b"x".to_vec())
            .with_state_table(Arc::clone(&table));
        assert_eq!(rule.status(&env), MatchStatus::NoMatchFinal);
        table.set("armed");
        let env = MatchEnv::new()
            .with_buffer("HTTP_REQUEST_BODY", b"x".to_vec())
            .with_state_table(table);
        assert_eq!(rule.status(&env), MatchStatus::Match);
    }

    #[test]
    fn test_bad_configuration_rejected() {
        assert!(compile_rule("stateop:state flag;").is_err());
        assert!(compile_rule("stateop:set,unset;").is_err());
        assert!(compile_rule("stateop:state flag,set,unset;").is_err());
    }
}
