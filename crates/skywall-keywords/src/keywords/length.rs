//! The `length` keyword
//!
//! Modeless form binds the remaining buffer length to a variable; with an
//! `exact`/`min`/`max` attribute it compares the remaining length against the
//! operand instead.

use crate::attr::{BoolAttr, CtxAttr, NumericAttr, VariableId, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::{RuntimeState, VariableState};
use crate::{KeywordError, MatchStatus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthMode {
    Exact,
    Min,
    Max,
}

pub(crate) struct LengthKeyword {
    is_relative: BoolAttr,
    mode: Option<LengthMode>,
    ctx: CtxAttr,
    var_id: Option<VariableId>,
    compare_size: NumericAttr,
}

const RESERVED_NAMES: [&str; 5] = ["relative", "part", "exact", "min", "max"];

impl LengthKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &mut VariablesMapping) -> Result<Self> {
        let first = attrs
            .first()
            .ok_or_else(|| KeywordError::new("Invalid number of attributes in the 'length' keyword"))?;
        let var_name_param = first.params();
        if var_name_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the variable name in the 'length' keyword",
            ));
        }
        let var_name = &var_name_param[0];
        if RESERVED_NAMES.contains(&var_name.as_str()) {
            return Err(KeywordError::new(format!(
                "The '{var_name}' cannot be the variable name in the 'length' keyword"
            )));
        }

        let mut keyword = Self {
            is_relative: BoolAttr::default(),
            mode: None,
            ctx: CtxAttr::default(),
            var_id: None,
            compare_size: NumericAttr::default(),
        };

        for attr in &attrs[1..] {
            match attr.name() {
                "relative" => keyword.is_relative.set_attr(attr, "length")?,
                "exact" => keyword.set_mode(LengthMode::Exact)?,
                "min" => keyword.set_mode(LengthMode::Min)?,
                "max" => keyword.set_mode(LengthMode::Max)?,
                "part" => keyword.ctx.set_attr(attr, "length")?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute '{other}' in the 'length' keyword"
                    )))
                }
            }
        }

        if keyword.mode.is_none() {
            let first_char = var_name.chars().next().unwrap_or(' ');
            if first_char.is_ascii_digit() || first_char == '-' {
                return Err(KeywordError::new("Malformed variable name in the 'length' keyword"));
            }
            keyword.var_id = Some(vars.add_variable(var_name));
        } else {
            keyword
                .compare_size
                .set_value("length value", var_name, vars, "length", 10, true)?;
        }
        Ok(keyword)
    }

    fn set_mode(&mut self, mode: LengthMode) -> Result<()> {
        if self.mode.is_some() {
            return Err(KeywordError::new("Redefining 'length' keyword operation"));
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn is_constant(&self) -> bool {
        !self.is_relative.get() && self.compare_size.is_constant()
    }
}

impl SingleKeyword for LengthKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let Some(ctx) = env.resolve_context(self.ctx.explicit()) else {
            return MatchStatus::NoMatchFinal;
        };
        let Some(buf) = env.buffer(ctx) else {
            return MatchStatus::NoMatchFinal;
        };

        let offset = if self.is_relative.get() { prev.offset(ctx) } else { 0 };
        let size = buf.len();

        if offset <= size {
            let remaining = (size - offset) as i64;
            match self.mode {
                Some(LengthMode::Exact) => {
                    if remaining == self.compare_size.eval(prev) {
                        return run_next(rest, env, prev);
                    }
                }
                Some(LengthMode::Min) => {
                    if remaining >= self.compare_size.eval(prev) {
                        return run_next(rest, env, prev);
                    }
                }
                Some(LengthMode::Max) => {
                    if remaining <= self.compare_size.eval(prev) {
                        return run_next(rest, env, prev);
                    }
                }
                None => {
                    let var_id = self.var_id.expect("modeless length always binds a variable");
                    let new_var = VariableState::new(prev, var_id, remaining);
                    return run_next(rest, env, &new_var);
                }
            }
        }

        if self.is_constant() {
            MatchStatus::NoMatchFinal
        } else {
            MatchStatus::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_rule;

    fn env(body: &[u8]) -> MatchEnv {
        MatchEnv::new().with_buffer("HTTP_REQUEST_BODY", body.to_vec())
    }

    #[test]
    fn test_exact_mode() {
        let rule = compile_rule(r#"length:5,exact,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"12345")), MatchStatus::Match);
        assert_eq!(rule.status(&env(b"1234")), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_min_and_max_modes() {
        let min = compile_rule(r#"length:3,min,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(min.is_match(&env(b"abcd")));
        assert!(!min.is_match(&env(b"ab")));

        let max = compile_rule(r#"length:3,max,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(max.is_match(&env(b"ab")));
        assert!(!max.is_match(&env(b"abcd")));
    }

    #[test]
    fn test_binds_variable_for_compare() {
        let rule = compile_rule(r#"length:len,part HTTP_REQUEST_BODY; compare:len,=,4;"#).expect("rule");
        assert!(rule.is_match(&env(b"abcd")));
        assert!(!rule.is_match(&env(b"abc")));
    }

    #[test]
    fn test_relative_remaining_length() {
        let rule = compile_rule(
            r#"data:"ab",part HTTP_REQUEST_BODY; length:2,exact,relative,part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"abcd")));
        assert!(!rule.is_match(&env(b"abcde")));
    }

    #[test]
    fn test_reserved_variable_name_rejected() {
        let err = compile_rule(r#"length:relative;"#).expect_err("reserved");
        assert!(err.to_string().contains("cannot be the variable name"));
    }

    #[test]
    fn test_double_mode_rejected() {
        let err = compile_rule(r#"length:5,exact,min;"#).expect_err("double mode");
        assert!(err.to_string().contains("Redefining"));
    }

    #[test]
    fn test_malformed_variable_name_rejected() {
        assert!(compile_rule(r#"length:5foo;"#).is_err());
    }
}
