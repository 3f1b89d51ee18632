//! The `compare` keyword: integer comparison of two operands
//!
//! `compare:<lhs>,<op>,<rhs>` where operands are literals or previously
//! bound variables and `op` is one of `=`, `!=`, `<`, `>`, `<=`, `>=`.

use crate::attr::{ComparisonAttr, NumericAttr, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::RuntimeState;
use crate::{KeywordError, MatchStatus, Result};

pub(crate) struct CompareKeyword {
    first_val: NumericAttr,
    second_val: NumericAttr,
    comparison: ComparisonAttr,
}

impl CompareKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &VariablesMapping) -> Result<Self> {
        if attrs.len() != 3 {
            return Err(KeywordError::new("Invalid number of attributes in the 'compare' keyword"));
        }

        let first_param = attrs[0].params();
        if first_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the first value in the 'compare' keyword",
            ));
        }
        let mut first_val = NumericAttr::default();
        first_val.set_value("first_val", &first_param[0], vars, "compare", 10, false)?;

        let comparison_param = attrs[1].params();
        if comparison_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the comparison operator in the 'compare' keyword",
            ));
        }
        let comparison = ComparisonAttr::parse(&comparison_param[0], "compare")?;

        let second_param = attrs[2].params();
        if second_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the second value in the 'compare' keyword",
            ));
        }
        let mut second_val = NumericAttr::default();
        second_val.set_value("second_val", &second_param[0], vars, "compare", 10, false)?;

        Ok(Self {
            first_val,
            second_val,
            comparison,
        })
    }

    fn is_constant(&self) -> bool {
        self.first_val.is_constant() && self.second_val.is_constant()
    }
}

impl SingleKeyword for CompareKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let first = self.first_val.eval(prev);
        let second = self.second_val.eval(prev);

        if self.comparison.apply(first, second) {
            return run_next(rest, env, prev);
        }

        if self.is_constant() {
            MatchStatus::NoMatchFinal
        } else {
            MatchStatus::NoMatch
        }
    }
}
