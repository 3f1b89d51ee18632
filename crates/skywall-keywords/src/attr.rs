//! Attribute value types shared by all keywords
//!
//! Numeric attributes accept either an integer literal or the name of a
//! variable bound earlier in the same rule. Variables are purely lexical:
//! the mapping from name to id is fixed at compile time, values travel
//! through the runtime state chain.

use std::collections::HashMap;

use crate::parser::KeywordAttr;
use crate::state::RuntimeState;
use crate::{KeywordError, Result};

/// Identifier of a rule-local variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub(crate) usize);

/// Compile-time table of variable names declared by the rule
#[derive(Debug, Default)]
pub(crate) struct VariablesMapping {
    mapping: HashMap<String, VariableId>,
}

impl VariablesMapping {
    pub(crate) fn add_variable(&mut self, name: &str) -> VariableId {
        let next = VariableId(self.mapping.len());
        *self.mapping.entry(name.to_string()).or_insert(next)
    }

    pub(crate) fn variable_id(&self, name: &str) -> Result<VariableId> {
        self.mapping
            .get(name)
            .copied()
            .ok_or_else(|| KeywordError::new(format!("Unknown parameter {name}")))
    }
}

/// An integer attribute: a constant or a reference to a bound variable
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum NumericAttr {
    #[default]
    Unset,
    Const(i64),
    Var(VariableId),
}

impl NumericAttr {
    pub(crate) fn set_attr(
        &mut self,
        attr: &KeywordAttr,
        known_vars: &VariablesMapping,
        keyword_name: &str,
        base: u32,
        unsigned_only: bool,
    ) -> Result<()> {
        let params = attr.params();
        if params.len() != 2 {
            return Err(KeywordError::new(format!(
                "Malformed '{}' in the '{}' keyword",
                attr.name(),
                keyword_name
            )));
        }
        self.set_value(attr.name(), &params[1], known_vars, keyword_name, base, unsigned_only)
    }

    pub(crate) fn set_value(
        &mut self,
        attr_name: &str,
        param: &str,
        known_vars: &VariablesMapping,
        keyword_name: &str,
        base: u32,
        unsigned_only: bool,
    ) -> Result<()> {
        if self.is_set() {
            return Err(KeywordError::new(format!(
                "Double definition of the '{attr_name}' in the '{keyword_name}' keyword"
            )));
        }

        if unsigned_only && param.starts_with('-') {
            return Err(KeywordError::new(format!(
                "Negative constant '{param}' in the '{attr_name}' in the '{keyword_name}' keyword"
            )));
        }

        let first = param.chars().next().unwrap_or(' ');
        if first.is_ascii_digit() || first == '-' {
            let (digits, negative) = match param.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (param, false),
            };
            let value = i64::from_str_radix(digits, base).map_err(|_| {
                KeywordError::new(format!(
                    "Malformed constant '{param}' in the '{attr_name}' in the '{keyword_name}' keyword"
                ))
            })?;
            *self = Self::Const(if negative { -value } else { value });
        } else {
            let id = known_vars
                .variable_id(param)
                .map_err(|e| KeywordError::new(format!("In {keyword_name} in {attr_name}: {e}")))?;
            *self = Self::Var(id);
        }
        Ok(())
    }

    pub(crate) fn eval(&self, state: &dyn RuntimeState) -> i64 {
        match self {
            Self::Unset => 0,
            Self::Const(val) => *val,
            Self::Var(id) => state.variable(*id),
        }
    }

    pub(crate) fn is_constant(&self) -> bool {
        !matches!(self, Self::Var(_))
    }

    pub(crate) fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

/// A flag attribute that may be set at most once
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BoolAttr {
    val: bool,
}

impl BoolAttr {
    pub(crate) fn set_attr(&mut self, attr: &KeywordAttr, keyword_name: &str) -> Result<()> {
        if attr.params().len() != 1 {
            return Err(KeywordError::new(format!(
                "Malformed '{}' in the '{}' keyword",
                attr.name(),
                keyword_name
            )));
        }
        self.set_flag(keyword_name, attr.name())
    }

    pub(crate) fn set_flag(&mut self, keyword_name: &str, attr_name: &str) -> Result<()> {
        if self.val {
            return Err(KeywordError::new(format!(
                "Double definition of the '{attr_name}' in the '{keyword_name}' keyword"
            )));
        }
        self.val = true;
        Ok(())
    }

    pub(crate) fn get(&self) -> bool {
        self.val
    }
}

/// The `part` attribute naming the context buffer a keyword runs against
#[derive(Debug, Clone, Default)]
pub(crate) struct CtxAttr {
    ctx: Option<String>,
}

impl CtxAttr {
    pub(crate) fn set_attr(&mut self, attr: &KeywordAttr, keyword_name: &str) -> Result<()> {
        if self.ctx.is_some() {
            return Err(KeywordError::new(format!(
                "Double definition of the 'part' in the '{keyword_name}' keyword"
            )));
        }
        let params = attr.params();
        if params.len() != 2 {
            return Err(KeywordError::new(format!(
                "Malformed 'part' in the '{keyword_name}' keyword"
            )));
        }
        self.ctx = Some(params[1].clone());
        Ok(())
    }

    /// The explicit context, when one was given
    pub(crate) fn explicit(&self) -> Option<&str> {
        self.ctx.as_deref()
    }
}

/// Comparison operator of the `compare` keyword
#[derive(Debug, Clone, Copy)]
pub(crate) enum ComparisonAttr {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl ComparisonAttr {
    pub(crate) fn parse(param: &str, keyword_name: &str) -> Result<Self> {
        match param {
            "=" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "<" => Ok(Self::LessThan),
            ">" => Ok(Self::GreaterThan),
            "<=" => Ok(Self::LessThanOrEqual),
            ">=" => Ok(Self::GreaterThanOrEqual),
            other => Err(KeywordError::new(format!(
                "Unknown comparison operator in the '{keyword_name}' keyword: {other}"
            ))),
        }
    }

    pub(crate) fn apply(&self, first: i64, second: i64) -> bool {
        match self {
            Self::Equal => first == second,
            Self::NotEqual => first != second,
            Self::LessThan => first < second,
            Self::GreaterThan => first > second,
            Self::LessThanOrEqual => first <= second,
            Self::GreaterThanOrEqual => first >= second,
        }
    }
}
