//! The `jump` keyword: moves the current offset within a context
//!
//! `jump:<delta>,<from_beginning|from_end|relative>[,align 2|4][,part CTX]`
//!
//! A negative delta that would land before the buffer start clamps to 0 with
//! a warning.

use tracing::{debug, warn};

use crate::attr::{CtxAttr, NumericAttr, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{apply_alignment, run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::{OffsetState, RuntimeState};
use crate::{KeywordError, MatchStatus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpFrom {
    Relative,
    FromBeginning,
    FromEnd,
}

pub(crate) struct JumpKeyword {
    jumping_from: JumpFrom,
    jumping_val: NumericAttr,
    align: usize,
    ctx: CtxAttr,
}

impl JumpKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &VariablesMapping) -> Result<Self> {
        // Two required attributes: the jumping value and the starting point
        if attrs.len() < 2 {
            return Err(KeywordError::new("Invalid number of attributes in the 'jump' keyword"));
        }

        let val_param = attrs[0].params();
        if val_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the jumping value in the 'jump' keyword",
            ));
        }
        let mut jumping_val = NumericAttr::default();
        jumping_val.set_value("jumping value", &val_param[0], vars, "jump", 10, false)?;

        let from_param = attrs[1].params();
        if from_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the jumping 'from' parameter in the 'jump' keyword",
            ));
        }
        let jumping_from = match from_param[0].as_str() {
            "from_beginning" => JumpFrom::FromBeginning,
            "from_end" => JumpFrom::FromEnd,
            "relative" => JumpFrom::Relative,
            other => {
                return Err(KeywordError::new(format!(
                    "Unknown jumping 'from' parameter in the 'jump' keyword: {other}"
                )))
            }
        };

        let mut keyword = Self {
            jumping_from,
            jumping_val,
            align: 1,
            ctx: CtxAttr::default(),
        };

        for attr in &attrs[2..] {
            match attr.name() {
                "part" => keyword.ctx.set_attr(attr, "jump")?,
                "align" => keyword.set_align(attr)?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute {other} in the 'jump' keyword"
                    )))
                }
            }
        }
        Ok(keyword)
    }

    fn set_align(&mut self, attr: &KeywordAttr) -> Result<()> {
        if self.align != 1 {
            return Err(KeywordError::new("Double definition of the 'align' in the 'jump' keyword"));
        }
        let params = attr.params();
        if params.len() != 2 {
            return Err(KeywordError::new("Malformed 'align' in the 'jump' keyword"));
        }
        self.align = match params[1].as_str() {
            "2" => 2,
            "4" => 4,
            other => {
                return Err(KeywordError::new(format!(
                    "Unknown 'align' in the 'jump' keyword: {other}"
                )))
            }
        };
        Ok(())
    }

    fn is_constant(&self) -> bool {
        self.jumping_from != JumpFrom::Relative && self.jumping_val.is_constant()
    }

    fn start_offset(&self, buf_size: usize, ctx: &str, prev: &dyn RuntimeState) -> usize {
        match self.jumping_from {
            JumpFrom::FromBeginning => 0,
            JumpFrom::FromEnd => buf_size,
            JumpFrom::Relative => prev.offset(ctx),
        }
    }

    fn add_offset(&self, offset: usize, add: i64) -> usize {
        if add < 0 {
            let sub = add.unsigned_abs() as usize;
            if offset < sub {
                warn!("The offset was set to 0 due to an attempt to jump before the beginning of the buffer in the 'jump' keyword");
                return 0;
            }
            return apply_alignment(offset - sub, self.align);
        }
        apply_alignment(offset + add as usize, self.align)
    }
}

impl SingleKeyword for JumpKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let Some(ctx) = env.resolve_context(self.ctx.explicit()) else {
            return MatchStatus::NoMatchFinal;
        };
        let Some(buf) = env.buffer(ctx) else {
            return MatchStatus::NoMatchFinal;
        };

        let start_offset = self.start_offset(buf.len(), ctx, prev);
        let offset_to_jump = self.add_offset(start_offset, self.jumping_val.eval(prev));

        if offset_to_jump > buf.len() {
            debug!("New offset exceeds the buffer size in the 'jump' keyword");
            return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
        }

        let new_offset = OffsetState::new(prev, ctx, offset_to_jump);
        run_next(rest, env, &new_offset)
    }
}
