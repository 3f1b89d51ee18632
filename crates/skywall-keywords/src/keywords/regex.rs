//! The `pcre` keyword: regular expression search
//!
//! `pcre:"/regex/flags"[,relative][,offset N][,depth N][,nocase][,part CTX]`
//!
//! The clause keeps its historical name for rule compatibility; the engine
//! underneath is the `regex` crate over raw bytes. The compiled program is
//! owned by the keyword and reused across calls. Flags: `i` caseless,
//! `m` multiline, `s` dotall, `x` extended, `E` dollar-endonly (the engine's
//! `$` is already end-anchored outside multiline mode), `A` anchored,
//! `G` ungreedy, `R` relative.

use regex::bytes::{Regex, RegexBuilder};
use tracing::trace;

use crate::attr::{BoolAttr, CtxAttr, NumericAttr, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{add_offset, run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::{OffsetState, RuntimeState};
use crate::{KeywordError, MatchStatus, Result};

#[derive(Debug, Default)]
struct RegexOptions {
    nocase: BoolAttr,
    multiline: BoolAttr,
    dotall: BoolAttr,
    extended: BoolAttr,
    dollar_endonly: BoolAttr,
    anchored: BoolAttr,
    ungreedy: BoolAttr,
    relative: BoolAttr,
}

pub(crate) struct RegexKeyword {
    machine: Regex,
    expr: String,

    offset: NumericAttr,
    depth: NumericAttr,
    is_negative: bool,
    is_relative: bool,
    is_anchored: bool,
    ctx: CtxAttr,
}

impl RegexKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &VariablesMapping) -> Result<Self> {
        let expr_param = attrs
            .first()
            .ok_or_else(|| KeywordError::new("The 'pcre' string is empty"))?
            .params();
        if expr_param.len() != 1 {
            return Err(KeywordError::new("More than one element in the 'pcre' keyword pattern"));
        }

        let mut options = RegexOptions::default();
        let (is_negative, expr) = parse_string(&expr_param[0], &mut options)?;
        trace!(expr, "Creating a new 'pcre' expression");

        let mut offset = NumericAttr::default();
        let mut depth = NumericAttr::default();
        let mut ctx = CtxAttr::default();
        for attr in &attrs[1..] {
            match attr.name() {
                "relative" => options.relative.set_attr(attr, "pcre")?,
                "offset" => offset.set_attr(attr, vars, "pcre", 10, false)?,
                "depth" => depth.set_attr(attr, vars, "pcre", 10, false)?,
                "nocase" => options.nocase.set_attr(attr, "pcre")?,
                "part" => ctx.set_attr(attr, "pcre")?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute '{other}' in the 'pcre' keyword"
                    )))
                }
            }
        }

        let machine = compile(&expr, &options)?;
        Ok(Self {
            machine,
            expr,
            offset,
            depth,
            is_negative,
            is_relative: options.relative.get(),
            is_anchored: options.anchored.get(),
            ctx,
        })
    }

    fn is_constant(&self) -> bool {
        !self.is_relative && self.offset.is_constant() && self.depth.is_constant()
    }

    fn start_offset_and_length(&self, buf_size: usize, ctx: &str, prev: &dyn RuntimeState) -> (usize, usize) {
        let keyword_offset = if self.is_relative { prev.offset(ctx) } else { 0 };
        let start_offset = add_offset(keyword_offset, self.offset.eval(prev));

        if start_offset >= buf_size {
            return (0, 0);
        }

        let mut length = buf_size - start_offset;
        if self.depth.is_set() {
            let depth = self.depth.eval(prev);
            if depth >= 0 {
                length = length.min(depth as usize);
            }
        }
        (start_offset, length)
    }
}

impl SingleKeyword for RegexKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let Some(ctx) = env.resolve_context(self.ctx.explicit()) else {
            return MatchStatus::NoMatchFinal;
        };
        let Some(buf) = env.buffer(ctx) else {
            if self.is_negative {
                return run_next(rest, env, prev);
            }
            return MatchStatus::NoMatchFinal;
        };

        let (offset, length) = self.start_offset_and_length(buf.len(), ctx, prev);
        let haystack = &buf[offset..offset + length];

        let mut match_found = false;
        let mut buf_pos = 0;
        while buf_pos < length {
            trace!(expr = %self.expr, buf_pos, "Running regex search");
            let Some(found) = self.machine.find_at(haystack, buf_pos) else {
                break;
            };
            // An anchored expression only applies at the window start
            if self.is_anchored && found.start() != buf_pos {
                break;
            }

            if self.is_negative {
                return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
            }
            match_found = true;
            let new_offset = OffsetState::new(prev, ctx, offset + found.start());
            let next_result = run_next(rest, env, &new_offset);
            if next_result != MatchStatus::NoMatch {
                return next_result;
            }
            // Deal with empty matches
            buf_pos = if found.start() <= buf_pos { buf_pos + 1 } else { found.start() };
        }

        // No occurrence is a success for negative expressions
        if self.is_negative && !match_found {
            return run_next(rest, env, prev);
        }
        if self.is_constant() && !match_found {
            return MatchStatus::NoMatchFinal;
        }
        MatchStatus::NoMatch
    }
}

/// Strip negation and quotes, extract the expression and its flags
fn parse_string(raw: &str, options: &mut RegexOptions) -> Result<(bool, String)> {
    let (is_negative, quoted) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| KeywordError::new("The 'pcre' expression should be enclosed in quotation marks"))?;
    if inner.is_empty() {
        return Err(KeywordError::new("The 'pcre' string is empty"));
    }

    // The expression sits between '/' delimiters, or 'm' declares a custom
    // delimiter: "mDregexpD"
    let mut chars = inner.char_indices();
    let (start, delim) = match chars.next() {
        Some((_, '/')) => (1, '/'),
        Some((_, 'm')) => match chars.next() {
            Some((idx, d)) => (idx + d.len_utf8(), d),
            None => return Err(KeywordError::new("Failed to detect a delimiter in the 'pcre' keyword regular expression")),
        },
        _ => return Err(KeywordError::new("Bad start for the 'pcre' regular expression")),
    };

    let expr_end = inner
        .rfind(delim)
        .filter(|&end| end > start)
        .ok_or_else(|| KeywordError::new("The 'pcre' regular expression is empty"))?;

    let expr = inner[start..expr_end].to_string();
    parse_options(&inner[expr_end + delim.len_utf8()..], options)?;
    Ok((is_negative, expr))
}

fn parse_options(flags: &str, options: &mut RegexOptions) -> Result<()> {
    for ch in flags.chars() {
        match ch {
            'i' => options.nocase.set_flag("pcre", "nocase")?,
            'R' => options.relative.set_flag("pcre", "relative")?,
            'm' => options.multiline.set_flag("pcre", "multiline")?,
            's' => options.dotall.set_flag("pcre", "dotall")?,
            'x' => options.extended.set_flag("pcre", "extended")?,
            'E' => options.dollar_endonly.set_flag("pcre", "dollar_endonly")?,
            'A' => options.anchored.set_flag("pcre", "anchor")?,
            'G' => options.ungreedy.set_flag("pcre", "ungreedy")?,
            other => {
                return Err(KeywordError::new(format!(
                    "Unknown option '{other}' in the 'pcre' keyword"
                )))
            }
        }
    }
    Ok(())
}

fn compile(expr: &str, options: &RegexOptions) -> Result<Regex> {
    let pattern = if options.anchored.get() {
        format!(r"\A(?:{expr})")
    } else {
        expr.to_string()
    };

    RegexBuilder::new(&pattern)
        .case_insensitive(options.nocase.get())
        .multi_line(options.multiline.get())
        .dot_matches_new_line(options.dotall.get())
        .ignore_whitespace(options.extended.get())
        .swap_greed(options.ungreedy.get())
        .build()
        .map_err(|e| KeywordError::new(format!("Failed to compile the 'pcre' expression: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_rule;

    fn env(body: &[u8]) -> MatchEnv {
        MatchEnv::new().with_buffer("HTTP_REQUEST_BODY", body.to_vec())
    }

    #[test]
    fn test_basic_expression() {
        let rule = compile_rule(r#"pcre:"/ab+c/",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"xxabbbcxx")));
        assert!(!rule.is_match(&env(b"ac")));
    }

    #[test]
    fn test_caseless_flag() {
        let rule = compile_rule(r#"pcre:"/login/i",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"LOGIN")));
    }

    #[test]
    fn test_custom_delimiter() {
        let rule = compile_rule(r#"pcre:"m#a/b#",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"xa/bx")));
    }

    #[test]
    fn test_negative_expression() {
        let rule = compile_rule(r#"pcre:!"/forbidden/",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"all clear")), MatchStatus::Match);
        assert_eq!(rule.status(&env(b"forbidden fruit")), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_relative_flag() {
        let rule = compile_rule(
            r#"data:"user=",part HTTP_REQUEST_BODY; pcre:"/\A[a-z]+/R",part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"user=admin")));
    }

    #[test]
    fn test_anchored_flag() {
        let rule = compile_rule(r#"pcre:"/GET/A",part HTTP_METHOD;"#).expect("rule");
        let matching = MatchEnv::new().with_buffer("HTTP_METHOD", b"GET".to_vec());
        let offset_hit = MatchEnv::new().with_buffer("HTTP_METHOD", b"xGET".to_vec());
        assert!(rule.is_match(&matching));
        assert!(!rule.is_match(&offset_hit));
    }

    #[test]
    fn test_offset_window() {
        let rule = compile_rule(r#"pcre:"/abc/",offset 4,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"xxxxabc")));
        assert!(!rule.is_match(&env(b"abcxxxxxx")));
    }

    #[test]
    fn test_sets_offset_for_tail() {
        let rule = compile_rule(
            r#"pcre:"/needle/",part HTTP_REQUEST_BODY; data:"tail",relative,part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"hay needle tail")));
        assert!(!rule.is_match(&env(b"tail hay needle")));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = compile_rule(r#"pcre:"/abc/Z";"#).expect_err("flag");
        assert!(err.to_string().contains("Unknown option"));
    }

    #[test]
    fn test_missing_quotes_rejected() {
        assert!(compile_rule(r"pcre:/abc/;").is_err());
    }

    #[test]
    fn test_double_flag_rejected() {
        let err = compile_rule(r#"pcre:"/abc/ii";"#).expect_err("double flag");
        assert!(err.to_string().contains("Double definition"));
    }
}
