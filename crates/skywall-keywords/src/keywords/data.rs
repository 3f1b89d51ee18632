//! The `data` keyword: Boyer-Moore substring search
//!
//! `data:"pattern"[,nocase][,relative][,offset N][,depth N][,caret][,part CTX]`
//!
//! The bad-character (`skip`) and good-suffix (`shift`) tables are computed
//! at compile time; when `nocase` is set the pattern is folded up-front and
//! the tables cover both cases. The hot path is a single bad-character skip
//! on the last byte of the window; the full comparator only runs when that
//! byte matches.

use tracing::trace;

use crate::attr::{BoolAttr, CtxAttr, NumericAttr, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{add_offset, run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::{OffsetState, RuntimeState};
use crate::{KeywordError, MatchStatus, Result};

pub(crate) struct DataKeyword {
    pattern: Vec<u8>,
    skip: [usize; 256],
    shift: Vec<usize>,

    offset: NumericAttr,
    depth: NumericAttr,
    is_negative: bool,
    is_caret: BoolAttr,
    is_relative: BoolAttr,
    is_nocase: BoolAttr,
    ctx: CtxAttr,
}

impl DataKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &VariablesMapping) -> Result<Self> {
        let pattern_param = attrs
            .first()
            .ok_or_else(|| KeywordError::new("No input for the 'data' keyword"))?
            .params();
        if pattern_param.len() != 1 {
            return Err(KeywordError::new("More than one element in the 'data' keyword pattern"));
        }
        let string_pattern = &pattern_param[0];
        if string_pattern.is_empty() {
            return Err(KeywordError::new("No input for the 'data' keyword"));
        }

        let (is_negative, quoted) = match string_pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, string_pattern.as_str()),
        };
        let inner = quoted
            .strip_prefix('"')
            .ok_or_else(|| KeywordError::new("The data pattern does not begin with '\"'"))?
            .strip_suffix('"')
            .ok_or_else(|| KeywordError::new("The data pattern does not end with '\"'"))?;
        if inner.is_empty() {
            return Err(KeywordError::new("No input for the 'data' keyword"));
        }

        let mut keyword = Self {
            pattern: parse_pattern(inner)?,
            skip: [0; 256],
            shift: Vec::new(),
            offset: NumericAttr::default(),
            depth: NumericAttr::default(),
            is_negative,
            is_caret: BoolAttr::default(),
            is_relative: BoolAttr::default(),
            is_nocase: BoolAttr::default(),
            ctx: CtxAttr::default(),
        };

        for attr in &attrs[1..] {
            match attr.name() {
                "relative" => keyword.is_relative.set_attr(attr, "data")?,
                "offset" => keyword.offset.set_attr(attr, vars, "data", 10, false)?,
                "depth" => keyword.depth.set_attr(attr, vars, "data", 10, false)?,
                "caret" => keyword.is_caret.set_attr(attr, "data")?,
                "nocase" => keyword.is_nocase.set_attr(attr, "data")?,
                "part" => keyword.ctx.set_attr(attr, "data")?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute '{other}' in the 'data' keyword"
                    )))
                }
            }
        }

        keyword.calc_tables();
        Ok(keyword)
    }

    fn calc_tables(&mut self) {
        if self.is_nocase.get() {
            for ch in &mut self.pattern {
                *ch = ch.to_ascii_lowercase();
            }
        }

        // A byte absent from the pattern skips the whole window
        self.skip = [self.pattern.len(); 256];

        // Distance from each byte to the end of the pattern; the latest
        // occurrence of a repeated byte takes precedence
        for (index, &ch) in self.pattern.iter().enumerate() {
            let dist_to_end = self.pattern.len() - (index + 1);
            if self.is_nocase.get() && ch.is_ascii_lowercase() {
                self.skip[ch.to_ascii_uppercase() as usize] = dist_to_end;
            }
            self.skip[ch as usize] = dist_to_end;
        }

        // Good-suffix table: for each suffix length, the smallest left shift
        // under which every overlapping character still matches and the
        // character preceding the shifted suffix (if any) differs.
        // pattern = "hellololo", suffix=2 (must match "[^o]lo"), shift=4
        // pattern = "olo", suffix=2 (must match "[^o]lo"), shift=2
        // Characters before the pattern are considered wild.
        self.shift = vec![0; self.pattern.len()];
        let len = self.pattern.len();
        let end_offset = len - 1;
        for suffix_len in 0..len {
            for shift_offset in 1..=len {
                let matches = if shift_offset + suffix_len <= len {
                    let suffix = &self.pattern[len - suffix_len..];
                    let shifted = &self.pattern[len - suffix_len - shift_offset..len - shift_offset];
                    suffix == shifted
                } else {
                    let overlap = len - shift_offset;
                    self.pattern[shift_offset..] == self.pattern[..overlap]
                };
                if !matches {
                    continue;
                }

                if shift_offset + suffix_len < len
                    && self.pattern[end_offset - suffix_len] == self.pattern[end_offset - (shift_offset + suffix_len)]
                {
                    continue;
                }

                self.shift[suffix_len] = shift_offset;
                break;
            }
        }
    }

    fn is_constant(&self) -> bool {
        !self.is_relative.get() && self.offset.is_constant() && self.depth.is_constant()
    }

    fn start_and_end_offsets(&self, buf_size: usize, ctx: &str, prev: &dyn RuntimeState) -> (usize, usize) {
        let relative_offset = if self.is_relative.get() { prev.offset(ctx) } else { 0 };
        let start_offset = add_offset(relative_offset, self.offset.eval(prev));

        let mut end = buf_size;
        if self.depth.is_set() {
            end = end.min(add_offset(start_offset, self.depth.eval(prev)));
        }
        if self.is_caret.get() {
            end = end.min(start_offset + self.pattern.len());
        }
        (start_offset, end)
    }

    /// Number of trailing pattern bytes matching the window ending at `offset`
    fn bytes_matched(&self, buf: &[u8], offset: usize) -> usize {
        let plen = self.pattern.len();
        for i in 0..plen {
            let mut byte = buf[offset - (i + 1)];
            if self.is_nocase.get() {
                byte = byte.to_ascii_lowercase();
            }
            if self.pattern[plen - (i + 1)] != byte {
                return i;
            }
        }
        plen
    }

    fn move_on_no_match(&self, offset_from_end: usize, first_unmatched_byte: u8) -> usize {
        let skip = self.skip[first_unmatched_byte as usize];
        let skip_size = if skip > offset_from_end { skip - offset_from_end } else { 1 };
        self.shift[offset_from_end].max(skip_size)
    }
}

impl SingleKeyword for DataKeyword {
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

        trace!(context = ctx, pattern_len = self.pattern.len(), "Searching data pattern");

        let (start, max_offset) = self.start_and_end_offsets(buf.len(), ctx, prev);
        let mut offset = start + self.pattern.len();
        let mut match_found = false;

        while offset <= max_offset {
            // Short circuit for the common case where the last byte differs;
            // the skip table already covers both cases under nocase
            let last_skip = self.skip[buf[offset - 1] as usize];
            if last_skip != 0 {
                offset += last_skip;
                continue;
            }

            let match_size = self.bytes_matched(buf, offset);
            if match_size == self.pattern.len() {
                if self.is_negative {
                    return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
                }
                match_found = true;
                let new_offset = OffsetState::new(prev, ctx, offset);
                let next_result = run_next(rest, env, &new_offset);
                if next_result != MatchStatus::NoMatch {
                    return next_result;
                }
                offset += self.pattern.len();
            } else {
                offset += self.move_on_no_match(match_size, buf[offset - (match_size + 1)]);
            }
        }

        // Not finding the pattern is a success for a negative keyword
        if self.is_negative && !match_found {
            return run_next(rest, env, prev);
        }

        if self.is_constant() && !match_found {
            return MatchStatus::NoMatchFinal;
        }
        MatchStatus::NoMatch
    }
}

fn parse_pattern(text: &str) -> Result<Vec<u8>> {
    let mut pattern = Vec::new();
    let mut hex = String::new();
    let mut hex_mode = false;
    let mut after_bslash = false;

    for ch in text.chars() {
        if after_bslash {
            if !ch.is_ascii_graphic() && ch != ' ' {
                return Err(KeywordError::new(format!(
                    "Illegal backslash character '{:#04x}' in the pattern in the 'data' keyword",
                    ch as u32
                )));
            }
            pattern.push(ch as u8);
            after_bslash = false;
            continue;
        }

        match ch {
            '|' => {
                if !hex_mode {
                    hex.clear();
                    hex_mode = true;
                } else {
                    if !hex.is_empty() {
                        return Err(KeywordError::new(
                            "Stoping in the middle of hex string in the 'data' keyword",
                        ));
                    }
                    hex_mode = false;
                }
            }
            '\\' => {
                if hex_mode {
                    return Err(KeywordError::new("Backslash in hex string in the 'data' keyword"));
                }
                after_bslash = true;
            }
            '"' => {
                return Err(KeywordError::new(
                    "Unescaped double quotation mark in the 'data' keyword",
                ))
            }
            _ => {
                if hex_mode {
                    if !ch.is_ascii_hexdigit() {
                        if ch != ' ' {
                            return Err(KeywordError::new(format!(
                                "Illegal character '{:#04x}' in the hex string in the 'data' keyword",
                                ch as u32
                            )));
                        }
                        if !hex.is_empty() {
                            return Err(KeywordError::new(
                                "Space separating nibbles in the hex string in the 'data' keyword",
                            ));
                        }
                        continue;
                    }
                    hex.push(ch);
                    if hex.len() >= 2 {
                        let byte = u8::from_str_radix(&hex, 16)
                            .map_err(|_| KeywordError::new("Bad hex string in the 'data' keyword"))?;
                        pattern.push(byte);
                        hex.clear();
                    }
                } else {
                    if !ch.is_ascii_graphic() && ch != ' ' {
                        return Err(KeywordError::new(format!(
                            "Illegal character '{:#04x}' in the pattern in the 'data' keyword",
                            ch as u32
                        )));
                    }
                    pattern.push(ch as u8);
                }
            }
        }
    }

    if hex_mode || after_bslash {
        return Err(KeywordError::new(
            "The 'data' keyword's pattern has ended in the middle of the parsing",
        ));
    }
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_rule;

    fn env(body: &[u8]) -> MatchEnv {
        MatchEnv::new().with_buffer("HTTP_REQUEST_BODY", body.to_vec())
    }

    #[test]
    fn test_parse_pattern_plain() {
        assert_eq!(parse_pattern("abc").expect("parse"), b"abc");
    }

    #[test]
    fn test_parse_pattern_hex_run() {
        assert_eq!(parse_pattern("a|62 63|d").expect("parse"), b"abcd");
    }

    #[test]
    fn test_parse_pattern_escapes() {
        assert_eq!(parse_pattern(r#"a\"b"#).expect("parse"), b"a\"b");
        assert_eq!(parse_pattern(r"a\\b").expect("parse"), b"a\\b");
    }

    #[test]
    fn test_parse_pattern_rejects_dangling_hex() {
        assert!(parse_pattern("a|6").is_err());
        assert!(parse_pattern("a|62").is_err());
    }

    #[test]
    fn test_parse_pattern_rejects_unescaped_quote() {
        assert!(parse_pattern("a\"b").is_err());
    }

    #[test]
    fn test_simple_match() {
        let rule = compile_rule(r#"data:"needle",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"hay needle stack")));
        assert!(!rule.is_match(&env(b"hay stack")));
    }

    #[test]
    fn test_nocase_match() {
        let rule = compile_rule(r#"data:"Login",nocase,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"user LOGIN here")));
        assert!(rule.is_match(&env(b"user login here")));
    }

    #[test]
    fn test_negative_pattern() {
        let rule = compile_rule(r#"data:!"Login",nocase,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"user LOGIN here")), MatchStatus::NoMatchFinal);
        assert_eq!(rule.status(&env(b"nothing to see")), MatchStatus::Match);
    }

    #[test]
    fn test_offset_and_depth() {
        let rule = compile_rule(r#"data:"abc",offset 3,depth 5,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"xyzabc")));
        // Pattern before the offset window
        assert!(!rule.is_match(&env(b"abcxyzzzz")));
        // Pattern ends past the depth window
        assert!(!rule.is_match(&env(b"xyzzzzabc")));
    }

    #[test]
    fn test_caret_anchors_to_window_start() {
        let rule = compile_rule(r#"data:"abc",caret,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"abcdef")));
        assert!(!rule.is_match(&env(b"xabc")));
    }

    #[test]
    fn test_relative_chained_patterns() {
        let rule =
            compile_rule(r#"data:"user",part HTTP_REQUEST_BODY; data:"pass",relative,part HTTP_REQUEST_BODY;"#)
                .expect("rule");
        assert!(rule.is_match(&env(b"user then pass")));
        assert!(!rule.is_match(&env(b"pass then user")));
    }

    #[test]
    fn test_backtracks_to_later_occurrence() {
        // First "ab" occurrence does not leave room for the tail; the search
        // must resume and succeed on the second one.
        let rule =
            compile_rule(r#"data:"ab",part HTTP_REQUEST_BODY; data:"cd",relative,caret,part HTTP_REQUEST_BODY;"#)
                .expect("rule");
        assert!(rule.is_match(&env(b"ab..abcd")));
    }

    #[test]
    fn test_missing_buffer_is_final() {
        let rule = compile_rule(r#"data:"x",part HTTP_RESPONSE_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"x")), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_missing_buffer_negative_matches() {
        let rule = compile_rule(r#"data:!"x",part HTTP_RESPONSE_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"x")), MatchStatus::Match);
    }

    #[test]
    fn test_constant_miss_is_final() {
        let rule = compile_rule(r#"data:"zz",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"aaaa")), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_repeated_suffix_pattern() {
        let rule = compile_rule(r#"data:"ololo",part HTTP_REQUEST_BODY;"#).expect("rule");
        assert!(rule.is_match(&env(b"xxololoxx")));
        assert!(rule.is_match(&env(b"olololo")));
        assert!(!rule.is_match(&env(b"olol")));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let err = compile_rule(r#"data:"x",bogus;"#).expect_err("unknown attr");
        assert!(err.to_string().contains("Unknown attribute"));
    }
}
