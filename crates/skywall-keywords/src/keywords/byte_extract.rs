//! The `byte_extract` keyword
//!
//! Reads N bytes at the current offset, converts them to an integer, binds
//! the result to a variable, and advances the offset past the read (aligned
//! when requested). Binary mode handles 1, 2, or 4 bytes with selectable
//! endianness; string mode parses any length in hex, decimal, or octal.

use tracing::debug;

use crate::attr::{BoolAttr, CtxAttr, NumericAttr, VariableId, VariablesMapping};
use crate::environment::MatchEnv;
use crate::keywords::{add_offset, apply_alignment, run_next, SingleKeyword};
use crate::parser::KeywordAttr;
use crate::state::{OffsetState, RuntimeState, VariableState};
use crate::{KeywordError, MatchStatus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    Binary,
    Hex,
    Dec,
    Oct,
}

impl DataType {
    fn base(self) -> u32 {
        match self {
            Self::Binary => 0,
            Self::Hex => 16,
            Self::Dec => 10,
            Self::Oct => 8,
        }
    }
}

const ATTRIBUTE_NAMES: [&str; 6] = ["offset", "relative", "little_endian", "string", "part", "align"];

pub(crate) struct ByteExtractKeyword {
    bytes: NumericAttr,
    var_id: VariableId,
    offset: NumericAttr,
    is_relative: BoolAttr,
    is_little_end: BoolAttr,
    data_type: DataType,
    align: usize,
    ctx: CtxAttr,
}

impl ByteExtractKeyword {
    pub(crate) fn new(attrs: &[KeywordAttr], vars: &mut VariablesMapping) -> Result<Self> {
        // Two required attributes: number of bytes and the variable name
        if attrs.len() < 2 {
            return Err(KeywordError::new(
                "Invalid number of attributes in the 'byte_extract' keyword",
            ));
        }

        let bytes_param = attrs[0].params();
        if bytes_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the 'bytes' in the 'byte_extract' keyword",
            ));
        }
        let mut bytes = NumericAttr::default();
        bytes.set_value("bytes", &bytes_param[0], vars, "byte_extract", 10, true)?;
        if bytes.is_constant() && bytes.eval(&crate::state::SentinelState) == 0 {
            return Err(KeywordError::new("Number of bytes is zero in the 'byte_extract' keyword"));
        }

        let var_name_param = attrs[1].params();
        if var_name_param.len() != 1 {
            return Err(KeywordError::new(
                "More than one element in the variable name in the 'byte_extract' keyword",
            ));
        }
        let var_name = &var_name_param[0];
        if ATTRIBUTE_NAMES.contains(&var_name.as_str()) {
            return Err(KeywordError::new(format!(
                "'{var_name}' cannot be the variable name in the 'byte_extract' keyword"
            )));
        }
        let first_char = var_name.chars().next().unwrap_or(' ');
        if first_char.is_ascii_digit() || first_char == '-' {
            return Err(KeywordError::new("Malformed variable name in the 'byte_extract' keyword"));
        }
        let var_id = vars.add_variable(var_name);

        let mut keyword = Self {
            bytes,
            var_id,
            offset: NumericAttr::default(),
            is_relative: BoolAttr::default(),
            is_little_end: BoolAttr::default(),
            data_type: DataType::Binary,
            align: 1,
            ctx: CtxAttr::default(),
        };

        for attr in &attrs[2..] {
            match attr.name() {
                "offset" => keyword.offset.set_attr(attr, vars, "byte_extract", 10, false)?,
                "relative" => keyword.is_relative.set_attr(attr, "byte_extract")?,
                "little_endian" => keyword.is_little_end.set_attr(attr, "byte_extract")?,
                "string" => keyword.set_data_type(attr)?,
                "part" => keyword.ctx.set_attr(attr, "byte_extract")?,
                "align" => keyword.set_align(attr)?,
                other => {
                    return Err(KeywordError::new(format!(
                        "Unknown attribute '{other}' in the 'byte_extract' keyword"
                    )))
                }
            }
        }

        keyword.validate()?;
        Ok(keyword)
    }

    fn set_data_type(&mut self, attr: &KeywordAttr) -> Result<()> {
        if self.data_type != DataType::Binary {
            return Err(KeywordError::new(
                "Double definition of the data type in the 'byte_extract' keyword",
            ));
        }
        let params = attr.params();
        if params.len() != 2 {
            return Err(KeywordError::new("Malformed data type in the 'byte_extract' keyword"));
        }
        self.data_type = match params[1].as_str() {
            "hex" => DataType::Hex,
            "dec" => DataType::Dec,
            "oct" => DataType::Oct,
            other => {
                return Err(KeywordError::new(format!(
                    "Unknown data type in the 'byte_extract' keyword: {other}"
                )))
            }
        };
        Ok(())
    }

    fn set_align(&mut self, attr: &KeywordAttr) -> Result<()> {
        if self.align != 1 {
            return Err(KeywordError::new(
                "Double definition of the 'align' in the 'byte_extract' keyword",
            ));
        }
        let params = attr.params();
        if params.len() != 2 {
            return Err(KeywordError::new("Malformed 'align' in the 'byte_extract' keyword"));
        }
        self.align = match params[1].as_str() {
            "2" => 2,
            "4" => 4,
            other => {
                return Err(KeywordError::new(format!(
                    "Unknown 'align' in the 'byte_extract' keyword: {other}"
                )))
            }
        };
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.data_type == DataType::Binary {
            if !self.bytes.is_constant() {
                return Err(KeywordError::new(
                    "Data type is binary, but the 'bytes' is not constant in the 'byte_extract' keyword",
                ));
            }
            let num_bytes = self.bytes.eval(&crate::state::SentinelState);
            if num_bytes != 1 && num_bytes != 2 && num_bytes != 4 {
                return Err(KeywordError::new(
                    "Data type is binary, but the 'bytes' is not 1, 2, or 4 in the 'byte_extract' keyword",
                ));
            }
            if self.is_little_end.get() && num_bytes == 1 {
                return Err(KeywordError::new(
                    "Little endian is set, but the number of bytes is invalid in the 'byte_extract' keyword",
                ));
            }
            if self.align != 1 {
                return Err(KeywordError::new(
                    "The 'align' is set and data type is binary in the 'byte_extract' keyword",
                ));
            }
        } else if self.is_little_end.get() {
            return Err(KeywordError::new(
                "Little endian is set, but the data type is not binary in the 'byte_extract' keyword",
            ));
        }
        Ok(())
    }

    fn is_constant(&self) -> bool {
        !self.is_relative.get() && self.bytes.is_constant() && self.offset.is_constant()
    }

    fn start_offset_and_length(&self, buf_size: usize, ctx: &str, prev: &dyn RuntimeState) -> (usize, usize) {
        let relative_offset = if self.is_relative.get() { prev.offset(ctx) } else { 0 };
        let start_offset = add_offset(relative_offset, self.offset.eval(prev));

        if start_offset >= buf_size {
            return (0, 0);
        }
        (start_offset, buf_size - start_offset)
    }

    fn read_value(&self, start: usize, length: usize, buf: &[u8]) -> std::result::Result<i64, String> {
        if self.data_type != DataType::Binary {
            return self.read_string_value(start, length, buf);
        }

        let mut res: i64 = 0;
        for i in 0..length {
            let ch = i64::from(buf[start + i]);
            if self.is_little_end.get() {
                res += ch << (8 * i);
            } else {
                res = (res << 8) + ch;
            }
        }
        Ok(res)
    }

    fn read_string_value(&self, start: usize, length: usize, buf: &[u8]) -> std::result::Result<i64, String> {
        let raw = &buf[start..start + length];
        let val_str = std::str::from_utf8(raw)
            .map_err(|_| "Unable to convert the bytes to a number due to an invalid argument".to_string())?;
        let res = i64::from_str_radix(val_str, self.data_type.base())
            .map_err(|_| format!("Unable to convert the \"{val_str}\" to a number due to an invalid argument"))?;
        if res > i64::from(i32::MAX) || res < 0 {
            return Err(format!(
                "Unable to convert the \"{val_str}\" to a number. The maximum is: {}",
                i32::MAX
            ));
        }
        Ok(res)
    }
}

impl SingleKeyword for ByteExtractKeyword {
    fn eval(&self, rest: &[Box<dyn SingleKeyword>], env: &MatchEnv, prev: &dyn RuntimeState) -> MatchStatus {
        let Some(ctx) = env.resolve_context(self.ctx.explicit()) else {
            return MatchStatus::NoMatchFinal;
        };
        let Some(buf) = env.buffer(ctx) else {
            return MatchStatus::NoMatchFinal;
        };

        let bytes_eval = self.bytes.eval(prev);
        if bytes_eval <= 0 {
            // A zero constant was rejected at compile time; only a variable
            // can land here
            debug!("Number of bytes is zero in the 'byte_extract' keyword");
            return MatchStatus::NoMatch;
        }
        let bytes_to_extract = bytes_eval as usize;

        let (start_offset, length_to_end) = self.start_offset_and_length(buf.len(), ctx, prev);
        let offset_after_extract = apply_alignment(start_offset + bytes_to_extract, self.align);

        if length_to_end == 0 || offset_after_extract > buf.len() {
            debug!("Extraction window exceeds the buffer size in the 'byte_extract' keyword");
            return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
        }

        let extracted = match self.read_value(start_offset, bytes_to_extract, buf) {
            Ok(val) => val,
            Err(err) => {
                debug!("Trying to store an invalid value in the 'byte_extract' keyword: {err}");
                return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
            }
        };

        if extracted > i64::from(i32::MAX) {
            debug!("Value exceeds the maximum in the 'byte_extract' keyword");
            return if self.is_constant() { MatchStatus::NoMatchFinal } else { MatchStatus::NoMatch };
        }

        // Bind the variable, then move the offset past the extracted bytes
        let new_var = VariableState::new(prev, self.var_id, extracted);
        let new_offset = OffsetState::new(&new_var, ctx, offset_after_extract);
        run_next(rest, env, &new_offset)
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
    fn test_little_endian_four_bytes() {
        let rule = compile_rule(
            r#"byte_extract:4,v,offset 0,little_endian,part HTTP_REQUEST_BODY; compare:v,=,305419896;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(&[0x78, 0x56, 0x34, 0x12, 0xff])));
        assert!(!rule.is_match(&env(&[0x12, 0x34, 0x56, 0x78, 0xff])));
    }

    #[test]
    fn test_big_endian_two_bytes() {
        let rule =
            compile_rule(r#"byte_extract:2,v,part HTTP_REQUEST_BODY; compare:v,=,258;"#).expect("rule");
        assert!(rule.is_match(&env(&[0x01, 0x02])));
    }

    #[test]
    fn test_string_dec_mode() {
        let rule = compile_rule(
            r#"byte_extract:3,v,string dec,part HTTP_REQUEST_BODY; compare:v,=,123;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"123rest")));
        assert!(!rule.is_match(&env(b"abcrest")));
    }

    #[test]
    fn test_string_hex_mode() {
        let rule = compile_rule(
            r#"byte_extract:2,v,string hex,part HTTP_REQUEST_BODY; compare:v,=,255;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"ff..")));
    }

    #[test]
    fn test_advances_offset_past_read() {
        let rule = compile_rule(
            r#"byte_extract:2,v,part HTTP_REQUEST_BODY; data:"xy",relative,caret,part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"abxy")));
        assert!(!rule.is_match(&env(b"abzxy")));
    }

    #[test]
    fn test_window_past_buffer_end() {
        let rule = compile_rule(r#"byte_extract:4,v,part HTTP_REQUEST_BODY;"#).expect("rule");
        assert_eq!(rule.status(&env(b"ab")), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_binary_mode_requires_1_2_or_4() {
        assert!(compile_rule(r#"byte_extract:3,v;"#).is_err());
    }

    #[test]
    fn test_little_endian_rejects_single_byte() {
        assert!(compile_rule(r#"byte_extract:1,v,little_endian;"#).is_err());
    }

    #[test]
    fn test_align_rejected_in_binary_mode() {
        assert!(compile_rule(r#"byte_extract:4,v,align 2;"#).is_err());
    }

    #[test]
    fn test_align_in_string_mode() {
        let rule = compile_rule(
            r#"byte_extract:2,v,string dec,align 4,part HTTP_REQUEST_BODY; data:"z",relative,caret,part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        // Two bytes read, aligned up to offset 4
        assert!(rule.is_match(&env(b"12xxz")));
    }

    #[test]
    fn test_zero_bytes_rejected() {
        assert!(compile_rule(r#"byte_extract:0,v;"#).is_err());
    }
}
