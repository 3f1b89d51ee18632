//! Clause parsing
//!
//! Splitting is quote- and escape-aware: delimiters inside a double-quoted
//! string are literal, `\` escapes the next character. A split that ends
//! inside a string or an escape is a compilation error.

use crate::{KeywordError, Result};

const WHITESPACES: &[char] = &[' ', '\t'];

fn substr_no_padding(text: &str, start: usize, end: usize) -> Result<String> {
    let section = &text[start..end];
    let trimmed = section.trim_matches(|c| WHITESPACES.contains(&c));
    if trimmed.is_empty() {
        return Err(KeywordError::new(format!("Found an empty section in the '{text}'")));
    }
    Ok(trimmed.to_string())
}

/// Split `text` on any of `delims`, honoring quoting and escapes
pub(crate) fn split(text: &str, delims: &str) -> Result<Vec<String>> {
    let mut res = Vec::new();
    let mut part_start = 0;
    let mut escape = false;
    let mut in_string = false;

    for (index, ch) in text.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            _ => {
                if !in_string && delims.contains(ch) {
                    res.push(substr_no_padding(text, part_start, index)?);
                    part_start = index + ch.len_utf8();
                }
            }
        }
    }

    if escape || in_string {
        return Err(KeywordError::new("Split has ended in the middle of the parsing"));
    }

    if text[part_start..].trim_matches(|c| WHITESPACES.contains(&c)).is_empty() {
        return Ok(res);
    }
    res.push(substr_no_padding(text, part_start, text.len())?);
    Ok(res)
}

/// One attribute of a clause: whitespace-separated tokens, first is the name
#[derive(Debug, Clone)]
pub(crate) struct KeywordAttr {
    params: Vec<String>,
}

impl KeywordAttr {
    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            params: split(text, " \t")?,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.params[0]
    }

    pub(crate) fn params(&self) -> &[String] {
        &self.params
    }
}

/// A parsed clause: keyword name plus comma-separated attributes
#[derive(Debug, Clone)]
pub(crate) struct KeywordParsed {
    name: String,
    attrs: Vec<KeywordAttr>,
}

impl KeywordParsed {
    pub(crate) fn parse(clause: &str) -> Result<Self> {
        let (name_end, attrs) = match clause.find(':') {
            Some(index) => {
                let mut attrs = Vec::new();
                for part in split(&clause[index + 1..], ",")? {
                    attrs.push(KeywordAttr::parse(&part)?);
                }
                (index, attrs)
            }
            None => (clause.len(), Vec::new()),
        };

        let name = substr_no_padding(clause, 0, name_end)?;
        if name.contains(WHITESPACES) {
            return Err(KeywordError::new(format!("'{name}' - cannot be a keyword name")));
        }
        Ok(Self { name, attrs })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attrs(&self) -> &[KeywordAttr] {
        &self.attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let parts = split("a; b ;c", ";").expect("split");
        assert_eq!(parts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_ignores_delims_in_strings() {
        let parts = split(r#"data:"a;b"; compare:x,=,1"#, ";").expect("split");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], r#"data:"a;b""#);
    }

    #[test]
    fn test_split_honors_escapes() {
        let parts = split(r#"data:"a\";b""#, ";").expect("split");
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_split_unterminated_string_fails() {
        assert!(split(r#"data:"abc"#, ";").is_err());
    }

    #[test]
    fn test_split_empty_section_fails() {
        assert!(split("a;;b", ";").is_err());
    }

    #[test]
    fn test_parsed_name_and_attrs() {
        let parsed = KeywordParsed::parse(r#"data:"x",nocase,offset 3"#).expect("parse");
        assert_eq!(parsed.name(), "data");
        assert_eq!(parsed.attrs().len(), 3);
        assert_eq!(parsed.attrs()[1].name(), "nocase");
        assert_eq!(parsed.attrs()[2].params(), &["offset", "3"]);
    }

    #[test]
    fn test_parsed_bare_keyword() {
        let parsed = KeywordParsed::parse("no_match").expect("parse");
        assert_eq!(parsed.name(), "no_match");
        assert!(parsed.attrs().is_empty());
    }

    #[test]
    fn test_name_with_whitespace_rejected() {
        assert!(KeywordParsed::parse("no match").is_err());
    }
}
