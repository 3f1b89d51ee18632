//! Rule compilation and evaluation

use crate::attr::VariablesMapping;
use crate::environment::MatchEnv;
use crate::keywords::{keyword_by_name, run_next, SingleKeyword};
use crate::parser::{split, KeywordParsed};
use crate::state::SentinelState;
use crate::{KeywordError, MatchStatus, Result};

/// Scan budget between cooperative yields in async evaluation, in bytes
pub const SCAN_YIELD_BUDGET: usize = 64 * 1024;

/// A compiled, reusable rule
///
/// Compiled once at configuration load, evaluated many times per request.
pub struct VirtualRule {
    keywords: Vec<Box<dyn SingleKeyword>>,
}

impl std::fmt::Debug for VirtualRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualRule")
            .field("keywords", &self.keywords.len())
            .finish()
    }
}

impl VirtualRule {
    /// Full evaluation result against the given environment
    pub fn status(&self, env: &MatchEnv) -> MatchStatus {
        run_next(&self.keywords, env, &SentinelState)
    }

    /// Whether the rule matches the given environment
    pub fn is_match(&self, env: &MatchEnv) -> bool {
        self.status(env) == MatchStatus::Match
    }

    /// Async evaluation that yields to the scheduler around large scans
    ///
    /// Evaluation itself is synchronous CPU work; when the environment's
    /// buffers exceed [`SCAN_YIELD_BUDGET`] this hands the scheduler a yield
    /// point per budget-sized chunk before running, so a batch of rules over
    /// a large body cannot starve other tasks.
    pub async fn is_match_async(&self, env: &MatchEnv) -> bool {
        let chunks = env.total_buffer_size() / SCAN_YIELD_BUDGET;
        for _ in 0..chunks {
            tokio::task::yield_now().await;
        }
        self.is_match(env)
    }

    /// Number of keywords in the pipeline
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Whether the rule has no keywords (an empty rule always matches)
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Compile a semicolon-terminated sequence of keyword clauses
pub fn compile_rule(rule: &str) -> Result<VirtualRule> {
    let trimmed = rule.trim_end_matches([' ', '\t']);
    if trimmed.is_empty() {
        // Empty rule
        return Ok(VirtualRule { keywords: Vec::new() });
    }
    if !trimmed.ends_with(';') {
        return Err(KeywordError::new(format!("{rule} - end of text pass rule")));
    }

    let mut known_vars = VariablesMapping::default();
    let mut keywords = Vec::new();
    for clause in split(rule, ";")? {
        let parsed = KeywordParsed::parse(&clause)?;
        keywords.push(keyword_by_name(&parsed, &mut known_vars)?);
    }
    Ok(VirtualRule { keywords })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(body: &[u8]) -> MatchEnv {
        MatchEnv::new().with_buffer("HTTP_REQUEST_BODY", body.to_vec())
    }

    #[test]
    fn test_empty_rule_matches() {
        let rule = compile_rule("").expect("rule");
        assert!(rule.is_empty());
        assert_eq!(rule.status(&MatchEnv::new()), MatchStatus::Match);
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let err = compile_rule(r#"data:"x""#).expect_err("terminator");
        assert!(err.to_string().contains("end of text pass rule"));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = compile_rule("frobnicate;").expect_err("unknown");
        assert!(err.to_string().contains("unknown keyword type"));
    }

    #[test]
    fn test_multi_keyword_pipeline() {
        let rule = compile_rule(
            r#"length:len,part HTTP_REQUEST_BODY; compare:len,>,4; data:"user",part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        assert!(rule.is_match(&env(b"user here")));
        assert!(!rule.is_match(&env(b"usr")));
        assert_eq!(rule.len(), 3);
    }

    #[test]
    fn test_default_context_from_environment() {
        let rule = compile_rule(r#"data:"GET";"#).expect("rule");
        let env = MatchEnv::new()
            .with_buffer("HTTP_METHOD", b"GET".to_vec())
            .with_default_context("HTTP_METHOD");
        assert!(rule.is_match(&env));
    }

    #[test]
    fn test_no_default_context_is_final() {
        let rule = compile_rule(r#"data:"GET";"#).expect("rule");
        let env = MatchEnv::new().with_buffer("HTTP_METHOD", b"GET".to_vec());
        assert_eq!(rule.status(&env), MatchStatus::NoMatchFinal);
    }

    #[test]
    fn test_variables_scoped_to_one_rule() {
        // `len` bound in one rule must not leak into another compilation
        let first = compile_rule(r#"length:len,part HTTP_REQUEST_BODY; compare:len,=,4;"#);
        assert!(first.is_ok());
        let second = compile_rule("compare:len,=,4;");
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_async_evaluation_matches_sync() {
        let rule = compile_rule(r#"data:"needle",part HTTP_REQUEST_BODY;"#).expect("rule");
        let big = vec![b'x'; 2 * SCAN_YIELD_BUDGET]
            .into_iter()
            .chain(b"needle".iter().copied())
            .collect::<Vec<u8>>();
        let env = env(&big);
        assert!(rule.is_match_async(&env).await);
        assert!(rule.is_match(&env));
    }

    #[test]
    fn test_evaluation_is_total() {
        // Every status is one of the three members; a rule mixing all
        // keyword families still terminates with a verdict.
        let rule = compile_rule(
            r#"byte_extract:1,v,part HTTP_REQUEST_BODY; jump:v,from_beginning,part HTTP_REQUEST_BODY; pcre:"/.+/",relative,part HTTP_REQUEST_BODY;"#,
        )
        .expect("rule");
        for body in [&b"\x01abc"[..], &b"\xffzz"[..], &b""[..]] {
            let status = rule.status(&env(body));
            assert!(matches!(
                status,
                MatchStatus::Match | MatchStatus::NoMatch | MatchStatus::NoMatchFinal
            ));
        }
    }
}
