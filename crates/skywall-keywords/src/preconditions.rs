//! Rule-set preconditions
//!
//! Regex evaluation is the expensive part of a rule set. Before running the
//! full pipelines, a single multi-pattern scan over the buffer checks which
//! rules' literal trigger substrings are present at all; rules whose triggers
//! are absent cannot match and are skipped wholesale. The scan runs in
//! budget-sized chunks with a cooperative yield between chunks so large
//! bodies do not starve the scheduler.

use regex::bytes::RegexSet;

use crate::rule::SCAN_YIELD_BUDGET;
use crate::{KeywordError, Result};

/// Multi-pattern prefilter over the literal triggers of a rule set
pub struct Preconditions {
    set: RegexSet,
    max_trigger_len: usize,
    rule_count: usize,
}

impl Preconditions {
    /// Build a prefilter from one literal trigger per rule
    ///
    /// Triggers are matched verbatim (case sensitive); an empty trigger marks
    /// a rule that must always be evaluated.
    pub fn new(triggers: &[&[u8]]) -> Result<Self> {
        let patterns: Vec<String> = triggers
            .iter()
            .map(|t| {
                if t.is_empty() {
                    // Matches everything: the rule is never skipped
                    String::new()
                } else {
                    // Spell each byte out so the trigger matches raw bytes,
                    // not a unicode reinterpretation
                    let escaped: String = t.iter().map(|b| format!(r"\x{b:02x}")).collect();
                    format!("(?-u:{escaped})")
                }
            })
            .collect();

        let set = RegexSet::new(&patterns)
            .map_err(|e| KeywordError::new(format!("Failed to build rule preconditions: {e}")))?;
        let max_trigger_len = triggers.iter().map(|t| t.len()).max().unwrap_or(0);
        Ok(Self {
            set,
            max_trigger_len,
            rule_count: triggers.len(),
        })
    }

    /// Indexes of the rules whose triggers appear in `buffer`
    pub fn relevant_rules(&self, buffer: &[u8]) -> Vec<usize> {
        self.set.matches(buffer).into_iter().collect()
    }

    /// Chunked variant of [`relevant_rules`](Self::relevant_rules) that
    /// yields to the scheduler between chunks
    ///
    /// Chunks overlap by the longest trigger length so no occurrence is lost
    /// on a boundary.
    pub async fn relevant_rules_chunked(&self, buffer: &[u8]) -> Vec<usize> {
        if buffer.len() <= SCAN_YIELD_BUDGET {
            return self.relevant_rules(buffer);
        }

        let overlap = self.max_trigger_len.saturating_sub(1);
        let mut found = vec![false; self.rule_count];
        let mut start = 0;
        while start < buffer.len() {
            let end = (start + SCAN_YIELD_BUDGET).min(buffer.len());
            let chunk_start = start.saturating_sub(overlap);
            for index in self.set.matches(&buffer[chunk_start..end]) {
                found[index] = true;
            }
            start = end;
            tokio::task::yield_now().await;
        }
        found
            .into_iter()
            .enumerate()
            .filter_map(|(index, hit)| hit.then_some(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevant_rules() {
        let pre = Preconditions::new(&[b"select", b"script", b"../"]).expect("preconditions");
        let hits = pre.relevant_rules(b"GET /a?q=select+1 HTTP/1.1");
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn test_multiple_hits() {
        let pre = Preconditions::new(&[b"select", b"script"]).expect("preconditions");
        let hits = pre.relevant_rules(b"<script>select</script>");
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_empty_trigger_always_relevant() {
        let pre = Preconditions::new(&[b"absent", b""]).expect("preconditions");
        let hits = pre.relevant_rules(b"nothing interesting");
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pre = Preconditions::new(&[b".+["]).expect("preconditions");
        assert_eq!(pre.relevant_rules(b"x.+[y"), vec![0]);
        assert!(pre.relevant_rules(b"anything").is_empty());
    }

    #[tokio::test]
    async fn test_chunked_scan_finds_boundary_hits() {
        let pre = Preconditions::new(&[b"needle"]).expect("preconditions");
        // Place the trigger straddling the first chunk boundary
        let mut buffer = vec![b'x'; SCAN_YIELD_BUDGET - 3];
        buffer.extend_from_slice(b"needle");
        buffer.extend(vec![b'y'; SCAN_YIELD_BUDGET]);
        assert_eq!(pre.relevant_rules_chunked(&buffer).await, vec![0]);
    }

    #[tokio::test]
    async fn test_chunked_matches_unchunked() {
        let pre = Preconditions::new(&[b"alpha", b"beta"]).expect("preconditions");
        let mut buffer = vec![b'.'; 3 * SCAN_YIELD_BUDGET];
        let len = buffer.len();
        buffer[len - 10..len - 5].copy_from_slice(b"alpha");
        assert_eq!(pre.relevant_rules_chunked(&buffer).await, pre.relevant_rules(&buffer));
    }
}
