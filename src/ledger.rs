//! Per-session interaction ledger: transcript, answer cache, query counts.
//!
//! Both maps are keyed by the literal question text. "What is ABG?" and
//! "what is ABG?" are different questions here.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::types::Message;

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    transcript: Vec<Message>,
    cache: HashMap<String, String>,
    /// Insertion order doubles as first-submission order for trending ties.
    counts: IndexMap<String, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn append(&mut self, message: Message) {
        self.transcript.push(message);
    }

    pub fn cached(&self, question: &str) -> Option<&str> {
        self.cache.get(question).map(String::as_str)
    }

    /// Store an answer unless one is already cached for `question`.
    pub fn cache_answer(&mut self, question: &str, answer: impl Into<String>) {
        self.cache
            .entry(question.to_string())
            .or_insert_with(|| answer.into());
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Count one more submission of `question`; returns the new count.
    pub fn record_query(&mut self, question: &str) -> u64 {
        let count = self.counts.entry(question.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    #[cfg(test)]
    pub fn query_count(&self, question: &str) -> u64 {
        self.counts.get(question).copied().unwrap_or(0)
    }

    /// Most-asked questions, highest count first, ties in first-asked order.
    pub fn trending(&self, limit: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(&String, &u64)> = self.counts.iter().collect();
        // stable: equal counts keep insertion order
        entries.sort_by(|a, b| b.1.cmp(a.1));
        entries
            .into_iter()
            .take(limit)
            .map(|(q, c)| (q.clone(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_exact_string_keys() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.record_query("What is ABG?"), 1);
        assert_eq!(ledger.record_query("What is ABG?"), 2);
        assert_eq!(ledger.record_query("what is ABG?"), 1);
        assert_eq!(ledger.query_count("What is ABG?"), 2);
        assert_eq!(ledger.query_count("What is ABG? "), 0);
    }

    #[test]
    fn test_cache_keeps_first_answer() {
        let mut ledger = Ledger::new();
        ledger.cache_answer("q", "first");
        ledger.cache_answer("q", "second");
        assert_eq!(ledger.cached("q"), Some("first"));
        assert_eq!(ledger.cache_len(), 1);
        assert_eq!(ledger.cached("Q"), None);
    }

    #[test]
    fn test_transcript_is_append_only_in_order() {
        let mut ledger = Ledger::new();
        ledger.append(Message::user("one"));
        ledger.append(Message::assistant("uno"));
        ledger.append(Message::user("two"));
        let contents: Vec<&str> = ledger
            .transcript()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "uno", "two"]);
    }

    #[test]
    fn test_trending_sorted_with_stable_ties() {
        let mut ledger = Ledger::new();
        for q in ["sepsis", "abg", "insulin", "abg", "heparin", "insulin", "abg"] {
            ledger.record_query(q);
        }
        let top = ledger.trending(3);
        assert_eq!(
            top,
            vec![
                ("abg".to_string(), 3),
                ("insulin".to_string(), 2),
                ("sepsis".to_string(), 1),
            ]
        );
        assert_eq!(ledger.trending(10).len(), 4);
        assert!(ledger.trending(0).is_empty());
    }
}
