//! Source citation aggregation
//!
//! Passages arrive one `[SOURCE]` frame at a time and several passages may
//! belong to the same document. They are merged by document name, keeping
//! first-seen order, so the finished answer lists each document once.

use crate::protocol::SourcePayload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A cited document with the passages quoted from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub summary: Vec<String>,
}

impl SourceRef {
    fn from_payload(payload: SourcePayload) -> Self {
        Self {
            name: payload.name,
            url: payload.url,
            icon: payload.category,
            updated_at: payload.updated_at,
            summary: vec![payload.page_content],
        }
    }
}

/// Turn-scoped, insertion-ordered map from source name to [`SourceRef`]
#[derive(Debug, Clone, Default)]
pub struct SourceAggregator {
    entries: Vec<SourceRef>,
    index: HashMap<String, usize>,
    sealed: bool,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one passage. Returns `true` if anything changed.
    ///
    /// A passage equal to the last one stored for the same name is dropped,
    /// which makes redelivery of a frame idempotent.
    pub fn add(&mut self, payload: SourcePayload) -> bool {
        if self.sealed {
            tracing::debug!(name = %payload.name, "Source arrived after completion, ignoring");
            return false;
        }

        if let Some(&i) = self.index.get(&payload.name) {
            let entry = &mut self.entries[i];
            if entry.summary.last() == Some(&payload.page_content) {
                return false;
            }
            entry.summary.push(payload.page_content);
            return true;
        }

        self.index.insert(payload.name.clone(), self.entries.len());
        self.entries.push(SourceRef::from_payload(payload));
        true
    }

    /// Sources in first-seen order. Seals the aggregator.
    pub fn finish(&mut self) -> Vec<SourceRef> {
        self.sealed = true;
        self.entries.clone()
    }

    /// Current sources without sealing
    pub fn sources(&self) -> &[SourceRef] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.sealed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(name: &str, content: &str) -> SourcePayload {
        SourcePayload::new(name, content)
    }

    #[test]
    fn adjacent_duplicate_is_suppressed() {
        let mut agg = SourceAggregator::new();
        assert!(agg.add(passage("doc1", "A")));
        assert!(!agg.add(passage("doc1", "A")));
        assert!(agg.add(passage("doc1", "B")));

        let sources = agg.finish();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].summary, vec!["A", "B"]);
    }

    #[test]
    fn only_the_preceding_fragment_is_compared() {
        let mut agg = SourceAggregator::new();
        agg.add(passage("doc1", "A"));
        agg.add(passage("doc1", "B"));
        agg.add(passage("doc1", "A"));
        assert_eq!(agg.sources()[0].summary, vec!["A", "B", "A"]);
    }

    #[test]
    fn dedup_is_per_name() {
        let mut agg = SourceAggregator::new();
        agg.add(passage("doc1", "A"));
        agg.add(passage("doc2", "A"));
        agg.add(passage("doc1", "A"));
        let sources = agg.finish();
        assert_eq!(sources[0].summary, vec!["A"]);
        assert_eq!(sources[1].summary, vec!["A"]);
    }

    #[test]
    fn first_seen_order_and_metadata_are_kept() {
        let mut agg = SourceAggregator::new();
        let mut first = passage("zeta", "z");
        first.url = Some("https://z".to_string());
        first.category = Some("github".to_string());
        agg.add(first);
        agg.add(passage("alpha", "a"));
        // Later passages do not overwrite metadata from the first one.
        let mut again = passage("zeta", "z2");
        again.url = Some("https://other".to_string());
        agg.add(again);

        let sources = agg.finish();
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(sources[0].url.as_deref(), Some("https://z"));
        assert_eq!(sources[0].icon.as_deref(), Some("github"));
    }

    #[test]
    fn sealed_aggregator_ignores_input_until_reset() {
        let mut agg = SourceAggregator::new();
        agg.add(passage("doc1", "A"));
        agg.finish();
        assert!(!agg.add(passage("doc2", "B")));
        assert_eq!(agg.sources().len(), 1);

        agg.reset();
        assert!(agg.is_empty());
        assert!(agg.add(passage("doc2", "B")));
    }

    #[test]
    fn serializes_with_consumer_field_names() {
        let mut agg = SourceAggregator::new();
        let mut p = passage("doc1", "A");
        p.updated_at = Some("2024-02-01".to_string());
        agg.add(p);
        let json = serde_json::to_value(agg.finish()).unwrap();
        assert_eq!(json[0]["updatedAt"], "2024-02-01");
        assert_eq!(json[0]["summary"][0], "A");
    }
}
