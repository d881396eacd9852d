use crate::config::{IndexConfig, LengthMetric};
use crate::posting::PostingList;
use crate::{DocId, Position};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Read-only snapshot handed to the query engine once ingestion is done.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: HashMap<String, PostingList>,
    doc_terms: HashMap<DocId, BTreeMap<String, u32>>,
    doc_lengths: HashMap<DocId, f64>,
}

impl InvertedIndex {
    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, PostingList::len)
    }

    /// Raw term counts of one document, if the term count table was tracked.
    pub fn doc_terms(&self, doc_id: DocId) -> Option<&BTreeMap<String, u32>> {
        self.doc_terms.get(&doc_id)
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<f64> {
        self.doc_lengths.get(&doc_id).copied()
    }

    /// N, the number of documents in the collection.
    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }
    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn dictionary(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.doc_lengths.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Single-writer ingestion phase. Documents must arrive in non-decreasing doc id order per term.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    config: IndexConfig,
    postings: HashMap<String, PostingList>,
    doc_terms: HashMap<DocId, BTreeMap<String, u32>>,
    doc_lengths: HashMap<DocId, f64>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn insert(&mut self, term: &str, doc_id: DocId, position: Position) -> Result<()> {
        let list = self.postings.entry(term.to_string()).or_default();
        if let Some(tail) = list.last() {
            ensure!(
                tail.doc_id <= doc_id,
                "term {term:?}: doc {doc_id} inserted after doc {}",
                tail.doc_id
            );
            if tail.doc_id == doc_id {
                let last_pos = tail.positions.last().copied().unwrap_or_default();
                ensure!(
                    last_pos < position,
                    "term {term:?} in doc {doc_id}: position {position} not after {last_pos}"
                );
            }
        }
        list.add(doc_id, position);

        if self.config.track_doc_terms {
            *self.doc_terms.entry(doc_id).or_default().entry(term.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Overrides the length `build` would otherwise compute for `doc_id`.
    pub fn set_doc_length(&mut self, doc_id: DocId, length: f64) {
        self.doc_lengths.insert(doc_id, length);
    }

    pub fn build(self) -> InvertedIndex {
        let IndexBuilder { config, postings, doc_terms, mut doc_lengths } = self;

        let mut computed: HashMap<DocId, f64> = HashMap::new();
        for list in postings.values() {
            for p in list {
                let tf = p.term_frequency() as f64;
                *computed.entry(p.doc_id).or_insert(0.0) += match config.length_metric {
                    LengthMetric::Euclidean => tf * tf,
                    LengthMetric::TokenCount => tf,
                };
            }
        }
        for (doc_id, acc) in computed {
            let length = match config.length_metric {
                LengthMetric::Euclidean => acc.sqrt(),
                LengthMetric::TokenCount => acc,
            };
            doc_lengths.entry(doc_id).or_insert(length);
        }

        tracing::info!(num_docs = doc_lengths.len(), num_terms = postings.len(), "index built");
        InvertedIndex { postings, doc_terms, doc_lengths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_doc(b: &mut IndexBuilder, doc_id: DocId, text: &str) {
        for (pos, term) in text.split_whitespace().enumerate() {
            b.insert(term, doc_id, pos as Position).unwrap();
        }
    }

    #[test]
    fn builds_postings_and_term_counts() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        insert_doc(&mut b, 1, "a b a c");
        insert_doc(&mut b, 2, "b c d");
        let index = b.build();

        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.num_terms(), 4);
        assert_eq!(index.postings("a").unwrap().get(0).unwrap().positions, vec![0, 2]);
        assert_eq!(index.postings("b").unwrap().doc_ids(), vec![1, 2]);
        assert_eq!(index.document_frequency("c"), 2);
        assert_eq!(index.document_frequency("zzz"), 0);
        assert_eq!(index.doc_terms(1).unwrap().get("a"), Some(&2));
        assert_eq!(index.doc_ids(), vec![1, 2]);

        let mut dict: Vec<&str> = index.dictionary().collect();
        dict.sort();
        assert_eq!(dict, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn euclidean_and_token_count_lengths() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        insert_doc(&mut b, 0, "x x x y");
        let index = b.build();
        assert!((index.doc_length(0).unwrap() - 10f64.sqrt()).abs() < 1e-12);

        let mut b = IndexBuilder::new(IndexConfig { length_metric: LengthMetric::TokenCount, ..Default::default() });
        insert_doc(&mut b, 0, "x x x y");
        assert_eq!(b.build().doc_length(0), Some(4.0));
    }

    #[test]
    fn explicit_length_wins() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        insert_doc(&mut b, 0, "x");
        b.set_doc_length(0, 7.5);
        assert_eq!(b.build().doc_length(0), Some(7.5));
    }

    #[test]
    fn rejects_out_of_order_insertions() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        b.insert("t", 5, 0).unwrap();
        assert!(b.insert("t", 4, 0).is_err());
        b.insert("t", 5, 3).unwrap();
        assert!(b.insert("t", 5, 3).is_err());
        assert!(b.insert("t", 5, 1).is_err());
        // other terms are independent
        b.insert("u", 1, 0).unwrap();
    }

    #[test]
    fn term_counts_can_be_disabled() {
        let mut b = IndexBuilder::new(IndexConfig { track_doc_terms: false, ..Default::default() });
        insert_doc(&mut b, 0, "x y");
        let index = b.build();
        assert!(index.doc_terms(0).is_none());
        assert!(index.doc_length(0).is_some());
    }
}
