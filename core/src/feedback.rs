//! Rocchio relevance feedback.

use crate::config::{EngineConfig, Normalization};
use crate::index::InvertedIndex;
use crate::posting::PostingList;
use crate::query::Query;
use crate::DocId;

/// tf-idf weights of every term in one document, normalized by the document's length.
/// Empty when the index did not keep the document's term counts.
pub fn document_vector(index: &InvertedIndex, doc_id: DocId, normalization: Normalization) -> Vec<(String, f64)> {
    let Some(counts) = index.doc_terms(doc_id) else {
        return Vec::new();
    };
    let n = index.num_docs() as f64;
    let length = index.doc_length(doc_id).unwrap_or(1.0);
    counts
        .iter()
        .filter_map(|(term, &tf)| {
            let df = index.document_frequency(term);
            if df == 0 {
                return None;
            }
            let idf = (n / df as f64).ln();
            Some((term.clone(), normalization.apply(tf as f64 * idf, length)))
        })
        .collect()
}

impl Query {
    /// Expands the query in place from relevance judgments on `results`.
    ///
    /// `judgments[i]` marks `results[i]` as relevant. Existing weights are scaled by
    /// `alpha`, then `beta / |relevant|` times each relevant document's tf-idf vector is
    /// added; terms not yet in the query are appended after the existing ones, in
    /// result order and then term order. No relevant document leaves the query untouched.
    pub fn relevance_feedback(
        &mut self,
        results: &PostingList,
        judgments: &[bool],
        index: &InvertedIndex,
        config: &EngineConfig,
    ) {
        let EngineConfig { normalization, rocchio } = config;
        let relevant: Vec<DocId> = results
            .iter()
            .zip(judgments)
            .filter(|(_, is_relevant)| **is_relevant)
            .map(|(p, _)| p.doc_id)
            .collect();
        if relevant.is_empty() {
            return;
        }

        let vectors: Vec<Vec<(String, f64)>> = relevant
            .iter()
            .map(|&doc_id| {
                let v = document_vector(index, doc_id, *normalization);
                if v.is_empty() {
                    tracing::warn!(doc_id, "no term counts for relevant document, skipped");
                }
                v
            })
            .collect();

        self.scale_weights(rocchio.alpha);
        let share = rocchio.beta / relevant.len() as f64;
        for (term, tfidf) in vectors.into_iter().flatten() {
            self.add_weight(term, share * tfidf);
        }
        tracing::debug!(relevant = relevant.len(), terms = self.len(), "query expanded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, RocchioConfig};
    use crate::engine::QueryEngine;
    use crate::index::IndexBuilder;
    use crate::Position;

    fn index_of(docs: &[(DocId, &str)]) -> InvertedIndex {
        let mut b = IndexBuilder::new(IndexConfig::default());
        for (doc_id, text) in docs {
            for (pos, term) in text.split_whitespace().enumerate() {
                b.insert(term, *doc_id, pos as Position).unwrap();
            }
        }
        b.build()
    }

    fn corpus() -> InvertedIndex {
        index_of(&[(0, "cat dog"), (1, "cat cat fish"), (2, "bird"), (3, "dog bird fish")])
    }

    #[test]
    fn all_false_judgments_leave_query_unchanged() {
        let index = corpus();
        let mut query = Query::parse("cat fish");
        let before = query.clone();
        let results = QueryEngine::new(&index, EngineConfig::default()).ranked(&query);
        query.relevance_feedback(&results, &vec![false; results.len()], &index, &EngineConfig::default());
        assert_eq!(query, before);
        query.relevance_feedback(&results, &[], &index, &EngineConfig::default());
        assert_eq!(query, before);
    }

    #[test]
    fn rocchio_accumulates_into_existing_terms() {
        let index = corpus();
        let mut query = Query::parse("cat");
        let results: PostingList = index.postings("cat").unwrap().clone();
        assert_eq!(results.doc_ids(), vec![0, 1]);

        let vector = document_vector(&index, 1, Normalization::DocLength);
        let v_cat = vector.iter().find(|(t, _)| t == "cat").unwrap().1;
        // tf 2, idf ln(4/2), length sqrt(4 + 1)
        assert!((v_cat - 2.0 * 2f64.ln() / 5f64.sqrt()).abs() < 1e-12);

        query.relevance_feedback(&results, &[false, true], &index, &EngineConfig::default());
        assert!((query.weight("cat") - (1.0 * 0.5 + 5.0 * v_cat / 1.0)).abs() < 1e-12);
    }

    #[test]
    fn new_terms_are_appended_after_existing_ones() {
        let index = corpus();
        let mut query = Query::parse("fish dog");
        let results = index.postings("fish").unwrap().clone(); // docs 1, 3
        query.relevance_feedback(&results, &[true, true], &index, &EngineConfig::default());
        assert_eq!(query.terms(), &["fish", "dog", "cat", "bird"]);

        // "dog" only in doc 3: alpha * 1/2 + beta * v / 2
        let v_dog = document_vector(&index, 3, Normalization::DocLength)
            .into_iter()
            .find(|(t, _)| t == "dog")
            .unwrap()
            .1;
        assert!((query.weight("dog") - (0.25 + 2.5 * v_dog)).abs() < 1e-12);
    }

    #[test]
    fn constants_come_from_config() {
        let index = corpus();
        let results = index.postings("bird").unwrap().clone();
        let mut query = Query::parse("bird");
        let config = EngineConfig { rocchio: RocchioConfig { alpha: 1.0, beta: 0.0 }, ..Default::default() };
        query.relevance_feedback(&results, &[false, true], &index, &config);
        assert_eq!(query.weight("bird"), 1.0);
        assert_eq!(query.weight("dog"), 0.0);
        assert!(query.contains("dog"));
    }

    #[test]
    fn documents_without_term_counts_are_skipped() {
        let mut b = IndexBuilder::new(IndexConfig { track_doc_terms: false, ..Default::default() });
        b.insert("x", 0, 0).unwrap();
        b.insert("y", 1, 0).unwrap();
        let index = b.build();
        let results = index.postings("x").unwrap().clone();
        let mut query = Query::parse("x");
        query.relevance_feedback(&results, &[true], &index, &EngineConfig::default());
        assert_eq!(query.terms(), &["x"]);
        assert_eq!(query.weight("x"), 0.5);
    }

    #[test]
    fn expanded_query_changes_ranking() {
        let index = corpus();
        let engine = QueryEngine::new(&index, EngineConfig::default());
        let mut query = Query::parse("fish");
        let results = engine.ranked(&query);
        assert!(!results.iter().any(|p| p.doc_id == 2));

        let judgments: Vec<bool> = results.iter().map(|p| p.doc_id == 3).collect();
        query.relevance_feedback(&results, &judgments, &index, engine.config());
        assert!(engine.ranked(&query).iter().any(|p| p.doc_id == 2));
    }
}
