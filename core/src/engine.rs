//! Query evaluation over a read-only [`InvertedIndex`].
//!
//! Boolean and phrase queries fold a binary posting-list operator left to right over
//! the query terms and come back ordered by doc id. Ranked queries accumulate a
//! per-term tf-idf score, normalize it by document length and come back ordered by
//! descending score.

use crate::config::EngineConfig;
use crate::index::InvertedIndex;
use crate::posting::PostingList;
use crate::query::Query;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Intersection,
    Phrase,
    #[default]
    Ranked,
}

pub struct QueryEngine<'a> {
    index: &'a InvertedIndex,
    config: EngineConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a InvertedIndex, config: EngineConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &'a InvertedIndex { self.index }
    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn search(&self, query: &Query, query_type: QueryType) -> PostingList {
        let start = Instant::now();
        let result = match query_type {
            QueryType::Intersection => self.intersection(query),
            QueryType::Phrase => self.phrase(query),
            QueryType::Ranked => self.ranked(query),
        };
        tracing::debug!(?query_type, terms = query.len(), hits = result.len(), elapsed_us = start.elapsed().as_micros() as u64, "query evaluated");
        result
    }

    pub fn intersection(&self, query: &Query) -> PostingList {
        self.intersect_terms(query.terms())
    }

    /// Folds over the query's term sequence, so repeated words must repeat in the document.
    pub fn phrase(&self, query: &Query) -> PostingList {
        self.phrase_terms(query.sequence())
    }

    /// Documents containing every term.
    pub fn intersect_terms<S: AsRef<str>>(&self, terms: &[S]) -> PostingList {
        self.fold_terms(terms, PostingList::intersect)
    }

    /// Documents containing the terms as consecutive tokens, in order. Repeated terms are allowed.
    pub fn phrase_terms<S: AsRef<str>>(&self, terms: &[S]) -> PostingList {
        self.fold_terms(terms, PostingList::positional_intersect)
    }

    // Left fold of `op` over the terms' lists. A term missing from the index empties the result.
    fn fold_terms<S, F>(&self, terms: &[S], op: F) -> PostingList
    where
        S: AsRef<str>,
        F: Fn(&PostingList, &PostingList) -> PostingList,
    {
        let mut lists = terms.iter().map(|t| {
            let list = self.index.postings(t.as_ref());
            if list.is_none() {
                tracing::debug!(term = t.as_ref(), "term not in index");
            }
            list
        });
        let seed = match lists.next() {
            Some(first) => first.cloned().unwrap_or_default(),
            None => return PostingList::new(),
        };
        lists.fold(seed, |acc, next| match next {
            Some(list) if !acc.is_empty() => op(&acc, list),
            _ => PostingList::new(),
        })
    }

    /// Length-normalized tf-idf ranking. Terms absent from the index contribute nothing.
    pub fn ranked(&self, query: &Query) -> PostingList {
        let n = self.index.num_docs() as f64;
        let mut result = PostingList::new();

        for (term, weight) in query.weighted_terms() {
            let Some(list) = self.index.postings(term) else {
                tracing::debug!(term, "term not in index, skipped");
                continue;
            };
            let idf = (n / list.len() as f64).ln();
            let scored: PostingList = list
                .iter()
                .map(|p| p.with_score(p.term_frequency() as f64 * idf * weight))
                .collect();
            result.union_with_score(&scored);
        }

        let normalization = self.config.normalization;
        for p in result.iter_mut() {
            match self.index.doc_length(p.doc_id) {
                Some(len) => p.score = normalization.apply(p.score, len),
                None => tracing::warn!(doc_id = p.doc_id, "no length for document, score left unnormalized"),
            }
        }
        result.sort_by_score();
        result
    }
}
