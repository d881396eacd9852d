use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bag of unique terms in insertion order, each with a weight.
/// `sequence` keeps the terms as given, repeats included, for phrase matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    terms: Vec<String>,
    sequence: Vec<String>,
    weights: HashMap<String, f64>,
}

impl Query {
    pub fn new() -> Self { Self::default() }

    /// Builds a query from already-tokenized terms. Weights are occurrences / term count,
    /// so an all-distinct query gives every term `1 / n`.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut query = Query::new();
        let mut count = 0usize;
        for term in terms {
            let term: String = term.into();
            query.sequence.push(term.clone());
            query.accumulate(term, 1.0);
            count += 1;
        }
        for w in query.weights.values_mut() {
            *w /= count as f64;
        }
        query
    }

    /// Whitespace-separated terms.
    pub fn parse(text: &str) -> Self {
        Self::from_terms(text.split_whitespace())
    }

    /// Builds a query from explicit (term, weight) pairs. Repeated terms accumulate.
    pub fn from_weighted<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut query = Query::new();
        for (term, weight) in pairs {
            query.add_weight(term.into(), weight);
        }
        query
    }

    pub fn terms(&self) -> &[String] { &self.terms }
    /// Terms in the order given, repeats kept. Terms added later by feedback come last.
    pub fn sequence(&self) -> &[String] { &self.sequence }
    pub fn len(&self) -> usize { self.terms.len() }
    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.weights.contains_key(term)
    }

    /// (term, weight) in term order.
    pub fn weighted_terms(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.terms.iter().map(|t| (t.as_str(), self.weight(t)))
    }

    /// Adds `delta` to the weight of `term`, appending it if new.
    pub fn add_weight(&mut self, term: String, delta: f64) {
        if !self.contains(&term) {
            self.sequence.push(term.clone());
        }
        self.accumulate(term, delta);
    }

    // Weight bookkeeping only; `sequence` is left to the caller.
    fn accumulate(&mut self, term: String, delta: f64) {
        match self.weights.get_mut(&term) {
            Some(w) => *w += delta,
            None => {
                self.weights.insert(term.clone(), delta);
                self.terms.push(term);
            }
        }
    }

    pub fn scale_weights(&mut self, factor: f64) {
        for w in self.weights.values_mut() {
            *w *= factor;
        }
    }
}
