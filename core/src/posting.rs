//! Postings and the merge operations over doc-sorted posting lists.

use crate::{DocId, Position};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<Position>, // strictly increasing
    pub score: f64,
}

impl Posting {
    pub fn new(doc_id: DocId, position: Position) -> Self {
        Self { doc_id, positions: vec![position], score: 0.0 }
    }

    /// Number of occurrences of the term in this document.
    pub fn term_frequency(&self) -> usize {
        assert!(!self.positions.is_empty(), "posting for doc {} has no positions", self.doc_id);
        self.positions.len()
    }

    /// Copy of this posting carrying `score`, leaving `self` untouched.
    pub fn with_score(&self, score: f64) -> Self {
        Self { doc_id: self.doc_id, positions: self.positions.clone(), score }
    }
}

/// Postings for one term, strictly increasing by `doc_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.postings.len() }
    pub fn is_empty(&self) -> bool { self.postings.is_empty() }
    pub fn get(&self, i: usize) -> Option<&Posting> { self.postings.get(i) }
    pub fn last(&self) -> Option<&Posting> { self.postings.last() }
    pub fn iter(&self) -> std::slice::Iter<'_, Posting> { self.postings.iter() }
    pub fn as_slice(&self) -> &[Posting] { &self.postings }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.postings.iter().map(|p| p.doc_id).collect()
    }

    /// Appends a new posting, or extends the tail posting when it belongs to `doc_id`.
    /// Callers must add in non-decreasing `doc_id` order.
    pub fn add(&mut self, doc_id: DocId, position: Position) {
        match self.postings.last_mut() {
            Some(tail) if tail.doc_id == doc_id => {
                debug_assert!(tail.positions.last().map_or(true, |&p| p < position));
                tail.positions.push(position);
            }
            tail => {
                debug_assert!(tail.map_or(true, |t| t.doc_id < doc_id));
                self.postings.push(Posting::new(doc_id, position));
            }
        }
    }

    /// Appends a whole posting. A posting for the tail's document merges its positions into the tail.
    pub fn push(&mut self, posting: Posting) {
        match self.postings.last_mut() {
            Some(tail) if tail.doc_id == posting.doc_id => tail.positions.extend(posting.positions),
            _ => self.postings.push(posting),
        }
    }

    /// Documents present in both lists. Postings are taken from `a` as they are.
    pub fn intersect(a: &PostingList, b: &PostingList) -> PostingList {
        let mut answer = PostingList::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let (pa, pb) = (&a.postings[i], &b.postings[j]);
            match pa.doc_id.cmp(&pb.doc_id) {
                Ordering::Equal => {
                    answer.postings.push(pa.clone());
                    i += 1;
                    j += 1;
                }
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
            }
        }
        answer
    }

    /// Documents where a term of `a` is immediately followed by a term of `b`.
    /// Each match is recorded at the position of the `b` term, so folding this
    /// over a phrase keeps "end of the phrase matched so far" as the position.
    pub fn positional_intersect(a: &PostingList, b: &PostingList) -> PostingList {
        let mut answer = PostingList::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let (pa, pb) = (&a.postings[i], &b.postings[j]);
            match pa.doc_id.cmp(&pb.doc_id) {
                Ordering::Equal => {
                    adjacent_positions(&pa.positions, &pb.positions, |pos| answer.add(pa.doc_id, pos));
                    i += 1;
                    j += 1;
                }
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
            }
        }
        answer
    }

    /// Merges `other` into `self` by `doc_id`, summing scores of shared documents.
    pub fn union_with_score(&mut self, other: &PostingList) {
        if other.is_empty() {
            return;
        }
        let mine = std::mem::take(&mut self.postings);
        let mut merged = Vec::with_capacity(mine.len() + other.len());
        let mut theirs = other.postings.iter().peekable();
        for mut p in mine {
            while let Some(o) = theirs.next_if(|o| o.doc_id < p.doc_id) {
                merged.push(o.clone());
            }
            if let Some(o) = theirs.next_if(|o| o.doc_id == p.doc_id) {
                p.score += o.score;
            }
            merged.push(p);
        }
        merged.extend(theirs.cloned());
        self.postings = merged;
    }

    /// Stable sort by descending score. Equal scores (including 0.0 and -0.0) keep their order.
    pub fn sort_by_score(&mut self) {
        self.postings.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Posting> {
        self.postings.iter_mut()
    }
}

impl FromIterator<Posting> for PostingList {
    fn from_iter<I: IntoIterator<Item = Posting>>(iter: I) -> Self {
        let mut list = PostingList::new();
        for p in iter {
            list.push(p);
        }
        list
    }
}

impl IntoIterator for PostingList {
    type Item = Posting;
    type IntoIter = std::vec::IntoIter<Posting>;
    fn into_iter(self) -> Self::IntoIter { self.postings.into_iter() }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;
    fn into_iter(self) -> Self::IntoIter { self.postings.iter() }
}

// Streaming scan over two ascending position lists; calls `emit(p2)` for every p1 + 1 == p2.
fn adjacent_positions(first: &[Position], second: &[Position], mut emit: impl FnMut(Position)) {
    let (mut i, mut j) = (0, 0);
    while i < first.len() && j < second.len() {
        // compare as u64 so a position at Position::MAX cannot wrap to 0
        let (next, p2) = (u64::from(first[i]) + 1, u64::from(second[j]));
        match next.cmp(&p2) {
            Ordering::Equal => {
                emit(second[j]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(DocId, &[Position])]) -> PostingList {
        let mut pl = PostingList::new();
        for (doc, positions) in entries {
            for &pos in positions.iter() {
                pl.add(*doc, pos);
            }
        }
        pl
    }

    fn scored(entries: &[(DocId, f64)]) -> PostingList {
        entries
            .iter()
            .map(|&(doc, score)| Posting { doc_id: doc, positions: vec![0], score })
            .collect()
    }

    #[test]
    fn add_extends_tail_posting() {
        let pl = list(&[(1, &[0, 3]), (4, &[2])]);
        assert_eq!(pl.len(), 2);
        assert_eq!(pl.get(0).unwrap().positions, vec![0, 3]);
        assert_eq!(pl.get(1).unwrap().term_frequency(), 1);
    }

    #[test]
    fn intersect_keeps_common_docs_in_order() {
        let a = list(&[(1, &[0]), (3, &[1]), (5, &[2]), (9, &[0])]);
        let b = list(&[(2, &[0]), (3, &[4]), (9, &[7]), (11, &[0])]);
        let c = PostingList::intersect(&a, &b);
        assert_eq!(c.doc_ids(), vec![3, 9]);
        // postings come from the left operand untouched
        assert_eq!(c.get(0).unwrap().positions, vec![1]);
    }

    #[test]
    fn intersect_with_empty_is_empty() {
        let a = list(&[(1, &[0])]);
        assert!(PostingList::intersect(&a, &PostingList::new()).is_empty());
        assert!(PostingList::intersect(&PostingList::new(), &a).is_empty());
    }

    #[test]
    fn positional_intersect_finds_every_adjacent_pair() {
        let quick = list(&[(7, &[1, 5])]);
        let fox = list(&[(7, &[2, 6])]);
        let c = PostingList::positional_intersect(&quick, &fox);
        assert_eq!(c.doc_ids(), vec![7]);
        assert_eq!(c.get(0).unwrap().positions, vec![2, 6]);
    }

    #[test]
    fn positional_intersect_rejects_gaps() {
        let quick = list(&[(7, &[1, 5])]);
        let fox = list(&[(7, &[3, 6])]);
        let c = PostingList::positional_intersect(&quick, &fox);
        assert_eq!(c.get(0).unwrap().positions, vec![6]);

        let far = list(&[(7, &[4, 9])]);
        assert!(PostingList::positional_intersect(&quick, &far).is_empty());
    }

    #[test]
    fn positional_intersect_requires_order() {
        // "fox quick" does not match the phrase "quick fox"
        let quick = list(&[(1, &[3])]);
        let fox = list(&[(1, &[2])]);
        assert!(PostingList::positional_intersect(&quick, &fox).is_empty());
    }

    #[test]
    fn union_sums_shared_scores() {
        let mut a = scored(&[(1, 1.0), (4, 2.0)]);
        let b = scored(&[(0, 0.5), (4, 0.25), (8, 3.0)]);
        a.union_with_score(&b);
        assert_eq!(a.doc_ids(), vec![0, 1, 4, 8]);
        let scores: Vec<f64> = a.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0.5, 1.0, 2.25, 3.0]);
    }

    #[test]
    fn union_with_empty_is_identity() {
        let original = scored(&[(2, 0.3), (6, 0.7)]);
        let mut a = original.clone();
        a.union_with_score(&PostingList::new());
        assert_eq!(a, original);

        let mut empty = PostingList::new();
        empty.union_with_score(&original);
        assert_eq!(empty, original);
    }

    #[test]
    fn sort_by_score_is_stable_descending() {
        let mut a = scored(&[(1, 0.5), (2, 0.9), (3, 0.5), (4, 0.1)]);
        a.sort_by_score();
        assert_eq!(a.doc_ids(), vec![2, 1, 3, 4]);
    }

    #[test]
    fn sort_by_score_treats_signed_zeros_as_equal() {
        let mut a = scored(&[(1, -0.0), (2, 0.0), (3, 0.25)]);
        a.sort_by_score();
        assert_eq!(a.doc_ids(), vec![3, 1, 2]);
    }

    #[test]
    fn positional_intersect_at_max_position() {
        let a = list(&[(0, &[Position::MAX])]);
        let b = list(&[(0, &[0, 5])]);
        assert!(PostingList::positional_intersect(&a, &b).is_empty());

        let a = list(&[(0, &[Position::MAX - 1])]);
        let b = list(&[(0, &[Position::MAX])]);
        let c = PostingList::positional_intersect(&a, &b);
        assert_eq!(c.get(0).unwrap().positions, vec![Position::MAX]);
    }

    #[test]
    #[should_panic]
    fn empty_positions_are_an_invariant_violation() {
        let p = Posting { doc_id: 3, positions: vec![], score: 0.0 };
        p.term_frequency();
    }
}
