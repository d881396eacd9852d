use crate::Position;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
}

/// Tokenize text into (term, position): word extraction and lowercasing only.
/// Positions are token offsets, so adjacent words have consecutive positions.
pub fn tokenize(text: &str) -> Vec<(String, Position)> {
    RE.find_iter(text)
        .enumerate()
        .map(|(pos, mat)| (mat.as_str().to_lowercase(), pos as Position))
        .collect()
}

/// Terms of a query string, in order, repeats kept.
pub fn query_terms(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|(term, _)| term).collect()
}
