use serde::{Deserialize, Serialize};

/// Configuration for query evaluation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalization: Normalization,
    pub rocchio: RocchioConfig,
}

/// Rocchio blending constants: `alpha` scales the prior query, `beta` the relevant centroid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocchioConfig {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for RocchioConfig {
    fn default() -> Self {
        Self { alpha: 0.5, beta: 5.0 }
    }
}

/// How an accumulated tf-idf score is normalized by document length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// score / length
    #[default]
    DocLength,
    /// score / sqrt(length)
    SqrtDocLength,
    None,
}

impl Normalization {
    pub fn apply(self, score: f64, doc_length: f64) -> f64 {
        let denom = match self {
            Normalization::DocLength => doc_length,
            Normalization::SqrtDocLength => doc_length.sqrt(),
            Normalization::None => return score,
        };
        if denom > 0.0 { score / denom } else { score }
    }
}

/// Ingestion-time options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Keep the per-document term count table needed by relevance feedback.
    pub track_doc_terms: bool,
    /// Length assigned to documents whose length the caller did not set.
    pub length_metric: LengthMetric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { track_doc_terms: true, length_metric: LengthMetric::Euclidean }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMetric {
    /// sqrt of the sum of squared raw term counts
    #[default]
    Euclidean,
    /// number of indexed tokens
    TokenCount,
}
