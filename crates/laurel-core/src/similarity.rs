//! Text similarity functions for key-turn selection
//!
//! Three term-overlap metrics over whitespace tokens, all returning a
//! score in [0.0, 1.0]:
//! - jaccard: intersection / union of word sets
//! - overlap: intersection / min of set sizes
//! - weighted: TF-IDF style cosine that prioritizes less common terms
//!
//! All functions are pure and never touch I/O.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Available similarity metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimilarityMethod {
    #[default]
    Jaccard,
    Overlap,
    Weighted,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Jaccard => "jaccard",
            SimilarityMethod::Overlap => "overlap",
            SimilarityMethod::Weighted => "weighted",
        }
    }
}

impl FromStr for SimilarityMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jaccard" => Ok(SimilarityMethod::Jaccard),
            "overlap" => Ok(SimilarityMethod::Overlap),
            "weighted" => Ok(SimilarityMethod::Weighted),
            _ => Err(anyhow::anyhow!(
                "Unknown similarity method: {}. Use 'jaccard', 'weighted', or 'overlap'",
                s
            )),
        }
    }
}

/// Lowercase and split on whitespace. No stemming, no punctuation stripping.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity: |A ∩ B| / |A ∪ B| over word sets.
pub fn jaccard_similarity(text_a: &str, text_b: &str) -> f64 {
    let words_a: HashSet<String> = tokenize(text_a).into_iter().collect();
    let words_b: HashSet<String> = tokenize(text_b).into_iter().collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();

    intersection as f64 / union as f64
}

/// Overlap coefficient: |A ∩ B| / min(|A|, |B|).
///
/// Useful when one text is much shorter than the other.
pub fn overlap_similarity(text_a: &str, text_b: &str) -> f64 {
    let words_a: HashSet<String> = tokenize(text_a).into_iter().collect();
    let words_b: HashSet<String> = tokenize(text_b).into_iter().collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let min_size = words_a.len().min(words_b.len());

    intersection as f64 / min_size as f64
}

/// TF-IDF weighted cosine similarity.
///
/// Document frequency is built over `corpus` when supplied, otherwise
/// over the two texts themselves. Per-term IDF is `ln(num_docs/df) + 1`
/// so common terms still carry some weight.
pub fn weighted_similarity(text_a: &str, text_b: &str, corpus: Option<&[String]>) -> f64 {
    let words_a = tokenize(text_a);
    let words_b = tokenize(text_b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let fallback;
    let docs: &[String] = match corpus {
        Some(c) => c,
        None => {
            fallback = [text_a.to_string(), text_b.to_string()];
            &fallback
        }
    };

    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let unique: HashSet<String> = tokenize(doc).into_iter().collect();
        for word in unique {
            *doc_freq.entry(word).or_insert(0) += 1;
        }
    }
    let num_docs = docs.len();

    let idf = |term: &str| -> f64 {
        match doc_freq.get(term) {
            Some(&df) if df > 0 => (num_docs as f64 / df as f64).ln() + 1.0,
            _ => 0.0,
        }
    };

    let mut tf_a: HashMap<&str, usize> = HashMap::new();
    for word in &words_a {
        *tf_a.entry(word.as_str()).or_insert(0) += 1;
    }
    let mut tf_b: HashMap<&str, usize> = HashMap::new();
    for word in &words_b {
        *tf_b.entry(word.as_str()).or_insert(0) += 1;
    }

    let all_terms: HashSet<&str> = tf_a.keys().chain(tf_b.keys()).copied().collect();

    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;
    for term in all_terms {
        let weight = idf(term);
        let score_a = tf_a.get(term).copied().unwrap_or(0) as f64 * weight;
        let score_b = tf_b.get(term).copied().unwrap_or(0) as f64 * weight;
        dot += score_a * score_b;
        mag_a += score_a * score_a;
        mag_b += score_b * score_b;
    }

    let mag_a = mag_a.sqrt();
    let mag_b = mag_b.sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Compute similarity between two texts using the given method.
///
/// `corpus` only affects the weighted method and is ignored otherwise.
pub fn compute_similarity(
    text_a: &str,
    text_b: &str,
    method: SimilarityMethod,
    corpus: Option<&[String]>,
) -> f64 {
    match method {
        SimilarityMethod::Jaccard => jaccard_similarity(text_a, text_b),
        SimilarityMethod::Overlap => overlap_similarity(text_a, text_b),
        SimilarityMethod::Weighted => weighted_similarity(text_a, text_b, corpus),
    }
}
