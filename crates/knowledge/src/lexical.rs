//! TF-IDF index over one airport's notices.
//!
//! Term weights are raw term frequency times smoothed IDF,
//! `ln((1 + N) / (1 + df)) + 1`, and every record vector is L2-normalized at
//! build time so query scoring is a sparse dot product. Maps are `BTreeMap`
//! so summation order, and therefore every score, is reproducible.

use crate::types::NoticeRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

type TermVector = BTreeMap<String, f32>;

/// Words that carry no retrieval signal in questions or notices.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "any", "there", "what", "whats", "when", "where", "how",
    "do", "does", "can", "i", "me", "my", "we", "our", "you", "your", "today", "currently",
    "please", "tell", "about", "right", "now",
];

/// NOTAM contractions expanded to the words people ask with.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("rwy", "runway"),
    ("twy", "taxiway"),
    ("clsd", "closed"),
    ("avbl", "available"),
    ("unavbl", "unavailable"),
    ("obst", "obstacle"),
    ("wip", "works"),
    ("lgt", "lighting"),
    ("apch", "approach"),
    ("ad", "aerodrome"),
];

/// Tokenize text for lexical scoring.
///
/// Lowercases, splits on non-alphanumerics, expands NOTAM contractions,
/// drops stop words and strips a plural `s`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == word)
                .map(|(_, long)| *long)
                .unwrap_or(word)
        })
        .filter(|word| !STOP_WORDS.contains(word))
        .map(stem)
        .collect()
}

fn stem(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, f32> {
    let mut tf = BTreeMap::new();
    for token in tokens {
        *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    tf
}

fn l2_normalize(vector: &mut TermVector) {
    let norm: f32 = vector.values().map(|w| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for weight in vector.values_mut() {
            *weight /= norm;
        }
    }
}

/// Precomputed TF-IDF vectors aligned with a record slice.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    idf: BTreeMap<String, f32>,
    vectors: Vec<TermVector>,
    doc_count: usize,
}

impl LexicalIndex {
    /// Build the index. `vectors[i]` belongs to `records[i]`.
    pub fn build(records: &[Arc<NoticeRecord>]) -> Self {
        let tokenized: Vec<Vec<String>> = records.iter().map(|r| tokenize(&r.text)).collect();
        let doc_count = records.len();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: BTreeSet<&String> = tokens.iter().collect();
            for term in unique {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let idf: BTreeMap<String, f32> = document_frequency
            .into_iter()
            .map(|(term, df)| (term, smoothed_idf(doc_count, df)))
            .collect();

        let vectors = tokenized
            .iter()
            .map(|tokens| {
                let mut vector: TermVector = term_frequencies(tokens)
                    .into_iter()
                    .map(|(term, tf)| {
                        let weight = tf * idf.get(term).copied().unwrap_or(0.0);
                        (term.to_string(), weight)
                    })
                    .collect();
                l2_normalize(&mut vector);
                vector
            })
            .collect();

        Self {
            idf,
            vectors,
            doc_count,
        }
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of distinct indexed terms.
    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Cosine similarity of the query against every record.
    ///
    /// Returns `(record position, score)` for records sharing at least one
    /// term with the query, in record order.
    pub fn score(&self, query_text: &str) -> Vec<(usize, f32)> {
        let tokens = tokenize(query_text);
        if tokens.is_empty() || self.vectors.is_empty() {
            return Vec::new();
        }

        // Terms outside the vocabulary cannot match but still count towards
        // the query norm.
        let mut query: TermVector = term_frequencies(&tokens)
            .into_iter()
            .map(|(term, tf)| {
                let idf = self
                    .idf
                    .get(term)
                    .copied()
                    .unwrap_or_else(|| smoothed_idf(self.doc_count, 0));
                (term.to_string(), tf * idf)
            })
            .collect();
        l2_normalize(&mut query);

        self.vectors
            .iter()
            .enumerate()
            .filter_map(|(position, document)| {
                let score: f32 = query
                    .iter()
                    .filter_map(|(term, weight)| document.get(term).map(|w| w * weight))
                    .sum();
                (score > 0.0).then_some((position, score))
            })
            .collect()
    }
}

fn smoothed_idf(doc_count: usize, df: usize) -> f32 {
    ((1.0 + doc_count as f32) / (1.0 + df as f32)).ln() + 1.0
}
