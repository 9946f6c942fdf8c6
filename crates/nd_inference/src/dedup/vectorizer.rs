//! TF-IDF vectorization of a single article batch.
//!
//! The vocabulary is fitted on the batch being vectorized and thrown away with
//! it; nothing carries over between runs.

use std::collections::{BTreeMap, HashMap, HashSet};

use lazy_static::lazy_static;
use nd_core::{Article, DedupConfig};
use regex::Regex;

use super::stop_words::is_stop_word;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("valid regex");
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Dense feature vector, one per article, all of the batch's vocabulary size.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    stop_words: bool,
    max_body_chars: Option<usize>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl TfidfVectorizer {
    pub fn from_config(config: &DedupConfig) -> Self {
        Self {
            max_features: config.max_features.max(1),
            stop_words: config.stop_words,
            max_body_chars: config.max_body_chars,
        }
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features.max(1);
        self
    }

    /// Fit a fresh vocabulary on `batch` and return one vector per article,
    /// in input order.
    pub fn fit_transform(&self, batch: &[Article]) -> Vec<FeatureVector> {
        if batch.is_empty() {
            return Vec::new();
        }

        let documents: Vec<Vec<String>> = batch
            .iter()
            .map(|article| self.terms(&self.document_text(article)))
            .collect();

        let vocabulary = self.fit_vocabulary(&documents);
        let idf = inverse_document_frequencies(&documents, &vocabulary);

        documents
            .iter()
            .map(|terms| {
                let mut values = vec![0.0f32; vocabulary.len()];
                for term in terms {
                    if let Some(&index) = vocabulary.get(term) {
                        values[index] += 1.0;
                    }
                }
                for (value, weight) in values.iter_mut().zip(&idf) {
                    *value *= *weight as f32;
                }
                l2_normalize(&mut values);
                FeatureVector::new(values)
            })
            .collect()
    }

    /// Title and (possibly truncated) body, cleaned for tokenization.
    pub fn document_text(&self, article: &Article) -> String {
        let body: String = match self.max_body_chars {
            Some(limit) => article.body_text.chars().take(limit).collect(),
            None => article.body_text.clone(),
        };
        preprocess(&format!("{} {}", article.title, body))
    }

    /// Unigrams followed by bigrams of the cleaned text.
    fn terms(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = text
            .split(' ')
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| !(self.stop_words && is_stop_word(t)))
            .collect();

        let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
        terms
    }

    /// Keeps the `max_features` most frequent terms (ties by term) and indexes
    /// them in lexicographic order.
    fn fit_vocabulary(&self, documents: &[Vec<String>]) -> HashMap<String, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for terms in documents {
            for term in terms {
                *counts.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let selected: BTreeMap<&str, ()> = ranked.into_iter().map(|(term, _)| (term, ())).collect();
        selected
            .into_keys()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect()
    }
}

/// Strip markup and punctuation, collapse whitespace, lower-case.
pub fn preprocess(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = HTML_TAG.replace_all(text, "");
    let text = NON_WORD.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_lowercase()
}

/// Smoothed idf: `ln((1 + n) / (1 + df)) + 1`, indexed like the vocabulary.
fn inverse_document_frequencies(documents: &[Vec<String>], vocabulary: &HashMap<String, usize>) -> Vec<f64> {
    let mut df = vec![0usize; vocabulary.len()];
    for terms in documents {
        let seen: HashSet<usize> = terms.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
        for index in seen {
            df[index] += 1;
        }
    }

    let n = documents.len() as f64;
    df.into_iter()
        .map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
        .collect()
}

fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| f64::from(*v) * f64::from(*v)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value = (f64::from(*value) / norm) as f32;
        }
    }
}
