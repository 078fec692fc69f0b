//! TF-IDF over genre tag strings.
//!
//! Lowercased tokens of two or more word characters, raw term counts, smoothed
//! idf `ln((1 + n) / (1 + df)) + 1`, and rows scaled to unit length. The
//! vocabulary is sorted so column order is stable for a given corpus.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Splits text into lowercase tokens of at least two word characters.
///
/// Underscores count as word characters, so "indie_rock" stays one token.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// TF-IDF vocabulary and idf weights fit over one corpus
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfVectorizer {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Fits vocabulary and idf weights over `documents`
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let n = documents.len() as f64;

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let unique: BTreeSet<String> = tokenize(document.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        // BTreeMap iteration gives the sorted vocabulary
        let mut vocabulary = Vec::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (term, df) in doc_freq {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.push(term);
        }

        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        Self {
            vocabulary,
            index,
            idf,
        }
    }

    /// Unit-length TF-IDF vector of `document` over the fitted vocabulary
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocabulary.len()];

        for token in tokenize(document) {
            if let Some(&i) = self.index.get(&token) {
                vector[i] += 1.0;
            }
        }

        for (value, idf) in vector.iter_mut().zip(&self.idf) {
            *value *= idf;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }

        vector
    }

    pub fn fit_transform<S: AsRef<str>>(documents: &[S]) -> (Self, Vec<Vec<f64>>) {
        let vectorizer = Self::fit(documents);
        let vectors = documents
            .iter()
            .map(|d| vectorizer.transform(d.as_ref()))
            .collect();
        (vectorizer, vectors)
    }

    /// Vocabulary terms in column order
    pub fn feature_names(&self) -> &[String] {
        &self.vocabulary
    }
}
