//! TF-IDF vector model: vocabulary selection, smoothed idf weighting and
//! L2-normalized sparse document vectors.

use crate::config::VectorizerConfig;
use crate::tokenizer::analyze;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type TermId = u32;

/// Sparse vector with strictly increasing feature indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<TermId>,
    values: Vec<f64>,
}

impl SparseVector {
    fn from_sorted(entries: Vec<(TermId, f64)>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self { indices, values }
    }

    pub fn nnz(&self) -> usize { self.indices.len() }

    pub fn is_zero(&self) -> bool { self.indices.is_empty() }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Merge-join dot product over the shared indices.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut acc = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    fn is_well_formed(&self, dim: usize) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|w| w[0] < w[1])
            && self.indices.last().map_or(true, |&last| (last as usize) < dim)
            && self.values.iter().all(|v| v.is_finite())
    }
}

/// One weight vector per corpus document, in corpus order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatrix {
    dim: usize,
    rows: Vec<SparseVector>,
}

impl DocumentMatrix {
    pub fn rows(&self) -> &[SparseVector] { &self.rows }

    pub fn row(&self, i: usize) -> Option<&SparseVector> { self.rows.get(i) }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub(crate) fn check(&self, dim: usize) -> Result<(), String> {
        if self.dim != dim {
            return Err(format!("matrix has {} columns but vocabulary has {dim} terms", self.dim));
        }
        match self.rows.iter().position(|r| !r.is_well_formed(dim)) {
            Some(i) => Err(format!("matrix row {i} is malformed")),
            None => Ok(()),
        }
    }
}

/// Fitted weighting function over a bounded vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorModel {
    config: VectorizerConfig,
    vocabulary: HashMap<String, TermId>,
    idf: Vec<f64>,
    num_docs: usize,
}

impl VectorModel {
    pub fn config(&self) -> &VectorizerConfig { &self.config }

    pub fn vocabulary_size(&self) -> usize { self.vocabulary.len() }

    pub fn num_docs(&self) -> usize { self.num_docs }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.vocabulary.get(term).copied() }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_id(term).map(|id| self.idf[id as usize])
    }

    /// Project `text` into the fitted vocabulary space. Unknown terms are
    /// dropped; text with no known terms maps to the zero vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&analyze(text, &self.config))
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<TermId, u32> = HashMap::new();
        for term in terms {
            if let Some(&id) = self.vocabulary.get(term) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut entries: Vec<(TermId, f64)> = counts
            .into_iter()
            .map(|(id, tf)| (id, tf as f64 * self.idf[id as usize]))
            .collect();
        entries.sort_unstable_by_key(|e| e.0);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in entries.iter_mut() {
                *w /= norm;
            }
        }
        SparseVector::from_sorted(entries)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        self.config.validate().map_err(|e| e.to_string())?;
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!("{} idf weights for {} terms", self.idf.len(), self.vocabulary.len()));
        }
        let mut seen = HashSet::with_capacity(self.vocabulary.len());
        for &id in self.vocabulary.values() {
            if id as usize >= self.idf.len() || !seen.insert(id) {
                return Err(format!("vocabulary index {id} is out of range or repeated"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fitted {
    pub model: VectorModel,
    pub matrix: DocumentMatrix,
}

/// Fit a model over `texts` and weigh every text against it. An empty
/// corpus has no model.
pub fn fit<S: AsRef<str>>(texts: &[S], config: &VectorizerConfig) -> Option<Fitted> {
    if texts.is_empty() {
        return None;
    }
    let analyzed: Vec<Vec<String>> = texts.iter().map(|t| analyze(t.as_ref(), config)).collect();

    let mut term_freq: HashMap<&str, u64> = HashMap::new();
    let mut doc_freq: HashMap<&str, u32> = HashMap::new();
    for terms in &analyzed {
        let mut seen_in_doc: HashSet<&str> = HashSet::new();
        for term in terms {
            *term_freq.entry(term).or_insert(0) += 1;
            if seen_in_doc.insert(term) {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
    }

    let mut kept: Vec<&str> = term_freq.keys().copied().collect();
    if let Some(cap) = config.max_features {
        if kept.len() > cap {
            // most frequent first, lexicographic among equals
            kept.sort_unstable_by(|a, b| term_freq[b].cmp(&term_freq[a]).then_with(|| a.cmp(b)));
            kept.truncate(cap);
        }
    }
    kept.sort_unstable();

    let n = texts.len() as f64;
    let idf: Vec<f64> = kept
        .iter()
        .map(|t| ((1.0 + n) / (1.0 + doc_freq[t] as f64)).ln() + 1.0)
        .collect();
    let vocabulary: HashMap<String, TermId> = kept
        .iter()
        .enumerate()
        .map(|(i, t)| (t.to_string(), i as TermId))
        .collect();

    let model = VectorModel { config: config.clone(), vocabulary, idf, num_docs: texts.len() };
    let rows = analyzed.iter().map(|terms| model.weigh(terms)).collect();
    let matrix = DocumentMatrix { dim: model.vocabulary_size(), rows };
    Some(Fitted { model, matrix })
}
