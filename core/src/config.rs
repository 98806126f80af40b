use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_INDEX_DIR: &str = "./data/tfidf";
pub const DEFAULT_MAX_FEATURES: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    English,
    None,
}

/// Settings the vector model is fitted with. Stored inside the persisted
/// model so a reloaded model analyzes queries the same way it was fitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    pub stop_words: StopWords,
    /// Inclusive (min_n, max_n) word n-gram range.
    pub ngram_range: (usize, usize),
    /// Vocabulary cap; `None` keeps every term.
    pub max_features: Option<usize>,
    pub stemming: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            stop_words: StopWords::English,
            ngram_range: (1, 2),
            max_features: Some(DEFAULT_MAX_FEATURES),
            stemming: false,
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 {
            return Err(IndexError::Config("ngram_range lower bound must be at least 1".into()));
        }
        if min_n > max_n {
            return Err(IndexError::Config(format!("ngram_range ({min_n}, {max_n}) is inverted")));
        }
        if self.max_features == Some(0) {
            return Err(IndexError::Config("max_features must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted artifact set. Created if absent.
    pub dir: PathBuf,
    pub vectorizer: VectorizerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(DEFAULT_INDEX_DIR), vectorizer: VectorizerConfig::default() }
    }
}

impl IndexConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), ..Default::default() }
    }

    pub fn with_vectorizer(mut self, vectorizer: VectorizerConfig) -> Self {
        self.vectorizer = vectorizer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.vectorizer.validate()
    }
}
