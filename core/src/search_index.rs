//! The shared, mutable search index.
//!
//! Readers take a cheap clone of the current `Arc<IndexSnapshot>` and score
//! against it without holding a lock. Writers are serialized by `writer`:
//! each batch clones the corpus, refits, persists, and only then swaps the
//! published snapshot, so a reader sees either the old triple or the new one.

use crate::config::{IndexConfig, VectorizerConfig};
use crate::error::Result;
use crate::index::{Corpus, DocId, IngestReport};
use crate::persist::{discard_staged, ensure_dir, load_artifacts, recover_staged, save_artifacts, IndexPaths};
use crate::ranker;
use crate::vectorizer::{fit, Fitted};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    pub id: DocId,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Empty,
    Fitted,
}

/// Immutable (corpus, model, matrix) triple published by the last rebuild.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    corpus: Corpus,
    fitted: Option<Fitted>,
    generation: u64,
}

impl IndexSnapshot {
    pub fn corpus(&self) -> &Corpus { &self.corpus }

    pub fn fitted(&self) -> Option<&Fitted> { self.fitted.as_ref() }

    pub fn generation(&self) -> u64 { self.generation }

    pub fn state(&self) -> IndexState {
        if self.fitted.is_some() { IndexState::Fitted } else { IndexState::Empty }
    }

    pub fn query(&self, text: &str, top_k: usize) -> Vec<Hit> {
        let Some(fitted) = &self.fitted else {
            return Vec::new();
        };
        let q = fitted.model.transform(text);
        let docs = self.corpus.documents();
        ranker::top_k(&q, &fitted.matrix, top_k)
            .into_iter()
            .map(|(row, score)| Hit { id: docs[row].id, score: score.min(1.0) })
            .collect()
    }
}

pub struct SearchIndex {
    paths: IndexPaths,
    config: VectorizerConfig,
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
}

impl SearchIndex {
    /// Create the index directory if needed and load whatever artifact set
    /// it holds. A missing or unreadable set leaves the index empty.
    pub fn open(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let paths = IndexPaths::new(&config.dir);
        ensure_dir(&paths)?;
        let index = Self {
            paths,
            config: config.vectorizer,
            current: RwLock::new(Arc::new(IndexSnapshot::default())),
            writer: Mutex::new(()),
        };
        index.load();
        Ok(index)
    }

    fn load(&self) {
        let _guard = self.writer.lock();
        match recover_staged(&self.paths) {
            Ok(Some(generation)) => info!(generation, "completed interrupted save"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not complete interrupted save"),
        }
        discard_staged(&self.paths);
        match load_artifacts(&self.paths) {
            Ok(Some(set)) => {
                if set.model.config() != &self.config {
                    info!("persisted model was fitted with different settings; they apply until the next rebuild");
                }
                info!(
                    documents = set.corpus.len(),
                    terms = set.model.vocabulary_size(),
                    generation = set.generation,
                    "loaded index from disk"
                );
                let fitted = Fitted { model: set.model, matrix: set.matrix };
                *self.current.write() = Arc::new(IndexSnapshot {
                    corpus: set.corpus,
                    fitted: Some(fitted),
                    generation: set.generation,
                });
            }
            Ok(None) => info!(dir = %self.paths.root.display(), "no persisted index, starting empty"),
            Err(e) => warn!(dir = %self.paths.root.display(), error = %e, "failed loading index artifacts, starting empty"),
        }
    }

    /// Add documents whose ids are new, then refit and persist. Known ids are
    /// skipped. On a write failure nothing is published and the error is
    /// returned; the batch can be retried.
    pub fn add_bulk<I>(&self, items: I) -> Result<IngestReport>
    where
        I: IntoIterator<Item = (DocId, String)>,
    {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let mut corpus = current.corpus.clone();
        let report = corpus.add_bulk(items);
        debug!(accepted = report.accepted, skipped = report.skipped, "ingestion batch");
        if report.accepted == 0 {
            return Ok(report);
        }

        let texts: Vec<&str> = corpus.texts().collect();
        let fitted = fit(&texts, &self.config);
        let generation = current.generation + 1;
        if let Some(f) = &fitted {
            if let Err(e) = save_artifacts(&self.paths, generation, &f.model, &f.matrix, &corpus) {
                error!(error = %e, generation, "failed persisting index, batch not applied");
                return Err(e);
            }
            info!(
                documents = corpus.len(),
                terms = f.model.vocabulary_size(),
                generation,
                "rebuilt and persisted index"
            );
        }

        *self.current.write() = Arc::new(IndexSnapshot { corpus, fitted, generation });
        Ok(report)
    }

    /// Top-`top_k` documents by cosine similarity; empty when nothing matches
    /// or the index has not been fitted.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<Hit> {
        let hits = self.snapshot().query(text, top_k);
        debug!(hits = hits.len(), top_k, "query");
        hits
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn state(&self) -> IndexState { self.snapshot().state() }

    pub fn len(&self) -> usize { self.snapshot().corpus.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn generation(&self) -> u64 { self.snapshot().generation }

    pub fn vocabulary_size(&self) -> usize {
        self.snapshot().fitted.as_ref().map_or(0, |f| f.model.vocabulary_size())
    }

    pub fn get(&self, id: DocId) -> Option<String> {
        self.snapshot().corpus.get(id).map(|d| d.text.clone())
    }

    pub fn dir(&self) -> &Path { &self.paths.root }
}
