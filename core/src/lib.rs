pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod ranker;
pub mod search_index;
pub mod tokenizer;
pub mod vectorizer;

pub use config::{IndexConfig, StopWords, VectorizerConfig};
pub use error::{IndexError, Result};
pub use index::{Corpus, DocId, Document, IngestReport};
pub use search_index::{Hit, IndexSnapshot, IndexState, SearchIndex};
pub use vectorizer::{DocumentMatrix, SparseVector, TermId, VectorModel};
