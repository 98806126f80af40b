use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub type DocId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub skipped: usize,
}

/// Insertion-ordered document registry. Row `i` of the document matrix
/// always describes `documents()[i]`.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    docs: Vec<Document>,
    /// id -> row in `docs`
    ids: HashMap<DocId, usize>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    /// Rebuild a corpus from parallel id/text columns. Returns `None` when the
    /// columns disagree in length or an id repeats.
    pub fn from_parts(ids: Vec<DocId>, texts: Vec<String>) -> Option<Self> {
        if ids.len() != texts.len() {
            return None;
        }
        let mut corpus = Corpus::new();
        for (id, text) in ids.into_iter().zip(texts) {
            if !corpus.push(id, text) {
                return None;
            }
        }
        Some(corpus)
    }

    /// Append every item whose id is not already present, keeping input order.
    /// Ids repeated inside `items` are accepted once.
    pub fn add_bulk<I>(&mut self, items: I) -> IngestReport
    where
        I: IntoIterator<Item = (DocId, String)>,
    {
        let mut report = IngestReport::default();
        for (id, text) in items {
            if self.push(id, text) {
                report.accepted += 1;
            } else {
                report.skipped += 1;
            }
        }
        report
    }

    fn push(&mut self, id: DocId, text: String) -> bool {
        match self.ids.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.docs.len());
                self.docs.push(Document { id, text });
                true
            }
        }
    }

    pub fn contains(&self, id: DocId) -> bool { self.ids.contains_key(&id) }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.ids.get(&id).map(|&row| &self.docs[row])
    }

    pub fn documents(&self) -> &[Document] { &self.docs }

    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ { self.docs.iter().map(|d| d.id) }

    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ { self.docs.iter().map(|d| d.text.as_str()) }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}
