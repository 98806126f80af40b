//! On-disk artifact set: `vectorizer.bin`, `matrix.bin` and `meta.json`.
//!
//! The three files are one logical unit. Every file carries the same
//! `generation`; a save stages all three as `*.tmp` siblings before renaming
//! any of them into place, and a load rejects a set whose generations differ.

use crate::error::{IndexError, Result};
use crate::index::{Corpus, DocId};
use crate::vectorizer::{DocumentMatrix, VectorModel};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;
const STAGING_EXT: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    generation: u64,
    payload: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub generation: u64,
    pub saved_at: String,
    pub ids: Vec<DocId>,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn vectorizer(&self) -> PathBuf { self.root.join("vectorizer.bin") }
    pub fn matrix(&self) -> PathBuf { self.root.join("matrix.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    fn artifacts(&self) -> [PathBuf; 3] { [self.vectorizer(), self.matrix(), self.meta()] }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(STAGING_EXT);
    path.with_file_name(name)
}

/// A complete in-memory artifact set ready to be written or just read back.
#[derive(Debug)]
pub struct ArtifactSet {
    pub generation: u64,
    pub model: VectorModel,
    pub matrix: DocumentMatrix,
    pub corpus: Corpus,
}

pub fn ensure_dir(paths: &IndexPaths) -> Result<()> {
    fs::create_dir_all(&paths.root).map_err(|e| IndexError::io(&paths.root, e))
}

/// Write all three artifacts under `generation`. Nothing is renamed into
/// place until every staged file has been written and synced.
pub fn save_artifacts(
    paths: &IndexPaths,
    generation: u64,
    model: &VectorModel,
    matrix: &DocumentMatrix,
    corpus: &Corpus,
) -> Result<()> {
    ensure_dir(paths)?;
    let vectorizer_bytes = bincode::serialize(&Envelope { version: FORMAT_VERSION, generation, payload: model })?;
    let matrix_bytes = bincode::serialize(&Envelope { version: FORMAT_VERSION, generation, payload: matrix })?;
    let meta = MetaFile {
        version: FORMAT_VERSION,
        generation,
        saved_at: now_rfc3339(),
        ids: corpus.ids().collect(),
        texts: corpus.texts().map(str::to_string).collect(),
    };
    let meta_bytes = serde_json::to_vec(&meta)?;

    let staged = [
        (paths.vectorizer(), vectorizer_bytes),
        (paths.matrix(), matrix_bytes),
        (paths.meta(), meta_bytes),
    ];
    for (path, bytes) in staged.iter() {
        if let Err(e) = write_synced(&staging_path(path), bytes) {
            discard_staged(paths);
            return Err(e);
        }
    }
    for (path, _) in staged.iter() {
        let tmp = staging_path(path);
        if let Err(e) = fs::rename(&tmp, path) {
            discard_staged(paths);
            return Err(IndexError::io(path, e));
        }
    }
    sync_dir(&paths.root)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path).map_err(|e| IndexError::io(path, e))?;
    f.write_all(bytes).map_err(|e| IndexError::io(path, e))?;
    f.sync_all().map_err(|e| IndexError::io(path, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| IndexError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Leading fields shared by both envelopes and `MetaFile`.
#[derive(Deserialize)]
struct Header {
    version: u32,
    generation: u64,
}

fn read_header(path: &Path, json: bool) -> Option<u64> {
    let bytes = fs::read(path).ok()?;
    let header: Header = if json {
        serde_json::from_slice(&bytes).ok()?
    } else {
        bincode::deserialize_from(&bytes[..]).ok()?
    };
    (header.version == FORMAT_VERSION).then_some(header.generation)
}

/// Finish a save that was interrupted between renames.
///
/// Staged files are rolled forward only when they all share one generation,
/// every artifact without a staged copy is already at that generation, and at
/// least one artifact was renamed into place. Anything else is left for
/// [`discard_staged`]. Returns the recovered generation.
pub fn recover_staged(paths: &IndexPaths) -> Result<Option<u64>> {
    let mut target = None;
    let mut staged = Vec::new();
    let mut renamed_any = false;
    for (i, path) in paths.artifacts().into_iter().enumerate() {
        let json = i == 2;
        let tmp = staging_path(&path);
        let generation = if tmp.exists() {
            staged.push((tmp.clone(), path));
            read_header(&tmp, json)
        } else {
            let generation = read_header(&path, json);
            renamed_any |= generation.is_some();
            generation
        };
        let Some(generation) = generation else { return Ok(None) };
        if *target.get_or_insert(generation) != generation {
            return Ok(None);
        }
    }
    if staged.is_empty() || !renamed_any {
        return Ok(None);
    }
    for (tmp, path) in &staged {
        fs::rename(tmp, path).map_err(|e| IndexError::io(path, e))?;
    }
    sync_dir(&paths.root)?;
    Ok(target)
}

/// Remove staging files left behind by an interrupted save.
pub fn discard_staged(paths: &IndexPaths) {
    for path in paths.artifacts() {
        let tmp = staging_path(&path);
        if tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %e, "could not remove staged artifact");
            }
        }
    }
}

/// Read the artifact set. `Ok(None)` when any of the three files is missing;
/// `Err(Corrupt)` when they are present but unreadable or disagree.
pub fn load_artifacts(paths: &IndexPaths) -> Result<Option<ArtifactSet>> {
    if !paths.artifacts().iter().all(|p| p.exists()) {
        return Ok(None);
    }
    let model: Envelope<VectorModel> = read_bincode(&paths.vectorizer())?;
    let matrix: Envelope<DocumentMatrix> = read_bincode(&paths.matrix())?;
    let meta_bytes = fs::read(paths.meta()).map_err(|e| IndexError::io(paths.meta(), e))?;
    let meta: MetaFile = serde_json::from_slice(&meta_bytes)
        .map_err(|e| IndexError::Corrupt(format!("meta.json: {e}")))?;

    for version in [model.version, matrix.version, meta.version] {
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!("unsupported format version {version}")));
        }
    }
    let generation = meta.generation;
    if model.generation != generation || matrix.generation != generation {
        return Err(IndexError::Corrupt(format!(
            "generation mismatch: vectorizer {}, matrix {}, meta {}",
            model.generation, matrix.generation, generation
        )));
    }

    let corpus = Corpus::from_parts(meta.ids, meta.texts)
        .ok_or_else(|| IndexError::Corrupt("meta.json ids and texts disagree".into()))?;
    let (model, matrix) = (model.payload, matrix.payload);
    model.check().map_err(IndexError::Corrupt)?;
    matrix.check(model.vocabulary_size()).map_err(IndexError::Corrupt)?;
    if matrix.len() != corpus.len() || model.num_docs() != corpus.len() {
        return Err(IndexError::Corrupt(format!(
            "{} matrix rows for {} documents",
            matrix.len(),
            corpus.len()
        )));
    }
    Ok(Some(ArtifactSet { generation, model, matrix, corpus }))
}

fn read_bincode<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = fs::read(path).map_err(|e| IndexError::io(path, e))?;
    bincode::deserialize(&buf).map_err(|e| IndexError::Corrupt(format!("{}: {e}", path.display())))
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorizerConfig;
    use crate::vectorizer::fit;
    use tempfile::tempdir;

    /// Put `path` back in its staged state with `previous` as the live file.
    fn unrename(path: &Path, previous: &[u8]) {
        fs::rename(path, staging_path(path)).unwrap();
        fs::write(path, previous).unwrap();
    }

    fn sample() -> (VectorModel, DocumentMatrix, Corpus) {
        let mut corpus = Corpus::new();
        corpus.add_bulk(vec![(10, "tasty noodles".to_string()), (20, "slow noodles delivery".to_string())]);
        let texts: Vec<&str> = corpus.texts().collect();
        let fitted = fit(&texts, &VectorizerConfig::default()).unwrap();
        (fitted.model, fitted.matrix, corpus)
    }

    #[test]
    fn missing_set_is_absent() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(load_artifacts(&paths).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 4, &model, &matrix, &corpus).unwrap();

        let set = load_artifacts(&paths).unwrap().unwrap();
        assert_eq!(set.generation, 4);
        assert_eq!(set.model, model);
        assert_eq!(set.matrix, matrix);
        assert_eq!(set.corpus.ids().collect::<Vec<_>>(), vec![10, 20]);
        for path in paths.artifacts() {
            assert!(!staging_path(&path).exists());
        }
    }

    #[test]
    fn partial_set_is_absent() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        fs::remove_file(paths.matrix()).unwrap();
        assert!(load_artifacts(&paths).unwrap().is_none());
    }

    #[test]
    fn mixed_generations_are_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        let old_matrix = fs::read(paths.matrix()).unwrap();
        save_artifacts(&paths, 2, &model, &matrix, &corpus).unwrap();
        fs::write(paths.matrix(), old_matrix).unwrap();

        let err = load_artifacts(&paths).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(ref m) if m.contains("generation")));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        fs::write(paths.vectorizer(), b"not bincode").unwrap();
        assert!(matches!(load_artifacts(&paths), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn staging_path_appends_extension() {
        let p = staging_path(Path::new("/data/tfidf/meta.json"));
        assert_eq!(p, PathBuf::from("/data/tfidf/meta.json.tmp"));
    }

    #[test]
    fn interrupted_renames_roll_forward() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        let old_matrix = fs::read(paths.matrix()).unwrap();
        let old_meta = fs::read(paths.meta()).unwrap();
        save_artifacts(&paths, 2, &model, &matrix, &corpus).unwrap();
        // vectorizer.bin was renamed, matrix.bin and meta.json were not
        unrename(&paths.matrix(), &old_matrix);
        unrename(&paths.meta(), &old_meta);

        assert_eq!(recover_staged(&paths).unwrap(), Some(2));
        assert_eq!(load_artifacts(&paths).unwrap().unwrap().generation, 2);
        for path in paths.artifacts() {
            assert!(!staging_path(&path).exists());
        }
    }

    #[test]
    fn staging_without_renames_is_not_recovered() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        let old = paths.artifacts().map(|p| fs::read(p).unwrap());
        save_artifacts(&paths, 2, &model, &matrix, &corpus).unwrap();
        for (path, bytes) in paths.artifacts().iter().zip(old.iter()) {
            unrename(path, bytes);
        }

        assert_eq!(recover_staged(&paths).unwrap(), None);
        discard_staged(&paths);
        assert_eq!(load_artifacts(&paths).unwrap().unwrap().generation, 1);
    }

    #[test]
    fn truncated_staged_file_is_not_recovered() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let (model, matrix, corpus) = sample();
        save_artifacts(&paths, 1, &model, &matrix, &corpus).unwrap();
        fs::write(staging_path(&paths.matrix()), b"\x01").unwrap();
        assert_eq!(recover_staged(&paths).unwrap(), None);
    }
}
