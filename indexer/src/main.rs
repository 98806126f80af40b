use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use textdex_core::config::{DEFAULT_INDEX_DIR, DEFAULT_MAX_FEATURES};
use textdex_core::{DocId, IndexConfig, SearchIndex, StopWords};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: DocId,
    text: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load documents into a TF-IDF search index and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add documents from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Index directory
        #[arg(long, default_value = DEFAULT_INDEX_DIR)]
        index: String,
        /// Vocabulary size cap
        #[arg(long, default_value_t = DEFAULT_MAX_FEATURES)]
        max_features: usize,
        /// Keep English stop words in the vocabulary
        #[arg(long, default_value_t = false)]
        no_stop_words: bool,
        /// Stem terms before counting them
        #[arg(long, default_value_t = false)]
        stemming: bool,
    },
    /// Run a query against an existing index
    Query {
        #[arg(long, default_value = DEFAULT_INDEX_DIR)]
        index: String,
        /// Query text
        #[arg(long)]
        q: String,
        /// Number of results
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=20))]
        k: u8,
    },
    /// Print what the index directory currently holds
    Status {
        #[arg(long, default_value = DEFAULT_INDEX_DIR)]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, index, max_features, no_stop_words, stemming } => {
            let mut config = IndexConfig::new(&index);
            config.vectorizer.max_features = Some(max_features);
            config.vectorizer.stemming = stemming;
            if no_stop_words {
                config.vectorizer.stop_words = StopWords::None;
            }
            build_index(Path::new(&input), config)
        }
        Commands::Query { index, q, k } => {
            let index = SearchIndex::open(IndexConfig::new(&index))?;
            for hit in index.query(&q, k as usize) {
                println!("{}\t{:.6}", hit.id, hit.score);
            }
            Ok(())
        }
        Commands::Status { index } => {
            let index = SearchIndex::open(IndexConfig::new(&index))?;
            println!("dir:        {}", index.dir().display());
            println!("state:      {:?}", index.state());
            println!("documents:  {}", index.len());
            println!("terms:      {}", index.vocabulary_size());
            println!("generation: {}", index.generation());
            Ok(())
        }
    }
}

fn build_index(input: &Path, config: IndexConfig) -> Result<()> {
    let files = collect_inputs(input);
    let mut docs: Vec<(DocId, String)> = Vec::new();
    for file in &files {
        let before = docs.len();
        let read = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut docs)
        } else {
            read_json(file, &mut docs)
        };
        read.with_context(|| format!("reading {}", file.display()))?;
        tracing::debug!(file = %file.display(), docs = docs.len() - before, "read input");
    }
    tracing::info!(files = files.len(), docs = docs.len(), "collected documents");

    let index = SearchIndex::open(config)?;
    let report = index.add_bulk(docs)?;
    tracing::info!(accepted = report.accepted, skipped = report.skipped, total = index.len(), "index build complete");
    println!("ingested {} skipped {} (index now holds {})", report.accepted, report.skipped, index.len());
    Ok(())
}

fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_jsonl(file: &Path, docs: &mut Vec<(DocId, String)>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        docs.push((doc.id, doc.text));
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<(DocId, String)>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                docs.push((doc.id, doc.text));
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            docs.push((doc.id, doc.text));
        }
        _ => {}
    }
    Ok(())
}
