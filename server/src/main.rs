use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use textdex_core::{IndexConfig, SearchIndex, StopWords};
use textdex_server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = textdex_core::config::DEFAULT_INDEX_DIR)]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Vocabulary size cap applied on rebuild
    #[arg(long, default_value_t = textdex_core::config::DEFAULT_MAX_FEATURES)]
    max_features: usize,
    /// Keep English stop words in the vocabulary
    #[arg(long, default_value_t = false)]
    no_stop_words: bool,
    /// Stem terms before counting them
    #[arg(long, default_value_t = false)]
    stemming: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = IndexConfig::new(&args.index);
    config.vectorizer.max_features = Some(args.max_features);
    config.vectorizer.stemming = args.stemming;
    if args.no_stop_words {
        config.vectorizer.stop_words = StopWords::None;
    }
    let index = Arc::new(SearchIndex::open(config)?);
    tracing::info!(documents = index.len(), dir = %index.dir().display(), "index ready");

    let api_key = std::env::var("API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("API_KEY not set; /ingest and /search will reject every request");
    }
    let app: Router = build_app(index, api_key);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
