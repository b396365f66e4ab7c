//! File store API server
//!
//! Serves the content-addressed file store over HTTP:
//!
//! - File upload, download and digests
//! - Stamping a stored image onto a stored PDF
//! - One-shot upload-and-stamp returning the PDF inline
//!
//! ## Identity
//!
//! When started with `--tokens`, every file endpoint requires a `token`
//! header. The token resolves to a client identity that prefixes the stored
//! file names, so clients only ever see their own files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use filestore_core::{IdentityResolver, StoreConfig, TokenTable, DEFAULT_MAX_UPLOAD_SIZE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod form;
mod handlers;
mod models;
mod state;

use state::AppState;

/// Room for multipart boundaries and text fields on top of the file parts
const FORM_OVERHEAD: u64 = 64 * 1024;

/// Command-line arguments for the file store server
#[derive(Parser, Debug)]
#[command(name = "filestore-api")]
#[command(about = "Content-addressed file store with PDF image stamping")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "FILESTORE_PORT", default_value = "8080")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "FILESTORE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory holding stored files
    #[arg(long, env = "FILESTORE_STORAGE_DIR", default_value = "/tmp")]
    storage_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "FILESTORE_MAX_UPLOAD_SIZE", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    max_upload_size: u64,

    /// JSON token table; enables per-client namespacing
    #[arg(long, env = "FILESTORE_TOKENS")]
    tokens: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the router with all routes and middleware
pub fn router(state: Arc<AppState>) -> Router {
    // Two file parts for the one-shot endpoint
    let body_limit = state
        .store
        .max_upload_size()
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Liveness
        .route("/test", get(handlers::hello))
        .route("/health", get(handlers::health))
        // Files
        .route("/files/upload", post(handlers::upload))
        .route("/files/download/:filename", get(handlers::download))
        .route("/files/hash/:filename", get(handlers::hash))
        // Stamping
        .route("/files/imgsignpdf", post(handlers::stamp))
        .route("/files/imgsignpdfonce", post(handlers::stamp_once))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let resolver = match &args.tokens {
        Some(path) => Some(Arc::new(TokenTable::load(path)?) as Arc<dyn IdentityResolver>),
        None => None,
    };

    let config = StoreConfig::new(&args.storage_dir).with_max_upload_size(args.max_upload_size);
    let state = Arc::new(AppState::new(config, resolver)?);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Max upload size: {} bytes", args.max_upload_size);

    axum::serve(listener, app).await?;

    Ok(())
}
