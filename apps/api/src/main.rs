mod analysis;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::organizations::OrganizationCatalog;
use crate::analysis::sources::{DefaultFetcherFactory, ReaderSettings};
use crate::analysis::store::{PgRecordStore, RecordStore};
use crate::analysis::{AnalysisPipeline, PipelineSettings};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::gemini::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting culture-fit API v{}", env!("CARGO_PKG_VERSION"));

    let catalog = match &config.organizations_file {
        Some(path) => OrganizationCatalog::from_json_file(path)?,
        None => OrganizationCatalog::builtin(),
    };
    info!("Organization catalog loaded ({} organizations)", catalog.len());

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // One client serves both generation and the Files API
    let gemini = Arc::new(GeminiClient::new(config.google_api_key.clone()));
    info!("Gemini client initialized (model: {})", llm_client::gemini::MODEL);

    let fetchers = DefaultFetcherFactory::new(
        config.fetch_strategy,
        config.browser_timeout,
        ReaderSettings {
            proxy_url: config.reader_proxy_url.clone(),
            api_key: config.reader_api_key.clone(),
        },
        gemini.clone(),
    );
    info!("Content fetch strategy: {}", config.fetch_strategy);

    // PostgreSQL is optional; without it results are returned but never stored
    let store: Option<Arc<dyn RecordStore>> = match &config.database_url {
        Some(url) => Some(Arc::new(PgRecordStore::new(create_pool(url).await?))),
        None => {
            warn!("DATABASE_URL not set; persistence and stored comparisons are disabled");
            None
        }
    };

    let pipeline = AnalysisPipeline {
        generator: gemini.clone(),
        documents: gemini,
        objects: Arc::new(S3ObjectStore::new(s3, config.s3_bucket.clone())),
        fetchers: Arc::new(fetchers),
        catalog: Arc::new(catalog),
        store,
        settings: PipelineSettings {
            document_max_wait: config.document_max_wait,
            save_to_db: config.save_to_db,
        },
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for AWS, or for MinIO when `S3_ENDPOINT` is set.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()));

    if let (Some(key_id), Some(secret)) = (&config.aws_access_key_id, &config.aws_secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(key_id, secret, None, None, "culturefit-static"));
    }
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.s3_endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
