use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context as _;
use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use clap::Parser;
use clap_verbosity_flag::{log::LevelFilter, InfoLevel, Verbosity};
use figment::{providers::Format as _, Figment};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use super::auth::PlaceholderAdminAuth;
use super::config::{AppConfig, CorsConfig};
pub use super::error::Error;
use super::reports::ReportService;
use super::store::ReportStore;

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Port used when the configuration does not name a listen address.
const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub struct AppState {
    /// Report operations over the shared database pool.
    pub reports: ReportService,
    /// The admin login check.
    pub admin: PlaceholderAdminAuth,
}

impl AppState {
    pub fn new(config: &AppConfig, store: ReportStore) -> Self {
        Self {
            reports: ReportService::new(store, config.code_attempts),
            admin: PlaceholderAdminAuth::new(config.admin.clone()),
        }
    }
}

/// Allow credentialed requests from exactly one origin.
fn cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(&config.origin)
        .with_context(|| format!("invalid CORS origin {:?}", config.origin))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Build the full HTTP router.
pub fn app(config: &AppConfig, state: AppState) -> anyhow::Result<Router> {
    Ok(Router::new()
        .route("/", get(super::index))
        .merge(super::endpoints::routes())
        .layer(cors_layer(&config.cors)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Resolves once the process is asked to stop.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    if !args.config.exists() {
        // Not fatal: every setting can also come from the environment.
        warn!(
            "configuration file {} does not exist",
            args.config.display()
        );
    }

    // Read and parse the user-provided configuration.
    let config: AppConfig = Figment::new()
        .admerge(figment::providers::Toml::file(args.config))
        .admerge(figment::providers::Env::prefixed("ANONREPORT_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    super::metrics::setup(config.metrics.as_ref())
        .context("failed to set up metrics exporter")?;

    // A store that cannot be reached at startup is fatal.
    let store = ReportStore::open(&config.db)
        .await
        .context("failed to open report database")?;

    let app = app(&config, AppState::new(&config, store.clone()))?;

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT));
    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    info!("listening on {addr}");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("failed to serve app");

    store.close().await;
    served
}
