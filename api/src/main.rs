use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use mimalloc::MiMalloc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::intel::enrich::Enricher;
use crate::intel::score::ScoredItem;
use crate::kv::Kv;

mod config;
mod error;
mod intel;
mod kv;
mod retry;
mod signing;
mod utils;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USER_AGENT: &str = concat!("intel-api/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct App {
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
    pub kv: Arc<Kv>,
    pub snapshots: Arc<retainer::Cache<String, Arc<Vec<ScoredItem>>>>,
    pub enricher: Arc<Enricher>,
}

impl App {
    pub fn new(config: ServerConfig) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(App {
            http,
            enricher: Arc::new(Enricher::new(&config.hf)),
            config: Arc::new(config),
            kv: Arc::new(Kv::new()),
            snapshots: Arc::new(retainer::Cache::new()),
        })
    }
}

pub fn router(app: App) -> Router {
    Router::new()
        .nest("/api", intel::route())
        .layer(middleware::from_fn(edge_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// The edge header contract: every response carries the CORS set and a
/// deny-all CSP, and any OPTIONS request short-circuits to 204.
async fn edge_headers(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = axum::http::StatusCode::NO_CONTENT.into_response();
        apply_edge_headers(resp.headers_mut());
        return resp;
    }

    let mut resp = next.run(req).await;
    apply_edge_headers(resp.headers_mut());
    resp
}

fn apply_edge_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));

    let fmt_layer = if std::env::var("ENVIRONMENT").as_deref() == Ok("production") {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ServerConfig::new_from_env();
    let port = config.port;
    let app = App::new(config)?;

    // evict expired aggregation snapshots in the background
    let snapshots = Arc::clone(&app.snapshots);
    tokio::spawn(async move {
        snapshots.monitor(4, 0.25, Duration::from_secs(3)).await;
    });

    intel::aggregate::start_warm_cache(app.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "intel api listening");
    axum::serve(listener, router(app)).await?;

    Ok(())
}
