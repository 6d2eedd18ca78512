//! The intel aggregation core: registry -> fetch -> parse -> score ->
//! cluster, with opt-in AI enrichment, search and SSE streaming on top.
//! Handlers here are thin: parameter parsing, pipeline calls, and the
//! response header contract (cache policy, ETag, signature).

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response, sse::Sse},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::App;
use crate::error::AppError;
use crate::intel::aggregate::{aggregate, remember_clusters};
use crate::intel::cluster::cluster_items;
use crate::intel::enrich::EnrichedItem;
use crate::intel::score::ScoredItem;
use crate::intel::taxonomy::{GEO_BUCKETS, GEOS, GeoBucket, LabelDef, TOPICS};
use crate::signing::{sha256_hex, sign};
use crate::utils::now_ms;

pub mod aggregate;
pub mod cluster;
pub mod enrich;
pub mod fetch;
pub mod parse;
pub mod score;
pub mod search;
pub mod sources;
pub mod stream;
pub mod taxonomy;

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/feeds", get(handle_feeds))
        .route("/clusters", get(handle_clusters))
        .route("/enrich", get(handle_enrich))
        .route("/clusters/enriched", get(handle_clusters_enriched))
        .route("/search", get(handle_search))
        .route("/topics", get(handle_topics))
        .route("/stream", get(handle_stream))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Params {
    since_hours: Option<String>,
    limit: Option<String>,
    min_sources: Option<String>,
    interval_ms: Option<String>,
    q: Option<String>,
}

enum CachePolicy {
    NoCache,
    NoStore,
    Public(u32),
    /// public caching plus a content `ETag`
    PublicEtag(u32),
    None,
}

/// Assemble a JSON response honouring the per-route header contract. The
/// signature covers the exact bytes of the body.
fn api_response(
    app: &App,
    body: Vec<u8>,
    cache: CachePolicy,
    signed: bool,
) -> Result<Response, AppError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json");

    builder = match cache {
        CachePolicy::NoCache => builder.header(header::CACHE_CONTROL, "no-cache"),
        CachePolicy::NoStore => builder.header(header::CACHE_CONTROL, "no-store"),
        CachePolicy::Public(secs) => {
            builder.header(header::CACHE_CONTROL, format!("public, max-age={secs}"))
        }
        CachePolicy::PublicEtag(secs) => builder
            .header(header::CACHE_CONTROL, format!("public, max-age={secs}"))
            .header(header::ETAG, sha256_hex(&body)),
        CachePolicy::None => builder,
    };

    if signed
        && let Some(secret) = &app.config.api_secret
        && let Some(signature) = sign(secret, &body)
    {
        builder = builder.header("X-Signature", signature);
    }

    builder
        .body(Body::from(body))
        .map_err(|err| AppError::Internal(eyre::eyre!(err)))
}

fn to_body<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(value).map_err(|err| AppError::Internal(eyre::eyre!(err)))
}

fn parse_f64(raw: Option<&String>, name: &str, default: f64) -> Result<f64, AppError> {
    let Some(raw) = raw else { return Ok(default) };
    match raw.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.is_finite() => Ok(v),
        _ => Err(AppError::BadRequest(format!("invalid {name}: {raw}"))),
    }
}

fn parse_usize(raw: Option<&String>, name: &str, default: usize) -> Result<usize, AppError> {
    let Some(raw) = raw else { return Ok(default) };
    raw.parse::<usize>()
        .map_err(|_| AppError::BadRequest(format!("invalid {name}: {raw}")))
}

fn parse_u64_opt(raw: Option<&String>, name: &str) -> Result<Option<u64>, AppError> {
    let Some(raw) = raw else { return Ok(None) };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("invalid {name}: {raw}")))
}

async fn handle_health(State(app): State<App>) -> Result<Response, AppError> {
    let body = to_body(&json!({
        "ok": true,
        "ts": now_ms(),
        "sources": sources::sources().len(),
    }))?;
    api_response(&app, body, CachePolicy::NoCache, true)
}

async fn handle_sources(State(app): State<App>) -> Result<Response, AppError> {
    let body = to_body(&sources::sources())?;
    api_response(&app, body, CachePolicy::Public(3600), false)
}

async fn handle_feeds(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    let since_hours = parse_f64(params.since_hours.as_ref(), "sinceHours", 24.0)?;
    let limit = parse_usize(params.limit.as_ref(), "limit", 80)?;

    let items = aggregate(&app, since_hours, limit).await;
    let body = to_body(&*items)?;
    api_response(&app, body, CachePolicy::PublicEtag(120), true)
}

async fn handle_clusters(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    let since_hours = parse_f64(params.since_hours.as_ref(), "sinceHours", 24.0)?;
    let limit = parse_usize(params.limit.as_ref(), "limit", 80)?;
    let min_sources = parse_usize(params.min_sources.as_ref(), "minSources", 1)?;

    // clustering gets headroom over the item cap so merges have material
    let items = aggregate(&app, since_hours, limit.saturating_mul(2)).await;
    let mut clusters = cluster_items(&items);
    clusters.retain(|c| c.sources.len() >= min_sources);
    clusters.truncate(limit);
    remember_clusters(&app, &clusters).await;

    let body = to_body(&clusters)?;
    api_response(&app, body, CachePolicy::None, true)
}

#[derive(Serialize)]
struct EnrichPayload {
    count: usize,
    items: Vec<EnrichedItem>,
}

async fn handle_enrich(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    let since_hours = parse_f64(params.since_hours.as_ref(), "sinceHours", 24.0)?;
    let limit = parse_usize(params.limit.as_ref(), "limit", 40)?;

    let items = aggregate(&app, since_hours, limit).await;
    let enriched = app
        .enricher
        .enrich_items(&app.http, &app.kv, (*items).clone())
        .await;

    let body = to_body(&EnrichPayload {
        count: enriched.len(),
        items: enriched,
    })?;
    api_response(&app, body, CachePolicy::NoStore, true)
}

async fn handle_clusters_enriched(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    let since_hours = parse_f64(params.since_hours.as_ref(), "sinceHours", 24.0)?;
    let limit = parse_usize(params.limit.as_ref(), "limit", 40)?;
    let min_sources = parse_usize(params.min_sources.as_ref(), "minSources", 1)?;

    let items = aggregate(&app, since_hours, limit.saturating_mul(2)).await;
    let enriched = app
        .enricher
        .enrich_items(&app.http, &app.kv, (*items).clone())
        .await;

    let mut clusters = cluster_items(&enriched);
    clusters.retain(|c| c.sources.len() >= min_sources);
    clusters.truncate(limit);
    remember_clusters(&app, &clusters).await;

    let body = to_body(&clusters)?;
    api_response(&app, body, CachePolicy::None, true)
}

#[derive(Serialize)]
struct SearchPayload {
    q: String,
    count: usize,
    items: Vec<ScoredItem>,
}

async fn handle_search(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<Response, AppError> {
    let since_hours = parse_f64(params.since_hours.as_ref(), "sinceHours", 48.0)?;
    let limit = parse_usize(params.limit.as_ref(), "limit", 60)?;
    let q = params.q.clone().unwrap_or_default();

    let window = aggregate(&app, since_hours, limit.saturating_mul(2)).await;
    let items = search::search(&window, &q, limit);

    let body = to_body(&SearchPayload {
        q,
        count: items.len(),
        items,
    })?;
    api_response(&app, body, CachePolicy::None, false)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicsPayload {
    topics: &'static [LabelDef],
    regions: Vec<&'static str>,
    geo_buckets: &'static [GeoBucket],
}

async fn handle_topics(State(app): State<App>) -> Result<Response, AppError> {
    let body = to_body(&TopicsPayload {
        topics: TOPICS,
        regions: GEOS.iter().map(|g| g.label).collect(),
        geo_buckets: GEO_BUCKETS,
    })?;
    api_response(&app, body, CachePolicy::Public(3600), false)
}

async fn handle_stream(
    State(app): State<App>,
    Query(params): Query<Params>,
) -> Result<impl IntoResponse, AppError> {
    let since_hours = parse_f64(
        params.since_hours.as_ref(),
        "sinceHours",
        stream::DEFAULT_WINDOW_HOURS,
    )?;
    let interval_ms =
        stream::clamp_interval(parse_u64_opt(params.interval_ms.as_ref(), "intervalMs")?);

    let sse = Sse::new(stream::event_stream(app, since_hours, interval_ms));
    Ok(([(header::CACHE_CONTROL, "no-cache")], sse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Env, HfConfig, ServerConfig};
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app(secret: Option<&str>) -> App {
        let config = ServerConfig {
            env: Env::Dev,
            port: 0,
            api_secret: secret.map(|s| s.to_string()),
            hf: HfConfig {
                tokens: vec![],
                use_endpoints: false,
                max_enrich: 25,
                enrich_ttl_secs: 3600,
            },
        };
        App::new(config).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_source_count_and_signs() {
        let router = crate::router(test_app(Some("secret")));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
        assert!(resp.headers().contains_key("x-signature"));
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            resp.headers()["content-security-policy"],
            "default-src 'none'"
        );
        assert_eq!(resp.headers()[header::VARY], "Origin");

        let json = body_json(resp).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["sources"], sources::sources().len());
    }

    #[tokio::test]
    async fn health_skips_signature_without_secret() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!resp.headers().contains_key("x-signature"));
    }

    #[tokio::test]
    async fn options_preflight_returns_204_with_cors() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/feeds")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers()["access-control-allow-methods"],
            "GET, OPTIONS"
        );
        assert_eq!(
            resp.headers()["access-control-allow-headers"],
            "Content-Type, Authorization, X-Requested-With"
        );
    }

    #[tokio::test]
    async fn invalid_query_parameters_are_client_errors() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/feeds?limit=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["ok"], false);
        assert!(json["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn negative_since_hours_is_rejected() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/search?sinceHours=-4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn topics_exposes_dictionaries_and_buckets() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/topics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
        let json = body_json(resp).await;
        assert!(json["topics"].as_array().unwrap().len() >= 10);
        assert!(json["regions"].as_array().unwrap().iter().any(|r| *r == "Asia"));
        assert!(
            json["geoBuckets"]
                .as_array()
                .unwrap()
                .iter()
                .any(|b| b["bucket"] == "Indo-Pacific")
        );
    }

    #[tokio::test]
    async fn sources_listing_is_cacheable() {
        let router = crate::router(test_app(None));
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/api/sources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
        let json = body_json(resp).await;
        let first = &json.as_array().unwrap()[0];
        assert!(first["src"].is_string());
        assert!(first["weight"].is_number());
    }
}
