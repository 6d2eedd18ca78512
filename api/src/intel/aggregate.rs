use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::App;
use crate::intel::cluster::{Cluster, ClusterItem};
use crate::intel::{fetch, parse, score, sources};
use crate::signing::content_key;
use crate::utils::now_ms;

/// How long an aggregation snapshot is shared between requests (and SSE
/// ticks) before the feeds are fetched again.
const SNAPSHOT_TTL: Duration = Duration::from_secs(120);

const SEVEN_DAYS_SECS: u64 = 7 * 24 * 3600;

/// Run the registry -> fetch -> parse -> score pipeline for the requested
/// window, memoised per `(since_hours, limit)` in the snapshot cache.
///
/// Upstream failures never propagate: a feed that errors contributes no
/// items and the worst case is an empty snapshot.
pub async fn aggregate(app: &App, since_hours: f64, limit: usize) -> Arc<Vec<score::ScoredItem>> {
    let cache_key = format!("agg:{since_hours}:{limit}");
    if let Some(hit) = app.snapshots.get(&cache_key).await {
        return Arc::clone(&hit);
    }

    let now = now_ms();
    let fetched = Box::pin(fetch::fetch_all(&app.http, sources::sources())).await;

    let mut items = Vec::new();
    for (source, body) in fetched {
        for raw in parse::parse_feed(&body, source) {
            items.push(score::score_item(raw, now));
        }
    }

    let ranked = score::rank(items, since_hours, limit);
    Box::pin(record_first_seen(app, &ranked)).await;

    let snapshot = Arc::new(ranked);
    app.snapshots
        .insert(cache_key, Arc::clone(&snapshot), SNAPSHOT_TTL)
        .await;
    snapshot
}

/// First-seen memory: one KV record per item the first time it is observed,
/// keyed by a content hash of its identity.
async fn record_first_seen(app: &App, items: &[score::ScoredItem]) {
    for item in items {
        let key = format!("item:{}", content_key(item_identity(item)));
        match app.kv.get(&key).await {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(?err, "kv read failed for first-seen record");
                continue;
            }
        }
        let value = json!({
            "firstSeenTs": now_ms(),
            "link": item.link,
            "title": item.title,
        });
        if let Err(err) = app.kv.put(&key, value, SEVEN_DAYS_SECS).await {
            tracing::warn!(?err, "kv write failed for first-seen record");
        }
    }
}

/// Cluster memory: refreshed whenever a cluster view is served.
pub async fn remember_clusters<T: ClusterItem>(app: &App, clusters: &[Cluster<T>]) {
    for cluster in clusters {
        if cluster.key.is_empty() {
            continue;
        }
        let value = json!({
            "key": cluster.key,
            "lastSeenTs": cluster.last_seen_ts,
            "sources": cluster.sources,
            "tags": cluster.tags,
        });
        let key = format!("cluster:{}", cluster.key);
        if let Err(err) = app.kv.put(&key, value, SEVEN_DAYS_SECS).await {
            tracing::warn!(?err, "kv write failed for cluster memory");
        }
    }
}

/// The stable identity of an item: its link, else its story key, else the
/// title. Mirrors the enrichment cache identity.
pub fn item_identity(item: &score::ScoredItem) -> &str {
    if !item.link.is_empty() {
        &item.link
    } else if !item.key.is_empty() {
        &item.key
    } else {
        &item.title
    }
}

/// Periodic warm-up so interactive requests mostly hit a fresh snapshot.
pub fn start_warm_cache(app: App) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let items = (Box::pin(aggregate(&app, 12.0, 60))
                as std::pin::Pin<Box<dyn std::future::Future<Output = Arc<Vec<score::ScoredItem>>> + Send + '_>>)
                .await;
            let remembered = match (Box::pin(app.kv.list("item:"))
                as std::pin::Pin<Box<dyn std::future::Future<Output = eyre::Result<Vec<String>>> + Send + '_>>)
                .await
            {
                Ok(keys) => keys.len(),
                Err(err) => {
                    tracing::warn!(?err, "kv list failed during warm cache");
                    0
                }
            };
            tracing::debug!(
                count = items.len(),
                remembered,
                "warm cache refresh complete"
            );
        }
    });
}
