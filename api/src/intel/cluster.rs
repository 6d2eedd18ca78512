use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::intel::score::{ScoredItem, title_tokens};
use crate::utils::round3;

const JACCARD_THRESHOLD: f64 = 0.6;

/// Anything the clusterer can group: scored items and enriched items both
/// qualify, so `/api/clusters` and `/api/clusters/enriched` share one
/// implementation.
pub trait ClusterItem {
    fn story_key(&self) -> &str;
    fn title(&self) -> &str;
    fn src(&self) -> &str;
    fn ts(&self) -> i64;
    fn score(&self) -> f64;
    fn tags(&self) -> &[String];
    fn geos(&self) -> &[String];
}

impl ClusterItem for ScoredItem {
    fn story_key(&self) -> &str {
        &self.key
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn src(&self) -> &str {
        &self.src
    }
    fn ts(&self) -> i64 {
        self.ts
    }
    fn score(&self) -> f64 {
        self.score
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn geos(&self) -> &[String] {
        &self.geos
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster<T> {
    pub key: String,
    pub items: Vec<T>,
    pub tags: Vec<String>,
    pub geos: Vec<String>,
    pub sources: Vec<String>,
    pub first_seen_ts: i64,
    pub last_seen_ts: i64,
    pub score: f64,
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

/// Two-pass grouping: exact story-key buckets, then a greedy left-to-right
/// merge of buckets whose seed titles overlap at [`JACCARD_THRESHOLD`].
/// A bucket absorbed into an earlier one is not re-examined.
pub fn cluster_items<T: ClusterItem + Clone>(items: &[T]) -> Vec<Cluster<T>> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        let key = item.story_key().to_string();
        buckets
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(item.clone());
    }

    // seed token sets come from each bucket's first title
    let token_sets: Vec<HashSet<String>> = order
        .iter()
        .map(|key| {
            buckets[key]
                .first()
                .map(|item| title_tokens(item.title()).into_iter().collect())
                .unwrap_or_default()
        })
        .collect();

    let mut absorbed = vec![false; order.len()];
    for i in 0..order.len() {
        if absorbed[i] {
            continue;
        }
        for j in (i + 1)..order.len() {
            if absorbed[j] {
                continue;
            }
            if jaccard(&token_sets[i], &token_sets[j]) >= JACCARD_THRESHOLD {
                absorbed[j] = true;
                if let Some(moved) = buckets.remove(&order[j])
                    && let Some(target) = buckets.get_mut(&order[i])
                {
                    target.extend(moved);
                }
            }
        }
    }

    let mut clusters: Vec<Cluster<T>> = order
        .iter()
        .enumerate()
        .filter(|(i, _)| !absorbed[*i])
        .filter_map(|(_, key)| buckets.remove(key).map(|items| build_cluster(key, items)))
        .collect();

    clusters.sort_by(|a, b| {
        b.sources
            .len()
            .cmp(&a.sources.len())
            .then(b.score.total_cmp(&a.score))
            .then(b.last_seen_ts.cmp(&a.last_seen_ts))
    });
    clusters
}

fn build_cluster<T: ClusterItem + Clone>(key: &str, mut items: Vec<T>) -> Cluster<T> {
    items.sort_by_key(|i| Reverse(i.ts()));

    let mut tags = Vec::new();
    let mut geos = Vec::new();
    let mut sources = Vec::new();
    for item in &items {
        for tag in item.tags() {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        for geo in item.geos() {
            if !geos.contains(geo) {
                geos.push(geo.clone());
            }
        }
        let src = item.src().to_string();
        if !sources.contains(&src) {
            sources.push(src);
        }
    }

    let first_seen_ts = items.iter().map(|i| i.ts()).min().unwrap_or_default();
    let last_seen_ts = items.iter().map(|i| i.ts()).max().unwrap_or_default();
    let top_score = items
        .iter()
        .map(|i| i.score())
        .fold(0.0_f64, |acc, s| acc.max(s));
    let corroboration = ((sources.len().saturating_sub(1)) as f64 / 4.0).min(1.0);
    let score = round3(0.8 * top_score + 0.2 * corroboration);

    Cluster {
        key: key.to_string(),
        items,
        tags,
        geos,
        sources,
        first_seen_ts,
        last_seen_ts,
        score,
    }
}
