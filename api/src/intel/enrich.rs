//! AI enrichment over the head of the item list: language detection,
//! translation to English, zero-shot topic classification, abstractive
//! summary, sentiment and named entities, in that order. Every task is
//! individually guarded; a failing task leaves its field empty and the
//! item continues down the chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::config::HfConfig;
use crate::intel::aggregate::item_identity;
use crate::intel::cluster::ClusterItem;
use crate::intel::score::ScoredItem;
use crate::kv::Kv;
use crate::retry::Backoff;
use crate::signing::content_key;

/// Hard per-task timeout.
const TASK_TIMEOUT: Duration = Duration::from_secs(8);

/// Transient upstream failures are retried this many times, rotating
/// through the credential pool.
const MAX_ATTEMPTS: u32 = 4;

/// Whole-request budget: once spent, the remaining items pass through
/// unenriched so partial results still return promptly.
const REQUEST_BUDGET: Duration = Duration::from_secs(25);

/// English text fed to the downstream tasks is capped at this length.
const MAX_NORMALIZED_CHARS: usize = 2000;

const ZERO_SHOT_MIN_SCORE: f64 = 0.35;
const ZERO_SHOT_MAX_LABELS: usize = 5;
const SUMMARY_MAX_LENGTH: u32 = 120;
const SUMMARY_MIN_LENGTH: u32 = 40;

const MODEL_LANG: &str = "papluca/xlm-roberta-base-language-detection";
const MODEL_TRANSLATE: &str = "Helsinki-NLP/opus-mt-mul-en";
const MODEL_ZERO_SHOT: &str = "facebook/bart-large-mnli";
const MODEL_SUMMARY: &str = "facebook/bart-large-cnn";
const MODEL_SENTIMENT: &str = "cardiffnlp/twitter-xlm-roberta-base-sentiment";
const MODEL_NER: &str = "dslim/bert-base-NER";

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// 401/403: the pool is bad, fail fast and keep the error.
    #[error("credentials rejected (status {status})")]
    Auth { status: u16 },

    /// 429 and 5xx are retried; other statuses are not.
    #[error("upstream error (status {status})")]
    Upstream { status: u16 },

    #[error("task timed out")]
    Timeout,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("no credentials configured")]
    NoCredentials,
}

/// A scored item with AI annotations. `normalized_text` is always English
/// or the original text; `tags` supersets the item's original tags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: ScoredItem,
    pub lang: String,
    pub translated: bool,
    pub normalized_text: String,
    pub summary: String,
    pub zs_labels: Vec<String>,
    pub sentiment: Value,
    pub entities: Vec<String>,
    pub enriched: bool,
}

impl EnrichedItem {
    fn passthrough(item: ScoredItem) -> Self {
        EnrichedItem {
            item,
            lang: "en".to_string(),
            translated: false,
            normalized_text: String::new(),
            summary: String::new(),
            zs_labels: Vec::new(),
            sentiment: Value::Null,
            entities: Vec::new(),
            enriched: false,
        }
    }
}

impl ClusterItem for EnrichedItem {
    fn story_key(&self) -> &str {
        &self.item.key
    }
    fn title(&self) -> &str {
        &self.item.title
    }
    fn src(&self) -> &str {
        &self.item.src
    }
    fn ts(&self) -> i64 {
        self.item.ts
    }
    fn score(&self) -> f64 {
        self.item.score
    }
    fn tags(&self) -> &[String] {
        &self.item.tags
    }
    fn geos(&self) -> &[String] {
        &self.item.geos
    }
}

pub struct Enricher {
    tokens: Vec<String>,
    use_endpoints: bool,
    max_items: usize,
    cache_ttl_secs: u64,
    cursor: AtomicUsize,
}

impl Enricher {
    pub fn new(cfg: &HfConfig) -> Self {
        Enricher {
            tokens: cfg.tokens.clone(),
            use_endpoints: cfg.use_endpoints,
            max_items: cfg.max_enrich,
            cache_ttl_secs: cfg.enrich_ttl_secs,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Enrich the head of the list sequentially, preserving input order.
    /// Items past the cap (or past the request budget) pass through.
    pub async fn enrich_items(
        &self,
        http: &reqwest::Client,
        kv: &Kv,
        items: Vec<ScoredItem>,
    ) -> Vec<EnrichedItem> {
        let deadline = Instant::now() + REQUEST_BUDGET;
        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            if idx >= self.max_items || Instant::now() >= deadline {
                out.push(EnrichedItem::passthrough(item));
                continue;
            }
            out.push(self.enrich_one(http, kv, item).await);
        }
        out
    }

    async fn enrich_one(&self, http: &reqwest::Client, kv: &Kv, item: ScoredItem) -> EnrichedItem {
        let cache_key = format!("enrich:{}", content_key(item_identity(&item)));
        match kv.get(&cache_key).await {
            Ok(Some(cached)) => {
                if let Ok(hit) = serde_json::from_value::<EnrichedItem>(cached) {
                    return hit;
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(?err, "enrichment cache read failed"),
        }

        let text = clip(
            &format!("{}. {}", item.title, item.description),
            MAX_NORMALIZED_CHARS,
        );
        let mut enriched = EnrichedItem::passthrough(item);

        macro_rules! guard {
            ($task:literal, $result:expr, $default:expr) => {
                match $result {
                    Ok(value) => value,
                    Err(err @ EnrichError::Auth { .. }) => {
                        tracing::error!(%err, task = $task, "enrichment aborted for item");
                        return un_enrich(enriched);
                    }
                    Err(err) => {
                        tracing::warn!(%err, task = $task, "enrichment task failed");
                        $default
                    }
                }
            };
        }

        let lang = guard!(
            "language-detect",
            self.detect_language(http, &text).await,
            "en".to_string()
        );
        enriched.lang = lang;

        enriched.normalized_text = text.clone();
        if enriched.lang != "en" {
            let translated = guard!("translate", self.translate(http, &text).await, None);
            if let Some(english) = translated {
                enriched.normalized_text = clip(&english, MAX_NORMALIZED_CHARS);
                enriched.translated = true;
            }
        }

        enriched.zs_labels = guard!(
            "zero-shot",
            self.zero_shot(http, &enriched.normalized_text).await,
            Vec::new()
        );

        enriched.summary = guard!(
            "summary",
            self.summarize(http, &enriched.normalized_text).await,
            String::new()
        );

        enriched.sentiment = guard!(
            "sentiment",
            self.sentiment(http, &enriched.normalized_text).await,
            Value::Null
        );

        enriched.entities = guard!(
            "ner",
            self.entities(http, &enriched.normalized_text).await,
            Vec::new()
        );

        for label in &enriched.zs_labels {
            if !enriched.item.tags.contains(label) {
                enriched.item.tags.push(label.clone());
            }
        }
        enriched.enriched = true;

        match serde_json::to_value(&enriched) {
            Ok(value) => {
                if let Err(err) = kv.put(&cache_key, value, self.cache_ttl_secs).await {
                    tracing::warn!(?err, "enrichment cache write failed");
                }
            }
            Err(err) => tracing::warn!(?err, "enrichment result not serializable"),
        }

        enriched
    }

    async fn detect_language(
        &self,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<String, EnrichError> {
        let value = self
            .call_model(http, MODEL_LANG, &json!({ "inputs": text }))
            .await?;
        Ok(top_label(&value).unwrap_or_else(|| "en".to_string()))
    }

    async fn translate(
        &self,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<Option<String>, EnrichError> {
        let value = self
            .call_model(http, MODEL_TRANSLATE, &json!({ "inputs": text }))
            .await?;
        Ok(translation_text(&value))
    }

    async fn zero_shot(
        &self,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<Vec<String>, EnrichError> {
        let labels: Vec<&str> = crate::intel::taxonomy::TOPICS
            .iter()
            .map(|t| t.label)
            .collect();
        let body = json!({
            "inputs": text,
            "parameters": { "candidate_labels": labels.join(",") },
        });
        let value = self.call_model(http, MODEL_ZERO_SHOT, &body).await?;
        Ok(zero_shot_labels(
            &value,
            ZERO_SHOT_MIN_SCORE,
            ZERO_SHOT_MAX_LABELS,
        ))
    }

    async fn summarize(&self, http: &reqwest::Client, text: &str) -> Result<String, EnrichError> {
        let body = json!({
            "inputs": text,
            "parameters": {
                "max_length": SUMMARY_MAX_LENGTH,
                "min_length": SUMMARY_MIN_LENGTH,
            },
        });
        let value = self.call_model(http, MODEL_SUMMARY, &body).await?;
        Ok(summary_text(&value).unwrap_or_default())
    }

    async fn sentiment(&self, http: &reqwest::Client, text: &str) -> Result<Value, EnrichError> {
        // provider payload stored as-is
        self.call_model(http, MODEL_SENTIMENT, &json!({ "inputs": text }))
            .await
    }

    async fn entities(
        &self,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<Vec<String>, EnrichError> {
        let value = self
            .call_model(http, MODEL_NER, &json!({ "inputs": text }))
            .await?;
        Ok(entity_names(&value))
    }

    /// One upstream inference call: rotate the credential pool, retry 429
    /// and 5xx with exponential back-off, fail fast on auth rejection.
    async fn call_model(
        &self,
        http: &reqwest::Client,
        model: &str,
        body: &Value,
    ) -> Result<Value, EnrichError> {
        let backoff = Backoff::enrichment();
        let url = self.model_url(model);
        let mut last_err = EnrichError::NoCredentials;

        for attempt in 0..MAX_ATTEMPTS {
            let token = self.next_token()?;
            let request = http.post(&url).bearer_auth(token).json(body).send();

            match tokio::time::timeout(TASK_TIMEOUT, request).await {
                Err(_) => last_err = EnrichError::Timeout,
                Ok(Err(err)) => last_err = EnrichError::Http(err),
                Ok(Ok(resp)) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(EnrichError::Auth {
                            status: status.as_u16(),
                        });
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        last_err = EnrichError::Upstream {
                            status: status.as_u16(),
                        };
                    } else if !status.is_success() {
                        return Err(EnrichError::Upstream {
                            status: status.as_u16(),
                        });
                    } else {
                        return Ok(resp.json::<Value>().await?);
                    }
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(backoff.delay(attempt)).await;
            }
        }

        Err(last_err)
    }

    fn model_url(&self, model: &str) -> String {
        if self.use_endpoints && model.starts_with("http") {
            model.to_string()
        } else {
            format!("https://api-inference.huggingface.co/models/{model}")
        }
    }

    fn next_token(&self) -> Result<&str, EnrichError> {
        if self.tokens.is_empty() {
            return Err(EnrichError::NoCredentials);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        Ok(&self.tokens[idx])
    }
}

fn un_enrich(mut e: EnrichedItem) -> EnrichedItem {
    e.lang = "en".to_string();
    e.translated = false;
    e.normalized_text = String::new();
    e.summary = String::new();
    e.zs_labels = Vec::new();
    e.sentiment = Value::Null;
    e.entities = Vec::new();
    e.enriched = false;
    e
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}

// The inference API returns loosely-shaped JSON that varies per model;
// these normalisers pull out what we use and ignore the rest.

/// `[[{"label": "fr", "score": 0.98}, ...]]` (sometimes unnested).
fn top_label(value: &Value) -> Option<String> {
    let candidates = match value {
        Value::Array(outer) => match outer.first() {
            Some(Value::Array(inner)) => inner.as_slice(),
            _ => outer.as_slice(),
        },
        _ => return None,
    };
    candidates
        .iter()
        .filter_map(|c| {
            let label = c.get("label")?.as_str()?;
            let score = c.get("score")?.as_f64()?;
            Some((label, score))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label.to_lowercase())
}

/// `[{"translation_text": "..."}]`
fn translation_text(value: &Value) -> Option<String> {
    value
        .get(0)?
        .get("translation_text")?
        .as_str()
        .map(|s| s.to_string())
}

/// `{"labels": [...], "scores": [...]}` sorted by score descending.
fn zero_shot_labels(value: &Value, min_score: f64, max: usize) -> Vec<String> {
    let labels = value.get("labels").and_then(Value::as_array);
    let scores = value.get("scores").and_then(Value::as_array);
    let (Some(labels), Some(scores)) = (labels, scores) else {
        return Vec::new();
    };
    labels
        .iter()
        .zip(scores)
        .filter_map(|(label, score)| {
            let label = label.as_str()?;
            let score = score.as_f64()?;
            (score >= min_score).then(|| label.to_string())
        })
        .take(max)
        .collect()
}

/// `[{"summary_text": "..."}]`
fn summary_text(value: &Value) -> Option<String> {
    value
        .get(0)?
        .get("summary_text")?
        .as_str()
        .map(|s| s.to_string())
}

/// `[{"entity_group": "ORG", "word": "NATO", ...}, ...]`
fn entity_names(value: &Value) -> Vec<String> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in entries {
        if let Some(word) = entry.get("word").and_then(Value::as_str) {
            let word = word.trim();
            if !word.is_empty() && !out.iter().any(|w| w == word) {
                out.push(word.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::score::{ScoredItem, story_key};

    fn scored(title: &str, link: &str) -> ScoredItem {
        ScoredItem {
            src: "test".into(),
            title: title.into(),
            link: link.into(),
            description: "desc".into(),
            region: "Global".into(),
            tags: vec!["Cyber".into()],
            geos: vec![],
            ts: 0,
            age_h: 1.0,
            score: 0.5,
            key: story_key(title),
        }
    }

    fn enricher(tokens: Vec<String>) -> Enricher {
        Enricher::new(&HfConfig {
            tokens,
            use_endpoints: false,
            max_enrich: 2,
            enrich_ttl_secs: 3600,
        })
    }

    #[test]
    fn tokens_rotate_in_order() {
        let e = enricher(vec!["a".into(), "b".into()]);
        assert_eq!(e.next_token().unwrap(), "a");
        assert_eq!(e.next_token().unwrap(), "b");
        assert_eq!(e.next_token().unwrap(), "a");
    }

    #[test]
    fn empty_pool_fails_fast() {
        let e = enricher(vec![]);
        assert!(matches!(e.next_token(), Err(EnrichError::NoCredentials)));
    }

    #[test]
    fn model_url_switches_on_endpoint_mode() {
        let plain = enricher(vec!["t".into()]);
        assert_eq!(
            plain.model_url("org/model"),
            "https://api-inference.huggingface.co/models/org/model"
        );
        // full URLs only pass through in endpoint mode
        assert!(plain.model_url("https://endpoint.example").starts_with(
            "https://api-inference.huggingface.co/models/https://endpoint.example"
        ));

        let endpoints = Enricher::new(&HfConfig {
            tokens: vec!["t".into()],
            use_endpoints: true,
            max_enrich: 2,
            enrich_ttl_secs: 3600,
        });
        assert_eq!(
            endpoints.model_url("https://endpoint.example"),
            "https://endpoint.example"
        );
    }

    #[test]
    fn top_label_reads_nested_and_flat_shapes() {
        let nested = json!([[{"label": "FR", "score": 0.9}, {"label": "en", "score": 0.1}]]);
        assert_eq!(top_label(&nested), Some("fr".to_string()));

        let flat = json!([{"label": "de", "score": 0.7}]);
        assert_eq!(top_label(&flat), Some("de".to_string()));

        assert_eq!(top_label(&json!({"error": "loading"})), None);
    }

    #[test]
    fn zero_shot_filters_by_score_and_caps() {
        let value = json!({
            "labels": ["Cyber", "Energy", "Maritime", "Diplomacy", "Terrorism", "Migration", "Economy/Trade"],
            "scores": [0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.2],
        });
        let labels = zero_shot_labels(&value, 0.35, 5);
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "Cyber");
        assert!(!labels.contains(&"Economy/Trade".to_string()));
    }

    #[test]
    fn entity_names_dedup_and_trim() {
        let value = json!([
            {"entity_group": "ORG", "word": " NATO "},
            {"entity_group": "ORG", "word": "NATO"},
            {"entity_group": "LOC", "word": "Kyiv"},
            {"malformed": true},
        ]);
        assert_eq!(entity_names(&value), vec!["NATO", "Kyiv"]);
    }

    #[test]
    fn summary_and_translation_extractors() {
        assert_eq!(
            summary_text(&json!([{"summary_text": "short version"}])),
            Some("short version".to_string())
        );
        assert_eq!(summary_text(&json!([])), None);
        assert_eq!(
            translation_text(&json!([{"translation_text": "hello"}])),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn items_past_the_cap_pass_through_in_order() {
        let e = enricher(vec![]); // no credentials: tasks fail fast, no network
        let kv = Kv::new();
        let http = reqwest::Client::new();
        let items = vec![
            scored("Cyber breach at port", "https://example.com/1"),
            scored("Storm hits coast", "https://example.com/2"),
            scored("Markets slide again", "https://example.com/3"),
        ];

        let out = e.enrich_items(&http, &kv, items).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].item.link, "https://example.com/1");
        assert_eq!(out[1].item.link, "https://example.com/2");
        // third item is past max_enrich = 2
        assert!(!out[2].enriched);
        assert!(out[2].normalized_text.is_empty());
    }

    #[tokio::test]
    async fn enrichment_preserves_original_tags() {
        let e = enricher(vec![]);
        let kv = Kv::new();
        let http = reqwest::Client::new();
        let items = vec![scored("Cyber breach at port", "https://example.com/1")];

        let out = e.enrich_items(&http, &kv, items).await;
        // tags are a superset of the original tags even when tasks fail
        assert!(out[0].item.tags.contains(&"Cyber".to_string()));
    }

    #[tokio::test]
    async fn cached_results_are_returned_verbatim() {
        let e = enricher(vec![]);
        let kv = Kv::new();
        let http = reqwest::Client::new();
        let item = scored("Cyber breach at port", "https://example.com/1");

        let first = e.enrich_items(&http, &kv, vec![item.clone()]).await;
        let second = e.enrich_items(&http, &kv, vec![item]).await;
        assert_eq!(
            serde_json::to_value(&first[0]).unwrap(),
            serde_json::to_value(&second[0]).unwrap()
        );
    }

    #[derive(Clone)]
    struct UpstreamState {
        hits: std::sync::Arc<AtomicUsize>,
        auth_seen: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        failures_before_ok: usize,
        fail_status: axum::http::StatusCode,
    }

    async fn upstream(
        axum::extract::State(state): axum::extract::State<UpstreamState>,
        headers: axum::http::HeaderMap,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;

        let n = state.hits.fetch_add(1, Ordering::SeqCst);
        if let Some(auth) = headers.get("authorization")
            && let Ok(auth) = auth.to_str()
        {
            state.auth_seen.lock().unwrap().push(auth.to_string());
        }
        if n < state.failures_before_ok {
            state.fail_status.into_response()
        } else {
            axum::Json(json!([{ "label": "en", "score": 0.99 }])).into_response()
        }
    }

    async fn spawn_upstream(state: UpstreamState) -> String {
        let router = axum::Router::new()
            .route("/model", axum::routing::post(upstream))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/model")
    }

    fn endpoint_enricher(tokens: Vec<String>) -> Enricher {
        Enricher::new(&HfConfig {
            tokens,
            use_endpoints: true,
            max_enrich: 25,
            enrich_ttl_secs: 3600,
        })
    }

    #[tokio::test]
    async fn transient_failures_retry_and_rotate_tokens() {
        let state = UpstreamState {
            hits: Default::default(),
            auth_seen: Default::default(),
            failures_before_ok: 2,
            fail_status: axum::http::StatusCode::TOO_MANY_REQUESTS,
        };
        let url = spawn_upstream(state.clone()).await;

        let e = endpoint_enricher(vec!["tok-a".into(), "tok-b".into()]);
        let http = reqwest::Client::new();
        let value = e
            .call_model(&http, &url, &json!({ "inputs": "x" }))
            .await
            .unwrap();

        assert_eq!(value[0]["label"], "en");
        // two 429s then success on the third attempt
        assert_eq!(state.hits.load(Ordering::SeqCst), 3);
        let seen = state.auth_seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["Bearer tok-a", "Bearer tok-b", "Bearer tok-a"]);
    }

    #[tokio::test]
    async fn auth_rejection_fails_fast_without_rotation() {
        let state = UpstreamState {
            hits: Default::default(),
            auth_seen: Default::default(),
            failures_before_ok: usize::MAX,
            fail_status: axum::http::StatusCode::UNAUTHORIZED,
        };
        let url = spawn_upstream(state.clone()).await;

        let e = endpoint_enricher(vec!["tok-a".into(), "tok-b".into()]);
        let http = reqwest::Client::new();
        let err = e
            .call_model(&http, &url, &json!({ "inputs": "x" }))
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Auth { status: 401 }));
        assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_transient_client_errors_do_not_retry() {
        let state = UpstreamState {
            hits: Default::default(),
            auth_seen: Default::default(),
            failures_before_ok: usize::MAX,
            fail_status: axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        };
        let url = spawn_upstream(state.clone()).await;

        let e = endpoint_enricher(vec!["tok-a".into()]);
        let http = reqwest::Client::new();
        let err = e
            .call_model(&http, &url, &json!({ "inputs": "x" }))
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Upstream { status: 422 }));
        assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn merged_tags_are_a_superset() {
        let mut enriched = EnrichedItem::passthrough(scored("t", "https://example.com/1"));
        let original = enriched.item.tags.clone();
        enriched.zs_labels = vec!["Energy".into(), "Cyber".into()];
        for label in &enriched.zs_labels {
            if !enriched.item.tags.contains(label) {
                enriched.item.tags.push(label.clone());
            }
        }
        for tag in original {
            assert!(enriched.item.tags.contains(&tag));
        }
        assert_eq!(
            enriched.item.tags.iter().filter(|t| *t == "Cyber").count(),
            1
        );
    }
}
