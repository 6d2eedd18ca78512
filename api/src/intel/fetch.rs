use std::time::Duration;

use eyre::eyre;
use futures::stream::StreamExt;

use crate::intel::sources::FeedSource;
use crate::retry::Backoff;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);
pub const FETCH_ATTEMPTS: u32 = 3;

/// Feeds fetched concurrently per aggregation pass.
const MAX_CONCURRENT_FETCHES: usize = 16;

/// Edge-cache hint forwarded on feed requests.
const FEED_CACHE_HINT: &str = "max-age=180";

/// Fetch one feed with retries. Each attempt has its own timeout; the last
/// error is returned when all attempts are spent.
pub async fn fetch_feed(http: &reqwest::Client, source: &FeedSource) -> Result<String, eyre::Error> {
    let backoff = Backoff::feed_fetch();
    let mut last_err = eyre!("no fetch attempt made");

    for attempt in 1..=FETCH_ATTEMPTS {
        match fetch_once(http, source).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                tracing::debug!(src = source.src, attempt, ?err, "feed fetch attempt failed");
                last_err = err;
            }
        }
        if attempt < FETCH_ATTEMPTS {
            tokio::time::sleep(backoff.delay(attempt)).await;
        }
    }

    Err(last_err)
}

async fn fetch_once(http: &reqwest::Client, source: &FeedSource) -> Result<String, eyre::Error> {
    let resp = http
        .get(source.url)
        .header(reqwest::header::CACHE_CONTROL, FEED_CACHE_HINT)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(eyre!("upstream returned {status}"));
    }

    Ok(resp.text().await?)
}

async fn fetch_one(
    http: reqwest::Client,
    source: &'static FeedSource,
) -> (&'static FeedSource, Result<String, eyre::Error>) {
    let result = fetch_feed(&http, source).await;
    (source, result)
}

/// Fetch every registered feed concurrently and settle each independently.
/// A failing feed is logged and simply contributes no payload.
pub async fn fetch_all(
    http: &reqwest::Client,
    sources: &'static [FeedSource],
) -> Vec<(&'static FeedSource, String)> {
    futures::stream::iter(sources)
        .map(|source: &'static FeedSource| fetch_one(http.clone(), source))
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .filter_map(|(source, result): (&'static FeedSource, Result<String, eyre::Error>)| async move {
            match result {
                Ok(body) => Some((source, body)),
                Err(err) => {
                    tracing::warn!(src = source.src, ?err, "feed fetch failed, skipping source");
                    None
                }
            }
        })
        .collect()
        .await
}
