//! Live item streaming over Server-Sent Events. Each connection owns one
//! cooperative loop: an `init` frame after the first aggregation, then a
//! `tick` frame per interval until the edge-imposed deadline closes the
//! stream. Dropping the response drops the generator, which cancels the
//! timers and any in-flight aggregation with it.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::App;
use crate::intel::aggregate::aggregate;
use crate::intel::score::ScoredItem;
use crate::utils::now_ms;

pub const DEFAULT_INTERVAL_MS: u64 = 4000;
pub const MIN_INTERVAL_MS: u64 = 2500;
pub const MAX_INTERVAL_MS: u64 = 15_000;

/// Edge ceiling for a single connection; clients reconnect.
const STREAM_DEADLINE: Duration = Duration::from_secs(90);

/// Window used for the `init` aggregation when the client does not ask
/// otherwise, and its item budget.
pub const DEFAULT_WINDOW_HOURS: f64 = 6.0;
const INIT_LIMIT: usize = 40;

/// Ticks carry the freshest slice only.
const TICK_WINDOW_HOURS: f64 = 2.0;
const TICK_LIMIT: usize = 8;

pub fn clamp_interval(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_INTERVAL_MS)
        .clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)
}

#[derive(Serialize)]
struct InitFrame {
    ts: i64,
    count: usize,
}

#[derive(Serialize)]
struct TickFrame<'a> {
    ts: i64,
    items: &'a [ScoredItem],
}

#[derive(Serialize)]
struct ErrorFrame {
    error: String,
}

/// The per-connection event loop, mapped onto SSE `Event`s.
pub fn event_stream(
    app: App,
    since_hours: f64,
    interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    frames(app, since_hours, interval_ms)
        .map(|(name, data)| Ok::<_, Infallible>(Event::default().event(name).data(data)))
}

/// Exactly one `init`, then `tick`s in monotonic order; recoverable
/// failures become `error` frames and the loop keeps going. The stream
/// ends at the deadline.
fn frames(
    app: App,
    since_hours: f64,
    interval_ms: u64,
) -> impl Stream<Item = (&'static str, String)> {
    stream! {
        let deadline = tokio::time::sleep(STREAM_DEADLINE);
        tokio::pin!(deadline);

        let items = (Box::pin(aggregate(&app, since_hours, INIT_LIMIT))
            as std::pin::Pin<Box<dyn std::future::Future<Output = std::sync::Arc<Vec<ScoredItem>>> + Send + '_>>)
            .await;
        yield ("init", frame_data(&InitFrame { ts: now_ms(), count: items.len() }));

        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first interval tick resolves immediately; init already covered it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    let items = (Box::pin(aggregate(&app, TICK_WINDOW_HOURS, TICK_LIMIT))
                        as std::pin::Pin<Box<dyn std::future::Future<Output = std::sync::Arc<Vec<ScoredItem>>> + Send + '_>>)
                        .await;
                    match serde_json::to_string(&TickFrame { ts: now_ms(), items: &items }) {
                        Ok(data) => yield ("tick", data),
                        Err(err) => yield ("error", frame_data(&ErrorFrame { error: err.to_string() })),
                    }
                }
            }
        }
    }
}

fn frame_data<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
}
