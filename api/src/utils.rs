// current wall clock in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// round to three decimal places, the precision scores are reported in
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
