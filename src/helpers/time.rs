use chrono::{DateTime, Duration, Utc};

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Remaining lifetime of something expiring at `exp_unix_ts`; negative once expired.
/// Saturates at the `Duration` bounds for expiries beyond its range.
pub fn remaining_validity(exp_unix_ts: i64, now: DateTime<Utc>) -> Duration {
    let secs = exp_unix_ts.saturating_sub(now.timestamp());
    Duration::try_seconds(secs).unwrap_or(if secs < 0 { Duration::MIN } else { Duration::MAX })
}

/// True while `since` lies less than `window` in the past.
pub fn is_within_window(since: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(since) < window
}
