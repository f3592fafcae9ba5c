//! Device liveness rules.
//!
//! A device is online when its `last_seen` timestamp falls inside
//! [`ONLINE_WINDOW_SECS`] of the reference time. Liveness is derived at read
//! time; nothing sweeps it.

use chrono::Duration;

use crate::types::Timestamp;

/// A device counts as online if it was seen within this many seconds.
pub const ONLINE_WINDOW_SECS: i64 = 60;

/// Whether a device last seen at `last_seen` is online at `now`.
///
/// A `last_seen` in the future (clock skew between nodes) counts as online.
pub fn is_online(last_seen: Timestamp, now: Timestamp) -> bool {
    now - last_seen < Duration::seconds(ONLINE_WINDOW_SECS)
}

/// Split a capability list into a normalized set: trimmed, non-empty,
/// de-duplicated, sorted.
pub fn normalize_capabilities<I, S>(capabilities: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut caps: Vec<String> = capabilities
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    caps.sort();
    caps.dedup();
    caps
}
