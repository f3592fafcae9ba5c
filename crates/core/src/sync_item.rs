//! Sync item kinds, lifecycle statuses and payload shapes.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default lifetime of a sync item or uploaded file, in hours.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Maximum number of items returned by a recent-items listing.
pub const MAX_LIST_LIMIT: i64 = 100;

/// The payload family of a sync item.
///
/// Stored as TEXT (`clipboard`, `notification`, `file-ref`); new kinds are
/// added as variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncItemKind {
    Clipboard,
    Notification,
    FileRef,
}

impl SyncItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clipboard => "clipboard",
            Self::Notification => "notification",
            Self::FileRef => "file-ref",
        }
    }
}

impl fmt::Display for SyncItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncItemKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clipboard" => Ok(Self::Clipboard),
            "notification" => Ok(Self::Notification),
            "file-ref" => Ok(Self::FileRef),
            other => Err(CoreError::Validation(format!(
                "Unknown sync item type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for SyncItemKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifecycle status of a sync item.
///
/// `pending -> delivered` on the first successful fan-out enqueue,
/// `pending | delivered -> expired` when the janitor sweeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Delivered,
    Expired,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::Validation(format!(
                "Unknown sync status '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for SyncStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Compute `created_at + hours`. Non-positive values fall back to
/// [`DEFAULT_EXPIRY_HOURS`] so that `expires_at > created_at` always holds.
pub fn expiry_after(created_at: Timestamp, hours: i64) -> Timestamp {
    let hours = if hours > 0 { hours } else { DEFAULT_EXPIRY_HOURS };
    created_at + Duration::hours(hours)
}

/// Clamp a caller-supplied list limit to `1..=MAX_LIST_LIMIT`.
pub fn clamp_list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Content blob of a clipboard item.
pub fn clipboard_content(text: &str) -> serde_json::Value {
    serde_json::json!({ "text": text })
}

/// Content blob of a notification item.
pub fn notification_content(title: &str, body: &str, icon: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "body": body,
        "icon": icon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn kind_parses_wire_names() {
        assert_eq!("clipboard".parse::<SyncItemKind>().unwrap(), SyncItemKind::Clipboard);
        assert_eq!("file-ref".parse::<SyncItemKind>().unwrap(), SyncItemKind::FileRef);
        assert!("video".parse::<SyncItemKind>().is_err());
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_value(SyncItemKind::FileRef).unwrap();
        assert_eq!(json, "file-ref");
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [SyncStatus::Pending, SyncStatus::Delivered, SyncStatus::Expired] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
    }

    #[test]
    fn expiry_is_after_creation() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 24), now + Duration::hours(24));
        assert_eq!(expiry_after(now, 0), now + Duration::hours(DEFAULT_EXPIRY_HOURS));
        assert!(expiry_after(now, -3) > now);
    }

    #[test]
    fn list_limit_is_clamped() {
        assert_eq!(clamp_list_limit(None), 100);
        assert_eq!(clamp_list_limit(Some(500)), 100);
        assert_eq!(clamp_list_limit(Some(0)), 1);
        assert_eq!(clamp_list_limit(Some(20)), 20);
    }

    #[test]
    fn clipboard_content_wraps_text() {
        assert_eq!(clipboard_content("hello")["text"], "hello");
    }
}
