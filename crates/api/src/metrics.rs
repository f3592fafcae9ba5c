//! Process-wide counters rendered in Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters since startup.
///
/// The active-session gauge is not stored here; it is read from the
/// session registry when rendering.
#[derive(Debug, Default)]
pub struct HubMetrics {
    pub sessions_opened: AtomicU64,
    pub sessions_replaced: AtomicU64,
    pub sessions_dropped_backpressure: AtomicU64,
    pub frames_enqueued: AtomicU64,
    pub items_published: AtomicU64,
    pub janitor_items_removed: AtomicU64,
    pub janitor_files_removed: AtomicU64,
    pub auth_cache_hits: AtomicU64,
    pub auth_cache_misses: AtomicU64,
}

impl HubMetrics {
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_replaced(&self) {
        self.sessions_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_dropped_backpressure(&self) {
        self.sessions_dropped_backpressure
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_enqueued(&self, n: u64) {
        self.frames_enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn item_published(&self) {
        self.items_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn janitor_removed(&self, items: u64, files: u64) {
        self.janitor_items_removed.fetch_add(items, Ordering::Relaxed);
        self.janitor_files_removed.fetch_add(files, Ordering::Relaxed);
    }

    pub fn auth_cache_hit(&self) {
        self.auth_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_cache_miss(&self) {
        self.auth_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all metrics, with `sessions_active` as the current gauge value.
    pub fn render(&self, sessions_active: usize) -> String {
        let counters: [(&str, &str, &AtomicU64); 9] = [
            (
                "synchub_sessions_opened_total",
                "Sessions opened since startup",
                &self.sessions_opened,
            ),
            (
                "synchub_sessions_replaced_total",
                "Sessions closed because the same device reconnected",
                &self.sessions_replaced,
            ),
            (
                "synchub_sessions_dropped_backpressure_total",
                "Sessions dropped because their egress buffer was full",
                &self.sessions_dropped_backpressure,
            ),
            (
                "synchub_frames_enqueued_total",
                "Frames enqueued into session egress buffers by fan-out",
                &self.frames_enqueued,
            ),
            (
                "synchub_items_published_total",
                "Sync items persisted and submitted for fan-out",
                &self.items_published,
            ),
            (
                "synchub_janitor_items_removed_total",
                "Expired sync items deleted by the janitor",
                &self.janitor_items_removed,
            ),
            (
                "synchub_janitor_files_removed_total",
                "Expired files removed by the janitor",
                &self.janitor_files_removed,
            ),
            (
                "synchub_auth_cache_hits_total",
                "Token validations answered from the cache",
                &self.auth_cache_hits,
            ),
            (
                "synchub_auth_cache_misses_total",
                "Token validations that called the identity service",
                &self.auth_cache_misses,
            ),
        ];

        let mut out = format!(
            "# HELP synchub_sessions_active Live duplex sessions\n\
             # TYPE synchub_sessions_active gauge\n\
             synchub_sessions_active {sessions_active}\n"
        );
        for (name, help, value) in counters {
            let _ = write!(
                out,
                "\n# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                value.load(Ordering::Relaxed)
            );
        }
        out
    }
}
