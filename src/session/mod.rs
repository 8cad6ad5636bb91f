//! Session context: `SessionContext` and the bounded `SessionStore`.
//!
//! A session remembers the last few scalar facts of an ongoing
//! conversation (student number, display name, billing term) so later
//! turns can omit them.  Entries live in memory only; the store is
//! bounded by a capacity and an idle TTL, evicting the
//! least-recently-touched entry when full.
//!
//! Each store operation is atomic, but nothing serializes whole turns:
//! two concurrent turns on the same key race and the last `update`
//! wins.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

// ── SessionContext ───────────────────────────────────────────

/// Remembered facts for one session.  Every field is absent until a
/// turn resolves a value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub student_no: Option<String>,
    pub full_name: Option<String>,
    pub term: Option<String>,
}

impl SessionContext {
    /// Copy every present field of `fields` over `self`; absent fields
    /// leave the stored value untouched.
    pub fn merge(&mut self, fields: &SessionContext) {
        if let Some(ref v) = fields.student_no {
            self.student_no = Some(v.clone());
        }
        if let Some(ref v) = fields.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(ref v) = fields.term {
            self.term = Some(v.clone());
        }
    }

    /// Whether a student identifier is known for this session.
    pub fn is_identified(&self) -> bool {
        self.student_no.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.student_no.is_none() && self.full_name.is_none() && self.term.is_none()
    }
}

// ── SessionStore ─────────────────────────────────────────────

/// Default maximum number of live sessions.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default idle time after which a session is forgotten.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    ctx: SessionContext,
    touched: Instant,
}

/// Process-wide map from session key to [`SessionContext`].
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl SessionStore {
    /// Create a store.  `capacity` is clamped to ≥ 1.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Return a snapshot of the context for `key`, creating an empty one
    /// for a previously-unseen (or expired) key.
    pub fn get_or_create(&self, key: &str) -> SessionContext {
        let mut entries = self.entries.lock().expect("session store poisoned");
        let now = Instant::now();
        self.entry_mut(&mut entries, key, now).ctx.clone()
    }

    /// Merge the present fields of `fields` into the context for `key`
    /// and return the merged snapshot.
    pub fn update(&self, key: &str, fields: &SessionContext) -> SessionContext {
        let mut entries = self.entries.lock().expect("session store poisoned");
        let now = Instant::now();
        let entry = self.entry_mut(&mut entries, key, now);
        entry.ctx.merge(fields);
        debug!(session = %key, ctx = ?entry.ctx, "session context updated");
        entry.ctx.clone()
    }

    /// Number of live (possibly not yet purged) sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("session store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry idle for longer than the TTL.  Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().expect("session store poisoned");
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.touched) <= self.ttl);
        before - entries.len()
    }

    /// Idle TTL configured for this store.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry_mut<'a>(
        &self,
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> &'a mut Entry {
        let expired = entries
            .get(key)
            .is_some_and(|e| now.duration_since(e.touched) > self.ttl);
        if expired {
            debug!(session = %key, "session expired, starting fresh");
            entries.remove(key);
        }

        if !entries.contains_key(key) {
            if entries.len() >= self.capacity {
                entries.retain(|_, e| now.duration_since(e.touched) <= self.ttl);
            }
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.touched)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(evicted = %oldest, "session store full, evicting oldest");
                    entries.remove(&oldest);
                }
            }
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            ctx: SessionContext::default(),
            touched: now,
        });
        entry.touched = now;
        entry
    }
}

/// Spawn a background task that purges expired sessions periodically.
///
/// Runs every quarter TTL (at most hourly, at least every second).
pub fn spawn_janitor(
    store: std::sync::Arc<SessionStore>,
    cancel: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let period = (store.ttl() / 4).clamp(Duration::from_secs(1), Duration::from_secs(3600));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        debug!(removed, "session janitor pass");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(student_no: Option<&str>, full_name: Option<&str>, term: Option<&str>) -> SessionContext {
        SessionContext {
            student_no: student_no.map(String::from),
            full_name: full_name.map(String::from),
            term: term.map(String::from),
        }
    }

    #[test]
    fn merge_keeps_fields_absent_in_update() {
        let mut base = ctx(Some("S1"), Some("Ada"), Some("2024-Fall"));
        base.merge(&ctx(None, None, Some("2025-Spring")));
        assert_eq!(base, ctx(Some("S1"), Some("Ada"), Some("2025-Spring")));
    }

    #[tokio::test]
    async fn get_or_create_starts_empty() {
        let store = SessionStore::default();
        assert!(store.get_or_create("s").is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_then_read_back() {
        let store = SessionStore::default();
        store.update("s", &ctx(Some("S1"), None, None));
        store.update("s", &ctx(None, None, Some("2024-Fall")));
        assert_eq!(store.get_or_create("s"), ctx(Some("S1"), None, Some("2024-Fall")));
        assert!(store.get_or_create("other").is_empty());
    }

    #[tokio::test]
    async fn full_store_evicts_least_recently_touched() {
        tokio::time::pause();
        let store = SessionStore::new(2, DEFAULT_TTL);
        store.update("a", &ctx(Some("A"), None, None));
        tokio::time::advance(Duration::from_secs(1)).await;
        store.update("b", &ctx(Some("B"), None, None));
        tokio::time::advance(Duration::from_secs(1)).await;
        // Touch "a" so "b" becomes the oldest.
        store.get_or_create("a");
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create("c");

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_or_create("a").student_no.as_deref(), Some("A"));
        assert!(store.get_or_create("b").is_empty());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        tokio::time::pause();
        let store = SessionStore::new(10, Duration::from_secs(60));
        store.update("s", &ctx(Some("S1"), None, None));
        store.update("t", &ctx(Some("T1"), None, None));

        tokio::time::advance(Duration::from_secs(30)).await;
        store.get_or_create("t");
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.get_or_create("t").student_no.as_deref(), Some("T1"));
        assert!(store.get_or_create("s").is_empty());
    }
}
