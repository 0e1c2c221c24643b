//! Request correlation - routes async generation results back to the
//! originating UI context and discards stale deliveries.
//!
//! Every user action gets an id before any async work starts. The tracker
//! remembers each in-flight request's last status; a terminal event is only
//! rendered while its id is still tracked, so a late response racing a
//! newer request is dropped instead of flashing the wrong notification.
//!
//! There is no explicit cancel. A superseded request's network call still
//! runs to completion; only its delivery is suppressed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub type RequestId = String;

/// Default idle window before a tracked request is garbage-collected.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Loading,
    Success,
    Error,
    ModalShown,
}

#[derive(Debug)]
struct ActiveRequest {
    status: RequestStatus,
    touched: Instant,
}

pub struct RequestTracker {
    inner: Mutex<HashMap<RequestId, ActiveRequest>>,
    ttl: Duration,
    counter: AtomicU64,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_REQUEST_TTL)
    }

    /// The sweep window is a policy knob; production uses the 5-minute
    /// default, tests shrink it.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            counter: AtomicU64::new(0),
        }
    }

    /// Mint a request id. Time-based plus a session counter - unique
    /// within a session, which is the only hard requirement.
    pub fn issue(&self) -> RequestId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("{}-{}", millis, self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a request as loading. Called when the loading indicator goes
    /// up, before the first model call.
    pub fn begin(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            id.to_string(),
            ActiveRequest {
                status: RequestStatus::Loading,
                touched: Instant::now(),
            },
        );
        log::debug!("[TRACK] {} loading ({} active)", id, inner.len());
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.inner.lock().unwrap().contains_key(id)
    }

    /// Apply a terminal status. Returns whether the event should be
    /// rendered: false means the id is no longer tracked (superseded,
    /// already terminated, or swept) and the caller must drop it.
    pub fn deliver_terminal(&self, id: &str, status: RequestStatus) -> bool {
        debug_assert!(matches!(
            status,
            RequestStatus::Success | RequestStatus::Error
        ));
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(id) {
            Some(record) => {
                record.status = status;
                record.touched = Instant::now();
                true
            }
            None => {
                log::info!("[TRACK] Dropping stale terminal event for {}", id);
                false
            }
        }
    }

    /// Record that a result picker was shown for this request.
    pub fn mark_modal_shown(&self, id: &str) {
        if let Some(record) = self.inner.lock().unwrap().get_mut(id) {
            record.status = RequestStatus::ModalShown;
            record.touched = Instant::now();
        }
    }

    /// Stop tracking a request - its notification ran its course. Later
    /// terminal events for this id become no-ops.
    pub fn finish(&self, id: &str) {
        self.inner.lock().unwrap().remove(id);
    }

    pub fn status(&self, id: &str) -> Option<RequestStatus> {
        self.inner.lock().unwrap().get(id).map(|r| r.status)
    }

    /// Evict requests idle longer than the TTL, regardless of status.
    /// Bounds memory growth from abandoned requests. Returns the count
    /// evicted.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.len();
        inner.retain(|_, record| record.touched.elapsed() <= self.ttl);
        let evicted = before - inner.len();
        if evicted > 0 {
            log::info!("[TRACK] Swept {} idle requests", evicted);
        }
        evicted
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Run the periodic sweep on the tokio runtime. The original swept once a
/// minute; the interval is a parameter so embedders can tune it with the
/// TTL.
pub fn spawn_sweeper(tracker: Arc<RequestTracker>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracker.sweep();
        }
    })
}
