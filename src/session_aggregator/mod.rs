//! SessionAggregator - Per-(user, session) frame counters
//!
//! ## Responsibilities
//!
//! - Lazily create a counter on the first frame for a key
//! - Serve current stats for one key or for every user of a session
//! - Finalize: persist through the summary sink, then evict
//!
//! ## Concurrency
//!
//! Each key owns a slot behind its own `Mutex`; every operation on a key runs
//! while holding that slot, so `record` and `finalize` on the same key are
//! serialized while unrelated keys proceed in parallel. The map lock is only
//! held for lookups and never while waiting on a slot.
//!
//! A finalized slot is marked `retired` before it leaves the map. A `record`
//! that raced the finalize and lands on a retired slot starts over with a
//! fresh counter.
//!
//! The map has no size bound or expiry: entries live until finalized.

mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::summary_sink::{FinalizedSummary, SummarySink};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

/// Default deadline for one summary append (5 seconds)
const DEFAULT_SINK_TIMEOUT_MS: u64 = 5000;

/// Default number of append attempts before finalize gives up
const DEFAULT_SINK_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on the wait between two append attempts (5 seconds)
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5000;

/// Write-through policy for finalize
#[derive(Debug, Clone)]
pub struct FinalizePolicy {
    /// Deadline for a single append
    pub sink_timeout: Duration,
    /// Total append attempts (at least one is always made)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry
    pub retry_base_delay: Duration,
    /// Cap on the doubled delay
    pub max_retry_delay: Duration,
}

impl Default for FinalizePolicy {
    fn default() -> Self {
        Self {
            sink_timeout: Duration::from_millis(DEFAULT_SINK_TIMEOUT_MS),
            max_attempts: DEFAULT_SINK_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
        }
    }
}

/// Counter slot for one key
#[derive(Debug, Default)]
struct Slot {
    counter: AttendanceCounter,
    /// Set once the slot has been finalized and is leaving the map
    retired: bool,
}

/// SessionAggregator instance
pub struct SessionAggregator {
    entries: RwLock<HashMap<AttendanceKey, Arc<Mutex<Slot>>>>,
    sink: Arc<dyn SummarySink>,
    policy: FinalizePolicy,
}

impl SessionAggregator {
    /// Create new SessionAggregator
    pub fn new(sink: Arc<dyn SummarySink>, policy: FinalizePolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            sink,
            policy,
        }
    }

    /// Count one frame for `key`, creating the counter on first use
    ///
    /// Never fails. Returns the stats after the increment.
    pub async fn record(&self, key: &AttendanceKey, attentive: bool) -> AttendanceStats {
        loop {
            let slot = self.get_or_insert(key).await;
            let mut slot = slot.lock().await;
            if slot.retired {
                // Finalized while we waited; the next lookup creates a fresh slot
                continue;
            }
            slot.counter.record(attentive);
            return AttendanceStats::from_counter(key, &slot.counter);
        }
    }

    /// Current stats for `key`; zero-valued when the key is unknown
    pub async fn read(&self, key: &AttendanceKey) -> AttendanceStats {
        let Some(slot) = self.get(key).await else {
            return AttendanceStats::empty(key);
        };
        let slot = slot.lock().await;
        if slot.retired {
            return AttendanceStats::empty(key);
        }
        AttendanceStats::from_counter(key, &slot.counter)
    }

    /// Stats for every user with live counters in `session_id`
    ///
    /// Order is unspecified.
    pub async fn read_all_for_session(&self, session_id: &str) -> Vec<AttendanceStats> {
        let slots: Vec<(AttendanceKey, Arc<Mutex<Slot>>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(key, _)| key.session_id == session_id)
                .map(|(key, slot)| (key.clone(), slot.clone()))
                .collect()
        };

        let mut stats = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            let slot = slot.lock().await;
            // Skip finalized slots and ones whose first frame is still in flight
            if slot.retired || slot.counter.total_frames == 0 {
                continue;
            }
            stats.push(AttendanceStats::from_counter(&key, &slot.counter));
        }
        stats
    }

    /// Persist the final stats for `key` and evict it
    ///
    /// - `Ok(None)`: no frames recorded, nothing written
    /// - `Ok(Some(stats))`: summary appended, entry evicted
    /// - `Err(_)`: every append attempt failed; the entry stays live
    pub async fn finalize(&self, key: &AttendanceKey) -> Result<Option<AttendanceStats>> {
        let Some(slot) = self.get(key).await else {
            return Ok(None);
        };

        let mut guard = slot.lock().await;
        if guard.retired || guard.counter.total_frames == 0 {
            return Ok(None);
        }

        let stats = AttendanceStats::from_counter(key, &guard.counter);
        let summary = FinalizedSummary::new(&stats, Utc::now());

        if let Err(e) = self.append_with_retry(&summary).await {
            tracing::error!(
                key = %key,
                error = %e,
                "Finalize failed, session data kept live"
            );
            return Err(e);
        }

        guard.retired = true;
        {
            let mut entries = self.entries.write().await;
            if entries.get(key).is_some_and(|live| Arc::ptr_eq(live, &slot)) {
                entries.remove(key);
            }
        }

        tracing::info!(
            key = %key,
            total_frames = stats.total_frames,
            attentive_frames = stats.attentive_frames,
            attendance_percent = stats.attendance_percent,
            "Session finalized"
        );

        Ok(Some(stats))
    }

    /// Number of keys with at least one recorded frame
    ///
    /// A `record` dropped between slot insertion and its increment (client
    /// went away) leaves an empty slot behind; those are not counted.
    pub async fn live_count(&self) -> usize {
        let slots: Vec<Arc<Mutex<Slot>>> = self.entries.read().await.values().cloned().collect();

        let mut count = 0;
        for slot in slots {
            let slot = slot.lock().await;
            if !slot.retired && slot.counter.total_frames > 0 {
                count += 1;
            }
        }
        count
    }

    /// Append with per-attempt timeout and exponential backoff
    async fn append_with_retry(&self, summary: &FinalizedSummary) -> Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay(attempt)).await;
            }

            match timeout(self.policy.sink_timeout, self.sink.append(summary)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        error = %e,
                        "Summary append failed"
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        timeout_ms = self.policy.sink_timeout.as_millis(),
                        "Summary append timed out"
                    );
                    last_error = Some(Error::Timeout(format!(
                        "summary sink did not respond within {}ms",
                        self.policy.sink_timeout.as_millis()
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Internal("summary append never attempted".to_string())))
    }

    /// `base * 2^(attempt-1)`, saturating, capped at `max_retry_delay`
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.policy
            .retry_base_delay
            .saturating_mul(factor)
            .min(self.policy.max_retry_delay)
    }

    async fn get(&self, key: &AttendanceKey) -> Option<Arc<Mutex<Slot>>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Slot for `key`, inserting an empty one if absent
    async fn get_or_insert(&self, key: &AttendanceKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.get(key).await {
            return slot;
        }

        let mut entries = self.entries.write().await;
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone()
    }
}
