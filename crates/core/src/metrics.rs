//! Process-wide audit metrics.
//!
//! Hand-rolled atomic counters rather than the `metrics` crate's macro
//! registry: several label sets here (`action`, failure `reason`) are
//! influenced by callers we do not fully trust, so cardinality must stay
//! bounded rather than grow without limit for the lifetime of the process.
//! Mirrors the shape of the gateway's own metrics module in this repository
//! family: atomic counters plus label maps capped at [`MAX_TRACKED_LABELS`],
//! with a `snapshot()` method rather than a push-based exporter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Hard cap on distinct label values tracked per metric. Once reached,
/// further distinct labels are folded into an `"_overflow"` bucket rather
/// than growing the map unboundedly.
const MAX_TRACKED_LABELS: usize = 256;
const OVERFLOW_LABEL: &str = "_overflow";

#[derive(Default)]
struct DurationAccum {
    count: AtomicU64,
    sum_nanos: AtomicU64,
}

impl DurationAccum {
    fn observe(&self, duration: std::time::Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[allow(clippy::cast_precision_loss)]
    fn avg_seconds(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let sum = self.sum_nanos.load(Ordering::Relaxed);
        (sum as f64 / count as f64) / 1_000_000_000.0
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

fn bump_label(map: &RwLock<HashMap<String, AtomicU64>>, label: &str) {
    if let Some(counter) = map.read().get(label) {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    let mut guard = map.write();
    if let Some(counter) = guard.get(label) {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    let key = if guard.len() >= MAX_TRACKED_LABELS {
        OVERFLOW_LABEL
    } else {
        label
    };
    guard
        .entry(key.to_owned())
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

fn snapshot_label_map(map: &RwLock<HashMap<String, AtomicU64>>) -> HashMap<String, u64> {
    map.read()
        .iter()
        .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
        .collect()
}

/// Process-wide counters and gauges for the audit subsystem.
///
/// Initialized once (typically as a single `Arc<AuditMetrics>` shared by the
/// composed sink chain) and never torn down; all updates are lock-free
/// atomic operations except for the rare cold path of registering a new
/// label value.
#[derive(Default)]
pub struct AuditMetrics {
    events_total: RwLock<HashMap<String, AtomicU64>>,
    evictions_total: RwLock<HashMap<String, AtomicU64>>,
    failures_total: RwLock<HashMap<String, AtomicU64>>,
    dropped_reason_total: RwLock<HashMap<String, AtomicU64>>,
    insert_duration: RwLock<HashMap<(String, String), DurationAccum>>,
    verification_duration: RwLock<HashMap<String, DurationAccum>>,
    integrity_export_duration: DurationAccum,
    worker_restarts_total: AtomicU64,
    queue_high_watermark: AtomicI64,
    chain_head_total: AtomicU64,
    chain_anchor_total: AtomicU64,
    integrity_signed_total: AtomicU64,
}

impl AuditMetrics {
    /// Create a fresh, zeroed metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `audit_events_total{action}` += 1.
    pub fn record_event(&self, action: &str) {
        bump_label(&self.events_total, action);
    }

    /// `audit_evictions_total{source}` += `count`.
    pub fn record_evictions(&self, source: &str, count: u64) {
        if count == 0 {
            return;
        }
        for _ in 0..count {
            bump_label(&self.evictions_total, source);
        }
    }

    /// `audit_failures_total{reason}` += 1.
    pub fn record_failure(&self, reason: &str) {
        bump_label(&self.failures_total, reason);
    }

    /// `audit_events_dropped_reason_total{reason}` += 1.
    pub fn record_dropped(&self, reason: &str) {
        bump_label(&self.dropped_reason_total, reason);
    }

    /// `audit_insert_duration_seconds{sink,status}` observation.
    pub fn observe_insert(&self, sink: &str, status: &str, duration: std::time::Duration) {
        let key = (sink.to_owned(), status.to_owned());
        if let Some(accum) = self.insert_duration.read().get(&key) {
            accum.observe(duration);
            return;
        }
        let mut guard = self.insert_duration.write();
        guard.entry(key).or_default().observe(duration);
    }

    /// `audit_chain_verification_duration_seconds{status}` observation.
    pub fn observe_verification(&self, status: &str, duration: std::time::Duration) {
        if let Some(accum) = self.verification_duration.read().get(status) {
            accum.observe(duration);
            return;
        }
        let mut guard = self.verification_duration.write();
        guard.entry(status.to_owned()).or_default().observe(duration);
    }

    /// `audit_integrity_export_duration_seconds` observation.
    pub fn observe_integrity_export(&self, duration: std::time::Duration) {
        self.integrity_export_duration.observe(duration);
    }

    /// `audit_worker_restarts_total` += 1.
    pub fn record_worker_restart(&self) {
        self.worker_restarts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// `audit_queue_high_watermark` = `max(previous, current_len)`.
    pub fn observe_queue_len(&self, current_len: i64) {
        self.queue_high_watermark
            .fetch_max(current_len, Ordering::Relaxed);
    }

    /// `audit_chain_head_total` += 1 (a new row advanced the chain head).
    pub fn record_chain_head_advance(&self) {
        self.chain_head_total.fetch_add(1, Ordering::Relaxed);
    }

    /// `audit_chain_anchor_total` += 1.
    pub fn record_anchor(&self) {
        self.chain_anchor_total.fetch_add(1, Ordering::Relaxed);
    }

    /// `audit_integrity_signed_total` += 1.
    pub fn record_integrity_signed(&self) {
        self.integrity_signed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot suitable for serialization to a
    /// scrape endpoint or a debug API.
    #[must_use]
    pub fn snapshot(&self) -> AuditMetricsSnapshot {
        AuditMetricsSnapshot {
            events_total: snapshot_label_map(&self.events_total),
            evictions_total: snapshot_label_map(&self.evictions_total),
            failures_total: snapshot_label_map(&self.failures_total),
            dropped_reason_total: snapshot_label_map(&self.dropped_reason_total),
            insert_duration_avg_seconds: self
                .insert_duration
                .read()
                .iter()
                .map(|((sink, status), accum)| {
                    (format!("{sink}:{status}"), accum.avg_seconds())
                })
                .collect(),
            verification_duration_avg_seconds: self
                .verification_duration
                .read()
                .iter()
                .map(|(status, accum)| (status.clone(), accum.avg_seconds()))
                .collect(),
            integrity_export_duration_avg_seconds: self.integrity_export_duration.avg_seconds(),
            integrity_export_count: self.integrity_export_duration.count(),
            worker_restarts_total: self.worker_restarts_total.load(Ordering::Relaxed),
            queue_high_watermark: self.queue_high_watermark.load(Ordering::Relaxed),
            chain_head_total: self.chain_head_total.load(Ordering::Relaxed),
            chain_anchor_total: self.chain_anchor_total.load(Ordering::Relaxed),
            integrity_signed_total: self.integrity_signed_total.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, serializable snapshot of [`AuditMetrics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditMetricsSnapshot {
    /// `audit_events_total{action}`.
    pub events_total: HashMap<String, u64>,
    /// `audit_evictions_total{source}`.
    pub evictions_total: HashMap<String, u64>,
    /// `audit_failures_total{reason}`.
    pub failures_total: HashMap<String, u64>,
    /// `audit_events_dropped_reason_total{reason}`.
    pub dropped_reason_total: HashMap<String, u64>,
    /// `audit_insert_duration_seconds{sink,status}`, keyed as `"sink:status"`.
    pub insert_duration_avg_seconds: HashMap<String, f64>,
    /// `audit_chain_verification_duration_seconds{status}`.
    pub verification_duration_avg_seconds: HashMap<String, f64>,
    /// `audit_integrity_export_duration_seconds` average.
    pub integrity_export_duration_avg_seconds: f64,
    /// Number of integrity export observations.
    pub integrity_export_count: u64,
    /// `audit_worker_restarts_total`.
    pub worker_restarts_total: u64,
    /// `audit_queue_high_watermark`.
    pub queue_high_watermark: i64,
    /// `audit_chain_head_total`.
    pub chain_head_total: u64,
    /// `audit_chain_anchor_total`.
    pub chain_anchor_total: u64,
    /// `audit_integrity_signed_total`.
    pub integrity_signed_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_total_counts_per_action() {
        let m = AuditMetrics::new();
        m.record_event("NETWORK_CREATED");
        m.record_event("NETWORK_CREATED");
        m.record_event("IP_ALLOCATED");
        let snap = m.snapshot();
        assert_eq!(snap.events_total["NETWORK_CREATED"], 2);
        assert_eq!(snap.events_total["IP_ALLOCATED"], 1);
    }

    #[test]
    fn high_watermark_tracks_max() {
        let m = AuditMetrics::new();
        m.observe_queue_len(3);
        m.observe_queue_len(1);
        m.observe_queue_len(7);
        m.observe_queue_len(2);
        assert_eq!(m.snapshot().queue_high_watermark, 7);
    }

    #[test]
    fn dropped_reasons_tracked_independently() {
        let m = AuditMetrics::new();
        m.record_dropped("full");
        m.record_dropped("full");
        m.record_dropped("panic");
        let snap = m.snapshot();
        assert_eq!(snap.dropped_reason_total["full"], 2);
        assert_eq!(snap.dropped_reason_total["panic"], 1);
    }

    #[test]
    fn label_cardinality_is_bounded() {
        let m = AuditMetrics::new();
        for i in 0..(MAX_TRACKED_LABELS + 10) {
            m.record_event(&format!("action-{i}"));
        }
        let snap = m.snapshot();
        assert!(snap.events_total.len() <= MAX_TRACKED_LABELS + 1);
        assert!(snap.events_total.contains_key(OVERFLOW_LABEL));
    }

    #[test]
    fn insert_duration_averages() {
        let m = AuditMetrics::new();
        m.observe_insert("memory", "ok", std::time::Duration::from_millis(10));
        m.observe_insert("memory", "ok", std::time::Duration::from_millis(30));
        let snap = m.snapshot();
        let avg = snap.insert_duration_avg_seconds["memory:ok"];
        assert!((avg - 0.020).abs() < 0.001);
    }
}
