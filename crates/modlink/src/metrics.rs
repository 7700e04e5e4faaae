//! Lightweight protocol counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for what the dispatch layer observed.
///
/// Plain relaxed atomics — read by ops tooling, never used for control
/// flow. `received` counts inbound transport messages (fragments);
/// `sent` counts outbound logical frames.
#[derive(Debug, Default)]
pub struct ProtocolMetrics {
    pub(crate) received: AtomicU64,
    pub(crate) sent: AtomicU64,
    pub(crate) parse_errors: AtomicU64,
    pub(crate) unknown_dropped: AtomicU64,
    pub(crate) disabled_rejections: AtomicU64,
    pub(crate) permission_denials: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub sent: u64,
    pub parse_errors: u64,
    pub unknown_dropped: u64,
    pub disabled_rejections: u64,
    pub permission_denials: u64,
}

impl ProtocolMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            unknown_dropped: self.unknown_dropped.load(Ordering::Relaxed),
            disabled_rejections: self.disabled_rejections.load(Ordering::Relaxed),
            permission_denials: self.permission_denials.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.parse_errors.store(0, Ordering::Relaxed);
        self.unknown_dropped.store(0, Ordering::Relaxed);
        self.disabled_rejections.store(0, Ordering::Relaxed);
        self.permission_denials.store(0, Ordering::Relaxed);
    }
}
