//! Per-peer inbound reassembly with TTL eviction.
//!
//! The chunk layer has no message id, so a peer has exactly one transfer
//! in flight; the table keys that transfer by [`PeerId`]. A peer that
//! disconnects mid-transfer simply stops feeding fragments — its entry
//! ages out at the next ingest, or is dropped eagerly via [`forget`].
//!
//! [`forget`]: ReassemblyTable::forget

use std::collections::HashMap;
use std::time::{Duration, Instant};

use modlink_frame::Reassembly;
use modlink_router::PeerId;
use tracing::debug;

struct Transfer {
    reassembly: Reassembly,
    last_seen: Instant,
}

/// In-flight transfers keyed by peer identity.
pub struct ReassemblyTable {
    pending: HashMap<PeerId, Transfer>,
    ttl: Duration,
    max_fragments: usize,
}

impl ReassemblyTable {
    pub fn new(ttl: Duration, max_fragments: usize) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
            max_fragments,
        }
    }

    /// Feeds one transport message from `peer`. Returns the reassembled
    /// logical frame once the peer's transfer completes, `None` while it
    /// is still in flight (or the fragment was rejected).
    pub fn absorb(&mut self, peer: PeerId, fragment: &str) -> Option<String> {
        let now = Instant::now();
        self.purge_expired(now);

        let max_fragments = self.max_fragments;
        let transfer = self.pending.entry(peer).or_insert_with(|| Transfer {
            reassembly: Reassembly::with_max_fragments(max_fragments),
            last_seen: now,
        });
        transfer.last_seen = now;

        if transfer.reassembly.absorb(fragment) {
            let message = transfer.reassembly.assemble();
            self.pending.remove(&peer);
            return Some(message);
        }

        // A rejected first fragment establishes nothing; don't keep an
        // empty entry alive until the TTL sweeps it.
        if !transfer.reassembly.is_started() {
            self.pending.remove(&peer);
        }
        None
    }

    /// Drops a peer's in-flight state (e.g. on disconnect).
    pub fn forget(&mut self, peer: PeerId) {
        self.pending.remove(&peer);
    }

    /// Evicts transfers idle longer than the TTL.
    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.pending.len();
        self.pending
            .retain(|_, transfer| now.duration_since(transfer.last_seen) <= ttl);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            debug!(evicted, "evicted stale reassembly state");
        }
    }

    /// Updates limits from a reloaded configuration. In-flight transfers
    /// keep their already-allocated slots; the new TTL applies from now.
    pub fn set_limits(&mut self, ttl: Duration, max_fragments: usize) {
        self.ttl = ttl;
        self.max_fragments = max_fragments;
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
