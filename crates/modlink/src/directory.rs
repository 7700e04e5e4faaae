//! Live-peer directory and deferred completion.
//!
//! Handlers must not block the dispatch thread, so slow work (database
//! lookups, cross-realm queries) runs as a spawned task. The task captures
//! only the peer's *identity* — by the time it finishes, the triggering
//! connection object may be long gone. On completion the identity is
//! resolved against this directory and the continuation runs against the
//! live peer, or not at all.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use modlink_router::{Peer, PeerId};
use tracing::debug;

/// Registry of currently-connected peers.
///
/// The host registers a peer when its connection is established and
/// unregisters it on disconnect. Lookups hand out clones of the shared
/// handle.
#[derive(Default)]
pub struct PeerDirectory {
    peers: Mutex<HashMap<PeerId, Arc<dyn Peer>>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: Arc<dyn Peer>) {
        self.peers.lock().unwrap().insert(peer.id(), peer);
    }

    pub fn unregister(&self, id: PeerId) {
        self.peers.lock().unwrap().remove(&id);
    }

    /// Resolves an identity to the live peer, if still connected.
    pub fn resolve(&self, id: PeerId) -> Option<Arc<dyn Peer>> {
        self.peers.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().unwrap().is_empty()
    }
}

/// Runs `work` off-thread and delivers its result to `peer` — if that peer
/// is still connected when the work finishes.
///
/// The spawned task holds the [`PeerId`] and the directory handle, never a
/// connection. A peer that disconnected mid-flight makes the completion a
/// logged no-op.
pub fn complete_later<T, Fut, Done>(
    directory: Arc<PeerDirectory>,
    peer: PeerId,
    work: Fut,
    on_done: Done,
) -> tokio::task::JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    Done: FnOnce(&dyn Peer, T) + Send + 'static,
{
    tokio::spawn(async move {
        let value = work.await;
        match directory.resolve(peer) {
            Some(live) => on_done(live.as_ref(), value),
            None => debug!(%peer, "peer gone before deferred completion; dropping result"),
        }
    })
}
