//! The peer seam: what the router needs to know about the other end.

use std::fmt;

use modlink_frame::{chunk, CHUNK_THRESHOLD};

/// Stable identity for a connected peer.
///
/// Newtype over `u64` so a peer id can't be confused with any other
/// numeric id in handler code. The id outlives the connection object —
/// deferred work holds a `PeerId`, never the peer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A connected remote endpoint, as seen by the dispatch layer.
///
/// The host owns connections; this trait exposes exactly what routing
/// needs — an identity, the permission oracle, and the fire-and-forget
/// text primitive. `deliver` must accept one transport-sized message and
/// may drop it; the protocol never assumes delivery.
pub trait Peer: Send + Sync + 'static {
    fn id(&self) -> PeerId;

    /// Security level granted to this peer by the host (0 = regular user).
    fn security_level(&self) -> u32;

    /// Queues one raw transport message toward the peer. Best effort.
    fn deliver(&self, text: &str);
}

/// Sends a logical frame through the uniform chunked path.
///
/// Every outbound frame — replies, errors, pushes — goes through here, so
/// the receiver always sees `INDEX|TOTAL|...` fragments and runs a single
/// reassembly code path. The threshold is derived from the smaller
/// (client-direction) ceiling for both directions.
pub fn send_frame(peer: &dyn Peer, frame: &str) {
    for fragment in chunk(frame, CHUNK_THRESHOLD) {
        peer.deliver(&fragment);
    }
}
