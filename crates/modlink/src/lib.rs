//! # modlink
//!
//! Module-multiplexed messaging protocol for constrained game-client
//! channels.
//!
//! The transport underneath is an addon message channel: short text
//! payloads (255 bytes toward the server, 2560 toward the client), no
//! delivery guarantee, no ordering, no multiplexing. modlink turns that
//! into something feature code can use — structured requests and
//! notifications, many independent modules on one channel, per-module
//! enable/permission gating, and version/capability negotiation across
//! client/server skew.
//!
//! ```text
//! host transport ──▶ Protocol::ingest ──▶ reassembly ──▶ Router ──▶ feature handler
//!                                                                        │
//! host transport ◀── chunked fragments ◀── FrameBuilder / JsonFrame ◀────┘
//! ```
//!
//! The workspace splits along those lines: `modlink-value` (payload model
//! and codec), `modlink-frame` (envelope, chunking, batching, version),
//! `modlink-router` (dispatch and gating), and this crate — the
//! composition root that ties them to configuration, per-peer reassembly
//! state, and deferred async completion.
//!
//! ## Quick start
//!
//! ```rust
//! use modlink::prelude::*;
//!
//! let config = ProtocolConfig::from_toml(
//!     r#"
//!     [modules.COLL]
//!     enabled = true
//!     "#,
//! )
//! .unwrap();
//!
//! let mut protocol = Protocol::new(config);
//! protocol.router_mut().register("COLL", 0x04, |peer, frame| {
//!     // Build and send a reply; oversized frames chunk transparently.
//!     let reply = JsonFrame::new("COLL", 0x43).set("total", 128).build();
//!     send_frame(peer, &reply);
//!     let _ = frame;
//! });
//!
//! // Feed transport messages as they arrive:
//! // protocol.ingest(&peer, text);
//! ```

mod config;
mod core;
mod directory;
mod inbox;
mod metrics;
mod service;

pub use config::{ConfigError, ModuleConfig, ProtocolConfig};
pub use crate::core::{opcode as core_opcode, CORE_MODULE};
pub use directory::{complete_later, PeerDirectory};
pub use inbox::ReassemblyTable;
pub use metrics::{MetricsSnapshot, ProtocolMetrics};
pub use service::Protocol;

// The building blocks feature modules actually touch, re-exported so a
// feature crate depends on `modlink` alone.
pub use modlink_frame::{
    capability, chunk, pack, unpack, BatchEntry, Frame, FrameBuilder, FrameError, FrameReader,
    JsonFrame, Reassembly, VersionInfo, BATCH_MODULE, CHUNK_THRESHOLD, DELIMITER, JSON_MARKER,
    MAX_BATCH_ENTRIES, MAX_CLIENT_FRAME, MAX_FRAGMENTS, MAX_SERVER_FRAME,
};
pub use modlink_router::{
    send_error, send_frame, send_permission_denied, ErrorCode, Peer, PeerId, RouteOutcome, Router,
    OP_ERROR, OP_PERMISSION_DENIED,
};
pub use modlink_value::Value;

/// One-stop imports for feature-module code.
pub mod prelude {
    pub use crate::{
        complete_later, send_error, send_frame, send_permission_denied, BatchEntry, ErrorCode,
        Frame, FrameBuilder, JsonFrame, Peer, PeerDirectory, PeerId, Protocol, ProtocolConfig,
        RouteOutcome, Router, Value, VersionInfo,
    };
}
