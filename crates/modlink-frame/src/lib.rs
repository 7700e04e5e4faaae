//! Wire format for modlink.
//!
//! Everything that travels on the addon channel is a short `|`-delimited
//! text message. This crate owns the three nested layers of that text:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ fragment:  INDEX|TOTAL|<slice-of-frame>             │  ← chunk layer
//! │ ┌─────────────────────────────────────────────────┐ │
//! │ │ frame:  MODULE|OPCODE|DATA1|DATA2|...           │ │  ← envelope
//! │ │         MODULE|OPCODE|J|<json-text>             │ │  ← JSON variant
//! │ │         BATCH|COUNT|MOD|OP|N|D...|MOD|OP|N|D... │ │  ← batch variant
//! │ └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! plus [`VersionInfo`], the version/capability handshake value serialized
//! as `MAJOR.MINOR.PATCH|CAPBITS`.
//!
//! The transport under this crate delivers at most [`MAX_CLIENT_FRAME`]
//! bytes toward the server and [`MAX_SERVER_FRAME`] bytes toward the
//! client, with no ordering or delivery guarantee. Outbound frames are
//! *always* wrapped in the chunk layer — a frame that fits becomes the
//! single fragment `0|1|<frame>` — so every receiver runs one reassembly
//! code path regardless of message size.

mod batch;
mod chunk;
mod error;
mod frame;
mod version;

pub use batch::{BatchEntry, pack, unpack, BATCH_MODULE, MAX_BATCH_ENTRIES};
pub use chunk::{chunk, Reassembly, MAX_FRAGMENTS};
pub use error::FrameError;
pub use frame::{Frame, FrameBuilder, FrameReader, JsonFrame};
pub use version::{capability, VersionInfo, PROTOCOL_MAJOR, PROTOCOL_MINOR, PROTOCOL_PATCH};

/// Field separator for every layer of the wire format.
pub const DELIMITER: char = '|';

/// Hard ceiling on a client→server transport message, in bytes.
pub const MAX_CLIENT_FRAME: usize = 255;

/// Hard ceiling on a server→client transport message, in bytes.
pub const MAX_SERVER_FRAME: usize = 2560;

/// Bytes reserved for the `INDEX|TOTAL|` chunk header.
pub const CHUNK_HEADROOM: usize = 10;

/// Size at which the chunker starts splitting. Deliberately derived from
/// the *smaller* (client-direction) ceiling so both directions share one
/// threshold; see [`chunk`].
pub const CHUNK_THRESHOLD: usize = MAX_CLIENT_FRAME - CHUNK_HEADROOM;

/// Data token marking the frame's payload as a single JSON-encoded string.
pub const JSON_MARKER: &str = "J";
