//! Dispatch layer for modlink.
//!
//! One channel carries many independent feature modules. This crate owns
//! the hop from "a complete logical frame arrived" to "the right feature
//! handler ran, or the peer was told why not":
//!
//! - **[`Peer`]** — the seam to the host: a permission oracle plus the
//!   best-effort "deliver this text" primitive.
//! - **[`Router`]** — registry of `(module, opcode) → handler` with
//!   per-module enable flags and minimum-security floors.
//! - **Error replies** ([`send_error`], [`send_permission_denied`]) — the
//!   two structured rejections the protocol ever puts on the wire.
//!
//! Everything else is dropped silently. An unknown opcode gets no answer —
//! a probing client learns nothing, and a client one release ahead of the
//! server degrades instead of erroring.

mod peer;
mod reply;
mod router;

pub use peer::{send_frame, Peer, PeerId};
pub use reply::{send_error, send_permission_denied, ErrorCode, OP_ERROR, OP_PERMISSION_DENIED};
pub use router::{RouteOutcome, Router};
