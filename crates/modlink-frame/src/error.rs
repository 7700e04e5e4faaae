//! Error type for frame parsing.
//!
//! Only the envelope parser has a fallible surface; the chunker and the
//! value codec express failure through their own contracts (`false` /
//! degrade-to-null). Callers at the dispatch layer map every variant here
//! to the same observable behavior — a silent drop — but the distinction
//! matters for logs and tests.

/// Why a raw message failed to parse as a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The message had no opcode field at all (e.g. `"COLL"`).
    #[error("frame is missing an opcode field")]
    MissingOpcode,

    /// The module token was empty (e.g. `"|2|x"`).
    #[error("frame module is empty")]
    EmptyModule,

    /// The opcode token did not parse as an unsigned byte.
    #[error("opcode is not an unsigned byte: {0:?}")]
    BadOpcode(String),
}
