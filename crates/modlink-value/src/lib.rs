//! Value model and codec for modlink payloads.
//!
//! This crate defines the structured data that rides inside a frame's JSON
//! slot:
//!
//! - **[`Value`]** — a tagged union over null, booleans, numbers, strings,
//!   arrays, and objects.
//! - **Encoding** ([`Value::encode`]) — deterministic text output: object
//!   keys in ascending lexicographic order, integral numbers without
//!   exponent or fraction.
//! - **Decoding** ([`Value::parse`]) — total and non-panicking: malformed
//!   input degrades to [`Value::Null`] at the failing node instead of
//!   aborting the parse.
//!
//! # Why not serde_json?
//!
//! The peers on the other end of this protocol run a decoder with a very
//! small, fixed feature set (five escape sequences, no full Unicode escapes,
//! integer-preserving number rendering). The encoder here is written against
//! that decoder, byte for byte, and the parser mirrors its degrade-to-null
//! contract — "field absent or null" is the normal error path, never a
//! `Result`. serde_json appears only in tests, as a reference to check the
//! output against.

mod codec;
mod types;

pub use types::Value;
