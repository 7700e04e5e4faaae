//! Frame envelope: the `MODULE|OPCODE|DATA...` unit.
//!
//! Outbound, [`FrameBuilder`] and [`JsonFrame`] produce the text; inbound,
//! [`Frame::parse`] splits it back apart. The typed accessors on [`Frame`]
//! are convenience parsers, never strict ones: a malformed or missing token
//! reads as `0` / `false` / `""`. Handlers that care about presence check
//! `data_count()` or use [`FrameReader::has_more`].

use crate::{FrameError, DELIMITER, JSON_MARKER};
use modlink_value::Value;

// ---------------------------------------------------------------------------
// Frame (inbound)
// ---------------------------------------------------------------------------

/// One parsed logical protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    module: String,
    opcode: u8,
    data: Vec<String>,
}

impl Frame {
    /// Parses a raw frame string.
    ///
    /// Token 0 is the module (must be non-empty), token 1 the opcode (must
    /// parse as `u8` — on failure the whole frame is invalid), everything
    /// after is data. `"COLL|2"` with no data is a valid frame.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let mut tokens = raw.split(DELIMITER);

        let module = tokens.next().unwrap_or_default();
        if module.is_empty() {
            return Err(FrameError::EmptyModule);
        }

        let opcode_token = tokens.next().ok_or(FrameError::MissingOpcode)?;
        let opcode: u8 = opcode_token
            .parse()
            .map_err(|_| FrameError::BadOpcode(opcode_token.to_owned()))?;

        Ok(Self {
            module: module.to_owned(),
            opcode,
            data: tokens.map(str::to_owned).collect(),
        })
    }

    /// Assembles a frame directly from its parts (used when unpacking
    /// batch entries, which never exist as standalone text).
    pub fn from_parts(module: impl Into<String>, opcode: u8, data: Vec<String>) -> Self {
        Self {
            module: module.into(),
            opcode,
            data,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Data token at `index`, or `""` when out of range.
    pub fn get_str(&self, index: usize) -> &str {
        self.data.get(index).map(String::as_str).unwrap_or("")
    }

    /// Data token parsed as `i32`, or `0` on malformed input.
    pub fn get_i32(&self, index: usize) -> i32 {
        self.get_str(index).parse().unwrap_or(0)
    }

    /// Data token parsed as `u32`, or `0` on malformed input.
    pub fn get_u32(&self, index: usize) -> u32 {
        self.get_str(index).parse().unwrap_or(0)
    }

    /// Data token parsed as `u64`, or `0` on malformed input.
    pub fn get_u64(&self, index: usize) -> u64 {
        self.get_str(index).parse().unwrap_or(0)
    }

    /// Data token parsed as `f64`, or `0.0` on malformed input.
    pub fn get_f64(&self, index: usize) -> f64 {
        self.get_str(index).parse().unwrap_or(0.0)
    }

    /// Boolean data token: `"1"` is true, anything else is false.
    pub fn get_bool(&self, index: usize) -> bool {
        self.get_str(index) == "1"
    }

    /// True when the payload is the JSON pair `J|<json-text>`.
    pub fn is_json(&self) -> bool {
        !self.data.is_empty() && self.data[0] == JSON_MARKER
    }

    /// Decodes the JSON payload. Non-JSON frames and malformed payloads
    /// read as [`Value::Null`].
    pub fn json(&self) -> Value {
        if !self.is_json() || self.data.len() < 2 {
            return Value::Null;
        }
        Value::parse(&self.data[1])
    }

    /// Sequential cursor over the data tokens.
    pub fn reader(&self) -> FrameReader<'_> {
        FrameReader {
            frame: self,
            index: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// Parser-style sequential access to a frame's data tokens.
///
/// Mirrors the accessor defaults: reading past the end yields `0` / `false`
/// / `""` rather than failing, so handler code can read a fixed field list
/// off a short frame and treat the tail as absent.
#[derive(Debug)]
pub struct FrameReader<'a> {
    frame: &'a Frame,
    index: usize,
}

impl<'a> FrameReader<'a> {
    pub fn has_more(&self) -> bool {
        self.index < self.frame.data_count()
    }

    pub fn next_str(&mut self) -> &'a str {
        let value = self.frame.get_str(self.index);
        self.index += 1;
        value
    }

    pub fn next_i32(&mut self) -> i32 {
        let value = self.frame.get_i32(self.index);
        self.index += 1;
        value
    }

    pub fn next_u32(&mut self) -> u32 {
        let value = self.frame.get_u32(self.index);
        self.index += 1;
        value
    }

    pub fn next_u64(&mut self) -> u64 {
        let value = self.frame.get_u64(self.index);
        self.index += 1;
        value
    }

    pub fn next_f64(&mut self) -> f64 {
        let value = self.frame.get_f64(self.index);
        self.index += 1;
        value
    }

    pub fn next_bool(&mut self) -> bool {
        let value = self.frame.get_bool(self.index);
        self.index += 1;
        value
    }

    /// Next token without consuming it.
    pub fn peek_str(&self) -> &'a str {
        self.frame.get_str(self.index)
    }

    /// Skips `count` tokens.
    pub fn skip(&mut self, count: usize) {
        self.index += count;
    }

    /// Rewinds to the first data token.
    pub fn rewind(&mut self) {
        self.index = 0;
    }
}

// ---------------------------------------------------------------------------
// FrameBuilder (outbound)
// ---------------------------------------------------------------------------

/// Builds an outbound frame, token by token.
///
/// Numbers are rendered in decimal, booleans as `"1"`/`"0"` — the exact
/// tokens the inbound accessors expect.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    module: String,
    opcode: u8,
    data: Vec<String>,
}

impl FrameBuilder {
    pub fn new(module: impl Into<String>, opcode: u8) -> Self {
        Self {
            module: module.into(),
            opcode,
            data: Vec::new(),
        }
    }

    pub fn push_str(mut self, value: impl AsRef<str>) -> Self {
        self.data.push(value.as_ref().to_owned());
        self
    }

    pub fn push_i32(mut self, value: i32) -> Self {
        self.data.push(value.to_string());
        self
    }

    pub fn push_u32(mut self, value: u32) -> Self {
        self.data.push(value.to_string());
        self
    }

    pub fn push_u64(mut self, value: u64) -> Self {
        self.data.push(value.to_string());
        self
    }

    pub fn push_f64(mut self, value: f64) -> Self {
        self.data.push(value.to_string());
        self
    }

    pub fn push_bool(mut self, value: bool) -> Self {
        self.data.push(if value { "1" } else { "0" }.to_owned());
        self
    }

    /// Joins module, opcode, and data with the delimiter.
    pub fn build(&self) -> String {
        let mut out = self.module.clone();
        out.push(DELIMITER);
        out.push_str(&self.opcode.to_string());
        for token in &self.data {
            out.push(DELIMITER);
            out.push_str(token);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// JsonFrame (outbound)
// ---------------------------------------------------------------------------

/// Builds an outbound JSON frame: `MODULE|OPCODE|J|<json-text>`.
///
/// The body starts as an empty object so replies can be assembled with
/// chained [`set`](JsonFrame::set) calls:
///
/// ```
/// use modlink_frame::JsonFrame;
///
/// let text = JsonFrame::new("WRLD", 0x10)
///     .set("zone", 618)
///     .set("active", true)
///     .build();
/// assert_eq!(text, r#"WRLD|16|J|{"active":true,"zone":618}"#);
/// ```
#[derive(Debug, Clone)]
pub struct JsonFrame {
    module: String,
    opcode: u8,
    body: Value,
}

impl JsonFrame {
    pub fn new(module: impl Into<String>, opcode: u8) -> Self {
        Self {
            module: module.into(),
            opcode,
            body: Value::object(),
        }
    }

    /// Wraps an existing value tree instead of building one key at a time.
    pub fn with_body(module: impl Into<String>, opcode: u8, body: Value) -> Self {
        Self {
            module: module.into(),
            opcode,
            body,
        }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.set(key, value);
        self
    }

    pub fn build(&self) -> String {
        let mut out = self.module.clone();
        out.push(DELIMITER);
        out.push_str(&self.opcode.to_string());
        out.push(DELIMITER);
        out.push_str(JSON_MARKER);
        out.push(DELIMITER);
        out.push_str(&self.body.encode());
        out
    }
}
