//! Text encoding and decoding for [`Value`].
//!
//! The encoder is deterministic: object keys come out in ascending
//! lexicographic order (guaranteed by the `BTreeMap` representation) and a
//! number that is mathematically integral within the safe-integer range is
//! rendered as plain digits. The default float formatter would turn an id
//! like `9000189` into `9.000189e6` on some paths, and the peers compare
//! these payloads textually.
//!
//! The parser is total. It never panics and never returns an error: any
//! malformed construct degrades to [`Value::Null`] at the point of failure
//! and the caller sees an absent field. Escape handling is deliberately
//! narrow — `\" \\ \n \r \t` decode, `\uXXXX` is consumed and degraded to
//! `?`, anything else is dropped. This matches the remote decoder; it is a
//! documented limitation, not full Unicode support.

use crate::Value;

/// Largest double whose integral values map 1:1 onto exact integers (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Nesting depth at which the parser gives up and yields `Null` for the
/// subtree. Keeps hostile input from overflowing the stack; real payloads
/// nest a handful of levels.
const MAX_DEPTH: usize = 128;

impl Value {
    /// Encodes the tree to its canonical text form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        write_value(self, &mut out);
        out
    }

    /// Parses `input`, degrading malformed constructs to [`Value::Null`].
    ///
    /// Never fails and never panics; trailing garbage after the first
    /// complete value is ignored.
    pub fn parse(input: &str) -> Value {
        let mut parser = Parser {
            bytes: input.as_bytes(),
            pos: 0,
        };
        parser.value(0)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(*n, out),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            // BTreeMap iterates keys in ascending order; the deterministic
            // key ordering falls out of the representation.
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn write_number(n: f64, out: &mut String) {
    // The value grammar has no NaN/Infinity literal; degrade to null.
    if !n.is_finite() {
        out.push_str("null");
        return;
    }

    // Integral and exactly representable: plain digits, no exponent.
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        out.push_str(&(n as i64).to_string());
        return;
    }

    out.push_str(&format_sig15(n));
}

/// Formats with 15 significant digits, fixed notation for decimal exponents
/// in `-4..15` and scientific otherwise, trailing zeros trimmed.
fn format_sig15(n: f64) -> String {
    let exponent = decimal_exponent(n);
    if (-4..15).contains(&exponent) {
        let decimals = (14 - exponent).max(0) as usize;
        let fixed = format!("{n:.decimals$}");
        trim_fraction(fixed)
    } else {
        let sci = format!("{n:.14e}");
        match sci.split_once('e') {
            Some((mantissa, exp)) => {
                format!("{}e{}", trim_fraction(mantissa.to_owned()), exp)
            }
            None => sci,
        }
    }
}

/// Decimal exponent of `n`, read off the stdlib's exact `{:e}` rendering
/// rather than computed through `log10` (which is off by one at exact powers
/// of ten on some platforms).
fn decimal_exponent(n: f64) -> i32 {
    let repr = format!("{n:e}");
    repr.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn value(&mut self, depth: usize) -> Value {
        if depth >= MAX_DEPTH {
            return Value::Null;
        }
        self.skip_whitespace();

        match self.peek() {
            Some(b'"') => self.string(),
            Some(b'{') => self.object(depth),
            Some(b'[') => self.array(depth),
            Some(b't') if self.eat_literal("true") => Value::Bool(true),
            Some(b'f') if self.eat_literal("false") => Value::Bool(false),
            Some(b'n') if self.eat_literal("null") => Value::Null,
            Some(b'-') | Some(b'0'..=b'9') => self.number(),
            _ => Value::Null,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Consumes `literal` if it is next in the input.
    fn eat_literal(&mut self, literal: &str) -> bool {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn string(&mut self) -> Value {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.pos += 1;

        let mut buf: Vec<u8> = Vec::new();
        while let Some(b) = self.peek() {
            match b {
                b'"' => break,
                b'\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => buf.push(b'"'),
                        Some(b'\\') => buf.push(b'\\'),
                        Some(b'n') => buf.push(b'\n'),
                        Some(b'r') => buf.push(b'\r'),
                        Some(b't') => buf.push(b'\t'),
                        Some(b'u') => {
                            // Consume the four hex digits, keep a placeholder.
                            self.pos = (self.pos + 4).min(self.bytes.len());
                            buf.push(b'?');
                        }
                        // Unknown escape: dropped, matching the remote
                        // decoder.
                        Some(_) => {}
                        None => break,
                    }
                    self.pos += 1;
                }
                _ => {
                    buf.push(b);
                    self.pos += 1;
                }
            }
        }
        if self.peek() == Some(b'"') {
            self.pos += 1;
        }
        Value::String(String::from_utf8_lossy(&buf).into_owned())
    }

    fn number(&mut self) -> Value {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        self.eat_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.eat_digits();
        }

        let text = &self.bytes[start..self.pos];
        std::str::from_utf8(text)
            .ok()
            .and_then(|t| t.parse::<f64>().ok())
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn array(&mut self, depth: usize) -> Value {
        debug_assert_eq!(self.peek(), Some(b'['));
        self.pos += 1;

        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Value::Array(items);
        }

        loop {
            let before = self.pos;
            items.push(self.value(depth + 1));
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => self.pos += 1,
                // Malformed element that consumed nothing: stop rather
                // than spin.
                _ if self.pos == before => break,
                _ => {}
            }
        }
        Value::Array(items)
    }

    fn object(&mut self, depth: usize) -> Value {
        debug_assert_eq!(self.peek(), Some(b'{'));
        self.pos += 1;

        let mut obj = Value::object();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return obj;
        }

        loop {
            let before = self.pos;
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                break;
            }
            let key = match self.string() {
                Value::String(k) => k,
                _ => break,
            };
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                break;
            }
            self.pos += 1;
            let value = self.value(depth + 1);
            obj.set(&key, value);

            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => self.pos += 1,
                _ if self.pos == before => break,
                _ => {}
            }
        }
        obj
    }
}
