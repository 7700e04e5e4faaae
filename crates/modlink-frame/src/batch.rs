//! Best-effort batching: several logical frames in one outer frame.
//!
//! Round trips on this transport are expensive (one addon message each
//! way), so a sender may pack up to [`MAX_BATCH_ENTRIES`] sub-frames into
//! one `BATCH` frame:
//!
//! ```text
//! BATCH|count|MOD|OP|ndata|d1|..|dn|MOD|OP|ndata|d1|..
//! ```
//!
//! Each entry carries an explicit `ndata` token count, which makes entry
//! boundaries exact. (An earlier revision of the protocol sniffed for
//! "looks like a module code" to find the next entry, which misfired
//! whenever a data value happened to be a short uppercase word; the count
//! prefix closes that hole while keeping the outer `BATCH|count` contract
//! and the per-entry module/opcode/data contract unchanged.)
//!
//! Unpacking is best-effort: a malformed entry ends the parse and the
//! entries recovered so far are returned.

use crate::{Frame, DELIMITER};

/// Module code reserved for the batch container.
pub const BATCH_MODULE: &str = "BATCH";

/// Hard cap on entries per batch, bounding worst-case parse cost.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// One sub-frame inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub module: String,
    pub opcode: u8,
    pub data: Vec<String>,
}

impl BatchEntry {
    pub fn new(module: impl Into<String>, opcode: u8) -> Self {
        Self {
            module: module.into(),
            opcode,
            data: Vec::new(),
        }
    }

    pub fn push(mut self, token: impl Into<String>) -> Self {
        self.data.push(token.into());
        self
    }
}

impl From<BatchEntry> for Frame {
    fn from(entry: BatchEntry) -> Frame {
        Frame::from_parts(entry.module, entry.opcode, entry.data)
    }
}

/// Packs entries into one outer frame. Entries beyond the cap are dropped
/// (best-effort contract; callers sending more than the cap should split
/// the batch themselves).
pub fn pack(entries: &[BatchEntry]) -> String {
    let capped = &entries[..entries.len().min(MAX_BATCH_ENTRIES)];

    let mut out = format!("{BATCH_MODULE}{DELIMITER}{}", capped.len());
    for entry in capped {
        out.push(DELIMITER);
        out.push_str(&entry.module);
        out.push(DELIMITER);
        out.push_str(&entry.opcode.to_string());
        out.push(DELIMITER);
        out.push_str(&entry.data.len().to_string());
        for token in &entry.data {
            out.push(DELIMITER);
            out.push_str(token);
        }
    }
    out
}

/// Unpacks a parsed `BATCH` frame into its entries.
///
/// The outer frame's opcode field is the declared entry count. Returns an
/// empty vec for non-batch frames and counts of zero or beyond the cap;
/// stops early at the first malformed entry.
pub fn unpack(frame: &Frame) -> Vec<BatchEntry> {
    if frame.module() != BATCH_MODULE {
        return Vec::new();
    }
    let declared = frame.opcode() as usize;
    if declared == 0 || declared > MAX_BATCH_ENTRIES {
        return Vec::new();
    }

    let mut entries = Vec::new();
    let mut index = 0;
    while index < frame.data_count() && entries.len() < declared {
        let module = frame.get_str(index);
        if module.is_empty() {
            break;
        }
        let Ok(opcode) = frame.get_str(index + 1).parse::<u8>() else {
            break;
        };
        let Ok(ndata) = frame.get_str(index + 2).parse::<usize>() else {
            break;
        };
        index += 3;
        if index + ndata > frame.data_count() {
            break;
        }

        let data = (index..index + ndata)
            .map(|i| frame.get_str(i).to_owned())
            .collect();
        index += ndata;

        entries.push(BatchEntry {
            module: module.to_owned(),
            opcode,
            data,
        });
    }
    entries
}
