//! Protocol version and capability negotiation.
//!
//! Client and server ship on different cadences — an addon bundle can lag
//! the realm by months — so both sides exchange a [`VersionInfo`] during
//! the handshake and gate optional features on the capability bits they
//! have in common. Compatibility is deliberately coarse: equal `major` is
//! compatible, everything else about the triple is informational.

use std::fmt;

use crate::DELIMITER;

/// Current protocol version components.
pub const PROTOCOL_MAJOR: u8 = 2;
pub const PROTOCOL_MINOR: u8 = 0;
pub const PROTOCOL_PATCH: u8 = 0;

/// Capability bits for feature negotiation.
///
/// A bit names an optional protocol feature a peer supports. Effective
/// capabilities for a connection are the bitwise AND of both sides'
/// masks.
pub mod capability {
    pub const NONE: u32 = 0;
    /// JSON payload frames (`J` marker).
    pub const JSON_MESSAGES: u32 = 1 << 0;
    /// `BATCH` container frames.
    pub const BATCH_MESSAGES: u32 = 1 << 1;
    /// Compressed payloads.
    pub const COMPRESSION: u32 = 1 << 2;
    /// Binary protocol option.
    pub const BINARY_PROTO: u32 = 1 << 3;
    /// Asynchronous query responses.
    pub const ASYNC_QUERIES: u32 = 1 << 4;
    /// Delta sync for collection payloads.
    pub const DELTA_SYNC: u32 = 1 << 5;
    /// Module hot-reload notifications.
    pub const HOT_RELOAD: u32 = 1 << 6;

    /// What this server implementation actually speaks.
    pub const SERVER_DEFAULT: u32 = JSON_MESSAGES | BATCH_MESSAGES;
}

/// A peer's protocol version triple plus capability bitmask.
///
/// Immutable once constructed; compared, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub capabilities: u32,
}

impl VersionInfo {
    pub const fn new(major: u8, minor: u8, patch: u8, capabilities: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            capabilities,
        }
    }

    /// The version this build of the server reports.
    pub const fn server() -> Self {
        Self::new(
            PROTOCOL_MAJOR,
            PROTOCOL_MINOR,
            PROTOCOL_PATCH,
            capability::SERVER_DEFAULT,
        )
    }

    /// Version triple packed into one integer for ordering/logging.
    pub const fn packed(&self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8) | self.patch as u32
    }

    /// Peers are compatible iff their `major` versions match; minor and
    /// patch may differ freely.
    pub const fn is_compatible(&self, other: &VersionInfo) -> bool {
        self.major == other.major
    }

    pub const fn has_capability(&self, cap: u32) -> bool {
        self.capabilities & cap != 0
    }

    /// Parses `"MAJOR.MINOR.PATCH"` or `"MAJOR.MINOR.PATCH|CAPBITS"`.
    ///
    /// Total: any malformed component yields the all-zero value, which is
    /// treated as minimally capable and incompatible with every real
    /// version. Never fails.
    pub fn parse(text: &str) -> VersionInfo {
        parse_version(text).unwrap_or(VersionInfo::new(0, 0, 0, 0))
    }
}

fn parse_version(text: &str) -> Option<VersionInfo> {
    let (triple, caps) = match text.split_once(DELIMITER) {
        Some((triple, caps)) => (triple, caps.parse::<u32>().ok()?),
        None => (text, 0),
    };

    let mut components = triple.split('.');
    let major = components.next()?.parse().ok()?;
    let minor = components.next()?.parse().ok()?;
    let patch = components.next()?.parse().ok()?;
    if components.next().is_some() {
        return None;
    }

    Some(VersionInfo::new(major, minor, patch, caps))
}

impl fmt::Display for VersionInfo {
    /// Wire form: `"MAJOR.MINOR.PATCH|CAPBITS"`, capability bits decimal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}{}",
            self.major, self.minor, self.patch, DELIMITER, self.capabilities
        )
    }
}
