//! Structured error replies.
//!
//! The protocol answers a rejected request with exactly one frame on one
//! of two fixed opcodes, shaped `MODULE|OPCODE|code|message`. The module
//! is echoed from the offending request so the client-side UI can route
//! the error to the feature that caused it.

use crate::{send_frame, Peer};
use modlink_frame::FrameBuilder;

/// Fixed opcode for generic structured errors.
pub const OP_ERROR: u8 = 0x1F;

/// Fixed opcode for permission rejections.
pub const OP_PERMISSION_DENIED: u8 = 0x1E;

/// Stable error codes carried in the first data token of an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    PermissionDenied = 1,
    ModuleDisabled = 2,
    BadFormat = 3,
    VersionMismatch = 4,
    CapNotSupported = 5,
    Unknown = 255,
}

impl ErrorCode {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Sends one structured error reply on [`OP_ERROR`].
pub fn send_error(peer: &dyn Peer, module: &str, code: ErrorCode, message: &str) {
    let frame = FrameBuilder::new(module, OP_ERROR)
        .push_u32(code.code())
        .push_str(message)
        .build();
    send_frame(peer, &frame);
}

/// Sends one structured rejection on [`OP_PERMISSION_DENIED`].
pub fn send_permission_denied(peer: &dyn Peer, module: &str, message: &str) {
    let frame = FrameBuilder::new(module, OP_PERMISSION_DENIED)
        .push_u32(ErrorCode::PermissionDenied.code())
        .push_str(message)
        .build();
    send_frame(peer, &frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PeerId;
    use modlink_frame::{Frame, Reassembly};
    use std::sync::Mutex;

    struct RecordingPeer {
        outbox: Mutex<Vec<String>>,
    }

    impl Peer for RecordingPeer {
        fn id(&self) -> PeerId {
            PeerId(1)
        }

        fn security_level(&self) -> u32 {
            0
        }

        fn deliver(&self, text: &str) {
            self.outbox.lock().unwrap().push(text.to_owned());
        }
    }

    fn unwrap_reply(raw: &str) -> Frame {
        let mut reassembly = Reassembly::new();
        assert!(reassembly.absorb(raw));
        Frame::parse(&reassembly.assemble()).unwrap()
    }

    #[test]
    fn test_error_reply_shape() {
        let peer = RecordingPeer {
            outbox: Mutex::new(Vec::new()),
        };
        send_error(&peer, "COLL", ErrorCode::ModuleDisabled, "module is disabled");

        let outbox = peer.outbox.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        let frame = unwrap_reply(&outbox[0]);
        assert_eq!(frame.module(), "COLL");
        assert_eq!(frame.opcode(), OP_ERROR);
        assert_eq!(frame.get_u32(0), ErrorCode::ModuleDisabled.code());
        assert_eq!(frame.get_str(1), "module is disabled");
    }

    #[test]
    fn test_permission_denied_reply_shape() {
        let peer = RecordingPeer {
            outbox: Mutex::new(Vec::new()),
        };
        send_permission_denied(&peer, "GOMV", "insufficient security level");

        let outbox = peer.outbox.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        let frame = unwrap_reply(&outbox[0]);
        assert_eq!(frame.opcode(), OP_PERMISSION_DENIED);
        assert_eq!(frame.get_u32(0), ErrorCode::PermissionDenied.code());
    }
}
