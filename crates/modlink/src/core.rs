//! The `CORE` module: handshake, version check, feature discovery.
//!
//! Every other module is a feature someone may switch off; `CORE` is the
//! protocol talking about itself, and it is always enabled. The handshake
//! settles two questions before any feature traffic flows: *can we talk at
//! all* (major version equality) and *which optional features do we both
//! speak* (capability intersection).

use std::sync::{Arc, RwLock};

use modlink_frame::{Frame, FrameBuilder, VersionInfo, DELIMITER};
use modlink_router::{send_frame, Peer, Router, OP_ERROR, OP_PERMISSION_DENIED};
use tracing::{info, warn};

/// Module code reserved for protocol self-management.
pub const CORE_MODULE: &str = "CORE";

/// Opcodes of the `CORE` module.
pub mod opcode {
    use super::{OP_ERROR, OP_PERMISSION_DENIED};

    // Client → server
    pub const CMSG_HANDSHAKE: u8 = 0x01;
    pub const CMSG_VERSION_CHECK: u8 = 0x02;
    pub const CMSG_FEATURE_QUERY: u8 = 0x03;

    // Server → client
    pub const SMSG_HANDSHAKE_ACK: u8 = 0x10;
    pub const SMSG_VERSION_RESULT: u8 = 0x11;
    pub const SMSG_FEATURE_LIST: u8 = 0x12;
    pub const SMSG_RELOAD_UI: u8 = 0x13;
    pub const SMSG_PERMISSION_DENIED: u8 = OP_PERMISSION_DENIED;
    pub const SMSG_ERROR: u8 = OP_ERROR;
}

/// Shared state behind the `CORE` handlers.
///
/// The enabled-module list changes on configuration reload, after the
/// handlers have already been registered; hence the lock. Dispatch is
/// single-threaded, so the lock is never contended — it exists so reload
/// and the registered closures can share the value at all.
pub(crate) struct CoreState {
    server: VersionInfo,
    enabled_modules: RwLock<Vec<String>>,
}

impl CoreState {
    pub(crate) fn new(server: VersionInfo, enabled_modules: Vec<String>) -> Self {
        Self {
            server,
            enabled_modules: RwLock::new(enabled_modules),
        }
    }

    pub(crate) fn server(&self) -> VersionInfo {
        self.server
    }

    pub(crate) fn set_enabled_modules(&self, modules: Vec<String>) {
        *self.enabled_modules.write().expect("core state lock poisoned") = modules;
    }

    fn enabled_modules(&self) -> Vec<String> {
        self.enabled_modules
            .read()
            .expect("core state lock poisoned")
            .clone()
    }
}

/// Registers the `CORE` handlers on `router`.
pub(crate) fn register(router: &mut Router, state: Arc<CoreState>) {
    let handshake_state = Arc::clone(&state);
    router.register(
        CORE_MODULE,
        opcode::CMSG_HANDSHAKE,
        move |peer, frame| handle_handshake(peer, frame, &handshake_state),
    );

    let version_state = Arc::clone(&state);
    router.register(
        CORE_MODULE,
        opcode::CMSG_VERSION_CHECK,
        move |peer, frame| handle_version_check(peer, frame, &version_state),
    );

    router.register(
        CORE_MODULE,
        opcode::CMSG_FEATURE_QUERY,
        move |peer, _frame| send_feature_list(peer, &state),
    );
}

/// Rejoins a version string that the frame tokenizer split apart.
///
/// The wire form is `"MAJOR.MINOR.PATCH|CAPBITS"`, but the `|` inside it
/// is also the frame delimiter — a client sending `CORE|1|2.0.0|6` arrives
/// here as two data tokens. If the second token is all digits, it is the
/// capability field of the first.
fn normalize_version_args(frame: &Frame) -> String {
    let version = frame.get_str(0);
    if !version.contains(DELIMITER) && frame.data_count() >= 2 {
        let caps = frame.get_str(1);
        if !caps.is_empty() && caps.bytes().all(|b| b.is_ascii_digit()) {
            return format!("{version}{DELIMITER}{caps}");
        }
    }
    version.to_owned()
}

fn handle_handshake(peer: &dyn Peer, frame: &Frame, state: &CoreState) {
    let client = VersionInfo::parse(&normalize_version_args(frame));
    let server = state.server();

    let compatible = server.is_compatible(&client);
    let negotiated = client.capabilities & server.capabilities;

    info!(
        peer = %peer.id(),
        client = %client,
        compatible,
        negotiated,
        "addon handshake"
    );

    let ack = FrameBuilder::new(CORE_MODULE, opcode::SMSG_HANDSHAKE_ACK)
        .push_str(server.to_string())
        .push_bool(compatible)
        .push_u32(negotiated)
        .build();
    send_frame(peer, &ack);

    if !compatible {
        warn!(
            peer = %peer.id(),
            client = %client,
            server = %server,
            "handshake version mismatch"
        );
        return;
    }

    // A compatible client gets the feature list without asking.
    send_feature_list(peer, state);
}

fn handle_version_check(peer: &dyn Peer, frame: &Frame, state: &CoreState) {
    let client = VersionInfo::parse(&normalize_version_args(frame));
    let server = state.server();
    let compatible = server.is_compatible(&client);

    let reply = FrameBuilder::new(CORE_MODULE, opcode::SMSG_VERSION_RESULT)
        .push_bool(compatible)
        .push_str(server.to_string())
        .push_str(if compatible {
            "OK"
        } else {
            "version mismatch - please update the addon"
        })
        .build();
    send_frame(peer, &reply);
}

/// Sends the enabled module codes, one data token each.
///
/// Deliberately a plain frame rather than JSON: the feature list must be
/// readable even by a client whose negotiated capabilities exclude JSON
/// payloads.
fn send_feature_list(peer: &dyn Peer, state: &CoreState) {
    let mut builder = FrameBuilder::new(CORE_MODULE, opcode::SMSG_FEATURE_LIST);
    for module in state.enabled_modules() {
        builder = builder.push_str(module);
    }
    send_frame(peer, &builder.build());
}
