//! The `(module, opcode)` dispatch table.

use std::collections::HashMap;

use modlink_frame::Frame;
use tracing::{debug, warn};

use crate::{send_error, send_permission_denied, ErrorCode, Peer};

/// A registered message handler.
///
/// Handlers run synchronously on the dispatch thread. Anything slow — a
/// database lookup, a cross-realm query — must be deferred with a captured
/// [`PeerId`](crate::PeerId), never by blocking here.
pub type Handler = Box<dyn Fn(&dyn Peer, &Frame) + Send + Sync>;

/// Per-module gating state.
///
/// A module is *unregistered* until the first `set_module_enabled` /
/// `set_module_min_security` call creates its gate; unregistered modules
/// route like disabled ones.
#[derive(Debug, Clone, Copy, Default)]
struct ModuleGate {
    enabled: bool,
    /// Minimum security level for the module's handlers; 0 = open to all.
    min_security: u32,
}

/// What `route` did with a frame.
///
/// The wire behavior is fixed by the protocol (reply, or silence); the
/// outcome value exists so callers, metrics, and tests can observe which
/// rung of the ladder fired without sniffing the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A handler ran.
    Handled,
    /// The text did not parse as a frame; dropped silently.
    BadFrame,
    /// Module disabled (or never registered); one error reply sent.
    ModuleDisabled,
    /// No handler for the opcode; dropped silently.
    NoHandler,
    /// Peer below the module's security floor; one rejection sent.
    PermissionDenied,
}

/// Registry of modules and handlers, owned by the composition root.
///
/// The router holds the only shared mutable state in the protocol layer:
/// the gate map and the handler table. Both are written during
/// single-threaded startup/reload and read during dispatch on that same
/// thread, so there is no interior locking. Wrap the router if dispatch is
/// ever parallelized.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, HashMap<u8, Handler>>,
    modules: HashMap<String, ModuleGate>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `(module, opcode)`. Registering the same
    /// pair again replaces the previous handler — last registration wins.
    pub fn register<F>(&mut self, module: &str, opcode: u8, handler: F)
    where
        F: Fn(&dyn Peer, &Frame) + Send + Sync + 'static,
    {
        self.handlers
            .entry(module.to_owned())
            .or_default()
            .insert(opcode, Box::new(handler));
    }

    /// Enables or disables a module, creating its gate on first use.
    pub fn set_module_enabled(&mut self, module: &str, enabled: bool) {
        self.modules.entry(module.to_owned()).or_default().enabled = enabled;
        debug!(module, enabled, "module gate updated");
    }

    /// Whether a module is registered and enabled.
    pub fn is_module_enabled(&self, module: &str) -> bool {
        self.modules.get(module).is_some_and(|gate| gate.enabled)
    }

    /// Sets the minimum security level required for the module's handlers.
    /// A floor of 0 admits every peer.
    pub fn set_module_min_security(&mut self, module: &str, min_security: u32) {
        self.modules
            .entry(module.to_owned())
            .or_default()
            .min_security = min_security;
    }

    /// Parses and dispatches one raw logical frame.
    pub fn route(&self, peer: &dyn Peer, raw: &str) -> RouteOutcome {
        match Frame::parse(raw) {
            Ok(frame) => self.route_frame(peer, &frame),
            Err(error) => {
                // No reliable channel exists to answer garbage input;
                // drop without a reply.
                debug!(peer = %peer.id(), %error, "dropping unparseable frame");
                RouteOutcome::BadFrame
            }
        }
    }

    /// Dispatches an already-parsed frame.
    ///
    /// The ladder, in order: module gate → handler lookup → security
    /// floor → invoke. Unknown opcodes inside an enabled module are
    /// dropped without a reply: a probe learns nothing, and a peer from a
    /// newer release degrades silently instead of erroring.
    pub fn route_frame(&self, peer: &dyn Peer, frame: &Frame) -> RouteOutcome {
        let module = frame.module();
        debug!(peer = %peer.id(), module, opcode = frame.opcode(), "routing frame");

        // An unregistered module carries the default (disabled) gate.
        let gate = self.modules.get(module).copied().unwrap_or_default();
        if !gate.enabled {
            send_error(
                peer,
                module,
                ErrorCode::ModuleDisabled,
                "module is disabled on this server",
            );
            return RouteOutcome::ModuleDisabled;
        }

        let Some(handler) = self
            .handlers
            .get(module)
            .and_then(|by_opcode| by_opcode.get(&frame.opcode()))
        else {
            debug!(peer = %peer.id(), module, opcode = frame.opcode(), "no handler; dropping");
            return RouteOutcome::NoHandler;
        };

        if peer.security_level() < gate.min_security {
            warn!(
                peer = %peer.id(),
                module,
                floor = gate.min_security,
                level = peer.security_level(),
                "permission denied"
            );
            send_permission_denied(peer, module, "insufficient security level for this module");
            return RouteOutcome::PermissionDenied;
        }

        handler(peer, frame);
        RouteOutcome::Handled
    }
}
