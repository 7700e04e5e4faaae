//! The `Protocol` service: the composition root of the dispatch layer.
//!
//! One `Protocol` value owns everything the layer needs — router, module
//! gates, per-peer reassembly, metrics — and the host drives it from a
//! single thread:
//!
//! ```text
//! transport text ──▶ ingest ──▶ reassembly ──▶ parse ──▶ batch fan-out
//!                                                            │
//!                                              handler ◀── route
//! ```
//!
//! `ingest` never blocks and never suspends. Handlers that need slow work
//! defer it with [`complete_later`](crate::complete_later) and a captured
//! [`PeerId`](modlink_router::PeerId).

use std::sync::Arc;

use modlink_frame::{pack, unpack, BatchEntry, Frame, FrameBuilder, VersionInfo, BATCH_MODULE};
use modlink_router::{send_frame, Peer, PeerId, RouteOutcome, Router};
use tracing::{debug, info};

use crate::core::{self, CoreState, CORE_MODULE};
use crate::inbox::ReassemblyTable;
use crate::metrics::ProtocolMetrics;
use crate::ProtocolConfig;

/// The protocol service. Construct one per process (or per realm), wire
/// feature modules onto [`router_mut`](Protocol::router_mut) at startup,
/// then feed it transport messages.
pub struct Protocol {
    router: Router,
    inbox: ReassemblyTable,
    config: ProtocolConfig,
    metrics: Arc<ProtocolMetrics>,
    core: Arc<CoreState>,
}

impl Protocol {
    /// Builds a service from configuration: module gates applied, `CORE`
    /// handlers registered and enabled.
    pub fn new(config: ProtocolConfig) -> Self {
        let mut router = Router::new();
        let core = Arc::new(CoreState::new(
            VersionInfo::server(),
            config.enabled_modules(),
        ));
        core::register(&mut router, Arc::clone(&core));

        let inbox = ReassemblyTable::new(config.chunk_timeout(), config.max_fragments);

        let mut protocol = Self {
            router,
            inbox,
            config,
            metrics: Arc::new(ProtocolMetrics::default()),
            core,
        };
        protocol.apply_gates();
        protocol
    }

    /// Mutable access to the router for feature-module registration.
    /// Registration belongs to single-threaded startup, before traffic.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProtocolMetrics {
        &self.metrics
    }

    /// Feeds one raw transport message from `peer`.
    ///
    /// Returns `None` while the peer's transfer is incomplete (or the
    /// fragment was rejected), `Some(outcome)` once a logical frame was
    /// dispatched.
    pub fn ingest(&mut self, peer: &dyn Peer, text: &str) -> Option<RouteOutcome> {
        ProtocolMetrics::bump(&self.metrics.received);
        let frame_text = self.inbox.absorb(peer.id(), text)?;
        Some(self.dispatch(peer, &frame_text))
    }

    /// Sends one logical frame to `peer` through the uniform chunked path.
    pub fn send(&self, peer: &dyn Peer, frame: &str) {
        ProtocolMetrics::bump(&self.metrics.sent);
        send_frame(peer, frame);
    }

    /// Packs `entries` into a `BATCH` frame and sends it.
    pub fn send_batch(&self, peer: &dyn Peer, entries: &[BatchEntry]) {
        self.send(peer, &pack(entries));
    }

    /// Tells a client to reload its UI (after a hot config change).
    pub fn request_ui_reload(&self, peer: &dyn Peer) {
        let frame = FrameBuilder::new(CORE_MODULE, core::opcode::SMSG_RELOAD_UI).build();
        self.send(peer, &frame);
    }

    /// Drops a disconnected peer's in-flight reassembly state.
    pub fn forget_peer(&mut self, peer: PeerId) {
        self.inbox.forget(peer);
    }

    /// Applies a new configuration: module gates, reassembly limits, and
    /// the advertised feature list. Handler registrations are untouched.
    pub fn reload(&mut self, config: ProtocolConfig) {
        // Modules dropped from the config are disabled, not forgotten.
        for module in self.config.modules.keys() {
            if !config.modules.contains_key(module) {
                self.router.set_module_enabled(module, false);
            }
        }

        self.config = config;
        self.apply_gates();
        self.inbox
            .set_limits(self.config.chunk_timeout(), self.config.max_fragments);
        self.core.set_enabled_modules(self.config.enabled_modules());
        info!(
            modules = self.config.modules.len(),
            "protocol configuration reloaded"
        );
    }

    fn apply_gates(&mut self) {
        for (module, gate) in &self.config.modules {
            self.router.set_module_enabled(module, gate.enabled);
            self.router
                .set_module_min_security(module, gate.min_security.unwrap_or(0));
        }
        // CORE is the protocol itself: a client that cannot handshake
        // cannot be told anything else. Configuration may raise its
        // security floor but not disable it.
        self.router.set_module_enabled(CORE_MODULE, true);
    }

    fn dispatch(&self, peer: &dyn Peer, raw: &str) -> RouteOutcome {
        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(error) => {
                ProtocolMetrics::bump(&self.metrics.parse_errors);
                debug!(peer = %peer.id(), %error, "dropping unparseable frame");
                return RouteOutcome::BadFrame;
            }
        };

        if frame.module() == BATCH_MODULE {
            return self.dispatch_batch(peer, &frame);
        }

        let outcome = self.router.route_frame(peer, &frame);
        self.note_outcome(outcome);
        outcome
    }

    fn dispatch_batch(&self, peer: &dyn Peer, frame: &Frame) -> RouteOutcome {
        let entries = unpack(frame);
        if entries.is_empty() {
            ProtocolMetrics::bump(&self.metrics.parse_errors);
            debug!(peer = %peer.id(), "empty or malformed batch frame");
            return RouteOutcome::BadFrame;
        }

        debug!(peer = %peer.id(), entries = entries.len(), "dispatching batch");
        let mut last = RouteOutcome::BadFrame;
        let mut any_handled = false;
        for entry in entries {
            // A batch inside a batch would recurse; skip it.
            if entry.module == BATCH_MODULE {
                continue;
            }
            let sub: Frame = entry.into();
            let outcome = self.router.route_frame(peer, &sub);
            self.note_outcome(outcome);
            any_handled |= outcome == RouteOutcome::Handled;
            last = outcome;
        }

        if any_handled {
            RouteOutcome::Handled
        } else {
            last
        }
    }

    fn note_outcome(&self, outcome: RouteOutcome) {
        match outcome {
            RouteOutcome::Handled | RouteOutcome::BadFrame => {}
            RouteOutcome::NoHandler => ProtocolMetrics::bump(&self.metrics.unknown_dropped),
            RouteOutcome::ModuleDisabled => {
                ProtocolMetrics::bump(&self.metrics.disabled_rejections)
            }
            RouteOutcome::PermissionDenied => {
                ProtocolMetrics::bump(&self.metrics.permission_denials)
            }
        }
    }
}
