//! End-to-end tests for the `Protocol` service using an in-memory peer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use modlink::prelude::*;
use modlink::{capability, chunk, core_opcode, CHUNK_THRESHOLD, CORE_MODULE, OP_ERROR};

// ---------------------------------------------------------------------------
// Test peer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestPeer {
    id: u64,
    security: u32,
    outbox: Mutex<Vec<String>>,
}

impl Peer for TestPeer {
    fn id(&self) -> PeerId {
        PeerId(self.id)
    }

    fn security_level(&self) -> u32 {
        self.security
    }

    fn deliver(&self, text: &str) {
        self.outbox.lock().unwrap().push(text.to_owned());
    }
}

impl TestPeer {
    fn with_id(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Reassembles the outbox fragments back into logical frames.
    fn received_frames(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut reassembly = modlink::Reassembly::new();
        for fragment in self.outbox.lock().unwrap().iter() {
            if reassembly.absorb(fragment) {
                frames.push(Frame::parse(&reassembly.assemble()).unwrap());
                reassembly.reset();
            }
        }
        frames
    }

    fn clear(&self) {
        self.outbox.lock().unwrap().clear();
    }
}

fn collection_config() -> ProtocolConfig {
    ProtocolConfig::from_toml(
        r#"
        [modules.COLL]
        enabled = true

        [modules.GOMV]
        enabled = true
        min_security = 3

        [modules.SPEC]
        enabled = false
        "#,
    )
    .unwrap()
}

/// Feeds a logical frame to the service the way the transport would:
/// wrapped in chunk fragments.
fn ingest_frame(protocol: &mut Protocol, peer: &TestPeer, frame: &str) -> Option<RouteOutcome> {
    let mut outcome = None;
    for fragment in chunk(frame, CHUNK_THRESHOLD) {
        outcome = protocol.ingest(peer, &fragment);
    }
    outcome
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn json_request_reaches_handler_and_reply_comes_back_chunked() {
    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x02, |peer, frame| {
        assert!(frame.is_json());
        let requested = frame.json().get("kind").as_str().to_owned();

        let mut items = Value::array();
        for id in 0..120u32 {
            let mut item = Value::object();
            item.set("id", 9_000_000 + id).set("kind", requested.clone());
            items.push(item);
        }
        let reply = JsonFrame::new("COLL", 0x47)
            .set("items", items)
            .set("count", 120)
            .build();
        send_frame(peer, &reply);
    });

    let peer = TestPeer::with_id(1);
    let request = JsonFrame::new("COLL", 0x02).set("kind", "mounts").build();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &request),
        Some(RouteOutcome::Handled)
    );

    // The oversized reply arrived as multiple fragments but reassembles
    // into one logical frame with the payload intact.
    assert!(peer.outbox.lock().unwrap().len() > 1);
    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode(), 0x47);
    let payload = frames[0].json();
    assert_eq!(payload.get("count").as_u32(), 120);
    assert_eq!(payload.get("items").at(0).get("id").as_u64(), 9_000_000);
}

#[test]
fn fragments_arrive_out_of_order_with_duplicates() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x03, |_peer, frame| {
        CALLS.fetch_add(1, Ordering::SeqCst);
        assert_eq!(frame.json().get("hash").as_str().len(), 600);
    });

    let frame_text = JsonFrame::new("COLL", 0x03)
        .set("hash", "h".repeat(600))
        .build();
    let fragments = chunk(&frame_text, CHUNK_THRESHOLD);
    assert!(fragments.len() >= 3);

    let peer = TestPeer::with_id(2);
    let mut outcomes = Vec::new();
    // Deliver back to front, duplicating the middle fragment.
    for fragment in fragments.iter().rev() {
        outcomes.push(protocol.ingest(&peer, fragment));
        outcomes.push(protocol.ingest(&peer, &fragments[1]));
    }

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes.iter().filter(|o| o.is_some()).count(),
        1,
        "exactly one ingest call completed the transfer"
    );
}

#[test]
fn disabled_and_unknown_modules_follow_the_reply_policy() {
    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("SPEC", 0x01, |_peer, _frame| {
        panic!("disabled module handler must not run");
    });

    let peer = TestPeer::with_id(3);

    // Disabled module: exactly one structured error.
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "SPEC|1"),
        Some(RouteOutcome::ModuleDisabled)
    );
    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].module(), "SPEC");
    assert_eq!(frames[0].opcode(), OP_ERROR);
    assert_eq!(frames[0].get_u32(0), ErrorCode::ModuleDisabled.code());
    peer.clear();

    // Unknown opcode on an enabled module: silence.
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "COLL|99"),
        Some(RouteOutcome::NoHandler)
    );
    assert!(peer.outbox.lock().unwrap().is_empty());

    // Garbage: silence.
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "COLL"),
        Some(RouteOutcome::BadFrame)
    );
    assert!(peer.outbox.lock().unwrap().is_empty());
}

#[test]
fn security_floor_applies_per_module() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("GOMV", 0x01, |_peer, _frame| {
        CALLS.fetch_add(1, Ordering::SeqCst);
    });

    let player = TestPeer::with_id(4);
    assert_eq!(
        ingest_frame(&mut protocol, &player, "GOMV|1"),
        Some(RouteOutcome::PermissionDenied)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    let frames = player.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode(), modlink::OP_PERMISSION_DENIED);

    let gamemaster = TestPeer {
        id: 5,
        security: 3,
        ..Default::default()
    };
    assert_eq!(
        ingest_frame(&mut protocol, &gamemaster, "GOMV|1"),
        Some(RouteOutcome::Handled)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// CORE module
// ---------------------------------------------------------------------------

#[test]
fn compatible_handshake_negotiates_and_lists_features() {
    let mut protocol = Protocol::new(collection_config());
    let peer = TestPeer::with_id(6);

    let client_caps = capability::JSON_MESSAGES | capability::COMPRESSION;
    let request = FrameBuilder::new(CORE_MODULE, core_opcode::CMSG_HANDSHAKE)
        .push_str(format!("2.4.1|{client_caps}"))
        .build();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &request),
        Some(RouteOutcome::Handled)
    );

    let frames = peer.received_frames();
    assert_eq!(frames.len(), 2);

    let ack = &frames[0];
    assert_eq!(ack.opcode(), core_opcode::SMSG_HANDSHAKE_ACK);
    // The server's version string re-splits on the frame delimiter:
    // token 0 is the triple, token 1 the capability bits.
    let server = VersionInfo::parse(&format!("{}|{}", ack.get_str(0), ack.get_str(1)));
    assert_eq!(server, VersionInfo::server());
    assert!(ack.get_bool(2));
    // Negotiated = intersection; the client's COMPRESSION bit is not
    // offered by the server.
    assert_eq!(ack.get_u32(3), capability::JSON_MESSAGES);

    let features = &frames[1];
    assert_eq!(features.opcode(), core_opcode::SMSG_FEATURE_LIST);
    let listed: Vec<&str> = (0..features.data_count())
        .map(|i| features.get_str(i))
        .collect();
    assert_eq!(listed, vec!["COLL", "GOMV"]);
}

#[test]
fn incompatible_handshake_gets_ack_but_no_features() {
    let mut protocol = Protocol::new(collection_config());
    let peer = TestPeer::with_id(7);

    let request = FrameBuilder::new(CORE_MODULE, core_opcode::CMSG_HANDSHAKE)
        .push_str("1.9.9|3")
        .build();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &request),
        Some(RouteOutcome::Handled)
    );

    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode(), core_opcode::SMSG_HANDSHAKE_ACK);
    assert!(!frames[0].get_bool(2));
}

#[test]
fn garbled_version_is_treated_as_incompatible_not_an_error() {
    let mut protocol = Protocol::new(collection_config());
    let peer = TestPeer::with_id(8);

    let request = FrameBuilder::new(CORE_MODULE, core_opcode::CMSG_VERSION_CHECK)
        .push_str("definitely.not.a.version")
        .build();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &request),
        Some(RouteOutcome::Handled)
    );

    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode(), core_opcode::SMSG_VERSION_RESULT);
    assert!(!frames[0].get_bool(0));
}

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

#[test]
fn batch_frame_routes_every_entry() {
    static COLL_CALLS: AtomicUsize = AtomicUsize::new(0);
    static GOMV_CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x04, |_peer, frame| {
        COLL_CALLS.fetch_add(1, Ordering::SeqCst);
        assert_eq!(frame.get_str(0), "stats");
    });
    protocol.router_mut().register("GOMV", 0x02, |_peer, _frame| {
        GOMV_CALLS.fetch_add(1, Ordering::SeqCst);
    });

    let gamemaster = TestPeer {
        id: 9,
        security: 5,
        ..Default::default()
    };
    let batch = modlink::pack(&[
        BatchEntry::new("COLL", 0x04).push("stats"),
        BatchEntry::new("GOMV", 0x02).push("search"),
    ]);
    assert_eq!(
        ingest_frame(&mut protocol, &gamemaster, &batch),
        Some(RouteOutcome::Handled)
    );
    assert_eq!(COLL_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(GOMV_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn batch_entries_hit_module_gates_individually() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x04, |_peer, _frame| {
        CALLS.fetch_add(1, Ordering::SeqCst);
    });

    let peer = TestPeer::with_id(10);
    let batch = modlink::pack(&[
        BatchEntry::new("COLL", 0x04),
        BatchEntry::new("SPEC", 0x01), // disabled → one error reply
    ]);
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &batch),
        Some(RouteOutcome::Handled)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);

    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].module(), "SPEC");
    assert_eq!(frames[0].opcode(), OP_ERROR);
}

// ---------------------------------------------------------------------------
// Reassembly lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stale_transfer_is_evicted_and_peer_starts_fresh() {
    let mut config = collection_config();
    config.chunk_timeout_ms = 20;
    let mut protocol = Protocol::new(config);

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    protocol.router_mut().register("COLL", 0x05, |_peer, _frame| {
        CALLS.fetch_add(1, Ordering::SeqCst);
    });

    let peer = TestPeer::with_id(11);
    // Half a transfer, then silence past the TTL.
    assert!(protocol.ingest(&peer, "0|2|COLL|5|fir").is_none());
    std::thread::sleep(Duration::from_millis(50));

    // The TTL swept the stale half: a fresh single-fragment message is
    // not blocked by a transfer that will never finish.
    assert_eq!(
        protocol.ingest(&peer, "0|1|COLL|5|retry"),
        Some(RouteOutcome::Handled)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);

    // The dead transfer's tail just opens a new, incomplete transfer.
    assert!(protocol.ingest(&peer, "1|2|st").is_none());
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn forget_peer_abandons_in_flight_state() {
    let mut protocol = Protocol::new(collection_config());
    let peer = TestPeer::with_id(12);

    assert!(protocol.ingest(&peer, "0|2|COLL|5|aa").is_none());
    protocol.forget_peer(peer.id());

    // The tail fragment of the abandoned transfer establishes a fresh
    // (incomplete) transfer; nothing dispatches.
    assert!(protocol.ingest(&peer, "1|2|bb").is_none());
}

// ---------------------------------------------------------------------------
// Reload
// ---------------------------------------------------------------------------

#[test]
fn reload_flips_gates_without_touching_handlers() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x04, |_peer, _frame| {
        CALLS.fetch_add(1, Ordering::SeqCst);
    });

    let peer = TestPeer::with_id(13);
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "COLL|4"),
        Some(RouteOutcome::Handled)
    );

    // COLL vanishes from the new config entirely.
    let new_config = ProtocolConfig::from_toml(
        r#"
        [modules.SPEC]
        enabled = true
        "#,
    )
    .unwrap();
    protocol.reload(new_config);

    peer.clear();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "COLL|4"),
        Some(RouteOutcome::ModuleDisabled)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);

    // Re-enabling brings the original registration back without
    // re-registering.
    protocol.reload(collection_config());
    assert_eq!(
        ingest_frame(&mut protocol, &peer, "COLL|4"),
        Some(RouteOutcome::Handled)
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn reload_updates_advertised_feature_list() {
    let mut protocol = Protocol::new(collection_config());
    let peer = TestPeer::with_id(14);

    protocol.reload(
        ProtocolConfig::from_toml(
            r#"
            [modules.SEAS]
            enabled = true
            "#,
        )
        .unwrap(),
    );

    let query = FrameBuilder::new(CORE_MODULE, core_opcode::CMSG_FEATURE_QUERY).build();
    assert_eq!(
        ingest_frame(&mut protocol, &peer, &query),
        Some(RouteOutcome::Handled)
    );

    let frames = peer.received_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data_count(), 1);
    assert_eq!(frames[0].get_str(0), "SEAS");
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn metrics_track_the_dispatch_ladder() {
    let mut protocol = Protocol::new(collection_config());
    protocol.router_mut().register("COLL", 0x04, |_peer, _frame| {});
    // The permission rung only fires when a handler exists.
    protocol.router_mut().register("GOMV", 0x01, |_peer, _frame| {});

    let peer = TestPeer::with_id(15);
    ingest_frame(&mut protocol, &peer, "COLL|4");
    ingest_frame(&mut protocol, &peer, "COLL|99");
    ingest_frame(&mut protocol, &peer, "SPEC|1");
    ingest_frame(&mut protocol, &peer, "GOMV|1");
    protocol.send(&peer, "COLL|16|ok");

    let snapshot = protocol.metrics().snapshot();
    assert_eq!(snapshot.received, 4);
    assert_eq!(snapshot.sent, 1);
    assert_eq!(snapshot.unknown_dropped, 1);
    assert_eq!(snapshot.disabled_rejections, 1);
    assert_eq!(snapshot.permission_denials, 1);
    assert_eq!(snapshot.parse_errors, 0);
}
