//! A complete feature module wired end to end over an in-memory peer.
//!
//! The `COLL` (collection) module here stands in for any real feature:
//! it answers a stats request with a small frame and a full-collection
//! request with a JSON payload big enough to exercise chunking. A second
//! handler defers its answer through the peer directory, the way a
//! database-backed handler would.
//!
//! Run with `RUST_LOG=debug cargo run -p feature-module` to watch the
//! routing decisions.

use std::sync::{Arc, Mutex};

use modlink::prelude::*;
use modlink::{chunk, CHUNK_THRESHOLD};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// An in-memory peer standing in for a connected game client
// ---------------------------------------------------------------------------

struct LoopbackPeer {
    id: PeerId,
    security: u32,
    outbox: Mutex<Vec<String>>,
}

impl LoopbackPeer {
    fn new(id: u64, security: u32) -> Arc<Self> {
        Arc::new(Self {
            id: PeerId(id),
            security,
            outbox: Mutex::new(Vec::new()),
        })
    }

    /// Reassembles whatever the server delivered back into logical frames.
    fn drain_frames(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut reassembly = modlink::Reassembly::new();
        for fragment in self.outbox.lock().unwrap().drain(..) {
            if reassembly.absorb(&fragment) {
                if let Ok(frame) = Frame::parse(&reassembly.assemble()) {
                    frames.push(frame);
                }
                reassembly.reset();
            }
        }
        frames
    }
}

impl Peer for LoopbackPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn security_level(&self) -> u32 {
        self.security
    }

    fn deliver(&self, text: &str) {
        self.outbox.lock().unwrap().push(text.to_owned());
    }
}

// ---------------------------------------------------------------------------
// The COLL module
// ---------------------------------------------------------------------------

mod coll {
    use super::*;

    pub const MODULE: &str = "COLL";

    pub const CMSG_GET_STATS: u8 = 0x04;
    pub const CMSG_GET_FULL_COLLECTION: u8 = 0x02;
    pub const SMSG_STATS: u8 = 0x43;
    pub const SMSG_FULL_COLLECTION: u8 = 0x41;

    pub fn register(router: &mut Router, directory: Arc<PeerDirectory>) {
        router.register(MODULE, CMSG_GET_STATS, |peer, _frame| {
            let reply = FrameBuilder::new(MODULE, SMSG_STATS)
                .push_u32(412) // owned
                .push_u32(830) // total
                .push_bool(true)
                .build();
            send_frame(peer, &reply);
        });

        // The full collection is "loaded" asynchronously: the handler
        // returns immediately and the reply is delivered later, if the
        // peer is still around.
        router.register(MODULE, CMSG_GET_FULL_COLLECTION, move |peer, frame| {
            let kind = frame.json().get("kind").as_str().to_owned();
            complete_later(
                Arc::clone(&directory),
                peer.id(),
                load_collection(kind),
                |peer, body| {
                    let reply = JsonFrame::with_body(MODULE, SMSG_FULL_COLLECTION, body).build();
                    send_frame(peer, &reply);
                },
            );
        });
    }

    async fn load_collection(kind: String) -> Value {
        // A real module would hit storage here.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut items = Value::array();
        for id in 0..150u32 {
            let mut item = Value::object();
            item.set("id", 9_000_000 + id)
                .set("name", format!("{kind} #{id}"))
                .set("favorite", id % 10 == 0);
            items.push(item);
        }
        let mut body = Value::object();
        body.set("kind", kind).set("items", items);
        body
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn ingest_frame(protocol: &mut Protocol, peer: &LoopbackPeer, frame: &str) {
    for fragment in chunk(frame, CHUNK_THRESHOLD) {
        let _ = protocol.ingest(peer, &fragment);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ProtocolConfig::from_toml(
        r#"
        [modules.COLL]
        enabled = true
        "#,
    )
    .expect("demo config is valid");

    let directory = Arc::new(PeerDirectory::new());
    let mut protocol = Protocol::new(config);
    coll::register(protocol.router_mut(), Arc::clone(&directory));

    let client = LoopbackPeer::new(1, 0);
    directory.register(client.clone());

    // 1. Handshake.
    ingest_frame(
        &mut protocol,
        &client,
        &FrameBuilder::new(modlink::CORE_MODULE, modlink::core_opcode::CMSG_HANDSHAKE)
            .push_str(VersionInfo::server().to_string())
            .build(),
    );
    for frame in client.drain_frames() {
        info!(module = frame.module(), opcode = frame.opcode(), "handshake reply");
    }

    // 2. Small synchronous request.
    ingest_frame(&mut protocol, &client, "COLL|4");
    for frame in client.drain_frames() {
        info!(
            owned = frame.get_u32(0),
            total = frame.get_u32(1),
            "collection stats"
        );
    }

    // 3. JSON request answered asynchronously with a chunked reply.
    let request = JsonFrame::new(coll::MODULE, coll::CMSG_GET_FULL_COLLECTION)
        .set("kind", "mounts")
        .build();
    ingest_frame(&mut protocol, &client, &request);

    // Give the deferred load time to land.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    for frame in client.drain_frames() {
        let body = frame.json();
        info!(
            kind = body.get("kind").as_str(),
            items = body.get("items").len(),
            "full collection delivered"
        );
    }

    // 4. Disconnect, then watch a deferred completion turn into a no-op.
    ingest_frame(&mut protocol, &client, &request);
    directory.unregister(client.id());
    protocol.forget_peer(client.id());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    info!(
        delivered = client.drain_frames().len(),
        "frames after disconnect (expected 0)"
    );

    let snapshot = protocol.metrics().snapshot();
    info!(?snapshot, "protocol metrics");
}
