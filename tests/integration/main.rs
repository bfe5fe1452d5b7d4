//! Sluice integration test harness.
//!
//! Tests here wire real tracks and handler chains together in-process.
//! Two tracks are linked by a pair of [`LinkTransport`]s: whatever one
//! track sends arrives as incoming on the other, on the same thread.
//!
//!   cargo test --test integration
//!
//! Set RUST_LOG=sluice_core=trace,sluice_media=trace to see chain traffic.

use std::sync::{Arc, Mutex, Once, Weak};

use sluice_core::config::TrackConfig;
use sluice_core::Message;
use sluice_media::{MediaDescription, MediaTransport, Track, TrackCounters};

mod lifecycle;
mod pipeline;
mod receive;

// ── Harness ───────────────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Route tracing output through the test writer. Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One direction of an in-process link.
///
/// Records every packet it is given and delivers a copy to the peer track,
/// if one is attached and still alive.
#[derive(Default)]
pub struct LinkTransport {
    peer: Mutex<Weak<Track>>,
    sent: Mutex<Vec<Message>>,
}

impl LinkTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect(&self, peer: &Arc<Track>) {
        *self.peer.lock().unwrap() = Arc::downgrade(peer);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

impl MediaTransport for LinkTransport {
    fn send_media(&self, message: Message) -> bool {
        self.sent.lock().unwrap().push(message.clone());
        let peer = self.peer.lock().unwrap().upgrade();
        if let Some(peer) = peer {
            peer.incoming(message);
        }
        true
    }
}

/// Two open tracks, each sending into the other.
pub struct Link {
    pub a: Arc<Track>,
    pub b: Arc<Track>,
    pub a_to_b: Arc<LinkTransport>,
    pub b_to_a: Arc<LinkTransport>,
    pub counters: Arc<TrackCounters>,
}

pub fn link(a: MediaDescription, b: MediaDescription, config: &TrackConfig) -> Link {
    let counters = TrackCounters::new();
    let track_a = Track::new(a, config, counters.clone());
    let track_b = Track::new(b, config, counters.clone());

    let a_to_b = LinkTransport::new();
    let b_to_a = LinkTransport::new();
    a_to_b.connect(&track_b);
    b_to_a.connect(&track_a);
    track_a.open(a_to_b.clone());
    track_b.open(b_to_a.clone());

    Link {
        a: track_a,
        b: track_b,
        a_to_b,
        b_to_a,
        counters,
    }
}

/// Drain everything currently queued on a track.
pub fn drain(track: &Track) -> Vec<Message> {
    use sluice_media::Channel;
    std::iter::from_fn(|| track.receive()).collect()
}
