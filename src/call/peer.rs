use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::media::MediaTrack;
use super::state::CallError;

/// STUN/TURN servers handed to the connectivity library.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub urls: Vec<String>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
        }
    }
}

/// Asynchronous notifications from the connectivity library.
pub(crate) enum PeerEvent {
    CandidateFound(Value),
    TrackArrived(Arc<dyn MediaTrack>),
}

/// Sink the connectivity library reports into. Events funnel into the
/// call task's own loop, so they are serialized with every other
/// state-mutating event.
#[derive(Clone)]
pub struct PeerEvents {
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEvents {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self { tx }
    }

    /// A local connectivity candidate was discovered
    pub fn candidate_found(&self, candidate: Value) {
        let _ = self.tx.send(PeerEvent::CandidateFound(candidate));
    }

    /// A remote media track arrived
    pub fn track_arrived(&self, track: Arc<dyn MediaTrack>) {
        let _ = self.tx.send(PeerEvent::TrackArrived(track));
    }
}

/// One peer-to-peer connection attempt: local/remote descriptions and
/// candidate state live behind this seam. Descriptions and candidates are
/// opaque JSON blobs produced and consumed by the library itself.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn create_offer(&self) -> Result<Value, CallError>;
    async fn create_answer(&self) -> Result<Value, CallError>;
    async fn set_local_description(&self, desc: Value) -> Result<(), CallError>;
    async fn set_remote_description(&self, desc: Value) -> Result<(), CallError>;
    async fn add_ice_candidate(&self, candidate: Value) -> Result<(), CallError>;
    fn add_track(&self, track: Arc<dyn MediaTrack>);
    fn close(&self);
}

/// Connectivity-establishment capability.
pub trait PeerConnector: Send + Sync {
    fn create(
        &self,
        config: &IceConfig,
        events: PeerEvents,
    ) -> Result<Box<dyn PeerLink>, CallError>;
}
