//! Client-side call negotiation
//!
//! The state machine owns all per-call state in a single task; local user
//! actions, relayed envelopes, and peer-connection callbacks all arrive as
//! commands on one channel, so no two events ever mutate negotiation state
//! concurrently. Media capture, the peer-connection library, and the UI are
//! trait seams the machine drives but never blocks on.

mod machine;
mod media;
mod peer;
mod state;
mod transport;
mod ui;

pub use machine::{CallDeps, CallHandle};
pub use media::{LocalTracks, MediaSource, MediaTrack, TrackKind};
pub use peer::{IceConfig, PeerConnector, PeerEvents, PeerLink};
pub use state::{CallError, CallState};
pub use transport::SignalingLink;
pub use ui::CallUi;
