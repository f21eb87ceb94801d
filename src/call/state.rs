use thiserror::Error;

/// Where the local participant is in the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No call in progress
    Idle,
    /// Caller: offer sent, answer not yet received
    AwaitingAnswer,
    /// Callee: offer received, answer not yet sent
    Negotiating,
    /// Both descriptions set; candidates keep flowing
    Connected,
    /// Transient teardown state; lands back in Idle
    Ended,
}

/// Call errors
#[derive(Debug, Error)]
pub enum CallError {
    #[error("display name must not be empty")]
    EmptyName,

    #[error("local media has not been acquired")]
    MediaNotReady,

    #[error("a call is already in progress")]
    CallInProgress,

    #[error("media capture failed: {0}")]
    Media(String),

    #[error("peer connection failed: {0}")]
    Peer(String),

    #[error("call task is gone")]
    Closed,
}
