use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signaling messages relayed verbatim between participants.
///
/// The relay never looks inside the `offer`/`answer`/`ice-candidate`
/// payloads; they are produced and consumed by the peer-connection
/// library on each client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Envelope {
    /// Session description opening a negotiation (caller → callee)
    #[serde(rename = "offer")]
    Offer(Value),

    /// Session description accepting an offer (callee → caller)
    #[serde(rename = "answer")]
    Answer(Value),

    /// Connectivity candidate, exchanged any number of times in either direction
    #[serde(rename = "ice-candidate")]
    IceCandidate(Value),

    /// Display name of the sending participant
    #[serde(rename = "remote-name")]
    RemoteName(String),

    /// Explicit end-of-call notification
    #[serde(rename = "hangup")]
    Hangup,
}

impl Envelope {
    /// Wire tag of this envelope, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Offer(_) => "offer",
            Envelope::Answer(_) => "answer",
            Envelope::IceCandidate(_) => "ice-candidate",
            Envelope::RemoteName(_) => "remote-name",
            Envelope::Hangup => "hangup",
        }
    }
}
