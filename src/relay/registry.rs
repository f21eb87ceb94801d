use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::types::{ConnId, OutboundFrame, Participant, RelayError};

/// Commands sent to the registry actor
pub(crate) enum RegistryCommand {
    Register {
        peer_tx: mpsc::UnboundedSender<OutboundFrame>,
        reply: oneshot::Sender<ConnId>,
    },
    Unregister {
        id: ConnId,
    },
    SetName {
        id: ConnId,
        name: String,
    },
    Broadcast {
        from: ConnId,
        frame: OutboundFrame,
    },
    Others {
        id: ConnId,
        reply: oneshot::Sender<Vec<ConnId>>,
    },
}

/// Owns the participant map. One actor task per relay instance; because
/// every membership change and every broadcast is a command on the same
/// channel, each broadcast sees an atomic snapshot of membership and a
/// disconnect is applied before any broadcast queued after it.
pub(crate) async fn registry_actor(mut rx: mpsc::Receiver<RegistryCommand>) {
    let mut participants: HashMap<ConnId, Participant> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Register { peer_tx, reply } => {
                let id = ConnId::generate();
                participants.insert(
                    id,
                    Participant {
                        name: String::new(),
                        tx: peer_tx,
                    },
                );

                info!("Participant {} registered", id);
                let _ = reply.send(id);
            }

            RegistryCommand::Unregister { id } => {
                if let Some(p) = participants.remove(&id) {
                    if p.name.is_empty() {
                        info!("Participant {} unregistered", id);
                    } else {
                        info!("Participant {} ({}) unregistered", id, p.name);
                    }
                }
            }

            RegistryCommand::SetName { id, name } => {
                if let Some(p) = participants.get_mut(&id) {
                    info!("Participant {} is now known as {:?}", id, name);
                    p.name = name;
                }
            }

            RegistryCommand::Broadcast { from, frame } => {
                for (id, p) in &participants {
                    if *id == from {
                        continue;
                    }
                    // Receiver may have dropped between snapshot and send;
                    // skip it and keep delivering to the rest.
                    if p.tx.send(frame.clone()).is_err() {
                        debug!("Dropping frame for vanished participant {}", id);
                    }
                }
            }

            RegistryCommand::Others { id, reply } => {
                let others: Vec<ConnId> = participants
                    .keys()
                    .filter(|other| **other != id)
                    .copied()
                    .collect();
                let _ = reply.send(others);
            }
        }
    }
}

/// Handle to communicate with the registry actor
#[derive(Clone)]
pub struct RegistryHandle {
    pub(crate) tx: mpsc::Sender<RegistryCommand>,
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::spawn()
    }
}

impl RegistryHandle {
    /// Spawn the registry actor and return a handle to it
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RegistryCommand>(1024);
        tokio::spawn(registry_actor(rx));
        Self { tx }
    }

    /// Register a new participant with an empty display name
    pub async fn register(
        &self,
        peer_tx: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Result<ConnId, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RegistryCommand::Register {
                peer_tx,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("registry channel closed".to_string()))
    }

    /// Remove a participant; no-op if it is already gone
    pub async fn unregister(&self, id: ConnId) {
        let _ = self.tx.send(RegistryCommand::Unregister { id }).await;
    }

    /// Record the display name carried by a participant's remote-name envelope
    pub async fn set_name(&self, id: ConnId, name: String) {
        let _ = self.tx.send(RegistryCommand::SetName { id, name }).await;
    }

    /// Deliver a frame to every registered participant except the sender
    pub async fn broadcast(&self, from: ConnId, frame: OutboundFrame) {
        let _ = self.tx.send(RegistryCommand::Broadcast { from, frame }).await;
    }

    /// Every registered id except the given one
    pub async fn others(&self, id: ConnId) -> Result<Vec<ConnId>, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RegistryCommand::Others {
                id,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("registry channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> OutboundFrame {
        OutboundFrame::from(text.to_string())
    }

    #[tokio::test]
    async fn register_assigns_distinct_ids() {
        let registry = RegistryHandle::spawn();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();

        let a = registry.register(tx_a).await.unwrap();
        let b = registry.register(tx_b).await.unwrap();
        assert_ne!(a, b);

        let others = registry.others(a).await.unwrap();
        assert_eq!(others, vec![b]);
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let registry = RegistryHandle::spawn();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = registry.register(tx_a).await.unwrap();
        let _b = registry.register(tx_b).await.unwrap();

        registry.broadcast(a, frame("{\"type\":\"hangup\"}")).await;

        let got = rx_b.recv().await.unwrap();
        assert_eq!(got.as_str(), "{\"type\":\"hangup\"}");
        assert!(rx_a.try_recv().is_err(), "sender must not hear itself");
    }

    #[tokio::test]
    async fn broadcast_reaches_all_others() {
        let registry = RegistryHandle::spawn();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();

        let _a = registry.register(tx_a).await.unwrap();
        let _b = registry.register(tx_b).await.unwrap();
        let c = registry.register(tx_c).await.unwrap();

        registry.broadcast(c, frame("late joiner says hi")).await;

        assert_eq!(rx_a.recv().await.unwrap().as_str(), "late joiner says hi");
        assert_eq!(rx_b.recv().await.unwrap().as_str(), "late joiner says hi");
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_after_unregister_skips_the_departed() {
        let registry = RegistryHandle::spawn();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = registry.register(tx_a).await.unwrap();
        let b = registry.register(tx_b).await.unwrap();

        registry.unregister(a).await;
        registry.broadcast(b, frame("anyone there?")).await;
        // Commands are processed in order, so the unregister above is
        // already applied; probe to make sure the broadcast ran too.
        assert!(registry.others(b).await.unwrap().is_empty());

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_with_no_others_does_not_error() {
        let registry = RegistryHandle::spawn();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();

        let a = registry.register(tx_a).await.unwrap();
        registry.broadcast(a, frame("echo?")).await;

        assert!(registry.others(a).await.unwrap().is_empty());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_block_delivery_to_the_rest() {
        let registry = RegistryHandle::spawn();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, _rx_c) = mpsc::unbounded_channel();

        let _a = registry.register(tx_a).await.unwrap();
        let _b = registry.register(tx_b).await.unwrap();
        let c = registry.register(tx_c).await.unwrap();

        // A's receiving half is gone but A never unregistered
        drop(rx_a);

        registry.broadcast(c, frame("still flowing")).await;
        assert_eq!(rx_b.recv().await.unwrap().as_str(), "still flowing");
    }

    #[tokio::test]
    async fn per_sender_order_is_preserved() {
        let registry = RegistryHandle::spawn();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = registry.register(tx_a).await.unwrap();
        let _b = registry.register(tx_b).await.unwrap();

        for i in 0..10 {
            registry.broadcast(a, frame(&format!("msg-{}", i))).await;
        }
        for i in 0..10 {
            assert_eq!(rx_b.recv().await.unwrap().as_str(), format!("msg-{}", i));
        }
    }
}
