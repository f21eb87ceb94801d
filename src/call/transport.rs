use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{info, warn};

use crate::relay::Envelope;

use super::machine::CallHandle;

/// WebSocket link between a call machine and the relay.
///
/// Outgoing envelopes are drained from the channel the machine writes to;
/// incoming Text frames are parsed and fed back through the machine's own
/// command loop. Transport loss just stops the pumps: the machine keeps
/// its state and teardown stays explicit.
pub struct SignalingLink {
    send_task: JoinHandle<()>,
    recv_task: JoinHandle<()>,
}

impl SignalingLink {
    pub async fn connect(
        url: &str,
        handle: CallHandle,
        mut outbound: mpsc::UnboundedReceiver<Envelope>,
    ) -> Result<Self, WsError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        info!("Signaling link established to {}", url);

        let send_task = tokio::spawn(async move {
            while let Some(envelope) = outbound.recv().await {
                let text = match serde_json::to_string(&envelope) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Failed to encode {} envelope: {}", envelope.kind(), e);
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let recv_task = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                        Ok(envelope) => handle.deliver(envelope),
                        Err(e) => warn!("Dropping unrecognized frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling link error: {}", e);
                        break;
                    }
                }
            }
            info!("Signaling link closed");
        });

        Ok(Self {
            send_task,
            recv_task,
        })
    }

    /// Tear the link down without touching call state
    pub fn close(&self) {
        self.send_task.abort();
        self.recv_task.abort();
    }
}

impl Drop for SignalingLink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{
        CallDeps, CallError, CallUi, IceConfig, LocalTracks, MediaSource, MediaTrack,
        PeerConnector, PeerEvents, PeerLink,
    };
    use crate::relay::RelayServer;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// UI stub that reports remote-name labels to a probe channel, making
    /// inbound delivery observable without a full mock rig (the machine
    /// itself is exercised in machine.rs).
    struct LabelProbe(mpsc::UnboundedSender<String>);

    impl CallUi for LabelProbe {
        fn attach_local(&self, _tracks: &LocalTracks) {}
        fn attach_remote_track(&self, _track: Arc<dyn MediaTrack>) {}
        fn clear_remote(&self) {}
        fn set_local_label(&self, _name: &str) {}
        fn set_remote_label(&self, name: &str) {
            let _ = self.0.send(name.to_string());
        }
        fn clear_labels(&self) {}
        fn timer_started(&self) {}
        fn timer_stopped(&self) {}
        fn hide_name_entry(&self) {}
        fn show_name_entry(&self) {}
        fn notice(&self, _message: &str) {}
    }

    struct NoMedia;

    #[async_trait]
    impl MediaSource for NoMedia {
        async fn acquire(&self, _video: bool, _audio: bool) -> Result<LocalTracks, CallError> {
            Err(CallError::Media("none".to_string()))
        }
    }

    struct NoPeer;

    impl PeerConnector for NoPeer {
        fn create(
            &self,
            _config: &IceConfig,
            _events: PeerEvents,
        ) -> Result<Box<dyn PeerLink>, CallError> {
            Err(CallError::Peer("none".to_string()))
        }
    }

    #[tokio::test]
    async fn link_pumps_envelopes_both_ways() {
        let server = RelayServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        let url = format!("ws://{}", addr);

        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let handle = CallHandle::spawn(
            CallDeps {
                media: Arc::new(NoMedia),
                connector: Arc::new(NoPeer),
                ui: Arc::new(LabelProbe(probe_tx)),
                ice: IceConfig::default(),
            },
            out_tx.clone(),
        );
        let _link = SignalingLink::connect(&url, handle, out_rx).await.unwrap();

        let (mut peer, _) = connect_async(&url).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Machine → relay → raw peer
        out_tx
            .send(Envelope::Offer(json!({"sdp": "via-link"})))
            .unwrap();
        let got = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match peer.next().await.expect("stream ended").unwrap() {
                    Message::Text(text) => return text.to_string(),
                    Message::Ping(p) => {
                        let _ = peer.send(Message::Pong(p)).await;
                    }
                    _ => {}
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(got, r#"{"type":"offer","data":{"sdp":"via-link"}}"#);

        // Raw peer → relay → machine, observable via the remote-name label
        peer.send(Message::Text(
            r#"{"type":"remote-name","data":"Bob"}"#.into(),
        ))
        .await
        .unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(5), probe_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, "Bob");
    }
}
