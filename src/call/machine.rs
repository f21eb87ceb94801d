use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::relay::Envelope;

use super::media::{LocalTracks, MediaSource, TrackKind};
use super::peer::{IceConfig, PeerConnector, PeerEvent, PeerEvents, PeerLink};
use super::state::{CallError, CallState};
use super::ui::CallUi;

/// External collaborators the machine drives.
pub struct CallDeps {
    pub media: Arc<dyn MediaSource>,
    pub connector: Arc<dyn PeerConnector>,
    pub ui: Arc<dyn CallUi>,
    pub ice: IceConfig,
}

/// Commands sent to the call task. Local user actions, relayed envelopes,
/// and peer-connection events all arrive through the same serialized loop.
pub(crate) enum CallCommand {
    AcquireMedia {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    StartCall {
        name: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    EndCall,
    ToggleAudio,
    ToggleVideo,
    Inbound(Envelope),
    State {
        reply: oneshot::Sender<CallState>,
    },
}

/// Handle to communicate with the call task
#[derive(Clone)]
pub struct CallHandle {
    tx: mpsc::UnboundedSender<CallCommand>,
}

impl CallHandle {
    /// Spawn the call task. Outgoing envelopes are pushed into `outbound`
    /// for the signaling transport to drain.
    pub fn spawn(deps: CallDeps, outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        tokio::spawn(call_task(
            rx,
            ev_rx,
            PeerEvents::new(ev_tx),
            deps,
            outbound,
        ));
        Self { tx }
    }

    /// Acquire local media ahead of time so an incoming offer can be
    /// answered. Idempotent.
    pub async fn acquire_media(&self) -> Result<(), CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(CallCommand::AcquireMedia { reply: reply_tx });
        reply_rx.await.map_err(|_| CallError::Closed)?
    }

    /// Start a call as the caller
    pub async fn start_call(&self, name: &str) -> Result<(), CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(CallCommand::StartCall {
            name: name.to_string(),
            reply: reply_tx,
        });
        reply_rx.await.map_err(|_| CallError::Closed)?
    }

    /// End the current call; no-op when idle
    pub fn end_call(&self) {
        let _ = self.tx.send(CallCommand::EndCall);
    }

    pub fn toggle_audio(&self) {
        let _ = self.tx.send(CallCommand::ToggleAudio);
    }

    pub fn toggle_video(&self) {
        let _ = self.tx.send(CallCommand::ToggleVideo);
    }

    /// Feed an envelope received from the relay
    pub fn deliver(&self, envelope: Envelope) {
        let _ = self.tx.send(CallCommand::Inbound(envelope));
    }

    /// Current state; commands sent before this probe are already applied
    pub async fn state(&self) -> Result<CallState, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(CallCommand::State { reply: reply_tx });
        reply_rx.await.map_err(|_| CallError::Closed)
    }
}

async fn call_task(
    mut rx: mpsc::UnboundedReceiver<CallCommand>,
    mut ev_rx: mpsc::UnboundedReceiver<PeerEvent>,
    events: PeerEvents,
    deps: CallDeps,
    outbound: mpsc::UnboundedSender<Envelope>,
) {
    let mut machine = CallMachine {
        state: CallState::Idle,
        peer: None,
        local: None,
        events,
        deps,
        outbound,
    };

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => machine.on_command(cmd).await,
                None => break,
            },
            Some(ev) = ev_rx.recv() => machine.on_peer_event(ev).await,
        }
    }
}

/// All per-call state, owned by the task alone.
struct CallMachine {
    state: CallState,
    peer: Option<Box<dyn PeerLink>>,
    local: Option<LocalTracks>,
    events: PeerEvents,
    deps: CallDeps,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl CallMachine {
    async fn on_command(&mut self, cmd: CallCommand) {
        match cmd {
            CallCommand::AcquireMedia { reply } => {
                let _ = reply.send(self.ensure_media().await);
            }
            CallCommand::StartCall { name, reply } => {
                let _ = reply.send(self.on_start_call(name).await);
            }
            CallCommand::EndCall => self.on_end_call(),
            CallCommand::ToggleAudio => self.on_toggle(TrackKind::Audio),
            CallCommand::ToggleVideo => self.on_toggle(TrackKind::Video),
            CallCommand::Inbound(envelope) => self.on_envelope(envelope).await,
            CallCommand::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    async fn on_peer_event(&mut self, ev: PeerEvent) {
        match ev {
            PeerEvent::CandidateFound(candidate) => {
                if self.peer.is_some() {
                    self.send(Envelope::IceCandidate(candidate));
                } else {
                    debug!("Discovered candidate after teardown; dropping");
                }
            }
            PeerEvent::TrackArrived(track) => {
                self.deps.ui.attach_remote_track(track);
            }
        }
    }

    async fn on_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Offer(offer) => self.on_offer(offer).await,
            Envelope::Answer(answer) => self.on_answer(answer).await,
            Envelope::IceCandidate(candidate) => self.on_candidate(candidate).await,
            Envelope::RemoteName(name) => {
                self.deps.ui.set_remote_label(&name);
            }
            Envelope::Hangup => self.on_hangup(),
        }
    }

    async fn on_start_call(&mut self, name: String) -> Result<(), CallError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.deps
                .ui
                .notice("Please enter your name before starting the call.");
            return Err(CallError::EmptyName);
        }
        if self.state != CallState::Idle {
            self.deps.ui.notice("A call is already in progress.");
            return Err(CallError::CallInProgress);
        }

        self.set_state(CallState::AwaitingAnswer);
        match self.dial(&name).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Call setup failed: {}", e);
                self.deps.ui.notice("Could not start the call.");
                self.reset(false);
                Err(e)
            }
        }
    }

    /// Caller path: media, peer link, offer out
    async fn dial(&mut self, name: &str) -> Result<(), CallError> {
        self.ensure_media().await?;
        self.deps.ui.set_local_label(name);
        self.deps.ui.hide_name_entry();

        let peer = self
            .deps
            .connector
            .create(&self.deps.ice, self.events.clone())?;
        let local = self.local.as_ref().ok_or(CallError::MediaNotReady)?;
        for track in local.iter() {
            peer.add_track(track.clone());
        }

        let offer = peer.create_offer().await?;
        peer.set_local_description(offer.clone()).await?;
        self.peer = Some(peer);

        self.send(Envelope::RemoteName(name.to_string()));
        self.send(Envelope::Offer(offer));
        Ok(())
    }

    /// Callee path, entered on an offer received while idle
    async fn on_offer(&mut self, offer: Value) {
        if self.state != CallState::Idle || self.peer.is_some() {
            warn!("Ignoring offer received in {:?}", self.state);
            return;
        }
        if self.local.is_none() {
            // Answering requires media already in hand; see acquire_media
            warn!("Offer received before local media was acquired; ignoring");
            self.deps
                .ui
                .notice("Camera and microphone are not ready; cannot answer the call.");
            return;
        }

        self.set_state(CallState::Negotiating);
        match self.answer(offer).await {
            Ok(()) => {
                self.set_state(CallState::Connected);
                self.deps.ui.timer_started();
                info!("Call connected (callee)");
            }
            Err(e) => {
                warn!("Failed to answer offer: {}", e);
                self.deps.ui.notice("Could not answer the call.");
                self.reset(false);
            }
        }
    }

    async fn answer(&mut self, offer: Value) -> Result<(), CallError> {
        let peer = self
            .deps
            .connector
            .create(&self.deps.ice, self.events.clone())?;
        let local = self.local.as_ref().ok_or(CallError::MediaNotReady)?;
        for track in local.iter() {
            peer.add_track(track.clone());
        }

        peer.set_remote_description(offer).await?;
        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;
        self.peer = Some(peer);

        self.send(Envelope::Answer(answer));
        Ok(())
    }

    async fn on_answer(&mut self, answer: Value) {
        if self.state != CallState::AwaitingAnswer {
            warn!("Ignoring answer received in {:?}", self.state);
            return;
        }
        let Some(peer) = &self.peer else {
            warn!("Answer received with no negotiation in progress; ignoring");
            return;
        };

        match peer.set_remote_description(answer).await {
            Ok(()) => {
                self.set_state(CallState::Connected);
                self.deps.ui.timer_started();
                info!("Call connected (caller)");
            }
            Err(e) => {
                // The callee already went live on its side; tell it we failed
                warn!("Failed to apply answer: {}", e);
                self.deps.ui.notice("Call setup failed.");
                self.reset(true);
            }
        }
    }

    async fn on_candidate(&mut self, candidate: Value) {
        match &self.peer {
            Some(peer) => {
                if let Err(e) = peer.add_ice_candidate(candidate).await {
                    warn!("Failed to add remote candidate: {}", e);
                }
            }
            None => debug!("Dropping candidate with no active negotiation"),
        }
    }

    fn on_hangup(&mut self) {
        match self.state {
            CallState::AwaitingAnswer | CallState::Negotiating | CallState::Connected => {
                info!("Remote participant ended the call");
                self.reset(false);
            }
            _ => debug!("Ignoring hangup in {:?}", self.state),
        }
    }

    fn on_end_call(&mut self) {
        if self.state == CallState::Idle && self.peer.is_none() {
            return;
        }
        info!("Ending call");
        self.reset(true);
    }

    fn on_toggle(&mut self, kind: TrackKind) {
        match &self.local {
            Some(local) => match local.toggle(kind) {
                Some(enabled) => {
                    debug!("{:?} track {}", kind, if enabled { "enabled" } else { "muted" });
                }
                None => warn!("No {:?} track captured", kind),
            },
            None => warn!("Mute toggled before media was acquired"),
        }
    }

    async fn ensure_media(&mut self) -> Result<(), CallError> {
        if self.local.is_none() {
            let tracks = self.deps.media.acquire(true, true).await?;
            self.deps.ui.attach_local(&tracks);
            self.local = Some(tracks);
        }
        Ok(())
    }

    /// Release the negotiation and return to idle. Local media is kept so
    /// the next call starts without re-acquisition.
    fn reset(&mut self, send_hangup: bool) {
        if send_hangup {
            self.send(Envelope::Hangup);
        }
        if let Some(peer) = self.peer.take() {
            peer.close();
        }
        self.deps.ui.clear_remote();
        self.deps.ui.clear_labels();
        self.deps.ui.timer_stopped();
        self.deps.ui.show_name_entry();
        self.set_state(CallState::Ended);
        self.set_state(CallState::Idle);
    }

    fn send(&self, envelope: Envelope) {
        if self.outbound.send(envelope).is_err() {
            warn!("Signaling transport is gone; envelope dropped");
        }
    }

    fn set_state(&mut self, next: CallState) {
        debug!("Call state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
