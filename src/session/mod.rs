//! Client-side call session: owns local media, at most one peer connection and
//! the caller/callee role, and drives offer/answer/candidate exchange.
//!
//! Every handler takes `&mut self`, so a single event loop (see
//! [`crate::client::CallController`]) serialises them in arrival order.
//!
//! Connection creation is lazy and role-dependent:
//! - the callee creates its connection in [`Session::answer`] and only ever answers offers;
//! - the caller creates its connection when the callee's `answer` signal arrives
//!   ([`Session::on_answer`]) and immediately sends an offer if it has local media.

pub mod chat;
pub mod media;
pub mod platform;

use tokio::sync::mpsc;

use crate::error::{CallResult, RtcError};
use crate::protocol::{SignalEvent, SignalingMessage};
use chat::{ChatChannel, Speaker};
use media::{MediaConstraints, MediaStream};
use platform::{
    ConnectionId, ConnectionState, PeerConnection, PeerEvent, PeerEventKind, PeerEventSink,
    Platform, RtcConfiguration, Signaler,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Undetermined,
    Caller,
    Callee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    LocalMediaReady,
    Connecting,
    Connected,
    Renegotiating,
}

/// Offer/answer progress of the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    Stable,
    LocalOffer,
    RemoteOffer,
}

/// A signal that arrived without the state it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Offer, answer or candidate before any peer connection exists.
    NoPeerConnection,
    /// SDP answer while no local offer is outstanding.
    NoPendingOffer,
    /// `answer` signal while this side did not place the call.
    NotCaller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    /// Accepted but nothing to do.
    Noop,
    Ignored(ProtocolViolation),
    /// Peer event from a connection that has since been closed.
    Stale,
}

/// What the local and remote video elements currently show.
#[derive(Debug, Default, Clone)]
pub struct Previews {
    pub local: Option<MediaStream>,
    pub remote: Option<MediaStream>,
}

struct ActivePeer<C> {
    id: ConnectionId,
    conn: C,
    sink: PeerEventSink,
    negotiation: Negotiation,
    established: bool,
}

pub struct Session<P: Platform, S: Signaler> {
    platform: P,
    signaler: S,
    rtc_config: RtcConfiguration,
    role: Role,
    ringing: bool,
    local_stream: Option<MediaStream>,
    /// Captures replaced by a later capture; their tracks may still be sending.
    superseded: Vec<MediaStream>,
    peer: Option<ActivePeer<P::Connection>>,
    connections_created: u64,
    events: mpsc::UnboundedSender<PeerEvent>,
    previews: Previews,
    chat: ChatChannel,
}

impl<P: Platform, S: Signaler> Session<P, S> {
    /// Build a session. Platform observer callbacks arrive on the returned
    /// receiver and must be fed back through [`Session::handle_peer_event`].
    pub fn new(
        platform: P,
        signaler: S,
        rtc_config: RtcConfiguration,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            platform,
            signaler,
            rtc_config,
            role: Role::Undetermined,
            ringing: false,
            local_stream: None,
            superseded: Vec::new(),
            peer: None,
            connections_created: 0,
            events,
            previews: Previews::default(),
            chat: ChatChannel::default(),
        };
        (session, rx)
    }

    pub fn state(&self) -> CallState {
        match &self.peer {
            None if self.local_stream.is_some() => CallState::LocalMediaReady,
            None => CallState::Idle,
            Some(peer) if !peer.established => CallState::Connecting,
            Some(peer) if peer.negotiation != Negotiation::Stable => CallState::Renegotiating,
            Some(_) => CallState::Connected,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    pub fn local_stream(&self) -> Option<&MediaStream> {
        self.local_stream.as_ref()
    }

    pub fn previews(&self) -> &Previews {
        &self.previews
    }

    pub fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatChannel {
        &mut self.chat
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.peer.as_ref().map(|p| p.id)
    }

    pub fn negotiation(&self) -> Option<Negotiation> {
        self.peer.as_ref().map(|p| p.negotiation)
    }

    pub fn peer_connection(&self) -> Option<&P::Connection> {
        self.peer.as_ref().map(|p| &p.conn)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    // ── User actions ─────────────────────────────────────────────────────────

    /// Capture camera and microphone and show them in the local preview.
    ///
    /// Failure leaves `local_stream` untouched; the call may go ahead without media.
    pub async fn start_local_media(&mut self) -> CallResult<()> {
        let stream = match self.platform.get_user_media(MediaConstraints::AUDIO_VIDEO).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "camera/microphone unavailable");
                return Err(e.into());
            }
        };
        tracing::info!(stream = stream.id(), tracks = stream.tracks().len(), "local media started");
        self.install_local_stream(stream);
        self.emit(SignalEvent::StartScreenSharing)?;
        Ok(())
    }

    /// Swap the local preview to a screen capture and, mid-call, renegotiate so
    /// the remote side receives it on the existing connection.
    pub async fn start_screen_share(&mut self) -> CallResult<()> {
        let stream = match self.platform.get_display_media(MediaConstraints::AUDIO_VIDEO).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "screen capture unavailable");
                return Err(e.into());
            }
        };
        tracing::info!(stream = stream.id(), "screen share started");
        self.install_local_stream(stream);

        if self.peer.is_some() {
            self.attach_local_tracks()?;
            self.send_offer().await?;
        }
        Ok(())
    }

    /// Ring the peer. The connection is built once the peer answers.
    pub fn call(&mut self) -> CallResult<()> {
        self.role = Role::Caller;
        tracing::info!("placing call");
        self.emit(SignalEvent::Call)?;
        Ok(())
    }

    /// Accept a call: build the connection now and wait for the caller's offer.
    pub async fn answer(&mut self) -> CallResult<()> {
        self.role = Role::Callee;
        self.ringing = false;
        self.create_peer_connection().await?;
        self.attach_local_tracks()?;
        self.emit(SignalEvent::Answer)?;
        Ok(())
    }

    /// Hang up. Local teardown completes before `end` is emitted.
    pub fn end_call(&mut self) -> CallResult<()> {
        self.teardown();
        tracing::info!("call ended locally");
        self.emit(SignalEvent::End)?;
        Ok(())
    }

    /// Release everything without telling the peer. Used when the UI goes away.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    /// Send one chat line. Empty text is not sent. Returns whether it was sent.
    pub fn send_message(&mut self, text: &str) -> CallResult<bool> {
        if text.is_empty() {
            return Ok(false);
        }
        self.emit(SignalEvent::ChatMessage(text.to_owned()))?;
        self.chat.record(Speaker::You, text);
        Ok(true)
    }

    /// Send whatever is in the chat input. The input is cleared only once sent.
    pub fn send_draft(&mut self) -> CallResult<bool> {
        let text = self.chat.draft().to_owned();
        let sent = self.send_message(&text)?;
        if sent {
            self.chat.clear_draft();
        }
        Ok(sent)
    }

    // ── Remote signals ───────────────────────────────────────────────────────

    pub async fn handle_signal(&mut self, event: SignalEvent) -> CallResult<Handled> {
        match event {
            SignalEvent::Call => {
                tracing::info!("incoming call");
                self.ringing = true;
                Ok(Handled::Applied)
            }
            SignalEvent::Answer => self.on_answer().await,
            SignalEvent::Message(message) => self.on_message(message).await,
            SignalEvent::End => {
                self.on_end();
                Ok(Handled::Applied)
            }
            SignalEvent::ChatMessage(text) => {
                self.on_chat_message(text);
                Ok(Handled::Applied)
            }
            legacy @ (SignalEvent::ScreenShare | SignalEvent::StartScreenSharing) => {
                tracing::debug!(event = %legacy.name(), "legacy signal ignored");
                Ok(Handled::Noop)
            }
            SignalEvent::Error(code) => {
                tracing::warn!(%code, "relay rejected a frame");
                Ok(Handled::Noop)
            }
        }
    }

    /// The callee accepted: build the connection, which sends our offer.
    pub async fn on_answer(&mut self) -> CallResult<Handled> {
        if self.role != Role::Caller {
            tracing::debug!(role = ?self.role, "answer signal without an outgoing call");
            return Ok(Handled::Ignored(ProtocolViolation::NotCaller));
        }
        self.create_peer_connection().await?;
        self.attach_local_tracks()?;
        Ok(Handled::Applied)
    }

    pub async fn on_message(&mut self, message: SignalingMessage) -> CallResult<Handled> {
        let Some(peer) = self.peer.as_mut() else {
            tracing::debug!(kind = message.kind(), "no peer connection, dropping signaling message");
            return Ok(Handled::Ignored(ProtocolViolation::NoPeerConnection));
        };

        match message {
            SignalingMessage::Offer { offer } => {
                peer.conn.set_remote_description(offer).await?;
                peer.negotiation = Negotiation::RemoteOffer;
                let answered = match peer.conn.create_answer().await {
                    Ok(answer) => peer
                        .conn
                        .set_local_description(answer.clone())
                        .await
                        .map(|()| answer),
                    Err(e) => Err(e),
                };
                // Back to stable whether or not the answer went through.
                peer.negotiation = Negotiation::Stable;
                let answer = answered?;
                peer.established = true;
                let answer = peer.conn.local_description().unwrap_or(answer);
                tracing::debug!(connection = %peer.id, "offer accepted, sending answer");
                self.emit(SignalEvent::Message(SignalingMessage::Answer { answer }))?;
            }
            SignalingMessage::Answer { answer } => {
                if peer.negotiation != Negotiation::LocalOffer {
                    tracing::debug!(connection = %peer.id, "answer without a pending offer");
                    return Ok(Handled::Ignored(ProtocolViolation::NoPendingOffer));
                }
                peer.conn.set_remote_description(answer).await?;
                peer.negotiation = Negotiation::Stable;
                peer.established = true;
                tracing::debug!(connection = %peer.id, "remote answer applied");
            }
            SignalingMessage::Candidate { candidate } => {
                peer.conn.add_ice_candidate(candidate).await?;
            }
        }
        Ok(Handled::Applied)
    }

    /// The peer hung up. Same teardown as [`Session::end_call`], no echo.
    pub fn on_end(&mut self) {
        self.teardown();
        tracing::info!("call ended by peer");
    }

    pub fn on_chat_message(&mut self, text: String) {
        self.chat.record(Speaker::Remote, text);
    }

    // ── Platform observers ───────────────────────────────────────────────────

    pub async fn handle_peer_event(&mut self, event: PeerEvent) -> CallResult<Handled> {
        if self.connection_id() != Some(event.connection) {
            tracing::trace!(connection = %event.connection, "event from closed connection");
            return Ok(Handled::Stale);
        }

        match event.kind {
            PeerEventKind::IceCandidate(candidate) => {
                self.emit(SignalEvent::Message(SignalingMessage::Candidate { candidate }))?;
            }
            PeerEventKind::Track { streams } => {
                let Some(stream) = streams.into_iter().next() else {
                    return Ok(Handled::Noop);
                };
                tracing::debug!(stream = stream.id(), "remote stream bound");
                self.previews.remote = Some(stream);
            }
            PeerEventKind::StateChange(state @ (ConnectionState::Failed | ConnectionState::Closed)) => {
                tracing::warn!(connection = %event.connection, ?state, "peer connection lost");
                self.end_call()?;
            }
            PeerEventKind::StateChange(state) => {
                tracing::debug!(connection = %event.connection, ?state, "connection state changed");
                return Ok(Handled::Noop);
            }
        }
        Ok(Handled::Applied)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Replaces any existing connection. The caller offers straight away when
    /// it has local media; the callee never does.
    async fn create_peer_connection(&mut self) -> CallResult<()> {
        self.close_peer_connection();

        self.connections_created += 1;
        let id = ConnectionId(self.connections_created);
        let sink = PeerEventSink::new(id, self.events.clone());
        let conn = self
            .platform
            .create_peer_connection(&self.rtc_config, sink.clone())?;
        self.peer = Some(ActivePeer {
            id,
            conn,
            sink,
            negotiation: Negotiation::Stable,
            established: false,
        });
        tracing::debug!(connection = %id, role = ?self.role, "peer connection created");

        if self.role == Role::Caller && self.local_stream.is_some() {
            self.attach_local_tracks()?;
            self.send_offer().await?;
        }
        Ok(())
    }

    async fn send_offer(&mut self) -> CallResult<()> {
        let Some(peer) = self.peer.as_mut() else {
            return Ok(());
        };
        let offer = peer.conn.create_offer().await?;
        peer.conn.set_local_description(offer.clone()).await?;
        peer.negotiation = Negotiation::LocalOffer;
        let offer = peer.conn.local_description().unwrap_or(offer);
        tracing::debug!(connection = %peer.id, "sending offer");
        self.emit(SignalEvent::Message(SignalingMessage::Offer { offer }))?;
        Ok(())
    }

    /// Add every local track not already sending. Returns how many were added.
    fn attach_local_tracks(&mut self) -> Result<usize, RtcError> {
        let (Some(peer), Some(stream)) = (self.peer.as_mut(), self.local_stream.as_ref()) else {
            return Ok(0);
        };
        let attached = peer.conn.sender_tracks();
        let mut added = 0;
        for track in stream.tracks() {
            if attached.contains(track.id()) {
                continue;
            }
            peer.conn.add_track(track, stream)?;
            added += 1;
        }
        if added > 0 {
            tracing::debug!(connection = %peer.id, added, "local tracks attached");
        }
        Ok(added)
    }

    fn install_local_stream(&mut self, stream: MediaStream) {
        self.previews.local = Some(stream.clone());
        if let Some(previous) = self.local_stream.replace(stream) {
            self.superseded.push(previous);
        }
    }

    fn close_peer_connection(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.sink.close();
            peer.conn.close();
            tracing::debug!(connection = %peer.id, "peer connection closed");
        }
    }

    fn teardown(&mut self) {
        self.close_peer_connection();
        for stream in self.local_stream.take().into_iter().chain(self.superseded.drain(..)) {
            stream.stop();
        }
        self.previews = Previews::default();
        self.role = Role::Undetermined;
        self.ringing = false;
    }

    fn emit(&self, event: SignalEvent) -> CallResult<()> {
        let name = event.name();
        self.signaler.emit(event).inspect_err(|e| {
            tracing::warn!(event = %name, error = %e, "failed to emit signal");
        })?;
        Ok(())
    }
}
