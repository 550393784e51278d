//! Seams to the WebRTC engine, capture devices and signaling transport.
//!
//! A browser binding, a `webrtc`-crate binding and the test fakes all sit
//! behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use super::media::{MediaConstraints, MediaStream, MediaTrack, TrackId};
use crate::error::{MediaAccessError, RtcError, SignalError};
use crate::protocol::{IceCandidate, SessionDescription, SignalEvent};

/// ICE server configuration (STUN/TURN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcConfiguration {
    pub ice_servers: Vec<IceServer>,
}

impl Default for RtcConfiguration {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    /// A local candidate was gathered.
    IceCandidate(IceCandidate),
    /// Remote media arrived; `streams` may be empty.
    Track { streams: Vec<MediaStream> },
    StateChange(ConnectionState),
}

#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub connection: ConnectionId,
    pub kind: PeerEventKind,
}

/// Observer handle given to the platform when a connection is created.
///
/// Once the session closes the connection, every emit is a no-op.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    connection: ConnectionId,
    tx: mpsc::UnboundedSender<PeerEvent>,
    closed: Arc<AtomicBool>,
}

impl PeerEventSink {
    pub(crate) fn new(connection: ConnectionId, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self {
            connection,
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn ice_candidate(&self, candidate: IceCandidate) -> bool {
        self.emit(PeerEventKind::IceCandidate(candidate))
    }

    pub fn track(&self, streams: Vec<MediaStream>) -> bool {
        self.emit(PeerEventKind::Track { streams })
    }

    pub fn state_change(&self, state: ConnectionState) -> bool {
        self.emit(PeerEventKind::StateChange(state))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn emit(&self, kind: PeerEventKind) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx
            .send(PeerEvent {
                connection: self.connection,
                kind,
            })
            .is_ok()
    }
}

#[async_trait]
pub trait PeerConnection: Send {
    /// Ids of the tracks currently attached as senders.
    fn sender_tracks(&self) -> Vec<TrackId>;

    fn add_track(&mut self, track: &MediaTrack, stream: &MediaStream) -> Result<(), RtcError>;

    async fn create_offer(&mut self) -> Result<SessionDescription, RtcError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, RtcError>;

    async fn set_local_description(&mut self, description: SessionDescription) -> Result<(), RtcError>;

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<(), RtcError>;

    /// The description actually applied, which may differ from what was passed in.
    fn local_description(&self) -> Option<SessionDescription>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), RtcError>;

    /// Synchronous: no observer may fire once this returns.
    fn close(&mut self);
}

#[async_trait]
pub trait Platform: Send + Sync {
    type Connection: PeerConnection;

    fn create_peer_connection(
        &self,
        config: &RtcConfiguration,
        events: PeerEventSink,
    ) -> Result<Self::Connection, RtcError>;

    /// Camera and microphone.
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaAccessError>;

    /// Screen or window.
    async fn get_display_media(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaAccessError>;
}

/// Outbound half of the signaling channel. Fire-and-forget.
pub trait Signaler: Send {
    fn emit(&self, event: SignalEvent) -> Result<(), SignalError>;
}
