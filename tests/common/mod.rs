#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use duocall::error::{CaptureKind, MediaAccessError, RtcError, SignalError};
use duocall::protocol::{IceCandidate, SessionDescription, SignalEvent};
use duocall::session::media::{MediaConstraints, MediaStream, MediaTrack, TrackId, TrackKind};
use duocall::session::platform::{
    PeerConnection, PeerEventSink, Platform, RtcConfiguration, Signaler,
};

pub fn camera(id: &str) -> MediaStream {
    MediaStream::new(
        id,
        vec![
            MediaTrack::new(format!("{id}-video"), TrackKind::Video),
            MediaTrack::new(format!("{id}-audio"), TrackKind::Audio),
        ],
    )
}

pub fn screen(id: &str) -> MediaStream {
    MediaStream::new(id, vec![MediaTrack::new(format!("{id}-video"), TrackKind::Video)])
}

/// Everything one fake connection was asked to do.
#[derive(Debug, Default)]
pub struct ConnectionLog {
    pub added: Vec<TrackId>,
    pub offers_created: usize,
    pub answers_created: usize,
    pub local: Option<SessionDescription>,
    pub remote: Option<SessionDescription>,
    pub candidates: Vec<IceCandidate>,
    pub closed: bool,
    /// Make `create_answer` fail from now on.
    pub fail_answers: bool,
}

/// Test-side view of a connection the session created.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub log: Arc<Mutex<ConnectionLog>>,
    pub events: PeerEventSink,
}

impl ConnectionHandle {
    pub fn added(&self) -> Vec<TrackId> {
        self.log.lock().unwrap().added.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.log.lock().unwrap().closed
    }
}

pub struct FakeConnection {
    label: String,
    log: Arc<Mutex<ConnectionLog>>,
}

#[async_trait]
impl PeerConnection for FakeConnection {
    fn sender_tracks(&self) -> Vec<TrackId> {
        self.log.lock().unwrap().added.clone()
    }

    fn add_track(&mut self, track: &MediaTrack, _stream: &MediaStream) -> Result<(), RtcError> {
        let mut log = self.log.lock().unwrap();
        if log.closed {
            return Err(RtcError::Closed);
        }
        log.added.push(track.id().clone());
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, RtcError> {
        let mut log = self.log.lock().unwrap();
        log.offers_created += 1;
        Ok(SessionDescription::offer(format!(
            "{} offer {} tracks={}",
            self.label,
            log.offers_created,
            log.added.len()
        )))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, RtcError> {
        let mut log = self.log.lock().unwrap();
        if log.remote.is_none() {
            return Err(RtcError::operation("createAnswer", "no remote offer"));
        }
        if log.fail_answers {
            return Err(RtcError::operation("createAnswer", "rejected by fake"));
        }
        log.answers_created += 1;
        Ok(SessionDescription::answer(format!("{} answer {}", self.label, log.answers_created)))
    }

    async fn set_local_description(&mut self, description: SessionDescription) -> Result<(), RtcError> {
        self.log.lock().unwrap().local = Some(description);
        Ok(())
    }

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<(), RtcError> {
        self.log.lock().unwrap().remote = Some(description);
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.log.lock().unwrap().local.clone()
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), RtcError> {
        self.log.lock().unwrap().candidates.push(candidate);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}

#[derive(Default)]
struct PlatformState {
    connections: Vec<ConnectionHandle>,
    user_media: Vec<Result<MediaStream, MediaAccessError>>,
    display_media: Vec<Result<MediaStream, MediaAccessError>>,
}

/// Scripted capture results and a record of every connection created.
#[derive(Clone)]
pub struct FakePlatform {
    label: String,
    state: Arc<Mutex<PlatformState>>,
}

impl FakePlatform {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            state: Arc::default(),
        }
    }

    pub fn with_camera(self, stream: MediaStream) -> Self {
        self.state.lock().unwrap().user_media.push(Ok(stream));
        self
    }

    pub fn with_screen(self, stream: MediaStream) -> Self {
        self.queue_screen(stream);
        self
    }

    /// Script the next display capture on an already shared platform.
    pub fn queue_screen(&self, stream: MediaStream) {
        self.state.lock().unwrap().display_media.push(Ok(stream));
    }

    pub fn deny_camera(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .user_media
            .push(Err(MediaAccessError::PermissionDenied(CaptureKind::Camera)));
        self
    }

    pub fn connections(&self) -> Vec<ConnectionHandle> {
        self.state.lock().unwrap().connections.clone()
    }

    pub fn last_connection(&self) -> ConnectionHandle {
        self.connections().pop().expect("no connection created")
    }

    pub fn open_connections(&self) -> usize {
        self.connections().iter().filter(|c| !c.is_closed()).count()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    type Connection = FakeConnection;

    fn create_peer_connection(
        &self,
        config: &RtcConfiguration,
        events: PeerEventSink,
    ) -> Result<FakeConnection, RtcError> {
        assert!(!config.ice_servers.is_empty(), "connection created without ICE servers");
        let log = Arc::new(Mutex::new(ConnectionLog::default()));
        self.state.lock().unwrap().connections.push(ConnectionHandle {
            log: log.clone(),
            events,
        });
        Ok(FakeConnection {
            label: self.label.clone(),
            log,
        })
    }

    async fn get_user_media(&self, _constraints: MediaConstraints) -> Result<MediaStream, MediaAccessError> {
        let mut state = self.state.lock().unwrap();
        if state.user_media.is_empty() {
            return Err(MediaAccessError::DeviceUnavailable(CaptureKind::Camera));
        }
        state.user_media.remove(0)
    }

    async fn get_display_media(&self, _constraints: MediaConstraints) -> Result<MediaStream, MediaAccessError> {
        let mut state = self.state.lock().unwrap();
        if state.display_media.is_empty() {
            return Err(MediaAccessError::DeviceUnavailable(CaptureKind::Screen));
        }
        state.display_media.remove(0)
    }
}

/// Records emitted signals instead of sending them anywhere.
#[derive(Clone, Default)]
pub struct RecordingSignaler {
    sent: Arc<Mutex<Vec<SignalEvent>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSignaler {
    /// Every later emit fails as if the socket had gone away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn take(&self) -> Vec<SignalEvent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn peek(&self) -> Vec<SignalEvent> {
        self.sent.lock().unwrap().clone()
    }
}

impl Signaler for RecordingSignaler {
    fn emit(&self, event: SignalEvent) -> Result<(), SignalError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SignalError::Closed);
        }
        self.sent.lock().unwrap().push(event);
        Ok(())
    }
}
