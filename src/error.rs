//! Error types for the call session and its collaborators.
//!
//! Out-of-order signaling is not an error here: handlers report it as
//! [`crate::session::Handled::Ignored`] instead.

/// Camera, microphone or screen capture could not be started.
///
/// Non-fatal: the session keeps running without local media.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaAccessError {
    #[error("permission to capture {0} was denied")]
    PermissionDenied(CaptureKind),

    #[error("no {0} capture device is available")]
    DeviceUnavailable(CaptureKind),

    #[error("{kind} capture failed: {reason}")]
    Failed { kind: CaptureKind, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Camera,
    Screen,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Camera => "camera/microphone",
            Self::Screen => "screen",
        })
    }
}

/// A platform peer-connection operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtcError {
    #[error("{operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },

    #[error("peer connection is closed")]
    Closed,
}

impl RtcError {
    pub fn operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            reason: reason.into(),
        }
    }
}

/// The signaling transport could not take an event.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("signaling transport is closed")]
    Closed,

    #[error("failed to encode signaling event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to connect to relay: {0}")]
    Connect(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

/// Anything a session operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    MediaAccess(#[from] MediaAccessError),

    #[error(transparent)]
    Rtc(#[from] RtcError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

pub type CallResult<T> = Result<T, CallError>;
