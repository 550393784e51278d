use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One frame on the signaling channel: `{"event": <name>, "data": <payload>}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SignalEvent {
    // 1. Call setup: caller rings, callee accepts
    Call,
    Answer,

    // 2. SDP / ICE exchange
    Message(SignalingMessage),

    // 3. Teardown and chat
    End,
    ChatMessage(String),

    // 4. Legacy hooks, relayed but never acted on
    ScreenShare,
    StartScreenSharing,

    // 5. Relay -> sender only
    Error(String),
}

impl SignalEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::Call => EventName::Call,
            Self::Answer => EventName::Answer,
            Self::Message(_) => EventName::Message,
            Self::End => EventName::End,
            Self::ChatMessage(_) => EventName::ChatMessage,
            Self::ScreenShare => EventName::ScreenShare,
            Self::StartScreenSharing => EventName::StartScreenSharing,
            Self::Error(_) => EventName::Error,
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of the `message` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer { offer: SessionDescription },
    Answer { answer: SessionDescription },
    Candidate { candidate: IceCandidate },
}

impl SignalingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Answer, sdp: sdp.into() }
    }
}

/// Same field names as the browser's `RTCIceCandidateInit`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Event names as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Call,
    Answer,
    Message,
    End,
    ChatMessage,
    ScreenShare,
    StartScreenSharing,
    Error,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Answer => "answer",
            Self::Message => "message",
            Self::End => "end",
            Self::ChatMessage => "chatMessage",
            Self::ScreenShare => "screenShare",
            Self::StartScreenSharing => "startScreenSharing",
            Self::Error => "error",
        }
    }

    /// Whether clients may send this event through the relay.
    pub const fn is_relayed(self) -> bool {
        !matches!(self, Self::Error)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event `{0}`")]
pub struct UnknownEvent(pub String);

impl FromStr for EventName {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "call" => Self::Call,
            "answer" => Self::Answer,
            "message" => Self::Message,
            "end" => Self::End,
            "chatMessage" => Self::ChatMessage,
            "screenShare" => Self::ScreenShare,
            "startScreenSharing" => Self::StartScreenSharing,
            "error" => Self::Error,
            other => return Err(UnknownEvent(other.to_owned())),
        })
    }
}

/// The only part of a frame the relay looks at. `data` is never decoded.
#[derive(Deserialize, Debug)]
pub struct Envelope {
    pub event: String,
}
