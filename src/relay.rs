//! Blind fan-out: a frame from one client goes to every other connected client.
//!
//! The registry is the only state. Frames are forwarded byte-for-byte.

use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Envelope, EventName, SignalEvent};

pub type ClientId = Uuid;

type ClientMap = Arc<DashMap<ClientId, mpsc::UnboundedSender<Message>>>;

pub const MALFORMED_JSON: &str = "MALFORMED_JSON";
pub const UNKNOWN_EVENT: &str = "UNKNOWN_EVENT";

#[derive(Clone, Default)]
pub struct Relay {
    clients: ClientMap,
}

/// Outcome of one [`Relay::forward`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Why a frame was not forwarded. The code is sent back to the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    UnknownEvent(String),
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed => MALFORMED_JSON,
            Self::UnknownEvent(_) => UNKNOWN_EVENT,
        }
    }
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and hand back its outbound queue.
    pub fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        (id, rx)
    }

    pub fn disconnect(&self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queue a message for one client only.
    pub fn send_to(&self, id: &ClientId, message: Message) -> bool {
        self.clients
            .get(id)
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    /// Deliver `frame` to every client except `origin`.
    ///
    /// A closed recipient queue is counted and pruned; the remaining recipients
    /// still get the frame.
    pub fn forward(&self, origin: &ClientId, frame: Utf8Bytes) -> Delivery {
        let mut delivery = Delivery::default();
        let mut dead = Vec::new();

        for entry in self.clients.iter() {
            if entry.key() == origin {
                continue;
            }
            match entry.value().send(Message::Text(frame.clone())) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => {
                    delivery.failed += 1;
                    dead.push(*entry.key());
                }
            }
        }

        for id in dead {
            tracing::warn!(client = %id, "dropping client with closed outbound queue");
            self.clients.remove(&id);
        }
        delivery
    }

    /// Validate the event name of an inbound text frame and forward it.
    pub fn relay_frame(&self, origin: &ClientId, frame: Utf8Bytes) -> Result<(EventName, Delivery), Rejection> {
        let event = check_frame(frame.as_str())?;
        let delivery = self.forward(origin, frame);
        tracing::debug!(
            client = %origin,
            event = %event,
            delivered = delivery.delivered,
            failed = delivery.failed,
            "frame relayed"
        );
        Ok((event, delivery))
    }

    /// Tell the origin why its frame went nowhere.
    pub fn reject(&self, origin: &ClientId, rejection: &Rejection) {
        let reply = SignalEvent::Error(rejection.code().to_owned());
        match reply.to_frame() {
            Ok(text) => {
                self.send_to(origin, Message::Text(text.into()));
            }
            Err(e) => tracing::error!(error = %e, "failed to encode relay error"),
        }
    }
}

/// Reads only the `event` field; the payload is never decoded.
pub fn check_frame(text: &str) -> Result<EventName, Rejection> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|_| Rejection::Malformed)?;
    match envelope.event.parse::<EventName>() {
        Ok(name) if name.is_relayed() => Ok(name),
        _ => Err(Rejection::UnknownEvent(envelope.event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(msg: Message) -> String {
        match msg {
            Message::Text(t) => t.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn forwards_to_everyone_but_origin() {
        let relay = Relay::new();
        let (a, mut rx_a) = relay.connect();
        let (_b, mut rx_b) = relay.connect();
        let (_c, mut rx_c) = relay.connect();

        let frame = r#"{"event":"chatMessage","data":"hi"}"#;
        let delivery = relay.forward(&a, frame.into());

        assert_eq!(delivery, Delivery { delivered: 2, failed: 0 });
        assert_eq!(text(rx_b.try_recv().unwrap()), frame);
        assert_eq!(text(rx_c.try_recv().unwrap()), frame);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn dead_recipient_does_not_block_the_rest() {
        let relay = Relay::new();
        let (a, _rx_a) = relay.connect();
        let (_b, rx_b) = relay.connect();
        let (_c, mut rx_c) = relay.connect();
        drop(rx_b);

        let delivery = relay.forward(&a, r#"{"event":"end"}"#.into());

        assert_eq!(delivery, Delivery { delivered: 1, failed: 1 });
        assert!(rx_c.try_recv().is_ok());
        assert_eq!(relay.client_count(), 2);
    }

    #[test]
    fn disconnect_removes_client() {
        let relay = Relay::new();
        let (a, _rx) = relay.connect();
        assert_eq!(relay.client_count(), 1);
        assert!(relay.disconnect(&a));
        assert!(!relay.disconnect(&a));
        assert_eq!(relay.client_count(), 0);
    }

    #[test]
    fn check_frame_reads_only_the_event_name() {
        assert_eq!(check_frame(r#"{"event":"call"}"#), Ok(EventName::Call));
        assert_eq!(
            check_frame(r#"{"event":"message","data":{"type":"nonsense"}}"#),
            Ok(EventName::Message)
        );
        assert_eq!(check_frame("not json"), Err(Rejection::Malformed));
        assert_eq!(check_frame(r#"{"data":1}"#), Err(Rejection::Malformed));
        assert_eq!(
            check_frame(r#"{"event":"join"}"#),
            Err(Rejection::UnknownEvent("join".into()))
        );
        assert_eq!(
            check_frame(r#"{"event":"error","data":"x"}"#),
            Err(Rejection::UnknownEvent("error".into()))
        );
    }

    #[test]
    fn rejected_frames_are_answered_to_origin_only() {
        let relay = Relay::new();
        let (a, mut rx_a) = relay.connect();
        let (_b, mut rx_b) = relay.connect();

        let err = relay.relay_frame(&a, "{".into()).unwrap_err();
        relay.reject(&a, &err);

        assert_eq!(text(rx_a.try_recv().unwrap()), r#"{"event":"error","data":"MALFORMED_JSON"}"#);
        assert!(rx_b.try_recv().is_err());
    }
}
