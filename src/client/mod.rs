//! Native client: relay transport plus the event loop that drives a [`Session`].

pub mod transport;

use tokio::sync::mpsc;

use crate::error::CallError;
use crate::protocol::{EventName, SignalEvent};
use crate::session::chat::ChatLine;
use crate::session::platform::{PeerEvent, Platform, Signaler};
use crate::session::{CallState, Handled, Session};

pub use transport::{WsSignaler, connect};

/// A button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartLocalMedia,
    StartScreenShare,
    Call,
    Answer,
    End,
    SendChat(String),
}

/// Something the user should see.
#[derive(Debug)]
pub enum Notice {
    IncomingCall,
    Chat(ChatLine),
    CallEnded,
    StateChanged(CallState),
    Error(CallError),
}

/// Single event loop: commands, inbound signals and platform events are
/// handled one at a time, each to completion, in arrival order.
pub struct CallController<P: Platform, S: Signaler> {
    session: Session<P, S>,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<P: Platform, S: Signaler> CallController<P, S> {
    pub fn new(
        session: Session<P, S>,
        peer_events: mpsc::UnboundedReceiver<PeerEvent>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            session,
            peer_events,
            notices,
        }
    }

    pub fn session(&self) -> &Session<P, S> {
        &self.session
    }

    /// Run until either the command or the inbound stream closes, then release
    /// local media and the connection without signaling the peer.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbound: mpsc::UnboundedReceiver<SignalEvent>,
    ) -> Session<P, S> {
        loop {
            let before = self.session.state();
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.execute(command).await;
                }
                event = inbound.recv() => {
                    let Some(event) = event else {
                        tracing::info!("signaling channel closed");
                        break;
                    };
                    self.dispatch(event).await;
                }
                Some(event) = self.peer_events.recv() => {
                    let result = self.session.handle_peer_event(event).await;
                    self.report(result.map(|_| ()));
                }
            }
            let after = self.session.state();
            if after != before {
                tracing::debug!(?before, ?after, "call state changed");
                self.notify(Notice::StateChanged(after));
            }
        }

        self.session.shutdown();
        self.session
    }

    async fn execute(&mut self, command: Command) {
        tracing::debug!(?command, "executing command");
        let result = match command {
            Command::StartLocalMedia => self.session.start_local_media().await,
            Command::StartScreenShare => self.session.start_screen_share().await,
            Command::Call => self.session.call(),
            Command::Answer => self.session.answer().await,
            Command::End => self.session.end_call(),
            Command::SendChat(text) => self.session.send_message(&text).map(|_| ()),
        };
        self.report(result);
    }

    async fn dispatch(&mut self, event: SignalEvent) {
        let name = event.name();
        match self.session.handle_signal(event).await {
            Ok(Handled::Applied) => match name {
                EventName::Call => self.notify(Notice::IncomingCall),
                EventName::End => self.notify(Notice::CallEnded),
                EventName::ChatMessage => {
                    if let Some(line) = self.session.chat().last() {
                        self.notify(Notice::Chat(line.clone()));
                    }
                }
                _ => {}
            },
            Ok(Handled::Ignored(violation)) => {
                tracing::debug!(event = %name, ?violation, "signal ignored");
            }
            Ok(_) => {}
            Err(e) => self.report(Err(e)),
        }
    }

    fn report(&self, result: Result<(), CallError>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "call operation failed");
            self.notify(Notice::Error(e));
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}
