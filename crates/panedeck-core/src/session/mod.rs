//! Terminal session coordination: binds one backend session, reached over an
//! abstract event channel, to one terminal widget.

mod debounce;
mod input;
pub mod testing;
mod view_model;

use thiserror::Error;

pub use debounce::Debouncer;
pub use input::InputAccumulator;
pub use view_model::{InitOptions, TerminalSessionViewModel};

pub type SessionId = String;
pub type RequestId = u64;
pub type SubscriptionId = u64;

/// Events sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Create {
        cols: u16,
        rows: u16,
        mode: String,
    },
    Attach {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },
    Input {
        data: String,
        session_id: Option<SessionId>,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    End {
        session_id: SessionId,
    },
    Detach {
        session_id: SessionId,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Create { .. } => "create",
            OutboundEvent::Attach { .. } => "attach",
            OutboundEvent::Input { .. } => "input",
            OutboundEvent::Resize { .. } => "resize",
            OutboundEvent::End { .. } => "end",
            OutboundEvent::Detach { .. } => "detach",
        }
    }

    /// Whether the backend answers this event with an ack.
    pub fn expects_ack(&self) -> bool {
        matches!(self, OutboundEvent::Create { .. } | OutboundEvent::Attach { .. })
    }
}

/// Events delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Answer to a `create`/`attach` request.
    Ack {
        request: RequestId,
        result: Result<SessionId, String>,
    },
    Output {
        data: String,
        session_id: Option<SessionId>,
    },
    ConnectError {
        message: String,
    },
    Ended,
}

/// Bidirectional event channel to the session backend.
///
/// Inbound events are delivered per subscription; the owner of a
/// subscription feeds them to [`TerminalSessionViewModel::handle_event`].
pub trait SessionChannel {
    fn subscribe(&mut self) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
    /// Sends an event. The returned id correlates acks of `create`/`attach`.
    fn emit(&mut self, event: OutboundEvent) -> RequestId;
}

/// The terminal emulator widget a session renders into.
pub trait TerminalWidget {
    fn write(&mut self, text: &str);

    fn writeln(&mut self, text: &str) {
        self.write(text);
        self.write("\r\n");
    }

    fn resize(&mut self, cols: u16, rows: u16);
    fn focus(&mut self);
    fn clear(&mut self);
    /// Number of lines in the scrollback buffer.
    fn buffer_len(&self) -> usize;
    /// Text of buffer line `index`, trailing whitespace trimmed.
    fn line(&self, index: usize) -> Option<String>;
}

/// Change notifications from a view-model to the UI layer.
pub trait SessionObserver {
    fn state_changed(&mut self, _state: SessionState) {}
    /// Output up to a line terminator, with CR/CRLF turned into LF and the
    /// ends trimmed. May span several lines.
    fn output_line(&mut self, _line: &str) {}
    fn buffer_updated(&mut self, _buffer: &str) {}
    fn error(&mut self, _message: &str) {}
    fn session_bound(&mut self, _session_id: &str) {}
    /// Fired once, a fixed delay after the session ended.
    fn redirect(&mut self) {}
}

impl SessionObserver for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Attached,
    /// Attached, but output is queued until the widget is ready.
    Degraded,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has ended")]
    Ended,
    #[error("no session attached")]
    NotAttached,
    #[error("session request failed: {0}")]
    Protocol(String),
    #[error("connection error: {0}")]
    Transport(String),
}
