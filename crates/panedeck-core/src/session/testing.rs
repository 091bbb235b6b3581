//! In-memory doubles for the session collaborators, shared by unit tests,
//! integration tests and the headless client.

use super::{
    InboundEvent, OutboundEvent, RequestId, SessionChannel, SessionObserver, SessionState,
    SubscriptionId, TerminalWidget,
};
use crate::links::LineSource;

/// Widget that keeps everything written to it as plain text lines.
#[derive(Debug, Default)]
pub struct RecordingWidget {
    pub writes: Vec<String>,
    pub size: Option<(u16, u16)>,
    pub focused: bool,
    screen: String,
}

impl RecordingWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written since the last clear.
    pub fn contents(&self) -> &str {
        &self.screen
    }

    fn lines(&self) -> Vec<&str> {
        if self.screen.is_empty() {
            return Vec::new();
        }
        self.screen.split('\n').collect()
    }
}

impl TerminalWidget for RecordingWidget {
    fn write(&mut self, text: &str) {
        self.writes.push(text.to_string());
        self.screen.push_str(text);
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.size = Some((cols, rows));
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn clear(&mut self) {
        self.screen.clear();
    }

    fn buffer_len(&self) -> usize {
        self.lines().len()
    }

    fn line(&self, index: usize) -> Option<String> {
        self.lines()
            .get(index)
            .map(|l| l.replace('\r', "").trim_end().to_string())
    }
}

impl LineSource for RecordingWidget {
    fn line_text(&self, index: usize) -> Option<String> {
        self.line(index)
    }
}

/// Channel that records emitted events and tracks live subscriptions.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    pub emitted: Vec<(RequestId, OutboundEvent)>,
    live: Vec<SubscriptionId>,
    next_subscription: SubscriptionId,
    next_request: RequestId,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_subscriptions(&self) -> &[SubscriptionId] {
        &self.live
    }

    pub fn last_request(&self) -> Option<RequestId> {
        self.emitted
            .iter()
            .rev()
            .find(|(_, e)| e.expects_ack())
            .map(|(id, _)| *id)
    }

    /// Successful ack for the most recent `create`/`attach`.
    pub fn ack(&self, session_id: &str) -> InboundEvent {
        InboundEvent::Ack {
            request: self.last_request().unwrap_or_default(),
            result: Ok(session_id.to_string()),
        }
    }

    pub fn events_named(&self, name: &str) -> Vec<&OutboundEvent> {
        self.emitted
            .iter()
            .map(|(_, e)| e)
            .filter(|e| e.name() == name)
            .collect()
    }
}

impl SessionChannel for MemoryChannel {
    fn subscribe(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        self.live.push(self.next_subscription);
        self.next_subscription
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.live.retain(|s| *s != id);
    }

    fn emit(&mut self, event: OutboundEvent) -> RequestId {
        self.next_request += 1;
        self.emitted.push((self.next_request, event));
        self.next_request
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub states: Vec<SessionState>,
    pub lines: Vec<String>,
    pub buffers: Vec<String>,
    pub errors: Vec<String>,
    pub bound: Vec<String>,
    pub redirects: usize,
}

impl SessionObserver for RecordingObserver {
    fn state_changed(&mut self, state: SessionState) {
        self.states.push(state);
    }

    fn output_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn buffer_updated(&mut self, buffer: &str) {
        self.buffers.push(buffer.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn session_bound(&mut self, session_id: &str) {
        self.bound.push(session_id.to_string());
    }

    fn redirect(&mut self) {
        self.redirects += 1;
    }
}
