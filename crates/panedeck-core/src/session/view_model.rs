use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{
    Debouncer, InboundEvent, InputAccumulator, OutboundEvent, RequestId, SessionChannel,
    SessionError, SessionId, SessionObserver, SessionState, SubscriptionId, TerminalWidget,
};
use crate::config::SessionConfig;
use crate::history::{HistoryKind, HistoryStore};
use crate::layout::PaneId;

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Existing backend session to attach to; `None` creates a new one.
    pub session_id: Option<SessionId>,
    /// Content to show when no persisted history exists for the session.
    pub initial_history: Option<String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub mode: Option<String>,
}

impl InitOptions {
    pub fn attach(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Create,
    Attach,
}

/// Per-pane coordinator between a backend session and a terminal widget.
///
/// All output for the bound session is applied in arrival order: widget
/// (or the ready-queue), then history, then line extraction, then the buffer
/// snapshot.
pub struct TerminalSessionViewModel<C, W, O> {
    channel: C,
    widget: W,
    observer: O,
    history: HistoryStore,
    config: SessionConfig,
    pane_id: Option<PaneId>,
    state: SessionState,
    session_id: Option<SessionId>,
    subscription: Option<SubscriptionId>,
    pending: Option<(RequestId, RequestKind)>,
    widget_ready: bool,
    queue: VecDeque<String>,
    queued_chars: usize,
    line_buffer: String,
    input: InputAccumulator,
    error: Option<String>,
    size: (u16, u16),
    resize: Debouncer<(u16, u16)>,
    redirect_at: Option<Instant>,
}

impl<C, W, O> TerminalSessionViewModel<C, W, O>
where
    C: SessionChannel,
    W: TerminalWidget,
    O: SessionObserver,
{
    pub fn new(channel: C, widget: W, observer: O, history: HistoryStore, config: SessionConfig) -> Self {
        let resize = Debouncer::new(Duration::from_millis(config.resize_debounce_ms));
        let size = (config.cols, config.rows);
        Self {
            channel,
            widget,
            observer,
            history,
            config,
            pane_id: None,
            state: SessionState::Uninitialized,
            session_id: None,
            subscription: None,
            pending: None,
            widget_ready: false,
            queue: VecDeque::new(),
            queued_chars: 0,
            line_buffer: String::new(),
            input: InputAccumulator::new(),
            error: None,
            size,
            resize,
            redirect_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Last transport or protocol error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn pane_id(&self) -> Option<PaneId> {
        self.pane_id
    }

    pub fn bind_pane(&mut self, pane_id: PaneId) {
        self.pane_id = Some(pane_id);
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn queued_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Starts (or restarts) the session. Any previous subscription and queued
    /// output are dropped first. Persisted history for the session wins over
    /// `initial_history` and is written before live output, onto a cleared
    /// widget.
    pub fn initialize(&mut self, opts: InitOptions) {
        self.cleanup();
        self.subscription = Some(self.channel.subscribe());
        self.error = None;
        self.size = (
            opts.cols.unwrap_or(self.config.cols),
            opts.rows.unwrap_or(self.config.rows),
        );
        let (cols, rows) = self.size;

        let restored = opts
            .session_id
            .as_deref()
            .and_then(|id| self.history.reconstruct_buffer(id));
        let history = match (restored, opts.initial_history) {
            (Some(buffer), _) => {
                debug!(len = buffer.len(), "restoring persisted history");
                Some(buffer)
            }
            (None, Some(initial)) if !initial.is_empty() => Some(initial),
            _ => None,
        };
        if let Some(history) = history {
            if self.widget_ready {
                self.widget.clear();
            }
            self.write_or_queue(history);
        }

        let (request, kind) = match opts.session_id {
            Some(session_id) => {
                self.session_id = Some(session_id.clone());
                let request = self.channel.emit(OutboundEvent::Attach {
                    session_id,
                    cols,
                    rows,
                });
                (request, RequestKind::Attach)
            }
            None => {
                let mode = opts.mode.unwrap_or_else(|| self.config.mode.clone());
                let request = self.channel.emit(OutboundEvent::Create { cols, rows, mode });
                (request, RequestKind::Create)
            }
        };
        self.pending = Some((request, kind));
        self.set_state(SessionState::Connecting);
    }

    /// Marks the widget ready and flushes queued output exactly once.
    pub fn widget_ready(&mut self) {
        if self.widget_ready {
            return;
        }
        self.widget_ready = true;
        let flushed = !self.queue.is_empty();
        while let Some(chunk) = self.queue.pop_front() {
            self.widget.write(&chunk);
        }
        self.queued_chars = 0;
        if self.state == SessionState::Degraded {
            self.set_state(SessionState::Attached);
        }
        if flushed {
            let snapshot = self.buffer_snapshot();
            self.observer.buffer_updated(&snapshot);
        }
    }

    /// Applies one inbound event. Events for a stale subscription or an ended
    /// session are ignored. Only a failed `create`/`attach` is returned as an
    /// error; transport errors are recorded and shown but not fatal.
    pub fn handle_event(
        &mut self,
        subscription: SubscriptionId,
        event: InboundEvent,
    ) -> Result<(), SessionError> {
        if self.subscription != Some(subscription) {
            debug!(subscription, "ignoring event for stale subscription");
            return Ok(());
        }
        if self.state == SessionState::Ended {
            return Ok(());
        }
        match event {
            InboundEvent::Ack { request, result } => self.on_ack(request, result),
            InboundEvent::Output { data, session_id } => {
                if let (Some(tag), Some(bound)) = (&session_id, &self.session_id) {
                    if tag != bound {
                        return Ok(());
                    }
                }
                self.on_output(data);
                Ok(())
            }
            InboundEvent::ConnectError { message } => {
                self.on_connect_error(message);
                Ok(())
            }
            InboundEvent::Ended => {
                self.on_ended();
                Ok(())
            }
        }
    }

    fn on_ack(
        &mut self,
        request: RequestId,
        result: Result<SessionId, String>,
    ) -> Result<(), SessionError> {
        let kind = match self.pending {
            Some((pending, kind)) if pending == request => kind,
            _ => {
                debug!(request, "ignoring unexpected ack");
                return Ok(());
            }
        };
        self.pending = None;
        match result {
            Ok(session_id) => {
                info!(session = %session_id, ?kind, "session bound");
                self.observer.session_bound(&session_id);
                self.session_id = Some(session_id);
                if self.widget_ready {
                    self.set_state(SessionState::Attached);
                } else {
                    self.set_state(SessionState::Degraded);
                }
                Ok(())
            }
            Err(message) => {
                warn!(?kind, "session request failed: {message}");
                self.session_id = None;
                self.error = Some(message.clone());
                self.observer.error(&message);
                self.set_state(SessionState::Uninitialized);
                Err(SessionError::Protocol(message))
            }
        }
    }

    fn on_output(&mut self, data: String) {
        self.write_or_queue(data.clone());
        if let Some(session_id) = &self.session_id {
            self.history.append(session_id, HistoryKind::Output, &data);
        }
        self.collect_lines(&data);
        let snapshot = self.buffer_snapshot();
        self.observer.buffer_updated(&snapshot);
    }

    /// Buffers output until a terminator shows up, then hands everything
    /// buffered so far to the observer as one normalized chunk.
    fn collect_lines(&mut self, data: &str) {
        self.line_buffer.push_str(data);
        if !self.line_buffer.contains(&['\n', '\r'][..]) {
            keep_last_chars(&mut self.line_buffer, self.config.max_pending_chars);
            return;
        }
        let chunk = std::mem::take(&mut self.line_buffer)
            .replace("\r\n", "\n")
            .replace('\r', "\n");
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            self.observer.output_line(chunk);
        }
    }

    fn on_connect_error(&mut self, message: String) {
        warn!("connection error: {message}");
        self.write_or_queue(format!("\r\n[connection error: {message}]\r\n"));
        self.error = Some(message.clone());
        self.observer.error(&SessionError::Transport(message).to_string());
    }

    fn on_ended(&mut self) {
        info!(session = ?self.session_id, "session ended");
        self.write_or_queue("\r\n[session ended]\r\n".to_string());
        if let Some(subscription) = self.subscription.take() {
            self.channel.unsubscribe(subscription);
        }
        self.pending = None;
        self.input.reset();
        self.resize.cancel();
        self.redirect_at = Some(Instant::now() + Duration::from_millis(self.config.redirect_delay_ms));
        self.set_state(SessionState::Ended);
    }

    /// Sends raw input straight to the backend and records it in history as
    /// whole command lines (special keys are recorded on their own).
    pub fn send_input(&mut self, data: &str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ended => return Err(SessionError::Ended),
            SessionState::Attached | SessionState::Degraded => {}
            _ => return Err(SessionError::NotAttached),
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(SessionError::NotAttached);
        };
        self.channel.emit(OutboundEvent::Input {
            data: data.to_string(),
            session_id: Some(session_id.clone()),
        });
        for record in self.input.feed(data) {
            self.history.append(&session_id, HistoryKind::Input, &record);
        }
        Ok(())
    }

    /// Resizes the widget now; the backend hears about it once resizing settles.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.size == (cols, rows) && !self.resize.is_pending() {
            return;
        }
        self.size = (cols, rows);
        self.widget.resize(cols, rows);
        self.resize.schedule((cols, rows), Instant::now());
    }

    /// Fires due timers: the debounced resize and the post-end redirect.
    pub fn tick(&mut self, now: Instant) {
        if let Some((cols, rows)) = self.resize.poll(now) {
            if matches!(self.state, SessionState::Attached | SessionState::Degraded) {
                self.channel.emit(OutboundEvent::Resize { cols, rows });
            }
        }
        if let Some(at) = self.redirect_at {
            if now >= at {
                self.redirect_at = None;
                self.observer.redirect();
            }
        }
    }

    pub fn focus(&mut self) {
        self.widget.focus();
    }

    /// Asks the backend to terminate the session; the `ended` event follows.
    pub fn end_session(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Ended {
            return Err(SessionError::Ended);
        }
        let session_id = self.session_id.clone().ok_or(SessionError::NotAttached)?;
        self.channel.emit(OutboundEvent::End { session_id });
        Ok(())
    }

    /// Leaves the backend session running and returns to `Uninitialized`.
    pub fn detach(&mut self) {
        if self.state != SessionState::Ended {
            if let Some(session_id) = self.session_id.clone() {
                self.channel.emit(OutboundEvent::Detach { session_id });
            }
        }
        self.cleanup();
    }

    /// Visible buffer as plain text, for handing terminal context to chat.
    pub fn buffer_snapshot(&self) -> String {
        let mut lines: Vec<String> = (0..self.widget.buffer_len())
            .filter_map(|i| self.widget.line(i))
            .collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        let limit = self.config.buffer_snapshot_lines;
        if limit > 0 && lines.len() > limit {
            lines.drain(..lines.len() - limit);
        }
        lines.join("\n")
    }

    fn write_or_queue(&mut self, text: String) {
        if self.widget_ready {
            self.widget.write(&text);
        } else {
            self.queued_chars += text.chars().count();
            self.queue.push_back(text);
            self.trim_queue();
            if self.state == SessionState::Attached {
                self.set_state(SessionState::Degraded);
            }
        }
    }

    /// Drops the oldest queued output once the queue holds more than
    /// `max_pending_chars`.
    fn trim_queue(&mut self) {
        let max = self.config.max_pending_chars;
        if self.queued_chars <= max {
            return;
        }
        warn!(queued = self.queued_chars, max, "widget not ready; dropping oldest queued output");
        while self.queued_chars > max {
            let Some(front) = self.queue.front_mut() else {
                self.queued_chars = 0;
                break;
            };
            let len = front.chars().count();
            let excess = self.queued_chars - max;
            if len <= excess {
                self.queue.pop_front();
                self.queued_chars -= len;
            } else {
                keep_last_chars(front, len - excess);
                self.queued_chars -= excess;
            }
        }
    }

    fn cleanup(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.channel.unsubscribe(subscription);
        }
        self.queue.clear();
        self.queued_chars = 0;
        self.pending = None;
        self.session_id = None;
        self.line_buffer.clear();
        self.input.reset();
        self.resize.cancel();
        self.redirect_at = None;
        self.set_state(SessionState::Uninitialized);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state");
            self.state = state;
            self.observer.state_changed(state);
        }
    }
}

/// Truncates `text` from the front so at most `max` chars remain.
fn keep_last_chars(text: &mut String, max: usize) {
    let count = text.chars().count();
    if count <= max {
        return;
    }
    let cut = text
        .char_indices()
        .nth(count - max)
        .map_or(text.len(), |(i, _)| i);
    text.drain(..cut);
}
