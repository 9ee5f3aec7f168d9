use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{FrameCodec, InboundFrame, OutboundFrame, TypingFrame};
use crate::endpoint::Endpoint;
use crate::events::Renderer;
use crate::models::{ChatMessage, Notice, NoticeLevel, UserIdentity};
use crate::settings::Settings;
use crate::state::{ConnectionState, ReconnectPolicy, RoomSession, TypingRoster, TypingTracker};
use crate::transport::{Transport, NORMAL_CLOSURE};
use crate::ChatError;

/// Side effects the manager asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Open a transport to `url`; report back through `on_transport_open`
    /// or `on_transport_closed`.
    Dial { url: String },
    /// Call `on_reconnect_due(generation)` after `delay`.
    ScheduleReconnect { delay: Duration, generation: u64 },
    /// Call `on_typing_idle(generation)` after `delay`.
    ArmTypingTimer { delay: Duration, generation: u64 },
    /// Load history for `room` and hand it to `on_history_loaded`.
    FetchHistory { room: String },
    /// The transport was released; drop any socket halves or pending dial.
    Release,
}

/// Connection-and-reconnection state machine for one chat client.
///
/// The manager performs no I/O of its own. Event methods (`on_*`, `handle_inbound`)
/// and user intents (`connect`, `join_room`, `send_message`, ...) update state,
/// write frames to the current [`Transport`], call into the [`Renderer`], and
/// queue [`ChatAction`]s that the driver collects with [`take_actions`].
///
/// [`take_actions`]: ConnectionManager::take_actions
pub struct ConnectionManager<R: Renderer> {
    endpoint: Endpoint,
    state: ConnectionState,
    policy: ReconnectPolicy,
    session: RoomSession,
    roster: TypingRoster,
    typing: TypingTracker,
    typing_idle_timeout: Duration,
    reconnect_generation: u64,
    history: Vec<ChatMessage>,
    transport: Option<Box<dyn Transport>>,
    renderer: R,
    actions: Vec<ChatAction>,
}

impl<R: Renderer> ConnectionManager<R> {
    pub fn new(endpoint: Endpoint, user: UserIdentity, renderer: R, settings: &Settings) -> Self {
        Self {
            endpoint,
            state: ConnectionState::Idle,
            policy: ReconnectPolicy::from_settings(settings),
            session: RoomSession::new(user),
            roster: TypingRoster::new(),
            typing: TypingTracker::default(),
            typing_idle_timeout: settings.typing_idle_timeout,
            reconnect_generation: 0,
            history: Vec::new(),
            transport: None,
            renderer,
            actions: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn roster(&self) -> &TypingRoster {
        &self.roster
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn is_typing(&self) -> bool {
        self.typing.active
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open && self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// Drains the actions queued since the last call.
    pub fn take_actions(&mut self) -> Vec<ChatAction> {
        std::mem::take(&mut self.actions)
    }

    // --- Connection lifecycle ---

    /// Starts a connection attempt unless one is already open or in flight.
    pub fn connect(&mut self) {
        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            debug!(state = ?self.state, "connect() ignored, transport already active");
            return;
        }
        info!(url = %self.endpoint.ws_url(), "Connecting to chat server");
        self.set_state(ConnectionState::Connecting);
        self.actions.push(ChatAction::Dial {
            url: self.endpoint.ws_url().to_string(),
        });
    }

    pub fn on_transport_open(&mut self, mut transport: Box<dyn Transport>) {
        if self.state != ConnectionState::Connecting {
            warn!(state = ?self.state, "Transport opened while not connecting, closing it");
            transport.close(NORMAL_CLOSURE, "Superseded");
            return;
        }

        self.transport = Some(transport);
        self.policy.reset();
        self.set_state(ConnectionState::Open);
        info!("Connected to chat server");
        self.notify(NoticeLevel::Success, "Connected to server");

        // Rejoin whatever room we were viewing before the drop
        if let Some(room) = self.session.room().map(str::to_owned) {
            debug!(%room, "Rejoining room after connect");
            if let Err(e) = self.join_room(&room) {
                warn!(error = %e, %room, "Rejoin after connect failed");
            }
        }
    }

    /// Transport-level error event. The close that follows drives recovery.
    pub fn on_transport_error(&mut self, detail: &str) {
        error!(detail, "WebSocket error");
        self.notify(NoticeLevel::Error, "Connection error");
    }

    pub fn on_transport_closed(&mut self, code: u16) {
        if self.transport.is_none() && self.state != ConnectionState::Connecting {
            debug!(code, state = ?self.state, "Ignoring close for a released transport");
            return;
        }

        self.release_transport();
        // Typing status does not survive the connection, ours or anyone else's
        self.typing.active = false;
        if !self.roster.is_empty() {
            self.roster.clear();
            self.renderer.set_typing_summary(None);
        }
        self.set_state(ConnectionState::Closed);
        self.renderer.set_input_enabled(false);

        if code == NORMAL_CLOSURE {
            info!("Transport closed normally, not reconnecting");
        } else {
            warn!(code, "Transport closed abnormally");
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        match self.policy.next_delay() {
            Some(delay) => {
                self.reconnect_generation += 1;
                let text = format!(
                    "Reconnecting in {}s... ({}/{})",
                    delay.as_secs_f64(),
                    self.policy.attempts(),
                    self.policy.max_attempts()
                );
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.policy.attempts(),
                    "Scheduling reconnect"
                );
                self.notify(NoticeLevel::Warning, text);
                self.actions.push(ChatAction::ScheduleReconnect {
                    delay,
                    generation: self.reconnect_generation,
                });
            }
            None => {
                error!(
                    attempts = self.policy.attempts(),
                    "Reconnection attempts exhausted"
                );
                self.set_state(ConnectionState::Failed);
                self.notify(
                    NoticeLevel::Error,
                    "Failed to reconnect. Please refresh the page.",
                );
            }
        }
    }

    pub fn on_reconnect_due(&mut self, generation: u64) {
        if generation != self.reconnect_generation || self.state != ConnectionState::Closed {
            trace!(generation, state = ?self.state, "Stale reconnect timer");
            return;
        }
        self.connect();
    }

    /// Deliberate disconnect: close with 1000 and never reconnect.
    pub fn disconnect(&mut self) {
        // Supersede any pending reconnect timer
        self.reconnect_generation += 1;
        self.stop_typing();

        match self.transport.as_mut() {
            Some(transport) => transport.close(NORMAL_CLOSURE, "User disconnected"),
            None if self.state == ConnectionState::Connecting => {}
            None => {
                debug!(state = ?self.state, "disconnect() with no transport");
                return;
            }
        }
        info!("Disconnecting from chat server");
        self.on_transport_closed(NORMAL_CLOSURE);
    }

    pub fn on_network_online(&mut self) {
        self.notify(NoticeLevel::Info, "Back online");
        self.connect();
    }

    pub fn on_network_offline(&mut self) {
        warn!("Network went offline");
        self.notify(NoticeLevel::Warning, "You are offline");
    }

    // --- Rooms and messages ---

    pub fn join_room(&mut self, room: &str) -> Result<(), ChatError> {
        let room = room.trim();
        if room.is_empty() {
            return Err(ChatError::EmptyRoomName);
        }
        if !self.is_open() {
            warn!(%room, state = ?self.state, "Cannot join room while not connected");
            self.notify(NoticeLevel::Error, "Cannot join room - connection error");
            return Err(ChatError::NotConnected);
        }

        if !self.session.is_in(room) {
            self.stop_typing();
        }

        let frame = OutboundFrame::Join {
            room: room.to_string(),
            user: self.session.user().clone(),
        };
        if let Err(e) = self.send_frame(&frame) {
            error!(error = %e, %room, "Sending join frame failed");
            self.notify(NoticeLevel::Error, "Cannot join room - connection error");
            return Err(e);
        }
        info!(%room, "Joining room");

        self.session.set_room(room);
        self.roster.clear();
        self.renderer.set_typing_summary(None);
        self.history.clear();
        self.renderer.clear_messages();
        self.renderer.set_input_enabled(true);
        self.actions.push(ChatAction::FetchHistory {
            room: room.to_string(),
        });
        Ok(())
    }

    pub fn send_message(&mut self, content: &str) -> Result<(), ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let room = self
            .session
            .room()
            .map(str::to_owned)
            .ok_or(ChatError::NotInRoom)?;
        if !self.is_open() {
            return Err(ChatError::NotConnected);
        }

        let frame = OutboundFrame::Message {
            room,
            content: content.to_string(),
            sender: self.session.user().username.clone(),
            timestamp: Utc::now(),
        };
        match self.send_frame(&frame) {
            Ok(()) => {
                self.renderer.clear_input();
                self.stop_typing();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Error sending message");
                self.notify(NoticeLevel::Error, "Error sending message");
                Err(e)
            }
        }
    }

    /// History for `room` arrived from the history source.
    pub fn on_history_loaded(&mut self, room: &str, result: Result<Vec<ChatMessage>, ChatError>) {
        if !self.session.is_in(room) {
            debug!(%room, "Discarding history for a room no longer active");
            return;
        }
        match result {
            Ok(batch) => self.merge_history(batch),
            Err(e) => {
                warn!(error = %e, %room, "Failed to load message history");
                self.notify(NoticeLevel::Warning, "Could not load message history");
            }
        }
    }

    pub fn handle_inbound(&mut self, text: &str) {
        trace!(len = text.len(), "Inbound frame");
        match FrameCodec::decode(text) {
            Ok(InboundFrame::History(batch)) => self.replace_history(batch),
            Ok(InboundFrame::Typing(frame)) => self.handle_typing_frame(frame),
            Ok(InboundFrame::Message(message)) => self.handle_chat_message(message),
            Err(e) => {
                error!(error = %e, "Error parsing inbound frame");
                self.notify(NoticeLevel::Error, "Error receiving message");
            }
        }
    }

    fn replace_history(&mut self, batch: Vec<ChatMessage>) {
        debug!(count = batch.len(), "Replacing rendered history");
        self.history = batch;
        self.renderer.clear_messages();
        for message in &self.history {
            self.renderer.show_message(message);
        }
    }

    // Live messages received while the fetch was in flight follow the
    // fetched batch; ones the batch already has are not repeated.
    fn merge_history(&mut self, batch: Vec<ChatMessage>) {
        let live = std::mem::take(&mut self.history);
        let mut merged = batch;
        for message in live {
            if !merged.iter().any(|m| m.is_same_entry(&message)) {
                merged.push(message);
            }
        }
        self.replace_history(merged);
    }

    fn handle_chat_message(&mut self, message: ChatMessage) {
        match self.session.room() {
            Some(active) if message.belongs_to(active) => {
                self.renderer.show_message(&message);
                self.history.push(message);
            }
            _ => {
                trace!(room = ?message.room, "Dropping message for inactive room");
            }
        }
    }

    fn handle_typing_frame(&mut self, frame: TypingFrame) {
        if frame.user == self.session.user().username {
            return;
        }
        let Some(active) = self.session.room() else {
            trace!(user = %frame.user, "Ignoring typing frame before any join");
            return;
        };
        if let Some(room) = frame.room.as_deref() {
            if room != active {
                trace!(%room, "Ignoring typing frame for inactive room");
                return;
            }
        }

        if frame.is_typing {
            self.roster.insert(&frame.user);
        } else {
            self.roster.remove(&frame.user);
        }
        let summary = self.roster.summary();
        self.renderer.set_typing_summary(summary.as_deref());
    }

    // --- Local typing ---

    /// A keystroke in the message input.
    pub fn on_input_activity(&mut self) {
        if self.session.room().is_none() {
            return;
        }
        if !self.typing.active {
            self.typing.active = true;
            self.send_typing_status(true);
        }
        let generation = self.typing.rearm();
        self.actions.push(ChatAction::ArmTypingTimer {
            delay: self.typing_idle_timeout,
            generation,
        });
    }

    pub fn on_typing_idle(&mut self, generation: u64) {
        if !self.typing.is_current(generation) {
            trace!(generation, "Stale typing timer");
            return;
        }
        self.stop_typing();
    }

    pub fn on_visibility_changed(&mut self, hidden: bool) {
        if hidden {
            self.stop_typing();
        } else {
            // Typing resumes with the next keystroke
            trace!("Page visible again");
        }
    }

    pub fn stop_typing(&mut self) {
        if self.typing.active {
            self.typing.active = false;
            self.send_typing_status(false);
        }
    }

    fn send_typing_status(&mut self, is_typing: bool) {
        let Some(room) = self.session.room().map(str::to_owned) else {
            return;
        };
        if !self.is_open() {
            return;
        }
        let frame = OutboundFrame::Typing {
            room,
            user: self.session.user().username.clone(),
            is_typing,
        };
        if let Err(e) = self.send_frame(&frame) {
            warn!(error = %e, is_typing, "Failed to send typing status");
        }
    }

    // --- Helpers ---

    fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), ChatError> {
        let text = FrameCodec::encode(frame)?;
        let transport = self.transport.as_mut().ok_or(ChatError::NotConnected)?;
        trace!(frame_type = frame.frame_type(), "Sending frame");
        transport.send_text(text)
    }

    fn release_transport(&mut self) {
        if self.transport.take().is_some() {
            debug!("Transport released");
        }
        self.actions.push(ChatAction::Release);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "Connection state change");
        self.state = state;
        self.renderer.set_status(state);
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.renderer.notify(Notice::new(level, text));
    }
}

impl<R: Renderer> std::fmt::Debug for ConnectionManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint.ws_url())
            .field("state", &self.state)
            .field("room", &self.session.room())
            .field("reconnect_attempts", &self.policy.attempts())
            .finish()
    }
}
