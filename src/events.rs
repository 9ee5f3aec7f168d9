use tokio::sync::{broadcast, watch};

use crate::models::{ChatMessage, Notice, UserIdentity};
use crate::state::ConnectionState;
use crate::utils::MessageView;

/// UI-side collaborator of the connection manager. Implementations turn fully
/// formed data into presentation; the manager never reads anything back.
pub trait Renderer {
    fn set_status(&mut self, state: ConnectionState);

    fn show_message(&mut self, message: &ChatMessage);

    /// Drop every rendered message, ahead of a history replay or room switch.
    fn clear_messages(&mut self);

    /// None hides the typing indicator.
    fn set_typing_summary(&mut self, summary: Option<&str>);

    fn notify(&mut self, notice: Notice);

    fn set_input_enabled(&mut self, enabled: bool);

    fn clear_input(&mut self);
}

// Event types for subscribers of a ChatClient
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StatusChanged(ConnectionState),
    Message(MessageView),
    MessagesCleared,
    TypingSummary(Option<String>),
    Notice(Notice),
    InputEnabled(bool),
    InputCleared,
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::StatusChanged(_) => "statusChanged",
            ChatEvent::Message(_) => "message",
            ChatEvent::MessagesCleared => "messagesCleared",
            ChatEvent::TypingSummary(_) => "typingSummary",
            ChatEvent::Notice(_) => "notice",
            ChatEvent::InputEnabled(_) => "inputEnabled",
            ChatEvent::InputCleared => "inputCleared",
        }
    }

    /// If this event carries a chat message, returns it
    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            ChatEvent::Message(view) => Some(&view.message),
            _ => None,
        }
    }
}

/// Renderer that republishes everything as [`ChatEvent`]s on a broadcast
/// channel and mirrors the connection state into a watch channel.
pub struct BroadcastRenderer {
    username: String,
    event_sender: broadcast::Sender<ChatEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

impl BroadcastRenderer {
    pub fn new(
        user: &UserIdentity,
        event_sender: broadcast::Sender<ChatEvent>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            username: user.username.clone(),
            event_sender,
            state_tx,
        }
    }

    /// Helper method to send events - discards send errors (no subscribers)
    #[inline]
    fn send_event(&self, event: ChatEvent) {
        let _ = self.event_sender.send(event);
    }
}

impl Renderer for BroadcastRenderer {
    fn set_status(&mut self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        self.send_event(ChatEvent::StatusChanged(state));
    }

    fn show_message(&mut self, message: &ChatMessage) {
        self.send_event(ChatEvent::Message(MessageView::new(message, &self.username)));
    }

    fn clear_messages(&mut self) {
        self.send_event(ChatEvent::MessagesCleared);
    }

    fn set_typing_summary(&mut self, summary: Option<&str>) {
        self.send_event(ChatEvent::TypingSummary(summary.map(str::to_string)));
    }

    fn notify(&mut self, notice: Notice) {
        self.send_event(ChatEvent::Notice(notice));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.send_event(ChatEvent::InputEnabled(enabled));
    }

    fn clear_input(&mut self) {
        self.send_event(ChatEvent::InputCleared);
    }
}
