#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use classroom_chat_rs::{
    ChatAction, ChatError, ChatMessage, ConnectionManager, ConnectionState, Endpoint, Notice,
    Renderer, Settings, Transport, UserIdentity,
};
use serde_json::Value;

// Everything the manager asked the UI to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Status(ConnectionState),
    Show(ChatMessage),
    ClearMessages,
    Typing(Option<String>),
    Notice(Notice),
    InputEnabled(bool),
    ClearInput,
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
}

impl RecordingRenderer {
    pub fn shown(&self) -> Vec<&ChatMessage> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Show(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Notice(n) => Some(n.text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last_typing(&self) -> Option<Option<String>> {
        self.calls.iter().rev().find_map(|c| match c {
            RenderCall::Typing(t) => Some(t.clone()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Renderer for RecordingRenderer {
    fn set_status(&mut self, state: ConnectionState) {
        self.calls.push(RenderCall::Status(state));
    }

    fn show_message(&mut self, message: &ChatMessage) {
        self.calls.push(RenderCall::Show(message.clone()));
    }

    fn clear_messages(&mut self) {
        self.calls.push(RenderCall::ClearMessages);
    }

    fn set_typing_summary(&mut self, summary: Option<&str>) {
        self.calls.push(RenderCall::Typing(summary.map(str::to_string)));
    }

    fn notify(&mut self, notice: Notice) {
        self.calls.push(RenderCall::Notice(notice));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.calls.push(RenderCall::InputEnabled(enabled));
    }

    fn clear_input(&mut self) {
        self.calls.push(RenderCall::ClearInput);
    }
}

/// Shared view of what a fake transport saw.
#[derive(Clone, Default)]
pub struct Wire {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed_with: Arc<Mutex<Option<u16>>>,
    pub fail_sends: Arc<AtomicBool>,
}

impl Wire {
    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(RecordingTransport { wire: self.clone() })
    }

    pub fn frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn frame_types(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn closed_with(&self) -> Option<u16> {
        *self.closed_with.lock().unwrap()
    }
}

struct RecordingTransport {
    wire: Wire,
}

impl Transport for RecordingTransport {
    fn send_text(&mut self, text: String) -> Result<(), ChatError> {
        if self.wire.fail_sends.load(Ordering::SeqCst) {
            return Err(ChatError::SendFailed("socket buffer full".to_string()));
        }
        self.wire.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.wire.closed_with.lock().unwrap().is_none()
    }

    fn close(&mut self, code: u16, _reason: &str) {
        *self.wire.closed_with.lock().unwrap() = Some(code);
    }
}

pub fn alice() -> UserIdentity {
    UserIdentity::new("Alice", "user-1")
}

pub fn new_manager() -> ConnectionManager<RecordingRenderer> {
    let endpoint = Endpoint::from_origin("https://chat.example.edu").unwrap();
    ConnectionManager::new(
        endpoint,
        alice(),
        RecordingRenderer::default(),
        &Settings::default(),
    )
}

/// Manager with an open transport; actions and render calls drained.
pub fn open_manager() -> (ConnectionManager<RecordingRenderer>, Wire) {
    let mut manager = new_manager();
    let wire = Wire::default();
    manager.connect();
    manager.on_transport_open(wire.transport());
    manager.take_actions();
    manager.renderer_mut().clear();
    (manager, wire)
}

/// Open manager that has joined `room`; wire and render calls drained.
pub fn joined_manager(room: &str) -> (ConnectionManager<RecordingRenderer>, Wire) {
    let (mut manager, wire) = open_manager();
    manager.join_room(room).unwrap();
    manager.take_actions();
    manager.renderer_mut().clear();
    wire.sent.lock().unwrap().clear();
    (manager, wire)
}

pub fn scheduled_reconnect(actions: &[ChatAction]) -> Option<(std::time::Duration, u64)> {
    actions.iter().find_map(|a| match a {
        ChatAction::ScheduleReconnect { delay, generation } => Some((*delay, *generation)),
        _ => None,
    })
}
