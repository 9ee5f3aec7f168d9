mod codec;
pub use codec::{FrameCodec, InboundFrame, OutboundFrame, TypingFrame};
mod commands;
use commands::ClientCommand;
mod endpoint;
pub use endpoint::Endpoint;
mod error;
pub use error::ChatError;
mod events;
pub use events::{BroadcastRenderer, ChatEvent, Renderer};
mod history;
pub use history::{HistoryFetcher, HttpHistoryFetcher, WelcomeHistory};
mod manager;
pub use manager::{ChatAction, ConnectionManager};
pub mod models;
pub use models::{ChatMessage, MessageKind, Notice, NoticeLevel, UserIdentity};
mod settings;
pub use settings::{Settings, SETTINGS};
mod state;
pub use state::{ConnectionState, ReconnectPolicy, RoomSession, TypingRoster};
mod transport;
pub use transport::{
    Transport, WsStream, WsTransport, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS_RECEIVED,
};
pub mod utils;
pub use utils::MessageView;

use futures::future::BoxFuture;
use futures::stream::SplitStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info, trace, warn};

type DialFuture = BoxFuture<'static, Result<WsStream, tungstenite::Error>>;
type HistoryResult = (String, Result<Vec<ChatMessage>, ChatError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Reconnect(u64),
    TypingIdle(u64),
}

/// Everything the connection task owns. Only the task touches it.
struct ConnectionContext {
    manager: ConnectionManager<BroadcastRenderer>,
    history_fetcher: Arc<dyn HistoryFetcher>,
    history_tx: mpsc::UnboundedSender<HistoryResult>,
    timers: DelayQueue<TimerKind>,
    // Only one typing-idle timer is ever pending
    typing_timer: Option<delay_queue::Key>,
    dial: Option<DialFuture>,
    reader: Option<SplitStream<WsStream>>,
}

/// Chat client for the classroom chat backend. It owns one WebSocket
/// connection, reconnects with exponential backoff, keeps the joined room
/// across reconnects and publishes everything a UI needs as [`ChatEvent`]s.
///
/// All state lives in a background task driving a [`ConnectionManager`];
/// the methods here only enqueue requests, so none of them wait on the network.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To enable logs, you'll need to
/// initialize a tracing subscriber in your application.
///
/// Example using `tracing_subscriber`:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
///
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
pub struct ChatClient {
    user: UserIdentity,
    endpoint: Endpoint,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_sender: broadcast::Sender<ChatEvent>,
    connection_state_rx: watch::Receiver<ConnectionState>,
    // JoinHandle for the connection task
    management_task: Option<JoinHandle<()>>,
    shutdown_notify: Arc<Notify>,
}

impl ChatClient {
    /// Create a client for the page served from `origin` (e.g. `https://chat.example.edu`),
    /// using the global [`SETTINGS`] and the offline [`WelcomeHistory`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(origin: &str, user: UserIdentity) -> Result<Self, ChatError> {
        Self::with_history_fetcher(origin, user, Arc::new(WelcomeHistory), &SETTINGS)
    }

    pub fn with_history_fetcher(
        origin: &str,
        user: UserIdentity,
        history_fetcher: Arc<dyn HistoryFetcher>,
        settings: &Settings,
    ) -> Result<Self, ChatError> {
        let endpoint = Endpoint::from_origin(origin)?;
        let (event_tx, _) = broadcast::channel(settings.event_buffer_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let shutdown_notify = Arc::new(Notify::new());

        let renderer = BroadcastRenderer::new(&user, event_tx.clone(), state_tx);
        let manager = ConnectionManager::new(endpoint.clone(), user.clone(), renderer, settings);

        let ctx = ConnectionContext {
            manager,
            history_fetcher,
            history_tx,
            timers: DelayQueue::new(),
            typing_timer: None,
            dial: None,
            reader: None,
        };
        let handle = tokio::spawn(run_connection_task(
            ctx,
            command_rx,
            history_rx,
            shutdown_notify.clone(),
        ));

        Ok(Self {
            user,
            endpoint,
            command_tx,
            event_sender: event_tx,
            connection_state_rx: state_rx,
            management_task: Some(handle),
            shutdown_notify,
        })
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn event_receiver(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_sender.subscribe()
    }

    /// Get the current state of the connection.
    pub fn current_state(&self) -> ConnectionState {
        *self.connection_state_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state_rx.clone()
    }

    /// Resolves once the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), ChatError> {
        let mut rx = self.connection_state_rx.clone();
        loop {
            if *rx.borrow_and_update() == target {
                return Ok(());
            }
            rx.changed().await.map_err(|_| ChatError::ClientStopped)?;
        }
    }

    fn send_command(&self, command: ClientCommand) -> Result<(), ChatError> {
        trace!(command = command.name(), "Queueing client command");
        self.command_tx
            .send(command)
            .map_err(|_| ChatError::ClientStopped)
    }

    async fn request(
        &self,
        build: impl FnOnce(commands::Reply) -> ClientCommand,
    ) -> Result<(), ChatError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(build(reply))?;
        rx.await.map_err(|_| ChatError::ClientStopped)?
    }

    /// Open the connection. A no-op while already open or connecting.
    pub fn connect(&self) -> Result<(), ChatError> {
        self.send_command(ClientCommand::Connect)
    }

    /// Close the connection with the normal closure code; no reconnect follows.
    pub fn disconnect(&self) -> Result<(), ChatError> {
        self.send_command(ClientCommand::Disconnect)
    }

    /// Join `room`, replacing the current one. Resolves once the join frame is queued.
    pub async fn join_room(&self, room: &str) -> Result<(), ChatError> {
        let room = room.to_string();
        self.request(|reply| ClientCommand::JoinRoom { room, reply })
            .await
    }

    /// Send a chat message to the joined room.
    pub async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let content = content.to_string();
        self.request(|reply| ClientCommand::SendMessage { content, reply })
            .await
    }

    /// Report a keystroke in the message input.
    pub fn input_activity(&self) -> Result<(), ChatError> {
        self.send_command(ClientCommand::InputActivity)
    }

    pub fn set_page_hidden(&self, hidden: bool) -> Result<(), ChatError> {
        self.send_command(ClientCommand::VisibilityChanged { hidden })
    }

    pub fn network_online(&self) -> Result<(), ChatError> {
        self.send_command(ClientCommand::NetworkOnline)
    }

    pub fn network_offline(&self) -> Result<(), ChatError> {
        self.send_command(ClientCommand::NetworkOffline)
    }

    /// Disconnect and wait for the background task to finish.
    pub async fn shutdown(&mut self) -> Result<(), ChatError> {
        info!("Shutting down chat client.");
        self.shutdown_notify.notify_one();

        if let Some(handle) = self.management_task.take() {
            debug!("Awaiting connection task termination...");
            handle.await?;
            debug!("Connection task joined.");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("user", &self.user.username)
            .field("endpoint", &self.endpoint.ws_url())
            .field("state", &self.current_state())
            .finish()
    }
}

// Ensure the client cleans up the background task on drop
impl Drop for ChatClient {
    fn drop(&mut self) {
        if self.management_task.is_some() {
            debug!("Dropping ChatClient, signaling connection task to stop.");
            self.shutdown_notify.notify_one();
        }
    }
}

async fn run_connection_task(
    mut ctx: ConnectionContext,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    mut history_rx: mpsc::UnboundedReceiver<HistoryResult>,
    shutdown_notify: Arc<Notify>,
) {
    info!("Connection task started.");
    loop {
        tokio::select! {
            biased;

            _ = shutdown_notify.notified() => {
                info!("Connection task received shutdown notification.");
                ctx.manager.disconnect();
                ctx.execute_actions();
                break;
            }

            command = command_rx.recv() => {
                let Some(command) = command else {
                    debug!("All client handles dropped, stopping connection task.");
                    ctx.manager.disconnect();
                    ctx.execute_actions();
                    break;
                };
                ctx.apply(command);
            }

            dialed = poll_dial(&mut ctx.dial) => {
                ctx.dial = None;
                ctx.on_dialed(dialed);
            }

            frame = next_frame(&mut ctx.reader) => {
                ctx.on_frame(frame);
            }

            Some(expired) = ctx.timers.next() => {
                match expired.into_inner() {
                    TimerKind::Reconnect(generation) => ctx.manager.on_reconnect_due(generation),
                    TimerKind::TypingIdle(generation) => {
                        ctx.typing_timer = None;
                        ctx.manager.on_typing_idle(generation);
                    }
                }
            }

            Some((room, result)) = history_rx.recv() => {
                ctx.manager.on_history_loaded(&room, result);
            }
        }
        ctx.execute_actions();
    }
    info!("Connection task finished.");
}

async fn poll_dial(dial: &mut Option<DialFuture>) -> Result<WsStream, tungstenite::Error> {
    match dial {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    reader: &mut Option<SplitStream<WsStream>>,
) -> Option<Result<Message, tungstenite::Error>> {
    match reader {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

impl ConnectionContext {
    fn apply(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Connect => self.manager.connect(),
            ClientCommand::Disconnect => self.manager.disconnect(),
            ClientCommand::JoinRoom { room, reply } => {
                let _ = reply.send(self.manager.join_room(&room));
            }
            ClientCommand::SendMessage { content, reply } => {
                let _ = reply.send(self.manager.send_message(&content));
            }
            ClientCommand::InputActivity => self.manager.on_input_activity(),
            ClientCommand::VisibilityChanged { hidden } => {
                self.manager.on_visibility_changed(hidden)
            }
            ClientCommand::NetworkOnline => self.manager.on_network_online(),
            ClientCommand::NetworkOffline => self.manager.on_network_offline(),
        }
    }

    fn on_dialed(&mut self, dialed: Result<WsStream, tungstenite::Error>) {
        match dialed {
            Ok(stream) => {
                debug!("WebSocket handshake complete");
                let (sink, stream) = stream.split();
                self.reader = Some(stream);
                self.manager
                    .on_transport_open(Box::new(WsTransport::spawn(sink)));
            }
            Err(e) => {
                self.manager.on_transport_error(&e.to_string());
                self.manager.on_transport_closed(ABNORMAL_CLOSURE);
            }
        }
    }

    fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.manager.handle_inbound(&text),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => self.manager.handle_inbound(&text),
                Err(e) => warn!(error = %e, "Dropping non UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(close_frame))) => {
                let code = close_frame
                    .map(|f| u16::from(f.code))
                    .unwrap_or(NO_STATUS_RECEIVED);
                debug!(code, "Server closed the connection");
                self.reader = None;
                self.manager.on_transport_closed(code);
            }
            Some(Ok(_)) => {
                // ping/pong are answered by tungstenite
            }
            Some(Err(e)) => {
                self.reader = None;
                self.manager.on_transport_error(&e.to_string());
                self.manager.on_transport_closed(ABNORMAL_CLOSURE);
            }
            None => {
                debug!("Socket stream ended without a close frame");
                self.reader = None;
                self.manager.on_transport_closed(ABNORMAL_CLOSURE);
            }
        }
    }

    // Cancels the pending idle timer, if any, and starts a fresh one
    fn arm_typing_timer(&mut self, delay: std::time::Duration, generation: u64) {
        if let Some(key) = self.typing_timer.take() {
            self.timers.remove(&key);
        }
        self.typing_timer = Some(self.timers.insert(TimerKind::TypingIdle(generation), delay));
    }

    fn execute_actions(&mut self) {
        for action in self.manager.take_actions() {
            match action {
                ChatAction::Dial { url } => {
                    debug!(%url, "Dialing");
                    self.dial = Some(Box::pin(async move {
                        connect_async(url.as_str()).await.map(|(stream, _)| stream)
                    }));
                }
                ChatAction::ScheduleReconnect { delay, generation } => {
                    self.timers.insert(TimerKind::Reconnect(generation), delay);
                }
                ChatAction::ArmTypingTimer { delay, generation } => {
                    self.arm_typing_timer(delay, generation);
                }
                ChatAction::FetchHistory { room } => {
                    let fetcher = self.history_fetcher.clone();
                    let history_tx = self.history_tx.clone();
                    tokio::spawn(async move {
                        let result = fetcher.fetch(&room).await;
                        let _ = history_tx.send((room, result));
                    });
                }
                ChatAction::Release => {
                    self.reader = None;
                    self.dial = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context() -> ConnectionContext {
        let user = UserIdentity::new("Alice", "user-1");
        let endpoint = Endpoint::from_origin("https://chat.example.edu").unwrap();
        let (event_tx, _) = broadcast::channel(16);
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (history_tx, _) = mpsc::unbounded_channel();
        let renderer = BroadcastRenderer::new(&user, event_tx, state_tx);

        ConnectionContext {
            manager: ConnectionManager::new(endpoint, user, renderer, &Settings::default()),
            history_fetcher: Arc::new(WelcomeHistory),
            history_tx,
            timers: DelayQueue::new(),
            typing_timer: None,
            dial: None,
            reader: None,
        }
    }

    #[tokio::test]
    async fn test_keystrokes_keep_one_typing_timer() {
        let mut ctx = context();
        for generation in 1..=5 {
            ctx.arm_typing_timer(Duration::from_millis(20), generation);
        }
        assert_eq!(ctx.timers.len(), 1);

        let expired = ctx.timers.next().await.unwrap();
        assert_eq!(expired.into_inner(), TimerKind::TypingIdle(5));
        assert!(ctx.timers.is_empty());
    }
}
