use std::borrow::Cow;

use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::ChatError;

/// Close code for a deliberate, user-initiated disconnect. Never retried.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the stream ended without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a live connection, as seen by the connection manager.
pub trait Transport: Send {
    fn send_text(&mut self, text: String) -> Result<(), ChatError>;

    fn is_open(&self) -> bool;

    fn close(&mut self, code: u16, reason: &str);
}

/// Transport backed by a WebSocket sink. Frames are queued to a writer task
/// so sending never waits on the network.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    closing: bool,
}

impl WsTransport {
    /// Spawns the writer task for `sink` and returns the handle feeding it.
    pub fn spawn(mut sink: SplitSink<WsStream, Message>) -> Self {
        let (outbound, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                trace!(is_close, "Writing frame to socket");
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "Socket write failed, writer task exiting");
                    break;
                }
                if is_close {
                    break;
                }
            }
            debug!("Socket writer task finished.");
        });

        Self {
            outbound,
            closing: false,
        }
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: String) -> Result<(), ChatError> {
        if !self.is_open() {
            return Err(ChatError::NotConnected);
        }
        self.outbound
            .send(Message::Text(text))
            .map_err(|e| ChatError::SendFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        !self.closing && !self.outbound.is_closed()
    }

    fn close(&mut self, code: u16, reason: &str) {
        if self.closing {
            return;
        }
        self.closing = true;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        // Writer may already be gone if the socket died first
        let _ = self.outbound.send(Message::Close(Some(frame)));
    }
}
