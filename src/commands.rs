use tokio::sync::oneshot;

use crate::ChatError;

pub(crate) type Reply = oneshot::Sender<Result<(), ChatError>>;

// Requests from a ChatClient handle to its connection task
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Connect,
    Disconnect,
    JoinRoom { room: String, reply: Reply },
    SendMessage { content: String, reply: Reply },
    InputActivity,
    VisibilityChanged { hidden: bool },
    NetworkOnline,
    NetworkOffline,
}

impl ClientCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            ClientCommand::Connect => "connect",
            ClientCommand::Disconnect => "disconnect",
            ClientCommand::JoinRoom { .. } => "joinRoom",
            ClientCommand::SendMessage { .. } => "sendMessage",
            ClientCommand::InputActivity => "inputActivity",
            ClientCommand::VisibilityChanged { .. } => "visibilityChanged",
            ClientCommand::NetworkOnline => "networkOnline",
            ClientCommand::NetworkOffline => "networkOffline",
        }
    }
}
