use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use classroom_chat_rs::{
    ChatClient, ChatEvent, ConnectionState, Endpoint, HttpHistoryFetcher, UserIdentity, SETTINGS,
};

/// Joins a room and relays stdin lines as chat messages.
///
/// Usage: basic_chat <origin> <username> <room> [auth-token]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let origin = args.next().unwrap_or_else(|| "http://localhost:8080".to_string());
    let username = args.next().unwrap_or_else(|| "Anonymous".to_string());
    let room = args.next().unwrap_or_else(|| "general".to_string());
    let token = args.next();

    let user = UserIdentity {
        username,
        ..UserIdentity::anonymous()
    };

    // History comes from the REST API when a token is supplied
    let mut client = match token {
        Some(token) => {
            let fetcher =
                HttpHistoryFetcher::new(Endpoint::from_origin(&origin)?, Some(token), &SETTINGS)?;
            ChatClient::with_history_fetcher(&origin, user, std::sync::Arc::new(fetcher), &SETTINGS)?
        }
        None => ChatClient::new(&origin, user)?,
    };

    let mut receiver = client.event_receiver();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event {
                ChatEvent::StatusChanged(state) => println!("[{}]", state.label()),
                ChatEvent::Message(view) => {
                    let tag = if view.own { "you" } else { view.message.sender.as_str() };
                    println!("{} ({}): {}", tag, view.initials, view.message.content);
                }
                ChatEvent::TypingSummary(Some(summary)) => println!("  {}", summary),
                ChatEvent::Notice(notice) => println!("! {:?}: {}", notice.level, notice.text),
                _ => {}
            }
        }
    });

    client.connect()?;
    client.wait_for_state(ConnectionState::Open).await?;
    client.join_room(&room).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        client.input_activity()?;
        if let Err(e) = client.send_message(&line).await {
            eprintln!("Not sent: {}", e);
        }
    }

    client.disconnect()?;
    client.shutdown().await?;
    Ok(())
}
