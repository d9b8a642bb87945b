//! Rendering of session events on the terminal.

use std::{
    io::{self, Write},
    sync::Arc,
};

use tether_session::{
    ConnectionEvent, Connector, FileEvent, MessageEvent, TcpTransport,
};

fn line(text: &str) {
    let mut out = io::stdout().lock();
    // A closed stdout leaves nothing to report to
    let _ = writeln!(out, "{text}");
}

fn connection_line(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::Connecting { peer } => format!("* connecting to {}", peer.address),
        ConnectionEvent::IncomingRequest(peer) => {
            format!("* {} ({}) wants to chat: /accept or /reject", peer.name, peer.address)
        },
        ConnectionEvent::ConnectionWithdrawn => "* request withdrawn".to_string(),
        ConnectionEvent::ConnectionAccepted => "* request accepted".to_string(),
        ConnectionEvent::ConnectionRejected => "* request rejected".to_string(),
        ConnectionEvent::ConnectedIn(conversation) | ConnectionEvent::ConnectedOut(conversation) => {
            format!("* chatting with {}", conversation.display_name)
        },
        ConnectionEvent::ConnectionLost { reason } => format!("* connection lost: {reason}"),
        ConnectionEvent::ConnectionFailed { reason } => format!("* connection failed: {reason}"),
        ConnectionEvent::Disconnected => "* disconnected".to_string(),
        ConnectionEvent::ConnectionDestroyed => "* session closed".to_string(),
    }
}

fn message_line(event: &MessageEvent) -> String {
    match event {
        MessageEvent::Received(message) => match &message.file {
            Some(path) => format!("[{}] < file {}", message.id, path.display()),
            None => format!("[{}] < {}", message.id, message.text),
        },
        MessageEvent::Sent(message) => format!("[{}] > {}", message.id, message.text),
        MessageEvent::Delivered(id) => format!("[{id}] delivered"),
        MessageEvent::NotDelivered(id) => format!("[{id}] not delivered"),
        MessageEvent::Seen(id) => format!("[{id}] seen"),
    }
}

fn file_line(event: &FileEvent) -> String {
    match event {
        FileEvent::SendingStarted { path, total } => {
            format!("* sending {} ({total} bytes)", path.display())
        },
        FileEvent::SendingProgress { sent, total } => format!("* sent {sent}/{total}"),
        FileEvent::SendingFinished => "* file sent".to_string(),
        FileEvent::SendingFailed { reason } => format!("* sending failed: {reason}"),
        FileEvent::ReceivingStarted { name, total } => {
            format!("* receiving {name} ({total} bytes)")
        },
        FileEvent::ReceivingProgress { received, total } => {
            format!("* received {received}/{total}")
        },
        FileEvent::ReceivingFinished { path } => format!("* saved {}", path.display()),
        FileEvent::ReceivingFailed { reason } => format!("* receiving failed: {reason}"),
        FileEvent::TransferCanceled { by_partner: true } => {
            "* transfer canceled by partner".to_string()
        },
        FileEvent::TransferCanceled { by_partner: false } => "* transfer canceled".to_string(),
    }
}

/// Print every event category on stdout.
pub fn attach(connector: &Connector<TcpTransport>) {
    connector.set_connection_listener(Some(Arc::new(|event: ConnectionEvent| {
        line(&connection_line(&event));
    })));
    connector.set_message_listener(Some(Arc::new(|event: MessageEvent| {
        line(&message_line(&event));
    })));
    connector.set_file_listener(Some(Arc::new(|event: FileEvent| {
        // Progress is logged, not printed, to keep the chat readable
        if matches!(event, FileEvent::SendingProgress { .. } | FileEvent::ReceivingProgress { .. })
        {
            tracing::debug!("{}", file_line(&event));
        } else {
            line(&file_line(&event));
        }
    })));
}

/// Print a status or error line.
pub fn notice(text: &str) {
    line(&format!("! {text}"));
}
