use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::Deserialize;
use serde_json::json;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::feed::FeedResponse;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Inbound push events the feed consumes. The channel also carries other
/// traffic (presence, shares, playback sync); everything unrecognized is
/// dropped at the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    ItemLiked {
        item_id: String,
        is_liked: bool,
        likes_count: i64,
    },
    /// Carries only the target item; consumers reload the comment list
    /// wholesale instead of merging a partial payload.
    NewComment { item_id: String },
}

impl PushEvent {
    pub fn item_id(&self) -> &str {
        match self {
            PushEvent::ItemLiked { item_id, .. } => item_id,
            PushEvent::NewComment { item_id } => item_id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ChannelCommand {
    Join(String),
    Leave(String),
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikedData {
    video_id: String,
    #[serde(default)]
    is_liked: bool,
    #[serde(default)]
    likes_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentData {
    video_id: String,
}

pub fn parse_frame(text: &str) -> Option<PushEvent> {
    let frame: Frame = serde_json::from_str(text).ok()?;
    match frame.event.as_str() {
        "video_liked" => {
            let data: LikedData = serde_json::from_value(frame.data).ok()?;
            Some(PushEvent::ItemLiked {
                item_id: data.video_id,
                is_liked: data.is_liked,
                likes_count: data.likes_count,
            })
        }
        "new_comment" => {
            let data: CommentData = serde_json::from_value(frame.data).ok()?;
            Some(PushEvent::NewComment {
                item_id: data.video_id,
            })
        }
        _ => None,
    }
}

fn command_frame(command: &ChannelCommand) -> String {
    let (event, video_id) = match command {
        ChannelCommand::Join(id) => ("join_video", id),
        ChannelCommand::Leave(id) => ("leave_video", id),
    };
    json!({ "event": event, "data": { "videoId": video_id } }).to_string()
}

/// Scopes the push subscription to the active item's lifetime. Interest is
/// registered and withdrawn explicitly so the single-active-item invariant
/// stays auditable; events for anything else fail the `accepts` check and
/// are discarded. No deduplication happens here: downstream reconciliation
/// (overwrite, wholesale reload) is idempotent.
pub struct EventBridge {
    active: Option<String>,
    commands: Option<Sender<ChannelCommand>>,
}

impl EventBridge {
    pub fn new(commands: Option<Sender<ChannelCommand>>) -> Self {
        Self {
            active: None,
            commands,
        }
    }

    /// Detached bridge for tests and offline mode: filtering still works,
    /// nothing goes over the wire.
    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn watch(&mut self, item_id: &str) {
        if self.active.as_deref() == Some(item_id) {
            return;
        }
        if let Some(previous) = self.active.take() {
            self.send(ChannelCommand::Leave(previous));
        }
        self.active = Some(item_id.to_string());
        self.send(ChannelCommand::Join(item_id.to_string()));
    }

    pub fn release(&mut self) {
        if let Some(previous) = self.active.take() {
            self.send(ChannelCommand::Leave(previous));
        }
    }

    pub fn accepts(&self, item_id: &str) -> bool {
        self.active.as_deref() == Some(item_id)
    }

    fn send(&self, command: ChannelCommand) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(command);
        }
    }
}

/// Connect to the push channel and pump it on a background thread. Returns
/// the command sender the bridge uses for join/leave. One attempt only:
/// reconnect and backoff belong to the transport owner, not this client.
pub fn connect(url: &str, tx: Sender<FeedResponse>) -> Result<Sender<ChannelCommand>> {
    let (socket, _response) =
        tungstenite::connect(url).with_context(|| format!("connect push channel {url}"))?;
    set_poll_timeout(&socket).context("configure push channel socket")?;

    let (command_tx, command_rx) = unbounded();
    thread::spawn(move || pump(socket, tx, command_rx));
    Ok(command_tx)
}

fn pump(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    tx: Sender<FeedResponse>,
    commands: Receiver<ChannelCommand>,
) {
    loop {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if let Err(err) = socket.send(Message::Text(command_frame(&command))) {
                        log::warn!("push channel write failed: {err}");
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if let Some(event) = parse_frame(&text) {
                    if tx.send(FeedResponse::Push(event)).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => {
                log::warn!("push channel closed by server");
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(err) => {
                log::warn!("push channel read failed: {err}");
                return;
            }
        }
    }
}

fn set_poll_timeout(socket: &WebSocket<MaybeTlsStream<TcpStream>>) -> Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(POLL_INTERVAL))?,
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(Some(POLL_INTERVAL))?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_liked_frames() {
        let text = r#"{"event":"video_liked","data":{"videoId":"v-1","userId":"u-9","isLiked":true,"likesCount":14}}"#;
        assert_eq!(
            parse_frame(text),
            Some(PushEvent::ItemLiked {
                item_id: "v-1".into(),
                is_liked: true,
                likes_count: 14,
            })
        );
    }

    #[test]
    fn parses_new_comment_frames_without_payload_merge() {
        let text = r#"{"event":"new_comment","data":{"videoId":"v-2","comment":{"id":"c-1","content":"nice"}}}"#;
        assert_eq!(
            parse_frame(text),
            Some(PushEvent::NewComment {
                item_id: "v-2".into()
            })
        );
    }

    #[test]
    fn unknown_events_are_dropped() {
        assert_eq!(parse_frame(r#"{"event":"video_seeked","data":{}}"#), None);
        assert_eq!(parse_frame("not json"), None);
    }

    #[test]
    fn bridge_scopes_interest_to_one_item() {
        let (tx, rx) = unbounded();
        let mut bridge = EventBridge::new(Some(tx));

        bridge.watch("v-1");
        assert!(bridge.accepts("v-1"));
        assert!(!bridge.accepts("v-2"));

        bridge.watch("v-2");
        assert!(!bridge.accepts("v-1"));
        assert!(bridge.accepts("v-2"));

        bridge.release();
        assert!(!bridge.accepts("v-2"));

        let sent: Vec<String> = rx.try_iter().map(|cmd| command_frame(&cmd)).collect();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].contains("join_video") && sent[0].contains("v-1"));
        assert!(sent[1].contains("leave_video") && sent[1].contains("v-1"));
        assert!(sent[2].contains("join_video") && sent[2].contains("v-2"));
        assert!(sent[3].contains("leave_video") && sent[3].contains("v-2"));
    }

    #[test]
    fn rewatching_the_same_item_sends_nothing() {
        let (tx, rx) = unbounded();
        let mut bridge = EventBridge::new(Some(tx));
        bridge.watch("v-1");
        rx.try_iter().count();
        bridge.watch("v-1");
        assert!(rx.try_iter().next().is_none());
    }
}
