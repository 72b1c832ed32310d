use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::api::FeedItem;
use crate::feed::FeedResponse;

/// The single "currently playing media" resource. Only the feed controller
/// holds a `Playback` handle, and it plays exactly one item at a time.
pub trait Playback: Send {
    /// Load the item's media and start playing it.
    fn activate(&mut self, item: &FeedItem) -> Result<()>;
    /// Pause the outgoing item and rewind it to the start.
    fn pause_and_rewind(&mut self) -> Result<()>;
    fn toggle_pause(&mut self) -> Result<()>;
    /// Stop playback without loading anything else (end of the feed).
    fn stop(&mut self) -> Result<()>;
    fn shutdown(&mut self);
}

/// Used when playback is disabled in config or mpv is unavailable; the feed
/// still navigates, records views, and reconciles social state.
#[derive(Default)]
pub struct NullPlayer;

impl Playback for NullPlayer {
    fn activate(&mut self, _item: &FeedItem) -> Result<()> {
        Ok(())
    }

    fn pause_and_rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn toggle_pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

#[derive(Clone, Debug)]
enum PlayerCommand {
    Load(String),
    Pause,
    Resume,
    Rewind,
    TogglePause,
    Stop,
}

fn command_payload(command: &PlayerCommand) -> serde_json::Value {
    match command {
        PlayerCommand::Load(url) => json!(["loadfile", url, "replace"]),
        PlayerCommand::Pause => json!(["set_property", "pause", true]),
        PlayerCommand::Resume => json!(["set_property", "pause", false]),
        PlayerCommand::Rewind => json!(["seek", 0, "absolute"]),
        PlayerCommand::TogglePause => json!(["cycle", "pause"]),
        PlayerCommand::Stop => json!(["stop"]),
    }
}

/// One long-lived mpv process in idle mode, driven over its JSON IPC socket.
/// A reader thread watches the event stream and reports natural end-of-media
/// so the feed can advance.
pub struct MpvPlayer {
    ipc_path: String,
    child: Child,
    current: Arc<Mutex<Option<String>>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl MpvPlayer {
    #[cfg(unix)]
    pub fn spawn(command: &[String], tx: Sender<FeedResponse>) -> Result<Self> {
        let binary = command
            .first()
            .filter(|bin| !bin.trim().is_empty())
            .ok_or_else(|| anyhow!("player command is empty"))?;
        let ipc_path = unique_ipc_path();
        if let Err(err) = fs::remove_file(&ipc_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::debug!("failed to remove stale mpv ipc path {ipc_path}: {err}");
            }
        }

        let mut cmd = Command::new(binary);
        for arg in command.iter().skip(1) {
            cmd.arg(arg);
        }
        cmd.arg("--idle=yes");
        cmd.arg("--force-window=yes");
        cmd.arg("--keep-open=no");
        cmd.arg("--loop-file=no");
        cmd.arg("--really-quiet");
        cmd.arg("--no-config");
        cmd.arg("--ytdl=no");
        cmd.arg("--osc=yes");
        cmd.arg(format!("--input-ipc-server={ipc_path}"));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let child = cmd
            .spawn()
            .with_context(|| format!("launch {binary} for feed playback"))?;

        let current = Arc::new(Mutex::new(None::<String>));
        let reader = spawn_event_reader(ipc_path.clone(), current.clone(), tx);

        Ok(Self {
            ipc_path,
            child,
            current,
            reader: Some(reader),
        })
    }

    #[cfg(not(unix))]
    pub fn spawn(_command: &[String], _tx: Sender<FeedResponse>) -> Result<Self> {
        bail!("mpv playback control is not supported on this platform")
    }

    fn send(&self, command: &PlayerCommand) -> Result<()> {
        let payload = json!({ "command": command_payload(command) });
        let serialized = serde_json::to_string(&payload).context("serialize mpv command")?;
        send_ipc_line(&self.ipc_path, &serialized)
    }
}

impl Playback for MpvPlayer {
    fn activate(&mut self, item: &FeedItem) -> Result<()> {
        if item.video_url.trim().is_empty() {
            bail!("video URL missing for {}", item.id);
        }
        self.send(&PlayerCommand::Load(item.video_url.trim().to_string()))?;
        self.send(&PlayerCommand::Resume)?;
        *self.current.lock() = Some(item.id.clone());
        Ok(())
    }

    fn pause_and_rewind(&mut self) -> Result<()> {
        self.send(&PlayerCommand::Pause)?;
        self.send(&PlayerCommand::Rewind)
    }

    fn toggle_pause(&mut self) -> Result<()> {
        self.send(&PlayerCommand::TogglePause)
    }

    fn stop(&mut self) -> Result<()> {
        *self.current.lock() = None;
        self.send(&PlayerCommand::Stop)
    }

    fn shutdown(&mut self) {
        *self.current.lock() = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
        cleanup_ipc_path(&self.ipc_path);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(unix)]
fn spawn_event_reader(
    ipc_path: String,
    current: Arc<Mutex<Option<String>>>,
    tx: Sender<FeedResponse>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        // mpv creates the socket shortly after launch.
        let mut stream = None;
        for _ in 0..50 {
            match UnixStream::connect(&ipc_path) {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(_) => thread::sleep(Duration::from_millis(100)),
            }
        }
        let Some(stream) = stream else {
            log::debug!("mpv ipc socket {ipc_path} never came up");
            return;
        };

        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let Ok(event) = serde_json::from_str::<serde_json::Value>(&line) else {
                continue;
            };
            if event.get("event").and_then(|v| v.as_str()) != Some("end-file") {
                continue;
            }
            let reason = event.get("reason").and_then(|v| v.as_str()).unwrap_or("");
            if reason != "eof" {
                continue;
            }
            if let Some(item_id) = current.lock().clone() {
                let _ = tx.send(FeedResponse::PlaybackFinished { item_id });
            }
        }
    })
}

#[cfg(unix)]
fn send_ipc_line(path: &str, serialized: &str) -> Result<()> {
    let mut stream =
        UnixStream::connect(path).with_context(|| format!("connect to mpv IPC socket {path}"))?;
    stream
        .write_all(serialized.as_bytes())
        .context("write mpv IPC command")?;
    stream
        .write_all(b"\n")
        .context("write mpv IPC command terminator")?;
    Ok(())
}

#[cfg(not(unix))]
fn send_ipc_line(_path: &str, _serialized: &str) -> Result<()> {
    Err(anyhow!(
        "mpv playback control is not supported on this platform"
    ))
}

fn unique_ipc_path() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    let mut path = std::env::temp_dir();
    path.push(format!("vitrine-mpv-{}-{suffix}.sock", std::process::id()));
    path.to_string_lossy().to_string()
}

fn cleanup_ipc_path(path: &str) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::debug!("failed to remove mpv ipc path {path}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_command_replaces_current_file() {
        let payload = command_payload(&PlayerCommand::Load("https://cdn.test/a.mp4".into()));
        assert_eq!(payload, json!(["loadfile", "https://cdn.test/a.mp4", "replace"]));
    }

    #[test]
    fn rewind_seeks_to_absolute_zero() {
        assert_eq!(
            command_payload(&PlayerCommand::Rewind),
            json!(["seek", 0, "absolute"])
        );
    }

    #[test]
    fn pause_commands_use_property_writes() {
        assert_eq!(
            command_payload(&PlayerCommand::Pause),
            json!(["set_property", "pause", true])
        );
        assert_eq!(
            command_payload(&PlayerCommand::Resume),
            json!(["set_property", "pause", false])
        );
        assert_eq!(
            command_payload(&PlayerCommand::TogglePause),
            json!(["cycle", "pause"])
        );
    }

    #[test]
    fn ipc_paths_are_unique_per_call() {
        assert_ne!(unique_ipc_path(), unique_ipc_path());
    }
}
