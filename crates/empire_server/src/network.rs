//! Connection handling: accept loop, per-connection reader and writer
//! tasks.
//!
//! Each connection gets a reader task that accumulates socket bytes,
//! extracts complete frames and forwards decoded messages into the
//! match loop's channel, and a writer task that drains an outgoing
//! byte-batch channel. The simulation thread never touches a socket
//! directly; the channel handoff is the only synchronization surface.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use empire_protocol::{ClientMessage, RecvBuffer};

/// An inbound network event for the match loop.
#[derive(Debug)]
pub enum NetEvent {
    /// A complete, decoded message arrived from a player.
    Message(u8, ClientMessage),
    /// A player's socket closed or lost framing.
    Disconnected(u8),
}

/// Handle to one player's connection.
#[derive(Debug)]
pub struct Connection {
    /// Player index.
    pub player: u8,
    writer_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Connection {
    /// Queue bytes for the writer task. Returns `false` when the
    /// connection is gone.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.writer_tx.send(bytes).is_ok()
    }
}

/// Accept exactly `player_count` connections and spawn their IO tasks.
///
/// # Errors
///
/// Returns the accept error if the listener fails.
pub async fn accept_players(
    listener: &TcpListener,
    player_count: u8,
    events_tx: mpsc::UnboundedSender<NetEvent>,
) -> std::io::Result<Vec<Connection>> {
    let mut connections = Vec::with_capacity(player_count as usize);

    for player in 0..player_count {
        let (socket, addr) = listener.accept().await?;
        tracing::info!(player, %addr, "player connected");
        socket.set_nodelay(true)?;

        let (read_half, write_half) = socket.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        tokio::spawn(reader_task(player, read_half, events_tx.clone()));
        tokio::spawn(writer_task(player, write_half, writer_rx));

        connections.push(Connection { player, writer_tx });
    }

    Ok(connections)
}

/// Read socket bytes, extract frames, decode and forward messages.
///
/// Malformed message bodies are logged and discarded with the
/// connection kept alive; a broken frame header loses framing and
/// terminates the connection.
async fn reader_task(
    player: u8,
    mut read_half: OwnedReadHalf,
    events_tx: mpsc::UnboundedSender<NetEvent>,
) {
    let mut recv = RecvBuffer::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(error) => {
                tracing::warn!(player, %error, "socket read failed");
                break;
            }
        };
        recv.extend_from_slice(&chunk[..n]);

        loop {
            match recv.next_frame() {
                Ok(Some(frame)) => match ClientMessage::decode(&frame) {
                    Ok(message) => {
                        if events_tx.send(NetEvent::Message(player, message)).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            player,
                            msg_type = frame.msg_type,
                            %error,
                            "discarding malformed message"
                        );
                    }
                },
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(player, %error, "stream framing lost; dropping connection");
                    let _ = events_tx.send(NetEvent::Disconnected(player));
                    return;
                }
            }
        }
    }

    let _ = events_tx.send(NetEvent::Disconnected(player));
}

/// Drain queued byte batches into the socket.
async fn writer_task(
    player: u8,
    mut write_half: OwnedWriteHalf,
    mut writer_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = writer_rx.recv().await {
        if let Err(error) = write_half.write_all(&bytes).await {
            tracing::warn!(player, %error, "socket write failed");
            break;
        }
    }
}
