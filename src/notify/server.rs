//! Unix Domain Socket server for receiving observer broadcasts

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};

use super::bus::LocalBroadcastBus;
use super::frame;
use super::protocol::Broadcast;

/// Bind the relay socket, replacing a stale socket file left by a previous run
pub fn bind_listener(socket_path: &Path) -> Result<UnixListener> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path).context("Failed to remove existing socket")?;
    }

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind to socket: {}", socket_path.display()))?;

    tracing::info!("Broadcast listener started at: {}", socket_path.display());
    Ok(listener)
}

/// Accept observer connections forever, dispatching every broadcast to `bus`
///
/// A failing connection is logged and closed; it never stops the server.
pub async fn serve(listener: UnixListener, bus: Arc<LocalBroadcastBus>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, bus).await {
                        tracing::warn!("Closing observer connection: {:#}", e);
                    }
                });
            }
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, bus: Arc<LocalBroadcastBus>) -> Result<()> {
    while let Some(body) = read_frame(&mut stream).await? {
        let broadcast: Broadcast = match serde_json::from_slice(&body) {
            Ok(broadcast) => broadcast,
            Err(e) => {
                tracing::warn!("Dropping malformed broadcast frame: {}", e);
                continue;
            }
        };

        let delivered = bus.send(&broadcast);
        tracing::debug!("{} delivered to {} receiver(s)", broadcast.action, delivered);
    }
    Ok(())
}

/// Read one frame body. `None` on a clean end of stream.
async fn read_frame(stream: &mut UnixStream) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("Failed to read frame length"),
    }

    let mut body = vec![0u8; frame::decode_len(prefix)?];
    stream
        .read_exact(&mut body)
        .await
        .context("Failed to read frame body")?;

    Ok(Some(body))
}
