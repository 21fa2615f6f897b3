//! Observer side of the relay socket

use anyhow::{Context, Result};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::frame;
use super::protocol::Broadcast;

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hand one broadcast to the running relay
///
/// The frame is built and size-checked before connecting, so an oversized
/// broadcast fails here instead of having the relay drop the connection.
pub fn send_broadcast(socket_path: &Path, broadcast: &Broadcast) -> Result<()> {
    let frame = frame::encode(broadcast)?;

    let mut stream = UnixStream::connect(socket_path)
        .with_context(|| format!("Failed to connect to socket: {}", socket_path.display()))?;
    stream
        .set_write_timeout(Some(WRITE_TIMEOUT))
        .context("Failed to set write timeout")?;

    stream
        .write_all(&frame)
        .context("Failed to write broadcast frame")?;
    stream.flush().context("Failed to flush stream")?;
    Ok(())
}
