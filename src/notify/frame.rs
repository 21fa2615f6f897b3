//! Length-prefixed framing shared by the relay socket's two ends
//!
//! A frame is a 4-byte big-endian body length followed by a JSON `Broadcast`.

use anyhow::{Context, Result};

use super::protocol::Broadcast;

/// Largest frame body either side will handle
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Serialize a broadcast into a complete frame, prefix included
pub fn encode(broadcast: &Broadcast) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(broadcast).context("Failed to serialize broadcast")?;
    check_len(body.len())?;
    let len = u32::try_from(body.len()).context("Frame length does not fit in u32")?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Body length announced by a frame prefix, rejected when over the limit
pub fn decode_len(prefix: [u8; 4]) -> Result<usize> {
    let len = u32::from_be_bytes(prefix) as usize;
    check_len(len)?;
    Ok(len)
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_FRAME_LEN {
        anyhow::bail!("Frame too large: {} bytes (limit {})", len, MAX_FRAME_LEN);
    }
    Ok(())
}
