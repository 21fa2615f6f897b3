//! The `listen` loop: relay socket, stream controller and a line-oriented consumer

use anyhow::Result;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

use super::{build_controller, Config};
use crate::bridge::{ChannelSink, StreamEvent};
use crate::notify::{self, LocalBroadcastBus};

/// Stream notifications to `out` as JSON lines until `shutdown` resolves
///
/// A socket that cannot be bound fails before the stream starts. A failed
/// start still writes the sink's `error` delivery to `out` before returning.
pub async fn run<W: Write>(
    config: &Config,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let listener = notify::bind_listener(&config.socket_path)?;
    let bus = Arc::new(LocalBroadcastBus::new());
    tokio::spawn(notify::serve(listener, Arc::clone(&bus)));

    let mut controller = build_controller(config, bus);
    let (sink, mut events) = ChannelSink::new();

    if let Err(e) = controller.on_start(Arc::new(sink)) {
        while let Ok(event) = events.try_recv() {
            write_event(out, &event)?;
        }
        return Err(e.into());
    }

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                write_event(out, &event)?;
                if event == StreamEvent::EndOfStream {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested; stopping stream");
                break;
            }
        }
    }

    controller.on_cancel();
    Ok(())
}

fn write_event(out: &mut impl Write, event: &StreamEvent) -> Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
