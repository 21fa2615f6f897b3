//! Lifecycle handle for the notification observer
//!
//! The observer is a long-running background process that receives every
//! posted notification and re-broadcasts it on the relay socket. This crate
//! never tracks whether it is really up; it only asks for it to be running.

use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

/// Time a freshly launched observer spends in `StartRequested`
const STARTUP_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverLifecycle {
    NotRunning,
    StartRequested,
    Running,
}

/// Opaque handle to the observer's background process
pub trait ObserverService: Send + Sync {
    /// Request that the observer is running.
    ///
    /// Calling this while it already runs must not produce a second instance.
    fn ensure_running(&self) -> Result<()>;
}

struct Launched {
    child: Child,
    started_at: Instant,
}

/// Observer launched as a child process from a configured command line
pub struct ProcessObserver {
    program: String,
    args: Vec<String>,
    launched: Mutex<Option<Launched>>,
}

impl ProcessObserver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            launched: Mutex::new(None),
        }
    }

    /// Build from a `[program, args...]` list. `None` when the list is empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn lifecycle(&self) -> ObserverLifecycle {
        let mut launched = self.launched.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(l) = launched.as_mut() else {
            return ObserverLifecycle::NotRunning;
        };

        if !is_alive(&mut l.child) {
            ObserverLifecycle::NotRunning
        } else if l.started_at.elapsed() < STARTUP_GRACE {
            ObserverLifecycle::StartRequested
        } else {
            ObserverLifecycle::Running
        }
    }

    /// Process id of the live observer, if any
    pub fn pid(&self) -> Option<u32> {
        let mut launched = self.launched.lock().unwrap_or_else(PoisonError::into_inner);
        let l = launched.as_mut()?;
        is_alive(&mut l.child).then(|| l.child.id())
    }
}

impl ObserverService for ProcessObserver {
    fn ensure_running(&self) -> Result<()> {
        let mut launched = self.launched.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(l) = launched.as_mut() {
            if is_alive(&mut l.child) {
                debug!("Observer already running (pid {})", l.child.id());
                return Ok(());
            }
            info!("Observer exited; launching a new instance");
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BridgeError::ObserverStart {
                program: self.program.clone(),
                source,
            })?;

        info!("Started notification observer {} (pid {})", self.program, child.id());
        *launched = Some(Launched {
            child,
            started_at: Instant::now(),
        });
        Ok(())
    }
}

fn is_alive(child: &mut Child) -> bool {
    match child.try_wait() {
        Ok(None) => true,
        Ok(Some(status)) => {
            debug!("Observer exited with {}", status);
            false
        }
        Err(e) => {
            warn!("Failed to query observer status: {}", e);
            false
        }
    }
}

/// Observer whose lifecycle is owned by something else
///
/// Used when the observer connects to the relay socket on its own.
pub struct ExternalObserver;

impl ObserverService for ExternalObserver {
    fn ensure_running(&self) -> Result<()> {
        debug!("Observer is managed externally; nothing to start");
        Ok(())
    }
}
