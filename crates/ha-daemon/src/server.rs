//! Control socket event loop
//!
//! A single-threaded datagram loop. Each tick drains every pending event
//! into a set, so bursts coalesce into one handler call, and dispatches
//! `RECONF` before `CHANGED`. The 5 second idle expiry synthesizes a
//! `CHANGED` tick so membership changes are never missed for long.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use tokio::net::UnixDatagram;
use tokio::time;

use crate::settings::Settings;

pub const EVENT_RECONF: &str = "RECONF";
pub const EVENT_CHANGED: &str = "CHANGED";
pub const EVENT_STOP: &str = "STOP";

const TICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handlers driven by the loop; `reconf` runs before `poll` when both
/// events are set in a tick.
#[async_trait]
pub trait EventHandler: Send {
    async fn reconf(&mut self);
    async fn poll(&mut self);
}

pub struct Server {
    socket: UnixDatagram,
    socket_path: PathBuf,
    pid_path: PathBuf,
    timeout: Duration,
}

impl Server {
    pub fn bind(settings: &Settings) -> Result<Self> {
        let pid_path = settings.pid_file();
        fs::write(&pid_path, std::process::id().to_string())
            .with_context(|| format!("failed to write {}", pid_path.display()))?;

        let socket_path = settings.socket_file();
        let _ = fs::remove_file(&socket_path);
        let socket = UnixDatagram::bind(&socket_path)
            .with_context(|| format!("failed to bind {}", socket_path.display()))?;

        Ok(Self {
            socket,
            socket_path,
            pid_path,
            timeout: TICK_TIMEOUT,
        })
    }

    /// Shorter idle expiry; used by tests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run<H: EventHandler>(&self, handler: &mut H) -> Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            let mut events: HashSet<String> = HashSet::new();
            match time::timeout(self.timeout, self.socket.recv(&mut buf)).await {
                // idle expiry synthesizes a membership check
                Err(_elapsed) => {
                    events.insert(EVENT_CHANGED.to_string());
                }
                Ok(received) => {
                    let n = received.context("control socket receive failed")?;
                    events.insert(decode(&buf[..n]));
                    loop {
                        match self.socket.try_recv(&mut buf) {
                            Ok(n) => {
                                events.insert(decode(&buf[..n]));
                            }
                            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                                events.insert(EVENT_CHANGED.to_string());
                                break;
                            }
                            Err(err) => {
                                return Err(err).context("control socket drain failed");
                            }
                        }
                    }
                }
            }

            if events.contains(EVENT_RECONF) {
                handler.reconf().await;
            }
            if events.contains(EVENT_CHANGED) {
                handler.poll().await;
            }
            if events.contains(EVENT_STOP) {
                debug!("leaving...");
                break;
            }
        }
        Ok(())
    }
}

fn decode(payload: &[u8]) -> String {
    let tag = String::from_utf8_lossy(payload).into_owned();
    debug!("received: {}", tag);
    tag
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.pid_path);
        let _ = fs::remove_file(&self.socket_path);
    }
}
