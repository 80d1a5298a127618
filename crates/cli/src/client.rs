// SPDX-License-Identifier: MIT

//! Client side of the file-drop transport (§4.6, §6): write a request
//! file into the daemon's inbox by atomic rename, poll the outbox for
//! the correlated reply, and time out with `unavailable` rather than
//! blocking forever on a daemon that never picks the file up.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("controller did not reply within the timeout")]
    Timeout,
    #[error("io error talking to the controller: {0}")]
    Io(#[from] std::io::Error),
}

/// Talks to a `fleetd` instance over its file-drop inbox/outbox.
pub struct DaemonClient {
    inbox: PathBuf,
    outbox: PathBuf,
    poll_interval: Duration,
    reply_timeout: Duration,
}

impl DaemonClient {
    pub fn new(inbox: PathBuf, outbox: PathBuf) -> Self {
        Self { inbox, outbox, poll_interval: DEFAULT_POLL_INTERVAL, reply_timeout: DEFAULT_REPLY_TIMEOUT }
    }

    pub fn with_timeouts(mut self, poll_interval: Duration, reply_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.reply_timeout = reply_timeout;
        self
    }

    /// Send one protocol line and wait for its reply line. `token`
    /// becomes both the request filename's stem and the reply filename's
    /// stem the daemon writes back to, per the file-drop wire form (§6).
    pub async fn send(&self, token: &str, line: &str) -> Result<String, ClientError> {
        tokio::fs::create_dir_all(&self.inbox).await?;
        let staging = self.inbox.join(format!("{token}.tmp"));
        let dest = self.inbox.join(format!("{token}.request"));
        tokio::fs::write(&staging, format!("{line}\n")).await?;
        tokio::fs::rename(&staging, &dest).await?;

        let reply_path = self.outbox.join(format!("{token}.result"));
        let deadline = tokio::time::Instant::now() + self.reply_timeout;
        loop {
            if let Ok(body) = tokio::fs::read_to_string(&reply_path).await {
                let _ = tokio::fs::remove_file(&reply_path).await;
                return Ok(body.trim().to_string());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::Timeout);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
