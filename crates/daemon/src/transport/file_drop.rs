// SPDX-License-Identifier: MIT

//! File-drop transport: the CLI atomically renames a request file into
//! an inbox directory; the daemon polls the directory, decodes each
//! file's single protocol line, and writes the reply into the outbox
//! under the same stem. Events are appended as lines to a shared file
//! under the events directory for `subscribe` pollers to tail.

use super::{Inbound, TransportAdapter};
use async_trait::async_trait;
use fleet_core::{Event, ResultMsg};
use fleet_protocol::{decode, encode_event, encode_result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct FileDropTransport {
    outbox: PathBuf,
    events_path: PathBuf,
    inbound_rx: Mutex<mpsc::Receiver<Inbound>>,
}

impl FileDropTransport {
    /// Start polling `inbox` in the background; replies land in `outbox`,
    /// events are appended to `events_path`.
    pub fn spawn(inbox: PathBuf, outbox: PathBuf, events_path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(poll_inbox(inbox, tx));
        Self { outbox, events_path, inbound_rx: Mutex::new(rx) }
    }
}

async fn poll_inbox(inbox: PathBuf, tx: mpsc::Sender<Inbound>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        let Ok(mut entries) = tokio::fs::read_dir(&inbox).await else { continue };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.path());
        }
        names.sort();
        for path in names {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let reply_token = stem.to_string();
            let Ok(line) = tokio::fs::read_to_string(&path).await else { continue };
            let _ = tokio::fs::remove_file(&path).await;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match decode(line, reply_token.clone()) {
                Ok(action) => {
                    if tx.send(Inbound { action, reply_token }).await.is_err() {
                        return;
                    }
                }
                Err(_) => {
                    // A request the codec itself couldn't decode has no
                    // correlation id to reply against; drop it. The issuer
                    // will time out and can resend.
                }
            }
        }
    }
}

#[async_trait]
impl TransportAdapter for FileDropTransport {
    async fn receive(&self) -> Option<Inbound> {
        self.inbound_rx.lock().await.recv().await
    }

    async fn reply(&self, reply_token: &str, result: &ResultMsg) {
        let line = encode_result(result);
        let path = self.outbox.join(format!("{reply_token}.result"));
        let tmp = self.outbox.join(format!("{reply_token}.result.tmp"));
        if tokio::fs::write(&tmp, format!("{line}\n")).await.is_ok() {
            let _ = tokio::fs::rename(&tmp, &path).await;
        }
    }

    async fn publish(&self, event: &Event) {
        let line = encode_event(event);
        if let Some(parent) = self.events_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Ok(mut file) =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.events_path).await
        {
            use tokio::io::AsyncWriteExt;
            let _ = file.write_all(format!("{line}\n").as_bytes()).await;
        }
    }
}

#[cfg(test)]
#[path = "file_drop_tests.rs"]
mod tests;
