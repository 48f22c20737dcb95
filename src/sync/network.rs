// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared view of whether the API is reachable.
///
/// Work that requires the network waits on this before running.
#[derive(Clone)]
pub struct NetworkMonitor {
    online: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(watch::Sender::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Resolve once the network is reported up
    pub async fn wait_online(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as self, so this only returns on `true`
        let _ = rx.wait_for(|online| *online).await;
    }

    /// Periodically try a TCP connect to `host:port` and record the outcome
    pub fn spawn_probe(&self, host: String, port: u16, every: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            loop {
                let reachable = probe(&host, port).await;
                monitor.set_online(reachable);
                tokio::time::sleep(every).await;
            }
        })
    }
}

async fn probe(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
