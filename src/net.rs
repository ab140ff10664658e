//! Connectivity observer.
//!
//! Publishes a single boolean "is currently online" through a watch
//! channel. The first probe runs before the channel is created, so
//! subscribers never observe an assumed-online initial value. There is no
//! debouncing and no distinction between "no network" and "backend
//! unreachable" - a backend call can still fail while this reports online,
//! and that failure is handled by the synchronizer on its own.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, info};

/// Seconds between reachability probes.
const PROBE_INTERVAL_SECS: u64 = 15;

/// Probe request timeout. Short so an offline device flips quickly.
const PROBE_TIMEOUT_SECS: u64 = 5;

pub struct ConnectivityObserver {
    rx: watch::Receiver<bool>,
}

impl ConnectivityObserver {
    /// Probe once immediately, then keep probing in a background task for
    /// as long as any receiver is alive.
    pub async fn start(probe_url: String) -> Result<Self> {
        Self::start_with_interval(probe_url, Duration::from_secs(PROBE_INTERVAL_SECS)).await
    }

    async fn start_with_interval(probe_url: String, probe_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;

        let initial = probe(&client, &probe_url).await;
        let (tx, rx) = watch::channel(initial);
        info!(online = initial, "Connectivity observer started");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(probe_interval);
            interval.tick().await; // first tick fires immediately; already probed
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    // All receivers dropped
                    break;
                }
                let online = probe(&client, &probe_url).await;
                // Only a genuine transition notifies receivers; an
                // unchanged probe result must not wake them.
                let changed = tx.send_if_modified(|state| {
                    if *state != online {
                        *state = online;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    info!(online, "Connectivity changed");
                }
            }
        });

        Ok(Self { rx })
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Any HTTP response counts as reachable, whatever the status code.
async fn probe(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "Connectivity probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    /// Minimal local server answering every request with 200 and an empty
    /// body. The base URL is returned; the server lives for the whole test.
    fn spawn_ok_server() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_initial_probe_reports_online() {
        let base = spawn_ok_server();
        let observer = ConnectivityObserver::start(base).await.expect("observer");
        assert!(observer.is_online());
    }

    #[tokio::test]
    async fn test_initial_probe_reports_offline() {
        // Bind and immediately drop so the port refuses connections
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let observer = ConnectivityObserver::start(format!("http://{}", addr))
            .await
            .expect("observer");
        assert!(!observer.is_online());
    }

    #[tokio::test]
    async fn test_unchanged_probes_do_not_wake_receivers() {
        let base = spawn_ok_server();
        let observer =
            ConnectivityObserver::start_with_interval(base, Duration::from_millis(50))
                .await
                .expect("observer");
        let mut rx = observer.subscribe();
        assert!(*rx.borrow_and_update());

        // Several probe ticks pass with the value steady at online; none
        // of them may notify the receiver.
        let woken =
            tokio::time::timeout(Duration::from_millis(400), rx.changed()).await;
        assert!(woken.is_err(), "receiver woke without a transition");
    }
}
