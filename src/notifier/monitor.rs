use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{net::TcpStream, sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tokio_stream::{StreamExt, wrappers::WatchStream};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ProbeConfig,
    notifier::connectivity::{ConnectivitySignal, ConnectivityState},
};

/// Answers "is the network reachable right now".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Online when a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::trace!(target: "faultline", address = %self.address, error = %err, "tcp_probe_failed");
                false
            }
            Err(_) => {
                tracing::trace!(target: "faultline", address = %self.address, "tcp_probe_timed_out");
                false
            }
        }
    }
}

pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Polls `probe` every `interval` and applies the result to `signal`.
    pub fn spawn(
        signal: ConnectivitySignal,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = probe.probe().await;
                        signal.transition(ConnectivityState::from_online(online));
                    }
                }
            }
            tracing::debug!(target: "faultline", "connectivity_monitor_stopped");
        })
    }

    pub fn from_config(
        signal: ConnectivitySignal,
        config: &ProbeConfig,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let probe = TcpProbe::new(
            config.address.clone(),
            Duration::from_millis(config.timeout_ms),
        );
        Self::spawn(
            signal,
            Arc::new(probe),
            Duration::from_millis(config.interval_ms),
            cancel,
        )
    }
}

/// Forwards a host-side `watch` channel of online flags into `signal`.
pub fn watch_bridge(
    signal: ConnectivitySignal,
    receiver: watch::Receiver<bool>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = WatchStream::new(receiver);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = updates.next() => match update {
                    Some(online) => {
                        signal.transition(ConnectivityState::from_online(online));
                    }
                    None => break,
                },
            }
        }
    })
}
