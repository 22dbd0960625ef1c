//! Periodic backend health polling.
//!
//! The monitor probes the gateway once on start and then on every interval
//! tick, publishing the result on a `watch` channel so any number of views
//! can follow it.

use crate::gateway::Gateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Up,
    Down,
}

impl BackendStatus {
    pub fn label(self) -> &'static str {
        match self {
            BackendStatus::Checking => "Backend: Checking...",
            BackendStatus::Up => "Backend: Online",
            BackendStatus::Down => "Backend: Offline",
        }
    }
}

pub struct BackendMonitor {
    gateway: Arc<dyn Gateway>,
    status: Arc<watch::Sender<BackendStatus>>,
    task: Option<JoinHandle<()>>,
}

impl BackendMonitor {
    /// A monitor that only probes when asked via [`BackendMonitor::check_now`].
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let (status, _) = watch::channel(BackendStatus::Checking);
        Self {
            gateway,
            status: Arc::new(status),
            task: None,
        }
    }

    /// Starts polling on the current tokio runtime.
    pub fn spawn(gateway: Arc<dyn Gateway>, interval: Duration) -> Self {
        let mut monitor = Self::new(gateway);
        let gateway = monitor.gateway.clone();
        let status = monitor.status.clone();
        monitor.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                probe(gateway.as_ref(), &status).await;
            }
        }));
        monitor
    }

    pub fn status(&self) -> BackendStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendStatus> {
        self.status.subscribe()
    }

    /// Probes immediately, e.g. to wake a sleeping backend.
    pub async fn check_now(&self) -> BackendStatus {
        probe(self.gateway.as_ref(), &self.status).await
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for BackendMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn probe(gateway: &dyn Gateway, status: &watch::Sender<BackendStatus>) -> BackendStatus {
    status.send_replace(BackendStatus::Checking);
    let next = if gateway.check_health().await {
        BackendStatus::Up
    } else {
        BackendStatus::Down
    };
    match next {
        BackendStatus::Down => warn!("backend is offline"),
        _ => debug!("backend is online"),
    }
    status.send_replace(next);
    next
}
