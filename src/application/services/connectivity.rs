use super::sync_bus::{SyncBus, SyncEvent, SyncTrigger};
use crate::application::ports::RemoteBackend;
use crate::shared::clock::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    pub online: bool,
    pub visible: bool,
    pub last_online_at: Option<i64>,
}

/// Tracks reachability and foreground visibility and turns transitions into
/// sync triggers.
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    bus: SyncBus,
    clock: Arc<dyn Clock>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool, bus: SyncBus, clock: Arc<dyn Clock>) -> Self {
        let last_online_at = online.then(|| clock.now_ms());
        let (state, _) = watch::channel(ConnectivityState {
            online,
            visible: true,
            last_online_at,
        });
        Self { state, bus, clock }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    /// Online and in the foreground.
    pub fn should_sync(&self) -> bool {
        let state = self.state.borrow();
        state.online && state.visible
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    pub fn set_online(&self, online: bool) {
        let now = self.clock.now_ms();
        let changed = self.state.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            if online {
                state.last_online_at = Some(now);
            }
            true
        });
        if !changed {
            return;
        }

        self.bus.emit(SyncEvent::ConnectivityChanged { online });
        if online {
            tracing::info!("connectivity restored");
            self.bus.trigger(SyncTrigger::Reconnected);
        } else {
            tracing::warn!("connectivity lost");
        }
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.state.send_if_modified(|state| {
            if state.visible == visible {
                return false;
            }
            state.visible = visible;
            true
        });
        if changed && visible && self.is_online() {
            self.bus.trigger(SyncTrigger::BecameVisible);
        }
    }

    /// Emits a periodic trigger while online and visible.
    pub fn spawn_periodic(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if monitor.should_sync() {
                    monitor.bus.trigger(SyncTrigger::Periodic);
                }
            }
        })
    }

    /// Probes the backend on a fixed cadence for hosts without OS connectivity events.
    pub fn spawn_probe(
        self: &Arc<Self>,
        backend: Arc<dyn RemoteBackend>,
        every: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let reachable = match tokio::time::timeout(timeout, backend.ping()).await {
                    Ok(Ok(())) => true,
                    Ok(Err(err)) => {
                        tracing::debug!(error = %err, "connectivity probe failed");
                        false
                    }
                    Err(_) => {
                        tracing::debug!("connectivity probe timed out");
                        false
                    }
                };
                monitor.set_online(reachable);
            }
        })
    }
}
