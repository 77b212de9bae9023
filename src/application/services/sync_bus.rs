use crate::domain::value_objects::{ClientId, MutationId, PhotoId, Table};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

const EVENT_CAPACITY: usize = 256;

/// Reason a drain pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Reconnected,
    BecameVisible,
    Periodic,
    Enqueued,
    PhotoEnqueued,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainKind {
    Mutations,
    Photos,
}

/// Observable outcome of local writes and sync work, always naming its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    RecordChanged {
        table: Table,
        client_id: ClientId,
    },
    RecordRemoved {
        table: Table,
        client_id: ClientId,
    },
    RecordSynced {
        table: Table,
        client_id: ClientId,
    },
    RecordFailed {
        table: Table,
        client_id: ClientId,
        reason: String,
    },
    MutationRetry {
        mutation_id: MutationId,
        table: Table,
        client_id: ClientId,
        retry_count: u32,
        error: String,
    },
    MutationDropped {
        mutation_id: MutationId,
        table: Table,
        client_id: ClientId,
        reason: String,
    },
    PhotoUploaded {
        photo_id: PhotoId,
        daily_chore_id: ClientId,
        storage_id: String,
    },
    PhotoRetryScheduled {
        photo_id: PhotoId,
        daily_chore_id: ClientId,
        retry_count: u32,
        next_retry_at: i64,
    },
    PhotoFailed {
        photo_id: PhotoId,
        daily_chore_id: ClientId,
        reason: String,
    },
    DrainFinished {
        kind: DrainKind,
        processed: usize,
        failed: usize,
    },
    ConnectivityChanged {
        online: bool,
    },
}

/// Narrow channel pair that lets queues and stores wake the engine and report
/// changes without depending on it.
#[derive(Clone)]
pub struct SyncBus {
    triggers: mpsc::UnboundedSender<SyncTrigger>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncTrigger>) {
        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        (Self { triggers, events }, trigger_rx)
    }

    /// Fire-and-forget; a stopped engine simply misses the wake-up.
    pub fn trigger(&self, trigger: SyncTrigger) {
        if self.triggers.send(trigger).is_err() {
            tracing::debug!(?trigger, "sync trigger dropped: engine not running");
        }
    }

    pub fn emit(&self, event: SyncEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn triggers_reach_the_receiver() {
        let (bus, mut rx) = SyncBus::new();
        bus.trigger(SyncTrigger::Enqueued);
        bus.trigger(SyncTrigger::Manual);
        assert_eq!(rx.recv().await, Some(SyncTrigger::Enqueued));
        assert_eq!(rx.recv().await, Some(SyncTrigger::Manual));
    }

    #[tokio::test]
    async fn sending_without_listeners_is_harmless() {
        let (bus, rx) = SyncBus::new();
        drop(rx);
        bus.trigger(SyncTrigger::Periodic);
        bus.emit(SyncEvent::ConnectivityChanged { online: true });

        let mut events = bus.subscribe();
        bus.emit(SyncEvent::ConnectivityChanged { online: false });
        assert_eq!(
            events.recv().await.unwrap(),
            SyncEvent::ConnectivityChanged { online: false }
        );
    }
}
