//! The assembled pipeline: durable ingest plus fan-out to derived work.
//!
//! One `ActivityPipeline` is built per process and passed by reference to
//! whatever produces events (HTTP middleware, domain handlers). Submitting
//! an event blocks only on the durable save; enrichment (memory, alerts,
//! automation) drains from a bounded in-process queue on background workers
//! and is dropped (not retried, not surfaced) when it cannot keep up.

pub mod orchestrator;
pub mod processor;

pub use orchestrator::{AutomationOrchestrator, AutomationOutcome, AutomationStep};
pub use processor::EventProcessor;

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::alerts::AlertEngine;
use crate::config::Config;
use crate::events::{Event, EventStore, PersistedEventRecord, StoreError};
use crate::memory::MemoryIndex;

pub struct ActivityPipeline {
    store: EventStore,
    memory: MemoryIndex,
    alerts: Arc<AlertEngine>,
    tx: mpsc::Sender<Event>,
    workers: Vec<JoinHandle<()>>,
}

impl ActivityPipeline {
    /// Build the full component graph over one pool and start the workers.
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let store = EventStore::new(pool.clone());
        let memory = MemoryIndex::new(pool)
            .with_windows(config.memory_window_days, config.query_window_days);
        let alerts = Arc::new(AlertEngine::with_default_rules(store.clone()));
        let processor = Arc::new(EventProcessor::new(memory.clone(), alerts.clone()));
        let orchestrator = Arc::new(
            AutomationOrchestrator::new(memory.clone(), alerts.clone())
                .with_triggers(config.automation_triggers.clone())
                .with_lookback_days(config.automation_lookback_days)
                .with_idempotency_guard(config.automation_idempotency_guard),
        );

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let workers: Vec<JoinHandle<()>> = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    processor.clone(),
                    orchestrator.clone(),
                ))
            })
            .collect();

        Self { store, memory, alerts, tx, workers }
    }

    /// Durably record an event, then hand it to the derived-work queue.
    ///
    /// The save is the only operation whose failure reaches the caller. The
    /// enqueue is best-effort: a full queue drops the enrichment for this
    /// event and the submission still succeeds.
    pub async fn submit(&self, event: Event) -> Result<PersistedEventRecord, StoreError> {
        let record = self.store.save(&event).await?;
        let mut stamped = event;
        stamped.id = Some(record.event_id.clone());
        if let Err(e) = self.tx.try_send(stamped) {
            tracing::warn!(
                event_id = %record.event_id,
                error = %e,
                "derived-work queue rejected event; enrichment skipped"
            );
        }
        Ok(record)
    }

    /// Close the queue, drain what is already enqueued, and join the
    /// workers. After this the derived state is as consistent with the log
    /// as it is going to get.
    pub async fn shutdown(self) {
        let Self { tx, workers, .. } = self;
        drop(tx);
        for handle in workers {
            let _ = handle.await;
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn memory(&self) -> &MemoryIndex {
        &self.memory
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Event>>>,
    processor: Arc<EventProcessor>,
    orchestrator: Arc<AutomationOrchestrator>,
) {
    loop {
        let event = { rx.lock().await.recv().await };
        let Some(event) = event else {
            tracing::debug!(worker_id, "derived-work queue closed; worker exiting");
            break;
        };
        processor.process(&event).await;
        orchestrator.handle(&event).await;
    }
}
