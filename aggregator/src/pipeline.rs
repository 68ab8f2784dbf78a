use std::time::Duration;

use health::HealthHandle;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::event::LogEvent;
use crate::projection::SharedProjection;
use crate::store::{DedupStore, StoreError};

/// Outcome of offering one event to the dedup store.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// First time this identity key was seen, the event is now durable
    Admitted,
    /// The identity key was already present, the event is discarded
    Duplicate,
}

/// The single chokepoint deciding whether an event is new, backed by the
/// store's atomic insert: two arrivals of the same key can never both win,
/// in this process lifetime or any other against the same store.
pub async fn admit(store: &DedupStore, event: &LogEvent) -> Result<Admission, StoreError> {
    match store.insert_if_absent(event).await? {
        true => Ok(Admission::Admitted),
        false => Ok(Admission::Duplicate),
    }
}

/// Drains the ingestion queue until every sender is gone.
///
/// This task is the only writer to the store and the only mutator of the
/// projection. A store failure is logged and absorbed with a short pause;
/// the failed event is not retried and does not count as unique or
/// duplicate. An in-flight admission always runs to completion: shutdown
/// only closes the channel, it never aborts the loop mid-event.
pub async fn run_consumer(
    store: DedupStore,
    projection: SharedProjection,
    mut receiver: mpsc::Receiver<LogEvent>,
    liveness: HealthHandle,
    failure_backoff: Duration,
) {
    info!("consumer loop started");
    let mut heartbeat = tokio::time::interval(liveness.deadline() / 2);

    loop {
        tokio::select! {
            maybe_event = receiver.recv() => {
                let Some(event) = maybe_event else {
                    break;
                };
                process_event(&store, &projection, event, failure_backoff).await;
            }
            _ = heartbeat.tick() => {
                liveness.report_healthy().await;
            }
        }
    }

    info!("ingestion queue closed, consumer loop exiting");
}

async fn process_event(
    store: &DedupStore,
    projection: &SharedProjection,
    event: LogEvent,
    failure_backoff: Duration,
) {
    match admit(store, &event).await {
        Ok(Admission::Admitted) => {
            tracing::debug!(key = %event.key(), "admitted new event");
            counter!("aggregator_events_admitted_total").increment(1);
            projection.record_admitted(event);
        }
        Ok(Admission::Duplicate) => {
            tracing::debug!(key = %event.key(), "dropped duplicate event");
            counter!("aggregator_events_duplicate_dropped_total").increment(1);
            projection.record_duplicate();
        }
        Err(err) => {
            error!(key = %event.key(), "failed to admit event: {}", err);
            counter!("aggregator_store_failures_total").increment(1);
            tokio::time::sleep(failure_backoff).await;
        }
    }
}
