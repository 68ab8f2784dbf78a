use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use metrics::counter;
use tokio::sync::mpsc::error::TrySendError;
use tracing::instrument;

use crate::api::{PublishError, PublishResponse};
use crate::event::{LogEvent, RawRequest};
use crate::prometheus::report_dropped_events;
use crate::router;

/// Accepts one event or an array of events, validates them at the
/// boundary, and enqueues each in arrival order. Nothing malformed ever
/// reaches the queue.
#[instrument(skip_all, fields(batch_size))]
pub async fn publish(
    state: State<router::State>,
    body: Bytes,
) -> Result<(StatusCode, Json<PublishResponse>), PublishError> {
    let raw_events = RawRequest::from_bytes(body)?;
    tracing::Span::current().record("batch_size", raw_events.len());

    if raw_events.is_empty() {
        return Err(PublishError::EmptyBatch);
    }
    for raw in &raw_events {
        if raw.topic.is_empty() {
            return Err(PublishError::MissingTopic);
        }
    }

    let total = raw_events.len();
    let mut accepted = 0;
    for event in raw_events.into_iter().map(LogEvent::from_raw) {
        match state.queue.try_send(event) {
            Ok(()) => {
                state.projection.record_received();
                counter!("aggregator_events_received_total").increment(1);
                accepted += 1;
            }
            Err(TrySendError::Full(_)) => {
                report_dropped_events("queue_full", (total - accepted) as u64);
                return Err(PublishError::QueueFull);
            }
            Err(TrySendError::Closed(_)) => {
                report_dropped_events("shutting_down", (total - accepted) as u64);
                return Err(PublishError::ShuttingDown);
            }
        }
    }

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { accepted })))
}
