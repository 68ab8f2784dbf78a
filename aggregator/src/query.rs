use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::event::LogEvent;
use crate::projection::Stats;
use crate::router;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub topic: Option<String>,
}

/// Unique events in admission order, straight from the projection. The
/// durable store is never on this path.
pub async fn events(
    state: State<router::State>,
    filter: Query<EventsQuery>,
) -> Json<Vec<LogEvent>> {
    Json(state.projection.events(filter.topic.as_deref()))
}

pub async fn stats(state: State<router::State>) -> Json<Stats> {
    Json(state.projection.stats())
}
