use std::future::ready;

use axum::{
    routing::{get, post},
    Router,
};
use health::HealthRegistry;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::event::LogEvent;
use crate::projection::SharedProjection;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::{publish, query};

#[derive(Clone)]
pub struct State {
    pub queue: mpsc::Sender<LogEvent>,
    pub projection: SharedProjection,
}

async fn index() -> &'static str {
    "log aggregator"
}

pub fn router(
    queue: mpsc::Sender<LogEvent>,
    projection: SharedProjection,
    liveness: HealthRegistry,
    metrics: bool,
) -> Router {
    let state = State { queue, projection };

    let router = Router::new()
        .route("/", get(index))
        .route("/publish", post(publish::publish))
        .route("/events", get(query::events))
        .route("/stats", get(query::stats))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when aggregator is used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
