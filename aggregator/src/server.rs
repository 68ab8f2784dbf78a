use std::future::Future;
use std::time::Duration;

use health::HealthRegistry;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::pipeline;
use crate::projection::SharedProjection;
use crate::router;
use crate::store::DedupStore;

/// Runs the full service: store initialization, rehydration, consumer
/// spawn, then the HTTP server until `shutdown` resolves, followed by a
/// bounded queue drain.
///
/// Startup order matters: the projection must be rebuilt and the
/// consumer running before the first request is accepted. A store that
/// cannot be initialized aborts startup, serving without durable dedup
/// would break the exactly-once admission contract.
pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("liveness");

    let store = DedupStore::new(&config.database_path)
        .await
        .expect("failed to open dedup store");
    store
        .initialize()
        .await
        .expect("failed to initialize dedup store");

    // A store that cannot be read costs the projection, not the boot
    let projection = SharedProjection::new();
    match store.load_all_ordered().await {
        Ok(events) => {
            tracing::info!(count = events.len(), "rehydrated unique events from store");
            projection.rehydrate(events);
        }
        Err(err) => {
            tracing::error!(
                "failed to load stored events, starting with an empty projection: {}",
                err
            );
        }
    }

    let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);

    let consumer_liveness = liveness
        .register(
            "consumer_loop".to_string(),
            Duration::from_secs(config.consumer_liveness_deadline_seconds),
        )
        .await;
    let consumer = tokio::spawn(pipeline::run_consumer(
        store,
        projection.clone(),
        queue_rx,
        consumer_liveness,
        Duration::from_millis(config.consumer_failure_backoff_ms),
    ));

    let app = router::router(queue_tx, projection, liveness, config.export_prometheus);

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("failed to serve HTTP");

    // The router owned the last queue sender; serving is done, so the
    // channel is now closed and the consumer drains what was already
    // enqueued. Never wait forever for it.
    match tokio::time::timeout(
        Duration::from_secs(config.drain_timeout_seconds),
        consumer,
    )
    .await
    {
        Ok(Ok(())) => tracing::info!("ingestion queue drained"),
        Ok(Err(err)) => tracing::error!("consumer loop terminated abnormally: {}", err),
        Err(_) => {
            tracing::warn!("drain timeout elapsed, enqueued events may be unprocessed")
        }
    }
}
