#![allow(dead_code)]

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

use anyhow::bail;
use once_cell::sync::Lazy;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use aggregator::config::Config;
use aggregator::server::serve;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| Config {
    address: SocketAddr::from_str("127.0.0.1:0").unwrap(),
    database_path: String::new(), // filled in per test
    queue_capacity: 1024,
    consumer_failure_backoff_ms: 10,
    drain_timeout_seconds: 5,
    consumer_liveness_deadline_seconds: 30,
    export_prometheus: false,
});

static TRACING_INIT: Once = Once::new();
pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .init()
    });
}

/// A database directory that outlives server restarts within one test.
pub struct TestDb {
    dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> String {
        self.dir
            .path()
            .join("dedup_store.db")
            .to_string_lossy()
            .into_owned()
    }
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    client: reqwest::Client,
}

impl ServerHandle {
    pub async fn for_database(db: &TestDb) -> Self {
        let mut config = DEFAULT_CONFIG.clone();
        config.database_path = db.path();
        Self::for_config(config).await
    }

    pub async fn for_config(config: Config) -> Self {
        let listener = TcpListener::bind(config.address)
            .await
            .expect("could not bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(serve(config, listener, async move {
            _ = shutdown_rx.await;
        }));

        Self {
            addr,
            shutdown: Some(shutdown_tx),
            join,
            client: reqwest::Client::new(),
        }
    }

    pub async fn publish(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("http://{}/publish", self.addr))
            .json(body)
            .send()
            .await
            .expect("failed to send publish request")
    }

    pub async fn events(&self, topic: Option<&str>) -> Vec<Value> {
        let mut url = format!("http://{}/events", self.addr);
        if let Some(topic) = topic {
            url = format!("{url}?topic={topic}");
        }
        self.client
            .get(url)
            .send()
            .await
            .expect("failed to query events")
            .json()
            .await
            .expect("failed to decode events response")
    }

    pub async fn stats(&self) -> Value {
        self.client
            .get(format!("http://{}/stats", self.addr))
            .send()
            .await
            .expect("failed to query stats")
            .json()
            .await
            .expect("failed to decode stats response")
    }

    pub async fn liveness(&self) -> reqwest::StatusCode {
        self.client
            .get(format!("http://{}/_liveness", self.addr))
            .send()
            .await
            .expect("failed to query liveness")
            .status()
    }

    /// Polls /stats until the consumer has accounted for `expected`
    /// events (unique + duplicates together) or a timeout elapses.
    pub async fn wait_for_processed(&self, expected: u64) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stats = self.stats().await;
            let processed = stats["unique_processed"].as_u64().unwrap_or(0)
                + stats["duplicate_dropped"].as_u64().unwrap_or(0);
            if processed >= expected {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                bail!("consumer did not process {expected} events in time: {stats}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Graceful shutdown, waiting for the queue drain to complete.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            _ = shutdown.send(());
        }
        let _unused = self.join.await;
    }
}
