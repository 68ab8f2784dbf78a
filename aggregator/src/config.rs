use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    #[envconfig(default = "data/dedup_store.db")]
    pub database_path: String,

    // Producers get a 503 once this many events are waiting
    #[envconfig(default = "100000")]
    pub queue_capacity: usize,

    #[envconfig(default = "1000")]
    pub consumer_failure_backoff_ms: u64,

    #[envconfig(default = "5")]
    pub drain_timeout_seconds: u64,

    #[envconfig(default = "30")]
    pub consumer_liveness_deadline_seconds: u64,

    // Used for integration tests
    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}
