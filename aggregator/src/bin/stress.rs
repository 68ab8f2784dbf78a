// Load generator: publishes a configurable mix of unique and duplicate
// events in batches, then prints the server's stats.

use std::time::{Duration, Instant};

use envconfig::Envconfig;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Envconfig)]
struct StressConfig {
    #[envconfig(default = "http://127.0.0.1:3000")]
    api_url: String,

    #[envconfig(default = "5000")]
    total_events: usize,

    #[envconfig(default = "0.2")]
    duplicate_percent: f64,

    #[envconfig(default = "100")]
    batch_size: usize,
}

const TOPICS: &[&str] = &["auth.prod", "payment.dev", "logs.staging"];

fn build_events(config: &StressConfig) -> Vec<Value> {
    let mut rng = rand::thread_rng();

    let num_duplicates = (config.total_events as f64 * config.duplicate_percent) as usize;
    let num_unique = config.total_events - num_duplicates;

    let mut events: Vec<Value> = (0..num_unique)
        .map(|_| {
            json!({
                "topic": TOPICS.choose(&mut rng).unwrap(),
                "event_id": Uuid::now_v7().to_string(),
                "source": "stress",
                "payload": {"seq": rng.gen::<u32>()},
            })
        })
        .collect();
    for _ in 0..num_duplicates {
        let replay = events[rng.gen_range(0..num_unique)].clone();
        events.push(replay);
    }
    events.shuffle(&mut rng);

    println!(
        "prepared {} events ({} unique, {} duplicates)",
        events.len(),
        num_unique,
        num_duplicates
    );
    events
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StressConfig::init_from_env()?;
    let client = reqwest::Client::new();

    println!("target: {}", config.api_url);
    let events = build_events(&config);

    let publish_url = format!("{}/publish", config.api_url);
    let started = Instant::now();
    let mut sent = 0;
    for batch in events.chunks(config.batch_size) {
        let response = client.post(&publish_url).json(&batch).send().await?;
        response.error_for_status_ref()?;
        sent += batch.len();
    }
    println!("published {} events in {:?}", sent, started.elapsed());

    // Let the consumer catch up before reading the totals
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats: Value = client
        .get(format!("{}/stats", config.api_url))
        .send()
        .await?
        .json()
        .await?;
    println!("server stats: {stats:#}");

    Ok(())
}
