use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::event::LogEvent;

/// Aggregate view served by `GET /stats`. `unique_processed` and
/// `topics` are rebuilt from the store on startup and stay accurate
/// across restarts; `received` and `duplicate_dropped` only count since
/// the last restart.
#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub uptime_seconds: f64,
    pub received: u64,
    pub unique_processed: u64,
    pub duplicate_dropped: u64,
    pub topics: Vec<String>,
}

struct ProjectionInner {
    events: Vec<LogEvent>,
    topics: HashSet<String>,
    received: u64,
    duplicate_dropped: u64,
    started_at: Instant,
}

/// The live, queryable set of unique events plus counters.
///
/// The consumer loop is the only writer; query handlers take brief
/// shared locks and observe a consistent, monotonically growing view
/// since appends happen one admitted event at a time.
#[derive(Clone)]
pub struct SharedProjection {
    inner: Arc<RwLock<ProjectionInner>>,
}

impl SharedProjection {
    pub fn new() -> SharedProjection {
        SharedProjection {
            inner: Arc::new(RwLock::new(ProjectionInner {
                events: Vec::new(),
                topics: HashSet::new(),
                received: 0,
                duplicate_dropped: 0,
                started_at: Instant::now(),
            })),
        }
    }

    /// Replaces the projection with the events loaded from the store.
    /// Transient counters restart at zero, a documented limitation.
    pub fn rehydrate(&self, events: Vec<LogEvent>) {
        let mut inner = self.write();
        inner.topics = events.iter().map(|e| e.topic.clone()).collect();
        inner.events = events;
        inner.received = 0;
        inner.duplicate_dropped = 0;
    }

    pub fn record_received(&self) {
        self.write().received += 1;
    }

    pub fn record_admitted(&self, event: LogEvent) {
        let mut inner = self.write();
        inner.topics.insert(event.topic.clone());
        inner.events.push(event);
    }

    pub fn record_duplicate(&self) {
        self.write().duplicate_dropped += 1;
    }

    /// Unique events in admission order, optionally restricted to one topic.
    pub fn events(&self, topic: Option<&str>) -> Vec<LogEvent> {
        let inner = self.read();
        match topic {
            Some(topic) => inner
                .events
                .iter()
                .filter(|event| event.topic == topic)
                .cloned()
                .collect(),
            None => inner.events.clone(),
        }
    }

    pub fn stats(&self) -> Stats {
        let inner = self.read();
        let mut topics: Vec<String> = inner.topics.iter().cloned().collect();
        topics.sort();
        Stats {
            uptime_seconds: inner.started_at.elapsed().as_secs_f64(),
            received: inner.received,
            unique_processed: inner.events.len() as u64,
            duplicate_dropped: inner.duplicate_dropped,
            topics,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ProjectionInner> {
        self.inner.read().expect("poisoned projection lock")
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProjectionInner> {
        self.inner.write().expect("poisoned projection lock")
    }
}

impl Default for SharedProjection {
    fn default() -> Self {
        Self::new()
    }
}
