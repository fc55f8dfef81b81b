use crate::model::Endpoint;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// What the coordinator knows about one registered worker
#[derive(Debug, Clone, PartialEq)]
struct WorkerEntry {
    endpoint: Endpoint,
    /// Connectivity failures since the last successful exchange
    consecutive_failures: u32,
    last_seen: DateTime<Utc>,
}

/// Insertion-ordered set of workers with probe-and-evict liveness.
///
/// Only connectivity failures count towards eviction; a worker that
/// answered, even with a forced fault, is alive.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    entries: Vec<WorkerEntry>,
    evict_after: u32,
}

impl WorkerRegistry {
    pub fn new(evict_after: u32) -> Self {
        Self {
            entries: Vec::new(),
            evict_after: evict_after.max(1),
        }
    }

    /// Add a worker, or refresh it if it is already known
    pub fn register(&mut self, endpoint: Endpoint) {
        let now = Utc::now();
        match self.entries.iter_mut().find(|e| e.endpoint == endpoint) {
            Some(entry) => {
                debug!("Worker {} re-registered", endpoint);
                entry.consecutive_failures = 0;
                entry.last_seen = now;
            }
            None => {
                info!("Registered worker {}", endpoint);
                self.entries.push(WorkerEntry {
                    endpoint,
                    consecutive_failures: 0,
                    last_seen: now,
                });
            }
        }
    }

    /// Registered endpoints in registration order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.entries.iter().map(|e| e.endpoint.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.entries.iter().any(|e| &e.endpoint == endpoint)
    }

    pub fn record_success(&mut self, endpoint: &Endpoint) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.endpoint == endpoint) {
            entry.consecutive_failures = 0;
            entry.last_seen = Utc::now();
        }
    }

    /// Count a connectivity failure; returns true if the worker was evicted
    pub fn record_failure(&mut self, endpoint: &Endpoint) -> bool {
        let Some(index) = self.entries.iter().position(|e| &e.endpoint == endpoint) else {
            return false;
        };

        let entry = &mut self.entries[index];
        entry.consecutive_failures += 1;
        if entry.consecutive_failures < self.evict_after {
            debug!(
                "Worker {} failed {} time(s) in a row",
                endpoint, entry.consecutive_failures
            );
            return false;
        }

        warn!(
            "Evicting worker {} after {} consecutive connectivity failures (last seen {})",
            endpoint,
            entry.consecutive_failures,
            entry.last_seen.format("%H:%M:%S")
        );
        self.entries.remove(index);
        true
    }
}
