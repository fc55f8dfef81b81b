//! Operational counters for workers and the coordinator
//!
//! Each worker owns its [`WorkerStats`] and mutates them from its request
//! loop. The coordinator never sees a live view: on every stats request it
//! fetches fresh copies from the workers it can reach and rebuilds a
//! [`CoordinatorStats`] from them.

use crate::model::Endpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-worker counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Worker these counters belong to
    pub endpoint: Endpoint,
    /// Most recent load sample
    pub current_load: f64,
    /// Running mean of every load sample taken
    pub average_load: f64,
    /// Number of load samples folded into the mean
    pub load_samples: u64,
    /// Sort and sort-for-peer requests received
    pub tasks_seen: u64,
    /// Sorts handed to a peer because of excess load
    pub migrations: u64,
    /// Forced (injected) sort failures
    pub faults: u64,
}

impl WorkerStats {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            current_load: 0.0,
            average_load: 0.0,
            load_samples: 0,
            tasks_seen: 0,
            migrations: 0,
            faults: 0,
        }
    }

    /// Fold a load sample into the current and average load.
    ///
    /// Non-finite samples (hosts without a load average) count as zero.
    pub fn record_load(&mut self, sample: f64) {
        let sample = if sample.is_finite() { sample } else { 0.0 };
        self.current_load = sample;
        self.load_samples += 1;
        self.average_load += (sample - self.average_load) / self.load_samples as f64;
    }

    pub fn record_task(&mut self) {
        self.tasks_seen += 1;
    }

    pub fn record_migration(&mut self) {
        self.migrations += 1;
    }

    pub fn record_fault(&mut self) {
        self.faults += 1;
    }
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  :: Worker Stats {} ::", self.endpoint)?;
        writeln!(f, ". current load         = {:.2}", self.current_load)?;
        writeln!(f, ". average load         = {:.2}", self.average_load)?;
        writeln!(f, ". number of tasks seen = {}", self.tasks_seen)?;
        writeln!(f, ". number of migrations = {}", self.migrations)?;
        writeln!(f, ". number of faults     = {}", self.faults)
    }
}

/// Aggregate counters, rebuilt on each stats request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Sort submissions accepted since startup
    pub sort_requests: u64,
    /// Faults summed over the gathered worker snapshots
    pub faults: u64,
    /// Mean current load over the gathered worker snapshots
    pub average_load: f64,
    /// Snapshots from every worker that answered
    pub workers: Vec<WorkerStats>,
    /// When the snapshots were gathered
    pub gathered_at: Option<DateTime<Utc>>,
}

impl CoordinatorStats {
    /// Rebuild the aggregate from freshly gathered worker snapshots
    pub fn rebuild(sort_requests: u64, workers: Vec<WorkerStats>) -> Self {
        let faults = workers.iter().map(|w| w.faults).sum();
        let average_load = if workers.is_empty() {
            0.0
        } else {
            workers.iter().map(|w| w.current_load).sum::<f64>() / workers.len() as f64
        };

        Self {
            sort_requests,
            faults,
            average_load,
            workers,
            gathered_at: Some(Utc::now()),
        }
    }

    /// Total migrations across every gathered worker
    pub fn total_migrations(&self) -> u64 {
        self.workers.iter().map(|w| w.migrations).sum()
    }
}

impl fmt::Display for CoordinatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " :: Coordinator Stats ::")?;
        writeln!(
            f,
            ". total number of requests since startup = {}",
            self.sort_requests
        )?;
        writeln!(f, ". total number of faults (all workers)  = {}", self.faults)?;
        writeln!(
            f,
            ". average load over all workers          = {:.2}",
            self.average_load
        )?;
        writeln!(
            f,
            ". total number of job migrations         = {}",
            self.total_migrations()
        )?;
        for worker in &self.workers {
            write!(f, "{worker}")?;
        }
        Ok(())
    }
}

/// Stats answer to a `FetchStats` request, tagged by the responder's role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StatsSnapshot {
    Worker(WorkerStats),
    Coordinator(CoordinatorStats),
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsSnapshot::Worker(stats) => stats.fmt(f),
            StatsSnapshot::Coordinator(stats) => stats.fmt(f),
        }
    }
}
