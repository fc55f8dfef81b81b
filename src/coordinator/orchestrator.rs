use super::map::map_partitions;
use super::partition::partition;
use super::registry::WorkerRegistry;
use crate::config::CoordinatorConfig;
use crate::error::{DistSortError, ErrorCode, Result};
use crate::model::{Batch, Endpoint};
use crate::protocol::{PeerTransport, Reply, Request, RequestHandler};
use crate::stats::{CoordinatorStats, StatsSnapshot};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Map/reduce orchestration and the worker registry it runs over
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: WorkerRegistry,
    transport: Arc<dyn PeerTransport>,
    stats: CoordinatorStats,
    sort_requests: u64,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            registry: WorkerRegistry::new(config.evict_after),
            config,
            transport,
            stats: CoordinatorStats::default(),
            sort_requests: 0,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn register_worker(&mut self, endpoint: Endpoint) {
        self.registry.register(endpoint);
    }

    /// Stats as of the last refresh
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Sort a submitted batch across the worker pool.
    ///
    /// Each attempt partitions over the current registry, maps, then
    /// reduces on a random live worker. Failed attempts back off and retry
    /// up to the configured bound. The input batch is never modified.
    pub async fn accept_batch_for_sort(&mut self, batch: &Batch) -> Result<Batch> {
        self.sort_requests += 1;
        let attempts = self.config.max_attempts;
        let mut last = None;

        for attempt in 1..=attempts {
            match self.map_reduce(batch).await {
                Ok(sorted) => {
                    info!(
                        "Sorted '{}' ({} records) on attempt {}/{}",
                        batch.name(),
                        sorted.len(),
                        attempt,
                        attempts
                    );
                    self.gather_stats().await;
                    return Ok(sorted);
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    } else {
                        error!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    }
                    last = Some(Box::new(e));
                }
            }

            if attempt < attempts {
                let delay = self.config.backoff.delay_for(attempt);
                debug!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(DistSortError::RetriesExhausted { attempts, last })
    }

    async fn map_reduce(&mut self, batch: &Batch) -> Result<Batch> {
        if self.registry.is_empty() {
            return Err(DistSortError::NoWorkers);
        }

        let partitions = partition(batch, self.registry.len());
        debug!(
            "Split '{}' into {} partitions",
            batch.name(),
            partitions.len()
        );
        let sorted = map_partitions(
            self.transport.as_ref(),
            &mut self.registry,
            partitions,
            self.config.max_sweeps,
        )
        .await?;

        let reducer = self.pick_reducer().await?;
        info!("Reducing {} partitions on {}", sorted.len(), reducer);
        let records = match self.transport.reduce(&reducer, &sorted).await {
            Ok(records) => {
                self.registry.record_success(&reducer);
                records
            }
            Err(e) => {
                if e.is_connectivity() {
                    self.registry.record_failure(&reducer);
                }
                return Err(e);
            }
        };

        if records.len() != batch.len() {
            return Err(DistSortError::ReduceRejected {
                endpoint: reducer,
                reason: format!("returned {} of {} records", records.len(), batch.len()),
            });
        }
        let mut result = Batch::from_records(batch.name(), records);
        if !result.seal_sorted() {
            return Err(DistSortError::ReduceRejected {
                endpoint: reducer,
                reason: "records are out of key order".to_string(),
            });
        }
        Ok(result)
    }

    /// Registered workers that accept a connection right now
    async fn live_workers(&mut self) -> Vec<Endpoint> {
        let mut alive = Vec::new();
        for endpoint in self.registry.endpoints() {
            if self.transport.probe(&endpoint).await {
                alive.push(endpoint);
            } else {
                self.registry.record_failure(&endpoint);
            }
        }
        alive
    }

    async fn pick_reducer(&mut self) -> Result<Endpoint> {
        let mut alive = self.live_workers().await;
        if alive.is_empty() {
            return Err(DistSortError::NoWorkers);
        }
        let index = rand::rng().random_range(0..alive.len());
        Ok(alive.swap_remove(index))
    }

    /// Fetch fresh stats from every reachable worker and rebuild the aggregate
    pub async fn gather_stats(&mut self) -> CoordinatorStats {
        let mut snapshots = Vec::new();
        for endpoint in self.live_workers().await {
            match self.transport.fetch_stats(&endpoint).await {
                Ok(StatsSnapshot::Worker(stats)) => {
                    self.registry.record_success(&endpoint);
                    snapshots.push(stats);
                }
                Ok(StatsSnapshot::Coordinator(_)) => {
                    warn!("{} answered a stats request as a coordinator", endpoint);
                }
                Err(e) => {
                    if e.is_connectivity() {
                        self.registry.record_failure(&endpoint);
                    }
                    warn!("Could not fetch stats from {}: {}", endpoint, e);
                }
            }
        }

        self.stats = CoordinatorStats::rebuild(self.sort_requests, snapshots);
        self.stats.clone()
    }
}

#[async_trait]
impl RequestHandler for Coordinator {
    fn role(&self) -> &'static str {
        "coordinator"
    }

    async fn handle(&mut self, request: Request) -> Result<Reply> {
        match request {
            Request::Sort { batch, .. } => match self.accept_batch_for_sort(&batch).await {
                Ok(sorted) => Ok(Reply::Batch(Some(sorted))),
                Err(e) => {
                    error!("Unable to sort '{}': {}", batch.name(), e);
                    Ok(Reply::Batch(None))
                }
            },
            Request::RegisterWorker { endpoint } => {
                self.register_worker(endpoint);
                Ok(Reply::Nothing)
            }
            Request::FetchStats => Ok(Reply::Stats(StatsSnapshot::Coordinator(
                self.gather_stats().await,
            ))),
            other => Err(DistSortError::protocol_with_code(
                ErrorCode::PROTOCOL_UNSUPPORTED_OPERATION,
                format!("the coordinator does not serve {}", other.envelope()),
            )),
        }
    }
}
