use super::load::LoadSampler;
use super::merge;
use crate::config::WorkerConfig;
use crate::error::{DistSortError, ErrorCode, Result};
use crate::model::{io, Batch, Endpoint, Record};
use crate::protocol::{PeerTransport, Reply, Request, RequestHandler};
use crate::stats::{StatsSnapshot, WorkerStats};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a uniform draw in `[0, 1)` forces a failure at the given probability
pub fn is_forced_failure(draw: f64, failure_probability: f64) -> bool {
    draw >= 1.0 - failure_probability
}

/// Sort and reduce engine of one worker process
pub struct WorkerNode {
    endpoint: Endpoint,
    failure_probability: f64,
    load_threshold: f64,
    artifact_path: PathBuf,
    /// Time allowed for offering one batch around the peers
    migration_deadline: Duration,
    stats: WorkerStats,
    transport: Arc<dyn PeerTransport>,
    load: Box<dyn LoadSampler>,
}

impl WorkerNode {
    pub fn new(
        endpoint: Endpoint,
        config: &WorkerConfig,
        transport: Arc<dyn PeerTransport>,
        load: Box<dyn LoadSampler>,
    ) -> Self {
        Self {
            stats: WorkerStats::new(endpoint.clone()),
            endpoint,
            failure_probability: config.failure_probability,
            load_threshold: config.load_threshold,
            artifact_path: config.artifact_path.clone(),
            // Leaves the other half for the local fallback and the reply
            migration_deadline: config.network.request_timeout / 2,
            transport,
            load,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn sample_load(&mut self) -> f64 {
        self.stats.record_load(self.load.sample());
        self.stats.current_load
    }

    /// Sort a batch, offering it to peers first when this host is overloaded.
    ///
    /// Peers are tried in registry order, skipping this worker. The first
    /// one to hand back a sorted batch wins. With no taker before the
    /// migration deadline, or fewer than two registered workers, the batch
    /// is sorted here.
    pub async fn sort_with_registry(&mut self, batch: Batch, registry: &[Endpoint]) -> Option<Batch> {
        self.stats.record_task();
        let load = self.sample_load();

        if load > self.load_threshold && registry.len() > 1 {
            info!(
                "Load {:.2} exceeds threshold {:.2}, offering '{}' to peers",
                load,
                self.load_threshold,
                batch.name()
            );
            match tokio::time::timeout(self.migration_deadline, self.migrate(&batch, registry)).await
            {
                Ok(Some(sorted)) => {
                    self.stats.record_migration();
                    return Some(sorted);
                }
                Ok(None) => info!("No peer accepted '{}', sorting locally", batch.name()),
                Err(_) => warn!(
                    "Peers did not take '{}' within {:?}, sorting locally",
                    batch.name(),
                    self.migration_deadline
                ),
            }
        }

        self.sort_local(batch).await
    }

    async fn migrate(&self, batch: &Batch, registry: &[Endpoint]) -> Option<Batch> {
        for peer in registry.iter().filter(|peer| **peer != self.endpoint) {
            match self.transport.sort_for_peer(peer, batch).await {
                Ok(Some(sorted)) if sorted.is_verified_sorted() && sorted.len() == batch.len() => {
                    info!("Migrated '{}' to {}", batch.name(), peer);
                    return Some(sorted);
                }
                Ok(Some(_)) => warn!("{} returned '{}' unsorted", peer, batch.name()),
                Ok(None) => debug!("{} declined '{}'", peer, batch.name()),
                Err(e) => warn!("Could not migrate '{}' to {}: {}", batch.name(), peer, e),
            }
        }
        None
    }

    /// Sort in place, unless the failure injection fires first.
    ///
    /// A forced failure yields `None` and counts as a fault. Successful
    /// sorts are also written to the artifact path.
    pub async fn sort_local(&mut self, mut batch: Batch) -> Option<Batch> {
        if is_forced_failure(rand::random::<f64>(), self.failure_probability) {
            self.stats.record_fault();
            warn!("Forced failure while sorting '{}'", batch.name());
            return None;
        }

        batch.sort_in_place();
        debug!("Sorted '{}' ({} records)", batch.name(), batch.len());

        if let Err(e) = io::write_batch(&self.artifact_path, &batch).await {
            warn!("Failed to write sort artifact: {}", e);
        }
        Some(batch)
    }

    /// Local sort on behalf of a peer; declined while this host is loaded
    pub async fn sort_for_peer(&mut self, batch: Batch) -> Option<Batch> {
        self.stats.record_task();
        let load = self.sample_load();

        if load < self.load_threshold {
            self.sort_local(batch).await
        } else {
            info!(
                "Declining '{}' for a peer: load {:.2} is not below {:.2}",
                batch.name(),
                load,
                self.load_threshold
            );
            None
        }
    }

    pub fn reduce(&self, partitions: Vec<Batch>) -> Vec<Record> {
        debug!("Reducing {} partitions", partitions.len());
        merge::reduce(partitions)
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::Worker(self.stats.clone())
    }
}

#[async_trait]
impl RequestHandler for WorkerNode {
    fn role(&self) -> &'static str {
        "worker"
    }

    async fn handle(&mut self, request: Request) -> Result<Reply> {
        match request {
            Request::Sort { batch, registry } => {
                Ok(Reply::Batch(self.sort_with_registry(batch, &registry).await))
            }
            Request::SortForPeer { batch } => Ok(Reply::Batch(self.sort_for_peer(batch).await)),
            Request::Reduce { partitions } => Ok(Reply::Records(self.reduce(partitions))),
            Request::FetchStats => Ok(Reply::Stats(self.stats_snapshot())),
            Request::RegisterWorker { endpoint } => Err(DistSortError::protocol_with_code(
                ErrorCode::PROTOCOL_UNSUPPORTED_OPERATION,
                format!("a worker cannot register {endpoint}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::load::FixedLoad;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every peer it is asked to sort for and answers from a script
    #[derive(Default)]
    struct ScriptedPeers {
        asked: Mutex<Vec<Endpoint>>,
        accepting: Vec<Endpoint>,
        stalling: Vec<Endpoint>,
    }

    #[async_trait]
    impl PeerTransport for ScriptedPeers {
        async fn register(&self, _target: &Endpoint, _worker: &Endpoint) -> Result<()> {
            Ok(())
        }

        async fn sort(
            &self,
            _target: &Endpoint,
            _batch: &Batch,
            _registry: &[Endpoint],
        ) -> Result<Option<Batch>> {
            Ok(None)
        }

        async fn sort_for_peer(&self, target: &Endpoint, batch: &Batch) -> Result<Option<Batch>> {
            self.asked.lock().unwrap().push(target.clone());
            if self.stalling.contains(target) {
                std::future::pending::<()>().await;
            }
            if self.accepting.contains(target) {
                let mut sorted = batch.clone();
                sorted.sort_in_place();
                Ok(Some(sorted))
            } else {
                Ok(None)
            }
        }

        async fn reduce(&self, _target: &Endpoint, _partitions: &[Batch]) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }

        async fn fetch_stats(&self, target: &Endpoint) -> Result<StatsSnapshot> {
            Ok(StatsSnapshot::Worker(WorkerStats::new(target.clone())))
        }

        async fn probe(&self, _target: &Endpoint) -> bool {
            true
        }
    }

    fn me() -> Endpoint {
        Endpoint::new("127.0.0.1", 5001)
    }

    fn peer(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    fn batch(keys: &[&str]) -> Batch {
        Batch::from_records(
            "partition",
            keys.iter().map(|k| Record::parse(k).unwrap()).collect(),
        )
    }

    fn keys(batch: &Batch) -> Vec<i64> {
        batch.records().iter().map(Record::key).collect()
    }

    fn node(
        temp_dir: &TempDir,
        failure_probability: f64,
        load_threshold: f64,
        load: FixedLoad,
        peers: Arc<ScriptedPeers>,
    ) -> WorkerNode {
        let config = WorkerConfig {
            failure_probability,
            load_threshold,
            artifact_path: temp_dir.path().join("intermediate.sorted"),
            ..Default::default()
        };
        WorkerNode::new(me(), &config, peers, Box::new(load))
    }

    #[test]
    fn test_failure_boundary() {
        for draw in [0.0, 0.3, 0.999_999] {
            assert!(!is_forced_failure(draw, 0.0));
            assert!(is_forced_failure(draw, 1.0));
        }
        assert!(is_forced_failure(0.75, 0.25));
        assert!(!is_forced_failure(0.74, 0.25));
    }

    #[tokio::test]
    async fn test_zero_probability_never_fails() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(0.0), peers);

        for _ in 0..200 {
            let sorted = worker.sort_local(batch(&["3", "1", "2"])).await.unwrap();
            assert!(sorted.is_verified_sorted());
        }
        assert_eq!(worker.stats().faults, 0);
    }

    #[tokio::test]
    async fn test_certain_failure_always_returns_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 1.0, 1.0, FixedLoad::new(0.0), peers);

        for _ in 0..200 {
            assert!(worker.sort_local(batch(&["3", "1"])).await.is_none());
        }
        assert_eq!(worker.stats().faults, 200);
        assert!(!temp_dir.path().join("intermediate.sorted").exists());
    }

    #[tokio::test]
    async fn test_local_sort_writes_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(0.0), peers);

        worker.sort_local(batch(&["9", "-2", "4"])).await.unwrap();
        let artifact =
            std::fs::read_to_string(temp_dir.path().join("intermediate.sorted")).unwrap();
        assert_eq!(artifact, "-2\n4\n9\n");
    }

    #[tokio::test]
    async fn test_unwritable_artifact_does_not_fail_sort() {
        let temp_dir = TempDir::new().unwrap();
        let config = WorkerConfig {
            artifact_path: temp_dir.path().join("missing-dir").join("out"),
            ..Default::default()
        };
        let mut worker = WorkerNode::new(
            me(),
            &config,
            Arc::new(ScriptedPeers::default()),
            Box::new(FixedLoad::new(0.0)),
        );
        assert!(worker.sort_local(batch(&["2", "1"])).await.is_some());
    }

    #[tokio::test]
    async fn test_overloaded_worker_migrates_to_first_accepting_peer() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers {
            accepting: vec![peer(5003)],
            ..Default::default()
        });
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(4.0), peers.clone());

        let registry = vec![peer(5002), me(), peer(5003), peer(5004)];
        let sorted = worker
            .sort_with_registry(batch(&["5", "3", "1"]), &registry)
            .await
            .unwrap();

        assert_eq!(keys(&sorted), vec![1, 3, 5]);
        assert_eq!(*peers.asked.lock().unwrap(), vec![peer(5002), peer(5003)]);
        assert_eq!(worker.stats().migrations, 1);
        assert_eq!(worker.stats().tasks_seen, 1);
        // Migrated work is not written locally
        assert!(!temp_dir.path().join("intermediate.sorted").exists());
    }

    #[tokio::test]
    async fn test_no_taker_falls_back_to_local_sort() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(4.0), peers.clone());

        let registry = vec![me(), peer(5002), peer(5003)];
        let sorted = worker
            .sort_with_registry(batch(&["2", "1"]), &registry)
            .await
            .unwrap();

        assert_eq!(keys(&sorted), vec![1, 2]);
        assert_eq!(peers.asked.lock().unwrap().len(), 2);
        assert_eq!(worker.stats().migrations, 0);
    }

    #[tokio::test]
    async fn test_stalled_peers_cannot_hold_the_sort_past_the_deadline() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers {
            accepting: vec![peer(5003)],
            stalling: vec![peer(5002)],
            ..Default::default()
        });
        let mut config = WorkerConfig {
            load_threshold: 1.0,
            artifact_path: temp_dir.path().join("intermediate.sorted"),
            ..Default::default()
        };
        config.network.request_timeout = Duration::from_millis(200);
        let mut worker = WorkerNode::new(me(), &config, peers.clone(), Box::new(FixedLoad::new(4.0)));

        let registry = vec![me(), peer(5002), peer(5003)];
        let started = std::time::Instant::now();
        let sorted = worker
            .sort_with_registry(batch(&["3", "1", "2"]), &registry)
            .await
            .unwrap();

        assert!(started.elapsed() < config.network.request_timeout);
        assert_eq!(keys(&sorted), vec![1, 2, 3]);
        // The stalled peer blocked the accepting one behind it
        assert_eq!(*peers.asked.lock().unwrap(), vec![peer(5002)]);
        assert_eq!(worker.stats().migrations, 0);
        assert!(temp_dir.path().join("intermediate.sorted").exists());
    }

    #[tokio::test]
    async fn test_infinite_threshold_never_delegates() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers {
            accepting: vec![peer(5002)],
            ..Default::default()
        });
        let mut worker = node(&temp_dir, 0.0, f64::INFINITY, FixedLoad::new(1e9), peers.clone());

        let registry = vec![me(), peer(5002)];
        worker.sort_with_registry(batch(&["2", "1"]), &registry).await.unwrap();
        assert!(peers.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_worker_registry_sorts_locally() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(9.0), peers.clone());

        worker.sort_with_registry(batch(&["2", "1"]), &[me()]).await.unwrap();
        assert!(peers.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sort_for_peer_declines_when_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let load = FixedLoad::new(1.0);
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, load.clone(), peers);

        assert!(worker.sort_for_peer(batch(&["2", "1"])).await.is_none());

        load.set(0.5);
        let sorted = worker.sort_for_peer(batch(&["2", "1"])).await.unwrap();
        assert!(sorted.is_verified_sorted());

        let stats = worker.stats();
        assert_eq!(stats.tasks_seen, 2);
        assert_eq!(stats.load_samples, 2);
        assert!((stats.average_load - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_register_is_refused_by_workers() {
        let temp_dir = TempDir::new().unwrap();
        let peers = Arc::new(ScriptedPeers::default());
        let mut worker = node(&temp_dir, 0.0, 1.0, FixedLoad::new(0.0), peers);

        let err = worker
            .handle(Request::RegisterWorker { endpoint: peer(9) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PROTOCOL_UNSUPPORTED_OPERATION);

        let reply = worker.handle(Request::FetchStats).await.unwrap();
        assert!(matches!(reply, Reply::Stats(StatsSnapshot::Worker(_))));
    }
}
