//! Common test utilities: an in-process cluster on loopback ports

#![allow(dead_code)]

use distsort::client::SubmitClient;
use distsort::config::{BackoffConfig, ClientConfig, CoordinatorConfig, NetworkConfig, WorkerConfig};
use distsort::coordinator::CoordinatorServer;
use distsort::model::{Batch, Endpoint, Record};
use distsort::protocol::{PeerTransport, TcpTransport};
use distsort::stats::{CoordinatorStats, StatsSnapshot, WorkerStats};
use distsort::worker::{FixedLoad, WorkerServer};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub fn network() -> NetworkConfig {
    NetworkConfig {
        connect_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn transport() -> TcpTransport {
    let network = network();
    TcpTransport::new(network.connect_timeout, network.request_timeout)
}

/// Coordinator settings that fail fast
pub fn quick_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        bind: "127.0.0.1:0".to_string(),
        max_attempts: 2,
        max_sweeps: 2,
        evict_after: 100,
        backoff: BackoffConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        },
        network: network(),
    }
}

/// How one test worker behaves
#[derive(Clone)]
pub struct WorkerProfile {
    pub failure_probability: f64,
    pub load_threshold: f64,
    pub load: FixedLoad,
}

impl WorkerProfile {
    /// Never fails, never migrates
    pub fn reliable() -> Self {
        Self {
            failure_probability: 0.0,
            load_threshold: f64::INFINITY,
            load: FixedLoad::new(0.0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failure_probability: 1.0,
            ..Self::reliable()
        }
    }

    /// Reports `load` against a threshold of 1.0
    pub fn loaded(load: f64) -> Self {
        Self {
            failure_probability: 0.0,
            load_threshold: 1.0,
            load: FixedLoad::new(load),
        }
    }
}

/// Coordinator plus workers, each serving on its own task
pub struct TestCluster {
    pub coordinator: Endpoint,
    pub workers: Vec<Endpoint>,
    pub temp_dir: TempDir,
    tasks: Vec<JoinHandle<()>>,
}

impl TestCluster {
    pub async fn start(workers: Vec<WorkerProfile>) -> Self {
        Self::start_with(quick_coordinator_config(), workers).await
    }

    pub async fn start_with(config: CoordinatorConfig, profiles: Vec<WorkerProfile>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let server = CoordinatorServer::bind(config).await.unwrap();
        let coordinator = server.endpoint().clone();
        let mut tasks = vec![tokio::spawn(async move {
            server.run(std::future::pending()).await.unwrap();
        })];

        let mut cluster = Self {
            coordinator,
            workers: Vec::new(),
            temp_dir,
            tasks: Vec::new(),
        };
        for profile in profiles {
            let (endpoint, task) = cluster.spawn_worker(profile).await;
            cluster.workers.push(endpoint);
            tasks.push(task);
            // Registration order is the order workers are started in
            cluster.wait_for_workers(cluster.workers.len()).await;
        }
        cluster.tasks = tasks;
        cluster
    }

    async fn spawn_worker(&self, profile: WorkerProfile) -> (Endpoint, JoinHandle<()>) {
        let index = self.workers.len();
        let config = WorkerConfig {
            coordinator: self.coordinator.address(),
            bind: "127.0.0.1:0".to_string(),
            advertise_host: None,
            failure_probability: profile.failure_probability,
            load_threshold: profile.load_threshold,
            artifact_path: self.temp_dir.path().join(format!("worker-{index}.sorted")),
            network: network(),
        };
        let server = WorkerServer::bind_with(&config, Arc::new(transport()), Box::new(profile.load))
            .await
            .unwrap();
        let endpoint = server.endpoint().clone();
        let task = tokio::spawn(async move {
            server.run(std::future::pending()).await.unwrap();
        });
        (endpoint, task)
    }

    /// Poll the coordinator until `n` workers answer its stats refresh
    pub async fn wait_for_workers(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if self.coordinator_stats().await.workers.len() >= n {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "workers never registered"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn client(&self) -> SubmitClient {
        let config = ClientConfig {
            coordinator: self.coordinator.address(),
            connect_timeout: Duration::from_millis(300),
            submit_timeout: Duration::from_secs(30),
        };
        SubmitClient::new(&config).unwrap()
    }

    pub async fn coordinator_stats(&self) -> CoordinatorStats {
        match transport().fetch_stats(&self.coordinator).await.unwrap() {
            StatsSnapshot::Coordinator(stats) => stats,
            other => panic!("coordinator answered as {other:?}"),
        }
    }

    pub async fn worker_stats(&self, index: usize) -> WorkerStats {
        match transport().fetch_stats(&self.workers[index]).await.unwrap() {
            StatsSnapshot::Worker(stats) => stats,
            other => panic!("worker answered as {other:?}"),
        }
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub fn batch(keys: &[&str]) -> Batch {
    Batch::from_records(
        "job",
        keys.iter().map(|k| Record::parse(k).unwrap()).collect(),
    )
}

pub fn texts(batch: &Batch) -> Vec<&str> {
    batch.records().iter().map(Record::text).collect()
}

/// An endpoint nothing listens on
pub async fn dead_endpoint() -> Endpoint {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::from(listener.local_addr().unwrap());
    drop(listener);
    endpoint
}
