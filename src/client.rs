//! Submission client: load a file, have the cluster sort it, write it back

use crate::config::ClientConfig;
use crate::error::{DistSortError, Result};
use crate::model::{io, Batch, Endpoint};
use crate::protocol::{PeerTransport, TcpTransport};
use crate::stats::StatsSnapshot;
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub struct SubmitClient {
    coordinator: Endpoint,
    transport: TcpTransport,
}

impl SubmitClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coordinator: config.coordinator_endpoint()?,
            transport: TcpTransport::new(config.connect_timeout, config.submit_timeout),
        })
    }

    pub fn coordinator(&self) -> &Endpoint {
        &self.coordinator
    }

    /// Submit a batch and wait for the sorted result.
    ///
    /// The coordinator's "no result" answer becomes [`DistSortError::NoResult`];
    /// a result that is not in key order is refused.
    pub async fn submit(&self, batch: &Batch) -> Result<Batch> {
        let started = Instant::now();
        let reply = self.transport.sort(&self.coordinator, batch, &[]).await?;
        info!(
            "Map/reduce of {} records took {:.3}s",
            batch.len(),
            started.elapsed().as_secs_f64()
        );

        match reply {
            Some(sorted) if sorted.is_verified_sorted() && sorted.len() == batch.len() => {
                Ok(sorted)
            }
            Some(_) => Err(DistSortError::protocol(format!(
                "{} returned an unsorted or incomplete batch",
                self.coordinator
            ))),
            None => Err(DistSortError::NoResult {
                endpoint: self.coordinator.clone(),
            }),
        }
    }

    /// Sort the records of `input` into `output`
    pub async fn sort_file(&self, input: &Path, output: &Path) -> Result<Batch> {
        let batch = io::load_batch(input).await?;
        info!(
            "Submitting {} records from {} to {}",
            batch.len(),
            input.display(),
            self.coordinator
        );
        let sorted = self.submit(&batch).await?;
        io::write_batch(output, &sorted).await?;
        info!("Wrote sorted output to {}", output.display());
        Ok(sorted)
    }

    /// Fetch the stats of any process, coordinator or worker
    pub async fn fetch_stats(&self, target: &Endpoint) -> Result<StatsSnapshot> {
        self.transport.fetch_stats(target).await
    }
}
