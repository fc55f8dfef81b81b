use super::registry::WorkerRegistry;
use crate::error::{DistSortError, Result};
use crate::model::{Batch, Endpoint};
use crate::protocol::PeerTransport;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Whether a worker's reply is an acceptable sort of `partition`
fn is_acceptable(partition: &Batch, reply: &Batch) -> bool {
    reply.is_verified_sorted() && reply.len() == partition.len()
}

/// Next worker in rotation that is still registered
fn next_live_worker(
    workers: &[Endpoint],
    registry: &WorkerRegistry,
    cursor: &mut usize,
) -> Option<Endpoint> {
    for _ in 0..workers.len() {
        let candidate = &workers[*cursor % workers.len()];
        *cursor += 1;
        if registry.contains(candidate) {
            return Some(candidate.clone());
        }
    }
    None
}

/// Have every partition sorted by some worker.
///
/// Partitions go out round-robin in registry order, each `Sort` carrying
/// the registry so the worker may migrate. A partition that comes back
/// missing, unsorted or short is retried on the next worker. Each partition
/// gets at most `max_sweeps` passes over the registry; a partition that
/// uses them up fails the phase. Sorted partitions are returned in
/// partition order.
pub async fn map_partitions(
    transport: &dyn PeerTransport,
    registry: &mut WorkerRegistry,
    partitions: Vec<Batch>,
    max_sweeps: u32,
) -> Result<Vec<Batch>> {
    let workers = registry.endpoints();
    if workers.is_empty() {
        return Err(DistSortError::NoWorkers);
    }

    let max_tries = workers.len() * max_sweeps as usize;
    let mut sorted: Vec<Option<Batch>> = vec![None; partitions.len()];
    let mut pending: VecDeque<(usize, Batch, usize)> = partitions
        .into_iter()
        .enumerate()
        .map(|(index, partition)| (index, partition, 0))
        .collect();
    let mut cursor = 0;

    while let Some((index, partition, tries)) = pending.pop_front() {
        if tries >= max_tries {
            warn!(
                "'{}' still unsorted after {} tries, giving up on this phase",
                partition.name(),
                tries
            );
            pending.push_front((index, partition, tries));
            break;
        }
        let Some(worker) = next_live_worker(&workers, registry, &mut cursor) else {
            pending.push_front((index, partition, tries));
            break;
        };

        debug!(
            "Dispatching '{}' ({} records) to {}",
            partition.name(),
            partition.len(),
            worker
        );
        match transport.sort(&worker, &partition, &workers).await {
            Ok(Some(reply)) if is_acceptable(&partition, &reply) => {
                registry.record_success(&worker);
                sorted[index] = Some(reply);
                continue;
            }
            Ok(Some(_)) => {
                registry.record_success(&worker);
                warn!("{} returned '{}' unsorted or incomplete", worker, partition.name());
            }
            Ok(None) => {
                registry.record_success(&worker);
                info!("{} returned no result for '{}'", worker, partition.name());
            }
            Err(e) => {
                if e.is_connectivity() {
                    registry.record_failure(&worker);
                }
                warn!("Sorting '{}' on {} failed: {}", partition.name(), worker, e);
            }
        }
        pending.push_front((index, partition, tries + 1));
    }

    if !pending.is_empty() {
        return Err(DistSortError::MapPhaseIncomplete {
            remaining: pending.len(),
            sweeps: max_sweeps,
        });
    }

    Ok(sorted.into_iter().flatten().collect())
}
