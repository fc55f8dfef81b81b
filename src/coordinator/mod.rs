//! Coordinator role: worker registry and map/reduce orchestration
//!
//! ```text
//! Sort(batch) ─▶ attempt 1..=R
//!                  │
//!                  ├─ partition over |registry| workers
//!                  ├─ map: round-robin Sort, retry on next worker,
//!                  │       at most max_sweeps registry passes
//!                  ├─ reduce: random live worker merges all partitions
//!                  ├─ verify order and length, seal sorted flag
//!                  └─ refresh stats from reachable workers
//!                fail ─▶ back off, next attempt
//! ```

mod map;
mod orchestrator;
mod partition;
mod registry;
mod server;

pub use map::map_partitions;
pub use orchestrator::Coordinator;
pub use partition::partition;
pub use registry::WorkerRegistry;
pub use server::CoordinatorServer;
