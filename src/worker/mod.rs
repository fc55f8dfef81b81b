//! Worker role: local sorting, load-aware migration and reduction
//!
//! ```text
//!            Sort(batch, registry)
//!                    │
//!          load > threshold and ≥ 2 workers?
//!              │yes                 │no
//!              ▼                    │
//!   SortForPeer to each peer        │
//!   in registry order               │
//!     │first sorted reply  │none    │
//!     ▼                    ▼        ▼
//!   migration++     local sort (failure injection, artifact)
//! ```
//!
//! `SortForPeer` runs the local sort only while the worker's own load is
//! below threshold and never migrates further.

mod engine;
pub mod load;
pub mod merge;
mod server;

pub use engine::{is_forced_failure, WorkerNode};
pub use load::{FixedLoad, LoadSampler, SystemLoad};
pub use server::WorkerServer;
