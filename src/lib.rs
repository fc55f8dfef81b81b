//! # distsort
//!
//! Distributed external sort over a pool of worker processes.
//!
//! A coordinator splits a submitted batch of integer-keyed records into one
//! partition per registered worker, has each partition sorted (a loaded
//! worker may hand its partition to a less loaded peer), then asks one
//! worker to merge the sorted partitions into the final result.
//!
//! ## Usage
//!
//! ```bash
//! distsort coordinator --bind 127.0.0.1:4000
//! distsort worker --coordinator 127.0.0.1:4000 --failure-probability 0.1
//! distsort submit input.txt output.txt
//! distsort stats
//! ```
//!
//! ## Modules
//!
//! - `model` - Records, batches, endpoints and the line-oriented file format
//! - `protocol` - Framed request/response exchange and the peer transport
//! - `worker` - Local sort with failure injection, load-aware migration, merge
//! - `coordinator` - Worker registry, partitioning, map phase and retries
//! - `stats` - Worker and coordinator counters
//! - `client` - Submission client
//! - `config` - TOML configuration with environment overrides
//! - `error` - Error type with codes and recoverability classification
//! - `app` - Logging setup and fatal error reporting
pub mod app;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod protocol;
pub mod stats;
pub mod worker;

pub use error::{DistSortError, Result};
