//! Host load sampling behind a trait seam so tests can script it

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sysinfo::System;

/// Source of the load figure a worker compares against its threshold
pub trait LoadSampler: Send + Sync {
    fn sample(&self) -> f64;
}

/// One-minute system load average of the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoad;

impl LoadSampler for SystemLoad {
    fn sample(&self) -> f64 {
        System::load_average().one
    }
}

/// A load value set by the caller.
///
/// Clones share the value, so a test can keep one handle and change the
/// load seen by a worker that owns another.
#[derive(Debug, Clone)]
pub struct FixedLoad {
    bits: Arc<AtomicU64>,
}

impl FixedLoad {
    pub fn new(load: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(load.to_bits())),
        }
    }

    pub fn set(&self, load: f64) {
        self.bits.store(load.to_bits(), Ordering::Relaxed);
    }
}

impl LoadSampler for FixedLoad {
    fn sample(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}
