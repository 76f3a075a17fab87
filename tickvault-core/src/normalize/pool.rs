//! Parallel, order-preserving normalization.
//!
//! The pool is a private rayon `ThreadPool` so normalization never competes
//! with, or resizes, the global pool. `par_iter().map().collect()` keeps the
//! input order whatever order the workers finish in.

use super::{transform_for, NormalizedTable};
use crate::error::{ConfigError, NormalizeError};
use crate::fetch::RawPayload;
use crate::vendor::VendorKind;
use rayon::prelude::*;
use tracing::debug;

pub struct NormalizationPool {
    pool: rayon::ThreadPool,
}

impl NormalizationPool {
    /// Build a pool with `workers` threads; 0 picks one per CPU.
    pub fn new(workers: usize) -> Result<Self, NormalizeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tickvault-normalize-{i}"))
            .build()
            .map_err(|e| NormalizeError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Normalize every payload; `output[i]` belongs to `payloads[i]`.
    ///
    /// Blocks the calling thread until all workers are done.
    pub fn normalize_many(
        &self,
        kind: VendorKind,
        payloads: &[RawPayload],
    ) -> Vec<Result<NormalizedTable, NormalizeError>> {
        let transform = transform_for(kind);
        debug!(
            vendor = %kind,
            payloads = payloads.len(),
            workers = self.workers(),
            "normalizing"
        );
        self.pool
            .install(|| payloads.par_iter().map(transform).collect())
    }

    /// Like [`normalize_many`](Self::normalize_many) with the vendor given by
    /// name. An unknown name fails before any work is dispatched.
    pub fn normalize_many_by_name(
        &self,
        vendor: &str,
        payloads: &[RawPayload],
    ) -> Result<Vec<Result<NormalizedTable, NormalizeError>>, ConfigError> {
        let kind: VendorKind = vendor.parse()?;
        Ok(self.normalize_many(kind, payloads))
    }
}
