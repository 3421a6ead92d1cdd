//! Explicit configuration threaded through tensor construction.
//!
//! A [`Config`] bundles the symmetry, the dense backend used for permutes
//! and matrix products, the tensordot execution policy, and an optional
//! cache of fused-leg layouts. Cloning a config shares its cache.
//!
//! # Example
//!
//! ```
//! use symtensors::config::{BackendKind, Config, TensordotPolicy};
//! use symtensors::symmetry::Symmetry;
//!
//! let config = Config::new(Symmetry::u1())
//!     .with_backend(BackendKind::Generic)
//!     .with_policy(TensordotPolicy::Direct)
//!     .without_cache();
//! assert_eq!(config.sym().nsym(), 1);
//! assert!(!config.has_cache());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::trace;

use crate::error::TensorError;
use crate::fusion::{FusedLeg, HardFusion};
use crate::symmetry::Symmetry;

/// Dense kernels used for permutes and matrix products.
///
/// Factorizations (SVD, eigh, QR) always run through faer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// faer matmul and a stride-walking permute.
    #[default]
    Faer,
    /// Naive loops, useful for debugging and cross-checks.
    Generic,
}

/// How tensordot executes the block products.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TensordotPolicy {
    /// Merge when more or fewer than one native axis is contracted, or the
    /// symmetry is trivial; direct otherwise.
    #[default]
    Hybrid,
    /// One matrix product per effective charge sector.
    Merge,
    /// One matrix product per matching pair of blocks.
    Direct,
}

/// Memoized fused-leg layouts keyed by hard-fusion descriptor.
///
/// Pure: results never depend on whether an entry was cached.
#[derive(Debug, Default)]
pub struct FusionCache {
    layouts: Mutex<HashMap<HardFusion, Arc<FusedLeg>>>,
}

impl FusionCache {
    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.layouts.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the cache holds no layout.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached layouts.
    pub fn clear(&self) {
        if let Ok(mut m) = self.layouts.lock() {
            m.clear();
        }
    }
}

/// Configuration shared by tensors that may be combined.
#[derive(Clone, Debug)]
pub struct Config {
    sym: Symmetry,
    backend: BackendKind,
    policy: TensordotPolicy,
    cache: Option<Arc<FusionCache>>,
}

impl Default for Config {
    /// No symmetry, faer backend, hybrid policy, cache enabled.
    fn default() -> Self {
        Self::new(Symmetry::none())
    }
}

impl Config {
    /// Configuration for `sym` with default backend and policy.
    pub fn new(sym: Symmetry) -> Self {
        Self {
            sym,
            backend: BackendKind::default(),
            policy: TensordotPolicy::default(),
            cache: Some(Arc::new(FusionCache::default())),
        }
    }

    /// Select the dense backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Select the tensordot policy.
    pub fn with_policy(mut self, policy: TensordotPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable layout caching.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    #[inline]
    pub fn sym(&self) -> &Symmetry {
        &self.sym
    }

    #[inline]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    #[inline]
    pub fn policy(&self) -> TensordotPolicy {
        self.policy
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// The layout cache, if enabled.
    pub fn cache(&self) -> Option<&FusionCache> {
        self.cache.as_deref()
    }

    /// Layout of a hard-fused leg, from the cache when possible.
    pub fn fused_leg(&self, hf: &HardFusion) -> Arc<FusedLeg> {
        let Some(cache) = &self.cache else {
            return Arc::new(hf.layout(&self.sym));
        };
        if let Ok(map) = cache.layouts.lock() {
            if let Some(layout) = map.get(hf) {
                return Arc::clone(layout);
            }
        }
        trace!("fused-leg layout cache miss ({} legs)", hf.s().len());
        let layout = Arc::new(hf.layout(&self.sym));
        if let Ok(mut map) = cache.layouts.lock() {
            map.insert(hf.clone(), Arc::clone(&layout));
        }
        layout
    }

    /// Check that two configurations describe the same symmetry.
    pub fn check_compatible(&self, other: &Config) -> Result<(), TensorError> {
        if self.sym != other.sym {
            return Err(TensorError::SymmetryMismatch {
                a: self.sym.to_string(),
                b: other.sym.to_string(),
            });
        }
        Ok(())
    }
}
