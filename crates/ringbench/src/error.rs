//! Error types for ringbench.
//!
//! Two fatal categories exist at startup: [`ConfigError`] (detected before any
//! ring or pool is built) and [`ResourceExhausted`]. Once the loops are
//! running, short transfers are backpressure, not errors; the only runtime
//! failure is [`BenchError::Stalled`] under the bounded idle strategy.

use crate::traffic::Role;
use thiserror::Error;

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `--mode` was not given.
    #[error("missing required --mode")]
    MissingMode,

    /// `--mode` named no known traffic pattern.
    #[error("unknown mode '{0}' (expected sink, fw or fw-copy)")]
    UnknownMode(String),

    /// Batch size outside `[1, max]`.
    #[error("batch size {value} out of range [1, {max}]")]
    BatchSizeOutOfRange {
        /// Requested batch size.
        value: usize,
        /// Largest accepted batch size.
        max: usize,
    },

    /// Message target smaller than one batch.
    #[error("message target {msgs} is below batch size {batch_size}")]
    TargetBelowBatch {
        /// Requested message target.
        msgs: u64,
        /// Requested batch size.
        batch_size: usize,
    },

    /// Ring capacity is not a non-zero power of two.
    #[error("ring size {0} is not a power of two")]
    RingSizeNotPowerOfTwo(usize),

    /// A batch would not fit into an empty ring.
    #[error("batch size {batch_size} exceeds ring size {ring_size}")]
    BatchExceedsRing {
        /// Requested batch size.
        batch_size: usize,
        /// Configured ring capacity.
        ring_size: usize,
    },

    /// The pool cannot supply every batch the mode acquires.
    #[error("pool of {pool_size} elements cannot supply {required} handles")]
    PoolTooSmall {
        /// Configured pool element count.
        pool_size: usize,
        /// Handles the selected mode acquires at setup.
        required: usize,
    },

    /// Zero-byte pool elements.
    #[error("element size must be non-zero")]
    ZeroElementSize,

    /// A flag value that does not parse.
    #[error("invalid value '{value}' for {flag}")]
    InvalidValue {
        /// The flag being parsed.
        flag: &'static str,
        /// The offending value.
        value: String,
    },

    /// A flag given without its value.
    #[error("missing value for {0}")]
    MissingValue(&'static str),

    /// An argument that is not a known flag.
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    /// Producer and forwarder asked for the same core.
    #[error("producer and forwarder must use distinct cores (both {0})")]
    SameCore(usize),
}

/// Returned by [`ObjectPool::acquire_bulk`](crate::ObjectPool::acquire_bulk)
/// when fewer handles are free than requested. The pool is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pool exhausted: requested {requested}, {available} available")]
pub struct PoolExhausted {
    /// Number of handles requested.
    pub requested: usize,
    /// Number of handles free at the time of the request.
    pub available: usize,
}

/// A startup resource could not be obtained.
#[derive(Debug, Error)]
pub enum ResourceExhausted {
    /// Ring slot storage could not be allocated.
    #[error("cannot allocate ring of {capacity} slots")]
    Ring {
        /// Requested ring capacity.
        capacity: usize,
    },

    /// Pool storage could not be allocated.
    #[error("cannot allocate pool of {count} x {element_size} bytes")]
    Pool {
        /// Requested element count.
        count: usize,
        /// Requested element size in bytes.
        element_size: usize,
    },

    /// Setup could not acquire a batch from the pool.
    #[error(transparent)]
    PoolBatch(#[from] PoolExhausted),

    /// Not enough processor cores to place both loops.
    #[error("not enough execution units: need {required}, found {available}")]
    ExecutionUnits {
        /// Cores the run needs.
        required: usize,
        /// Cores reported by the platform.
        available: usize,
    },

    /// An explicitly requested core is not available to this process.
    #[error("core {0} is not available")]
    CoreUnavailable(usize),

    /// The OS refused to pin a worker thread to its core.
    #[error("cannot pin {role} thread to core {core}")]
    Pin {
        /// Role of the thread that could not be pinned.
        role: Role,
        /// Core it was assigned.
        core: usize,
    },

    /// The OS refused to start a worker thread.
    #[error("cannot spawn {role} thread: {source}")]
    Spawn {
        /// Role the thread was going to run.
        role: Role,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error of a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Configuration rejected before any resource was created.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A startup resource could not be obtained.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[from] ResourceExhausted),

    /// A loop gave up under the bounded idle strategy.
    #[error("{role} stalled at {progress}/{target} messages")]
    Stalled {
        /// Role of the loop that gave up.
        role: Role,
        /// Messages the loop had moved when it gave up.
        progress: u64,
        /// The loop's target.
        target: u64,
    },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(Role),
}

impl BenchError {
    /// Process exit code for this error: 2 for configuration errors, 1 otherwise.
    #[inline]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<PoolExhausted> for BenchError {
    fn from(err: PoolExhausted) -> Self {
        Self::ResourceExhausted(ResourceExhausted::PoolBatch(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let config: BenchError = ConfigError::MissingMode.into();
        assert_eq!(config.exit_code(), 2);
        assert!(config.is_config());

        let exhausted: BenchError = PoolExhausted {
            requested: 64,
            available: 10,
        }
        .into();
        assert_eq!(exhausted.exit_code(), 1);
        assert!(!exhausted.is_config());
    }

    #[test]
    fn test_messages() {
        let err = ConfigError::BatchSizeOutOfRange { value: 200, max: 128 };
        assert_eq!(err.to_string(), "batch size 200 out of range [1, 128]");

        let err = BenchError::Stalled {
            role: Role::Forwarder,
            progress: 3,
            target: 10,
        };
        assert_eq!(err.to_string(), "forwarder stalled at 3/10 messages");

        let err: BenchError = ResourceExhausted::Pin {
            role: Role::Producer,
            core: 3,
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "resource exhausted: cannot pin producer thread to core 3"
        );
    }
}
