use crate::error::ConfigError;
use crate::idle::IdleStrategy;
use crate::traffic::TrafficMode;

/// Default handles per bulk transfer.
pub const DEFAULT_BATCH_SIZE: usize = 32;
/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 128;
/// Default message target.
pub const DEFAULT_MSGS: u64 = 1_000_000;
/// Default capacity of each ring.
pub const DEFAULT_RING_SIZE: usize = 128;
/// Default number of pool elements.
pub const DEFAULT_POOL_SIZE: usize = 1024;
/// Default payload size of a pool element, in bytes.
pub const DEFAULT_ELEMENT_SIZE: usize = 84;

/// Where the two loops run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Pin to two distinct cores picked from those available to the process.
    #[default]
    Pinned,
    /// Pin to the given cores.
    Cores {
        /// Core for the producer loop.
        producer: usize,
        /// Core for the consumer/forwarder loop.
        forwarder: usize,
    },
    /// Leave placement to the OS scheduler.
    Unpinned,
}

/// Configuration of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Traffic pattern.
    pub mode: TrafficMode,
    /// Handles per bulk transfer, in `[1, MAX_BATCH_SIZE]`.
    pub batch_size: usize,
    /// Messages each loop moves before stopping.
    pub msgs: u64,
    /// Capacity of the request and reply rings (power of two).
    pub ring_size: usize,
    /// Pool element count.
    pub pool_size: usize,
    /// Pool element payload size in bytes.
    pub element_size: usize,
    /// Retry policy for full/empty rings.
    pub idle: IdleStrategy,
    /// Core placement of the two loops.
    pub placement: Placement,
}

impl RunConfig {
    /// Creates a configuration with the reference defaults.
    pub const fn new(mode: TrafficMode) -> Self {
        Self {
            mode,
            batch_size: DEFAULT_BATCH_SIZE,
            msgs: DEFAULT_MSGS,
            ring_size: DEFAULT_RING_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            element_size: DEFAULT_ELEMENT_SIZE,
            idle: IdleStrategy::Spin,
            placement: Placement::Pinned,
        }
    }

    /// Short, scheduler-friendly run: 100k messages, yielding idle loops, no
    /// pinning. Suited to CI machines and shared hosts.
    pub const fn smoke(mode: TrafficMode) -> Self {
        Self {
            msgs: 100_000,
            idle: IdleStrategy::Yield,
            placement: Placement::Unpinned,
            ..Self::new(mode)
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the message target.
    pub fn with_msgs(mut self, msgs: u64) -> Self {
        self.msgs = msgs;
        self
    }

    /// Sets the ring capacity.
    pub fn with_ring_size(mut self, ring_size: usize) -> Self {
        self.ring_size = ring_size;
        self
    }

    /// Sets the pool element count.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the pool element size.
    pub fn with_element_size(mut self, element_size: usize) -> Self {
        self.element_size = element_size;
        self
    }

    /// Sets the idle strategy.
    pub fn with_idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    /// Sets the core placement.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Checks every constraint that must hold before resources are created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchSizeOutOfRange {
                value: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.msgs < self.batch_size as u64 {
            return Err(ConfigError::TargetBelowBatch {
                msgs: self.msgs,
                batch_size: self.batch_size,
            });
        }
        if !self.ring_size.is_power_of_two() {
            return Err(ConfigError::RingSizeNotPowerOfTwo(self.ring_size));
        }
        if self.batch_size > self.ring_size {
            return Err(ConfigError::BatchExceedsRing {
                batch_size: self.batch_size,
                ring_size: self.ring_size,
            });
        }
        if self.element_size == 0 {
            return Err(ConfigError::ZeroElementSize);
        }
        let required = self.mode.handles_required(self.batch_size);
        if self.pool_size < required {
            return Err(ConfigError::PoolTooSmall {
                pool_size: self.pool_size,
                required,
            });
        }
        if let Placement::Cores {
            producer,
            forwarder,
        } = self.placement
        {
            if producer == forwarder {
                return Err(ConfigError::SameCore(producer));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for mode in TrafficMode::ALL {
            assert_eq!(RunConfig::new(mode).validate(), Ok(()));
        }
    }

    #[test]
    fn test_smoke_preset() {
        let config = RunConfig::smoke(TrafficMode::Forward);
        assert_eq!(config.msgs, 100_000);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.placement, Placement::Unpinned);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        let base = RunConfig::new(TrafficMode::Sink);
        assert!(base.with_batch_size(1).validate().is_ok());
        assert!(base.with_batch_size(128).validate().is_ok());
        assert_eq!(
            base.with_batch_size(0).validate(),
            Err(ConfigError::BatchSizeOutOfRange { value: 0, max: 128 })
        );
        assert_eq!(
            base.with_batch_size(200).validate(),
            Err(ConfigError::BatchSizeOutOfRange {
                value: 200,
                max: 128
            })
        );
    }

    #[test]
    fn test_target_below_batch() {
        let config = RunConfig::new(TrafficMode::Forward).with_msgs(10);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TargetBelowBatch {
                msgs: 10,
                batch_size: 32
            })
        );
        assert!(config.with_batch_size(10).validate().is_ok());
    }

    #[test]
    fn test_ring_and_pool_constraints() {
        let base = RunConfig::new(TrafficMode::ForwardCopy);
        assert_eq!(
            base.with_ring_size(100).validate(),
            Err(ConfigError::RingSizeNotPowerOfTwo(100))
        );
        assert_eq!(
            base.with_ring_size(16).validate(),
            Err(ConfigError::BatchExceedsRing {
                batch_size: 32,
                ring_size: 16
            })
        );
        assert_eq!(
            base.with_pool_size(48).validate(),
            Err(ConfigError::PoolTooSmall {
                pool_size: 48,
                required: 64
            })
        );
        assert!(base
            .with_pool_size(48)
            .with_batch_size(24)
            .validate()
            .is_ok());
        assert_eq!(
            base.with_element_size(0).validate(),
            Err(ConfigError::ZeroElementSize)
        );
    }

    #[test]
    fn test_explicit_cores_must_differ() {
        let config = RunConfig::new(TrafficMode::Sink).with_placement(Placement::Cores {
            producer: 3,
            forwarder: 3,
        });
        assert_eq!(config.validate(), Err(ConfigError::SameCore(3)));
    }
}
