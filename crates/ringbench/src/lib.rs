//! ringbench - two-thread throughput benchmark for a lock-free bulk SPSC ring
//!
//! Measures how fast fixed-size message handles move between two pinned
//! worker threads over a bounded single-producer/single-consumer ring, with
//! buffers supplied by a preallocated object pool.
//!
//! # Components
//!
//! - [`BoundedRing`]: power-of-two ring of `Copy` values, split into one
//!   [`RingProducer`] and one [`RingConsumer`]; non-blocking bulk transfers
//!   with cached peer indices
//! - [`ObjectPool`]: contiguous fixed-size buffers with all-or-nothing bulk
//!   acquire/release
//! - [`TrafficMode`]: `Sink`, `Forward` and `ForwardCopy` loop pairs
//! - [`RunContext`]: owns one run's pool and rings, launches the loops on two
//!   scoped threads and reports throughput
//!
//! # Example
//!
//! ```
//! use ringbench::{run, RunConfig, TrafficMode};
//!
//! let report = run(RunConfig::smoke(TrafficMode::Forward).with_msgs(10_000)).unwrap();
//! assert_eq!(report.counters.forwarded, 10_000);
//! for line in report.lines() {
//!     println!("{line}");
//! }
//! ```

mod affinity;
pub mod cli;
mod clock;
mod config;
mod error;
mod forward;
mod harness;
mod idle;
mod invariants;
mod pool;
mod report;
mod ring;
mod sink;
mod trace;
mod traffic;

pub use affinity::{available_cores, select_cores, CorePair};
pub use clock::{cycle_counter_available, Stopwatch};
pub use config::{
    Placement, RunConfig, DEFAULT_BATCH_SIZE, DEFAULT_ELEMENT_SIZE, DEFAULT_MSGS,
    DEFAULT_POOL_SIZE, DEFAULT_RING_SIZE, MAX_BATCH_SIZE,
};
pub use error::{BenchError, ConfigError, PoolExhausted, ResourceExhausted};
pub use harness::{run, RunContext, RunReport};
pub use idle::{IdleStrategy, Idler, Stalled};
pub use pool::{Handle, ObjectPool};
pub use report::{scale_rate, Measurement, ThroughputLine};
pub use ring::{BoundedRing, RingConsumer, RingProducer};
pub use trace::init_tracing;
pub use traffic::{ForwarderLane, Phase, ProducerLane, Role, TrafficCounters, TrafficMode};
