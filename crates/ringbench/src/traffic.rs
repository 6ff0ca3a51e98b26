//! Traffic patterns and the state they share.
//!
//! Each [`TrafficMode`] is a pair of loops: one for the producer thread and
//! one for the consumer/forwarder thread. Both loops stop on their own
//! progress counter; there is no shared stop flag.

use crate::error::BenchError;
use crate::idle::{Idler, Stalled};
use crate::pool::{Handle, ObjectPool};
use crate::report::Measurement;
use crate::ring::{RingConsumer, RingProducer};
use crate::{forward, sink};
use std::fmt;
use std::str::FromStr;

/// Traffic pattern of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficMode {
    /// Producer → request ring → discarding consumer.
    Sink,
    /// Producer → request ring → forwarder → reply ring → producer.
    Forward,
    /// As `Forward`, but the forwarder copies each payload into its own buffer.
    ForwardCopy,
}

impl TrafficMode {
    /// All modes, in CLI order.
    pub const ALL: [TrafficMode; 3] = [Self::Sink, Self::Forward, Self::ForwardCopy];

    /// Name accepted by `--mode`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sink => "sink",
            Self::Forward => "fw",
            Self::ForwardCopy => "fw-copy",
        }
    }

    /// Handles the mode acquires from the pool at setup.
    pub fn handles_required(self, batch_size: usize) -> usize {
        match self {
            Self::Sink | Self::Forward => batch_size,
            Self::ForwardCopy => 2 * batch_size,
        }
    }

    /// Whether the forwarder owns a second batch of buffers.
    pub fn needs_spare_batch(self) -> bool {
        matches!(self, Self::ForwardCopy)
    }

    /// Label printed for `role`, if that role reports a rate in this mode.
    pub fn report_label(self, role: Role) -> Option<&'static str> {
        match (self, role) {
            (Self::Sink, Role::Sink) => Some("Sink"),
            (Self::Forward | Self::ForwardCopy, Role::Producer) => Some("Forwarded"),
            _ => None,
        }
    }

    /// Role of the thread that is not the producer.
    pub fn consumer_role(self) -> Role {
        match self {
            Self::Sink => Role::Sink,
            Self::Forward | Self::ForwardCopy => Role::Forwarder,
        }
    }

    /// Runs the producer side of this mode to completion.
    pub fn run_producer(
        self,
        lane: &mut ProducerLane<'_>,
        target: u64,
        idler: &mut Idler,
    ) -> Result<Measurement, BenchError> {
        match self {
            Self::Sink => sink::produce(lane, target, idler),
            Self::Forward | Self::ForwardCopy => forward::produce(lane, target, idler),
        }
    }

    /// Runs the consumer/forwarder side of this mode to completion.
    pub fn run_consumer(
        self,
        lane: &mut ForwarderLane<'_>,
        counters: &mut TrafficCounters,
        idler: &mut Idler,
    ) -> Result<Measurement, BenchError> {
        match self {
            Self::Sink => sink::consume(lane, counters, idler),
            Self::Forward => forward::relay(lane, counters, idler),
            Self::ForwardCopy => forward::relay_copy(lane, counters, idler),
        }
    }
}

impl FromStr for TrafficMode {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| crate::error::ConfigError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for TrafficMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which loop a thread runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends batches into the request ring.
    Producer,
    /// Drains and discards the request ring.
    Sink,
    /// Relays from the request ring to the reply ring.
    Forwarder,
}

impl Role {
    /// Thread name for this role.
    pub fn thread_name(self) -> &'static str {
        match self {
            Self::Producer => "ringbench-producer",
            Self::Sink => "ringbench-sink",
            Self::Forwarder => "ringbench-forwarder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Producer => "producer",
            Self::Sink => "sink",
            Self::Forwarder => "forwarder",
        })
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Counters zeroed, loops not started.
    Idle,
    /// Both loops released through the start gate.
    Running,
    /// Both loops joined.
    Done,
}

/// Counters owned by the consumer/forwarder loop for one run.
///
/// The loop holds the only `&mut` while it runs; the harness reads the
/// counters after the thread has been joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficCounters {
    /// Messages consumed (Sink) or relayed (Forward, ForwardCopy).
    pub forwarded: u64,
    /// Messages each loop must move before stopping.
    pub target: u64,
    /// Largest transfer a loop requests at once.
    pub batch_size: usize,
}

impl TrafficCounters {
    /// Zeroed counters for a run.
    pub fn new(target: u64, batch_size: usize) -> Self {
        Self {
            forwarded: 0,
            target,
            batch_size,
        }
    }

    /// Messages still to move.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.target.saturating_sub(self.forwarded)
    }

    /// Returns true once the target has been reached.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.forwarded >= self.target
    }
}

/// Everything the producer thread owns.
pub struct ProducerLane<'a> {
    /// Producer end of the request ring.
    pub request: RingProducer<'a, Handle>,
    /// Consumer end of the reply ring (unused by Sink).
    pub reply: RingConsumer<'a, Handle>,
    /// The batch of handles this producer circulates.
    pub batch: Vec<Handle>,
}

impl<'a> ProducerLane<'a> {
    /// Bundles the producer's ring ends with its batch.
    pub fn new(
        request: RingProducer<'a, Handle>,
        reply: RingConsumer<'a, Handle>,
        batch: Vec<Handle>,
    ) -> Self {
        Self {
            request,
            reply,
            batch,
        }
    }
}

/// Everything the consumer/forwarder thread owns.
pub struct ForwarderLane<'a> {
    /// Consumer end of the request ring.
    pub request: RingConsumer<'a, Handle>,
    /// Producer end of the reply ring (unused by Sink).
    pub reply: RingProducer<'a, Handle>,
    /// Pool the payloads live in.
    pub pool: &'a ObjectPool,
    /// Buffers the forwarder copies into (ForwardCopy only).
    pub spare: Vec<Handle>,
}

impl<'a> ForwarderLane<'a> {
    /// Bundles the forwarder's ring ends with its pool and spare batch.
    pub fn new(
        request: RingConsumer<'a, Handle>,
        reply: RingProducer<'a, Handle>,
        pool: &'a ObjectPool,
        spare: Vec<Handle>,
    ) -> Self {
        Self {
            request,
            reply,
            pool,
            spare,
        }
    }
}

/// Enqueues every handle in `items`, re-issuing the remainder after a short
/// transfer.
pub(crate) fn enqueue_all(
    ring: &mut RingProducer<'_, Handle>,
    items: &[Handle],
    idler: &mut Idler,
) -> Result<(), Stalled> {
    let mut sent = 0;
    while sent < items.len() {
        let n = ring.try_enqueue_bulk(&items[sent..]);
        if n == 0 {
            idler.idle()?;
        } else {
            idler.reset();
            sent += n;
        }
    }
    Ok(())
}

/// Converts an idle-budget failure into the run error for `role`.
pub(crate) fn stalled(
    role: Role,
    progress: u64,
    target: u64,
) -> impl FnOnce(Stalled) -> BenchError {
    move |_| BenchError::Stalled {
        role,
        progress,
        target,
    }
}
