//! Two-thread benchmark harness.
//!
//! A [`RunContext`] owns everything one run needs (config, pool, request and
//! reply rings). [`RunContext::run`] splits the rings, hands one end of each
//! to the producer thread and the other to the consumer/forwarder thread,
//! releases both through a start gate, joins them, and returns the
//! measurements. Nothing is global; the threads are scoped and borrow the
//! context.

use crate::affinity::{available_cores, pin_current, select_cores, CorePair};
use crate::clock::cycle_counter_available;
use crate::config::RunConfig;
use crate::error::{BenchError, ResourceExhausted};
use crate::pool::{Handle, ObjectPool};
use crate::report::{Measurement, ThroughputLine};
use crate::ring::BoundedRing;
use crate::traffic::{ForwarderLane, Phase, ProducerLane, Role, TrafficCounters, TrafficMode};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// Everything one benchmark run owns.
pub struct RunContext {
    config: RunConfig,
    pool: ObjectPool,
    request: BoundedRing<Handle>,
    reply: BoundedRing<Handle>,
    phase: Phase,
}

impl RunContext {
    /// Validates `config` and builds the pool and both rings.
    ///
    /// Nothing is allocated if the configuration is rejected.
    pub fn new(config: RunConfig) -> Result<Self, BenchError> {
        config.validate()?;

        let pool = ObjectPool::new(config.pool_size, config.element_size)?;
        let request = BoundedRing::with_capacity(config.ring_size)?;
        let reply = BoundedRing::with_capacity(config.ring_size)?;

        info!(
            mode = %config.mode,
            batch_size = config.batch_size,
            msgs = config.msgs,
            ring_size = config.ring_size,
            pool_size = config.pool_size,
            element_size = config.element_size,
            idle = %config.idle,
            "run configured"
        );
        debug!(tsc = cycle_counter_available(), "cycle counter");

        Ok(Self {
            config,
            pool,
            request,
            reply,
            phase: Phase::Idle,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current lifecycle phase (always `Idle` before [`run`](Self::run)).
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The run's object pool.
    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    /// Runs both loops to completion and tears the run down.
    pub fn run(self) -> Result<RunReport, BenchError> {
        let cores = select_cores(self.config.placement, &available_cores())?;
        match cores {
            Some(pair) => info!(producer = pair.producer, forwarder = pair.forwarder, "pinning"),
            None => info!("running unpinned"),
        }

        let Self {
            config,
            pool,
            mut request,
            mut reply,
            mut phase,
        } = self;
        let mode = config.mode;

        let mut batch = vec![Handle::NULL; config.batch_size];
        pool.acquire_bulk(&mut batch)?;
        stamp_payloads(&pool, &batch);

        let mut spare = Vec::new();
        if mode.needs_spare_batch() {
            spare = vec![Handle::NULL; config.batch_size];
            if let Err(err) = pool.acquire_bulk(&mut spare) {
                pool.release_bulk(&batch);
                return Err(err.into());
            }
        }
        let acquired: Vec<Handle> = batch.iter().chain(&spare).copied().collect();

        let (req_tx, req_rx) = request.split();
        let (rep_tx, rep_rx) = reply.split();
        let mut producer_lane = ProducerLane::new(req_tx, rep_rx, batch);
        let mut forwarder_lane = ForwarderLane::new(req_rx, rep_tx, &pool, spare);
        let mut counters = TrafficCounters::new(config.msgs, config.batch_size);

        let launched = launch(
            mode,
            &config,
            cores,
            &mut producer_lane,
            &mut forwarder_lane,
            &mut counters,
            &mut phase,
        );
        phase = Phase::Done;
        debug!(?phase, forwarded = counters.forwarded, "loops joined");

        drop((producer_lane, forwarder_lane));
        pool.release_bulk(&acquired);

        let (producer, consumer) = launched?;
        let (producer, consumer) = settle(mode.consumer_role(), producer, consumer)?;
        debug_assert!(request.is_empty() && reply.is_empty(), "handles left in flight");

        info!(
            producer_msgs = producer.messages,
            consumer_msgs = consumer.messages,
            "run complete"
        );

        Ok(RunReport {
            mode,
            config,
            counters,
            producer,
            consumer,
            phase,
        })
    }
}

/// Validates, builds, and runs one benchmark.
pub fn run(config: RunConfig) -> Result<RunReport, BenchError> {
    RunContext::new(config)?.run()
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Traffic pattern that ran.
    pub mode: TrafficMode,
    /// Configuration of the run.
    pub config: RunConfig,
    /// Consumer/forwarder counters, read after join.
    pub counters: TrafficCounters,
    /// Producer loop measurement.
    pub producer: Measurement,
    /// Consumer/forwarder loop measurement.
    pub consumer: Measurement,
    /// Final lifecycle phase.
    pub phase: Phase,
}

impl RunReport {
    /// Throughput lines for every role that reports a rate in this mode.
    pub fn lines(&self) -> Vec<ThroughputLine> {
        [self.producer, self.consumer]
            .iter()
            .filter_map(|m| self.mode.report_label(m.role).map(|label| m.line(label)))
            .collect()
    }
}

type Joined = Result<Measurement, BenchError>;

/// Spawns both loops, opens the gate once both are pinned, and joins them.
///
/// A side that never ran because the gate was aborted comes back as `None`.
fn launch(
    mode: TrafficMode,
    config: &RunConfig,
    cores: Option<CorePair>,
    producer_lane: &mut ProducerLane<'_>,
    forwarder_lane: &mut ForwarderLane<'_>,
    counters: &mut TrafficCounters,
    phase: &mut Phase,
) -> Result<(Option<Joined>, Option<Joined>), ResourceExhausted> {
    let gate = StartGate::new();
    let gate = &gate;
    let consumer_role = mode.consumer_role();
    let idle = config.idle;
    let target = config.msgs;

    thread::scope(|s| {
        let forwarder = thread::Builder::new()
            .name(consumer_role.thread_name().into())
            .spawn_scoped(s, move || {
                worker(gate, cores.map(|c| c.forwarder), consumer_role, || {
                    let mut idler = idle.idler();
                    mode.run_consumer(forwarder_lane, counters, &mut idler)
                })
            })
            .map_err(|source| ResourceExhausted::Spawn {
                role: consumer_role,
                source,
            })?;

        let producer = thread::Builder::new()
            .name(Role::Producer.thread_name().into())
            .spawn_scoped(s, move || {
                worker(gate, cores.map(|c| c.producer), Role::Producer, || {
                    let mut idler = idle.idler();
                    mode.run_producer(producer_lane, target, &mut idler)
                })
            });
        let producer = match producer {
            Ok(handle) => handle,
            Err(source) => {
                gate.abort();
                let _ = forwarder.join();
                return Err(ResourceExhausted::Spawn {
                    role: Role::Producer,
                    source,
                });
            }
        };

        if gate.open_when_ready(2) {
            *phase = Phase::Running;
            debug!(?phase, "loops released");
        } else {
            warn!("start aborted before the loops ran");
        }

        let producer = collect(Role::Producer, producer.join());
        let consumer = collect(consumer_role, forwarder.join());
        Ok((producer, consumer))
    })
}

/// Body of a worker thread: pin, wait for the gate, run the loop.
///
/// A refused pin aborts the gate, so neither loop touches a ring.
fn worker<F>(gate: &StartGate, core: Option<usize>, role: Role, body: F) -> Option<Joined>
where
    F: FnOnce() -> Joined,
{
    if let Some(core) = core {
        if !pin_current(core) {
            gate.abort();
            return Some(Err(ResourceExhausted::Pin { role, core }.into()));
        }
        debug!(%role, core, "pinned");
    }
    if !gate.arrive_and_wait() {
        debug!(%role, "start aborted");
        return None;
    }
    Some(body())
}

fn collect(role: Role, joined: thread::Result<Option<Joined>>) -> Option<Joined> {
    joined.unwrap_or(Some(Err(BenchError::WorkerPanicked(role))))
}

/// Folds both sides' outcomes into one result, preferring the error that
/// stopped the run over the side it cancelled.
fn settle(
    consumer_role: Role,
    producer: Option<Joined>,
    consumer: Option<Joined>,
) -> Result<(Measurement, Measurement), BenchError> {
    match (producer, consumer) {
        (Some(producer), Some(consumer)) => Ok((producer?, consumer?)),
        (Some(Err(err)), None) | (None, Some(Err(err))) => Err(err),
        // A loop only runs once both threads passed the gate.
        (_, None) => Err(BenchError::WorkerPanicked(consumer_role)),
        (None, _) => Err(BenchError::WorkerPanicked(Role::Producer)),
    }
}

/// Writes each message's index into its payload, repeated to fill it.
fn stamp_payloads(pool: &ObjectPool, batch: &[Handle]) {
    for (i, handle) in batch.iter().enumerate() {
        let stamp = (i as u64).to_le_bytes();
        // SAFETY: the batch was just acquired and no thread has been started.
        let payload = unsafe { pool.payload_mut(*handle) };
        for (dst, src) in payload.iter_mut().zip(stamp.iter().cycle()) {
            *dst = *src;
        }
    }
}

const GATE_CLOSED: u8 = 0;
const GATE_OPEN: u8 = 1;
const GATE_ABORTED: u8 = 2;

/// One-shot barrier that lets both loops start together, or neither.
///
/// Workers arrive once they are pinned; the harness opens the gate only
/// after every party has arrived. Abort wins over open.
struct StartGate {
    state: AtomicU8,
    arrived: AtomicUsize,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(GATE_CLOSED),
            arrived: AtomicUsize::new(0),
        }
    }

    /// Opens the gate once `parties` workers have arrived. Returns false if
    /// the gate was aborted first.
    fn open_when_ready(&self, parties: usize) -> bool {
        loop {
            if self.state.load(Ordering::Acquire) == GATE_ABORTED {
                return false;
            }
            if self.arrived.load(Ordering::Acquire) >= parties {
                return self
                    .state
                    .compare_exchange(GATE_CLOSED, GATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
            }
            thread::yield_now();
        }
    }

    fn abort(&self) {
        let _ = self.state.compare_exchange(
            GATE_CLOSED,
            GATE_ABORTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Registers the caller, then blocks until the gate opens (true) or is
    /// aborted (false).
    fn arrive_and_wait(&self) -> bool {
        self.arrived.fetch_add(1, Ordering::AcqRel);
        loop {
            match self.state.load(Ordering::Acquire) {
                GATE_OPEN => return true,
                GATE_ABORTED => return false,
                _ => thread::yield_now(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Placement;
    use crate::error::ConfigError;
    use crate::idle::IdleStrategy;

    fn quick(mode: TrafficMode) -> RunConfig {
        RunConfig::new(mode)
            .with_msgs(20_000)
            .with_idle(IdleStrategy::Yield)
            .with_placement(Placement::Unpinned)
    }

    #[test]
    fn test_context_starts_idle() {
        let ctx = RunContext::new(quick(TrafficMode::Sink)).unwrap();
        assert_eq!(ctx.phase(), Phase::Idle);
        assert_eq!(ctx.pool().available(), 1024);
        assert_eq!(ctx.config().ring_size, 128);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_allocation() {
        let err = RunContext::new(quick(TrafficMode::Sink).with_batch_size(200)).err();
        assert!(matches!(
            err,
            Some(BenchError::Config(ConfigError::BatchSizeOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_every_mode_completes() {
        for mode in TrafficMode::ALL {
            let report = run(quick(mode)).unwrap();
            assert_eq!(report.phase, Phase::Done);
            assert_eq!(report.counters.forwarded, 20_000);
            assert_eq!(report.producer.messages, 20_000);
            assert_eq!(report.lines().len(), 1);
        }
    }

    #[test]
    fn test_start_gate_opens_once_all_arrive() {
        let gate = StartGate::new();
        let passed = thread::scope(|s| {
            let a = s.spawn(|| gate.arrive_and_wait());
            let b = s.spawn(|| gate.arrive_and_wait());
            assert!(gate.open_when_ready(2));
            (a.join().unwrap(), b.join().unwrap())
        });
        assert_eq!(passed, (true, true));
    }

    #[test]
    fn test_start_gate_abort_releases_waiters() {
        let gate = StartGate::new();
        let passed = thread::scope(|s| {
            let waiter = s.spawn(|| gate.arrive_and_wait());
            gate.abort();
            waiter.join().unwrap()
        });
        assert!(!passed);
        // Abort wins even once everyone has arrived.
        assert!(!gate.open_when_ready(1));
    }

    #[test]
    fn test_settle_reports_the_cause_not_the_cancelled_side() {
        let pinned: BenchError = ResourceExhausted::Pin {
            role: Role::Forwarder,
            core: 7,
        }
        .into();
        match settle(Role::Forwarder, None, Some(Err(pinned))) {
            Err(BenchError::ResourceExhausted(ResourceExhausted::Pin { role, core })) => {
                assert_eq!(role, Role::Forwarder);
                assert_eq!(core, 7);
            }
            other => panic!("expected the pin failure, got {other:?}"),
        }

        let done = Measurement::new(Role::Producer, 10, std::time::Duration::from_millis(1));
        let panicked = Some(Err(BenchError::WorkerPanicked(Role::Sink)));
        assert!(matches!(
            settle(Role::Sink, Some(Ok(done)), panicked),
            Err(BenchError::WorkerPanicked(Role::Sink))
        ));
        assert!(settle(Role::Sink, Some(Ok(done)), Some(Ok(done))).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_refused_pin_fails_the_worker_and_aborts_the_gate() {
        // Highest id a Linux cpu set can hold; no CI host has it online.
        let core = 1023;
        if crate::affinity::available_cores().contains(&core) {
            return;
        }

        let gate = StartGate::new();
        let mut ran = false;
        let result = worker(&gate, Some(core), Role::Producer, || {
            ran = true;
            Ok(Measurement::new(Role::Producer, 7, std::time::Duration::ZERO))
        });

        assert!(!ran, "loop ran on an unpinned thread");
        match result {
            Some(Err(BenchError::ResourceExhausted(ResourceExhausted::Pin { role, core: c }))) => {
                assert_eq!(role, Role::Producer);
                assert_eq!(c, core);
            }
            other => panic!("expected a pin failure, got {other:?}"),
        }
        // The peer never gets to run either.
        assert!(!gate.arrive_and_wait());
        assert!(!gate.open_when_ready(2));
    }

    #[test]
    fn test_stamp_payloads() {
        let pool = ObjectPool::new(4, 12).unwrap();
        let mut batch = [Handle::NULL; 2];
        pool.acquire_bulk(&mut batch).unwrap();
        stamp_payloads(&pool, &batch);
        unsafe {
            assert_eq!(pool.payload(batch[1]), &[1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
        }
    }
}
