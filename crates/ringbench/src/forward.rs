//! Round-trip traffic: producer → request ring → forwarder → reply ring →
//! producer.
//!
//! The producer sends its batch, then collects it back from the reply ring,
//! counting only what returns. The forwarder relays handles untouched
//! (`relay`) or copies every payload into a buffer it owns before relaying
//! that buffer instead (`relay_copy`).

use crate::clock::Stopwatch;
use crate::error::BenchError;
use crate::idle::Idler;
use crate::pool::{Handle, ObjectPool};
use crate::report::Measurement;
use crate::traffic::{enqueue_all, stalled, ForwarderLane, ProducerLane, Role, TrafficCounters};

/// Runs round trips until `target` handles have come back.
///
/// The last round sends only the remainder, so the forwarder's count and the
/// producer's count both land exactly on `target`.
pub(crate) fn produce(
    lane: &mut ProducerLane<'_>,
    target: u64,
    idler: &mut Idler,
) -> Result<Measurement, BenchError> {
    let batch_size = lane.batch.len();
    let mut received = 0u64;

    let watch = Stopwatch::start();
    while received < target {
        let round = batch_size.min((target - received) as usize);
        enqueue_all(&mut lane.request, &lane.batch[..round], idler)
            .map_err(stalled(Role::Producer, received, target))?;

        let mut held = 0;
        while held < round {
            let n = lane.reply.try_dequeue_bulk(&mut lane.batch[held..round]);
            if n == 0 {
                idler
                    .idle()
                    .map_err(stalled(Role::Producer, received, target))?;
                continue;
            }
            idler.reset();
            held += n;
            received += n as u64;
        }
    }
    let elapsed = watch.elapsed();

    Ok(Measurement::new(Role::Producer, received, elapsed))
}

/// Relays handles from the request ring to the reply ring unchanged.
pub(crate) fn relay(
    lane: &mut ForwarderLane<'_>,
    counters: &mut TrafficCounters,
    idler: &mut Idler,
) -> Result<Measurement, BenchError> {
    let mut inbound = vec![Handle::NULL; counters.batch_size];

    let watch = Stopwatch::start();
    while !counters.is_done() {
        let want = inbound.len().min(counters.remaining() as usize);
        let n = lane.request.try_dequeue_bulk(&mut inbound[..want]);
        if n == 0 {
            idler
                .idle()
                .map_err(stalled(Role::Forwarder, counters.forwarded, counters.target))?;
            continue;
        }
        idler.reset();

        enqueue_all(&mut lane.reply, &inbound[..n], idler)
            .map_err(stalled(Role::Forwarder, counters.forwarded, counters.target))?;
        counters.forwarded += n as u64;
    }
    let elapsed = watch.elapsed();

    Ok(Measurement::new(Role::Forwarder, counters.forwarded, elapsed))
}

/// Relays a copy of every payload through the forwarder's spare buffers.
///
/// Each dequeued handle's payload is copied into a spare, the spare is sent
/// on, and the dequeued handle becomes a spare. The forwarder therefore owns
/// exactly `spare.len()` buffers at any time.
pub(crate) fn relay_copy(
    lane: &mut ForwarderLane<'_>,
    counters: &mut TrafficCounters,
    idler: &mut Idler,
) -> Result<Measurement, BenchError> {
    assert!(
        lane.spare.len() >= counters.batch_size,
        "forwarder holds {} spare buffers for batch size {}",
        lane.spare.len(),
        counters.batch_size
    );
    let mut inbound = vec![Handle::NULL; counters.batch_size];

    let watch = Stopwatch::start();
    while !counters.is_done() {
        let want = inbound.len().min(counters.remaining() as usize);
        let n = lane.request.try_dequeue_bulk(&mut inbound[..want]);
        if n == 0 {
            idler
                .idle()
                .map_err(stalled(Role::Forwarder, counters.forwarded, counters.target))?;
            continue;
        }
        idler.reset();

        copy_batch(lane.pool, &inbound[..n], &lane.spare[..n]);
        enqueue_all(&mut lane.reply, &lane.spare[..n], idler)
            .map_err(stalled(Role::Forwarder, counters.forwarded, counters.target))?;
        // What came in is ours now; what went out belongs to the producer.
        inbound[..n].swap_with_slice(&mut lane.spare[..n]);
        counters.forwarded += n as u64;
    }
    let elapsed = watch.elapsed();

    Ok(Measurement::new(Role::Forwarder, counters.forwarded, elapsed))
}

/// Copies `src[i]`'s payload into `dst[i]` for every pair.
fn copy_batch(pool: &ObjectPool, src: &[Handle], dst: &[Handle]) {
    debug_assert_eq!(src.len(), dst.len());
    for (from, to) in src.iter().zip(dst) {
        // SAFETY: `from` was just dequeued, so the producer has handed it over
        // and will not touch it until it returns through the reply ring. `to`
        // is one of the forwarder's own spares. Both are issued and distinct.
        unsafe { pool.copy_payload(*from, *to) };
    }
}
