//! One-directional traffic: the producer pushes the same batch of handles
//! over and over and the consumer drains and discards them. Measures raw
//! ring throughput with no pool traffic at all.

use crate::clock::Stopwatch;
use crate::error::BenchError;
use crate::idle::Idler;
use crate::pool::Handle;
use crate::report::Measurement;
use crate::traffic::{enqueue_all, stalled, ForwarderLane, ProducerLane, Role, TrafficCounters};

/// Sends exactly `target` handles into the request ring.
///
/// The final send is trimmed to the remainder so the consumer can stop on an
/// exact count.
pub(crate) fn produce(
    lane: &mut ProducerLane<'_>,
    target: u64,
    idler: &mut Idler,
) -> Result<Measurement, BenchError> {
    let batch_size = lane.batch.len();
    let mut sent = 0u64;

    let watch = Stopwatch::start();
    while sent < target {
        let want = batch_size.min((target - sent) as usize);
        enqueue_all(&mut lane.request, &lane.batch[..want], idler)
            .map_err(stalled(Role::Producer, sent, target))?;
        sent += want as u64;
    }
    let elapsed = watch.elapsed();

    Ok(Measurement::new(Role::Producer, sent, elapsed))
}

/// Drains the request ring until `counters.target` handles have been seen.
pub(crate) fn consume(
    lane: &mut ForwarderLane<'_>,
    counters: &mut TrafficCounters,
    idler: &mut Idler,
) -> Result<Measurement, BenchError> {
    let mut scratch = vec![Handle::NULL; counters.batch_size];

    let watch = Stopwatch::start();
    while !counters.is_done() {
        let want = scratch.len().min(counters.remaining() as usize);
        let n = lane.request.try_dequeue_bulk(&mut scratch[..want]);
        if n == 0 {
            idler
                .idle()
                .map_err(stalled(Role::Sink, counters.forwarded, counters.target))?;
            continue;
        }
        idler.reset();
        counters.forwarded += n as u64;
    }
    let elapsed = watch.elapsed();

    Ok(Measurement::new(Role::Sink, counters.forwarded, elapsed))
}
