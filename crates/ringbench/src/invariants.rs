//! Debug assertion macros for ring and pool invariants.
//!
//! Only active in debug builds (`debug_assert!`), so release builds used for
//! measurement pay nothing for them.

// =============================================================================
// Ring occupancy
// =============================================================================

/// Assert that occupancy does not exceed capacity.
///
/// **Invariant**: `0 ≤ (tail - head) ≤ capacity`
///
/// Used in: `RingProducer::try_enqueue_bulk()` before publishing the new tail
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "ring occupancy {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that head does not advance past tail.
///
/// Used in: `RingConsumer::try_dequeue_bulk()` before publishing the new head
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "advancing head {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

// =============================================================================
// Monotonic progress
// =============================================================================

/// Assert that a sequence number only moves forward.
///
/// Head and tail are unbounded `u64` sequences; a decrease means a
/// bookkeeping bug, not wrap-around (2^64 messages is out of reach).
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// Pool ownership
// =============================================================================

/// Assert that a handle passed to payload access is currently issued.
///
/// Used in: `ObjectPool::payload()`, `payload_mut()`, `copy_payload()`
macro_rules! debug_assert_issued {
    ($pool:expr, $handle:expr) => {
        debug_assert!(
            $pool.is_issued($handle),
            "payload access through handle {:?} that is not issued",
            $handle
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_issued;
pub(crate) use debug_assert_monotonic;
