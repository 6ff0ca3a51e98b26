use crate::error::ResourceExhausted;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_monotonic,
};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// ## Sequence Numbers
//
// `head` and `tail` are unbounded u64 sequence numbers, not wrapped indices.
// The slot index is `sequence & mask`, computed only when touching a slot.
// Occupancy is `tail - head`, always in [0, capacity].
//
// ## Memory Ordering Protocol
//
// **Producer (try_enqueue_bulk):**
// 1. Use the endpoint's local `tail` (only the producer writes tail)
// 2. Compute free space from the endpoint's `cached_head`
// 3. If that is not enough for the whole request: load `head` with Acquire
// 4. Write min(request, free) values into slots
// 5. Store the new `tail` with Release (publishes the slots)
//
// **Consumer (try_dequeue_bulk):**
// 1. Use the endpoint's local `head` (only the consumer writes head)
// 2. Compute availability from the endpoint's `cached_tail`
// 3. If that is not enough for the whole request: load `tail` with Acquire
// 4. Copy min(request, available) values out of slots
// 5. Store the new `head` with Release (hands the slots back)
//
// ## Single-Writer Discipline
//
// `BoundedRing::split` takes `&mut self` and returns exactly one
// `RingProducer` and one `RingConsumer`. The bulk operations take
// `&mut self` on the endpoint, so neither end can be driven from two threads
// at once. The caches live in the endpoints, not in the shared ring.
//
// =============================================================================

/// Lock-free bounded SPSC ring with bulk transfer.
///
/// Values are copied in and out; a ring of [`Handle`](crate::Handle)s moves
/// ownership of pool buffers without touching their payload.
pub struct BoundedRing<T> {
    /// Tail sequence (written by producer, read by consumer)
    tail: CachePadded<AtomicU64>,
    /// Head sequence (written by consumer, read by producer)
    head: CachePadded<AtomicU64>,
    capacity: usize,
    mask: usize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// Safety: slots are only written by the producer end in [tail, head + capacity)
// and only read by the consumer end in [head, tail); the Release/Acquire pair
// on tail and head orders those accesses.
unsafe impl<T: Send> Send for BoundedRing<T> {}
unsafe impl<T: Send> Sync for BoundedRing<T> {}

impl<T: Copy> BoundedRing<T> {
    /// Creates a ring with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceExhausted> {
        assert!(
            capacity.is_power_of_two(),
            "ring capacity {capacity} must be a power of two"
        );

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ResourceExhausted::Ring { capacity })?;
        slots.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));

        Ok(Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            capacity,
            mask: capacity - 1,
            slots: slots.into_boxed_slice(),
        })
    }

    /// Returns the ring capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of occupied slots.
    ///
    /// Exact when no endpoint is active; a snapshot otherwise.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) as usize
    }

    /// Returns true if the ring is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the ring is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Splits the ring into its producer and consumer ends.
    ///
    /// The endpoints borrow the ring mutably, so at most one pair exists at a
    /// time. Dropping both and splitting again resumes where they left off.
    pub fn split(&mut self) -> (RingProducer<'_, T>, RingConsumer<'_, T>) {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        let ring: &Self = self;
        (
            RingProducer {
                ring,
                tail,
                cached_head: head,
            },
            RingConsumer {
                ring,
                head,
                cached_tail: tail,
            },
        )
    }

    #[inline]
    fn slot(&self, seq: u64) -> *mut MaybeUninit<T> {
        self.slots[(seq as usize) & self.mask].get()
    }
}

/// Producer end of a [`BoundedRing`].
pub struct RingProducer<'a, T> {
    ring: &'a BoundedRing<T>,
    /// Local copy of the published tail
    tail: u64,
    /// Producer's view of head (refreshed only when space looks short)
    cached_head: u64,
}

impl<T: Copy> RingProducer<'_, T> {
    /// Places up to `items.len()` values, returning how many were placed.
    ///
    /// Never blocks. Zero means the ring is full (or `items` is empty); a
    /// short count means the remainder must be re-issued by the caller.
    pub fn try_enqueue_bulk(&mut self, items: &[T]) -> usize {
        if items.is_empty() {
            return 0;
        }

        let capacity = self.ring.capacity;
        let tail = self.tail;
        let mut free = capacity - tail.wrapping_sub(self.cached_head) as usize;

        if free < items.len() {
            // Slow path: refresh the view of head
            self.cached_head = self.ring.head.load(Ordering::Acquire);
            free = capacity - tail.wrapping_sub(self.cached_head) as usize;
            if free == 0 {
                return 0;
            }
        }

        let n = items.len().min(free);
        for (offset, item) in items[..n].iter().enumerate() {
            // SAFETY: the slot at tail + offset lies in [tail, head + capacity),
            // which the consumer does not read until tail is published below.
            unsafe {
                (*self.ring.slot(tail.wrapping_add(offset as u64))).write(*item);
            }
        }

        let new_tail = tail.wrapping_add(n as u64);
        debug_assert_bounded_count!(new_tail.wrapping_sub(self.cached_head) as usize, capacity);
        debug_assert_monotonic!("tail", tail, new_tail);

        self.ring.tail.store(new_tail, Ordering::Release);
        self.tail = new_tail;
        n
    }

    /// Free slots as of a fresh read of head (a lower bound while the
    /// consumer is running).
    #[inline]
    pub fn free_slots(&mut self) -> usize {
        self.cached_head = self.ring.head.load(Ordering::Acquire);
        self.ring.capacity - self.tail.wrapping_sub(self.cached_head) as usize
    }
}

/// Consumer end of a [`BoundedRing`].
pub struct RingConsumer<'a, T> {
    ring: &'a BoundedRing<T>,
    /// Local copy of the published head
    head: u64,
    /// Consumer's view of tail (refreshed only when data looks short)
    cached_tail: u64,
}

impl<T: Copy> RingConsumer<'_, T> {
    /// Removes up to `out.len()` values into `out[..n]`, returning `n`.
    ///
    /// Never blocks. Zero means the ring is empty (or `out` is empty).
    pub fn try_dequeue_bulk(&mut self, out: &mut [T]) -> usize {
        if out.is_empty() {
            return 0;
        }

        let head = self.head;
        let mut avail = self.cached_tail.wrapping_sub(head) as usize;

        if avail < out.len() {
            // Slow path: refresh the view of tail
            self.cached_tail = self.ring.tail.load(Ordering::Acquire);
            avail = self.cached_tail.wrapping_sub(head) as usize;
            if avail == 0 {
                return 0;
            }
        }

        let n = out.len().min(avail);
        for (offset, dst) in out[..n].iter_mut().enumerate() {
            // SAFETY: the slot at head + offset lies in [head, tail); the
            // producer initialized it before its Release store of tail, which
            // the Acquire load above (or an earlier one) observed.
            *dst = unsafe { (*self.ring.slot(head.wrapping_add(offset as u64))).assume_init_read() };
        }

        let new_head = head.wrapping_add(n as u64);
        debug_assert_head_not_past_tail!(new_head, self.cached_tail);
        debug_assert_monotonic!("head", head, new_head);

        self.ring.head.store(new_head, Ordering::Release);
        self.head = new_head;
        n
    }

    /// Values ready to dequeue as of a fresh read of tail.
    #[inline]
    pub fn available(&mut self) -> usize {
        self.cached_tail = self.ring.tail.load(Ordering::Acquire);
        self.cached_tail.wrapping_sub(self.head) as usize
    }
}
