//! Fixed-size object pool with all-or-nothing bulk acquire.
//!
//! Storage is one zeroed, cache-line aligned allocation of `count` elements.
//! Each element has an `issued` flag; an `available` counter is reserved with
//! a CAS before any flag is claimed, so a failed bulk acquire never touches
//! the flags and a successful one always finds enough free elements.

use crate::error::{PoolExhausted, ResourceExhausted};
use crate::invariants::debug_assert_issued;
use crossbeam_utils::CachePadded;
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Alignment of every element (one cache line).
const ELEMENT_ALIGN: usize = 64;

/// Source of pool ids. Identity only: lets a pool recognise its own handles.
/// No run state lives here.
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

/// Opaque reference to a pool-resident message buffer.
///
/// Handles are plain values so they can travel through a
/// [`BoundedRing`](crate::BoundedRing); the pool checks on release that a
/// handle is one of its own and is currently issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pool: u32,
    index: u32,
}

impl Handle {
    /// Placeholder used to fill scratch buffers before a dequeue.
    /// Belongs to no pool.
    pub const NULL: Handle = Handle {
        pool: u32::MAX,
        index: u32::MAX,
    };

    /// Index of the element inside its pool.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Preallocated set of fixed-size buffers.
pub struct ObjectPool {
    id: u32,
    count: usize,
    element_size: usize,
    /// Distance between elements (element size rounded up to the alignment)
    stride: usize,
    storage: NonNull<u8>,
    layout: Layout,
    /// `true` while the element is owned by someone outside the pool
    issued: Box<[AtomicBool]>,
    available: CachePadded<AtomicUsize>,
}

// Safety: element memory is only touched through handles, and the
// acquire/release protocol hands each element to exactly one owner at a time.
unsafe impl Send for ObjectPool {}
unsafe impl Sync for ObjectPool {}

impl ObjectPool {
    /// Preallocates `count` elements of `element_size` bytes each.
    pub fn new(count: usize, element_size: usize) -> Result<Self, ResourceExhausted> {
        let exhausted = || ResourceExhausted::Pool {
            count,
            element_size,
        };

        if count == 0 || element_size == 0 || count > u32::MAX as usize {
            return Err(exhausted());
        }

        let stride = element_size
            .checked_next_multiple_of(ELEMENT_ALIGN)
            .ok_or_else(exhausted)?;
        let size = stride.checked_mul(count).ok_or_else(exhausted)?;
        let layout = Layout::from_size_align(size, ELEMENT_ALIGN).map_err(|_| exhausted())?;

        // SAFETY: layout has a non-zero size (count > 0, stride >= 64).
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let storage = NonNull::new(raw).ok_or_else(exhausted)?;

        let issued = (0..count).map(|_| AtomicBool::new(false)).collect();

        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            count,
            element_size,
            stride,
            storage,
            layout,
            issued,
            available: CachePadded::new(AtomicUsize::new(count)),
        })
    }

    /// Total number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.count
    }

    /// Payload size of every element in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of free elements (a snapshot under concurrent use).
    #[inline]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Returns true if `handle` belongs to this pool and is currently issued.
    pub fn is_issued(&self, handle: Handle) -> bool {
        self.owns(handle) && self.issued[handle.index()].load(Ordering::Acquire)
    }

    #[inline]
    fn owns(&self, handle: Handle) -> bool {
        handle.pool == self.id && handle.index() < self.count
    }

    /// Acquires exactly `out.len()` free handles, or none at all.
    ///
    /// On success every handle written to `out` is distinct and marked
    /// issued. On failure `out` is untouched and the pool is unchanged.
    pub fn acquire_bulk(&self, out: &mut [Handle]) -> Result<(), PoolExhausted> {
        let n = out.len();
        if n == 0 {
            return Ok(());
        }

        // Reserve n elements; after this the flags must yield n free slots.
        let mut avail = self.available.load(Ordering::Relaxed);
        loop {
            if avail < n {
                return Err(PoolExhausted {
                    requested: n,
                    available: avail,
                });
            }
            match self.available.compare_exchange_weak(
                avail,
                avail - n,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => avail = current,
            }
        }

        let mut filled = 0;
        while filled < n {
            for (index, flag) in self.issued.iter().enumerate() {
                if flag.load(Ordering::Relaxed) {
                    continue;
                }
                if flag
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    out[filled] = Handle {
                        pool: self.id,
                        index: index as u32,
                    };
                    filled += 1;
                    if filled == n {
                        break;
                    }
                }
            }
            // A concurrent releaser may have bumped `available` before its
            // flags were visible to this scan.
            if filled < n {
                std::hint::spin_loop();
            }
        }

        Ok(())
    }

    /// Returns issued handles to the free set.
    ///
    /// # Panics
    ///
    /// Panics if any handle was not issued by this pool or is released twice.
    pub fn release_bulk(&self, items: &[Handle]) {
        if items.is_empty() {
            return;
        }

        // Validate everything before clearing anything.
        for handle in items {
            assert!(
                self.owns(*handle),
                "handle {handle:?} was not issued by pool {}",
                self.id
            );
            assert!(
                self.issued[handle.index()].load(Ordering::Acquire),
                "handle {handle:?} released while not issued"
            );
        }

        let mut cleared = 0;
        for handle in items {
            if !self.issued[handle.index()].swap(false, Ordering::Release) {
                // Same handle twice in `items`: return what was cleared so the
                // count still matches the flags.
                self.available.fetch_add(cleared, Ordering::Release);
                panic!("handle {handle:?} released while not issued");
            }
            cleared += 1;
        }

        self.available.fetch_add(cleared, Ordering::Release);
    }

    #[inline]
    fn element_ptr(&self, handle: Handle) -> *mut u8 {
        assert!(self.owns(handle), "handle {handle:?} does not belong to this pool");
        // SAFETY: index < count, so the offset stays inside the allocation.
        unsafe { self.storage.as_ptr().add(handle.index() * self.stride) }
    }

    /// Shared view of a handle's payload.
    ///
    /// # Safety
    ///
    /// The caller must own `handle` (it is issued and no other thread writes
    /// its payload while the returned slice is alive).
    pub unsafe fn payload(&self, handle: Handle) -> &[u8] {
        debug_assert_issued!(self, handle);
        std::slice::from_raw_parts(self.element_ptr(handle), self.element_size)
    }

    /// Exclusive view of a handle's payload.
    ///
    /// # Safety
    ///
    /// The caller must own `handle` exclusively for the lifetime of the
    /// returned slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn payload_mut(&self, handle: Handle) -> &mut [u8] {
        debug_assert_issued!(self, handle);
        std::slice::from_raw_parts_mut(self.element_ptr(handle), self.element_size)
    }

    /// Copies the full payload of `src` into `dst`.
    ///
    /// # Safety
    ///
    /// The caller must own both handles exclusively, and they must differ.
    pub unsafe fn copy_payload(&self, src: Handle, dst: Handle) {
        debug_assert_issued!(self, src);
        debug_assert_issued!(self, dst);
        debug_assert_ne!(src, dst, "payload copy onto itself");
        ptr::copy_nonoverlapping(
            self.element_ptr(src),
            self.element_ptr(dst),
            self.element_size,
        );
    }
}

impl Drop for ObjectPool {
    fn drop(&mut self) {
        // SAFETY: storage was allocated in `new` with exactly this layout.
        unsafe { alloc::dealloc(self.storage.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("element_size", &self.element_size)
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}
