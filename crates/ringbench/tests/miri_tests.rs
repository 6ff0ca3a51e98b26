//! Miri-compatible tests for the unsafe paths in the ring and the pool.
//!
//! Run with: `cargo +nightly miri test --test miri_tests`
//!
//! Sizes are kept tiny so the interpreter finishes quickly.

use ringbench::{BoundedRing, Handle, ObjectPool};
use std::thread;

/// Slot writes and reads through `MaybeUninit`, including wrap-around.
#[test]
fn miri_ring_wrap_around() {
    let mut ring = BoundedRing::<u32>::with_capacity(4).unwrap();
    let (mut tx, mut rx) = ring.split();
    let mut out = [0u32; 3];

    for round in 0..4u32 {
        let items = [round * 10, round * 10 + 1, round * 10 + 2];
        assert_eq!(tx.try_enqueue_bulk(&items), 3);
        assert_eq!(rx.try_dequeue_bulk(&mut out), 3);
        assert_eq!(out, items);
    }
}

/// Slots that were never written are never read.
#[test]
fn miri_ring_partial_fill_reads_only_written() {
    let mut ring = BoundedRing::<u64>::with_capacity(8).unwrap();
    let (mut tx, mut rx) = ring.split();
    assert_eq!(tx.try_enqueue_bulk(&[5, 6]), 2);

    let mut out = [0u64; 8];
    assert_eq!(rx.try_dequeue_bulk(&mut out), 2);
    assert_eq!(&out[..2], &[5, 6]);
    assert_eq!(rx.try_dequeue_bulk(&mut out), 0);
}

/// Handles cross threads through the ring while the payloads stay put.
#[test]
fn miri_ring_handles_across_threads() {
    let pool = ObjectPool::new(4, 8).unwrap();
    let mut batch = [Handle::NULL; 4];
    pool.acquire_bulk(&mut batch).unwrap();
    for (i, h) in batch.iter().enumerate() {
        unsafe { pool.payload_mut(*h).fill(i as u8) };
    }

    let mut ring = BoundedRing::with_capacity(2).unwrap();
    let (mut tx, mut rx) = ring.split();

    let received = thread::scope(|s| {
        s.spawn(|| {
            let mut sent = 0;
            while sent < batch.len() {
                sent += tx.try_enqueue_bulk(&batch[sent..]);
                thread::yield_now();
            }
        });
        let consumer = s.spawn(|| {
            let mut got = Vec::new();
            let mut buf = [Handle::NULL; 2];
            while got.len() < 4 {
                let n = rx.try_dequeue_bulk(&mut buf);
                got.extend_from_slice(&buf[..n]);
                thread::yield_now();
            }
            got
        });
        consumer.join().unwrap()
    });

    assert_eq!(received, batch);
    for (i, h) in received.iter().enumerate() {
        unsafe { assert!(pool.payload(*h).iter().all(|b| *b == i as u8)) };
    }
    pool.release_bulk(&received);
}

/// Zeroed allocation, payload access at every stride, copy, and dealloc.
#[test]
fn miri_pool_payload_access() {
    // 13 bytes forces padding between elements.
    let pool = ObjectPool::new(3, 13).unwrap();
    let mut handles = [Handle::NULL; 3];
    pool.acquire_bulk(&mut handles).unwrap();

    unsafe {
        for h in &handles {
            assert_eq!(pool.payload(*h), &[0u8; 13]);
        }
        pool.payload_mut(handles[0]).copy_from_slice(b"hello, world!");
        pool.copy_payload(handles[0], handles[2]);
        assert_eq!(pool.payload(handles[2]), b"hello, world!");
        assert_eq!(pool.payload(handles[1]), &[0u8; 13]);
    }

    pool.release_bulk(&handles);
    assert_eq!(pool.available(), 3);
}

/// A pool dropped with handles still issued frees its storage cleanly.
#[test]
fn miri_pool_drop_with_outstanding_handles() {
    let pool = ObjectPool::new(2, 64).unwrap();
    let mut one = [Handle::NULL; 1];
    pool.acquire_bulk(&mut one).unwrap();
    drop(pool);
}
