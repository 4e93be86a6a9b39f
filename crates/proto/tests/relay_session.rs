//! Relay Session Integration Tests
//!
//! Exercises the byte shuttle with concurrent bidirectional traffic and
//! checks accounting, teardown and delegate semantics.

#![cfg(feature = "relay")]

use rand::RngCore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strix_proto::relay::{Session, SessionDelegate};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct CountingDelegate {
    finished: AtomicUsize,
}

impl CountingDelegate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            finished: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl SessionDelegate for CountingDelegate {
    fn on_session_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

async fn wait_for_finish(delegate: &CountingDelegate) {
    for _ in 0..200 {
        if delegate.count() > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn bidirectional_transfer_preserves_bytes() {
    const A_TO_B: usize = 10 * 1024 * 1024;
    const B_TO_A: usize = 3 * 1024 * 1024;

    let (a_near, a_far) = tokio::io::duplex(64 * 1024);
    let (b_near, b_far) = tokio::io::duplex(64 * 1024);

    let delegate = CountingDelegate::new();
    let mut session = Session::new((a_near, b_near));
    session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);

    let mut a_data = vec![0u8; A_TO_B];
    rand::thread_rng().fill_bytes(&mut a_data);
    let mut b_data = vec![0u8; B_TO_A];
    rand::thread_rng().fill_bytes(&mut b_data);

    let (mut a_read, mut a_write) = tokio::io::split(a_far);
    let (mut b_read, mut b_write) = tokio::io::split(b_far);

    // Writers and readers all run concurrently so neither direction can
    // stall the other on transport backpressure.
    let a_payload = a_data.clone();
    let writer_a = tokio::spawn(async move {
        a_write.write_all(&a_payload).await.unwrap();
        a_write
    });
    let b_payload = b_data.clone();
    let writer_b = tokio::spawn(async move {
        b_write.write_all(&b_payload).await.unwrap();
        b_write
    });

    let reader_b = tokio::spawn(async move {
        let mut received = vec![0u8; A_TO_B];
        b_read.read_exact(&mut received).await.unwrap();
        received
    });
    let reader_a = tokio::spawn(async move {
        let mut received = vec![0u8; B_TO_A];
        a_read.read_exact(&mut received).await.unwrap();
        received
    });

    assert_eq!(reader_b.await.unwrap(), a_data);
    assert_eq!(reader_a.await.unwrap(), b_data);
    let mut a_write = writer_a.await.unwrap();
    let _b_write = writer_b.await.unwrap();

    // Read-side accounting: every byte was counted exactly once.
    assert_eq!(session.bytes_transferred(), (A_TO_B + B_TO_A) as i64);
    assert_eq!(delegate.count(), 0);

    // One side closing ends the session with exactly one notification.
    a_write.shutdown().await.unwrap();
    wait_for_finish(&delegate).await;
    assert_eq!(delegate.count(), 1);

    // Late stops change nothing.
    session.stop();
    session.stop();
    assert_eq!(delegate.count(), 1);
}

#[tokio::test]
async fn stop_during_transfer_is_silent() {
    let (a_near, a_far) = tokio::io::duplex(8 * 1024);
    let (b_near, b_far) = tokio::io::duplex(8 * 1024);

    let delegate = CountingDelegate::new();
    let mut session = Session::new((a_near, b_near));
    session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);

    let (_a_read, mut a_write) = tokio::io::split(a_far);
    let (mut b_read, _b_write) = tokio::io::split(b_far);

    // Keep traffic flowing while the stop lands.
    let writer = tokio::spawn(async move {
        let chunk = [0x5au8; 1024];
        loop {
            if a_write.write_all(&chunk).await.is_err() {
                return;
            }
            tokio::task::yield_now().await;
        }
    });
    let reader = tokio::spawn(async move {
        let mut sink = [0u8; 1024];
        while b_read.read(&mut sink).await.unwrap_or(0) > 0 {}
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    session.stop();

    // In-flight completions observe the stop and unwind without callbacks.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(delegate.count(), 0);

    writer.abort();
    reader.abort();
}

#[tokio::test]
async fn duration_tracks_session_lifetime() {
    let (a_near, _a_far) = tokio::io::duplex(64);
    let (b_near, _b_far) = tokio::io::duplex(64);

    let mut session = Session::new((a_near, b_near));
    assert_eq!(session.duration(), 0);

    session.start(CountingDelegate::new());
    assert!(session.duration() <= 1);

    session.stop();
}

#[tokio::test]
async fn drop_stops_the_session() {
    let (a_near, a_far) = tokio::io::duplex(64);
    let (b_near, _b_far) = tokio::io::duplex(64);

    let delegate = CountingDelegate::new();
    {
        let mut session = Session::new((a_near, b_near));
        session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);
    }

    // The session was dropped; a peer close afterwards reaches nobody.
    drop(a_far);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(delegate.count(), 0);
}
