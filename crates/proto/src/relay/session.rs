//! Bidirectional byte shuttle between two connections.
//!
//! One shuttle runs per direction: read up to the buffer size from one
//! side, write exactly those bytes to the other, repeat. The two directions
//! are independent and interleave freely; within a direction reads and
//! writes strictly alternate.
//!
//! Teardown is driven by a one-shot stop flag: the first failure (or
//! [`Session::stop`]) wins it, every later completion observes the flag and
//! unwinds silently. The delegate is therefore notified at most once per
//! session, and never after `stop`.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Per-direction read buffer size.
pub const READ_BUFFER_SIZE: usize = 8192;

/// Observer of session termination.
pub trait SessionDelegate: Send + Sync {
    /// Called once when the session ends for any reason other than an
    /// explicit [`Session::stop`].
    fn on_session_finished(&self);
}

struct Shared {
    stopped: AtomicBool,
    bytes_transferred: AtomicI64,
    delegate: Mutex<Option<Arc<dyn SessionDelegate>>>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    // First terminal event wins the stop flag; everyone else unwinds
    // silently.
    fn finish(&self, side: usize, error: Option<&std::io::Error>) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        match error {
            Some(error) => error!(side = side, error = %error, "relay connection error"),
            None => info!(side = side, "relay connection closed"),
        }

        let delegate = match self.delegate.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        let _ = self.shutdown.send(true);

        if let Some(delegate) = delegate {
            delegate.on_session_finished();
        }
    }
}

/// Relay session splicing two connections.
///
/// The session owns both connections. [`Session::stop`] is idempotent and
/// implied by drop; after it, no delegate callback can fire.
pub struct Session<S> {
    sides: Option<(S, S)>,
    start_time: Option<Instant>,
    shared: Arc<Shared>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Creates a session over a pair of connected streams.
    pub fn new(sides: (S, S)) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sides: Some(sides),
            start_time: None,
            shared: Arc::new(Shared {
                stopped: AtomicBool::new(false),
                bytes_transferred: AtomicI64::new(0),
                delegate: Mutex::new(None),
                shutdown,
            }),
        }
    }

    /// Starts shuttling in both directions.
    ///
    /// The delegate is notified once if the session dies on its own; it is
    /// dropped without notification on [`Session::stop`].
    pub fn start(&mut self, delegate: Arc<dyn SessionDelegate>) {
        let (first, second) = match self.sides.take() {
            Some(sides) => sides,
            None => {
                warn!("session already started");
                return;
            }
        };

        info!("starting relay session");
        self.start_time = Some(Instant::now());

        if let Ok(mut guard) = self.shared.delegate.lock() {
            *guard = Some(delegate);
        }

        let (first_read, first_write) = tokio::io::split(first);
        let (second_read, second_write) = tokio::io::split(second);

        let shared = Arc::clone(&self.shared);
        let shutdown = self.shared.shutdown.subscribe();
        tokio::spawn(shuttle(first_read, second_write, shared, 0, shutdown));

        let shared = Arc::clone(&self.shared);
        let shutdown = self.shared.shutdown.subscribe();
        tokio::spawn(shuttle(second_read, first_write, shared, 1, shutdown));
    }

    /// Stops the session and closes both connections. Idempotent.
    pub fn stop(&mut self) {
        // The delegate goes first so that completions racing with the stop
        // cannot observe it.
        if let Ok(mut guard) = self.shared.delegate.lock() {
            guard.take();
        }

        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.shared.shutdown.send(true);
        info!("session stopped");
    }

    /// Seconds elapsed since [`Session::start`].
    pub fn duration(&self) -> u64 {
        self.start_time
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Total bytes shuttled, counted on the read side of each direction.
    pub fn bytes_transferred(&self) -> i64 {
        self.shared.bytes_transferred.load(Ordering::Relaxed)
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shared.delegate.lock() {
            guard.take();
        }
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            let _ = self.shared.shutdown.send(true);
        }
    }
}

async fn shuttle<R, W>(
    mut reader: R,
    mut writer: W,
    shared: Arc<Shared>,
    side: usize,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read_result = tokio::select! {
            _ = shutdown.changed() => return,
            result = reader.read(&mut buffer) => result,
        };

        match read_result {
            Ok(0) => {
                shared.finish(side, None);
                return;
            }
            Ok(n) => {
                shared
                    .bytes_transferred
                    .fetch_add(n as i64, Ordering::Relaxed);

                let write_result = tokio::select! {
                    _ = shutdown.changed() => return,
                    result = writer.write_all(&buffer[..n]) => result,
                };

                if let Err(error) = write_result {
                    shared.finish(side, Some(&error));
                    return;
                }
            }
            Err(error) => {
                shared.finish(side, Some(&error));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

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

    #[tokio::test]
    async fn test_duration_zero_before_start() {
        let (a, _a_far) = tokio::io::duplex(64);
        let (b, _b_far) = tokio::io::duplex(64);
        let session = Session::new((a, b));
        assert_eq!(session.duration(), 0);
        assert_eq!(session.bytes_transferred(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (a, _a_far) = tokio::io::duplex(64);
        let (b, _b_far) = tokio::io::duplex(64);
        let mut session = Session::new((a, b));
        session.stop();
        session.stop();
        session.stop();
    }

    #[tokio::test]
    async fn test_forwards_in_both_directions() {
        let (a, a_far) = tokio::io::duplex(1024);
        let (b, b_far) = tokio::io::duplex(1024);

        let mut session = Session::new((a, b));
        session.start(CountingDelegate::new());

        let (mut a_read, mut a_write) = tokio::io::split(a_far);
        let (mut b_read, mut b_write) = tokio::io::split(b_far);

        a_write.write_all(b"from a").await.unwrap();
        let mut received = [0u8; 6];
        b_read.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"from a");

        b_write.write_all(b"from b").await.unwrap();
        a_read.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"from b");

        assert_eq!(session.bytes_transferred(), 12);
    }

    #[tokio::test]
    async fn test_delegate_notified_once_on_peer_close() {
        let (a, a_far) = tokio::io::duplex(64);
        let (b, _b_far) = tokio::io::duplex(64);

        let delegate = CountingDelegate::new();
        let mut session = Session::new((a, b));
        session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);

        drop(a_far);

        // Wait for the shuttle to observe the close.
        for _ in 0..100 {
            if delegate.count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delegate.count(), 1);

        // Late stops must not produce further callbacks.
        session.stop();
        session.stop();
        assert_eq!(delegate.count(), 1);
    }

    #[tokio::test]
    async fn test_stop_inhibits_delegate() {
        let (a, a_far) = tokio::io::duplex(64);
        let (b, _b_far) = tokio::io::duplex(64);

        let delegate = CountingDelegate::new();
        let mut session = Session::new((a, b));
        session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);

        session.stop();
        drop(a_far);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(delegate.count(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (a, _a_far) = tokio::io::duplex(64);
        let (b, _b_far) = tokio::io::duplex(64);

        let delegate = CountingDelegate::new();
        let mut session = Session::new((a, b));
        session.start(Arc::clone(&delegate) as Arc<dyn SessionDelegate>);
        session.start(delegate);
    }
}
