//! Cooperative cancellation for blocking requests.
//!
//! Every network call takes a [`CancellationToken`]. Requests run on a worker
//! thread through [`CancellationToken::run`], so a cancelled caller returns
//! while the request is still waiting on the server. The token is also checked
//! between body chunks, and it wakes a sleeping retry backoff immediately.

use std::{
    io::{self, Read},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use crate::error::{Result, UpstreamError};

/// How often a caller waiting on a worker re-checks the token.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// A cloneable handle; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.lock();
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Returns [`UpstreamError::Cancelled`] once the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(UpstreamError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks for `duration` or until the token is cancelled, whichever comes first.
    ///
    /// Returns `true` if the wait ended because of cancellation.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        // An unrepresentable deadline means waiting for cancellation only.
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = self.lock();

        while !*cancelled {
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.inner
                        .wake
                        .wait_timeout(cancelled, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => {
                    self.inner
                        .wake
                        .wait(cancelled)
                        .unwrap_or_else(PoisonError::into_inner)
                }
            };
        }

        true
    }

    /// Runs `op` on a worker thread and waits for its result.
    ///
    /// Returns [`UpstreamError::Cancelled`] as soon as the token is cancelled,
    /// even if `op` is blocked on a silent server. The abandoned worker sees
    /// the cancelled token at its next check and its result is dropped.
    pub fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        self.check()?;

        let (tx, rx) = mpsc::channel();
        let token = self.clone();
        thread::Builder::new()
            .name("tfmirror-request".into())
            .spawn(move || {
                let _ = tx.send(op(&token));
            })?;

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => self.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(UpstreamError::Io(io::Error::other(
                        "request worker exited without a result",
                    )));
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reader adapter that fails with an I/O error once the token is cancelled.
///
/// Callers map that error back to [`UpstreamError::Cancelled`] by checking the
/// token, see [`io_error`].
pub struct CancellableReader<'a, R> {
    inner: R,
    cancel: &'a CancellationToken,
}

impl<'a, R: Read> CancellableReader<'a, R> {
    pub fn new(inner: R, cancel: &'a CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("operation cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Converts an I/O error raised while reading a body, preferring `Cancelled`.
pub fn io_error(cancel: &CancellationToken, err: io::Error) -> UpstreamError {
    if cancel.is_cancelled() {
        UpstreamError::Cancelled
    } else {
        UpstreamError::Io(err)
    }
}
