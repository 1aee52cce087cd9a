//! Test bodies and the completion continuation handed to asynchronous ones.

use std::{
    fmt,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::errors::{BenchError, BodyError};

type Signal = (Instant, Result<(), BodyError>);

/// One-shot continuation for an asynchronous body.
///
/// Can be moved to another thread. Dropping it without calling
/// [`complete`](Completion::complete) or [`fail`](Completion::fail) aborts
/// the run with [`BenchError::CompletionDropped`].
pub struct Completion {
    tx: Sender<Signal>,
}

impl Completion {
    pub fn complete(self) {
        self.finish(Ok(()));
    }

    pub fn fail<E: Into<BodyError>>(self, err: E) {
        self.finish(Err(err.into()));
    }

    pub fn finish(self, result: Result<(), BodyError>) {
        // The receiver only goes away once the run has already been aborted.
        let _ = self.tx.send((Instant::now(), result));
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

pub enum TestBody {
    Sync(Box<dyn FnMut() -> Result<(), BodyError>>),
    Async(Box<dyn FnMut(Completion)>),
}

impl TestBody {
    pub fn sync<F>(mut body: F) -> Self
    where
        F: FnMut() + 'static,
    {
        TestBody::Sync(Box::new(move || {
            body();
            Ok(())
        }))
    }

    pub fn fallible<F>(body: F) -> Self
    where
        F: FnMut() -> Result<(), BodyError> + 'static,
    {
        TestBody::Sync(Box::new(body))
    }

    pub fn asynchronous<F>(body: F) -> Self
    where
        F: FnMut(Completion) + 'static,
    {
        TestBody::Async(Box::new(body))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, TestBody::Async(_))
    }

    /// Runs the body once and returns the elapsed seconds.
    ///
    /// A sync body completes when it returns. An async body completes when its
    /// continuation is signalled; the elapsed time ends at the signal.
    pub(crate) fn invoke(
        &mut self,
        test: &str,
        stall_timeout: Option<Duration>,
    ) -> Result<f64, BenchError> {
        match self {
            TestBody::Sync(body) => {
                let start = Instant::now();
                body().map_err(|e| BenchError::body(test, e))?;
                Ok(start.elapsed().as_secs_f64())
            }
            TestBody::Async(body) => {
                let (tx, rx) = bounded(1);
                let start = Instant::now();
                body(Completion { tx });
                let (finished_at, result) = wait_for(&rx, test, stall_timeout)?;
                result.map_err(|e| BenchError::body(test, e))?;
                Ok(finished_at.saturating_duration_since(start).as_secs_f64())
            }
        }
    }
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestBody::Sync(_) => f.write_str("TestBody::Sync"),
            TestBody::Async(_) => f.write_str("TestBody::Async"),
        }
    }
}

fn wait_for(
    rx: &Receiver<Signal>,
    test: &str,
    stall_timeout: Option<Duration>,
) -> Result<Signal, BenchError> {
    match stall_timeout {
        Some(timeout) => rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => BenchError::Stalled {
                test: test.to_string(),
                timeout,
            },
            RecvTimeoutError::Disconnected => BenchError::CompletionDropped(test.to_string()),
        }),
        None => rx
            .recv()
            .map_err(|_| BenchError::CompletionDropped(test.to_string())),
    }
}
