// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An asynchronous, cancellable, retry-and-poll loop.
//!
//! Long-running operations and replication checks are completed by repeatedly
//! querying the service until it reports a final result. This module runs such
//! loops in the background. Each attempt calls a `check` function, which
//! returns [PollStatus::Completed] with the final value, [PollStatus::InProgress]
//! if the work is not done, or an error.
//!
//! * Errors are classified by the [PollingPolicy]: permanent errors end the
//!   loop immediately and are returned unchanged. Transient errors continue
//!   the loop until the policy is exhausted, in which case the loop returns
//!   [Error::exhausted] wrapping the last error.
//! * An in-progress result counts as a failed attempt. If the policy stops the
//!   loop the result is an exhausted error with code `DEADLINE_EXCEEDED`.
//! * Between attempts the loop sleeps for
//!   [wait_period()][PollingPolicy::wait_period].
//! * The loop may be cancelled at any time. Cancellation aborts the pending
//!   attempt or timer and the loop returns [Error::cancelled], unless a final
//!   result was already recorded.
//!
//! The result is delivered exactly once.
//!
//! # Example
//! ```
//! # use google_cloud_gax::polling_loop::*;
//! # use google_cloud_gax::polling_policy::*;
//! # use google_cloud_gax::retry_policy::*;
//! # use google_cloud_gax::exponential_backoff::ExponentialBackoffBuilder;
//! # use google_cloud_gax::error::Error;
//! # tokio_test::block_on(async {
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! let policy = GenericPollingPolicy::new(
//!     AlwaysRetry.with_attempt_limit(10),
//!     ExponentialBackoffBuilder::new()
//!         .with_initial_delay(std::time::Duration::from_millis(1))
//!         .with_maximum_delay(std::time::Duration::from_millis(2))
//!         .build()?,
//! );
//! let counter = Arc::new(AtomicU32::new(0));
//! let check = move || {
//!     let counter = counter.clone();
//!     async move {
//!         if counter.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Ok::<_, Error>(PollStatus::InProgress)
//!         } else {
//!             Ok(PollStatus::Completed("done"))
//!         }
//!     }
//! };
//! let result = start_polling_loop("example", Box::new(policy), check).await?;
//! assert_eq!(result, "done");
//! # anyhow::Ok(()) }).unwrap();
//! ```

use crate::Result;
use crate::error::Error;
use crate::error::rpc::{Code, Status};
use crate::loop_state::LoopState;
use crate::polling_policy::PollingPolicy;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// The outcome of a successful `check` attempt.
#[derive(Clone, Debug)]
pub enum PollStatus<T> {
    /// The work is done, and this is its result.
    Completed(T),
    /// The work is still in progress.
    InProgress,
    /// The work finished with an error.
    ///
    /// The error is returned unchanged, the polling policy is not consulted.
    Failed(Error),
}

/// The phase of a polling loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The loop was created but has not started its first attempt.
    Idle,
    /// The loop is waiting for an attempt to complete.
    Attempting,
    /// The loop is waiting before the next attempt.
    Backoff,
    /// The loop recorded its final result.
    Done,
}

/// Starts a polling loop in the background.
///
/// The loop runs on the current tokio runtime, this function must be called
/// from within a runtime. The `name` is only used in log messages.
///
/// Dropping the returned [PollingLoop] cancels the loop.
pub fn start_polling_loop<T, F, Fut>(
    name: &'static str,
    polling_policy: Box<dyn PollingPolicy>,
    check: F,
) -> PollingLoop<T>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<PollStatus<T>>> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            phase: Phase::Idle,
            cancelled: false,
            sender: Some(sender),
        }),
        token: CancellationToken::new(),
    });
    let guard = FinishOnDrop(shared.clone());
    tokio::spawn(run(name, guard, polling_policy, check));
    PollingLoop {
        receiver,
        handle: CancelHandle(shared),
    }
}

/// A polling loop running in the background.
///
/// Await this future to obtain the result of the loop.
#[derive(Debug)]
#[must_use = "dropping the polling loop cancels it"]
pub struct PollingLoop<T> {
    receiver: oneshot::Receiver<Result<T>>,
    handle: CancelHandle,
}

impl<T> PollingLoop<T> {
    /// Requests cancellation of the loop.
    ///
    /// If the loop has not recorded a final result, it completes with a
    /// `CANCELLED` error. Calling this function more than once has no effect.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Returns a handle that can cancel this loop from other tasks.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// The current phase of the loop.
    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }
}

impl<T> Future for PollingLoop<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|r| {
            r.unwrap_or_else(|_| Err(Error::other("polling loop terminated unexpectedly")))
        })
    }
}

impl<T> Drop for PollingLoop<T> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Cancels a [PollingLoop], possibly from a different task.
#[derive(Clone)]
pub struct CancelHandle(Arc<dyn Cancel>);

impl CancelHandle {
    /// Requests cancellation of the loop.
    ///
    /// See [PollingLoop::cancel].
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// The current phase of the loop.
    pub fn phase(&self) -> Phase {
        self.0.phase()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

trait Cancel: Send + Sync {
    fn cancel(&self);
    fn phase(&self) -> Phase;
}

struct Shared<T> {
    state: Mutex<State<T>>,
    token: CancellationToken,
}

struct State<T> {
    phase: Phase,
    cancelled: bool,
    // Taking the sender is the only way to record the final result.
    sender: Option<oneshot::Sender<Result<T>>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the final result, returns `false` if one was already recorded.
    fn finish(&self, result: Result<T>) -> bool {
        let sender = {
            let mut state = self.lock();
            let sender = state.sender.take();
            if sender.is_some() {
                state.phase = Phase::Done;
            }
            sender
        };
        match sender {
            None => false,
            Some(tx) => {
                // The receiver may be gone, there is nobody to notify then.
                let _ = tx.send(result);
                true
            }
        }
    }

    /// Moves to `phase`, returns `false` if the loop is done.
    fn transition(&self, phase: Phase) -> bool {
        let mut state = self.lock();
        if state.sender.is_none() || state.cancelled {
            return false;
        }
        state.phase = phase;
        true
    }
}

impl<T: Send> Cancel for Shared<T> {
    fn cancel(&self) {
        let sender = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            let sender = state.sender.take();
            if sender.is_some() {
                state.phase = Phase::Done;
            }
            sender
        };
        self.token.cancel();
        if let Some(tx) = sender {
            let _ = tx.send(Err(Error::cancelled("polling loop cancelled")));
        }
    }

    fn phase(&self) -> Phase {
        self.lock().phase
    }
}

// Guarantees the loop completes even if the task is dropped or `check` panics.
struct FinishOnDrop<T>(Arc<Shared<T>>);

impl<T> Drop for FinishOnDrop<T> {
    fn drop(&mut self) {
        if self
            .0
            .finish(Err(Error::other("polling loop terminated unexpectedly")))
        {
            tracing::warn!("polling loop terminated without a result");
        }
    }
}

fn in_progress() -> Error {
    Error::service(
        Status::default()
            .set_code(Code::Unavailable)
            .set_message("operation in progress"),
    )
}

async fn run<T, F, Fut>(
    name: &'static str,
    guard: FinishOnDrop<T>,
    mut policy: Box<dyn PollingPolicy>,
    mut check: F,
) where
    T: Send,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    let shared = &guard.0;
    let token = shared.token.clone();
    let mut attempt_count = 0_u32;
    loop {
        if !shared.transition(Phase::Attempting) {
            tracing::debug!(name, attempt_count, "polling loop cancelled");
            return;
        }
        attempt_count += 1;
        tracing::debug!(name, attempt_count, "polling loop attempt");
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(name, attempt_count, "polling loop cancelled during attempt");
                return;
            }
            r = check() => r,
        };
        match result {
            Ok(PollStatus::Completed(value)) => {
                tracing::debug!(name, attempt_count, "polling loop completed");
                shared.finish(Ok(value));
                return;
            }
            Ok(PollStatus::Failed(e)) => {
                tracing::debug!(name, attempt_count, "polling loop completed with error: {e}");
                shared.finish(Err(e));
                return;
            }
            Ok(PollStatus::InProgress) => {
                if !policy.on_failure(&in_progress()) {
                    tracing::debug!(name, attempt_count, "polling loop exhausted while in progress");
                    shared.finish(Err(Error::exhausted("polling loop terminated by policy")));
                    return;
                }
            }
            Err(e) => match LoopState::classify(&mut policy, true, e) {
                LoopState::Permanent(e) => {
                    tracing::debug!(name, attempt_count, "polling loop permanent error: {e}");
                    shared.finish(Err(e));
                    return;
                }
                LoopState::Exhausted(e) => {
                    tracing::debug!(name, attempt_count, "polling loop exhausted: {e}");
                    shared.finish(Err(Error::exhausted(e)));
                    return;
                }
                LoopState::Continue(e) => {
                    tracing::debug!(name, attempt_count, "polling loop transient error: {e}");
                }
            },
        }
        let delay = policy.wait_period();
        if !shared.transition(Phase::Backoff) {
            tracing::debug!(name, attempt_count, "polling loop cancelled");
            return;
        }
        tracing::debug!(name, attempt_count, ?delay, "polling loop backoff");
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(name, attempt_count, "polling loop cancelled during backoff");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
