// Copyright 2025 Google LLC
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

//! Batches single-row mutations into `MutateRows` requests.
//!
//! The [MutationBatcher] accumulates mutations into batches and sends each
//! batch as soon as it is non-empty and the number of batches in flight is
//! below the configured limit. Flow control bounds both the number of batches
//! in flight and the total size of the mutations admitted but not completed.
//!
//! Each call to [apply()][MutationBatcher::apply] returns two futures:
//! * [Admission] resolves once the mutation is accepted into a batch. Callers
//!   should wait for admission before applying more mutations, this is how the
//!   batcher pushes back when the service cannot keep up.
//! * [Completion] resolves with the outcome of the mutation.
//!
//! Mutations are admitted in the order they were applied.

use crate::Result;
use crate::model::SingleRowMutation;
use crate::options::BatcherOptions;
use crate::stub::BigtableStub;
use gax::call_context::CallContext;
use gax::error::Error;
use gax::error::rpc::{Code, Status};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub(crate) mod batch;

use batch::{Batch, Completions, PendingMutation};

/// Batches mutations for a single table.
///
/// The batcher sends requests in background tasks, it must be used from
/// within a tokio runtime.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::batcher::MutationBatcher;
/// # use google_cloud_bigtable::model::{Mutation, SingleRowMutation};
/// # async fn sample(batcher: &MutationBatcher) -> google_cloud_bigtable::Result<()> {
/// let mut completions = Vec::new();
/// for i in 0..100 {
///     let mutation = SingleRowMutation::new(
///         format!("row-{i}"),
///         [Mutation::set_cell("cf", "greeting", 0, "hello")],
///     );
///     let (admission, completion) = batcher.apply(mutation).into_parts();
///     admission.await;
///     completions.push(completion);
/// }
/// for c in completions {
///     c.await?;
/// }
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct MutationBatcher {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    stub: Arc<dyn BigtableStub>,
    table_name: String,
    app_profile_id: String,
    options: BatcherOptions,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    // The size of the mutations admitted but not completed.
    outstanding_size: usize,
    num_outstanding_batches: usize,
    // Applied (and valid) mutations not yet completed, including those
    // waiting for admission.
    num_requests_pending: usize,
    cur_batch: Batch,
    pending_mutations: VecDeque<PendingMutation>,
    no_more_pending: Vec<oneshot::Sender<()>>,
}

// The actions to run once the state lock is released.
#[derive(Default)]
struct Deferred {
    admissions: Vec<oneshot::Sender<()>>,
    batches: Vec<Batch>,
    no_more_pending: Vec<oneshot::Sender<()>>,
}

impl MutationBatcher {
    pub fn new<T: Into<String>>(
        stub: Arc<dyn BigtableStub>,
        table_name: T,
        options: BatcherOptions,
    ) -> Self {
        Self::with_app_profile(stub, table_name, String::new(), options)
    }

    pub(crate) fn with_app_profile<T: Into<String>>(
        stub: Arc<dyn BigtableStub>,
        table_name: T,
        app_profile_id: String,
        options: BatcherOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                stub,
                table_name: table_name.into(),
                app_profile_id,
                options,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Applies a mutation through the batcher.
    ///
    /// Invalid mutations complete with an `INVALID_ARGUMENT` error, and are
    /// admitted immediately, before this function returns.
    pub fn apply(&self, mutation: SingleRowMutation) -> BatchedMutation {
        let (admission_tx, admission_rx) = oneshot::channel();
        let (completion_tx, completion_rx) = oneshot::channel();
        let handle = BatchedMutation {
            admission: Admission(admission_rx),
            completion: Completion(completion_rx),
        };
        let pending = PendingMutation::new(mutation, admission_tx, completion_tx);
        if let Err(e) = self.inner.validate(&pending) {
            tracing::debug!(
                table_name = %self.inner.table_name,
                "rejecting mutation: {e}"
            );
            let _ = pending.completion.send(Err(e));
            let _ = pending.admission.send(());
            return handle;
        }
        let deferred = {
            let mut state = self.inner.lock();
            state.num_requests_pending += 1;
            if !state.pending_mutations.is_empty()
                || !self.inner.has_space_for(&state, &pending)
            {
                state.pending_mutations.push_back(pending);
                return handle;
            }
            let mut deferred = Deferred::default();
            self.inner.admit(&mut state, pending, &mut deferred);
            self.inner.flush_if_possible(&mut state, &mut deferred);
            deferred
        };
        self.inner.clone().run(deferred);
        handle
    }

    /// Returns a future that resolves once all the mutations applied so far
    /// are completed.
    ///
    /// Mutations applied after this function returns are not waited on. That
    /// is, if new mutations are applied the future may resolve while they are
    /// still pending.
    pub fn wait_for_no_pending_requests(&self) -> impl Future<Output = ()> + Send + 'static {
        let rx = {
            let mut state = self.inner.lock();
            if state.num_requests_pending == 0 {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.no_more_pending.push(tx);
                Some(rx)
            }
        };
        async move {
            if let Some(rx) = rx {
                let _ = rx.await;
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn validate(&self, pending: &PendingMutation) -> Result<()> {
        let options = &self.options;
        if pending.num_mutations > options.max_mutations_per_batch {
            return Err(invalid_argument(format!(
                "too many mutations in a SingleRowMutation request: {} > {}",
                pending.num_mutations, options.max_mutations_per_batch
            )));
        }
        if pending.num_mutations == 0 {
            return Err(invalid_argument(
                "supplied SingleRowMutation has no entries".to_string(),
            ));
        }
        if pending.request_size > options.max_size_per_batch
            || pending.request_size > options.max_outstanding_size
        {
            return Err(invalid_argument(format!(
                "too large SingleRowMutation: {} bytes",
                pending.request_size
            )));
        }
        Ok(())
    }

    fn has_space_for(&self, state: &State, pending: &PendingMutation) -> bool {
        let options = &self.options;
        state.outstanding_size + pending.request_size <= options.max_outstanding_size
            && state.cur_batch.requests_size() + pending.request_size
                <= options.max_size_per_batch
            && state.cur_batch.num_mutations() + pending.num_mutations
                <= options.max_mutations_per_batch
    }

    fn admit(&self, state: &mut State, pending: PendingMutation, deferred: &mut Deferred) {
        state.outstanding_size += pending.request_size;
        deferred.admissions.push(state.cur_batch.push(pending));
    }

    /// Moves the current batch to `deferred` if it can be sent now.
    fn flush_if_possible(&self, state: &mut State, deferred: &mut Deferred) -> bool {
        if state.cur_batch.is_empty()
            || state.num_outstanding_batches >= self.options.max_batches
        {
            return false;
        }
        state.num_outstanding_batches += 1;
        deferred.batches.push(state.cur_batch.take());
        true
    }

    /// Admits pending mutations, in order, while there is space for them.
    fn try_admit(&self, state: &mut State, deferred: &mut Deferred) {
        loop {
            while let Some(front) = state.pending_mutations.front() {
                if !self.has_space_for(state, front) {
                    break;
                }
                let Some(pending) = state.pending_mutations.pop_front() else {
                    break;
                };
                self.admit(state, pending, deferred);
            }
            if !self.flush_if_possible(state, deferred) {
                break;
            }
        }
    }

    /// Completes the callers waiting on `deferred` and sends its batches.
    ///
    /// Must be called without holding the state lock.
    fn run(self: Arc<Self>, deferred: Deferred) {
        for tx in deferred.admissions {
            // The user may have dropped the handle, so it is ok if this fails.
            let _ = tx.send(());
        }
        for tx in deferred.no_more_pending {
            let _ = tx.send(());
        }
        if deferred.batches.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // Only reachable while a runtime shuts down and drops a batch.
            tracing::warn!(
                table_name = %self.table_name,
                "no runtime to send MutateRows batches, failing them"
            );
            for batch in deferred.batches {
                let (_, completions) = batch.into_request(&self.table_name, &self.app_profile_id);
                self.clone().on_batch_complete(
                    completions,
                    Err(Error::other("no runtime available to send the batch")),
                );
            }
            return;
        };
        for batch in deferred.batches {
            runtime.spawn(self.clone().send(batch));
        }
    }

    async fn send(self: Arc<Self>, batch: Batch) {
        let (request, completions) = batch.into_request(&self.table_name, &self.app_profile_id);
        tracing::debug!(
            table_name = %self.table_name,
            entries = request.entries.len(),
            "sending MutateRows batch"
        );
        let in_flight = BatchInFlight {
            inner: self.clone(),
            completions: Some(completions),
        };
        let result = self
            .stub
            .async_mutate_rows(CallContext::new(), request)
            .await;
        in_flight.complete(result);
    }

    fn on_batch_complete(
        self: Arc<Self>,
        completions: Completions,
        result: Result<crate::model::MutateRowsResponse>,
    ) {
        let requests_size = completions.requests_size();
        let num_requests = completions.len();
        completions.complete(result);
        let deferred = {
            let mut state = self.lock();
            state.outstanding_size -= requests_size;
            state.num_requests_pending -= num_requests;
            state.num_outstanding_batches -= 1;
            let mut deferred = Deferred::default();
            self.flush_if_possible(&mut state, &mut deferred);
            self.try_admit(&mut state, &mut deferred);
            if state.num_requests_pending == 0 {
                deferred.no_more_pending = std::mem::take(&mut state.no_more_pending);
            }
            deferred
        };
        self.run(deferred);
    }
}

/// Releases the budget of a batch in flight.
///
/// If the request never produces a result, because the stub panics or the task
/// is dropped, the mutations fail and the batcher moves on to the next batch.
struct BatchInFlight {
    inner: Arc<Inner>,
    completions: Option<Completions>,
}

impl BatchInFlight {
    fn complete(mut self, result: Result<crate::model::MutateRowsResponse>) {
        if let Some(completions) = self.completions.take() {
            self.inner.clone().on_batch_complete(completions, result);
        }
    }
}

impl Drop for BatchInFlight {
    fn drop(&mut self) {
        let Some(completions) = self.completions.take() else {
            return;
        };
        tracing::warn!(
            table_name = %self.inner.table_name,
            "MutateRows batch terminated without a result"
        );
        self.inner.clone().on_batch_complete(
            completions,
            Err(Error::other("the batch was dropped before completing")),
        );
    }
}

fn invalid_argument(message: String) -> Error {
    Error::service(
        Status::default()
            .set_code(Code::InvalidArgument)
            .set_message(message),
    )
}

/// The futures returned by [MutationBatcher::apply].
#[derive(Debug)]
#[must_use]
pub struct BatchedMutation {
    /// Resolves once the mutation is admitted into a batch.
    pub admission: Admission,
    /// Resolves with the outcome of the mutation.
    pub completion: Completion,
}

impl BatchedMutation {
    pub fn into_parts(self) -> (Admission, Completion) {
        (self.admission, self.completion)
    }
}

/// Resolves once a mutation is admitted into a batch.
///
/// Dropping this future has no effect on the mutation.
#[derive(Debug)]
pub struct Admission(oneshot::Receiver<()>);

impl Future for Admission {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the batcher is gone, there is nothing to wait for.
        Pin::new(&mut self.0).poll(cx).map(|_| ())
    }
}

/// Resolves with the outcome of a mutation.
///
/// Dropping this future does not cancel the mutation.
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<Result<()>>);

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|r| {
            r.unwrap_or_else(|_| Err(Error::other("the batch was dropped before completing")))
        })
    }
}
