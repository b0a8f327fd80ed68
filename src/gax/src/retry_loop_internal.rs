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

//! The retry loop used by client libraries to retry a single RPC.

use super::Result;
use super::backoff_policy::BackoffPolicy;
use super::error::Error;
use super::loop_state::LoopState;
use super::retry_policy::RetryPolicy;
use std::future::Future;
use std::time::Duration;

/// Runs the retry loop for a given function.
///
/// This functions calls an inner function as long as (1) the retry policy has
/// not expired, (2) the inner function has not returned a successful response,
/// and (3) the inner function has not returned a permanent error.
///
/// In between calls the function waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement any sleep.
///
/// Permanent errors are returned unchanged. If the retry policy is exhausted
/// the function returns [Error::exhausted] wrapping the last error.
pub async fn retry_loop<F, Fut, S, SFut, Response>(
    mut inner: F,
    sleep: S,
    idempotent: bool,
    mut retry_policy: Box<dyn RetryPolicy>,
    mut backoff_policy: Box<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Response>> + Send,
    S: Fn(Duration) -> SFut + Send,
    SFut: Future<Output = ()> + Send,
{
    let mut attempt_count = 0_u32;
    loop {
        attempt_count += 1;
        let error = match inner().await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        match on_error(&mut retry_policy, idempotent, attempt_count, error) {
            Ok(prev_error) => {
                let delay = backoff_policy.on_completion();
                tracing::debug!(
                    attempt_count,
                    ?delay,
                    "retrying after transient error: {prev_error}"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Runs the retry loop for a given blocking function.
///
/// The semantics are the same as [retry_loop], the caller's thread is blocked
/// while waiting between attempts.
pub fn retry_loop_blocking<F, S, Response>(
    mut inner: F,
    sleep: S,
    idempotent: bool,
    mut retry_policy: Box<dyn RetryPolicy>,
    mut backoff_policy: Box<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: FnMut() -> Result<Response>,
    S: Fn(Duration),
{
    let mut attempt_count = 0_u32;
    loop {
        attempt_count += 1;
        let error = match inner() {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        match on_error(&mut retry_policy, idempotent, attempt_count, error) {
            Ok(prev_error) => {
                let delay = backoff_policy.on_completion();
                tracing::debug!(
                    attempt_count,
                    ?delay,
                    "retrying after transient error: {prev_error}"
                );
                sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

// Returns `Ok(error)` if the loop should continue, `Err(final_error)` if not.
fn on_error(
    retry_policy: &mut Box<dyn RetryPolicy>,
    idempotent: bool,
    attempt_count: u32,
    error: Error,
) -> std::result::Result<Error, Error> {
    match LoopState::classify(retry_policy, idempotent, error) {
        LoopState::Continue(e) => Ok(e),
        LoopState::Permanent(e) => {
            tracing::debug!(attempt_count, "permanent error: {e}");
            Err(e)
        }
        LoopState::Exhausted(e) => {
            tracing::debug!(attempt_count, "retry policy exhausted: {e}");
            Err(Error::exhausted(e))
        }
    }
}
