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

//! Defines the trait for polling policies and some common implementations.
//!
//! The client libraries automatically poll long-running operations (LROs) and
//! replication checks. These loops need to (1) distinguish between transient
//! and permanent errors, (2) limit the polling loop duration, and (3) wait
//! between attempts.
//!
//! A polling policy combines the responsibilities of a
//! [RetryPolicy][crate::retry_policy::RetryPolicy] and a
//! [BackoffPolicy][crate::backoff_policy::BackoffPolicy]. The most common
//! implementation simply composes one of each.
//!
//! # Example:
//! ```
//! # use google_cloud_gax::polling_policy::*;
//! # use google_cloud_gax::retry_policy::*;
//! # use google_cloud_gax::exponential_backoff::ExponentialBackoffBuilder;
//! use std::time::Duration;
//! // Poll for at most 15 minutes or at most 50 attempts: whichever limit
//! // is reached first stops the polling loop.
//! let policy = GenericPollingPolicy::new(
//!     RetryableErrors
//!         .with_time_limit(Duration::from_secs(15 * 60))
//!         .with_attempt_limit(50),
//!     ExponentialBackoffBuilder::new()
//!         .with_initial_delay(Duration::from_secs(1))
//!         .with_maximum_delay(Duration::from_secs(30))
//!         .clamp(),
//! );
//! let prototype = PollingPolicyArg::from(policy);
//! let mut fresh = prototype.fresh();
//! assert_eq!(fresh.wait_period(), Duration::from_secs(1));
//! ```

use crate::backoff_policy::BackoffPolicy;
use crate::error::Error;
use crate::retry_policy::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Determines how errors are handled in the polling loop, and how long to wait
/// between attempts.
pub trait PollingPolicy: Send + Sync + std::fmt::Debug {
    /// Records a failed, or incomplete, attempt.
    ///
    /// Returns `true` if the loop may continue.
    fn on_failure(&mut self, error: &Error) -> bool;

    /// Returns `true` if the policy has no budget left.
    fn is_exhausted(&self) -> bool;

    /// Returns `true` if polling again after `error` cannot succeed.
    fn is_permanent_failure(&self, error: &Error) -> bool;

    /// Returns the delay before the next attempt, and advances the policy.
    fn wait_period(&mut self) -> Duration;

    /// Creates a new instance of the policy, in its initial state.
    fn clone_policy(&self) -> Box<dyn PollingPolicy>;
}

// A polling policy can drive any code that classifies errors with a retry
// policy, e.g. [LoopState::classify][crate::loop_state::LoopState::classify].
impl RetryPolicy for Box<dyn PollingPolicy> {
    fn on_failure(&mut self, error: &Error) -> bool {
        self.as_mut().on_failure(error)
    }
    fn is_exhausted(&self) -> bool {
        self.as_ref().is_exhausted()
    }
    fn is_permanent_failure(&self, error: &Error) -> bool {
        self.as_ref().is_permanent_failure(error)
    }
    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.as_ref().clone_policy())
    }
}

/// A polling policy composed of a retry policy and a backoff policy.
///
/// The retry policy classifies errors and limits the loop, the backoff policy
/// computes the wait periods.
#[derive(Debug)]
pub struct GenericPollingPolicy {
    retry: Box<dyn RetryPolicy>,
    backoff: Box<dyn BackoffPolicy>,
}

impl GenericPollingPolicy {
    /// Creates a new polling policy.
    pub fn new<R, B>(retry: R, backoff: B) -> Self
    where
        R: RetryPolicy + 'static,
        B: BackoffPolicy + 'static,
    {
        Self {
            retry: Box::new(retry),
            backoff: Box::new(backoff),
        }
    }
}

impl PollingPolicy for GenericPollingPolicy {
    fn on_failure(&mut self, error: &Error) -> bool {
        self.retry.on_failure(error)
    }

    fn is_exhausted(&self) -> bool {
        self.retry.is_exhausted()
    }

    fn is_permanent_failure(&self, error: &Error) -> bool {
        self.retry.is_permanent_failure(error)
    }

    fn wait_period(&mut self) -> Duration {
        self.backoff.on_completion()
    }

    fn clone_policy(&self) -> Box<dyn PollingPolicy> {
        Box::new(Self {
            retry: self.retry.clone_policy(),
            backoff: self.backoff.clone_policy(),
        })
    }
}

/// A helper type to use [PollingPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct PollingPolicyArg(pub(crate) Arc<dyn PollingPolicy>);

impl PollingPolicyArg {
    /// Returns a new policy, in its initial state, cloned from the prototype.
    pub fn fresh(&self) -> Box<dyn PollingPolicy> {
        self.0.clone_policy()
    }
}

impl<T> std::convert::From<T> for PollingPolicyArg
where
    T: PollingPolicy + 'static,
{
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingPolicy>> for PollingPolicyArg {
    fn from(value: Arc<dyn PollingPolicy>) -> Self {
        Self(value)
    }
}
