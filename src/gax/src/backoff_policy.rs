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

//! Defines traits for backoff policies and a common implementations.
//!
//! The client libraries automatically retry RPCs when (1) they fail due to
//! transient errors **and** the RPC is [idempotent], (2) or failed before an
//! RPC was started. That is, when it is safe to attempt the RPC more than once.
//!
//! Retry strategies should avoid immediately retrying an RPC, as the service
//! may need time to recover. [Exponential backoff] is a well known algorithm to
//! find an acceptable delay between retries.
//!
//! Backoff policies are stateful: each call to
//! [on_completion][BackoffPolicy::on_completion] advances the policy. Each
//! retry or polling loop starts from a fresh copy, obtained via
//! [clone_policy][BackoffPolicy::clone_policy].
//!
//! # Example
//! ```
//! # use google_cloud_gax::backoff_policy::*;
//! use google_cloud_gax::exponential_backoff::ExponentialBackoffBuilder;
//! use std::time::Duration;
//!
//! let prototype = BackoffPolicyArg::from(ExponentialBackoffBuilder::new()
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_maximum_delay(Duration::from_secs(5))
//!     .with_scaling(4.0)
//!     .build()?);
//! let mut policy = prototype.fresh();
//! assert_eq!(policy.on_completion(), Duration::from_millis(100));
//! # Ok::<(), google_cloud_gax::exponential_backoff::Error>(())
//! ```
//!
//! [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
//! [idempotent]: https://en.wikipedia.org/wiki/Idempotence

use std::sync::Arc;
use std::time::Duration;

/// Defines the trait implemented by all backoff strategies.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the delay before the next attempt, and advances the policy.
    ///
    /// This method is always called after an attempt completes without a
    /// final result.
    fn on_completion(&mut self) -> Duration;

    /// Creates a new instance of the policy, in its initial state.
    fn clone_policy(&self) -> Box<dyn BackoffPolicy>;
}

/// A helper type to use [BackoffPolicy] in client and request options.
///
/// The argument holds a prototype. Each loop obtains its own instance via
/// [fresh()][BackoffPolicyArg::fresh].
#[derive(Clone, Debug)]
pub struct BackoffPolicyArg(pub(crate) Arc<dyn BackoffPolicy>);

impl BackoffPolicyArg {
    /// Returns a new policy, in its initial state, cloned from the prototype.
    pub fn fresh(&self) -> Box<dyn BackoffPolicy> {
        self.0.clone_policy()
    }
}

impl<T: BackoffPolicy + 'static> std::convert::From<T> for BackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn BackoffPolicy>> for BackoffPolicyArg {
    fn from(value: Arc<dyn BackoffPolicy>) -> Self {
        Self(value)
    }
}
