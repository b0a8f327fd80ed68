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

//! Polling and retry loop control types.
//!
//! This module contains types to control polling loops and retry loops.
//! Applications only need to use these types when implementing their own retry
//! and polling policies.

use crate::error::Error;
use crate::retry_policy::RetryPolicy;

/// The result of a loop control decision.
#[derive(Debug)]
pub enum LoopState {
    /// The error is non-retryable, stop the loop.
    Permanent(Error),

    /// The error is retryable, but the policy is stopping the loop.
    ///
    /// Loop control policies may stop the loop on retryable errors, for
    /// example, because the policy only allows a limited number of attempts.
    Exhausted(Error),

    /// The error was retryable, continue the loop.
    Continue(Error),
}

impl LoopState {
    /// Classifies an error returned by one attempt of a loop.
    ///
    /// The error is permanent if the policy says so, or if the operation is
    /// not idempotent and the error may have happened after the request
    /// reached the service. Otherwise the policy records the failure and
    /// decides if the loop continues.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gax::loop_state::LoopState;
    /// # use google_cloud_gax::retry_policy::*;
    /// # use google_cloud_gax::error::{Error, rpc::{Code, Status}};
    /// let mut policy = RetryableErrors.with_attempt_limit(2);
    /// let unavailable = || Error::service(Status::default().set_code(Code::Unavailable));
    /// assert!(LoopState::classify(&mut policy, true, unavailable()).is_continue());
    /// assert!(LoopState::classify(&mut policy, true, unavailable()).is_exhausted());
    /// assert!(LoopState::classify(&mut policy, false, unavailable()).is_permanent());
    /// ```
    pub fn classify<P>(policy: &mut P, idempotent: bool, error: Error) -> Self
    where
        P: RetryPolicy + ?Sized,
    {
        if policy.is_permanent_failure(&error)
            || (!idempotent && !error.is_transient_and_before_rpc())
        {
            return Self::Permanent(error);
        }
        if policy.on_failure(&error) {
            Self::Continue(error)
        } else {
            Self::Exhausted(error)
        }
    }

    /// Consumes the state, returning the error it carries.
    pub fn into_error(self) -> Error {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::Continue(e) => e,
        }
    }

    pub fn is_permanent(&self) -> bool {
        match &self {
            Self::Permanent(_) => true,
            Self::Exhausted(_) | Self::Continue(_) => false,
        }
    }
    pub fn is_exhausted(&self) -> bool {
        match &self {
            Self::Exhausted(_) => true,
            Self::Permanent(_) | Self::Continue(_) => false,
        }
    }
    pub fn is_continue(&self) -> bool {
        match &self {
            Self::Continue(_) => true,
            Self::Permanent(_) | Self::Exhausted(_) => false,
        }
    }
}
