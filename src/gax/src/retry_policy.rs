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

//! Defines traits for retry policies and some common implementations.
//!
//! The client libraries automatically retry RPCs when they fail due to
//! transient errors and the RPC is idempotent, that is, it is safe to perform
//! the RPC more than once.
//!
//! Applications may override the default behavior and maybe retry operations
//! that, while not safe in general, may be safe given how the application
//! manages resources.
//!
//! Retry policies are stateful: they count failures, or track a deadline. The
//! client libraries keep a prototype of each policy (see [RetryPolicyArg]) and
//! start every retry loop with a fresh copy.
//!
//! # Example
//! ```
//! # use google_cloud_gax::retry_policy::*;
//! use std::time::Duration;
//! let prototype = RetryPolicyArg::from(
//!     RetryableErrors
//!         .with_time_limit(Duration::from_secs(60))
//!         .with_attempt_limit(5),
//! );
//! let policy = prototype.fresh();
//! assert!(!policy.is_exhausted());
//! ```

use crate::error::Error;
use crate::error::rpc::Code;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Determines how errors are handled in a retry loop.
///
/// Implementations of this trait decide (1) if an error is permanent, that is,
/// retrying the request will not change the outcome, and (2) if the loop has
/// run out of budget, e.g., too many attempts or too much time.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Records a failed attempt.
    ///
    /// Returns `true` if the loop may continue, `false` if the policy is
    /// exhausted.
    fn on_failure(&mut self, error: &Error) -> bool;

    /// Returns `true` if the policy has no budget left.
    fn is_exhausted(&self) -> bool;

    /// Returns `true` if retrying after `error` cannot succeed.
    fn is_permanent_failure(&self, error: &Error) -> bool;

    /// Creates a new instance of the policy, with a fresh budget.
    fn clone_policy(&self) -> Box<dyn RetryPolicy>;
}

impl RetryPolicy for Box<dyn RetryPolicy> {
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
        self.as_ref().clone_policy()
    }
}

/// Extension trait for [RetryPolicy].
pub trait RetryPolicyExt: RetryPolicy + Sized + 'static {
    /// Decorate a [RetryPolicy] to limit the total elapsed time in the retry
    /// loop.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gax::retry_policy::*;
    /// use std::time::Duration;
    /// let policy = AlwaysRetry.with_time_limit(Duration::from_secs(10));
    /// assert!(!policy.is_exhausted());
    /// ```
    fn with_time_limit(self, maximum_duration: Duration) -> LimitedElapsedTime {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [RetryPolicy] to limit the number of attempts.
    ///
    /// The loop makes at most `maximum_attempts` attempts, that is, it stops
    /// after `maximum_attempts` failures.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gax::retry_policy::*;
    /// # use google_cloud_gax::error::Error;
    /// let mut policy = AlwaysRetry.with_attempt_limit(2);
    /// assert!(policy.on_failure(&Error::io("transient")));
    /// assert!(!policy.on_failure(&Error::io("transient")));
    /// assert!(policy.is_exhausted());
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: RetryPolicy + 'static> RetryPolicyExt for T {}

/// A retry policy that retries the errors that are usually transient.
///
/// The policy treats the `UNAVAILABLE`, `RESOURCE_EXHAUSTED`, and
/// `DEADLINE_EXCEEDED` codes, I/O errors, timeouts, and errors that happened
/// before the request was sent as retryable. All other errors are permanent.
///
/// This policy is never exhausted, it should be decorated to limit the number
/// of attempts or the duration of the retry loop.
///
/// # Example
/// ```
/// # use google_cloud_gax::retry_policy::*;
/// # use google_cloud_gax::error::{Error, rpc::{Code, Status}};
/// let policy = RetryableErrors;
/// let e = Error::service(Status::default().set_code(Code::Unavailable));
/// assert!(!policy.is_permanent_failure(&e));
/// let e = Error::service(Status::default().set_code(Code::PermissionDenied));
/// assert!(policy.is_permanent_failure(&e));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryableErrors;

impl RetryPolicy for RetryableErrors {
    fn on_failure(&mut self, error: &Error) -> bool {
        !self.is_permanent_failure(error)
    }

    fn is_exhausted(&self) -> bool {
        false
    }

    fn is_permanent_failure(&self, error: &Error) -> bool {
        if error.is_io() || error.is_timeout() || error.is_transient_and_before_rpc() {
            return false;
        }
        if error.status().is_none() {
            return true;
        }
        !matches!(
            error.code(),
            Code::Unavailable | Code::ResourceExhausted | Code::DeadlineExceeded
        )
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(*self)
    }
}

/// A retry policy that never stops and treats all errors as transient.
///
/// This policy is useful in tests, and as the inner policy of polling loops,
/// where the outer decorators provide the limits.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {
    fn on_failure(&mut self, _error: &Error) -> bool {
        true
    }

    fn is_exhausted(&self) -> bool {
        false
    }

    fn is_permanent_failure(&self, _error: &Error) -> bool {
        false
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(*self)
    }
}

/// A retry policy decorator that limits the total time in the retry loop.
///
/// This policy decorates an inner policy and limits the duration of retry
/// loops. Once the loop exceeds its duration limit, the policy is exhausted.
/// Before this deadline is reached, the policy returns the inner policy's
/// decisions.
///
/// The deadline is computed when the policy is created, and computed anew for
/// every [clone_policy()][RetryPolicy::clone_policy]. A duration too large to
/// represent as a deadline, such as [Duration::MAX], never expires.
#[derive(Debug)]
pub struct LimitedElapsedTime {
    inner: Box<dyn RetryPolicy>,
    maximum_duration: Duration,
    // `None` if the deadline is not representable.
    deadline: Option<Instant>,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the default inner policy.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gax::retry_policy::*;
    /// use std::time::Duration;
    /// let policy = LimitedElapsedTime::new(Duration::from_secs(10));
    /// assert!(!policy.is_exhausted());
    /// ```
    pub fn new(maximum_duration: Duration) -> Self {
        Self::custom(RetryableErrors, maximum_duration)
    }

    /// Creates a new instance with a custom inner policy.
    pub fn custom<P>(inner: P, maximum_duration: Duration) -> Self
    where
        P: RetryPolicy + 'static,
    {
        Self::from_box(Box::new(inner), maximum_duration)
    }

    fn from_box(inner: Box<dyn RetryPolicy>, maximum_duration: Duration) -> Self {
        Self {
            inner,
            maximum_duration,
            deadline: Instant::now().checked_add(maximum_duration),
        }
    }

    fn on_failure_now(&mut self, now: Instant, error: &Error) -> bool {
        let inner = self.inner.on_failure(error);
        inner && self.deadline.is_none_or(|d| now < d)
    }

    /// The time left before the policy is exhausted.
    pub fn remaining_time(&self) -> Duration {
        match self.deadline {
            Some(d) => d.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

impl RetryPolicy for LimitedElapsedTime {
    fn on_failure(&mut self, error: &Error) -> bool {
        self.on_failure_now(Instant::now(), error)
    }

    fn is_exhausted(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d) || self.inner.is_exhausted()
    }

    fn is_permanent_failure(&self, error: &Error) -> bool {
        self.inner.is_permanent_failure(error)
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::from_box(
            self.inner.clone_policy(),
            self.maximum_duration,
        ))
    }
}

/// A retry policy decorator that limits the number of attempts.
///
/// This policy decorates an inner policy and limits the total number of
/// attempts. Once `maximum_attempts` failures are recorded the policy is
/// exhausted. Before the maximum is reached, the policy returns the inner
/// policy's decisions.
#[derive(Debug)]
pub struct LimitedAttemptCount {
    inner: Box<dyn RetryPolicy>,
    maximum_attempts: u32,
    failure_count: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_gax::retry_policy::*;
    /// let policy = LimitedAttemptCount::new(5);
    /// assert!(!policy.is_exhausted());
    /// ```
    pub fn new(maximum_attempts: u32) -> Self {
        Self::custom(RetryableErrors, maximum_attempts)
    }

    /// Creates a new instance with a custom inner policy.
    pub fn custom<P>(inner: P, maximum_attempts: u32) -> Self
    where
        P: RetryPolicy + 'static,
    {
        Self::from_box(Box::new(inner), maximum_attempts)
    }

    fn from_box(inner: Box<dyn RetryPolicy>, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
            failure_count: 0,
        }
    }
}

impl RetryPolicy for LimitedAttemptCount {
    fn on_failure(&mut self, error: &Error) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        let inner = self.inner.on_failure(error);
        inner && self.failure_count < self.maximum_attempts
    }

    fn is_exhausted(&self) -> bool {
        self.failure_count >= self.maximum_attempts || self.inner.is_exhausted()
    }

    fn is_permanent_failure(&self, error: &Error) -> bool {
        self.inner.is_permanent_failure(error)
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::from_box(
            self.inner.clone_policy(),
            self.maximum_attempts,
        ))
    }
}

/// A helper type to use [RetryPolicy] in client and request options.
///
/// The argument holds a prototype. Each retry loop obtains its own instance
/// via [fresh()][RetryPolicyArg::fresh].
#[derive(Clone, Debug)]
pub struct RetryPolicyArg(pub(crate) Arc<dyn RetryPolicy>);

impl RetryPolicyArg {
    /// Returns a new policy, with a fresh budget, cloned from the prototype.
    pub fn fresh(&self) -> Box<dyn RetryPolicy> {
        self.0.clone_policy()
    }
}

impl<T: RetryPolicy + 'static> std::convert::From<T> for RetryPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn RetryPolicy>> for RetryPolicyArg {
    fn from(value: Arc<dyn RetryPolicy>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::Status;
    use test_case::test_case;

    mockall::mock! {
        #[derive(Debug)]
        Policy {}
        impl RetryPolicy for Policy {
            fn on_failure(&mut self, error: &Error) -> bool;
            fn is_exhausted(&self) -> bool;
            fn is_permanent_failure(&self, error: &Error) -> bool;
            fn clone_policy(&self) -> Box<dyn RetryPolicy>;
        }
    }

    fn from_code(code: Code) -> Error {
        Error::service(Status::default().set_code(code).set_message("test-only"))
    }

    // Verify `RetryPolicyArg` can be converted from the desired types.
    #[test]
    fn retry_policy_arg() {
        let policy = LimitedAttemptCount::new(3);
        let _ = RetryPolicyArg::from(policy);

        let policy: Arc<dyn RetryPolicy> = Arc::new(LimitedElapsedTime::new(Duration::from_secs(3)));
        let _ = RetryPolicyArg::from(policy);
    }

    #[test_case(Code::Unavailable, false)]
    #[test_case(Code::ResourceExhausted, false)]
    #[test_case(Code::DeadlineExceeded, false)]
    #[test_case(Code::PermissionDenied, true)]
    #[test_case(Code::NotFound, true)]
    #[test_case(Code::InvalidArgument, true)]
    #[test_case(Code::Internal, true)]
    #[test_case(Code::Aborted, true)]
    fn retryable_errors_codes(code: Code, permanent: bool) {
        let mut p = RetryableErrors;
        let e = from_code(code);
        assert_eq!(p.is_permanent_failure(&e), permanent, "{e:?}");
        assert_eq!(p.on_failure(&e), !permanent, "{e:?}");
        assert!(!p.is_exhausted());
    }

    #[test]
    fn retryable_errors_client_side() {
        let p = RetryableErrors;
        assert!(!p.is_permanent_failure(&Error::io("err")));
        assert!(!p.is_permanent_failure(&Error::timeout("err")));
        assert!(!p.is_permanent_failure(&Error::authentication(true, "err")));
        assert!(p.is_permanent_failure(&Error::authentication(false, "err")));
        assert!(p.is_permanent_failure(&Error::other("err")));
        assert!(p.is_permanent_failure(&Error::cancelled("err")));
    }

    #[test]
    fn always_retry() {
        let mut p = AlwaysRetry;
        assert!(p.on_failure(&from_code(Code::PermissionDenied)));
        assert!(!p.is_permanent_failure(&from_code(Code::PermissionDenied)));
        assert!(!p.is_exhausted());
    }

    #[test]
    fn limited_attempt_count() {
        let mut p = LimitedAttemptCount::new(3);
        let e = from_code(Code::Unavailable);
        assert!(!p.is_exhausted());
        assert!(p.on_failure(&e));
        assert!(p.on_failure(&e));
        assert!(!p.is_exhausted());
        assert!(!p.on_failure(&e));
        assert!(p.is_exhausted());
        assert!(!p.on_failure(&e));
    }

    #[test]
    fn limited_attempt_count_forwards() {
        let mut mock = MockPolicy::new();
        mock.expect_on_failure().times(1).return_const(false);
        mock.expect_is_permanent_failure()
            .times(1)
            .return_const(true);
        mock.expect_is_exhausted().times(1).return_const(true);

        let mut p = LimitedAttemptCount::custom(mock, 10);
        assert!(!p.on_failure(&from_code(Code::Unavailable)));
        assert!(p.is_permanent_failure(&from_code(Code::Unavailable)));
        assert!(p.is_exhausted());
    }

    #[test]
    fn limited_attempt_count_clone_resets() {
        let mut p = LimitedAttemptCount::new(1);
        assert!(!p.on_failure(&from_code(Code::Unavailable)));
        assert!(p.is_exhausted());
        let clone = p.clone_policy();
        assert!(!clone.is_exhausted());
    }

    #[test]
    fn limited_elapsed_time() {
        let mut p = LimitedElapsedTime::new(Duration::from_secs(60));
        let e = from_code(Code::Unavailable);
        let now = Instant::now();
        assert!(p.on_failure_now(now, &e));
        assert!(!p.on_failure_now(now + Duration::from_secs(120), &e));
        assert!(!p.is_exhausted());
        assert!(p.remaining_time() <= Duration::from_secs(60));
    }

    #[test]
    fn limited_elapsed_time_expired() {
        let p = LimitedElapsedTime::new(Duration::ZERO);
        assert!(p.is_exhausted());
        assert_eq!(p.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn limited_elapsed_time_unbounded() {
        let mut p = RetryableErrors.with_time_limit(Duration::MAX);
        let e = from_code(Code::Unavailable);
        assert!(p.on_failure_now(Instant::now() + Duration::from_secs(86_400), &e));
        assert!(!p.is_exhausted());
        assert_eq!(p.remaining_time(), Duration::MAX);

        let clone = p.clone_policy();
        assert!(!clone.is_exhausted(), "{clone:?}");
        let arg = RetryPolicyArg::from(p);
        assert!(!arg.fresh().is_exhausted());
    }

    #[test]
    fn limited_elapsed_time_forwards() {
        let mut mock = MockPolicy::new();
        mock.expect_on_failure().times(1).return_const(false);
        mock.expect_is_permanent_failure()
            .times(1)
            .return_const(true);

        let mut p = LimitedElapsedTime::custom(mock, Duration::from_secs(60));
        assert!(!p.on_failure(&from_code(Code::Unavailable)));
        assert!(p.is_permanent_failure(&from_code(Code::Unavailable)));
    }

    #[test]
    fn limited_elapsed_time_clone_policy() {
        let mut mock = MockPolicy::new();
        mock.expect_clone_policy()
            .times(1)
            .returning(|| Box::new(AlwaysRetry));
        let p = LimitedElapsedTime::custom(mock, Duration::from_secs(60));
        let clone = p.clone_policy();
        assert!(!clone.is_exhausted(), "{clone:?}");
    }

    #[test]
    fn composed() {
        let arg = RetryPolicyArg::from(
            RetryableErrors
                .with_time_limit(Duration::from_secs(60))
                .with_attempt_limit(2),
        );
        let mut p = arg.fresh();
        assert!(p.is_permanent_failure(&from_code(Code::NotFound)));
        assert!(p.on_failure(&from_code(Code::Unavailable)));
        assert!(!p.on_failure(&from_code(Code::Unavailable)));
        assert!(p.is_exhausted());

        let fresh = arg.fresh();
        assert!(!fresh.is_exhausted());
    }
}
