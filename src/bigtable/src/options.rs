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

//! Configuration for the Bigtable clients, stubs and the mutation batcher.

use gax::backoff_policy::BackoffPolicyArg;
use gax::call_context::CallContext;
use gax::credentials::CredentialsArg;
use gax::exponential_backoff::ExponentialBackoffBuilder;
use gax::polling_policy::{GenericPollingPolicy, PollingPolicyArg};
use gax::retry_policy::{RetryPolicyArg, RetryPolicyExt, RetryableErrors};
use std::time::Duration;

/// The service rejects requests with more mutations than this.
pub const BIGTABLE_MUTATION_LIMIT: usize = 100_000;

/// The largest message the transport sends or receives by default.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 256 * 1024 * 1024;

pub const DEFAULT_MAX_MUTATIONS_PER_BATCH: usize = 1000;

/// Leaves some headroom for the request fields outside the entries.
pub const DEFAULT_MAX_SIZE_PER_BATCH: usize = DEFAULT_MAX_MESSAGE_LENGTH / 10 * 9;

pub const DEFAULT_MAX_BATCHES: usize = 4;

pub const DEFAULT_MAX_OUTSTANDING_SIZE: usize = DEFAULT_MAX_SIZE_PER_BATCH * DEFAULT_MAX_BATCHES;

/// Longer fields are truncated in log lines.
pub const DEFAULT_MAX_LOG_FIELD_LEN: usize = 1024;

/// Configuration for a [MutationBatcher][crate::batcher::MutationBatcher].
///
/// # Example
/// ```
/// # use google_cloud_bigtable::options::BatcherOptions;
/// let options = BatcherOptions::default()
///     .set_max_mutations_per_batch(500)
///     .set_max_batches(8);
/// assert_eq!(options.max_mutations_per_batch(), 500);
/// ```
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct BatcherOptions {
    pub(crate) max_mutations_per_batch: usize,
    pub(crate) max_size_per_batch: usize,
    pub(crate) max_batches: usize,
    pub(crate) max_outstanding_size: usize,
}

impl BatcherOptions {
    /// The maximum number of cell mutations in a single batch.
    ///
    /// Values above [BIGTABLE_MUTATION_LIMIT] are clamped, the service
    /// rejects larger requests.
    pub fn set_max_mutations_per_batch(mut self, v: usize) -> Self {
        self.max_mutations_per_batch = v.clamp(1, BIGTABLE_MUTATION_LIMIT);
        self
    }

    /// The maximum serialized size of the entries in a single batch.
    pub fn set_max_size_per_batch(mut self, v: usize) -> Self {
        self.max_size_per_batch = v;
        self
    }

    /// The maximum number of batches in flight.
    ///
    /// At least one batch is always allowed.
    pub fn set_max_batches(mut self, v: usize) -> Self {
        self.max_batches = v.max(1);
        self
    }

    /// The maximum size of the mutations admitted but not yet completed.
    pub fn set_max_outstanding_size(mut self, v: usize) -> Self {
        self.max_outstanding_size = v;
        self
    }

    pub fn max_mutations_per_batch(&self) -> usize {
        self.max_mutations_per_batch
    }

    pub fn max_size_per_batch(&self) -> usize {
        self.max_size_per_batch
    }

    pub fn max_batches(&self) -> usize {
        self.max_batches
    }

    pub fn max_outstanding_size(&self) -> usize {
        self.max_outstanding_size
    }
}

impl Default for BatcherOptions {
    fn default() -> Self {
        Self {
            max_mutations_per_batch: DEFAULT_MAX_MUTATIONS_PER_BATCH,
            max_size_per_batch: DEFAULT_MAX_SIZE_PER_BATCH,
            max_batches: DEFAULT_MAX_BATCHES,
            max_outstanding_size: DEFAULT_MAX_OUTSTANDING_SIZE,
        }
    }
}

/// Configuration for the request and response log lines.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct LoggingOptions {
    pub(crate) max_field_len: usize,
}

impl LoggingOptions {
    /// Fields longer than `v` characters are truncated.
    pub fn set_max_field_len(mut self, v: usize) -> Self {
        self.max_field_len = v;
        self
    }

    pub fn max_field_len(&self) -> usize {
        self.max_field_len
    }
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_LOG_FIELD_LEN,
        }
    }
}

/// Selects the decorators wrapping each transport stub.
///
/// Authentication is always enabled, use
/// [Anonymous][gax::credentials::Anonymous] credentials to send requests
/// without authentication metadata. Tracing and logging are disabled by
/// default.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct StubOptions {
    pub(crate) credentials: CredentialsArg,
    pub(crate) tracing: bool,
    pub(crate) logging: Option<LoggingOptions>,
}

impl StubOptions {
    pub fn set_credentials<T: Into<CredentialsArg>>(mut self, v: T) -> Self {
        self.credentials = v.into();
        self
    }

    /// Enables the tracing decorator.
    pub fn set_tracing(mut self, v: bool) -> Self {
        self.tracing = v;
        self
    }

    /// Enables the logging decorator.
    pub fn set_logging(mut self, v: LoggingOptions) -> Self {
        self.logging = Some(v);
        self
    }

    pub fn tracing(&self) -> bool {
        self.tracing
    }

    pub fn logging(&self) -> Option<&LoggingOptions> {
        self.logging.as_ref()
    }
}

/// The policies used by [Table][crate::table::Table] and
/// [TableAdmin][crate::admin::TableAdmin].
///
/// The policies are prototypes: each call starts from a fresh copy, so
/// retries in one call do not consume the budget of other calls.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct TableOptions {
    pub(crate) app_profile_id: String,
    pub(crate) retry_policy: RetryPolicyArg,
    pub(crate) backoff_policy: BackoffPolicyArg,
    pub(crate) polling_policy: PollingPolicyArg,
    pub(crate) attempt_timeout: Option<Duration>,
}

impl TableOptions {
    pub fn set_app_profile_id<T: Into<String>>(mut self, v: T) -> Self {
        self.app_profile_id = v.into();
        self
    }

    pub fn set_retry_policy<T: Into<RetryPolicyArg>>(mut self, v: T) -> Self {
        self.retry_policy = v.into();
        self
    }

    pub fn set_backoff_policy<T: Into<BackoffPolicyArg>>(mut self, v: T) -> Self {
        self.backoff_policy = v.into();
        self
    }

    pub fn set_polling_policy<T: Into<PollingPolicyArg>>(mut self, v: T) -> Self {
        self.polling_policy = v.into();
        self
    }

    /// Limits each attempt of an RPC, including each poll of a long-running
    /// operation. An attempt that times out is retried like any other
    /// transient failure.
    pub fn set_attempt_timeout<T: Into<Duration>>(mut self, v: T) -> Self {
        self.attempt_timeout = Some(v.into());
        self
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub(crate) fn call_context(&self) -> CallContext {
        let mut context = CallContext::new();
        context.set_timeout(self.attempt_timeout);
        context
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(10))
            .with_maximum_delay(Duration::from_secs(60))
            .with_scaling(2.0)
            .clamp();
        let polling_backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_maximum_delay(Duration::from_secs(60))
            .with_scaling(2.0)
            .clamp();
        Self {
            app_profile_id: String::new(),
            retry_policy: RetryableErrors
                .with_time_limit(Duration::from_secs(600))
                .into(),
            backoff_policy: backoff.into(),
            polling_policy: GenericPollingPolicy::new(
                RetryableErrors.with_time_limit(Duration::from_secs(3600)),
                polling_backoff,
            )
            .into(),
            attempt_timeout: None,
        }
    }
}
