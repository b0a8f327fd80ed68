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

use crate::Result;
use crate::error::Error;
use http::HeaderMap;
use std::future::Future;
use std::time::Duration;

/// Per-call metadata carried through the stub decorators.
///
/// Decorators add headers (authorization, trace context). The transport stub
/// sends the headers as request metadata. Asynchronous calls enforce the
/// timeout with [with_attempt_timeout], blocking calls leave it to the
/// transport.
///
/// # Example
/// ```
/// # use google_cloud_gax::call_context::CallContext;
/// use http::{HeaderName, HeaderValue};
/// use std::time::Duration;
/// let context = CallContext::new()
///     .with_header(HeaderName::from_static("x-goog-request-params"), HeaderValue::from_static("table=t"))
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(context.timeout(), Some(Duration::from_secs(30)));
/// assert!(context.headers().contains_key("x-goog-request-params"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a header.
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

/// Runs a single attempt, failing with a [timeout][Error::timeout] error if
/// it does not complete within `timeout`.
///
/// `None` waits for the attempt to complete. The attempt is dropped when the
/// timeout expires.
///
/// # Example
/// ```
/// # use google_cloud_gax::call_context::{CallContext, with_attempt_timeout};
/// # use std::time::Duration;
/// # async fn sample() -> google_cloud_gax::Result<()> {
/// let context = CallContext::new().with_timeout(Duration::from_secs(30));
/// let value = with_attempt_timeout(context.timeout(), async { Ok(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(()) }
/// ```
pub async fn with_attempt_timeout<T, F>(timeout: Option<Duration>, attempt: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(timeout) = timeout else {
        return attempt.await;
    };
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(elapsed) => Err(Error::timeout(elapsed)),
    }
}
