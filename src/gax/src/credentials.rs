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

//! Strategies to attach credentials to a call.
//!
//! Modern authentication protocols do not send the credentials to authenticate
//! with a service. Instead, they exchange the credentials for a time-limited
//! token, and attach the token to each request. The [CredentialsProvider]
//! trait abstracts how a token (or any other authentication metadata) is
//! attached to the [CallContext] of a request.
//!
//! Configuring the context may fail, for example, because the token cannot be
//! refreshed. The request must not be sent in that case.

use crate::Result;
use crate::call_context::CallContext;
use crate::error::Error;
use http::HeaderValue;
use std::sync::Arc;

/// Configures the authentication metadata of a call.
#[async_trait::async_trait]
pub trait CredentialsProvider: std::fmt::Debug + Send + Sync {
    /// Configures `context` for a synchronous call.
    fn configure_context(&self, context: &mut CallContext) -> Result<()>;

    /// Configures `context` for an asynchronous call.
    ///
    /// The default implementation calls
    /// [configure_context][CredentialsProvider::configure_context].
    async fn async_configure_context(&self, mut context: CallContext) -> Result<CallContext> {
        self.configure_context(&mut context)?;
        Ok(context)
    }
}

/// Credentials that do not modify the call.
///
/// Useful for emulators and tests.
#[derive(Clone, Debug, Default)]
pub struct Anonymous;

#[async_trait::async_trait]
impl CredentialsProvider for Anonymous {
    fn configure_context(&self, _context: &mut CallContext) -> Result<()> {
        Ok(())
    }
}

/// Credentials based on a pre-fetched OAuth2 access token.
///
/// # Example
/// ```
/// # use google_cloud_gax::credentials::*;
/// # use google_cloud_gax::call_context::CallContext;
/// let credentials = AccessToken::new("test-only-token");
/// let mut context = CallContext::new();
/// credentials.configure_context(&mut context)?;
/// assert_eq!(
///     context.headers().get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
///     Some("Bearer test-only-token"));
/// # Ok::<(), google_cloud_gax::error::Error>(())
/// ```
#[derive(Clone)]
pub struct AccessToken {
    token: String,
}

impl AccessToken {
    pub fn new<T: Into<String>>(token: T) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[censored]")
            .finish()
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for AccessToken {
    fn configure_context(&self, context: &mut CallContext) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| Error::authentication(false, e))?;
        value.set_sensitive(true);
        context
            .headers_mut()
            .insert(http::header::AUTHORIZATION, value);
        Ok(())
    }
}

/// A helper type to use [CredentialsProvider] in client options.
#[derive(Clone, Debug)]
pub struct CredentialsArg(pub(crate) Arc<dyn CredentialsProvider>);

impl CredentialsArg {
    pub fn provider(&self) -> Arc<dyn CredentialsProvider> {
        self.0.clone()
    }
}

impl Default for CredentialsArg {
    fn default() -> Self {
        Self(Arc::new(Anonymous))
    }
}

impl<T: CredentialsProvider + 'static> std::convert::From<T> for CredentialsArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn CredentialsProvider>> for CredentialsArg {
    fn from(value: Arc<dyn CredentialsProvider>) -> Self {
        Self(value)
    }
}
