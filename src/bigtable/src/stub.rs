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

//! Traits to mock the clients in this library, and the decorators that wrap
//! the transport.
//!
//! The transport (a gRPC channel, an emulator, an in-memory fake) implements
//! [BigtableStub]. The clients never use the transport directly, they use the
//! stub returned by [decorate], which layers authentication, logging, tracing
//! and load balancing on top of one or more transport stubs.

use crate::Result;
use crate::model;
use crate::options::StubOptions;
use gax::call_context::CallContext;
use gax::error::Error;
use gax::error::rpc::{Code, Status};
use std::sync::Arc;

mod auth;
mod logging;
mod round_robin;
mod tracing;

pub use auth::Auth;
pub use logging::Logging;
pub use round_robin::RoundRobin;
pub use tracing::Tracing;

/// Defines the trait used to implement the Bigtable clients.
///
/// Application developers may need to implement this trait to mock the
/// clients, or to provide a transport. In other use-cases, application
/// developers only use the clients and need not be concerned with this trait
/// or its implementations.
///
/// Services gain new RPCs routinely. Consequently, this trait gains new
/// methods too. To avoid breaking applications the trait provides a default
/// implementation of each method, returning an `UNIMPLEMENTED` error.
#[async_trait::async_trait]
pub trait BigtableStub: std::fmt::Debug + Send + Sync {
    /// Blocking version of [async_mutate_row][BigtableStub::async_mutate_row].
    fn mutate_row(
        &self,
        _context: &mut CallContext,
        _request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        Err(unimplemented("mutate_row"))
    }

    async fn async_mutate_row(
        &self,
        _context: CallContext,
        _request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        Err(unimplemented("async_mutate_row"))
    }

    async fn async_mutate_rows(
        &self,
        _context: CallContext,
        _request: model::MutateRowsRequest,
    ) -> Result<model::MutateRowsResponse> {
        Err(unimplemented("async_mutate_rows"))
    }

    async fn async_generate_consistency_token(
        &self,
        _context: CallContext,
        _request: model::GenerateConsistencyTokenRequest,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        Err(unimplemented("async_generate_consistency_token"))
    }

    async fn async_check_consistency(
        &self,
        _context: CallContext,
        _request: model::CheckConsistencyRequest,
    ) -> Result<model::CheckConsistencyResponse> {
        Err(unimplemented("async_check_consistency"))
    }

    async fn async_restore_table(
        &self,
        _context: CallContext,
        _request: model::RestoreTableRequest,
    ) -> Result<model::Operation> {
        Err(unimplemented("async_restore_table"))
    }

    async fn async_get_operation(
        &self,
        _context: CallContext,
        _request: model::GetOperationRequest,
    ) -> Result<model::Operation> {
        Err(unimplemented("async_get_operation"))
    }
}

fn unimplemented(method: &str) -> Error {
    Error::service(
        Status::default()
            .set_code(Code::Unimplemented)
            .set_message(format!("{method} is not implemented by this stub")),
    )
}

/// Wraps the transport stubs with the decorators selected in `options`.
///
/// Each channel is wrapped, from the innermost layer out, with tracing (if
/// enabled), logging (if enabled), and authentication. If there is more than
/// one channel the results are load balanced with a [RoundRobin] stub.
///
/// Returns an error if `channels` is empty.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::stub::*;
/// # use google_cloud_bigtable::options::StubOptions;
/// # use std::sync::Arc;
/// #[derive(Debug)]
/// struct Fake;
/// impl BigtableStub for Fake {}
/// let channels: Vec<Arc<dyn BigtableStub>> = vec![Arc::new(Fake), Arc::new(Fake)];
/// let stub = decorate(channels, &StubOptions::default())?;
/// # Ok::<(), google_cloud_bigtable::Error>(())
/// ```
pub fn decorate(
    channels: Vec<Arc<dyn BigtableStub>>,
    options: &StubOptions,
) -> Result<Arc<dyn BigtableStub>> {
    let mut decorated = channels
        .into_iter()
        .map(|channel| decorate_channel(channel, options))
        .collect::<Vec<_>>();
    match decorated.len() {
        0 => Err(Error::other("at least one channel is required")),
        1 => Ok(decorated.remove(0)),
        _ => Ok(Arc::new(RoundRobin::new(decorated)?)),
    }
}

fn decorate_channel(
    channel: Arc<dyn BigtableStub>,
    options: &StubOptions,
) -> Arc<dyn BigtableStub> {
    let mut stub = channel;
    if options.tracing {
        stub = Arc::new(Tracing::new(stub));
    }
    if let Some(logging) = &options.logging {
        stub = Arc::new(Logging::new(stub, logging.clone()));
    }
    Arc::new(Auth::new(stub, options.credentials.provider()))
}
