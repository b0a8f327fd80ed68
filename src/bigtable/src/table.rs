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

use crate::Result;
use crate::batcher::MutationBatcher;
use crate::model::{MutateRowRequest, SingleRowMutation};
use crate::options::{BatcherOptions, TableOptions};
use crate::stub::BigtableStub;
use gax::call_context::with_attempt_timeout;
use gax::retry_loop_internal::{retry_loop, retry_loop_blocking};
use std::sync::Arc;

/// Writes data to a Bigtable table.
///
/// Single-row mutations are retried according to the [TableOptions]
/// policies, but only when retrying is safe: a mutation containing a
/// [SetCell][crate::model::SetCell] with a server-assigned timestamp is only
/// retried if the request never left the client.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::table::Table;
/// # use google_cloud_bigtable::model::{Mutation, SingleRowMutation};
/// # async fn sample(table: &Table) -> google_cloud_bigtable::Result<()> {
/// let mutation = SingleRowMutation::new(
///     "row-key",
///     [Mutation::set_cell("cf", "greeting", 1_000, "hello")],
/// );
/// table.apply(mutation).await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    stub: Arc<dyn BigtableStub>,
    table_name: String,
    options: TableOptions,
}

impl Table {
    /// Creates a client for `table_name`, in
    /// `projects/{project}/instances/{instance}/tables/{table}` format.
    ///
    /// The `stub` is typically the result of [decorate][crate::stub::decorate].
    pub fn new<T: Into<String>>(stub: Arc<dyn BigtableStub>, table_name: T) -> Self {
        Self::with_options(stub, table_name, TableOptions::default())
    }

    pub fn with_options<T: Into<String>>(
        stub: Arc<dyn BigtableStub>,
        table_name: T,
        options: TableOptions,
    ) -> Self {
        Self {
            stub,
            table_name: table_name.into(),
            options,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Atomically applies the mutations to a single row.
    pub async fn apply(&self, mutation: SingleRowMutation) -> Result<()> {
        let idempotent = mutation.is_idempotent();
        let request = self.request(mutation);
        let stub = self.stub.clone();
        let options = self.options.clone();
        let inner = move || {
            let stub = stub.clone();
            let request = request.clone();
            let context = options.call_context();
            async move {
                let timeout = context.timeout();
                with_attempt_timeout(timeout, stub.async_mutate_row(context, request))
                    .await
                    .map(|_| ())
            }
        };
        retry_loop(
            inner,
            tokio::time::sleep,
            idempotent,
            self.options.retry_policy.fresh(),
            self.options.backoff_policy.fresh(),
        )
        .await
    }

    /// Blocking version of [apply][Table::apply].
    ///
    /// The calling thread sleeps between attempts. Do not call this function
    /// from an asynchronous context. The attempt timeout is forwarded to the
    /// stub, which is responsible for enforcing it.
    pub fn apply_blocking(&self, mutation: SingleRowMutation) -> Result<()> {
        let idempotent = mutation.is_idempotent();
        let request = self.request(mutation);
        let inner = || {
            let mut context = self.options.call_context();
            self.stub
                .mutate_row(&mut context, request.clone())
                .map(|_| ())
        };
        retry_loop_blocking(
            inner,
            std::thread::sleep,
            idempotent,
            self.options.retry_policy.fresh(),
            self.options.backoff_policy.fresh(),
        )
    }

    /// Creates a batcher for mutations on this table.
    pub fn mutation_batcher(&self, options: BatcherOptions) -> MutationBatcher {
        MutationBatcher::with_app_profile(
            self.stub.clone(),
            self.table_name.clone(),
            self.options.app_profile_id.clone(),
            options,
        )
    }

    fn request(&self, mutation: SingleRowMutation) -> MutateRowRequest {
        MutateRowRequest {
            table_name: self.table_name.clone(),
            row_key: mutation.row_key,
            mutations: mutation.mutations,
            app_profile_id: self.options.app_profile_id.clone(),
        }
    }
}
