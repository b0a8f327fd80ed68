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

//! Administrative operations that complete in the background.
//!
//! Replication checks and table restores may take minutes or hours. The
//! functions in this module return a [PollingLoop], which queries the service
//! until the work completes, the polling policy gives up, or the application
//! cancels the loop.

use crate::Result;
use crate::model;
use crate::options::TableOptions;
use crate::stub::BigtableStub;
use gax::call_context::with_attempt_timeout;
use gax::error::Error;
use gax::polling_loop::{PollStatus, PollingLoop, start_polling_loop};
use gax::retry_loop_internal::retry_loop;
use std::sync::Arc;

/// A token to check if all the writes before its creation have replicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsistencyToken {
    table_name: String,
    token: String,
}

impl ConsistencyToken {
    pub fn new<T: Into<String>, V: Into<String>>(table_name: T, token: V) -> Self {
        Self {
            table_name: table_name.into(),
            token: token.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Manages Bigtable tables.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::admin::TableAdmin;
/// # async fn sample(admin: &TableAdmin) -> google_cloud_bigtable::Result<()> {
/// admin.wait_for_replication("projects/p/instances/i/tables/t").await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct TableAdmin {
    stub: Arc<dyn BigtableStub>,
    options: TableOptions,
}

impl TableAdmin {
    pub fn new(stub: Arc<dyn BigtableStub>) -> Self {
        Self::with_options(stub, TableOptions::default())
    }

    pub fn with_options(stub: Arc<dyn BigtableStub>, options: TableOptions) -> Self {
        Self { stub, options }
    }

    /// Creates a consistency token for the given table.
    pub async fn generate_consistency_token(&self, table_name: &str) -> Result<ConsistencyToken> {
        let request = model::GenerateConsistencyTokenRequest {
            name: table_name.to_string(),
        };
        let stub = self.stub.clone();
        let options = self.options.clone();
        let inner = move || {
            let stub = stub.clone();
            let request = request.clone();
            let context = options.call_context();
            async move {
                let timeout = context.timeout();
                with_attempt_timeout(
                    timeout,
                    stub.async_generate_consistency_token(context, request),
                )
                .await
            }
        };
        let response = retry_loop(
            inner,
            tokio::time::sleep,
            true,
            self.options.retry_policy.fresh(),
            self.options.backoff_policy.fresh(),
        )
        .await?;
        Ok(ConsistencyToken::new(
            table_name,
            response.consistency_token,
        ))
    }

    /// Polls the service until the writes before `token` have replicated.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wait_for_consistency(&self, token: ConsistencyToken) -> PollingLoop<()> {
        let stub = self.stub.clone();
        let options = self.options.clone();
        let check = move || {
            let stub = stub.clone();
            let request = model::CheckConsistencyRequest {
                name: token.table_name.clone(),
                consistency_token: token.token.clone(),
            };
            let context = options.call_context();
            async move {
                let timeout = context.timeout();
                let response =
                    with_attempt_timeout(timeout, stub.async_check_consistency(context, request))
                        .await?;
                let status = if response.consistent {
                    PollStatus::Completed(())
                } else {
                    PollStatus::InProgress
                };
                Ok::<_, Error>(status)
            }
        };
        start_polling_loop(
            "wait_for_consistency",
            self.options.polling_policy.fresh(),
            check,
        )
    }

    /// Waits until all the writes to `table_name` issued before this call
    /// have replicated.
    pub async fn wait_for_replication(&self, table_name: &str) -> Result<()> {
        let token = self.generate_consistency_token(table_name).await?;
        self.wait_for_consistency(token).await
    }

    /// Starts restoring a table from a backup.
    ///
    /// The returned loop resolves to the restored table once the restore
    /// completes. Starting the restore is not idempotent, it is only retried
    /// if the request never left the client.
    pub async fn restore_table(
        &self,
        request: model::RestoreTableRequest,
    ) -> Result<PollingLoop<model::Table>> {
        let stub = self.stub.clone();
        let options = self.options.clone();
        let inner = move || {
            let stub = stub.clone();
            let request = request.clone();
            let context = options.call_context();
            async move {
                let timeout = context.timeout();
                with_attempt_timeout(timeout, stub.async_restore_table(context, request)).await
            }
        };
        let operation = retry_loop(
            inner,
            tokio::time::sleep,
            false,
            self.options.retry_policy.fresh(),
            self.options.backoff_policy.fresh(),
        )
        .await?;
        tracing::debug!(operation = %operation.name, "restore table started");

        let stub = self.stub.clone();
        let options = self.options.clone();
        let name = operation.name.clone();
        let mut initial = Some(operation);
        let check = move || {
            let stub = stub.clone();
            let name = name.clone();
            let initial = initial.take().filter(|op| op.done);
            let context = options.call_context();
            async move {
                let operation = match initial {
                    Some(op) => op,
                    None => {
                        let timeout = context.timeout();
                        let request = model::GetOperationRequest { name };
                        with_attempt_timeout(timeout, stub.async_get_operation(context, request))
                            .await?
                    }
                };
                Ok::<_, Error>(operation_status::<model::Table>(operation))
            }
        };
        Ok(start_polling_loop(
            "restore_table",
            self.options.polling_policy.fresh(),
            check,
        ))
    }
}

fn operation_status<T>(operation: model::Operation) -> PollStatus<T>
where
    T: prost::Message + prost::Name + Default,
{
    if !operation.done {
        return PollStatus::InProgress;
    }
    match operation.result {
        Some(model::operation::Result::Error(status)) => {
            PollStatus::Failed(Error::service(status.into()))
        }
        Some(model::operation::Result::Response(any)) => match any.to_msg::<T>() {
            Ok(t) => PollStatus::Completed(t),
            Err(e) => PollStatus::Failed(Error::other(e)),
        },
        None => PollStatus::Failed(Error::other(format!(
            "operation {} completed without a result",
            operation.name
        ))),
    }
}
