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

use super::BigtableStub;
use crate::Result;
use crate::model;
use gax::call_context::CallContext;
use gax::credentials::CredentialsProvider;
use std::sync::Arc;

/// Attaches the authentication metadata to each call.
///
/// If the credentials cannot be configured the call fails and the inner stub
/// is not called.
#[derive(Debug)]
pub struct Auth {
    inner: Arc<dyn BigtableStub>,
    credentials: Arc<dyn CredentialsProvider>,
}

impl Auth {
    pub fn new(inner: Arc<dyn BigtableStub>, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self { inner, credentials }
    }
}

#[async_trait::async_trait]
impl BigtableStub for Auth {
    fn mutate_row(
        &self,
        context: &mut CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        self.credentials.configure_context(context)?;
        self.inner.mutate_row(context, request)
    }

    async fn async_mutate_row(
        &self,
        context: CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner.async_mutate_row(context, request).await
    }

    async fn async_mutate_rows(
        &self,
        context: CallContext,
        request: model::MutateRowsRequest,
    ) -> Result<model::MutateRowsResponse> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner.async_mutate_rows(context, request).await
    }

    async fn async_generate_consistency_token(
        &self,
        context: CallContext,
        request: model::GenerateConsistencyTokenRequest,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner
            .async_generate_consistency_token(context, request)
            .await
    }

    async fn async_check_consistency(
        &self,
        context: CallContext,
        request: model::CheckConsistencyRequest,
    ) -> Result<model::CheckConsistencyResponse> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner.async_check_consistency(context, request).await
    }

    async fn async_restore_table(
        &self,
        context: CallContext,
        request: model::RestoreTableRequest,
    ) -> Result<model::Operation> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner.async_restore_table(context, request).await
    }

    async fn async_get_operation(
        &self,
        context: CallContext,
        request: model::GetOperationRequest,
    ) -> Result<model::Operation> {
        let context = self.credentials.async_configure_context(context).await?;
        self.inner.async_get_operation(context, request).await
    }
}
