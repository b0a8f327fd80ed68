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
use crate::options::LoggingOptions;
use gax::call_context::CallContext;
use std::fmt::Debug;
use std::sync::Arc;

const TRUNCATED: &str = "...<truncated>";

/// Logs each request and its response at `DEBUG` level.
#[derive(Debug)]
pub struct Logging {
    inner: Arc<dyn BigtableStub>,
    options: LoggingOptions,
}

impl Logging {
    pub fn new(inner: Arc<dyn BigtableStub>, options: LoggingOptions) -> Self {
        Self { inner, options }
    }

    fn request<R: Debug>(&self, method: &'static str, request: &R) {
        tracing::debug!(
            method,
            request = %truncate(format!("{request:?}"), self.options.max_field_len),
            "request"
        );
    }

    fn response<R: Debug>(&self, method: &'static str, response: &Result<R>) {
        match response {
            Ok(r) => tracing::debug!(
                method,
                response = %truncate(format!("{r:?}"), self.options.max_field_len),
                "response"
            ),
            Err(e) => tracing::debug!(
                method,
                error = %truncate(e.to_string(), self.options.max_field_len),
                "response"
            ),
        }
    }
}

fn truncate(mut value: String, max_len: usize) -> String {
    if let Some((offset, _)) = value.char_indices().nth(max_len) {
        value.truncate(offset);
        value.push_str(TRUNCATED);
    }
    value
}

#[async_trait::async_trait]
impl BigtableStub for Logging {
    fn mutate_row(
        &self,
        context: &mut CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        self.request("mutate_row", &request);
        let response = self.inner.mutate_row(context, request);
        self.response("mutate_row", &response);
        response
    }

    async fn async_mutate_row(
        &self,
        context: CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        self.request("async_mutate_row", &request);
        let response = self.inner.async_mutate_row(context, request).await;
        self.response("async_mutate_row", &response);
        response
    }

    async fn async_mutate_rows(
        &self,
        context: CallContext,
        request: model::MutateRowsRequest,
    ) -> Result<model::MutateRowsResponse> {
        self.request("async_mutate_rows", &request);
        let response = self.inner.async_mutate_rows(context, request).await;
        self.response("async_mutate_rows", &response);
        response
    }

    async fn async_generate_consistency_token(
        &self,
        context: CallContext,
        request: model::GenerateConsistencyTokenRequest,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        self.request("async_generate_consistency_token", &request);
        let response = self
            .inner
            .async_generate_consistency_token(context, request)
            .await;
        self.response("async_generate_consistency_token", &response);
        response
    }

    async fn async_check_consistency(
        &self,
        context: CallContext,
        request: model::CheckConsistencyRequest,
    ) -> Result<model::CheckConsistencyResponse> {
        self.request("async_check_consistency", &request);
        let response = self.inner.async_check_consistency(context, request).await;
        self.response("async_check_consistency", &response);
        response
    }

    async fn async_restore_table(
        &self,
        context: CallContext,
        request: model::RestoreTableRequest,
    ) -> Result<model::Operation> {
        self.request("async_restore_table", &request);
        let response = self.inner.async_restore_table(context, request).await;
        self.response("async_restore_table", &response);
        response
    }

    async fn async_get_operation(
        &self,
        context: CallContext,
        request: model::GetOperationRequest,
    ) -> Result<model::Operation> {
        self.request("async_get_operation", &request);
        let response = self.inner.async_get_operation(context, request).await;
        self.response("async_get_operation", &response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", 4, "")]
    #[test_case("abcd", 4, "abcd")]
    #[test_case("abcde", 4, "abcd...<truncated>")]
    #[test_case("ñandú", 2, "ña...<truncated>")]
    #[test_case("abc", 0, "...<truncated>")]
    fn truncation(input: &str, max_len: usize, want: &str) {
        assert_eq!(truncate(input.to_string(), max_len), want);
    }
}
