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
use gax::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Spreads the calls over a set of stubs.
///
/// The `i`-th call goes to the stub at position `i` modulo the number of
/// stubs.
#[derive(Debug)]
pub struct RoundRobin {
    children: Vec<Arc<dyn BigtableStub>>,
    current: AtomicUsize,
}

impl RoundRobin {
    /// Returns an error if `children` is empty.
    pub fn new(children: Vec<Arc<dyn BigtableStub>>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::other("round robin requires at least one stub"));
        }
        Ok(Self {
            children,
            current: AtomicUsize::new(0),
        })
    }

    fn child(&self) -> &Arc<dyn BigtableStub> {
        // Only the distribution matters, the ordering with other memory
        // operations does not.
        let index = self.current.fetch_add(1, Ordering::Relaxed);
        &self.children[index % self.children.len()]
    }
}

#[async_trait::async_trait]
impl BigtableStub for RoundRobin {
    fn mutate_row(
        &self,
        context: &mut CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        self.child().mutate_row(context, request)
    }

    async fn async_mutate_row(
        &self,
        context: CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        self.child().async_mutate_row(context, request).await
    }

    async fn async_mutate_rows(
        &self,
        context: CallContext,
        request: model::MutateRowsRequest,
    ) -> Result<model::MutateRowsResponse> {
        self.child().async_mutate_rows(context, request).await
    }

    async fn async_generate_consistency_token(
        &self,
        context: CallContext,
        request: model::GenerateConsistencyTokenRequest,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        self.child()
            .async_generate_consistency_token(context, request)
            .await
    }

    async fn async_check_consistency(
        &self,
        context: CallContext,
        request: model::CheckConsistencyRequest,
    ) -> Result<model::CheckConsistencyResponse> {
        self.child().async_check_consistency(context, request).await
    }

    async fn async_restore_table(
        &self,
        context: CallContext,
        request: model::RestoreTableRequest,
    ) -> Result<model::Operation> {
        self.child().async_restore_table(context, request).await
    }

    async fn async_get_operation(
        &self,
        context: CallContext,
        request: model::GetOperationRequest,
    ) -> Result<model::Operation> {
        self.child().async_get_operation(context, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    #[async_trait::async_trait]
    impl BigtableStub for Named {
        async fn async_get_operation(
            &self,
            _context: CallContext,
            _request: model::GetOperationRequest,
        ) -> Result<model::Operation> {
            Ok(model::Operation {
                name: self.0.to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn empty() {
        let err = RoundRobin::new(Vec::new()).expect_err("no children");
        assert!(err.to_string().contains("at least one"), "{err}");
    }

    #[tokio::test]
    async fn rotates() -> anyhow::Result<()> {
        let stub = RoundRobin::new(vec![
            Arc::new(Named("a")),
            Arc::new(Named("b")),
            Arc::new(Named("c")),
        ])?;
        let mut got = Vec::new();
        for _ in 0..7 {
            let op = stub
                .async_get_operation(CallContext::new(), model::GetOperationRequest::default())
                .await?;
            got.push(op.name);
        }
        assert_eq!(got, vec!["a", "b", "c", "a", "b", "c", "a"]);
        Ok(())
    }
}
