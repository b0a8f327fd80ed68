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
use http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::Injector;
use std::sync::Arc;
use tracing::{Instrument, Span, field};
use tracing_opentelemetry::OpenTelemetrySpanExt;

const DATA_SERVICE: &str = "google.bigtable.v2.Bigtable";
const ADMIN_SERVICE: &str = "google.bigtable.admin.v2.BigtableTableAdmin";
const OPERATIONS_SERVICE: &str = "google.longrunning.Operations";

/// Creates a span for each call and propagates its context to the service.
///
/// The span context is injected into the call headers using the global
/// OpenTelemetry [TextMapPropagator][opentelemetry::propagation::TextMapPropagator].
/// The span records the outcome of the call in `otel.status_code` and
/// `rpc.grpc.status_code`.
#[derive(Debug)]
pub struct Tracing {
    inner: Arc<dyn BigtableStub>,
}

impl Tracing {
    pub fn new(inner: Arc<dyn BigtableStub>) -> Self {
        Self { inner }
    }
}

fn client_request_span(service: &'static str, method: &'static str) -> Span {
    tracing::info_span!(
        "client_request",
        otel.name = format!("{service}/{method}"),
        otel.kind = "Client",
        rpc.system = "grpc",
        rpc.service = service,
        rpc.method = method,
        // Fields to be recorded later
        otel.status_code = "UNSET",
        otel.status_description = field::Empty,
        rpc.grpc.status_code = field::Empty,
    )
}

fn inject(span: &Span, context: &mut CallContext) {
    let cx = span.context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderInjector(context.headers_mut()))
    });
}

fn record<T>(span: &Span, result: &Result<T>) {
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
            span.record("rpc.grpc.status_code", 0_i64);
        }
        Err(e) => {
            span.record("otel.status_code", "ERROR");
            span.record("otel.status_description", e.to_string());
            span.record("rpc.grpc.status_code", i64::from(i32::from(e.code())));
        }
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            tracing::warn!(key, "cannot propagate trace context header");
            return;
        };
        self.0.insert(name, value);
    }
}

#[async_trait::async_trait]
impl BigtableStub for Tracing {
    fn mutate_row(
        &self,
        context: &mut CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        let span = client_request_span(DATA_SERVICE, "MutateRow");
        let _enter = span.enter();
        inject(&span, context);
        let result = self.inner.mutate_row(context, request);
        record(&span, &result);
        result
    }

    async fn async_mutate_row(
        &self,
        mut context: CallContext,
        request: model::MutateRowRequest,
    ) -> Result<model::MutateRowResponse> {
        let span = client_request_span(DATA_SERVICE, "MutateRow");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_mutate_row(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }

    async fn async_mutate_rows(
        &self,
        mut context: CallContext,
        request: model::MutateRowsRequest,
    ) -> Result<model::MutateRowsResponse> {
        let span = client_request_span(DATA_SERVICE, "MutateRows");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_mutate_rows(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }

    async fn async_generate_consistency_token(
        &self,
        mut context: CallContext,
        request: model::GenerateConsistencyTokenRequest,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        let span = client_request_span(ADMIN_SERVICE, "GenerateConsistencyToken");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_generate_consistency_token(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }

    async fn async_check_consistency(
        &self,
        mut context: CallContext,
        request: model::CheckConsistencyRequest,
    ) -> Result<model::CheckConsistencyResponse> {
        let span = client_request_span(ADMIN_SERVICE, "CheckConsistency");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_check_consistency(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }

    async fn async_restore_table(
        &self,
        mut context: CallContext,
        request: model::RestoreTableRequest,
    ) -> Result<model::Operation> {
        let span = client_request_span(ADMIN_SERVICE, "RestoreTable");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_restore_table(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }

    async fn async_get_operation(
        &self,
        mut context: CallContext,
        request: model::GetOperationRequest,
    ) -> Result<model::Operation> {
        let span = client_request_span(OPERATIONS_SERVICE, "GetOperation");
        inject(&span, &mut context);
        let result = self
            .inner
            .async_get_operation(context, request)
            .instrument(span.clone())
            .await;
        record(&span, &result);
        result
    }
}
