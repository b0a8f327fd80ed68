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

//! Verify the stub decorators, alone and composed by `decorate()`.

#[cfg(test)]
mod test {
    use bigtable::model;
    use bigtable::options::{LoggingOptions, StubOptions};
    use bigtable::stub::{BigtableStub, RoundRobin, decorate};
    use gax::call_context::CallContext;
    use gax::credentials::AccessToken;
    use gax::error::Error;
    use gax::error::rpc::{Code, Status};
    use google_cloud_bigtable as bigtable;
    use std::sync::{Arc, Mutex};

    type Result<T> = anyhow::Result<T>;

    mockall::mock! {
        #[derive(Debug)]
        Stub {}
        #[async_trait::async_trait]
        impl BigtableStub for Stub {
            fn mutate_row(&self, context: &mut CallContext, request: model::MutateRowRequest) -> gax::Result<model::MutateRowResponse>;
            async fn async_mutate_row(&self, context: CallContext, request: model::MutateRowRequest) -> gax::Result<model::MutateRowResponse>;
            async fn async_mutate_rows(&self, context: CallContext, request: model::MutateRowsRequest) -> gax::Result<model::MutateRowsResponse>;
            async fn async_generate_consistency_token(&self, context: CallContext, request: model::GenerateConsistencyTokenRequest) -> gax::Result<model::GenerateConsistencyTokenResponse>;
            async fn async_check_consistency(&self, context: CallContext, request: model::CheckConsistencyRequest) -> gax::Result<model::CheckConsistencyResponse>;
            async fn async_restore_table(&self, context: CallContext, request: model::RestoreTableRequest) -> gax::Result<model::Operation>;
            async fn async_get_operation(&self, context: CallContext, request: model::GetOperationRequest) -> gax::Result<model::Operation>;
        }
    }

    fn authorization(context: &CallContext) -> Option<String> {
        context
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn auth_configures_every_call() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_mutate_row()
            .withf(|context, _| authorization(context).as_deref() == Some("Bearer test-token"))
            .times(1)
            .returning(|_, _| Ok(model::MutateRowResponse {}));
        mock.expect_mutate_row()
            .times(1)
            .returning(|context, _| {
                assert_eq!(
                    authorization(context).as_deref(),
                    Some("Bearer test-token")
                );
                Ok(model::MutateRowResponse {})
            });

        let options = StubOptions::default().set_credentials(AccessToken::new("test-token"));
        let stub = decorate(vec![Arc::new(mock)], &options)?;
        stub.async_mutate_row(CallContext::new(), model::MutateRowRequest::default())
            .await?;
        stub.mutate_row(&mut CallContext::new(), model::MutateRowRequest::default())?;
        Ok(())
    }

    #[tokio::test]
    async fn auth_failure_never_calls_the_transport() -> Result<()> {
        // No expectations: any call to the mock panics.
        let mock = MockStub::new();
        let options = StubOptions::default().set_credentials(AccessToken::new("bad\ntoken"));
        let stub = decorate(vec![Arc::new(mock)], &options)?;

        let err = stub
            .async_mutate_rows(CallContext::new(), model::MutateRowsRequest::default())
            .await
            .expect_err("credentials are invalid");
        assert!(err.is_authentication(), "{err:?}");
        assert_eq!(err.code(), Code::InvalidArgument, "{err:?}");

        let err = stub
            .mutate_row(&mut CallContext::new(), model::MutateRowRequest::default())
            .expect_err("credentials are invalid");
        assert_eq!(err.code(), Code::InvalidArgument, "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn errors_pass_through() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_check_consistency().times(1).returning(|_, _| {
            Err(Error::service(
                Status::default()
                    .set_code(Code::NotFound)
                    .set_message("no such table"),
            ))
        });
        let options = StubOptions::default()
            .set_tracing(true)
            .set_logging(LoggingOptions::default());
        let stub = decorate(vec![Arc::new(mock)], &options)?;
        let err = stub
            .async_check_consistency(CallContext::new(), model::CheckConsistencyRequest::default())
            .await
            .expect_err("the service returns an error");
        assert_eq!(err.code(), Code::NotFound, "{err:?}");
        assert_eq!(err.status().map(|s| s.message.as_str()), Some("no such table"));
        Ok(())
    }

    fn counting_stub(count: usize) -> MockStub {
        let mut mock = MockStub::new();
        mock.expect_async_generate_consistency_token()
            .times(count)
            .returning(|_, request| {
                Ok(model::GenerateConsistencyTokenResponse {
                    consistency_token: request.name,
                })
            });
        mock
    }

    #[tokio::test]
    async fn round_robin_is_fair() -> Result<()> {
        const CHANNELS: usize = 3;
        const ROUNDS: usize = 4;
        let channels = (0..CHANNELS)
            .map(|_| Arc::new(counting_stub(ROUNDS)) as Arc<dyn BigtableStub>)
            .collect::<Vec<_>>();
        let stub = decorate(channels, &StubOptions::default())?;
        for _ in 0..(CHANNELS * ROUNDS) {
            stub.async_generate_consistency_token(
                CallContext::new(),
                model::GenerateConsistencyTokenRequest {
                    name: "t".to_string(),
                },
            )
            .await?;
        }
        // The mocks verify the number of calls when dropped.
        drop(stub);
        Ok(())
    }

    #[derive(Debug)]
    struct Recorder {
        id: usize,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait::async_trait]
    impl BigtableStub for Recorder {
        async fn async_get_operation(
            &self,
            _context: CallContext,
            _request: model::GetOperationRequest,
        ) -> gax::Result<model::Operation> {
            self.calls.lock().expect("calls lock").push(self.id);
            Ok(model::Operation::default())
        }
    }

    #[tokio::test]
    async fn round_robin_order() -> Result<()> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let children = (0..3)
            .map(|id| {
                Arc::new(Recorder {
                    id,
                    calls: calls.clone(),
                }) as Arc<dyn BigtableStub>
            })
            .collect::<Vec<_>>();
        let stub = RoundRobin::new(children)?;
        for _ in 0..7 {
            stub.async_get_operation(CallContext::new(), model::GetOperationRequest::default())
                .await?;
        }
        let got = calls.lock().expect("calls lock").clone();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
        Ok(())
    }

    #[test]
    fn tracing_injects_trace_context() -> Result<()> {
        use opentelemetry::trace::TracerProvider as _;
        use tracing_subscriber::layer::SubscriberExt;

        opentelemetry::global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );
        let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = MockStub::new();
        mock.expect_mutate_row().times(1).returning(|context, _| {
            let traceparent = context
                .headers()
                .get("traceparent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let traceparent = traceparent.expect("traceparent header is injected");
            assert!(traceparent.starts_with("00-"), "{traceparent}");
            Ok(model::MutateRowResponse {})
        });
        let options = StubOptions::default().set_tracing(true);
        let stub = decorate(vec![Arc::new(mock)], &options)?;
        stub.mutate_row(&mut CallContext::new(), model::MutateRowRequest::default())?;
        Ok(())
    }

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("buffer lock")).to_string()
        }
    }

    #[test]
    fn logging_truncates_fields() -> Result<()> {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = MockStub::new();
        mock.expect_mutate_row()
            .times(1)
            .returning(|_, _| Ok(model::MutateRowResponse {}));
        let options = StubOptions::default()
            .set_logging(LoggingOptions::default().set_max_field_len(32));
        let stub = decorate(vec![Arc::new(mock)], &options)?;
        let request = model::MutateRowRequest {
            table_name: "projects/p/instances/i/tables/t".to_string(),
            row_key: "x".repeat(1024).into_bytes(),
            ..Default::default()
        };
        stub.mutate_row(&mut CallContext::new(), request)?;

        let logs = buffer.contents();
        assert!(logs.contains("mutate_row"), "{logs}");
        assert!(logs.contains("...<truncated>"), "{logs}");
        assert!(logs.contains("MutateRowResponse"), "{logs}");
        assert!(!logs.contains(&"120, ".repeat(64)), "{logs}");
        Ok(())
    }
}
