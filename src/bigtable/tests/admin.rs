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

#[cfg(test)]
mod test {
    use bigtable::admin::{ConsistencyToken, TableAdmin};
    use bigtable::model;
    use bigtable::options::TableOptions;
    use bigtable::stub::BigtableStub;
    use gax::call_context::CallContext;
    use gax::error::Error;
    use gax::error::rpc::{Code, Status};
    use gax::exponential_backoff::ExponentialBackoffBuilder;
    use gax::polling_loop::Phase;
    use gax::polling_policy::GenericPollingPolicy;
    use gax::retry_policy::{AlwaysRetry, RetryPolicyExt, RetryableErrors};
    use google_cloud_bigtable as bigtable;
    use std::sync::Arc;
    use std::time::Duration;

    type Result<T> = anyhow::Result<T>;

    const TABLE: &str = "projects/p/instances/i/tables/t";
    const OPERATION: &str = "projects/p/instances/i/operations/restore-123";

    mockall::mock! {
        #[derive(Debug)]
        Stub {}
        #[async_trait::async_trait]
        impl BigtableStub for Stub {
            async fn async_generate_consistency_token(&self, context: CallContext, request: model::GenerateConsistencyTokenRequest) -> gax::Result<model::GenerateConsistencyTokenResponse>;
            async fn async_check_consistency(&self, context: CallContext, request: model::CheckConsistencyRequest) -> gax::Result<model::CheckConsistencyResponse>;
            async fn async_restore_table(&self, context: CallContext, request: model::RestoreTableRequest) -> gax::Result<model::Operation>;
            async fn async_get_operation(&self, context: CallContext, request: model::GetOperationRequest) -> gax::Result<model::Operation>;
        }
    }

    fn backoff() -> gax::exponential_backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_maximum_delay(Duration::from_millis(100))
            .clamp()
    }

    fn options(polls: u32) -> TableOptions {
        TableOptions::default()
            .set_retry_policy(RetryableErrors.with_attempt_limit(3))
            .set_backoff_policy(backoff())
            .set_polling_policy(GenericPollingPolicy::new(
                AlwaysRetry.with_attempt_limit(polls),
                backoff(),
            ))
    }

    fn unavailable() -> Error {
        Error::service(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try again"),
        )
    }

    fn check(consistent: bool) -> gax::Result<model::CheckConsistencyResponse> {
        Ok(model::CheckConsistencyResponse { consistent })
    }

    fn pending_operation() -> model::Operation {
        model::Operation {
            name: OPERATION.to_string(),
            ..Default::default()
        }
    }

    fn restored(table: &model::Table) -> model::Operation {
        let any = prost_types::Any::from_msg(table).expect("encoding a table never fails");
        model::Operation {
            name: OPERATION.to_string(),
            done: true,
            result: Some(model::operation::Result::Response(any)),
            ..Default::default()
        }
    }

    fn restore_request() -> model::RestoreTableRequest {
        model::RestoreTableRequest {
            parent: "projects/p/instances/i".to_string(),
            table_id: "t".to_string(),
            backup: "projects/p/instances/i/clusters/c/backups/b".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_consistency() -> Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockStub::new();
        mock.expect_async_check_consistency()
            .withf(|_, r| r.name == TABLE && r.consistency_token == "token-123")
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| check(false));
        mock.expect_async_check_consistency()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| check(true));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        admin
            .wait_for_consistency(ConsistencyToken::new(TABLE, "token-123"))
            .await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_consistency_transient_errors() -> Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockStub::new();
        mock.expect_async_check_consistency()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(unavailable()));
        mock.expect_async_check_consistency()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| check(true));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        admin
            .wait_for_consistency(ConsistencyToken::new(TABLE, "token-123"))
            .await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_consistency_exhausted() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_check_consistency()
            .times(3)
            .returning(|_, _| check(false));

        let admin = TableAdmin::with_options(Arc::new(mock), options(3));
        let err = admin
            .wait_for_consistency(ConsistencyToken::new(TABLE, "token-123"))
            .await
            .expect_err("the table never becomes consistent");
        assert!(err.is_exhausted(), "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_replication() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_generate_consistency_token()
            .withf(|_, r| r.name == TABLE)
            .times(1)
            .returning(|_, _| {
                Ok(model::GenerateConsistencyTokenResponse {
                    consistency_token: "token-456".to_string(),
                })
            });
        mock.expect_async_check_consistency()
            .withf(|_, r| r.name == TABLE && r.consistency_token == "token-456")
            .times(1)
            .returning(|_, _| check(true));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        admin.wait_for_replication(TABLE).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn generate_consistency_token_retries() -> Result<()> {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockStub::new();
        mock.expect_async_generate_consistency_token()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(unavailable()));
        mock.expect_async_generate_consistency_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(model::GenerateConsistencyTokenResponse {
                    consistency_token: "token-789".to_string(),
                })
            });

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        let token = admin.generate_consistency_token(TABLE).await?;
        assert_eq!(token, ConsistencyToken::new(TABLE, "token-789"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restore_table_done_immediately() -> Result<()> {
        let table = model::Table {
            name: TABLE.to_string(),
        };
        let response = restored(&table);
        let mut mock = MockStub::new();
        mock.expect_async_restore_table()
            .withf(|_, r| *r == restore_request())
            .times(1)
            .returning(move |_, _| Ok(response.clone()));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        let got = admin.restore_table(restore_request()).await?.await?;
        assert_eq!(got, table);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restore_table_polls() -> Result<()> {
        let table = model::Table {
            name: TABLE.to_string(),
        };
        let response = restored(&table);
        let mut mock = MockStub::new();
        mock.expect_async_restore_table()
            .times(1)
            .returning(|_, _| Ok(pending_operation()));
        let mut seq = mockall::Sequence::new();
        mock.expect_async_get_operation()
            .withf(|_, r| r.name == OPERATION)
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(pending_operation()));
        mock.expect_async_get_operation()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(response.clone()));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        let got = admin.restore_table(restore_request()).await?.await?;
        assert_eq!(got, table);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restore_table_operation_error() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_restore_table()
            .times(1)
            .returning(|_, _| Ok(pending_operation()));
        mock.expect_async_get_operation().times(1).returning(|_, _| {
            Ok(model::Operation {
                name: OPERATION.to_string(),
                done: true,
                result: Some(model::operation::Result::Error(model::Status {
                    code: Code::FailedPrecondition.into(),
                    message: "backup is being deleted".to_string(),
                })),
                ..Default::default()
            })
        });

        // Errors from the operation are final, even if the policy would
        // continue.
        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        let err = admin
            .restore_table(restore_request())
            .await?
            .await
            .expect_err("the operation failed");
        assert_eq!(err.code(), Code::FailedPrecondition, "{err:?}");
        assert!(!err.is_exhausted(), "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restore_table_start_is_not_retried() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_restore_table()
            .times(1)
            .returning(|_, _| Err(unavailable()));

        let admin = TableAdmin::with_options(Arc::new(mock), options(10));
        let err = admin
            .restore_table(restore_request())
            .await
            .expect_err("starting a restore is not idempotent");
        assert_eq!(err.code(), Code::Unavailable, "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restore_table_cancel() -> Result<()> {
        let mut mock = MockStub::new();
        mock.expect_async_restore_table()
            .times(1)
            .returning(|_, _| Ok(pending_operation()));
        mock.expect_async_get_operation()
            .returning(|_, _| Ok(pending_operation()));

        let admin = TableAdmin::with_options(Arc::new(mock), options(1_000));
        let polling = admin.restore_table(restore_request()).await?;
        // Let the loop make some progress before cancelling it.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let handle = polling.cancel_handle();
        handle.cancel();
        assert_eq!(handle.phase(), Phase::Done);
        let err = polling.await.expect_err("the loop was cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.code(), Code::Cancelled, "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_reaches_every_call() -> Result<()> {
        let timeout = Some(Duration::from_secs(15));
        let mut mock = MockStub::new();
        mock.expect_async_generate_consistency_token()
            .withf(move |context, _| context.timeout() == timeout)
            .times(1)
            .returning(|_, _| {
                Ok(model::GenerateConsistencyTokenResponse {
                    consistency_token: "token-123".to_string(),
                })
            });
        mock.expect_async_check_consistency()
            .withf(move |context, _| context.timeout() == timeout)
            .times(1)
            .returning(|_, _| check(true));

        let options = options(10).set_attempt_timeout(Duration::from_secs(15));
        let admin = TableAdmin::with_options(Arc::new(mock), options);
        admin.wait_for_replication(TABLE).await?;
        Ok(())
    }
}
