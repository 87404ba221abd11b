use crate::request_context::RequestContext;
use crate::types::*;
use async_trait::async_trait;
use common::error::IngestError;
use ingest::CsvIngest;
use std::sync::Arc;
use warehouse::ConnectionFactory;

/// The RPC-facing surface (spec §6.1), minus the transport itself (spec.md
/// §1 names the RPC transport and service stubs out of scope).
#[async_trait]
pub trait Destination: Send + Sync {
    async fn configuration_form(&self) -> ConfigurationFormResponse;
    async fn test(&self, req: TestRequest) -> Result<TestResponse, IngestError>;
    async fn describe_table(&self, req: DescribeTableRequest) -> Result<DescribeTableResponse, IngestError>;
    async fn create_table(&self, req: CreateTableRequest) -> Result<CreateTableResponse, IngestError>;
    async fn alter_table(&self, req: AlterTableRequest) -> Result<AlterTableResponse, IngestError>;
    async fn truncate(&self, req: TruncateRequest) -> Result<TruncateResponse, IngestError>;
    async fn write_batch(&self, req: WriteBatchRequest) -> Result<WriteBatchResponse, IngestError>;
    async fn migrate(&self, req: MigrateRequest) -> Result<MigrateResponse, IngestError>;
}

/// Wires `RequestContext`, `CsvIngest`, `SqlGen`, `SchemaReconciler`, and
/// `MigrationPlanner` together (spec.md §4.14) — the direct analogue of the
/// upstream destination server, minus the gRPC transport.
pub struct DestinationService {
    factory: Arc<ConnectionFactory>,
}

impl DestinationService {
    pub fn new(factory: Arc<ConnectionFactory>) -> Self {
        Self { factory }
    }
}

/// Runs a blocking DuckDB-bound closure off the async executor thread, then
/// releases the request context (spec.md §4.14 design note: `Connection`'s
/// calls are synchronous, bridged via `spawn_blocking`).
///
/// A failing closure is logged at SEVERE with its full message before the
/// context is released (spec.md §7's RPC-boundary handler step 1); the
/// caller still receives the untruncated `IngestError` to classify and,
/// where a response carries a failure message, render via
/// `IngestError::header_message`.
async fn run_in_request<T>(
    ctx: RequestContext,
    endpoint: &'static str,
    f: impl FnOnce(&RequestContext) -> Result<T, IngestError> + Send + 'static,
) -> Result<T, IngestError>
where
    T: Send + 'static,
{
    let (ctx, result) = tokio::task::spawn_blocking(move || {
        let result = f(&ctx);
        (ctx, result)
    })
    .await
    .map_err(|err| IngestError::internal(format!("{endpoint} task panicked: {err}")))?;

    if let Err(err) = &result {
        ctx.logger.severe(format!("{endpoint} endpoint failed: {err}"));
    }
    ctx.release(endpoint);
    result
}

#[async_trait]
impl Destination for DestinationService {
    async fn configuration_form(&self) -> ConfigurationFormResponse {
        ConfigurationFormResponse {
            field_names: vec!["motherduck_token".to_string(), "motherduck_database".to_string()],
        }
    }

    /// A failed authentication probe is an *expected* negative outcome, not
    /// an RPC-level error: it comes back `Ok` with `success: false` and a
    /// header-safe failure message rather than propagating `Err` (spec.md
    /// §7's "OK with failure-in-body for the Test endpoint"). Only
    /// config-retrieval failures ahead of connecting (missing token/database)
    /// still propagate as `Err`.
    async fn test(&self, req: TestRequest) -> Result<TestResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        let result = run_in_request(ctx, "Test", move |ctx| {
            ctx.connection
                .execute("SELECT 1", [])
                .map_err(|err| IngestError::warehouse(format!("Test query failed: {err}")))?;
            Ok(TestResponse { success: true, failure_message: None })
        })
        .await;

        match result {
            Ok(response) => Ok(response),
            Err(err) => Ok(TestResponse { success: false, failure_message: Some(err.header_message()) }),
        }
    }

    async fn describe_table(&self, req: DescribeTableRequest) -> Result<DescribeTableResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "DescribeTable", move |ctx| {
            let exists = sqlgen::table_exists(&ctx.connection, &req.table)?;
            if !exists {
                return Ok(DescribeTableResponse { not_found: true, columns: Vec::new() });
            }
            let columns = sqlgen::describe_table(&ctx.connection, &req.table)?;
            Ok(DescribeTableResponse { not_found: false, columns })
        })
        .await
    }

    async fn create_table(&self, req: CreateTableRequest) -> Result<CreateTableResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "CreateTable", move |ctx| {
            sqlgen::create_table(&ctx.connection, &req.table, &req.columns)?;
            Ok(CreateTableResponse::default())
        })
        .await
    }

    async fn alter_table(&self, req: AlterTableRequest) -> Result<AlterTableResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "AlterTable", move |ctx| {
            let plan = sqlgen::alter_table(&ctx.connection, &req.table, &req.columns)?;
            Ok(AlterTableResponse { plan })
        })
        .await
    }

    async fn truncate(&self, req: TruncateRequest) -> Result<TruncateResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "Truncate", move |ctx| {
            sqlgen::time_bounded_truncate(
                &ctx.connection,
                &req.table,
                &req.synced_column,
                req.cutoff,
                req.deleted_column.as_deref(),
            )?;
            Ok(TruncateResponse::default())
        })
        .await
    }

    async fn write_batch(&self, req: WriteBatchRequest) -> Result<WriteBatchResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "WriteBatch", move |ctx| run_write_batch(ctx, &req)).await
    }

    async fn migrate(&self, req: MigrateRequest) -> Result<MigrateResponse, IngestError> {
        let ctx = RequestContext::acquire(&req.configuration, &self.factory)?;
        run_in_request(ctx, "Migrate", move |ctx| {
            let result = sqlgen::migrate(&ctx.connection, &req.table, &req.op)?;
            Ok(MigrateResponse::from(result))
        })
        .await
    }
}

/// Files are applied replace → update → delete, in listed order within each
/// group (spec §5) so an UPDATE never races an UPSERT for the same key.
fn run_write_batch(ctx: &RequestContext, req: &WriteBatchRequest) -> Result<WriteBatchResponse, IngestError> {
    for props in &req.replace_files {
        let all_varchar_eligible = props.unmodified_value.is_some();
        CsvIngest::with_staged_view(&ctx.connection, &ctx.logger, props, all_varchar_eligible, |view| {
            sqlgen::upsert(&ctx.connection, &req.table, view, &req.columns)
        })?;
    }

    for props in &req.update_files {
        CsvIngest::with_staged_view(&ctx.connection, &ctx.logger, props, true, |view| {
            sqlgen::update_with_unmodified_sentinel(
                &ctx.connection,
                &req.table,
                view,
                &req.columns,
                props.null_value.as_deref(),
                props.unmodified_value.as_deref(),
            )
        })?;
    }

    for props in &req.delete_files {
        CsvIngest::with_staged_view(&ctx.connection, &ctx.logger, props, false, |view| {
            sqlgen::delete(&ctx.connection, &req.table, view, &req.columns)
        })?;
    }

    Ok(WriteBatchResponse::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configuration_form_lists_required_fields() {
        let service = DestinationService::new(Arc::new(ConnectionFactory::new()));
        let form = service.configuration_form().await;
        assert!(form.field_names.contains(&"motherduck_token".to_string()));
    }

    #[tokio::test]
    async fn test_endpoint_propagates_missing_configuration_as_an_error() {
        let service = DestinationService::new(Arc::new(ConnectionFactory::new()));
        let req = TestRequest { configuration: common::config::RequestConfig::new(Default::default()) };
        let err = service.test(req).await.unwrap_err();
        assert!(err.to_string().contains("Missing property motherduck_token"));
    }
}
