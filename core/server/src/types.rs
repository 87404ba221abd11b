use common::config::RequestConfig;
use common::types::{ColumnDef, IngestProps, TableDef};
use sqlgen::{MigrationOp, ReconcilePlan};

/// Static capability description (spec §6.1). The field list itself is UI
/// metadata and out of scope (spec.md §1); only the shape of the response
/// is part of this surface.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationFormResponse {
    pub field_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TestRequest {
    pub configuration: RequestConfig,
}

#[derive(Debug, Clone)]
pub struct TestResponse {
    pub success: bool,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DescribeTableRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
}

#[derive(Debug, Clone)]
pub struct DescribeTableResponse {
    pub not_found: bool,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct CreateTableRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTableResponse {}

#[derive(Debug, Clone)]
pub struct AlterTableRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Default)]
pub struct AlterTableResponse {
    pub plan: ReconcilePlan,
}

#[derive(Debug, Clone)]
pub struct TruncateRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
    pub synced_column: String,
    pub cutoff: chrono::DateTime<chrono::Utc>,
    pub deleted_column: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TruncateResponse {}

/// One `WriteBatch` request (spec §5): files are processed replace → update
/// → delete, in listed order within each group.
#[derive(Debug, Clone)]
pub struct WriteBatchRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
    pub columns: Vec<ColumnDef>,
    pub replace_files: Vec<IngestProps>,
    pub update_files: Vec<IngestProps>,
    pub delete_files: Vec<IngestProps>,
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatchResponse {}

#[derive(Debug, Clone)]
pub struct MigrateRequest {
    pub configuration: RequestConfig,
    pub table: TableDef,
    pub op: MigrationOp,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateResponse {
    pub unsupported: bool,
}

impl From<sqlgen::MigrationResult> for MigrateResponse {
    fn from(result: sqlgen::MigrationResult) -> Self {
        Self { unsupported: result.unsupported }
    }
}

/// Re-exported for callers building `MigrateRequest.op` without reaching
/// into `sqlgen` directly.
pub use common::types::ColumnType;
