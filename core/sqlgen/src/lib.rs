mod alter;
mod column;
mod ddl;
mod dml;
mod ident;
mod migration;
mod reconciler;

pub use alter::{alter_table, alter_table_sql};
pub use column::{render_column_type, render_create_column};
pub use ddl::{create_table, create_table_sql, describe_table, table_exists};
pub use dml::{
    delete, delete_sql, time_bounded_truncate, time_bounded_truncate_sql, update_with_unmodified_sentinel,
    update_with_unmodified_sentinel_sql, upsert, upsert_sql,
};
pub use ident::{quote_ident, quote_literal, tablename};
pub use migration::{execute as migrate, MigrationOp, MigrationResult};
pub use reconciler::{reconcile, ReconcilePlan};
