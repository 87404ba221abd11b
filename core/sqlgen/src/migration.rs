use crate::ddl::{create_table, describe_table};
use crate::ident::{quote_ident, quote_literal, tablename};
use common::error::IngestError;
use common::types::{
    ColumnDef, ColumnType, SyncMode, TableDef, FIVETRAN_ACTIVE, FIVETRAN_END, FIVETRAN_START, HISTORY_END_OF_TIME,
};
use duckdb::Connection;

/// One `Migrate` RPC operation (spec §4.7). `Unsupported` stands in for an
/// unknown or empty oneof variant at the RPC boundary — per spec it MUST
/// produce a successful, `unsupported=true` response rather than an error.
#[derive(Debug, Clone)]
pub enum MigrationOp {
    DropTable,
    RenameTable { to: String },
    RenameColumn { from: String, to: String },
    CopyTable { to: TableDef },
    CopyColumn { from: String, to: String },
    CopyTableToHistoryMode { to: TableDef, soft_deleted_col: Option<String> },
    AddColumnWithDefault { column: String, column_type: ColumnType, precision: u32, scale: u32, default: String },
    AddColumnInHistoryMode {
        column: String,
        column_type: ColumnType,
        precision: u32,
        scale: u32,
        default: String,
        operation_timestamp: chrono::DateTime<chrono::Utc>,
    },
    DropColumnInHistoryMode { column: String, operation_timestamp: chrono::DateTime<chrono::Utc> },
    UpdateColumnValue { column: String, value: String },
    SyncModeMigration { from: SyncMode, to: SyncMode, keep_deleted_rows: bool },
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationResult {
    pub unsupported: bool,
}

fn format_timestamptz(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

/// "NULL" is the sentinel for SQL NULL; everything else (including the
/// empty string) is a string literal (spec §4.7, §9 open question — current
/// behavior preserved).
fn render_migration_default(default: &str) -> String {
    if default == "NULL" {
        "NULL".to_string()
    } else {
        quote_literal(default)
    }
}

/// Builds a shadow table with `new_columns`, populates it from `select_body`
/// (a full `SELECT ...` statement over the existing table), then drops the
/// original and renames the shadow into place. Used for the sync-mode
/// transitions that need to add/remove primary-key columns, which DuckDB's
/// `ALTER TABLE` cannot do in place (spec §4.7).
fn rebuild_table(con: &Connection, table: &TableDef, new_columns: &[ColumnDef], select_body: &str) -> Result<(), IngestError> {
    let shadow = TableDef::new(table.db_name.clone(), table.schema_name.clone(), format!("{}__migrating", table.table_name));
    create_table(con, &shadow, new_columns)?;
    con.execute(&format!("INSERT INTO {} {select_body}", tablename(&shadow)), [])
        .map_err(|err| IngestError::warehouse(format!("Failed to populate shadow table for {table}: {err}")))?;
    con.execute(&format!("DROP TABLE {}", tablename(table)), [])
        .map_err(|err| IngestError::warehouse(format!("Failed to drop {table} during rebuild: {err}")))?;
    con.execute(
        &format!("ALTER TABLE {} RENAME TO {}", tablename(&shadow), quote_ident(&table.table_name)),
        [],
    )
    .map_err(|err| IngestError::warehouse(format!("Failed to rename shadow table into {table}: {err}")))?;
    Ok(())
}

fn history_columns() -> [ColumnDef; 3] {
    [
        ColumnDef::new(FIVETRAN_START, ColumnType::UtcDatetime).primary_key(true),
        ColumnDef::new(FIVETRAN_END, ColumnType::UtcDatetime),
        ColumnDef::new(FIVETRAN_ACTIVE, ColumnType::Boolean),
    ]
}

#[track_caller]
pub fn execute(con: &Connection, table: &TableDef, op: &MigrationOp) -> Result<MigrationResult, IngestError> {
    match op {
        MigrationOp::Unsupported => Ok(MigrationResult { unsupported: true }),

        MigrationOp::DropTable => {
            con.execute(&format!("DROP TABLE {}", tablename(table)), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to drop table {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::RenameTable { to } => {
            con.execute(&format!("ALTER TABLE {} RENAME TO {}", tablename(table), quote_ident(to)), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to rename table {table} to {to}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::RenameColumn { from, to } => {
            con.execute(
                &format!("ALTER TABLE {} RENAME COLUMN {} TO {}", tablename(table), quote_ident(from), quote_ident(to)),
                [],
            )
            .map_err(|err| IngestError::warehouse(format!("Failed to rename column {from} to {to} on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::CopyTable { to } => {
            let columns = describe_table(con, table)?;
            create_table(con, to, &columns)?;
            con.execute(&format!("INSERT INTO {} SELECT * FROM {}", tablename(to), tablename(table)), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to copy {table} into {to}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::CopyColumn { from, to } => {
            let columns = describe_table(con, table)?;
            let source = columns
                .iter()
                .find(|c| &c.name == from)
                .ok_or_else(|| IngestError::invalid_argument(format!("Column {from} does not exist on {table}")))?;
            let ty = common::type_map::duckdb_type_name(source.column_type, source.precision, source.scale);
            con.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} {ty}", tablename(table), quote_ident(to)),
                [],
            )
            .map_err(|err| IngestError::warehouse(format!("Failed to add column {to} on {table}: {err}")))?;
            con.execute(
                &format!("UPDATE {} SET {} = {}", tablename(table), quote_ident(to), quote_ident(from)),
                [],
            )
            .map_err(|err| IngestError::warehouse(format!("Failed to copy values from {from} to {to} on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::CopyTableToHistoryMode { to, soft_deleted_col } => {
            let source_columns = describe_table(con, table)?;
            let kept: Vec<ColumnDef> = source_columns
                .iter()
                .filter(|c| Some(&c.name) != soft_deleted_col.as_ref())
                .cloned()
                .collect();

            let mut new_columns = kept.clone();
            new_columns.extend(history_columns());

            let projection = kept.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            let active_expr = match soft_deleted_col {
                Some(col) => format!("NOT coalesce({}, false)", quote_ident(col)),
                None => "true".to_string(),
            };
            let select_body = format!(
                "SELECT {projection}, now() AS {start}, {end_lit}::TIMESTAMPTZ AS {end}, {active_expr} AS {active} FROM {}",
                tablename(table),
                start = quote_ident(FIVETRAN_START),
                end = quote_ident(FIVETRAN_END),
                end_lit = quote_literal(HISTORY_END_OF_TIME),
                active = quote_ident(FIVETRAN_ACTIVE),
            );

            create_table(con, to, &new_columns)?;
            con.execute(&format!("INSERT INTO {} {select_body}", tablename(to)), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to populate history table {to}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::AddColumnWithDefault { column, column_type, precision, scale, default } => {
            let ty = common::type_map::duckdb_type_name(*column_type, *precision, *scale);
            let literal = render_migration_default(default);
            con.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} {ty} DEFAULT {literal}", tablename(table), quote_ident(column)),
                [],
            )
            .map_err(|err| IngestError::warehouse(format!("Failed to add column {column} on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::AddColumnInHistoryMode { column, column_type, precision, scale, default, operation_timestamp } => {
            assert_start_not_past(con, table, *operation_timestamp)?;
            let ty = common::type_map::duckdb_type_name(*column_type, *precision, *scale);
            let literal = render_migration_default(default);
            con.execute(&format!("ALTER TABLE {} ADD COLUMN {} {ty}", tablename(table), quote_ident(column)), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to add column {column} on {table}: {err}")))?;
            roll_history_forward(con, table, column, &literal, *operation_timestamp)?;
            Ok(MigrationResult::default())
        }

        MigrationOp::DropColumnInHistoryMode { column, operation_timestamp } => {
            assert_start_not_past(con, table, *operation_timestamp)?;
            roll_history_forward(con, table, column, "NULL", *operation_timestamp)?;
            Ok(MigrationResult::default())
        }

        MigrationOp::UpdateColumnValue { column, value } => {
            con.execute(
                &format!("UPDATE {} SET {} = {}", tablename(table), quote_ident(column), render_migration_default(value)),
                [],
            )
            .map_err(|err| IngestError::warehouse(format!("Failed to update column {column} on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        MigrationOp::SyncModeMigration { from, to, keep_deleted_rows } => sync_mode_migration(con, table, from, to, *keep_deleted_rows),
    }
}

/// Precondition for both history-mode column migrations (spec §3, §4.7):
/// every existing row's `_fivetran_start` must be `<= operation_timestamp`.
fn assert_start_not_past(con: &Connection, table: &TableDef, operation_timestamp: chrono::DateTime<chrono::Utc>) -> Result<(), IngestError> {
    let sql = format!("SELECT max({}) FROM {}", quote_ident(FIVETRAN_START), tablename(table));
    let max_start: Option<chrono::DateTime<chrono::Utc>> = con
        .query_row(&sql, [], |row| row.get(0))
        .map_err(|err| IngestError::warehouse(format!("Failed to read max({FIVETRAN_START}) on {table}: {err}")))?;

    if let Some(max_start) = max_start {
        if max_start > operation_timestamp {
            return Err(IngestError::precondition(
                "The _fivetran_start column contains values larger than the operation timestamp. Please contact Fivetran support.",
            ));
        }
    }
    Ok(())
}

/// Shared shape of `AddColumnInHistoryMode`/`DropColumnInHistoryMode`: close
/// out the currently active rows at `operation_timestamp` and insert their
/// successors with the new/dropped column set to `new_value_sql` (spec
/// §4.7). `new_value_sql` is already a valid SQL expression (a literal or
/// `NULL`), never further quoted.
fn roll_history_forward(
    con: &Connection,
    table: &TableDef,
    column: &str,
    new_value_sql: &str,
    operation_timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<(), IngestError> {
    let qname = tablename(table);
    let ts = quote_literal(&format_timestamptz(operation_timestamp));
    let active = quote_ident(FIVETRAN_ACTIVE);
    let start = quote_ident(FIVETRAN_START);
    let end = quote_ident(FIVETRAN_END);
    let col = quote_ident(column);

    con.execute(
        &format!("UPDATE {qname} SET {end} = {ts}, {active} = false WHERE {active} = true"),
        [],
    )
    .map_err(|err| IngestError::warehouse(format!("Failed to close out active rows on {table}: {err}")))?;

    let sql = format!(
        "INSERT INTO {qname} BY NAME SELECT * EXCLUDE ({start}, {end}, {active}, {col}), \
         {ts}::TIMESTAMPTZ AS {start}, {end_lit}::TIMESTAMPTZ AS {end}, true AS {active}, {new_value_sql} AS {col} \
         FROM {qname} WHERE {end} = {ts} AND {active} = false",
        end_lit = quote_literal(HISTORY_END_OF_TIME),
    );
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to insert successor rows on {table}: {err}")))?;
    Ok(())
}

fn sync_mode_migration(con: &Connection, table: &TableDef, from: &SyncMode, to: &SyncMode, keep_deleted_rows: bool) -> Result<MigrationResult, IngestError> {
    let qname = tablename(table);

    match (from, to) {
        (SyncMode::Live, SyncMode::SoftDelete(d)) => {
            let col = quote_ident(d);
            con.execute(&format!("ALTER TABLE {qname} ADD COLUMN {col} BOOLEAN DEFAULT false"), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to add soft-delete column on {table}: {err}")))?;
            con.execute(&format!("UPDATE {qname} SET {col} = false"), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to initialize soft-delete column on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        (SyncMode::SoftDelete(d), SyncMode::Live) => {
            let col = quote_ident(d);
            con.execute(&format!("DELETE FROM {qname} WHERE {col} = true"), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to delete soft-deleted rows on {table}: {err}")))?;
            con.execute(&format!("ALTER TABLE {qname} DROP COLUMN {col}"), [])
                .map_err(|err| IngestError::warehouse(format!("Failed to drop soft-delete column on {table}: {err}")))?;
            Ok(MigrationResult::default())
        }

        (SyncMode::Live, SyncMode::History) => {
            let existing = describe_table(con, table)?;
            let mut new_columns = existing.clone();
            new_columns.extend(history_columns());
            let projection = existing.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            let select_body = format!(
                "SELECT {projection}, now() AS {start}, {end_lit}::TIMESTAMPTZ AS {end}, true AS {active} FROM {qname}",
                start = quote_ident(FIVETRAN_START),
                end = quote_ident(FIVETRAN_END),
                end_lit = quote_literal(HISTORY_END_OF_TIME),
                active = quote_ident(FIVETRAN_ACTIVE),
            );
            rebuild_table(con, table, &new_columns, &select_body)?;
            Ok(MigrationResult::default())
        }

        (SyncMode::History, SyncMode::Live) => {
            let existing = describe_table(con, table)?;
            let kept: Vec<ColumnDef> = existing
                .iter()
                .filter(|c| ![FIVETRAN_START, FIVETRAN_END, FIVETRAN_ACTIVE].contains(&c.name.as_str()))
                .cloned()
                .collect();
            let projection = kept.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            let where_clause = if keep_deleted_rows {
                String::new()
            } else {
                format!(" WHERE {} = true", quote_ident(FIVETRAN_ACTIVE))
            };
            let select_body = format!("SELECT {projection} FROM {qname}{where_clause}");
            rebuild_table(con, table, &kept, &select_body)?;
            Ok(MigrationResult::default())
        }

        (SyncMode::History, SyncMode::SoftDelete(d)) => {
            let existing = describe_table(con, table)?;
            let kept: Vec<ColumnDef> = existing
                .iter()
                .filter(|c| ![FIVETRAN_START, FIVETRAN_END, FIVETRAN_ACTIVE].contains(&c.name.as_str()))
                .cloned()
                .collect();
            let mut new_columns = kept.clone();
            new_columns.push(ColumnDef::new(d, ColumnType::Boolean));

            let projection = kept.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            // Keep only the latest version per primary key, then flag it
            // deleted iff it was inactive at the cutover.
            let pk_list = kept.iter().filter(|c| c.primary_key).map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            let select_body = format!(
                "SELECT {projection}, NOT {active} AS {d_col} FROM {qname} QUALIFY row_number() OVER (PARTITION BY {pk_list} ORDER BY {start} DESC) = 1",
                active = quote_ident(FIVETRAN_ACTIVE),
                d_col = quote_ident(d),
                start = quote_ident(FIVETRAN_START),
            );
            rebuild_table(con, table, &new_columns, &select_body)?;
            Ok(MigrationResult::default())
        }

        (SyncMode::SoftDelete(d), SyncMode::History) => {
            let existing = describe_table(con, table)?;
            let kept: Vec<ColumnDef> = existing.iter().filter(|c| c.name != *d).cloned().collect();
            let mut new_columns = kept.clone();
            new_columns.extend(history_columns());

            let projection = kept.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
            let select_body = format!(
                "SELECT {projection}, now() AS {start}, {end_lit}::TIMESTAMPTZ AS {end}, NOT {d_col} AS {active} FROM {qname}",
                start = quote_ident(FIVETRAN_START),
                end = quote_ident(FIVETRAN_END),
                end_lit = quote_literal(HISTORY_END_OF_TIME),
                active = quote_ident(FIVETRAN_ACTIVE),
                d_col = quote_ident(d),
            );
            rebuild_table(con, table, &new_columns, &select_body)?;
            Ok(MigrationResult::default())
        }

        // Same-mode "transitions" and anything else not named by spec §4.7
        // are reported, not executed.
        _ => Ok(MigrationResult { unsupported: true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_migration_default_treats_null_literal_specially() {
        assert_eq!(render_migration_default("NULL"), "NULL");
        assert_eq!(render_migration_default(""), "''");
        assert_eq!(render_migration_default("25"), "'25'");
    }

    #[test]
    fn format_timestamptz_has_nanosecond_precision() {
        use chrono::TimeZone;
        let ts = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(format_timestamptz(ts), "2024-06-01T00:00:00.000000000Z");
    }
}
