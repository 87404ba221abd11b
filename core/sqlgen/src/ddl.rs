use crate::column::render_create_column;
use crate::ident::{quote_ident, tablename};
use common::error::IngestError;
use common::type_map::column_type_from_duckdb;
use common::types::{ColumnDef, TableDef};
use duckdb::Connection;

/// `CREATE OR REPLACE TABLE <qname> (<cols>, PRIMARY KEY (<pks>))`
/// (spec §4.5.1). Emits no `PRIMARY KEY` clause when no column is a PK —
/// DuckDB rejects an empty `PRIMARY KEY ()`.
pub fn create_table_sql(table: &TableDef, columns: &[ColumnDef]) -> String {
    let cols = columns
        .iter()
        .map(render_create_column)
        .collect::<Vec<_>>()
        .join(", ");

    let pk_cols: Vec<&str> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();

    let mut sql = format!("CREATE OR REPLACE TABLE {} ({cols}", tablename(table));
    if !pk_cols.is_empty() {
        let pk_list = pk_cols
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(", PRIMARY KEY ({pk_list})"));
    }
    sql.push(')');
    sql
}

#[track_caller]
pub fn create_table(con: &Connection, table: &TableDef, columns: &[ColumnDef]) -> Result<(), IngestError> {
    let sql = create_table_sql(table, columns);
    tracing::info!(%sql, "create_table");
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to create table {table}: {err}")))?;
    Ok(())
}

/// `SELECT column_name, data_type, is_primary_key, numeric_precision,
/// numeric_scale, column_default FROM information_schema.columns WHERE ...
/// ORDER BY ordinal_position` (spec §4.5.2). Returns an empty vec when the
/// table does not exist; the caller reports `not_found`.
#[track_caller]
pub fn describe_table(con: &Connection, table: &TableDef) -> Result<Vec<ColumnDef>, IngestError> {
    let sql = "SELECT column_name, data_type, is_primary_key, numeric_precision, numeric_scale, column_default \
               FROM information_schema.columns \
               WHERE table_catalog = ? AND table_schema = ? AND table_name = ? \
               ORDER BY ordinal_position";

    let mut stmt = con
        .prepare(sql)
        .map_err(|err| IngestError::warehouse(format!("Failed to prepare describe_table query: {err}")))?;

    let rows = stmt
        .query_map(
            duckdb::params![table.db_name, table.schema_name, table.table_name],
            |row| {
                let name: String = row.get(0)?;
                let data_type: String = row.get(1)?;
                let is_primary_key: bool = row.get(2).unwrap_or(false);
                let precision: Option<i64> = row.get(3)?;
                let scale: Option<i64> = row.get(4)?;
                let default: Option<String> = row.get(5)?;
                Ok(ColumnDef {
                    name,
                    column_type: column_type_from_duckdb(&data_type),
                    primary_key: is_primary_key,
                    precision: precision.unwrap_or(0).max(0) as u32,
                    scale: scale.unwrap_or(0).max(0) as u32,
                    column_default: default,
                })
            },
        )
        .map_err(|err| IngestError::warehouse(format!("Failed to run describe_table query: {err}")))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row.map_err(|err| IngestError::warehouse(format!("describe_table row error: {err}")))?);
    }
    Ok(columns)
}

pub fn table_exists(con: &Connection, table: &TableDef) -> Result<bool, IngestError> {
    let sql = "SELECT table_name FROM information_schema.tables \
               WHERE table_catalog = ? AND table_schema = ? AND table_name = ?";
    let mut stmt = con
        .prepare(sql)
        .map_err(|err| IngestError::warehouse(format!("Failed to prepare table_exists query: {err}")))?;
    let exists = stmt
        .exists(duckdb::params![table.db_name, table.schema_name, table.table_name])
        .map_err(|err| IngestError::warehouse(format!("Failed to run table_exists query: {err}")))?;
    Ok(exists)
}
