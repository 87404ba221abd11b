use crate::ident::{quote_ident, quote_literal, tablename};
use common::error::IngestError;
use common::type_map::duckdb_type_name;
use common::types::{ColumnDef, TableDef};
use duckdb::Connection;

fn primary_keys(columns: &[ColumnDef]) -> Vec<&ColumnDef> {
    columns.iter().filter(|c| c.primary_key).collect()
}

fn non_primary_keys(columns: &[ColumnDef]) -> Vec<&ColumnDef> {
    columns.iter().filter(|c| !c.primary_key).collect()
}

/// `INSERT INTO <target> BY NAME SELECT * FROM <staging> ON CONFLICT (<pk>)
/// DO UPDATE SET "c" = excluded."c"` for every non-PK column (spec §4.5.4).
///
/// The excluded-row semantics of `ON CONFLICT ... DO UPDATE SET "c" =
/// excluded."c"` already carry `_fivetran_deleted`/`_fivetran_synced`
/// through untouched when they're part of `columns` — see DESIGN.md for why
/// this drops the literal `SELECT * EXCLUDE (...)` wording.
pub fn upsert_sql(target: &TableDef, staging_view: &str, columns: &[ColumnDef]) -> String {
    let mut sql = format!("INSERT INTO {} BY NAME SELECT * FROM {staging_view}", tablename(target));

    let pk_cols = primary_keys(columns);
    if pk_cols.is_empty() {
        return sql;
    }

    let pk_list = pk_cols.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
    sql.push_str(&format!(" ON CONFLICT ({pk_list}) DO UPDATE SET "));

    let sets = non_primary_keys(columns)
        .iter()
        .map(|c| {
            let q = quote_ident(&c.name);
            format!("{q} = excluded.{q}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    sql.push_str(&sets);
    sql
}

#[track_caller]
pub fn upsert(con: &Connection, target: &TableDef, staging_view: &str, columns: &[ColumnDef]) -> Result<(), IngestError> {
    let sql = upsert_sql(target, staging_view, columns);
    tracing::info!(%sql, "upsert");
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to upsert into {target}: {err}")))?;
    Ok(())
}

/// Per-column `CASE WHEN staging."c" = unmodified THEN target."c" WHEN
/// staging."c" = null_sentinel THEN NULL ELSE TRY_CAST(staging."c" AS T)
/// END`, joined against the staging view on every PK column via
/// `TRY_CAST(staging."pk" AS pk_type)` (spec §4.5.5). The staging view is
/// all-VARCHAR, hence the casts on both sides of the join predicate.
pub fn update_with_unmodified_sentinel_sql(
    target: &TableDef,
    staging_view: &str,
    columns: &[ColumnDef],
    null_value: Option<&str>,
    unmodified_value: Option<&str>,
) -> String {
    let qname = tablename(target);

    let sets = non_primary_keys(columns)
        .iter()
        .map(|col| {
            let q = quote_ident(&col.name);
            let ty = duckdb_type_name(col.column_type, col.precision, col.scale);
            let mut case = String::from("CASE ");
            if let Some(unmod) = unmodified_value {
                case.push_str(&format!("WHEN {staging_view}.{q} = {} THEN {qname}.{q} ", quote_literal(unmod)));
            }
            if let Some(nullstr) = null_value {
                case.push_str(&format!("WHEN {staging_view}.{q} = {} THEN NULL ", quote_literal(nullstr)));
            }
            case.push_str(&format!("ELSE TRY_CAST({staging_view}.{q} AS {ty}) END"));
            format!("{q} = {case}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let join = primary_keys(columns)
        .iter()
        .map(|pk| {
            let q = quote_ident(&pk.name);
            let ty = duckdb_type_name(pk.column_type, pk.precision, pk.scale);
            format!("{qname}.{q} = TRY_CAST({staging_view}.{q} AS {ty})")
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    format!("UPDATE {qname} SET {sets} FROM {staging_view} WHERE {join}")
}

#[track_caller]
pub fn update_with_unmodified_sentinel(
    con: &Connection,
    target: &TableDef,
    staging_view: &str,
    columns: &[ColumnDef],
    null_value: Option<&str>,
    unmodified_value: Option<&str>,
) -> Result<(), IngestError> {
    let sql = update_with_unmodified_sentinel_sql(target, staging_view, columns, null_value, unmodified_value);
    tracing::info!(%sql, "update_with_unmodified_sentinel");
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to update {target}: {err}")))?;
    Ok(())
}

/// `DELETE FROM <target> USING <staging> WHERE target."pk1" = staging."pk1"
/// AND ...` (spec §4.5.6).
pub fn delete_sql(target: &TableDef, staging_view: &str, columns: &[ColumnDef]) -> String {
    let qname = tablename(target);
    let join = primary_keys(columns)
        .iter()
        .map(|pk| {
            let q = quote_ident(&pk.name);
            format!("{qname}.{q} = {staging_view}.{q}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("DELETE FROM {qname} USING {staging_view} WHERE {join}")
}

#[track_caller]
pub fn delete(con: &Connection, target: &TableDef, staging_view: &str, columns: &[ColumnDef]) -> Result<(), IngestError> {
    let sql = delete_sql(target, staging_view, columns);
    tracing::info!(%sql, "delete");
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to delete from {target}: {err}")))?;
    Ok(())
}

/// `UPDATE <target> SET "<deleted_column>" = TRUE WHERE "<synced_column>" <
/// <cutoff>` (soft truncate) or `DELETE FROM <target> WHERE "<synced_column>"
/// < <cutoff>` (hard truncate) — spec §4.5.7. `cutoff` is rendered as an
/// ISO-8601 UTC literal with nanosecond precision.
pub fn time_bounded_truncate_sql(
    target: &TableDef,
    synced_column: &str,
    cutoff: chrono::DateTime<chrono::Utc>,
    deleted_column: Option<&str>,
) -> String {
    let qname = tablename(target);
    let cutoff_literal = quote_literal(&cutoff.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string());
    let synced = quote_ident(synced_column);
    match deleted_column {
        Some(deleted) => format!("UPDATE {qname} SET {} = TRUE WHERE {synced} < {cutoff_literal}", quote_ident(deleted)),
        None => format!("DELETE FROM {qname} WHERE {synced} < {cutoff_literal}"),
    }
}

#[track_caller]
pub fn time_bounded_truncate(
    con: &Connection,
    target: &TableDef,
    synced_column: &str,
    cutoff: chrono::DateTime<chrono::Utc>,
    deleted_column: Option<&str>,
) -> Result<(), IngestError> {
    let sql = time_bounded_truncate_sql(target, synced_column, cutoff, deleted_column);
    tracing::info!(%sql, "time_bounded_truncate");
    con.execute(&sql, [])
        .map_err(|err| IngestError::warehouse(format!("Failed to truncate {target}: {err}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnType;

    fn books_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", ColumnType::Int).primary_key(true),
            ColumnDef::new("title", ColumnType::String),
            ColumnDef::new("magic_number", ColumnType::Int),
        ]
    }

    #[test]
    fn upsert_sets_every_non_pk_column_from_excluded() {
        let target = TableDef::new("db", "main", "books");
        let sql = upsert_sql(&target, r#""staging"."main"."csv_view""#, &books_columns());
        assert_eq!(
            sql,
            concat!(
                r#"INSERT INTO "db"."main"."books" BY NAME SELECT * FROM "staging"."main"."csv_view" "#,
                r#"ON CONFLICT ("id") DO UPDATE SET "title" = excluded."title", "magic_number" = excluded."magic_number""#
            )
        );
    }

    #[test]
    fn update_case_handles_unmodified_and_null_sentinels() {
        let target = TableDef::new("db", "main", "books");
        let sql = update_with_unmodified_sentinel_sql(
            &target,
            "staging",
            &books_columns(),
            Some("magic-nullvalue"),
            Some("unmodified-sentinel"),
        );
        assert!(sql.contains(r#"WHEN staging."title" = 'unmodified-sentinel' THEN "db"."main"."books"."title""#));
        assert!(sql.contains(r#"WHEN staging."title" = 'magic-nullvalue' THEN NULL"#));
        assert!(sql.contains(r#"ELSE TRY_CAST(staging."title" AS VARCHAR) END"#));
        assert!(sql.contains(r#"WHERE "db"."main"."books"."id" = TRY_CAST(staging."id" AS INTEGER)"#));
    }

    #[test]
    fn delete_joins_on_every_primary_key_column() {
        let target = TableDef::new("db", "main", "books");
        let sql = delete_sql(&target, "staging", &books_columns());
        assert_eq!(
            sql,
            r#"DELETE FROM "db"."main"."books" USING staging WHERE "db"."main"."books"."id" = staging."id""#
        );
    }

    #[test]
    fn soft_truncate_sets_deleted_flag_instead_of_deleting() {
        use chrono::TimeZone;
        let target = TableDef::new("db", "main", "books");
        let cutoff = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let sql = time_bounded_truncate_sql(&target, "_fivetran_synced", cutoff, Some("_fivetran_deleted"));
        assert!(sql.starts_with(r#"UPDATE "db"."main"."books" SET "_fivetran_deleted" = TRUE WHERE "_fivetran_synced" < "#));
    }

    #[test]
    fn hard_truncate_deletes_rows() {
        use chrono::TimeZone;
        let target = TableDef::new("db", "main", "books");
        let cutoff = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let sql = time_bounded_truncate_sql(&target, "_fivetran_synced", cutoff, None);
        assert!(sql.starts_with(r#"DELETE FROM "db"."main"."books" WHERE "_fivetran_synced" < "#));
    }
}
