use crate::column::render_column_type;
use crate::ddl::describe_table;
use crate::ident::{quote_ident, tablename};
use crate::reconciler::{reconcile, ReconcilePlan};
use common::error::IngestError;
use common::types::{ColumnDef, TableDef};
use duckdb::Connection;

/// Renders the reconciliation plan as the ordered ALTER TABLE statements of
/// spec §4.5.3: ADDs first, DROPs next, RETYPEs last.
pub fn alter_table_sql(table: &TableDef, plan: &ReconcilePlan) -> Vec<String> {
    let qname = tablename(table);
    let mut statements = Vec::new();

    for col in &plan.added {
        let mut sql = format!("ALTER TABLE {qname} ADD COLUMN {}", render_column_type(col));
        if col.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        statements.push(sql);
    }

    for col in &plan.dropped {
        statements.push(format!("ALTER TABLE {qname} DROP COLUMN {}", quote_ident(&col.name)));
    }

    for col in &plan.retyped {
        statements.push(format!(
            "ALTER TABLE {qname} ALTER {} TYPE {}",
            quote_ident(&col.name),
            common::type_map::duckdb_type_name(col.column_type, col.precision, col.scale)
        ));
    }

    statements
}

/// Describes the live table, diffs against `requested`, and applies the
/// resulting ADD/DROP/RETYPE statements in order (spec §4.5.3).
#[track_caller]
pub fn alter_table(con: &Connection, table: &TableDef, requested: &[ColumnDef]) -> Result<ReconcilePlan, IngestError> {
    let existing = describe_table(con, table)?;
    let plan = reconcile(&existing, requested);

    for sql in alter_table_sql(table, &plan) {
        tracing::info!(%sql, "alter_table");
        con.execute(&sql, [])
            .map_err(|err| IngestError::warehouse(format!("Failed to alter table {table}: {err}")))?;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnType;

    #[test]
    fn statement_order_is_add_then_drop_then_retype() {
        let table = TableDef::new("db", "main", "t");
        let plan = ReconcilePlan {
            added: vec![ColumnDef::new("new_col", ColumnType::String)],
            dropped: vec![ColumnDef::new("old_col", ColumnType::String)],
            retyped: vec![ColumnDef::new("amount", ColumnType::Double)],
        };
        let statements = alter_table_sql(&table, &plan);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with(r#"ALTER TABLE "db"."main"."t" ADD COLUMN "new_col""#));
        assert!(statements[1].starts_with(r#"ALTER TABLE "db"."main"."t" DROP COLUMN "old_col""#));
        assert!(statements[2].starts_with(r#"ALTER TABLE "db"."main"."t" ALTER "amount" TYPE DOUBLE"#));
    }

    #[test]
    fn added_primary_key_column_carries_the_clause() {
        let table = TableDef::new("db", "main", "t");
        let plan = ReconcilePlan {
            added: vec![ColumnDef::new("id", ColumnType::Int).primary_key(true)],
            ..Default::default()
        };
        let statements = alter_table_sql(&table, &plan);
        assert_eq!(statements[0], r#"ALTER TABLE "db"."main"."t" ADD COLUMN "id" INTEGER PRIMARY KEY"#);
    }
}
