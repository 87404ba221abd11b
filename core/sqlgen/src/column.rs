use crate::ident::quote_ident;
use common::type_map::duckdb_type_name;
use common::types::ColumnDef;

/// Renders `"name" TYPE[(w,s)]`, used by `CreateTable` and `AlterTable ADD`
/// (spec §4.5.1, §4.5.3). Primary-key and default clauses are appended by
/// the caller since they only apply in some statements.
pub fn render_column_type(col: &ColumnDef) -> String {
    format!(
        "{} {}",
        quote_ident(&col.name),
        duckdb_type_name(col.column_type, col.precision, col.scale)
    )
}

/// Full column clause for `CREATE TABLE`: type, optional `DEFAULT <literal>`
/// (emitted verbatim, per spec §4.5.1 — the caller supplies an already
/// valid SQL literal, we don't parse it).
pub fn render_create_column(col: &ColumnDef) -> String {
    let mut out = render_column_type(col);
    if let Some(default) = &col.column_default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnType;

    #[test]
    fn decimal_column_carries_width_and_scale() {
        let col = ColumnDef::new("amount", ColumnType::Decimal).decimal(18, 4);
        assert_eq!(render_column_type(&col), r#""amount" DECIMAL(18,4)"#);
    }

    #[test]
    fn non_decimal_column_ignores_precision_and_scale() {
        let mut col = ColumnDef::new("id", ColumnType::Int);
        col.precision = 10;
        col.scale = 2;
        assert_eq!(render_column_type(&col), r#""id" INTEGER"#);
    }

    #[test]
    fn create_column_emits_default_literal_verbatim() {
        let col = ColumnDef::new("age", ColumnType::Int).with_default("25");
        assert_eq!(render_create_column(&col), r#""age" INTEGER DEFAULT 25"#);
    }
}
