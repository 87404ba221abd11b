use common::types::TableDef;

/// Double-quotes an identifier, doubling any embedded `"` (spec §4.5).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quotes a string literal, doubling any embedded `'` (spec §4.5).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"db"."schema"."table"` (spec §4.5).
pub fn tablename(table: &TableDef) -> String {
    format!(
        "{}.{}.{}",
        quote_ident(&table.db_name),
        quote_ident(&table.schema_name),
        quote_ident(&table.table_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn quote_literal_doubles_embedded_quotes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn tablename_quotes_all_three_parts() {
        let t = TableDef::new("db", "main", "books");
        assert_eq!(tablename(&t), r#""db"."main"."books""#);
    }
}
