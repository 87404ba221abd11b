use serde::{Deserialize, Serialize};
use std::fmt;

/// CDC wire types, per spec §6.2. `Unspecified` drives `CsvIngest`'s
/// auto-detect fallback when the upstream hasn't told us a column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Unspecified,
    Boolean,
    Short,
    Int,
    Long,
    Float,
    Double,
    NaiveDate,
    NaiveDatetime,
    UtcDatetime,
    Decimal,
    Binary,
    String,
    Json,
}

/// One column of a [`TableDef`]. Precision/scale only matter for
/// [`ColumnType::Decimal`]; `column_default` is only read by the migration
/// operations that accept a default-value literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub precision: u32,
    pub scale: u32,
    pub column_default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            precision: 0,
            scale: 0,
            column_default: None,
        }
    }

    pub fn primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        self
    }

    pub fn decimal(mut self, precision: u32, scale: u32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.column_default = Some(literal.into());
        self
    }
}

/// Schema-qualified table reference; `schema_name` defaults to `"main"`
/// when the upstream leaves it blank (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub db_name: String,
    pub schema_name: String,
    pub table_name: String,
}

impl TableDef {
    pub fn new(db_name: impl Into<String>, schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        let schema_name = schema_name.into();
        Self {
            db_name: db_name.into(),
            schema_name: if schema_name.is_empty() {
                "main".to_string()
            } else {
                schema_name
            },
            table_name: table_name.into(),
        }
    }

    /// Mirrors `schema_types.cpp`'s `to_escaped_string` — used in log and
    /// warehouse-error context, distinct from `SqlGen::tablename` which
    /// quotes each part for use inside a statement.
    pub fn to_escaped_string(&self) -> String {
        format!("{}.{}.{}", self.db_name, self.schema_name, self.table_name)
    }
}

impl fmt::Display for TableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_escaped_string())
    }
}

/// Per-file ingestion request (spec §3 / §4.3).
#[derive(Debug, Clone)]
pub struct IngestProps {
    pub filename: String,
    pub decryption_key: Option<Vec<u8>>,
    pub columns: Vec<ColumnDef>,
    pub null_value: Option<String>,
    pub unmodified_value: Option<String>,
    pub max_record_size: Option<usize>,
}

impl IngestProps {
    pub fn new(filename: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            filename: filename.into(),
            decryption_key: None,
            columns,
            null_value: None,
            unmodified_value: None,
            max_record_size: None,
        }
    }
}

/// Table sync discipline (spec §3). `SoftDelete` carries the name of the
/// boolean deleted-flag column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Live,
    SoftDelete(String),
    History,
}

pub const FIVETRAN_START: &str = "_fivetran_start";
pub const FIVETRAN_END: &str = "_fivetran_end";
pub const FIVETRAN_ACTIVE: &str = "_fivetran_active";
pub const FIVETRAN_DELETED: &str = "_fivetran_deleted";
pub const FIVETRAN_SYNCED: &str = "_fivetran_synced";
pub const HISTORY_END_OF_TIME: &str = "9999-12-31T23:59:59.999Z";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_def_defaults_empty_schema_to_main() {
        let t = TableDef::new("db", "", "t");
        assert_eq!(t.schema_name, "main");
        assert_eq!(t.to_escaped_string(), "db.main.t");
    }

    #[test]
    fn column_def_builder_sets_decimal_precision_and_scale() {
        let c = ColumnDef::new("amount", ColumnType::Decimal).decimal(18, 4).primary_key(true);
        assert_eq!(c.precision, 18);
        assert_eq!(c.scale, 4);
        assert!(c.primary_key);
    }
}
