use crate::types::ColumnType;

/// Renders the DuckDB logical type name for a wire type, including
/// `(width,scale)` for `DECIMAL` (spec §6.2, §4.5.1).
pub fn duckdb_type_name(column_type: ColumnType, precision: u32, scale: u32) -> String {
    match column_type {
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Short => "SMALLINT".to_string(),
        ColumnType::Int => "INTEGER".to_string(),
        ColumnType::Long => "BIGINT".to_string(),
        ColumnType::Float => "FLOAT".to_string(),
        ColumnType::Double => "DOUBLE".to_string(),
        ColumnType::NaiveDate => "DATE".to_string(),
        ColumnType::NaiveDatetime => "TIMESTAMP".to_string(),
        ColumnType::UtcDatetime => "TIMESTAMP WITH TIME ZONE".to_string(),
        ColumnType::Decimal => format!("DECIMAL({precision},{scale})"),
        ColumnType::Binary => "BIT".to_string(),
        // JSON is write-only: DuckDB has no JSON column type in this
        // engine, so it round-trips through VARCHAR (matches the
        // upstream connector's one-directional quirk).
        ColumnType::String | ColumnType::Json => "VARCHAR".to_string(),
        ColumnType::Unspecified => "VARCHAR".to_string(),
    }
}

/// Inverse of [`duckdb_type_name`]'s type-id portion: classifies a DuckDB
/// `information_schema.columns.data_type` string back into a wire type.
/// DECIMAL's width/scale are parsed separately by the caller since
/// `information_schema` reports them in their own columns.
pub fn column_type_from_duckdb(data_type: &str) -> ColumnType {
    let upper = data_type.to_ascii_uppercase();
    match upper.as_str() {
        "BOOLEAN" => ColumnType::Boolean,
        "SMALLINT" => ColumnType::Short,
        "INTEGER" => ColumnType::Int,
        "BIGINT" => ColumnType::Long,
        "FLOAT" | "REAL" => ColumnType::Float,
        "DOUBLE" => ColumnType::Double,
        "DATE" => ColumnType::NaiveDate,
        "TIMESTAMP" => ColumnType::NaiveDatetime,
        "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => ColumnType::UtcDatetime,
        "BIT" | "BITSTRING" => ColumnType::Binary,
        "VARCHAR" => ColumnType::String,
        s if s.starts_with("DECIMAL") => ColumnType::Decimal,
        _ => ColumnType::Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_renders_width_and_scale() {
        assert_eq!(duckdb_type_name(ColumnType::Decimal, 18, 4), "DECIMAL(18,4)");
    }

    #[test]
    fn json_maps_to_varchar_like_string() {
        assert_eq!(duckdb_type_name(ColumnType::Json, 0, 0), "VARCHAR");
        assert_eq!(duckdb_type_name(ColumnType::String, 0, 0), "VARCHAR");
    }

    #[test]
    fn utc_datetime_round_trips_through_timestamptz() {
        let rendered = duckdb_type_name(ColumnType::UtcDatetime, 0, 0);
        assert_eq!(rendered, "TIMESTAMP WITH TIME ZONE");
        assert_eq!(column_type_from_duckdb("TIMESTAMP WITH TIME ZONE"), ColumnType::UtcDatetime);
    }

    #[test]
    fn varchar_maps_back_to_string_never_json() {
        assert_eq!(column_type_from_duckdb("VARCHAR"), ColumnType::String);
    }
}
