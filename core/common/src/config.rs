use crate::error::IngestError;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

pub const PROP_TOKEN: &str = "motherduck_token";
pub const PROP_DATABASE: &str = "motherduck_database";
pub const PROP_MAX_RECORD_SIZE: &str = "max_record_size";
pub const PROP_CSV_BLOCK_SIZE: &str = "motherduck_csv_block_size";

pub const MAX_RECORD_SIZE_MIN: u64 = 24;
pub const MAX_RECORD_SIZE_MAX: u64 = 1024;

/// The `configuration` map every RPC method receives (spec §6.1), wrapped
/// with typed accessors for the handful of properties the pipeline reads
/// directly.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig(HashMap<String, String>);

impl Deref for RequestConfig {
    type Target = HashMap<String, String>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RequestConfig {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<HashMap<String, String>> for RequestConfig {
    fn from(value: HashMap<String, String>) -> Self {
        Self(value)
    }
}

impl RequestConfig {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    fn find_property(&self, name: &str) -> Result<&str, IngestError> {
        self.0
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| IngestError::invalid_argument(format!("Missing property {name}")))
    }

    pub fn token(&self) -> Result<&str, IngestError> {
        self.find_property(PROP_TOKEN)
    }

    pub fn database(&self) -> Result<&str, IngestError> {
        self.find_property(PROP_DATABASE)
    }

    /// Validated against the inclusive range in spec §6.1; `None` when the
    /// property is absent (it is optional, unlike token/database).
    pub fn max_record_size(&self) -> Result<Option<u64>, IngestError> {
        match self.0.get(PROP_MAX_RECORD_SIZE) {
            None => Ok(None),
            Some(raw) => {
                let value: u64 = raw.parse().map_err(|_| {
                    IngestError::invalid_argument(format!("max_record_size is not an integer: {raw}"))
                })?;
                if !(MAX_RECORD_SIZE_MIN..=MAX_RECORD_SIZE_MAX).contains(&value) {
                    return Err(IngestError::invalid_argument(format!(
                        "max_record_size must be between {MAX_RECORD_SIZE_MIN} and {MAX_RECORD_SIZE_MAX}, got {value}"
                    )));
                }
                Ok(Some(value))
            }
        }
    }

    pub fn csv_block_size(&self) -> Option<&str> {
        self.0.get(PROP_CSV_BLOCK_SIZE).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> RequestConfig {
        RequestConfig::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn missing_token_is_an_invalid_argument() {
        let cfg = config(&[]);
        let err = cfg.token().unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: Missing property motherduck_token");
    }

    #[test]
    fn token_and_database_round_trip() {
        let cfg = config(&[("motherduck_token", "abc"), ("motherduck_database", "mydb")]);
        assert_eq!(cfg.token().unwrap(), "abc");
        assert_eq!(cfg.database().unwrap(), "mydb");
    }

    #[test]
    fn max_record_size_rejects_out_of_range_values() {
        let cfg = config(&[("max_record_size", "4096")]);
        assert!(cfg.max_record_size().is_err());

        let cfg = config(&[("max_record_size", "100")]);
        assert_eq!(cfg.max_record_size().unwrap(), Some(100));
    }
}
