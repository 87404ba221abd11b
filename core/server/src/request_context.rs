use common::config::RequestConfig;
use common::error::IngestError;
use duckdb::Connection;
use logging::Logger;
use warehouse::ConnectionFactory;

/// Per-request connection + logger, acquired from the process-wide
/// `ConnectionFactory` and released at the end of the request (spec §4.8).
pub struct RequestContext {
    pub connection: Connection,
    pub logger: Logger,
    pub session_id: String,
}

impl RequestContext {
    #[track_caller]
    pub fn acquire(config: &RequestConfig, factory: &ConnectionFactory) -> Result<Self, IngestError> {
        let token = config.token()?;
        let database = config.database()?;
        // Validated for range up front, same as the config tester upstream;
        // csv_processor.cpp never threads the value into read_csv either.
        config.max_record_size()?;
        let connection = factory.get_connection(token, database)?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let logger = Logger::new(Some(session_id.clone()));
        logger.info(format!("connected to database {database}"));

        Ok(Self { connection, logger, session_id })
    }

    /// Rolls back any dangling non-autocommit transaction (best-effort,
    /// failures are logged not raised) and emits the "endpoint completed"
    /// event (spec §4.8).
    pub fn release(self, endpoint: &str) {
        if let Err(err) = self.connection.execute("ROLLBACK", []) {
            let message = err.to_string();
            if !message.to_ascii_lowercase().contains("no transaction is active") {
                self.logger.warning(format!("Failed to roll back dangling transaction: {message}"));
            }
        }
        self.logger.info(format!("{endpoint} completed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_surfaces_invalid_argument() {
        let config = RequestConfig::new(std::collections::HashMap::new());
        let factory = ConnectionFactory::new();
        let err = RequestContext::acquire(&config, &factory).unwrap_err();
        assert!(err.to_string().contains("Missing property motherduck_token"));
    }

    #[test]
    fn out_of_range_max_record_size_surfaces_before_connecting() {
        let config = RequestConfig::new(
            [
                ("motherduck_token".to_string(), "tok".to_string()),
                ("motherduck_database".to_string(), "db".to_string()),
                ("max_record_size".to_string(), "4096".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let factory = ConnectionFactory::new();
        let err = RequestContext::acquire(&config, &factory).unwrap_err();
        assert!(err.to_string().contains("max_record_size must be between"));
    }
}
