use common::error::IngestError;
use duckdb::{Config, Connection};
use parking_lot::Mutex;

/// Process-singleton warehouse handle, bound to the first `(token, database)`
/// pair a caller asks for (spec §4.9). Rebinding with a different token or
/// database is rejected rather than silently reconnecting.
pub struct ConnectionFactory {
    state: Mutex<Option<BoundConnection>>,
}

struct BoundConnection {
    token: String,
    database: String,
    template: Connection,
}

impl ConnectionFactory {
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Returns a fresh connection against the bound database. Initializes
    /// the process-wide handle on the first call.
    #[track_caller]
    pub fn get_connection(&self, token: &str, database: &str) -> Result<Connection, IngestError> {
        let mut guard = self.state.lock();

        if guard.is_none() {
            let template = Self::init_duckdb(token, database)?;
            *guard = Some(BoundConnection {
                token: token.to_string(),
                database: database.to_string(),
                template,
            });
        }

        let bound = guard.as_ref().expect("just initialized above");
        if bound.token != token {
            return Err(IngestError::precondition(
                "Trying to connect to MotherDuck with a different token than initially provided",
            ));
        }
        if bound.database != database {
            return Err(IngestError::precondition(format!(
                "Trying to connect to a different MotherDuck database ({database}) than on the initial connection ({})",
                bound.database
            )));
        }

        let conn = bound
            .template
            .try_clone()
            .map_err(|err| maybe_rewrite_error(&err.to_string(), database))?;

        conn.execute("SET default_collation=''", [])
            .map_err(|err| IngestError::warehouse(format!("Could not SET default_collation: {err}")))?;

        Ok(conn)
    }

    fn init_duckdb(token: &str, database: &str) -> Result<Connection, IngestError> {
        let config = Config::default()
            .with("motherduck_token", token)
            .and_then(|c| c.with("custom_user_agent", concat!("fivetran/", env!("CARGO_PKG_VERSION"))))
            .and_then(|c| c.with("old_implicit_casting", "true"))
            .and_then(|c| c.with("motherduck_attach_mode", "single"))
            .map_err(|err| IngestError::warehouse(format!("Could not build DuckDB config: {err}")))?;

        let path = format!("md:{database}");
        let conn = Connection::open_with_flags(&path, config)
            .map_err(|err| maybe_rewrite_error(&err.to_string(), database))?;

        match conn.execute("FROM md_welcome_messages()", []) {
            Ok(_) => tracing::info!("fetched MotherDuck welcome pack"),
            Err(err) => tracing::warn!(error = %err, "could not fetch MotherDuck welcome pack"),
        }

        Ok(conn)
    }
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrites auth-expired/invalid errors into user-actionable `Recoverable`
/// errors; anything else is a plain `Warehouse` error (spec §4.9).
fn maybe_rewrite_error(message: &str, database: &str) -> IngestError {
    if message.contains("Jwt is expired") {
        return IngestError::recoverable(format!(
            "Failed to connect to MotherDuck database \"{database}\" because your MotherDuck token has expired. \
             Please configure a new MotherDuck token.\nOriginal error: {message}"
        ));
    }
    if message.contains("Your request is not authenticated") || message.contains("Invalid MotherDuck token") {
        return IngestError::recoverable(format!(
            "Failed to connect to MotherDuck database \"{database}\" because your MotherDuck token is invalid. \
             Please configure a new MotherDuck token.\nOriginal error: {message}"
        ));
    }
    IngestError::warehouse(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_expired_jwt_as_recoverable() {
        let err = maybe_rewrite_error("Jwt is expired at 2024", "mydb");
        assert!(matches!(err, IngestError::Recoverable { .. }));
    }

    #[test]
    fn leaves_unrelated_errors_as_warehouse_errors() {
        let err = maybe_rewrite_error("Binder Error: table not found", "mydb");
        assert!(matches!(err, IngestError::Warehouse { .. }));
    }
}
