use common::error::IngestError;
use duckdb::Connection;
use logging::Logger;

/// Deterministic per-request ephemeral catalog, attached at construction and
/// detached on drop (spec §4.4). The name is derived from the connection id
/// so concurrent requests, each with their own connection, can never
/// collide.
pub struct StagingCatalog<'a> {
    con: &'a Connection,
    logger: &'a Logger,
    pub name: String,
}

impl<'a> StagingCatalog<'a> {
    #[track_caller]
    pub fn attach(con: &'a Connection, logger: &'a Logger) -> Result<Self, IngestError> {
        let name = format!("temp_mem_db_{}", connection_id(con));

        // Run DETACH first so a half-torn-down previous attempt can't
        // collide with this one.
        let _ = con.execute(&format!("DETACH DATABASE IF EXISTS {name}"), []);

        con.execute(&format!("ATTACH ':memory:' AS {name}"), [])
            .map_err(|err| IngestError::warehouse(format!("Failed to attach in-memory database \"{name}\": {err}")))?;

        logger.info(format!("attached temp database {name}"));
        Ok(Self { con, logger, name })
    }
}

impl Drop for StagingCatalog<'_> {
    fn drop(&mut self) {
        self.logger.info(format!("detaching temp database {}", self.name));
        if let Err(err) = self.con.execute(&format!("DETACH DATABASE IF EXISTS {}", self.name), []) {
            self.logger
                .warning(format!("Failed to detach temporary in-memory database \"{}\": {err}", self.name));
        }
    }
}

fn connection_id(con: &Connection) -> usize {
    // duckdb-rs doesn't expose the raw connection id; the pointer identity
    // of the handle is unique for the process lifetime of the connection
    // and serves the same purpose here: distinct concurrent requests never
    // collide because they never share a `Connection`.
    con as *const Connection as usize
}
