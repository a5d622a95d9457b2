use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{CatastroError, Result};

/// Default busy timeout applied to each connection
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database handle for the cadastre store.
///
/// Holds only the location; every operation opens its own connection and
/// drops it when done. SQLite's file locking is the only serialization.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open (creating if needed) the store at `database_url` and apply the schema.
    ///
    /// Accepts a bare path or a `sqlite:` / `sqlite://` prefixed one.
    pub fn new(database_url: &str) -> Result<Self> {
        Self::with_busy_timeout(database_url, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`Database::new`] with an explicit busy timeout
    pub fn with_busy_timeout(database_url: &str, busy_timeout: Duration) -> Result<Self> {
        let path = PathBuf::from(strip_scheme(database_url));

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CatastroError::StorageUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let database = Self { path, busy_timeout };

        // Run migrations
        let conn = database.get_connection()?;
        Self::run_migrations(&conn)?;
        info!(path = %database.path.display(), "Database ready");

        Ok(database)
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2024-05-20-000000_create_properties/up.sql"))?;
        Ok(())
    }

    /// Open a fresh connection with foreign keys enforced
    pub fn get_connection(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| CatastroError::StorageUnavailable(format!("{}: {e}", self.path.display())))?;

        conn.busy_timeout(self.busy_timeout)
            .and_then(|()| conn.execute_batch("PRAGMA foreign_keys = ON;"))
            .map_err(|e| CatastroError::StorageUnavailable(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), "Opened database connection");
        Ok(conn)
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// Initialize the database connection from configuration
pub fn establish_connection(config: &AppConfig) -> Result<Database> {
    Database::with_busy_timeout(
        &config.get_database_path(),
        Duration::from_secs(config.database.busy_timeout_secs),
    )
}
