use std::env;
use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;

use crate::error::FirmflowError;

use super::migrations;

const DATA_DIR: &str = ".firmflow";

/// Find the data root by walking up from the current directory to the
/// nearest `.firmflow/`. Returns None when no ancestor is initialized.
fn find_data_root() -> Result<Option<PathBuf>, FirmflowError> {
    let mut dir = env::current_dir().map_err(|e| FirmflowError::database(e.to_string()))?;
    loop {
        if dir.join(DATA_DIR).is_dir() {
            return Ok(Some(dir));
        }
        if !dir.pop() {
            return Ok(None);
        }
    }
}

pub fn db_path() -> Result<PathBuf, FirmflowError> {
    match find_data_root()? {
        Some(root) => Ok(root.join(DATA_DIR).join("firmflow.db")),
        None => Err(FirmflowError::not_initialized()),
    }
}

/// Path of the config file holding the active firm pointer.
pub fn config_path() -> Result<PathBuf, FirmflowError> {
    match find_data_root()? {
        Some(root) => Ok(root.join(DATA_DIR).join("config.json")),
        None => Err(FirmflowError::not_initialized()),
    }
}

/// Open a connection to an initialized database.
pub fn open_db() -> Result<Connection, FirmflowError> {
    let path = db_path()?;
    if !path.exists() {
        return Err(FirmflowError::not_initialized());
    }
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Initialize the data directory under the current directory and run
/// migrations. Idempotent.
pub fn init_db() -> Result<PathBuf, FirmflowError> {
    let cwd = env::current_dir().map_err(|e| FirmflowError::database(e.to_string()))?;
    let path = cwd.join(DATA_DIR).join("firmflow.db");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FirmflowError::database(e.to_string()))?;
    }
    let conn = Connection::open(&path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(path)
}

/// Open an in-memory database with the full schema. Test support.
pub fn open_in_memory() -> Result<Connection, FirmflowError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> Result<(), FirmflowError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}
