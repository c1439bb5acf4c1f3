use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::{Stage, WorkType};

pub fn create_work_type(
    conn: &Connection,
    id: &str,
    firm_id: &str,
    name: &str,
) -> Result<WorkType, FirmflowError> {
    conn.execute(
        "INSERT INTO work_types (id, firm_id, name) VALUES (?1, ?2, ?3)",
        params![id, firm_id, name],
    )?;
    get_work_type_by_id(conn, id)
}

pub fn get_work_type_by_id(conn: &Connection, id: &str) -> Result<WorkType, FirmflowError> {
    conn.query_row(
        "SELECT id, firm_id, name, created_at FROM work_types WHERE id = ?1",
        params![id],
        |row| {
            Ok(WorkType {
                id: row.get(0)?,
                firm_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            FirmflowError::validation(format!("Work type not found: {id}"))
        }
        _ => FirmflowError::from(e),
    })
}

pub fn rename_work_type(conn: &Connection, id: &str, name: &str) -> Result<(), FirmflowError> {
    conn.execute(
        "UPDATE work_types SET name = ?1 WHERE id = ?2",
        params![name, id],
    )?;
    Ok(())
}

pub fn insert_stage(
    conn: &Connection,
    id: &str,
    work_type_id: &str,
    name: &str,
    position: i64,
    is_default: bool,
    is_terminal: bool,
) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT INTO work_type_stages (id, work_type_id, name, position, is_default, is_terminal)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, work_type_id, name, position, is_default as i64, is_terminal as i64],
    )?;
    Ok(())
}

pub fn delete_stages(conn: &Connection, work_type_id: &str) -> Result<(), FirmflowError> {
    conn.execute(
        "DELETE FROM work_type_stages WHERE work_type_id = ?1",
        params![work_type_id],
    )?;
    Ok(())
}

pub fn get_stage_by_id(conn: &Connection, id: &str) -> Result<Stage, FirmflowError> {
    conn.query_row(
        "SELECT id, work_type_id, name, position, is_default, is_terminal
         FROM work_type_stages WHERE id = ?1",
        params![id],
        row_to_stage,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::stage_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Stages of a work type in ladder order.
pub fn list_stages(conn: &Connection, work_type_id: &str) -> Result<Vec<Stage>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, work_type_id, name, position, is_default, is_terminal
         FROM work_type_stages WHERE work_type_id = ?1 ORDER BY position ASC",
    )?;
    let stages = stmt
        .query_map(params![work_type_id], row_to_stage)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stages)
}

pub fn default_stage(conn: &Connection, work_type_id: &str) -> Result<Stage, FirmflowError> {
    conn.query_row(
        "SELECT id, work_type_id, name, position, is_default, is_terminal
         FROM work_type_stages WHERE work_type_id = ?1 AND is_default = 1",
        params![work_type_id],
        row_to_stage,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            FirmflowError::stage_not_found(&format!("default stage of {work_type_id}"))
        }
        _ => FirmflowError::from(e),
    })
}

pub fn terminal_stage(conn: &Connection, work_type_id: &str) -> Result<Stage, FirmflowError> {
    conn.query_row(
        "SELECT id, work_type_id, name, position, is_default, is_terminal
         FROM work_type_stages WHERE work_type_id = ?1 AND is_terminal = 1",
        params![work_type_id],
        row_to_stage,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            FirmflowError::stage_not_found(&format!("terminal stage of {work_type_id}"))
        }
        _ => FirmflowError::from(e),
    })
}

pub fn stage_at_position(
    conn: &Connection,
    work_type_id: &str,
    position: i64,
) -> Result<Stage, FirmflowError> {
    conn.query_row(
        "SELECT id, work_type_id, name, position, is_default, is_terminal
         FROM work_type_stages WHERE work_type_id = ?1 AND position = ?2",
        params![work_type_id, position],
        row_to_stage,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            FirmflowError::stage_not_found(&format!("position {position}"))
        }
        _ => FirmflowError::from(e),
    })
}

fn row_to_stage(row: &rusqlite::Row) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: row.get(0)?,
        work_type_id: row.get(1)?,
        name: row.get(2)?,
        position: row.get(3)?,
        is_default: row.get::<_, i64>(4)? != 0,
        is_terminal: row.get::<_, i64>(5)? != 0,
    })
}
