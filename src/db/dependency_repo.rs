use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::TaskDependency;

pub fn insert_edge(
    conn: &Connection,
    task_id: &str,
    depends_on_id: &str,
) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?1, ?2)",
        params![task_id, depends_on_id],
    )?;
    Ok(())
}

pub fn remove_edge(
    conn: &Connection,
    task_id: &str,
    depends_on_id: &str,
) -> Result<(), FirmflowError> {
    conn.execute(
        "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_id = ?2",
        params![task_id, depends_on_id],
    )?;
    Ok(())
}

/// Direct dependencies (predecessors) of a task.
pub fn dependencies_of(conn: &Connection, task_id: &str) -> Result<Vec<String>, FirmflowError> {
    let mut stmt =
        conn.prepare("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?1")?;
    let deps = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(deps)
}

/// All dependency edges of a firm's task set. Cycle-check input; the whole
/// firm graph, never the whole store.
pub fn edges_for_firm(
    conn: &Connection,
    firm_id: &str,
) -> Result<Vec<TaskDependency>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT d.task_id, d.depends_on_id
         FROM task_dependencies d
         JOIN tasks t ON d.task_id = t.id
         WHERE t.firm_id = ?1",
    )?;
    let edges = stmt
        .query_map(params![firm_id], |row| {
            Ok(TaskDependency {
                task_id: row.get(0)?,
                depends_on_id: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}
