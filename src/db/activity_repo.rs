use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::ActivityEvent;

/// Record one activity line. Called after the mutating transaction has
/// committed; a failure here must not undo the mutation, so callers go
/// through [`log_event_best_effort`].
pub fn log_event(
    conn: &Connection,
    firm_id: &str,
    message: &str,
    actor: &str,
    project_id: Option<&str>,
    task_id: Option<&str>,
) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT INTO activity_log (firm_id, message, actor, project_id, task_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![firm_id, message, actor, project_id, task_id],
    )?;
    Ok(())
}

/// Fire-and-forget wrapper: downgrade a failed log write to a warning.
pub fn log_event_best_effort(
    conn: &Connection,
    firm_id: &str,
    message: &str,
    actor: &str,
    project_id: Option<&str>,
    task_id: Option<&str>,
) {
    if let Err(e) = log_event(conn, firm_id, message, actor, project_id, task_id) {
        tracing::warn!(error = %e, message, "activity log write failed");
    }
}

pub fn recent_events(
    conn: &Connection,
    firm_id: &str,
    limit: i64,
) -> Result<Vec<ActivityEvent>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, firm_id, message, actor, project_id, task_id, created_at
         FROM activity_log WHERE firm_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let events = stmt
        .query_map(params![firm_id, limit], |row| {
            Ok(ActivityEvent {
                id: row.get(0)?,
                firm_id: row.get(1)?,
                message: row.get(2)?,
                actor: row.get(3)?,
                project_id: row.get(4)?,
                task_id: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}
