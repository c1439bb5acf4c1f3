use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::Task;

/// How a stage write should treat the completion timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMark {
    Set,
    Clear,
    Keep,
}

pub fn create_task(conn: &Connection, task: &Task) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT INTO tasks
            (id, firm_id, project_id, title, description, stage_id, assignee, priority,
             estimated_hours, due_date, template_task_origin_id, is_recurring,
             recurrence_rule, next_due_date, recurring_master_id, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            task.id,
            task.firm_id,
            task.project_id,
            task.title,
            task.description,
            task.stage_id,
            task.assignee,
            task.priority,
            task.estimated_hours,
            task.due_date,
            task.template_task_origin_id,
            task.is_recurring as i64,
            task.recurrence_rule,
            task.next_due_date,
            task.recurring_master_id,
            task.completed_at,
        ],
    )?;
    Ok(())
}

pub fn get_task_by_id(conn: &Connection, id: &str) -> Result<Task, FirmflowError> {
    conn.query_row(
        &format!("{SELECT_TASK} WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::task_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Resolve a task within a firm by exact id or id prefix.
pub fn resolve_task(
    conn: &Connection,
    firm_id: &str,
    reference: &str,
) -> Result<Task, FirmflowError> {
    if let Ok(task) = get_task_by_id(conn, reference) {
        if task.firm_id == firm_id {
            return Ok(task);
        }
    }

    let mut stmt = conn.prepare(&format!("{SELECT_TASK} WHERE firm_id = ?1 AND id LIKE ?2"))?;
    let prefix = format!("{reference}%");
    let tasks: Vec<Task> = stmt
        .query_map(params![firm_id, prefix], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    match tasks.len() {
        0 => Err(FirmflowError::task_not_found(reference)),
        1 => Ok(tasks.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> =
                tasks.iter().map(|t| format!("{} ({})", t.title, t.id)).collect();
            Err(FirmflowError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_tasks_by_project(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<Task>, FirmflowError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_TASK} WHERE project_id = ?1 ORDER BY created_at ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![project_id], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn list_tasks_by_firm(conn: &Connection, firm_id: &str) -> Result<Vec<Task>, FirmflowError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_TASK} WHERE firm_id = ?1 ORDER BY created_at ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![firm_id], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Template-origin tasks of a project paired with their slot (the origin
/// template task's position), in slot order.
pub fn list_slot_tasks(
    conn: &Connection,
    project_id: &str,
) -> Result<Vec<(i64, Task)>, FirmflowError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT tt.position, {SELECT_TASK_COLS_QUALIFIED}
         FROM tasks t
         JOIN template_tasks tt ON t.template_task_origin_id = tt.id
         WHERE t.project_id = ?1
         ORDER BY tt.position ASC, t.created_at ASC"
    ))?;
    let rows = stmt
        .query_map(params![project_id], |row| {
            let position: i64 = row.get(0)?;
            let task = row_to_task_offset(row, 1)?;
            Ok((position, task))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Move a task to `stage_id`, guarded by the stage the caller read. Returns
/// false when the row changed underneath the caller (zero rows updated).
pub fn update_stage_guarded(
    conn: &Connection,
    task_id: &str,
    stage_id: Option<&str>,
    expected_stage_id: Option<&str>,
    mark: CompletionMark,
) -> Result<bool, FirmflowError> {
    let completed_clause = match mark {
        CompletionMark::Set => "completed_at = datetime('now'),",
        CompletionMark::Clear => "completed_at = NULL,",
        CompletionMark::Keep => "",
    };
    let sql = format!(
        "UPDATE tasks SET stage_id = ?1, {completed_clause} updated_at = datetime('now')
         WHERE id = ?2 AND stage_id IS ?3"
    );
    let changed = conn.execute(&sql, params![stage_id, task_id, expected_stage_id])?;
    Ok(changed == 1)
}

pub fn set_next_due_date(
    conn: &Connection,
    task_id: &str,
    next_due_date: Option<&str>,
) -> Result<(), FirmflowError> {
    conn.execute(
        "UPDATE tasks SET next_due_date = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![next_due_date, task_id],
    )?;
    Ok(())
}

/// Recurring masters of a firm whose next occurrence is due on or before
/// `as_of`. Sweep input.
pub fn recurring_masters_due(
    conn: &Connection,
    firm_id: &str,
    as_of: &str,
) -> Result<Vec<Task>, FirmflowError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_TASK}
         WHERE firm_id = ?1 AND is_recurring = 1
           AND next_due_date IS NOT NULL AND next_due_date <= ?2
         ORDER BY next_due_date ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![firm_id, as_of], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Existing generated instance of a master for a given due date, if any.
pub fn find_instance(
    conn: &Connection,
    master_id: &str,
    due_date: &str,
) -> Result<Option<Task>, FirmflowError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_TASK} WHERE recurring_master_id = ?1 AND due_date = ?2"
    ))?;
    let mut rows = stmt.query(params![master_id, due_date])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_task(row)?)),
        None => Ok(None),
    }
}

const SELECT_TASK: &str =
    "SELECT id, firm_id, project_id, title, description, stage_id, assignee, \
     priority, estimated_hours, due_date, template_task_origin_id, is_recurring, \
     recurrence_rule, next_due_date, recurring_master_id, created_at, updated_at, \
     completed_at FROM tasks";

const SELECT_TASK_COLS_QUALIFIED: &str =
    "t.id, t.firm_id, t.project_id, t.title, t.description, t.stage_id, t.assignee, \
     t.priority, t.estimated_hours, t.due_date, t.template_task_origin_id, t.is_recurring, \
     t.recurrence_rule, t.next_due_date, t.recurring_master_id, t.created_at, t.updated_at, \
     t.completed_at";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    row_to_task_offset(row, 0)
}

fn row_to_task_offset(row: &rusqlite::Row, base: usize) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(base)?,
        firm_id: row.get(base + 1)?,
        project_id: row.get(base + 2)?,
        title: row.get(base + 3)?,
        description: row.get(base + 4)?,
        stage_id: row.get(base + 5)?,
        assignee: row.get(base + 6)?,
        priority: row.get(base + 7)?,
        estimated_hours: row.get(base + 8)?,
        due_date: row.get(base + 9)?,
        template_task_origin_id: row.get(base + 10)?,
        is_recurring: row.get::<_, i64>(base + 11)? != 0,
        recurrence_rule: row.get(base + 12)?,
        next_due_date: row.get(base + 13)?,
        recurring_master_id: row.get(base + 14)?,
        created_at: row.get(base + 15)?,
        updated_at: row.get(base + 16)?,
        completed_at: row.get(base + 17)?,
    })
}
