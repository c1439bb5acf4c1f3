use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::{Template, TemplateTask};

pub fn create_template(
    conn: &Connection,
    id: &str,
    firm_id: &str,
    name: &str,
    task_dependency_mode: bool,
) -> Result<Template, FirmflowError> {
    conn.execute(
        "INSERT INTO templates (id, firm_id, name, task_dependency_mode) VALUES (?1, ?2, ?3, ?4)",
        params![id, firm_id, name, task_dependency_mode as i64],
    )?;
    get_template_by_id(conn, id)
}

pub fn get_template_by_id(conn: &Connection, id: &str) -> Result<Template, FirmflowError> {
    conn.query_row(
        "SELECT id, firm_id, name, task_dependency_mode, work_type_id, created_at
         FROM templates WHERE id = ?1",
        params![id],
        row_to_template,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::template_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Resolve a template within a firm: exact id, then id prefix, then name.
pub fn resolve_template(
    conn: &Connection,
    firm_id: &str,
    reference: &str,
) -> Result<Template, FirmflowError> {
    if let Ok(template) = get_template_by_id(conn, reference) {
        if template.firm_id == firm_id {
            return Ok(template);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, firm_id, name, task_dependency_mode, work_type_id, created_at
         FROM templates WHERE firm_id = ?1 AND (id LIKE ?2 OR name = ?3)",
    )?;
    let prefix = format!("{reference}%");
    let templates: Vec<Template> = stmt
        .query_map(params![firm_id, prefix, reference], row_to_template)?
        .collect::<Result<Vec<_>, _>>()?;
    match templates.len() {
        0 => Err(FirmflowError::template_not_found(reference)),
        1 => Ok(templates.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = templates
                .iter()
                .map(|t| format!("{} ({})", t.name, t.id))
                .collect();
            Err(FirmflowError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_templates(conn: &Connection, firm_id: &str) -> Result<Vec<Template>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, firm_id, name, task_dependency_mode, work_type_id, created_at
         FROM templates WHERE firm_id = ?1 ORDER BY created_at ASC",
    )?;
    let templates = stmt
        .query_map(params![firm_id], row_to_template)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(templates)
}

pub fn set_work_type(
    conn: &Connection,
    template_id: &str,
    work_type_id: &str,
) -> Result<(), FirmflowError> {
    conn.execute(
        "UPDATE templates SET work_type_id = ?1 WHERE id = ?2",
        params![work_type_id, template_id],
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn insert_template_task(
    conn: &Connection,
    task: &TemplateTask,
) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT INTO template_tasks
            (id, template_id, position, title, description, days_from_start,
             recurrence_rule, default_stage_id, assignee, priority, estimated_hours)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            task.id,
            task.template_id,
            task.position,
            task.title,
            task.description,
            task.days_from_start,
            task.recurrence_rule,
            task.default_stage_id,
            task.assignee,
            task.priority,
            task.estimated_hours,
        ],
    )?;
    Ok(())
}

/// Template tasks in position order.
pub fn list_template_tasks(
    conn: &Connection,
    template_id: &str,
) -> Result<Vec<TemplateTask>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, template_id, position, title, description, days_from_start,
                recurrence_rule, default_stage_id, assignee, priority, estimated_hours
         FROM template_tasks WHERE template_id = ?1 ORDER BY position ASC",
    )?;
    let tasks = stmt
        .query_map(params![template_id], row_to_template_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn set_default_stage(
    conn: &Connection,
    template_task_id: &str,
    stage_id: &str,
) -> Result<(), FirmflowError> {
    conn.execute(
        "UPDATE template_tasks SET default_stage_id = ?1 WHERE id = ?2",
        params![stage_id, template_task_id],
    )?;
    Ok(())
}

pub fn add_template_dependency(
    conn: &Connection,
    template_task_id: &str,
    depends_on_id: &str,
) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT OR IGNORE INTO template_task_dependencies (template_task_id, depends_on_id)
         VALUES (?1, ?2)",
        params![template_task_id, depends_on_id],
    )?;
    Ok(())
}

/// All template-local dependency edges of a template.
pub fn list_template_dependencies(
    conn: &Connection,
    template_id: &str,
) -> Result<Vec<(String, String)>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT d.template_task_id, d.depends_on_id
         FROM template_task_dependencies d
         JOIN template_tasks t ON d.template_task_id = t.id
         WHERE t.template_id = ?1",
    )?;
    let edges = stmt
        .query_map(params![template_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// True once any task row has been instantiated from this template.
pub fn has_instantiated_tasks(
    conn: &Connection,
    template_id: &str,
) -> Result<bool, FirmflowError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks t
         JOIN template_tasks tt ON t.template_task_origin_id = tt.id
         WHERE tt.template_id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn row_to_template(row: &rusqlite::Row) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        firm_id: row.get(1)?,
        name: row.get(2)?,
        task_dependency_mode: row.get::<_, i64>(3)? != 0,
        work_type_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_template_task(row: &rusqlite::Row) -> rusqlite::Result<TemplateTask> {
    Ok(TemplateTask {
        id: row.get(0)?,
        template_id: row.get(1)?,
        position: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        days_from_start: row.get(5)?,
        recurrence_rule: row.get(6)?,
        default_stage_id: row.get(7)?,
        assignee: row.get(8)?,
        priority: row.get(9)?,
        estimated_hours: row.get(10)?,
    })
}
