use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::Project;

#[allow(clippy::too_many_arguments)]
pub fn create_project(conn: &Connection, project: &Project) -> Result<(), FirmflowError> {
    conn.execute(
        "INSERT INTO projects
            (id, firm_id, work_type_id, client_id, template_id, name, start_date,
             due_date, task_dependency_mode, current_stage_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            project.id,
            project.firm_id,
            project.work_type_id,
            project.client_id,
            project.template_id,
            project.name,
            project.start_date,
            project.due_date,
            project.task_dependency_mode as i64,
            project.current_stage_id,
        ],
    )?;
    Ok(())
}

pub fn get_project_by_id(conn: &Connection, id: &str) -> Result<Project, FirmflowError> {
    conn.query_row(
        "SELECT id, firm_id, work_type_id, client_id, template_id, name, start_date,
                due_date, task_dependency_mode, current_stage_id, created_at, updated_at
         FROM projects WHERE id = ?1",
        params![id],
        row_to_project,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::project_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Resolve a project within a firm: exact id, id prefix, then name.
pub fn resolve_project(
    conn: &Connection,
    firm_id: &str,
    reference: &str,
) -> Result<Project, FirmflowError> {
    if let Ok(project) = get_project_by_id(conn, reference) {
        if project.firm_id == firm_id {
            return Ok(project);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, firm_id, work_type_id, client_id, template_id, name, start_date,
                due_date, task_dependency_mode, current_stage_id, created_at, updated_at
         FROM projects WHERE firm_id = ?1 AND (id LIKE ?2 OR name = ?3)",
    )?;
    let prefix = format!("{reference}%");
    let projects: Vec<Project> = stmt
        .query_map(params![firm_id, prefix, reference], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;
    match projects.len() {
        0 => Err(FirmflowError::project_not_found(reference)),
        1 => Ok(projects.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = projects
                .iter()
                .map(|p| format!("{} ({})", p.name, p.id))
                .collect();
            Err(FirmflowError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_projects(conn: &Connection, firm_id: &str) -> Result<Vec<Project>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, firm_id, work_type_id, client_id, template_id, name, start_date,
                due_date, task_dependency_mode, current_stage_id, created_at, updated_at
         FROM projects WHERE firm_id = ?1 ORDER BY created_at ASC",
    )?;
    let projects = stmt
        .query_map(params![firm_id], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

pub fn set_current_stage(
    conn: &Connection,
    project_id: &str,
    stage_id: Option<&str>,
) -> Result<(), FirmflowError> {
    conn.execute(
        "UPDATE projects SET current_stage_id = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![stage_id, project_id],
    )?;
    Ok(())
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        firm_id: row.get(1)?,
        work_type_id: row.get(2)?,
        client_id: row.get(3)?,
        template_id: row.get(4)?,
        name: row.get(5)?,
        start_date: row.get(6)?,
        due_date: row.get(7)?,
        task_dependency_mode: row.get::<_, i64>(8)? != 0,
        current_stage_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
