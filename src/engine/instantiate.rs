use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use tracing::warn;

use crate::db::{activity_repo, dependency_repo, firm_repo, project_repo, task_repo, template_repo, work_type_repo};
use crate::engine::{cascade, compiler, due_date};
use crate::error::FirmflowError;
use crate::models::{Project, Task};

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct InstantiateParams {
    pub template_ref: String,
    pub client_ref: String,
    /// Project name; defaults to "<template name> - <client name>".
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Overrides the template's task_dependency_mode when set.
    pub dependency_mode_override: Option<bool>,
}

/// Create a project and its tasks from a template. All-or-nothing: every
/// validation failure surfaces before any row is committed.
pub fn instantiate_project(
    conn: &Connection,
    firm_id: &str,
    params: &InstantiateParams,
    actor: &str,
) -> Result<Project, FirmflowError> {
    let template = template_repo::resolve_template(conn, firm_id, &params.template_ref)?;
    let client = firm_repo::resolve_client(conn, firm_id, &params.client_ref)?;
    if !client.active {
        return Err(FirmflowError::client_inactive(&client.name));
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<Project, FirmflowError> {
        // An uncompiled template is compiled here, inside the same
        // transaction, so the stage ladder and the tasks land together.
        let work_type = match &template.work_type_id {
            Some(id) => work_type_repo::get_work_type_by_id(conn, id)?,
            None => compiler::compile_within(conn, &template)?,
        };
        let default_stage = work_type_repo::default_stage(conn, &work_type.id)?;

        // Re-read after the possible compile: default_stage_id may have moved.
        let template_tasks = template_repo::list_template_tasks(conn, &template.id)?;
        if template_tasks.is_empty() {
            return Err(FirmflowError::empty_template(&template.name));
        }

        let project_id = ulid::Ulid::new().to_string();
        let name = params
            .name
            .clone()
            .unwrap_or_else(|| format!("{} - {}", template.name, client.name));
        let dependency_mode = params
            .dependency_mode_override
            .unwrap_or(template.task_dependency_mode);

        project_repo::create_project(
            conn,
            &Project {
                id: project_id.clone(),
                firm_id: firm_id.to_string(),
                work_type_id: work_type.id.clone(),
                client_id: client.id.clone(),
                template_id: Some(template.id.clone()),
                name,
                start_date: params.start_date.format(DATE_FMT).to_string(),
                due_date: params.due_date.map(|d| d.format(DATE_FMT).to_string()),
                task_dependency_mode: dependency_mode,
                current_stage_id: None,
                created_at: String::new(),
                updated_at: String::new(),
            },
        )?;

        // Template-task id -> freshly created task id. Dependencies are
        // remapped through this table; raw template ids never reach a task
        // row.
        let mut id_map: HashMap<String, String> = HashMap::new();

        for tt in &template_tasks {
            let due = match (tt.days_from_start, tt.recurrence_rule.as_deref()) {
                (Some(days), _) => Some(params.start_date + Duration::days(days)),
                (None, Some(rule)) => Some(due_date::next_due(rule, params.start_date)?),
                (None, None) => None,
            };
            let is_recurring = tt.recurrence_rule.is_some();
            let task_id = ulid::Ulid::new().to_string();
            task_repo::create_task(
                conn,
                &Task {
                    id: task_id.clone(),
                    firm_id: firm_id.to_string(),
                    project_id: Some(project_id.clone()),
                    title: tt.title.clone(),
                    description: tt.description.clone(),
                    stage_id: Some(
                        tt.default_stage_id
                            .clone()
                            .unwrap_or_else(|| default_stage.id.clone()),
                    ),
                    assignee: tt.assignee.clone(),
                    priority: tt.priority,
                    estimated_hours: tt.estimated_hours,
                    due_date: due.map(|d| d.format(DATE_FMT).to_string()),
                    template_task_origin_id: Some(tt.id.clone()),
                    is_recurring,
                    recurrence_rule: tt.recurrence_rule.clone(),
                    next_due_date: if is_recurring {
                        due.map(|d| d.format(DATE_FMT).to_string())
                    } else {
                        None
                    },
                    recurring_master_id: None,
                    created_at: String::new(),
                    updated_at: String::new(),
                    completed_at: None,
                },
            )?;
            id_map.insert(tt.id.clone(), task_id);
        }

        for (tt_id, dep_tt_id) in template_repo::list_template_dependencies(conn, &template.id)? {
            match (id_map.get(&tt_id), id_map.get(&dep_tt_id)) {
                (Some(task_id), Some(dep_task_id)) => {
                    dependency_repo::insert_edge(conn, task_id, dep_task_id)?;
                }
                _ => {
                    warn!(
                        template_task = %tt_id,
                        depends_on = %dep_tt_id,
                        "dropping dependency on a template task outside this instantiation"
                    );
                }
            }
        }

        let (_, stage_id) = cascade::derive_column(conn, &project_id, &work_type.id)?;
        project_repo::set_current_stage(conn, &project_id, stage_id.as_deref())?;

        project_repo::get_project_by_id(conn, &project_id)
    })();

    match result {
        Ok(project) => {
            conn.execute_batch("COMMIT")?;
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!(
                    "Instantiated project '{}' from template '{}' for client '{}'",
                    project.name, template.name, client.name
                ),
                actor,
                Some(&project.id),
                None,
            );
            Ok(project)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
