use rusqlite::Connection;
use tracing::warn;

use crate::db::{activity_repo, template_repo, work_type_repo};
use crate::error::FirmflowError;
use crate::models::{Template, WorkType};

/// Compile a template's ordered task list into a work type with one stage
/// per task, positions 1..N. Position 1 is the default stage, position N the
/// terminal one (the same stage when N == 1).
///
/// Re-invocable: recompiling replaces the stage set atomically and re-links
/// every template task's default stage, so a template task never points at a
/// deleted stage.
pub fn compile_template(
    conn: &Connection,
    firm_id: &str,
    template_ref: &str,
    actor: &str,
) -> Result<WorkType, FirmflowError> {
    let template = template_repo::resolve_template(conn, firm_id, template_ref)?;
    // Template tasks are frozen once a project has been instantiated from
    // them; a recompile at that point regenerates the ladder but leaves the
    // existing tasks alone.
    if template.work_type_id.is_some() && template_repo::has_instantiated_tasks(conn, &template.id)? {
        warn!(template = %template.id, "recompiling a template that already has instantiated projects");
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = compile_within(conn, &template);
    match result {
        Ok(work_type) => {
            conn.execute_batch("COMMIT")?;
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Compiled template '{}' into work type '{}'", template.name, work_type.name),
                actor,
                None,
                None,
            );
            Ok(work_type)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Compile inside a transaction the caller already holds. Used directly by
/// project instantiation to auto-compile an uncompiled template.
pub(crate) fn compile_within(
    conn: &Connection,
    template: &Template,
) -> Result<WorkType, FirmflowError> {
    let tasks = template_repo::list_template_tasks(conn, &template.id)?;
    if tasks.is_empty() {
        return Err(FirmflowError::empty_template(&template.name));
    }

    // Reuse the existing work type row on recompile so project references
    // survive; only the stage set is replaced.
    let work_type = match &template.work_type_id {
        Some(id) => {
            let wt = work_type_repo::get_work_type_by_id(conn, id)?;
            work_type_repo::rename_work_type(conn, &wt.id, &template.name)?;
            work_type_repo::delete_stages(conn, &wt.id)?;
            wt
        }
        None => {
            let id = ulid::Ulid::new().to_string();
            work_type_repo::create_work_type(conn, &id, &template.firm_id, &template.name)?
        }
    };

    let count = tasks.len();
    for (index, task) in tasks.iter().enumerate() {
        let position = index as i64 + 1;
        let stage_id = ulid::Ulid::new().to_string();
        work_type_repo::insert_stage(
            conn,
            &stage_id,
            &work_type.id,
            &task.title,
            position,
            index == 0,
            index == count - 1,
        )?;
        template_repo::set_default_stage(conn, &task.id, &stage_id)?;
    }

    template_repo::set_work_type(conn, &template.id, &work_type.id)?;
    work_type_repo::get_work_type_by_id(conn, &work_type.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connection, firm_repo, template_repo, work_type_repo};
    use crate::models::TemplateTask;

    fn seed_template(conn: &Connection, titles: &[&str]) -> (String, String) {
        let firm = firm_repo::create_firm(conn, &ulid::Ulid::new().to_string(), "acme").unwrap();
        let template = template_repo::create_template(
            conn,
            &ulid::Ulid::new().to_string(),
            &firm.id,
            "tax-return",
            true,
        )
        .unwrap();
        for (i, title) in titles.iter().enumerate() {
            template_repo::insert_template_task(
                conn,
                &TemplateTask {
                    id: ulid::Ulid::new().to_string(),
                    template_id: template.id.clone(),
                    position: i as i64 + 1,
                    title: title.to_string(),
                    description: None,
                    days_from_start: Some(i as i64 * 5),
                    recurrence_rule: None,
                    default_stage_id: None,
                    assignee: None,
                    priority: 0,
                    estimated_hours: None,
                },
            )
            .unwrap();
        }
        (firm.id, template.id)
    }

    #[test]
    fn compile_produces_contiguous_stage_ladder() {
        let conn = connection::open_in_memory().unwrap();
        let (firm_id, template_id) = seed_template(&conn, &["Collect Docs", "Prepare", "Review"]);

        let wt = compile_template(&conn, &firm_id, &template_id, "test").unwrap();
        let stages = work_type_repo::list_stages(&conn, &wt.id).unwrap();

        assert_eq!(stages.len(), 3);
        for (i, stage) in stages.iter().enumerate() {
            assert_eq!(stage.position, i as i64 + 1);
        }
        assert!(stages[0].is_default && !stages[0].is_terminal);
        assert!(!stages[1].is_default && !stages[1].is_terminal);
        assert!(stages[2].is_terminal && !stages[2].is_default);

        // every template task links to the stage at its position
        let tasks = template_repo::list_template_tasks(&conn, &template_id).unwrap();
        for (task, stage) in tasks.iter().zip(&stages) {
            assert_eq!(task.default_stage_id.as_deref(), Some(stage.id.as_str()));
        }
    }

    #[test]
    fn single_task_stage_is_both_default_and_terminal() {
        let conn = connection::open_in_memory().unwrap();
        let (firm_id, template_id) = seed_template(&conn, &["Only Step"]);

        let wt = compile_template(&conn, &firm_id, &template_id, "test").unwrap();
        let stages = work_type_repo::list_stages(&conn, &wt.id).unwrap();
        assert_eq!(stages.len(), 1);
        assert!(stages[0].is_default && stages[0].is_terminal);
    }

    #[test]
    fn empty_template_fails_without_creating_a_work_type() {
        let conn = connection::open_in_memory().unwrap();
        let (firm_id, template_id) = seed_template(&conn, &[]);

        let err = compile_template(&conn, &firm_id, &template_id, "test").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EmptyTemplate);

        let template = template_repo::get_template_by_id(&conn, &template_id).unwrap();
        assert!(template.work_type_id.is_none());
    }

    #[test]
    fn recompile_is_idempotent_and_relinks() {
        let conn = connection::open_in_memory().unwrap();
        let (firm_id, template_id) = seed_template(&conn, &["A", "B"]);

        let first = compile_template(&conn, &firm_id, &template_id, "test").unwrap();
        let second = compile_template(&conn, &firm_id, &template_id, "test").unwrap();
        assert_eq!(first.id, second.id);

        let stages = work_type_repo::list_stages(&conn, &first.id).unwrap();
        assert_eq!(stages.len(), 2);

        let tasks = template_repo::list_template_tasks(&conn, &template_id).unwrap();
        let stage_ids: Vec<_> = stages.iter().map(|s| s.id.as_str()).collect();
        for task in &tasks {
            assert!(stage_ids.contains(&task.default_stage_id.as_deref().unwrap()));
        }
    }
}
