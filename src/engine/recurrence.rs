use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::db::{activity_repo, project_repo, task_repo, work_type_repo};
use crate::engine::due_date;
use crate::error::FirmflowError;
use crate::models::Task;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceOutcome {
    pub task: Task,
    /// False when the occurrence already existed and was returned as-is.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepOutcome {
    pub masters_checked: i64,
    pub instances_created: i64,
    pub failures: i64,
}

/// Generate the next occurrence of a recurring master task.
///
/// Idempotent: the next due date is computed from the later of the master's
/// completion date and its due date, and an instance already existing for
/// that date is returned instead of duplicated. Both trigger paths (task
/// completion and the periodic sweep) come through here; concurrency safety
/// rests on this probe plus the unique index on (master, due date).
pub fn generate_next_instance(
    conn: &Connection,
    firm_id: &str,
    master_ref: &str,
    actor: &str,
) -> Result<RecurrenceOutcome, FirmflowError> {
    let master = task_repo::resolve_task(conn, firm_id, master_ref)?;
    if !master.is_recurring {
        return Err(FirmflowError::validation(format!(
            "Task {} is not a recurring master",
            master.id
        )));
    }
    let rule = master
        .recurrence_rule
        .as_deref()
        .ok_or_else(|| {
            FirmflowError::validation(format!("Recurring task {} has no recurrence rule", master.id))
        })?;

    let completed = master.completed_at.as_deref().and_then(parse_date_prefix);
    let due = master.due_date.as_deref().and_then(parse_date_prefix);
    let from = match (completed, due) {
        (Some(c), Some(d)) => c.max(d),
        (Some(c), None) => c,
        (None, Some(d)) => d,
        (None, None) => {
            return Err(FirmflowError::validation(format!(
                "Recurring task {} has neither a due date nor a completion date",
                master.id
            )))
        }
    };
    let next = due_date::next_due(rule, from)?;
    let next_str = next.format(DATE_FMT).to_string();

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<RecurrenceOutcome, FirmflowError> {
        if let Some(existing) = task_repo::find_instance(conn, &master.id, &next_str)? {
            task_repo::set_next_due_date(conn, &master.id, Some(&next_str))?;
            return Ok(RecurrenceOutcome {
                task: existing,
                created: false,
            });
        }

        // Instances of a project master start at the work type's default
        // stage; independent masters have no ladder to start on.
        let stage_id = match &master.project_id {
            Some(project_id) => {
                let project = project_repo::get_project_by_id(conn, project_id)?;
                Some(work_type_repo::default_stage(conn, &project.work_type_id)?.id)
            }
            None => None,
        };

        let instance_id = ulid::Ulid::new().to_string();
        task_repo::create_task(
            conn,
            &Task {
                id: instance_id.clone(),
                firm_id: master.firm_id.clone(),
                project_id: master.project_id.clone(),
                title: master.title.clone(),
                description: master.description.clone(),
                stage_id,
                assignee: master.assignee.clone(),
                priority: master.priority,
                estimated_hours: master.estimated_hours,
                due_date: Some(next_str.clone()),
                template_task_origin_id: master.template_task_origin_id.clone(),
                is_recurring: false,
                recurrence_rule: None,
                next_due_date: None,
                recurring_master_id: Some(master.id.clone()),
                created_at: String::new(),
                updated_at: String::new(),
                completed_at: None,
            },
        )?;
        task_repo::set_next_due_date(conn, &master.id, Some(&next_str))?;
        let task = task_repo::get_task_by_id(conn, &instance_id)?;
        Ok(RecurrenceOutcome { task, created: true })
    })();

    match result {
        Ok(outcome) => {
            conn.execute_batch("COMMIT")?;
            if outcome.created {
                activity_repo::log_event_best_effort(
                    conn,
                    firm_id,
                    &format!(
                        "Generated recurring instance of '{}' due {}",
                        master.title, next_str
                    ),
                    actor,
                    master.project_id.as_deref(),
                    Some(&outcome.task.id),
                );
            }
            Ok(outcome)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Sweep a firm's recurring masters whose next occurrence is due on or
/// before `as_of`. One master's failure is logged and skipped; the batch
/// keeps going. Safe to run concurrently with itself and with the
/// on-completion trigger.
pub fn run_recurring_sweep(
    conn: &Connection,
    firm_id: &str,
    as_of: NaiveDate,
    actor: &str,
) -> Result<SweepOutcome, FirmflowError> {
    let as_of_str = as_of.format(DATE_FMT).to_string();
    let masters = task_repo::recurring_masters_due(conn, firm_id, &as_of_str)?;

    let mut outcome = SweepOutcome {
        masters_checked: masters.len() as i64,
        ..SweepOutcome::default()
    };
    for master in &masters {
        match generate_next_instance(conn, firm_id, &master.id, actor) {
            Ok(generated) if generated.created => outcome.instances_created += 1,
            Ok(_) => {}
            Err(e) => {
                warn!(master = %master.id, error = %e, "recurring sweep skipped a master");
                outcome.failures += 1;
            }
        }
    }

    if outcome.instances_created > 0 {
        activity_repo::log_event_best_effort(
            conn,
            firm_id,
            &format!(
                "Recurring sweep created {} instance(s) as of {}",
                outcome.instances_created, as_of_str
            ),
            actor,
            None,
            None,
        );
    }
    Ok(outcome)
}

fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, DATE_FMT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::db::connection;
    use crate::engine::instantiate::{instantiate_project, InstantiateParams};
    use crate::engine::testutil;

    fn setup() -> (Connection, String, Task) {
        let conn = connection::open_in_memory().unwrap();
        let fixture = testutil::bookkeeping_fixture(&conn);
        let project = instantiate_project(
            &conn,
            &fixture.firm_id,
            &InstantiateParams {
                template_ref: fixture.template_id.clone(),
                client_ref: fixture.client_id.clone(),
                name: None,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                due_date: None,
                dependency_mode_override: None,
            },
            "test",
        )
        .unwrap();
        let master = task_repo::list_tasks_by_project(&conn, &project.id)
            .unwrap()
            .into_iter()
            .find(|t| t.is_recurring)
            .unwrap();
        (conn, fixture.firm_id, master)
    }

    #[test]
    fn generation_is_idempotent_for_the_same_due_date() {
        let (conn, firm_id, master) = setup();

        let first = generate_next_instance(&conn, &firm_id, &master.id, "test").unwrap();
        assert!(first.created);
        // monthly:last_day from the master's 2024-02-29 due date
        assert_eq!(first.task.due_date.as_deref(), Some("2024-03-31"));
        assert_eq!(first.task.recurring_master_id.as_deref(), Some(master.id.as_str()));

        let second = generate_next_instance(&conn, &firm_id, &master.id, "test").unwrap();
        assert!(!second.created);
        assert_eq!(second.task.id, first.task.id);

        let instances: Vec<_> = task_repo::list_tasks_by_firm(&conn, &firm_id)
            .unwrap()
            .into_iter()
            .filter(|t| t.recurring_master_id.is_some())
            .collect();
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn instance_copies_static_attributes_and_starts_at_default_stage() {
        let (conn, firm_id, master) = setup();
        let generated = generate_next_instance(&conn, &firm_id, &master.id, "test").unwrap();

        assert_eq!(generated.task.title, master.title);
        assert_eq!(generated.task.assignee.as_deref(), Some("jordan"));
        assert_eq!(generated.task.estimated_hours, Some(4.0));
        assert!(!generated.task.is_recurring);
        assert!(generated.task.completed_at.is_none());

        let project_id = master.project_id.clone().unwrap();
        let project = project_repo::get_project_by_id(&conn, &project_id).unwrap();
        let default = work_type_repo::default_stage(&conn, &project.work_type_id).unwrap();
        assert_eq!(generated.task.stage_id.as_deref(), Some(default.id.as_str()));
    }

    #[test]
    fn non_recurring_task_is_rejected() {
        let (conn, firm_id, master) = setup();
        let plain = task_repo::list_tasks_by_firm(&conn, &firm_id)
            .unwrap()
            .into_iter()
            .find(|t| !t.is_recurring && t.id != master.id)
            .unwrap();
        let err = generate_next_instance(&conn, &firm_id, &plain.id, "test").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[test]
    fn sweep_creates_once_then_settles() {
        let (conn, firm_id, master) = setup();

        // master due 2024-02-29; sweep as of a later date picks it up
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let first = run_recurring_sweep(&conn, &firm_id, as_of, "cron").unwrap();
        assert_eq!(first.masters_checked, 1);
        assert_eq!(first.instances_created, 1);
        assert_eq!(first.failures, 0);

        // the generated occurrence (2024-03-31) is not yet due, and rerunning
        // for the same day must not duplicate anything
        let second = run_recurring_sweep(&conn, &firm_id, as_of, "cron").unwrap();
        assert_eq!(second.instances_created, 0);

        // even at a date where the master is due again, the probe returns the
        // existing instance for the unchanged from-date
        let later = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        let third = run_recurring_sweep(&conn, &firm_id, later, "cron").unwrap();
        assert_eq!(third.instances_created, 0);

        let instances: Vec<_> = task_repo::list_tasks_by_firm(&conn, &firm_id)
            .unwrap()
            .into_iter()
            .filter(|t| t.recurring_master_id == Some(master.id.clone()))
            .collect();
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn sweep_skips_a_broken_master_and_continues() {
        let (conn, firm_id, master) = setup();
        // corrupt the rule behind the engine's back
        conn.execute(
            "UPDATE tasks SET recurrence_rule = 'fortnightly' WHERE id = ?1",
            rusqlite::params![master.id],
        )
        .unwrap();

        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let outcome = run_recurring_sweep(&conn, &firm_id, as_of, "cron").unwrap();
        assert_eq!(outcome.masters_checked, 1);
        assert_eq!(outcome.instances_created, 0);
        assert_eq!(outcome.failures, 1);
    }
}
