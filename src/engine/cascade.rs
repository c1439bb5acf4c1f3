use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::db::task_repo::CompletionMark;
use crate::db::{activity_repo, project_repo, task_repo, work_type_repo};
use crate::engine::recurrence;
use crate::error::FirmflowError;
use crate::models::{KanbanColumn, Project, Stage, Task};

/// Target of a direct kanban move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTarget {
    Stage(i64),
    Completed,
}

/// What one transition changed, beyond the task that was moved.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeSummary {
    pub task_id: Option<String>,
    /// Tasks forced to the terminal stage.
    pub completed: Vec<String>,
    /// Tasks forced back to the default stage.
    pub reset: Vec<String>,
    pub column: KanbanColumn,
}

/// Move a task to a new stage and cascade across its project's other
/// template-origin tasks when the project runs in dependency mode.
///
/// A task's slot is the position of its origin template task. Reaching the
/// terminal stage forces slots before it to terminal; falling back to the
/// default stage resets terminal slots after it to default. Any other
/// target stage cascades nothing. The whole transition is one transaction.
pub fn advance_task_status(
    conn: &Connection,
    firm_id: &str,
    task_ref: &str,
    new_stage_id: &str,
    actor: &str,
) -> Result<CascadeSummary, FirmflowError> {
    let task = task_repo::resolve_task(conn, firm_id, task_ref)?;
    let project_id = task
        .project_id
        .clone()
        .ok_or_else(|| FirmflowError::validation("Independent tasks are not part of a workflow"))?;
    let project = project_repo::get_project_by_id(conn, &project_id)?;
    let new_stage = work_type_repo::get_stage_by_id(conn, new_stage_id)?;
    if new_stage.work_type_id != project.work_type_id {
        return Err(FirmflowError::validation(
            "Stage does not belong to the project's work type",
        ));
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<CascadeSummary, FirmflowError> {
        let mark = if new_stage.is_terminal {
            CompletionMark::Set
        } else {
            CompletionMark::Clear
        };
        if !task_repo::update_stage_guarded(
            conn,
            &task.id,
            Some(&new_stage.id),
            task.stage_id.as_deref(),
            mark,
        )? {
            return Err(FirmflowError::stale_cascade(&task.id));
        }

        let mut summary = CascadeSummary {
            task_id: Some(task.id.clone()),
            completed: Vec::new(),
            reset: Vec::new(),
            column: KanbanColumn::Stage(1),
        };

        let cascading = project.task_dependency_mode && task.template_task_origin_id.is_some();
        if cascading && (new_stage.is_terminal || new_stage.is_default) {
            let stages = work_type_repo::list_stages(conn, &project.work_type_id)?;
            let slot = slot_of(conn, &project.id, &task.id)?;
            if new_stage.is_terminal {
                cascade_forward(conn, &project, slot, &stages, &mut summary)?;
            } else {
                cascade_backward(conn, &project, slot, &stages, &mut summary)?;
            }
        }

        let (column, stage_id) = derive_column(conn, &project.id, &project.work_type_id)?;
        project_repo::set_current_stage(conn, &project.id, stage_id.as_deref())?;
        summary.column = column;
        Ok(summary)
    })();

    match result {
        Ok(summary) => {
            conn.execute_batch("COMMIT")?;
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Task '{}' moved to stage '{}'", task.title, new_stage.name),
                actor,
                Some(&project_id),
                Some(&task.id),
            );
            if new_stage.is_terminal {
                trigger_recurrence(conn, firm_id, &task.id, &summary.completed, actor);
            }
            Ok(summary)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Complete a task: project tasks advance to their work type's terminal
/// stage (cascading as usual); independent tasks just get a completion
/// timestamp. Either way a recurring master's next occurrence is generated
/// afterwards.
pub fn complete_task(
    conn: &Connection,
    firm_id: &str,
    task_ref: &str,
    actor: &str,
) -> Result<CascadeSummary, FirmflowError> {
    let task = task_repo::resolve_task(conn, firm_id, task_ref)?;
    match &task.project_id {
        Some(project_id) => {
            let project = project_repo::get_project_by_id(conn, project_id)?;
            let terminal = work_type_repo::terminal_stage(conn, &project.work_type_id)?;
            advance_task_status(conn, firm_id, &task.id, &terminal.id, actor)
        }
        None => {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            let updated = task_repo::update_stage_guarded(
                conn,
                &task.id,
                task.stage_id.as_deref(),
                task.stage_id.as_deref(),
                CompletionMark::Set,
            );
            match updated {
                Ok(true) => conn.execute_batch("COMMIT")?,
                Ok(false) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(FirmflowError::stale_cascade(&task.id));
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            }
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Task '{}' completed", task.title),
                actor,
                None,
                Some(&task.id),
            );
            trigger_recurrence(conn, firm_id, &task.id, &[], actor);
            Ok(CascadeSummary {
                task_id: Some(task.id.clone()),
                completed: Vec::new(),
                reset: Vec::new(),
                column: KanbanColumn::Completed,
            })
        }
    }
}

/// Reopen a task: project tasks fall back to the default stage (cascading
/// as usual); independent tasks get their completion timestamp cleared.
pub fn reopen_task(
    conn: &Connection,
    firm_id: &str,
    task_ref: &str,
    actor: &str,
) -> Result<CascadeSummary, FirmflowError> {
    let task = task_repo::resolve_task(conn, firm_id, task_ref)?;
    match &task.project_id {
        Some(project_id) => {
            let project = project_repo::get_project_by_id(conn, project_id)?;
            let default = work_type_repo::default_stage(conn, &project.work_type_id)?;
            advance_task_status(conn, firm_id, &task.id, &default.id, actor)
        }
        None => {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            let updated = task_repo::update_stage_guarded(
                conn,
                &task.id,
                task.stage_id.as_deref(),
                task.stage_id.as_deref(),
                CompletionMark::Clear,
            );
            match updated {
                Ok(true) => conn.execute_batch("COMMIT")?,
                Ok(false) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(FirmflowError::stale_cascade(&task.id));
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            }
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Task '{}' reopened", task.title),
                actor,
                None,
                Some(&task.id),
            );
            Ok(CascadeSummary {
                task_id: Some(task.id.clone()),
                completed: Vec::new(),
                reset: Vec::new(),
                column: KanbanColumn::Completed,
            })
        }
    }
}

/// Kanban column of a project: position of the first slot (template order)
/// whose task is not terminal; `Completed` when every slot is.
pub fn project_column(
    conn: &Connection,
    firm_id: &str,
    project_ref: &str,
) -> Result<KanbanColumn, FirmflowError> {
    let project = project_repo::resolve_project(conn, firm_id, project_ref)?;
    let (column, _) = derive_column(conn, &project.id, &project.work_type_id)?;
    Ok(column)
}

/// Move a project straight to a kanban column. Produces the same end state
/// as moving task-by-task: slots before the target forced terminal, the
/// target slot forced active, slots after it forced back to default.
pub fn move_project_to_column(
    conn: &Connection,
    firm_id: &str,
    project_ref: &str,
    target: ColumnTarget,
    actor: &str,
) -> Result<CascadeSummary, FirmflowError> {
    let project = project_repo::resolve_project(conn, firm_id, project_ref)?;
    let stages = work_type_repo::list_stages(conn, &project.work_type_id)?;
    if stages.is_empty() {
        return Err(FirmflowError::validation("Project's work type has no stages"));
    }
    let target_position = match target {
        ColumnTarget::Completed => None,
        ColumnTarget::Stage(p) => {
            if p < 1 || p > stages.len() as i64 {
                return Err(FirmflowError::stage_not_found(&format!("position {p}")));
            }
            Some(p)
        }
    };

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<CascadeSummary, FirmflowError> {
        let mut summary = CascadeSummary {
            task_id: None,
            completed: Vec::new(),
            reset: Vec::new(),
            column: KanbanColumn::Completed,
        };
        let by_id = stage_index(&stages);
        let terminal = terminal_of(&stages);
        let default = default_of(&stages);
        // Where a task lands when its slot is the target but it already sits
        // at a terminal stage: the first stage that is neither default nor
        // terminal, or the default stage on a two-step ladder.
        let active = stages
            .iter()
            .find(|s| !s.is_default && !s.is_terminal)
            .unwrap_or(default);

        for (slot, task) in task_repo::list_slot_tasks(conn, &project.id)? {
            let current = task.stage_id.as_deref().and_then(|id| by_id.get(id)).copied();
            let is_terminal = current.map(|s| s.is_terminal).unwrap_or(false);
            let is_default = current.map(|s| s.is_default).unwrap_or(false);

            // Equivalence with completing task-by-task: a task already at a
            // terminal stage but never stamped (a slot born on the terminal
            // stage) still gets its completion timestamp.
            match target_position {
                None => {
                    if !is_terminal || task.completed_at.is_none() {
                        force_stage(conn, &task, terminal, CompletionMark::Set)?;
                        summary.completed.push(task.id.clone());
                    }
                }
                Some(t) if slot < t => {
                    if !is_terminal || task.completed_at.is_none() {
                        force_stage(conn, &task, terminal, CompletionMark::Set)?;
                        summary.completed.push(task.id.clone());
                    }
                }
                Some(t) if slot == t => {
                    if is_terminal {
                        force_stage(conn, &task, active, CompletionMark::Clear)?;
                        summary.reset.push(task.id.clone());
                    }
                }
                Some(_) => {
                    if !is_default {
                        force_stage(conn, &task, default, CompletionMark::Clear)?;
                        summary.reset.push(task.id.clone());
                    }
                }
            }
        }

        let (column, stage_id) = derive_column(conn, &project.id, &project.work_type_id)?;
        project_repo::set_current_stage(conn, &project.id, stage_id.as_deref())?;
        summary.column = column;
        Ok(summary)
    })();

    match result {
        Ok(summary) => {
            conn.execute_batch("COMMIT")?;
            let label = match target {
                ColumnTarget::Completed => "completed".to_string(),
                ColumnTarget::Stage(p) => format!("stage {p}"),
            };
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Project '{}' moved to {label}", project.name),
                actor,
                Some(&project.id),
                None,
            );
            trigger_recurrence(conn, firm_id, "", &summary.completed, actor);
            Ok(summary)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Force every slot strictly before `slot` that is not yet terminal to the
/// terminal stage. Slots after it are untouched.
fn cascade_forward(
    conn: &Connection,
    project: &Project,
    slot: i64,
    stages: &[Stage],
    summary: &mut CascadeSummary,
) -> Result<(), FirmflowError> {
    let by_id = stage_index(stages);
    let terminal = terminal_of(stages);
    for (pos, sibling) in task_repo::list_slot_tasks(conn, &project.id)? {
        if pos >= slot || Some(sibling.id.as_str()) == summary.task_id.as_deref() {
            continue;
        }
        let is_terminal = sibling
            .stage_id
            .as_deref()
            .and_then(|id| by_id.get(id))
            .map(|s| s.is_terminal)
            .unwrap_or(false);
        if !is_terminal {
            force_stage(conn, &sibling, terminal, CompletionMark::Set)?;
            summary.completed.push(sibling.id.clone());
        }
    }
    Ok(())
}

/// Reset every slot strictly after `slot` that currently sits at the
/// terminal stage back to the default stage. Slots before it are untouched.
fn cascade_backward(
    conn: &Connection,
    project: &Project,
    slot: i64,
    stages: &[Stage],
    summary: &mut CascadeSummary,
) -> Result<(), FirmflowError> {
    let by_id = stage_index(stages);
    let default = default_of(stages);
    for (pos, sibling) in task_repo::list_slot_tasks(conn, &project.id)? {
        if pos <= slot || Some(sibling.id.as_str()) == summary.task_id.as_deref() {
            continue;
        }
        let is_terminal = sibling
            .stage_id
            .as_deref()
            .and_then(|id| by_id.get(id))
            .map(|s| s.is_terminal)
            .unwrap_or(false);
        if is_terminal {
            force_stage(conn, &sibling, default, CompletionMark::Clear)?;
            summary.reset.push(sibling.id.clone());
        }
    }
    Ok(())
}

fn force_stage(
    conn: &Connection,
    task: &Task,
    stage: &Stage,
    mark: CompletionMark,
) -> Result<(), FirmflowError> {
    if !task_repo::update_stage_guarded(
        conn,
        &task.id,
        Some(&stage.id),
        task.stage_id.as_deref(),
        mark,
    )? {
        return Err(FirmflowError::stale_cascade(&task.id));
    }
    Ok(())
}

/// Derived kanban column plus the stage row backing it (the coarse
/// project-level stage).
pub(crate) fn derive_column(
    conn: &Connection,
    project_id: &str,
    work_type_id: &str,
) -> Result<(KanbanColumn, Option<String>), FirmflowError> {
    let stages = work_type_repo::list_stages(conn, work_type_id)?;
    let by_id = stage_index(&stages);
    for (slot, task) in task_repo::list_slot_tasks(conn, project_id)? {
        let is_terminal = task
            .stage_id
            .as_deref()
            .and_then(|id| by_id.get(id))
            .map(|s| s.is_terminal)
            .unwrap_or(false);
        if !is_terminal {
            let stage_id = stages
                .iter()
                .find(|s| s.position == slot)
                .map(|s| s.id.clone());
            return Ok((KanbanColumn::Stage(slot), stage_id));
        }
    }
    let terminal_id = stages.iter().find(|s| s.is_terminal).map(|s| s.id.clone());
    Ok((KanbanColumn::Completed, terminal_id))
}

/// Slot of a task: its origin template task's position.
fn slot_of(conn: &Connection, project_id: &str, task_id: &str) -> Result<i64, FirmflowError> {
    for (pos, task) in task_repo::list_slot_tasks(conn, project_id)? {
        if task.id == task_id {
            return Ok(pos);
        }
    }
    Err(FirmflowError::task_not_found(task_id))
}

fn stage_index(stages: &[Stage]) -> HashMap<&str, &Stage> {
    stages.iter().map(|s| (s.id.as_str(), s)).collect()
}

fn terminal_of(stages: &[Stage]) -> &Stage {
    stages.last().expect("work type has at least one stage")
}

fn default_of(stages: &[Stage]) -> &Stage {
    stages.first().expect("work type has at least one stage")
}

/// After a committed transition, generate next occurrences for any recurring
/// masters that just completed. Runs in its own transaction; a failure here
/// never unwinds the committed status change.
fn trigger_recurrence(
    conn: &Connection,
    firm_id: &str,
    moved_task_id: &str,
    forced_completed: &[String],
    actor: &str,
) {
    let mut candidates: Vec<&str> = Vec::new();
    if !moved_task_id.is_empty() {
        candidates.push(moved_task_id);
    }
    candidates.extend(forced_completed.iter().map(|s| s.as_str()));

    for id in candidates {
        let task = match task_repo::get_task_by_id(conn, id) {
            Ok(t) => t,
            Err(_) => continue,
        };
        if !task.is_recurring {
            continue;
        }
        if let Err(e) = recurrence::generate_next_instance(conn, firm_id, id, actor) {
            warn!(task = id, error = %e, "could not generate next recurring instance");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::db::connection;
    use crate::engine::instantiate::{instantiate_project, InstantiateParams};
    use crate::engine::testutil;
    use crate::models::Task;

    struct Board {
        conn: Connection,
        firm_id: String,
        project_id: String,
        stages: Vec<Stage>,
        tasks: Vec<Task>,
    }

    fn board(dependency_mode: Option<bool>) -> Board {
        let conn = connection::open_in_memory().unwrap();
        let fixture = testutil::tax_return_fixture(&conn);
        let project = instantiate_project(
            &conn,
            &fixture.firm_id,
            &InstantiateParams {
                template_ref: fixture.template_id.clone(),
                client_ref: fixture.client_id.clone(),
                name: None,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                due_date: None,
                dependency_mode_override: dependency_mode,
            },
            "test",
        )
        .unwrap();
        let stages = work_type_repo::list_stages(&conn, &project.work_type_id).unwrap();
        let tasks = task_repo::list_slot_tasks(&conn, &project.id)
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        Board {
            conn,
            firm_id: fixture.firm_id,
            project_id: project.id,
            stages,
            tasks,
        }
    }

    fn stage_position_of(board: &Board, task_id: &str) -> i64 {
        let task = task_repo::get_task_by_id(&board.conn, task_id).unwrap();
        let stage_id = task.stage_id.unwrap();
        board
            .stages
            .iter()
            .find(|s| s.id == stage_id)
            .unwrap()
            .position
    }

    #[test]
    fn forward_cascade_completes_earlier_slots_only() {
        let b = board(None);
        let terminal = b.stages.last().unwrap();
        // complete "Prepare" (slot 2)
        let summary =
            advance_task_status(&b.conn, &b.firm_id, &b.tasks[1].id, &terminal.id, "test").unwrap();

        assert_eq!(summary.completed, vec![b.tasks[0].id.clone()]);
        assert!(summary.reset.is_empty());

        let collect = task_repo::get_task_by_id(&b.conn, &b.tasks[0].id).unwrap();
        assert_eq!(collect.stage_id.as_deref(), Some(terminal.id.as_str()));
        assert!(collect.completed_at.is_some());
        // slot 3 untouched: still at its default (the terminal stage, with
        // no completion timestamp)
        let review = task_repo::get_task_by_id(&b.conn, &b.tasks[2].id).unwrap();
        assert!(review.completed_at.is_none());
    }

    #[test]
    fn backward_cascade_resets_later_slots_only() {
        let b = board(None);
        let terminal = b.stages.last().unwrap();
        let default = b.stages.first().unwrap();

        // drive everything terminal, then pull "Prepare" (slot 2) back
        advance_task_status(&b.conn, &b.firm_id, &b.tasks[2].id, &terminal.id, "test").unwrap();
        let summary =
            advance_task_status(&b.conn, &b.firm_id, &b.tasks[1].id, &default.id, "test").unwrap();

        assert_eq!(summary.reset, vec![b.tasks[2].id.clone()]);
        let review = task_repo::get_task_by_id(&b.conn, &b.tasks[2].id).unwrap();
        assert_eq!(review.stage_id.as_deref(), Some(default.id.as_str()));
        assert!(review.completed_at.is_none());
        // slot 1 untouched: stays terminal
        assert_eq!(stage_position_of(&b, &b.tasks[0].id), terminal.position);
    }

    #[test]
    fn middle_stage_transition_cascades_nothing() {
        let b = board(None);
        let middle = &b.stages[1];
        let summary =
            advance_task_status(&b.conn, &b.firm_id, &b.tasks[2].id, &middle.id, "test").unwrap();
        assert!(summary.completed.is_empty());
        assert!(summary.reset.is_empty());
    }

    #[test]
    fn no_cascade_when_dependency_mode_is_off() {
        let b = board(Some(false));
        let terminal = b.stages.last().unwrap();
        let summary =
            advance_task_status(&b.conn, &b.firm_id, &b.tasks[1].id, &terminal.id, "test").unwrap();
        assert!(summary.completed.is_empty());
        assert_eq!(stage_position_of(&b, &b.tasks[0].id), 1);
    }

    #[test]
    fn column_tracks_first_open_slot() {
        let b = board(None);
        let terminal = b.stages.last().unwrap();

        let (column, _) = derive_column(&b.conn, &b.project_id, &b.stages[0].work_type_id).unwrap();
        assert_eq!(column, KanbanColumn::Stage(1));

        advance_task_status(&b.conn, &b.firm_id, &b.tasks[0].id, &terminal.id, "test").unwrap();
        let (column, _) = derive_column(&b.conn, &b.project_id, &b.stages[0].work_type_id).unwrap();
        assert_eq!(column, KanbanColumn::Stage(2));

        advance_task_status(&b.conn, &b.firm_id, &b.tasks[2].id, &terminal.id, "test").unwrap();
        let (column, _) = derive_column(&b.conn, &b.project_id, &b.stages[0].work_type_id).unwrap();
        assert_eq!(column, KanbanColumn::Completed);
    }

    #[test]
    fn direct_move_matches_task_by_task_end_state() {
        let b = board(None);
        let terminal = b.stages.last().unwrap();
        advance_task_status(&b.conn, &b.firm_id, &b.tasks[2].id, &terminal.id, "test").unwrap();

        // everything is terminal now; move the board back to stage 1
        let summary = move_project_to_column(
            &b.conn,
            &b.firm_id,
            &b.project_id,
            ColumnTarget::Stage(1),
            "test",
        )
        .unwrap();
        assert_eq!(summary.column, KanbanColumn::Stage(1));

        // slot 1 stepped back to the first middle stage, slots 2..3 at default
        assert_eq!(stage_position_of(&b, &b.tasks[0].id), 2);
        assert_eq!(stage_position_of(&b, &b.tasks[1].id), 1);
        assert_eq!(stage_position_of(&b, &b.tasks[2].id), 1);
        for task in &b.tasks {
            let t = task_repo::get_task_by_id(&b.conn, &task.id).unwrap();
            assert!(t.completed_at.is_none());
        }
    }

    #[test]
    fn direct_move_to_completed_forces_every_slot_terminal() {
        let b = board(None);
        let summary = move_project_to_column(
            &b.conn,
            &b.firm_id,
            &b.project_id,
            ColumnTarget::Completed,
            "test",
        )
        .unwrap();
        assert_eq!(summary.column, KanbanColumn::Completed);
        let terminal = b.stages.last().unwrap();
        for task in &b.tasks {
            let t = task_repo::get_task_by_id(&b.conn, &task.id).unwrap();
            assert_eq!(t.stage_id.as_deref(), Some(terminal.id.as_str()));
            assert!(t.completed_at.is_some());
        }
    }

    #[test]
    fn direct_move_to_middle_column() {
        let b = board(None);
        let summary = move_project_to_column(
            &b.conn,
            &b.firm_id,
            &b.project_id,
            ColumnTarget::Stage(2),
            "test",
        )
        .unwrap();
        assert_eq!(summary.column, KanbanColumn::Stage(2));
        // slot 1 forced terminal, slot 2 left active, slot 3 forced default
        assert_eq!(stage_position_of(&b, &b.tasks[0].id), 3);
        assert_eq!(stage_position_of(&b, &b.tasks[1].id), 2);
        assert_eq!(stage_position_of(&b, &b.tasks[2].id), 1);
    }

    #[test]
    fn stage_outside_work_type_is_rejected() {
        let b = board(None);
        let other_conn_stage = "01JUNKSTAGEID0000000000000";
        let err = advance_task_status(&b.conn, &b.firm_id, &b.tasks[0].id, other_conn_stage, "t")
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::StageNotFound);
    }
}
