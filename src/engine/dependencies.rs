use rusqlite::Connection;

use crate::db::{activity_repo, dependency_repo, task_repo};
use crate::error::FirmflowError;
use crate::graph::cycle::DependencyGraph;

/// Record that `task_ref` depends on `depends_on_ref`.
///
/// Scope checks (both tasks exist, same firm) run before any cycle work.
/// The cycle check and the edge insert share one immediate transaction, so
/// the graph the check saw is the graph the edge lands in; on a detected
/// cycle nothing changes.
pub fn add_dependency(
    conn: &Connection,
    firm_id: &str,
    task_ref: &str,
    depends_on_ref: &str,
    actor: &str,
) -> Result<(), FirmflowError> {
    let task = task_repo::resolve_task(conn, firm_id, task_ref)?;
    // An exact id that resolves to another firm's task is a scope violation,
    // not a lookup miss.
    if let Ok(foreign) = task_repo::get_task_by_id(conn, depends_on_ref) {
        if foreign.firm_id != task.firm_id {
            return Err(FirmflowError::invalid_dependency_scope());
        }
    }
    let depends_on = task_repo::resolve_task(conn, firm_id, depends_on_ref)?;

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), FirmflowError> {
        let edges = dependency_repo::edges_for_firm(conn, firm_id)?;
        let graph = DependencyGraph::from_edges(&edges);
        if graph.would_create_cycle(&task.id, &depends_on.id) {
            return Err(FirmflowError::cycle_detected(&task.id, &depends_on.id));
        }
        dependency_repo::insert_edge(conn, &task.id, &depends_on.id)
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            activity_repo::log_event_best_effort(
                conn,
                firm_id,
                &format!("Task '{}' now depends on '{}'", task.title, depends_on.title),
                actor,
                task.project_id.as_deref(),
                Some(&task.id),
            );
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

pub fn remove_dependency(
    conn: &Connection,
    firm_id: &str,
    task_ref: &str,
    depends_on_ref: &str,
    actor: &str,
) -> Result<(), FirmflowError> {
    let task = task_repo::resolve_task(conn, firm_id, task_ref)?;
    let depends_on = task_repo::resolve_task(conn, firm_id, depends_on_ref)?;
    dependency_repo::remove_edge(conn, &task.id, &depends_on.id)?;
    activity_repo::log_event_best_effort(
        conn,
        firm_id,
        &format!("Task '{}' no longer depends on '{}'", task.title, depends_on.title),
        actor,
        task.project_id.as_deref(),
        Some(&task.id),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::db::connection;
    use crate::engine::instantiate::{instantiate_project, InstantiateParams};
    use crate::engine::testutil;
    use crate::models::Task;

    fn setup() -> (Connection, String, Vec<Task>) {
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
                dependency_mode_override: None,
            },
            "test",
        )
        .unwrap();
        let tasks = task_repo::list_slot_tasks(&conn, &project.id)
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        (conn, fixture.firm_id, tasks)
    }

    #[test]
    fn successful_edge_makes_the_reverse_a_cycle() {
        let (conn, firm_id, tasks) = setup();
        // Review -> Collect shortcuts the existing chain; still acyclic
        add_dependency(&conn, &firm_id, &tasks[2].id, &tasks[0].id, "test").unwrap();

        let edges = dependency_repo::edges_for_firm(&conn, &firm_id).unwrap();
        let graph = DependencyGraph::from_edges(&edges);
        assert!(graph.would_create_cycle(&tasks[0].id, &tasks[2].id));
    }

    #[test]
    fn cycle_rejection_leaves_the_graph_unchanged() {
        let (conn, firm_id, tasks) = setup();
        let before = dependency_repo::edges_for_firm(&conn, &firm_id).unwrap().len();

        let err = add_dependency(&conn, &firm_id, &tasks[0].id, &tasks[2].id, "test").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CycleDetected);

        let after = dependency_repo::edges_for_firm(&conn, &firm_id).unwrap().len();
        assert_eq!(before, after);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let (conn, firm_id, tasks) = setup();
        let err = add_dependency(&conn, &firm_id, &tasks[0].id, &tasks[0].id, "test").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CycleDetected);
    }

    #[test]
    fn cross_firm_dependency_is_rejected_before_cycle_check() {
        let (conn, firm_id, tasks) = setup();
        let other = testutil::bookkeeping_fixture(&conn);
        let other_project = instantiate_project(
            &conn,
            &other.firm_id,
            &InstantiateParams {
                template_ref: other.template_id.clone(),
                client_ref: other.client_id.clone(),
                name: None,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                due_date: None,
                dependency_mode_override: None,
            },
            "test",
        )
        .unwrap();
        let foreign = task_repo::list_tasks_by_project(&conn, &other_project.id).unwrap();

        let err =
            add_dependency(&conn, &firm_id, &tasks[0].id, &foreign[0].id, "test").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidDependencyScope);
    }

    #[test]
    fn remove_then_add_reverse_is_allowed() {
        let (conn, firm_id, tasks) = setup();
        remove_dependency(&conn, &firm_id, &tasks[1].id, &tasks[0].id, "test").unwrap();
        remove_dependency(&conn, &firm_id, &tasks[2].id, &tasks[1].id, "test").unwrap();
        // with the chain gone, the former back edge is fine
        add_dependency(&conn, &firm_id, &tasks[0].id, &tasks[2].id, "test").unwrap();
    }
}
