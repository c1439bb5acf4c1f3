use serde_json::json;

use crate::cli::commands::{DepCommands, TaskCommands};
use crate::cli::firm::resolve_firm_id;
use crate::db::{connection, dependency_repo, project_repo, task_repo, work_type_repo};
use crate::engine::{add_dependency, advance_task_status, complete_task, remove_dependency, reopen_task};
use crate::error::FirmflowError;
use crate::output;

pub fn run(cmd: TaskCommands, json_output: bool, firm_flag: Option<&str>, actor: &str) -> i32 {
    let result = match cmd {
        TaskCommands::List { project } => run_list(project.as_deref(), json_output, firm_flag),
        TaskCommands::Show { id } => run_show(&id, json_output, firm_flag),
        TaskCommands::SetStage { id, position } => {
            run_set_stage(&id, position, json_output, firm_flag, actor)
        }
        TaskCommands::Complete { id } => run_complete(&id, json_output, firm_flag, actor),
        TaskCommands::Reopen { id } => run_reopen(&id, json_output, firm_flag, actor),
        TaskCommands::Dep(dep_cmd) => run_dep(dep_cmd, json_output, firm_flag, actor),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&output::json::error(&e)).unwrap());
            } else {
                eprintln!("Error: {}", e.message);
            }
            1
        }
    }
}

fn run_list(
    project: Option<&str>,
    json_output: bool,
    firm_flag: Option<&str>,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let (tasks, stages) = match project {
        Some(reference) => {
            let project = project_repo::resolve_project(&conn, &firm_id, reference)?;
            let stages = work_type_repo::list_stages(&conn, &project.work_type_id)?;
            (task_repo::list_tasks_by_project(&conn, &project.id)?, stages)
        }
        None => (task_repo::list_tasks_by_firm(&conn, &firm_id)?, Vec::new()),
    };

    if json_output {
        let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({ "tasks": tasks_json })))
                .unwrap()
        );
    } else {
        output::text::print_task_list(&tasks, &stages);
    }
    Ok(0)
}

fn run_show(id: &str, json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let task = task_repo::resolve_task(&conn, &firm_id, id)?;
    let deps = dependency_repo::dependencies_of(&conn, &task.id)?;

    if json_output {
        let dep_tasks: Vec<_> = deps
            .iter()
            .filter_map(|d| task_repo::get_task_by_id(&conn, d).ok())
            .map(|t| output::json::task_summary(&t))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": output::json::task_detail(&task),
                "dependencies": dep_tasks
            })))
            .unwrap()
        );
    } else {
        output::text::print_task(&task);
        if !deps.is_empty() {
            println!("\nDepends on:");
            for d in &deps {
                if let Ok(dep_task) = task_repo::get_task_by_id(&conn, d) {
                    println!("  {} ({})", dep_task.title, dep_task.id);
                }
            }
        }
    }
    Ok(0)
}

fn run_set_stage(
    id: &str,
    position: i64,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let task = task_repo::resolve_task(&conn, &firm_id, id)?;
    let project_id = task
        .project_id
        .clone()
        .ok_or_else(|| FirmflowError::validation("Independent tasks are not part of a workflow"))?;
    let project = project_repo::get_project_by_id(&conn, &project_id)?;
    let stage = work_type_repo::stage_at_position(&conn, &project.work_type_id, position)?;

    let summary = advance_task_status(&conn, &firm_id, &task.id, &stage.id, actor)?;
    print_cascade_result(&summary, json_output);
    Ok(0)
}

fn run_complete(
    id: &str,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let summary = complete_task(&conn, &firm_id, id, actor)?;
    print_cascade_result(&summary, json_output);
    Ok(0)
}

fn run_reopen(
    id: &str,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let summary = reopen_task(&conn, &firm_id, id, actor)?;
    print_cascade_result(&summary, json_output);
    Ok(0)
}

fn print_cascade_result(summary: &crate::engine::CascadeSummary, json_output: bool) {
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(output::json::cascade_json(
                summary
            )))
            .unwrap()
        );
    } else {
        if let Some(ref id) = summary.task_id {
            println!("Task {id} moved");
        }
        output::text::print_cascade(summary);
    }
}

fn run_dep(
    cmd: DepCommands,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;

    match cmd {
        DepCommands::Add { id, dep_id } => {
            add_dependency(&conn, &firm_id, &id, &dep_id, actor)?;
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output::json::success(json!({
                        "added": { "task_id": id, "depends_on_id": dep_id }
                    })))
                    .unwrap()
                );
            } else {
                println!("Added dependency: {id} depends on {dep_id}");
            }
            Ok(0)
        }
        DepCommands::Remove { id, dep_id } => {
            remove_dependency(&conn, &firm_id, &id, &dep_id, actor)?;
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output::json::success(json!({
                        "removed": { "task_id": id, "depends_on_id": dep_id }
                    })))
                    .unwrap()
                );
            } else {
                println!("Removed dependency: {id} no longer depends on {dep_id}");
            }
            Ok(0)
        }
    }
}
