use chrono::NaiveDate;
use serde_json::json;

use crate::cli::commands::ProjectCommands;
use crate::cli::firm::resolve_firm_id;
use crate::db::{connection, project_repo, task_repo, work_type_repo};
use crate::engine::{
    instantiate_project, move_project_to_column, project_column, ColumnTarget, InstantiateParams,
};
use crate::error::FirmflowError;
use crate::output;

pub fn run(cmd: ProjectCommands, json_output: bool, firm_flag: Option<&str>, actor: &str) -> i32 {
    let result = match cmd {
        ProjectCommands::Create {
            template,
            client,
            start,
            due,
            dependency_mode,
            name,
        } => run_create(
            &template,
            &client,
            &start,
            due.as_deref(),
            dependency_mode,
            name,
            json_output,
            firm_flag,
            actor,
        ),
        ProjectCommands::List => run_list(json_output, firm_flag),
        ProjectCommands::Show { reference } => run_show(&reference, json_output, firm_flag),
        ProjectCommands::Column { reference } => run_column(&reference, json_output, firm_flag),
        ProjectCommands::Move { reference, target } => {
            run_move(&reference, &target, json_output, firm_flag, actor)
        }
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

fn parse_date(s: &str) -> Result<NaiveDate, FirmflowError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| FirmflowError::validation(format!("Invalid date '{s}', expected YYYY-MM-DD")))
}

#[allow(clippy::too_many_arguments)]
fn run_create(
    template: &str,
    client: &str,
    start: &str,
    due: Option<&str>,
    dependency_mode: Option<bool>,
    name: Option<String>,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let start_date = parse_date(start)?;
    let due_date = due.map(parse_date).transpose()?;

    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let project = instantiate_project(
        &conn,
        &firm_id,
        &InstantiateParams {
            template_ref: template.to_string(),
            client_ref: client.to_string(),
            name,
            start_date,
            due_date,
            dependency_mode_override: dependency_mode,
        },
        actor,
    )?;
    let tasks = task_repo::list_tasks_by_project(&conn, &project.id)?;

    if json_output {
        let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "project": output::json::project_json(&project),
                "tasks": tasks_json
            })))
            .unwrap()
        );
    } else {
        println!("Created project: {} ({})", project.name, project.id);
        println!("  {} task(s) instantiated", tasks.len());
    }
    Ok(0)
}

fn run_list(json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let projects = project_repo::list_projects(&conn, &firm_id)?;

    if json_output {
        let projects_json: Vec<_> = projects.iter().map(output::json::project_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "projects": projects_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_project_list(&projects);
    }
    Ok(0)
}

fn run_show(reference: &str, json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let project = project_repo::resolve_project(&conn, &firm_id, reference)?;
    let tasks = task_repo::list_tasks_by_project(&conn, &project.id)?;
    let stages = work_type_repo::list_stages(&conn, &project.work_type_id)?;
    let column = project_column(&conn, &firm_id, &project.id)?;

    if json_output {
        let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
        let stages_json: Vec<_> = stages.iter().map(output::json::stage_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "project": output::json::project_json(&project),
                "column": column.label(),
                "stages": stages_json,
                "tasks": tasks_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_project(&project);
        println!("  Column: {}", column.label());
        println!("\nTasks:");
        output::text::print_task_list(&tasks, &stages);
    }
    Ok(0)
}

fn run_column(reference: &str, json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let column = project_column(&conn, &firm_id, reference)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "column": column.label()
            })))
            .unwrap()
        );
    } else {
        println!("Column: {}", column.label());
    }
    Ok(0)
}

fn run_move(
    reference: &str,
    target: &str,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let target = if target == "completed" {
        ColumnTarget::Completed
    } else {
        let position: i64 = target.parse().map_err(|_| {
            FirmflowError::validation(format!(
                "Invalid column target '{target}': expected a stage position or 'completed'"
            ))
        })?;
        ColumnTarget::Stage(position)
    };

    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let summary = move_project_to_column(&conn, &firm_id, reference, target, actor)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(output::json::cascade_json(
                &summary
            )))
            .unwrap()
        );
    } else {
        output::text::print_cascade(&summary);
    }
    Ok(0)
}
