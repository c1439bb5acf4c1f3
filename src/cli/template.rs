use std::collections::HashSet;
use std::io::{self, Read};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::cli::commands::TemplateCommands;
use crate::cli::firm::resolve_firm_id;
use crate::db::{connection, template_repo, work_type_repo};
use crate::engine::{compile_template, due_date};
use crate::error::FirmflowError;
use crate::graph::cycle;
use crate::models::TemplateTask;
use crate::output;

pub fn run(cmd: TemplateCommands, json_output: bool, firm_flag: Option<&str>, actor: &str) -> i32 {
    let result = match cmd {
        TemplateCommands::Load => run_load(json_output, firm_flag),
        TemplateCommands::List => run_list(json_output, firm_flag),
        TemplateCommands::Show { reference } => run_show(&reference, json_output, firm_flag),
        TemplateCommands::Compile { reference } => {
            run_compile(&reference, json_output, firm_flag, actor)
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

// --- template load ---

#[derive(Deserialize)]
struct TemplateLoadInput {
    name: String,
    #[serde(default)]
    dependency_mode: bool,
    #[serde(default)]
    tasks: Vec<TaskInput>,
}

#[derive(Deserialize)]
struct TaskInput {
    id: String,
    title: String,
    description: Option<String>,
    days_from_start: Option<i64>,
    recurrence: Option<String>,
    assignee: Option<String>,
    #[serde(default)]
    priority: i64,
    estimated_hours: Option<f64>,
    #[serde(default)]
    after: Vec<String>,
}

fn run_load(json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| FirmflowError::validation(e.to_string()))?;
    let template_input: TemplateLoadInput = serde_json::from_str(&input)
        .map_err(|e| FirmflowError::validation(format!("Invalid JSON: {e}")))?;

    validate_load_input(&template_input)?;

    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    if template_repo::resolve_template(&conn, &firm_id, &template_input.name).is_ok() {
        return Err(FirmflowError::validation(format!(
            "Template '{}' already exists",
            template_input.name
        )));
    }

    let template_id = ulid::Ulid::new().to_string();
    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), FirmflowError> {
        template_repo::create_template(
            &conn,
            &template_id,
            &firm_id,
            &template_input.name,
            template_input.dependency_mode,
        )?;

        let mut id_map = std::collections::HashMap::new();
        for (i, task_input) in template_input.tasks.iter().enumerate() {
            let task = TemplateTask {
                id: ulid::Ulid::new().to_string(),
                template_id: template_id.clone(),
                position: i as i64 + 1,
                title: task_input.title.clone(),
                description: task_input.description.clone(),
                days_from_start: task_input.days_from_start,
                recurrence_rule: task_input.recurrence.clone(),
                default_stage_id: None,
                assignee: task_input.assignee.clone(),
                priority: task_input.priority,
                estimated_hours: task_input.estimated_hours,
            };
            template_repo::insert_template_task(&conn, &task)?;
            id_map.insert(task_input.id.clone(), task.id);
        }

        for task_input in &template_input.tasks {
            let task_id = &id_map[&task_input.id];
            for dep_local_id in &task_input.after {
                let dep_id = &id_map[dep_local_id];
                template_repo::add_template_dependency(&conn, task_id, dep_id)?;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    let template = template_repo::get_template_by_id(&conn, &template_id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "template": output::json::template_json(&template),
                "tasks_created": template_input.tasks.len()
            })))
            .unwrap()
        );
    } else {
        println!(
            "Loaded template '{}' with {} task(s).",
            template.name,
            template_input.tasks.len()
        );
    }
    Ok(0)
}

fn validate_load_input(input: &TemplateLoadInput) -> Result<(), FirmflowError> {
    if input.name.is_empty() {
        return Err(FirmflowError::validation("Template name is required"));
    }

    let mut seen_ids = HashSet::new();
    for t in &input.tasks {
        if t.id.is_empty() {
            return Err(FirmflowError::validation("Task id is required"));
        }
        if t.title.is_empty() {
            return Err(FirmflowError::validation(format!("Task '{}' has empty title", t.id)));
        }
        if !seen_ids.insert(&t.id) {
            return Err(FirmflowError::validation(format!("Duplicate task id: {}", t.id)));
        }
        if t.days_from_start.is_some() && t.recurrence.is_some() {
            return Err(FirmflowError::validation(format!(
                "Task '{}' sets both days_from_start and recurrence",
                t.id
            )));
        }
        if let Some(days) = t.days_from_start {
            if days < 0 {
                return Err(FirmflowError::validation(format!(
                    "Task '{}' has negative days_from_start",
                    t.id
                )));
            }
        }
        if let Some(ref rule) = t.recurrence {
            // probe the rule now so a bad one fails at load, not at
            // instantiation
            let probe = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            due_date::next_due(rule, probe)?;
        }
    }

    for t in &input.tasks {
        for dep in &t.after {
            if dep == &t.id {
                return Err(FirmflowError::validation(format!(
                    "Task '{}' depends on itself",
                    t.id
                )));
            }
            if !seen_ids.contains(dep) {
                return Err(FirmflowError::validation(format!(
                    "Task '{}' references unknown dependency '{}'",
                    t.id, dep
                )));
            }
        }
    }

    let edges: Vec<(String, String)> = input
        .tasks
        .iter()
        .flat_map(|t| t.after.iter().map(move |dep| (t.id.clone(), dep.clone())))
        .collect();
    if cycle::has_cycle(&edges) {
        return Err(FirmflowError::new(
            crate::error::ErrorCode::CycleDetected,
            "Template dependencies contain a cycle",
        ));
    }

    Ok(())
}

// --- list / show / compile ---

fn run_list(json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let templates = template_repo::list_templates(&conn, &firm_id)?;

    if json_output {
        let templates_json: Vec<_> = templates.iter().map(output::json::template_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "templates": templates_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_template_list(&templates);
    }
    Ok(0)
}

fn run_show(reference: &str, json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let template = template_repo::resolve_template(&conn, &firm_id, reference)?;
    let tasks = template_repo::list_template_tasks(&conn, &template.id)?;
    let stages = match &template.work_type_id {
        Some(id) => work_type_repo::list_stages(&conn, id)?,
        None => Vec::new(),
    };

    if json_output {
        let tasks_json: Vec<_> = tasks
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "position": t.position,
                    "title": t.title,
                    "days_from_start": t.days_from_start,
                    "recurrence_rule": t.recurrence_rule,
                    "default_stage_id": t.default_stage_id,
                })
            })
            .collect();
        let stages_json: Vec<_> = stages.iter().map(output::json::stage_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "template": output::json::template_json(&template),
                "tasks": tasks_json,
                "stages": stages_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_template(&template, &stages);
        println!("  Tasks:");
        for t in &tasks {
            let due = match (&t.days_from_start, &t.recurrence_rule) {
                (Some(d), _) => format!("day {d}"),
                (None, Some(r)) => format!("recurs {r}"),
                _ => "no due date".to_string(),
            };
            println!("    {}. {} ({due})", t.position, t.title);
        }
    }
    Ok(0)
}

fn run_compile(
    reference: &str,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let work_type = compile_template(&conn, &firm_id, reference, actor)?;
    let stages = work_type_repo::list_stages(&conn, &work_type.id)?;

    if json_output {
        let stages_json: Vec<_> = stages.iter().map(output::json::stage_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "work_type": { "id": work_type.id, "name": work_type.name },
                "stages": stages_json
            })))
            .unwrap()
        );
    } else {
        println!("Compiled work type: {} ({})", work_type.name, work_type.id);
        for s in &stages {
            println!("  {}. {}", s.position, s.name);
        }
    }
    Ok(0)
}
