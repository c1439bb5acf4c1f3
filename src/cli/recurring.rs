use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::cli::commands::RecurringCommands;
use crate::cli::firm::resolve_firm_id;
use crate::db::connection;
use crate::engine::{generate_next_instance, run_recurring_sweep};
use crate::error::FirmflowError;
use crate::output;

pub fn run(cmd: RecurringCommands, json_output: bool, firm_flag: Option<&str>, actor: &str) -> i32 {
    let result = match cmd {
        RecurringCommands::Generate { id } => run_generate(&id, json_output, firm_flag, actor),
        RecurringCommands::Sweep { as_of } => {
            run_sweep(as_of.as_deref(), json_output, firm_flag, actor)
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

fn run_generate(
    id: &str,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let outcome = generate_next_instance(&conn, &firm_id, id, actor)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "created": outcome.created,
                "task": output::json::task_summary(&outcome.task)
            })))
            .unwrap()
        );
    } else if outcome.created {
        println!(
            "Generated instance {} due {}",
            outcome.task.id,
            outcome.task.due_date.as_deref().unwrap_or("-")
        );
    } else {
        println!(
            "Instance already exists: {} due {}",
            outcome.task.id,
            outcome.task.due_date.as_deref().unwrap_or("-")
        );
    }
    Ok(0)
}

fn run_sweep(
    as_of: Option<&str>,
    json_output: bool,
    firm_flag: Option<&str>,
    actor: &str,
) -> Result<i32, FirmflowError> {
    let as_of = match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            FirmflowError::validation(format!("Invalid date '{s}', expected YYYY-MM-DD"))
        })?,
        None => Local::now().date_naive(),
    };

    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let outcome = run_recurring_sweep(&conn, &firm_id, as_of, actor)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(output::json::sweep_json(
                &outcome
            )))
            .unwrap()
        );
    } else {
        output::text::print_sweep(&outcome);
    }
    Ok(0)
}
