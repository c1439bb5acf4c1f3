use serde_json::json;

use crate::cli::firm::resolve_firm_id;
use crate::db::{activity_repo, connection};
use crate::error::FirmflowError;
use crate::output;

pub fn run(limit: i64, json_output: bool, firm_flag: Option<&str>) -> i32 {
    match run_list(limit, json_output, firm_flag) {
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

fn run_list(limit: i64, json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let events = activity_repo::recent_events(&conn, &firm_id, limit)?;

    if json_output {
        let events_json: Vec<_> = events
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "message": e.message,
                    "actor": e.actor,
                    "project_id": e.project_id,
                    "task_id": e.task_id,
                    "created_at": e.created_at
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({ "events": events_json })))
                .unwrap()
        );
    } else if events.is_empty() {
        println!("No activity recorded.");
    } else {
        for e in &events {
            println!("  [{}] {} ({})", e.created_at, e.message, e.actor);
        }
    }
    Ok(0)
}
