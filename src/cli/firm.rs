use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::FirmCommands;
use crate::db::{connection, firm_repo};
use crate::error::FirmflowError;
use crate::output;

pub fn run(cmd: FirmCommands, json_output: bool) -> i32 {
    let result = match cmd {
        FirmCommands::Create { name } => run_create(&name, json_output),
        FirmCommands::List => run_list(json_output),
        FirmCommands::Use { name } => run_use(&name, json_output),
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

fn run_create(name: &str, json_output: bool) -> Result<i32, FirmflowError> {
    validate_name(name)?;
    let conn = connection::open_db()?;
    let id = ulid::Ulid::new().to_string();
    let firm = firm_repo::create_firm(&conn, &id, name)?;

    // first firm becomes active automatically
    if get_active_firm_id().is_none() {
        write_active_firm(&firm.id)?;
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(output::json::firm_json(&firm)))
                .unwrap()
        );
    } else {
        println!("Created firm: {} ({})", firm.name, firm.id);
    }
    Ok(0)
}

fn run_list(json_output: bool) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firms = firm_repo::list_firms(&conn)?;
    let active = get_active_firm_id();

    if json_output {
        let firms_json: Vec<_> = firms
            .iter()
            .map(|f| {
                let mut v = output::json::firm_json(f);
                if Some(&f.id) == active.as_ref() {
                    v["active"] = json!(true);
                }
                v
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({ "firms": firms_json })))
                .unwrap()
        );
    } else {
        output::text::print_firm_list(&firms, active.as_deref());
    }
    Ok(0)
}

fn run_use(name: &str, json_output: bool) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm = firm_repo::resolve_firm(&conn, name)?;
    write_active_firm(&firm.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "activated": { "id": firm.id, "name": firm.name }
            })))
            .unwrap()
        );
    } else {
        println!("Active firm: {} ({})", firm.name, firm.id);
    }
    Ok(0)
}

fn validate_name(name: &str) -> Result<(), FirmflowError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if !ok {
        return Err(FirmflowError::validation(
            "Firm name must be a slug: lowercase alphanumeric with inner hyphens",
        ));
    }
    Ok(())
}

fn write_active_firm(firm_id: &str) -> Result<(), FirmflowError> {
    let config_path = connection::config_path()?;
    let config = json!({ "active_firm_id": firm_id });
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FirmflowError::database(e.to_string()))?;
    }
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap())
        .map_err(|e| FirmflowError::database(e.to_string()))
}

pub fn get_active_firm_id() -> Option<String> {
    let config_path = connection::config_path().ok()?;
    let content = std::fs::read_to_string(config_path).ok()?;
    let config: serde_json::Value = serde_json::from_str(&content).ok()?;
    config["active_firm_id"].as_str().map(|s| s.to_string())
}

/// Firm id for a command: the --firm flag when given, otherwise the active
/// firm from config. The firm must still exist.
pub fn resolve_firm_id(
    conn: &Connection,
    firm_flag: Option<&str>,
) -> Result<String, FirmflowError> {
    if let Some(reference) = firm_flag {
        let firm = firm_repo::resolve_firm(conn, reference)?;
        return Ok(firm.id);
    }
    let id = get_active_firm_id().ok_or_else(FirmflowError::no_active_firm)?;
    firm_repo::get_firm_by_id(conn, &id)?;
    Ok(id)
}
