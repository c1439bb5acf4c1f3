use serde_json::json;

use crate::cli::commands::ClientCommands;
use crate::cli::firm::resolve_firm_id;
use crate::db::{connection, firm_repo};
use crate::error::FirmflowError;
use crate::output;

pub fn run(cmd: ClientCommands, json_output: bool, firm_flag: Option<&str>) -> i32 {
    let result = match cmd {
        ClientCommands::Add { name, inactive } => run_add(&name, !inactive, json_output, firm_flag),
        ClientCommands::List => run_list(json_output, firm_flag),
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

fn run_add(
    name: &str,
    active: bool,
    json_output: bool,
    firm_flag: Option<&str>,
) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let id = ulid::Ulid::new().to_string();
    let client = firm_repo::create_client(&conn, &id, &firm_id, name, active)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(output::json::client_json(&client)))
                .unwrap()
        );
    } else {
        println!("Added client: {} ({})", client.name, client.id);
    }
    Ok(0)
}

fn run_list(json_output: bool, firm_flag: Option<&str>) -> Result<i32, FirmflowError> {
    let conn = connection::open_db()?;
    let firm_id = resolve_firm_id(&conn, firm_flag)?;
    let clients = firm_repo::list_clients(&conn, &firm_id)?;

    if json_output {
        let clients_json: Vec<_> = clients.iter().map(output::json::client_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({ "clients": clients_json })))
                .unwrap()
        );
    } else {
        output::text::print_client_list(&clients);
    }
    Ok(0)
}
