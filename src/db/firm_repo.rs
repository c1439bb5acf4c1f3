use rusqlite::{params, Connection};

use crate::error::FirmflowError;
use crate::models::{Client, Firm};

pub fn create_firm(conn: &Connection, id: &str, name: &str) -> Result<Firm, FirmflowError> {
    conn.execute(
        "INSERT INTO firms (id, name) VALUES (?1, ?2)",
        params![id, name],
    )?;
    get_firm_by_id(conn, id)
}

pub fn get_firm_by_id(conn: &Connection, id: &str) -> Result<Firm, FirmflowError> {
    conn.query_row(
        "SELECT id, name, created_at FROM firms WHERE id = ?1",
        params![id],
        row_to_firm,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::firm_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Resolve a firm reference: exact name, then id prefix.
pub fn resolve_firm(conn: &Connection, reference: &str) -> Result<Firm, FirmflowError> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM firms WHERE name = ?1")?;
    let mut rows = stmt.query(params![reference])?;
    if let Some(row) = rows.next()? {
        return Ok(row_to_firm(row)?);
    }

    let mut stmt = conn.prepare("SELECT id, name, created_at FROM firms WHERE id LIKE ?1")?;
    let prefix = format!("{reference}%");
    let firms: Vec<Firm> = stmt
        .query_map(params![prefix], row_to_firm)?
        .collect::<Result<Vec<_>, _>>()?;
    match firms.len() {
        0 => Err(FirmflowError::firm_not_found(reference)),
        1 => Ok(firms.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> =
                firms.iter().map(|f| format!("{} ({})", f.name, f.id)).collect();
            Err(FirmflowError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_firms(conn: &Connection) -> Result<Vec<Firm>, FirmflowError> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at FROM firms ORDER BY created_at ASC")?;
    let firms = stmt
        .query_map([], row_to_firm)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(firms)
}

pub fn create_client(
    conn: &Connection,
    id: &str,
    firm_id: &str,
    name: &str,
    active: bool,
) -> Result<Client, FirmflowError> {
    conn.execute(
        "INSERT INTO clients (id, firm_id, name, active) VALUES (?1, ?2, ?3, ?4)",
        params![id, firm_id, name, active as i64],
    )?;
    get_client_by_id(conn, id)
}

pub fn get_client_by_id(conn: &Connection, id: &str) -> Result<Client, FirmflowError> {
    conn.query_row(
        "SELECT id, firm_id, name, active, created_at FROM clients WHERE id = ?1",
        params![id],
        row_to_client,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => FirmflowError::client_not_found(id),
        _ => FirmflowError::from(e),
    })
}

/// Resolve a client within a firm: exact id, id prefix, then exact name.
pub fn resolve_client(
    conn: &Connection,
    firm_id: &str,
    reference: &str,
) -> Result<Client, FirmflowError> {
    if let Ok(client) = get_client_by_id(conn, reference) {
        if client.firm_id == firm_id {
            return Ok(client);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, firm_id, name, active, created_at FROM clients
         WHERE firm_id = ?1 AND (id LIKE ?2 OR name = ?3)",
    )?;
    let prefix = format!("{reference}%");
    let clients: Vec<Client> = stmt
        .query_map(params![firm_id, prefix, reference], row_to_client)?
        .collect::<Result<Vec<_>, _>>()?;
    match clients.len() {
        0 => Err(FirmflowError::client_not_found(reference)),
        1 => Ok(clients.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> =
                clients.iter().map(|c| format!("{} ({})", c.name, c.id)).collect();
            Err(FirmflowError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_clients(conn: &Connection, firm_id: &str) -> Result<Vec<Client>, FirmflowError> {
    let mut stmt = conn.prepare(
        "SELECT id, firm_id, name, active, created_at FROM clients
         WHERE firm_id = ?1 ORDER BY name ASC",
    )?;
    let clients = stmt
        .query_map(params![firm_id], row_to_client)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(clients)
}

fn row_to_firm(row: &rusqlite::Row) -> rusqlite::Result<Firm> {
    Ok(Firm {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn row_to_client(row: &rusqlite::Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        firm_id: row.get(1)?,
        name: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}
