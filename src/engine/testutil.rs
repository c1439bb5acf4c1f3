use rusqlite::Connection;

use crate::db::{firm_repo, template_repo};
use crate::models::TemplateTask;

pub struct Fixture {
    pub firm_id: String,
    pub client_id: String,
    pub template_id: String,
}

fn blank_task(template_id: &str, position: i64, title: &str) -> TemplateTask {
    TemplateTask {
        id: ulid::Ulid::new().to_string(),
        template_id: template_id.to_string(),
        position,
        title: title.to_string(),
        description: None,
        days_from_start: None,
        recurrence_rule: None,
        default_stage_id: None,
        assignee: None,
        priority: 0,
        estimated_hours: None,
    }
}

/// "Tax Return" template: three ordered tasks with day offsets 0/5/10,
/// chained dependencies, dependency mode on.
pub fn tax_return_fixture(conn: &Connection) -> Fixture {
    let firm = firm_repo::create_firm(conn, &ulid::Ulid::new().to_string(), "acme-cpa").unwrap();
    let client = firm_repo::create_client(
        conn,
        &ulid::Ulid::new().to_string(),
        &firm.id,
        "globex",
        true,
    )
    .unwrap();
    let template = template_repo::create_template(
        conn,
        &ulid::Ulid::new().to_string(),
        &firm.id,
        "tax-return",
        true,
    )
    .unwrap();

    let mut ids = Vec::new();
    for (i, (title, days)) in [("Collect Docs", 0), ("Prepare", 5), ("Review", 10)]
        .iter()
        .enumerate()
    {
        let mut task = blank_task(&template.id, i as i64 + 1, title);
        task.days_from_start = Some(*days);
        template_repo::insert_template_task(conn, &task).unwrap();
        ids.push(task.id);
    }
    template_repo::add_template_dependency(conn, &ids[1], &ids[0]).unwrap();
    template_repo::add_template_dependency(conn, &ids[2], &ids[1]).unwrap();

    Fixture {
        firm_id: firm.id,
        client_id: client.id,
        template_id: template.id,
    }
}

/// Template with one plain task and one monthly recurring task,
/// dependency mode off.
pub fn bookkeeping_fixture(conn: &Connection) -> Fixture {
    let firm = firm_repo::create_firm(conn, &ulid::Ulid::new().to_string(), "ledger-co").unwrap();
    let client = firm_repo::create_client(
        conn,
        &ulid::Ulid::new().to_string(),
        &firm.id,
        "initech",
        true,
    )
    .unwrap();
    let template = template_repo::create_template(
        conn,
        &ulid::Ulid::new().to_string(),
        &firm.id,
        "bookkeeping",
        false,
    )
    .unwrap();

    let mut setup = blank_task(&template.id, 1, "Onboard Ledger");
    setup.days_from_start = Some(0);
    template_repo::insert_template_task(conn, &setup).unwrap();

    let mut close = blank_task(&template.id, 2, "Monthly Close");
    close.recurrence_rule = Some("monthly:last_day".to_string());
    close.assignee = Some("jordan".to_string());
    close.estimated_hours = Some(4.0);
    template_repo::insert_template_task(conn, &close).unwrap();

    Fixture {
        firm_id: firm.id,
        client_id: client.id,
        template_id: template.id,
    }
}
