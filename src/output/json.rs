use serde_json::{json, Value};

use crate::engine::{CascadeSummary, SweepOutcome};
use crate::error::FirmflowError;
use crate::models::{Client, Firm, Project, Stage, Task, Template};

pub fn success(data: Value) -> Value {
    json!({
        "success": true,
        "data": data
    })
}

pub fn error(err: &FirmflowError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code.as_str(),
            "message": err.message
        }
    })
}

pub fn firm_json(f: &Firm) -> Value {
    json!({
        "id": f.id,
        "name": f.name,
        "created_at": f.created_at
    })
}

pub fn client_json(c: &Client) -> Value {
    json!({
        "id": c.id,
        "name": c.name,
        "active": c.active
    })
}

pub fn template_json(t: &Template) -> Value {
    json!({
        "id": t.id,
        "name": t.name,
        "task_dependency_mode": t.task_dependency_mode,
        "work_type_id": t.work_type_id,
        "created_at": t.created_at
    })
}

pub fn stage_json(s: &Stage) -> Value {
    json!({
        "id": s.id,
        "name": s.name,
        "position": s.position,
        "is_default": s.is_default,
        "is_terminal": s.is_terminal
    })
}

pub fn project_json(p: &Project) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "client_id": p.client_id,
        "work_type_id": p.work_type_id,
        "start_date": p.start_date,
        "due_date": p.due_date,
        "task_dependency_mode": p.task_dependency_mode,
        "current_stage_id": p.current_stage_id
    })
}

pub fn task_summary(t: &Task) -> Value {
    let mut v = json!({
        "id": t.id,
        "title": t.title,
        "stage_id": t.stage_id,
        "due_date": t.due_date,
        "priority": t.priority
    });
    if t.is_recurring {
        v["is_recurring"] = json!(true);
        v["recurrence_rule"] = json!(t.recurrence_rule);
        v["next_due_date"] = json!(t.next_due_date);
    }
    if let Some(ref master) = t.recurring_master_id {
        v["recurring_master_id"] = json!(master);
    }
    if let Some(ref assignee) = t.assignee {
        v["assignee"] = json!(assignee);
    }
    if let Some(ref completed) = t.completed_at {
        v["completed_at"] = json!(completed);
    }
    v
}

pub fn task_detail(t: &Task) -> Value {
    json!({
        "id": t.id,
        "project_id": t.project_id,
        "title": t.title,
        "description": t.description,
        "stage_id": t.stage_id,
        "assignee": t.assignee,
        "priority": t.priority,
        "estimated_hours": t.estimated_hours,
        "due_date": t.due_date,
        "template_task_origin_id": t.template_task_origin_id,
        "is_recurring": t.is_recurring,
        "recurrence_rule": t.recurrence_rule,
        "next_due_date": t.next_due_date,
        "recurring_master_id": t.recurring_master_id,
        "created_at": t.created_at,
        "updated_at": t.updated_at,
        "completed_at": t.completed_at
    })
}

pub fn cascade_json(summary: &CascadeSummary) -> Value {
    json!({
        "task_id": summary.task_id,
        "completed": summary.completed,
        "reset": summary.reset,
        "column": summary.column.label()
    })
}

pub fn sweep_json(outcome: &SweepOutcome) -> Value {
    json!({
        "masters_checked": outcome.masters_checked,
        "instances_created": outcome.instances_created,
        "failures": outcome.failures
    })
}
