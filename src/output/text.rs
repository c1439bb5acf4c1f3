use crate::engine::{CascadeSummary, SweepOutcome};
use crate::models::{Client, Firm, Project, Stage, Task, Template};

fn short(id: &str) -> &str {
    &id[..std::cmp::min(8, id.len())]
}

pub fn print_firm_list(firms: &[Firm], active_id: Option<&str>) {
    if firms.is_empty() {
        println!("No firms found.");
        return;
    }
    for f in firms {
        let marker = if Some(f.id.as_str()) == active_id { " *" } else { "" };
        println!("  {} ({}){marker}", f.name, short(&f.id));
    }
}

pub fn print_client_list(clients: &[Client]) {
    if clients.is_empty() {
        println!("No clients found.");
        return;
    }
    for c in clients {
        let state = if c.active { "active" } else { "inactive" };
        println!("  {} ({}) [{state}]", c.name, short(&c.id));
    }
}

pub fn print_template(t: &Template, stages: &[Stage]) {
    println!("Template: {} ({})", t.name, t.id);
    println!("  Dependency mode: {}", t.task_dependency_mode);
    match &t.work_type_id {
        Some(id) => println!("  Work type: {id}"),
        None => println!("  Work type: (not compiled)"),
    }
    if !stages.is_empty() {
        println!("  Stages:");
        for s in stages {
            let mut flags = Vec::new();
            if s.is_default {
                flags.push("default");
            }
            if s.is_terminal {
                flags.push("terminal");
            }
            let suffix = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("    {}. {}{suffix}", s.position, s.name);
        }
    }
}

pub fn print_template_list(templates: &[Template]) {
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }
    for t in templates {
        let compiled = if t.work_type_id.is_some() { "compiled" } else { "draft" };
        println!("  {} ({}) [{compiled}]", t.name, short(&t.id));
    }
}

pub fn print_project(p: &Project) {
    println!("Project: {} ({})", p.name, p.id);
    println!("  Start: {}", p.start_date);
    if let Some(ref due) = p.due_date {
        println!("  Due: {due}");
    }
    println!("  Dependency mode: {}", p.task_dependency_mode);
}

pub fn print_project_list(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    for p in projects {
        println!("  {} ({}) start={}", p.name, short(&p.id), p.start_date);
    }
}

pub fn print_task_list(tasks: &[Task], stages: &[Stage]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for t in tasks {
        let stage_name = t
            .stage_id
            .as_deref()
            .and_then(|id| stages.iter().find(|s| s.id == id))
            .map(|s| s.name.as_str())
            .unwrap_or("-");
        let due = t.due_date.as_deref().unwrap_or("-");
        let recurring = if t.is_recurring { " (recurring)" } else { "" };
        println!("  [{stage_name}] {} ({}) due={due}{recurring}", t.title, short(&t.id));
    }
}

pub fn print_task(t: &Task) {
    println!("Task: {} ({})", t.title, t.id);
    if let Some(ref desc) = t.description {
        println!("  Description: {desc}");
    }
    if let Some(ref due) = t.due_date {
        println!("  Due: {due}");
    }
    if let Some(ref assignee) = t.assignee {
        println!("  Assignee: {assignee}");
    }
    if t.is_recurring {
        println!(
            "  Recurring: {} (next due {})",
            t.recurrence_rule.as_deref().unwrap_or("-"),
            t.next_due_date.as_deref().unwrap_or("-")
        );
    }
    if let Some(ref completed) = t.completed_at {
        println!("  Completed: {completed}");
    }
}

pub fn print_cascade(summary: &CascadeSummary) {
    if !summary.completed.is_empty() {
        println!("Auto-completed:");
        for id in &summary.completed {
            println!("  {id}");
        }
    }
    if !summary.reset.is_empty() {
        println!("Reset to default:");
        for id in &summary.reset {
            println!("  {id}");
        }
    }
    println!("Column: {}", summary.column.label());
}

pub fn print_sweep(outcome: &SweepOutcome) {
    println!(
        "Sweep: {} master(s) checked, {} instance(s) created, {} failure(s)",
        outcome.masters_checked, outcome.instances_created, outcome.failures
    );
}
