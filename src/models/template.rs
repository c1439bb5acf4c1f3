use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub firm_id: String,
    pub name: String,
    pub task_dependency_mode: bool,
    /// Set once the template has been compiled into a work type.
    pub work_type_id: Option<String>,
    pub created_at: String,
}

/// One blueprint task. `days_from_start` and `recurrence_rule` are mutually
/// exclusive; at most one drives the due-date computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTask {
    pub id: String,
    pub template_id: String,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub days_from_start: Option<i64>,
    pub recurrence_rule: Option<String>,
    pub default_stage_id: Option<String>,
    pub assignee: Option<String>,
    pub priority: i64,
    pub estimated_hours: Option<f64>,
}
