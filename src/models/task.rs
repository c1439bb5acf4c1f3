use serde::{Deserialize, Serialize};

/// A concrete work item. `project_id` is nullable: independent tasks exist
/// outside any project and are excluded from stage cascading. The status is
/// a single tagged reference (`stage_id`) into the project work type's
/// stage ladder; there is no parallel free-text status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub firm_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub stage_id: Option<String>,
    pub assignee: Option<String>,
    pub priority: i64,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<String>,
    /// Link back to the template task this row was generated from.
    /// Cascading only applies to tasks that carry an origin.
    pub template_task_origin_id: Option<String>,
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
    pub next_due_date: Option<String>,
    /// For generated instances, the recurring master that produced them.
    pub recurring_master_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}
