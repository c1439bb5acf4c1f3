use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub firm_id: String,
    pub work_type_id: String,
    pub client_id: String,
    pub template_id: Option<String>,
    pub name: String,
    pub start_date: String,
    pub due_date: Option<String>,
    /// When true, stage transitions cascade across the project's tasks.
    pub task_dependency_mode: bool,
    /// Coarse project-level stage, derived from the kanban column.
    pub current_stage_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Kanban column a project sits in: the position of the first stage whose
/// task is not terminal, or `Completed` when every template-origin task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "position")]
pub enum KanbanColumn {
    Stage(i64),
    Completed,
}

impl KanbanColumn {
    pub fn label(&self) -> String {
        match self {
            Self::Stage(p) => p.to_string(),
            Self::Completed => "completed".to_string(),
        }
    }
}
