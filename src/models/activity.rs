use serde::{Deserialize, Serialize};

/// One activity-log line. Written after a mutation commits; never part of
/// the mutating transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub firm_id: String,
    pub message: String,
    pub actor: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub created_at: String,
}
