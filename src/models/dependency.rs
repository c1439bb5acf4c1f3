use serde::{Deserialize, Serialize};

/// One "depends on" edge between two tasks of the same firm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on_id: String,
}
