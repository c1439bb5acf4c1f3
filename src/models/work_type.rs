use serde::{Deserialize, Serialize};

/// Firm-scoped workflow category. Owns an ordered stage ladder; stage
/// positions are contiguous 1..N with exactly one default (position 1)
/// and exactly one terminal (position N).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkType {
    pub id: String,
    pub firm_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub work_type_id: String,
    pub name: String,
    pub position: i64,
    pub is_default: bool,
    pub is_terminal: bool,
}
