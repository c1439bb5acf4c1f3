use serde::{Deserialize, Serialize};

/// Tenant boundary. Every template, project and task belongs to one firm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firm {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub firm_id: String,
    pub name: String,
    pub active: bool,
    pub created_at: String,
}
