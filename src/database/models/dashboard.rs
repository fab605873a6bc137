use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Read-only view published from a template
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub share_id: Uuid,
    pub creator_id: Uuid,
    pub template_id: Option<Uuid>,
    pub view_count: i32,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDashboard {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
}
