use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: Uuid,
    pub chart_id: Uuid,
    pub content: Value,
    pub position: i32,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Raw content as supplied; it is schema-checked before insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeasurement {
    pub content: Value,
}
