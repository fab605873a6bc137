use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::manager::DatabaseManager;

pub async fn handle(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    // connect() already performs a round trip
    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::close(&pool).await;

    output_success(
        output_format,
        "Database reachable",
        Some(json!({ "environment": config.environment })),
    )
}
