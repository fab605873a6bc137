#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use visualizer_api_rust::database::content::DEFAULT_MAX_CONTENT_BYTES;
use visualizer_api_rust::database::stores::Stores;
use visualizer_api_rust::services::{SaveTemplateRequest, TemplateWriter};

const SCHEMA: &str = include_str!("../../sql/schema.sql");
const FAULT_INJECTION: &str = include_str!("../fixtures/fault_injection.sql");

/// Serializes schema setup between concurrently running tests
const SETUP_LOCK: i64 = 0x7669_7375_616c;

/// Every test connection resolves unqualified names here, so tables and fault
/// triggers never land in the database's default schema.
pub const TEST_SCHEMA: &str = "visualizer_test";

/// Pool against `DATABASE_URL`, confined to `TEST_SCHEMA`, with the schema and
/// fault triggers installed. `None` when no database is configured; callers skip
/// in that case.
pub async fn test_pool() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();

    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping database test");
            return Ok(None);
        }
    };

    let options = PgConnectOptions::from_str(&url)
        .context("invalid DATABASE_URL")?
        .options([("search_path", TEST_SCHEMA)]);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to connect to DATABASE_URL")?;

    install_schema(&pool).await?;
    Ok(Some(pool))
}

async fn install_schema(pool: &PgPool) -> Result<()> {
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SETUP_LOCK)
        .execute(&mut *conn)
        .await?;

    let installed = async {
        (&mut *conn)
            .execute(format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", TEST_SCHEMA).as_str())
            .await?;
        (&mut *conn).execute(SCHEMA).await?;
        (&mut *conn).execute(FAULT_INJECTION).await?;
        Ok::<_, sqlx::Error>(())
    }
    .await;

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SETUP_LOCK)
        .execute(&mut *conn)
        .await?;

    installed.context("failed to install test schema")
}

pub fn writer(pool: &PgPool) -> TemplateWriter {
    TemplateWriter::new(pool.clone(), DEFAULT_MAX_CONTENT_BYTES)
}

pub fn stores(pool: &PgPool) -> Stores {
    Stores::new(pool.clone(), DEFAULT_MAX_CONTENT_BYTES)
}

/// Name that no other test run will produce
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub fn content(marker: &str) -> Value {
    json!({
        "connection": { "driver": "postgres", "query": marker },
        "series": [{ "label": marker }]
    })
}

/// Build a tree from a shape: one entry per canvas, one number per chart giving
/// its measurement count. Every measurement query is `marker`.
pub fn tree(name: &str, marker: &str, shape: &[&[usize]]) -> SaveTemplateRequest {
    let canvases: Vec<Value> = shape
        .iter()
        .enumerate()
        .map(|(i, charts)| {
            let charts: Vec<Value> = charts
                .iter()
                .enumerate()
                .map(|(j, n)| {
                    let measurements: Vec<Value> = (0..*n).map(|_| json!({ "content": content(marker) })).collect();
                    json!({ "type": "line", "name": format!("chart {}.{}", i, j), "measurements": measurements })
                })
                .collect();
            json!({ "name": format!("canvas {}", i), "charts": charts })
        })
        .collect();

    serde_json::from_value(json!({
        "name": name,
        "description": "integration test",
        "creatorId": Uuid::new_v4(),
        "canvases": canvases
    }))
    .expect("valid tree request")
}

/// Rows per level that carry `name` (templates) or `marker` (measurements)
pub async fn persisted(pool: &PgPool, name: &str, marker: &str) -> Result<(i64, i64, i64, i64)> {
    let row: (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM templates t WHERE t.name = $1),
            (SELECT COUNT(*) FROM canvases c JOIN templates t ON c.template_id = t.id WHERE t.name = $1),
            (SELECT COUNT(*) FROM charts ch JOIN canvases c ON ch.canvas_id = c.id
                JOIN templates t ON c.template_id = t.id WHERE t.name = $1),
            (SELECT COUNT(*) FROM measurements m WHERE m.content -> 'connection' ->> 'query' = $2)
        "#,
    )
    .bind(name)
    .bind(marker)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
