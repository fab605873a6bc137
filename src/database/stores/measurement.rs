use serde_json::Value;
use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::content::prepare_content;
use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::MEASUREMENT_FIELDS;
use crate::database::models::{Measurement, NewMeasurement};
use crate::database::partial_update::Patch;
use crate::database::repository::Repository;

#[derive(Clone)]
pub struct MeasurementStore {
    repo: Repository<Measurement>,
    content_limit: usize,
}

impl MeasurementStore {
    pub fn new(pool: PgPool, content_limit: usize) -> Self {
        Self {
            repo: Repository::new(&MEASUREMENT_FIELDS, pool),
            content_limit,
        }
    }

    /// Insert already-encoded content; see `prepare_content`
    pub async fn insert<'e, E>(
        executor: E,
        chart_id: Uuid,
        content: &Value,
        position: Option<i32>,
    ) -> Result<Uuid, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO measurements (chart_id, content, position)
            VALUES ($1, $2, COALESCE($3, (SELECT COALESCE(MAX(position) + 1, 0) FROM measurements WHERE chart_id = $1)))
            RETURNING id
            "#,
        )
        .bind(chart_id)
        .bind(content)
        .bind(position)
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Measurement, Operation::Create, e))
    }

    pub async fn create(&self, chart_id: Uuid, new: &NewMeasurement) -> Result<Uuid, StoreError> {
        let content = self.encode(&new.content)?;
        let id = Self::insert(self.repo.pool(), chart_id, &content, None).await?;
        tracing::info!(%id, %chart_id, "measurement created");
        Ok(id)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Measurement, StoreError> {
        self.repo.select_404(id).await
    }

    pub async fn list_by_chart(&self, chart_id: Uuid) -> Result<Vec<Measurement>, StoreError> {
        self.repo.select_children("chart_id", chart_id).await
    }

    /// New content is checked against the configured size limit and stored in its encoded form
    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        let patch = match patch.iter().find(|(name, _)| name.as_str() == "content") {
            Some((_, raw)) if !raw.is_null() => patch.clone().set("content", self.encode(raw)?),
            _ => patch.clone(),
        };
        self.repo.update(id, &patch).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        self.repo.delete(id).await
    }

    fn encode(&self, raw: &Value) -> Result<Value, StoreError> {
        prepare_content(raw, self.content_limit)
            .map_err(|e| StoreError::validation(EntityKind::Measurement, "content", e.to_string()))
    }
}
