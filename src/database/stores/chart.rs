use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::CHART_FIELDS;
use crate::database::models::{Chart, NewChart};
use crate::database::partial_update::Patch;
use crate::database::repository::Repository;

#[derive(Clone)]
pub struct ChartStore {
    repo: Repository<Chart>,
}

impl ChartStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: Repository::new(&CHART_FIELDS, pool),
        }
    }

    pub async fn insert<'e, E>(
        executor: E,
        canvas_id: Uuid,
        new: &NewChart,
        position: Option<i32>,
    ) -> Result<Uuid, StoreError>
    where
        E: PgExecutor<'e>,
    {
        if new.kind.trim().is_empty() {
            return Err(StoreError::validation(EntityKind::Chart, "type", "must not be empty"));
        }

        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO charts (canvas_id, type, name, position)
            VALUES ($1, $2, $3, COALESCE($4, (SELECT COALESCE(MAX(position) + 1, 0) FROM charts WHERE canvas_id = $1)))
            RETURNING id
            "#,
        )
        .bind(canvas_id)
        .bind(&new.kind)
        .bind(&new.name)
        .bind(position)
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Chart, Operation::Create, e))
    }

    pub async fn create(&self, canvas_id: Uuid, new: &NewChart) -> Result<Uuid, StoreError> {
        let id = Self::insert(self.repo.pool(), canvas_id, new, None).await?;
        tracing::info!(%id, %canvas_id, chart_type = %new.kind, "chart created");
        Ok(id)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Chart, StoreError> {
        self.repo.select_404(id).await
    }

    pub async fn list_by_canvas(&self, canvas_id: Uuid) -> Result<Vec<Chart>, StoreError> {
        self.repo.select_children("canvas_id", canvas_id).await
    }

    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        self.repo.update(id, patch).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        self.repo.delete(id).await
    }
}
