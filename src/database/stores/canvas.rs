use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::CANVAS_FIELDS;
use crate::database::models::{Canvas, NewCanvas};
use crate::database::partial_update::Patch;
use crate::database::repository::Repository;

#[derive(Clone)]
pub struct CanvasStore {
    repo: Repository<Canvas>,
}

impl CanvasStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: Repository::new(&CANVAS_FIELDS, pool),
        }
    }

    /// Insert under `template_id`. Without an explicit position the canvas goes last.
    pub async fn insert<'e, E>(
        executor: E,
        template_id: Uuid,
        new: &NewCanvas,
        position: Option<i32>,
    ) -> Result<Uuid, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO canvases (template_id, name, description, position)
            VALUES ($1, $2, $3, COALESCE($4, (SELECT COALESCE(MAX(position) + 1, 0) FROM canvases WHERE template_id = $1)))
            RETURNING id
            "#,
        )
        .bind(template_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(position)
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Canvas, Operation::Create, e))
    }

    pub async fn create(&self, template_id: Uuid, new: &NewCanvas) -> Result<Uuid, StoreError> {
        let id = Self::insert(self.repo.pool(), template_id, new, None).await?;
        tracing::info!(%id, %template_id, "canvas created");
        Ok(id)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Canvas, StoreError> {
        self.repo.select_404(id).await
    }

    pub async fn list_by_template(&self, template_id: Uuid) -> Result<Vec<Canvas>, StoreError> {
        self.repo.select_children("template_id", template_id).await
    }

    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        self.repo.update(id, patch).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        self.repo.delete(id).await
    }
}
