use serde_json::Value;
use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::TEMPLATE_FIELDS;
use crate::database::models::{NewTemplate, Template};
use crate::database::partial_update::{PartialUpdate, Patch};
use crate::database::repository::Repository;

const SELECT_TEMPLATE: &str = r#"
    SELECT t.id, t.name, t.description, t.is_deleted, t.creator_id,
           (SELECT COUNT(*) FROM dashboards d WHERE d.template_id = t.id) AS usage_count,
           t.updated_at, t.created_at
    FROM templates t
    WHERE t.is_deleted = FALSE
"#;

#[derive(Clone)]
pub struct TemplateStore {
    repo: Repository<Template>,
}

impl TemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: Repository::new(&TEMPLATE_FIELDS, pool),
        }
    }

    /// Insert one template row and return its generated id
    pub async fn insert<'e, E>(executor: E, new: &NewTemplate) -> Result<Uuid, StoreError>
    where
        E: PgExecutor<'e>,
    {
        if new.name.trim().is_empty() {
            return Err(StoreError::validation(EntityKind::Template, "name", "must not be empty"));
        }

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO templates (name, description, creator_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.creator_id)
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Template, Operation::Create, e))
    }

    pub async fn create(&self, new: &NewTemplate) -> Result<Uuid, StoreError> {
        let id = Self::insert(self.repo.pool(), new).await?;
        tracing::info!(%id, "template created");
        Ok(id)
    }

    /// Soft-deleted templates read as not found
    pub async fn get_by_id(&self, id: Uuid) -> Result<Template, StoreError> {
        let query = format!("{} AND t.id = $1", SELECT_TEMPLATE);
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .fetch_optional(self.repo.pool())
            .await
            .map_err(|e| StoreError::persistence(EntityKind::Template, Operation::Select, e).with_id(id))?
            .ok_or(StoreError::NotFound {
                entity: EntityKind::Template,
                id,
            })
    }

    /// Live templates, most recently modified first
    pub async fn list(&self) -> Result<Vec<Template>, StoreError> {
        let query = format!(
            "{} ORDER BY COALESCE(t.updated_at, t.created_at) DESC, t.id",
            SELECT_TEMPLATE
        );
        sqlx::query_as::<_, Template>(&query)
            .fetch_all(self.repo.pool())
            .await
            .map_err(|e| StoreError::persistence(EntityKind::Template, Operation::Select, e))
    }

    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        self.repo.update(id, patch).await
    }

    /// Soft delete: the row stays, flagged and hidden from reads
    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        let affected = PartialUpdate::new(&TEMPLATE_FIELDS, id)
            .set("isDeleted", &Value::Bool(true))?
            .execute(self.repo.pool())
            .await?;
        if !affected.is_not_found() {
            tracing::info!(%id, "template soft-deleted");
        }
        Ok(affected)
    }
}
