use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::DASHBOARD_FIELDS;
use crate::database::models::{Dashboard, NewDashboard};
use crate::database::partial_update::Patch;
use crate::database::repository::Repository;

#[derive(Clone)]
pub struct DashboardStore {
    repo: Repository<Dashboard>,
}

impl DashboardStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: Repository::new(&DASHBOARD_FIELDS, pool),
        }
    }

    pub async fn insert<'e, E>(executor: E, new: &NewDashboard) -> Result<Uuid, StoreError>
    where
        E: PgExecutor<'e>,
    {
        if new.name.trim().is_empty() {
            return Err(StoreError::validation(EntityKind::Dashboard, "name", "must not be empty"));
        }

        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO dashboards (name, description, creator_id, template_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.creator_id)
        .bind(new.template_id)
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Dashboard, Operation::Create, e))
    }

    pub async fn create(&self, new: &NewDashboard) -> Result<Uuid, StoreError> {
        let id = Self::insert(self.repo.pool(), new).await?;
        tracing::info!(%id, template_id = ?new.template_id, "dashboard created");
        Ok(id)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Dashboard, StoreError> {
        self.repo.select_404(id).await
    }

    pub async fn list(&self) -> Result<Vec<Dashboard>, StoreError> {
        sqlx::query_as::<_, Dashboard>(
            "SELECT * FROM dashboards ORDER BY COALESCE(updated_at, created_at) DESC, id",
        )
        .fetch_all(self.repo.pool())
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Dashboard, Operation::Select, e))
    }

    pub async fn list_by_template(&self, template_id: Uuid) -> Result<Vec<Dashboard>, StoreError> {
        sqlx::query_as::<_, Dashboard>(
            "SELECT * FROM dashboards WHERE template_id = $1 ORDER BY created_at, id",
        )
        .bind(template_id)
        .fetch_all(self.repo.pool())
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Dashboard, Operation::Select, e))
    }

    /// Public read through a share link. Only published dashboards resolve, and
    /// each resolution counts as a view.
    pub async fn get_by_share_id(&self, share_id: Uuid) -> Result<Option<Dashboard>, StoreError> {
        let dashboard = sqlx::query_as::<_, Dashboard>(
            r#"
            UPDATE dashboards
            SET view_count = view_count + 1, last_viewed_at = NOW()
            WHERE share_id = $1 AND is_published = TRUE
            RETURNING *
            "#,
        )
        .bind(share_id)
        .fetch_optional(self.repo.pool())
        .await
        .map_err(|e| StoreError::persistence(EntityKind::Dashboard, Operation::Update, e))?;

        if let Some(d) = &dashboard {
            tracing::debug!(id = %d.id, views = d.view_count, "dashboard viewed");
        }
        Ok(dashboard)
    }

    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        self.repo.update(id, patch).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        self.repo.delete(id).await
    }
}
