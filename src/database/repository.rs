use sqlx::{self, postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::{Affected, EntityKind, Operation, StoreError};
use crate::database::field_set::FieldSet;
use crate::database::partial_update::{PartialUpdate, Patch};

/// Single-table access shared by the entity stores.
///
/// `table` always comes from a `FieldSet`; it is never caller input.
pub struct Repository<T> {
    fields: &'static FieldSet,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields,
            pool: self.pool.clone(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(fields: &'static FieldSet, pool: PgPool) -> Self {
        Self {
            fields,
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn entity(&self) -> EntityKind {
        self.fields.entity
    }

    pub async fn select_one(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let query = format!("SELECT * FROM \"{}\" WHERE \"id\" = $1", self.fields.table);
        sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::persistence(self.entity(), Operation::Select, e).with_id(id))
    }

    pub async fn select_404(&self, id: Uuid) -> Result<T, StoreError> {
        self.select_one(id).await?.ok_or(StoreError::NotFound {
            entity: self.entity(),
            id,
        })
    }

    /// Children of one parent in display order
    pub async fn select_children(&self, parent_column: &'static str, parent_id: Uuid) -> Result<Vec<T>, StoreError> {
        let query = format!(
            "SELECT * FROM \"{}\" WHERE \"{}\" = $1 ORDER BY \"position\", \"created_at\", \"id\"",
            self.fields.table, parent_column
        );
        sqlx::query_as::<_, T>(&query)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| children_error(self.entity(), parent_id, e))
    }

    pub async fn update(&self, id: Uuid, patch: &Patch) -> Result<Affected, StoreError> {
        PartialUpdate::from_patch(self.fields, id, patch)?
            .execute(&self.pool)
            .await
    }

    /// Physical single-row delete
    pub async fn delete(&self, id: Uuid) -> Result<Affected, StoreError> {
        let query = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", self.fields.table);
        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::persistence(self.entity(), Operation::Delete, e).with_id(id))?;

        let affected = Affected(result.rows_affected());
        if affected.is_not_found() {
            tracing::warn!(entity = %self.entity(), %id, "nothing to delete");
        } else {
            tracing::info!(entity = %self.entity(), %id, "deleted");
        }
        Ok(affected)
    }
}

/// Listing failures are tagged with the parent id, not a tree path
fn children_error(entity: EntityKind, parent_id: Uuid, source: sqlx::Error) -> StoreError {
    StoreError::persistence(entity, Operation::Select, source).with_id(parent_id)
}
