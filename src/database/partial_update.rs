//! Sparse UPDATE construction shared by every entity store.
//!
//! A `Patch` holds only the attributes the caller actually sent: an absent key
//! leaves the column alone, an explicit `null` clears a nullable column. The
//! builder resolves every key through the entity's `FieldSet`, checks the value
//! against the column kind, and produces one statement whose SQL text contains
//! nothing but whitelisted identifiers and positional placeholders.
//!
//! An empty patch is not skipped: it still issues an UPDATE that only refreshes
//! `updated_at`, so callers get the same found/not-found answer for every patch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgExecutor};
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

use super::error::{Affected, Operation, StoreError};
use super::field_set::{ColumnKind, Field, FieldSet};

/// Strictly increasing modification timestamp, even for two updates inside one clock tick
const TOUCH_UPDATED_AT: &str =
    "\"updated_at\" = GREATEST(clock_timestamp(), COALESCE(\"updated_at\", \"created_at\") + INTERVAL '1 microsecond')";

/// Attributes supplied by a caller, keyed by caller-facing name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Patch {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A value ready for positional binding
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(Option<String>),
    Bool(bool),
    Uuid(Option<Uuid>),
    Json(Option<Value>),
}

impl BindValue {
    fn bind<'q>(self, q: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            BindValue::Text(v) => q.bind(v),
            BindValue::Bool(v) => q.bind(v),
            BindValue::Uuid(v) => q.bind(v),
            BindValue::Json(v) => q.bind(v),
        }
    }
}

/// Generated statement and its parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub sql: String,
    pub params: Vec<BindValue>,
    pub id: Uuid,
}

#[derive(Debug)]
pub struct PartialUpdate {
    fields: &'static FieldSet,
    id: Uuid,
    assignments: Vec<(&'static Field, BindValue)>,
}

impl PartialUpdate {
    pub fn new(fields: &'static FieldSet, id: Uuid) -> Self {
        Self { fields, id, assignments: Vec::new() }
    }

    /// Resolve a whole patch; the first offending attribute rejects the update
    pub fn from_patch(fields: &'static FieldSet, id: Uuid, patch: &Patch) -> Result<Self, StoreError> {
        patch
            .iter()
            .try_fold(Self::new(fields, id), |update, (name, value)| update.set(name, value))
    }

    /// Add one attribute. Setting the same attribute twice keeps the last value.
    pub fn set(mut self, name: &str, value: &Value) -> Result<Self, StoreError> {
        let entity = self.fields.entity;
        let field = self.fields.get(name).ok_or_else(|| {
            StoreError::validation(
                entity,
                name,
                format!(
                    "not an updatable attribute (allowed: {})",
                    self.fields.names().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;

        let bound = convert(field, value).map_err(|msg| StoreError::validation(entity, name, msg))?;

        self.assignments.retain(|(f, _)| f.name != field.name);
        self.assignments.push((field, bound));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Build the statement. Assignments follow `FieldSet` order so equal patches give equal SQL.
    pub fn to_statement(&self) -> UpdateStatement {
        let mut ordered: Vec<&(&'static Field, BindValue)> = self.assignments.iter().collect();
        ordered.sort_by_key(|(field, _)| {
            self.fields
                .fields
                .iter()
                .position(|f| f.name == field.name)
                .unwrap_or(usize::MAX)
        });

        let mut set_clauses = Vec::with_capacity(ordered.len() + 1);
        let mut params = Vec::with_capacity(ordered.len());
        for (i, (field, value)) in ordered.into_iter().enumerate() {
            set_clauses.push(format!("\"{}\" = ${}", field.column, i + 1));
            params.push(value.clone());
        }
        set_clauses.push(TOUCH_UPDATED_AT.to_string());

        let mut sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ${}",
            self.fields.table,
            set_clauses.join(", "),
            params.len() + 1
        );
        if let Some(guard) = self.fields.guard {
            sql.push_str(" AND ");
            sql.push_str(guard);
        }

        UpdateStatement { sql, params, id: self.id }
    }

    /// Run the statement and report how many rows it touched
    pub async fn execute<'e, E>(self, executor: E) -> Result<Affected, StoreError>
    where
        E: PgExecutor<'e>,
    {
        let entity = self.fields.entity;
        let statement = self.to_statement();

        if self.is_empty() {
            tracing::debug!(%entity, id = %self.id, "empty patch, refreshing updated_at only");
        } else {
            tracing::debug!(
                %entity,
                id = %self.id,
                fields = ?self.assignments.iter().map(|(f, _)| f.name).collect::<Vec<_>>(),
                "applying partial update"
            );
        }

        let mut q = sqlx::query(&statement.sql);
        for value in statement.params.iter().cloned() {
            q = value.bind(q);
        }
        q = q.bind(statement.id);

        let result = q.execute(executor).await.map_err(|e| {
            tracing::error!(%entity, id = %self.id, "partial update failed: {}", e);
            StoreError::persistence(entity, Operation::Update, e).with_id(self.id)
        })?;

        Ok(Affected(result.rows_affected()))
    }
}

fn convert(field: &Field, value: &Value) -> Result<BindValue, String> {
    if value.is_null() {
        if !field.nullable {
            return Err("cannot be null".to_string());
        }
        return Ok(match field.kind {
            ColumnKind::Text => BindValue::Text(None),
            ColumnKind::Uuid => BindValue::Uuid(None),
            ColumnKind::Json => BindValue::Json(None),
            ColumnKind::Bool => return Err("cannot be null".to_string()),
        });
    }

    if let Some(check) = field.validator {
        check(value)?;
    }

    match field.kind {
        ColumnKind::Text => value
            .as_str()
            .map(|s| BindValue::Text(Some(s.to_string())))
            .ok_or_else(|| "expected a string".to_string()),
        ColumnKind::Bool => value
            .as_bool()
            .map(BindValue::Bool)
            .ok_or_else(|| "expected a boolean".to_string()),
        ColumnKind::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|id| BindValue::Uuid(Some(id)))
            .ok_or_else(|| "expected a UUID string".to_string()),
        ColumnKind::Json => Ok(BindValue::Json(Some(value.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::field_set::{CANVAS_FIELDS, CHART_FIELDS, DASHBOARD_FIELDS, MEASUREMENT_FIELDS, TEMPLATE_FIELDS};
    use serde_json::json;

    fn id() -> Uuid {
        Uuid::parse_str("6f1c2b1e-0000-4000-8000-000000000001").unwrap()
    }

    #[test]
    fn only_supplied_columns_are_assigned() {
        let patch = Patch::new().set("name", "Quarterly");
        let stmt = PartialUpdate::from_patch(&CANVAS_FIELDS, id(), &patch).unwrap().to_statement();

        assert_eq!(
            stmt.sql,
            format!("UPDATE \"canvases\" SET \"name\" = $1, {} WHERE \"id\" = $2", TOUCH_UPDATED_AT)
        );
        assert_eq!(stmt.params, vec![BindValue::Text(Some("Quarterly".into()))]);
        assert!(!stmt.sql.contains("description"));
    }

    #[test]
    fn assignment_order_follows_field_set() {
        let patch: Patch = serde_json::from_value(json!({
            "isDeleted": false,
            "description": "d",
            "name": "n"
        }))
        .unwrap();
        let stmt = PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &patch).unwrap().to_statement();

        assert!(stmt.sql.starts_with(
            "UPDATE \"templates\" SET \"name\" = $1, \"description\" = $2, \"is_deleted\" = $3, "
        ));
        assert!(stmt.sql.ends_with("WHERE \"id\" = $4 AND \"is_deleted\" = FALSE"));
        assert_eq!(
            stmt.params,
            vec![
                BindValue::Text(Some("n".into())),
                BindValue::Text(Some("d".into())),
                BindValue::Bool(false),
            ]
        );
    }

    #[test]
    fn empty_patch_only_refreshes_timestamp() {
        let update = PartialUpdate::from_patch(&CHART_FIELDS, id(), &Patch::new()).unwrap();
        assert!(update.is_empty());
        let stmt = update.to_statement();
        assert_eq!(
            stmt.sql,
            format!("UPDATE \"charts\" SET {} WHERE \"id\" = $1", TOUCH_UPDATED_AT)
        );
        assert!(stmt.params.is_empty());
        assert_eq!(stmt.id, id());
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let patch = Patch::new().set("type", "pie");
        let err = PartialUpdate::from_patch(&CHART_FIELDS, id(), &patch).unwrap_err();
        match err {
            StoreError::Validation { path, message, .. } => {
                assert_eq!(path, "type");
                assert!(message.contains("name, measurements"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn column_names_are_not_accepted_as_attribute_names() {
        let patch = Patch::new().set("name\" = 'x'; --", "y");
        assert!(PartialUpdate::from_patch(&CANVAS_FIELDS, id(), &patch).is_err());
        let patch = Patch::new().set("is_deleted", true);
        assert!(PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &patch).is_err());
    }

    #[test]
    fn explicit_null_differs_from_absent() {
        let patch = Patch::new().set("description", Value::Null);
        let stmt = PartialUpdate::from_patch(&CANVAS_FIELDS, id(), &patch).unwrap().to_statement();
        assert!(stmt.sql.contains("\"description\" = $1"));
        assert_eq!(stmt.params, vec![BindValue::Text(None)]);
    }

    #[test]
    fn null_is_rejected_for_required_columns() {
        let patch = Patch::new().set("name", Value::Null);
        assert!(PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &patch).is_err());
        let patch = Patch::new().set("isPublished", Value::Null);
        assert!(PartialUpdate::from_patch(&DASHBOARD_FIELDS, id(), &patch).is_err());
    }

    #[test]
    fn values_are_type_checked() {
        assert!(PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &Patch::new().set("name", 5)).is_err());
        assert!(PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &Patch::new().set("isDeleted", "yes")).is_err());
        assert!(PartialUpdate::from_patch(&DASHBOARD_FIELDS, id(), &Patch::new().set("templateId", "nope")).is_err());

        let template_id = Uuid::new_v4();
        let patch = Patch::new().set("templateId", template_id.to_string());
        let stmt = PartialUpdate::from_patch(&DASHBOARD_FIELDS, id(), &patch).unwrap().to_statement();
        assert_eq!(stmt.params, vec![BindValue::Uuid(Some(template_id))]);
    }

    #[test]
    fn measurement_content_runs_the_schema_check() {
        let bad = Patch::new().set("content", json!({ "series": [] }));
        let err = PartialUpdate::from_patch(&MEASUREMENT_FIELDS, id(), &bad).unwrap_err();
        assert!(err.to_string().contains("connection"));

        let good = Patch::new().set("content", json!({ "connection": { "driver": "pg" } }));
        let stmt = PartialUpdate::from_patch(&MEASUREMENT_FIELDS, id(), &good).unwrap().to_statement();
        assert_eq!(stmt.params, vec![BindValue::Json(Some(json!({ "connection": { "driver": "pg" } })))]);
    }

    #[test]
    fn hostile_values_never_reach_sql_text() {
        let hostile = "Robert'); DROP TABLE templates;--";
        let patch = Patch::new().set("name", hostile).set("description", hostile);
        let stmt = PartialUpdate::from_patch(&TEMPLATE_FIELDS, id(), &patch).unwrap().to_statement();

        assert!(!stmt.sql.contains("Robert"));
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params[0], BindValue::Text(Some(hostile.to_string())));
    }

    #[test]
    fn repeated_attribute_keeps_last_value() {
        let update = PartialUpdate::new(&CANVAS_FIELDS, id())
            .set("name", &json!("first"))
            .unwrap()
            .set("name", &json!("second"))
            .unwrap();
        let stmt = update.to_statement();
        assert_eq!(stmt.params, vec![BindValue::Text(Some("second".into()))]);
        assert_eq!(stmt.sql.matches("\"name\"").count(), 1);
    }
}
