//! Static per-entity whitelists of updatable attributes.
//!
//! A `FieldSet` maps the camelCase attribute names accepted from callers to the
//! snake_case columns they write. Column and table names only ever come from
//! these tables, never from request input.

use serde_json::Value;

use super::content::validate_content;
use super::error::EntityKind;

/// Storage type of an updatable column, which fixes how values are checked and bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Bool,
    Uuid,
    Json,
}

#[derive(Debug)]
pub struct Field {
    /// Attribute name as supplied by callers
    pub name: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    /// Extra check applied to the raw value before binding
    pub validator: Option<fn(&Value) -> Result<(), String>>,
}

impl Field {
    const fn new(name: &'static str, column: &'static str, kind: ColumnKind, nullable: bool) -> Self {
        Self { name, column, kind, nullable, validator: None }
    }
}

#[derive(Debug)]
pub struct FieldSet {
    pub entity: EntityKind,
    pub table: &'static str,
    pub fields: &'static [Field],
    /// Extra predicate appended to every UPDATE (e.g. skip soft-deleted rows)
    pub guard: Option<&'static str>,
}

impl FieldSet {
    pub fn get(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }
}

pub static TEMPLATE_FIELDS: FieldSet = FieldSet {
    entity: EntityKind::Template,
    table: "templates",
    fields: &[
        Field::new("name", "name", ColumnKind::Text, false),
        Field::new("description", "description", ColumnKind::Text, true),
        Field::new("isDeleted", "is_deleted", ColumnKind::Bool, false),
    ],
    guard: Some("\"is_deleted\" = FALSE"),
};

pub static CANVAS_FIELDS: FieldSet = FieldSet {
    entity: EntityKind::Canvas,
    table: "canvases",
    fields: &[
        Field::new("name", "name", ColumnKind::Text, true),
        Field::new("description", "description", ColumnKind::Text, true),
    ],
    guard: None,
};

// `type` and `canvasId` are fixed at creation
pub static CHART_FIELDS: FieldSet = FieldSet {
    entity: EntityKind::Chart,
    table: "charts",
    fields: &[
        Field::new("name", "name", ColumnKind::Text, true),
        Field::new("measurements", "measurements", ColumnKind::Json, true),
    ],
    guard: None,
};

pub static MEASUREMENT_FIELDS: FieldSet = FieldSet {
    entity: EntityKind::Measurement,
    table: "measurements",
    fields: &[Field {
        name: "content",
        column: "content",
        kind: ColumnKind::Json,
        nullable: false,
        validator: Some(validate_content),
    }],
    guard: None,
};

// viewCount moves only through `DashboardStore::get_by_share_id`
pub static DASHBOARD_FIELDS: FieldSet = FieldSet {
    entity: EntityKind::Dashboard,
    table: "dashboards",
    fields: &[
        Field::new("name", "name", ColumnKind::Text, false),
        Field::new("description", "description", ColumnKind::Text, true),
        Field::new("isPublished", "is_published", ColumnKind::Bool, false),
        Field::new("templateId", "template_id", ColumnKind::Uuid, true),
    ],
    guard: None,
};

pub fn field_set(entity: EntityKind) -> &'static FieldSet {
    match entity {
        EntityKind::Template => &TEMPLATE_FIELDS,
        EntityKind::Canvas => &CANVAS_FIELDS,
        EntityKind::Chart => &CHART_FIELDS,
        EntityKind::Measurement => &MEASUREMENT_FIELDS,
        EntityKind::Dashboard => &DASHBOARD_FIELDS,
    }
}
