//! Cascading create of a whole template tree (template, canvases, charts,
//! measurements) inside one transaction, plus the matching read-back.
//!
//! Everything that can be checked without the database is checked first, so
//! invalid input never opens a transaction. Each level's generated id becomes
//! the parent id of the level below; any failed insert rolls the whole tree back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::database::content::prepare_content;
use crate::database::error::{EntityKind, StoreError};
use crate::database::models::{Canvas, Chart, Measurement, NewCanvas, NewChart, NewTemplate, Template};
use crate::database::stores::{CanvasStore, ChartStore, MeasurementStore, Stores, TemplateStore};
use crate::database::transaction::TransactionScope;

/// Inbound tree for `save_template`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub canvases: Vec<CanvasSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub measurements: Vec<MeasurementSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSpec {
    pub content: Value,
}

/// Rows per level of a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeCounts {
    pub canvases: usize,
    pub charts: usize,
    pub measurements: usize,
}

/// A request that passed every local check; measurement content is already encoded
#[derive(Debug)]
pub struct PreparedTemplate {
    template: NewTemplate,
    canvases: Vec<PreparedCanvas>,
}

#[derive(Debug)]
struct PreparedCanvas {
    canvas: NewCanvas,
    charts: Vec<PreparedChart>,
}

#[derive(Debug)]
struct PreparedChart {
    chart: NewChart,
    measurements: Vec<Value>,
}

impl PreparedTemplate {
    pub fn counts(&self) -> TreeCounts {
        let charts = self.canvases.iter().flat_map(|c| &c.charts);
        TreeCounts {
            canvases: self.canvases.len(),
            charts: charts.clone().count(),
            measurements: charts.map(|c| c.measurements.len()).sum(),
        }
    }
}

/// Validate a request and encode all measurement content.
///
/// The first problem found is reported with its position in the tree, e.g.
/// `canvases[1].charts[0].measurements[2].content`.
pub fn prepare(request: SaveTemplateRequest, content_limit: usize) -> Result<PreparedTemplate, StoreError> {
    if request.name.trim().is_empty() {
        return Err(StoreError::validation(EntityKind::Template, "name", "must not be empty"));
    }

    let mut canvases = Vec::with_capacity(request.canvases.len());
    for (i, canvas) in request.canvases.into_iter().enumerate() {
        let mut charts = Vec::with_capacity(canvas.charts.len());
        for (j, chart) in canvas.charts.into_iter().enumerate() {
            if chart.kind.trim().is_empty() {
                return Err(StoreError::validation(
                    EntityKind::Chart,
                    format!("canvases[{}].charts[{}].type", i, j),
                    "must not be empty",
                ));
            }

            let measurements = chart
                .measurements
                .iter()
                .enumerate()
                .map(|(k, m)| {
                    prepare_content(&m.content, content_limit).map_err(|e| {
                        StoreError::validation(
                            EntityKind::Measurement,
                            format!("canvases[{}].charts[{}].measurements[{}].content", i, j, k),
                            e.to_string(),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            charts.push(PreparedChart {
                chart: NewChart {
                    kind: chart.kind,
                    name: chart.name,
                },
                measurements,
            });
        }

        canvases.push(PreparedCanvas {
            canvas: NewCanvas {
                name: canvas.name,
                description: canvas.description,
            },
            charts,
        });
    }

    Ok(PreparedTemplate {
        template: NewTemplate {
            name: request.name,
            description: request.description,
            creator_id: request.creator_id,
        },
        canvases,
    })
}

/// A stored template with all descendants, siblings in insertion order
#[derive(Debug, Clone, Serialize)]
pub struct TemplateTree {
    pub template: Template,
    pub canvases: Vec<CanvasNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanvasNode {
    pub canvas: Canvas,
    pub charts: Vec<ChartNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartNode {
    pub chart: Chart,
    pub measurements: Vec<Measurement>,
}

impl TemplateTree {
    pub fn counts(&self) -> TreeCounts {
        let charts = self.canvases.iter().flat_map(|c| &c.charts);
        TreeCounts {
            canvases: self.canvases.len(),
            charts: charts.clone().count(),
            measurements: charts.map(|c| c.measurements.len()).sum(),
        }
    }
}

#[derive(Clone)]
pub struct TemplateWriter {
    scope: TransactionScope<PgPool>,
    stores: Stores,
    content_limit: usize,
}

impl TemplateWriter {
    pub fn new(pool: PgPool, content_limit: usize) -> Self {
        Self {
            scope: TransactionScope::new(pool.clone()),
            stores: Stores::new(pool, content_limit),
            content_limit,
        }
    }

    /// Roll back and give up on trees that take longer than `limit` to write
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.scope = self.scope.with_timeout(limit);
        self
    }

    /// Persist a complete tree atomically and return the new template id.
    ///
    /// On any error nothing of the tree is visible afterwards.
    pub async fn save_template(&self, request: SaveTemplateRequest) -> Result<Uuid, StoreError> {
        let prepared = prepare(request, self.content_limit)?;
        let counts = prepared.counts();

        let id = self
            .scope
            .run(move |tx| Box::pin(async move { write_tree(tx, &prepared).await }))
            .await?;

        info!(
            template_id = %id,
            canvases = counts.canvases,
            charts = counts.charts,
            measurements = counts.measurements,
            "template saved"
        );
        Ok(id)
    }

    pub async fn load_tree(&self, id: Uuid) -> Result<TemplateTree, StoreError> {
        let template = self.stores.templates.get_by_id(id).await?;

        let mut canvases = Vec::new();
        for canvas in self.stores.canvases.list_by_template(id).await? {
            let mut charts = Vec::new();
            for chart in self.stores.charts.list_by_canvas(canvas.id).await? {
                let measurements = self.stores.measurements.list_by_chart(chart.id).await?;
                charts.push(ChartNode { chart, measurements });
            }
            canvases.push(CanvasNode { canvas, charts });
        }

        Ok(TemplateTree { template, canvases })
    }
}

async fn write_tree(tx: &mut Transaction<'static, Postgres>, prepared: &PreparedTemplate) -> Result<Uuid, StoreError> {
    let template_id = TemplateStore::insert(&mut **tx, &prepared.template)
        .await
        .map_err(|e| e.at("template"))?;

    for (i, canvas) in prepared.canvases.iter().enumerate() {
        let canvas_path = format!("canvases[{}]", i);
        let canvas_id = CanvasStore::insert(&mut **tx, template_id, &canvas.canvas, Some(position(i)))
            .await
            .map_err(|e| e.at(canvas_path.as_str()))?;

        for (j, chart) in canvas.charts.iter().enumerate() {
            let chart_path = format!("{}.charts[{}]", canvas_path, j);
            let chart_id = ChartStore::insert(&mut **tx, canvas_id, &chart.chart, Some(position(j)))
                .await
                .map_err(|e| e.at(chart_path.as_str()))?;

            for (k, content) in chart.measurements.iter().enumerate() {
                MeasurementStore::insert(&mut **tx, chart_id, content, Some(position(k)))
                    .await
                    .map_err(|e| e.at(format!("{}.measurements[{}]", chart_path, k)))?;
            }
        }
    }

    Ok(template_id)
}

fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
