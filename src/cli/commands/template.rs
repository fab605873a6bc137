use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::{
    utils::{output_success, output_value},
    OutputFormat,
};
use crate::config::AppConfig;
use crate::database::manager::DatabaseManager;
use crate::services::{SaveTemplateRequest, TemplateTree, TemplateWriter};

async fn writer(config: &AppConfig) -> anyhow::Result<TemplateWriter> {
    let pool = DatabaseManager::connect(&config.database).await?;
    Ok(TemplateWriter::new(pool, config.content.max_bytes).with_timeout(config.database.transaction_timeout()))
}

pub async fn save(config: &AppConfig, file: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let request: SaveTemplateRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let id = writer(config).await?.save_template(request).await?;

    output_success(
        output_format,
        &format!("Template saved with id {}", id),
        Some(json!({ "id": id })),
    )
}

pub async fn show(config: &AppConfig, id: Uuid, output_format: OutputFormat) -> anyhow::Result<()> {
    let tree = writer(config).await?.load_tree(id).await?;
    let text = render(&tree);
    output_value(output_format, &serde_json::to_value(&tree)?, |_: &Value| text)
}

/// Indented outline of a template tree
pub fn render(tree: &TemplateTree) -> String {
    let mut out = String::new();
    let counts = tree.counts();
    let _ = writeln!(
        out,
        "{} ({}) - {} canvases, {} charts, {} measurements",
        tree.template.name, tree.template.id, counts.canvases, counts.charts, counts.measurements
    );

    for (i, node) in tree.canvases.iter().enumerate() {
        let name = node.canvas.name.as_deref().unwrap_or("(unnamed)");
        let _ = writeln!(out, "  canvas {}: {} ({})", i, name, node.canvas.id);
        for chart in &node.charts {
            let name = chart.chart.name.as_deref().unwrap_or("(unnamed)");
            let _ = writeln!(
                out,
                "    {} chart: {} ({}), {} measurements",
                chart.chart.kind,
                name,
                chart.chart.id,
                chart.measurements.len()
            );
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Canvas, Chart, Template};
    use crate::services::template_writer::{CanvasNode, ChartNode};
    use chrono::Utc;

    #[test]
    fn renders_outline() {
        let template_id = Uuid::new_v4();
        let canvas_id = Uuid::new_v4();
        let tree = TemplateTree {
            template: Template {
                id: template_id,
                name: "Ops".into(),
                description: None,
                is_deleted: false,
                creator_id: Uuid::new_v4(),
                usage_count: 0,
                updated_at: None,
                created_at: Utc::now(),
            },
            canvases: vec![CanvasNode {
                canvas: Canvas {
                    id: canvas_id,
                    template_id,
                    name: None,
                    description: None,
                    position: 0,
                    updated_at: None,
                    created_at: Utc::now(),
                },
                charts: vec![ChartNode {
                    chart: Chart {
                        id: Uuid::new_v4(),
                        canvas_id,
                        kind: "line".into(),
                        name: Some("CPU".into()),
                        measurements: None,
                        position: 0,
                        updated_at: None,
                        created_at: Utc::now(),
                    },
                    measurements: vec![],
                }],
            }],
        };

        let text = render(&tree);
        assert!(text.starts_with("Ops ("));
        assert!(text.contains("1 canvases, 1 charts, 0 measurements"));
        assert!(text.contains("canvas 0: (unnamed)"));
        assert!(text.contains("line chart: CPU"));
    }
}
