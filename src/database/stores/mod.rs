//! Per-entity persistence: create, read, list, sparse update and delete.
//!
//! Every store exposes an associated `insert` that runs on any executor, so the
//! same statement serves a standalone create (pool) and the cascading template
//! create (open transaction).

pub mod canvas;
pub mod chart;
pub mod dashboard;
pub mod measurement;
pub mod template;

pub use canvas::CanvasStore;
pub use chart::ChartStore;
pub use dashboard::DashboardStore;
pub use measurement::MeasurementStore;
pub use template::TemplateStore;

use sqlx::PgPool;

/// All entity stores over one pool
#[derive(Clone)]
pub struct Stores {
    pub templates: TemplateStore,
    pub canvases: CanvasStore,
    pub charts: ChartStore,
    pub measurements: MeasurementStore,
    pub dashboards: DashboardStore,
}

impl Stores {
    pub fn new(pool: PgPool, content_limit: usize) -> Self {
        Self {
            templates: TemplateStore::new(pool.clone()),
            canvases: CanvasStore::new(pool.clone()),
            charts: ChartStore::new(pool.clone()),
            measurements: MeasurementStore::new(pool.clone(), content_limit),
            dashboards: DashboardStore::new(pool),
        }
    }
}
