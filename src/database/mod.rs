pub mod content;
pub mod error;
pub mod field_set;
pub mod manager;
pub mod models;
pub mod partial_update;
pub mod repository;
pub mod stores;
pub mod transaction;

pub use error::{Affected, EntityKind, Operation, StoreError};
pub use manager::{DatabaseError, DatabaseManager};
pub use partial_update::{PartialUpdate, Patch};
pub use repository::Repository;
pub use stores::{CanvasStore, ChartStore, DashboardStore, MeasurementStore, Stores, TemplateStore};
pub use transaction::{TransactionScope, Transactional};
