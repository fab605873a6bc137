pub mod canvas;
pub mod chart;
pub mod dashboard;
pub mod measurement;
pub mod template;

pub use canvas::{Canvas, NewCanvas};
pub use chart::{Chart, NewChart};
pub use dashboard::{Dashboard, NewDashboard};
pub use measurement::{Measurement, NewMeasurement};
pub use template::{NewTemplate, Template};
