pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod render;
pub mod server;
pub mod storage;
pub mod surface;
pub mod table;

pub use dashboard::{Dashboard, DashboardView, Rendered, Selection};
pub use error::{DashboardError, Result};
pub use metrics::Metric;
pub use normalize::{NormalizedSeries, Normalizer, Scaling};
pub use render::{render, ChartSpec, Layout, Renderer};
pub use storage::{CsvTableReader, TableCache, TableReader};
pub use table::{CerealTable, CountryOrder, Record};
