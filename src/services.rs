pub mod barchart_service;
pub mod comparison_service;
pub mod ingest_service;
pub mod polar_service;

pub use barchart_service::{BarchartPoint, BarchartSeries, BarchartService};
pub use comparison_service::{highlight_colors, BarColors, ComparisonRow, ComparisonSeries, ComparisonService};
pub use ingest_service::{IngestOptions, IngestService};
pub use polar_service::{PolarPoint, PolarSeries, PolarService, RadialRange};
