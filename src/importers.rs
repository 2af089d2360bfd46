//! Readers for the counter workbook: year sheets and the station metadata sheet

pub mod station_metadata;
pub mod workbook;
pub mod year_sheet_loader;

// Re-export commonly used items
pub use station_metadata::StationMetadataLoader;
pub use workbook::{InMemoryWorkbook, LoadError, SheetSource, WorkbookFile};
pub use year_sheet_loader::{RawCell, RawRow, RawYearTable, YearSheetLoader};
