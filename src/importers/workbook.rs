use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Failed to read sheet {sheet}: {msg}")]
    SheetRead { sheet: String, msg: String },

    #[error("Sheet {0} has no header row")]
    EmptySheet(String),

    #[error("Invalid header in sheet {sheet}, col {col}: {msg}")]
    InvalidHeader {
        sheet: String,
        col: usize,
        msg: String,
    },

    #[error("Invalid timestamp in sheet {sheet}, row {row}: {value}")]
    InvalidTimestamp {
        sheet: String,
        row: usize,
        value: String,
    },

    #[error("Metadata sheet is missing column: {0}")]
    MissingMetadataColumn(&'static str),

    #[error("Invalid metadata at row {row}: {msg}")]
    InvalidMetadata { row: usize, msg: String },

    #[error("No year sheets found in workbook")]
    NoYearSheets,
}

/// Anything that can hand out worksheet ranges by name
pub trait SheetSource {
    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&mut self, name: &str) -> Result<Range<Data>, LoadError>;
}

/// Workbook on disk (xlsx, xls, xlsb or ods)
pub struct WorkbookFile {
    sheets: Sheets<BufReader<File>>,
}

impl WorkbookFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let sheets = match open_workbook_auto(path) {
            Ok(wb) => wb,
            Err(e) => return Err(LoadError::WorkbookOpen(e.to_string())),
        };
        debug!("Opened workbook {}", path.display());
        Ok(Self { sheets })
    }
}

impl SheetSource for WorkbookFile {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn sheet(&mut self, name: &str) -> Result<Range<Data>, LoadError> {
        if !self.sheets.sheet_names().iter().any(|s| s == name) {
            return Err(LoadError::SheetNotFound(name.to_string()));
        }
        self.sheets
            .worksheet_range(name)
            .map_err(|e| LoadError::SheetRead {
                sheet: name.to_string(),
                msg: e.to_string(),
            })
    }
}

/// Workbook assembled in memory, sheet order preserved
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkbook {
    sheets: Vec<(String, Range<Data>)>,
}

impl InMemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a sheet built from rows of cells
    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<Vec<Data>>) -> Self {
        self.insert_range(name, range_from_rows(rows));
        self
    }

    pub fn insert_range(&mut self, name: impl Into<String>, range: Range<Data>) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = range,
            None => self.sheets.push((name, range)),
        }
    }
}

impl SheetSource for InMemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn sheet(&mut self, name: &str) -> Result<Range<Data>, LoadError> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, range)| range.clone())
            .ok_or_else(|| LoadError::SheetNotFound(name.to_string()))
    }
}

/// Build a range anchored at A1 from row-major cells; short rows are padded with `Data::Empty`
pub fn range_from_rows(rows: Vec<Vec<Data>>) -> Range<Data> {
    let height = rows.len();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if height == 0 || width == 0 {
        return Range::empty();
    }

    let mut range = Range::new((0, 0), ((height - 1) as u32, (width - 1) as u32));
    for (row_idx, row) in rows.into_iter().enumerate() {
        for (col_idx, cell) in row.into_iter().enumerate() {
            range.set_value((row_idx as u32, col_idx as u32), cell);
        }
    }
    range
}
