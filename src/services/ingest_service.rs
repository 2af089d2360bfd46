use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::importers::station_metadata::{StationMetadataLoader, DEFAULT_METADATA_SHEET};
use crate::importers::workbook::{LoadError, SheetSource};
use crate::importers::year_sheet_loader::{YearSheetLoader, DEFAULT_YEAR_SHEET_PREFIX};
use crate::pipeline::merger::merge_years;
use crate::pipeline::normalizer::{rows_per_station, MissingCellPolicy, Normalizer};

/// Which sheets to read and how to treat empty cells
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    /// Years to load, in load order; `None` loads every year sheet found
    pub years: Option<Vec<i32>>,
    pub year_sheet_prefix: String,
    pub metadata_sheet: String,
    pub missing_cells: MissingCellPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            years: None,
            year_sheet_prefix: DEFAULT_YEAR_SHEET_PREFIX.to_string(),
            metadata_sheet: DEFAULT_METADATA_SHEET.to_string(),
            missing_cells: MissingCellPolicy::default(),
        }
    }
}

/// Runs loader -> normalizer -> merger over a workbook
#[derive(Debug, Clone, Default)]
pub struct IngestService {
    options: IngestOptions,
}

impl IngestService {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Build the fact table and metadata context from a workbook.
    ///
    /// Any load, normalization or merge error aborts the whole run.
    pub fn build(&self, source: &mut impl SheetSource) -> Result<PipelineContext, PipelineError> {
        self.build_with_progress(source, &ProgressBar::hidden())
    }

    /// Same as [`IngestService::build`], reporting one tick per year on `progress`
    #[instrument(skip_all)]
    pub fn build_with_progress(
        &self,
        source: &mut impl SheetSource,
        progress: &ProgressBar,
    ) -> Result<PipelineContext, PipelineError> {
        let start_time = Instant::now();

        let year_loader = YearSheetLoader::new(self.options.year_sheet_prefix.clone());
        let years = match &self.options.years {
            Some(years) => years.clone(),
            None => year_loader.discover_years(&*source),
        };
        if years.is_empty() {
            return Err(LoadError::NoYearSheets.into());
        }
        info!("Building fact table for years {:?}", years);

        let metadata = StationMetadataLoader::new(self.options.metadata_sheet.clone()).load(source)?;
        let normalizer = Normalizer::new(&metadata).with_missing_cells(self.options.missing_cells);

        progress.set_length(years.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        let mut tables = Vec::with_capacity(years.len());
        for &year in &years {
            progress.set_message(format!("year {year}"));
            let raw = year_loader.load_year(source, year)?;
            tables.push(normalizer.normalize(&raw)?);
            progress.inc(1);
        }
        progress.finish_with_message("normalized");

        let facts = merge_years(tables)?;

        let per_station = rows_per_station(facts.rows());
        let unmatched = per_station
            .keys()
            .filter(|station| metadata.get(station).is_none())
            .count();
        if unmatched > 0 {
            warn!(
                "{} of {} stations have no metadata (description/lat/lon left empty)",
                unmatched,
                per_station.len()
            );
        }

        info!(
            "Built fact table: {} rows, {} stations, {} years in {:.2}s",
            facts.len(),
            per_station.len(),
            years.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(PipelineContext::new(facts, metadata))
    }
}
