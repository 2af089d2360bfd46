use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::importers::station_metadata::DEFAULT_METADATA_SHEET;
use crate::importers::year_sheet_loader::DEFAULT_YEAR_SHEET_PREFIX;
use crate::pipeline::normalizer::MissingCellPolicy;
use crate::services::IngestOptions;

pub const DEFAULT_WORKBOOK_PATH: &str = "gesamtdatei_stundenwerte_2012-2019.xlsx";
pub const DEFAULT_OUTPUT_PATH: &str = "berlin_bikedata.csv";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid year in {var}: '{value}'")]
    InvalidYear { var: &'static str, value: String },

    #[error("{var} must name at least one year")]
    EmptyYearList { var: &'static str },

    #[error("Invalid missing cell policy '{0}' (expected 'skip' or 'reject')")]
    InvalidMissingCellPolicy(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workbook_path: PathBuf,
    pub output_path: PathBuf,
    /// `None` loads every year sheet the workbook has
    pub years: Option<Vec<i32>>,
    pub year_sheet_prefix: String,
    pub metadata_sheet: String,
    pub missing_cells: MissingCellPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from(DEFAULT_WORKBOOK_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            years: None,
            year_sheet_prefix: DEFAULT_YEAR_SHEET_PREFIX.to_string(),
            metadata_sheet: DEFAULT_METADATA_SHEET.to_string(),
            missing_cells: MissingCellPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key -> value source, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            workbook_path: lookup("BIKE_WORKBOOK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.workbook_path),
            output_path: lookup("BIKE_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            years: lookup("BIKE_YEARS")
                .map(|value| parse_years("BIKE_YEARS", &value))
                .transpose()?,
            year_sheet_prefix: lookup("BIKE_YEAR_SHEET_PREFIX").unwrap_or(defaults.year_sheet_prefix),
            metadata_sheet: lookup("BIKE_METADATA_SHEET").unwrap_or(defaults.metadata_sheet),
            missing_cells: lookup("BIKE_MISSING_CELLS")
                .map(|value| parse_missing_cells(&value))
                .transpose()?
                .unwrap_or(defaults.missing_cells),
        })
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            years: self.years.clone(),
            year_sheet_prefix: self.year_sheet_prefix.clone(),
            metadata_sheet: self.metadata_sheet.clone(),
            missing_cells: self.missing_cells,
        }
    }
}

/// Comma separated year list, e.g. "2017,2018, 2019"
pub fn parse_years(var: &'static str, value: &str) -> Result<Vec<i32>, ConfigError> {
    let years = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>().map_err(|_| ConfigError::InvalidYear {
                var,
                value: part.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if years.is_empty() {
        return Err(ConfigError::EmptyYearList { var });
    }
    Ok(years)
}

pub fn parse_missing_cells(value: &str) -> Result<MissingCellPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "skip" => Ok(MissingCellPolicy::Skip),
        "reject" => Ok(MissingCellPolicy::Reject),
        _ => Err(ConfigError::InvalidMissingCellPolicy(value.to_string())),
    }
}
