//! Station metadata sheet parser
//!
//! The "Standortdaten" sheet lists every counting station with its street
//! description (direction included) and coordinates.
use calamine::{Data, Range};
use tracing::{debug, info, warn};

use crate::importers::workbook::{LoadError, SheetSource};
use crate::models::{StationInfo, StationMetadata};
use crate::pipeline::station_code::canonicalize;

pub const DEFAULT_METADATA_SHEET: &str = "Standortdaten";

const CODE_HEADER: &str = "Zählstelle";
const DESCRIPTION_HEADER: &str = "Beschreibung - Fahrtrichtung";
const LATITUDE_HEADER: &str = "Breitengrad";
const LONGITUDE_HEADER: &str = "Längengrad";

#[derive(Debug, Clone)]
pub struct StationMetadataLoader {
    sheet_name: String,
}

impl Default for StationMetadataLoader {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_SHEET)
    }
}

impl StationMetadataLoader {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    pub fn load(&self, source: &mut impl SheetSource) -> Result<StationMetadata, LoadError> {
        info!("Loading station metadata from sheet: {}", self.sheet_name);
        let range = source.sheet(&self.sheet_name)?;
        parse_metadata_range(&range)
    }
}

/// Parse station metadata from a worksheet range.
///
/// Columns are located by their header text, so extra columns (e.g. the
/// installation date) and column reordering are tolerated.
pub fn parse_metadata_range(range: &Range<Data>) -> Result<StationMetadata, LoadError> {
    let (height, _width) = range.get_size();

    let code_col = find_column(range, CODE_HEADER)?;
    let description_col = find_column(range, DESCRIPTION_HEADER)?;
    let lat_col = find_column(range, LATITUDE_HEADER)?;
    let lon_col = find_column(range, LONGITUDE_HEADER)?;

    // Helper to get text cell value (0-indexed)
    let get_text = |row: usize, col: usize| -> Option<String> {
        range.get((row, col)).and_then(|v| match v {
            Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Data::Int(i) => Some(i.to_string()),
            _ => None,
        })
    };

    // Helper to get numeric cell value
    let get_float = |row: usize, col: usize| -> Option<f64> {
        range.get((row, col)).and_then(|v| match v {
            Data::Float(f) => Some(*f),
            Data::Int(i) => Some(*i as f64),
            Data::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        })
    };

    let mut metadata = StationMetadata::new();

    for row in 1..height {
        let Some(code) = get_text(row, code_col) else {
            debug!("No station code at row {}, skipping", row);
            continue;
        };
        let station = canonicalize(&code);

        let description = get_text(row, description_col).ok_or_else(|| LoadError::InvalidMetadata {
            row,
            msg: format!("Missing description for station {station}"),
        })?;

        let lat = get_float(row, lat_col).ok_or_else(|| LoadError::InvalidMetadata {
            row,
            msg: format!("Missing latitude for station {station}"),
        })?;
        validate_latitude(lat).map_err(|msg| LoadError::InvalidMetadata { row, msg })?;

        let lon = get_float(row, lon_col).ok_or_else(|| LoadError::InvalidMetadata {
            row,
            msg: format!("Missing longitude for station {station}"),
        })?;
        validate_longitude(lon).map_err(|msg| LoadError::InvalidMetadata { row, msg })?;

        let info = StationInfo {
            description,
            lat,
            lon,
        };
        if let Some(previous) = metadata.insert(station.clone(), info) {
            warn!(
                "Duplicate metadata for station {} (replacing '{}')",
                station, previous.description
            );
        }
    }

    info!("Parsed metadata for {} stations", metadata.len());
    Ok(metadata)
}

fn find_column(range: &Range<Data>, header: &'static str) -> Result<usize, LoadError> {
    (0..range.width())
        .find(|&col| matches!(range.get((0, col)), Some(Data::String(s)) if s.trim() == header))
        .ok_or(LoadError::MissingMetadataColumn(header))
}

fn validate_latitude(lat: f64) -> Result<(), String> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(format!("Latitude {lat} outside range (-90 - 90)"))
    }
}

fn validate_longitude(lon: f64) -> Result<(), String> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(format!("Longitude {lon} outside range (-180 - 180)"))
    }
}
