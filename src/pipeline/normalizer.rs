//! Wide-to-long reshaping of one year's count sheet
//!
//! Every (timestamp, station column) cell becomes one `FactRow` carrying the
//! canonical station code, calendar fields and the joined station metadata.
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::importers::year_sheet_loader::{RawCell, RawYearTable};
use crate::models::{FactRow, StationInfo, StationMetadata, FACT_COLUMNS};
use crate::pipeline::calendar::CalendarFields;
use crate::pipeline::station_code::station_code_from_header;

/// What to do with empty count cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCellPolicy {
    /// Emit no row for the cell (the sheet simply has no reading for that hour)
    #[default]
    Skip,
    /// Treat an empty cell as a malformed count
    Reject,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed count for {column} at {timestamp}: '{value}' ({reason})")]
pub struct MalformedCountError {
    pub timestamp: NaiveDateTime,
    pub column: String,
    pub value: String,
    pub reason: &'static str,
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error(transparent)]
    MalformedCount(#[from] MalformedCountError),

    #[error("Cannot derive station code from header at col {column}: '{header}'")]
    InvalidStationHeader { column: usize, header: String },

    #[error("Station {station} appears in more than one column")]
    DuplicateStation { station: String },

    #[error("Timestamp {0} appears more than once")]
    DuplicateTimestamp(NaiveDateTime),
}

/// Normalized rows of one source year
#[derive(Debug, Clone, PartialEq)]
pub struct YearTable {
    pub source_year: i32,
    /// Field names carried by every row
    pub schema: Vec<String>,
    pub rows: Vec<FactRow>,
}

impl YearTable {
    pub fn fact_schema() -> Vec<String> {
        FACT_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

pub struct Normalizer<'a> {
    metadata: &'a StationMetadata,
    missing_cells: MissingCellPolicy,
}

impl<'a> Normalizer<'a> {
    pub fn new(metadata: &'a StationMetadata) -> Self {
        Self {
            metadata,
            missing_cells: MissingCellPolicy::default(),
        }
    }

    pub fn with_missing_cells(mut self, policy: MissingCellPolicy) -> Self {
        self.missing_cells = policy;
        self
    }

    /// Reshape one year's wide table into fact rows.
    ///
    /// Rows come out ordered by timestamp, then by source column order.
    pub fn normalize(&self, raw: &RawYearTable) -> Result<YearTable, NormalizeError> {
        let stations = self.resolve_stations(raw)?;

        // Stable sort keeps source order for equal keys, duplicates are rejected below
        let mut order: Vec<usize> = (0..raw.rows.len()).collect();
        order.sort_by_key(|&idx| raw.rows[idx].timestamp);

        let mut rows = Vec::with_capacity(raw.cell_count());
        let mut skipped = 0usize;
        let mut previous: Option<NaiveDateTime> = None;

        for idx in order {
            let raw_row = &raw.rows[idx];
            if previous == Some(raw_row.timestamp) {
                return Err(NormalizeError::DuplicateTimestamp(raw_row.timestamp));
            }
            previous = Some(raw_row.timestamp);

            let calendar = CalendarFields::from_timestamp(raw_row.timestamp);

            for (col_idx, (station, info)) in stations.iter().enumerate() {
                let cell = raw_row.cells.get(col_idx).unwrap_or(&RawCell::Empty);
                let total_bikes = match self.convert_count(cell) {
                    Ok(Some(count)) => count,
                    Ok(None) => {
                        skipped += 1;
                        continue;
                    }
                    Err((value, reason)) => {
                        return Err(MalformedCountError {
                            timestamp: raw_row.timestamp,
                            column: raw.columns[col_idx].clone(),
                            value,
                            reason,
                        }
                        .into())
                    }
                };

                rows.push(build_row(
                    raw_row.timestamp,
                    station,
                    total_bikes,
                    &calendar,
                    *info,
                ));
            }
        }

        if skipped > 0 {
            debug!(
                "Skipped {} empty cells in year {} ({} rows kept)",
                skipped,
                raw.year,
                rows.len()
            );
        }
        info!(
            "Normalized year {}: {} rows from {} stations",
            raw.year,
            rows.len(),
            stations.len()
        );

        Ok(YearTable {
            source_year: raw.year,
            schema: YearTable::fact_schema(),
            rows,
        })
    }

    /// Canonical code and metadata for every column, in column order
    fn resolve_stations(
        &self,
        raw: &RawYearTable,
    ) -> Result<Vec<(String, Option<&'a StationInfo>)>, NormalizeError> {
        let mut seen = HashSet::new();
        let mut unmatched = Vec::new();
        let mut stations = Vec::with_capacity(raw.columns.len());

        for (column, header) in raw.columns.iter().enumerate() {
            let station = station_code_from_header(header).ok_or_else(|| {
                NormalizeError::InvalidStationHeader {
                    column,
                    header: header.clone(),
                }
            })?;

            if !seen.insert(station.clone()) {
                return Err(NormalizeError::DuplicateStation { station });
            }

            let info = self.metadata.get(&station);
            if info.is_none() {
                unmatched.push(station.clone());
            }
            stations.push((station, info));
        }

        if !unmatched.is_empty() {
            warn!(
                "No metadata for {} stations in year {}: {}",
                unmatched.len(),
                raw.year,
                unmatched.join(", ")
            );
        }

        Ok(stations)
    }

    /// `Ok(None)` means "no reading", `Err((value, reason))` a malformed cell
    fn convert_count(&self, cell: &RawCell) -> Result<Option<u32>, (String, &'static str)> {
        match cell {
            RawCell::Empty => match self.missing_cells {
                MissingCellPolicy::Skip => Ok(None),
                MissingCellPolicy::Reject => Err((String::new(), "missing value")),
            },
            RawCell::Int(i) => int_count(*i).map(Some).map_err(|r| (i.to_string(), r)),
            RawCell::Float(f) => float_count(*f).map(Some).map_err(|r| (f.to_string(), r)),
            RawCell::Text(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    int_count(i).map(Some).map_err(|r| (s.clone(), r))
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    float_count(f).map(Some).map_err(|r| (s.clone(), r))
                } else {
                    Err((s.clone(), "not a number"))
                }
            }
        }
    }
}

fn int_count(value: i64) -> Result<u32, &'static str> {
    if value < 0 {
        return Err("negative count");
    }
    u32::try_from(value).map_err(|_| "count out of range")
}

fn float_count(value: f64) -> Result<u32, &'static str> {
    if !value.is_finite() {
        return Err("not a number");
    }
    if value.fract() != 0.0 {
        return Err("fractional count");
    }
    if value < 0.0 {
        return Err("negative count");
    }
    if value > u32::MAX as f64 {
        return Err("count out of range");
    }
    Ok(value as u32)
}

fn build_row(
    timestamp: NaiveDateTime,
    station: &str,
    total_bikes: u32,
    calendar: &CalendarFields,
    info: Option<&StationInfo>,
) -> FactRow {
    FactRow {
        timestamp,
        station: station.to_string(),
        total_bikes,
        hour: calendar.hour,
        hour_str: calendar.hour_str.clone(),
        weekday: calendar.weekday,
        day_name: calendar.day_name.clone(),
        month: calendar.month,
        month_name: calendar.month_name.clone(),
        year: calendar.year,
        description: info.map(|i| i.description.clone()),
        lat: info.map(|i| i.lat),
        lon: info.map(|i| i.lon),
    }
}

/// Count of rows per station, used for run summaries
pub fn rows_per_station(rows: &[FactRow]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row.station.as_str()).or_insert(0) += 1;
    }
    counts
}
