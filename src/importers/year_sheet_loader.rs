use calamine::{Data, Range};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::importers::workbook::{LoadError, SheetSource};

/// Sheet name prefix of the yearly count sheets ("Jahresdatei 2019")
pub const DEFAULT_YEAR_SHEET_PREFIX: &str = "Jahresdatei ";

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

/// One cell of the wide count matrix, as found in the sheet
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&Data> for RawCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => RawCell::Empty,
            Data::Int(i) => RawCell::Int(*i),
            Data::Float(f) => RawCell::Float(*f),
            Data::String(s) if s.trim().is_empty() => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            other => RawCell::Text(other.to_string()),
        }
    }
}

/// One timestamp row of the wide matrix; `cells` line up with `RawYearTable::columns`
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub timestamp: NaiveDateTime,
    pub cells: Vec<RawCell>,
}

/// One year's wide table: rows keyed by timestamp, columns keyed by raw station header
#[derive(Debug, Clone, PartialEq)]
pub struct RawYearTable {
    pub year: i32,
    /// Raw station headers, timestamp column excluded
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawYearTable {
    /// Number of (timestamp, station) cells
    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.columns.len()
    }
}

/// Reads the yearly count sheets of the counter workbook
#[derive(Debug, Clone)]
pub struct YearSheetLoader {
    sheet_prefix: String,
}

impl Default for YearSheetLoader {
    fn default() -> Self {
        Self::new(DEFAULT_YEAR_SHEET_PREFIX)
    }
}

impl YearSheetLoader {
    pub fn new(sheet_prefix: impl Into<String>) -> Self {
        Self {
            sheet_prefix: sheet_prefix.into(),
        }
    }

    pub fn sheet_name(&self, year: i32) -> String {
        format!("{}{}", self.sheet_prefix, year)
    }

    /// Years that have a count sheet, in workbook order
    pub fn discover_years(&self, source: &impl SheetSource) -> Vec<i32> {
        let pattern = format!(r"^{}(\d{{4}})$", regex::escape(&self.sheet_prefix));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Invalid year sheet pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };

        source
            .sheet_names()
            .iter()
            .filter_map(|name| {
                re.captures(name)
                    .and_then(|cap| cap.get(1))
                    .and_then(|m| m.as_str().parse::<i32>().ok())
            })
            .collect()
    }

    /// Load the count sheet for `year`
    pub fn load_year(
        &self,
        source: &mut impl SheetSource,
        year: i32,
    ) -> Result<RawYearTable, LoadError> {
        let sheet_name = self.sheet_name(year);
        info!("Loading sheet: {}", sheet_name);
        let range = source.sheet(&sheet_name)?;
        parse_year_range(&sheet_name, year, &range)
    }
}

/// Parse a wide count sheet.
///
/// # Expected Sheet Structure:
/// ```text
/// Row 1:   Zählstelle  Inbetriebnahme | 02-MI-JAN-N 01.04.2015 | 02-MI-JAN-S 01.04.2015 | ...
/// Row 2-n: 2019-01-01 00:00:00        | 12                     | 7                      | ...
/// ```
pub fn parse_year_range(
    sheet_name: &str,
    year: i32,
    range: &Range<Data>,
) -> Result<RawYearTable, LoadError> {
    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return Err(LoadError::EmptySheet(sheet_name.to_string()));
    }

    let columns = parse_station_headers(sheet_name, range)?;
    debug!("Found {} station columns in {}", columns.len(), sheet_name);

    let mut rows = Vec::with_capacity(height.saturating_sub(1));
    let mut blank_rows = 0;

    for row_idx in 1..height {
        let cells: Vec<RawCell> = (1..=columns.len())
            .map(|col| range.get((row_idx, col)).map_or(RawCell::Empty, RawCell::from))
            .collect();

        let timestamp = match parse_timestamp(range.get((row_idx, 0))) {
            Ok(Some(ts)) => ts,
            Ok(None) if cells.iter().all(|c| *c == RawCell::Empty) => {
                blank_rows += 1;
                continue;
            }
            Ok(None) => {
                return Err(LoadError::InvalidTimestamp {
                    sheet: sheet_name.to_string(),
                    row: row_idx,
                    value: "<empty>".to_string(),
                })
            }
            Err(value) => {
                return Err(LoadError::InvalidTimestamp {
                    sheet: sheet_name.to_string(),
                    row: row_idx,
                    value,
                })
            }
        };

        rows.push(RawRow { timestamp, cells });
    }

    if blank_rows > 0 {
        debug!("Skipped {} blank rows in {}", blank_rows, sheet_name);
    }
    info!(
        "Parsed {} rows x {} stations from sheet {}",
        rows.len(),
        columns.len(),
        sheet_name
    );

    Ok(RawYearTable {
        year,
        columns,
        rows,
    })
}

/// Station headers from row 1.
///
/// A blank header ends the table only when every column from there on is
/// empty in every row; anything to its right would otherwise be lost.
fn parse_station_headers(sheet_name: &str, range: &Range<Data>) -> Result<Vec<String>, LoadError> {
    let mut columns = Vec::new();

    for col in 1..range.width() {
        match range.get((0, col)) {
            Some(Data::String(s)) if !s.trim().is_empty() => columns.push(s.clone()),
            Some(Data::String(_)) | Some(Data::Empty) | None => {
                if let Some(used) = first_used_column(range, col) {
                    return Err(LoadError::InvalidHeader {
                        sheet: sheet_name.to_string(),
                        col,
                        msg: format!("Blank station header, but column {used} holds data"),
                    });
                }
                break;
            }
            Some(other) => {
                return Err(LoadError::InvalidHeader {
                    sheet: sheet_name.to_string(),
                    col,
                    msg: format!("Expected station header text, got: {other:?}"),
                })
            }
        }
    }

    if columns.is_empty() {
        return Err(LoadError::InvalidHeader {
            sheet: sheet_name.to_string(),
            col: 1,
            msg: "No station columns".to_string(),
        });
    }

    Ok(columns)
}

/// First column at or after `from` with a non-blank cell in any row
fn first_used_column(range: &Range<Data>, from: usize) -> Option<usize> {
    let (height, width) = range.get_size();
    (from..width).find(|&col| {
        (0..height).any(|row| match range.get((row, col)) {
            Some(Data::String(s)) => !s.trim().is_empty(),
            Some(Data::Empty) | None => false,
            Some(_) => true,
        })
    })
}

/// Parse the timestamp cell of a data row.
///
/// `Ok(None)` for an empty cell, `Err(raw value)` for anything unparseable.
fn parse_timestamp(cell: Option<&Data>) -> Result<Option<NaiveDateTime>, String> {
    match cell {
        Some(Data::DateTime(excel_dt)) => excel_dt
            .as_datetime()
            .map(round_to_second)
            .map(Some)
            .ok_or_else(|| format!("{excel_dt:?}")),
        Some(Data::DateTimeIso(s)) => parse_timestamp_str(s).map(Some).ok_or_else(|| s.clone()),
        Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Data::String(s)) => parse_timestamp_str(s).map(Some).ok_or_else(|| s.clone()),
        Some(Data::Float(f)) => excel_serial_to_datetime(*f)
            .map(Some)
            .ok_or_else(|| f.to_string()),
        Some(Data::Int(i)) => excel_serial_to_datetime(*i as f64)
            .map(Some)
            .ok_or_else(|| i.to_string()),
        Some(Data::Empty) | None => Ok(None),
        Some(other) => Err(format!("{other:?}")),
    }
}

fn parse_timestamp_str(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            // Date-only cells mean midnight
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert an Excel serial (days since 1899-12-30, fraction = time of day) to a timestamp
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    // Serial fractions are rarely exact, round to the nearest second
    let seconds = (serial * 86_400.0).round();
    if seconds > i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(Duration::try_seconds(seconds as i64)?)
}

fn round_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    let nanos = dt.nanosecond();
    let truncated = dt - Duration::nanoseconds(nanos as i64);
    if nanos >= 500_000_000 {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importers::workbook::{range_from_rows, InMemoryWorkbook};
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn sample_rows() -> Vec<Vec<Data>> {
        vec![
            vec![
                text("Zählstelle        Inbetriebnahme"),
                text("02-MI-JAN-N 01.04.2015"),
                text("17-SZ-BRE-O 01.06.2016"),
            ],
            vec![text("2019-01-01 00:00:00"), Data::Int(12), Data::Float(3.0)],
            vec![text("2019-01-01 01:00:00"), Data::Int(4), Data::Empty],
        ]
    }

    #[test]
    fn test_parse_year_range_valid() {
        let range = range_from_rows(sample_rows());
        let table = parse_year_range("Jahresdatei 2019", 2019, &range).unwrap();

        assert_eq!(table.year, 2019);
        assert_eq!(
            table.columns,
            vec!["02-MI-JAN-N 01.04.2015", "17-SZ-BRE-O 01.06.2016"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell_count(), 4);
        assert_eq!(table.rows[0].cells, vec![RawCell::Int(12), RawCell::Float(3.0)]);
        assert_eq!(table.rows[1].cells[1], RawCell::Empty);
        assert_eq!(table.rows[1].timestamp.hour(), 1);
    }

    #[test]
    fn test_parse_year_range_skips_trailing_blank_rows() {
        let mut rows = sample_rows();
        rows.push(vec![Data::Empty, Data::Empty, Data::Empty]);
        let table = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows)).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_parse_year_range_ignores_trailing_empty_columns() {
        let mut rows = sample_rows();
        for row in rows.iter_mut() {
            row.push(Data::Empty);
            row.push(text("  "));
        }
        let table = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows)).unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.rows[0].cells.len(), 2);
    }

    #[test]
    fn test_parse_year_range_rejects_station_after_blank_header() {
        let rows = vec![
            vec![
                text("Zählstelle        Inbetriebnahme"),
                text("02-MI-JAN-N 01.04.2015"),
                Data::Empty,
                text("12-PA-SCH 01.04.2015"),
            ],
            vec![text("2019-01-01 00:00:00"), Data::Int(5), Data::Empty, Data::Int(99)],
        ];
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        assert!(matches!(result, Err(LoadError::InvalidHeader { col: 2, .. })));
    }

    #[test]
    fn test_parse_year_range_rejects_data_under_blank_header() {
        let mut rows = sample_rows();
        rows[0].push(Data::Empty);
        rows[1].push(Data::Int(7));
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        assert!(matches!(result, Err(LoadError::InvalidHeader { col: 3, .. })));
    }

    #[test]
    fn test_parse_year_range_bad_timestamp() {
        let mut rows = sample_rows();
        rows[2][0] = text("not a date");
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        match result {
            Err(LoadError::InvalidTimestamp { row, value, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "not a date");
            }
            other => panic!("Expected InvalidTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_year_range_missing_timestamp_with_counts() {
        let mut rows = sample_rows();
        rows[1][0] = Data::Empty;
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        assert!(matches!(result, Err(LoadError::InvalidTimestamp { row: 1, .. })));
    }

    #[test]
    fn test_parse_year_range_numeric_header() {
        let mut rows = sample_rows();
        rows[0][2] = Data::Int(1700);
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        assert!(matches!(result, Err(LoadError::InvalidHeader { col: 2, .. })));
    }

    #[test]
    fn test_parse_year_range_empty_sheet() {
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(Vec::new()));
        assert!(matches!(result, Err(LoadError::EmptySheet(_))));
    }

    #[test]
    fn test_excel_serial_to_datetime_with_time() {
        // 43466 = 2019-01-01, .75 = 18:00
        let dt = excel_serial_to_datetime(43466.75).unwrap();
        assert_eq!(dt.to_string(), "2019-01-01 18:00:00");

        // Typical floating point noise on an hourly serial
        let dt = excel_serial_to_datetime(43466.041666666664).unwrap();
        assert_eq!(dt.to_string(), "2019-01-01 01:00:00");
    }

    #[test]
    fn test_excel_serial_out_of_range() {
        assert_eq!(excel_serial_to_datetime(1e15), None);
        assert_eq!(excel_serial_to_datetime(f64::MAX), None);
        assert_eq!(excel_serial_to_datetime(-1.0), None);
    }

    #[test]
    fn test_huge_serial_timestamp_is_a_load_error() {
        let rows = vec![
            vec![text("Zählstelle"), text("02-MI-JAN-N 01.04.2015")],
            vec![Data::Float(1e15), Data::Int(9)],
        ];
        let result = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows));
        assert!(matches!(result, Err(LoadError::InvalidTimestamp { row: 1, .. })));
    }

    #[test]
    fn test_datetime_cells_round_to_the_hour() {
        // Hourly serials as stored by Excel carry floating point noise
        let noisy = |serial: f64| Data::DateTime(ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, false));
        let rows = vec![
            vec![text("Zählstelle"), text("02-MI-JAN-N 01.04.2015")],
            vec![noisy(43466.041666666664), Data::Int(9)],
            vec![noisy(43466.08333333334), Data::Int(4)],
        ];
        let table = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows)).unwrap();
        assert_eq!(table.rows[0].timestamp.to_string(), "2019-01-01 01:00:00");
        assert_eq!(table.rows[1].timestamp.to_string(), "2019-01-01 02:00:00");
        assert_eq!(table.rows[1].timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_serial_timestamps_in_sheet() {
        let rows = vec![
            vec![text("Zählstelle"), text("02-MI-JAN-N 01.04.2015")],
            vec![Data::Float(43466.5), Data::Int(9)],
        ];
        let table = parse_year_range("Jahresdatei 2019", 2019, &range_from_rows(rows)).unwrap();
        assert_eq!(table.rows[0].timestamp.to_string(), "2019-01-01 12:00:00");
    }

    #[test]
    fn test_discover_years() {
        let workbook = InMemoryWorkbook::new()
            .with_sheet("Standortdaten", vec![vec![text("x")]])
            .with_sheet("Jahresdatei 2017", vec![vec![text("x")]])
            .with_sheet("Jahresdatei 2018", vec![vec![text("x")]])
            .with_sheet("Jahresdatei 2018 (alt)", vec![vec![text("x")]]);

        let loader = YearSheetLoader::default();
        assert_eq!(loader.discover_years(&workbook), vec![2017, 2018]);
    }

    #[test]
    fn test_load_year_sheet_not_found() {
        let mut workbook = InMemoryWorkbook::new();
        let result = YearSheetLoader::default().load_year(&mut workbook, 2012);
        match result {
            Err(LoadError::SheetNotFound(sheet)) => assert_eq!(sheet, "Jahresdatei 2012"),
            other => panic!("Expected SheetNotFound, got {other:?}"),
        }
    }
}
