use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::pipeline::calendar::CalendarFields;
use crate::pipeline::station_code::location_id;

/// Column order of the persisted fact table
pub const FACT_COLUMNS: [&str; 13] = [
    "timestamp",
    "station",
    "total_bikes",
    "hour",
    "hour_str",
    "weekday",
    "day_name",
    "month",
    "month_name",
    "year",
    "description",
    "lat",
    "lon",
];

/// One hourly count for one station, enriched with calendar fields and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub station: String,
    pub total_bikes: u32,
    pub hour: u32,
    pub hour_str: String,
    pub weekday: u32,
    pub day_name: String,
    pub month: u32,
    pub month_name: String,
    pub year: i32,
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl FactRow {
    /// Calendar fields as stored on the row
    pub fn calendar(&self) -> CalendarFields {
        CalendarFields {
            hour: self.hour,
            hour_str: self.hour_str.clone(),
            weekday: self.weekday,
            day_name: self.day_name.clone(),
            month: self.month,
            month_name: self.month_name.clone(),
            year: self.year,
        }
    }

    /// Physical counting site shared by all directions (e.g. "17" for "17-SK-BRE-O")
    pub fn location_id(&self) -> &str {
        location_id(&self.station)
    }
}

/// Timestamps are persisted as "YYYY-MM-DD HH:MM:SS"
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Metadata for one counting station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationInfo {
    /// Street name, often with the counting direction appended
    pub description: String,
    pub lat: f64,
    pub lon: f64,
}

/// Canonical station code -> station metadata
#[derive(Debug, Clone, Default)]
pub struct StationMetadata {
    stations: HashMap<String, StationInfo>,
}

impl StationMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert metadata for a station, returning the previous entry if the code was already present
    pub fn insert(&mut self, station: impl Into<String>, info: StationInfo) -> Option<StationInfo> {
        self.stations.insert(station.into(), info)
    }

    pub fn get(&self, station: &str) -> Option<&StationInfo> {
        self.stations.get(station)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

/// The long, one-row-per-(timestamp, station) table all aggregations read from.
///
/// Rows are never mutated once the table is built; filters return new tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactTable {
    rows: Vec<FactRow>,
}

impl FactTable {
    pub fn from_rows(rows: Vec<FactRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FactRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FactRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct years present in the table
    pub fn years(&self) -> BTreeSet<i32> {
        self.rows.iter().map(|r| r.year).collect()
    }

    /// New table holding only rows whose year is in `years`, in the original order
    pub fn filter_years(&self, years: &BTreeSet<i32>) -> FactTable {
        FactTable::from_rows(
            self.rows
                .iter()
                .filter(|r| years.contains(&r.year))
                .cloned()
                .collect(),
        )
    }

    /// Rows with `start <= timestamp < end`
    pub fn between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> impl Iterator<Item = &FactRow> + '_ {
        self.rows
            .iter()
            .filter(move |r| r.timestamp >= start && r.timestamp < end)
    }

    /// Distinct canonical station codes in first-seen order
    pub fn stations(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.station.as_str()))
            .map(|r| r.station.as_str())
            .collect()
    }

    pub fn contains_description(&self, description: &str) -> bool {
        self.rows
            .iter()
            .any(|r| r.description.as_deref() == Some(description))
    }

    pub fn contains_station(&self, station: &str) -> bool {
        self.rows.iter().any(|r| r.station == station)
    }

    pub fn contains_location(&self, location: &str) -> bool {
        self.rows.iter().any(|r| r.location_id() == location)
    }

    /// Description -> location id, the street directory offered to the presentation layer
    pub fn location_directory(&self) -> BTreeMap<String, String> {
        let mut directory = BTreeMap::new();
        for row in &self.rows {
            if let Some(description) = &row.description {
                directory
                    .entry(description.clone())
                    .or_insert_with(|| row.location_id().to_string());
            }
        }
        directory
    }
}

/// Bucket width for time-bucketed totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Frequency {
    Day,
    Week,
    Month,
    Year,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Day => "Day",
            Frequency::Week => "Week",
            Frequency::Month => "Month",
            Frequency::Year => "Year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "d" => Ok(Frequency::Day),
            "week" | "w" => Ok(Frequency::Week),
            "month" | "m" => Ok(Frequency::Month),
            "year" | "y" => Ok(Frequency::Year),
            _ => Err(QueryError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Calendar dimension for polar comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Hour,
    Weekday,
    Month,
}

impl Category {
    pub fn label<'a>(&self, row: &'a FactRow) -> &'a str {
        match self {
            Category::Hour => &row.hour_str,
            Category::Weekday => &row.day_name,
            Category::Month => &row.month_name,
        }
    }

    pub fn sort_key(&self, row: &FactRow) -> u32 {
        match self {
            Category::Hour => row.hour,
            Category::Weekday => row.weekday,
            Category::Month => row.month,
        }
    }
}

impl FromStr for Category {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" | "hour_str" => Ok(Category::Hour),
            "weekday" | "day" | "day_name" => Ok(Category::Weekday),
            "month" | "month_name" => Ok(Category::Month),
            _ => Err(QueryError::UnknownCategory(s.to_string())),
        }
    }
}

/// How the comparison view folds a station's counts into one number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Aggregation {
    Total,
    AveragePerDay,
}

impl FromStr for Aggregation {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total" | "sum" => Ok(Aggregation::Total),
            "average" | "average-per-day" | "mean" => Ok(Aggregation::AveragePerDay),
            _ => Err(QueryError::UnknownAggregation(s.to_string())),
        }
    }
}

/// Which polar series the radial axis is scaled to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeKind {
    Max,
    Median,
}

impl FromStr for RangeKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "max" => Ok(RangeKind::Max),
            "median" => Ok(RangeKind::Median),
            _ => Err(QueryError::UnknownRangeKind(s.to_string())),
        }
    }
}

/// A non-empty set of calendar years
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSet(BTreeSet<i32>);

impl YearSet {
    pub fn new(years: impl IntoIterator<Item = i32>) -> Result<Self, QueryError> {
        let years: BTreeSet<i32> = years.into_iter().collect();
        if years.is_empty() {
            return Err(QueryError::EmptyYearSet);
        }
        Ok(Self(years))
    }

    pub fn contains(&self, year: i32) -> bool {
        self.0.contains(&year)
    }

    /// Smallest year, which supplies the century of the display label
    pub fn first(&self) -> i32 {
        // Non-empty by construction
        self.0.iter().next().copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(station: &str, description: Option<&str>, year: i32) -> FactRow {
        let timestamp = NaiveDate::from_ymd_opt(year, 3, 4)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let calendar = CalendarFields::from_timestamp(timestamp);
        FactRow {
            timestamp,
            station: station.to_string(),
            total_bikes: 5,
            hour: calendar.hour,
            hour_str: calendar.hour_str,
            weekday: calendar.weekday,
            day_name: calendar.day_name,
            month: calendar.month,
            month_name: calendar.month_name,
            year: calendar.year,
            description: description.map(str::to_string),
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn test_frequency_from_str() {
        assert_eq!("Week".parse::<Frequency>().unwrap(), Frequency::Week);
        assert_eq!("m".parse::<Frequency>().unwrap(), Frequency::Month);
        assert!(matches!(
            "fortnight".parse::<Frequency>(),
            Err(QueryError::UnknownFrequency(_))
        ));
    }

    #[test]
    fn test_category_from_str_accepts_column_names() {
        assert_eq!("hour_str".parse::<Category>().unwrap(), Category::Hour);
        assert_eq!("day_name".parse::<Category>().unwrap(), Category::Weekday);
        assert_eq!("month_name".parse::<Category>().unwrap(), Category::Month);
        assert!("minute".parse::<Category>().is_err());
    }

    #[test]
    fn test_aggregation_from_str() {
        assert_eq!("sum".parse::<Aggregation>().unwrap(), Aggregation::Total);
        assert_eq!(
            "mean".parse::<Aggregation>().unwrap(),
            Aggregation::AveragePerDay
        );
    }

    #[test]
    fn test_year_set_rejects_empty() {
        assert!(matches!(
            YearSet::new(Vec::new()),
            Err(QueryError::EmptyYearSet)
        ));
        let years = YearSet::new([2019, 2017]).unwrap();
        assert_eq!(years.first(), 2017);
        assert!(years.contains(2019));
        assert!(!years.contains(2018));
    }

    #[test]
    fn test_fact_table_filter_years_keeps_order() {
        let table = FactTable::from_rows(vec![
            row("02-MI-JAN-N", Some("Jannowitzbrücke Nord"), 2018),
            row("03-MI-SAN-O", None, 2019),
            row("02-MI-JAN-N", Some("Jannowitzbrücke Nord"), 2019),
        ]);
        let filtered = table.filter_years(&BTreeSet::from([2019]));
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.rows()[0].station, "03-MI-SAN-O");
        assert_eq!(table.years(), BTreeSet::from([2018, 2019]));
    }

    #[test]
    fn test_location_directory_skips_null_descriptions() {
        let table = FactTable::from_rows(vec![
            row("17-SK-BRE-O", Some("Breitenbachplatz Ost"), 2019),
            row("17-SK-BRE-W", Some("Breitenbachplatz West"), 2019),
            row("99-XX-UNK", None, 2019),
        ]);
        let directory = table.location_directory();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory["Breitenbachplatz Ost"], "17");
        assert!(table.contains_location("99"));
        assert_eq!(table.stations(), vec!["17-SK-BRE-O", "17-SK-BRE-W", "99-XX-UNK"]);
    }
}
