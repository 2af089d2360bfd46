use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::error::{QueryError, UnknownStationError};
use crate::models::{FactTable, Frequency};
use crate::pipeline::station_code::{canonicalize, location_id};
use crate::presentation;

/// Summed counts of one station in one time bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarchartPoint {
    pub description: Option<String>,
    pub station: String,
    /// Bucket label, see [`bucket_label`]
    pub bucket: NaiveDate,
    pub total_bikes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarchartSeries {
    pub frequency: Frequency,
    pub location: String,
    pub title: String,
    pub hovertext: String,
    /// Sorted by (description, station, bucket); empty buckets are absent
    pub points: Vec<BarchartPoint>,
}

impl BarchartSeries {
    pub fn total(&self) -> u64 {
        self.points.iter().map(|p| p.total_bikes).sum()
    }
}

#[derive(Clone, Copy)]
pub struct BarchartService<'a> {
    facts: &'a FactTable,
}

impl<'a> BarchartService<'a> {
    pub fn new(facts: &'a FactTable) -> Self {
        Self { facts }
    }

    /// Time-bucketed totals for every counting direction of one location.
    ///
    /// `station` is either a location id ("17") or any canonical code at that
    /// location ("17-SK-BRE-O"); both select all directions of the site.
    #[instrument(skip(self))]
    pub fn time_series(
        &self,
        frequency: Frequency,
        station: &str,
    ) -> Result<BarchartSeries, QueryError> {
        let station = station.trim();
        let location = location_id(station);
        if !self.facts.contains_location(location) {
            return Err(UnknownStationError::new(station).into());
        }
        // A full code must name a station that was actually counted
        if station != location && !self.facts.contains_station(&canonicalize(station)) {
            return Err(UnknownStationError::new(station).into());
        }

        let mut buckets: BTreeMap<(Option<&str>, &str, NaiveDate), u64> = BTreeMap::new();
        for row in self.facts.rows() {
            if row.location_id() != location {
                continue;
            }
            let bucket = bucket_label(frequency, row.timestamp.date());
            *buckets
                .entry((row.description.as_deref(), row.station.as_str(), bucket))
                .or_insert(0) += u64::from(row.total_bikes);
        }

        let mut names: Vec<&str> = buckets.keys().filter_map(|(d, _, _)| *d).collect();
        names.dedup();
        let title = if names.is_empty() {
            presentation::barchart_title(&[location])
        } else {
            presentation::barchart_title(&names)
        };

        let points: Vec<BarchartPoint> = buckets
            .into_iter()
            .map(|((description, station, bucket), total_bikes)| BarchartPoint {
                description: description.map(str::to_string),
                station: station.to_string(),
                bucket,
                total_bikes,
            })
            .collect();

        debug!(
            "Barchart for location {} at {}: {} buckets",
            location,
            frequency,
            points.len()
        );

        Ok(BarchartSeries {
            frequency,
            location: location.to_string(),
            title,
            hovertext: presentation::barchart_hovertext(frequency),
            points,
        })
    }
}

/// Label of the bucket containing `date`.
///
/// Day: the date itself. Week: the Sunday closing the week.
/// Month: last day of the month. Year: 31 December.
pub fn bucket_label(frequency: Frequency, date: NaiveDate) -> NaiveDate {
    match frequency {
        Frequency::Day => date,
        Frequency::Week => {
            let days_to_sunday = 6 - date.weekday().num_days_from_monday();
            date + Duration::days(i64::from(days_to_sunday))
        }
        Frequency::Month => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|first| first.pred_opt())
                .unwrap_or(date)
        }
        Frequency::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactRow;
    use crate::pipeline::calendar::CalendarFields;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(station: &str, description: Option<&str>, day: NaiveDate, hour: u32, bikes: u32) -> FactRow {
        let timestamp = day.and_hms_opt(hour, 0, 0).unwrap();
        let calendar = CalendarFields::from_timestamp(timestamp);
        FactRow {
            timestamp,
            station: station.to_string(),
            total_bikes: bikes,
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

    fn facts() -> FactTable {
        let ost = Some("Breitenbachplatz Ost");
        let west = Some("Breitenbachplatz West");
        FactTable::from_rows(vec![
            // Monday 2019-01-07 .. Sunday 2019-01-13 is one week
            row("17-SK-BRE-O", ost, date(2019, 1, 7), 8, 10),
            row("17-SK-BRE-W", west, date(2019, 1, 7), 8, 4),
            row("17-SK-BRE-O", ost, date(2019, 1, 13), 18, 5),
            row("17-SK-BRE-O", ost, date(2019, 1, 14), 8, 7),
            row("02-MI-JAN-N", Some("Jannowitzbrücke Nord"), date(2019, 1, 7), 8, 100),
        ])
    }

    #[test]
    fn test_bucket_label_week_ends_on_sunday() {
        assert_eq!(bucket_label(Frequency::Week, date(2019, 1, 7)), date(2019, 1, 13));
        assert_eq!(bucket_label(Frequency::Week, date(2019, 1, 13)), date(2019, 1, 13));
        assert_eq!(bucket_label(Frequency::Week, date(2019, 12, 31)), date(2020, 1, 5));
    }

    #[test]
    fn test_bucket_label_month_and_year() {
        assert_eq!(bucket_label(Frequency::Month, date(2019, 2, 10)), date(2019, 2, 28));
        assert_eq!(bucket_label(Frequency::Month, date(2020, 2, 10)), date(2020, 2, 29));
        assert_eq!(bucket_label(Frequency::Month, date(2019, 12, 1)), date(2019, 12, 31));
        assert_eq!(bucket_label(Frequency::Year, date(2019, 6, 1)), date(2019, 12, 31));
        assert_eq!(bucket_label(Frequency::Day, date(2019, 6, 1)), date(2019, 6, 1));
    }

    #[test]
    fn test_weekly_series_for_location() {
        let facts = facts();
        let series = BarchartService::new(&facts)
            .time_series(Frequency::Week, "17")
            .unwrap();

        assert_eq!(series.location, "17");
        assert_eq!(
            series.title,
            "Data for Bicycle Counter Breitenbachplatz Ost / Breitenbachplatz West"
        );

        let points: Vec<(&str, NaiveDate, u64)> = series
            .points
            .iter()
            .map(|p| (p.station.as_str(), p.bucket, p.total_bikes))
            .collect();
        assert_eq!(
            points,
            vec![
                ("17-SK-BRE-O", date(2019, 1, 13), 15),
                ("17-SK-BRE-O", date(2019, 1, 20), 7),
                ("17-SK-BRE-W", date(2019, 1, 13), 4),
            ]
        );
        assert_eq!(series.total(), 26);
    }

    #[test]
    fn test_full_code_selects_whole_location() {
        let facts = facts();
        let service = BarchartService::new(&facts);
        let by_code = service.time_series(Frequency::Year, "17-SK-BRE-W").unwrap();
        let by_location = service.time_series(Frequency::Year, "17").unwrap();
        assert_eq!(by_code.points, by_location.points);
        assert_eq!(by_code.total(), 26);
    }

    #[test]
    fn test_daily_buckets_are_not_zero_filled() {
        let facts = facts();
        let series = BarchartService::new(&facts)
            .time_series(Frequency::Day, "17")
            .unwrap();
        // 7th (two directions), 13th, 14th; nothing for the days in between
        assert_eq!(series.points.len(), 4);
    }

    #[test]
    fn test_unknown_code_at_known_location() {
        let facts = facts();
        let service = BarchartService::new(&facts);
        assert_eq!(
            service.time_series(Frequency::Year, "02-NOT-A-STATION"),
            Err(QueryError::UnknownStation(UnknownStationError::new("02-NOT-A-STATION")))
        );
        // Known typo spellings still resolve to the counted station
        assert_eq!(service.time_series(Frequency::Year, "17-SZ-BRE-O").unwrap().total(), 26);
    }

    #[test]
    fn test_unknown_location() {
        let facts = facts();
        let result = BarchartService::new(&facts).time_series(Frequency::Day, "42");
        assert_eq!(
            result,
            Err(QueryError::UnknownStation(UnknownStationError::new("42")))
        );
    }

    #[test]
    fn test_title_falls_back_to_location_without_metadata() {
        let facts = FactTable::from_rows(vec![row("99-XX-NEW", None, date(2019, 3, 1), 0, 1)]);
        let series = BarchartService::new(&facts)
            .time_series(Frequency::Month, "99")
            .unwrap();
        assert_eq!(series.title, "Data for Bicycle Counter 99");
        assert_eq!(series.points[0].description, None);
    }
}
