use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::error::{QueryError, UnknownStationError};
use crate::models::{Category, FactTable, RangeKind, YearSet};
use crate::presentation;

/// One category bucket of a polar series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarPoint {
    pub label: String,
    pub sort_key: u32,
    pub total_bikes: f64,
}

/// Radial axis maxima, one per series so either view can be scaled on its own.
///
/// Both are `0.0` when the series are empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadialRange {
    pub max: f64,
    pub median: f64,
}

impl RadialRange {
    pub fn get(&self, kind: RangeKind) -> f64 {
        match kind {
            RangeKind::Max => self.max,
            RangeKind::Median => self.median,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarSeries {
    pub category: Category,
    pub station: String,
    pub title: String,
    /// Sorted by natural category order
    pub median: Vec<PolarPoint>,
    /// Sorted by natural category order
    pub max: Vec<PolarPoint>,
    pub radial_range: RadialRange,
}

impl PolarSeries {
    /// Category labels in display order
    pub fn categories(&self) -> Vec<&str> {
        self.median.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn series(&self, kind: RangeKind) -> &[PolarPoint] {
        match kind {
            RangeKind::Max => &self.max,
            RangeKind::Median => &self.median,
        }
    }
}

#[derive(Clone, Copy)]
pub struct PolarService<'a> {
    facts: &'a FactTable,
}

impl<'a> PolarService<'a> {
    pub fn new(facts: &'a FactTable) -> Self {
        Self { facts }
    }

    /// Median and maximum hourly count per category for one station description.
    ///
    /// `years` restricts the rows considered; `None` uses every year.
    #[instrument(skip(self))]
    pub fn category_series(
        &self,
        category: Category,
        station: &str,
        years: Option<&YearSet>,
    ) -> Result<PolarSeries, QueryError> {
        if !self.facts.contains_description(station) {
            return Err(UnknownStationError::new(station).into());
        }

        // Keyed by natural sort key first so "April" never precedes "January"
        let mut groups: BTreeMap<(u32, &str), Vec<u32>> = BTreeMap::new();
        for row in self.facts.rows() {
            if row.description.as_deref() != Some(station) {
                continue;
            }
            if years.is_some_and(|y| !y.contains(row.year)) {
                continue;
            }
            groups
                .entry((category.sort_key(row), category.label(row)))
                .or_default()
                .push(row.total_bikes);
        }

        let mut median = Vec::with_capacity(groups.len());
        let mut max = Vec::with_capacity(groups.len());
        for ((sort_key, label), mut values) in groups {
            median.push(PolarPoint {
                label: label.to_string(),
                sort_key,
                total_bikes: median_of(&mut values),
            });
            max.push(PolarPoint {
                label: label.to_string(),
                sort_key,
                total_bikes: values.iter().copied().max().map_or(0.0, f64::from),
            });
        }

        let radial_range = RadialRange {
            max: series_max(&max),
            median: series_max(&median),
        };

        debug!(
            "Polar series for {} by {:?}: {} categories",
            station,
            category,
            median.len()
        );

        Ok(PolarSeries {
            category,
            station: station.to_string(),
            title: presentation::polar_title(station),
            median,
            max,
            radial_range,
        })
    }
}

/// Median of the values; the mean of the two middle values for even lengths
fn median_of(values: &mut [u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
    } else {
        f64::from(values[mid])
    }
}

fn series_max(points: &[PolarPoint]) -> f64 {
    points
        .iter()
        .map(|p| p.total_bikes)
        .fold(0.0, f64::max)
}
