//! Labels, titles and colors handed to the chart layer alongside the query results
use serde::Serialize;

use crate::models::{Aggregation, Frequency, RangeKind, YearSet};

/// Colors of the polar traces
pub const POLAR_MAX_COLOR: &str = "lightgreen";
pub const POLAR_MEDIAN_COLOR: &str = "dodgerblue";

/// Bar colors of the station comparison chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub highlight: String,
    pub neutral: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            highlight: "lightgreen".to_string(),
            neutral: "lightslategray".to_string(),
        }
    }
}

/// Compressed label for a year selection.
///
/// # Examples
///
/// ```
/// use bike_count_pipeline::models::YearSet;
/// use bike_count_pipeline::presentation::year_label;
///
/// assert_eq!(year_label(&YearSet::new([2019]).unwrap()), "2019");
/// assert_eq!(year_label(&YearSet::new([2019, 2017]).unwrap()), "2017/19");
/// assert_eq!(year_label(&YearSet::new([2017, 2018, 2019]).unwrap()), "2017/18/19");
/// ```
pub fn year_label(years: &YearSet) -> String {
    let mut label = format!("{:04}", years.first());
    for year in years.iter().skip(1) {
        label.push_str(&format!("/{:02}", year.rem_euclid(100)));
    }
    label
}

/// d3 time format used on the x axis and in the hover text
pub fn d3_format(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Day => "%b %d, %Y (%a)",
        Frequency::Week => "%b %d, %Y",
        Frequency::Month => "%B %Y",
        Frequency::Year => "%Y",
    }
}

pub fn barchart_hovertext(frequency: Frequency) -> String {
    format!(
        "<b>{}</b>: %{{x|{}}}<br><b>Total Bikes</b>: %{{y}}",
        frequency,
        d3_format(frequency)
    )
}

/// "Data for Bicycle Counter A / B"
pub fn barchart_title(names: &[&str]) -> String {
    format!("Data for Bicycle Counter {}", names.join(" / "))
}

pub fn polar_title(station: &str) -> String {
    format!("Maximum and Median Bikes for {station}")
}

pub fn polar_hovertemplate(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Max => "<b>%{text}</b><br><i>%{theta}</i><br><br>Max: %{r} bikes<extra></extra>",
        RangeKind::Median => {
            "<b>%{text}</b><br><i>%{theta}</i><br><br>Median: %{r} bikes<extra></extra>"
        }
    }
}

pub fn polar_trace_color(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Max => POLAR_MAX_COLOR,
        RangeKind::Median => POLAR_MEDIAN_COLOR,
    }
}

pub fn comparison_axis_label(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Total => "Total Bikes",
        Aggregation::AveragePerDay => "Average Bikes",
    }
}

/// The dashboard pairs the median radial range with the per-day average comparison
pub fn aggregation_for_range(kind: RangeKind) -> Aggregation {
    match kind {
        RangeKind::Max => Aggregation::Total,
        RangeKind::Median => Aggregation::AveragePerDay,
    }
}
