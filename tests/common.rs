//! Synthetic counter workbooks shared by the integration tests
#![allow(dead_code)]

use bike_count_pipeline::importers::InMemoryWorkbook;
use calamine::Data;

pub const JANNOWITZ: &str = "02-MI-JAN-N";
pub const SCHWEDTER: &str = "12-PA-SCH";
pub const UNLISTED: &str = "27-RE-MAR";

pub fn text(s: &str) -> Data {
    Data::String(s.to_string())
}

/// Header as it appears in the year sheets: code plus the commissioning date token
pub fn header(code: &str) -> Data {
    text(&format!("{code} 01.04.2015"))
}

pub fn metadata_sheet() -> Vec<Vec<Data>> {
    vec![
        vec![
            text("Zählstelle"),
            text("Beschreibung - Fahrtrichtung"),
            text("Breitengrad"),
            text("Längengrad"),
        ],
        vec![
            text(JANNOWITZ),
            text("Jannowitzbrücke Nord"),
            Data::Float(52.513),
            Data::Float(13.418),
        ],
        vec![
            text(SCHWEDTER),
            text("Schwedter Steg"),
            Data::Float(52.549),
            Data::Float(13.400),
        ],
    ]
}

/// Year sheet with one row per (timestamp, counts in station order)
pub fn year_sheet(stations: &[&str], rows: &[(&str, Vec<Data>)]) -> Vec<Vec<Data>> {
    let mut sheet = Vec::with_capacity(rows.len() + 1);
    let mut header_row = vec![text("Zählstelle        Inbetriebnahme")];
    header_row.extend(stations.iter().map(|s| header(s)));
    sheet.push(header_row);

    for (timestamp, counts) in rows {
        let mut row = vec![text(timestamp)];
        row.extend(counts.iter().cloned());
        sheet.push(row);
    }
    sheet
}

fn counts(values: [i64; 3]) -> Vec<Data> {
    values.iter().map(|v| Data::Int(*v)).collect()
}

/// Two years, three stations, the third without metadata.
///
/// 2018-12-30 is a Sunday, 2018-12-31 and 2019-01-07 are Mondays,
/// 2019-01-01 is a Tuesday.
pub fn two_year_workbook() -> InMemoryWorkbook {
    let stations = [JANNOWITZ, SCHWEDTER, UNLISTED];
    InMemoryWorkbook::new()
        .with_sheet("Standortdaten", metadata_sheet())
        .with_sheet(
            "Jahresdatei 2018",
            year_sheet(
                &stations,
                &[
                    ("2018-12-30 08:00:00", counts([10, 4, 1])),
                    ("2018-12-31 08:00:00", counts([20, 6, 2])),
                    ("2018-12-31 09:00:00", counts([5, 8, 3])),
                ],
            ),
        )
        .with_sheet(
            "Jahresdatei 2019",
            year_sheet(
                &stations,
                &[
                    ("2019-01-01 08:00:00", counts([7, 10, 4])),
                    ("2019-01-07 08:00:00", counts([3, 2, 5])),
                ],
            ),
        )
}
