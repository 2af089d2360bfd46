use calamine::{Data, DataType};
use std::env;

use bike_count_pipeline::importers::{SheetSource, WorkbookFile, YearSheetLoader};
use bike_count_pipeline::pipeline::station_code::{location_id, station_code_from_header};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let file_path: &str = if args.len() > 1 {
        &args[1]
    } else {
        "gesamtdatei_stundenwerte_2012-2019.xlsx"
    };

    println!("Opening counter workbook: {file_path}");
    let mut workbook = WorkbookFile::open(file_path)?;

    println!("\nSheet names:");
    for (i, name) in workbook.sheet_names().iter().enumerate() {
        println!("  {i}: {name}");
    }

    let loader = YearSheetLoader::default();
    let years = loader.discover_years(&workbook);
    println!("\nYear sheets found: {years:?}");

    // Allow specifying which sheet to examine
    let sheet_name = if args.len() > 2 {
        args[2].clone()
    } else {
        match years.last() {
            Some(&year) => loader.sheet_name(year),
            None => return Err("no year sheets in workbook".into()),
        }
    };

    println!("\n\nExamining sheet: {sheet_name}");
    println!("{}", "=".repeat(100));

    let range = workbook.sheet(&sheet_name)?;
    println!("Dimensions: {:?}", range.get_size());

    println!("\nStation columns:");
    if let Some(header) = range.rows().next() {
        for (col_idx, cell) in header.iter().enumerate().skip(1) {
            if cell.is_empty() {
                break;
            }
            let raw = cell.to_string();
            match station_code_from_header(&raw) {
                Some(code) => println!(
                    "Col {:3}: {:<40} -> {} (location {})",
                    col_idx + 1,
                    raw,
                    code,
                    location_id(&code)
                ),
                None => println!("Col {:3}: {:<40} -> [no station code]", col_idx + 1, raw),
            }
        }
    }

    println!("\nFirst 10 rows (showing first 6 columns):");
    println!("{}", "=".repeat(100));
    for (row_idx, row) in range.rows().enumerate().skip(1).take(10) {
        print!("Row {:3}: ", row_idx + 1);
        for cell in row.iter().take(6) {
            match cell {
                Data::Empty => print!("[empty] "),
                _ => print!("[{cell}] "),
            }
        }
        println!();
    }

    Ok(())
}
