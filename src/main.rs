use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bike_count_pipeline::config::{parse_missing_cells, Config};
use bike_count_pipeline::fact_store::{read_fact_table, write_fact_table};
use bike_count_pipeline::importers::WorkbookFile;
use bike_count_pipeline::models::{Aggregation, Category, Frequency, RangeKind, YearSet};
use bike_count_pipeline::presentation::{self, Palette};
use bike_count_pipeline::services::{highlight_colors, IngestService};
use bike_count_pipeline::PipelineContext;

#[derive(Parser)]
#[command(name = "bike-count-pipeline")]
#[command(about = "Build and query the hourly bicycle counter fact table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the counter workbook and write the flat fact table CSV
    Build {
        /// Source workbook (defaults to BIKE_WORKBOOK_PATH)
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Destination CSV (defaults to BIKE_OUTPUT_PATH)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Years to load, comma separated; all year sheets when omitted
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,

        /// 'skip' or 'reject' empty count cells
        #[arg(long)]
        missing_cells: Option<String>,
    },

    /// Time-bucketed totals for every direction of one counting location
    Barchart {
        /// Location id ("17") or station code ("17-SK-BRE-O")
        #[arg(long)]
        station: String,

        /// Day, Week, Month or Year
        #[arg(long, default_value = "Day")]
        frequency: Frequency,

        /// Fact table CSV (defaults to BIKE_OUTPUT_PATH)
        #[arg(long)]
        facts: Option<PathBuf>,
    },

    /// Median and maximum hourly counts per hour, weekday or month
    Polar {
        /// Station description, e.g. "Jannowitzbrücke Nord"
        #[arg(long)]
        station: String,

        /// Hour, Weekday or Month
        #[arg(long, default_value = "Hour")]
        category: Category,

        /// Restrict to these years, comma separated
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,

        #[arg(long)]
        facts: Option<PathBuf>,
    },

    /// Per-station totals or daily averages for a set of years
    Comparison {
        /// Years to compare, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        years: Vec<i32>,

        /// 'total' or 'average'
        #[arg(long, default_value = "total")]
        aggregation: Aggregation,

        /// Station description to color differently
        #[arg(long)]
        highlight: Option<String>,

        #[arg(long)]
        facts: Option<PathBuf>,
    },

    /// Station description -> location id
    Locations {
        #[arg(long)]
        facts: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bike_count_pipeline=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Build {
            workbook,
            output,
            years,
            missing_cells,
        } => {
            let mut config = config;
            if let Some(workbook) = workbook {
                config.workbook_path = workbook;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if !years.is_empty() {
                config.years = Some(years);
            }
            if let Some(policy) = missing_cells {
                config.missing_cells = parse_missing_cells(&policy)?;
            }
            build(&config)?;
        }
        Command::Barchart {
            station,
            frequency,
            facts,
        } => {
            let context = load_context(facts.as_deref().unwrap_or(&config.output_path))?;
            let series = context.barchart().time_series(frequency, &station)?;
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
        Command::Polar {
            station,
            category,
            years,
            facts,
        } => {
            let context = load_context(facts.as_deref().unwrap_or(&config.output_path))?;
            let years = if years.is_empty() {
                None
            } else {
                Some(YearSet::new(years)?)
            };
            let series = context
                .polar()
                .category_series(category, &station, years.as_ref())?;
            let traces: Vec<_> = [RangeKind::Max, RangeKind::Median]
                .into_iter()
                .map(|kind| {
                    json!({
                        "kind": kind,
                        "color": presentation::polar_trace_color(kind),
                        "hovertemplate": presentation::polar_hovertemplate(kind),
                        "radial_range": series.radial_range.get(kind),
                        "comparison_aggregation": presentation::aggregation_for_range(kind),
                    })
                })
                .collect();
            let output = json!({ "series": series, "traces": traces });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Comparison {
            years,
            aggregation,
            highlight,
            facts,
        } => {
            let context = load_context(facts.as_deref().unwrap_or(&config.output_path))?;
            let series = context.comparison().compare_years(&years, aggregation)?;
            let output = match highlight {
                Some(station) => {
                    let colors = highlight_colors(&series, &station, &Palette::default())?;
                    json!({ "series": series, "colors": colors })
                }
                None => json!({ "series": series }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Locations { facts } => {
            let context = load_context(facts.as_deref().unwrap_or(&config.output_path))?;
            println!("{}", serde_json::to_string_pretty(&context.location_directory())?);
        }
    }

    Ok(())
}

#[instrument(skip(config), fields(workbook = %config.workbook_path.display()))]
fn build(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Opening workbook {}", config.workbook_path.display());
    let mut workbook = WorkbookFile::open(&config.workbook_path)?;

    let progress = ProgressBar::new(0);
    let context = IngestService::new(config.ingest_options()).build_with_progress(&mut workbook, &progress)?;

    let years = context.facts().years();
    if let Ok(years) = YearSet::new(years.iter().copied()) {
        info!("Fact table covers {}", presentation::year_label(&years));
    }

    write_fact_table(&config.output_path, context.facts())?;
    Ok(())
}

fn load_context(path: &Path) -> Result<PipelineContext, Box<dyn std::error::Error>> {
    let facts = read_fact_table(path)?;
    info!("Loaded {} fact rows from {}", facts.len(), path.display());
    Ok(PipelineContext::from_fact_table(facts))
}
