// Console front end: loads the datasets once at startup, then serves an
// interactive selection loop that recomputes the scoped summaries on every
// choice, mirroring a page reload.
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use suburb_report::loader;
use suburb_report::output::{
    self, CrimeFactRow, DivisionRow, MappingDisplayRow, SuburbFactRow,
};
use suburb_report::summary::{
    compute_summary, crime_division_summary, suburb_options, Metric, ScopeKey, Selection,
};
use suburb_report::transform::{CrimeGranularity, HyphenSplit};
use suburb_report::types::{FactTables, RegionMapping, OTHER_REGION};
use suburb_report::{build_fact_tables, util};

#[derive(Parser)]
#[command(author, version, about = "Suburb profile report over population and crime statistics")]
struct Cli {
    /// CSV export of the SA2 population sheet.
    #[arg(long, value_name = "FILE", default_value = "data/population_by_sa2.csv")]
    population: PathBuf,
    /// Crime incident dataset.
    #[arg(long, value_name = "FILE", default_value = "data/crime_by_suburb.csv")]
    crime: PathBuf,
    /// Suburb-to-region mapping table.
    #[arg(long, value_name = "FILE", default_value = "data/suburb_regions.csv")]
    mapping: PathBuf,
    /// Granularity of the crime source variant.
    #[arg(long, value_enum, default_value = "subdivision")]
    crime_granularity: GranularityArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    /// One row per suburb and offence subdivision (already fine-grained).
    Subdivision,
    /// Needs a rollup to suburb and offence division.
    Division,
}

impl From<GranularityArg> for CrimeGranularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Subdivision => CrimeGranularity::Subdivision,
            GranularityArg::Division => CrimeGranularity::Division,
        }
    }
}

struct AppData {
    tables: FactTables,
    mapping: RegionMapping,
}

/// Load and transform everything. Any ingestion failure here is fatal; no
/// partial state survives.
fn load_all(cli: &Cli) -> Result<AppData, loader::IngestError> {
    let raw_population = loader::load_population_file(&cli.population)?;
    let (raw_crime, report) = loader::load_crime_file(&cli.crime)?;
    let mapping = loader::load_mapping_file(&cli.mapping)?;
    let tables = build_fact_tables(
        &raw_population,
        &raw_crime,
        cli.crime_granularity.into(),
        &mapping,
        &HyphenSplit,
    );
    println!(
        "Loaded {} suburbs, {} crime rows ({} skipped), {} mapping entries.\n",
        util::format_int(tables.suburbs.len() as i64),
        util::format_int(report.kept_rows as i64),
        util::format_int(report.parse_errors as i64),
        util::format_int(mapping.len() as i64),
    );
    Ok(AppData { tables, mapping })
}

fn read_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn handle_summary(data: &AppData) {
    let options = suburb_options(&data.tables);
    println!("{} suburbs available.", options.len() - 1);
    let input = read_line("Select suburb (or All): ");
    if input.is_empty() {
        return;
    }
    let selection = Selection::parse(&input);
    let own_label = match &selection {
        Selection::All => None,
        Selection::Suburb(name) => Some(name.as_str()),
    };

    println!("\nResidents");
    let population = compute_summary(&data.tables, &selection, Metric::Population, ScopeKey::Region);
    output::print_table(output::kpi_rows(&population, "VIC", own_label, false));

    println!("Area km^2");
    let area = compute_summary(&data.tables, &selection, Metric::Area, ScopeKey::Region);
    output::print_table(output::kpi_rows(&area, "VIC", own_label, true));

    println!("Incidents");
    let incidents = compute_summary(
        &data.tables,
        &selection,
        Metric::Incidents,
        ScopeKey::LocalGovernmentArea,
    );
    output::print_table(output::kpi_rows(&incidents, "VIC", own_label, false));

    match &selection {
        Selection::All => {
            println!("Suburb Profile (first 10 rows)");
            let suburbs: Vec<SuburbFactRow> =
                data.tables.suburbs.iter().take(10).map(Into::into).collect();
            output::print_table(suburbs);
            println!("Crime Profile (first 10 rows)");
            let preview: Vec<CrimeFactRow> =
                data.tables.crime.iter().take(10).map(Into::into).collect();
            output::print_table(preview);
        }
        Selection::Suburb(name) => {
            println!("Crime Profile");
            let region = data
                .tables
                .suburbs
                .iter()
                .find(|f| &f.suburb == name)
                .and_then(|f| f.region.as_deref());
            let rows = crime_division_summary(&data.tables.crime, name, region);
            let display: Vec<DivisionRow> = rows.iter().map(Into::into).collect();
            output::print_table(display);
        }
    }
}

fn handle_definitions(data: &AppData) {
    println!("Suburbs in each region (excluding the {OTHER_REGION} bucket):");
    let rows: Vec<MappingDisplayRow> = data.mapping.defined_rows().into_iter().map(Into::into).collect();
    output::print_table(rows);
}

fn handle_export(data: &AppData) {
    let suburb_file = "suburb_facts.csv";
    if let Err(e) = output::write_csv(suburb_file, &data.tables.suburbs) {
        eprintln!("Write error: {e}");
    } else {
        println!("Suburb facts exported to {suburb_file}");
    }
    let crime_file = "crime_facts.csv";
    if let Err(e) = output::write_csv(crime_file, &data.tables.crime) {
        eprintln!("Write error: {e}");
    } else {
        println!("Crime facts exported to {crime_file}");
    }

    let summary = PipelineSummary::new(data);
    if let Err(e) = output::write_json("pipeline_summary.json", &summary) {
        eprintln!("Write error: {e}");
    } else {
        println!(
            "Summary written to pipeline_summary.json (total population {})\n",
            util::format_int(summary.total_population)
        );
    }
}

#[derive(serde::Serialize)]
struct PipelineSummary {
    suburbs: usize,
    mapped_suburbs: usize,
    crime_rows: usize,
    total_population: i64,
    total_incidents: i64,
}

impl PipelineSummary {
    fn new(data: &AppData) -> Self {
        PipelineSummary {
            suburbs: data.tables.suburbs.len(),
            mapped_suburbs: data
                .tables
                .suburbs
                .iter()
                .filter(|f| f.region.is_some())
                .count(),
            crime_rows: data.tables.crime.len(),
            total_population: data.tables.suburbs.iter().map(|f| f.population).sum(),
            total_incidents: data
                .tables
                .crime
                .iter()
                .map(|f| f.incidents_current_year)
                .sum(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut data = load_all(&cli)?;

    loop {
        println!("What is this suburb like?");
        println!("[1] Suburb summary");
        println!("[2] Region definitions");
        println!("[3] Export fact tables");
        println!("[4] Reload datasets");
        println!("[Q] Quit\n");
        match read_line("Enter choice: ").to_uppercase().as_str() {
            "1" => handle_summary(&data),
            "2" => handle_definitions(&data),
            "3" => handle_export(&data),
            "4" => match load_all(&cli) {
                Ok(reloaded) => data = reloaded,
                Err(e) => eprintln!("Reload failed, keeping previous data: {e}\n"),
            },
            "Q" => break,
            _ => println!("Invalid choice. Please enter 1-4 or Q.\n"),
        }
    }
    Ok(())
}
