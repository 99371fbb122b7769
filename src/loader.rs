// File ingestion: population sheet export, crime dataset, region mapping.
//
// Layout assumptions for the population table (preamble offset, column
// order, footer rows) are fixed constants of the source format. Anything
// that violates them is a fatal `IngestError`; there is no partial
// recovery at this stage.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{CrimeFact, MappingRow, RawPopulationRow, RegionMapping};
use crate::util::{parse_f64_cell, parse_i64_cell};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("population table has {found} rows, need at least {need}")]
    TruncatedTable { found: usize, need: usize },
    #[error("row {row}: expected {expected} columns, found {found}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("required column '{0}' not found in input")]
    MissingColumn(String),
    #[error("row {row}, column '{column}': cannot parse '{value}' as a number")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },
}

/// Rows before the header in the population sheet export.
pub const POP_PREAMBLE_ROWS: usize = 6;
/// Known footer/total rows at the end of the population sheet, dropped by
/// fixed offset rather than content matching.
pub const POP_FOOTER_ROWS: usize = 2;

/// The 17 columns of the population sheet, in their documented order. All
/// field access goes through this table by name; nothing slices by bare
/// position.
pub static POP_COLUMNS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "GCCSA code",
        "GCCSA name",
        "SA4 code",
        "SA4 name",
        "SA3 code",
        "SA3 name",
        "SA2 code",
        "SA2 name",
        "2023 Pop",
        "2024 Pop",
        "2023-24 Change",
        "2023-24 Change %",
        "Natural Increase",
        "Net internal migration",
        "Net overseas migration",
        "Area",
        "Population Density",
    ]
});

static POP_COLUMN_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    POP_COLUMNS.iter().enumerate().map(|(i, c)| (*c, i)).collect()
});

fn pop_cell<'r>(record: &'r StringRecord, column: &str) -> &'r str {
    // The index table is built from POP_COLUMNS, so lookups with the
    // constants below cannot miss.
    let idx = POP_COLUMN_INDEX[column];
    record.get(idx).unwrap_or("")
}

fn pop_i64(record: &StringRecord, column: &str, row: usize) -> Result<i64, IngestError> {
    let raw = pop_cell(record, column);
    parse_i64_cell(raw).ok_or_else(|| IngestError::BadNumber {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

fn pop_f64(record: &StringRecord, column: &str, row: usize) -> Result<f64, IngestError> {
    let raw = pop_cell(record, column);
    parse_f64_cell(raw).ok_or_else(|| IngestError::BadNumber {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Load the population table from `reader`.
///
/// Skips the preamble, validates the header width at the fixed offset,
/// drops the two trailing footer rows, and projects each remaining record
/// into a [`RawPopulationRow`].
pub fn load_population(reader: impl Read) -> Result<Vec<RawPopulationRow>, IngestError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records: Vec<StringRecord> = Vec::new();
    for result in rdr.records() {
        records.push(result?);
    }

    let need = POP_PREAMBLE_ROWS + 1 + POP_FOOTER_ROWS;
    if records.len() < need {
        return Err(IngestError::TruncatedTable {
            found: records.len(),
            need,
        });
    }

    let header_row = POP_PREAMBLE_ROWS;
    let header = &records[header_row];
    if header.len() != POP_COLUMNS.len() {
        return Err(IngestError::ColumnCount {
            row: header_row + 1,
            expected: POP_COLUMNS.len(),
            found: header.len(),
        });
    }

    let data_end = records.len() - POP_FOOTER_ROWS;
    let mut rows = Vec::with_capacity(data_end.saturating_sub(header_row + 1));
    for (i, record) in records[header_row + 1..data_end].iter().enumerate() {
        let row = header_row + 2 + i; // 1-based row number for messages
        if record.len() != POP_COLUMNS.len() {
            return Err(IngestError::ColumnCount {
                row,
                expected: POP_COLUMNS.len(),
                found: record.len(),
            });
        }
        rows.push(RawPopulationRow {
            sa3_code: pop_cell(record, "SA3 code").trim().to_string(),
            sa3_name: pop_cell(record, "SA3 name").trim().to_string(),
            sa2_code: pop_cell(record, "SA2 code").trim().to_string(),
            sa2_name: pop_cell(record, "SA2 name").trim().to_string(),
            population_2024: pop_i64(record, "2024 Pop", row)?,
            population_change: pop_i64(record, "2023-24 Change", row)?,
            area_km2: pop_f64(record, "Area", row)?,
        });
    }

    info!(rows = rows.len(), "loaded population table");
    Ok(rows)
}

// Canonical crime schema. Each canonical field lists the exact header
// spellings accepted across the two dataset variants; matching is case- and
// whitespace-sensitive. Unknown columns are ignored.
const CRIME_SUBURB: &[&str] = &["Suburb/Town Name"];
const CRIME_DIVISION: &[&str] = &["Offence Division"];
const CRIME_SUBDIVISION: &[&str] = &["Offence Subdivision"];
const CRIME_CURRENT: &[&str] = &["Incidents Recorded 2025", "Incidents Recorded"];
const CRIME_PRIOR: &[&str] = &["Incidents Recorded 2024"];
const CRIME_CHANGE: &[&str] = &["# change"];
const CRIME_PCT_CHANGE: &[&str] = &["% change"];
const CRIME_LGA: &[&str] = &["Local Government Area"];
const CRIME_REGION: &[&str] = &["Region"];

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h == *n))
}

fn require_column(headers: &StringRecord, names: &[&str]) -> Result<usize, IngestError> {
    find_column(headers, names)
        .ok_or_else(|| IngestError::MissingColumn(names[0].to_string()))
}

/// Per-file accounting of what the crime loader kept and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
}

/// Load the crime dataset from `reader`, normalizing either source variant
/// onto the canonical [`CrimeFact`] schema.
///
/// Rows with unparseable counts are skipped and counted rather than
/// aborting the load; missing required columns are fatal.
pub fn load_crime(reader: impl Read) -> Result<(Vec<CrimeFact>, LoadReport), IngestError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let suburb_idx = require_column(&headers, CRIME_SUBURB)?;
    let division_idx = require_column(&headers, CRIME_DIVISION)?;
    let current_idx = require_column(&headers, CRIME_CURRENT)?;
    let change_idx = require_column(&headers, CRIME_CHANGE)?;
    let lga_idx = require_column(&headers, CRIME_LGA)?;
    let region_idx = require_column(&headers, CRIME_REGION)?;
    // Fine-grained variant only; absent in the division-level export.
    let subdivision_idx = find_column(&headers, CRIME_SUBDIVISION);
    let prior_idx = find_column(&headers, CRIME_PRIOR);
    let pct_idx = find_column(&headers, CRIME_PCT_CHANGE);

    let mut report = LoadReport::default();
    let mut facts = Vec::new();
    for result in rdr.records() {
        let record = result?;
        report.total_rows += 1;

        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();
        let current = parse_i64_cell(cell(current_idx));
        let change = parse_i64_cell(cell(change_idx));
        let (current, change) = match (current, change) {
            (Some(c), Some(d)) => (c, d),
            _ => {
                report.parse_errors += 1;
                continue;
            }
        };

        let prior = prior_idx
            .and_then(|i| parse_i64_cell(cell(i)))
            .unwrap_or(current - change);
        let pct_change = pct_idx
            .and_then(|i| parse_f64_cell(cell(i)))
            .unwrap_or_else(|| {
                if prior != 0 {
                    change as f64 / prior as f64 * 100.0
                } else {
                    0.0
                }
            });

        facts.push(CrimeFact {
            suburb: cell(suburb_idx).to_string(),
            offence_division: cell(division_idx).to_string(),
            offence_subdivision: subdivision_idx
                .map(|i| cell(i).to_string())
                .filter(|s| !s.is_empty()),
            incidents_current_year: current,
            incidents_prior_year: prior,
            change,
            pct_change,
            local_government_area: cell(lga_idx).to_string(),
            region: cell(region_idx).to_string(),
        });
        report.kept_rows += 1;
    }

    if report.parse_errors > 0 {
        warn!(
            skipped = report.parse_errors,
            total = report.total_rows,
            "crime rows dropped due to unparseable counts"
        );
    }
    info!(rows = report.kept_rows, "loaded crime table");
    Ok((facts, report))
}

/// The suburb carrying the metro-wide name in the mapping file; remapped so
/// it joins against the CBD suburb derived from the population data.
const METRO_NAME: &str = "Melbourne";
const CBD_NAME: &str = "Melbourne CBD";

/// Load the suburb-to-region mapping from `reader`, applying the exact-match
/// "Melbourne" -> "Melbourne CBD" key correction.
pub fn load_mapping(reader: impl Read) -> Result<RegionMapping, IngestError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let suburb_idx = require_column(&headers, CRIME_SUBURB)?;
    let region_idx = require_column(&headers, CRIME_REGION)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let suburb = record.get(suburb_idx).unwrap_or("").trim();
        if suburb.is_empty() {
            continue;
        }
        let suburb = if suburb == METRO_NAME { CBD_NAME } else { suburb };
        rows.push(MappingRow {
            suburb: suburb.to_string(),
            region: record.get(region_idx).unwrap_or("").trim().to_string(),
        });
    }

    info!(rows = rows.len(), "loaded region mapping");
    Ok(RegionMapping::from_rows(rows))
}

fn open(path: &Path) -> Result<BufReader<File>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufReader::new(file))
}

pub fn load_population_file(path: &Path) -> Result<Vec<RawPopulationRow>, IngestError> {
    load_population(open(path)?)
}

pub fn load_crime_file(path: &Path) -> Result<(Vec<CrimeFact>, LoadReport), IngestError> {
    load_crime(open(path)?)
}

pub fn load_mapping_file(path: &Path) -> Result<RegionMapping, IngestError> {
    load_mapping(open(path)?)
}
