// Rendering fact tables and summaries for the console, plus file export.
use std::error::Error;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::summary::{DivisionSummary, ScopeSummary};
use crate::types::{CrimeFact, MappingRow, SuburbFact, OTHER_REGION};
use crate::util::{format_delta, format_float, format_int, round_half_even};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn print_table<T>(rows: Vec<T>)
where
    T: Tabled,
{
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table = Table::new(rows).with(Style::markdown()).to_string();
    println!("{}\n", table);
}

/// One line of a KPI tile: the scope name, the metric value, and the delta
/// where the metric has one.
#[derive(Tabled)]
pub struct KpiRow {
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Change")]
    pub delta: String,
}

/// Render a [`ScopeSummary`] as KPI rows: state first, then the selected
/// suburb, then the parent-scope average. Count metrics round to whole
/// numbers; area keeps one decimal.
pub fn kpi_rows(
    summary: &ScopeSummary,
    state_label: &str,
    own_label: Option<&str>,
    area_metric: bool,
) -> Vec<KpiRow> {
    let value = |v: f64| {
        if area_metric {
            format_float(v, 1)
        } else {
            format_int(round_half_even(v))
        }
    };
    let delta = |d: Option<f64>| match d {
        Some(d) => format_delta(round_half_even(d)),
        None => String::new(),
    };

    let mut rows = vec![KpiRow {
        scope: state_label.to_string(),
        value: value(summary.state.value),
        delta: delta(summary.state.delta),
    }];
    if let (Some(own), Some(label)) = (&summary.own, own_label) {
        rows.push(KpiRow {
            scope: label.to_string(),
            value: value(own.value),
            delta: delta(own.delta),
        });
    }
    if let Some(parent) = &summary.parent {
        rows.push(KpiRow {
            scope: format!("{} Avg", parent.label),
            value: value(parent.value),
            delta: delta(parent.delta),
        });
    }
    rows
}

#[derive(Tabled)]
pub struct SuburbFactRow {
    #[tabled(rename = "Council")]
    council: String,
    #[tabled(rename = "Suburb")]
    suburb: String,
    #[tabled(rename = "Population")]
    population: String,
    #[tabled(rename = "Area km^2")]
    area_km2: String,
    #[tabled(rename = "Population Change")]
    population_change: String,
    #[tabled(rename = "Region")]
    region: String,
}

impl From<&SuburbFact> for SuburbFactRow {
    fn from(f: &SuburbFact) -> Self {
        SuburbFactRow {
            council: f.council.clone(),
            suburb: f.suburb.clone(),
            population: format_int(f.population),
            area_km2: format_float(f.area_km2, 1),
            population_change: format_delta(f.population_change),
            region: f.region.clone().unwrap_or_else(|| OTHER_REGION.to_string()),
        }
    }
}

#[derive(Tabled)]
pub struct CrimeFactRow {
    #[tabled(rename = "Suburb")]
    suburb: String,
    #[tabled(rename = "Offence Division")]
    division: String,
    #[tabled(rename = "Offence Subdivision")]
    subdivision: String,
    #[tabled(rename = "Incidents")]
    incidents: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "LGA")]
    lga: String,
    #[tabled(rename = "Region")]
    region: String,
}

impl From<&CrimeFact> for CrimeFactRow {
    fn from(f: &CrimeFact) -> Self {
        CrimeFactRow {
            suburb: f.suburb.clone(),
            division: f.offence_division.clone(),
            subdivision: f.offence_subdivision.clone().unwrap_or_default(),
            incidents: format_int(f.incidents_current_year),
            change: format_delta(f.change),
            lga: f.local_government_area.clone(),
            region: f.region.clone(),
        }
    }
}

/// Column order follows the comparison view: suburb value next to the
/// region average for incidents, then the same pair for change.
#[derive(Tabled)]
pub struct DivisionRow {
    #[tabled(rename = "Offence Division")]
    division: String,
    #[tabled(rename = "Suburb Incidents")]
    suburb_incidents: String,
    #[tabled(rename = "Region Incidents Avg")]
    region_incidents: String,
    #[tabled(rename = "Suburb Change")]
    suburb_change: String,
    #[tabled(rename = "Region Change Avg")]
    region_change: String,
}

impl From<&DivisionSummary> for DivisionRow {
    fn from(d: &DivisionSummary) -> Self {
        DivisionRow {
            division: d.division.clone(),
            suburb_incidents: format_int(d.suburb_incidents),
            region_incidents: d.region_avg_incidents.map(format_int).unwrap_or_default(),
            suburb_change: format_delta(d.suburb_change),
            region_change: d
                .region_avg_change
                .map(format_delta)
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
pub struct MappingDisplayRow {
    #[tabled(rename = "Suburb")]
    suburb: String,
    #[tabled(rename = "Region")]
    region: String,
}

impl From<&MappingRow> for MappingDisplayRow {
    fn from(r: &MappingRow) -> Self {
        MappingDisplayRow {
            suburb: r.suburb.clone(),
            region: r.region.clone(),
        }
    }
}
