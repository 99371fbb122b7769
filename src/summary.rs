// Three-tier rollup: selected suburb vs. its parent scope vs. the state.
//
// Lookup misses and ambiguous matches never escape this module; they
// degrade the summary and emit data-quality warnings instead.
use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::types::{CrimeFact, FactTables};
use crate::util::{mean, round_half_even};

/// What the user picked in the suburb selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Suburb(String),
}

impl Selection {
    pub fn parse(input: &str) -> Selection {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Selection::All
        } else {
            Selection::Suburb(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Population,
    Area,
    Incidents,
}

impl Metric {
    /// Count-like metrics sum across rows; area averages instead.
    fn additive(self) -> bool {
        !matches!(self, Metric::Area)
    }
}

/// Which field of the matched rows names the parent scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKey {
    Council,
    Region,
    LocalGovernmentArea,
}

/// A metric value plus its year-on-year delta where the metric has one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeValue {
    pub value: f64,
    pub delta: Option<f64>,
}

/// The parent-scope tier of a summary: the scope's name and its per-suburb
/// mean of the metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentScope {
    pub label: String,
    pub value: f64,
    pub delta: Option<f64>,
}

/// Result of [`compute_summary`]. `own` is absent for the "All" selection
/// and for unknown suburbs; `parent` additionally requires a resolvable
/// scope with at least one member.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSummary {
    pub own: Option<ScopeValue>,
    pub state: ScopeValue,
    pub parent: Option<ParentScope>,
}

// Everything below works on rows at suburb granularity: population facts
// are already one row per suburb instance, crime rows get grouped to
// per-suburb totals first.
struct MetricRow {
    suburb: String,
    scope: Option<String>,
    value: f64,
    delta: Option<f64>,
}

fn metric_rows(facts: &FactTables, metric: Metric, scope_key: ScopeKey) -> Vec<MetricRow> {
    match metric {
        Metric::Population | Metric::Area => facts
            .suburbs
            .iter()
            .map(|f| {
                let scope = match scope_key {
                    // Councils are the local government areas on the
                    // population side.
                    ScopeKey::Council | ScopeKey::LocalGovernmentArea => {
                        Some(f.council.clone())
                    }
                    ScopeKey::Region => f.region.clone(),
                };
                match metric {
                    Metric::Population => MetricRow {
                        suburb: f.suburb.clone(),
                        scope,
                        value: f.population as f64,
                        delta: Some(f.population_change as f64),
                    },
                    _ => MetricRow {
                        suburb: f.suburb.clone(),
                        scope,
                        value: f.area_km2,
                        delta: None,
                    },
                }
            })
            .collect(),
        Metric::Incidents => {
            struct Acc {
                scope: Option<String>,
                current: i64,
                change: i64,
            }
            let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
            for row in &facts.crime {
                let acc = groups.entry(row.suburb.as_str()).or_insert_with(|| Acc {
                    scope: Some(match scope_key {
                        ScopeKey::Region => row.region.clone(),
                        ScopeKey::Council | ScopeKey::LocalGovernmentArea => {
                            row.local_government_area.clone()
                        }
                    }),
                    current: 0,
                    change: 0,
                });
                acc.current += row.incidents_current_year;
                acc.change += row.change;
            }
            groups
                .into_iter()
                .map(|(suburb, acc)| MetricRow {
                    suburb: suburb.to_string(),
                    scope: acc.scope.filter(|s| !s.is_empty()),
                    value: acc.current as f64,
                    delta: Some(acc.change as f64),
                })
                .collect()
        }
    }
}

fn state_tier(rows: &[MetricRow], metric: Metric) -> ScopeValue {
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    if metric.additive() {
        ScopeValue {
            value: values.iter().sum(),
            delta: sum_deltas(rows),
        }
    } else {
        ScopeValue {
            value: mean(&values).unwrap_or(0.0),
            delta: None,
        }
    }
}

fn sum_deltas(rows: &[MetricRow]) -> Option<f64> {
    let deltas: Vec<f64> = rows.iter().filter_map(|r| r.delta).collect();
    if deltas.is_empty() {
        None
    } else {
        Some(deltas.iter().sum())
    }
}

fn mean_deltas(rows: &[&MetricRow]) -> Option<f64> {
    let deltas: Vec<f64> = rows.iter().filter_map(|r| r.delta).collect();
    mean(&deltas)
}

/// Compute the three-tier summary for one metric under one selection.
///
/// "All" reports only the state tier (sum for count-like metrics, mean for
/// area). A named suburb additionally gets its own value and the per-suburb
/// mean of its parent scope. Unknown suburbs degrade to the state tier
/// alone; duplicate suburb names across councils are summed for count-like
/// metrics and surface as data-quality warnings.
pub fn compute_summary(
    facts: &FactTables,
    selection: &Selection,
    metric: Metric,
    scope_key: ScopeKey,
) -> ScopeSummary {
    let rows = metric_rows(facts, metric, scope_key);
    let state = state_tier(&rows, metric);

    let name = match selection {
        Selection::All => {
            return ScopeSummary { own: None, state, parent: None };
        }
        Selection::Suburb(name) => name,
    };

    let matched: Vec<&MetricRow> = rows.iter().filter(|r| &r.suburb == name).collect();
    if matched.is_empty() {
        warn!(suburb = %name, "selected suburb not present in fact table");
        return ScopeSummary { own: None, state, parent: None };
    }
    if matched.len() > 1 {
        warn!(
            suburb = %name,
            instances = matched.len(),
            "suburb name is ambiguous across councils; summing count metrics"
        );
    }

    let own = if metric.additive() {
        let deltas: Vec<f64> = matched.iter().filter_map(|r| r.delta).collect();
        ScopeValue {
            value: matched.iter().map(|r| r.value).sum(),
            delta: if deltas.is_empty() { None } else { Some(deltas.iter().sum()) },
        }
    } else {
        // Area is not meaningfully additive across namesakes; first match.
        ScopeValue {
            value: matched[0].value,
            delta: matched[0].delta,
        }
    };

    let scopes: BTreeSet<&str> = matched
        .iter()
        .filter_map(|r| r.scope.as_deref())
        .collect();
    if scopes.len() > 1 {
        warn!(
            suburb = %name,
            scopes = ?scopes,
            "matched rows disagree on parent scope; using the first"
        );
    }
    let parent = matched[0].scope.as_deref().and_then(|label| {
        let members: Vec<&MetricRow> = rows
            .iter()
            .filter(|r| r.scope.as_deref() == Some(label))
            .collect();
        let values: Vec<f64> = members.iter().map(|r| r.value).collect();
        // Zero-member scopes cannot occur for a matched row, but the mean
        // guard keeps this total regardless.
        mean(&values).map(|value| ParentScope {
            label: label.to_string(),
            value,
            delta: mean_deltas(&members),
        })
    });

    ScopeSummary { own: Some(own), state, parent }
}

/// One row of the offence-division comparison table: the selected suburb's
/// totals against the per-suburb mean of its region.
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionSummary {
    pub division: String,
    pub suburb_incidents: i64,
    pub suburb_change: i64,
    pub region_avg_incidents: Option<i64>,
    pub region_avg_change: Option<i64>,
}

/// Offence divisions carry a single-letter classification prefix
/// ("A Crimes against the person"); strip it for display.
fn strip_division_code(division: &str) -> &str {
    let bytes = division.as_bytes();
    if bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b' ' {
        &division[2..]
    } else {
        division
    }
}

/// Build the per-division comparison for a selected suburb, sorted by
/// division name. Region columns are `None` when the suburb has no region.
pub fn crime_division_summary(
    crime: &[CrimeFact],
    suburb: &str,
    region: Option<&str>,
) -> Vec<DivisionSummary> {
    let mut own: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in crime.iter().filter(|r| r.suburb == suburb) {
        let entry = own
            .entry(strip_division_code(&row.offence_division).to_string())
            .or_default();
        entry.0 += row.incidents_current_year;
        entry.1 += row.change;
    }

    // Region tier: per-suburb totals within each division, then averaged
    // across suburbs, matching the KPI rollup rule.
    let mut region_groups: BTreeMap<String, BTreeMap<&str, (i64, i64)>> = BTreeMap::new();
    if let Some(region) = region {
        for row in crime.iter().filter(|r| r.region == region) {
            let division = strip_division_code(&row.offence_division).to_string();
            let entry = region_groups
                .entry(division)
                .or_default()
                .entry(row.suburb.as_str())
                .or_default();
            entry.0 += row.incidents_current_year;
            entry.1 += row.change;
        }
    }

    own.into_iter()
        .map(|(division, (incidents, change))| {
            let region_avg = region_groups.get(&division).and_then(|suburbs| {
                let incidents: Vec<f64> = suburbs.values().map(|v| v.0 as f64).collect();
                let changes: Vec<f64> = suburbs.values().map(|v| v.1 as f64).collect();
                Some((mean(&incidents)?, mean(&changes)?))
            });
            DivisionSummary {
                division,
                suburb_incidents: incidents,
                suburb_change: change,
                region_avg_incidents: region_avg.map(|(i, _)| round_half_even(i)),
                region_avg_change: region_avg.map(|(_, c)| round_half_even(c)),
            }
        })
        .collect()
}

/// Selector options: "All" followed by the distinct suburb names, sorted.
pub fn suburb_options(facts: &FactTables) -> Vec<String> {
    let names: BTreeSet<&str> = facts.suburbs.iter().map(|f| f.suburb.as_str()).collect();
    let mut options = vec!["All".to_string()];
    options.extend(names.into_iter().map(str::to_string));
    options
}
