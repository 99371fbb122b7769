// Reshaping raw tables into the canonical suburb-level facts.
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::types::{CrimeFact, RawPopulationRow, RegionMapping, SuburbFact};
use crate::util::{mean, round_half_even};

/// Maps an administrative area name (SA2/SA3) to the locality name used as
/// the suburb or council key.
///
/// The hyphen rule below is a stand-in for a proper gazetteer; aggregation
/// code only ever sees this trait, so a canonical boundary dataset can
/// replace it without touching anything downstream.
pub trait SuburbNamer {
    fn locality(&self, admin_name: &str) -> String;
}

/// Takes the text before the first hyphen, trimmed; names without a hyphen
/// pass through trimmed. "Melton-Bacchus Marsh" -> "Melton",
/// "North Ward - East" -> "North Ward", "Box Hill" -> "Box Hill".
#[derive(Debug, Clone, Copy, Default)]
pub struct HyphenSplit;

impl SuburbNamer for HyphenSplit {
    fn locality(&self, admin_name: &str) -> String {
        match admin_name.split_once('-') {
            Some((head, _)) => head.trim().to_string(),
            None => admin_name.trim().to_string(),
        }
    }
}

/// Which granularity the crime source arrives at. The fine-grained variant
/// is already one row per suburb and offence subdivision; the other needs a
/// rollup to suburb and offence division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrimeGranularity {
    Subdivision,
    Division,
}

/// Build the suburb fact table from raw SA2 population rows.
///
/// Derives suburb and council from SA2/SA3 names, sums rows sharing the
/// derived key, and attaches per-council mean population (rounded
/// half-to-even) and mean area to every row of the council. Regions are
/// attached separately by [`attach_region`].
pub fn normalize_population(
    raw_rows: &[RawPopulationRow],
    namer: &dyn SuburbNamer,
) -> Vec<SuburbFact> {
    #[derive(Default)]
    struct Acc {
        population: i64,
        change: i64,
        area: f64,
    }

    // BTreeMap keeps the grouping deterministic across runs.
    let mut groups: BTreeMap<(String, String), Acc> = BTreeMap::new();
    for row in raw_rows {
        let council = namer.locality(&row.sa3_name);
        let suburb = namer.locality(&row.sa2_name);
        let acc = groups.entry((council, suburb)).or_default();
        acc.population += row.population_2024;
        acc.change += row.population_change;
        acc.area += row.area_km2;
    }
    debug!(
        source_rows = raw_rows.len(),
        suburbs = groups.len(),
        "grouped population rows"
    );

    let mut council_pops: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut council_areas: HashMap<&str, Vec<f64>> = HashMap::new();
    for ((council, _), acc) in &groups {
        council_pops.entry(council.as_str()).or_default().push(acc.population as f64);
        council_areas.entry(council.as_str()).or_default().push(acc.area);
    }
    let council_avgs: HashMap<String, (i64, f64)> = council_pops
        .iter()
        .map(|(council, pops)| {
            // Every council present in council_pops has at least one suburb.
            let avg_pop = round_half_even(mean(pops).unwrap_or(0.0));
            let avg_area = council_areas
                .get(council)
                .and_then(|areas| mean(areas))
                .unwrap_or(0.0);
            (council.to_string(), (avg_pop, avg_area))
        })
        .collect();

    groups
        .into_iter()
        .map(|((council, suburb), acc)| {
            let (avg_pop, avg_area) = council_avgs[&council];
            SuburbFact {
                council,
                suburb,
                population: acc.population,
                area_km2: acc.area,
                population_change: acc.change,
                avg_suburb_pop_in_council: avg_pop,
                avg_suburb_area_in_council: avg_area,
                region: None,
            }
        })
        .collect()
}

/// Normalize crime facts to the requested granularity.
///
/// At `Subdivision` the input passes through unchanged. At `Division` rows
/// are grouped by (suburb, offence division), incidents and change summed,
/// and the percent change recomputed from the summed counts.
pub fn normalize_crime(raw_rows: &[CrimeFact], granularity: CrimeGranularity) -> Vec<CrimeFact> {
    match granularity {
        CrimeGranularity::Subdivision => raw_rows.to_vec(),
        CrimeGranularity::Division => {
            #[derive(Default)]
            struct Acc {
                current: i64,
                prior: i64,
                change: i64,
                lga: String,
                region: String,
            }
            let mut groups: BTreeMap<(String, String), Acc> = BTreeMap::new();
            for row in raw_rows {
                let key = (row.suburb.clone(), row.offence_division.clone());
                let acc = groups.entry(key).or_default();
                acc.current += row.incidents_current_year;
                acc.prior += row.incidents_prior_year;
                acc.change += row.change;
                if acc.lga.is_empty() {
                    acc.lga = row.local_government_area.clone();
                    acc.region = row.region.clone();
                }
            }
            groups
                .into_iter()
                .map(|((suburb, division), acc)| {
                    let pct_change = if acc.prior != 0 {
                        acc.change as f64 / acc.prior as f64 * 100.0
                    } else {
                        0.0
                    };
                    CrimeFact {
                        suburb,
                        offence_division: division,
                        offence_subdivision: None,
                        incidents_current_year: acc.current,
                        incidents_prior_year: acc.prior,
                        change: acc.change,
                        pct_change,
                        local_government_area: acc.lga,
                        region: acc.region,
                    }
                })
                .collect()
        }
    }
}

/// Left-join the region mapping onto the suburb facts by exact suburb name.
/// Suburbs without a mapping entry keep `region: None`; they surface in the
/// "Other" bucket and never contribute to region means.
pub fn attach_region(facts: Vec<SuburbFact>, mapping: &RegionMapping) -> Vec<SuburbFact> {
    facts
        .into_iter()
        .map(|mut fact| {
            fact.region = mapping.region_of(&fact.suburb).map(str::to_string);
            fact
        })
        .collect()
}
