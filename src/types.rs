use std::collections::HashMap;

use serde::Serialize;

/// One SA2 row of the population table, projected down to the fields the
/// pipeline actually uses. Hierarchy levels above SA3 are dropped at load
/// time; this struct is immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPopulationRow {
    pub sa3_code: String,
    pub sa3_name: String,
    pub sa2_code: String,
    pub sa2_name: String,
    pub population_2024: i64,
    pub population_change: i64,
    pub area_km2: f64,
}

/// One row per derived (council, suburb) pair. Multiple SA2 rows that share
/// the same derived key are summed into a single fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuburbFact {
    pub council: String,
    pub suburb: String,
    pub population: i64,
    pub area_km2: f64,
    pub population_change: i64,
    /// Mean suburb population across all suburbs of the same council,
    /// rounded half-to-even.
    pub avg_suburb_pop_in_council: i64,
    /// Mean suburb area across all suburbs of the same council.
    pub avg_suburb_area_in_council: f64,
    /// Filled in by the region mapper; `None` when the suburb has no entry
    /// in the mapping table (displayed as the "Other" bucket).
    pub region: Option<String>,
}

/// One crime record at (suburb, offence division, offence subdivision)
/// granularity. The subdivision is `None` when the source variant only
/// carries division-level rollups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeFact {
    pub suburb: String,
    pub offence_division: String,
    pub offence_subdivision: Option<String>,
    pub incidents_current_year: i64,
    pub incidents_prior_year: i64,
    pub change: i64,
    pub pct_change: f64,
    pub local_government_area: String,
    pub region: String,
}

/// A (suburb name, region name) row of the static lookup table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRow {
    pub suburb: String,
    pub region: String,
}

pub const OTHER_REGION: &str = "Other";

/// Static suburb-to-region lookup. Exactly one region per suburb name; the
/// loader applies the "Melbourne" -> "Melbourne CBD" key correction before
/// this structure is built.
#[derive(Debug, Clone, Default)]
pub struct RegionMapping {
    rows: Vec<MappingRow>,
    index: HashMap<String, String>,
}

impl RegionMapping {
    pub fn from_rows(rows: Vec<MappingRow>) -> Self {
        let index = rows
            .iter()
            .map(|r| (r.suburb.clone(), r.region.clone()))
            .collect();
        RegionMapping { rows, index }
    }

    pub fn region_of(&self, suburb: &str) -> Option<&str> {
        self.index.get(suburb).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with a real region assignment, i.e. everything outside the
    /// "Other" sentinel bucket. Used for the definitions view.
    pub fn defined_rows(&self) -> Vec<&MappingRow> {
        self.rows.iter().filter(|r| r.region != OTHER_REGION).collect()
    }
}

/// The normalized tables every summary is computed from. Rebuilt from the
/// source files on each load; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct FactTables {
    pub suburbs: Vec<SuburbFact>,
    pub crime: Vec<CrimeFact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_lookup_and_definitions() {
        let mapping = RegionMapping::from_rows(vec![
            MappingRow { suburb: "Brunswick".into(), region: "Inner North".into() },
            MappingRow { suburb: "Eynesbury".into(), region: OTHER_REGION.into() },
        ]);
        assert_eq!(mapping.region_of("Brunswick"), Some("Inner North"));
        assert_eq!(mapping.region_of("Nowhere"), None);
        assert_eq!(mapping.defined_rows().len(), 1);
        assert_eq!(mapping.defined_rows()[0].suburb, "Brunswick");
    }
}
