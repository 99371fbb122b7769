pub mod loader;
pub mod output;
pub mod summary;
pub mod transform;
pub mod types;
pub mod util;

use transform::{CrimeGranularity, SuburbNamer};
use types::{CrimeFact, FactTables, RawPopulationRow, RegionMapping};

/// Run the full transformation over already-loaded raw tables: normalize
/// population to suburb facts, roll crime up to the requested granularity,
/// and left-join the region mapping.
pub fn build_fact_tables(
    population: &[RawPopulationRow],
    crime: &[CrimeFact],
    granularity: CrimeGranularity,
    mapping: &RegionMapping,
    namer: &dyn SuburbNamer,
) -> FactTables {
    let suburbs = transform::attach_region(transform::normalize_population(population, namer), mapping);
    let crime = transform::normalize_crime(crime, granularity);
    FactTables { suburbs, crime }
}
