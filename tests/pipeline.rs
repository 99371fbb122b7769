// End-to-end pipeline: CSV inputs -> loaders -> fact tables -> summaries.
use suburb_report::build_fact_tables;
use suburb_report::loader::{load_crime, load_mapping, load_population, POP_COLUMNS, POP_PREAMBLE_ROWS};
use suburb_report::summary::{compute_summary, crime_division_summary, Metric, ScopeKey, Selection};
use suburb_report::transform::{CrimeGranularity, HyphenSplit};
use suburb_report::types::FactTables;

fn population_csv() -> String {
    let pad = ",".repeat(POP_COLUMNS.len() - 1);
    let mut out = String::new();
    for _ in 0..POP_PREAMBLE_ROWS {
        out.push_str(&format!("preamble{pad}\n"));
    }
    out.push_str(&POP_COLUMNS.join(","));
    out.push('\n');
    let data_row = |sa3: &str, sa2: &str, pop23: i64, pop24: i64, change: i64, area: f64| {
        format!(
            "2GMEL,Greater Melbourne,206,Melbourne - Inner,20601,{sa3},206011105,{sa2},{pop23},{pop24},{change},1.0,0,0,0,{area},1000\n"
        )
    };
    out.push_str(&data_row("Darebin - North", "Reservoir - East", 29_600, 30_000, 400, 10.0));
    out.push_str(&data_row("Darebin - North", "Reservoir - West", 24_900, 25_000, 100, 10.2));
    out.push_str(&data_row("Darebin - North", "Preston", 34_500, 35_000, 500, 11.4));
    out.push_str(&data_row("Melbourne City", "Melbourne CBD - East", 24_100, 25_000, 900, 2.4));
    out.push_str(&data_row("Whitehorse - West", "Box Hill", 24_700, 25_000, 300, 7.0));
    out.push_str(&format!("Total{pad}\n"));
    out.push_str(&format!("(c) Commonwealth of Australia{pad}\n"));
    out
}

const CRIME_CSV: &str = "\
Suburb/Town Name,Offence Division,Offence Subdivision,Incidents Recorded 2025,Incidents Recorded 2024,# change,% change,Local Government Area,Region
Reservoir,A Crimes against the person,A20 Assault and related offences,120,100,20,20.0,Darebin,North
Reservoir,B Property and deception offences,B40 Theft,200,150,50,33.3,Darebin,North
Preston,A Crimes against the person,A20 Assault and related offences,80,90,-10,-11.1,Darebin,North
Box Hill,B Property and deception offences,B40 Theft,60,55,5,9.1,Whitehorse,East
";

const MAPPING_CSV: &str = "\
Suburb/Town Name,Region
Melbourne,Inner Metro
Reservoir,North
Preston,North
Box Hill,East
";

fn build() -> FactTables {
    let raw_population = load_population(population_csv().as_bytes()).unwrap();
    let (raw_crime, report) = load_crime(CRIME_CSV.as_bytes()).unwrap();
    assert_eq!(report.parse_errors, 0);
    let mapping = load_mapping(MAPPING_CSV.as_bytes()).unwrap();
    build_fact_tables(
        &raw_population,
        &raw_crime,
        CrimeGranularity::Subdivision,
        &mapping,
        &HyphenSplit,
    )
}

#[test]
fn population_is_conserved_under_regrouping() {
    let tables = build();
    // Five source rows (footer excluded) sum to the fact-table total.
    let total: i64 = tables.suburbs.iter().map(|f| f.population).sum();
    assert_eq!(total, 30_000 + 25_000 + 35_000 + 25_000 + 25_000);
    // The two Reservoir SA2s collapse into one fact.
    assert_eq!(tables.suburbs.len(), 4);
}

#[test]
fn council_averages_attach_to_every_row() {
    let tables = build();
    let darebin: Vec<_> = tables.suburbs.iter().filter(|f| f.council == "Darebin").collect();
    assert_eq!(darebin.len(), 2);
    for fact in darebin {
        // (55,000 + 35,000) / 2
        assert_eq!(fact.avg_suburb_pop_in_council, 45_000);
    }
}

#[test]
fn melbourne_cbd_joins_through_the_corrected_key() {
    let tables = build();
    let cbd = tables.suburbs.iter().find(|f| f.suburb == "Melbourne CBD").unwrap();
    assert_eq!(cbd.region.as_deref(), Some("Inner Metro"));
}

#[test]
fn all_selection_totals_match_the_tables() {
    let tables = build();
    let pop = compute_summary(&tables, &Selection::All, Metric::Population, ScopeKey::Region);
    assert_eq!(pop.state.value, 140_000.0);
    assert_eq!(pop.state.delta, Some(2_200.0));

    let area = compute_summary(&tables, &Selection::All, Metric::Area, ScopeKey::Region);
    let expected = (20.2 + 11.4 + 2.4 + 7.0) / 4.0;
    assert!((area.state.value - expected).abs() < 1e-9);

    let incidents = compute_summary(&tables, &Selection::All, Metric::Incidents, ScopeKey::Region);
    assert_eq!(incidents.state.value, 460.0);
    assert_eq!(incidents.state.delta, Some(65.0));
}

#[test]
fn selected_suburb_gets_own_state_and_parent_tiers() {
    let tables = build();
    let selection = Selection::Suburb("Reservoir".into());

    let pop = compute_summary(&tables, &selection, Metric::Population, ScopeKey::Region);
    assert_eq!(pop.own.as_ref().unwrap().value, 55_000.0);
    let parent = pop.parent.as_ref().unwrap();
    assert_eq!(parent.label, "North");
    assert_eq!(parent.value, 45_000.0);

    let incidents =
        compute_summary(&tables, &selection, Metric::Incidents, ScopeKey::LocalGovernmentArea);
    assert_eq!(incidents.own.as_ref().unwrap().value, 320.0);
    let parent = incidents.parent.as_ref().unwrap();
    assert_eq!(parent.label, "Darebin");
    // Per-suburb totals within Darebin: Reservoir 320, Preston 80.
    assert_eq!(parent.value, 200.0);
}

#[test]
fn unknown_suburb_never_panics() {
    let tables = build();
    let selection = Selection::Suburb("Atlantis".into());
    for (metric, scope) in [
        (Metric::Population, ScopeKey::Council),
        (Metric::Area, ScopeKey::Region),
        (Metric::Incidents, ScopeKey::LocalGovernmentArea),
    ] {
        let s = compute_summary(&tables, &selection, metric, scope);
        assert!(s.own.is_none());
        assert!(s.parent.is_none());
    }
}

#[test]
fn division_comparison_matches_region_membership() {
    let tables = build();
    let rows = crime_division_summary(&tables.crime, "Reservoir", Some("North"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].division, "Crimes against the person");
    // North per-suburb totals for the division: Reservoir 120, Preston 80.
    assert_eq!(rows[0].region_avg_incidents, Some(100));
    assert_eq!(rows[1].division, "Property and deception offences");
    assert_eq!(rows[1].suburb_incidents, 200);
    // Box Hill is in East, so Reservoir is the only North suburb here.
    assert_eq!(rows[1].region_avg_incidents, Some(200));
}

#[test]
fn division_granularity_rollup_through_the_pipeline() {
    let raw_population = load_population(population_csv().as_bytes()).unwrap();
    let (raw_crime, _) = load_crime(CRIME_CSV.as_bytes()).unwrap();
    let mapping = load_mapping(MAPPING_CSV.as_bytes()).unwrap();
    let tables = build_fact_tables(
        &raw_population,
        &raw_crime,
        CrimeGranularity::Division,
        &mapping,
        &HyphenSplit,
    );
    // Reservoir keeps one row per division, subdivisions collapsed.
    let reservoir: Vec<_> = tables.crime.iter().filter(|f| f.suburb == "Reservoir").collect();
    assert_eq!(reservoir.len(), 2);
    assert!(reservoir.iter().all(|f| f.offence_subdivision.is_none()));
    // Totals are unchanged by the rollup.
    let incidents = compute_summary(&tables, &Selection::All, Metric::Incidents, ScopeKey::Region);
    assert_eq!(incidents.state.value, 460.0);
}

#[test]
fn pipeline_is_idempotent() {
    let first = build();
    let second = build();
    assert_eq!(first.suburbs, second.suburbs);
    assert_eq!(first.crime, second.crime);
}
