use clap::Parser;
use ed_clinical_text::{
    header, percent, reduce::Reduced, PipelineConfig, Sources, StayRow, StayTable,
};
use qu::ick_use::*;
use std::{collections::BTreeMap, path::PathBuf};

/// Print row counts and how well each table covers the retained visits.
#[derive(Parser)]
struct Opt {
    /// TOML pipeline config. Defaults are used if omitted.
    #[clap(long, short)]
    config: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = PipelineConfig::load_or_default(opt.config.as_deref())?;
    let sources = Sources::load(&config)?;
    let visits = &sources.visits;
    let total = visits.len();

    header("Visits");
    println!("total visits: {}", total);
    let admitted = visits.count_admitted();
    println!(
        "admitted: {} ({:.1}%)",
        admitted,
        percent(admitted, total)
    );
    println!(
        "sent home: {} ({:.1}%)",
        total - admitted,
        percent(total - admitted, total)
    );
    println!(
        "without a stay time: {}",
        visits.iter().filter(|v| v.stay_hours.is_none()).count()
    );

    header("Source tables");
    table_stats("diagnosis", &sources.diagnoses);
    table_stats("medication", &sources.medications);
    table_stats("dispensing", &sources.dispenses);
    table_stats("triage", &sources.triages);
    table_stats("vital sign", &sources.vital_signs);

    header("Coverage of retained visits");
    let reduced = Reduced::from_sources(&sources);
    coverage("diagnosis", &reduced.diagnoses, &sources, total);
    coverage("medication", &reduced.medications, &sources, total);
    coverage("prescription", &reduced.prescriptions, &sources, total);
    coverage("triage", &reduced.triage, &sources, total);
    coverage("vital extremes", &reduced.vitals.extremes, &sources, total);
    coverage("rhythm", &reduced.vitals.rhythm, &sources, total);
    coverage("pain", &reduced.vitals.pain, &sources, total);
    Ok(())
}

fn table_stats<T: StayRow>(name: &str, table: &StayTable<T>) {
    println!(
        "{}: {} rows over {} stays, {} rows without a stay ID",
        name,
        table.len(),
        table.stay_count(),
        table.missing_stay_count()
    );
}

fn coverage<V>(name: &str, reduced: &BTreeMap<u64, V>, sources: &Sources, total: usize) {
    let covered = sources
        .visits
        .iter()
        .filter(|v| reduced.contains_key(&v.stay_id))
        .count();
    println!(
        "{}: {} of {} ({:.1}%)",
        name,
        covered,
        total,
        percent(covered, total)
    );
}
