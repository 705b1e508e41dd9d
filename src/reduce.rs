//! Collapse each one-to-many table to one summary per visit.
//!
//! Free-text columns become a set of distinct lower-cased labels. Numeric vitals become the
//! per-visit maximum and minimum of each reading. Rows without a stay ID never contribute, and a
//! visit with no rows in a table is simply absent from that table's summary.
use crate::{ArcStr, Sources, StayId, StayRow, StayTable, Triage, VitalKind, VitalSigns, Vitals};
use itertools::Itertools;
use noisy_float::prelude::*;
use qu::ick_use::*;
use std::collections::{BTreeMap, BTreeSet};

/// A deduplicated set of labels.
///
/// Kept sorted so the rendered text is reproducible between runs.
pub type LabelSet = BTreeSet<ArcStr>;

/// Render a label set the way it appears in the clinical text.
pub fn join_labels(labels: &LabelSet) -> String {
    labels.iter().join(", ")
}

/// Group `table` by stay ID and collect the lower-cased, non-null labels picked out by `label`.
///
/// Visits where every row has a null label do not appear in the output.
pub fn label_sets<T, F>(table: &StayTable<T>, label: F) -> BTreeMap<StayId, LabelSet>
where
    T: StayRow,
    F: Fn(&T) -> Option<&ArcStr>,
{
    let mut out = BTreeMap::new();
    for (stay_id, rows) in table.groups() {
        let set: LabelSet = rows
            .filter_map(|row| label(row))
            .map(|s| ArcStr::from(s.to_lowercase()))
            .collect();
        if !set.is_empty() {
            out.insert(stay_id, set);
        }
    }
    out
}

/// The largest and smallest value of each reading seen during a visit.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct VitalExtremes {
    pub max: Vitals,
    pub min: Vitals,
}

impl VitalExtremes {
    /// With no observations (or none for a reading) the reading is missing from both sides.
    pub fn from_observations<'a>(observations: impl Iterator<Item = &'a Vitals> + Clone) -> Self {
        let mut out = Self::default();
        for kind in VitalKind::ALL {
            let values = observations
                .clone()
                .filter_map(|v| v.get(kind))
                .filter_map(R64::try_new);
            let (min, max) = match values.minmax().into_option() {
                Some((min, max)) => (Some(min.raw()), Some(max.raw())),
                None => (None, None),
            };
            out.max.set(kind, max);
            out.min.set(kind, min);
        }
        out
    }
}

/// Everything the vital sign table contributes to a visit.
#[derive(Debug, Default)]
pub struct ReducedVitals {
    /// Every stay with at least one vital sign row, even if all its readings are missing.
    pub extremes: BTreeMap<StayId, VitalExtremes>,
    pub rhythm: BTreeMap<StayId, LabelSet>,
    pub pain: BTreeMap<StayId, LabelSet>,
}

impl ReducedVitals {
    pub fn from_table(table: &VitalSigns) -> Self {
        let extremes = table
            .groups()
            .map(|(stay_id, rows)| {
                let rows: Vec<_> = rows.map(|row| &row.vitals).collect();
                (stay_id, VitalExtremes::from_observations(rows.into_iter()))
            })
            .collect();
        ReducedVitals {
            extremes,
            rhythm: label_sets(table, |row| row.rhythm.as_ref()),
            pain: label_sets(table, |row| row.pain.as_ref()),
        }
    }
}

/// Pick the triage record for each visit.
///
/// Triage should be one row per visit. If a visit has more than one we keep the first, so the
/// join can't multiply visits, and report how many were affected.
pub fn triage_by_stay(table: &StayTable<Triage>) -> BTreeMap<StayId, &Triage> {
    let mut duplicated = 0;
    let out = table
        .groups()
        .filter_map(|(stay_id, mut rows)| {
            let first = rows.next()?;
            if rows.next().is_some() {
                duplicated += 1;
            }
            Some((stay_id, first))
        })
        .collect();
    if duplicated > 0 {
        event!(
            Level::WARN,
            "{} visits have more than one triage record, keeping the first of each",
            duplicated
        );
    }
    out
}

/// The per-visit summaries of every one-to-many table.
pub struct Reduced<'a> {
    pub diagnoses: BTreeMap<StayId, LabelSet>,
    pub medications: BTreeMap<StayId, LabelSet>,
    pub prescriptions: BTreeMap<StayId, LabelSet>,
    pub triage: BTreeMap<StayId, &'a Triage>,
    pub vitals: ReducedVitals,
}

impl<'a> Reduced<'a> {
    pub fn from_sources(sources: &'a Sources) -> Self {
        let this = Reduced {
            diagnoses: label_sets(&sources.diagnoses, |row| row.icd_title.as_ref()),
            medications: label_sets(&sources.medications, |row| row.name.as_ref()),
            prescriptions: label_sets(&sources.dispenses, |row| row.name.as_ref()),
            triage: triage_by_stay(&sources.triages),
            vitals: ReducedVitals::from_table(&sources.vital_signs),
        };
        event!(
            Level::DEBUG,
            "reduced to {} diagnosis, {} medication, {} prescription, {} triage and {} vital sign \
             summaries",
            this.diagnoses.len(),
            this.medications.len(),
            this.prescriptions.len(),
            this.triage.len(),
            this.vitals.extremes.len()
        );
        this
    }
}
