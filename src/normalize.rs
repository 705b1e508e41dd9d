//! Turn joined rows into rows of text with no nulls in them.
//!
//! This is the only place missing values are filled. After this pass a cell is a `String`, so
//! nothing downstream can render a null.
use crate::{
    fields::{acuity_text, Field},
    join::{JoinedVisit, Value},
    util::format_number,
    StayId, SubjectId,
};
use qu::ick_use::*;
use std::collections::BTreeMap;

/// A visit ready to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRow {
    pub stay_id: StayId,
    pub subject_id: Option<SubjectId>,
    pub label: u8,
    /// One entry per field, in `Field::ALL` order.
    pub cells: Vec<(Field, String)>,
}

/// How many nulls were replaced by the empty string, per field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NullCounts(BTreeMap<Field, usize>);

impl NullCounts {
    fn record(&mut self, field: Field) {
        *self.0.entry(field).or_insert(0) += 1;
    }

    pub fn get(&self, field: Field) -> usize {
        self.0.get(&field).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        self.0.iter().map(|(field, count)| (*field, *count))
    }

    /// Report what was masked, so gaps in the source data aren't silently lost.
    pub fn log(&self) {
        let total = self.total();
        if total == 0 {
            return;
        }
        event!(
            Level::INFO,
            "filled {} missing values with the empty string",
            total
        );
        for (field, count) in self.iter() {
            event!(Level::DEBUG, "  {}: {}", field, count);
        }
    }
}

/// Render a single cell. Acuity levels are replaced by their description; a level without one
/// counts as missing.
fn render(field: Field, value: Value<'_>) -> Option<String> {
    match (field, value) {
        (_, Value::Missing) => None,
        (Field::Acuity, Value::Number(level)) => acuity_text(level).map(str::to_owned),
        (Field::Acuity, Value::Text(_)) => None,
        (_, Value::Number(n)) => Some(format_number(n)),
        (_, Value::Text(s)) => Some(s.into_owned()),
    }
}

/// Fill every null in the joined table with the empty string and translate acuity levels.
pub fn normalize(joined: &[JoinedVisit<'_>]) -> (Vec<ClinicalRow>, NullCounts) {
    let mut nulls = NullCounts::default();
    let rows = joined
        .iter()
        .map(|row| {
            let cells = Field::ALL
                .iter()
                .map(|&field| {
                    let cell = render(field, row.value(field)).unwrap_or_else(|| {
                        nulls.record(field);
                        String::new()
                    });
                    (field, cell)
                })
                .collect();
            ClinicalRow {
                stay_id: row.visit.stay_id,
                subject_id: row.visit.subject_id,
                label: row.visit.label(),
                cells,
            }
        })
        .collect();
    (rows, nulls)
}
