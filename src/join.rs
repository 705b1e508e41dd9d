//! Left join of the per-visit summaries onto the visit table.
use crate::{
    fields::Field,
    reduce::{join_labels, LabelSet, Reduced, VitalExtremes},
    Triage, Visit, Visits,
};
use std::borrow::Cow;

/// One visit with everything the other tables know about it.
///
/// A `None` is a visit with no match in that table. These are the only nulls in the joined data,
/// and `normalize` is where they are filled.
#[derive(Debug, Clone)]
pub struct JoinedVisit<'a> {
    pub visit: &'a Visit,
    pub diagnoses: Option<&'a LabelSet>,
    pub medications: Option<&'a LabelSet>,
    pub prescriptions: Option<&'a LabelSet>,
    pub triage: Option<&'a Triage>,
    pub extremes: Option<&'a VitalExtremes>,
    pub rhythm: Option<&'a LabelSet>,
    pub pain: Option<&'a LabelSet>,
}

/// A single cell of the joined table, before nulls are filled.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Missing,
    Text(Cow<'a, str>),
    Number(f64),
}

impl<'a> Value<'a> {
    fn text(value: Option<&'a str>) -> Self {
        value.map_or(Value::Missing, |s| Value::Text(Cow::Borrowed(s)))
    }

    fn labels(value: Option<&LabelSet>) -> Self {
        value.map_or(Value::Missing, |set| Value::Text(Cow::Owned(join_labels(set))))
    }

    fn number(value: Option<f64>) -> Self {
        value.map_or(Value::Missing, Value::Number)
    }
}

impl<'a> JoinedVisit<'a> {
    /// The raw value of a column of the joined table.
    pub fn value(&self, field: Field) -> Value<'a> {
        match field {
            Field::Gender => Value::text(self.visit.gender.as_deref()),
            Field::Race => Value::text(self.visit.race.as_deref()),
            Field::StayTime => Value::number(self.visit.stay_hours),
            Field::IcdTitle => Value::labels(self.diagnoses),
            Field::CurrentMed => Value::labels(self.medications),
            Field::Prescription => Value::labels(self.prescriptions),
            Field::Triage(kind) => Value::number(self.triage.and_then(|t| t.vitals.get(kind))),
            Field::TriagePain => Value::text(self.triage.and_then(|t| t.pain.as_deref())),
            Field::Acuity => Value::number(self.triage.and_then(|t| t.acuity)),
            Field::ChiefComplaint => {
                Value::text(self.triage.and_then(|t| t.chief_complaint.as_deref()))
            }
            Field::Max(kind) => Value::number(self.extremes.and_then(|e| e.max.get(kind))),
            Field::Min(kind) => Value::number(self.extremes.and_then(|e| e.min.get(kind))),
            Field::Rhythm => Value::labels(self.rhythm),
            Field::Pain => Value::labels(self.pain),
        }
    }
}

/// Left join every summary onto `visits`, keyed on stay ID.
///
/// Each summary has at most one entry per stay, so there is exactly one output row per visit, in
/// visit table order.
pub fn left_join<'a>(visits: &'a Visits, reduced: &'a Reduced<'a>) -> Vec<JoinedVisit<'a>> {
    visits
        .iter()
        .map(|visit| {
            let id = visit.stay_id;
            JoinedVisit {
                visit,
                diagnoses: reduced.diagnoses.get(&id),
                medications: reduced.medications.get(&id),
                prescriptions: reduced.prescriptions.get(&id),
                triage: reduced.triage.get(&id).copied(),
                extremes: reduced.vitals.extremes.get(&id),
                rhythm: reduced.vitals.rhythm.get(&id),
                pain: reduced.vitals.pain.get(&id),
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::sources, VitalKind};

    #[test]
    fn cardinality() {
        let sources = sources();
        let reduced = Reduced::from_sources(&sources);
        let joined = left_join(&sources.visits, &reduced);
        assert_eq!(joined.len(), sources.visits.len());
        let ids: Vec<_> = joined.iter().map(|j| j.visit.stay_id).collect();
        assert_eq!(ids, vec![100, 101, 103]);
    }

    #[test]
    fn missing_matches() {
        let sources = sources();
        let reduced = Reduced::from_sources(&sources);
        let joined = left_join(&sources.visits, &reduced);

        let admitted = &joined[0];
        assert!(admitted.medications.is_none());
        assert_eq!(admitted.value(Field::CurrentMed), Value::Missing);
        assert_eq!(
            admitted.value(Field::Max(VitalKind::Temperature)),
            Value::Number(38.)
        );
        assert_eq!(admitted.value(Field::Acuity), Value::Number(3.));

        let no_data = &joined[2];
        assert!(no_data.triage.is_none());
        assert!(no_data.extremes.is_none());
        for field in Field::ALL {
            if field != Field::Gender && field != Field::StayTime {
                assert_eq!(no_data.value(field), Value::Missing, "{}", field);
            }
        }
        assert_eq!(no_data.value(Field::Gender), Value::Text("M".into()));
    }
}
