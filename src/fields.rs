//! Metadata for every column of the joined visit table that ends up in the clinical text.
//!
//! Each field carries its raw name (as used in the extract), the descriptive label it is rendered
//! with, and a category. Filtering for the text variants works on the category, never on the
//! label text.
//!
//! The identifier columns (`stay_id`, `subject_id`) and the disposition label are not fields:
//! they live on the row itself and are never serialized.
use std::fmt;

/// The numeric vital readings, in the order they appear in the extract.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum VitalKind {
    Temperature,
    Heartrate,
    Resprate,
    O2sat,
    Sbp,
    Dbp,
}

impl VitalKind {
    pub const ALL: [VitalKind; 6] = [
        VitalKind::Temperature,
        VitalKind::Heartrate,
        VitalKind::Resprate,
        VitalKind::O2sat,
        VitalKind::Sbp,
        VitalKind::Dbp,
    ];
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FieldCategory {
    /// Demographics and stay duration from the visit table.
    Visit,
    /// Diagnosis, medication and dispensing label sets.
    LabelSet,
    /// Readings taken once, at triage.
    Triage,
    /// Per-visit maximum or minimum of a vital reading. Removed from the vitals-free text.
    VitalExtreme,
    /// Rhythm and pain observations from the vital sign table.
    VitalObservation,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Field {
    Gender,
    Race,
    StayTime,
    IcdTitle,
    CurrentMed,
    Prescription,
    Triage(VitalKind),
    TriagePain,
    Acuity,
    ChiefComplaint,
    Max(VitalKind),
    Min(VitalKind),
    Rhythm,
    Pain,
}

impl Field {
    /// All serialized fields, in the column order of the joined table.
    pub const ALL: [Field; 29] = [
        Field::Gender,
        Field::Race,
        Field::StayTime,
        Field::IcdTitle,
        Field::CurrentMed,
        Field::Prescription,
        Field::Triage(VitalKind::Temperature),
        Field::Triage(VitalKind::Heartrate),
        Field::Triage(VitalKind::Resprate),
        Field::Triage(VitalKind::O2sat),
        Field::Triage(VitalKind::Sbp),
        Field::Triage(VitalKind::Dbp),
        Field::TriagePain,
        Field::Acuity,
        Field::ChiefComplaint,
        Field::Max(VitalKind::Temperature),
        Field::Max(VitalKind::Heartrate),
        Field::Max(VitalKind::Resprate),
        Field::Max(VitalKind::O2sat),
        Field::Max(VitalKind::Sbp),
        Field::Max(VitalKind::Dbp),
        Field::Min(VitalKind::Temperature),
        Field::Min(VitalKind::Heartrate),
        Field::Min(VitalKind::Resprate),
        Field::Min(VitalKind::O2sat),
        Field::Min(VitalKind::Sbp),
        Field::Min(VitalKind::Dbp),
        Field::Rhythm,
        Field::Pain,
    ];

    /// The column name in the joined table before renaming.
    pub fn name(self) -> &'static str {
        use VitalKind::*;
        match self {
            Field::Gender => "gender",
            Field::Race => "race",
            Field::StayTime => "staytime",
            Field::IcdTitle => "icd_title",
            Field::CurrentMed => "current_med",
            Field::Prescription => "prescription",
            Field::Triage(Temperature) => "triage_temperature",
            Field::Triage(Heartrate) => "triage_heartrate",
            Field::Triage(Resprate) => "triage_resprate",
            Field::Triage(O2sat) => "triage_o2sat",
            Field::Triage(Sbp) => "triage_sbp",
            Field::Triage(Dbp) => "triage_dbp",
            Field::TriagePain => "triage_pain",
            Field::Acuity => "acuity",
            Field::ChiefComplaint => "chiefcomplaint",
            Field::Max(Temperature) => "max_temperature",
            Field::Max(Heartrate) => "max_heartrate",
            Field::Max(Resprate) => "max_resprate",
            Field::Max(O2sat) => "max_o2sat",
            Field::Max(Sbp) => "max_sbp",
            Field::Max(Dbp) => "max_dbp",
            Field::Min(Temperature) => "min_temperature",
            Field::Min(Heartrate) => "min_heartrate",
            Field::Min(Resprate) => "min_resprate",
            Field::Min(O2sat) => "min_o2sat",
            Field::Min(Sbp) => "min_sbp",
            Field::Min(Dbp) => "min_dbp",
            Field::Rhythm => "rhythm",
            Field::Pain => "pain",
        }
    }

    /// The descriptive name the field is rendered with in the clinical text.
    pub fn label(self) -> &'static str {
        use VitalKind::*;
        match self {
            Field::Gender => "gender",
            Field::Race => "race",
            Field::StayTime => "emergency department stay time in hours",
            Field::IcdTitle => "diagnosis icd title",
            Field::CurrentMed => "current medication",
            Field::Prescription => "prescription",
            Field::Triage(Temperature) => "temperature at triage",
            Field::Triage(Heartrate) => "heartrate at triage",
            Field::Triage(Resprate) => "respiratory rate at triage",
            Field::Triage(O2sat) => "oxygen saturation at triage",
            Field::Triage(Sbp) => "sbp at triage",
            Field::Triage(Dbp) => "dbp at triage",
            Field::TriagePain => "pain level at triage",
            Field::Acuity => "acuity",
            Field::ChiefComplaint => "chief complaint",
            Field::Max(Temperature) => "maximum temperature",
            Field::Max(Heartrate) => "maximum heartrate",
            Field::Max(Resprate) => "maximum respiratory rate",
            Field::Max(O2sat) => "maximum oxygen saturation",
            Field::Max(Sbp) => "maximum sbp",
            Field::Max(Dbp) => "maximum dbp",
            Field::Min(Temperature) => "minimum temperature",
            Field::Min(Heartrate) => "minimum heartrate",
            Field::Min(Resprate) => "minimum respiratory rate",
            Field::Min(O2sat) => "minimum oxygen saturation",
            Field::Min(Sbp) => "minimum sbp",
            Field::Min(Dbp) => "minimum dbp",
            Field::Rhythm => "heart rhythm",
            Field::Pain => "pain",
        }
    }

    pub fn category(self) -> FieldCategory {
        match self {
            Field::Gender | Field::Race | Field::StayTime => FieldCategory::Visit,
            Field::IcdTitle | Field::CurrentMed | Field::Prescription => FieldCategory::LabelSet,
            Field::Triage(_) | Field::TriagePain | Field::Acuity | Field::ChiefComplaint => {
                FieldCategory::Triage
            }
            Field::Max(_) | Field::Min(_) => FieldCategory::VitalExtreme,
            Field::Rhythm | Field::Pain => FieldCategory::VitalObservation,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The emergency severity index description for a triage acuity level.
///
/// The wording was written by clinicians and the model was trained on it as-is (typos
/// included), so it must not be edited.
pub fn acuity_text(acuity: f64) -> Option<&'static str> {
    const ACUITY: [&str; 5] = [
        "esi 1, triage process stops, patient taken directly to a room and imeediate physician intervention requrested",
        "esi 2, triage nurse notifies resource nurse and appropriate placement tbd",
        "esi 3, patient requires two or more resources",
        "esi 4, patient requires one resource",
        "esi 5, patient not requires any resource",
    ];
    if acuity != acuity.floor() || !(1. ..=5.).contains(&acuity) {
        return None;
    }
    Some(ACUITY[acuity as usize - 1])
}

#[cfg(test)]
mod test {
    use super::{acuity_text, Field, FieldCategory};
    use std::collections::HashSet;

    #[test]
    fn names_and_labels_unique() {
        let names: HashSet<_> = Field::ALL.iter().map(|f| f.name()).collect();
        let labels: HashSet<_> = Field::ALL.iter().map(|f| f.label()).collect();
        assert_eq!(names.len(), Field::ALL.len());
        assert_eq!(labels.len(), Field::ALL.len());
        assert!(Field::ALL.iter().all(|f| !f.label().is_empty()));
    }

    #[test]
    fn extremes_are_tagged() {
        // the tag has to agree with the labels the old name-matching filter relied on.
        for field in Field::ALL {
            let named = field.label().contains("maximum") || field.label().contains("minimum");
            assert_eq!(named, field.category() == FieldCategory::VitalExtreme, "{}", field);
        }
        let extremes = Field::ALL
            .iter()
            .filter(|f| f.category() == FieldCategory::VitalExtreme)
            .count();
        assert_eq!(extremes, 12);
    }

    #[test]
    fn acuity() {
        assert_eq!(
            acuity_text(3.),
            Some("esi 3, patient requires two or more resources")
        );
        assert!(acuity_text(1.).unwrap().starts_with("esi 1,"));
        assert!(acuity_text(5.).unwrap().starts_with("esi 5,"));
        assert_eq!(acuity_text(0.), None);
        assert_eq!(acuity_text(6.), None);
        assert_eq!(acuity_text(2.5), None);
    }
}
