//! Serialize normalized rows into the free text the classifier is trained on.
//!
//! Every field becomes `"<label> : <value>"`, fragments are joined with `". "` in column order, and
//! the whole string is lower-cased.
use crate::{
    create_parent,
    fields::{Field, FieldCategory},
    normalize::ClinicalRow,
    util::{from_json_vector, json_vector},
    vitals::VECTOR_LEN,
    Result, StayId,
};
use itertools::Itertools;
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, io, path::Path};

/// Which fields go into the text.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextVariant {
    /// Every field.
    Full,
    /// Everything except the vital extremes, which are passed to the model as numbers instead.
    WithoutVitals,
}

impl TextVariant {
    pub fn includes(self, field: Field) -> bool {
        match self {
            TextVariant::Full => true,
            TextVariant::WithoutVitals => field.category() != FieldCategory::VitalExtreme,
        }
    }
}

/// A record of the dataset used for the text-only model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalText {
    #[serde(rename = "ID")]
    pub id: StayId,
    #[serde(rename = "TEXT")]
    pub text: String,
    #[serde(rename = "Label")]
    pub label: u8,
}

/// A record of the dataset used for the model taking text and vitals separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTextWithVitals {
    #[serde(rename = "ID")]
    pub id: StayId,
    #[serde(rename = "TEXT")]
    pub text: String,
    #[serde(rename = "Label")]
    pub label: u8,
    /// Maxima then minima, in `VitalKind::ALL` order. Missing readings are 0.
    #[serde(serialize_with = "json_vector", deserialize_with = "from_json_vector")]
    pub vitals: [f64; VECTOR_LEN],
}

/// Render one row as clinical text.
pub fn serialize_row(row: &ClinicalRow, variant: TextVariant) -> String {
    row.cells
        .iter()
        .filter(|(field, _)| variant.includes(*field))
        .map(|(field, value)| format!("{} : {}", field.label(), value))
        .join(". ")
        .to_lowercase()
}

pub fn clinical_texts(rows: &[ClinicalRow], variant: TextVariant) -> Vec<ClinicalText> {
    rows.iter()
        .map(|row| ClinicalText {
            id: row.stay_id,
            text: serialize_row(row, variant),
            label: row.label,
        })
        .collect()
}

/// Write records as CSV, with a header row.
pub fn write_csv<T: Serialize>(records: &[T], path: impl AsRef<Path>) -> Result {
    fn inner<T: Serialize>(records: &[T], path: &Path) -> Result {
        create_parent(path)?;
        let mut writer = csv::Writer::from_writer(io::BufWriter::new(fs::File::create(path)?));
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    let path = path.as_ref();
    inner(records, path).with_context(|| format!("unable to write \"{}\"", path.display()))
}

/// Read records written by `write_csv`.
pub fn read_csv<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    csv::Reader::from_path(path)
        .and_then(|reader| reader.into_deserialize().collect::<Result<Vec<T>, _>>())
        .with_context(|| format!("while loading \"{}\"", path.display()))
}
