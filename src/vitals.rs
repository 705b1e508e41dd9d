//! Vital sign extremes as a fixed-length numeric vector, to go with the vitals-free text.
use crate::{
    reduce::{ReducedVitals, VitalExtremes},
    text::{ClinicalText, ClinicalTextWithVitals},
    StayId, VitalKind,
};
use std::collections::BTreeMap;

/// Six maxima followed by six minima.
pub const VECTOR_LEN: usize = 2 * VitalKind::ALL.len();

/// Flatten the extremes for one visit. Missing readings, and visits without any vital sign rows,
/// are 0.
pub fn vital_vector(extremes: Option<&VitalExtremes>) -> [f64; VECTOR_LEN] {
    let mut out = [0.; VECTOR_LEN];
    if let Some(extremes) = extremes {
        let n = VitalKind::ALL.len();
        for (idx, kind) in VitalKind::ALL.into_iter().enumerate() {
            out[idx] = extremes.max.get(kind).unwrap_or(0.);
            out[n + idx] = extremes.min.get(kind).unwrap_or(0.);
        }
    }
    out
}

/// Vectors for every visit that has at least one vital sign row.
pub fn vital_vectors(vitals: &ReducedVitals) -> BTreeMap<StayId, [f64; VECTOR_LEN]> {
    vitals
        .extremes
        .iter()
        .map(|(id, extremes)| (*id, vital_vector(Some(extremes))))
        .collect()
}

/// Left join the vectors onto the text records by ID.
pub fn pair_with_text(
    texts: Vec<ClinicalText>,
    vectors: &BTreeMap<StayId, [f64; VECTOR_LEN]>,
) -> Vec<ClinicalTextWithVitals> {
    texts
        .into_iter()
        .map(|record| ClinicalTextWithVitals {
            vitals: vectors
                .get(&record.id)
                .copied()
                .unwrap_or_else(|| vital_vector(None)),
            id: record.id,
            text: record.text,
            label: record.label,
        })
        .collect()
}
