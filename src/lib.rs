pub mod config;
pub mod fields;
pub mod join;
pub mod normalize;
pub mod reduce;
pub mod split;
pub mod text;
mod util;
pub mod vitals;

pub use anyhow::{Context, Error};
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use itertools::Either;
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io, iter,
    ops::Deref,
    path::Path,
    sync::Arc,
};

pub use crate::{
    config::PipelineConfig,
    fields::{Field, FieldCategory, VitalKind},
    text::{ClinicalText, ClinicalTextWithVitals},
    util::{header, percent},
};
use crate::util::{optional_f64, optional_id, optional_string, optional_timestamp};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
pub type SubjectId = u64;
pub type StayId = u64;

/// Outcome of an ED visit. Visits with any other disposition are not part of the dataset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Disposition {
    Home,
    Admitted,
}

impl Disposition {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "HOME" => Some(Disposition::Home),
            "ADMITTED" => Some(Disposition::Admitted),
            _ => None,
        }
    }

    /// The classification target: 1 for admitted, 0 for sent home.
    pub fn label(self) -> u8 {
        match self {
            Disposition::Home => 0,
            Disposition::Admitted => 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VisitRaw {
    #[serde(deserialize_with = "optional_id")]
    subject_id: Option<SubjectId>,
    #[serde(deserialize_with = "optional_id")]
    stay_id: Option<StayId>,
    #[serde(deserialize_with = "optional_timestamp")]
    intime: Option<NaiveDateTime>,
    #[serde(deserialize_with = "optional_timestamp")]
    outtime: Option<NaiveDateTime>,
    #[serde(deserialize_with = "optional_string")]
    gender: Option<ArcStr>,
    #[serde(deserialize_with = "optional_string")]
    race: Option<ArcStr>,
    #[serde(deserialize_with = "optional_string")]
    disposition: Option<ArcStr>,
}

/// A row in the ED stays dataset.
///
/// `stay_id` always identifies the same visit in every table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub subject_id: Option<SubjectId>,
    pub stay_id: StayId,
    pub disposition: Disposition,
    /// `None` if either timestamp was missing or malformed.
    pub stay_hours: Option<f64>,
    pub gender: Option<ArcStr>,
    pub race: Option<ArcStr>,
}

impl Visit {
    /// Returns `None` for visits we don't model (no stay ID, or not home/admitted).
    fn from_raw(raw: VisitRaw) -> Option<Self> {
        let stay_id = raw.stay_id?;
        let disposition = Disposition::from_raw(raw.disposition.as_deref()?)?;
        Some(Visit {
            subject_id: raw.subject_id,
            stay_id,
            disposition,
            stay_hours: stay_hours(raw.intime, raw.outtime),
            gender: raw.gender,
            race: raw.race,
        })
    }

    pub fn label(&self) -> u8 {
        self.disposition.label()
    }
}

/// Time spent in the ED, in hours rounded to 2 decimal places.
///
/// These are real hours. Text generated by the earlier preprocessing script divided the seconds by
/// 24 * 60 instead, so its stay times are 2.5 times these and the two don't match.
fn stay_hours(intime: Option<NaiveDateTime>, outtime: Option<NaiveDateTime>) -> Option<f64> {
    let seconds = (outtime? - intime?).num_seconds() as f64;
    Some((seconds / 3600. * 100.).round() / 100.)
}

/// The parsed list of visits, with a pre-built index for the `stay_id` field.
pub struct Visits {
    els: Arc<Vec<Visit>>,
    id_idx: BTreeMap<StayId, usize>,
}

impl Visits {
    /// Load visits from the original extract, keeping only those sent home or admitted.
    pub fn load_orig(path: impl AsRef<Path>) -> Result<Self> {
        let raw: Vec<VisitRaw> = load_orig(path)?;
        Ok(Self::from_raw(raw))
    }

    /// Like `load_orig`, but from any CSV source.
    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        Ok(Self::from_raw(read_csv(reader)?))
    }

    fn from_raw(raw: Vec<VisitRaw>) -> Self {
        let total = raw.len();
        let mut no_stay_id = 0;
        let els: Vec<Visit> = raw
            .into_iter()
            .filter_map(|raw| {
                if raw.stay_id.is_none() {
                    no_stay_id += 1;
                    return None;
                }
                Visit::from_raw(raw)
            })
            .collect();
        if no_stay_id > 0 {
            event!(
                Level::WARN,
                "dropped {} of {} visits with a missing or invalid stay ID",
                no_stay_id,
                total
            );
        }
        let other_disposition = total - no_stay_id - els.len();
        if other_disposition > 0 {
            event!(
                Level::INFO,
                "dropped {} of {} visits with a disposition other than HOME/ADMITTED",
                other_disposition,
                total
            );
        }
        let this = Self::new(els);
        if this.id_idx.len() < this.len() {
            event!(
                Level::WARN,
                "{} visits repeat an earlier stay ID, keeping all of them",
                this.len() - this.id_idx.len()
            );
        }
        this
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        save(&self.els, path)
    }

    /// With a repeated stay ID this is the first visit recorded against it.
    pub fn find_by_id(&self, id: StayId) -> Option<&Visit> {
        let idx = self.id_idx.get(&id)?;
        self.els.get(*idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Visit> + '_ {
        self.els.iter()
    }

    pub fn count_admitted(&self) -> usize {
        self.iter()
            .filter(|v| v.disposition == Disposition::Admitted)
            .count()
    }

    fn new(els: Vec<Visit>) -> Self {
        let mut this = Visits {
            els: Arc::new(els),
            id_idx: BTreeMap::new(),
        };
        this.rebuild_index();
        this
    }

    fn rebuild_index(&mut self) {
        self.id_idx.clear();
        for (idx, el) in self.els.iter().enumerate() {
            self.id_idx.entry(el.stay_id).or_insert(idx);
        }
    }
}

impl Deref for Visits {
    type Target = [Visit];
    fn deref(&self) -> &Self::Target {
        &*self.els
    }
}

/// A row from one of the one-to-many tables hanging off a visit.
pub trait StayRow: Clone + Serialize + DeserializeOwned {
    /// The shape of the row in the original extract.
    type Raw: DeserializeOwned + Into<Self>;

    /// Rows without a stay ID can't be attributed to a visit and are ignored by the reducers.
    fn stay_id(&self) -> Option<StayId>;
}

/// A table of rows keyed (non-uniquely) by stay ID, with a pre-built index.
pub struct StayTable<T> {
    els: Arc<Vec<T>>,
    stay_idx: BTreeMap<StayId, Vec<usize>>,
}

impl<T: StayRow> StayTable<T> {
    pub fn load_orig(path: impl AsRef<Path>) -> Result<Self> {
        let raw: Vec<T::Raw> = load_orig(path)?;
        Ok(Self::from_raw(raw))
    }

    /// Like `load_orig`, but from any CSV source.
    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        Ok(Self::from_raw(read_csv(reader)?))
    }

    fn from_raw(raw: Vec<T::Raw>) -> Self {
        let this: Self = raw.into_iter().map(Into::into).collect();
        let missing = this.missing_stay_count();
        if missing > 0 {
            event!(
                Level::WARN,
                "{} of {} rows have a missing or invalid stay ID and will be ignored",
                missing,
                this.len()
            );
        }
        this
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        save(&self.els, path)
    }

    pub fn rows_for_stay(&self, stay_id: StayId) -> impl Iterator<Item = &T> + Clone + '_ {
        let idxs = match self.stay_idx.get(&stay_id) {
            Some(idxs) => idxs,
            None => return Either::Left(iter::empty()),
        };
        Either::Right(idxs.iter().map(|idx| {
            self.els
                .get(*idx)
                .expect("inconsistent stay_id index")
        }))
    }

    /// Iterate over each distinct stay ID with the rows recorded against it, in stay ID order.
    pub fn groups(&self) -> impl Iterator<Item = (StayId, impl Iterator<Item = &T> + '_)> + '_ {
        self.stay_idx
            .iter()
            .map(|(id, idxs)| (*id, idxs.iter().map(|idx| &self.els[*idx])))
    }

    /// Number of distinct stay IDs in the table.
    pub fn stay_count(&self) -> usize {
        self.stay_idx.len()
    }

    /// Number of rows that have no stay ID.
    pub fn missing_stay_count(&self) -> usize {
        self.els.iter().filter(|el| el.stay_id().is_none()).count()
    }

    fn new(els: Vec<T>) -> Self {
        let mut this = StayTable {
            els: Arc::new(els),
            stay_idx: BTreeMap::new(),
        };
        this.rebuild_index();
        this
    }

    fn rebuild_index(&mut self) {
        self.stay_idx.clear();
        for (idx, el) in self.els.iter().enumerate() {
            if let Some(stay_id) = el.stay_id() {
                self.stay_idx.entry(stay_id).or_insert_with(Vec::new).push(idx);
            }
        }
    }
}

impl<T> Deref for StayTable<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        &*self.els
    }
}

impl<T: StayRow> FromIterator<T> for StayTable<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
pub struct DiagnosisRaw {
    #[serde(deserialize_with = "optional_id")]
    stay_id: Option<StayId>,
    #[serde(deserialize_with = "optional_string")]
    icd_title: Option<ArcStr>,
}

/// A row in the diagnosis dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub stay_id: Option<StayId>,
    pub icd_title: Option<ArcStr>,
}

impl From<DiagnosisRaw> for Diagnosis {
    fn from(from: DiagnosisRaw) -> Self {
        Self {
            stay_id: from.stay_id,
            icd_title: from.icd_title,
        }
    }
}

impl StayRow for Diagnosis {
    type Raw = DiagnosisRaw;
    fn stay_id(&self) -> Option<StayId> {
        self.stay_id
    }
}

/// The medication reconciliation and pyxis dispensing tables share a layout.
#[derive(Debug, Deserialize)]
pub struct NamedDrugRaw {
    #[serde(deserialize_with = "optional_id")]
    stay_id: Option<StayId>,
    #[serde(deserialize_with = "optional_string")]
    name: Option<ArcStr>,
}

/// A row in the medication reconciliation dataset: a medication the patient was already taking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub stay_id: Option<StayId>,
    pub name: Option<ArcStr>,
}

impl From<NamedDrugRaw> for Medication {
    fn from(from: NamedDrugRaw) -> Self {
        Self {
            stay_id: from.stay_id,
            name: from.name,
        }
    }
}

impl StayRow for Medication {
    type Raw = NamedDrugRaw;
    fn stay_id(&self) -> Option<StayId> {
        self.stay_id
    }
}

/// A row in the pyxis dataset: a drug dispensed during the visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispense {
    pub stay_id: Option<StayId>,
    pub name: Option<ArcStr>,
}

impl From<NamedDrugRaw> for Dispense {
    fn from(from: NamedDrugRaw) -> Self {
        Self {
            stay_id: from.stay_id,
            name: from.name,
        }
    }
}

impl StayRow for Dispense {
    type Raw = NamedDrugRaw;
    fn stay_id(&self) -> Option<StayId> {
        self.stay_id
    }
}

/// One set of numeric vital readings. Any of them may be missing.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub temperature: Option<f64>,
    pub heartrate: Option<f64>,
    pub resprate: Option<f64>,
    pub o2sat: Option<f64>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
}

impl Vitals {
    pub fn get(&self, kind: VitalKind) -> Option<f64> {
        match kind {
            VitalKind::Temperature => self.temperature,
            VitalKind::Heartrate => self.heartrate,
            VitalKind::Resprate => self.resprate,
            VitalKind::O2sat => self.o2sat,
            VitalKind::Sbp => self.sbp,
            VitalKind::Dbp => self.dbp,
        }
    }

    pub fn set(&mut self, kind: VitalKind, value: Option<f64>) {
        let slot = match kind {
            VitalKind::Temperature => &mut self.temperature,
            VitalKind::Heartrate => &mut self.heartrate,
            VitalKind::Resprate => &mut self.resprate,
            VitalKind::O2sat => &mut self.o2sat,
            VitalKind::Sbp => &mut self.sbp,
            VitalKind::Dbp => &mut self.dbp,
        };
        *slot = value;
    }
}

#[derive(Debug, Deserialize)]
pub struct TriageRaw {
    #[serde(deserialize_with = "optional_id")]
    stay_id: Option<StayId>,
    #[serde(deserialize_with = "optional_f64")]
    temperature: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    heartrate: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    resprate: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    o2sat: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    sbp: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    dbp: Option<f64>,
    /// Free text: mostly 0-10, but also things like "unable" or "critical".
    #[serde(deserialize_with = "optional_string")]
    pain: Option<ArcStr>,
    #[serde(deserialize_with = "optional_f64")]
    acuity: Option<f64>,
    #[serde(deserialize_with = "optional_string")]
    chiefcomplaint: Option<ArcStr>,
}

/// A row in the triage dataset. There should be one per visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triage {
    pub stay_id: Option<StayId>,
    pub vitals: Vitals,
    pub pain: Option<ArcStr>,
    /// Emergency severity index, 1 (most severe) to 5.
    pub acuity: Option<f64>,
    pub chief_complaint: Option<ArcStr>,
}

impl From<TriageRaw> for Triage {
    fn from(from: TriageRaw) -> Self {
        Self {
            stay_id: from.stay_id,
            vitals: Vitals {
                temperature: from.temperature,
                heartrate: from.heartrate,
                resprate: from.resprate,
                o2sat: from.o2sat,
                sbp: from.sbp,
                dbp: from.dbp,
            },
            pain: from.pain,
            acuity: from.acuity,
            chief_complaint: from.chiefcomplaint,
        }
    }
}

impl StayRow for Triage {
    type Raw = TriageRaw;
    fn stay_id(&self) -> Option<StayId> {
        self.stay_id
    }
}

#[derive(Debug, Deserialize)]
pub struct VitalSignRaw {
    #[serde(deserialize_with = "optional_id")]
    stay_id: Option<StayId>,
    #[serde(deserialize_with = "optional_f64")]
    temperature: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    heartrate: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    resprate: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    o2sat: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    sbp: Option<f64>,
    #[serde(deserialize_with = "optional_f64")]
    dbp: Option<f64>,
    #[serde(deserialize_with = "optional_string")]
    rhythm: Option<ArcStr>,
    #[serde(deserialize_with = "optional_string")]
    pain: Option<ArcStr>,
}

/// A row in the vital sign dataset: one charted set of observations during the visit.
///
/// Chart time is not kept; only the extremes over the whole visit are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSign {
    pub stay_id: Option<StayId>,
    pub vitals: Vitals,
    pub rhythm: Option<ArcStr>,
    pub pain: Option<ArcStr>,
}

impl From<VitalSignRaw> for VitalSign {
    fn from(from: VitalSignRaw) -> Self {
        Self {
            stay_id: from.stay_id,
            vitals: Vitals {
                temperature: from.temperature,
                heartrate: from.heartrate,
                resprate: from.resprate,
                o2sat: from.o2sat,
                sbp: from.sbp,
                dbp: from.dbp,
            },
            rhythm: from.rhythm,
            pain: from.pain,
        }
    }
}

impl StayRow for VitalSign {
    type Raw = VitalSignRaw;
    fn stay_id(&self) -> Option<StayId> {
        self.stay_id
    }
}

pub type Diagnoses = StayTable<Diagnosis>;
pub type Medications = StayTable<Medication>;
pub type Dispenses = StayTable<Dispense>;
pub type Triages = StayTable<Triage>;
pub type VitalSigns = StayTable<VitalSign>;

/// All six source tables.
pub struct Sources {
    pub visits: Visits,
    pub diagnoses: Diagnoses,
    pub medications: Medications,
    pub dispenses: Dispenses,
    pub triages: Triages,
    pub vital_signs: VitalSigns,
}

impl Sources {
    /// Load every table from the original (CSV, possibly gzipped) extract.
    pub fn load_orig(config: &PipelineConfig) -> Result<Self> {
        let tables = &config.tables;
        let this = Sources {
            visits: Visits::load_orig(config.input_path(&tables.visits))?,
            diagnoses: Diagnoses::load_orig(config.input_path(&tables.diagnoses))?,
            medications: Medications::load_orig(config.input_path(&tables.medications))?,
            dispenses: Dispenses::load_orig(config.input_path(&tables.dispenses))?,
            triages: Triages::load_orig(config.input_path(&tables.triages))?,
            vital_signs: VitalSigns::load_orig(config.input_path(&tables.vital_signs))?,
        };
        this.log_counts();
        Ok(this)
    }

    /// Load every table from the cache written by `save`.
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let this = Sources {
            visits: Visits::load(config.cache_path("visits"))?,
            diagnoses: Diagnoses::load(config.cache_path("diagnoses"))?,
            medications: Medications::load(config.cache_path("medications"))?,
            dispenses: Dispenses::load(config.cache_path("dispenses"))?,
            triages: Triages::load(config.cache_path("triages"))?,
            vital_signs: VitalSigns::load(config.cache_path("vital_signs"))?,
        };
        this.log_counts();
        Ok(this)
    }

    pub fn save(&self, config: &PipelineConfig) -> Result {
        self.visits.save(config.cache_path("visits"))?;
        self.diagnoses.save(config.cache_path("diagnoses"))?;
        self.medications.save(config.cache_path("medications"))?;
        self.dispenses.save(config.cache_path("dispenses"))?;
        self.triages.save(config.cache_path("triages"))?;
        self.vital_signs.save(config.cache_path("vital_signs"))?;
        Ok(())
    }

    fn log_counts(&self) {
        event!(Level::INFO, "visits: {}", self.visits.len());
        event!(Level::INFO, "diagnosis rows: {}", self.diagnoses.len());
        event!(Level::INFO, "medication rows: {}", self.medications.len());
        event!(Level::INFO, "dispensing rows: {}", self.dispenses.len());
        event!(Level::INFO, "triage rows: {}", self.triages.len());
        event!(Level::INFO, "vital sign rows: {}", self.vital_signs.len());
    }
}

/// Both clinical text datasets produced by one run of the pipeline.
pub struct ClinicalTextOutput {
    /// Text including vital extremes.
    pub full: Vec<ClinicalText>,
    /// Text without vital extremes, paired with the extremes as numbers.
    pub with_vitals: Vec<ClinicalTextWithVitals>,
    /// Nulls that were masked to the empty string, per field.
    pub null_counts: normalize::NullCounts,
}

/// Run the whole pipeline: reduce, join, normalize, serialize.
pub fn build_clinical_text(sources: &Sources) -> ClinicalTextOutput {
    let reduced = reduce::Reduced::from_sources(sources);
    let joined = join::left_join(&sources.visits, &reduced);
    event!(Level::INFO, "joined {} visits", joined.len());
    let (rows, null_counts) = normalize::normalize(&joined);
    null_counts.log();

    let full = text::clinical_texts(&rows, text::TextVariant::Full);
    let without_vitals = text::clinical_texts(&rows, text::TextVariant::WithoutVitals);
    let vectors = vitals::vital_vectors(&reduced.vitals);
    let with_vitals = vitals::pair_with_text(without_vitals, &vectors);
    ClinicalTextOutput {
        full,
        with_vitals,
        null_counts,
    }
}

/// Load data into memory.
fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    fn inner<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let reader = io::BufReader::new(fs::File::open(path)?);
        bincode::deserialize_from(reader).map_err(Into::into)
    }
    let path = path.as_ref();
    check_extension(path, "bin")?;

    inner(path).with_context(|| format!("unable to load data from \"{}\"", path.display()))
}

/// Save data to disk.
fn save<T: Serialize>(contents: &[T], path: impl AsRef<Path>) -> Result {
    fn inner<T: Serialize>(contents: &[T], path: &Path) -> Result {
        create_parent(path)?;
        let mut out = io::BufWriter::new(fs::File::create(path)?);
        bincode::serialize_into(&mut out, contents)?;
        Ok(())
    }
    let path = path.as_ref();
    check_extension(path, "bin")?;

    inner(contents, path).with_context(|| format!("unable to save data to \"{}\"", path.display()))
}

/// Load data into memory from the original database extract.
///
/// Files ending in `.gz` are decompressed on the fly.
fn load_orig<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    fn inner<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let file = io::BufReader::new(fs::File::open(path)?);
        if matches!(path.extension(), Some(ext) if ext == "gz") {
            read_csv(GzDecoder::new(file))
        } else {
            read_csv(file)
        }
    }
    let path = path.as_ref();
    inner(path).with_context(|| format!("while loading \"{}\"", path.display()))
}

fn read_csv<T: DeserializeOwned>(reader: impl io::Read) -> Result<Vec<T>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()?)
}

/// Create the parent directory of `path`, and warn if we are about to overwrite it.
pub(crate) fn create_parent(path: &Path) -> Result {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("could not create parent")?;
    }
    // `File::options().create_new(true)` is not reliable on network mounts, so check for
    // existence instead.
    if util::path_exists(path)? {
        event!(
            Level::WARN,
            "overwriting existing file at \"{}\"",
            path.display()
        );
    }
    Ok(())
}

pub fn check_extension(path: &Path, ext: &str) -> Result<()> {
    ensure!(
        matches!(path.extension(), Some(p) if p == ext),
        "filename should end with `.{}`",
        ext
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{collections::BTreeSet, io::Write};

    pub(crate) const VISITS: &str = "\
subject_id,hadm_id,stay_id,intime,outtime,gender,race,arrival_transport,disposition
10,,100,2180-07-23 05:54:00,2180-07-23 09:36:00,F,WHITE,AMBULANCE,ADMITTED
11,,101,2180-07-24 10:00:00,2180-07-24 12:30:00,M,BLACK/AFRICAN AMERICAN,WALK IN,HOME
12,,102,2180-07-25 10:00:00,2180-07-25 11:00:00,F,WHITE,WALK IN,LEFT WITHOUT BEING SEEN
13,,103,not a time,2180-07-26 11:00:00,M,,WALK IN,HOME
14,,,2180-07-27 10:00:00,2180-07-27 11:00:00,M,WHITE,WALK IN,HOME
";

    pub(crate) const DIAGNOSES: &str = "\
subject_id,stay_id,seq_num,icd_code,icd_version,icd_title
10,100,1,A419,10,Sepsis
10,100,2,A419,10,SEPSIS
10,100,3,N179,10,Acute kidney failure
11,101,1,R079,10,Chest pain
11,,1,R079,10,Chest pain
";

    pub(crate) const MEDICATIONS: &str = "\
subject_id,stay_id,charttime,name,gsn
11,101,2180-07-24 10:10:00,Aspirin,1
11,101,2180-07-24 10:10:00,aspirin,1
11,101,2180-07-24 10:10:00,,1
";

    pub(crate) const DISPENSES: &str = "\
subject_id,stay_id,charttime,med_rn,name,gsn_rn,gsn
10,100,2180-07-23 06:00:00,1,Vancomycin,1,1
10,100,2180-07-23 07:00:00,2,Cefepime,1,1
";

    pub(crate) const TRIAGES: &str = "\
subject_id,stay_id,temperature,heartrate,resprate,o2sat,sbp,dbp,pain,acuity,chiefcomplaint
10,100,38.0,120,24,91,90,50,8,3.0,Fever
11,101,98.1,80,16,99,130,85,unable,4.0,Chest pain
";

    pub(crate) const VITAL_SIGNS: &str = "\
subject_id,stay_id,charttime,temperature,heartrate,resprate,o2sat,sbp,dbp,rhythm,pain
10,100,2180-07-23 06:00:00,36.5,110,22,92,95,55,Sinus Tachycardia,8
10,100,2180-07-23 07:00:00,37.2,,20,95,100,60,sinus tachycardia,6
10,100,2180-07-23 08:00:00,38.0,100,18,97,110,65,Normal Sinus Rhythm,
";

    pub(crate) fn sources() -> Sources {
        Sources {
            visits: Visits::from_reader(VISITS.as_bytes()).unwrap(),
            diagnoses: Diagnoses::from_reader(DIAGNOSES.as_bytes()).unwrap(),
            medications: Medications::from_reader(MEDICATIONS.as_bytes()).unwrap(),
            dispenses: Dispenses::from_reader(DISPENSES.as_bytes()).unwrap(),
            triages: Triages::from_reader(TRIAGES.as_bytes()).unwrap(),
            vital_signs: VitalSigns::from_reader(VITAL_SIGNS.as_bytes()).unwrap(),
        }
    }

    #[test]
    fn visits_filtered() {
        let visits = Visits::from_reader(VISITS.as_bytes()).unwrap();
        // left without being seen, and missing stay ID, are dropped.
        assert_eq!(visits.len(), 3);
        assert!(visits.find_by_id(102).is_none());
        assert_eq!(visits.find_by_id(100).unwrap().label(), 1);
        assert_eq!(visits.find_by_id(101).unwrap().label(), 0);
        assert_eq!(visits.count_admitted(), 1);
        for visit in visits.iter() {
            assert_eq!(
                visit.label() == 1,
                visit.disposition == Disposition::Admitted
            );
        }
    }

    #[test]
    fn stay_time() {
        let visits = Visits::from_reader(VISITS.as_bytes()).unwrap();
        assert_eq!(visits.find_by_id(100).unwrap().stay_hours, Some(3.7));
        assert_eq!(visits.find_by_id(101).unwrap().stay_hours, Some(2.5));
        // malformed timestamp, so no stay time, but the visit is kept.
        assert_eq!(visits.find_by_id(103).unwrap().stay_hours, None);
        assert_eq!(visits.find_by_id(103).unwrap().race, None);
    }

    #[test]
    fn duplicate_visits_kept() {
        let input = "\
subject_id,stay_id,intime,outtime,gender,race,disposition
1,1,,,F,WHITE,HOME
2,1,,,M,WHITE,ADMITTED
";
        let visits = Visits::from_reader(input.as_bytes()).unwrap();
        assert_eq!(visits.len(), 2);
        // lookups see the first row.
        assert_eq!(visits.find_by_id(1).unwrap().subject_id, Some(1));

        let sources = Sources {
            visits,
            diagnoses: Diagnoses::from_reader("stay_id,icd_title\n1,Sepsis\n".as_bytes()).unwrap(),
            medications: Medications::from_reader("stay_id,name\n".as_bytes()).unwrap(),
            dispenses: Dispenses::from_reader("stay_id,name\n".as_bytes()).unwrap(),
            triages: Triages::from_reader(
                "stay_id,temperature,heartrate,resprate,o2sat,sbp,dbp,pain,acuity,chiefcomplaint\n"
                    .as_bytes(),
            )
            .unwrap(),
            vital_signs: VitalSigns::from_reader(
                "stay_id,temperature,heartrate,resprate,o2sat,sbp,dbp,rhythm,pain\n".as_bytes(),
            )
            .unwrap(),
        };
        let out = build_clinical_text(&sources);
        assert_eq!(out.full.len(), 2);
        assert_eq!(out.with_vitals.len(), 2);
        let labels: Vec<_> = out.full.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![0, 1]);
        assert!(out
            .full
            .iter()
            .all(|r| r.id == 1 && r.text.contains("diagnosis icd title : sepsis")));
    }

    #[test]
    fn bad_ids_are_not_fatal() {
        let input = "\
subject_id,stay_id,intime,outtime,gender,race,disposition
1,1,,,F,WHITE,HOME
,2,,,M,WHITE,LEFT WITHOUT BEING SEEN
,3,,,M,WHITE,ADMITTED
4,abc,,,F,WHITE,HOME
5,5.0,,,F,WHITE,ADMITTED
";
        let visits = Visits::from_reader(input.as_bytes()).unwrap();
        let ids: Vec<_> = visits.iter().map(|v| v.stay_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(visits.find_by_id(3).unwrap().subject_id, None);
        assert_eq!(visits.find_by_id(3).unwrap().label(), 1);

        let diagnoses = Diagnoses::from_reader(
            "stay_id,icd_title\n1,Sepsis\nx1,Chest pain\n2.5,Fever\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(diagnoses.len(), 3);
        assert_eq!(diagnoses.missing_stay_count(), 2);
        assert_eq!(diagnoses.stay_count(), 1);
    }

    #[test]
    fn stay_index() {
        let diagnoses = Diagnoses::from_reader(DIAGNOSES.as_bytes()).unwrap();
        assert_eq!(diagnoses.len(), 5);
        assert_eq!(diagnoses.stay_count(), 2);
        assert_eq!(diagnoses.missing_stay_count(), 1);
        assert_eq!(diagnoses.rows_for_stay(100).count(), 3);
        assert_eq!(diagnoses.rows_for_stay(999).count(), 0);
        let stays: BTreeSet<_> = diagnoses.groups().map(|(id, _)| id).collect();
        assert_eq!(stays, BTreeSet::from([100, 101]));
    }

    #[test]
    fn triage_quirks() {
        let triages = Triages::from_reader(TRIAGES.as_bytes()).unwrap();
        let triage = triages.rows_for_stay(101).next().unwrap();
        assert_eq!(triage.pain.as_deref(), Some("unable"));
        assert_eq!(triage.acuity, Some(4.));
        assert_eq!(triage.vitals.get(VitalKind::Temperature), Some(98.1));
    }

    #[test]
    fn gzip_and_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let gz_path = dir.path().join("edstays.csv.gz");
        {
            let file = fs::File::create(&gz_path).unwrap();
            let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            enc.write_all(VISITS.as_bytes()).unwrap();
            enc.finish().unwrap();
        }
        let visits = Visits::load_orig(&gz_path).unwrap();
        assert_eq!(visits.len(), 3);

        let bin_path = dir.path().join("cache/visits.bin");
        visits.save(&bin_path).unwrap();
        let cached = Visits::load(&bin_path).unwrap();
        assert_eq!(cached.len(), 3);
        assert_eq!(cached.find_by_id(100).unwrap().stay_hours, Some(3.7));

        assert!(visits.save(dir.path().join("visits.csv")).is_err());
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Diagnoses::load_orig(dir.path().join("nope.csv")).is_err());
    }

    #[test]
    fn end_to_end() {
        let input = "\
subject_id,stay_id,intime,outtime,gender,race,disposition
1,7,2180-01-01 00:00:00,2180-01-01 06:00:00,M,WHITE,ADMITTED
";
        let sources = Sources {
            visits: Visits::from_reader(input.as_bytes()).unwrap(),
            diagnoses: Diagnoses::from_reader(
                "stay_id,icd_title\n7,Sepsis\n".as_bytes(),
            )
            .unwrap(),
            medications: Medications::from_reader("stay_id,name\n".as_bytes()).unwrap(),
            dispenses: Dispenses::from_reader("stay_id,name\n".as_bytes()).unwrap(),
            triages: Triages::from_reader(
                "stay_id,temperature,heartrate,resprate,o2sat,sbp,dbp,pain,acuity,chiefcomplaint\n\
                 7,,,,,,,,3.0,\n"
                    .as_bytes(),
            )
            .unwrap(),
            vital_signs: VitalSigns::from_reader(
                "stay_id,temperature,heartrate,resprate,o2sat,sbp,dbp,rhythm,pain\n".as_bytes(),
            )
            .unwrap(),
        };
        let out = build_clinical_text(&sources);
        assert_eq!(out.full.len(), 1);
        let record = &out.full[0];
        assert_eq!(record.id, 7);
        assert_eq!(record.label, 1);
        assert!(record.text.contains("diagnosis icd title : sepsis"));
        assert!(record
            .text
            .contains("acuity : esi 3, patient requires two or more resources"));
        assert!(record.text.contains("current medication : . "));

        assert_eq!(out.with_vitals.len(), 1);
        assert_eq!(out.with_vitals[0].vitals, [0.; 12]);
    }

    #[test]
    fn pipeline_invariants() {
        let sources = sources();
        let out = build_clinical_text(&sources);
        let eligible = sources.visits.len();
        assert_eq!(out.full.len(), eligible);
        assert_eq!(out.with_vitals.len(), eligible);

        for record in &out.full {
            let lower = record.text.to_lowercase();
            for token in ["nan", "none", "null"] {
                assert!(!lower.contains(token), "{} in {:?}", token, record.text);
            }
            let visit = sources.visits.find_by_id(record.id).unwrap();
            assert_eq!(record.label, visit.label());
        }
        for record in &out.with_vitals {
            assert!(!record.text.contains("maximum"));
            assert!(!record.text.contains("minimum"));
        }
        assert!(out.null_counts.total() > 0);
    }
}
