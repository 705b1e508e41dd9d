//! Pipeline configuration, read from an optional TOML file.
//!
//! ```toml
//! input_dir = "data/raw"
//! output_dir = "data/output"
//!
//! [tables]
//! visits = "edstays.csv.gz"
//!
//! [split]
//! train = 0.8
//! test = 0.1
//! seed = 1
//! ```
//!
//! Every key is optional.
use crate::Result;
use qu::ick_use::*;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Where the original extract lives.
    pub input_dir: PathBuf,
    /// Where cached tables and generated datasets are written.
    pub output_dir: PathBuf,
    pub tables: TableFiles,
    pub split: SplitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/output"),
            tables: TableFiles::default(),
            split: SplitConfig::default(),
        }
    }
}

/// File names of the six source tables, relative to `input_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableFiles {
    pub visits: PathBuf,
    pub diagnoses: PathBuf,
    pub medications: PathBuf,
    pub dispenses: PathBuf,
    pub triages: PathBuf,
    pub vital_signs: PathBuf,
}

impl Default for TableFiles {
    fn default() -> Self {
        Self {
            visits: "edstays.csv.gz".into(),
            diagnoses: "diagnosis.csv.gz".into(),
            medications: "medrecon.csv.gz".into(),
            dispenses: "pyxis.csv.gz".into(),
            triages: "triage.csv.gz".into(),
            vital_signs: "vitalsign.csv.gz".into(),
        }
    }
}

/// How to partition a dataset. Whatever is left after `train` and `test` is validation data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub train: f64,
    pub test: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train: 0.8,
            test: 0.1,
            seed: 1,
        }
    }
}

impl SplitConfig {
    pub fn validation(&self) -> f64 {
        1. - self.train - self.test
    }

    pub fn validate(&self) -> Result {
        ensure!(
            self.train > 0. && self.train < 1.,
            "train fraction must be between 0 and 1 (got {})",
            self.train
        );
        ensure!(
            self.test >= 0. && self.train + self.test <= 1.,
            "test fraction must be between 0 and {} (got {})",
            1. - self.train,
            self.test
        );
        Ok(())
    }
}

impl PipelineConfig {
    /// Load the config at `path`, or the defaults if there isn't one.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<PipelineConfig> {
            let raw = fs::read_to_string(path)?;
            let config: PipelineConfig = toml::from_str(&raw)?;
            config.split.validate()?;
            Ok(config)
        }

        let path = path.as_ref();
        inner(path).with_context(|| format!("loading config from \"{}\"", path.display()))
    }

    /// Note: No protection from escaping the root directory.
    pub fn input_path(&self, input: &Path) -> PathBuf {
        self.input_dir.join(input)
    }

    /// Note: No protection from escaping the root directory.
    pub fn output_path(&self, input: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(input)
    }

    /// Location of the bincode cache for a source table.
    pub fn cache_path(&self, table: &str) -> PathBuf {
        self.output_dir.join("cache").join(format!("{}.bin", table))
    }
}
