use clap::{Parser, ValueEnum};
use ed_clinical_text::{
    split::{split_train_test_val, Split},
    text, ClinicalText, ClinicalTextWithVitals, PipelineConfig,
};
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, ValueEnum)]
enum Dataset {
    /// `clinical_text.csv`
    Text,
    /// `clinical_text_vitals.csv`
    Vitals,
}

/// Sample a generated dataset and split it into train, test and validation files.
#[derive(Parser)]
struct Opt {
    /// TOML pipeline config. Defaults are used if omitted.
    #[clap(long, short)]
    config: Option<PathBuf>,
    #[clap(long, value_enum, default_value = "text")]
    dataset: Dataset,
    /// How many records to sample. All of them if omitted.
    #[clap(long, short = 'n')]
    size: Option<usize>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = PipelineConfig::load_or_default(opt.config.as_deref())?;
    match opt.dataset {
        Dataset::Text => {
            split::<ClinicalText>(&config, "clinical_text.csv", opt.size)
        }
        Dataset::Vitals => {
            split::<ClinicalTextWithVitals>(&config, "clinical_text_vitals.csv", opt.size)
        }
    }
}

fn split<T: Serialize + DeserializeOwned>(
    config: &PipelineConfig,
    input: &str,
    size: Option<usize>,
) -> Result {
    let records: Vec<T> = text::read_csv(config.output_path(input))?;
    let Split { train, test, val } = split_train_test_val(records, size, &config.split)?;
    let out_dir = config.output_path("split");
    write(&train, &out_dir, "train_data.csv")?;
    write(&test, &out_dir, "test_data.csv")?;
    write(&val, &out_dir, "val_data.csv")?;
    Ok(())
}

fn write<T: Serialize>(records: &[T], dir: &Path, name: &str) -> Result {
    let path = dir.join(name);
    text::write_csv(records, &path)?;
    println!("{} records written to \"{}\"", records.len(), path.display());
    Ok(())
}
