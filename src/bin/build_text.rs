use clap::Parser;
use ed_clinical_text::{build_clinical_text, header, text, PipelineConfig, Sources};
use qu::ick_use::*;
use std::path::PathBuf;

/// Generate the clinical text datasets from the cached tables.
#[derive(Parser)]
struct Opt {
    /// TOML pipeline config. Defaults are used if omitted.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Read the original extract instead of the cache written by `import_data`.
    #[clap(long)]
    from_orig: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = PipelineConfig::load_or_default(opt.config.as_deref())?;
    let sources = if opt.from_orig {
        Sources::load_orig(&config)?
    } else {
        Sources::load(&config)?
    };

    let output = build_clinical_text(&sources);

    let full_path = config.output_path("clinical_text.csv");
    text::write_csv(&output.full, &full_path)?;
    let vitals_path = config.output_path("clinical_text_vitals.csv");
    text::write_csv(&output.with_vitals, &vitals_path)?;

    header("Clinical text");
    println!("visits: {}", output.full.len());
    println!(
        "admitted: {}",
        output.full.iter().filter(|r| r.label == 1).count()
    );
    println!("missing values filled: {}", output.null_counts.total());
    println!("written to \"{}\"", full_path.display());
    println!("and \"{}\"", vitals_path.display());
    Ok(())
}
