use clap::Parser;
use ed_clinical_text::{PipelineConfig, Sources};
use qu::ick_use::*;
use std::path::PathBuf;

/// Parse the original extract and cache it for the later stages.
#[derive(Parser)]
struct Opt {
    /// TOML pipeline config. Defaults are used if omitted.
    #[clap(long, short)]
    config: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = PipelineConfig::load_or_default(opt.config.as_deref())?;
    let sources = Sources::load_orig(&config)?;
    sources.save(&config)?;
    event!(
        Level::INFO,
        "cached tables in \"{}\"",
        config.output_path("cache").display()
    );
    Ok(())
}
