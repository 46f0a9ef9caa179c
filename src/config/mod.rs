pub mod cli;
pub mod toml_config;

use crate::adapters::yahoo::DEFAULT_ENDPOINT;
use crate::core::pipeline::OUTPUT_FORMATS;
use crate::core::spreadsheet::InputFormat;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extension, validate_formats, validate_path, validate_range, validate_url, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "option-price-fetcher"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Fetch current option quotes for every row of a CSV or Excel file")
)]
pub struct CliConfig {
    /// CSV, TSV or Excel file with symbol, expiry, cp and strike columns
    #[cfg_attr(feature = "cli", arg(long))]
    pub input: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = "./output"))]
    pub output_path: String,

    /// Comma separated list of csv, tsv, json
    #[cfg_attr(feature = "cli", arg(long, value_delimiter = ',', default_value = "csv"))]
    pub output_formats: Vec<String>,

    /// Bundle all outputs into a single ZIP archive
    #[cfg_attr(feature = "cli", arg(long))]
    pub zip: bool,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_ENDPOINT))]
    pub api_endpoint: String,

    /// Crumb token appended to provider requests
    #[cfg_attr(feature = "cli", arg(long))]
    pub crumb: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, default_value = "30"))]
    pub timeout_seconds: u64,

    /// Pause between provider requests
    #[cfg_attr(feature = "cli", arg(long, default_value = "0"))]
    pub request_delay_ms: u64,

    /// Do not print the result table after the run
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_preview: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Emit logs as JSON"))]
    pub log_json: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Log CPU and memory usage per phase"))]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn compress_output(&self) -> bool {
        self.zip
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input", &self.input)?;
        validate_file_extension("input", &self.input, InputFormat::EXTENSIONS)?;
        validate_path("output_path", &self.output_path)?;
        validate_formats("output_formats", &self.output_formats, OUTPUT_FORMATS)?;
        validate_url("api_endpoint", &self.api_endpoint)?;
        validate_range("timeout_seconds", self.timeout_seconds, 1, 300)?;
        validate_range("request_delay_ms", self.request_delay_ms, 0, 60_000)?;
        Ok(())
    }
}
