pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::YahooClient;
pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};
pub use core::{etl::EtlEngine, lookup::QuoteLookup, pipeline::QuotePipeline};
pub use utils::error::{EtlError, Result};
