pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, CliConfig};
pub use core::{chain::FallbackChain, engine::GeocodeEngine, pipeline::GeocodePipeline};
pub use utils::error::{GeocodeError, Result};
