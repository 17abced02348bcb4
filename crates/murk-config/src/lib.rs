//! Configuration for the murk volumetric fog pipeline.
//!
//! Every externally settable parameter of the fog effect lives here, grouped
//! into sections that mirror the pipeline stages. Configs persist as RON
//! alongside the host scene and are range-clamped before the pipeline reads
//! them.

mod config;
mod error;

pub use config::{
    BlurConfig, DiagnosticsConfig, FogConfig, FogSettings, FpsTier, NoiseConfig, QualityConfig,
    ScatteringConfig,
};
pub use error::ConfigError;
