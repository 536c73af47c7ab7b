//! Shared types, error model, and configuration for TexCal.
//!
//! This crate is the foundation depended on by all other TexCal crates.
//! It provides:
//! - [`TexcalError`] and [`GatewayError`] — the error model
//! - Domain types ([`ExtractionPayload`], [`ApiKey`])
//! - The [`ExtractionGateway`] contract
//! - Configuration ([`AppConfig`], [`GatewayConfig`], config loading)

pub mod config;
pub mod error;
pub mod gateway;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GatewayConfig, OpenAiConfig, ResolutionConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{GatewayError, Result, TexcalError};
pub use gateway::ExtractionGateway;
pub use types::{ApiKey, ExtractionPayload};
