//! Layered settings: built-in defaults, then an optional `compatkit.{toml,json,yaml,..}`
//! file, then `COMPATKIT_*` environment variables (`__` separates nested keys, so
//! `COMPATKIT_CODING__MAX_DEPTH=64` sets `coding.max_depth`).

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::coding::{CodingOptions, DEFAULT_MAX_DEPTH};
use crate::error::Result;

pub const DEFAULT_FILE: &str = "compatkit";
pub const ENV_PREFIX: &str = "COMPATKIT";
pub const DEFAULT_FILTER: &str = "compatkit=info";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub coding: CodingSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodingSettings {
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogSettings {
    /// Directive handed to the tracing env filter, e.g. `compatkit=debug`.
    pub filter: String,
}

impl Settings {
    /// Reads `compatkit.*` from the working directory if there is one, then the
    /// process environment.
    pub fn load() -> Result<Self> {
        Self::assemble(None, None)
    }
    /// Like [`load`](Self::load) but with an explicit file, which must exist.
    pub fn load_from(file: &Path) -> Result<Self> {
        Self::assemble(Some(file), None)
    }
    /// Uses `environment` in place of the process environment.
    pub fn load_with_environment(
        file: Option<&Path>,
        environment: config::Map<String, String>,
    ) -> Result<Self> {
        Self::assemble(file, Some(environment))
    }
    pub fn coding_options(&self) -> CodingOptions {
        CodingOptions { max_depth: self.coding.max_depth }
    }

    fn assemble(file: Option<&Path>, environment: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("coding.max_depth", DEFAULT_MAX_DEPTH as u64)?
            .set_default("log.filter", DEFAULT_FILTER)?;
        builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_FILE).required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(environment),
        );
        let settings: Settings = builder.build()?.try_deserialize()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coding: CodingSettings { max_depth: DEFAULT_MAX_DEPTH },
            log: LogSettings { filter: DEFAULT_FILTER.to_string() },
        }
    }
}
