use config::{Config, File};
use serde::Deserialize;

use crate::error::TraceResult;

/// Default cumulative byte ceiling for multi-file scans.
pub const DEFAULT_BYTE_BUDGET: u64 = 2_000_000_000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TraceLensConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    pub folder: String,
    pub pattern: String,
    pub recursive: bool,
    pub byte_budget: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            folder: "./traces".to_string(),
            pattern: "*.*".to_string(),
            recursive: false,
            byte_budget: DEFAULT_BYTE_BUDGET,
        }
    }
}

/// When nodes without a persisted identifier receive one.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Assigned by the loader from the file name and the node's position, so
    /// reloading the same file hands out the same ids.
    #[default]
    OnLoad,
    /// Left absent on load; every flatten hands out fresh ids for that traversal only.
    PerFlatten,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub policy: IdentityPolicy,
}

impl TraceLensConfig {
    pub fn load(path: &str) -> TraceResult<Self> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Like [`TraceLensConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> TraceResult<Self> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}
