use crate::defaults::*;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_eps_ppnl() -> f64 {
    EPS_PPNL
}
fn default_eps_radius() -> f64 {
    EPS_RADIUS
}
fn default_calculate_forces() -> bool {
    CALCULATE_FORCES
}
fn default_use_virial() -> bool {
    USE_VIRIAL
}
fn default_n_threads() -> usize {
    N_THREADS
}
fn default_verbose() -> i8 {
    VERBOSE
}
fn default_ppnl_config() -> PpnlConfig {
    PpnlConfig::default()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Configuration {
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_ppnl_config")]
    pub ppnl: PpnlConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            verbose: default_verbose(),
            ppnl: default_ppnl_config(),
        }
    }
}

impl Configuration {
    /// Parse the configuration from a TOML string. Missing keys are set to their defaults,
    /// so an empty string yields the default configuration.
    pub fn from_toml(config_string: &str) -> Result<Self> {
        toml::from_str(config_string).context("Unable to parse the ppnl configuration")
    }

    /// Read the configuration file. If it does not exist the default settings are used
    /// and written to `path`, so that the user finds all available options there.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_file_path: &Path = path.as_ref();
        if config_file_path.exists() {
            let config_string: String = fs::read_to_string(config_file_path).with_context(
                || format!("Unable to read config file {}", config_file_path.display()),
            )?;
            Self::from_toml(&config_string)
        } else {
            let config: Self = Self::default();
            let config_string: String =
                toml::to_string(&config).context("Unable to serialize the configuration")?;
            fs::write(config_file_path, config_string).with_context(|| {
                format!("Unable to write config file {}", config_file_path.display())
            })?;
            Ok(config)
        }
    }

    /// Reads [CONFIG_FILE_NAME] from the working directory.
    pub fn new() -> Result<Self> {
        Self::from_file(CONFIG_FILE_NAME)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PpnlConfig {
    #[serde(default = "default_eps_ppnl")]
    pub eps_ppnl: f64,
    #[serde(default = "default_eps_radius")]
    pub eps_radius: f64,
    #[serde(default = "default_calculate_forces")]
    pub calculate_forces: bool,
    #[serde(default = "default_use_virial")]
    pub use_virial: bool,
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
}

impl Default for PpnlConfig {
    fn default() -> Self {
        PpnlConfig {
            eps_ppnl: default_eps_ppnl(),
            eps_radius: default_eps_radius(),
            calculate_forces: default_calculate_forces(),
            use_virial: default_use_virial(),
            n_threads: default_n_threads(),
        }
    }
}
