use std::fs::{read_to_string, write};

use camino::Utf8Path;
use clap::ValueEnum;
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use tableraft_primitives::TableConfig;
use tableraft_pump::PumpOptions;

mod home;

pub use home::{default_home, DEFAULT_HOME_DIR};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
#[clap(rename_all = "lower")]
pub enum OutputFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    pub table: TableConfig,

    #[serde(default)]
    pub pump: PumpOptions,
}

impl ConfigFile {
    #[must_use]
    pub const fn new(table: TableConfig, pump: PumpOptions) -> Self {
        Self { table, pump }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration at {path:?}"))?;

        config
            .table
            .validate()
            .wrap_err_with(|| format!("invalid table configuration in {path:?}"))?;

        Ok(config)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
