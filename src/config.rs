//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional YAML
//! file, then `POLITECRAWL__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cdp_adapter::CdpConfig;
use clap::ValueEnum;
use config::{Config, Environment, File};
use politecrawl_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/politecrawl.yaml";
pub const ENV_PREFIX: &str = "POLITECRAWL";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerSection,
    pub browser: CdpConfig,
    pub server: ServerSection,
    pub log: LogSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            min_delay_ms: 300,
            max_delay_ms: 1000,
        }
    }
}

impl SchedulerSection {
    pub fn to_config(&self) -> Result<SchedulerConfig> {
        SchedulerConfig::from_millis(self.min_delay_ms, self.max_delay_ms)
            .context("invalid scheduler section")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    /// Served for every path outside the crawler base; 404 when unset
    pub static_root: Option<PathBuf>,
    /// Holds one `<name>.yaml` crawler definition per endpoint
    pub crawler_dir: PathBuf,
    pub public_base: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8000,
            static_root: None,
            crawler_dir: PathBuf::from("crawlers"),
            public_base: "/crawler".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

pub struct LoadedConfig {
    pub config: AppConfig,
    /// File the config was read from, if any
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `explicit`, else from [`DEFAULT_CONFIG_PATH`] when it exists.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
        let path = match explicit {
            Some(path) if !path.exists() => bail!("config file {} not found", path.display()),
            Some(path) => Some(path.to_path_buf()),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_PATH);
                local.exists().then_some(local)
            }
        };
        let config = Self::from_sources(path.as_deref())?;
        Ok(LoadedConfig { config, path })
    }

    fn from_sources(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default()).context("failed to encode config defaults")?,
        );
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        config.scheduler.to_config()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;

    #[test]
    #[serial]
    fn defaults_without_file() {
        let config = AppConfig::from_sources(None).unwrap();
        assert_eq!(config.scheduler.min_delay_ms, 300);
        assert_eq!(config.scheduler.max_delay_ms, 1000);
        assert_eq!(config.server.public_base, "/crawler");
        assert!(config.browser.headless);
    }

    #[test]
    #[serial]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("politecrawl.yaml");
        fs::write(
            &path,
            "scheduler:\n  min_delay_ms: 50\n  max_delay_ms: 80\nserver:\n  port: 12000\n  static_root: ./public\nlog:\n  format: json\n",
        )
        .unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.scheduler.min_delay_ms, 50);
        assert_eq!(loaded.config.server.port, 12000);
        assert_eq!(loaded.config.server.static_root, Some(PathBuf::from("./public")));
        assert_eq!(loaded.config.server.crawler_dir, PathBuf::from("crawlers"));
        assert_eq!(loaded.config.log.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn environment_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("politecrawl.yaml");
        fs::write(&path, "server:\n  port: 12000\n").unwrap();
        env::set_var("POLITECRAWL__SERVER__PORT", "9100");

        let result = AppConfig::load(Some(&path));
        env::remove_var("POLITECRAWL__SERVER__PORT");

        assert_eq!(result.unwrap().config.server.port, 9100);
    }

    #[test]
    #[serial]
    fn inverted_delay_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("politecrawl.yaml");
        fs::write(&path, "scheduler:\n  min_delay_ms: 900\n  max_delay_ms: 100\n").unwrap();

        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/politecrawl.yaml"))).is_err());
    }
}
