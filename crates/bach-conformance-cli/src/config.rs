//! Configuration file and its merge with the command line

use crate::cli::Cli;
use anyhow::{Context, Result};
use bach_conformance::{parse_quantity, Discovery, FixtureFilter, Overrides, RunConfig, DEFAULT_FORK};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conformance runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Fork rule set
    #[serde(default = "default_fork")]
    pub fork: String,
    /// Corpus root
    #[serde(default = "default_tests_path")]
    pub tests_path: PathBuf,
    /// Standing sets to skip
    #[serde(default)]
    pub skip: Option<String>,
    /// Include-only standing sets
    #[serde(default)]
    pub run_skipped: Option<String>,
    /// Whether opcode fixtures run
    #[serde(default)]
    pub enable_opcode: bool,
    /// External VM program followed by its arguments
    #[serde(default)]
    pub vm_command: Vec<String>,
}

fn default_fork() -> String {
    DEFAULT_FORK.to_string()
}

fn default_tests_path() -> PathBuf {
    PathBuf::from("tests")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fork: default_fork(),
            tests_path: default_tests_path(),
            skip: None,
            run_skipped: None,
            enable_opcode: false,
            vm_command: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".bachledger"))
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("conformance.toml"))
    }

    /// Load an explicitly named file, or the default file when it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse one TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Session configuration: command-line values win over file values
    pub fn run_config(&self, cli: &Cli) -> Result<RunConfig> {
        let fork = cli.fork.clone().unwrap_or_else(|| self.fork.clone());
        let skip = cli.skip.as_deref().or(self.skip.as_deref());
        let run_skipped = cli.run_skipped.as_deref().or(self.run_skipped.as_deref());

        let discovery = Discovery {
            tests_path: cli.tests_path.clone().unwrap_or_else(|| self.tests_path.clone()),
            file: cli.file.clone(),
            test: cli.test.clone(),
            dir: cli.dir.clone(),
            exclude_dir: cli.exclude_dir.clone(),
        };

        let mut builder = RunConfig::builder()
            .fork(fork)
            .trace(cli.trace)
            .debug(cli.debug)
            .overrides(overrides(cli)?)
            .filter(FixtureFilter::from_config(skip, run_skipped))
            .discovery(discovery)
            .opcode_enabled(cli.enable_opcode || self.enable_opcode);
        if let Some(path) = &cli.custom_state_test {
            builder = builder.custom_fixture_path(path);
        }

        let config = builder.build();
        if !config.fork_is_supported() {
            tracing::warn!("Fork {} is not a known rule set, passing it through", config.fork());
        }
        Ok(config)
    }

    /// External VM command line
    pub fn vm_command(&self, cli: &Cli) -> Vec<String> {
        match &cli.vm_command {
            Some(command) => command.split_whitespace().map(str::to_string).collect(),
            None => self.vm_command.clone(),
        }
    }
}

fn overrides(cli: &Cli) -> Result<Overrides> {
    let quantity = |flag: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(parse_quantity)
            .transpose()
            .map_err(|e| anyhow::anyhow!("--{}: {}", flag, e))
    };
    let data = match cli.data.as_deref() {
        Some(text) => Some(hex::decode(text.strip_prefix("0x").unwrap_or(text)).context("--data")?),
        None => None,
    };
    Ok(Overrides {
        gas: quantity("gas", &cli.gas)?,
        data,
        value: quantity("value", &cli.value)?,
    })
}
