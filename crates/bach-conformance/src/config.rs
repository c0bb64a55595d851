//! Run configuration shared by every dispatch of a session

use crate::filter::FixtureFilter;
use primitive_types::U256;
use std::path::{Path, PathBuf};

/// Fork used when none is configured
pub const DEFAULT_FORK: &str = "Byzantium";

/// Forks the harness knows how to name to a VM
pub const SUPPORTED_FORKS: &[&str] = &[
    "Frontier",
    "Homestead",
    "EIP150",
    "EIP158",
    "Byzantium",
    "Constantinople",
    "ConstantinopleFix",
    "Istanbul",
    "Berlin",
    "London",
    "Paris",
    "Shanghai",
    "Cancun",
];

/// Values that replace the fixture-declared ones for every selected fixture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Gas limit
    pub gas: Option<U256>,
    /// Call data
    pub data: Option<Vec<u8>>,
    /// Value
    pub value: Option<U256>,
}

/// Where fixtures are discovered and how discovery is narrowed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Corpus root containing one directory per category
    pub tests_path: PathBuf,
    /// Only files whose name contains this
    pub file: Option<String>,
    /// Only sub-tests with this name
    pub test: Option<String>,
    /// Only files below a directory with this name
    pub dir: Option<String>,
    /// Skip directories with this name
    pub exclude_dir: Option<String>,
}

/// Immutable configuration of one session
#[derive(Debug, Clone)]
pub struct RunConfig {
    fork: String,
    trace: bool,
    debug: bool,
    overrides: Overrides,
    custom_fixture_path: Option<PathBuf>,
    filter: FixtureFilter,
    discovery: Discovery,
    opcode_enabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfigBuilder::new().build()
    }
}

impl RunConfig {
    /// Start building a configuration
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
    }

    /// Fork rule set
    pub fn fork(&self) -> &str {
        &self.fork
    }

    /// Whether the VM should trace execution
    pub fn trace(&self) -> bool {
        self.trace
    }

    /// Whether block imports log per block
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Gas, data and value overrides
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Custom single-file fixture path
    pub fn custom_fixture_path(&self) -> Option<&Path> {
        self.custom_fixture_path.as_deref()
    }

    /// Skip/include filter
    pub fn filter(&self) -> &FixtureFilter {
        &self.filter
    }

    /// Discovery settings
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Whether opcode fixtures run at all
    pub fn opcode_enabled(&self) -> bool {
        self.opcode_enabled
    }

    /// Whether the configured fork is one the harness knows
    pub fn fork_is_supported(&self) -> bool {
        SUPPORTED_FORKS.contains(&self.fork.as_str())
    }
}

/// Builder for [`RunConfig`]
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConfigBuilder {
    /// Defaults: default fork, standing sets skipped, opcode fixtures disabled
    pub fn new() -> Self {
        Self {
            config: RunConfig {
                fork: DEFAULT_FORK.to_string(),
                trace: false,
                debug: false,
                overrides: Overrides::default(),
                custom_fixture_path: None,
                filter: FixtureFilter::default(),
                discovery: Discovery::default(),
                opcode_enabled: false,
            },
        }
    }

    /// Fork rule set
    pub fn fork(mut self, fork: impl Into<String>) -> Self {
        self.config.fork = fork.into();
        self
    }

    /// Execution tracing
    pub fn trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    /// Block import debug logging
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Gas, data and value overrides
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.config.overrides = overrides;
        self
    }

    /// Custom single-file mode
    pub fn custom_fixture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.custom_fixture_path = Some(path.into());
        self
    }

    /// Skip/include filter
    pub fn filter(mut self, filter: FixtureFilter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Discovery settings
    pub fn discovery(mut self, discovery: Discovery) -> Self {
        self.config.discovery = discovery;
        self
    }

    /// Enable opcode fixtures
    pub fn opcode_enabled(mut self, enabled: bool) -> Self {
        self.config.opcode_enabled = enabled;
        self
    }

    /// Finish
    pub fn build(self) -> RunConfig {
        self.config
    }
}
