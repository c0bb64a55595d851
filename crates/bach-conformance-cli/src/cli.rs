//! CLI argument parsing for bach-conformance

use clap::Parser;
use std::path::PathBuf;

/// Runs ethereum/tests conformance fixtures against an external VM
#[derive(Parser, Debug, Clone)]
#[command(name = "bach-conformance")]
#[command(about = "Runs ethereum/tests conformance fixtures against an external VM")]
#[command(version)]
pub struct Cli {
    /// Fork rule set handed to the VM
    #[arg(long)]
    pub fork: Option<String>,

    /// Standing sets to skip (broken, permanent, slow, all, none)
    #[arg(long)]
    pub skip: Option<String>,

    /// Run only the named standing sets
    #[arg(long)]
    pub run_skipped: Option<String>,

    /// Run GeneralStateTests
    #[arg(short = 's', long)]
    pub state: bool,

    /// Run BlockchainTests
    #[arg(short = 'b', long)]
    pub blockchain: bool,

    /// Run VMTests
    #[arg(short = 'v', long)]
    pub vm: bool,

    /// Run every category
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Enable opcode fixtures
    #[arg(long)]
    pub enable_opcode: bool,

    /// Only files whose name contains this
    #[arg(long)]
    pub file: Option<String>,

    /// Only sub-tests with this name
    #[arg(long)]
    pub test: Option<String>,

    /// Only files below a directory with this name
    #[arg(long)]
    pub dir: Option<String>,

    /// Skip directories with this name
    #[arg(long)]
    pub exclude_dir: Option<String>,

    /// Corpus root containing GeneralStateTests, BlockchainTests and VMTests
    #[arg(long)]
    pub tests_path: Option<PathBuf>,

    /// Run one sub-test of this file through the state path
    #[arg(long)]
    pub custom_state_test: Option<PathBuf>,

    /// Run this fixture document once and print 0 (pass) or 1 (fail)
    #[arg(short = 'r', long)]
    pub random: Option<String>,

    /// Ask the VM to trace execution
    #[arg(long)]
    pub trace: bool,

    /// Log every imported block
    #[arg(long)]
    pub debug: bool,

    /// Gas limit override
    #[arg(long)]
    pub gas: Option<String>,

    /// Call data override (hex)
    #[arg(long)]
    pub data: Option<String>,

    /// Value override
    #[arg(long)]
    pub value: Option<String>,

    /// External VM command line, split on whitespace
    #[arg(long)]
    pub vm_command: Option<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether any category flag was given
    pub fn selects_category(&self) -> bool {
        self.state || self.blockchain || self.vm || self.all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bach-conformance"]);
        assert!(cli.fork.is_none());
        assert!(!cli.selects_category());
        assert!(!cli.enable_opcode);
        assert_eq!(cli.log_level, "info");
        assert!(cli.random.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["bach-conformance", "-s", "-b", "-r", "{}"]);
        assert!(cli.state);
        assert!(cli.blockchain);
        assert!(!cli.vm);
        assert_eq!(cli.random.as_deref(), Some("{}"));
    }

    #[test]
    fn test_cli_long_options() {
        let cli = Cli::parse_from([
            "bach-conformance",
            "--fork",
            "Istanbul",
            "--run-skipped",
            "slow",
            "--exclude-dir",
            "stQuadraticComplexityTest",
            "--vm-command",
            "evm --json",
        ]);
        assert_eq!(cli.fork.as_deref(), Some("Istanbul"));
        assert_eq!(cli.run_skipped.as_deref(), Some("slow"));
        assert_eq!(cli.exclude_dir.as_deref(), Some("stQuadraticComplexityTest"));
        assert_eq!(cli.vm_command.as_deref(), Some("evm --json"));
    }
}
