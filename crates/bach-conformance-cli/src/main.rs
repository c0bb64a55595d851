//! # bach-conformance
//!
//! Command-line runner for ethereum/tests conformance fixtures.
//!
//! ## Usage
//!
//! ```bash
//! # State and block fixtures of a local corpus
//! bach-conformance --tests-path ./ethereum-tests --vm-command "my-evm --json" --all
//!
//! # Triage the slow set only
//! bach-conformance -s --run-skipped slow --vm-command my-evm
//!
//! # One sub-test of a custom file
//! bach-conformance --custom-state-test ./add11.json --test add11 --vm-command my-evm
//!
//! # Fuzzer oracle: prints 0 or 1
//! bach-conformance -r '{"x": {...}}' --vm-command my-evm
//! ```

use anyhow::{Context, Result};
use bach_conformance::{
    run_randomized, Category, Collaborators, ProcessVm, RunConfig, Sentinel, TestSession,
};
use std::io::Write;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;

use cli::Cli;
use config::Config;

fn main() {
    let cli = Cli::parse_args();

    // stdout carries the sentinel and the summary only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn setup(cli: &Cli) -> Result<(RunConfig, Collaborators)> {
    let config = Config::load(cli.config.as_deref())?;
    let run_config = config.run_config(cli)?;

    let command = config.vm_command(cli);
    let vm = ProcessVm::from_command(&command)
        .context("No VM command: pass --vm-command or set vm_command in the config file")?;
    tracing::debug!("Using external VM: {}", vm.program());
    Ok((run_config, Collaborators::in_memory(Box::new(vm))))
}

/// Fuzzer oracle: stdout holds exactly one sentinel, even when setup fails
fn run_random(cli: &Cli, text: &str) -> Result<i32> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match setup(cli) {
        Ok((run_config, mut collaborators)) => {
            run_randomized(text, &run_config, &mut collaborators, &mut out).context("Cannot write result")?;
        }
        Err(e) => {
            tracing::error!("Randomized setup failed: {:#}", e);
            write!(out, "{}", Sentinel::Fail).context("Cannot write result")?;
        }
    }
    out.flush()?;
    Ok(0)
}

fn run(cli: &Cli) -> Result<i32> {
    if let Some(text) = &cli.random {
        return run_random(cli, text);
    }

    let (run_config, collaborators) = setup(cli)?;
    let mut session = TestSession::new(run_config, collaborators);
    let stats = if session.config().custom_fixture_path().is_some() {
        session.run_custom()?
    } else if cli.all || !cli.selects_category() {
        session.run_all()?
    } else {
        let mut categories = Vec::new();
        if cli.state {
            categories.push(Category::State);
        }
        if cli.blockchain {
            categories.push(Category::Block);
        }
        if cli.vm {
            categories.push(Category::Opcode);
        }
        session.run(&categories)?
    };

    stats.print_summary();
    Ok(stats.exit_code())
}
