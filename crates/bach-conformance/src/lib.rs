//! # bach-conformance
//!
//! Conformance test orchestration for external EVM implementations.
//!
//! This crate provides:
//! - JSON parsing for the ethereum/tests fixture formats
//! - Skip/include filtering over the fixture corpus
//! - A fake chain answering BLOCKHASH deterministically
//! - Fixture preparation against a pluggable state container
//! - Category runners (state, block, opcode, custom file) and their verifier
//! - A randomized single-fixture mode for fuzzers
//! - Session statistics and exit status
//!
//! The VM itself is a collaborator behind the [`Vm`] trait. [`ProcessVm`]
//! talks to an external program; tests plug in scripted doubles.
//!
//! ## Test Formats
//!
//! ### GeneralStateTests
//! One call (`exec`) or one transaction with per-fork post conditions.
//!
//! ### BlockchainTests
//! A block list imported on top of a genesis, checked by its last block hash.
//!
//! ### VMTests
//! Single-opcode fixtures with remaining gas and post storage checks.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block_test;
mod collaborator;
mod config;
mod crypto;
mod discovery;
mod dispatcher;
mod error;
mod external;
mod fake_chain;
mod filter;
mod fixture;
mod memory_state;
mod outcome;
mod pipeline;
mod prepare;
mod randomized;
mod runner;
mod types;
mod verifier;

pub use block_test::BlockTestRunner;
pub use collaborator::*;
pub use config::{Discovery, Overrides, RunConfig, RunConfigBuilder, DEFAULT_FORK, SUPPORTED_FORKS};
pub use crypto::{keccak256, secret_key_to_address};
pub use discovery::find_fixture_files;
pub use dispatcher::{select_entries, Category, Dispatcher, Selection};
pub use error::{CollaboratorError, CollaboratorResult, ConformanceError, ConformanceResult};
pub use external::ProcessVm;
pub use fake_chain::{BlockHashProvider, FakeBlock, FakeChain, BLOCK_HASH_WINDOW};
pub use filter::{FixtureFilter, SkipCategory, SkipReason, SkipSet, BROKEN, OPCODE_SKIP, PERMANENT, SLOW};
pub use fixture::*;
pub use memory_state::MemoryState;
pub use outcome::{FileResults, Outcome, OutcomeKind, Stage};
pub use pipeline::{run_case, CaseRun, Collaborators};
pub use prepare::{apply_overrides, apply_preconditions, block_params, build_request, prepare, read_back};
pub use randomized::{run_randomized, Sentinel};
pub use runner::{TestSession, TestStats};
pub use state_test::StateTestRunner;
pub use types::*;
pub use verifier::{
    Assertion, AssertionSink, Check, CollectingSink, FailFastSink, ReportingSink, Verification, Verifier,
};
pub use vm_test::VmTestRunner;
