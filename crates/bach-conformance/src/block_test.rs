//! Block test runner
//!
//! Imports a fixture's block list through the VM on top of its preconditions
//! and checks the resulting head hash and post state.

use crate::collaborator::{BlockImportRequest, BlockInput, ExecutionResult};
use crate::config::RunConfig;
use crate::dispatcher::{select_entries, Selection};
use crate::fixture::{BlockFixture, Expectations, FixtureFile, PostState};
use crate::outcome::{FileResults, Outcome, OutcomeKind, Stage};
use crate::pipeline::{CaseRun, Collaborators};
use crate::prepare::apply_preconditions;
use crate::verifier::{AssertionSink, Verifier};
use serde_json::Value;

/// Block test runner
pub struct BlockTestRunner<'a> {
    config: &'a RunConfig,
}

impl<'a> BlockTestRunner<'a> {
    /// Create new block test runner
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Run all selected tests in a file
    pub fn run_file(
        &self,
        file: &FixtureFile,
        collaborators: &mut Collaborators,
        sink: &mut dyn AssertionSink,
    ) -> FileResults {
        let mut results = FileResults::new(file.path.to_string_lossy().to_string());

        for selection in select_entries(file, self.config, false) {
            match selection {
                Selection::Skip(outcome) => results.outcomes.push(outcome),
                Selection::Run(name, value) => {
                    let outcome = self.run_fixture(name, value.clone(), collaborators, sink);
                    outcome.log();
                    results.outcomes.push(outcome);
                }
            }
        }

        results
    }

    /// Run one block fixture
    pub fn run_fixture(
        &self,
        name: &str,
        value: Value,
        collaborators: &mut Collaborators,
        sink: &mut dyn AssertionSink,
    ) -> Outcome {
        let fixture: BlockFixture = match serde_json::from_value(value) {
            Ok(fixture) => fixture,
            Err(e) => {
                return Outcome::new(name, name, OutcomeKind::SetupFailed(format!("malformed fixture: {}", e)))
            }
        };

        if let Some(network) = fixture.network.as_deref() {
            if network != self.config.fork() {
                return Outcome::skipped(
                    name,
                    name,
                    format!("network {} differs from fork {}", network, self.config.fork()),
                );
            }
        }

        let mut run = CaseRun::start(name);
        let mut state = collaborators.fresh_state();
        if let Err(e) = apply_preconditions(&fixture.pre, state.as_mut()) {
            run.advance(Stage::Failed);
            return Outcome::new(name, name, OutcomeKind::SetupFailed(e.to_string()));
        }

        let request = BlockImportRequest {
            fork: self.config.fork().to_string(),
            debug: self.config.debug(),
            genesis_rlp: fixture.genesis_rlp.as_ref().map(|r| r.0.clone()),
            genesis_hash: fixture.genesis_block_header.hash.0,
            blocks: fixture
                .blocks
                .iter()
                .map(|b| BlockInput {
                    rlp: b.rlp.0.clone(),
                    expect_invalid: b.expects_exception(),
                })
                .collect(),
        };
        if self.config.debug() {
            tracing::info!(
                "{}: importing {} blocks on genesis {:?}",
                name,
                request.blocks.len(),
                request.genesis_hash
            );
        }

        run.advance(Stage::Executing);
        let head = match collaborators.import(&request, state.as_mut()) {
            Ok(head) => head,
            Err(e) => {
                tracing::error!("{}: {}", name, e);
                run.advance(Stage::Failed);
                return Outcome::new(name, name, OutcomeKind::CollaboratorFailed(e.to_string()));
            }
        };

        run.advance(Stage::Verifying);
        let result = ExecutionResult {
            head_hash: Some(head.hash),
            state_root: Some(head.state_root),
            ..Default::default()
        };
        let verification =
            Verifier::new(name, name).verify(&expectations(&fixture), &result, state.as_ref(), sink);
        run.advance(Stage::Done);

        if verification.passed() {
            Outcome::new(name, name, OutcomeKind::Passed)
        } else {
            Outcome::new(name, name, OutcomeKind::AssertionFailed(verification.failures))
        }
    }
}

fn expectations(fixture: &BlockFixture) -> Expectations {
    let (root, accounts) = match &fixture.post_state {
        Some(PostState::Root(root)) => (Some(root.0), None),
        Some(PostState::Accounts(accounts)) => (None, Some(accounts.clone())),
        None => (None, None),
    };
    Expectations {
        head_hash: Some(fixture.lastblockhash.0),
        state_root: fixture.post_state_hash.map(|h| h.0).or(root),
        post_accounts: accounts,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{ChainHead, CodeRequest, StateStore, Vm};
    use crate::error::{CollaboratorError, CollaboratorResult};
    use crate::fake_chain::BlockHashProvider;
    use crate::types::Address;
    use primitive_types::{H256, U256};

    /// Credits one wei to 0x11.. per valid block and reports a fixed head
    struct CreditingImporter {
        head: H256,
    }

    impl Vm for CreditingImporter {
        fn run_code(
            &mut self,
            _request: &CodeRequest,
            _state: &mut dyn StateStore,
            _chain: &dyn BlockHashProvider,
        ) -> CollaboratorResult<ExecutionResult> {
            Err(CollaboratorError::Unsupported("blocks only".into()))
        }

        fn import_blocks(
            &mut self,
            request: &BlockImportRequest,
            state: &mut dyn StateStore,
        ) -> CollaboratorResult<ChainHead> {
            let valid = request.blocks.iter().filter(|b| !b.expect_invalid).count();
            state.set_account(Address::repeat_byte(0x11), U256::zero(), U256::from(valid))?;
            Ok(ChainHead {
                hash: self.head,
                state_root: state.state_root()?,
            })
        }
    }

    fn fixture(network: &str, last: &str) -> Value {
        serde_json::json!({
            "genesisBlockHeader": {"hash": "0xaa"},
            "blocks": [{"rlp": "0x01"}, {"rlp": "0x02", "expectException": "bad"}],
            "pre": {},
            "postState": {"0x1111111111111111111111111111111111111111": {"balance": "0x01"}},
            "lastblockhash": last,
            "network": network
        })
    }

    fn run(value: Value) -> Outcome {
        let config = RunConfig::default();
        let runner = BlockTestRunner::new(&config);
        let mut collaborators = Collaborators::in_memory(Box::new(CreditingImporter {
            head: H256::from_low_u64_be(0xcc),
        }));
        let mut sink = crate::verifier::CollectingSink::new();
        runner.run_fixture("chain", value, &mut collaborators, &mut sink)
    }

    #[test]
    fn test_block_fixture_passes() {
        let outcome = run(fixture("Byzantium", "0xcc"));
        assert!(outcome.passed(), "{}", outcome.message());
    }

    #[test]
    fn test_wrong_head_fails() {
        let outcome = run(fixture("Byzantium", "0xdd"));
        assert!(matches!(outcome.kind, OutcomeKind::AssertionFailed(_)));
        assert!(outcome.message().contains("last block hash"));
    }

    #[test]
    fn test_other_network_is_skipped() {
        assert!(run(fixture("Istanbul", "0xcc")).is_skipped());
    }

    #[test]
    fn test_vm_without_import_support() {
        struct CodeOnly;
        impl Vm for CodeOnly {
            fn run_code(
                &mut self,
                _request: &CodeRequest,
                _state: &mut dyn StateStore,
                _chain: &dyn BlockHashProvider,
            ) -> CollaboratorResult<ExecutionResult> {
                Ok(ExecutionResult::default())
            }
        }
        let config = RunConfig::default();
        let mut collaborators = Collaborators::in_memory(Box::new(CodeOnly));
        let mut sink = crate::verifier::CollectingSink::new();
        let outcome = BlockTestRunner::new(&config).run_fixture(
            "chain",
            fixture("Byzantium", "0xcc"),
            &mut collaborators,
            &mut sink,
        );
        assert!(matches!(outcome.kind, OutcomeKind::CollaboratorFailed(_)));
    }
}
