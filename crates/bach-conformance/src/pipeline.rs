//! Staged execution of one runnable case
//!
//! Preparing → Executing → Verifying → Done, with Failed reachable from the
//! first two stages. Each case gets a fresh state container.

use crate::collaborator::{
    BlockImportRequest, ChainHead, CodeRequest, ExecutionResult, StateFactory, StateStore, Vm,
};
use crate::config::RunConfig;
use crate::error::CollaboratorResult;
use crate::fake_chain::FakeChain;
use crate::fixture::ExecCase;
use crate::memory_state::MemoryState;
use crate::outcome::{Outcome, OutcomeKind, Stage};
use crate::prepare::{apply_overrides, prepare};
use crate::verifier::{AssertionSink, Verifier};

/// External collaborators of a session
pub struct Collaborators {
    vm: Box<dyn Vm>,
    states: Box<dyn StateFactory>,
    chain: FakeChain,
}

impl Collaborators {
    /// Bundle a VM with a state factory
    pub fn new(vm: Box<dyn Vm>, states: Box<dyn StateFactory>) -> Self {
        Self {
            vm,
            states,
            chain: FakeChain::new(),
        }
    }

    /// Bundle a VM with in-memory state containers
    pub fn in_memory(vm: Box<dyn Vm>) -> Self {
        let factory: fn() -> Box<dyn StateStore> = MemoryState::boxed;
        Self::new(vm, Box::new(factory))
    }

    /// Fresh, empty state container
    pub fn fresh_state(&self) -> Box<dyn StateStore> {
        self.states.create()
    }

    /// Block hash provider
    pub fn chain(&self) -> &FakeChain {
        &self.chain
    }

    /// Execute code through the VM
    pub fn execute(
        &mut self,
        request: &CodeRequest,
        state: &mut dyn StateStore,
    ) -> CollaboratorResult<ExecutionResult> {
        self.vm.run_code(request, state, &self.chain)
    }

    /// Import blocks through the VM
    pub fn import(
        &mut self,
        request: &BlockImportRequest,
        state: &mut dyn StateStore,
    ) -> CollaboratorResult<ChainHead> {
        self.vm.import_blocks(request, state)
    }
}

/// Stage tracker for one case
#[derive(Debug)]
pub struct CaseRun<'a> {
    name: &'a str,
    stage: Stage,
}

impl<'a> CaseRun<'a> {
    /// Start in [`Stage::Preparing`]
    pub fn start(name: &'a str) -> Self {
        tracing::debug!("{}: {}", name, Stage::Preparing);
        Self {
            name,
            stage: Stage::Preparing,
        }
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to the next stage; terminal stages stay put
    pub fn advance(&mut self, next: Stage) {
        if self.stage.is_terminal() {
            return;
        }
        tracing::debug!("{}: {} -> {}", self.name, self.stage, next);
        self.stage = next;
    }
}

/// Run one case end to end
///
/// Run-wide overrides are applied first. Setup and collaborator errors end the
/// case with a distinct outcome; assertion results flow into `sink`.
pub fn run_case(
    fixture: &str,
    mut case: ExecCase,
    config: &RunConfig,
    collaborators: &mut Collaborators,
    sink: &mut dyn AssertionSink,
) -> Outcome {
    apply_overrides(&mut case, config.overrides());
    let mut run = CaseRun::start(&case.name);

    let mut state = collaborators.fresh_state();
    let request = match prepare(&case, state.as_mut(), config) {
        Ok(request) => request,
        Err(e) => {
            run.advance(Stage::Failed);
            return Outcome::new(fixture, &case.name, OutcomeKind::SetupFailed(e.to_string()));
        }
    };

    run.advance(Stage::Executing);
    let result = match collaborators.execute(&request, state.as_mut()) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("{}/{}: {}", fixture, case.name, e);
            run.advance(Stage::Failed);
            return Outcome::new(fixture, &case.name, OutcomeKind::CollaboratorFailed(e.to_string()));
        }
    };

    run.advance(Stage::Verifying);
    let verification =
        Verifier::new(fixture, &case.name).verify(&case.expected, &result, state.as_ref(), sink);
    run.advance(Stage::Done);

    let kind = if verification.passed() {
        OutcomeKind::Passed
    } else {
        OutcomeKind::AssertionFailed(verification.failures)
    };
    Outcome::new(fixture, &case.name, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::fake_chain::BlockHashProvider;
    use crate::fixture::ExecFixture;
    use crate::verifier::CollectingSink;
    use primitive_types::U256;

    struct FixedVm {
        result: Option<ExecutionResult>,
    }

    impl Vm for FixedVm {
        fn run_code(
            &mut self,
            _request: &CodeRequest,
            _state: &mut dyn StateStore,
            _chain: &dyn BlockHashProvider,
        ) -> CollaboratorResult<ExecutionResult> {
            self.result
                .clone()
                .ok_or_else(|| CollaboratorError::Vm("crashed".to_string()))
        }
    }

    fn case(pre: &str) -> ExecCase {
        let fixture: ExecFixture = serde_json::from_str(&format!(
            r#"{{"exec": {{"address": "0x0f572e5295c57f15886f9b263e2f6d2d6c7b5ec6", "gas": "100000"}}, "gas": "79000", "pre": {}}}"#,
            pre
        ))
        .unwrap();
        fixture.state_case("c")
    }

    fn remaining(gas: u64) -> Option<ExecutionResult> {
        Some(ExecutionResult {
            gas_used: U256::from(100_000 - gas),
            gas_remaining: Some(U256::from(gas)),
            ..Default::default()
        })
    }

    #[test]
    fn test_run_case_passes() {
        let mut collaborators = Collaborators::in_memory(Box::new(FixedVm {
            result: remaining(79_000),
        }));
        let mut sink = CollectingSink::new();
        let outcome = run_case("f", case("{}"), &RunConfig::default(), &mut collaborators, &mut sink);
        assert!(outcome.passed(), "{}", outcome.message());
        assert_eq!(sink.assertions().len(), 1);
    }

    #[test]
    fn test_run_case_assertion_failure() {
        let mut collaborators = Collaborators::in_memory(Box::new(FixedVm {
            result: remaining(78_999),
        }));
        let mut sink = CollectingSink::new();
        let outcome = run_case("f", case("{}"), &RunConfig::default(), &mut collaborators, &mut sink);
        assert!(matches!(outcome.kind, OutcomeKind::AssertionFailed(ref f) if f.len() == 1));
    }

    #[test]
    fn test_setup_failure_skips_execution() {
        let mut collaborators = Collaborators::in_memory(Box::new(FixedVm {
            result: remaining(79_000),
        }));
        let mut sink = CollectingSink::new();
        let outcome = run_case(
            "f",
            case(r#"{"0xzz": {}}"#),
            &RunConfig::default(),
            &mut collaborators,
            &mut sink,
        );
        assert!(matches!(outcome.kind, OutcomeKind::SetupFailed(_)));
        assert!(sink.assertions().is_empty());
    }

    #[test]
    fn test_collaborator_failure() {
        let mut collaborators = Collaborators::in_memory(Box::new(FixedVm {
            result: None,
        }));
        let mut sink = CollectingSink::new();
        let outcome = run_case("f", case("{}"), &RunConfig::default(), &mut collaborators, &mut sink);
        assert_eq!(outcome.kind, OutcomeKind::CollaboratorFailed("vm: crashed".to_string()));
    }

    #[test]
    fn test_case_run_stages() {
        let mut run = CaseRun::start("c");
        assert_eq!(run.stage(), Stage::Preparing);
        run.advance(Stage::Executing);
        run.advance(Stage::Failed);
        run.advance(Stage::Verifying);
        assert_eq!(run.stage(), Stage::Failed);
    }
}
