//! Scripted collaborator doubles shared by the integration tests

#![allow(dead_code)]

use bach_conformance::*;
use primitive_types::U256;
use std::cell::Cell;
use std::rc::Rc;

type Script = Box<dyn FnMut(&CodeRequest, &mut dyn StateStore) -> CollaboratorResult<ExecutionResult>>;

/// VM whose behaviour is a closure; counts invocations
pub struct ScriptedVm {
    script: Script,
    calls: Rc<Cell<usize>>,
}

impl ScriptedVm {
    /// VM running `script`, plus a handle on its call counter
    pub fn new<F>(script: F) -> (Self, Rc<Cell<usize>>)
    where
        F: FnMut(&CodeRequest, &mut dyn StateStore) -> CollaboratorResult<ExecutionResult> + 'static,
    {
        let calls = Rc::new(Cell::new(0));
        let vm = Self {
            script: Box::new(script),
            calls: Rc::clone(&calls),
        };
        (vm, calls)
    }

    /// VM that always returns `result`
    pub fn fixed(result: ExecutionResult) -> (Self, Rc<Cell<usize>>) {
        Self::new(move |_, _| Ok(result.clone()))
    }

    /// VM that spends `used` gas and reports the remainder
    pub fn spending(used: u64) -> (Self, Rc<Cell<usize>>) {
        Self::new(move |request, _| {
            let used = U256::from(used);
            Ok(ExecutionResult {
                gas_used: used,
                gas_remaining: Some(request.call.gas_limit.saturating_sub(used)),
                ..Default::default()
            })
        })
    }
}

impl Vm for ScriptedVm {
    fn run_code(
        &mut self,
        request: &CodeRequest,
        state: &mut dyn StateStore,
        _chain: &dyn BlockHashProvider,
    ) -> CollaboratorResult<ExecutionResult> {
        self.calls.set(self.calls.get() + 1);
        (self.script)(request, state)
    }
}

/// Collaborators around a scripted VM with in-memory state
pub fn collaborators(vm: ScriptedVm) -> Collaborators {
    Collaborators::in_memory(Box::new(vm))
}

/// Exec-shaped fixture document with one sub-test
pub fn exec_fixture(name: &str, gas_limit: u64, expected_gas: Option<u64>, extra: &str) -> String {
    let gas = expected_gas
        .map(|g| format!(r#""gas": "{}","#, g))
        .unwrap_or_default();
    format!(
        r#"{{"{name}": {{
            "env": {{"currentCoinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba", "currentNumber": "1"}},
            "exec": {{"address": "0x0f572e5295c57f15886f9b263e2f6d2d6c7b5ec6", "caller": "0xcd1722f3947def4cf144679da39c4c32bdc35681", "code": "0x00", "gas": "{gas_limit}"}},
            {gas}
            {extra}
            "pre": {{}}
        }}}}"#
    )
}
