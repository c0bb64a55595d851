//! Fixture preparation: preconditions, account read-back, execution request
//!
//! Every error raised here is a setup failure. It aborts the one case and is
//! reported separately from assertion mismatches.

use crate::collaborator::{Account, BlockParams, CallParams, CodeRequest, StateStore};
use crate::config::{Overrides, RunConfig};
use crate::error::{CollaboratorError, ConformanceError, ConformanceResult};
use crate::fixture::{ExecCase, FixtureEnv, GasRule};
use crate::types::{parse_address, parse_word, u256_to_h256, AccountState, Address};
use std::collections::BTreeMap;

fn setup(e: CollaboratorError) -> ConformanceError {
    ConformanceError::Setup(e.to_string())
}

/// Apply run-wide overrides to a case
///
/// A gas override also moves the limit the exceptional gas rule compares
/// against, so both stay consistent.
pub fn apply_overrides(case: &mut ExecCase, overrides: &Overrides) {
    if let Some(gas) = overrides.gas {
        case.call.gas_limit = gas;
        if let Some(GasRule::Declared { limit, .. }) = case.expected.gas.as_mut() {
            *limit = gas;
        }
    }
    if let Some(data) = &overrides.data {
        case.call.data = data.clone();
    }
    if let Some(value) = overrides.value {
        case.call.value = value;
    }
}

/// Write every precondition account into an empty state
pub fn apply_preconditions(
    pre: &BTreeMap<String, AccountState>,
    state: &mut dyn StateStore,
) -> ConformanceResult<()> {
    for (address, account) in pre {
        let address = parse_address(address).map_err(ConformanceError::Setup)?;

        state
            .set_account(address, account.nonce.0, account.balance.0)
            .map_err(setup)?;
        if !account.code.0.is_empty() {
            state.set_code(address, account.code.0.clone()).map_err(setup)?;
        }
        for (key, value) in &account.storage {
            let key = parse_word(key).map_err(ConformanceError::Setup)?;
            state
                .set_storage(address, key, u256_to_h256(value.0))
                .map_err(setup)?;
        }
    }
    Ok(())
}

/// Read back the executing account after preconditions were applied
///
/// A missing account reads as an empty one.
pub fn read_back(state: &dyn StateStore, address: &Address) -> ConformanceResult<Account> {
    Ok(state.get_account(address).map_err(setup)?.unwrap_or_default())
}

/// Block environment of a fixture
pub fn block_params(env: &FixtureEnv) -> BlockParams {
    let prev_randao = env
        .current_random
        .map(|r| r.0)
        .unwrap_or_else(|| u256_to_h256(env.current_difficulty.0));

    BlockParams {
        number: env.current_number.0,
        timestamp: env.current_timestamp.0,
        difficulty: env.current_difficulty.0,
        gas_limit: env.current_gas_limit.0,
        coinbase: env.current_coinbase.0,
        base_fee: env.current_base_fee.map(|f| f.0),
        prev_randao,
    }
}

/// Build the execution request for a prepared case
pub fn build_request(
    case: &ExecCase,
    account: Account,
    state: &dyn StateStore,
    config: &RunConfig,
) -> ConformanceResult<CodeRequest> {
    let call = &case.call;
    let code = match &call.code {
        Some(code) => code.clone(),
        None => state.get_code(&call.address).map_err(setup)?,
    };

    Ok(CodeRequest {
        fork: config.fork().to_string(),
        trace: config.trace(),
        call: CallParams {
            address: call.address,
            caller: call.caller,
            origin: call.origin,
            code,
            data: call.data.clone(),
            value: call.value,
            gas_limit: call.gas_limit,
            gas_price: call.gas_price,
            is_create: call.is_create,
            account,
        },
        block: block_params(&case.env),
    })
}

/// Preconditions, read-back and request assembly, in that order
pub fn prepare(
    case: &ExecCase,
    state: &mut dyn StateStore,
    config: &RunConfig,
) -> ConformanceResult<CodeRequest> {
    apply_preconditions(&case.pre, state)?;
    let account = read_back(state, &case.call.address)?;
    tracing::trace!(
        "{}: executing account storage root {:?}",
        case.name,
        account.storage_root
    );
    build_request(case, account, state, config)
}
