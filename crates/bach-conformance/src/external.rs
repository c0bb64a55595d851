//! VM reached through an external command
//!
//! Each call spawns the configured command, writes one JSON request to its
//! stdin, closes it and reads one JSON response from stdout. The request
//! carries the full state dump; a response that returns `state` replaces the
//! container contents so post-state checks see what the VM wrote.
//!
//! ```text
//! → {"kind":"code","fork":..,"trace":..,"call":{..},"block":{..},"state":{..},"blockHashes":{..}}
//! ← {"returnData":"0x..","gasUsed":"0x..","gasRemaining":"0x..","logs":[..],"exception":null,"stateRoot":null,"state":{..}}
//!
//! → {"kind":"blocks","fork":..,"debug":..,"genesisRlp":..,"genesisHash":..,"blocks":[..],"state":{..}}
//! ← {"headHash":"0x..","stateRoot":"0x..","state":{..}}
//! ```

use crate::collaborator::{
    AccountDump, BlockImportRequest, ChainHead, CodeRequest, ExecutionResult, LogEntry, StateDump,
    StateStore, Vm,
};
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::fake_chain::BlockHashProvider;
use crate::types::{HexAddress, HexBytes, HexH256, Quantity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct WireAccount {
    #[serde(default)]
    nonce: Quantity,
    #[serde(default)]
    balance: Quantity,
    #[serde(default)]
    code: HexBytes,
    #[serde(default)]
    storage: BTreeMap<HexH256, HexH256>,
}

type WireState = BTreeMap<HexAddress, WireAccount>;

fn to_wire(dump: StateDump) -> WireState {
    dump.into_iter()
        .map(|(address, account)| {
            let wire = WireAccount {
                nonce: Quantity(account.nonce),
                balance: Quantity(account.balance),
                code: HexBytes(account.code),
                storage: account
                    .storage
                    .into_iter()
                    .map(|(k, v)| (HexH256(k), HexH256(v)))
                    .collect(),
            };
            (HexAddress(address), wire)
        })
        .collect()
}

fn from_wire(state: WireState) -> StateDump {
    state
        .into_iter()
        .map(|(address, account)| {
            let dump = AccountDump {
                nonce: account.nonce.0,
                balance: account.balance.0,
                code: account.code.0,
                storage: account.storage.into_iter().map(|(k, v)| (k.0, v.0)).collect(),
            };
            (address.0, dump)
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireExecutingAccount {
    nonce: Quantity,
    balance: Quantity,
    storage_root: HexH256,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCall {
    address: HexAddress,
    caller: HexAddress,
    origin: HexAddress,
    code: HexBytes,
    data: HexBytes,
    value: Quantity,
    gas: Quantity,
    gas_price: Quantity,
    is_create: bool,
    account: WireExecutingAccount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlock {
    number: u64,
    timestamp: u64,
    difficulty: Quantity,
    gas_limit: Quantity,
    coinbase: HexAddress,
    base_fee: Option<Quantity>,
    prev_randao: HexH256,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlockInput {
    rlp: HexBytes,
    expect_exception: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireRequest<'a> {
    #[serde(rename_all = "camelCase")]
    Code {
        fork: &'a str,
        trace: bool,
        call: WireCall,
        block: WireBlock,
        state: WireState,
        block_hashes: BTreeMap<u64, HexH256>,
    },
    #[serde(rename_all = "camelCase")]
    Blocks {
        fork: &'a str,
        debug: bool,
        genesis_rlp: Option<HexBytes>,
        genesis_hash: HexH256,
        blocks: Vec<WireBlockInput>,
        state: WireState,
    },
}

#[derive(Debug, Deserialize)]
struct WireLog {
    address: HexAddress,
    #[serde(default)]
    topics: Vec<HexH256>,
    #[serde(default)]
    data: HexBytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeResponse {
    #[serde(default)]
    return_data: HexBytes,
    gas_used: Quantity,
    #[serde(default)]
    gas_remaining: Option<Quantity>,
    #[serde(default)]
    logs: Vec<WireLog>,
    #[serde(default)]
    exception: Option<String>,
    #[serde(default)]
    state_root: Option<HexH256>,
    #[serde(default)]
    state: Option<WireState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocksResponse {
    head_hash: HexH256,
    state_root: HexH256,
    #[serde(default)]
    state: Option<WireState>,
}

// =============================================================================
// Process VM
// =============================================================================

/// VM implemented by an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessVm {
    program: String,
    args: Vec<String>,
}

impl ProcessVm {
    /// Program and its arguments
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line of program followed by arguments
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    fn exchange<R: DeserializeOwned>(&self, request: &WireRequest<'_>) -> CollaboratorResult<R> {
        let payload =
            serde_json::to_vec(request).map_err(|e| CollaboratorError::Protocol(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload) {
                Ok(()) => {}
                // Child exited without reading its request; its status decides the outcome
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!("{} closed stdin early", self.program);
                }
                Err(e) => {
                    drop(stdin);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(CollaboratorError::Vm(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| CollaboratorError::Protocol(e.to_string()))
    }
}

fn replace_state(state: &mut dyn StateStore, returned: Option<WireState>) -> CollaboratorResult<()> {
    match returned {
        Some(returned) => state.restore(from_wire(returned)),
        None => Ok(()),
    }
}

impl Vm for ProcessVm {
    fn run_code(
        &mut self,
        request: &CodeRequest,
        state: &mut dyn StateStore,
        chain: &dyn BlockHashProvider,
    ) -> CollaboratorResult<ExecutionResult> {
        let call = &request.call;
        let block = &request.block;
        let block_hashes = chain
            .recent_hashes(block.number)
            .into_iter()
            .map(|(n, hash)| (n, HexH256(hash)))
            .collect();

        let wire = WireRequest::Code {
            fork: &request.fork,
            trace: request.trace,
            call: WireCall {
                address: HexAddress(call.address),
                caller: HexAddress(call.caller),
                origin: HexAddress(call.origin),
                code: HexBytes(call.code.clone()),
                data: HexBytes(call.data.clone()),
                value: Quantity(call.value),
                gas: Quantity(call.gas_limit),
                gas_price: Quantity(call.gas_price),
                is_create: call.is_create,
                account: WireExecutingAccount {
                    nonce: Quantity(call.account.nonce),
                    balance: Quantity(call.account.balance),
                    storage_root: HexH256(call.account.storage_root),
                },
            },
            block: WireBlock {
                number: block.number,
                timestamp: block.timestamp,
                difficulty: Quantity(block.difficulty),
                gas_limit: Quantity(block.gas_limit),
                coinbase: HexAddress(block.coinbase),
                base_fee: block.base_fee.map(Quantity),
                prev_randao: HexH256(block.prev_randao),
            },
            state: to_wire(state.dump()?),
            block_hashes,
        };

        let response: CodeResponse = self.exchange(&wire)?;
        replace_state(state, response.state)?;

        Ok(ExecutionResult {
            return_data: response.return_data.0,
            gas_used: response.gas_used.0,
            gas_remaining: response.gas_remaining.map(|g| g.0),
            logs: response
                .logs
                .into_iter()
                .map(|log| LogEntry {
                    address: log.address.0,
                    topics: log.topics.into_iter().map(|t| t.0).collect(),
                    data: log.data.0,
                })
                .collect(),
            exception: response.exception,
            state_root: response.state_root.map(|r| r.0),
            head_hash: None,
        })
    }

    fn import_blocks(
        &mut self,
        request: &BlockImportRequest,
        state: &mut dyn StateStore,
    ) -> CollaboratorResult<ChainHead> {
        let wire = WireRequest::Blocks {
            fork: &request.fork,
            debug: request.debug,
            genesis_rlp: request.genesis_rlp.clone().map(HexBytes),
            genesis_hash: HexH256(request.genesis_hash),
            blocks: request
                .blocks
                .iter()
                .map(|b| WireBlockInput {
                    rlp: HexBytes(b.rlp.clone()),
                    expect_exception: b.expect_invalid,
                })
                .collect(),
            state: to_wire(state.dump()?),
        };

        let response: BlocksResponse = self.exchange(&wire)?;
        replace_state(state, response.state)?;

        Ok(ChainHead {
            hash: response.head_hash.0,
            state_root: response.state_root.0,
        })
    }
}
