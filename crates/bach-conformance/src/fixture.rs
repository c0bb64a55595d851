//! Fixture documents and the runnable cases derived from them
//!
//! ## Shapes
//!
//! - **Exec-shaped** (`exec` key): one direct call at one address, with
//!   optional `out`, `gas`, `logs` and `postStateRoot` expectations. Used by the
//!   state category, the randomized runner and (with different rules) opcode
//!   fixtures.
//! - **Transaction-shaped** (`transaction` + `post`): one transaction with data,
//!   gas and value alternatives, and per-fork post conditions selecting one
//!   alternative each.
//! - **Block-shaped**: a genesis, a list of RLP blocks and the expected head.

use crate::collaborator::LogEntry;
use crate::crypto::{keccak256, secret_key_to_address};
use crate::error::{ConformanceError, ConformanceResult};
use crate::types::*;
use primitive_types::{H256, U256};
use rlp::RlpStream;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Common Types
// =============================================================================

/// Block environment of a fixture
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureEnv {
    /// Current coinbase
    pub current_coinbase: HexAddress,
    /// Current difficulty
    pub current_difficulty: Quantity,
    /// Current gas limit
    pub current_gas_limit: Quantity,
    /// Current block number
    pub current_number: HexU64,
    /// Current timestamp
    pub current_timestamp: HexU64,
    /// Current base fee (optional, EIP-1559)
    pub current_base_fee: Option<Quantity>,
    /// Current random (optional, post-merge)
    pub current_random: Option<HexH256>,
    /// Previous hash
    pub previous_hash: Option<HexH256>,
}

/// Log as declared by a fixture
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedLog {
    /// Emitting address
    pub address: HexAddress,
    /// Topics in order
    #[serde(default)]
    pub topics: Vec<HexH256>,
    /// Data
    #[serde(default)]
    pub data: HexBytes,
}

impl From<&ExpectedLog> for LogEntry {
    fn from(log: &ExpectedLog) -> Self {
        LogEntry {
            address: log.address.0,
            topics: log.topics.iter().map(|t| t.0).collect(),
            data: log.data.0.clone(),
        }
    }
}

/// `logs` is a list in state fixtures and a hash in opcode fixtures
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LogsField {
    /// keccak256 of the RLP log list
    Hash(HexH256),
    /// Explicit log list
    Entries(Vec<ExpectedLog>),
}

// =============================================================================
// Expectations
// =============================================================================

/// Gas comparison rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasRule {
    /// Exec-shaped state fixtures: the declared `gas` when execution completes
    /// normally, otherwise the whole gas limit must have been consumed
    Declared {
        /// Declared `gas` value, if any
        expected: Option<U256>,
        /// Gas limit handed to the VM
        limit: U256,
    },
    /// Opcode fixtures: remaining gas must equal the declared value
    Remaining(U256),
}

/// Whether execution is expected to raise
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionRule {
    /// Execution must terminate exceptionally
    Raise(Option<String>),
    /// Execution must complete normally
    NoRaise,
}

/// Declared expectations of one runnable case; absent ones are not checked
#[derive(Debug, Clone, Default)]
pub struct Expectations {
    /// Exact return data
    pub return_data: Option<Vec<u8>>,
    /// Logs in order; an empty list is not checked
    pub logs: Vec<LogEntry>,
    /// Gas rule
    pub gas: Option<GasRule>,
    /// keccak256 of the RLP log list
    pub logs_hash: Option<H256>,
    /// State root after execution
    pub state_root: Option<H256>,
    /// Exception expectation
    pub exception: Option<ExceptionRule>,
    /// Accounts that must exist after execution
    pub post_accounts: Option<BTreeMap<String, AccountState>>,
    /// Best block hash after a block import
    pub head_hash: Option<H256>,
}

/// Call described by a case, before run configuration overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// Executing address
    pub address: Address,
    /// Caller
    pub caller: Address,
    /// Origin
    pub origin: Address,
    /// Code to run; `None` loads the code stored at `address`
    pub code: Option<Vec<u8>>,
    /// Call data
    pub data: Vec<u8>,
    /// Gas limit
    pub gas_limit: U256,
    /// Gas price
    pub gas_price: U256,
    /// Value
    pub value: U256,
    /// Contract creation
    pub is_create: bool,
}

/// One runnable sub-test
#[derive(Debug, Clone)]
pub struct ExecCase {
    /// Sub-test name
    pub name: String,
    /// Preconditions
    pub pre: BTreeMap<String, AccountState>,
    /// Block environment
    pub env: FixtureEnv,
    /// Call
    pub call: CallSpec,
    /// Expectations
    pub expected: Expectations,
}

// =============================================================================
// Exec-shaped Fixtures
// =============================================================================

/// Execution parameters of an exec-shaped fixture
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecParams {
    /// Address of the executing account
    pub address: HexAddress,
    /// Caller address
    #[serde(default)]
    pub caller: Option<HexAddress>,
    /// Origin address
    #[serde(default)]
    pub origin: Option<HexAddress>,
    /// Code to execute; defaults to the code stored at `address`
    #[serde(default)]
    pub code: Option<HexBytes>,
    /// Input data
    #[serde(default)]
    pub data: HexBytes,
    /// Gas provided
    pub gas: Quantity,
    /// Gas price
    #[serde(default)]
    pub gas_price: Quantity,
    /// Value transferred
    #[serde(default)]
    pub value: Quantity,
}

/// Exec-shaped fixture (state and opcode categories)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecFixture {
    /// Environment info
    #[serde(default)]
    pub env: FixtureEnv,
    /// Execution parameters
    pub exec: ExecParams,
    /// Pre-execution state
    #[serde(default)]
    pub pre: BTreeMap<String, AccountState>,
    /// Expected output
    #[serde(default)]
    pub out: Option<HexBytes>,
    /// Expected gas (remaining gas in corpus fixtures)
    #[serde(default)]
    pub gas: Option<Quantity>,
    /// Expected logs
    #[serde(default)]
    pub logs: Option<LogsField>,
    /// Expected state root
    #[serde(default)]
    pub post_state_root: Option<HexH256>,
    /// Post-execution accounts (opcode fixtures)
    #[serde(default)]
    pub post: Option<BTreeMap<String, AccountState>>,
}

impl ExecFixture {
    fn call_spec(&self) -> CallSpec {
        let exec = &self.exec;
        let caller = exec.caller.unwrap_or_default().0;
        CallSpec {
            address: exec.address.0,
            caller,
            origin: exec.origin.map(|o| o.0).unwrap_or(caller),
            code: exec.code.as_ref().map(|c| c.0.clone()),
            data: exec.data.0.clone(),
            gas_limit: exec.gas.0,
            gas_price: exec.gas_price.0,
            value: exec.value.0,
            is_create: false,
        }
    }

    fn split_logs(&self) -> (Vec<LogEntry>, Option<H256>) {
        match &self.logs {
            Some(LogsField::Entries(entries)) => (entries.iter().map(LogEntry::from).collect(), None),
            Some(LogsField::Hash(hash)) => (Vec::new(), Some(hash.0)),
            None => (Vec::new(), None),
        }
    }

    /// Case verified with the state-category rules
    pub fn state_case(&self, name: &str) -> ExecCase {
        let (logs, logs_hash) = self.split_logs();
        let expected = Expectations {
            // An empty `out` is not an expectation
            return_data: self
                .out
                .as_ref()
                .filter(|out| !out.0.is_empty())
                .map(|out| out.0.clone()),
            logs,
            gas: Some(GasRule::Declared {
                expected: self.gas.map(|g| g.0),
                limit: self.exec.gas.0,
            }),
            logs_hash,
            state_root: self.post_state_root.map(|r| r.0),
            exception: None,
            post_accounts: None,
            head_hash: None,
        };
        ExecCase {
            name: name.to_string(),
            pre: self.pre.clone(),
            env: self.env.clone(),
            call: self.call_spec(),
            expected,
        }
    }

    /// Case verified with the opcode-category rules
    ///
    /// A fixture without `gas` and `post` expects the execution to raise.
    pub fn opcode_case(&self, name: &str) -> ExecCase {
        let (logs, logs_hash) = self.split_logs();
        let expects_success = self.gas.is_some() || self.post.is_some();
        let expected = if expects_success {
            Expectations {
                return_data: self.out.as_ref().map(|out| out.0.clone()),
                logs,
                gas: self.gas.map(|g| GasRule::Remaining(g.0)),
                logs_hash,
                state_root: self.post_state_root.map(|r| r.0),
                exception: Some(ExceptionRule::NoRaise),
                post_accounts: self.post.clone(),
                head_hash: None,
            }
        } else {
            Expectations {
                exception: Some(ExceptionRule::Raise(None)),
                ..Default::default()
            }
        };
        ExecCase {
            name: name.to_string(),
            pre: self.pre.clone(),
            env: self.env.clone(),
            call: self.call_spec(),
            expected,
        }
    }
}

// =============================================================================
// Transaction-shaped Fixtures
// =============================================================================

/// Transaction with data/gas/value alternatives
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransaction {
    /// Data options
    pub data: Vec<HexBytes>,
    /// Gas limit options
    pub gas_limit: Vec<Quantity>,
    /// Gas price
    #[serde(default)]
    pub gas_price: Option<Quantity>,
    /// Max fee per gas (EIP-1559)
    #[serde(default)]
    pub max_fee_per_gas: Option<Quantity>,
    /// Nonce
    #[serde(default)]
    pub nonce: Quantity,
    /// Secret key
    pub secret_key: HexH256,
    /// To address (empty for contract creation)
    #[serde(default)]
    pub to: Option<String>,
    /// Value options
    pub value: Vec<Quantity>,
}

/// Index selector for transaction variations
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IndexSelector {
    /// Data index
    pub data: usize,
    /// Gas index
    pub gas: usize,
    /// Value index
    pub value: usize,
}

/// Post-state result for a specific index combination
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStateResult {
    /// Hash of post-state
    pub hash: HexH256,
    /// Index selectors
    pub indexes: IndexSelector,
    /// Expected logs hash
    #[serde(default)]
    pub logs: Option<HexH256>,
    /// Expected exception (optional)
    #[serde(default)]
    pub expect_exception: Option<String>,
}

/// Transaction-shaped fixture
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionFixture {
    /// Environment info
    #[serde(default)]
    pub env: FixtureEnv,
    /// Pre-execution state
    #[serde(default)]
    pub pre: BTreeMap<String, AccountState>,
    /// Transaction parameters
    pub transaction: StateTransaction,
    /// Post-execution expectations per fork
    #[serde(default)]
    pub post: BTreeMap<String, Vec<PostStateResult>>,
}

/// Address of a contract created by `sender` at `nonce`
pub fn create_address(sender: &Address, nonce: U256) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    Address::from_slice(&hash.as_bytes()[12..])
}

impl TransactionFixture {
    /// Whether the fixture declares post conditions for a fork
    pub fn has_fork(&self, fork: &str) -> bool {
        self.post.contains_key(fork)
    }

    /// One case per post entry of the fork, named `<name>_<index>`
    pub fn cases(&self, name: &str, fork: &str) -> Vec<ConformanceResult<ExecCase>> {
        self.post
            .get(fork)
            .map(|results| {
                results
                    .iter()
                    .enumerate()
                    .map(|(idx, post)| self.case(&format!("{}_{}", name, idx), post))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn case(&self, name: &str, post: &PostStateResult) -> ConformanceResult<ExecCase> {
        let tx = &self.transaction;
        let idx = &post.indexes;

        let data = tx.data.get(idx.data)
            .ok_or_else(|| ConformanceError::Setup(format!("data index {} out of bounds", idx.data)))?;
        let gas_limit = tx.gas_limit.get(idx.gas)
            .ok_or_else(|| ConformanceError::Setup(format!("gas index {} out of bounds", idx.gas)))?;
        let value = tx.value.get(idx.value)
            .ok_or_else(|| ConformanceError::Setup(format!("value index {} out of bounds", idx.value)))?;

        let gas_price = tx.gas_price
            .or(tx.max_fee_per_gas)
            .map(|p| p.0)
            .unwrap_or_default();

        let sender = secret_key_to_address(&tx.secret_key.0).map_err(ConformanceError::Setup)?;

        let to = match tx.to.as_deref().map(str::trim) {
            Some(to) if !to.is_empty() && to != "0x" => {
                Some(parse_address(to).map_err(ConformanceError::Setup)?)
            }
            _ => None,
        };

        let call = match to {
            Some(address) => CallSpec {
                address,
                caller: sender,
                origin: sender,
                code: None,
                data: data.0.clone(),
                gas_limit: gas_limit.0,
                gas_price,
                value: value.0,
                is_create: false,
            },
            None => CallSpec {
                address: create_address(&sender, tx.nonce.0),
                caller: sender,
                origin: sender,
                code: Some(data.0.clone()),
                data: Vec::new(),
                gas_limit: gas_limit.0,
                gas_price,
                value: value.0,
                is_create: true,
            },
        };

        let expected = Expectations {
            logs_hash: post.logs.map(|l| l.0),
            state_root: Some(post.hash.0),
            exception: post.expect_exception.clone().map(|e| ExceptionRule::Raise(Some(e))),
            ..Default::default()
        };

        Ok(ExecCase {
            name: name.to_string(),
            pre: self.pre.clone(),
            env: self.env.clone(),
            call,
            expected,
        })
    }
}

/// Either state fixture shape
#[derive(Debug, Clone)]
pub enum StateFixture {
    /// Exec-shaped
    Exec(ExecFixture),
    /// Transaction-shaped
    Transaction(TransactionFixture),
}

impl StateFixture {
    /// Decide the shape by the presence of a `transaction` key
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("transaction").is_some() {
            serde_json::from_value(value).map(StateFixture::Transaction)
        } else {
            serde_json::from_value(value).map(StateFixture::Exec)
        }
    }
}

// =============================================================================
// Block-shaped Fixtures
// =============================================================================

/// Genesis header fields the harness needs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisHeader {
    /// Header hash
    pub hash: HexH256,
    /// State root
    #[serde(default)]
    pub state_root: Option<HexH256>,
}

/// One block of a block fixture
#[derive(Debug, Clone, Deserialize)]
pub struct BlockEntry {
    /// RLP encoded block
    pub rlp: HexBytes,
    /// Remaining keys (`blockHeader`, `expectException*`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl BlockEntry {
    /// Whether the fixture marks this block as invalid
    pub fn expects_exception(&self) -> bool {
        self.extra.keys().any(|k| k.starts_with("expectException"))
    }
}

/// Expected post state: either full accounts or just a root
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PostState {
    /// State root
    Root(HexH256),
    /// Account map
    Accounts(BTreeMap<String, AccountState>),
}

/// Block-shaped fixture
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFixture {
    /// Genesis header
    pub genesis_block_header: GenesisHeader,
    /// RLP encoded genesis block
    #[serde(rename = "genesisRLP", default)]
    pub genesis_rlp: Option<HexBytes>,
    /// Blocks in import order
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
    /// Pre-import state
    #[serde(default)]
    pub pre: BTreeMap<String, AccountState>,
    /// Expected post state
    #[serde(default)]
    pub post_state: Option<PostState>,
    /// Expected post state root, when given separately
    #[serde(default)]
    pub post_state_hash: Option<HexH256>,
    /// Hash of the best block
    pub lastblockhash: HexH256,
    /// Fork the fixture was generated for
    #[serde(default)]
    pub network: Option<String>,
}

// =============================================================================
// Fixture Files
// =============================================================================

/// A fixture file: named sub-tests in declared order
#[derive(Debug, Clone)]
pub struct FixtureFile {
    /// Source path
    pub path: PathBuf,
    /// Sub-test name and raw document, in file order
    pub entries: Vec<(String, Value)>,
}

impl FixtureFile {
    /// Read and split a fixture file
    pub fn load(path: &Path) -> ConformanceResult<Self> {
        if !path.is_file() {
            return Err(ConformanceError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: parse_entries(&content)?,
        })
    }

    /// File stem, used as the fixture's file name
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// File stem of a path as an owned string
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Split a fixture document into its top-level named sub-tests
pub fn parse_entries(text: &str) -> ConformanceResult<Vec<(String, Value)>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(ConformanceError::Parse(format!(
            "fixture document must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
