//! Interfaces to the external VM and state collaborators
//!
//! The orchestration core never interprets bytecode or builds tries. It writes
//! preconditions into a [`StateStore`], hands a [`CodeRequest`] or
//! [`BlockImportRequest`] to a [`Vm`], and compares what comes back.

use crate::crypto::keccak256;
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::fake_chain::BlockHashProvider;
use crate::types::Address;
use primitive_types::{H256, U256};
use rlp::{Encodable, RlpStream};
use std::collections::BTreeMap;

/// Empty code hash (keccak256 of empty bytes)
pub const EMPTY_CODE_HASH: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c,
    0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b,
    0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Empty storage root (keccak256 of RLP encoded empty string)
pub const EMPTY_STORAGE_ROOT: H256 = H256([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6,
    0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0,
    0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// Account record as read back from a state container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// Account nonce
    pub nonce: U256,
    /// Account balance
    pub balance: U256,
    /// Code hash (keccak256 of code, or EMPTY_CODE_HASH if no code)
    pub code_hash: H256,
    /// Storage root of the account's storage
    pub storage_root: H256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: U256::zero(),
            balance: U256::zero(),
            code_hash: EMPTY_CODE_HASH,
            storage_root: EMPTY_STORAGE_ROOT,
        }
    }
}

/// Full contents of one account, used to move state across the VM boundary
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountDump {
    /// Nonce
    pub nonce: U256,
    /// Balance
    pub balance: U256,
    /// Code
    pub code: Vec<u8>,
    /// Non-zero storage slots
    pub storage: BTreeMap<H256, H256>,
}

/// Every account of a state container, ordered by address
pub type StateDump = BTreeMap<Address, AccountDump>;

/// Read/write access to a state container
pub trait StateStore {
    /// Create or overwrite an account's nonce and balance
    fn set_account(&mut self, address: Address, nonce: U256, balance: U256) -> CollaboratorResult<()>;

    /// Set an account's code
    fn set_code(&mut self, address: Address, code: Vec<u8>) -> CollaboratorResult<()>;

    /// Set a storage slot; a zero value clears it
    fn set_storage(&mut self, address: Address, key: H256, value: H256) -> CollaboratorResult<()>;

    /// Account record, or `None` if the account does not exist
    fn get_account(&self, address: &Address) -> CollaboratorResult<Option<Account>>;

    /// Account code (empty if none)
    fn get_code(&self, address: &Address) -> CollaboratorResult<Vec<u8>>;

    /// Storage slot value (zero if unset)
    fn get_storage(&self, address: &Address, key: &H256) -> CollaboratorResult<H256>;

    /// Root over the whole state
    fn state_root(&self) -> CollaboratorResult<H256>;

    /// Export every account
    fn dump(&self) -> CollaboratorResult<StateDump>;

    /// Replace the whole contents with a dump
    fn restore(&mut self, dump: StateDump) -> CollaboratorResult<()>;
}

/// Builds an empty state container for each fixture
pub trait StateFactory {
    /// Fresh, empty container
    fn create(&self) -> Box<dyn StateStore>;
}

impl<F> StateFactory for F
where
    F: Fn() -> Box<dyn StateStore>,
{
    fn create(&self) -> Box<dyn StateStore> {
        self()
    }
}

/// Log emitted by an execution
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogEntry {
    /// Contract address that emitted the log
    pub address: Address,
    /// Log topics (0-4)
    pub topics: Vec<H256>,
    /// Log data
    pub data: Vec<u8>,
}

impl Encodable for LogEntry {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.address);
        s.begin_list(self.topics.len());
        for topic in &self.topics {
            s.append(topic);
        }
        s.append(&self.data);
    }
}

/// keccak256 of the RLP list of logs, as fixtures record it
pub fn logs_hash(logs: &[LogEntry]) -> H256 {
    let mut stream = RlpStream::new_list(logs.len());
    for log in logs {
        stream.append(log);
    }
    keccak256(&stream.out())
}

/// Output of one code execution; never mutated after the VM returns it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Return data
    pub return_data: Vec<u8>,
    /// Gas consumed
    pub gas_used: U256,
    /// Gas left over, when the VM reports it
    pub gas_remaining: Option<U256>,
    /// Logs in emission order
    pub logs: Vec<LogEntry>,
    /// Exception description if execution terminated exceptionally
    pub exception: Option<String>,
    /// State root after execution, when the VM reports it
    pub state_root: Option<H256>,
    /// Best block hash, for block imports
    pub head_hash: Option<H256>,
}

impl ExecutionResult {
    /// Whether execution terminated exceptionally (out of gas, invalid opcode, ...)
    pub fn exception_occurred(&self) -> bool {
        self.exception.is_some()
    }

    /// Gas figure compared against a fixture's `gas` expectation
    ///
    /// Corpus fixtures record remaining gas; VMs that only report usage are
    /// compared on usage.
    pub fn reported_gas(&self) -> U256 {
        self.gas_remaining.unwrap_or(self.gas_used)
    }
}

/// Call context handed to the VM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallParams {
    /// Executing account
    pub address: Address,
    /// Caller
    pub caller: Address,
    /// Transaction origin
    pub origin: Address,
    /// Code to run (init code for creations)
    pub code: Vec<u8>,
    /// Call data
    pub data: Vec<u8>,
    /// Value transferred
    pub value: U256,
    /// Gas limit
    pub gas_limit: U256,
    /// Gas price
    pub gas_price: U256,
    /// Whether this is a contract creation
    pub is_create: bool,
    /// Executing account as read back after preconditions were applied
    pub account: Account,
}

/// Block environment handed to the VM
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockParams {
    /// Block number
    pub number: u64,
    /// Timestamp
    pub timestamp: u64,
    /// Difficulty
    pub difficulty: U256,
    /// Block gas limit
    pub gas_limit: U256,
    /// Coinbase
    pub coinbase: Address,
    /// Base fee, post-London fixtures only
    pub base_fee: Option<U256>,
    /// PREVRANDAO value (falls back to difficulty)
    pub prev_randao: H256,
}

/// Everything a VM needs to execute one fixture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeRequest {
    /// Fork rule set
    pub fork: String,
    /// Whether the VM should trace execution
    pub trace: bool,
    /// Call context
    pub call: CallParams,
    /// Block environment
    pub block: BlockParams,
}

/// One block of a block-level fixture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInput {
    /// RLP encoded block
    pub rlp: Vec<u8>,
    /// Whether the fixture expects this block to be rejected
    pub expect_invalid: bool,
}

/// Block list to import on top of a fixture's genesis
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockImportRequest {
    /// Fork rule set
    pub fork: String,
    /// Whether the importer should log each block
    pub debug: bool,
    /// RLP encoded genesis block, if the fixture provides one
    pub genesis_rlp: Option<Vec<u8>>,
    /// Hash of the genesis header
    pub genesis_hash: H256,
    /// Blocks in import order
    pub blocks: Vec<BlockInput>,
}

/// Chain head after a block import
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainHead {
    /// Hash of the best block
    pub hash: H256,
    /// State root of the best block
    pub state_root: H256,
}

/// External virtual machine
pub trait Vm {
    /// Execute code against the given state
    fn run_code(
        &mut self,
        request: &CodeRequest,
        state: &mut dyn StateStore,
        chain: &dyn BlockHashProvider,
    ) -> CollaboratorResult<ExecutionResult>;

    /// Import a block list on top of the given state and report the new head
    fn import_blocks(
        &mut self,
        request: &BlockImportRequest,
        state: &mut dyn StateStore,
    ) -> CollaboratorResult<ChainHead> {
        let _ = (request, state);
        Err(CollaboratorError::Unsupported(
            "this VM does not import blocks".to_string(),
        ))
    }
}
