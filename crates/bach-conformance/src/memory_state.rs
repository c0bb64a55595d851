//! In-memory state container
//!
//! Roots computed here are keccak256 fingerprints over RLP-encoded, sorted
//! entries. They are stable and content-derived, which is all the harness needs
//! to hand state to a VM and compare it afterwards; they are not Merkle-Patricia
//! roots.

use crate::collaborator::{Account, AccountDump, StateDump, StateStore, EMPTY_CODE_HASH, EMPTY_STORAGE_ROOT};
use crate::crypto::keccak256;
use crate::error::CollaboratorResult;
use crate::types::{h256_to_u256, Address};
use primitive_types::{H256, U256};
use rlp::RlpStream;

/// State container backed by ordered maps
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: StateDump,
}

impl MemoryState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed empty state, usable as a [`crate::StateFactory`]
    pub fn boxed() -> Box<dyn StateStore> {
        Box::new(Self::new())
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no account exists
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn account_mut(&mut self, address: Address) -> &mut AccountDump {
        self.accounts.entry(address).or_default()
    }
}

fn storage_root(account: &AccountDump) -> H256 {
    if account.storage.is_empty() {
        return EMPTY_STORAGE_ROOT;
    }
    let mut stream = RlpStream::new_list(account.storage.len());
    for (key, value) in &account.storage {
        stream.begin_list(2);
        stream.append(key);
        stream.append(&h256_to_u256(value));
    }
    keccak256(&stream.out())
}

fn code_hash(code: &[u8]) -> H256 {
    if code.is_empty() {
        EMPTY_CODE_HASH
    } else {
        keccak256(code)
    }
}

impl StateStore for MemoryState {
    fn set_account(&mut self, address: Address, nonce: U256, balance: U256) -> CollaboratorResult<()> {
        let account = self.account_mut(address);
        account.nonce = nonce;
        account.balance = balance;
        Ok(())
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) -> CollaboratorResult<()> {
        self.account_mut(address).code = code;
        Ok(())
    }

    fn set_storage(&mut self, address: Address, key: H256, value: H256) -> CollaboratorResult<()> {
        let account = self.account_mut(address);
        if value.is_zero() {
            account.storage.remove(&key);
        } else {
            account.storage.insert(key, value);
        }
        Ok(())
    }

    fn get_account(&self, address: &Address) -> CollaboratorResult<Option<Account>> {
        Ok(self.accounts.get(address).map(|account| Account {
            nonce: account.nonce,
            balance: account.balance,
            code_hash: code_hash(&account.code),
            storage_root: storage_root(account),
        }))
    }

    fn get_code(&self, address: &Address) -> CollaboratorResult<Vec<u8>> {
        Ok(self
            .accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn get_storage(&self, address: &Address, key: &H256) -> CollaboratorResult<H256> {
        Ok(self
            .accounts
            .get(address)
            .and_then(|a| a.storage.get(key).copied())
            .unwrap_or_default())
    }

    fn state_root(&self) -> CollaboratorResult<H256> {
        if self.accounts.is_empty() {
            return Ok(EMPTY_STORAGE_ROOT);
        }
        let mut stream = RlpStream::new_list(self.accounts.len());
        for (address, account) in &self.accounts {
            stream.begin_list(5);
            stream.append(address);
            stream.append(&account.nonce);
            stream.append(&account.balance);
            stream.append(&storage_root(account));
            stream.append(&code_hash(&account.code));
        }
        Ok(keccak256(&stream.out()))
    }

    fn dump(&self) -> CollaboratorResult<StateDump> {
        Ok(self.accounts.clone())
    }

    fn restore(&mut self, dump: StateDump) -> CollaboratorResult<()> {
        self.accounts = dump;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_missing_account() {
        let state = MemoryState::new();
        assert!(state.get_account(&addr(1)).unwrap().is_none());
        assert!(state.get_code(&addr(1)).unwrap().is_empty());
        assert_eq!(state.get_storage(&addr(1), &H256::zero()).unwrap(), H256::zero());
    }

    #[test]
    fn test_account_read_back() {
        let mut state = MemoryState::new();
        state.set_account(addr(1), U256::from(3u64), U256::from(100u64)).unwrap();

        let account = state.get_account(&addr(1)).unwrap().unwrap();
        assert_eq!(account.nonce, U256::from(3u64));
        assert_eq!(account.balance, U256::from(100u64));
        assert_eq!(account.code_hash, EMPTY_CODE_HASH);
        assert_eq!(account.storage_root, EMPTY_STORAGE_ROOT);
    }

    #[test]
    fn test_storage_changes_storage_root() {
        let mut state = MemoryState::new();
        state.set_account(addr(1), U256::zero(), U256::zero()).unwrap();
        state
            .set_storage(addr(1), H256::from_low_u64_be(1), H256::from_low_u64_be(7))
            .unwrap();

        let account = state.get_account(&addr(1)).unwrap().unwrap();
        assert_ne!(account.storage_root, EMPTY_STORAGE_ROOT);
        assert_eq!(
            state.get_storage(&addr(1), &H256::from_low_u64_be(1)).unwrap(),
            H256::from_low_u64_be(7)
        );
    }

    #[test]
    fn test_zero_write_clears_slot() {
        let mut state = MemoryState::new();
        let key = H256::from_low_u64_be(1);
        state.set_storage(addr(1), key, H256::from_low_u64_be(7)).unwrap();
        state.set_storage(addr(1), key, H256::zero()).unwrap();

        let account = state.get_account(&addr(1)).unwrap().unwrap();
        assert_eq!(account.storage_root, EMPTY_STORAGE_ROOT);
    }

    #[test]
    fn test_code_hash() {
        let mut state = MemoryState::new();
        state.set_code(addr(2), vec![0x60, 0x00]).unwrap();
        let account = state.get_account(&addr(2)).unwrap().unwrap();
        assert_eq!(account.code_hash, keccak256(&[0x60, 0x00]));
    }

    #[test]
    fn test_state_root_is_content_derived() {
        let mut a = MemoryState::new();
        let mut b = MemoryState::new();
        assert_eq!(a.state_root().unwrap(), EMPTY_STORAGE_ROOT);

        // Insertion order does not matter
        a.set_account(addr(1), U256::one(), U256::zero()).unwrap();
        a.set_account(addr(2), U256::zero(), U256::one()).unwrap();
        b.set_account(addr(2), U256::zero(), U256::one()).unwrap();
        b.set_account(addr(1), U256::one(), U256::zero()).unwrap();
        assert_eq!(a.state_root().unwrap(), b.state_root().unwrap());

        b.set_account(addr(1), U256::from(2u64), U256::zero()).unwrap();
        assert_ne!(a.state_root().unwrap(), b.state_root().unwrap());
    }

    #[test]
    fn test_dump_restore() {
        let mut state = MemoryState::new();
        state.set_account(addr(1), U256::one(), U256::from(5u64)).unwrap();
        let dump = state.dump().unwrap();

        let mut other = MemoryState::new();
        other.restore(dump).unwrap();
        assert_eq!(other.state_root().unwrap(), state.state_root().unwrap());
        assert_eq!(other.len(), 1);
    }
}
