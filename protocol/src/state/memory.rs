//! Reference [`ChainState`] over any [`KvStore`].
//!
//! Accounts are decoded once and cached as `Arc<Account>` in a `DashMap`,
//! so every handler touching the same address within a block shares one
//! handle. `commit` writes back only the blobs whose content hash changed.
//! `discard` forgets the cache; the next load decodes the last committed
//! bytes again, which is how a failed transaction is rolled back.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{account_key, ledger_key, ChainState, KvStore, StateResult};
use crate::account::Account;
use crate::crypto::{blake3_hash, merkle_root};
use crate::types::Address;

pub struct MemoryState<S: KvStore> {
    store: S,
    cache: DashMap<Address, Arc<Account>>,
}

impl<S: KvStore> MemoryState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of accounts currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Writes every changed account and ledger blob, then returns the
    /// state root.
    pub fn commit(&self) -> StateResult<[u8; 32]> {
        let mut written = 0usize;
        for entry in self.cache.iter() {
            let (address, account) = (entry.key(), entry.value());
            let blobs = account.dirty_blobs()?;
            if let Some(data) = &blobs.data {
                self.store.put(&account_key(address), data)?;
                written += 1;
            }
            if let Some(ledger) = &blobs.ledger {
                self.store.put(&ledger_key(address), ledger)?;
                written += 1;
            }
            account.mark_clean(&blobs);
        }
        self.store.flush()?;
        let root = self.root_hash()?;
        info!(written, root = %hex::encode(root), "state committed");
        Ok(root)
    }

    /// Drops every uncommitted change.
    pub fn discard(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        debug!(dropped, "state discarded");
    }

    /// Merkle root over `BLAKE3(key || value)` of every stored blob, in key
    /// order. An empty store yields all zeroes.
    pub fn root_hash(&self) -> StateResult<[u8; 32]> {
        let leaves: Vec<[u8; 32]> = self
            .store
            .entries()?
            .into_iter()
            .map(|(k, v)| blake3_hash(&[k, v].concat()))
            .collect();
        Ok(merkle_root(&leaves))
    }
}

impl<S: KvStore> ChainState for MemoryState<S> {
    fn load_account(&self, address: &Address) -> StateResult<Arc<Account>> {
        if let Some(acc) = self.cache.get(address) {
            return Ok(Arc::clone(acc.value()));
        }
        let account = match self.store.get(&account_key(address))? {
            Some(bytes) => Account::from_bytes(*address, &bytes)?,
            None => Account::new(*address),
        };
        let account = Arc::new(account);
        // entry() keeps the first handle if another load raced us.
        let handle = self
            .cache
            .entry(*address)
            .or_insert_with(|| Arc::clone(&account));
        Ok(Arc::clone(handle.value()))
    }

    fn load_ledger(&self, account: &Account) -> StateResult<()> {
        if account.ledger_loaded() {
            return Ok(());
        }
        let bytes = self.store.get(&ledger_key(&account.address()))?;
        account.init_ledger(bytes.as_deref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MemoryStore, SledStore, StateError};
    use crate::types::TokenSymbol;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A store whose writes fail while `down` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StateError::Store("write refused".into()));
            }
            self.inner.put(key, value)
        }

        fn entries(&self) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
            self.inner.entries()
        }
    }

    #[test]
    fn load_returns_shared_handle() {
        let state = MemoryState::new(MemoryStore::new());
        let a = Address::from_bytes([1; 20]);
        let x = state.load_account(&a).unwrap();
        let y = state.load_account(&a).unwrap();
        assert!(Arc::ptr_eq(&x, &y));
        assert_eq!(state.cached(), 1);
    }

    #[test]
    fn empty_state_root_is_zero() {
        let state = MemoryState::new(MemoryStore::new());
        assert_eq!(state.commit().unwrap(), [0u8; 32]);
    }

    #[test]
    fn commit_persists_and_discard_reverts() {
        let state = MemoryState::new(MemoryStore::new());
        let a = Address::from_bytes([1; 20]);
        state
            .load_account(&a)
            .unwrap()
            .add(TokenSymbol::NATIVE, 10u64)
            .unwrap();
        let root = state.commit().unwrap();
        assert_ne!(root, [0u8; 32]);

        state
            .load_account(&a)
            .unwrap()
            .add(TokenSymbol::NATIVE, 5u64)
            .unwrap();
        state.discard();
        let acc = state.load_account(&a).unwrap();
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 10u64);

        // Nothing changed, nothing written, same root.
        assert_eq!(state.commit().unwrap(), root);
    }

    #[test]
    fn failed_write_is_retried_on_next_commit() {
        let state = MemoryState::new(FlakyStore::default());
        let a = Address::from_bytes([4; 20]);
        state
            .load_account(&a)
            .unwrap()
            .add(TokenSymbol::NATIVE, 7u64)
            .unwrap();

        state.store().down.store(true, Ordering::SeqCst);
        assert!(state.commit().is_err());
        assert!(state.store().inner.is_empty());

        state.store().down.store(false, Ordering::SeqCst);
        state.commit().unwrap();
        assert!(state.store().get(&account_key(&a)).unwrap().is_some());

        state.discard();
        let acc = state.load_account(&a).unwrap();
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 7u64);
    }

    #[test]
    fn ledger_is_stored_under_its_own_key() {
        let state = MemoryState::new(MemoryStore::new());
        let a = Address::from_bytes([2; 20]);
        let acc = state.load_account(&a).unwrap();
        state.load_ledger(&acc).unwrap();
        assert!(acc.ledger_loaded());
        state.commit().unwrap();
        assert!(state.store().get(&ledger_key(&a)).unwrap().is_some());

        state.discard();
        let acc = state.load_account(&a).unwrap();
        assert!(!acc.ledger_loaded());
        state.load_ledger(&acc).unwrap();
        assert!(acc.ledger().unwrap().is_empty());
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let one = MemoryState::new(MemoryStore::new());
        let two = MemoryState::new(MemoryStore::new());
        let (a, b) = (Address::from_bytes([1; 20]), Address::from_bytes([2; 20]));
        for (state, order) in [(&one, [a, b]), (&two, [b, a])] {
            for addr in order {
                state
                    .load_account(&addr)
                    .unwrap()
                    .add(TokenSymbol::NATIVE, 1u64)
                    .unwrap();
                state.commit().unwrap();
            }
        }
        assert_eq!(one.root_hash().unwrap(), two.root_hash().unwrap());
    }

    #[test]
    fn sled_backed_state_reloads() {
        let state = MemoryState::new(SledStore::open_temporary().unwrap());
        let a = Address::from_bytes([3; 20]);
        state
            .load_account(&a)
            .unwrap()
            .add(TokenSymbol::NATIVE, 42u64)
            .unwrap();
        state.commit().unwrap();
        state.discard();
        assert_eq!(
            state
                .load_account(&a)
                .unwrap()
                .balance_of(&TokenSymbol::NATIVE),
            42u64
        );
    }
}
