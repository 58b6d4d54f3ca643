//! Canonical encoding of accounts.
//!
//! An account persists as two independent bincode blobs: the record and,
//! when loaded, the ledger. Every blob is decoded again right after
//! encoding and compared with its source before it is handed out. The
//! BLAKE3 hash of the last blob written or read is cached per account so
//! unchanged accounts are not rewritten.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::ledger::AccountLedger;
use super::{Account, AccountData, AccountError, AccountFault};
use crate::crypto::blake3_hash;
use crate::types::Address;

/// Blobs that changed since the account was loaded or last committed,
/// with the hashes to record once they are stored.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AccountBlobs {
    pub data: Option<Vec<u8>>,
    pub ledger: Option<Vec<u8>>,
    data_hash: Option<[u8; 32]>,
    ledger_hash: Option<[u8; 32]>,
}

impl AccountBlobs {
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.ledger.is_none()
    }
}

fn encode_verified<T>(value: &T) -> Result<Vec<u8>, AccountFault>
where
    T: Serialize + DeserializeOwned + PartialEq,
{
    let bytes = bincode::serialize(value).map_err(|e| AccountFault::Codec(e.to_string()))?;
    let back: T = bincode::deserialize(&bytes).map_err(|e| AccountFault::Codec(e.to_string()))?;
    if &back != value {
        return Err(AccountFault::Codec("round-trip mismatch".into()));
    }
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AccountFault> {
    bincode::deserialize(bytes).map_err(|e| AccountFault::Codec(e.to_string()))
}

impl Account {
    /// Decodes an account record stored under `address`.
    pub fn from_bytes(address: Address, bytes: &[u8]) -> Result<Account, AccountError> {
        let data: AccountData = decode(bytes).map_err(|reason| AccountError {
            address,
            op: "from_bytes",
            reason,
        })?;
        if data.address != address {
            return Err(AccountError {
                address,
                op: "from_bytes",
                reason: AccountFault::Codec(format!("record belongs to {}", data.address)),
            });
        }
        let acc = Account::from_data(data, None);
        acc.write().data_hash = Some(blake3_hash(bytes));
        Ok(acc)
    }

    /// Installs the ledger from its stored blob, or an empty ledger when
    /// none was ever stored.
    pub fn init_ledger(&self, bytes: Option<&[u8]>) -> Result<(), AccountError> {
        let (ledger, hash) = match bytes {
            Some(b) => (
                decode::<AccountLedger>(b).map_err(|e| self.err("init_ledger", e))?,
                Some(blake3_hash(b)),
            ),
            None => (AccountLedger::default(), None),
        };
        let mut inner = self.write();
        inner.ledger = Some(ledger);
        inner.ledger_hash = hash;
        Ok(())
    }

    /// Encodes the account record.
    pub fn marshal_data(&self) -> Result<Vec<u8>, AccountError> {
        encode_verified(&self.read().data).map_err(|e| self.err("marshal_data", e))
    }

    /// Encodes the ledger, if loaded.
    pub fn marshal_ledger(&self) -> Result<Option<Vec<u8>>, AccountError> {
        let inner = self.read();
        inner
            .ledger
            .as_ref()
            .map(encode_verified)
            .transpose()
            .map_err(|e| self.err("marshal_ledger", e))
    }

    /// Blobs that differ from what was last loaded or stored. A changed
    /// record is stamped with the current block height and time before
    /// encoding. The cached hashes do not move until the blobs are handed
    /// back to [`Account::mark_clean`], so a failed write is retried on the
    /// next commit.
    pub fn dirty_blobs(&self) -> Result<AccountBlobs, AccountError> {
        const OP: &str = "dirty_blobs";
        let mut inner = self.write();
        let mut out = AccountBlobs::default();

        let bytes = encode_verified(&inner.data).map_err(|e| self.err(OP, e))?;
        if inner.data_hash != Some(blake3_hash(&bytes)) {
            inner.data.height = inner.height;
            inner.data.timestamp = inner.now;
            let stamped = encode_verified(&inner.data).map_err(|e| self.err(OP, e))?;
            if inner.data_hash != Some(blake3_hash(&stamped)) {
                out.data_hash = Some(blake3_hash(&stamped));
                out.data = Some(stamped);
            }
        }

        if let Some(ledger) = inner.ledger.as_ref() {
            let bytes = encode_verified(ledger).map_err(|e| self.err(OP, e))?;
            let hash = blake3_hash(&bytes);
            if inner.ledger_hash != Some(hash) {
                out.ledger_hash = Some(hash);
                out.ledger = Some(bytes);
            }
        }

        if !out.is_empty() {
            debug!(
                account = %self.address,
                data = out.data.is_some(),
                ledger = out.ledger.is_some(),
                "account changed"
            );
        }
        Ok(out)
    }

    /// Records `blobs` as stored.
    pub fn mark_clean(&self, blobs: &AccountBlobs) {
        let mut inner = self.write();
        if blobs.data_hash.is_some() {
            inner.data_hash = blobs.data_hash;
        }
        if blobs.ledger_hash.is_some() {
            inner.ledger_hash = blobs.ledger_hash;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountKind, LendingConfig, StakeConfig};
    use crate::config::FeeConfig;
    use crate::crypto::Keypair;
    use crate::types::{StakeSymbol, TokenSymbol};

    fn roundtrip(acc: &Account) -> Account {
        let back = Account::from_bytes(acc.address(), &acc.marshal_data().unwrap()).unwrap();
        let ledger = acc.marshal_ledger().unwrap();
        if let Some(l) = ledger {
            back.init_ledger(Some(&l)).unwrap();
        }
        back
    }

    #[test]
    fn end_to_end_account_scenario() {
        let acc = Account::new(Address::from_bytes([0xEE; 20]));
        let err = acc.sub(TokenSymbol::NATIVE, 1u64).unwrap_err();
        assert!(err
            .to_string()
            .contains("insufficient NATIVE balance, expected 1, got 0"));

        acc.add(TokenSymbol::NATIVE, 100u64).unwrap();
        acc.sub(TokenSymbol::NATIVE, 10u64).unwrap();
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 90u64);

        acc.update_nonce_table(12345, &[1, 2, 3, 4, 0]).unwrap();
        acc.sub_by_nonce_table(TokenSymbol::NATIVE, 12345, 0, 10u64)
            .unwrap();
        assert_eq!(acc.data().nonce_table.get(&12345), Some(&vec![1, 2, 3, 4]));
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 80u64);

        let back = roundtrip(&acc);
        assert_eq!(back.data(), acc.data());
    }

    #[test]
    fn stake_destroy_survives_roundtrip() {
        let kp = Keypair::from_seed(&[1; 32]);
        let pool = Account::new(StakeSymbol::new("#POOL").unwrap().to_address());
        pool.init_ledger(None).unwrap();
        pool.add(TokenSymbol::NATIVE, 100u64).unwrap();
        pool.create_stake(
            kp.address(),
            1,
            vec![kp.public_key()],
            Some(kp.public_key()),
            Vec::new(),
            StakeConfig {
                token: TokenSymbol::NATIVE,
                lock_time: 0,
                withdraw_fee: 0,
                min_amount: 1u64.into(),
                max_amount: 1_000u64.into(),
            },
        )
        .unwrap();
        pool.take_stake(TokenSymbol::NATIVE, kp.address(), 100u64, 0)
            .unwrap();

        let mid = roundtrip(&pool);
        assert_eq!(mid.data(), pool.data());
        assert_eq!(mid.ledger(), pool.ledger());

        pool.destroy_stake(kp.address()).unwrap();
        let back = roundtrip(&pool);
        assert_eq!(back.kind(), AccountKind::Native);
        assert_eq!(back.threshold(), 0);
        assert!(back.keepers().is_empty());
        assert!(back.approver().is_none());
        assert!(back.stake_config().is_none());
        assert!(back.ledger().unwrap().stake.is_empty());
    }

    #[test]
    fn lending_ledger_roundtrip() {
        let lender = Account::new(Address::from_bytes([2; 20]));
        lender.init_ledger(None).unwrap();
        lender.add(TokenSymbol::NATIVE, 1_000u64).unwrap();
        lender
            .open_lending(LendingConfig {
                token: TokenSymbol::NATIVE,
                daily_interest: 100,
                overdue_interest: 100,
                min_amount: 1u64.into(),
                max_amount: 1_000u64.into(),
            })
            .unwrap();
        lender
            .borrow(TokenSymbol::NATIVE, Address::from_bytes([3; 20]), 10u64, 0)
            .unwrap();
        let back = roundtrip(&lender);
        assert_eq!(back.ledger(), lender.ledger());
        assert_eq!(back.lending_config(), lender.lending_config());
    }

    #[test]
    fn dirty_blobs_track_changes_and_stamp_height() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.init(7, 700, &FeeConfig::default());

        let first = acc.dirty_blobs().unwrap();
        assert!(first.data.is_some());
        assert!(first.ledger.is_none());
        acc.mark_clean(&first);
        assert!(acc.dirty_blobs().unwrap().is_empty());

        acc.add(TokenSymbol::NATIVE, 1u64).unwrap();
        let blobs = acc.dirty_blobs().unwrap();
        acc.mark_clean(&blobs);
        let stored = Account::from_bytes(acc.address(), &blobs.data.unwrap()).unwrap();
        assert_eq!(stored.data().height, 7);
        assert_eq!(stored.data().timestamp, 700);

        // A freshly decoded account is clean.
        assert!(stored.dirty_blobs().unwrap().is_empty());

        acc.init_ledger(None).unwrap();
        let blobs = acc.dirty_blobs().unwrap();
        assert!(blobs.ledger.is_some());
        acc.mark_clean(&blobs);
        assert!(acc.dirty_blobs().unwrap().is_empty());
    }

    #[test]
    fn unstored_blobs_stay_dirty() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.init(1, 100, &FeeConfig::default());
        acc.init_ledger(None).unwrap();
        acc.add(TokenSymbol::NATIVE, 5u64).unwrap();

        let first = acc.dirty_blobs().unwrap();
        assert!(first.data.is_some() && first.ledger.is_some());
        // Nothing was stored, so the same blobs come back.
        let again = acc.dirty_blobs().unwrap();
        assert_eq!(again, first);

        acc.mark_clean(&again);
        assert!(acc.dirty_blobs().unwrap().is_empty());
    }

    #[test]
    fn from_bytes_rejects_wrong_address_and_junk() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        let bytes = acc.marshal_data().unwrap();
        assert!(Account::from_bytes(Address::from_bytes([2; 20]), &bytes).is_err());
        assert!(Account::from_bytes(acc.address(), &[1, 2, 3]).is_err());
    }

    mod props {
        use super::*;
        use crate::account::{AccountData, AccountLedger, LendingEntry, StakeEntry};
        use crate::transaction::types::TxType;
        use crate::types::Amount;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn arb_amount() -> impl Strategy<Value = Amount> {
            prop_oneof![
                any::<u64>().prop_map(Amount::from),
                any::<u128>().prop_map(Amount::from),
                Just(Amount::MAX),
            ]
        }

        fn arb_token() -> impl Strategy<Value = TokenSymbol> {
            prop_oneof![Just("$GOLD"), Just("$SILVER"), Just("$COPPER")]
                .prop_map(|s| TokenSymbol::new(s).unwrap())
        }

        fn arb_key() -> impl Strategy<Value = crate::crypto::PublicKey> {
            any::<u8>().prop_map(|b| Keypair::from_seed(&[b; 32]).public_key())
        }

        fn arb_data(address: Address) -> impl Strategy<Value = AccountData> {
            (
                prop_oneof![
                    Just(AccountKind::Native),
                    Just(AccountKind::Token),
                    Just(AccountKind::Stake)
                ],
                any::<u64>(),
                arb_amount(),
                prop::collection::vec(arb_key(), 0..4),
                prop::option::of(arb_key()),
                prop::collection::btree_map(arb_token(), arb_amount(), 0..3),
                prop::collection::btree_map(any::<u64>(), prop::collection::vec(any::<u64>(), 1..4), 0..3),
                prop::option::of(arb_amount()),
                prop::option::of((arb_amount(), arb_amount(), 0..1_000_000u64)),
                (any::<u64>(), any::<u64>()),
            )
                .prop_map(
                    move |(
                        kind,
                        nonce,
                        balance,
                        keepers,
                        approver,
                        tokens,
                        nonce_table,
                        max_total_supply,
                        stake,
                        (height, timestamp),
                    )| AccountData {
                        address,
                        kind,
                        nonce,
                        balance,
                        threshold: keepers.len() as u16,
                        keepers,
                        approver,
                        approve_list: vec![TxType::Transfer, TxType::WithdrawStake],
                        tokens,
                        nonce_table,
                        max_total_supply,
                        stake: stake.map(|(min_amount, max_amount, withdraw_fee)| StakeConfig {
                            token: TokenSymbol::NATIVE,
                            lock_time: height,
                            withdraw_fee,
                            min_amount,
                            max_amount,
                        }),
                        lending: None,
                        height,
                        timestamp,
                    },
                )
        }

        fn arb_ledger() -> impl Strategy<Value = AccountLedger> {
            let entry_addr = any::<u8>().prop_map(|b| Address::from_bytes([b; 20]));
            (
                prop::collection::btree_map(
                    entry_addr.clone(),
                    (arb_amount(), any::<u64>(), prop::option::of(arb_key())).prop_map(
                        |(amount, lock_time, approver)| StakeEntry {
                            amount,
                            lock_time,
                            approver,
                        },
                    ),
                    0..4,
                ),
                prop::collection::btree_map(
                    entry_addr,
                    (arb_amount(), any::<u64>(), any::<u64>()).prop_map(
                        |(amount, update_at, due_time)| LendingEntry {
                            amount,
                            update_at,
                            due_time,
                        },
                    ),
                    0..4,
                ),
            )
                .prop_map(|(stake, lending)| AccountLedger { stake, lending })
        }

        proptest! {
            #[test]
            fn marshal_then_from_bytes_is_identity(
                data in arb_data(Address::from_bytes([0x5A; 20])),
                ledger in prop::option::of(arb_ledger()),
            ) {
                let acc = Account::from_data(data.clone(), ledger.clone());
                let back = roundtrip(&acc);
                prop_assert_eq!(back.data(), data);
                prop_assert_eq!(back.ledger(), ledger);
            }
        }
    }
}
