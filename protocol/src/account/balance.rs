//! Balance mutation and spendability.
//!
//! The native balance carries two floors that transfers cannot touch: the
//! pledge of token and stake accounts, and the non-transferable balance
//! (NTB). Gas may eat into the NTB, nothing may eat into the pledge.
//! Non-native tokens have no floors.

use std::collections::BTreeMap;

use tracing::debug;

use super::{Account, AccountError, AccountFault, AccountInner};
use crate::types::{Amount, TokenSymbol};

impl AccountInner {
    pub(super) fn raw_balance(&self, token: &TokenSymbol) -> Amount {
        if token.is_native() {
            self.data.balance
        } else {
            self.data.tokens.get(token).copied().unwrap_or_default()
        }
    }

    /// Spendable amount of `token`, floored at zero.
    pub(super) fn spendable(&self, token: &TokenSymbol, check_ntb: bool) -> Amount {
        if token.is_native() {
            let mut floor = self.pledge();
            if check_ntb {
                floor = floor.checked_add(self.floors.ntb).unwrap_or(Amount::MAX);
            }
            self.data.balance.saturating_sub(floor)
        } else {
            self.raw_balance(token)
        }
    }

    pub(super) fn check_balance(
        &self,
        token: &TokenSymbol,
        amount: Amount,
        check_ntb: bool,
    ) -> Result<(), AccountFault> {
        let got = self.spendable(token, check_ntb);
        if got < amount {
            return Err(AccountFault::InsufficientBalance {
                token: *token,
                expected: amount,
                got,
            });
        }
        Ok(())
    }

    pub(super) fn credit(
        &mut self,
        token: &TokenSymbol,
        amount: Amount,
    ) -> Result<(), AccountFault> {
        if amount.is_zero() {
            return Ok(());
        }
        let slot = if token.is_native() {
            &mut self.data.balance
        } else {
            self.data.tokens.entry(*token).or_default()
        };
        *slot = slot
            .checked_add(amount)
            .ok_or(AccountFault::Overflow { token: *token })?;
        Ok(())
    }

    /// Debits without any floor. Callers check spendability first.
    pub(super) fn debit(&mut self, token: &TokenSymbol, amount: Amount) -> Result<(), AccountFault> {
        if amount.is_zero() {
            return Ok(());
        }
        let current = self.raw_balance(token);
        let next = current
            .checked_sub(amount)
            .ok_or(AccountFault::InsufficientBalance {
                token: *token,
                expected: amount,
                got: current,
            })?;
        if token.is_native() {
            self.data.balance = next;
        } else if next.is_zero() {
            self.data.tokens.remove(token);
        } else {
            self.data.tokens.insert(*token, next);
        }
        Ok(())
    }
}

impl Account {
    /// Raw balance of `token`, floors included.
    pub fn balance_of(&self, token: &TokenSymbol) -> Amount {
        self.read().raw_balance(token)
    }

    /// Everything the account holds of `token`, including the pledge and
    /// NTB floors. Identical to [`Account::balance_of`]; the floors are
    /// never split out of the stored balance.
    pub fn balance_of_all(&self, token: &TokenSymbol) -> Amount {
        self.read().raw_balance(token)
    }

    /// Spendable balance of `token` for a transfer.
    pub fn transferable(&self, token: &TokenSymbol) -> Amount {
        self.read().spendable(token, true)
    }

    /// Native balance plus every non-zero token balance.
    pub fn balances(&self) -> BTreeMap<TokenSymbol, Amount> {
        let inner = self.read();
        let mut out = inner.data.tokens.clone();
        if !inner.data.balance.is_zero() {
            out.insert(TokenSymbol::NATIVE, inner.data.balance);
        }
        out
    }

    /// Checks that `amount` of `token` can be transferred out. The NTB
    /// floor always counts.
    pub fn check_balance(
        &self,
        token: &TokenSymbol,
        amount: impl Into<Amount>,
    ) -> Result<(), AccountError> {
        self.read()
            .check_balance(token, amount.into(), true)
            .map_err(|e| self.err("check_balance", e))
    }

    /// Like [`Account::check_balance`] but lets the caller decide whether
    /// the NTB floor counts. Gas checks pass `false`.
    pub fn check_balance_with(
        &self,
        token: &TokenSymbol,
        amount: impl Into<Amount>,
        check_ntb: bool,
    ) -> Result<(), AccountError> {
        self.read()
            .check_balance(token, amount.into(), check_ntb)
            .map_err(|e| self.err("check_balance", e))
    }

    pub fn add(&self, token: TokenSymbol, amount: impl Into<Amount>) -> Result<(), AccountError> {
        let amount = amount.into();
        let mut inner = self.write();
        inner.credit(&token, amount).map_err(|e| self.err("add", e))?;
        debug!(account = %self.address, %token, %amount, "credited");
        Ok(())
    }

    /// Debits a transferable amount: pledge and NTB excluded.
    pub fn sub(&self, token: TokenSymbol, amount: impl Into<Amount>) -> Result<(), AccountError> {
        let amount = amount.into();
        if amount.is_zero() {
            return Ok(());
        }
        let mut inner = self.write();
        inner
            .check_balance(&token, amount, true)
            .and_then(|_| inner.debit(&token, amount))
            .map_err(|e| self.err("sub", e))?;
        debug!(account = %self.address, %token, %amount, "debited");
        Ok(())
    }

    /// Debits ignoring the floors. The balance still cannot go negative.
    pub fn sub_no_check(
        &self,
        token: TokenSymbol,
        amount: impl Into<Amount>,
    ) -> Result<(), AccountError> {
        let amount = amount.into();
        let mut inner = self.write();
        inner
            .debit(&token, amount)
            .map_err(|e| self.err("sub_no_check", e))?;
        debug!(account = %self.address, %token, %amount, "debited without floor check");
        Ok(())
    }

    /// Checks the primary nonce without consuming it.
    pub fn check_nonce(&self, nonce: u64) -> Result<(), AccountError> {
        let expected = self.read().data.nonce;
        if nonce != expected {
            return Err(self.err(
                "check_nonce",
                AccountFault::NonceMismatch {
                    expected,
                    got: nonce,
                },
            ));
        }
        Ok(())
    }

    /// Collects gas and advances the primary nonce. Only the pledge is
    /// protected: gas may consume the NTB floor.
    pub fn sub_gas_by_nonce(
        &self,
        token: TokenSymbol,
        nonce: u64,
        amount: impl Into<Amount>,
    ) -> Result<(), AccountError> {
        let amount = amount.into();
        let mut inner = self.write();
        let expected = inner.data.nonce;
        if nonce != expected {
            return Err(self.err(
                "sub_gas_by_nonce",
                AccountFault::NonceMismatch {
                    expected,
                    got: nonce,
                },
            ));
        }
        inner
            .check_balance(&token, amount, false)
            .and_then(|_| inner.debit(&token, amount))
            .map_err(|e| self.err("sub_gas_by_nonce", e))?;
        inner.data.nonce += 1;
        debug!(account = %self.address, %token, %amount, nonce, "gas collected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeeConfig;
    use crate::error::ErrorKind;
    use crate::types::Address;

    fn gold() -> TokenSymbol {
        TokenSymbol::new("$GOLD").unwrap()
    }

    #[test]
    fn add_zero_is_noop() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.add(gold(), 0u64).unwrap();
        assert!(acc.balances().is_empty());
    }

    #[test]
    fn add_overflow_rejected() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.add(TokenSymbol::NATIVE, u64::MAX).unwrap();
        acc.add(TokenSymbol::NATIVE, u64::MAX).unwrap();
        assert!(acc.balance_of(&TokenSymbol::NATIVE) > u64::MAX);

        acc.add(gold(), Amount::MAX).unwrap();
        let err = acc.add(gold(), 1u64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(acc.balance_of(&gold()), Amount::MAX);
    }

    #[test]
    fn sub_reports_token_expected_and_got() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        let err = acc.sub(TokenSymbol::NATIVE, 1u64).unwrap_err();
        assert!(err
            .to_string()
            .ends_with("sub: insufficient NATIVE balance, expected 1, got 0"));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        acc.add(gold(), 5u64).unwrap();
        let err = acc.sub(gold(), 6u64).unwrap_err();
        assert!(err
            .to_string()
            .contains("insufficient $GOLD balance, expected 6, got 5"));
    }

    #[test]
    fn token_balance_removed_when_zero() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.add(gold(), 5u64).unwrap();
        acc.sub(gold(), 5u64).unwrap();
        assert!(!acc.data().tokens.contains_key(&gold()));
        assert_eq!(acc.balance_of(&gold()), 0u64);
    }

    #[test]
    fn ntb_blocks_transfers_but_not_gas() {
        let mut fee = FeeConfig::default();
        fee.non_transferable_balance = 100u64.into();
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.init(1, 10, &fee);
        acc.add(TokenSymbol::NATIVE, 150u64).unwrap();

        assert_eq!(acc.transferable(&TokenSymbol::NATIVE), 50u64);
        assert!(acc.sub(TokenSymbol::NATIVE, 51u64).is_err());
        assert!(acc.check_balance(&TokenSymbol::NATIVE, 51u64).is_err());
        assert!(acc
            .check_balance_with(&TokenSymbol::NATIVE, 150u64, false)
            .is_ok());

        acc.sub_gas_by_nonce(TokenSymbol::NATIVE, 0, 140u64).unwrap();
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 10u64);
        assert_eq!(acc.transferable(&TokenSymbol::NATIVE), 0u64);
        assert_eq!(acc.balance_of_all(&TokenSymbol::NATIVE), 10u64);
    }

    #[test]
    fn sub_no_check_ignores_floors_not_sign() {
        let mut fee = FeeConfig::default();
        fee.non_transferable_balance = 100u64.into();
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.init(1, 10, &fee);
        acc.add(TokenSymbol::NATIVE, 50u64).unwrap();
        acc.sub_no_check(TokenSymbol::NATIVE, 50u64).unwrap();
        assert!(acc.sub_no_check(TokenSymbol::NATIVE, 1u64).is_err());
    }

    #[test]
    fn gas_nonce_is_monotonic() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.add(TokenSymbol::NATIVE, 10u64).unwrap();
        for n in 0..5 {
            acc.sub_gas_by_nonce(TokenSymbol::NATIVE, n, 1u64).unwrap();
            assert_eq!(acc.nonce(), n + 1);
        }
        let err = acc.sub_gas_by_nonce(TokenSymbol::NATIVE, 4, 1u64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonceConflict);
        assert_eq!(acc.nonce(), 5);
        assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), 5u64);
    }

    #[test]
    fn failed_gas_debit_keeps_nonce() {
        let acc = Account::new(Address::from_bytes([1; 20]));
        assert!(acc.sub_gas_by_nonce(TokenSymbol::NATIVE, 0, 1u64).is_err());
        assert_eq!(acc.nonce(), 0);
        assert!(acc.check_nonce(0).is_ok());
        assert!(acc.check_nonce(1).is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        const NTB: u64 = 100;
        const EXPIRE: u64 = 1_000;

        #[derive(Debug, Clone)]
        enum Op {
            Add { native: bool, amount: u64 },
            Sub { native: bool, amount: u64 },
            Gas { amount: u64 },
            SubByNonceTable { nonce: u64, amount: u64 },
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (any::<bool>(), 0..1_000u64).prop_map(|(native, amount)| Op::Add { native, amount }),
                (any::<bool>(), 0..1_000u64).prop_map(|(native, amount)| Op::Sub { native, amount }),
                (0..500u64).prop_map(|amount| Op::Gas { amount }),
                (0..8u64, 0..500u64)
                    .prop_map(|(nonce, amount)| Op::SubByNonceTable { nonce, amount }),
            ]
        }

        fn account() -> Account {
            let mut fee = FeeConfig::default();
            fee.non_transferable_balance = NTB.into();
            let acc = Account::new(Address::from_bytes([4; 20]));
            acc.init(1, 10, &fee);
            acc.update_nonce_table(EXPIRE, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
            acc
        }

        proptest! {
            #[test]
            fn balances_follow_a_floored_model(ops in prop::collection::vec(arb_op(), 1..64)) {
                let acc = account();
                let mut native = 0u64;
                let mut token = 0u64;
                let mut used = [false; 8];

                for op in ops {
                    let nonce_before = acc.nonce();
                    match op {
                        Op::Add { native: true, amount } => {
                            acc.add(TokenSymbol::NATIVE, amount).unwrap();
                            native += amount;
                        }
                        Op::Add { native: false, amount } => {
                            acc.add(gold(), amount).unwrap();
                            token += amount;
                        }
                        Op::Sub { native: true, amount } => {
                            let ok = acc.sub(TokenSymbol::NATIVE, amount).is_ok();
                            prop_assert_eq!(ok, amount == 0 || native >= NTB + amount);
                            if ok {
                                native -= amount;
                            }
                        }
                        Op::Sub { native: false, amount } => {
                            let ok = acc.sub(gold(), amount).is_ok();
                            prop_assert_eq!(ok, token >= amount);
                            if ok {
                                token -= amount;
                            }
                        }
                        Op::Gas { amount } => {
                            let ok = acc
                                .sub_gas_by_nonce(TokenSymbol::NATIVE, nonce_before, amount)
                                .is_ok();
                            prop_assert_eq!(ok, native >= amount);
                            if ok {
                                native -= amount;
                                prop_assert_eq!(acc.nonce(), nonce_before + 1);
                            } else {
                                prop_assert_eq!(acc.nonce(), nonce_before);
                            }
                        }
                        Op::SubByNonceTable { nonce, amount } => {
                            let ok = acc
                                .sub_by_nonce_table(TokenSymbol::NATIVE, EXPIRE, nonce, amount)
                                .is_ok();
                            let fresh = !used[nonce as usize];
                            prop_assert_eq!(ok, fresh && (amount == 0 || native >= NTB + amount));
                            if ok {
                                used[nonce as usize] = true;
                                native -= amount;
                            }
                        }
                    }

                    prop_assert_eq!(acc.balance_of(&TokenSymbol::NATIVE), native);
                    prop_assert_eq!(acc.balance_of(&gold()), token);
                    prop_assert_eq!(
                        acc.transferable(&TokenSymbol::NATIVE),
                        native.saturating_sub(NTB)
                    );
                    prop_assert!(acc.transferable(&TokenSymbol::NATIVE) <= acc.balance_of(&TokenSymbol::NATIVE));
                }
            }
        }
    }
}
