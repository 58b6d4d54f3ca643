//! Token issuance.
//!
//! A token account lives at its `$SYMBOL` address and starts out holding
//! the whole supply. Whatever it has handed out is in circulation, so the
//! circulating supply is simply `max_total_supply - own holding`. The
//! native token is the one exception: it lives at the zero address and is
//! only ever created at genesis.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{Account, AccountError, AccountFault, AccountKind};
use crate::crypto::PublicKey;
use crate::transaction::types::TxType;
use crate::types::{Amount, TokenSymbol};

impl Account {
    /// The token this account issues, if its address is a token symbol or
    /// the native token account.
    pub fn token_symbol(&self) -> Option<TokenSymbol> {
        if self.address.is_empty() {
            Some(TokenSymbol::NATIVE)
        } else {
            TokenSymbol::from_address(&self.address)
        }
    }

    /// Turns this empty account into the issuer of `supply` units of its
    /// symbol, all credited to itself.
    pub fn create_token(
        &self,
        threshold: u16,
        keepers: Vec<PublicKey>,
        approver: Option<PublicKey>,
        approve_list: Vec<TxType>,
        supply: impl Into<Amount>,
    ) -> Result<(), AccountError> {
        const OP: &str = "create_token";
        let supply = supply.into();
        let invalid = |msg: String| self.err(OP, AccountFault::InvalidInput(msg));

        let symbol = self
            .token_symbol()
            .ok_or_else(|| invalid(format!("{} is not a token symbol", self.address)))?;
        if supply.is_zero() {
            return Err(invalid("invalid max total supply 0".into()));
        }
        super::keepers::check_keepers(threshold, &keepers).map_err(invalid)?;
        super::keepers::check_approve_list(&approve_list).map_err(invalid)?;

        let mut inner = self.write();
        if !inner.is_empty() {
            return Err(self.err(OP, AccountFault::InvalidState("account not empty".into())));
        }
        let pledge = if inner.is_fee_sink() {
            Amount::ZERO
        } else {
            inner.floors.token_pledge
        };
        if inner.data.balance < pledge {
            return Err(self.err(
                OP,
                AccountFault::InsufficientBalance {
                    token: TokenSymbol::NATIVE,
                    expected: pledge,
                    got: inner.data.balance,
                },
            ));
        }
        inner.credit(&symbol, supply).map_err(|e| self.err(OP, e))?;

        inner.data.kind = AccountKind::Token;
        inner.data.threshold = threshold;
        inner.data.keepers = keepers;
        inner.data.approver = approver;
        inner.data.approve_list = approve_list;
        inner.data.max_total_supply = Some(supply);
        info!(token = %symbol, %supply, "token created");
        Ok(())
    }

    /// Circulating supply: issued minus what the issuer still holds.
    pub fn total_supply(&self) -> Result<Amount, AccountError> {
        let inner = self.read();
        let max = match (inner.data.kind, inner.data.max_total_supply) {
            (AccountKind::Token, Some(max)) => max,
            _ => {
                return Err(self.err(
                    "total_supply",
                    AccountFault::InvalidState("not a token account".into()),
                ))
            }
        };
        let symbol = self.token_symbol().unwrap_or(TokenSymbol::NATIVE);
        Ok(max.saturating_sub(inner.raw_balance(&symbol)))
    }

    /// Retires the token. Every issued unit must be back with the issuer
    /// and every loan repaid. The issued units are burned; every other
    /// balance is returned for the caller to credit to the recipient.
    pub fn destroy_token(&self) -> Result<BTreeMap<TokenSymbol, Amount>, AccountError> {
        const OP: &str = "destroy_token";
        let mut inner = self.write();
        let symbol = match (inner.data.kind, self.token_symbol()) {
            (AccountKind::Token, Some(s)) if !s.is_native() => s,
            _ => {
                return Err(self.err(
                    OP,
                    AccountFault::InvalidState("not a destroyable token account".into()),
                ))
            }
        };
        let max = inner.data.max_total_supply.unwrap_or_default();
        let held = inner.raw_balance(&symbol);
        if held != max {
            return Err(self.err(
                OP,
                AccountFault::InvalidState(format!(
                    "{} in circulation",
                    max.saturating_sub(held)
                )),
            ));
        }
        if inner.data.lending.is_some() {
            let repaid = inner
                .ledger
                .as_ref()
                .map(|l| l.lending.is_empty())
                .ok_or_else(|| self.err(OP, AccountFault::LedgerNotLoaded))?;
            if !repaid {
                return Err(self.err(
                    OP,
                    AccountFault::InvalidState("lending not fully repaid".into()),
                ));
            }
        }

        let mut balances = inner.data.tokens.clone();
        balances.remove(&symbol);
        if !inner.data.balance.is_zero() {
            balances.insert(TokenSymbol::NATIVE, inner.data.balance);
        }
        inner.reset();
        if let Some(ledger) = inner.ledger.as_mut() {
            ledger.lending.clear();
        }
        debug!(account = %self.address, token = %symbol, "token destroyed");
        Ok(balances)
    }
}
