//! The nonce table: one-time nonces grouped by expiry.
//!
//! Payloads signed offline (payment requests, checks, loan offers, sell
//! orders) cannot know the account's sequential nonce at the time they are
//! executed. Instead the account registers a batch of nonces under an
//! expiry timestamp, and each offline payload names one `(expire, nonce)`
//! pair, which is consumed exactly once.

use tracing::debug;

use super::{Account, AccountError, AccountFault};
use crate::config::{NONCE_TABLE_MAX_GROUPS, NONCE_TABLE_MAX_NONCES};
use crate::types::{Amount, TokenSymbol};

impl Account {
    /// Registers `nonces` under `expire`.
    ///
    /// `expire` must lie in the future. Groups that expired before the
    /// current block are pruned, and the table may hold at most
    /// [`NONCE_TABLE_MAX_GROUPS`] groups afterwards.
    pub fn update_nonce_table(&self, expire: u64, nonces: &[u64]) -> Result<(), AccountError> {
        const OP: &str = "update_nonce_table";
        let mut inner = self.write();
        let now = inner.now;

        if expire <= now {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid expire time, expected > {}, got {}",
                    now, expire
                )),
            ));
        }
        if nonces.is_empty() || nonces.len() > NONCE_TABLE_MAX_NONCES {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid nonces count, expected 1..={}, got {}",
                    NONCE_TABLE_MAX_NONCES,
                    nonces.len()
                )),
            ));
        }

        let existing = inner.data.nonce_table.get(&expire);
        for (i, nonce) in nonces.iter().enumerate() {
            if nonces[..i].contains(nonce) || existing.is_some_and(|g| g.contains(nonce)) {
                return Err(self.err(
                    OP,
                    AccountFault::NonceExists {
                        expire,
                        nonce: *nonce,
                    },
                ));
            }
        }

        let live = inner
            .data
            .nonce_table
            .keys()
            .filter(|e| **e >= now)
            .count();
        let after = live + usize::from(existing.is_none());
        if after > NONCE_TABLE_MAX_GROUPS {
            return Err(self.err(
                OP,
                AccountFault::NonceTableFull {
                    max: NONCE_TABLE_MAX_GROUPS,
                    got: after,
                },
            ));
        }

        inner.data.nonce_table.retain(|e, _| *e >= now);
        inner
            .data
            .nonce_table
            .entry(expire)
            .or_default()
            .extend_from_slice(nonces);
        debug!(account = %self.address, expire, count = nonces.len(), "nonce table updated");
        Ok(())
    }

    /// Checks that `(expire, nonce)` is registered, without consuming it.
    pub fn check_nonce_table(&self, expire: u64, nonce: u64) -> Result<(), AccountError> {
        let inner = self.read();
        if inner
            .data
            .nonce_table
            .get(&expire)
            .is_some_and(|g| g.contains(&nonce))
        {
            Ok(())
        } else {
            Err(self.err(
                "check_nonce_table",
                AccountFault::NonceNotFound { expire, nonce },
            ))
        }
    }

    /// Consumes `(expire, nonce)` and debits a transferable `amount`.
    /// An emptied group is removed.
    pub fn sub_by_nonce_table(
        &self,
        token: TokenSymbol,
        expire: u64,
        nonce: u64,
        amount: impl Into<Amount>,
    ) -> Result<(), AccountError> {
        const OP: &str = "sub_by_nonce_table";
        let amount = amount.into();
        let mut inner = self.write();

        let pos = inner
            .data
            .nonce_table
            .get(&expire)
            .and_then(|g| g.iter().position(|n| *n == nonce))
            .ok_or_else(|| self.err(OP, AccountFault::NonceNotFound { expire, nonce }))?;
        inner
            .check_balance(&token, amount, true)
            .and_then(|_| inner.debit(&token, amount))
            .map_err(|e| self.err(OP, e))?;

        if let Some(group) = inner.data.nonce_table.get_mut(&expire) {
            group.remove(pos);
            if group.is_empty() {
                inner.data.nonce_table.remove(&expire);
            }
        }
        debug!(account = %self.address, %token, %amount, expire, nonce, "nonce table consumed");
        Ok(())
    }
}
