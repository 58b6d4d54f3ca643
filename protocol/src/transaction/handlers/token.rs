//! Token issuance and retirement.
//!
//! `CreateToken` is sent by the future keeper to the `$SYMBOL` address,
//! carrying the native pledge as its amount. The new token account holds
//! the whole supply. `DestroyToken` is sent by the token account itself
//! once every issued unit is back, and returns everything else it holds to
//! the recipient.

use std::sync::Arc;

use crate::account::Account;
use crate::crypto::PublicKey;
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::{credit_all, transfer, TxBase};
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::AccountUpdate;
use crate::transaction::{TxHandler, TxReceipt};
use crate::types::{Address, Amount, TokenSymbol};

pub struct TxCreateToken {
    base: TxBase,
    threshold: u16,
    keepers: Vec<PublicKey>,
    update: AccountUpdate,
    supply: Amount,
}

impl TxCreateToken {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        if !to.is_empty() && TokenSymbol::from_address(&to).is_none() {
            return Err(base.syntax(format!("{} is not a token symbol address", to)));
        }
        if !base.token().is_native() {
            return Err(base.syntax("pledge must be paid in the native token"));
        }
        let update: AccountUpdate = base.decode()?;
        let (threshold, keepers) = update.keeper_set().map_err(|e| base.syntax(e))?;
        let supply = update
            .max_total_supply
            .ok_or_else(|| base.syntax("max total supply is required"))?;
        if update.stake.is_some() {
            return Err(base.syntax("unexpected stake config"));
        }
        Ok(Self {
            base,
            threshold,
            keepers,
            update,
            supply,
        })
    }

    fn create(&self, token: &Account) -> TxResult<()> {
        token
            .create_token(
                self.threshold,
                self.keepers.clone(),
                self.update.approver.flatten(),
                self.update.approve_list.clone().unwrap_or_default(),
                self.supply,
            )
            .for_tx(self.base.tx_type())
    }
}

impl TxHandler for TxCreateToken {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        if self.base.to() == Some(Address::EMPTY) {
            return Err(self.base.invalid("the native token is only created at genesis"));
        }
        let verified = self.base.verify(ctx, state)?;
        let token = Arc::clone(verified.to_account()?);
        if !token.is_empty() {
            return Err(self.base.invalid(format!("token {} exists", token.address())));
        }
        let pledged = token
            .balance_of(&TokenSymbol::NATIVE)
            .saturating_add(self.base.amount());
        if pledged < ctx.fee.min_token_pledge {
            return Err(self.base.invalid(format!(
                "pledge {} below minimum {}",
                pledged, ctx.fee.min_token_pledge
            )));
        }

        let accepted = verified.accept()?;
        self.create(&token)?;
        Ok(accepted.receipt)
    }

    fn apply_genesis(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let (from, to) = self.base.load_genesis(ctx, state)?;
        let token = to.ok_or_else(|| self.base.syntax("missing recipient"))?;
        transfer(
            self.base.tx_type(),
            &from,
            &token,
            TokenSymbol::NATIVE,
            self.base.amount(),
        )?;
        self.create(&token)?;
        Ok(self.base.genesis_receipt(ctx))
    }
}

pub struct TxDestroyToken {
    base: TxBase,
}

impl TxDestroyToken {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_to()?;
        base.require_no_amount()?;
        base.require_no_data()?;
        if TokenSymbol::from_address(&base.from()).is_none() {
            return Err(base.syntax("sender is not a token account"));
        }
        Ok(Self { base })
    }
}

impl TxHandler for TxDestroyToken {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let verified = self.base.verify(ctx, state)?;
        let recipient = Arc::clone(verified.to_account()?);
        if verified.from.lending_config().is_some() {
            self.base.load_ledger(state, &verified.from)?;
        }

        let accepted = verified.accept()?;
        let balances = accepted.from.destroy_token().for_tx(t)?;
        credit_all(t, &recipient, balances)?;
        Ok(accepted.receipt)
    }
}

#[cfg(test)]
mod tests {
    use crate::account::AccountKind;
    use crate::crypto::Keypair;
    use crate::error::ErrorKind;
    use crate::transaction::payload::AccountUpdate;
    use crate::transaction::testutil::*;
    use crate::transaction::{TransactionBuilder, TxType};
    use crate::types::{Address, Amount, TokenSymbol};

    const PLEDGE: u64 = 10_000 * UNIT_NATIVE;
    const SUPPLY: Amount = Amount::from_u64(1_000_000);

    fn gold() -> TokenSymbol {
        TokenSymbol::new("$GOLD").unwrap()
    }

    fn create_gold(env: &Env, issuer: &Keypair, pledge: u64) -> Result<(), ErrorKind> {
        env.send(
            TransactionBuilder::new(TxType::CreateToken)
                .to(gold().to_address())
                .amount(pledge)
                .payload(&AccountUpdate {
                    threshold: Some(1),
                    keepers: Some(vec![issuer.public_key()]),
                    max_total_supply: Some(SUPPLY),
                    ..Default::default()
                }),
            issuer,
        )
        .map(|_| ())
        .map_err(|e| e.kind())
    }

    #[test]
    fn create_requires_full_pledge() {
        let env = Env::new();
        let alice = key(1);
        env.fund(&alice.address(), 2 * PLEDGE);

        assert_eq!(
            create_gold(&env, &alice, PLEDGE - 1),
            Err(ErrorKind::InvalidState)
        );
        create_gold(&env, &alice, PLEDGE).unwrap();

        let token = env.account(&gold().to_address());
        assert_eq!(token.kind(), AccountKind::Token);
        assert_eq!(token.balance_of(&gold()), SUPPLY);
        assert_eq!(token.balance_of(&TokenSymbol::NATIVE), PLEDGE);
        assert_eq!(token.total_supply().unwrap(), 0u64);

        assert_eq!(create_gold(&env, &alice, PLEDGE), Err(ErrorKind::InvalidState));
    }

    #[test]
    fn native_token_outside_genesis_is_rejected() {
        let env = Env::new();
        let alice = key(1);
        env.fund(&alice.address(), UNIT_NATIVE);
        let err = env
            .send(
                TransactionBuilder::new(TxType::CreateToken)
                    .to(Address::EMPTY)
                    .payload(&AccountUpdate {
                        threshold: Some(1),
                        keepers: Some(vec![alice.public_key()]),
                        max_total_supply: Some(SUPPLY),
                        ..Default::default()
                    }),
                &alice,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn issue_circulate_and_destroy() {
        let env = Env::new();
        let (alice, bob) = (key(1), key(2));
        let token_addr = gold().to_address();
        env.fund(&alice.address(), 2 * PLEDGE);
        create_gold(&env, &alice, PLEDGE).unwrap();
        // Gas for the token account's own transactions.
        env.fund(&token_addr, UNIT_NATIVE);

        let issue = env.build(
            TransactionBuilder::new(TxType::Transfer)
                .to(bob.address())
                .token(gold())
                .amount(100u64),
            &token_addr,
            &[&alice],
            &[],
        );
        env.run(&issue).unwrap();
        assert_eq!(env.token_balance(&bob.address(), gold()), 100u64);
        assert_eq!(env.account(&token_addr).total_supply().unwrap(), 100u64);

        let destroy = || {
            env.build(
                TransactionBuilder::new(TxType::DestroyToken).to(alice.address()),
                &token_addr,
                &[&alice],
                &[],
            )
        };
        let err = env.run(&destroy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        env.fund(&bob.address(), UNIT_NATIVE);
        env.send(
            TransactionBuilder::new(TxType::Transfer)
                .to(token_addr)
                .token(gold())
                .amount(100u64),
            &bob,
        )
        .unwrap();

        let alice_before = env.balance(&alice.address());
        let token_native = env.balance(&token_addr);
        let receipt = env.run(&destroy()).unwrap();
        let token = env.account(&token_addr);
        assert!(token.is_empty());
        assert_eq!(token.balance_of(&gold()), 0u64);
        assert_eq!(token.balance_of(&TokenSymbol::NATIVE), 0u64);
        assert_eq!(
            env.balance(&alice.address()),
            alice_before + token_native - receipt.cost()
        );
    }
}
