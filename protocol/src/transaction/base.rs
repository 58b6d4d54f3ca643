//! # Base Protocol
//!
//! The lifecycle every transaction type shares:
//!
//! ```text
//! Transaction --syntactic_verify--> TxBase --verify--> Verified --accept--> Accepted
//! ```
//!
//! Each arrow is a type change, so a handler cannot accept a transaction
//! it has not verified, and cannot verify one that failed the stateless
//! checks. `verify` reads state but writes nothing; `accept` collects the
//! fee through the nonce-advancing path, moves the transfer amount, pays
//! the builder its tip, and burns the base fee to the fee sink.
//!
//! ## Fees
//!
//! ```text
//! gas      = type_gas(tx_type) + signable_len * gas_per_byte
//! base_fee = gas * gas_price
//! tip      = gas * min(gas_tip, gas_fee_cap - gas_price)
//! cost     = base_fee + tip
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use super::error::{ForTx, TxError, TxResult};
use super::payload::Payload;
use super::receipt::TxReceipt;
use super::tx::{Transaction, TxData};
use super::types::TxType;
use crate::account::Account;
use crate::config::{FeeConfig, MAX_SIGNATURES, MAX_TX_DATA_SIZE};
use crate::crypto::{verified_signers, PublicKey, SignatureEntry};
use crate::state::{BlockContext, ChainState};
use crate::types::{Address, Amount, TokenSymbol};

// ---------------------------------------------------------------------------
// Fee
// ---------------------------------------------------------------------------

/// Gas and the two fee components of one transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fee {
    pub gas: u64,
    pub base_fee: u64,
    pub tip: u64,
}

impl Fee {
    pub fn compute(
        fee: &FeeConfig,
        gas_price: u64,
        tx: &TxData,
        signable_len: usize,
    ) -> Result<Self, String> {
        if tx.gas_fee_cap < gas_price {
            return Err(format!(
                "gas fee cap {} lower than gas price {}",
                tx.gas_fee_cap, gas_price
            ));
        }
        let gas = fee.gas_for(tx.tx_type, signable_len);
        if gas > fee.max_tx_gas {
            return Err(format!(
                "gas {} exceeds max tx gas {}",
                gas, fee.max_tx_gas
            ));
        }
        let base_fee = gas
            .checked_mul(gas_price)
            .ok_or_else(|| "base fee overflow".to_string())?;
        let tip = gas
            .checked_mul(tx.gas_tip.min(tx.gas_fee_cap - gas_price))
            .ok_or_else(|| "tip overflow".to_string())?;
        let fee = Self { gas, base_fee, tip };
        fee.checked_cost()
            .ok_or_else(|| "fee cost overflow".to_string())?;
        Ok(fee)
    }

    fn checked_cost(&self) -> Option<u64> {
        self.base_fee.checked_add(self.tip)
    }

    pub fn cost(&self) -> u64 {
        self.base_fee.saturating_add(self.tip)
    }
}

// ---------------------------------------------------------------------------
// TxBase
// ---------------------------------------------------------------------------

/// A transaction that passed the stateless checks, with defaults resolved
/// and primary signers already recovered.
#[derive(Debug, Clone)]
pub struct TxBase {
    tx: TxData,
    id: [u8; 32],
    token: TokenSymbol,
    amount: Amount,
    signable_len: usize,
    signers: BTreeSet<PublicKey>,
    ex_signatures: Vec<SignatureEntry>,
}

impl TxBase {
    /// Stateless well-formedness checks.
    ///
    /// Only types allowed at genesis may name the zero address as sender,
    /// and only [`TxBase::load_genesis`] accepts it.
    pub fn syntactic_verify(tx: &Transaction) -> TxResult<Self> {
        let data = &tx.tx;
        let tx_type = data.tx_type;
        let syntax = |reason: String| TxError::Syntax { tx_type, reason };

        if data.from.is_empty() && !tx_type.allowed_at_genesis() {
            return Err(syntax("empty sender".into()));
        }
        if data.to == Some(data.from) {
            return Err(syntax("sender and recipient are the same".into()));
        }
        if tx.signatures.is_empty() {
            return Err(syntax("no signatures".into()));
        }
        if tx.signatures.len() > MAX_SIGNATURES || tx.ex_signatures.len() > MAX_SIGNATURES {
            return Err(syntax(format!("too many signatures, max {}", MAX_SIGNATURES)));
        }
        if data.data.len() > MAX_TX_DATA_SIZE {
            return Err(syntax(format!(
                "data too large, expected <= {}, got {}",
                MAX_TX_DATA_SIZE,
                data.data.len()
            )));
        }
        let token = data.token.unwrap_or(TokenSymbol::NATIVE);
        if !token.is_valid() {
            return Err(syntax(format!("invalid token {}", token)));
        }

        let signable = data.signable_bytes();
        let digest = data.digest();
        Ok(Self {
            tx: data.clone(),
            id: tx.id(),
            token,
            amount: data.amount.unwrap_or_default(),
            signable_len: signable.len(),
            signers: verified_signers(&digest, &tx.signatures),
            ex_signatures: tx.ex_signatures.clone(),
        })
    }

    pub fn tx_type(&self) -> TxType {
        self.tx.tx_type
    }

    pub fn id(&self) -> [u8; 32] {
        self.id
    }

    pub fn from(&self) -> Address {
        self.tx.from
    }

    pub fn to(&self) -> Option<Address> {
        self.tx.to
    }

    pub fn token(&self) -> TokenSymbol {
        self.token
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    /// Keys whose primary signatures verified.
    pub fn signers(&self) -> &BTreeSet<PublicKey> {
        &self.signers
    }

    /// Keys whose counter-party signatures verify over the payload.
    pub fn ex_signers(&self) -> BTreeSet<PublicKey> {
        verified_signers(&self.tx.payload_digest(), &self.ex_signatures)
    }

    pub(crate) fn syntax(&self, reason: impl Into<String>) -> TxError {
        TxError::Syntax {
            tx_type: self.tx_type(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> TxError {
        TxError::Invalid {
            tx_type: self.tx_type(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unauthorized(&self, reason: impl Into<String>) -> TxError {
        TxError::Unauthorized {
            tx_type: self.tx_type(),
            reason: reason.into(),
        }
    }

    pub(crate) fn require_to(&self) -> TxResult<Address> {
        self.to().ok_or_else(|| self.syntax("missing recipient"))
    }

    pub(crate) fn require_no_to(&self) -> TxResult<()> {
        match self.to() {
            Some(_) => Err(self.syntax("unexpected recipient")),
            None => Ok(()),
        }
    }

    pub(crate) fn require_no_amount(&self) -> TxResult<()> {
        if !self.amount.is_zero() {
            return Err(self.syntax(format!("unexpected amount {}", self.amount)));
        }
        Ok(())
    }

    pub(crate) fn require_no_data(&self) -> TxResult<()> {
        if !self.tx.data.is_empty() {
            return Err(self.syntax("unexpected data"));
        }
        Ok(())
    }

    pub(crate) fn decode<P: Payload>(&self) -> TxResult<P> {
        P::decode(&self.tx.data).map_err(|e| self.syntax(e))
    }

    fn load(
        &self,
        ctx: &BlockContext,
        state: &dyn ChainState,
        address: &Address,
    ) -> TxResult<Arc<Account>> {
        let acc = state.load_account(address).for_tx(self.tx_type())?;
        acc.init(ctx.height, ctx.timestamp, &ctx.fee);
        Ok(acc)
    }

    /// Loads and binds `address` to the block, for handlers touching
    /// accounts beyond sender and recipient.
    pub(crate) fn load_account(
        &self,
        ctx: &BlockContext,
        state: &dyn ChainState,
        address: &Address,
    ) -> TxResult<Arc<Account>> {
        self.load(ctx, state, address)
    }

    pub(crate) fn load_ledger(&self, state: &dyn ChainState, acc: &Account) -> TxResult<()> {
        state.load_ledger(acc).for_tx(self.tx_type())
    }

    /// Stateful checks. Reads accounts, mutates nothing.
    pub fn verify<'a>(
        &'a self,
        ctx: &'a BlockContext,
        state: &dyn ChainState,
    ) -> TxResult<Verified<'a>> {
        let t = self.tx_type();
        if self.from().is_empty() {
            return Err(self.syntax("empty sender outside genesis"));
        }
        if self.tx.chain_id != ctx.chain_id {
            return Err(self.invalid(format!(
                "invalid chain id, expected {}, got {}",
                ctx.chain_id, self.tx.chain_id
            )));
        }
        let fee = Fee::compute(&ctx.fee, ctx.gas_price, &self.tx, self.signable_len)
            .map_err(|e| self.invalid(e))?;

        let sink = self.load(ctx, state, &Address::EMPTY)?;
        let builder = self.load(ctx, state, &ctx.builder)?;
        let from = self.load(ctx, state, &self.from())?;
        let to = match self.to() {
            Some(addr) => Some(self.load(ctx, state, &addr)?),
            None => None,
        };

        from.check_as_from(t).for_tx(t)?;
        if let Some(to) = &to {
            to.check_as_to(t).for_tx(t)?;
        }
        from.check_nonce(self.nonce()).for_tx(t)?;
        from.verify_signers(&self.signers, t.requires_plus_signing())
            .for_tx(t)?;
        from.check_approver(t, &self.signers).for_tx(t)?;

        let cost = fee.cost();
        if self.token.is_native() {
            if !self.amount.is_zero() {
                let total = self
                    .amount
                    .checked_add(Amount::from(cost))
                    .ok_or_else(|| self.invalid("amount plus cost overflow"))?;
                from.check_balance(&self.token, total).for_tx(t)?;
            } else {
                from.check_balance_with(&TokenSymbol::NATIVE, cost, false)
                    .for_tx(t)?;
            }
        } else {
            from.check_balance_with(&TokenSymbol::NATIVE, cost, false)
                .for_tx(t)?;
            if !self.amount.is_zero() {
                from.check_balance(&self.token, self.amount).for_tx(t)?;
            }
        }

        Ok(Verified {
            base: self,
            ctx,
            from,
            to,
            sink,
            builder,
            fee,
        })
    }

    /// Genesis loading: no fee, nonce, or signature checks.
    pub(crate) fn load_genesis(
        &self,
        ctx: &BlockContext,
        state: &dyn ChainState,
    ) -> TxResult<(Arc<Account>, Option<Arc<Account>>)> {
        if !ctx.is_genesis() {
            return Err(self.invalid(format!("genesis apply at height {}", ctx.height)));
        }
        if !self.tx_type().allowed_at_genesis() {
            return Err(self.invalid("not allowed at genesis"));
        }
        let from = self.load(ctx, state, &self.from())?;
        let to = match self.to() {
            Some(addr) => Some(self.load(ctx, state, &addr)?),
            None => None,
        };
        Ok((from, to))
    }

    /// Receipt of a genesis apply: nothing charged.
    pub(crate) fn genesis_receipt(&self, ctx: &BlockContext) -> TxReceipt {
        info!(tx = %hex::encode(self.id), tx_type = %self.tx_type(), "genesis transaction applied");
        TxReceipt {
            tx_id: hex::encode(self.id),
            tx_type: self.tx_type(),
            from: self.from(),
            to: self.to(),
            height: ctx.height,
            gas: 0,
            base_fee: 0,
            tip: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Verified / Accepted
// ---------------------------------------------------------------------------

/// A transaction whose fee, nonce, signatures, and balances checked out.
pub struct Verified<'a> {
    base: &'a TxBase,
    ctx: &'a BlockContext,
    pub from: Arc<Account>,
    pub to: Option<Arc<Account>>,
    sink: Arc<Account>,
    builder: Arc<Account>,
    pub fee: Fee,
}

impl<'a> Verified<'a> {
    /// The recipient account. Handlers that require one checked it
    /// syntactically.
    pub fn to_account(&self) -> TxResult<&Arc<Account>> {
        self.to
            .as_ref()
            .ok_or_else(|| self.base.syntax("missing recipient"))
    }

    /// Accepts, moving the transaction amount to the recipient.
    pub fn accept(self) -> TxResult<Accepted> {
        let amount = self.base.amount();
        self.accept_with(amount)
    }

    /// Accepts, moving `amount` instead of the transaction amount. Used
    /// when the handler settles a smaller amount than was offered.
    pub fn accept_with(self, amount: impl Into<Amount>) -> TxResult<Accepted> {
        let amount = amount.into();
        let base = self.base;
        let t = base.tx_type();
        let to = if !amount.is_zero() {
            Some(self.to_account()?.clone())
        } else {
            None
        };

        self.from
            .sub_gas_by_nonce(TokenSymbol::NATIVE, base.nonce(), self.fee.cost())
            .for_tx(t)?;
        if let Some(to) = to {
            self.from.sub(base.token(), amount).for_tx(t)?;
            to.add(base.token(), amount).for_tx(t)?;
        }
        self.builder
            .add(TokenSymbol::NATIVE, self.fee.tip)
            .for_tx(t)?;
        self.sink
            .add(TokenSymbol::NATIVE, self.fee.base_fee)
            .for_tx(t)?;

        let receipt = TxReceipt {
            tx_id: hex::encode(base.id()),
            tx_type: t,
            from: base.from(),
            to: base.to(),
            height: self.ctx.height,
            gas: self.fee.gas,
            base_fee: self.fee.base_fee,
            tip: self.fee.tip,
        };
        info!(
            tx = %receipt.tx_id,
            tx_type = %t,
            from = %receipt.from,
            gas = receipt.gas,
            cost = receipt.cost(),
            %amount,
            "transaction accepted"
        );
        Ok(Accepted {
            from: self.from,
            to: self.to,
            receipt,
        })
    }
}

/// A transaction whose fee has been collected. Handlers apply their own
/// effects through the account handles it carries.
pub struct Accepted {
    pub from: Arc<Account>,
    pub to: Option<Arc<Account>>,
    pub receipt: TxReceipt,
}

/// Moves `amount` of `token` between two accounts.
pub(crate) fn transfer(
    tx_type: TxType,
    from: &Account,
    to: &Account,
    token: TokenSymbol,
    amount: Amount,
) -> TxResult<()> {
    from.sub(token, amount).for_tx(tx_type)?;
    to.add(token, amount).for_tx(tx_type)
}

/// Credits every balance in `balances` to `to`.
pub(crate) fn credit_all(
    tx_type: TxType,
    to: &Account,
    balances: impl IntoIterator<Item = (TokenSymbol, Amount)>,
) -> TxResult<()> {
    for (token, amount) in balances {
        to.add(token, amount).for_tx(tx_type)?;
    }
    Ok(())
}
