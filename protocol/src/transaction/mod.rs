//! # Transaction Module
//!
//! Construction, signing, verification, and execution of LedgerVM
//! transactions. Every balance move, keeper change, stake, loan, and token
//! action is a [`Transaction`].
//!
//! ## Architecture
//!
//! ```text
//! types.rs     TxType and the sender/recipient allow lists
//! tx.rs        TxData (signed part) and Transaction (with signatures)
//! payload.rs   type-specific payloads carried in TxData::data
//! builder.rs   fluent TransactionBuilder for unsigned transactions
//! signing.rs   keeper and counter-party signing
//! base.rs      the shared syntactic_verify / verify / accept lifecycle
//! handlers/    one handler per transaction type
//! receipt.rs   what a successful apply returns
//! error.rs     TxError, prefixed with the transaction type
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** with [`TransactionBuilder`].
//! 2. **Sign** with [`sign_transaction`] per keeper, and [`sign_payload`]
//!    per counter-party.
//! 3. **Parse** with [`parse`]: stateless checks and payload decoding
//!    produce a [`TxHandler`].
//! 4. **Apply** with [`TxHandler::apply`] (or `apply_genesis` at height
//!    0). On error the caller discards the state; on success it commits.

pub mod base;
pub mod builder;
pub mod error;
pub mod handlers;
pub mod payload;
pub mod receipt;
pub mod signing;
pub mod tx;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use base::{Accepted, Fee, TxBase, Verified};
pub use builder::TransactionBuilder;
pub use error::{TxError, TxResult};
pub use receipt::TxReceipt;
pub use signing::{sign_payload, sign_transaction};
pub use tx::{payload_digest, Transaction, TxData};
pub use types::TxType;

use tracing::warn;

use crate::state::{BlockContext, ChainState};

/// Executes one transaction type against chain state.
pub trait TxHandler: Send + Sync {
    fn base(&self) -> &TxBase;

    /// Verifies and applies. An `Err` may leave accounts partly mutated;
    /// the caller discards the state in that case.
    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt>;

    /// Bootstrap path: no fee, nonce, or signature checks. Only a few
    /// types support it, and only at height 0.
    fn apply_genesis(&self, _ctx: &BlockContext, _state: &dyn ChainState) -> TxResult<TxReceipt> {
        Err(self.base().invalid("not allowed at genesis"))
    }
}

/// Stateless checks plus payload decoding. The only way to obtain a
/// handler.
pub fn parse(tx: &Transaction) -> TxResult<Box<dyn TxHandler>> {
    let base = TxBase::syntactic_verify(tx)?;
    handlers::dispatch(base)
}

/// Parses and applies `tx`, through the genesis path at height 0.
/// Rejections are logged.
pub fn execute(
    tx: &Transaction,
    ctx: &BlockContext,
    state: &dyn ChainState,
) -> TxResult<TxReceipt> {
    let result = parse(tx).and_then(|handler| {
        if ctx.is_genesis() {
            handler.apply_genesis(ctx, state)
        } else {
            handler.apply(ctx, state)
        }
    });
    if let Err(err) = &result {
        warn!(
            tx = %tx.id_hex(),
            kind = %err.kind(),
            height = ctx.height,
            error = %err,
            "transaction rejected"
        );
    }
    result
}
