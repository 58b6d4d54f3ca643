//! Shared fixtures for handler tests.

use std::sync::Arc;

use super::{execute, sign_payload, sign_transaction, Transaction, TransactionBuilder, TxReceipt, TxResult};
use crate::account::Account;
use crate::config::{ChainConfig, UNIT};
use crate::crypto::Keypair;
use crate::state::{BlockContext, ChainState, MemoryState, MemoryStore};
use crate::types::{Address, Amount, TokenSymbol};

pub(crate) const UNIT_NATIVE: u64 = UNIT;

pub(crate) fn key(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

pub(crate) struct Env {
    pub state: MemoryState<MemoryStore>,
    pub ctx: BlockContext,
}

impl Env {
    /// Height 1, a fixed clock, and a dedicated builder account.
    pub fn new() -> Self {
        Self {
            state: MemoryState::new(MemoryStore::new()),
            ctx: BlockContext::new(&ChainConfig::default(), 1, 1_700_000_000)
                .with_builder(Address::from_bytes([0xBB; 20])),
        }
    }

    pub fn account(&self, address: &Address) -> Arc<Account> {
        self.state.load_account(address).unwrap()
    }

    pub fn fund(&self, address: &Address, amount: impl Into<Amount>) {
        self.fund_token(address, TokenSymbol::NATIVE, amount);
    }

    pub fn fund_token(&self, address: &Address, token: TokenSymbol, amount: impl Into<Amount>) {
        self.account(address).add(token, amount).unwrap();
        self.state.commit().unwrap();
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.account(address).balance_of(&TokenSymbol::NATIVE)
    }

    pub fn token_balance(&self, address: &Address, token: TokenSymbol) -> Amount {
        self.account(address).balance_of(&token)
    }

    /// Moves the clock forward and opens the next block.
    pub fn advance(&mut self, secs: u64) {
        self.ctx.timestamp += secs;
        self.ctx.height += 1;
    }

    /// Fills in chain id and the sender's current nonce, then signs with
    /// `signers` (keepers) and `ex` (counter-parties).
    pub fn build(
        &self,
        builder: TransactionBuilder,
        from: &Address,
        signers: &[&Keypair],
        ex: &[&Keypair],
    ) -> Transaction {
        let nonce = self.account(from).nonce();
        let mut tx = builder
            .chain_id(self.ctx.chain_id)
            .from(*from)
            .nonce(nonce)
            .build();
        for kp in signers {
            sign_transaction(&mut tx, kp);
        }
        for kp in ex {
            sign_payload(&mut tx, kp);
        }
        tx
    }

    /// Executes and commits, or discards on error.
    pub fn run(&self, tx: &Transaction) -> TxResult<TxReceipt> {
        let result = execute(tx, &self.ctx, &self.state);
        match &result {
            Ok(_) => {
                self.state.commit().unwrap();
            }
            Err(_) => self.state.discard(),
        }
        result
    }

    /// Builds, signs with `kp` alone, and runs.
    pub fn send(&self, builder: TransactionBuilder, kp: &Keypair) -> TxResult<TxReceipt> {
        let tx = self.build(builder, &kp.address(), &[kp], &[]);
        self.run(&tx)
    }
}
