//! # Block Replay
//!
//! Feeds a JSON block file through the execution core, one transaction at a
//! time. Each applied transaction is committed before the next runs; a
//! rejected one is discarded and recorded, and replay moves on.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ledgervm_protocol::config::{ChainConfig, UNIT};
use ledgervm_protocol::crypto::Keypair;
use ledgervm_protocol::error::ErrorKind;
use ledgervm_protocol::state::{BlockContext, ChainState, KvStore, MemoryState};
use ledgervm_protocol::transaction::payload::{AccountUpdate, SendTo};
use ledgervm_protocol::transaction::{
    execute, sign_transaction, Transaction, TransactionBuilder, TxReceipt, TxType,
};
use ledgervm_protocol::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInput {
    pub height: u64,
    /// Unix seconds.
    pub timestamp: u64,
    /// Receives tips. Defaults to the fee sink.
    #[serde(default)]
    pub builder: Option<Address>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl BlockInput {
    fn context(&self, config: &ChainConfig) -> BlockContext {
        let mut ctx = BlockContext::new(config, self.height, self.timestamp);
        if let Some(builder) = self.builder {
            ctx = ctx.with_builder(builder);
        }
        if let Some(price) = self.gas_price {
            ctx = ctx.with_gas_price(price);
        }
        ctx
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFile {
    pub blocks: Vec<BlockInput>,
}

impl BlockFile {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("invalid block file")
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub height: u64,
    pub tx_id: String,
    pub kind: ErrorKind,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub address: Address,
    pub kind: String,
    pub nonce: u64,
    pub balances: BTreeMap<String, Amount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub blocks: usize,
    pub receipts: Vec<TxReceipt>,
    pub rejected: Vec<Rejection>,
    /// Hex state root after the last block.
    pub root: String,
    pub accounts: Vec<AccountSummary>,
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Replays `file` into `state`. Blocks must have strictly increasing
/// heights. Storage failures abort; every other rejection is reported.
pub fn replay<S: KvStore>(
    state: &MemoryState<S>,
    config: &ChainConfig,
    file: &BlockFile,
    show: &[Address],
) -> Result<ReplayReport> {
    let mut receipts = Vec::new();
    let mut rejected = Vec::new();
    let mut touched: BTreeSet<Address> = show.iter().copied().collect();
    let mut last_height: Option<u64> = None;

    for block in &file.blocks {
        if let Some(prev) = last_height {
            ensure!(
                block.height > prev,
                "block height {} does not follow {}",
                block.height,
                prev
            );
        }
        last_height = Some(block.height);
        let ctx = block.context(config);
        touched.insert(ctx.builder);

        for tx in &block.transactions {
            touched.insert(tx.tx.from);
            touched.extend(tx.tx.to);
            match execute(tx, &ctx, state) {
                Ok(receipt) => {
                    state
                        .commit()
                        .with_context(|| format!("commit after {}", receipt.tx_id))?;
                    receipts.push(receipt);
                }
                Err(err) if err.kind() == ErrorKind::Storage => {
                    bail!("storage failure at height {}: {}", block.height, err);
                }
                Err(err) => {
                    state.discard();
                    rejected.push(Rejection {
                        height: block.height,
                        tx_id: tx.id_hex(),
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            height = block.height,
            txs = block.transactions.len(),
            "block replayed"
        );
    }

    if !rejected.is_empty() {
        warn!(count = rejected.len(), "some transactions were rejected");
    }

    let root = state.root_hash().context("computing state root")?;
    let accounts = touched
        .into_iter()
        .map(|address| summarize(state, address))
        .collect::<Result<Vec<_>>>()?;

    Ok(ReplayReport {
        blocks: file.blocks.len(),
        receipts,
        rejected,
        root: hex::encode(root),
        accounts,
    })
}

fn summarize<S: KvStore>(state: &MemoryState<S>, address: Address) -> Result<AccountSummary> {
    let account = state
        .load_account(&address)
        .with_context(|| format!("loading {}", address))?;
    Ok(AccountSummary {
        address,
        kind: format!("{:?}", account.kind()),
        nonce: account.nonce(),
        balances: account
            .balances()
            .into_iter()
            .map(|(token, amount)| (token.to_string(), amount))
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// Seeds of the sample keys: genesis keeper, alice, bob.
pub const SAMPLE_SEEDS: [[u8; 32]; 3] = [[0x47; 32], [0x0A; 32], [0x0B; 32]];

const SAMPLE_GENESIS_TIME: u64 = 1_700_000_000;

/// A three-block chain: genesis issuing the native token to alice, then a
/// transfer to bob, then a split payment back.
pub fn sample_blocks(config: &ChainConfig) -> BlockFile {
    let [genesis, alice, bob] = SAMPLE_SEEDS.map(|seed| Keypair::from_seed(&seed));
    let sign = |builder: TransactionBuilder, from: Address, nonce: u64, kp: &Keypair| {
        let mut tx = builder
            .chain_id(config.chain_id)
            .from(from)
            .nonce(nonce)
            .build();
        sign_transaction(&mut tx, kp);
        tx
    };

    let create = sign(
        TransactionBuilder::new(TxType::CreateToken)
            .to(Address::EMPTY)
            .payload(&AccountUpdate {
                threshold: Some(1),
                keepers: Some(vec![genesis.public_key()]),
                max_total_supply: Some((1_000_000_000 * UNIT).into()),
                ..Default::default()
            }),
        genesis.address(),
        0,
        &genesis,
    );
    let grant = sign(
        TransactionBuilder::new(TxType::Transfer)
            .to(alice.address())
            .amount(10_000 * UNIT),
        Address::EMPTY,
        0,
        &genesis,
    );
    let pay_bob = sign(
        TransactionBuilder::new(TxType::Transfer)
            .to(bob.address())
            .amount(1_000 * UNIT)
            .gas(1, 2),
        alice.address(),
        0,
        &alice,
    );
    let split = sign(
        TransactionBuilder::new(TxType::TransferMultiple)
            .amount(300 * UNIT)
            .payload(&vec![
                SendTo {
                    to: alice.address(),
                    amount: (100 * UNIT).into(),
                },
                SendTo {
                    to: genesis.address(),
                    amount: (200 * UNIT).into(),
                },
            ]),
        bob.address(),
        0,
        &bob,
    );

    let builder = Some(Address::from_bytes([0xB1; 20]));
    BlockFile {
        blocks: vec![
            BlockInput {
                height: 0,
                timestamp: SAMPLE_GENESIS_TIME,
                builder: None,
                gas_price: None,
                transactions: vec![create, grant],
            },
            BlockInput {
                height: 1,
                timestamp: SAMPLE_GENESIS_TIME + 5,
                builder,
                gas_price: None,
                transactions: vec![pay_bob],
            },
            BlockInput {
                height: 2,
                timestamp: SAMPLE_GENESIS_TIME + 10,
                builder,
                gas_price: None,
                transactions: vec![split],
            },
        ],
    }
}
