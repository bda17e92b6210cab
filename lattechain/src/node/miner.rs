// Copyright (c) 2024 Botho Foundation

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::block::Block;
use crate::chain::{Chain, ChainError};
use crate::ledger::Ledger;
use crate::mempool::TransactionPool;

/// Nonces tried between shutdown checks and hash counter flushes
const BATCH_SIZE: u64 = 10_000;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    pub total_hashes: u64,
    pub blocks_found: u64,
    pub rejected_transactions: u64,
    /// Processed transactions left out of any block by an interrupted search
    pub abandoned_transactions: u64,
    pub start_time: Instant,
}

impl MiningStats {
    pub fn hashrate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_hashes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// A block appended to the chain by a mining thread
#[derive(Debug, Clone)]
pub struct MinedBlock {
    pub worker: usize,
    pub block: Block,
}

/// Turns a batch of processed transaction ids into a block ready to append.
pub trait BlockAssembler: Send + Sync {
    /// Build a block confirming `transactions` on the current tip and solve
    /// it. Returns `None` if mining was interrupted.
    fn assemble_and_mine_block(&self, transactions: Vec<String>) -> Option<Block>;
}

/// Proof-of-work assembler: increments the nonce until the header hash is
/// below the difficulty target.
pub struct PowAssembler {
    chain: Arc<Chain>,
    difficulty: u64,
    shutdown: Arc<AtomicBool>,
    total_hashes: Arc<AtomicU64>,
}

impl PowAssembler {
    pub fn new(
        chain: Arc<Chain>,
        difficulty: u64,
        shutdown: Arc<AtomicBool>,
        total_hashes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            chain,
            difficulty,
            shutdown,
            total_hashes,
        }
    }

    /// Search nonces for `block` until its PoW is valid.
    pub fn solve(&self, mut block: Block) -> Option<Block> {
        let mut local_hashes: u64 = 0;

        let solved = loop {
            if block.header.is_valid_pow() {
                break Some(block);
            }
            block.header.nonce = block.header.nonce.wrapping_add(1);
            local_hashes += 1;

            if local_hashes % BATCH_SIZE == 0 && self.shutdown.load(Ordering::Relaxed) {
                break None;
            }
        };

        self.total_hashes.fetch_add(local_hashes + 1, Ordering::Relaxed);
        solved
    }
}

impl BlockAssembler for PowAssembler {
    fn assemble_and_mine_block(&self, transactions: Vec<String>) -> Option<Block> {
        let template = Block::new_template(&self.chain.tip(), transactions, self.difficulty);
        self.solve(template)
    }
}

/// State shared by every mining thread
#[derive(Clone)]
struct WorkerContext {
    ledger: Arc<Ledger>,
    pool: Arc<TransactionPool>,
    chain: Arc<Chain>,
    assembler: Arc<dyn BlockAssembler>,
    max_block_transactions: usize,
    shutdown: Arc<AtomicBool>,
    blocks_found: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    abandoned: Arc<AtomicU64>,
    block_sender: Sender<MinedBlock>,
}

/// The miner manages mining threads
pub struct Miner {
    threads: usize,
    max_block_transactions: usize,
    ledger: Arc<Ledger>,
    chain: Arc<Chain>,
    assembler: Arc<dyn BlockAssembler>,
    shutdown: Arc<AtomicBool>,
    total_hashes: Arc<AtomicU64>,
    blocks_found: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    abandoned: Arc<AtomicU64>,
    start_time: Instant,
    handles: Vec<JoinHandle<()>>,
    block_sender: Sender<MinedBlock>,
    /// Receiver for appended blocks (taken by the node)
    block_receiver: Option<Receiver<MinedBlock>>,
}

impl Miner {
    /// Miner using proof-of-work at `difficulty`.
    pub fn new(
        threads: usize,
        max_block_transactions: usize,
        ledger: Arc<Ledger>,
        chain: Arc<Chain>,
        difficulty: u64,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let total_hashes = Arc::new(AtomicU64::new(0));
        let assembler = Arc::new(PowAssembler::new(
            chain.clone(),
            difficulty,
            shutdown.clone(),
            total_hashes.clone(),
        ));
        let (block_sender, block_receiver) = unbounded();

        Self {
            threads: threads.max(1),
            max_block_transactions: max_block_transactions.max(1),
            ledger,
            chain,
            assembler,
            shutdown,
            total_hashes,
            blocks_found: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            abandoned: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            handles: Vec::new(),
            block_sender,
            block_receiver: Some(block_receiver),
        }
    }

    /// Replace the block assembler. Must be called before [`Miner::start`].
    pub fn with_assembler(mut self, assembler: Arc<dyn BlockAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    /// Flag observed by the mining threads; set by [`Miner::stop`].
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Take the block receiver (can only be called once)
    pub fn take_block_receiver(&mut self) -> Option<Receiver<MinedBlock>> {
        self.block_receiver.take()
    }

    pub fn start(&mut self) {
        let context = WorkerContext {
            ledger: self.ledger.clone(),
            pool: self.ledger.pool().clone(),
            chain: self.chain.clone(),
            assembler: self.assembler.clone(),
            max_block_transactions: self.max_block_transactions,
            shutdown: self.shutdown.clone(),
            blocks_found: self.blocks_found.clone(),
            rejected: self.rejected.clone(),
            abandoned: self.abandoned.clone(),
            block_sender: self.block_sender.clone(),
        };

        for worker in 0..self.threads {
            let context = context.clone();
            self.handles
                .push(thread::spawn(move || mine_loop(worker, context)));
        }
        info!(threads = self.threads, "Started mining");
    }

    /// Signal shutdown, wake idle workers and wait for every thread.
    ///
    /// Entries still queued afterwards can no longer be mined; their inputs
    /// go back to the senders.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let pool = self.ledger.pool().clone();
        pool.close();
        for handle in self.handles {
            let _ = handle.join();
        }

        let stranded: Vec<String> = pool
            .try_take_batch(usize::MAX)
            .into_iter()
            .map(|entry| entry.transaction_id)
            .collect();
        if !stranded.is_empty() {
            warn!(count = stranded.len(), tx_ids = ?stranded, "Unmined transactions left in pool");
            for id in &stranded {
                if let Err(e) = self.ledger.release_pending(id) {
                    error!(tx_id = %id, error = %e, "Failed to release inputs");
                }
            }
        }
        info!("Stopped mining");
    }

    pub fn stats(&self) -> MiningStats {
        MiningStats {
            total_hashes: self.total_hashes.load(Ordering::Relaxed),
            blocks_found: self.blocks_found.load(Ordering::Relaxed),
            rejected_transactions: self.rejected.load(Ordering::Relaxed),
            abandoned_transactions: self.abandoned.load(Ordering::Relaxed),
            start_time: self.start_time,
        }
    }
}

/// The actual mining loop
fn mine_loop(worker: usize, ctx: WorkerContext) {
    while !ctx.shutdown.load(Ordering::Relaxed) {
        let Some(batch) = ctx.pool.wait_for_batch(ctx.max_block_transactions) else {
            break;
        };

        let mut confirmed = Vec::with_capacity(batch.len());
        for entry in batch {
            match ctx.ledger.process_pending(&entry.transaction_id) {
                Ok(tx) => confirmed.push(tx.id),
                Err(e) => {
                    ctx.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(worker, tx_id = %entry.transaction_id, error = %e, "Dropped from batch");
                }
            }
        }
        if confirmed.is_empty() {
            continue;
        }

        loop {
            let Some(block) = ctx.assembler.assemble_and_mine_block(confirmed.clone()) else {
                ctx.abandoned.fetch_add(confirmed.len() as u64, Ordering::Relaxed);
                warn!(
                    worker,
                    tx_ids = ?confirmed,
                    "Mining interrupted; processed transactions left out of any block"
                );
                return;
            };

            match ctx.chain.append(block.clone()) {
                Ok(()) => {
                    ctx.blocks_found.fetch_add(1, Ordering::Relaxed);
                    info!(
                        worker,
                        height = block.height(),
                        nonce = block.header.nonce,
                        txs = block.transactions.len(),
                        "Mined block"
                    );
                    // The node may not be listening; the block is already appended.
                    let _ = ctx.block_sender.send(MinedBlock { worker, block });
                    break;
                }
                Err(ChainError::StaleTip { height }) => {
                    debug!(worker, height, "Tip moved while mining, assembling again");
                }
                Err(e) => {
                    error!(worker, error = %e, "Mined block rejected by chain");
                    break;
                }
            }
        }
    }
}
