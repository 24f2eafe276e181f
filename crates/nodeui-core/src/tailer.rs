//! Recent-block window with initial backfill and one-at-a-time tailing.

use std::collections::VecDeque;

use crate::config::DashboardConfig;
use crate::event::{Component, Event, FeedError, Task};
use crate::types::{Block, Round};
use std::time::Duration;

/// Capped window of blocks, newest first, strictly descending by round.
#[derive(Debug, Clone)]
pub struct BlockWindow {
    blocks: VecDeque<Block>,
    cap: usize,
}

impl BlockWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            blocks: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn head(&self) -> Option<&Block> {
        self.blocks.front()
    }

    pub fn head_round(&self) -> Option<Round> {
        self.head().map(Block::round)
    }

    pub fn oldest_round(&self) -> Option<Round> {
        self.blocks.back().map(Block::round)
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Index of `round` in the window.
    pub fn position(&self, round: Round) -> Option<usize> {
        self.blocks.iter().position(|b| b.round() == round)
    }

    pub fn find(&self, round: Round) -> Option<&Block> {
        self.position(round).and_then(|i| self.blocks.get(i))
    }

    /// Blocks newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn rounds(&self) -> Vec<Round> {
        self.blocks.iter().map(Block::round).collect()
    }

    /// True when every round is exactly one below its predecessor.
    pub fn is_contiguous(&self) -> bool {
        self.blocks
            .iter()
            .zip(self.blocks.iter().skip(1))
            .all(|(newer, older)| newer.round() == older.round() + 1)
    }

    /// Replace the contents, keeping the newest `cap` distinct rounds.
    pub fn rebuild(&mut self, mut blocks: Vec<Block>) {
        blocks.sort_by_key(|b| std::cmp::Reverse(b.round()));
        blocks.dedup_by_key(|b| b.round());
        blocks.truncate(self.cap);
        self.blocks = blocks.into();
    }

    /// Prepend a new head, trimming from the tail. Rejects blocks that are
    /// not newer than the current head.
    pub fn push_head(&mut self, block: Block) -> bool {
        if self.head_round().is_some_and(|head| block.round() <= head) {
            return false;
        }
        self.blocks.push_front(block);
        while self.blocks.len() > self.cap {
            self.blocks.pop_back();
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailPhase {
    /// Waiting for a status that reveals the latest round.
    AwaitingStatus,
    Backfilling { latest: Round },
    Tailing,
}

/// Maintains the block window: one backfill, then a chain of single
/// outstanding tail requests.
#[derive(Debug)]
pub struct BlockTailer {
    window: BlockWindow,
    phase: TailPhase,
    /// Round of the single outstanding tail request.
    in_flight: Option<Round>,
    gaps: Vec<Round>,
    backfill_count: usize,
    retry_delay: Duration,
    /// Bumped whenever the window is rebuilt from a backfill.
    generation: u64,
}

impl BlockTailer {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            window: BlockWindow::new(config.window_size),
            phase: TailPhase::AwaitingStatus,
            in_flight: None,
            gaps: Vec::new(),
            backfill_count: config.window_size.max(1),
            retry_delay: config.tail_retry_delay,
            generation: 0,
        }
    }

    pub fn window(&self) -> &BlockWindow {
        &self.window
    }

    /// Rounds skipped because they could not be fetched or decoded, newest first.
    pub fn gaps(&self) -> &[Round] {
        &self.gaps
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> Option<Round> {
        self.in_flight
    }

    pub fn is_tailing(&self) -> bool {
        self.phase == TailPhase::Tailing
    }

    fn backfill(&mut self, latest: Round, tasks: &mut Vec<Task>) {
        tracing::info!("Backfilling {} blocks up to round {}", self.backfill_count, latest);
        self.phase = TailPhase::Backfilling { latest };
        tasks.push(Task::Backfill {
            latest,
            count: self.backfill_count,
        });
    }

    fn tail_next(&mut self, round: Round, delay: Duration, tasks: &mut Vec<Task>) {
        self.in_flight = Some(round);
        tasks.push(Task::TailBlock { round, delay });
    }

    fn record_gap(&mut self, round: Round) {
        if !self.gaps.contains(&round) {
            self.gaps.push(round);
            self.gaps.sort_unstable_by(|a, b| b.cmp(a));
        }
        self.prune_gaps();
    }

    fn prune_gaps(&mut self) {
        if let Some(oldest) = self.window.oldest_round() {
            self.gaps.retain(|r| *r >= oldest);
        }
    }

    fn apply_backfill(
        &mut self,
        latest: Round,
        results: &[(Round, crate::event::BlockFetch)],
        tasks: &mut Vec<Task>,
    ) {
        if self.phase != (TailPhase::Backfilling { latest }) {
            tracing::debug!("Discarding stale backfill for round {}", latest);
            return;
        }

        let mut blocks = Vec::with_capacity(results.len());
        let mut missing = Vec::new();
        for (round, result) in results {
            match result {
                Ok(block) => blocks.push(block.clone()),
                Err(e) => {
                    tracing::warn!("Backfill of round {} failed: {}", round, e);
                    missing.push(*round);
                }
            }
        }

        if blocks.is_empty() {
            tracing::warn!("Backfill returned no blocks, retrying on next status");
            self.phase = TailPhase::AwaitingStatus;
            return;
        }

        self.window.rebuild(blocks);
        self.generation += 1;
        self.gaps.clear();
        for round in missing {
            self.record_gap(round);
        }
        self.phase = TailPhase::Tailing;

        let next = self
            .window
            .head_round()
            .map_or(latest, |head| head.max(latest))
            + 1;
        self.tail_next(next, Duration::ZERO, tasks);
    }

    fn apply_tail(
        &mut self,
        round: Round,
        result: &crate::event::BlockFetch,
        tasks: &mut Vec<Task>,
    ) {
        if self.in_flight != Some(round) {
            tracing::debug!("Discarding stale result for round {}", round);
            return;
        }
        self.in_flight = None;

        match result {
            Ok(block) => {
                if self.window.push_head(block.clone()) {
                    tracing::debug!("Tailed round {}", round);
                    self.prune_gaps();
                } else {
                    tracing::debug!("Round {} already superseded", round);
                }
                let next = self.window.head_round().unwrap_or(round).max(round) + 1;
                self.tail_next(next, Duration::ZERO, tasks);
            }
            Err(FeedError::Decode { .. }) => {
                self.record_gap(round);
                self.tail_next(round + 1, Duration::ZERO, tasks);
            }
            Err(_) => {
                self.tail_next(round, self.retry_delay, tasks);
            }
        }
    }
}

impl Component for BlockTailer {
    fn handle(&mut self, event: &Event, tasks: &mut Vec<Task>) {
        match event {
            Event::StatusFetched { snapshot, .. } => {
                // Rounds do not advance during a catchpoint catchup.
                if self.phase == TailPhase::AwaitingStatus && !snapshot.catchpoint_active() {
                    self.backfill(snapshot.last_round, tasks);
                }
            }
            Event::BackfillFinished { latest, results } => {
                self.apply_backfill(*latest, results, tasks);
            }
            Event::BlockTailed { round, result } => {
                self.apply_tail(*round, result, tasks);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) fn block(round: Round, txns: usize) -> Block {
    use crate::types::{BlockHeader, SignedTransaction, Transaction, TxType};
    Block {
        header: BlockHeader {
            round,
            ..Default::default()
        },
        payset: (0..txns)
            .map(|i| SignedTransaction {
                txn: Transaction {
                    tx_type: TxType::Payment,
                    sender: format!("SENDER{}", i),
                    amount: 1_000 * (i as u64 + 1),
                    fee: 1_000,
                    ..Default::default()
                },
                sig: Some("c2ln".to_string()),
                ..Default::default()
            })
            .collect(),
        proposer: None,
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_window_cap_and_contiguity(
            cap in 1usize..40,
            start in 1u64..1_000_000,
            seeded in 1usize..40,
            tailed in 0usize..100,
        ) {
            let mut window = BlockWindow::new(cap);
            let seeded = seeded as u64;
            window.rebuild((start..start + seeded).map(|r| block(r, 0)).collect());
            prop_assert!(window.len() <= cap);
            prop_assert!(window.is_contiguous());

            let mut next = start + seeded;
            for _ in 0..tailed {
                prop_assert!(window.push_head(block(next, 0)));
                next += 1;
                prop_assert!(window.len() <= cap);
                prop_assert!(window.is_contiguous());
                prop_assert_eq!(window.head_round(), Some(next - 1));
            }
        }

        #[test]
        fn test_single_outstanding_request(
            outcomes in proptest::collection::vec(0u8..3, 1..60),
        ) {
            let mut tailer = BlockTailer::new(&DashboardConfig {
                window_size: 5,
                ..Default::default()
            });
            let mut tasks = Vec::new();
            tailer.handle(&Event::StatusFetched {
                snapshot: crate::types::NodeStatusSnapshot { last_round: 100, ..Default::default() },
                observed_at: std::time::Instant::now(),
            }, &mut tasks);
            let results = (96..=100).rev().map(|r| (r, Ok(block(r, 0)))).collect();
            tasks.clear();
            tailer.handle(&Event::BackfillFinished { latest: 100, results }, &mut tasks);

            for outcome in outcomes {
                prop_assert_eq!(tasks.len(), 1);
                let round = match tasks.pop() {
                    Some(Task::TailBlock { round, .. }) => round,
                    other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
                };
                let result = match outcome {
                    0 => Ok(block(round, 0)),
                    1 => Err(FeedError::Decode { round, message: "bad".to_string() }),
                    _ => Err(FeedError::transient(crate::event::FetchSource::Block, "down")),
                };
                tailer.handle(&Event::BlockTailed { round, result }, &mut tasks);
                prop_assert!(tailer.window().len() <= 5);
            }
        }
    }
}
