//! Drill-down navigation: block list, transaction list, transaction detail.
//!
//! Drill-down levels own frozen copies of the data they show, so tailing new
//! blocks never disturbs a transaction list or detail view that is open.

use crate::event::FeedError;
use crate::tailer::BlockWindow;
use crate::types::{Round, SignedTransaction, TransactionRecord};

/// User navigation intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    Forward,
    Back,
    Up,
    Down,
    Top,
    Bottom,
}

/// Frozen payset of one block with its own cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PaysetView {
    pub round: Round,
    pub transactions: Vec<SignedTransaction>,
    pub records: Vec<TransactionRecord>,
    pub cursor: usize,
}

impl PaysetView {
    fn new(round: Round, transactions: Vec<SignedTransaction>) -> Self {
        let records = transactions.iter().map(TransactionRecord::from).collect();
        Self {
            round,
            transactions,
            records,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn selected(&self) -> Option<&SignedTransaction> {
        self.transactions.get(self.cursor)
    }
}

/// Materialized transaction detail.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub round: Round,
    /// Position of the transaction within its block.
    pub intra: usize,
    pub record: TransactionRecord,
    /// Pretty-printed transaction.
    pub text: String,
    pub scroll: usize,
}

impl DetailView {
    fn new(round: Round, intra: usize, stxn: &SignedTransaction) -> Self {
        let text = serde_json::to_string_pretty(stxn)
            .unwrap_or_else(|e| format!("failed to render transaction: {}", e));
        Self {
            round,
            intra,
            record: TransactionRecord::from(stxn),
            text,
            scroll: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Active drill level.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationState {
    BlockList,
    TransactionList(PaysetView),
    TransactionDetail(PaysetView, DetailView),
}

impl NavigationState {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationState::BlockList => "blocks",
            NavigationState::TransactionList(_) => "transactions",
            NavigationState::TransactionDetail(..) => "transaction",
        }
    }
}

/// Tracks the drill level and the block-list selection.
///
/// The block-list selection is remembered by round so it stays on the same
/// block as new blocks are prepended. A selection on the head keeps
/// following the head.
#[derive(Debug, Clone)]
pub struct NavigationStateMachine {
    state: NavigationState,
    block_cursor: Option<usize>,
    selected_round: Option<Round>,
}

impl Default for NavigationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationStateMachine {
    pub fn new() -> Self {
        Self {
            state: NavigationState::BlockList,
            block_cursor: None,
            selected_round: None,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn block_cursor(&self) -> Option<usize> {
        self.block_cursor
    }

    pub fn selected_round(&self) -> Option<Round> {
        self.selected_round
    }

    /// Return to the block list with the head selected.
    pub fn reset(&mut self, window: &BlockWindow) {
        self.state = NavigationState::BlockList;
        self.block_cursor = None;
        self.selected_round = None;
        self.sync(window);
    }

    /// Re-anchor the block cursor after the window changed.
    pub fn sync(&mut self, window: &BlockWindow) {
        if window.is_empty() {
            self.block_cursor = None;
            self.selected_round = None;
            return;
        }

        let index = match (self.block_cursor, self.selected_round) {
            (Some(0), _) | (None, _) | (_, None) => 0,
            (Some(_), Some(round)) => window
                .position(round)
                .unwrap_or_else(|| window.len() - 1),
        };
        self.select_block(index, window);
    }

    fn select_block(&mut self, index: usize, window: &BlockWindow) {
        let index = index.min(window.len().saturating_sub(1));
        self.block_cursor = Some(index);
        self.selected_round = window.get(index).map(|b| b.round());
    }

    /// Apply a navigation event. Forward without a valid selection is an
    /// error and leaves the state untouched.
    pub fn handle(
        &mut self,
        event: NavigationEvent,
        window: &BlockWindow,
    ) -> Result<(), FeedError> {
        match event {
            NavigationEvent::Forward => self.forward(window),
            NavigationEvent::Back => {
                self.back(window);
                Ok(())
            }
            NavigationEvent::Up => {
                self.move_cursor(window, |cur, _| cur.saturating_sub(1));
                Ok(())
            }
            NavigationEvent::Down => {
                self.move_cursor(window, |cur, len| (cur + 1).min(len.saturating_sub(1)));
                Ok(())
            }
            NavigationEvent::Top => {
                self.move_cursor(window, |_, _| 0);
                Ok(())
            }
            NavigationEvent::Bottom => {
                self.move_cursor(window, |_, len| len.saturating_sub(1));
                Ok(())
            }
        }
    }

    fn forward(&mut self, window: &BlockWindow) -> Result<(), FeedError> {
        match &self.state {
            NavigationState::BlockList => {
                let block = self
                    .block_cursor
                    .and_then(|i| window.get(i))
                    .ok_or(FeedError::Navigation)?;
                self.state = NavigationState::TransactionList(PaysetView::new(
                    block.round(),
                    block.payset.clone(),
                ));
                Ok(())
            }
            NavigationState::TransactionList(payset) => {
                let stxn = payset.selected().ok_or(FeedError::Navigation)?;
                let detail = DetailView::new(payset.round, payset.cursor, stxn);
                let payset = payset.clone();
                self.state = NavigationState::TransactionDetail(payset, detail);
                Ok(())
            }
            NavigationState::TransactionDetail(..) => Ok(()),
        }
    }

    fn back(&mut self, window: &BlockWindow) {
        let state = std::mem::replace(&mut self.state, NavigationState::BlockList);
        self.state = match state {
            NavigationState::BlockList => NavigationState::BlockList,
            NavigationState::TransactionList(_) => {
                self.sync(window);
                NavigationState::BlockList
            }
            NavigationState::TransactionDetail(payset, _) => {
                NavigationState::TransactionList(payset)
            }
        };
    }

    fn move_cursor(&mut self, window: &BlockWindow, step: impl Fn(usize, usize) -> usize) {
        if self.state == NavigationState::BlockList {
            if !window.is_empty() {
                let next = step(self.block_cursor.unwrap_or(0), window.len());
                self.select_block(next, window);
            }
            return;
        }
        match &mut self.state {
            NavigationState::BlockList => {}
            NavigationState::TransactionList(payset) => {
                if !payset.is_empty() {
                    payset.cursor = step(payset.cursor, payset.len());
                }
            }
            NavigationState::TransactionDetail(_, detail) => {
                detail.scroll = step(detail.scroll, detail.line_count());
            }
        }
    }
}
