//! Events, background tasks and the component seam.
//!
//! Background work is described by [`Task`] values; whoever runs a task posts
//! its outcome back as an [`Event`]. Components never perform I/O themselves.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::navigation::NavigationEvent;
use crate::types::{Block, NetworkInfo, NodeStatusSnapshot, Round};

/// Which collaborator a transient failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Balance,
    Block,
    Catchup,
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchSource::Network => write!(f, "network info"),
            FetchSource::Balance => write!(f, "balance"),
            FetchSource::Block => write!(f, "block"),
            FetchSource::Catchup => write!(f, "catchup"),
        }
    }
}

/// Errors carried as data inside events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Status polling failed. Ends the session.
    #[error("Error fetching status: {0}")]
    FatalStatus(String),

    /// A single non-status request failed; the owning poller recovers on its own cadence.
    #[error("Failed to fetch {origin}: {message}")]
    TransientFetch { origin: FetchSource, message: String },

    /// A block could not be decoded even leniently.
    #[error("Failed to decode block {round}: {message}")]
    Decode { round: Round, message: String },

    /// Forward requested without a valid selection.
    #[error("Nothing selected")]
    Navigation,
}

impl FeedError {
    pub fn transient(origin: FetchSource, message: impl Into<String>) -> Self {
        FeedError::TransientFetch {
            origin,
            message: message.into(),
        }
    }
}

/// Outcome of fetching and decoding one round.
pub type BlockFetch = Result<Block, FeedError>;

/// Admin catchup toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchupAction {
    Start,
    Stop,
}

impl CatchupAction {
    pub fn label(&self) -> &'static str {
        match self {
            CatchupAction::Start => "start",
            CatchupAction::Stop => "abort",
        }
    }
}

/// Everything that can change dashboard state.
#[derive(Debug, Clone)]
pub enum Event {
    StatusFetched {
        snapshot: NodeStatusSnapshot,
        observed_at: Instant,
    },
    StatusFailed {
        message: String,
    },
    NetworkFetched(NetworkInfo),
    NetworkFailed {
        message: String,
    },
    /// Result of the initial backfill, newest round first.
    BackfillFinished {
        latest: Round,
        results: Vec<(Round, BlockFetch)>,
    },
    BlockTailed {
        round: Round,
        result: BlockFetch,
    },
    BalanceFetched {
        address: String,
        balances: BTreeMap<u64, u64>,
        fetched_at: DateTime<Utc>,
    },
    BalanceFailed {
        address: String,
        message: String,
    },
    /// Every address of the current cycle has reported.
    BalanceCycleFinished,
    CatchupRequested(CatchupAction),
    CatchupFinished {
        action: CatchupAction,
        result: Result<String, String>,
    },
    Navigate(NavigationEvent),
}

/// Background work requested by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Fetch network identity once.
    FetchNetwork,
    /// Fetch status after `delay`. With `after` set, long-poll until a round
    /// later than `after` exists.
    PollStatus {
        after: Option<Round>,
        delay: Duration,
    },
    /// Fetch rounds `latest - count + 1 ..= latest`, newest first.
    Backfill { latest: Round, count: usize },
    /// Wait until `round` exists, then fetch and decode it.
    TailBlock { round: Round, delay: Duration },
    /// Fetch balances for each address after `delay`.
    FetchBalances {
        addresses: Vec<String>,
        delay: Duration,
    },
    Catchup {
        action: CatchupAction,
        network: String,
    },
}

/// A unit of dashboard state driven by events.
pub trait Component {
    /// Apply `event`, pushing any follow-up work onto `tasks`.
    fn handle(&mut self, event: &Event, tasks: &mut Vec<Task>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_messages() {
        assert_eq!(
            FeedError::FatalStatus("connection refused".to_string()).to_string(),
            "Error fetching status: connection refused"
        );
        assert_eq!(
            FeedError::transient(FetchSource::Balance, "timeout").to_string(),
            "Failed to fetch balance: timeout"
        );
        assert_eq!(
            FeedError::Decode {
                round: 7,
                message: "eof".to_string()
            }
            .to_string(),
            "Failed to decode block 7: eof"
        );
    }

    #[test]
    fn test_catchup_action_labels() {
        assert_eq!(CatchupAction::Start.label(), "start");
        assert_eq!(CatchupAction::Stop.label(), "abort");
    }
}
