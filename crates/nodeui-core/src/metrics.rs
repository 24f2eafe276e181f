//! Display metrics derived from status snapshots and block headers.
//!
//! Everything here is a pure function of its inputs except
//! [`RoundTimingSample`], which keeps the two endpoints of the round-time
//! estimate.

use std::time::{Duration, Instant};

use crate::types::{BlockHeader, NodeStatusSnapshot, Round};

/// Rounds in one protocol upgrade voting window.
pub const UPGRADE_VOTE_WINDOW: u64 = 10_000;

/// Approvals needed within the window for an upgrade to pass.
pub const UPGRADE_VOTE_THRESHOLD: u64 = 9_000;

/// Round time assumed until two distinct rounds have been seen.
pub const DEFAULT_ROUND_TIME: Duration = Duration::from_millis(4_400);

/// Display granularity for durations.
pub const DISPLAY_GRANULARITY: Duration = Duration::from_millis(100);

/// Endpoints used to estimate average round production time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundTimingSample {
    start: Option<(Round, Instant)>,
    latest: Option<(Round, Instant)>,
}

impl RoundTimingSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status observation. The round's production time is
    /// `observed_at - time_since_last_round`. Only strictly higher rounds
    /// move the sample. Returns true if it moved.
    pub fn observe(&mut self, snapshot: &NodeStatusSnapshot, observed_at: Instant) -> bool {
        let round = snapshot.last_round;
        if self.latest.is_some_and(|(latest, _)| round <= latest) {
            return false;
        }
        let produced_at = observed_at
            .checked_sub(snapshot.time_since_last_round)
            .unwrap_or(observed_at);
        if self.start.is_none() {
            self.start = Some((round, produced_at));
        }
        self.latest = Some((round, produced_at));
        true
    }

    pub fn start_round(&self) -> Option<Round> {
        self.start.map(|(r, _)| r)
    }

    pub fn latest_round(&self) -> Option<Round> {
        self.latest.map(|(r, _)| r)
    }

    /// Exact average round time, or `default` with fewer than two rounds.
    pub fn average_round_time(&self, default: Duration) -> Duration {
        match (self.start, self.latest) {
            (Some((start_round, start_time)), Some((latest_round, latest_time)))
                if latest_round > start_round =>
            {
                let rounds = latest_round - start_round;
                let elapsed = latest_time.saturating_duration_since(start_time);
                let nanos = elapsed.as_nanos() / u128::from(rounds);
                Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
            }
            _ => default,
        }
    }
}

/// Round a duration to the nearest display granularity (a tenth of a second).
pub fn round_to_display(d: Duration) -> Duration {
    let step = DISPLAY_GRANULARITY.as_nanos();
    let rounded = (d.as_nanos() + step / 2) / step * step;
    Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
}

/// Active stage of a catchpoint catchup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatchupPhase {
    #[default]
    Idle,
    DownloadingAccounts,
    ProcessingAccounts,
    DownloadingBlocks,
}

impl CatchupPhase {
    pub fn label(&self) -> &'static str {
        match self {
            CatchupPhase::Idle => "",
            CatchupPhase::DownloadingAccounts => "Downloading accounts",
            CatchupPhase::ProcessingAccounts => "Processing accounts",
            CatchupPhase::DownloadingBlocks => "Downloading blocks",
        }
    }
}

/// Catchup phase and progress fractions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CatchupProgress {
    pub phase: CatchupPhase,
    pub processed_pct: f64,
    pub verified_pct: f64,
    pub acquired_pct: f64,
}

fn fraction(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64).clamp(0.0, 1.0)
}

impl CatchupProgress {
    /// Derive progress from cumulative catchpoint counters.
    ///
    /// Once block download starts both account fractions are pinned to 1.0
    /// regardless of the account counters.
    pub fn from_snapshot(status: &NodeStatusSnapshot) -> Self {
        let phase = if status.catchpoint_acquired_blocks > 0 {
            CatchupPhase::DownloadingBlocks
        } else if status.catchpoint_verified_accounts > 0 {
            CatchupPhase::ProcessingAccounts
        } else if status.catchpoint_processed_accounts > 0 {
            CatchupPhase::DownloadingAccounts
        } else {
            CatchupPhase::Idle
        };

        let mut progress = CatchupProgress {
            phase,
            ..Default::default()
        };

        if status.catchpoint_total_accounts > 0 {
            progress.processed_pct = fraction(
                status.catchpoint_processed_accounts,
                status.catchpoint_total_accounts,
            );
            progress.verified_pct = fraction(
                status.catchpoint_verified_accounts,
                status.catchpoint_total_accounts,
            );
        }
        if status.catchpoint_total_blocks > 0 || status.catchpoint_acquired_blocks > 0 {
            progress.processed_pct = 1.0;
            progress.verified_pct = 1.0;
            progress.acquired_pct = fraction(
                status.catchpoint_acquired_blocks,
                status.catchpoint_total_blocks,
            );
        }
        progress
    }
}

/// Tally of an open protocol upgrade vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeVote {
    pub vote_before: Round,
    pub votes_to_go: u64,
    pub votes_cast: u64,
    pub yes: u64,
    pub no: u64,
    /// `yes / votes_cast`, zero while nothing has been cast.
    pub yes_pct: f64,
    /// Fraction of the voting window already elapsed.
    pub window_pct: f64,
    pub time_to_close: Duration,
}

impl UpgradeVote {
    /// Tally the vote at `last_round`. Counters are clamped so that
    /// `yes + no == votes_cast` and `votes_cast + votes_to_go == UPGRADE_VOTE_WINDOW`
    /// hold even for headers from an earlier or later round.
    pub fn tally(header: &BlockHeader, last_round: Round, avg_round_time: Duration) -> Self {
        let upgrade = &header.upgrade;
        let votes_to_go = upgrade
            .next_protocol_vote_before
            .saturating_sub(last_round)
            .min(UPGRADE_VOTE_WINDOW);
        let votes_cast = UPGRADE_VOTE_WINDOW - votes_to_go;
        let yes = upgrade.next_protocol_approvals.min(votes_cast);
        let no = votes_cast - yes;
        let yes_pct = if votes_cast == 0 {
            0.0
        } else {
            yes as f64 / votes_cast as f64
        };

        Self {
            vote_before: upgrade.next_protocol_vote_before,
            votes_to_go,
            votes_cast,
            yes,
            no,
            yes_pct,
            window_pct: votes_cast as f64 / UPGRADE_VOTE_WINDOW as f64,
            time_to_close: rounds_to_duration(votes_to_go, avg_round_time),
        }
    }

    /// True once approvals have reached the threshold.
    pub fn passing(&self) -> bool {
        self.yes >= UPGRADE_VOTE_THRESHOLD
    }
}

/// Protocol upgrade situation shown in the status pane.
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeOutlook {
    /// Current and next protocol are the same.
    None { protocol: String },
    /// The latest header carries an open vote.
    Voting {
        next_protocol: String,
        vote: UpgradeVote,
    },
    /// The vote passed and the switch round is known.
    Scheduled {
        current: String,
        next: String,
        round: Round,
        rounds_to_go: u64,
        eta: Duration,
    },
}

impl UpgradeOutlook {
    pub fn derive(
        status: &NodeStatusSnapshot,
        header: Option<&BlockHeader>,
        avg_round_time: Duration,
    ) -> Self {
        if let Some(header) = header
            && header.upgrade.is_voting()
        {
            return UpgradeOutlook::Voting {
                next_protocol: header.upgrade.next_protocol.clone(),
                vote: UpgradeVote::tally(header, status.last_round, avg_round_time),
            };
        }
        if status.last_version == status.next_version {
            return UpgradeOutlook::None {
                protocol: status.last_version.clone(),
            };
        }
        let rounds_to_go = status.next_version_round.saturating_sub(status.last_round);
        UpgradeOutlook::Scheduled {
            current: status.last_version.clone(),
            next: status.next_version.clone(),
            round: status.next_version_round,
            rounds_to_go,
            eta: rounds_to_duration(rounds_to_go, avg_round_time),
        }
    }
}

/// Projected wall time for `rounds` rounds, rounded for display.
pub fn rounds_to_duration(rounds: u64, avg_round_time: Duration) -> Duration {
    let nanos = avg_round_time.as_nanos().saturating_mul(u128::from(rounds));
    round_to_display(Duration::from_nanos(
        u64::try_from(nanos).unwrap_or(u64::MAX),
    ))
}

/// Everything the status pane needs, recomputed after each event.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub avg_round_time: Duration,
    pub catchup: Option<CatchupProgress>,
    pub upgrade: UpgradeOutlook,
}

/// Recompute all derived metrics.
pub fn derive(
    status: &NodeStatusSnapshot,
    header: Option<&BlockHeader>,
    timing: &RoundTimingSample,
    default_round_time: Duration,
) -> DerivedMetrics {
    let avg_round_time = round_to_display(timing.average_round_time(default_round_time));
    let catchup = status
        .catchpoint_active()
        .then(|| CatchupProgress::from_snapshot(status));
    DerivedMetrics {
        avg_round_time,
        catchup,
        upgrade: UpgradeOutlook::derive(status, header, avg_round_time),
    }
}
