//! The aggregate view model.
//!
//! [`Dashboard`] owns every component. Frontends construct it once, feed it
//! every event through [`Dashboard::deliver`] and start the tasks it returns.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::balances::AccountBalancePoller;
use crate::config::DashboardConfig;
use crate::event::{CatchupAction, Component, Event, FeedError, FetchSource, Task};
use crate::metrics::{self, DerivedMetrics, RoundTimingSample};
use crate::navigation::NavigationStateMachine;
use crate::tailer::BlockTailer;
use crate::telemetry::TelemetryPoller;
use crate::types::BlockHeader;

/// Severity of an inline notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Short non-blocking message shown in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Round timing and the header used for upgrade votes.
#[derive(Debug, Default)]
pub struct MetricsDeriver {
    timing: RoundTimingSample,
    header: Option<BlockHeader>,
}

impl MetricsDeriver {
    pub fn timing(&self) -> &RoundTimingSample {
        &self.timing
    }

    pub fn header(&self) -> Option<&BlockHeader> {
        self.header.as_ref()
    }

    /// Adopt the header of the block at the status round.
    pub fn track_header(&mut self, header: &BlockHeader) {
        if self.header.as_ref() != Some(header) {
            self.header = Some(header.clone());
        }
    }
}

impl Component for MetricsDeriver {
    fn handle(&mut self, event: &Event, _tasks: &mut Vec<Task>) {
        if let Event::StatusFetched {
            snapshot,
            observed_at,
        } = event
        {
            self.timing.observe(snapshot, *observed_at);
        }
    }
}

/// Composition of all components plus derived metrics and notices.
#[derive(Debug)]
pub struct Dashboard {
    config: DashboardConfig,
    telemetry: TelemetryPoller,
    tailer: BlockTailer,
    metrics: MetricsDeriver,
    navigation: NavigationStateMachine,
    balances: AccountBalancePoller,
    derived: Option<DerivedMetrics>,
    notices: VecDeque<Notice>,
    window_generation: u64,
}

impl Dashboard {
    /// Build the dashboard and the tasks that start every poller.
    pub fn new(config: DashboardConfig, watch_list: Vec<String>) -> (Self, Vec<Task>) {
        let mut dashboard = Self {
            telemetry: TelemetryPoller::new(&config),
            tailer: BlockTailer::new(&config),
            metrics: MetricsDeriver::default(),
            navigation: NavigationStateMachine::new(),
            balances: AccountBalancePoller::new(&config, watch_list),
            derived: None,
            notices: VecDeque::with_capacity(config.notice_capacity),
            window_generation: 0,
            config,
        };

        let mut tasks = Vec::new();
        dashboard.telemetry.start(&mut tasks);
        dashboard.balances.start(&mut tasks);
        (dashboard, tasks)
    }

    /// Apply one event and return the background tasks it calls for.
    pub fn deliver(&mut self, event: Event) -> Vec<Task> {
        let mut tasks = Vec::new();
        self.note_errors(&event);

        match &event {
            Event::Navigate(nav) => {
                if let Err(e) = self.navigation.handle(*nav, self.tailer.window()) {
                    tracing::trace!("Ignored navigation: {}", e);
                }
            }
            Event::CatchupRequested(action) => self.request_catchup(*action, &mut tasks),
            Event::CatchupFinished { action, result } => {
                if let Ok(message) = result {
                    tracing::info!("Catchup {} succeeded: {}", action.label(), message);
                    self.push_notice(
                        NoticeLevel::Info,
                        format!("Fast catchup {}: {}", action.label(), message),
                    );
                }
            }
            _ => {
                self.telemetry.handle(&event, &mut tasks);
                self.metrics.handle(&event, &mut tasks);
                self.tailer.handle(&event, &mut tasks);
                self.balances.handle(&event, &mut tasks);
            }
        }

        self.after_event();
        tasks
    }

    fn request_catchup(&mut self, action: CatchupAction, tasks: &mut Vec<Task>) {
        match self.telemetry.network().network_name() {
            Some(network) => {
                tracing::info!("Requesting fast catchup {} on {}", action.label(), network);
                tasks.push(Task::Catchup {
                    action,
                    network: network.to_string(),
                });
            }
            None => self.push_notice(
                NoticeLevel::Warning,
                "Fast catchup unavailable: network unknown".to_string(),
            ),
        }
    }

    /// Cross-component effects after every event.
    fn after_event(&mut self) {
        let window = self.tailer.window();
        if self.tailer.generation() != self.window_generation {
            self.window_generation = self.tailer.generation();
            self.navigation.reset(window);
        } else {
            self.navigation.sync(window);
        }

        let Some(status) = self.telemetry.status() else {
            return;
        };
        if let Some(block) = window.find(status.last_round) {
            self.metrics.track_header(&block.header);
        }
        self.derived = Some(metrics::derive(
            status,
            self.metrics.header(),
            self.metrics.timing(),
            self.config.default_round_time,
        ));
    }

    fn note_errors(&mut self, event: &Event) {
        let error = match event {
            Event::NetworkFailed { message } => {
                FeedError::transient(FetchSource::Network, message.clone())
            }
            Event::BalanceFailed { address, message } => FeedError::transient(
                FetchSource::Balance,
                format!("{}: {}", crate::display::truncate_middle(address, 13), message),
            ),
            Event::BlockTailed {
                result: Err(e), ..
            } => e.clone(),
            Event::BackfillFinished { results, .. } => {
                match results.iter().find_map(|(_, r)| r.as_ref().err()) {
                    Some(e) => e.clone(),
                    None => return,
                }
            }
            Event::CatchupFinished {
                result: Err(message),
                action,
            } => FeedError::transient(
                FetchSource::Catchup,
                format!("{}: {}", action.label(), message),
            ),
            _ => return,
        };
        self.push_notice(NoticeLevel::Warning, error.to_string());
    }

    fn push_notice(&mut self, level: NoticeLevel, message: String) {
        if self.notices.back().is_some_and(|n| n.message == message) {
            return;
        }
        if self.notices.len() >= self.config.notice_capacity.max(1) {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message,
            at: Utc::now(),
        });
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryPoller {
        &self.telemetry
    }

    pub fn tailer(&self) -> &BlockTailer {
        &self.tailer
    }

    pub fn metrics(&self) -> &MetricsDeriver {
        &self.metrics
    }

    pub fn derived(&self) -> Option<&DerivedMetrics> {
        self.derived.as_ref()
    }

    pub fn navigation(&self) -> &NavigationStateMachine {
        &self.navigation
    }

    pub fn balances(&self) -> &AccountBalancePoller {
        &self.balances
    }

    /// Oldest first.
    pub fn notices(&self) -> impl DoubleEndedIterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn latest_notice(&self) -> Option<&Notice> {
        self.notices.back()
    }

    /// Set once status polling has failed; the session should end.
    pub fn fatal_error(&self) -> Option<&FeedError> {
        self.telemetry.fatal()
    }

    /// Replace the watch-list, returning any tasks needed to poll it.
    pub fn set_watch_list(&mut self, watch_list: Vec<String>) -> Vec<Task> {
        let mut tasks = Vec::new();
        self.balances.set_watch_list(watch_list, &mut tasks);
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{NavigationEvent, NavigationState};
    use crate::tailer::block;
    use crate::types::{NetworkInfo, NodeStatusSnapshot, PRIMARY_ASSET, UpgradeState};
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    fn status(round: u64) -> Event {
        Event::StatusFetched {
            snapshot: NodeStatusSnapshot {
                last_round: round,
                last_version: "v1".to_string(),
                next_version: "v1".to_string(),
                ..Default::default()
            },
            observed_at: Instant::now(),
        }
    }

    fn small() -> DashboardConfig {
        DashboardConfig {
            window_size: 3,
            ..Default::default()
        }
    }

    fn backfill(d: &mut Dashboard, latest: u64, txns: usize) -> Vec<Task> {
        let results = (latest - 2..=latest)
            .rev()
            .map(|r| (r, Ok(block(r, txns))))
            .collect();
        d.deliver(Event::BackfillFinished { latest, results })
    }

    #[test]
    fn test_new_starts_pollers() {
        let (_, tasks) = Dashboard::new(DashboardConfig::default(), vec!["ADDR".to_string()]);
        assert_eq!(
            tasks,
            vec![
                Task::FetchNetwork,
                Task::PollStatus {
                    after: None,
                    delay: Duration::ZERO
                },
                Task::FetchBalances {
                    addresses: vec!["ADDR".to_string()],
                    delay: Duration::ZERO
                },
            ]
        );
    }

    #[test]
    fn test_first_status_chains_poll_and_backfill() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        let tasks = d.deliver(status(100));
        assert_eq!(
            tasks,
            vec![
                Task::PollStatus {
                    after: Some(100),
                    delay: Duration::ZERO
                },
                Task::Backfill {
                    latest: 100,
                    count: 3
                },
            ]
        );
        let derived = d.derived().unwrap();
        assert_eq!(derived.avg_round_time, Duration::from_millis(4_400));
    }

    #[test]
    fn test_backfill_resets_navigation_and_tracks_header() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        d.deliver(status(100));
        let tasks = backfill(&mut d, 100, 2);
        assert_eq!(
            tasks,
            vec![Task::TailBlock {
                round: 101,
                delay: Duration::ZERO
            }]
        );
        assert_eq!(d.tailer().window().rounds(), vec![100, 99, 98]);
        assert_eq!(d.navigation().block_cursor(), Some(0));
        assert_eq!(d.metrics().header().map(|h| h.round), Some(100));
    }

    #[test]
    fn test_drill_down_survives_tailing() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        d.deliver(status(100));
        backfill(&mut d, 100, 2);
        d.deliver(Event::Navigate(NavigationEvent::Forward));
        let frozen = d.navigation().state().clone();
        assert!(matches!(frozen, NavigationState::TransactionList(_)));

        d.deliver(Event::BlockTailed {
            round: 101,
            result: Ok(block(101, 9)),
        });
        assert_eq!(d.navigation().state(), &frozen);

        d.deliver(Event::Navigate(NavigationEvent::Back));
        assert_eq!(d.navigation().state(), &NavigationState::BlockList);
        assert_eq!(d.navigation().selected_round(), Some(101));
    }

    #[test]
    fn test_fatal_status_ends_session() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        let tasks = d.deliver(Event::StatusFailed {
            message: "connection refused".to_string(),
        });
        assert!(tasks.is_empty());
        assert_eq!(
            d.fatal_error().map(|e| e.to_string()),
            Some("Error fetching status: connection refused".to_string())
        );
    }

    #[test]
    fn test_transient_errors_become_notices() {
        let (mut d, _) = Dashboard::new(small(), vec!["ADDR".to_string()]);
        d.deliver(Event::BalanceFailed {
            address: "ADDR".to_string(),
            message: "404 Not Found".to_string(),
        });
        d.deliver(Event::NetworkFailed {
            message: "timeout".to_string(),
        });
        let messages: Vec<&str> = d.notices().map(|n| n.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Failed to fetch balance: ADDR: 404 Not Found",
                "Failed to fetch network info: timeout"
            ]
        );
        assert!(d.fatal_error().is_none());
    }

    #[test]
    fn test_notices_bounded() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        for i in 0..20 {
            d.deliver(Event::NetworkFailed {
                message: format!("err {}", i),
            });
        }
        assert_eq!(d.notices().count(), 5);
        assert_eq!(
            d.latest_notice().map(|n| n.message.as_str()),
            Some("Failed to fetch network info: err 19")
        );
    }

    #[test]
    fn test_catchup_requires_network() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        let tasks = d.deliver(Event::CatchupRequested(CatchupAction::Start));
        assert!(tasks.is_empty());
        assert_eq!(d.latest_notice().map(|n| n.level), Some(NoticeLevel::Warning));

        d.deliver(Event::NetworkFetched(NetworkInfo {
            genesis_id: "mainnet-v1.0".to_string(),
            ..Default::default()
        }));
        let tasks = d.deliver(Event::CatchupRequested(CatchupAction::Stop));
        assert_eq!(
            tasks,
            vec![Task::Catchup {
                action: CatchupAction::Stop,
                network: "mainnet".to_string()
            }]
        );
    }

    #[test]
    fn test_balance_cycle_through_dashboard() {
        let (mut d, _) = Dashboard::new(small(), vec!["ADDR".to_string()]);
        for amount in [1_000_000, 1_000_000, 1_200_000] {
            d.deliver(Event::BalanceFetched {
                address: "ADDR".to_string(),
                balances: BTreeMap::from([(PRIMARY_ASSET, amount)]),
                fetched_at: Utc::now(),
            });
        }
        let history: Vec<u64> = d
            .balances()
            .record("ADDR")
            .unwrap()
            .history
            .iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(history, vec![1_200_000, 1_000_000]);

        let tasks = d.deliver(Event::BalanceCycleFinished);
        assert_eq!(
            tasks,
            vec![Task::FetchBalances {
                addresses: vec!["ADDR".to_string()],
                delay: Duration::from_secs(5)
            }]
        );
    }

    #[test]
    fn test_voting_outlook_from_tailed_header() {
        let (mut d, _) = Dashboard::new(small(), vec![]);
        d.deliver(status(100));
        let mut results: Vec<_> = (98..=100).rev().map(|r| (r, Ok(block(r, 0)))).collect();
        if let Some((_, Ok(b))) = results.first_mut() {
            b.header.upgrade = UpgradeState {
                next_protocol: "https://example.com/specs/v99".to_string(),
                next_protocol_approvals: 50,
                next_protocol_vote_before: 9_000,
                next_protocol_switch_on: 10_000,
            };
        }
        d.deliver(Event::BackfillFinished {
            latest: 100,
            results,
        });
        match &d.derived().unwrap().upgrade {
            metrics::UpgradeOutlook::Voting { vote, .. } => {
                assert_eq!(vote.votes_to_go, 8_900);
                assert_eq!(vote.votes_cast, 1_100);
                assert_eq!(vote.yes, 50);
            }
            other => panic!("unexpected outlook {:?}", other),
        }
    }
}
