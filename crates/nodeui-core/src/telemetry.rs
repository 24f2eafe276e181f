//! Self-chaining status poller and one-shot network identity fetch.

use std::time::Duration;

use crate::config::DashboardConfig;
use crate::event::{Component, Event, FeedError, Task};
use crate::types::{NetworkInfo, NodeStatusSnapshot};

/// Keeps the latest status snapshot and network identity.
///
/// At most one status request is outstanding. The next one is scheduled
/// only when the previous one resolves. A status failure stops polling.
#[derive(Debug)]
pub struct TelemetryPoller {
    status: Option<NodeStatusSnapshot>,
    network: NetworkInfo,
    network_warning: Option<FeedError>,
    fatal: Option<FeedError>,
    poll_outstanding: bool,
    catchup_refresh: Duration,
}

impl TelemetryPoller {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            status: None,
            network: NetworkInfo::default(),
            network_warning: None,
            fatal: None,
            poll_outstanding: false,
            catchup_refresh: config.catchup_refresh,
        }
    }

    /// Issue the network fetch and the first status poll.
    pub fn start(&mut self, tasks: &mut Vec<Task>) {
        tasks.push(Task::FetchNetwork);
        self.poll_outstanding = true;
        tasks.push(Task::PollStatus {
            after: None,
            delay: Duration::ZERO,
        });
    }

    pub fn status(&self) -> Option<&NodeStatusSnapshot> {
        self.status.as_ref()
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    pub fn network_warning(&self) -> Option<&FeedError> {
        self.network_warning.as_ref()
    }

    pub fn fatal(&self) -> Option<&FeedError> {
        self.fatal.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_outstanding
    }

    /// Next poll: a long-poll on the last round, or a short plain poll while
    /// a catchpoint is running since rounds do not advance then.
    fn next_poll(&self, snapshot: &NodeStatusSnapshot) -> Task {
        if snapshot.catchpoint_active() {
            Task::PollStatus {
                after: None,
                delay: self.catchup_refresh,
            }
        } else {
            Task::PollStatus {
                after: Some(snapshot.last_round),
                delay: Duration::ZERO,
            }
        }
    }
}

impl Component for TelemetryPoller {
    fn handle(&mut self, event: &Event, tasks: &mut Vec<Task>) {
        match event {
            Event::StatusFetched { snapshot, .. } => {
                if self.fatal.is_some() {
                    return;
                }
                if self.status.as_ref().is_none_or(|s| s.last_round != snapshot.last_round) {
                    tracing::debug!("Status at round {}", snapshot.last_round);
                }
                self.status = Some(snapshot.clone());
                let next = self.next_poll(snapshot);
                self.poll_outstanding = true;
                tasks.push(next);
            }
            Event::StatusFailed { message } => {
                tracing::error!("Status polling failed: {}", message);
                self.poll_outstanding = false;
                self.fatal = Some(FeedError::FatalStatus(message.clone()));
            }
            Event::NetworkFetched(info) => {
                tracing::info!("Connected to {} ({})", info.genesis_id, info.node_version);
                self.network = info.clone();
                self.network_warning = None;
            }
            Event::NetworkFailed { message } => {
                tracing::warn!("Failed to fetch network info: {}", message);
                self.network_warning = Some(FeedError::transient(
                    crate::event::FetchSource::Network,
                    message.clone(),
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fetched(snapshot: NodeStatusSnapshot) -> Event {
        Event::StatusFetched {
            snapshot,
            observed_at: Instant::now(),
        }
    }

    #[test]
    fn test_start_issues_network_and_status() {
        let mut poller = TelemetryPoller::new(&DashboardConfig::default());
        let mut tasks = Vec::new();
        poller.start(&mut tasks);
        assert_eq!(
            tasks,
            vec![
                Task::FetchNetwork,
                Task::PollStatus {
                    after: None,
                    delay: Duration::ZERO
                }
            ]
        );
        assert!(poller.is_polling());
    }

    #[test]
    fn test_status_chains_long_poll() {
        let mut poller = TelemetryPoller::new(&DashboardConfig::default());
        let mut tasks = Vec::new();
        poller.handle(
            &fetched(NodeStatusSnapshot {
                last_round: 42,
                ..Default::default()
            }),
            &mut tasks,
        );
        assert_eq!(poller.status().map(|s| s.last_round), Some(42));
        assert_eq!(
            tasks,
            vec![Task::PollStatus {
                after: Some(42),
                delay: Duration::ZERO
            }]
        );
    }

    #[test]
    fn test_catchpoint_uses_short_refresh() {
        let mut poller = TelemetryPoller::new(&DashboardConfig::default());
        let mut tasks = Vec::new();
        poller.handle(
            &fetched(NodeStatusSnapshot {
                last_round: 42,
                catchpoint: "20000#ABCD".to_string(),
                ..Default::default()
            }),
            &mut tasks,
        );
        assert_eq!(
            tasks,
            vec![Task::PollStatus {
                after: None,
                delay: Duration::from_millis(100)
            }]
        );
    }

    #[test]
    fn test_failure_is_fatal_and_stops_polling() {
        let mut poller = TelemetryPoller::new(&DashboardConfig::default());
        let mut tasks = Vec::new();
        poller.handle(
            &Event::StatusFailed {
                message: "connection refused".to_string(),
            },
            &mut tasks,
        );
        assert!(tasks.is_empty());
        assert!(!poller.is_polling());
        assert!(matches!(poller.fatal(), Some(FeedError::FatalStatus(_))));

        // A late success does not restart polling.
        poller.handle(&fetched(NodeStatusSnapshot::default()), &mut tasks);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_network_failure_is_warning() {
        let mut poller = TelemetryPoller::new(&DashboardConfig::default());
        let mut tasks = Vec::new();
        poller.handle(
            &Event::NetworkFailed {
                message: "timeout".to_string(),
            },
            &mut tasks,
        );
        assert!(tasks.is_empty());
        assert!(poller.fatal().is_none());
        assert!(poller.network_warning().is_some());
        assert_eq!(poller.network(), &NetworkInfo::default());
    }
}
