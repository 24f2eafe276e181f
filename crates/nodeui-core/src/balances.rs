//! Periodic balance polling for a watch-list of addresses.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use crate::config::DashboardConfig;
use crate::event::{Component, Event, Task};
use crate::types::{MicroUnits, PRIMARY_ASSET};

/// One distinct primary-balance reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceReading {
    pub amount: MicroUnits,
    pub at: DateTime<Utc>,
}

/// Balances and recent history for one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalanceRecord {
    /// Asset id to amount; id 0 is the native asset.
    pub balances: BTreeMap<u64, u64>,
    /// Newest first.
    pub history: VecDeque<BalanceReading>,
    /// Last fetch error, cleared on the next success.
    pub error: Option<String>,
}

impl AccountBalanceRecord {
    pub fn primary(&self) -> Option<MicroUnits> {
        self.balances.get(&PRIMARY_ASSET).copied()
    }

    /// Asset balances other than the native one.
    pub fn assets(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.balances
            .iter()
            .filter(|(id, _)| **id != PRIMARY_ASSET)
            .map(|(id, amount)| (*id, *amount))
    }

    /// Store a fresh reading. History only grows when the primary balance
    /// differs from the newest entry. Returns true if history changed.
    pub fn record(
        &mut self,
        balances: BTreeMap<u64, u64>,
        at: DateTime<Utc>,
        depth: usize,
    ) -> bool {
        let primary = balances.get(&PRIMARY_ASSET).copied().unwrap_or_default();
        self.balances = balances;
        self.error = None;

        if self.history.front().is_some_and(|r| r.amount == primary) {
            return false;
        }
        self.history.push_front(BalanceReading {
            amount: primary,
            at,
        });
        self.history.truncate(depth);
        true
    }
}

/// Polls every watched address on a fixed interval.
#[derive(Debug)]
pub struct AccountBalancePoller {
    watch_list: Vec<String>,
    records: HashMap<String, AccountBalanceRecord>,
    interval: Duration,
    history_depth: usize,
    cycle_in_flight: bool,
}

impl AccountBalancePoller {
    pub fn new(config: &DashboardConfig, watch_list: Vec<String>) -> Self {
        Self {
            watch_list: dedup(watch_list),
            records: HashMap::new(),
            interval: config.balance_interval,
            history_depth: config.history_depth.max(1),
            cycle_in_flight: false,
        }
    }

    /// Kick off the first cycle.
    pub fn start(&mut self, tasks: &mut Vec<Task>) {
        self.schedule(Duration::ZERO, tasks);
    }

    pub fn watch_list(&self) -> &[String] {
        &self.watch_list
    }

    pub fn is_watched(&self, address: &str) -> bool {
        self.watch_list.iter().any(|a| a == address)
    }

    pub fn record(&self, address: &str) -> Option<&AccountBalanceRecord> {
        self.records.get(address)
    }

    /// Records ordered by address, for stable rendering.
    pub fn sorted_snapshot(&self) -> Vec<(&str, &AccountBalanceRecord)> {
        let mut rows: Vec<_> = self
            .records
            .iter()
            .map(|(address, record)| (address.as_str(), record))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Replace the watch-list. Records for addresses still watched are kept.
    pub fn set_watch_list(&mut self, watch_list: Vec<String>, tasks: &mut Vec<Task>) {
        self.watch_list = dedup(watch_list);
        let watched = &self.watch_list;
        self.records.retain(|address, _| watched.contains(address));
        if !self.cycle_in_flight {
            self.schedule(Duration::ZERO, tasks);
        }
    }

    fn schedule(&mut self, delay: Duration, tasks: &mut Vec<Task>) {
        if self.watch_list.is_empty() {
            return;
        }
        self.cycle_in_flight = true;
        tasks.push(Task::FetchBalances {
            addresses: self.watch_list.clone(),
            delay,
        });
    }
}

fn dedup(list: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(list.len());
    for address in list {
        let address = address.trim().to_string();
        if !address.is_empty() && !out.contains(&address) {
            out.push(address);
        }
    }
    out
}

impl Component for AccountBalancePoller {
    fn handle(&mut self, event: &Event, tasks: &mut Vec<Task>) {
        match event {
            Event::BalanceFetched {
                address,
                balances,
                fetched_at,
            } => {
                if !self.is_watched(address) {
                    tracing::debug!("Discarding balance for unwatched address {}", address);
                    return;
                }
                let depth = self.history_depth;
                let changed = self.records.entry(address.clone()).or_default().record(
                    balances.clone(),
                    *fetched_at,
                    depth,
                );
                if changed {
                    tracing::debug!("Balance changed for {}", address);
                }
            }
            Event::BalanceFailed { address, message } => {
                if self.is_watched(address) {
                    self.records.entry(address.clone()).or_default().error = Some(message.clone());
                }
            }
            Event::BalanceCycleFinished => {
                self.cycle_in_flight = false;
                self.schedule(self.interval, tasks);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ADDR_A: &str = "AAAA";
    const ADDR_B: &str = "BBBB";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn fetched(address: &str, amount: u64, secs: i64) -> Event {
        Event::BalanceFetched {
            address: address.to_string(),
            balances: BTreeMap::from([(PRIMARY_ASSET, amount)]),
            fetched_at: at(secs),
        }
    }

    fn poller(list: &[&str]) -> AccountBalancePoller {
        AccountBalancePoller::new(
            &DashboardConfig::default(),
            list.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_unchanged_balance_not_added_to_history() {
        let mut p = poller(&[ADDR_A]);
        let mut tasks = Vec::new();
        p.handle(&fetched(ADDR_A, 1_000_000, 0), &mut tasks);
        p.handle(&fetched(ADDR_A, 1_000_000, 5), &mut tasks);
        assert_eq!(p.record(ADDR_A).unwrap().history.len(), 1);

        p.handle(&fetched(ADDR_A, 1_200_000, 10), &mut tasks);
        let amounts: Vec<u64> = p
            .record(ADDR_A)
            .unwrap()
            .history
            .iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(amounts, vec![1_200_000, 1_000_000]);
    }

    #[test]
    fn test_history_capped_at_depth() {
        let mut p = poller(&[ADDR_A]);
        let mut tasks = Vec::new();
        for (i, amount) in [1, 2, 3, 4, 5].into_iter().enumerate() {
            p.handle(&fetched(ADDR_A, amount, i as i64), &mut tasks);
        }
        let record = p.record(ADDR_A).unwrap();
        assert_eq!(record.history.len(), 3);
        assert_eq!(record.history[0].amount, 5);
        assert_eq!(record.history[0].at, at(4));
    }

    #[test]
    fn test_asset_only_change_updates_balances() {
        let mut p = poller(&[ADDR_A]);
        let mut tasks = Vec::new();
        p.handle(&fetched(ADDR_A, 100, 0), &mut tasks);
        p.handle(
            &Event::BalanceFetched {
                address: ADDR_A.to_string(),
                balances: BTreeMap::from([(PRIMARY_ASSET, 100), (31566704, 5)]),
                fetched_at: at(5),
            },
            &mut tasks,
        );
        let record = p.record(ADDR_A).unwrap();
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.assets().collect::<Vec<_>>(), vec![(31566704, 5)]);
    }

    #[test]
    fn test_unwatched_result_discarded() {
        let mut p = poller(&[ADDR_A]);
        let mut tasks = Vec::new();
        p.handle(&fetched(ADDR_B, 1, 0), &mut tasks);
        assert!(p.record(ADDR_B).is_none());
    }

    #[test]
    fn test_failure_isolated_per_address() {
        let mut p = poller(&[ADDR_A, ADDR_B]);
        let mut tasks = Vec::new();
        p.handle(
            &Event::BalanceFailed {
                address: ADDR_A.to_string(),
                message: "404".to_string(),
            },
            &mut tasks,
        );
        p.handle(&fetched(ADDR_B, 7, 0), &mut tasks);
        assert_eq!(p.record(ADDR_A).unwrap().error.as_deref(), Some("404"));
        assert_eq!(p.record(ADDR_B).unwrap().primary(), Some(7));

        p.handle(&fetched(ADDR_A, 9, 1), &mut tasks);
        assert!(p.record(ADDR_A).unwrap().error.is_none());
    }

    #[test]
    fn test_cycle_reschedules_after_interval() {
        let mut p = poller(&[ADDR_B, ADDR_A, ADDR_A]);
        let mut tasks = Vec::new();
        p.start(&mut tasks);
        assert_eq!(
            tasks,
            vec![Task::FetchBalances {
                addresses: vec![ADDR_B.to_string(), ADDR_A.to_string()],
                delay: Duration::ZERO,
            }]
        );

        tasks.clear();
        p.handle(&Event::BalanceCycleFinished, &mut tasks);
        assert_eq!(
            tasks,
            vec![Task::FetchBalances {
                addresses: vec![ADDR_B.to_string(), ADDR_A.to_string()],
                delay: Duration::from_secs(5),
            }]
        );
    }

    #[test]
    fn test_empty_watch_list_never_schedules() {
        let mut p = poller(&[]);
        let mut tasks = Vec::new();
        p.start(&mut tasks);
        p.handle(&Event::BalanceCycleFinished, &mut tasks);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_set_watch_list_drops_old_records() {
        let mut p = poller(&[ADDR_A, ADDR_B]);
        let mut tasks = Vec::new();
        p.start(&mut tasks);
        p.handle(&fetched(ADDR_A, 1, 0), &mut tasks);
        p.handle(&fetched(ADDR_B, 2, 0), &mut tasks);

        tasks.clear();
        p.set_watch_list(vec![ADDR_B.to_string()], &mut tasks);
        assert!(p.record(ADDR_A).is_none());
        assert!(p.record(ADDR_B).is_some());
        // A cycle is still running, so nothing new is scheduled.
        assert!(tasks.is_empty());

        // Late result for the dropped address is ignored.
        p.handle(&fetched(ADDR_A, 3, 1), &mut tasks);
        assert!(p.record(ADDR_A).is_none());
    }

    #[test]
    fn test_sorted_snapshot_is_ordered() {
        let mut p = poller(&["ZZZ", "MMM", "AAA"]);
        let mut tasks = Vec::new();
        for address in ["ZZZ", "MMM", "AAA"] {
            p.handle(&fetched(address, 1, 0), &mut tasks);
        }
        let keys: Vec<&str> = p.sorted_snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["AAA", "MMM", "ZZZ"]);
    }
}
