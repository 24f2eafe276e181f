//! Core state and derivations for a live node dashboard.
//!
//! This crate provides:
//! - Domain types for node status, blocks and transactions (`types` module)
//! - Round timing, catchup progress and upgrade vote metrics (`metrics` module)
//! - The event/task seam shared with the I/O layer (`event` module)
//! - Telemetry, block tailing, balances and navigation components
//! - The [`Dashboard`] aggregate that wires them together
//!
//! No module here performs I/O. With the `config` feature enabled the
//! `config` module can also load the on-disk settings file.

pub mod balances;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod event;
pub mod metrics;
pub mod navigation;
pub mod tailer;
pub mod telemetry;
pub mod types;

pub use balances::{AccountBalancePoller, AccountBalanceRecord, BalanceReading};
pub use config::{AppConfig, DashboardConfig};
pub use dashboard::{Dashboard, MetricsDeriver, Notice, NoticeLevel};
pub use display::*;
pub use event::{BlockFetch, CatchupAction, Component, Event, FeedError, FetchSource, Task};
pub use metrics::{
    CatchupPhase, CatchupProgress, DerivedMetrics, UPGRADE_VOTE_THRESHOLD, UPGRADE_VOTE_WINDOW,
    UpgradeOutlook, UpgradeVote,
};
pub use navigation::{
    DetailView, NavigationEvent, NavigationState, NavigationStateMachine, PaysetView,
};
pub use tailer::{BlockTailer, BlockWindow};
pub use telemetry::TelemetryPoller;
pub use types::*;

#[cfg(feature = "config")]
pub use config::{ConfigError, load_config};
