//! Algorand node UI: a terminal dashboard for a running algod node.

mod action;
mod app;
mod event;
mod log_buffer;
mod theme;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action::Action;
use app::App;
use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use event::{Event, EventHandler};
use log_buffer::{LogBuffer, LogBufferLayer};
use nodeui_client::{
    AlgodClient, EVENT_CHANNEL_CAPACITY, JsonBlockCodec, NodeEndpoint, TaskRunner,
    TelemetrySource, validate_addresses,
};
use nodeui_core::{Dashboard, DashboardConfig, format_duration, load_config};
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tui::Tui;

const TICK_RATE: Duration = Duration::from_millis(250);

/// Terminal dashboard for an Algorand node.
#[derive(Parser, Debug)]
#[command(name = "node-ui")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Algod REST endpoint, e.g. http://localhost:8080
    #[arg(short = 'u', long = "algod-url", env = "ALGOD_URL")]
    algod_url: Option<String>,

    /// Algod API token
    #[arg(short = 't', long = "algod-token", env = "ALGOD_TOKEN")]
    algod_token: Option<String>,

    /// Node data directory; reads algod.net, algod.token and algod.admin.token
    #[arg(short = 'd', long = "algod-data-dir", env = "ALGORAND_DATA")]
    algod_data_dir: Option<PathBuf>,

    /// Comma separated addresses whose balances are shown in the accounts tab
    #[arg(short = 'w', long = "watch-list", env = "WATCH_LIST", value_delimiter = ',')]
    watch_list: Vec<String>,

    /// Number of recent blocks kept in the explorer
    #[arg(long)]
    window_size: Option<usize>,

    /// Print node status once and exit.
    #[arg(long)]
    once: bool,

    /// Log to stderr instead of the log pane.
    #[arg(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    let log_buffer = LogBuffer::new();

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("node_ui=info".parse()?)
        .add_directive("nodeui_client=info".parse()?)
        .add_directive("nodeui_core=info".parse()?);

    if args.once || args.log_stderr {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(LogBufferLayer::new(log_buffer.clone()))
            .init();
    }

    let app_config = load_config().unwrap_or_else(|e| {
        tracing::warn!("Using default settings: {}", e);
        Default::default()
    });
    let mut config = app_config.apply(DashboardConfig::default());
    if let Some(size) = args.window_size.filter(|n| *n > 0) {
        config.window_size = size;
    }
    let watch_list = if args.watch_list.is_empty() {
        app_config.watch_list.clone()
    } else {
        args.watch_list.clone()
    };
    let watch_list: Vec<String> = watch_list
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    validate_addresses(&watch_list)?;

    let endpoint = NodeEndpoint::resolve(
        args.algod_url.as_deref(),
        args.algod_token.as_deref(),
        args.algod_data_dir.as_deref(),
    )?;
    let node_config = endpoint.node_config();
    let client = AlgodClient::new(endpoint, config.long_poll_client_timeout)?;

    if args.once {
        return print_status(&client).await;
    }

    // Must run before raw mode.
    let theme = theme::Theme::detect();

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let runner = TaskRunner::new(Arc::new(client), Arc::new(JsonBlockCodec), event_tx);

    let (mut dashboard, start_tasks) = Dashboard::new(config, watch_list);
    let mut app = App::new(theme, log_buffer, node_config);

    let mut tui = Tui::new()?;
    tui.enter()?;
    let mut events = EventHandler::new(TICK_RATE, runner.cancel_token());

    runner.spawn_all(start_tasks);
    tracing::info!("Dashboard started");

    let outcome = loop {
        tui.draw(|frame| ui::render(frame, &app, &dashboard))?;

        tokio::select! {
            event = events.next() => {
                match event? {
                    Event::Tick => app.tick(),
                    Event::Resize => {}
                    Event::Key(key) => match app.handle_key(key) {
                        Some(Action::Quit) => break Ok(()),
                        Some(action) => {
                            if let Some(event) = action.into_event() {
                                let tasks = dashboard.deliver(event);
                                runner.spawn_all(tasks);
                            }
                        }
                        None => {}
                    },
                }
            }
            Some(event) = event_rx.recv() => {
                let tasks = dashboard.deliver(event);
                runner.spawn_all(tasks);
                if let Some(err) = dashboard.fatal_error() {
                    break Err(eyre!("{}", err));
                }
            }
        }
    };

    runner.shutdown();
    tui.exit()?;
    outcome
}

/// Print a one-off status summary.
async fn print_status(client: &AlgodClient) -> Result<()> {
    let network = client.versions().await?;
    let status = client.status().await?;

    println!("Network:          {}", network.genesis_id);
    println!("Version:          {}", network.node_version);
    println!("Current round:    {}", status.last_round);
    println!(
        "Block wait time:  {}",
        format_duration(status.time_since_last_round)
    );
    println!("Sync time:        {}", format_duration(status.catchup_time));
    if status.catchpoint_active() {
        println!("Catchpoint:       {}", status.catchpoint);
    }
    Ok(())
}
