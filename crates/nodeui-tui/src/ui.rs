//! UI rendering.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use nodeui_core::{
    BlockSummary, CatchupProgress, Dashboard, DerivedMetrics, MICROUNITS_PER_UNIT,
    NavigationState, NodeStatusSnapshot, NoticeLevel, PaysetView, TransactionRecord, TxType,
    UPGRADE_VOTE_THRESHOLD, UPGRADE_VOTE_WINDOW, UpgradeOutlook, catchpoint_round,
    format_duration, format_units, short_version, truncate_middle,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::app::{App, View};
use crate::log_buffer::LogLevel;
use crate::theme::Palette;

const LOG_PANE_LINES: u16 = 8;

/// Render the entire UI.
pub fn render(frame: &mut Frame, app: &App, dashboard: &Dashboard) {
    let chunks = Layout::vertical([
        Constraint::Length(9), // Status
        Constraint::Length(3), // Tabs
        Constraint::Min(0),    // Content
        Constraint::Length(LOG_PANE_LINES + 2),
        Constraint::Length(1), // Footer
    ])
    .split(frame.area());

    render_status(frame, app, dashboard, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_content(frame, app, dashboard, chunks[2]);
    render_logs(frame, app, chunks[3]);
    render_footer(frame, app, dashboard, chunks[4]);
}

fn bordered<'a>(title: impl Into<Line<'a>>, p: &Palette) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border))
}

fn labeled<'a>(label: &'a str, value: String, p: &Palette) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(p.label)),
        Span::raw(" "),
        Span::styled(value, Style::default().fg(p.fg)),
    ])
}

fn render_status(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let p = &app.palette;
    let block = bordered(" Status ", p);

    let Some(status) = dashboard.telemetry().status() else {
        let dots = ".".repeat((app.tick_count() % 4) as usize);
        let text = match dashboard.fatal_error() {
            Some(err) => Line::styled(err.to_string(), Style::default().fg(p.error)),
            None => Line::styled(
                format!("Waiting for node status{}", dots),
                Style::default().fg(p.muted),
            ),
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [left, right] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);

    let network = dashboard.telemetry().network();
    let genesis_hash = if network.is_known() {
        BASE64.encode(network.genesis_hash)
    } else {
        "--".to_string()
    };
    let mut lines = vec![
        labeled("Network:", or_placeholder(&network.genesis_id), p),
        labeled("Genesis:", genesis_hash, p),
        labeled("Current round:", status.last_round.to_string(), p),
        labeled(
            "Block wait time:",
            format_duration(status.time_since_last_round),
            p,
        ),
        labeled("Sync time:", format_duration(status.catchup_time), p),
    ];
    if let Some(derived) = dashboard.derived() {
        lines.push(labeled(
            "Round time:",
            format_duration(derived.avg_round_time),
            p,
        ));
    }
    frame.render_widget(Paragraph::new(lines), left);

    match dashboard.derived() {
        Some(DerivedMetrics {
            catchup: Some(progress),
            ..
        }) => render_catchup(frame, p, status, progress, right),
        Some(derived) => {
            let lines: Vec<Line> = upgrade_lines(&derived.upgrade)
                .into_iter()
                .enumerate()
                .map(|(i, text)| {
                    let style = if i == 0 {
                        Style::default().fg(p.key).bold()
                    } else {
                        Style::default().fg(p.fg)
                    };
                    Line::styled(text, style)
                })
                .collect();
            frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), right);
        }
        None => {}
    }
}

fn or_placeholder(s: &str) -> String {
    if s.is_empty() {
        "--".to_string()
    } else {
        s.to_string()
    }
}

/// Text of the upgrade panel, heading first.
pub(crate) fn upgrade_lines(outlook: &UpgradeOutlook) -> Vec<String> {
    match outlook {
        UpgradeOutlook::None { protocol } => vec![
            format!("Protocol: {}", short_version(protocol)),
            "No upgrade in progress.".to_string(),
        ],
        UpgradeOutlook::Voting {
            next_protocol,
            vote,
        } => vec![
            "Consensus Upgrade Pending: Votes".to_string(),
            format!("Next Protocol: {}", short_version(next_protocol)),
            format!(
                "Yes/No votes: {} / {} ({:.0}%, {:.0}% required)",
                vote.yes,
                vote.no,
                vote.yes_pct * 100.0,
                UPGRADE_VOTE_THRESHOLD as f64 / UPGRADE_VOTE_WINDOW as f64 * 100.0
            ),
            format!(
                "Vote window close: {} ({:.0}%, {} to go, {})",
                vote.vote_before,
                vote.window_pct * 100.0,
                vote.votes_to_go,
                format_duration(vote.time_to_close)
            ),
        ],
        UpgradeOutlook::Scheduled {
            current,
            next,
            round,
            rounds_to_go,
            eta,
        } => vec![
            "Consensus Upgrade Scheduled".to_string(),
            format!("Current Protocol: {}", short_version(current)),
            format!("Next Protocol: {}", short_version(next)),
            format!(
                "Upgrade round: {} ({} to go, {})",
                round,
                rounds_to_go,
                format_duration(*eta)
            ),
        ],
    }
}

fn render_catchup(
    frame: &mut Frame,
    p: &Palette,
    status: &NodeStatusSnapshot,
    progress: &CatchupProgress,
    area: Rect,
) {
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .split(area);

    frame.render_widget(
        Paragraph::new(labeled(
            "Catchpoint:",
            catchpoint_round(&status.catchpoint).to_string(),
            p,
        )),
        rows[0],
    );
    frame.render_widget(
        Paragraph::new(Line::styled(
            progress.phase.label(),
            Style::default().fg(p.key).bold(),
        )),
        rows[1],
    );

    let gauges = [
        ("Downloading accounts", progress.processed_pct),
        ("Processing accounts", progress.verified_pct),
        ("Downloading blocks", progress.acquired_pct),
    ];
    for ((label, ratio), row) in gauges.into_iter().zip(&rows[2..5]) {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(p.gauge))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(format!("{} {:.0}%", label, ratio * 100.0));
        frame.render_widget(gauge, *row);
    }
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let p = &app.palette;
    let titles: Vec<Line> = View::all().iter().map(|v| Line::from(v.label())).collect();

    let tabs = Tabs::new(titles)
        .block(bordered("", p))
        .select(app.view.index())
        .style(Style::default().fg(p.muted))
        .highlight_style(
            Style::default()
                .fg(p.selection)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

/// Render the main content area based on current view.
fn render_content(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    match app.view {
        View::Explorer => render_explorer(frame, app, dashboard, area),
        View::Utilities => render_text(frame, app, " Utilities ", utilities_text(), area),
        View::Accounts => render_accounts(frame, app, dashboard, area),
        View::Configuration => {
            let text = app.node_config.clone().unwrap_or_else(|| {
                "Node configuration is only available with --algod-data-dir.".to_string()
            });
            render_text(frame, app, " Node configuration ", text, area)
        }
        View::Help => render_text(frame, app, " Help ", help_text(), area),
    }
}

fn render_text(frame: &mut Frame, app: &App, title: &'static str, text: String, area: Rect) {
    let p = &app.palette;
    let scroll = u16::try_from(app.text_scroll).unwrap_or(u16::MAX);
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(p.fg))
        .block(bordered(title, p))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_explorer(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    match dashboard.navigation().state() {
        NavigationState::BlockList => render_blocks(frame, app, dashboard, area),
        NavigationState::TransactionList(payset) => render_payset(frame, app, payset, area),
        NavigationState::TransactionDetail(payset, detail) => {
            let p = &app.palette;
            let title = format!(
                " Round {} / transaction {} of {} ",
                detail.round,
                detail.intra,
                payset.len()
            );
            let scroll = u16::try_from(detail.scroll).unwrap_or(u16::MAX);
            let paragraph = Paragraph::new(detail.text.as_str())
                .style(Style::default().fg(p.fg))
                .block(bordered(title, p).border_style(Style::default().fg(p.border_active)))
                .scroll((scroll, 0));
            frame.render_widget(paragraph, area);
        }
    }
}

const BLOCK_HEADERS: [&str; 11] = [
    "ROUND", "Txns", "Pay", "Sum", "Axfer", "Acfg", "Afrz", "Unique", "Appl", "Unique", "Proposer",
];

/// Cells of one block-list row.
pub(crate) fn block_row(summary: &BlockSummary) -> [String; 11] {
    [
        summary.round.to_string(),
        summary.txn_count.to_string(),
        summary.pay_count.to_string(),
        (summary.pay_total / MICROUNITS_PER_UNIT).to_string(),
        summary.axfer_count.to_string(),
        summary.acfg_count.to_string(),
        summary.afrz_count.to_string(),
        summary.unique_assets.to_string(),
        summary.appl_count.to_string(),
        summary.unique_apps.to_string(),
        summary.proposer.clone().unwrap_or_default(),
    ]
}

fn header_row(headers: &[&'static str], p: &Palette) -> Row<'static> {
    Row::new(headers.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(p.label).add_modifier(Modifier::BOLD))
        .bottom_margin(1)
}

fn render_blocks(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let p = &app.palette;
    let window = dashboard.tailer().window();

    let rows: Vec<Row> = window
        .iter()
        .map(|block| Row::new(block_row(&BlockSummary::from(block)).map(Cell::from)))
        .collect();

    let widths = [
        Constraint::Length(10),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(9),
        Constraint::Length(6),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Min(20),
    ];

    let gaps = dashboard.tailer().gaps();
    let title = if gaps.is_empty() {
        format!(" Blocks ({}) ", window.len())
    } else {
        format!(" Blocks ({}, {} skipped) ", window.len(), gaps.len())
    };

    let table = Table::new(rows, widths)
        .header(header_row(&BLOCK_HEADERS, p))
        .block(bordered(title, p))
        .style(Style::default().fg(p.fg))
        .row_highlight_style(
            Style::default()
                .fg(p.selection)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut state = TableState::default().with_selected(dashboard.navigation().block_cursor());
    frame.render_stateful_widget(table, area, &mut state);
}

const TRANSACTION_HEADERS: [&str; 7] =
    ["INTRA", "type", "amount", "sigtype", "fee", "has-note", "sender"];

/// Cells of one transaction-list row.
pub(crate) fn transaction_row(intra: usize, record: &TransactionRecord) -> [String; 7] {
    let amount = match (record.tx_type, record.amount) {
        (TxType::Payment, Some(amount)) => format_units(amount),
        (_, Some(amount)) => amount.to_string(),
        (_, None) => String::new(),
    };
    [
        intra.to_string(),
        record.tx_type.as_str().to_string(),
        amount,
        record.signature.as_str().to_string(),
        format_units(record.fee),
        if record.has_note { "yes" } else { "no" }.to_string(),
        record.sender.clone(),
    ]
}

fn render_payset(frame: &mut Frame, app: &App, payset: &PaysetView, area: Rect) {
    let p = &app.palette;
    let rows: Vec<Row> = payset
        .records
        .iter()
        .enumerate()
        .map(|(intra, record)| Row::new(transaction_row(intra, record).map(Cell::from)))
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(18),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Min(20),
    ];

    let title = format!(" Round {}: {} transactions ", payset.round, payset.len());
    let table = Table::new(rows, widths)
        .header(header_row(&TRANSACTION_HEADERS, p))
        .block(bordered(title, p).border_style(Style::default().fg(p.border_active)))
        .style(Style::default().fg(p.fg))
        .row_highlight_style(
            Style::default()
                .fg(p.selection)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let selected = (!payset.is_empty()).then_some(payset.cursor);
    let mut state = TableState::default().with_selected(selected);
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_accounts(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let p = &app.palette;
    let balances = dashboard.balances();

    if balances.watch_list().is_empty() {
        let text = "No accounts watched. Pass --watch-list ADDR1,ADDR2 or set watch_list in the config file.";
        render_text(frame, app, " Accounts ", text.to_string(), area);
        return;
    }

    let mut addresses: Vec<&String> = balances.watch_list().iter().collect();
    addresses.sort();

    let mut lines: Vec<Line> = Vec::new();
    for address in addresses {
        lines.push(Line::styled(
            address.clone(),
            Style::default().fg(p.key).bold(),
        ));
        let Some(record) = balances.record(address) else {
            lines.push(Line::styled("  pending", Style::default().fg(p.muted)));
            lines.push(Line::raw(""));
            continue;
        };
        if let Some(primary) = record.primary() {
            lines.push(labeled("  Balance:", format_units(primary), p));
        }
        if let Some(err) = &record.error {
            lines.push(Line::styled(
                format!("  Last fetch failed: {}", err),
                Style::default().fg(p.warning),
            ));
        }
        for reading in &record.history {
            lines.push(Line::styled(
                format!(
                    "  {}  {}",
                    reading
                        .at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S"),
                    format_units(reading.amount)
                ),
                Style::default().fg(p.muted),
            ));
        }
        for (asset, amount) in record.assets() {
            lines.push(Line::raw(format!("  asset {}: {}", asset, amount)));
        }
        lines.push(Line::raw(""));
    }

    let scroll = u16::try_from(app.text_scroll).unwrap_or(u16::MAX);
    let title = format!(" Accounts ({}) ", balances.watch_list().len());
    frame.render_widget(
        Paragraph::new(lines)
            .block(bordered(title, p))
            .scroll((scroll, 0)),
        area,
    );
}

fn utilities_text() -> String {
    [
        "Fast catchup",
        "",
        "  F  start a fast catchup from the latest published catchpoint",
        "  A  abort a running fast catchup",
        "",
        "Both require algod.admin.token, read from --algod-data-dir.",
    ]
    .join("\n")
}

fn help_text() -> String {
    [
        "Algorand Node UI",
        "",
        "Tabs",
        "  Tab / Shift-Tab   next / previous tab",
        "  ?                 this help",
        "  q / Ctrl-C        quit",
        "",
        "Explorer",
        "  Up/Down, k/j      move the selection",
        "  Home/End, g/G     first / last row",
        "  Enter, Right      open the selected block or transaction",
        "  Esc, Left         go back",
        "",
        "The block list follows the newest round while the first row is selected.",
        "An open transaction list keeps showing the block it was opened from.",
        "",
        "Other",
        "  F / A             start / abort fast catchup",
        "  PgUp / PgDn       scroll the log pane",
        "  Up/Down           scroll text tabs",
    ]
    .join("\n")
}

fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let p = &app.palette;
    let logs = app.log_buffer.window(LOG_PANE_LINES as usize, app.log_scroll);

    let scroll_info = if app.log_scroll > 0 {
        format!(" [↑{}]", app.log_scroll)
    } else {
        String::new()
    };
    let problems = app.log_buffer.problem_count();
    let title_style = if problems > 0 {
        Style::default().fg(p.warning)
    } else {
        Style::default().fg(p.muted)
    };

    let lines: Vec<Line> = logs
        .iter()
        .map(|log| {
            let level_style = match log.level {
                LogLevel::Trace | LogLevel::Debug => Style::default().fg(p.muted),
                LogLevel::Info => Style::default().fg(p.success),
                LogLevel::Warn => Style::default().fg(p.warning),
                LogLevel::Error => Style::default().fg(p.error),
            };
            Line::from(vec![
                Span::styled(
                    format!("{} ", log.at.format("%H:%M:%S")),
                    Style::default().fg(p.muted),
                ),
                Span::styled(format!("{:5} ", log.level.as_str()), level_style),
                Span::styled(
                    format!("[{}] ", truncate_middle(&log.target, 20)),
                    Style::default().fg(p.muted),
                ),
                Span::raw(log.message.as_str()),
            ])
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(
            format!(" Logs ({} warnings){} ", problems, scroll_info),
            title_style,
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let p = &app.palette;
    let network = dashboard.telemetry().network();

    let mut spans = vec![
        Span::styled(" Algorand Node UI ", Style::default().fg(p.footer_brand).bold()),
        Span::raw(" │ "),
        Span::raw(or_placeholder(&network.genesis_id)),
        Span::raw(" │ "),
        Span::styled(
            or_placeholder(&network.node_version),
            Style::default().fg(p.footer_version),
        ),
    ];
    spans.push(Span::styled(
        " │ q quit  Tab section  ? help",
        Style::default().fg(p.muted),
    ));
    if let Some(notice) = dashboard.latest_notice() {
        let color = match notice.level {
            NoticeLevel::Info => p.success,
            NoticeLevel::Warning => p.warning,
        };
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(notice.message.clone(), Style::default().fg(color)));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(p.footer_bg)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_buffer::LogBuffer;
    use crate::theme::Theme;
    use nodeui_core::{DashboardConfig, Event, SignatureKind, UpgradeVote};
    use pretty_assertions::assert_eq;
    use ratatui::{Terminal, backend::TestBackend};
    use std::time::{Duration, Instant};

    fn screen(app: &App, dashboard: &Dashboard) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).expect("terminal");
        terminal
            .draw(|frame| render(frame, app, dashboard))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_block_row() {
        let summary = BlockSummary {
            round: 1200,
            txn_count: 4,
            pay_count: 2,
            pay_total: 12_500_000,
            axfer_count: 1,
            unique_assets: 1,
            appl_count: 1,
            unique_apps: 1,
            proposer: Some("PROPOSER".to_string()),
            ..Default::default()
        };
        assert_eq!(
            block_row(&summary),
            ["1200", "4", "2", "12", "1", "0", "0", "1", "1", "1", "PROPOSER"].map(String::from)
        );
    }

    #[test]
    fn test_transaction_row() {
        let record = TransactionRecord {
            tx_type: TxType::Payment,
            sender: "SENDER".to_string(),
            fee: 1_000,
            amount: Some(2_000_000),
            signature: SignatureKind::Ed25519,
            has_note: true,
        };
        assert_eq!(
            transaction_row(3, &record),
            [
                "3",
                TxType::Payment.as_str(),
                "2.000000",
                SignatureKind::Ed25519.as_str(),
                "0.001000",
                "yes",
                "SENDER"
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_upgrade_lines_voting() {
        let outlook = UpgradeOutlook::Voting {
            next_protocol: "https://example.org/specs/tree/v40".to_string(),
            vote: UpgradeVote {
                vote_before: 20_000,
                votes_to_go: 2_500,
                votes_cast: 7_500,
                yes: 7_000,
                no: 500,
                yes_pct: 7_000.0 / 7_500.0,
                window_pct: 0.75,
                time_to_close: Duration::from_secs(11_000),
            },
        };
        assert_eq!(
            upgrade_lines(&outlook),
            vec![
                "Consensus Upgrade Pending: Votes".to_string(),
                "Next Protocol: v40".to_string(),
                "Yes/No votes: 7000 / 500 (93%, 90% required)".to_string(),
                "Vote window close: 20000 (75%, 2500 to go, 3h3m20s)".to_string(),
            ]
        );
    }

    #[test]
    fn test_upgrade_lines_none() {
        let outlook = UpgradeOutlook::None {
            protocol: "https://example.org/specs/tree/v39".to_string(),
        };
        assert_eq!(
            upgrade_lines(&outlook),
            vec!["Protocol: v39".to_string(), "No upgrade in progress.".to_string()]
        );
    }

    #[test]
    fn test_render_waiting_for_status() {
        let app = App::new(Theme::Dark, LogBuffer::new(), None);
        let (dashboard, _) = Dashboard::new(DashboardConfig::default(), Vec::new());
        let text = screen(&app, &dashboard);
        assert!(text.contains("Waiting for node status"));
        assert!(text.contains("Algorand Node UI"));
        assert!(text.contains("EXPLORER"));
    }

    #[test]
    fn test_render_status_and_catchup() {
        let app = App::new(Theme::Light, LogBuffer::new(), None);
        let (mut dashboard, _) = Dashboard::new(DashboardConfig::default(), Vec::new());
        dashboard.deliver(Event::StatusFetched {
            snapshot: NodeStatusSnapshot {
                last_round: 777,
                catchpoint: "21890000#IQ4BXGHUGNVIF5R3".to_string(),
                catchpoint_total_accounts: 100,
                catchpoint_processed_accounts: 50,
                ..Default::default()
            },
            observed_at: Instant::now(),
        });
        let text = screen(&app, &dashboard);
        assert!(text.contains("Current round: 777"));
        assert!(text.contains("Catchpoint: 21890000"));
        assert!(text.contains("Downloading accounts"));
    }
}
