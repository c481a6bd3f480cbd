//! Header with instance, system and process information.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::fmt::{self, FmtStyle};
use crate::model::{ServerStats, SystemInfo};
use crate::rates::ServerRates;
use crate::tui::state::AppState;
use crate::tui::style::Styles;
use crate::view::activity::format_size;

/// Builds `label value | label value` spans.
fn pairs(prefix: &str, items: &[(String, &str)]) -> Line<'static> {
    let mut spans = vec![Span::styled(format!(" * {}: ", prefix), Styles::label())];
    for (i, (value, label)) in items.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", Styles::dim()));
        }
        spans.push(Span::styled(value.clone(), Styles::value()));
        spans.push(Span::raw(format!(" {}", label)));
    }
    Line::from(spans)
}

fn opt_count(value: Option<i64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn of(value: Option<i64>, max: Option<i64>) -> String {
    format!("{}/{}", opt_count(value), opt_count(max))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v))
}

fn title_line(state: &AppState) -> Line<'static> {
    let version = state.server_version.as_deref().unwrap_or("?");
    let mut spans = vec![
        Span::styled(format!("PostgreSQL {}", version), Styles::value()),
        Span::raw(format!(" - {}", state.target)),
        Span::raw(format!(" - Ref.: {}s", state.scheduler.interval_secs())),
        Span::raw(format!(
            " - Duration mode: {}",
            state.view.duration_mode.label()
        )),
    ];
    if state.scheduler.is_paused() {
        spans.push(Span::styled(" - PAUSED", Styles::critical()));
    }
    if state.stale {
        spans.push(Span::styled(" - STALE", Styles::warning()));
    }
    Line::from(spans)
}

fn instance_lines(server: &ServerStats, rates: Option<&ServerRates>) -> Vec<Line<'static>> {
    let rate = |f: fn(&ServerRates) -> f64| {
        rates.map_or_else(|| "N/A".to_string(), |r| fmt::format_rate(f(r)))
    };
    let growth = rates
        .and_then(|r| r.size_growth)
        .map_or_else(|| "N/A".to_string(), |g| {
            if g < 0.0 {
                format!("-{}", fmt::format_bytes_rate(-g, FmtStyle::Detail))
            } else {
                fmt::format_bytes_rate(g, FmtStyle::Detail)
            }
        });
    let temp = server.temp_files.map_or_else(
        || "N/A".to_string(),
        |t| {
            format!(
                "{} ({})",
                t.files,
                fmt::format_bytes(u64::try_from(t.bytes).unwrap_or(0), FmtStyle::Detail)
            )
        },
    );

    let workers = server.autovacuum_workers
        + server.logical_replication_workers.unwrap_or(0)
        + server.parallel_workers.unwrap_or(0);

    vec![
        pairs(
            "Global",
            &[
                (fmt::format_duration(server.uptime as i64, FmtStyle::Detail), "uptime"),
                (format_size(server.total_size), "dbs size"),
                (growth, "growth"),
                (rate(|r| r.tps), "tps"),
                (percent(rates.and_then(|r| r.cache_hit_ratio)), "cache hit ratio"),
                (percent(rates.and_then(|r| r.rollback_ratio)), "rollback ratio"),
            ],
        ),
        pairs(
            "Activity",
            &[
                (rate(|r| r.inserts), "insert"),
                (rate(|r| r.updates), "update"),
                (rate(|r| r.deletes), "delete"),
                (rate(|r| r.returned), "tuples returned"),
                (rate(|r| r.blks_read), "blocks read"),
            ],
        ),
        pairs(
            "Worker processes",
            &[
                (of(Some(workers), server.max_worker_processes), "total"),
                (
                    of(Some(server.autovacuum_workers), server.autovacuum_max_workers),
                    "autovacuum",
                ),
                (
                    of(
                        server.logical_replication_workers,
                        server.max_logical_replication_workers,
                    ),
                    "logical replication",
                ),
                (
                    of(server.parallel_workers, server.max_parallel_workers),
                    "parallel",
                ),
            ],
        ),
        pairs(
            "Other processes & info",
            &[
                (opt_count(server.wal_senders), "wal senders"),
                (opt_count(server.wal_receivers), "wal receivers"),
                (opt_count(server.replication_slots), "repl. slots"),
                (temp, "temp files"),
            ],
        ),
    ]
}

fn process_line(server: &ServerStats) -> Line<'static> {
    pairs(
        "Sessions",
        &[
            (
                format!("{}/{}", server.total_connections, server.max_connections),
                "total",
            ),
            (server.active_connections.to_string(), "active"),
            (server.idle.to_string(), "idle"),
            (server.idle_in_transaction.to_string(), "idle in txn"),
            (
                server.idle_in_transaction_aborted.to_string(),
                "idle in txn aborted",
            ),
            (server.waiting.to_string(), "waiting"),
        ],
    )
}

fn system_lines(system: &SystemInfo) -> Vec<Line<'static>> {
    let bytes = |b: u64| fmt::format_bytes(b, FmtStyle::Detail);
    vec![
        pairs(
            "Mem.",
            &[
                (bytes(system.mem_total), "total"),
                (bytes(system.mem_free), "free"),
                (bytes(system.mem_used()), "used"),
                (bytes(system.mem_buffers + system.mem_cached), "buff+cache"),
            ],
        ),
        pairs(
            "Swap",
            &[
                (bytes(system.swap_total), "total"),
                (bytes(system.swap_free), "free"),
                (bytes(system.swap_used()), "used"),
            ],
        ),
        pairs(
            "Load average",
            &[(
                format!("{:.2} {:.2} {:.2}", system.load1, system.load5, system.load15),
                "",
            )],
        ),
    ]
}

/// Header lines for the sections currently enabled.
pub fn header_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = vec![title_line(state)];
    let Some(snapshot) = state.current.as_ref() else {
        return lines;
    };
    if state.header.instance {
        lines.extend(instance_lines(
            &snapshot.server,
            state.server_rates.as_ref(),
        ));
    }
    if state.header.system {
        if let Some(system) = snapshot.system.as_ref() {
            lines.extend(system_lines(system));
        }
    }
    if state.header.process {
        lines.push(process_line(&snapshot.server));
    }
    lines
}

/// Renders the header.
pub fn render_header(frame: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    frame.render_widget(Paragraph::new(lines).style(Styles::default()), area);
}
