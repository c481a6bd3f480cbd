//! Shared formatting helpers for the dashboard and CSV export.
//!
//! All pure formatting functions (no ratatui styles, no UI layout) live here.
//! Functions that differ between compact table columns and the header lines
//! are parameterized via [`FmtStyle`].

use std::sync::LazyLock;

use regex::Regex;

/// Controls compact (table columns) vs verbose (header lines) output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, short suffixes ("1.5G", "3m5s")
    Compact,
    /// Detail: spaces, full suffixes ("1.5 GiB", "3m 5s")
    Detail,
}

// ---------------------------------------------------------------------------
// Style-parameterized functions
// ---------------------------------------------------------------------------

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.5 GiB"`, `"100.3 MiB"`, `"50.0 KiB"`, `"512 B"`
pub fn format_bytes(bytes: u64, style: FmtStyle) -> String {
    let (g, m, k, b) = match style {
        FmtStyle::Compact => ("G", "M", "K", "B"),
        FmtStyle::Detail => (" GiB", " MiB", " KiB", " B"),
    };
    let f = bytes as f64;
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}{}", f / (1024.0 * 1024.0 * 1024.0), g)
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}{}", f / (1024.0 * 1024.0), m)
    } else if bytes >= 1024 {
        format!("{:.1}{}", f / 1024.0, k)
    } else {
        format!("{}{}", bytes, b)
    }
}

/// Format bytes-per-second rate as human-readable.
///
/// Compact: `"1.5G/s"`, `"100.3M/s"`
/// Detail:  `"1.5 GiB/s"`, `"100.3 MiB/s"`
pub fn format_bytes_rate(rate: f64, style: FmtStyle) -> String {
    if rate < 1.0 {
        return "0".to_string();
    }
    let (g, m, k, b) = match style {
        FmtStyle::Compact => ("G/s", "M/s", "K/s", "B/s"),
        FmtStyle::Detail => (" GiB/s", " MiB/s", " KiB/s", " B/s"),
    };
    if rate >= 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1}{}", rate / (1024.0 * 1024.0 * 1024.0), g)
    } else if rate >= 1024.0 * 1024.0 {
        format!("{:.1}{}", rate / (1024.0 * 1024.0), m)
    } else if rate >= 1024.0 {
        format!("{:.1}{}", rate / 1024.0, k)
    } else {
        format!("{:.0}{}", rate, b)
    }
}

/// Format whole seconds as human-readable.
///
/// Compact: `"3m5s"`
/// Detail:  `"3m 5s"`, `"2d 4h"`
pub fn format_duration(secs: i64, style: FmtStyle) -> String {
    let secs = secs.max(0);
    let sep = match style {
        FmtStyle::Compact => "",
        FmtStyle::Detail => " ",
    };
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}{}s", secs / 60, sep, secs % 60)
    } else if secs < 86400 {
        format!("{}h{}{}m", secs / 3600, sep, (secs % 3600) / 60)
    } else {
        format!("{}d{}{}h", secs / 86400, sep, (secs % 86400) / 3600)
    }
}

/// Format ops-per-second rate.
pub fn format_rate(rate: f64) -> String {
    if rate < 0.01 {
        "0".to_string()
    } else if rate >= 1_000_000.0 {
        format!("{:.1}M/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K/s", rate / 1_000.0)
    } else {
        format!("{:.0}/s", rate)
    }
}

// ---------------------------------------------------------------------------
// Activity columns
// ---------------------------------------------------------------------------

/// Backend duration for the DURATION and TIME+ columns.
///
/// `0.123456` under a second, `MM:SS.cc` under 60000 seconds, whole hours
/// beyond that.
pub fn format_elapsed(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs < 1.0 {
        format!("{:.6}", secs)
    } else if secs < 60_000.0 {
        // Round once, so 59.999 carries into the minutes.
        let hundredths = (secs * 100.0).round() as u64;
        let (mins, rest) = (hundredths / 6000, hundredths % 6000);
        format!("{:02}:{:02}.{:02}", mins, rest / 100, rest % 100)
    } else {
        format!("{} h", (secs / 3600.0) as u64)
    }
}

/// Percentage with one decimal, blank when undefined.
pub fn format_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

/// Byte rate for READ/s and WRITE/s, blank when undefined.
pub fn format_io_rate(value: Option<f64>) -> String {
    value
        .map(|v| format_bytes_rate(v, FmtStyle::Compact))
        .unwrap_or_default()
}

/// Shortens the long idle-in-transaction labels to fit the STATE column.
pub fn short_state(state: &str) -> &str {
    match state {
        "idle in transaction" => "idle in trans",
        "idle in transaction (aborted)" => "idle in trans (a)",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Truncate string to `max_chars` characters with unicode ellipsis (`…`).
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Normalize text for single-line display with space collapsing.
pub fn normalize_for_display(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result.trim().to_string()
}

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+\b(FROM|WHERE|GROUP BY|ORDER BY|HAVING|LIMIT|OFFSET|RETURNING|VALUES|SET|UNION( ALL)?|(LEFT |RIGHT |FULL |INNER |CROSS )?(OUTER )?JOIN)\b",
    )
    .expect("static regex")
});

static CONJUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+\b(AND|OR)\b").expect("static regex"));

/// Re-indents a query: one line per top-level clause, conjunctions indented.
pub fn indent_query(query: &str) -> String {
    let flat = normalize_for_display(query);
    let broken = CLAUSE.replace_all(&flat, "\n$1");
    CONJUNCTION.replace_all(&broken, "\n  $1").into_owned()
}
