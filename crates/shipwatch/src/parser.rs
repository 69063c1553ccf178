use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix shared by every room-code marker.
pub const MARKER_PREFIX: &str = "room_";

static MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("{MARKER_PREFIX}[A-Za-z0-9_]+")).expect("marker pattern compiles")
});

static FULL_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{MARKER_PREFIX}[A-Za-z0-9_]+$")).expect("marker pattern compiles")
});

static SNAPSHOT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)initial\s+snapshot").expect("snapshot pattern compiles"));

/// Markers extracted from a single log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent<'a> {
    /// Every marker in order of appearance, duplicates kept.
    pub markers: Vec<&'a str>,
    /// The line mentions an initial snapshot (station-spawned ship).
    pub is_snapshot: bool,
    pub raw: &'a str,
}

/// Extracts room-code markers from `line`.
///
/// Returns `None` when the line carries no markers; most log lines don't, so
/// this is the common case rather than a failure.
pub fn parse_line(line: &str) -> Option<ParsedEvent<'_>> {
    let markers: Vec<&str> = MARKER_PATTERN.find_iter(line).map(|m| m.as_str()).collect();
    if markers.is_empty() {
        return None;
    }

    Some(ParsedEvent {
        markers,
        is_snapshot: SNAPSHOT_PATTERN.is_match(line),
        raw: line,
    })
}

/// True when the whole of `text` is a single marker token.
pub fn is_marker(text: &str) -> bool {
    FULL_MARKER_PATTERN.is_match(text)
}
