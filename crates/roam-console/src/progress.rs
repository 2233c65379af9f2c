//! Sync progress extraction.
//!
//! Lines prefixed with [`SYNC_PREFIX`] come from the cloud sync tool and carry
//! semi-structured progress. The [`ProgressTracker`] folds them into a single
//! ephemeral [`ProgressState`] that expires after a period of silence.
//!
//! Sync line rules, first match wins:
//!
//! ```text
//! "Download Complete" / "Upload Complete"   -> completion, 100%, short expiry
//! "STATUS: <message>"                       -> message, no percent
//! "Transferred:" / "Checks:" with / or %    -> derived message, fractional percent
//! "... * <item>"                            -> "File: <item>", no percent
//! ```
//!
//! Lines without the prefix only affect progress through lifecycle phrases
//! (`STARTING DOWNLOAD`, `STARTING UPLOAD`, and completion phrases while a
//! state is active).

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

/// Routing prefix for sync tool output.
pub const SYNC_PREFIX: &str = "[Sync]:";

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_millis(2_000);

const STATUS_MARKER: &str = "STATUS:";
const TRANSFERRED_MARKER: &str = "Transferred:";
const CHECKS_MARKER: &str = "Checks:";
const ITEM_DELIMITER: &str = " * ";

// ---------------------------------------------------------------------------
// ProgressUpdate
// ---------------------------------------------------------------------------

/// Direction of a cloud transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Download,
    Upload,
}

impl TransferDirection {
    #[must_use]
    pub fn started_message(self) -> &'static str {
        match self {
            Self::Download => "Downloading from Cloud...",
            Self::Upload => "Uploading to Cloud...",
        }
    }

    #[must_use]
    pub fn completed_message(self) -> &'static str {
        match self {
            Self::Download => "Download Complete!",
            Self::Upload => "Upload Complete!",
        }
    }
}

/// A recognized progress signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    Started(TransferDirection),
    Status(String),
    Transfer { message: String, percent: Option<u8> },
    Item(String),
    Completed(TransferDirection),
}

impl ProgressUpdate {
    fn message(&self) -> String {
        match self {
            Self::Started(direction) => direction.started_message().to_owned(),
            Self::Status(message) | Self::Item(message) => message.clone(),
            Self::Transfer { message, .. } => message.clone(),
            Self::Completed(direction) => direction.completed_message().to_owned(),
        }
    }

    fn percent(&self) -> Option<u8> {
        match self {
            Self::Started(_) => Some(0),
            Self::Status(_) | Self::Item(_) => None,
            Self::Transfer { percent, .. } => *percent,
            Self::Completed(_) => Some(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Whether a line is routed to the progress extractor.
#[must_use]
pub fn is_sync_line(text: &str) -> bool {
    text.starts_with(SYNC_PREFIX)
}

fn completion_direction(text: &str) -> Option<TransferDirection> {
    if text.contains("Download Complete") {
        Some(TransferDirection::Download)
    } else if text.contains("Upload Complete") {
        Some(TransferDirection::Upload)
    } else {
        None
    }
}

fn started_direction(text: &str) -> Option<TransferDirection> {
    if text.contains("STARTING DOWNLOAD") {
        Some(TransferDirection::Download)
    } else if text.contains("STARTING UPLOAD") {
        Some(TransferDirection::Upload)
    } else {
        None
    }
}

/// Parse a `[Sync]:` line. Returns `None` for lines with no recognized shape.
#[must_use]
pub fn parse_sync_line(text: &str) -> Option<ProgressUpdate> {
    let body = text.strip_prefix(SYNC_PREFIX)?;

    if let Some(direction) = completion_direction(body) {
        return Some(ProgressUpdate::Completed(direction));
    }

    if let Some((_, status)) = body.split_once(STATUS_MARKER) {
        let status = status.trim();
        if status.is_empty() {
            return None;
        }
        return Some(ProgressUpdate::Status(status.to_owned()));
    }

    if let Some(update) = parse_transfer(body) {
        return Some(update);
    }

    if let Some((_, item)) = body.rsplit_once(ITEM_DELIMITER) {
        let item = item.trim();
        if !item.is_empty() {
            return Some(ProgressUpdate::Item(format!("File: {item}")));
        }
    }

    None
}

/// Parse a non-sync line for lifecycle phrases.
///
/// Completion phrases outside the sync stream only count while a transfer is
/// being tracked, so unrelated "complete" messages do not conjure a bar.
#[must_use]
pub fn parse_lifecycle_line(text: &str, active: bool) -> Option<ProgressUpdate> {
    if let Some(direction) = started_direction(text) {
        return Some(ProgressUpdate::Started(direction));
    }
    if active {
        if let Some(direction) = completion_direction(text) {
            return Some(ProgressUpdate::Completed(direction));
        }
    }
    None
}

fn parse_transfer(body: &str) -> Option<ProgressUpdate> {
    let (label, detail) = if let Some((_, detail)) = body.split_once(TRANSFERRED_MARKER) {
        ("Overall", detail)
    } else if let Some((_, detail)) = body.split_once(CHECKS_MARKER) {
        ("Checks", detail)
    } else {
        return None;
    };

    if !detail.contains('/') && !detail.contains('%') {
        return None;
    }

    let detail = detail.trim();
    Some(ProgressUpdate::Transfer {
        message: format!("{label}: {detail}"),
        percent: extract_percent(detail),
    })
}

// ---------------------------------------------------------------------------
// Percent arithmetic
// ---------------------------------------------------------------------------

fn fraction_regex() -> Option<&'static Regex> {
    static FRACTION: OnceLock<Option<Regex>> = OnceLock::new();
    FRACTION
        .get_or_init(|| {
            Regex::new(r"(\d+(?:\.\d+)?)\s*([A-Za-z]+)?\s*/\s*(\d+(?:\.\d+)?)\s*([A-Za-z]+)?").ok()
        })
        .as_ref()
}

fn explicit_percent_regex() -> Option<&'static Regex> {
    static PERCENT: OnceLock<Option<Regex>> = OnceLock::new();
    PERCENT
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok())
        .as_ref()
}

/// `round(100 * numerator / denominator)`, 0 when the denominator is 0,
/// clamped to 100.
#[must_use]
pub fn percent_of(numerator: f64, denominator: f64) -> u8 {
    if denominator <= 0.0 || !numerator.is_finite() || !denominator.is_finite() {
        return 0;
    }
    let percent = (numerator / denominator * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Extract a percentage from a transfer detail string.
///
/// A `n / d` fraction with matching (or absent) units is preferred; otherwise
/// an explicit `NN%` is used. Returns `None` when neither parses.
#[must_use]
pub fn extract_percent(detail: &str) -> Option<u8> {
    if let Some(captures) = fraction_regex().and_then(|re| re.captures(detail)) {
        let unit_num = captures.get(2).map(|m| m.as_str());
        let unit_den = captures.get(4).map(|m| m.as_str());
        // "5 / 10, 50%" has no units; "1.2 MiB / 4.8 MiB" has matching units.
        let same_units = unit_num == unit_den || unit_num.is_none();
        if same_units {
            let numerator = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            let denominator = captures.get(3).and_then(|m| m.as_str().parse::<f64>().ok());
            if let (Some(numerator), Some(denominator)) = (numerator, denominator) {
                return Some(percent_of(numerator, denominator));
            }
        }
    }

    explicit_percent_regex()
        .and_then(|re| re.captures(detail))
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|value| value.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// ProgressState + ProgressTracker
// ---------------------------------------------------------------------------

/// Current sync progress projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub message: String,
    pub percent: Option<u8>,
    pub last_update: Instant,
    pub expires_at: Instant,
    pub completed: bool,
}

/// Folds progress lines into an expiring [`ProgressState`].
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    state: Option<ProgressState>,
    idle_timeout: Duration,
    completion_timeout: Duration,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, DEFAULT_COMPLETION_TIMEOUT)
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new(idle_timeout: Duration, completion_timeout: Duration) -> Self {
        Self {
            state: None,
            idle_timeout,
            completion_timeout,
        }
    }

    /// Feed one line observed at `now`. Returns true when the visible state
    /// changed (including an expiry that happened before this line).
    pub fn observe(&mut self, text: &str, now: Instant) -> bool {
        let expired = self.expire(now);
        let update = if is_sync_line(text) {
            parse_sync_line(text)
        } else {
            parse_lifecycle_line(text, self.state.is_some())
        };
        match update {
            Some(update) => {
                self.apply(update, now);
                true
            }
            None => expired,
        }
    }

    /// Apply an already parsed update at `now`.
    pub fn apply(&mut self, update: ProgressUpdate, now: Instant) {
        let completed = matches!(update, ProgressUpdate::Completed(_));
        let window = if completed {
            self.completion_timeout
        } else {
            self.idle_timeout
        };
        self.state = Some(ProgressState {
            message: update.message(),
            percent: update.percent(),
            last_update: now,
            expires_at: now + window,
            completed,
        });
    }

    /// Drop the state if its window has elapsed. Returns true on transition
    /// to no progress.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.state {
            Some(state) if now >= state.expires_at => {
                self.state = None;
                true
            }
            _ => false,
        }
    }

    /// State as of the last mutation, without applying expiry.
    #[must_use]
    pub fn current(&self) -> Option<&ProgressState> {
        self.state.as_ref()
    }

    /// State as observed at `now`.
    #[must_use]
    pub fn state_at(&self, now: Instant) -> Option<&ProgressState> {
        self.state.as_ref().filter(|state| now < state.expires_at)
    }

    /// When the current state will expire, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.as_ref().map(|state| state.expires_at)
    }
}
