//! Display-tag classifier for console lines.
//!
//! Lines arrive from several producers (the managed server, the sync tool,
//! the tunnel agent, the backend itself) with no framing beyond loose textual
//! markers. The classifier maps each line to a [`Tag`] with an ordered,
//! first-match-wins marker table:
//!
//! ```text
//! error -> warning -> bracketed subsystem -> success -> notice -> plain
//! ```
//!
//! Classification is pure and total: every input, including the empty string,
//! yields a tag.

// ---------------------------------------------------------------------------
// Subsystem
// ---------------------------------------------------------------------------

/// Producer identified by a bracketed line prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// The managed game server (`[MC]`).
    Game,
    /// Cloud sync tool output (`[Sync]`).
    Sync,
    /// Public tunnel agent (`[Playit]`).
    Tunnel,
}

impl Subsystem {
    /// All subsystems in marker-match order.
    pub const ALL: [Subsystem; 3] = [Subsystem::Game, Subsystem::Sync, Subsystem::Tunnel];

    /// Bracketed marker that identifies the subsystem inside a line.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Game => "[MC]",
            Self::Sync => "[Sync]",
            Self::Tunnel => "[Playit]",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Sync => "sync",
            Self::Tunnel => "tunnel",
        }
    }

    /// Parse a label (case-insensitive).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// Display classification of a scrollback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Error,
    Warning,
    Subsystem(Subsystem),
    Success,
    /// Operator-relevant information (public address announcements).
    Notice,
    /// Unclassified line.
    Plain,
    /// Locally issued command. Never produced by [`classify`].
    LocalEcho,
}

impl Tag {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Subsystem(subsystem) => subsystem.label(),
            Self::Success => "success",
            Self::Notice => "notice",
            Self::Plain => "plain",
            Self::LocalEcho => "echo",
        }
    }

    /// Whether this tag is an error or a warning.
    #[must_use]
    pub fn is_problem(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

// ---------------------------------------------------------------------------
// Marker tables
// ---------------------------------------------------------------------------

const ERROR_MARKERS: &[&str] = &["Error", "ERROR", "fail", "FAIL", "\u{274c}"];
const WARNING_MARKERS: &[&str] = &["Warn", "WARN", "\u{26a0}"];
const SUCCESS_MARKERS: &[&str] = &["Success", "\u{2705}", "\u{1f680}"];
const NOTICE_MARKERS: &[&str] = &["Public"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Classify a line into its display tag.
#[must_use]
pub fn classify(text: &str) -> Tag {
    if text.is_empty() {
        return Tag::Plain;
    }
    if contains_any(text, ERROR_MARKERS) {
        return Tag::Error;
    }
    if contains_any(text, WARNING_MARKERS) {
        return Tag::Warning;
    }
    if let Some(subsystem) = Subsystem::ALL
        .into_iter()
        .find(|s| text.contains(s.marker()))
    {
        return Tag::Subsystem(subsystem);
    }
    if contains_any(text, SUCCESS_MARKERS) {
        return Tag::Success;
    }
    if contains_any(text, NOTICE_MARKERS) {
        return Tag::Notice;
    }
    Tag::Plain
}

/// Classify raw bytes, decoding lossily first.
#[must_use]
pub fn classify_bytes(raw: &[u8]) -> Tag {
    classify(&String::from_utf8_lossy(raw))
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_bytes, Subsystem, Tag};

    #[test]
    fn error_marker_wins_over_success_marker() {
        assert_eq!(classify("Error: retry succeeded"), Tag::Error);
        assert_eq!(classify("\u{274c} Upload failed! Success not recorded"), Tag::Error);
    }

    #[test]
    fn warning_wins_over_subsystem_marker() {
        assert_eq!(
            classify("[MC]: [Server thread/WARN]: Can't keep up!"),
            Tag::Warning
        );
    }

    #[test]
    fn subsystem_markers_map_to_subsystems() {
        assert_eq!(classify("[MC]: Preparing spawn area: 83%"), Tag::Subsystem(Subsystem::Game));
        assert_eq!(
            classify("[Sync]: Transferred: 5 / 10, 50%"),
            Tag::Subsystem(Subsystem::Sync)
        );
        assert_eq!(
            classify("[Playit]: tunnel running"),
            Tag::Subsystem(Subsystem::Tunnel)
        );
    }

    #[test]
    fn subsystem_wins_over_success() {
        assert_eq!(
            classify("[Sync]: \u{2705} Download Complete"),
            Tag::Subsystem(Subsystem::Sync)
        );
    }

    #[test]
    fn success_then_notice_then_plain() {
        assert_eq!(classify("\u{2705} Lock cleanup complete"), Tag::Success);
        assert_eq!(classify("\u{1f680} Starting Server on Port 25565..."), Tag::Success);
        assert_eq!(classify("\u{1f310} Public Address: example.gl.joinmc.link"), Tag::Notice);
        assert_eq!(classify("Instance directory missing, creating"), Tag::Plain);
    }

    #[test]
    fn degenerate_inputs_classify_as_plain() {
        assert_eq!(classify(""), Tag::Plain);
        assert_eq!(classify("   "), Tag::Plain);
        assert_eq!(classify_bytes(&[0xff, 0xfe, 0x00]), Tag::Plain);
        let long = "x".repeat(1 << 16);
        assert_eq!(classify(&long), Tag::Plain);
    }

    #[test]
    fn classification_is_stable_for_identical_input() {
        let line = "[Playit]: \u{26a0}\u{fe0f} Connection error detected";
        assert_eq!(classify(line), classify(line));
        assert_eq!(classify(line), Tag::Warning);
    }

    #[test]
    fn labels_and_parse_round_trip_for_subsystems() {
        for subsystem in Subsystem::ALL {
            assert_eq!(Subsystem::parse(subsystem.label()), Some(subsystem));
        }
        assert_eq!(Subsystem::parse("SYNC"), Some(Subsystem::Sync));
        assert_eq!(Subsystem::parse("db"), None);
        assert_eq!(Tag::LocalEcho.label(), "echo");
        assert!(Tag::Warning.is_problem());
        assert!(!Tag::Notice.is_problem());
    }
}
