//! Filtered views over the scrollback and the autoscroll controller.

use crate::classify::{Subsystem, Tag};
use crate::record::LogRecord;
use crate::scrollback::Scrollback;

/// Distance from the bottom (in the renderer's units) under which the viewer
/// counts as pinned to the newest record.
pub const DEFAULT_AUTOSCROLL_THRESHOLD: u32 = 50;

// ---------------------------------------------------------------------------
// FilterChannel
// ---------------------------------------------------------------------------

/// Predicate over record tags selecting what a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterChannel {
    #[default]
    All,
    /// Only records tagged with one subsystem.
    Subsystem(Subsystem),
    /// Errors and warnings.
    Problems,
    /// Locally echoed commands.
    Commands,
}

impl FilterChannel {
    #[must_use]
    pub fn matches(self, tag: Tag) -> bool {
        match self {
            Self::All => true,
            Self::Subsystem(subsystem) => tag == Tag::Subsystem(subsystem),
            Self::Problems => tag.is_problem(),
            Self::Commands => tag == Tag::LocalEcho,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Subsystem(subsystem) => subsystem.label(),
            Self::Problems => "problems",
            Self::Commands => "commands",
        }
    }

    /// Parse a channel label such as `all`, `sync`, or `problems`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Some(Self::All),
            "problems" | "errors" => Some(Self::Problems),
            "commands" | "echo" => Some(Self::Commands),
            other => Subsystem::parse(other).map(Self::Subsystem),
        }
    }
}

// ---------------------------------------------------------------------------
// ViewFilter
// ---------------------------------------------------------------------------

/// Active channel selection. Holds no records; every read is derived from
/// the scrollback it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewFilter {
    channel: FilterChannel,
}

impl ViewFilter {
    #[must_use]
    pub fn new(channel: FilterChannel) -> Self {
        Self { channel }
    }

    #[must_use]
    pub fn channel(&self) -> FilterChannel {
        self.channel
    }

    /// Switch channel. Returns true when the selection changed.
    pub fn set_channel(&mut self, channel: FilterChannel) -> bool {
        let changed = self.channel != channel;
        self.channel = channel;
        changed
    }

    pub fn visible<'a>(&self, scrollback: &'a Scrollback) -> impl Iterator<Item = &'a LogRecord> {
        let channel = self.channel;
        scrollback.iter().filter(move |r| channel.matches(r.tag()))
    }

    #[must_use]
    pub fn visible_count(&self, scrollback: &Scrollback) -> usize {
        self.visible(scrollback).count()
    }
}

// ---------------------------------------------------------------------------
// Autoscroll
// ---------------------------------------------------------------------------

/// What the renderer should do after the content grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    /// Jump to the new bottom at this offset.
    FollowToBottom { offset: u32 },
    /// Leave the viewer's offset where it is.
    Hold { offset: u32 },
}

/// Scroll geometry reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    /// Distance from the top of the content to the top of the viewport.
    pub offset: u32,
    pub content_height: u32,
    pub viewport_height: u32,
}

impl ScrollMetrics {
    #[must_use]
    pub fn distance_from_bottom(&self) -> u32 {
        self.content_height
            .saturating_sub(self.offset)
            .saturating_sub(self.viewport_height)
    }

    #[must_use]
    pub fn bottom_offset(&self) -> u32 {
        self.content_height.saturating_sub(self.viewport_height)
    }
}

/// Tracks whether the viewer follows the newest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autoscroll {
    pinned: bool,
    threshold: u32,
    metrics: ScrollMetrics,
}

impl Default for Autoscroll {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSCROLL_THRESHOLD)
    }
}

impl Autoscroll {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            pinned: true,
            threshold,
            metrics: ScrollMetrics::default(),
        }
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    #[must_use]
    pub fn metrics(&self) -> ScrollMetrics {
        self.metrics
    }

    /// Record a scroll event and recompute the pinned flag.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        self.metrics = metrics;
        self.pinned = metrics.distance_from_bottom() < self.threshold;
        self.pinned
    }

    /// Content height changed. Pinned viewers follow to the bottom; unpinned
    /// viewers keep their offset.
    pub fn on_content_resized(&mut self, content_height: u32) -> ScrollAction {
        self.metrics.content_height = content_height;
        if self.pinned {
            let offset = self.metrics.bottom_offset();
            self.metrics.offset = offset;
            ScrollAction::FollowToBottom { offset }
        } else {
            ScrollAction::Hold {
                offset: self.metrics.offset,
            }
        }
    }

    /// Where the viewer is now: at the bottom when pinned, held otherwise.
    #[must_use]
    pub fn action(&self) -> ScrollAction {
        if self.pinned {
            ScrollAction::FollowToBottom {
                offset: self.metrics.bottom_offset(),
            }
        } else {
            ScrollAction::Hold {
                offset: self.metrics.offset,
            }
        }
    }

    /// Jump to the bottom and pin.
    pub fn scroll_to_bottom(&mut self) -> u32 {
        self.pinned = true;
        self.metrics.offset = self.metrics.bottom_offset();
        self.metrics.offset
    }
}
