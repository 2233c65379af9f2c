//! Line-mode rendering of console records and progress.

use std::io::{self, Write};

use chrono::{Local, TimeZone};

use roam_console::{
    ConsoleEvent, ConsoleSnapshot, FilterChannel, LogRecord, ProgressState, RejectReason,
};

const TAG_WIDTH: usize = 7;

/// Writes console events as text lines, showing only records that pass the
/// active filter.
pub struct ConsoleView<W: Write> {
    out: W,
    channel: FilterChannel,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            channel: FilterChannel::All,
        }
    }

    pub fn on_event(&mut self, event: &ConsoleEvent) -> io::Result<()> {
        match event {
            ConsoleEvent::Appended { records, .. } => {
                let channel = self.channel;
                for record in records.iter().filter(|r| channel.matches(r.tag())) {
                    writeln!(self.out, "{}", format_record(record, &Local))?;
                }
            }
            ConsoleEvent::Progress(state) => {
                writeln!(self.out, "{}", format_progress(state.as_ref()))?;
            }
            ConsoleEvent::CommandRejected(reason) => {
                writeln!(self.out, "{}", format_rejection(*reason))?;
            }
        }
        self.out.flush()
    }

    /// Re-render the whole filtered view after a channel switch.
    pub fn render_snapshot(&mut self, snapshot: &ConsoleSnapshot) -> io::Result<()> {
        self.channel = snapshot.channel;
        writeln!(
            self.out,
            "{}",
            format_filter_header(snapshot.channel, snapshot.visible.len(), snapshot.total)
        )?;
        for record in &snapshot.visible {
            writeln!(self.out, "{}", format_record(record, &Local))?;
        }
        if let Some(state) = &snapshot.progress {
            writeln!(self.out, "{}", format_progress(Some(state)))?;
        }
        self.out.flush()
    }

    pub fn note(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "! {message}")?;
        self.out.flush()
    }

    pub fn channel(&self) -> FilterChannel {
        self.channel
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `HH:MM:SS <tag> <text>` with the timestamp shown in `tz`.
pub fn format_record<Tz>(record: &LogRecord, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let at = record.received_at().with_timezone(tz);
    format!(
        "{} {:<width$} {}",
        at.format("%H:%M:%S"),
        record.tag().label(),
        record.text(),
        width = TAG_WIDTH
    )
}

/// `~ sync: <message> [<percent>%]`, or a cleared marker.
pub fn format_progress(state: Option<&ProgressState>) -> String {
    match state {
        Some(state) => match state.percent {
            Some(percent) => format!("~ sync: {} [{percent}%]", state.message),
            None => format!("~ sync: {}", state.message),
        },
        None => "~ sync: cleared".to_owned(),
    }
}

pub fn format_rejection(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::NotRunning => "! server is offline; command not sent",
        RejectReason::Empty => "! empty command ignored",
    }
}

pub fn format_filter_header(channel: FilterChannel, visible: usize, total: usize) -> String {
    format!("-- filter: {} ({visible}/{total}) --", channel.label())
}

#[cfg(test)]
mod tests {
    use super::{format_filter_header, format_progress, format_record, format_rejection};
    use chrono::{TimeZone, Utc};
    use roam_console::record::StagedLine;
    use roam_console::{FilterChannel, LogRecord, ProgressState, RejectReason};
    use tokio::time::Instant;

    fn record(text: &str) -> LogRecord {
        let received_at = match Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).single() {
            Some(at) => at,
            None => panic!("invalid timestamp"),
        };
        LogRecord::from_staged(StagedLine {
            sequence: 1,
            received_at,
            text: text.to_owned(),
        })
    }

    #[test]
    fn record_line_has_time_tag_and_text() {
        assert_eq!(
            format_record(&record("[MC]: Done!"), &Utc),
            "13:04:05 game    [MC]: Done!"
        );
        assert_eq!(
            format_record(&record("Error: boom"), &Utc),
            "13:04:05 error   Error: boom"
        );
    }

    #[test]
    fn progress_line_shows_percent_when_known() {
        let now = Instant::now();
        let mut state = ProgressState {
            message: "Overall: 5 / 10".to_owned(),
            percent: Some(50),
            last_update: now,
            expires_at: now,
            completed: false,
        };
        assert_eq!(format_progress(Some(&state)), "~ sync: Overall: 5 / 10 [50%]");
        state.percent = None;
        assert_eq!(format_progress(Some(&state)), "~ sync: Overall: 5 / 10");
        assert_eq!(format_progress(None), "~ sync: cleared");
    }

    #[test]
    fn misc_lines() {
        assert_eq!(
            format_rejection(RejectReason::NotRunning),
            "! server is offline; command not sent"
        );
        assert_eq!(
            format_filter_header(FilterChannel::Problems, 2, 9),
            "-- filter: problems (2/9) --"
        );
    }
}
