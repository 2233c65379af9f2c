//! Named push channels with independent subscribers.
//!
//! A backend publishes raw lines on a channel (conventionally
//! [`SERVER_LOG_CHANNEL`]); every live subscriber receives every line in
//! publish order. Queues are unbounded per subscriber so a slow consumer
//! never loses lines; dropping a [`LogSubscription`] unsubscribes it.
//!
//! Lines are stamped once at publish, so a subscriber that falls behind still
//! sees each line's true arrival time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Default channel carrying managed-server output.
pub const SERVER_LOG_CHANNEL: &str = "server-log";

/// A line as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLine {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl PublishedLine {
    /// Stamp `text` with the current wall clock.
    #[must_use]
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

type Subscribers = HashMap<String, Vec<mpsc::UnboundedSender<PublishedLine>>>;

/// Fan-out hub for log lines.
#[derive(Clone, Default)]
pub struct LogHub {
    channels: Arc<Mutex<Subscribers>>,
}

impl std::fmt::Debug for LogHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = lock(&self.channels);
        let counts: HashMap<&str, usize> = guard
            .iter()
            .map(|(name, subs)| (name.as_str(), subs.len()))
            .collect();
        f.debug_struct("LogHub").field("channels", &counts).finish()
    }
}

fn lock(channels: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    match channels.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl LogHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber on `channel`.
    #[must_use]
    pub fn subscribe(&self, channel: &str) -> LogSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.channels)
            .entry(channel.to_owned())
            .or_default()
            .push(tx);
        LogSubscription {
            channel: channel.to_owned(),
            rx,
        }
    }

    /// Deliver `line` to every live subscriber of `channel`. Returns the
    /// number of subscribers reached.
    pub fn publish(&self, channel: &str, line: impl Into<String>) -> usize {
        let line = PublishedLine::now(line);
        let mut guard = lock(&self.channels);
        let Some(subscribers) = guard.get_mut(channel) else {
            return 0;
        };
        subscribers.retain(|tx| tx.send(line.clone()).is_ok());
        subscribers.len()
    }

    /// Live subscriber count for `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let mut guard = lock(&self.channels);
        match guard.get_mut(channel) {
            Some(subscribers) => {
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.len()
            }
            None => 0,
        }
    }

    /// Drop every subscriber sender, ending all subscriptions.
    pub fn close(&self) {
        lock(&self.channels).clear();
    }
}

/// Receiving end of a hub subscription.
#[derive(Debug)]
pub struct LogSubscription {
    channel: String,
    rx: mpsc::UnboundedReceiver<PublishedLine>,
}

impl LogSubscription {
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next line text, or `None` once the hub dropped this subscriber.
    pub async fn recv(&mut self) -> Option<String> {
        self.recv_stamped().await.map(|line| line.text)
    }

    /// Next line with its publish timestamp.
    pub async fn recv_stamped(&mut self) -> Option<PublishedLine> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<String> {
        self.try_recv_stamped().map(|line| line.text)
    }

    pub fn try_recv_stamped(&mut self) -> Option<PublishedLine> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Lines already queued stay readable.
    pub fn unsubscribe(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::{LogHub, SERVER_LOG_CHANNEL};
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn every_subscriber_sees_every_line_in_order() {
        let hub = LogHub::new();
        let mut terminal = hub.subscribe(SERVER_LOG_CHANNEL);
        let mut progress = hub.subscribe(SERVER_LOG_CHANNEL);

        assert_eq!(hub.publish(SERVER_LOG_CHANNEL, "a"), 2);
        assert_eq!(hub.publish(SERVER_LOG_CHANNEL, "b"), 2);

        for sub in [&mut terminal, &mut progress] {
            assert_eq!(sub.try_recv().as_deref(), Some("a"));
            assert_eq!(sub.try_recv().as_deref(), Some("b"));
            assert_eq!(sub.try_recv(), None);
        }
    }

    #[test]
    fn channels_are_isolated() {
        let hub = LogHub::new();
        let mut server = hub.subscribe(SERVER_LOG_CHANNEL);
        assert_eq!(hub.publish("other", "x"), 0);
        assert_eq!(server.try_recv(), None);
        assert_eq!(server.channel(), SERVER_LOG_CHANNEL);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = LogHub::new();
        let kept = hub.subscribe(SERVER_LOG_CHANNEL);
        let dropped = hub.subscribe(SERVER_LOG_CHANNEL);
        drop(dropped);
        assert_eq!(hub.publish(SERVER_LOG_CHANNEL, "x"), 1);
        assert_eq!(hub.subscriber_count(SERVER_LOG_CHANNEL), 1);
        drop(kept);
        assert_eq!(hub.subscriber_count(SERVER_LOG_CHANNEL), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = LogHub::new();
        let mut sub = hub.subscribe(SERVER_LOG_CHANNEL);
        hub.publish(SERVER_LOG_CHANNEL, "queued");
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(hub.publish(SERVER_LOG_CHANNEL, "late"), 0);
        assert_eq!(sub.try_recv().as_deref(), Some("queued"));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn lines_keep_publish_time_while_queued() {
        let hub = LogHub::new();
        let mut sub = hub.subscribe(SERVER_LOG_CHANNEL);
        let before = Utc::now();
        hub.publish(SERVER_LOG_CHANNEL, "queued");
        let after = Utc::now();
        std::thread::sleep(Duration::from_millis(20));

        let line = match sub.try_recv_stamped() {
            Some(line) => line,
            None => panic!("line should be queued"),
        };
        assert_eq!(line.text, "queued");
        assert!(line.received_at >= before);
        assert!(line.received_at <= after);
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let hub = LogHub::new();
        let mut sub = hub.subscribe(SERVER_LOG_CHANNEL);
        hub.close();
        assert_eq!(sub.recv().await, None);
    }
}
