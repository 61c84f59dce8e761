//! Live update broadcasting
//!
//! A thin wrapper over [`tokio::sync::broadcast`] that fans updates out to
//! any number of subscribers and can rate-limit how often updates go out.
//! Updates published while no one is subscribed are silently dropped.

use crate::config::NotifierConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

/// Outcome of [`Notifier::publish_if_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to this many subscribers (possibly zero)
    Sent(usize),
    /// Dropped because the previous send was too recent
    Coalesced,
}

pub struct Notifier<T: Clone> {
    sender: broadcast::Sender<T>,
    min_interval: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl<T: Clone> Notifier<T> {
    pub fn new(capacity: usize, min_interval: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Notify("channel capacity must be at least 1".into()));
        }
        let (sender, _) = broadcast::channel(capacity);
        Ok(Self {
            sender,
            min_interval,
            last_sent: None,
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let secs = i64::try_from(config.min_interval_secs)
            .map_err(|_| Error::Notify("min_interval_secs out of range".into()))?;
        Self::new(config.capacity, Duration::seconds(secs))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send unconditionally. Returns the number of subscribers reached.
    pub fn publish(&mut self, update: T) -> usize {
        self.publish_at(update, Utc::now())
    }

    /// True when a send at `now` would not be coalesced.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_sent {
            Some(last) => now - last >= self.min_interval,
            None => true,
        }
    }

    /// Send only if `min_interval` has passed since the last send.
    pub fn publish_if_due(&mut self, update: T, now: DateTime<Utc>) -> Delivery {
        if !self.is_due(now) {
            tracing::trace!("Coalesced update inside minimum interval");
            return Delivery::Coalesced;
        }
        Delivery::Sent(self.publish_at(update, now))
    }

    fn publish_at(&mut self, update: T, now: DateTime<Utc>) -> usize {
        self.last_sent = Some(now);
        // Err only means there are no receivers right now
        self.sender.send(update).unwrap_or(0)
    }
}
