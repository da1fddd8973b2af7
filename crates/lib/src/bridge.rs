//! Request/response bridge over the external medium.
//!
//! A perpetual watcher task samples the medium on a fixed interval and sorts
//! each sample into noise, self-echo, or a genuine reply. One handler at a
//! time publishes a transcript and waits for the first changed, non-echo
//! sample to land in the single-slot mailbox.

use crate::medium::{Medium, MediumError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;

/// Failure modes of a publish-wait-drain exchange.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No reply appeared on the medium within the configured deadline.
    #[error("no reply appeared on the medium within {0} seconds")]
    Timeout(u64),

    /// Another exchange is already publishing and waiting; overlapping
    /// exchanges would corrupt each other's echo reference and mailbox.
    #[error("an exchange is already in flight")]
    Busy,

    #[error(transparent)]
    Medium(#[from] MediumError),
}

/// The four pieces of shared state. They move together under one lock so a
/// handler's arm step and the watcher's classify step never interleave.
#[derive(Default)]
struct Shared {
    /// Transcript most recently published by a handler; the echo reference.
    outgoing: String,

    /// Single-slot mailbox. A later delivery overwrites an undrained one
    /// (latest wins); intermediate values are dropped silently.
    mailbox: Option<String>,

    /// Edge-triggered readiness: set on delivery, cleared on arm and drain.
    ready: bool,

    /// Last sample the watcher delivered; suppresses repeats of an
    /// unchanged medium value. Never reset by handlers.
    last_seen: String,
}

/// Bridge between the HTTP handlers and the human operator on the other side
/// of the medium. Shared by reference count with the watcher task.
pub struct Bridge {
    medium: Arc<dyn Medium>,
    shared: Mutex<Shared>,
    delivered: Notify,
    /// Capacity-1 gate serializing whole exchanges; a second concurrent
    /// request is rejected rather than racing on the mailbox.
    gate: Semaphore,
    poll_interval: Duration,
    /// None means wait forever.
    wait_timeout: Option<Duration>,
}

impl Bridge {
    pub fn new(
        medium: Arc<dyn Medium>,
        poll_interval: Duration,
        wait_timeout: Option<Duration>,
    ) -> Self {
        Self {
            medium,
            shared: Mutex::new(Shared::default()),
            delivered: Notify::new(),
            gate: Semaphore::new(1),
            poll_interval,
            wait_timeout,
        }
    }

    /// Publish `transcript` to the medium and wait for the operator's reply.
    ///
    /// Fails fast with [`BridgeError::Busy`] when another exchange holds the
    /// gate, and with [`BridgeError::Timeout`] when the configured deadline
    /// passes with no delivery.
    pub async fn exchange(&self, transcript: &str) -> Result<String, BridgeError> {
        let _permit = self.gate.try_acquire().map_err(|_| BridgeError::Busy)?;
        self.arm(transcript).await;
        // The echo reference must be in place before the value can appear on
        // the medium, or the watcher could classify our own publish as a reply.
        self.medium.set_text(transcript)?;
        self.wait_for_delivery().await
    }

    /// Record the outgoing transcript and clear any stale delivery.
    async fn arm(&self, transcript: &str) {
        let mut shared = self.shared.lock().await;
        shared.outgoing = transcript.to_string();
        shared.mailbox = None;
        shared.ready = false;
    }

    /// Drain the mailbox if a delivery is pending, clearing readiness.
    async fn take_delivery(&self) -> Option<String> {
        let mut shared = self.shared.lock().await;
        if !shared.ready {
            return None;
        }
        shared.ready = false;
        shared.mailbox.take()
    }

    async fn wait_for_delivery(&self) -> Result<String, BridgeError> {
        let deadline = self
            .wait_timeout
            .map(|limit| tokio::time::Instant::now() + limit);
        loop {
            // Register interest before checking, so a delivery landing between
            // the check and the await still wakes us.
            let notified = self.delivered.notified();
            if let Some(value) = self.take_delivery().await {
                return Ok(value);
            }
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        let secs = self.wait_timeout.map(|t| t.as_secs()).unwrap_or(0);
                        return Err(BridgeError::Timeout(secs));
                    }
                }
            }
        }
    }

    /// Classify one sample of the medium. A sample equal to the last
    /// delivered value (unchanged) or to the current outgoing transcript
    /// (self-echo) is discarded; anything else is delivered into the mailbox.
    /// Returns whether a delivery happened.
    pub async fn observe_sample(&self, sample: &str) -> bool {
        {
            let mut shared = self.shared.lock().await;
            if sample == shared.last_seen || sample == shared.outgoing {
                return false;
            }
            shared.mailbox = Some(sample.to_string());
            shared.ready = true;
            shared.last_seen = sample.to_string();
        }
        self.delivered.notify_one();
        true
    }

    /// Start the perpetual sampling loop. Sampling errors are logged and the
    /// loop keeps going; a dead watcher would starve every future exchange.
    /// The task runs until aborted or the process exits.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let bridge = self.clone();
        log::info!(
            "medium watcher started (sampling every {} ms)",
            bridge.poll_interval.as_millis()
        );
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(bridge.poll_interval).await;
                match bridge.medium.get_text() {
                    Ok(sample) => {
                        if bridge.observe_sample(&sample).await {
                            log::info!("reply picked up from the medium");
                        }
                    }
                    Err(e) => log::warn!("sampling the medium failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::InMemoryMedium;

    fn test_bridge(wait_timeout: Option<Duration>) -> (Arc<Bridge>, InMemoryMedium) {
        let medium = InMemoryMedium::new();
        let bridge = Arc::new(Bridge::new(
            Arc::new(medium.clone()),
            Duration::from_millis(10),
            wait_timeout,
        ));
        (bridge, medium)
    }

    #[tokio::test]
    async fn echo_of_the_published_transcript_is_discarded() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        assert!(!bridge.observe_sample("user: hello").await);
        assert_eq!(bridge.take_delivery().await, None);
    }

    #[tokio::test]
    async fn unchanged_sample_is_discarded() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        assert!(bridge.observe_sample("Hi there!").await);
        assert!(!bridge.observe_sample("Hi there!").await);
    }

    #[tokio::test]
    async fn changed_non_echo_sample_is_delivered() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        assert!(!bridge.observe_sample("user: hello").await);
        assert!(bridge.observe_sample("Hi there!").await);
        assert_eq!(bridge.take_delivery().await, Some("Hi there!".to_string()));
    }

    #[tokio::test]
    async fn later_delivery_overwrites_an_undrained_mailbox() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        assert!(bridge.observe_sample("first reply").await);
        assert!(bridge.observe_sample("second reply").await);
        assert_eq!(
            bridge.take_delivery().await,
            Some("second reply".to_string())
        );
        // Readiness was consumed with the drain; nothing is left behind.
        assert_eq!(bridge.take_delivery().await, None);
    }

    #[tokio::test]
    async fn rearming_without_a_delivery_leaves_the_mailbox_empty() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        bridge.arm("user: hello again").await;
        assert_eq!(bridge.take_delivery().await, None);
    }

    #[tokio::test]
    async fn rearming_drops_a_stale_delivery_from_the_previous_exchange() {
        let (bridge, _medium) = test_bridge(None);
        bridge.arm("user: hello").await;
        assert!(bridge.observe_sample("stale reply").await);
        bridge.arm("user: next question").await;
        assert_eq!(bridge.take_delivery().await, None);
    }

    #[tokio::test]
    async fn exchange_round_trips_an_external_write() {
        let (bridge, medium) = test_bridge(Some(Duration::from_secs(5)));
        let _watcher = bridge.spawn_watcher();

        let operator_medium = medium.clone();
        tokio::spawn(async move {
            // Give the watcher a few ticks to see (and ignore) the transcript.
            tokio::time::sleep(Duration::from_millis(50)).await;
            operator_medium.set_text("Hi there!").expect("operator write");
        });

        let reply = bridge.exchange("user: hello").await.expect("exchange");
        assert_eq!(reply, "Hi there!");
        assert_eq!(medium.get_text().expect("read"), "Hi there!");
    }

    #[tokio::test]
    async fn exchange_times_out_when_no_reply_ever_arrives() {
        let (bridge, _medium) = test_bridge(Some(Duration::from_millis(100)));
        let _watcher = bridge.spawn_watcher();
        match bridge.exchange("user: hello").await {
            Err(BridgeError::Timeout(_)) => {}
            other => panic!("expected Timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn second_exchange_is_rejected_while_one_is_in_flight() {
        let (bridge, _medium) = test_bridge(Some(Duration::from_secs(5)));

        let first = bridge.clone();
        let in_flight = tokio::spawn(async move { first.exchange("user: hello").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        match bridge.exchange("user: impatient").await {
            Err(BridgeError::Busy) => {}
            other => panic!("expected Busy, got {:?}", other.map(|_| ())),
        }

        // Unblock the first exchange so the task finishes cleanly.
        assert!(bridge.observe_sample("Hi there!").await);
        let reply = in_flight.await.expect("join").expect("exchange");
        assert_eq!(reply, "Hi there!");
    }
}
