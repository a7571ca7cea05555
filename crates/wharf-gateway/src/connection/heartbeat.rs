//! Heartbeat scheduling and latency tracking

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Background timer that asks the receive loop to send a heartbeat
///
/// The task only emits ticks; the loop owns the socket and builds the frame
/// from the current sequence. Dropping the heartbeater aborts its task.
#[derive(Debug)]
pub struct Heartbeater {
    interval: Duration,
    task: JoinHandle<()>,
}

impl Heartbeater {
    /// Start ticking: first after a random delay in `[0, interval)`, then
    /// every `interval`
    pub fn spawn(interval: Duration, ticks: mpsc::Sender<()>) -> Self {
        let first = first_delay(interval);
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + first, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                if ticks.send(()).await.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            first_ms = first.as_millis() as u64,
            "Heartbeat scheduled"
        );

        Self { interval, task }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the timer; no further ticks are sent
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Heartbeater {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn first_delay(interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..interval)
}

/// Round-trip time between a heartbeat and its ack
#[derive(Debug, Clone, Copy, Default)]
pub struct Latency {
    sent_at: Option<Instant>,
    acked: bool,
    recent: Option<Duration>,
    heartbeats: u64,
}

impl Latency {
    pub fn record_send(&mut self, at: Instant) {
        self.sent_at = Some(at);
        self.acked = false;
        self.heartbeats += 1;
    }

    /// Record an ack and return the measured round trip
    pub fn record_ack(&mut self, at: Instant) -> Option<Duration> {
        let sent_at = self.sent_at?;
        if self.acked {
            return None;
        }
        let rtt = at.saturating_duration_since(sent_at);
        self.acked = true;
        self.recent = Some(rtt);
        Some(rtt)
    }

    /// Most recent round trip, if any heartbeat has been acked
    pub fn recent(&self) -> Option<Duration> {
        self.recent
    }

    /// Whether the last heartbeat is still waiting for its ack
    pub fn awaiting_ack(&self) -> bool {
        self.sent_at.is_some() && !self.acked
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }
}
