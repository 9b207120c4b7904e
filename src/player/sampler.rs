use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Periodic position sampling while playing.
///
/// The loop only sends a wake-up into the session's queue; the session reads
/// the engine itself, so sampling never touches state off the control loop.
#[derive(Debug)]
pub struct PositionSampler {
    interval: Duration,
    ticks: mpsc::UnboundedSender<()>,
    token: Option<CancellationToken>,
}

impl PositionSampler {
    pub fn new(interval: Duration, ticks: mpsc::UnboundedSender<()>) -> Self {
        Self {
            interval,
            ticks,
            token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let ticks = self.ticks.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        if ticks.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
            trace!("Position sampler stopped");
        });

        self.token = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for PositionSampler {
    fn drop(&mut self) {
        self.cancel();
    }
}
