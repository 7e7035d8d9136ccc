use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

/// Drives a periodic source. The source fetches once per completed tick.
#[async_trait::async_trait]
pub trait Schedule: Send + 'static {
    /// Wait for the next refresh; `false` ends the source.
    async fn tick(&mut self) -> bool;
}

/// Fires immediately, then every `period`. Missed ticks are delayed rather
/// than replayed in a burst.
pub struct IntervalSchedule {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalSchedule {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }
}

#[async_trait::async_trait]
impl Schedule for IntervalSchedule {
    async fn tick(&mut self) -> bool {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
        true
    }
}

/// Fires a fixed number of times without waiting.
pub struct Ticks {
    remaining: usize,
}

impl Ticks {
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }

    pub fn once() -> Self {
        Self::new(1)
    }
}

#[async_trait::async_trait]
impl Schedule for Ticks {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
