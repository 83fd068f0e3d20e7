// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Timers
//!
//! A `Timer` waits for an initial delay, then fires every `period`, either
//! forever or a fixed number of times. Ticks are numbered from 0.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Shortest period a timer accepts
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub(crate) name: String,
    pub(crate) delay: Duration,
    pub(crate) period: Duration,
    pub(crate) repeat: Option<u64>,
}

impl Timer {
    /// Fires every second, forever, starting immediately.
    pub fn new(name: &str) -> Timer {
        Timer {
            name: name.to_owned(),
            delay: Duration::ZERO,
            period: Duration::from_secs(1),
            repeat: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Time between ticks, never shorter than `MIN_PERIOD`.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period.max(MIN_PERIOD);
        self
    }

    /// Stops after `count` ticks.
    pub fn repeat(mut self, count: u64) -> Self {
        self.repeat = Some(count);
        self
    }

    /// Runs `on_tick` for every tick and returns the number of ticks fired.
    ///
    /// A slow `on_tick` delays the following ticks instead of bunching them.
    pub async fn run<F, Fut>(&self, mut on_tick: F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        debug!(timer = self.name, "timer armed");
        tokio::time::sleep(self.delay).await;

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fired = 0;
        while !matches!(self.repeat, Some(max) if fired >= max) {
            interval.tick().await;
            on_tick(fired).await;
            fired += 1;
        }

        debug!(timer = self.name, fired, "timer finished");
        fired
    }
}

/// Hands out sequential numbers starting at 0.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Logs a sequential number on every tick of `timer`.
pub async fn sequence_route(timer: Timer, counter: &SequenceCounter) -> u64 {
    timer
        .run(move |_| async move {
            info!(number = counter.next(), "sequential number");
        })
        .await
}

/// Logs a fixed line on every tick of `timer`.
pub async fn greeting_route(timer: Timer, text: &str) -> u64 {
    timer
        .run(move |_| async move {
            info!("{}", text);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn repeat_count_bounds_the_ticks() {
        let ticks = Mutex::new(vec![]);
        let fired = Timer::new("test")
            .repeat(3)
            .run(|tick| {
                ticks.lock().unwrap().push(tick);
                async {}
            })
            .await;

        assert_eq!(fired, 3);
        assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_for_delay_then_ticks_follow_period() {
        let start = Instant::now();
        let stamps = Mutex::new(vec![]);

        Timer::new("test")
            .delay(Duration::from_secs(2))
            .period(Duration::from_secs(3))
            .repeat(2)
            .run(|_| {
                stamps.lock().unwrap().push(start.elapsed());
                async {}
            })
            .await;

        assert_eq!(
            *stamps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(5)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_raised_to_the_minimum() {
        let timer = Timer::new("zero").period(Duration::ZERO).repeat(3);
        assert_eq!(timer.period, MIN_PERIOD);

        let start = Instant::now();
        let fired = timer.run(|_| async {}).await;

        assert_eq!(fired, 3);
        assert_eq!(start.elapsed(), MIN_PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_route_counts_from_zero() {
        let counter = SequenceCounter::new();
        sequence_route(Timer::new("seq").repeat(4), &counter).await;
        assert_eq!(counter.next(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timer_keeps_firing() {
        let counter = SequenceCounter::new();
        let res = tokio::time::timeout(
            Duration::from_millis(10_500),
            sequence_route(Timer::new("seq"), &counter),
        )
        .await;

        assert!(res.is_err());
        assert_eq!(counter.next(), 11);
    }
}
