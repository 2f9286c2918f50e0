//! Implements an asynchronous heartbeat

use std::{task::Poll, time::Duration};

use futures_util::Stream;
use pin_project_lite::pin_project;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

pin_project! {
    /// A wrapper over an `Option<IntervalStream>` which will never tick ready if the underlying
    /// `Interval` is `None`
    #[derive(Debug)]
    pub struct HeartBeat {
        #[pin]
        interval: Option<IntervalStream>
    }
}

impl HeartBeat {
    /// A [`HeartBeat`] that will never yield `Poll::Ready(_)` with `StreamExt::next()`
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// A [`HeartBeat`] that first ticks one `period` from now and then once per `period`
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(IntervalStream::new(interval)),
        }
    }

    /// Pushes the next tick one full period into the future. Called whenever
    /// a frame is sent, so heartbeats only fill silence
    pub fn reset(&mut self) {
        if let Some(stream) = &mut self.interval {
            stream.as_mut().reset();
        }
    }

    /// Whether heartbeats are enabled
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }
}

impl Stream for HeartBeat {
    type Item = Instant;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();
        match this.interval.as_pin_mut() {
            Some(stream) => stream.poll_next(cx),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::time::Instant;

    use super::HeartBeat;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_away() {
        let start = Instant::now();
        let mut heartbeat = HeartBeat::new(Duration::from_secs(5));
        heartbeat.next().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        heartbeat.next().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_postpones_the_tick() {
        let start = Instant::now();
        let mut heartbeat = HeartBeat::new(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(3)).await;
        heartbeat.reset();
        heartbeat.next().await;
        assert_eq!(start.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn never_does_not_tick() {
        let mut heartbeat = HeartBeat::never();
        assert!(!heartbeat.is_enabled());
        let tick = tokio::time::timeout(Duration::from_secs(3600), heartbeat.next()).await;
        assert!(tick.is_err());
    }
}
