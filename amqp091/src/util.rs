//! Common utilities

use std::{future::Future, pin::Pin, task::Poll, time::Duration};

use tokio::time::{Instant, Sleep};

#[derive(Debug)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// A timer that is pushed back every time it is reset
#[derive(Debug)]
pub(crate) struct IdleTimeout {
    delay: Pin<Box<Sleep>>,
    duration: Duration,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        let delay = Box::pin(tokio::time::sleep(duration));
        Self { delay, duration }
    }

    pub fn reset(&mut self) {
        let next = Instant::now() + self.duration;
        self.delay.as_mut().reset(next);
    }
}

impl Future for IdleTimeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        self.delay.as_mut().poll(cx)
    }
}

/// An optional deadline that stays pending forever when unset
#[derive(Debug, Default)]
pub(crate) struct Deadline {
    delay: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    pub fn set(&mut self, duration: Duration) {
        self.delay = Some(Box::pin(tokio::time::sleep(duration)));
    }
}

impl Future for Deadline {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        match &mut self.delay {
            Some(delay) => delay.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Deadline, IdleTimeout};

    #[tokio::test(start_paused = true)]
    async fn reset_pushes_the_idle_timeout_back() {
        let start = tokio::time::Instant::now();
        let mut timeout = IdleTimeout::new(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        timeout.reset();
        (&mut timeout).await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unset_deadline_never_fires() {
        let mut deadline = Deadline::default();
        let fired = tokio::time::timeout(Duration::from_secs(60), &mut deadline).await;
        assert!(fired.is_err());

        deadline.set(Duration::from_secs(1));
        tokio::time::timeout(Duration::from_secs(2), &mut deadline)
            .await
            .unwrap();
    }
}
