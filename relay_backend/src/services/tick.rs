use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver};

use crate::services::{ServiceError, ServiceResult};

/// Periodic UI tick. The control loop waits on it to pump render events and
/// refresh status; the audio thread never sees it.
pub struct UiTicker {
    rx: Receiver<Instant>,
    interval: Duration,
}

impl UiTicker {
    pub fn new(interval: Duration) -> Self {
        Self { rx: channel::tick(interval), interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next tick.
    pub fn wait(&self) -> ServiceResult<Instant> {
        self.rx.recv().map_err(|_| ServiceError::Disconnected)
    }

    /// For use in `crossbeam::select!` alongside service replies.
    pub fn receiver(&self) -> &Receiver<Instant> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_arrive_in_order() {
        let ticker = UiTicker::new(Duration::from_millis(5));
        let first = ticker.wait().unwrap();
        let second = ticker.wait().unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_no_tick_before_due() {
        let ticker = UiTicker::new(Duration::from_secs(60));
        assert!(ticker.receiver().try_recv().is_err());
        assert_eq!(ticker.interval(), Duration::from_secs(60));
    }
}
