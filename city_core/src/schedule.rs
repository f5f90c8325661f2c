use std::time::{Duration, Instant};

/// Fixed-interval timer polled from the dashboard loop.
///
/// A stopped ticker never fires. Polling fires at most once per call and
/// re-arms one full interval after the instant it was polled at, so a stalled
/// loop does not replay missed ticks.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Arms the ticker if it is stopped. An armed ticker keeps its schedule.
    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Restarts the interval from `now`, arming the ticker if needed.
    pub fn rebase(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due
            .map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_ticker_never_fires() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        assert!(!ticker.is_armed());
        assert!(!ticker.poll(t0 + Duration::from_secs(10)));
        assert_eq!(ticker.remaining(t0), None);
    }

    #[test]
    fn fires_once_per_interval() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        ticker.start(t0);
        assert!(!ticker.poll(t0 + Duration::from_millis(999)));
        assert!(ticker.poll(t0 + Duration::from_millis(1000)));
        assert!(!ticker.poll(t0 + Duration::from_millis(1500)));
        assert!(ticker.poll(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn missed_ticks_are_not_replayed() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        ticker.start(t0);
        let late = t0 + Duration::from_secs(5);
        assert!(ticker.poll(late));
        assert!(!ticker.poll(late));
        assert_eq!(ticker.remaining(late), Some(Duration::from_secs(1)));
    }

    #[test]
    fn start_keeps_schedule_but_rebase_resets_it() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(60));
        ticker.start(t0);
        ticker.start(t0 + Duration::from_secs(30));
        assert!(ticker.poll(t0 + Duration::from_secs(60)));

        ticker.rebase(t0 + Duration::from_secs(90));
        assert!(!ticker.poll(t0 + Duration::from_secs(120)));
        assert!(ticker.poll(t0 + Duration::from_secs(150)));
    }

    #[test]
    fn stop_disarms() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        ticker.start(t0);
        ticker.stop();
        assert!(!ticker.poll(t0 + Duration::from_secs(2)));
    }
}
