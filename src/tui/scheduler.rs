use std::time::{Duration, Instant};

/// Debounces query recomputation so typing in the search box stays
/// responsive. A newer request pushes the deadline out and supersedes the
/// pending one; the event loop polls for input no longer than the time left
/// until the deadline.
#[derive(Debug, Clone)]
pub struct RecomputeScheduler {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RecomputeScheduler {
    pub fn new(delay: Duration) -> Self {
        RecomputeScheduler {
            delay,
            deadline: None,
        }
    }

    /// Request a recompute `delay` after `now`, replacing any pending one.
    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any pending request (the caller recomputed eagerly).
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// How long the event loop may block waiting for input.
    pub fn poll_timeout(&self, now: Instant, idle: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now).min(idle),
            None => idle,
        }
    }

    /// True once per request, when its deadline has passed.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);
    const IDLE: Duration = Duration::from_millis(250);

    #[test]
    fn idle_scheduler_polls_at_idle_rate() {
        let scheduler = RecomputeScheduler::new(DELAY);
        assert_eq!(scheduler.poll_timeout(Instant::now(), IDLE), IDLE);
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn request_fires_once_after_delay() {
        let mut scheduler = RecomputeScheduler::new(DELAY);
        let t0 = Instant::now();
        scheduler.request(t0);
        assert!(!scheduler.due(t0 + Duration::from_millis(50)));
        assert!(scheduler.due(t0 + DELAY));
        assert!(!scheduler.due(t0 + DELAY * 2));
    }

    #[test]
    fn newer_request_supersedes_pending() {
        let mut scheduler = RecomputeScheduler::new(DELAY);
        let t0 = Instant::now();
        scheduler.request(t0);
        scheduler.request(t0 + Duration::from_millis(80));
        // The first deadline has passed but the second has not.
        assert!(!scheduler.due(t0 + DELAY));
        assert!(scheduler.due(t0 + Duration::from_millis(180)));
    }

    #[test]
    fn poll_timeout_bounded_by_deadline() {
        let mut scheduler = RecomputeScheduler::new(DELAY);
        let t0 = Instant::now();
        scheduler.request(t0);
        assert_eq!(
            scheduler.poll_timeout(t0 + Duration::from_millis(30), IDLE),
            Duration::from_millis(70)
        );
        assert_eq!(scheduler.poll_timeout(t0 + DELAY * 3, IDLE), Duration::ZERO);
    }

    #[test]
    fn cancel_clears_pending() {
        let mut scheduler = RecomputeScheduler::new(DELAY);
        let t0 = Instant::now();
        scheduler.request(t0);
        scheduler.cancel();
        assert!(!scheduler.due(t0 + DELAY));
    }
}
