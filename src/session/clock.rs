use std::time::Duration;
use tokio::time::Instant;

/// Elapsed recording time, accumulated over segments.
///
/// Takes the current instant as an argument so callers decide the time
/// source. `elapsed` is `accumulated + (now - segment_start)` while a segment
/// is open and frozen otherwise.
#[derive(Debug, Clone, Default)]
pub struct ElapsedClock {
    accumulated: Duration,
    segment_start: Option<Instant>,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a segment. No-op if one is already open.
    pub fn start_segment(&mut self, now: Instant) {
        if self.segment_start.is_none() {
            self.segment_start = Some(now);
        }
    }

    /// Close the open segment and return the accumulated total.
    pub fn pause(&mut self, now: Instant) -> Duration {
        if let Some(start) = self.segment_start.take() {
            self.accumulated += now.saturating_duration_since(start);
        }
        self.accumulated
    }

    pub fn resume(&mut self, now: Instant) {
        self.start_segment(now);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let running = self
            .segment_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.accumulated + running
    }
}
