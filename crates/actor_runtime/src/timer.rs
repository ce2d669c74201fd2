use serde::{Deserialize, Serialize};

/// Countdown used by delayed intents, timed intents and temporary effects.
///
/// `advance` is edge-triggered: it reports `true` only on the call where
/// `elapsed` first reaches `duration`. `is_expired` is level-triggered and can
/// be queried any number of times afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    duration: f32,
    elapsed: f32,
    fired: bool,
}

impl Timer {
    pub fn new(duration_seconds: f32) -> Self {
        Self {
            duration: sanitize_duration(duration_seconds),
            elapsed: 0.0,
            fired: false,
        }
    }

    /// Rebuilds a timer from saved bookkeeping.
    pub fn restore(duration_seconds: f32, elapsed_seconds: f32) -> Self {
        let duration = sanitize_duration(duration_seconds);
        let elapsed = sanitize_dt(elapsed_seconds);
        Self {
            duration,
            elapsed,
            fired: elapsed >= duration,
        }
    }

    pub fn reset(&mut self, duration_seconds: f32) {
        *self = Self::new(duration_seconds);
    }

    /// Negative or non-finite `dt` is clamped to zero; elapsed time never
    /// moves backwards.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += sanitize_dt(dt);
        if self.fired || self.elapsed < self.duration {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }
}

/// Clamp policy for tick deltas: anything negative or non-finite becomes 0.
pub fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        0.0
    }
}

/// Clamp policy for durations: NaN or negative becomes 0, infinity is kept.
pub(crate) fn sanitize_duration(duration: f32) -> f32 {
    if duration.is_nan() || duration < 0.0 {
        0.0
    } else {
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_once_across_uneven_steps() {
        let mut timer = Timer::new(1.0);
        let steps = [0.3, 0.3, 0.3, 0.3, 0.3, 5.0];
        let fired = steps
            .iter()
            .filter(|dt| timer.advance(**dt))
            .count();
        assert_eq!(fired, 1);
        assert!(timer.is_expired());
        assert!(timer.is_expired());
    }

    #[test]
    fn fires_on_step_that_reaches_duration_exactly() {
        let mut timer = Timer::new(2.0);
        assert!(!timer.advance(1.0));
        assert!(!timer.is_expired());
        assert!(timer.advance(1.0));
        assert!(!timer.advance(1.0));
    }

    #[test]
    fn zero_duration_fires_on_first_advance() {
        let mut timer = Timer::new(0.0);
        assert!(timer.is_expired());
        assert!(timer.advance(0.0));
        assert!(!timer.advance(0.0));
    }

    #[test]
    fn negative_dt_is_clamped_not_inverted() {
        let mut timer = Timer::new(1.0);
        timer.advance(0.5);
        assert!(!timer.advance(-10.0));
        assert_eq!(timer.elapsed(), 0.5);
        assert!(!timer.advance(f32::NAN));
        assert_eq!(timer.elapsed(), 0.5);
        assert!((timer.remaining() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn restore_marks_already_expired_timer_as_fired() {
        let mut timer = Timer::restore(1.0, 1.5);
        assert!(timer.is_expired());
        assert!(!timer.advance(0.1));

        let mut pending = Timer::restore(1.0, 0.25);
        assert!(!pending.is_expired());
        assert!(pending.advance(0.75));
    }

    #[test]
    fn reset_rearms_the_edge_trigger() {
        let mut timer = Timer::new(0.5);
        assert!(timer.advance(0.5));
        timer.reset(0.25);
        assert!(!timer.is_expired());
        assert!(timer.advance(0.25));
    }
}
