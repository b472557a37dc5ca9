use std::time::Duration;

/// Longest step handed to the frame update, so a backgrounded tab or a
/// stalled window does not jump the animation.
pub const MAX_FRAME_STEP: Duration = Duration::from_millis(250);

/// Measures time between rendered frames.
///
/// `std::time::Instant` panics on wasm32, so the browser build reads
/// `Date.now()` instead.
pub struct FrameClock {
    last_ms: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_ms: FrameClock::now_ms(),
        }
    }

    /// Time since the previous call, capped at [`MAX_FRAME_STEP`].
    pub fn tick(&mut self) -> Duration {
        let now = FrameClock::now_ms();
        let elapsed = FrameClock::step(self.last_ms, now);
        self.last_ms = now;
        elapsed
    }

    fn step(last_ms: f64, now_ms: f64) -> Duration {
        let elapsed = Duration::from_secs_f64(((now_ms - last_ms) / 1000.0).max(0.0));
        elapsed.min(MAX_FRAME_STEP)
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms() -> f64 {
        js_sys::Date::now()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms() -> f64 {
        use std::sync::OnceLock;
        use std::time::Instant;

        static START: OnceLock<Instant> = OnceLock::new();
        START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_capped_and_never_negative() {
        assert_eq!(FrameClock::step(0.0, 16.0), Duration::from_millis(16));
        assert_eq!(FrameClock::step(0.0, 10_000.0), MAX_FRAME_STEP);
        assert_eq!(FrameClock::step(50.0, 10.0), Duration::ZERO);
    }
}
