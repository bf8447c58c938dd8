use instant::Instant;

/// Converts wall clock time between ticks into motion frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    motion_fps: f32,
    last: Option<Instant>,
    max_elapsed_frames: f32,
}

impl FrameClock {
    pub fn new(motion_fps: f32) -> Self {
        Self {
            motion_fps,
            last: None,
            max_elapsed_frames: motion_fps,
        }
    }

    /// Caps a single tick, so a stalled host does not fast forward its scene.
    pub fn with_max_elapsed_frames(mut self, value: f32) -> Self {
        self.max_elapsed_frames = value.max(0f32);
        self
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Frames since the previous call. The first call returns zero.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32() * self.motion_fps)
            .unwrap_or(0f32);
        self.last = Some(now);
        elapsed.min(self.max_elapsed_frames)
    }
}

#[test]
fn test_clock_converts_seconds_to_frames() {
    let mut clock = FrameClock::new(30f32);
    let start = Instant::now();
    assert_eq!(0f32, clock.tick_at(start));
    let frames = clock.tick_at(start + std::time::Duration::from_millis(500));
    assert!((frames - 15f32).abs() < 1e-3);
    let frames = clock.tick_at(start + std::time::Duration::from_secs(10));
    assert_eq!(30f32, frames);
}
