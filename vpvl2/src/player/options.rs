#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Interpolates the accumulated pose toward the slot pose by the slot weight.
    #[default]
    Replace,
    /// Adds the slot pose on top of the accumulated pose, scaled by the slot weight.
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOptions {
    /// Bones without a track get the bind pose instead of being left alone.
    pub full: bool,
    pub once: bool,
    pub enable_smooth_transition: bool,
    pub enable_re_position: bool,
    /// Skips tracks holding a single keyframe.
    pub ignore_static: bool,
    pub priority: i32,
    pub blend_weight: f32,
    pub speed_rate: f32,
    pub blend_mode: BlendMode,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            full: true,
            once: false,
            enable_smooth_transition: true,
            enable_re_position: false,
            ignore_static: false,
            priority: 0,
            blend_weight: 1f32,
            speed_rate: 1f32,
            blend_mode: BlendMode::Replace,
        }
    }
}

impl MotionOptions {
    pub fn part() -> Self {
        Self {
            full: false,
            ..Default::default()
        }
    }

    pub fn once(mut self, value: bool) -> Self {
        self.once = value;
        self
    }

    pub fn smooth(mut self, value: bool) -> Self {
        self.enable_smooth_transition = value;
        self
    }

    pub fn re_position(mut self, value: bool) -> Self {
        self.enable_re_position = value;
        self
    }

    pub fn priority(mut self, value: i32) -> Self {
        self.priority = value;
        self
    }

    pub fn blend(mut self, mode: BlendMode, weight: f32) -> Self {
        self.blend_mode = mode;
        self.blend_weight = weight;
        self
    }

    pub fn speed_rate(mut self, value: f32) -> Self {
        self.speed_rate = value;
        self
    }
}

/// Runtime changes to a slot. Fields left `None` keep their value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionConfiguration {
    pub blend_weight: Option<f32>,
    pub speed_rate: Option<f32>,
    pub priority: Option<i32>,
    pub blend_mode: Option<BlendMode>,
    pub once: Option<bool>,
}

impl MotionConfiguration {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, options: &mut MotionOptions) {
        if let Some(value) = self.blend_weight {
            options.blend_weight = value.clamp(0f32, 1f32);
        }
        if let Some(value) = self.speed_rate {
            options.speed_rate = value.max(0f32);
        }
        if let Some(value) = self.priority {
            options.priority = value;
        }
        if let Some(value) = self.blend_mode {
            options.blend_mode = value;
        }
        if let Some(value) = self.once {
            options.once = value;
        }
    }
}
