use std::sync::Arc;

use crate::motion::{
    seek::{CameraTransform, LightFrame, Seek},
    Motion,
};

use super::{
    options::MotionOptions,
    pose::{Pose, PoseLayout},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Active,
    /// Fading in over older players of the same slot.
    Fading,
    /// Active and wrapped at least once.
    Looping,
    /// Clamped at the last frame of a non looping motion, waiting to be collected. A fade in
    /// that is still running keeps going.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FadeProgress {
    elapsed: f32,
    duration: f32,
}

impl FadeProgress {
    fn weight(&self) -> f32 {
        if self.duration <= 0f32 {
            1f32
        } else {
            (self.elapsed / self.duration).clamp(0f32, 1f32)
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotionPlayer {
    motion: Arc<Motion>,
    options: MotionOptions,
    current_frame_index: f32,
    state: PlayerState,
    loop_count: u32,
    fade: Option<FadeProgress>,
}

impl MotionPlayer {
    pub fn new(motion: Arc<Motion>, options: MotionOptions) -> Self {
        Self {
            motion,
            options,
            current_frame_index: 0f32,
            state: PlayerState::Active,
            loop_count: 0,
            fade: None,
        }
    }

    /// Starts a player that fades in over `duration` frames.
    pub fn fading(motion: Arc<Motion>, options: MotionOptions, duration: f32) -> Self {
        let mut player = Self::new(motion, options);
        if duration > 0f32 {
            player.fade = Some(FadeProgress {
                elapsed: 0f32,
                duration,
            });
            player.state = PlayerState::Fading;
        }
        player
    }

    pub fn motion(&self) -> &Arc<Motion> {
        &self.motion
    }

    /// Copy on write access for editing a motion that may be shared with other players.
    pub fn motion_mut(&mut self) -> &mut Motion {
        Arc::make_mut(&mut self.motion)
    }

    pub fn options(&self) -> &MotionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut MotionOptions {
        &mut self.options
    }

    pub fn current_frame_index(&self) -> f32 {
        self.current_frame_index
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlayerState::Finished
    }

    pub fn is_fading(&self) -> bool {
        self.fade_weight() < 1f32
    }

    /// Weight of this player over the older players of its slot.
    pub fn fade_weight(&self) -> f32 {
        self.fade.map(|fade| fade.weight()).unwrap_or(1f32)
    }

    pub fn seek(&mut self, frame_index: f32) {
        let max = self.motion.max_frame_index() as f32;
        self.current_frame_index = frame_index.clamp(0f32, max);
        if self.state == PlayerState::Finished && self.current_frame_index < max {
            self.state = PlayerState::Active;
        }
    }

    pub fn advance(&mut self, delta: f32) {
        if let Some(fade) = &mut self.fade {
            fade.elapsed += delta;
            if fade.weight() >= 1f32 {
                self.fade = None;
                if self.state == PlayerState::Fading {
                    self.state = if self.loop_count > 0 {
                        PlayerState::Looping
                    } else {
                        PlayerState::Active
                    };
                }
            }
        }
        if self.state == PlayerState::Finished {
            return;
        }
        let max = self.motion.max_frame_index() as f32;
        let next = self.current_frame_index + delta * self.options.speed_rate;
        if next > max {
            if self.options.once {
                self.current_frame_index = max;
                self.state = PlayerState::Finished;
                return;
            }
            self.current_frame_index = if max > 0f32 { next.rem_euclid(max) } else { 0f32 };
            self.loop_count += 1;
            if self.state != PlayerState::Fading {
                self.state = PlayerState::Looping;
            }
        } else {
            self.current_frame_index = next;
        }
    }

    fn is_static_track(&self, len: usize) -> bool {
        self.options.ignore_static && len == 1
    }

    pub fn sample(&self, layout: &PoseLayout) -> Pose {
        let mut pose = if self.options.full {
            Pose::bind(layout.num_bones(), layout.num_morphs())
        } else {
            Pose::new(layout.num_bones(), layout.num_morphs())
        };
        let time = self.current_frame_index;
        let cache = self.motion.bezier_cache();
        for (name, track) in &self.motion.bone_tracks().tracks {
            if self.is_static_track(track.len()) {
                continue;
            }
            if let Some(index) = layout.bone_index(name) {
                if let Some(frame) = track.seek(time, cache) {
                    pose.bones[index] = Some(frame);
                }
            }
        }
        for (name, track) in &self.motion.morph_tracks().tracks {
            if self.is_static_track(track.len()) {
                continue;
            }
            if let Some(index) = layout.morph_index(name) {
                if let Some(weight) = track.seek(time, cache) {
                    pose.morphs[index] = Some(weight);
                }
            }
        }
        pose.model = self.motion.find_model_frame(time);
        pose
    }

    pub fn sample_camera(&self) -> Option<CameraTransform> {
        self.motion.find_camera_transform(self.current_frame_index)
    }

    pub fn sample_light(&self) -> Option<LightFrame> {
        self.motion.find_light_frame(self.current_frame_index)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{One, Quaternion, Vector3};

    use super::*;
    use crate::{config::BezierSolverConfig, motion::keyframe::BoneKeyframe};

    fn motion(max: u32) -> Arc<Motion> {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(max, Vector3::new(max as f32, 0f32, 0f32), Quaternion::one()),
        );
        Arc::new(motion)
    }

    #[test]
    fn test_loop_wraps() {
        let mut player = MotionPlayer::new(motion(10), MotionOptions::default());
        player.advance(8f32);
        assert_eq!(PlayerState::Active, player.state());
        player.advance(4f32);
        assert_eq!(PlayerState::Looping, player.state());
        assert_eq!(1, player.loop_count());
        assert!((player.current_frame_index() - 2f32).abs() < 1e-5);
    }

    #[test]
    fn test_once_finishes_at_last_frame() {
        let mut player = MotionPlayer::new(motion(10), MotionOptions::default().once(true));
        player.advance(25f32);
        assert!(player.is_finished());
        assert_eq!(10f32, player.current_frame_index());
        player.advance(1f32);
        assert_eq!(10f32, player.current_frame_index());
    }

    #[test]
    fn test_speed_rate_and_fade() {
        let mut player = MotionPlayer::fading(
            motion(100),
            MotionOptions::default().speed_rate(2f32),
            20f32,
        );
        assert_eq!(PlayerState::Fading, player.state());
        player.advance(5f32);
        assert_eq!(10f32, player.current_frame_index());
        assert_eq!(0.25f32, player.fade_weight());
        player.advance(15f32);
        assert_eq!(1f32, player.fade_weight());
        assert_eq!(PlayerState::Active, player.state());
    }

    #[test]
    fn test_finished_player_keeps_fading() {
        let mut player =
            MotionPlayer::fading(motion(4), MotionOptions::default().once(true), 20f32);
        player.advance(10f32);
        assert!(player.is_finished());
        assert!(player.is_fading());
        assert_eq!(0.5f32, player.fade_weight());
        player.advance(10f32);
        assert!(!player.is_fading());
        assert_eq!(4f32, player.current_frame_index());
    }
}
