use std::collections::HashSet;

use vpvl2_loader::motion::{
    Motion as RawMotion, MotionFormatType, MotionTrackData,
};

use crate::{
    bezier_curve::BezierCurveCache,
    config::BezierSolverConfig,
    error::Vpvl2Error,
    model::Model,
};

use super::{
    keyframe::{
        BoneKeyframe, CameraKeyframe, Keyframe, LightKeyframe, ModelKeyframe, MorphKeyframe,
    },
    seek::{BoneFrameTransform, CameraTransform, LightFrame, ModelFrame, Seek},
    track::{KeyframeTrack, MotionTrackBundle, RemovedKeyframe},
};

#[derive(Debug, Clone)]
pub struct Motion {
    pub target_model_name: String,
    format: MotionFormatType,
    bone_tracks: MotionTrackBundle<BoneKeyframe>,
    morph_tracks: MotionTrackBundle<MorphKeyframe>,
    camera_track: KeyframeTrack<CameraKeyframe>,
    light_track: KeyframeTrack<LightKeyframe>,
    model_track: KeyframeTrack<ModelKeyframe>,
    max_frame_index: u32,
    // Will get a new empty cache when cloned
    bezier_cache: BezierCurveCache,
    dirty: bool,
}

impl Motion {
    pub const CAMERA_AND_LIGHT_TARGET_MODEL_NAME: &'static str = "カメラ・照明";

    pub fn empty(config: BezierSolverConfig) -> Self {
        Self {
            target_model_name: String::new(),
            format: MotionFormatType::Vmd,
            bone_tracks: MotionTrackBundle::new(),
            morph_tracks: MotionTrackBundle::new(),
            camera_track: KeyframeTrack::new(""),
            light_track: KeyframeTrack::new(""),
            model_track: KeyframeTrack::new(""),
            max_frame_index: 0,
            bezier_cache: BezierCurveCache::new(config),
            dirty: false,
        }
    }

    /// Builds sorted tracks from decoded keyframe lists. Duplicated frame indices keep the last
    /// keyframe.
    pub fn from_raw(raw: &RawMotion, config: BezierSolverConfig) -> Result<Self, Vpvl2Error> {
        let mut motion = Self::empty(config);
        motion.target_model_name = raw.target_model_name.clone();
        motion.format = raw.format;
        for MotionTrackData { name, keyframes } in &raw.bone_tracks {
            for keyframe in keyframes {
                motion
                    .bone_tracks
                    .force_add_keyframe(BoneKeyframe::from_raw(name, keyframe)?, name);
            }
        }
        for MotionTrackData { name, keyframes } in &raw.morph_tracks {
            for keyframe in keyframes {
                if !keyframe.weight.is_finite() {
                    return Err(Vpvl2Error::invalid_motion(format!(
                        "morph keyframe {} of \"{}\" has a non finite weight",
                        keyframe.frame_index, name
                    )));
                }
                motion.morph_tracks.force_add_keyframe(keyframe.into(), name);
            }
        }
        for keyframe in &raw.camera_keyframes {
            motion.camera_track.insert(keyframe.into());
        }
        for keyframe in &raw.light_keyframes {
            motion.light_track.insert(keyframe.into());
        }
        for keyframe in &raw.model_keyframes {
            motion.model_track.insert(keyframe.into());
        }
        motion.update_max_frame_index();
        Ok(motion)
    }

    pub fn to_raw(&self) -> RawMotion {
        let mut bone_tracks: Vec<_> = self
            .bone_tracks
            .tracks
            .values()
            .map(|track| {
                MotionTrackData::new(&track.name, track.iter().map(|k| k.to_raw()).collect())
            })
            .collect();
        bone_tracks.sort_by(|a, b| a.name.cmp(&b.name));
        let mut morph_tracks: Vec<_> = self
            .morph_tracks
            .tracks
            .values()
            .map(|track| {
                MotionTrackData::new(&track.name, track.iter().map(|k| k.to_raw()).collect())
            })
            .collect();
        morph_tracks.sort_by(|a, b| a.name.cmp(&b.name));
        RawMotion {
            target_model_name: self.target_model_name.clone(),
            format: self.format,
            bone_tracks,
            morph_tracks,
            camera_keyframes: self.camera_track.iter().map(|k| k.to_raw()).collect(),
            light_keyframes: self.light_track.iter().map(|k| k.to_raw()).collect(),
            model_keyframes: self.model_track.iter().map(|k| k.to_raw()).collect(),
        }
    }

    fn update_max_frame_index(&mut self) {
        self.max_frame_index = [
            self.bone_tracks.max_frame_index(),
            self.morph_tracks.max_frame_index(),
            self.camera_track.max_frame_index(),
            self.light_track.max_frame_index(),
            self.model_track.max_frame_index(),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
    }

    fn touch(&mut self) {
        self.update_max_frame_index();
        self.dirty = true;
    }

    pub fn format(&self) -> MotionFormatType {
        self.format
    }

    pub fn max_frame_index(&self) -> u32 {
        self.max_frame_index
    }

    pub fn duration(&self) -> u32 {
        self.max_frame_index
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, value: bool) {
        self.dirty = value;
    }

    /// True for motions addressed to the camera and light, or carrying nothing but their tracks.
    pub fn is_camera_and_light_motion(&self) -> bool {
        self.target_model_name == Self::CAMERA_AND_LIGHT_TARGET_MODEL_NAME
            || (self.bone_tracks.keyframe_len() == 0
                && self.morph_tracks.keyframe_len() == 0
                && (!self.camera_track.is_empty() || !self.light_track.is_empty()))
    }

    pub fn bezier_cache(&self) -> &BezierCurveCache {
        &self.bezier_cache
    }

    pub fn bone_tracks(&self) -> &MotionTrackBundle<BoneKeyframe> {
        &self.bone_tracks
    }

    pub fn morph_tracks(&self) -> &MotionTrackBundle<MorphKeyframe> {
        &self.morph_tracks
    }

    pub fn camera_track(&self) -> &KeyframeTrack<CameraKeyframe> {
        &self.camera_track
    }

    pub fn light_track(&self) -> &KeyframeTrack<LightKeyframe> {
        &self.light_track
    }

    pub fn model_track(&self) -> &KeyframeTrack<ModelKeyframe> {
        &self.model_track
    }

    pub fn num_keyframes(&self) -> usize {
        self.bone_tracks.keyframe_len()
            + self.morph_tracks.keyframe_len()
            + self.camera_track.len()
            + self.light_track.len()
            + self.model_track.len()
    }

    pub fn add_bone_keyframe(&mut self, name: &str, keyframe: BoneKeyframe) -> Option<BoneKeyframe> {
        let old = self.bone_tracks.force_add_keyframe(keyframe, name);
        self.touch();
        old
    }

    pub fn remove_bone_keyframe(
        &mut self,
        name: &str,
        frame_index: u32,
    ) -> Option<RemovedKeyframe<BoneKeyframe>> {
        let removed = self.bone_tracks.remove_keyframe(frame_index, name)?;
        self.touch();
        Some(removed)
    }

    pub fn add_morph_keyframe(
        &mut self,
        name: &str,
        keyframe: MorphKeyframe,
    ) -> Option<MorphKeyframe> {
        let old = self.morph_tracks.force_add_keyframe(keyframe, name);
        self.touch();
        old
    }

    pub fn remove_morph_keyframe(
        &mut self,
        name: &str,
        frame_index: u32,
    ) -> Option<RemovedKeyframe<MorphKeyframe>> {
        let removed = self.morph_tracks.remove_keyframe(frame_index, name)?;
        self.touch();
        Some(removed)
    }

    pub fn add_camera_keyframe(&mut self, keyframe: CameraKeyframe) -> Option<CameraKeyframe> {
        let old = self.camera_track.insert(keyframe);
        self.touch();
        old
    }

    pub fn remove_camera_keyframe(
        &mut self,
        frame_index: u32,
    ) -> Option<RemovedKeyframe<CameraKeyframe>> {
        let removed = self.camera_track.remove(frame_index)?;
        self.touch();
        Some(removed)
    }

    pub fn add_light_keyframe(&mut self, keyframe: LightKeyframe) -> Option<LightKeyframe> {
        let old = self.light_track.insert(keyframe);
        self.touch();
        old
    }

    pub fn remove_light_keyframe(
        &mut self,
        frame_index: u32,
    ) -> Option<RemovedKeyframe<LightKeyframe>> {
        let removed = self.light_track.remove(frame_index)?;
        self.touch();
        Some(removed)
    }

    pub fn add_model_keyframe(&mut self, keyframe: ModelKeyframe) -> Option<ModelKeyframe> {
        let old = self.model_track.insert(keyframe);
        self.touch();
        old
    }

    pub fn remove_model_keyframe(
        &mut self,
        frame_index: u32,
    ) -> Option<RemovedKeyframe<ModelKeyframe>> {
        let removed = self.model_track.remove(frame_index)?;
        self.touch();
        Some(removed)
    }

    pub fn find_bone_keyframe(&self, name: &str, frame_index: u32) -> Option<&BoneKeyframe> {
        self.bone_tracks.find_keyframe(frame_index, name)
    }

    pub fn find_morph_keyframe(&self, name: &str, frame_index: u32) -> Option<&MorphKeyframe> {
        self.morph_tracks.find_keyframe(frame_index, name)
    }

    pub fn find_bone_transform(&self, name: &str, time: f32) -> Option<BoneFrameTransform> {
        self.bone_tracks
            .get(name)
            .and_then(|track| track.seek(time, &self.bezier_cache))
    }

    pub fn find_morph_weight(&self, name: &str, time: f32) -> Option<f32> {
        self.morph_tracks
            .get(name)
            .and_then(|track| track.seek(time, &self.bezier_cache))
    }

    pub fn find_camera_transform(&self, time: f32) -> Option<CameraTransform> {
        self.camera_track.seek(time, &self.bezier_cache)
    }

    pub fn find_light_frame(&self, time: f32) -> Option<LightFrame> {
        self.light_track.seek(time, &self.bezier_cache)
    }

    pub fn find_model_frame(&self, time: f32) -> Option<ModelFrame> {
        self.model_track.seek(time, &self.bezier_cache)
    }

    /// Names of animated bones and morphs the model does not have.
    pub fn test_all_missing_model_objects(&self, model: &Model) -> (Vec<String>, Vec<String>) {
        let mut bones = vec![];
        let mut morphs = vec![];
        for (bone_name, track) in &self.bone_tracks.tracks {
            if !model.contains_bone(bone_name) && !track.is_empty() {
                bones.push(bone_name.clone());
            }
        }
        for (morph_name, track) in &self.morph_tracks.tracks {
            if !model.contains_morph(morph_name) && !track.is_empty() {
                morphs.push(morph_name.clone())
            }
        }
        bones.sort();
        morphs.sort();
        (bones, morphs)
    }

    /// Copies every keyframe of `source` into this motion. Existing keyframes are kept unless
    /// `overwrite` is set. `reverse` mirrors left and right bones.
    pub fn merge_all_keyframes(&mut self, source: &Motion, overwrite: bool, reverse: bool) {
        let mut merger = Merger {
            source,
            overwrite,
            dest: self,
        };
        merger.merge_all_bone_keyframes(reverse);
        merger.merge_all_morph_keyframes();
        merger.merge_all_camera_keyframes();
        merger.merge_all_light_keyframes();
        merger.merge_all_model_keyframes();
        self.touch();
    }
}

struct Merger<'a, 'b> {
    source: &'a Motion,
    overwrite: bool,
    dest: &'b mut Motion,
}

impl Merger<'_, '_> {
    const LEFT: &'static str = "左";
    const RIGHT: &'static str = "右";

    fn reverse_bone_keyframe(origin: &BoneKeyframe) -> BoneKeyframe {
        let mut result = origin.clone();
        result.translation.x = -origin.translation.x;
        result.orientation.v.y = -origin.orientation.v.y;
        result.orientation.v.z = -origin.orientation.v.z;
        result
    }

    fn mirrored_name(name: &str) -> Option<String> {
        if name.starts_with(Self::LEFT) {
            Some(name.replacen(Self::LEFT, Self::RIGHT, 1))
        } else if name.starts_with(Self::RIGHT) {
            Some(name.replacen(Self::RIGHT, Self::LEFT, 1))
        } else {
            None
        }
    }

    fn merge_all_bone_keyframes(&mut self, reverse: bool) {
        let mut reversed_bone_name_set = HashSet::new();
        for (name, track) in &self.source.bone_tracks.tracks {
            for keyframe in track.iter() {
                let (new_name, new_frame) = match Self::mirrored_name(name) {
                    Some(mirrored) if reverse => {
                        reversed_bone_name_set.insert(mirrored.clone());
                        (mirrored, Self::reverse_bone_keyframe(keyframe))
                    }
                    _ => (name.clone(), keyframe.clone()),
                };
                if self.overwrite
                    || self
                        .dest
                        .bone_tracks
                        .find_keyframe(keyframe.frame_index(), &new_name)
                        .is_none()
                {
                    self.dest.bone_tracks.force_add_keyframe(new_frame, &new_name);
                }
            }
        }
        log::debug!("mirrored {} bone tracks", reversed_bone_name_set.len());
    }

    fn merge_all_morph_keyframes(&mut self) {
        for (name, track) in &self.source.morph_tracks.tracks {
            for keyframe in track.iter() {
                if self.overwrite
                    || self
                        .dest
                        .morph_tracks
                        .find_keyframe(keyframe.frame_index(), name)
                        .is_none()
                {
                    self.dest.morph_tracks.force_add_keyframe(keyframe.clone(), name);
                }
            }
        }
    }

    fn merge_all_camera_keyframes(&mut self) {
        for keyframe in self.source.camera_track.iter() {
            if self.overwrite || self.dest.camera_track.find(keyframe.frame_index()).is_none() {
                self.dest.camera_track.insert(keyframe.clone());
            }
        }
    }

    fn merge_all_light_keyframes(&mut self) {
        for keyframe in self.source.light_track.iter() {
            if self.overwrite || self.dest.light_track.find(keyframe.frame_index()).is_none() {
                self.dest.light_track.insert(keyframe.clone());
            }
        }
    }

    fn merge_all_model_keyframes(&mut self) {
        for keyframe in self.source.model_track.iter() {
            if self.overwrite || self.dest.model_track.find(keyframe.frame_index()).is_none() {
                self.dest.model_track.insert(keyframe.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{One, Quaternion, Vector3};
    use vpvl2_loader::motion::{MotionBoneKeyframe, MotionMorphKeyframe};

    use super::*;

    fn raw_motion() -> RawMotion {
        RawMotion {
            target_model_name: "model".to_owned(),
            bone_tracks: vec![MotionTrackData::new(
                "右腕",
                vec![
                    MotionBoneKeyframe {
                        frame_index: 40,
                        translation: [1f32, 0f32, 0f32],
                        ..Default::default()
                    },
                    MotionBoneKeyframe {
                        frame_index: 0,
                        ..Default::default()
                    },
                    MotionBoneKeyframe {
                        frame_index: 40,
                        translation: [2f32, 0f32, 0f32],
                        ..Default::default()
                    },
                ],
            )],
            morph_tracks: vec![MotionTrackData::new(
                "まばたき",
                vec![MotionMorphKeyframe {
                    frame_index: 60,
                    weight: 1f32,
                }],
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_from_raw_sorts_and_dedups() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let motion = Motion::from_raw(&raw_motion(), BezierSolverConfig::default())?;
        assert_eq!(60, motion.max_frame_index());
        let track = motion.bone_tracks().get("右腕").unwrap();
        assert_eq!(&[0, 40], track.frame_indices());
        assert_eq!(
            Some(Vector3::new(2f32, 0f32, 0f32)),
            motion.find_bone_keyframe("右腕", 40).map(|k| k.translation)
        );
        assert_eq!(Some(1f32), motion.find_morph_weight("まばたき", 0f32));
        assert_eq!(None, motion.find_camera_transform(0f32));
        Ok(())
    }

    #[test]
    fn test_degenerate_orientation_is_rejected() {
        let mut raw = raw_motion();
        raw.bone_tracks[0].keyframes[0].orientation = [0f32; 4];
        let err = Motion::from_raw(&raw, BezierSolverConfig::default()).unwrap_err();
        assert_eq!(crate::error::ErrorKind::InvalidMotion, err.kind());
    }

    #[test]
    fn test_max_frame_index_follows_edits() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut motion = Motion::from_raw(&raw_motion(), BezierSolverConfig::default())?;
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(90, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        assert_eq!(90, motion.max_frame_index());
        assert!(motion.is_dirty());
        let removed = motion.remove_bone_keyframe("センター", 90).unwrap();
        assert!(removed.track_emptied);
        assert_eq!(60, motion.max_frame_index());
        motion.remove_morph_keyframe("まばたき", 60);
        assert_eq!(40, motion.max_frame_index());
        Ok(())
    }

    #[test]
    fn test_merge_with_reverse() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let source = Motion::from_raw(&raw_motion(), BezierSolverConfig::default())?;
        let mut dest = Motion::empty(BezierSolverConfig::default());
        dest.merge_all_keyframes(&source, false, true);
        assert!(dest.bone_tracks().get("右腕").is_none());
        assert_eq!(
            Some(-2f32),
            dest.find_bone_keyframe("左腕", 40).map(|k| k.translation.x)
        );
        assert_eq!(60, dest.max_frame_index());
        Ok(())
    }

    #[test]
    fn test_to_raw_round_trip() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let motion = Motion::from_raw(&raw_motion(), BezierSolverConfig::default())?;
        let again = Motion::from_raw(&motion.to_raw(), BezierSolverConfig::default())?;
        assert_eq!(motion.num_keyframes(), again.num_keyframes());
        assert_eq!(motion.max_frame_index(), again.max_frame_index());
        Ok(())
    }
}
