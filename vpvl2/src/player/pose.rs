use std::collections::HashMap;

use crate::{
    motion::seek::{BoneFrameTransform, ModelFrame},
    utils::{lerp_f32, scale_rotation},
};

use super::options::BlendMode;

/// Name to index tables of one model, used to place sampled tracks into a [`Pose`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseLayout {
    bones: HashMap<String, usize>,
    morphs: HashMap<String, usize>,
    num_bones: usize,
    num_morphs: usize,
}

impl PoseLayout {
    pub fn new<'a, B, M>(bone_names: B, morph_names: M) -> Self
    where
        B: IntoIterator<Item = &'a str>,
        M: IntoIterator<Item = &'a str>,
    {
        let mut layout = Self::default();
        for (index, name) in bone_names.into_iter().enumerate() {
            layout.bones.entry(name.to_owned()).or_insert(index);
            layout.num_bones = index + 1;
        }
        for (index, name) in morph_names.into_iter().enumerate() {
            layout.morphs.entry(name.to_owned()).or_insert(index);
            layout.num_morphs = index + 1;
        }
        layout
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.get(name).copied()
    }

    pub fn morph_index(&self, name: &str) -> Option<usize> {
        self.morphs.get(name).copied()
    }

    pub fn num_bones(&self) -> usize {
        self.num_bones
    }

    pub fn num_morphs(&self) -> usize {
        self.num_morphs
    }
}

/// Sampled local transforms and morph weights. `None` leaves the bone or morph untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pose {
    pub bones: Vec<Option<BoneFrameTransform>>,
    pub morphs: Vec<Option<f32>>,
    pub model: Option<ModelFrame>,
}

impl Pose {
    pub fn new(num_bones: usize, num_morphs: usize) -> Self {
        Self {
            bones: vec![None; num_bones],
            morphs: vec![None; num_morphs],
            model: None,
        }
    }

    /// Every bone at its bind pose, morphs untouched.
    pub fn bind(num_bones: usize, num_morphs: usize) -> Self {
        Self {
            bones: vec![Some(BoneFrameTransform::default()); num_bones],
            morphs: vec![None; num_morphs],
            model: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bones.iter().all(Option::is_none)
            && self.morphs.iter().all(Option::is_none)
            && self.model.is_none()
    }

    /// Crossfades toward `newer`. A side that does not touch a bone counts as its bind pose.
    pub fn crossfade(&self, newer: &Pose, weight: f32) -> Pose {
        if weight <= 0f32 {
            return self.clone();
        }
        if weight >= 1f32 {
            return newer.clone();
        }
        let bones = self
            .bones
            .iter()
            .zip(newer.bones.iter())
            .map(|(older, newer)| match (older, newer) {
                (None, None) => None,
                (older, newer) => {
                    let older = older.unwrap_or_default();
                    let newer = newer.unwrap_or_default();
                    Some(older.lerp(&newer, weight))
                }
            })
            .collect();
        let morphs = self
            .morphs
            .iter()
            .zip(newer.morphs.iter())
            .map(|(older, newer)| match (older, newer) {
                (None, None) => None,
                (older, newer) => Some(lerp_f32(
                    older.unwrap_or(0f32),
                    newer.unwrap_or(0f32),
                    weight,
                )),
            })
            .collect();
        Pose {
            bones,
            morphs,
            model: newer.model.clone().or_else(|| self.model.clone()),
        }
    }

    /// Layers `layer` onto this pose.
    pub fn combine(&mut self, layer: &Pose, mode: BlendMode, weight: f32) {
        if weight <= 0f32 {
            return;
        }
        for (acc, value) in self.bones.iter_mut().zip(layer.bones.iter()) {
            let Some(value) = value else {
                continue;
            };
            let base = acc.unwrap_or_default();
            *acc = Some(match mode {
                BlendMode::Replace => base.lerp(value, weight.min(1f32)),
                BlendMode::Add => BoneFrameTransform {
                    translation: base.translation + value.translation * weight,
                    orientation: base.orientation * scale_rotation(value.orientation, weight),
                    enable_physics: base.enable_physics && value.enable_physics,
                },
            });
        }
        for (acc, value) in self.morphs.iter_mut().zip(layer.morphs.iter()) {
            let Some(value) = value else {
                continue;
            };
            let base = acc.unwrap_or(0f32);
            *acc = Some(match mode {
                BlendMode::Replace => lerp_f32(base, *value, weight.min(1f32)),
                BlendMode::Add => base + value * weight,
            });
        }
        if layer.model.is_some() {
            self.model = layer.model.clone();
        }
    }
}
