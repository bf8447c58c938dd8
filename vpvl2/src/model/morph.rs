use std::collections::{HashMap, VecDeque};

use cgmath::{Quaternion, Vector3};
use vpvl2_loader::{
    common::resolve_index,
    model::{ModelMorph, ModelMorphCategory, ModelMorphType},
};

use crate::{
    error::Vpvl2Error,
    utils::{f32x3_to_vec3, f32x4_to_quat, normalize_or_identity, scale_rotation},
};

use super::{bone::BoneSet, BoneIndex, MorphIndex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOffset {
    pub bone: BoneIndex,
    pub translation: Vector3<f32>,
    pub orientation: Quaternion<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    pub category: ModelMorphCategory,
    pub typ: ModelMorphType,
    pub bones: Vec<BoneOffset>,
    /// Child morphs of a group morph with their share of its weight.
    pub groups: Vec<(MorphIndex, f32)>,
    weight: f32,
    effective_weight: f32,
}

impl Morph {
    fn from_raw(
        handle: MorphIndex,
        morph: &ModelMorph,
        num_morphs: usize,
        bones: &BoneSet,
    ) -> Result<Self, Vpvl2Error> {
        let mut name = morph.name_ja.clone();
        if name.is_empty() {
            name = format!("Morph{}", handle);
        }
        let mut offsets = vec![];
        let mut groups = vec![];
        match morph.typ {
            ModelMorphType::Bone => {
                for offset in &morph.bones {
                    let bone = match resolve_index(offset.bone_index, bones.len()) {
                        Ok(Some(bone)) => bone,
                        _ => {
                            return Err(Vpvl2Error::invalid_morphs(format!(
                                "bone morph \"{}\" refers to bone {}",
                                name, offset.bone_index
                            )))
                        }
                    };
                    offsets.push(BoneOffset {
                        bone,
                        translation: f32x3_to_vec3(offset.translation),
                        orientation: normalize_or_identity(f32x4_to_quat(offset.orientation)),
                    });
                }
            }
            ModelMorphType::Group | ModelMorphType::Flip => {
                for group in &morph.groups {
                    let child = match resolve_index(group.morph_index, num_morphs) {
                        Ok(Some(child)) => child,
                        _ => {
                            return Err(Vpvl2Error::invalid_morphs(format!(
                                "group morph \"{}\" refers to morph {}",
                                name, group.morph_index
                            )))
                        }
                    };
                    groups.push((child, group.weight));
                }
            }
            _ => {}
        }
        Ok(Self {
            name,
            name_en: morph.name_en.clone(),
            category: morph.category,
            typ: morph.typ,
            bones: offsets,
            groups,
            weight: 0f32,
            effective_weight: 0f32,
        })
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Own weight plus what group morphs forwarded this update.
    pub fn effective_weight(&self) -> f32 {
        self.effective_weight
    }
}

#[derive(Debug, Clone, Default)]
pub struct MorphSet {
    morphs: Vec<Morph>,
    morphs_by_name: HashMap<String, MorphIndex>,
    /// Group morphs before the morphs they drive.
    group_order: Vec<MorphIndex>,
}

impl MorphSet {
    pub fn new(origin_morphs: &[ModelMorph], bones: &BoneSet) -> Result<Self, Vpvl2Error> {
        let len = origin_morphs.len();
        let morphs = origin_morphs
            .iter()
            .enumerate()
            .map(|(handle, morph)| Morph::from_raw(handle, morph, len, bones))
            .collect::<Result<Vec<_>, _>>()?;
        let mut morphs_by_name = HashMap::new();
        for (handle, morph) in morphs.iter().enumerate() {
            morphs_by_name.entry(morph.name.clone()).or_insert(handle);
            if !morph.name_en.is_empty() {
                morphs_by_name.entry(morph.name_en.clone()).or_insert(handle);
            }
        }
        let mut in_degree = vec![0usize; len];
        for morph in &morphs {
            for (child, _) in &morph.groups {
                in_degree[*child] += 1;
            }
        }
        let mut queue = (0..len)
            .filter(|handle| in_degree[*handle] == 0)
            .collect::<VecDeque<_>>();
        let mut group_order = Vec::with_capacity(len);
        while let Some(handle) = queue.pop_front() {
            group_order.push(handle);
            for (child, _) in &morphs[handle].groups {
                in_degree[*child] -= 1;
                if in_degree[*child] == 0 {
                    queue.push_back(*child);
                }
            }
        }
        if group_order.len() != len {
            let name = (0..len)
                .find(|handle| in_degree[*handle] > 0)
                .map(|handle| morphs[handle].name.clone())
                .unwrap_or_default();
            return Err(Vpvl2Error::invalid_morphs(format!(
                "group morph graph through \"{}\" forms a cycle",
                name
            )));
        }
        Ok(Self {
            morphs,
            morphs_by_name,
            group_order,
        })
    }

    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }

    pub fn get(&self, idx: MorphIndex) -> Option<&Morph> {
        self.morphs.get(idx)
    }

    pub fn find(&self, name: &str) -> Option<&Morph> {
        self.morphs_by_name
            .get(name)
            .and_then(|idx| self.morphs.get(*idx))
    }

    pub fn find_index(&self, name: &str) -> Option<MorphIndex> {
        self.morphs_by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.morphs_by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Morph> {
        self.morphs.iter()
    }

    pub fn reset(&mut self) {
        for morph in &mut self.morphs {
            morph.weight = 0f32;
            morph.effective_weight = 0f32;
        }
    }

    pub fn set_weight(&mut self, idx: MorphIndex, weight: f32) {
        if let Some(morph) = self.morphs.get_mut(idx) {
            morph.weight = if weight.is_finite() { weight } else { 0f32 };
        }
    }

    /// Forwards group weights down the graph.
    pub fn resolve(&mut self) {
        for morph in &mut self.morphs {
            morph.effective_weight = morph.weight;
        }
        for idx in 0..self.group_order.len() {
            let handle = self.group_order[idx];
            let weight = self.morphs[handle].effective_weight;
            if weight == 0f32 {
                continue;
            }
            for child_idx in 0..self.morphs[handle].groups.len() {
                let (child, share) = self.morphs[handle].groups[child_idx];
                self.morphs[child].effective_weight += weight * share;
            }
        }
    }

    /// Adds weighted bone morph offsets onto the bones. Call after `resolve`.
    pub fn apply_bone_morphs(&self, bones: &mut BoneSet) {
        for morph in self
            .morphs
            .iter()
            .filter(|morph| morph.typ == ModelMorphType::Bone && morph.effective_weight != 0f32)
        {
            let weight = morph.effective_weight;
            for offset in &morph.bones {
                if let Some(bone) = bones.get_mut(offset.bone) {
                    bone.local_morph_translation += offset.translation * weight;
                    bone.local_morph_orientation = normalize_or_identity(
                        bone.local_morph_orientation * scale_rotation(offset.orientation, weight),
                    );
                }
            }
        }
    }

    pub fn effective_weights(&self) -> Vec<f32> {
        self.morphs
            .iter()
            .map(|morph| morph.effective_weight)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use vpvl2_loader::model::{ModelBone, ModelMorphBone, ModelMorphGroup};

    use super::*;
    use crate::error::ErrorKind;

    fn group(name: &str, children: &[(i32, f32)]) -> ModelMorph {
        ModelMorph {
            name_ja: name.to_owned(),
            typ: ModelMorphType::Group,
            groups: children
                .iter()
                .map(|(morph_index, weight)| ModelMorphGroup {
                    morph_index: *morph_index,
                    weight: *weight,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn bones() -> Result<BoneSet, Vpvl2Error> {
        BoneSet::new(&[ModelBone::new("root", [0f32; 3], -1)])
    }

    #[test]
    fn test_group_weights_are_forwarded() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let raw = vec![
            ModelMorph {
                name_ja: "smile".to_owned(),
                ..Default::default()
            },
            group("happy", &[(0, 0.5f32)]),
            group("party", &[(1, 1f32), (0, 0.25f32)]),
        ];
        let mut morphs = MorphSet::new(&raw, &bones()?)?;
        morphs.set_weight(2, 1f32);
        morphs.resolve();
        assert_eq!(vec![0.75f32, 1f32, 1f32], morphs.effective_weights());
        Ok(())
    }

    #[test]
    fn test_group_cycle_is_invalid() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let raw = vec![group("a", &[(1, 1f32)]), group("b", &[(0, 1f32)])];
        let err = MorphSet::new(&raw, &bones()?).unwrap_err();
        assert_eq!(ErrorKind::InvalidMorphs, err.kind());
        Ok(())
    }

    #[test]
    fn test_bone_morph_offsets() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut bones = bones()?;
        let raw = vec![ModelMorph {
            name_ja: "lift".to_owned(),
            typ: ModelMorphType::Bone,
            bones: vec![ModelMorphBone {
                bone_index: 0,
                translation: [0f32, 2f32, 0f32],
                orientation: [0f32, 0f32, 0f32, 1f32],
            }],
            ..Default::default()
        }];
        let mut morphs = MorphSet::new(&raw, &bones)?;
        morphs.set_weight(0, 0.5f32);
        morphs.resolve();
        morphs.apply_bone_morphs(&mut bones);
        assert_eq!(
            Vector3::new(0f32, 1f32, 0f32),
            bones.get(0).unwrap().local_morph_translation
        );
        let mut bad = raw.clone();
        bad[0].bones[0].bone_index = 3;
        let err = MorphSet::new(&bad, &bones).unwrap_err();
        assert_eq!(ErrorKind::InvalidMorphs, err.kind());
        Ok(())
    }
}
