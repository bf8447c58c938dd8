use cgmath::Matrix4;

use crate::{camera::CameraState, light::LightState, model::Model, scene_controller::ModelHandle};

pub type RawMatrix = [[f32; 4]; 4];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_matrix: RawMatrix,
    pub position: [f32; 4],
    pub direction: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub color: [f32; 4],
    pub direction: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSnapshot {
    pub handle: ModelHandle,
    pub name: String,
    pub visible: bool,
    pub world_transforms: Vec<RawMatrix>,
    pub skinning_transforms: Vec<RawMatrix>,
    pub morph_weights: Vec<f32>,
}

impl ModelSnapshot {
    fn fill(&mut self, handle: ModelHandle, model: &Model) {
        self.handle = handle;
        if self.name != model.name() {
            self.name = model.name().to_owned();
        }
        self.visible = model.is_visible();
        self.world_transforms.clear();
        self.world_transforms
            .extend(model.world_transforms().map(|m| -> RawMatrix { (*m).into() }));
        self.skinning_transforms.clear();
        self.skinning_transforms
            .extend(model.skinning_transforms().map(|m| -> RawMatrix { (*m).into() }));
        self.morph_weights.clear();
        self.morph_weights
            .extend(model.morphs().iter().map(|morph| morph.effective_weight()));
    }

    /// Skinning matrices as one contiguous buffer, column major.
    pub fn skinning_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.skinning_transforms)
    }

    pub fn world_transform(&self, bone: usize) -> Option<Matrix4<f32>> {
        self.world_transforms.get(bone).map(|m| Matrix4::from(*m))
    }

    pub fn skinning_transform(&self, bone: usize) -> Option<Matrix4<f32>> {
        self.skinning_transforms.get(bone).map(|m| Matrix4::from(*m))
    }
}

/// What the renderer reads after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub models: Vec<ModelSnapshot>,
    pub camera: CameraState,
    pub light: LightState,
}

impl Default for RenderSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            models: vec![],
            camera: CameraState::default(),
            light: LightState::default(),
        }
    }
}

impl RenderSnapshot {
    /// Rebuilds in place, reusing the buffers of the previous tick.
    pub(crate) fn rebuild<'a, I>(&mut self, models: I, camera: &CameraState, light: &LightState)
    where
        I: IntoIterator<Item = (ModelHandle, &'a Model)>,
    {
        self.tick += 1;
        let mut len = 0;
        for (handle, model) in models {
            if self.models.len() <= len {
                self.models.push(ModelSnapshot::default());
            }
            self.models[len].fill(handle, model);
            len += 1;
        }
        self.models.truncate(len);
        self.camera = *camera;
        self.light = *light;
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&ModelSnapshot> {
        self.models.iter().find(|model| model.handle == handle)
    }

    pub fn camera_uniform(&self) -> CameraUniform {
        CameraUniform {
            view_matrix: self.camera.view_matrix().into(),
            position: self.camera.position().extend(1f32).into(),
            direction: self.camera.direction().extend(0f32).into(),
        }
    }

    pub fn light_uniform(&self) -> LightUniform {
        LightUniform {
            color: self.light.color().extend(1f32).into(),
            direction: self.light.direction().extend(0f32).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use vpvl2_loader::model::{Model as RawModel, ModelBone};

    use super::*;

    #[test]
    fn test_snapshot_exposes_skinning_bytes() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let model = Model::new(&RawModel {
            name_ja: "cube".to_owned(),
            bones: vec![
                ModelBone::new("root", [0f32; 3], -1),
                ModelBone::new("child", [0f32, 1f32, 0f32], 0),
            ],
            ..Default::default()
        })?;
        let mut snapshot = RenderSnapshot::default();
        snapshot.rebuild([(7, &model)], &CameraState::default(), &LightState::default());
        let model_snapshot = snapshot.model(7).unwrap();
        assert_eq!(2 * 16 * 4, model_snapshot.skinning_bytes().len());
        assert_eq!(1, snapshot.tick);
        snapshot.rebuild(std::iter::empty(), &CameraState::default(), &LightState::default());
        assert!(snapshot.models.is_empty());
        let uniform = snapshot.camera_uniform();
        assert_eq!(1f32, uniform.position[3]);
        Ok(())
    }
}
