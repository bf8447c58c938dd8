use cgmath::{Deg, Quaternion, Rotation3, Vector3};
use vpvl2::{
    config::BezierSolverConfig,
    keyframe::update::{KeyframeCommand, UndoStack},
    motion::{
        keyframe::{BoneKeyframe, MorphKeyframe},
        seek::BoneFrameTransform,
        Motion,
    },
    ErrorKind, SceneConfig,
};

use crate::init_logger;

const TIMES: [f32; 7] = [0f32, 5f32, 10f32, 17.5f32, 30f32, 45f32, 100f32];

fn motion() -> Motion {
    let mut motion = Motion::empty(BezierSolverConfig::default());
    for (frame_index, x, angle) in [(10, 0f32, 0f32), (30, 4f32, 45f32), (50, -2f32, 90f32)] {
        motion.add_bone_keyframe(
            "arm",
            BoneKeyframe::new(
                frame_index,
                Vector3::new(x, 0f32, 0f32),
                Quaternion::from_angle_y(Deg(angle)),
            ),
        );
    }
    motion
}

fn samples(motion: &Motion) -> Vec<Option<BoneFrameTransform>> {
    TIMES
        .iter()
        .map(|time| motion.find_bone_transform("arm", *time))
        .collect()
}

#[test]
fn test_remove_then_re_add_restores_track() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let mut motion = motion();
    let before = samples(&motion);
    let removed = motion.find_bone_keyframe("arm", 30).cloned().unwrap();
    let mut stack = UndoStack::new(8);
    let command = KeyframeCommand::remove_bone(&motion, "arm", 30)?;
    stack.push_and_apply(command, &mut motion);
    assert_ne!(before, samples(&motion));
    let command = KeyframeCommand::add_bone(&motion, "arm", removed);
    stack.push_and_apply(command, &mut motion);
    assert_eq!(before, samples(&motion));
    assert_eq!(50, motion.max_frame_index());
    Ok(())
}

#[test]
fn test_undo_walks_back_edits() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let mut motion = motion();
    let before = samples(&motion);
    let mut stack = UndoStack::from_config(&SceneConfig::default());
    let command = KeyframeCommand::add_bone(
        &motion,
        "arm",
        BoneKeyframe::new(
            30,
            Vector3::new(9f32, 9f32, 9f32),
            Quaternion::from_angle_x(Deg(10f32)),
        ),
    );
    stack.push_and_apply(command, &mut motion);
    let smile = MorphKeyframe {
        frame_index: 20,
        weight: 1f32,
    };
    let command = KeyframeCommand::add_morph(&motion, "smile", smile);
    stack.push_and_apply(command, &mut motion);
    let after = samples(&motion);
    assert_ne!(before, after);
    assert_eq!(Some(1f32), motion.find_morph_weight("smile", 20f32));

    assert!(stack.undo(&mut motion));
    assert!(stack.undo(&mut motion));
    assert!(!stack.undo(&mut motion));
    assert_eq!(before, samples(&motion));
    assert_eq!(None, motion.find_morph_weight("smile", 20f32));
    assert!(stack.redo(&mut motion));
    assert_eq!(after, samples(&motion));

    let err = KeyframeCommand::remove_bone(&motion, "arm", 11).unwrap_err();
    assert_eq!(ErrorKind::NotFound, err.kind());
    Ok(())
}
