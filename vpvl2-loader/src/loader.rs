use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::{common::LoaderError, model::Model, motion::Motion};

/// Produces decoded models and motions for the core. The core never sees bytes.
pub trait Loader {
    fn load_model(&self, location: &str) -> Result<Model, LoaderError>;
    fn load_motion(&self, location: &str) -> Result<Motion, LoaderError>;
}

const BINARY_EXTENSIONS: [&str; 4] = ["pmd", "pmx", "vmd", "mvd"];

fn decode<T: DeserializeOwned>(location: &str, bytes: &[u8]) -> Result<T, LoaderError> {
    ron::de::from_bytes(bytes).map_err(|err| LoaderError::Decode {
        location: location.to_owned(),
        message: err.to_string(),
    })
}

fn check_extension(location: &str) -> Result<(), LoaderError> {
    let extension = Path::new(location)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if BINARY_EXTENSIONS.contains(&ext.as_str()) => {
            Err(LoaderError::UnsupportedFormat(location.to_owned()))
        }
        _ => Ok(()),
    }
}

/// Reads RON documents relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, location: &str) -> Result<Vec<u8>, LoaderError> {
        check_extension(location)?;
        let path = self.root.join(location);
        if !path.is_file() {
            return Err(LoaderError::NotFound(path.display().to_string()));
        }
        Ok(std::fs::read(path)?)
    }
}

impl Loader for FileSystemLoader {
    fn load_model(&self, location: &str) -> Result<Model, LoaderError> {
        decode(location, &self.read(location)?)
    }

    fn load_motion(&self, location: &str) -> Result<Motion, LoaderError> {
        decode(location, &self.read(location)?)
    }
}

/// Serves RON documents from named in-memory entries, e.g. the unpacked contents of an archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveLoader {
    entries: HashMap<String, Vec<u8>>,
}

impl ArchiveLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entry(&mut self, location: &str, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(Self::normalize(location), bytes)
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    fn normalize(location: &str) -> String {
        location.replace('\\', "/").trim_start_matches("./").to_owned()
    }

    fn read(&self, location: &str) -> Result<&[u8], LoaderError> {
        check_extension(location)?;
        self.entries
            .get(&Self::normalize(location))
            .map(|bytes| bytes.as_slice())
            .ok_or_else(|| LoaderError::NotFound(location.to_owned()))
    }
}

impl Loader for ArchiveLoader {
    fn load_model(&self, location: &str) -> Result<Model, LoaderError> {
        decode(location, self.read(location)?)
    }

    fn load_motion(&self, location: &str) -> Result<Motion, LoaderError> {
        decode(location, self.read(location)?)
    }
}

/// Hands out prebuilt values. Intended for tests.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    models: HashMap<String, Model>,
    motions: HashMap<String, Motion>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, location: &str, model: Model) -> Self {
        self.models.insert(location.to_owned(), model);
        self
    }

    pub fn with_motion(mut self, location: &str, motion: Motion) -> Self {
        self.motions.insert(location.to_owned(), motion);
        self
    }
}

impl Loader for MockLoader {
    fn load_model(&self, location: &str) -> Result<Model, LoaderError> {
        self.models
            .get(location)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(location.to_owned()))
    }

    fn load_motion(&self, location: &str) -> Result<Motion, LoaderError> {
        self.motions
            .get(location)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(location.to_owned()))
    }
}

#[test]
fn test_archive_loader_reads_ron_motion() -> Result<(), Box<dyn std::error::Error + 'static>> {
    use crate::motion::{MotionBoneKeyframe, MotionTrackData};

    let motion = Motion {
        target_model_name: "miku".to_owned(),
        bone_tracks: vec![MotionTrackData::new(
            "center",
            vec![MotionBoneKeyframe {
                frame_index: 15,
                translation: [0f32, 1f32, 2f32],
                ..Default::default()
            }],
        )],
        ..Default::default()
    };
    let text = ron::ser::to_string_pretty(&motion, ron::ser::PrettyConfig::default())?;
    let mut loader = ArchiveLoader::new();
    loader.insert_entry("motions\\walk.ron", text.into_bytes());
    let decoded = loader.load_motion("./motions/walk.ron")?;
    assert_eq!("miku", decoded.target_model_name);
    assert_eq!(1, decoded.num_keyframes());
    assert_eq!(15, decoded.bone_tracks[0].keyframes[0].frame_index);
    Ok(())
}

#[test]
fn test_archive_loader_partial_document_uses_defaults() -> Result<(), Box<dyn std::error::Error + 'static>> {
    let mut loader = ArchiveLoader::new();
    loader.insert_entry(
        "model.ron",
        br#"(name_ja: "box", bones: [(name_ja: "root", origin: (0.0, 1.0, 0.0))])"#.to_vec(),
    );
    let model = loader.load_model("model.ron")?;
    assert_eq!(1, model.bones.len());
    assert_eq!(-1, model.bones[0].parent_bone_index);
    assert_eq!(1f32, model.bones[0].inherent_coefficient);
    Ok(())
}

#[test]
fn test_binary_formats_are_rejected() {
    let loader = ArchiveLoader::new();
    assert_eq!(
        Err(LoaderError::UnsupportedFormat("a.VMD".to_owned())),
        loader.load_motion("a.VMD").map(|_| ())
    );
    let loader = FileSystemLoader::new("/nonexistent");
    assert!(matches!(
        loader.load_model("model.ron"),
        Err(LoaderError::NotFound(_))
    ));
}

#[test]
fn test_mock_loader() {
    let loader = MockLoader::new().with_model("a", Model::default());
    assert!(loader.load_model("a").is_ok());
    assert_eq!(
        Err(LoaderError::NotFound("b".to_owned())),
        loader.load_motion("b").map(|_| ())
    );
}
