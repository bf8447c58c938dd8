use vpvl2_loader::common::LoaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidBones,
    InvalidMorphs,
    InvalidConstraints,
    InvalidRigidBodies,
    InvalidJoints,
    InvalidMotion,
    Configuration,
    NotFound,
    Loader,
    InvalidCommand,
}

impl ErrorKind {
    /// Load errors make a single load operation fail without touching registered state.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidBones
                | ErrorKind::InvalidMorphs
                | ErrorKind::InvalidConstraints
                | ErrorKind::InvalidRigidBodies
                | ErrorKind::InvalidJoints
                | ErrorKind::InvalidMotion
                | ErrorKind::Loader
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vpvl2Error {
    reason: String,
    recovery_suggestion: String,
    kind: ErrorKind,
}

impl std::fmt::Display for Vpvl2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recovery_hint = if self.recovery_suggestion.is_empty() {
            "".to_owned()
        } else {
            format!("(Try \"{}\" to recover)", self.recovery_suggestion)
        };
        write!(f, "[{:?}]{}{}", self.kind, self.reason, recovery_hint)
    }
}

impl std::error::Error for Vpvl2Error {}

impl From<LoaderError> for Vpvl2Error {
    fn from(err: LoaderError) -> Self {
        Self::new(&err.to_string(), "Check the document location and format", ErrorKind::Loader)
    }
}

impl Vpvl2Error {
    pub fn new(reason: &str, recovery_suggestion: &str, kind: ErrorKind) -> Self {
        Self {
            reason: reason.to_owned(),
            recovery_suggestion: recovery_suggestion.to_owned(),
            kind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn invalid_bones(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::InvalidBones,
        }
    }

    pub fn invalid_morphs(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::InvalidMorphs,
        }
    }

    pub fn invalid_rigid_bodies(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::InvalidRigidBodies,
        }
    }

    pub fn invalid_joints(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::InvalidJoints,
        }
    }

    pub fn invalid_motion(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "Re-export the motion".to_owned(),
            kind: ErrorKind::InvalidMotion,
        }
    }

    pub fn configuration(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::Configuration,
        }
    }

    pub fn not_found(what: &str, name: &str) -> Self {
        Self {
            reason: format!("{} \"{}\" is not found", what, name),
            recovery_suggestion: "".to_owned(),
            kind: ErrorKind::NotFound,
        }
    }

    pub fn invalid_command(reason: String) -> Self {
        Self {
            reason,
            recovery_suggestion: "Check the argument count and tokens".to_owned(),
            kind: ErrorKind::InvalidCommand,
        }
    }
}
