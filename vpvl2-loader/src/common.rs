use std::fmt;

pub const DEFAULT_INTERPOLATION: [u8; 4] = [20u8, 20u8, 107u8, 107u8];

/// Index value used by the decoded records for "no object".
pub const NULL_INDEX: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    NotFound(String),
    Io(String),
    Decode { location: String, message: String },
    UnsupportedFormat(String),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::NotFound(location) => write!(f, "{} is not found", location),
            LoaderError::Io(message) => write!(f, "io error: {}", message),
            LoaderError::Decode { location, message } => {
                write!(f, "failed to decode {}: {}", location, message)
            }
            LoaderError::UnsupportedFormat(location) => {
                write!(f, "{} has an unsupported format", location)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Io(err.to_string())
    }
}

/// Converts a nullable record index into a position inside a collection of `len` objects.
///
/// Returns `Ok(None)` for a null index and `Err(index)` when the index points outside.
pub fn resolve_index(index: i32, len: usize) -> Result<Option<usize>, i32> {
    if index == NULL_INDEX {
        Ok(None)
    } else if index >= 0 && (index as usize) < len {
        Ok(Some(index as usize))
    } else {
        Err(index)
    }
}

#[test]
fn test_resolve_index() {
    assert_eq!(Ok(None), resolve_index(-1, 3));
    assert_eq!(Ok(Some(2)), resolve_index(2, 3));
    assert_eq!(Err(3), resolve_index(3, 3));
    assert_eq!(Err(-4), resolve_index(-4, 3));
}
