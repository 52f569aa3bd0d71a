//! Validated identifier types for the image store.
//!
//! Every folder and file stored under the storage root is addressed by a name supplied by a
//! remote client. This crate guarantees, once a value is constructed, that the name is a single
//! safe path segment: joining it onto a directory can never escape that directory.
//!
//! ## Segment rules
//! - Not empty, at most [`MAX_NAME_BYTES`] bytes
//! - Not `.` or `..`, and no leading `.` (dot-prefixed names are reserved for the store's own
//!   staging files and tombstones)
//! - No `/`, `\`, NUL or other control characters
//!
//! Names are not trimmed or normalised. The validated string is exactly the on-disk name.

use std::path::{Component, Path};

/// Longest accepted name, in bytes. Matches `NAME_MAX` on common filesystems.
pub const MAX_NAME_BYTES: usize = 255;

/// Errors that can occur when validating a path segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name was empty
    #[error("name cannot be empty")]
    Empty,

    /// The name exceeded [`MAX_NAME_BYTES`]
    #[error("name is {0} bytes long (max 255)")]
    TooLong(usize),

    /// `.`, `..` or any other dot-prefixed name
    #[error("name {0:?} is reserved")]
    Reserved(String),

    /// A separator or control character was present
    #[error("name {0:?} contains a path separator or control character")]
    InvalidCharacter(String),

    /// The name did not resolve to exactly one normal path component
    #[error("name {0:?} is not a single path segment")]
    NotASegment(String),
}

fn validate_segment(input: &str) -> Result<(), NameError> {
    if input.is_empty() {
        return Err(NameError::Empty);
    }

    if input.len() > MAX_NAME_BYTES {
        return Err(NameError::TooLong(input.len()));
    }

    if input.starts_with('.') {
        return Err(NameError::Reserved(input.to_owned()));
    }

    if input
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(NameError::InvalidCharacter(input.to_owned()));
    }

    // Catches platform-specific prefixes (e.g. `C:` on Windows) the checks above do not.
    let mut components = Path::new(input).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(NameError::NotASegment(input.to_owned())),
    }
}

/// Name of a folder directly under the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderName(String);

impl FolderName {
    /// Validates `input` as a folder name.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] describing the first rule the input breaks.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, NameError> {
        let input = input.as_ref();
        validate_segment(input)?;
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileName(String);

impl FileName {
    /// Validates `input` as a file name.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] describing the first rule the input breaks.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, NameError> {
        let input = input.as_ref();
        validate_segment(input)?;
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FolderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FolderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for FolderName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl AsRef<Path> for FileName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}
