//! Storage Keys
//!
//! Ordered, validated path segments addressing one document.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, VaultError};

use super::file::DOCUMENT_EXTENSION;

/// Separator used by `Display` and `StorageKey::parse`
pub const SEPARATOR: char = '/';

/// Check every segment of a key or prefix
///
/// Rejected segments:
/// - empty
/// - `.` or anything containing `..`
/// - anything containing `/`, `\` or NUL
///
/// This runs before any filesystem access and is what keeps keys inside
/// the data directory.
pub fn validate_key<S: AsRef<str>>(segments: &[S]) -> Result<()> {
    segments
        .iter()
        .try_for_each(|segment| validate_segment(segment.as_ref()))
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(VaultError::invalid(segment, "segment is empty"));
    }
    if segment == "." {
        return Err(VaultError::invalid(segment, "segment refers to the current directory"));
    }
    if segment.contains("..") {
        return Err(VaultError::invalid(segment, "segment contains a parent-directory token"));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(VaultError::invalid(segment, "segment contains a path separator"));
    }
    if segment.contains('\0') {
        return Err(VaultError::invalid(segment, "segment contains a NUL byte"));
    }
    Ok(())
}

/// Check segments that name directories (every key segment but the last)
///
/// A directory called `x.json` would share its path with the document `["x"]`.
pub(crate) fn validate_directory_segments<S: AsRef<str>>(segments: &[S]) -> Result<()> {
    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    for segment in segments {
        let segment = segment.as_ref();
        validate_segment(segment)?;
        if segment.ends_with(&suffix) {
            return Err(VaultError::invalid(
                segment,
                "only the final segment may end in the document extension",
            ));
        }
    }
    Ok(())
}

/// Address of one document, e.g. `["session", "abc123"]`
///
/// Always non-empty and always valid: every segment passes `validate_key`,
/// and no segment before the last ends in `.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    segments: Vec<String>,
}

impl StorageKey {
    /// Build a key from segments, validating each
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let Some((last, parent)) = segments.split_last() else {
            return Err(VaultError::invalid("", "key has no segments"));
        };
        validate_directory_segments(parent)?;
        validate_segment(last)?;
        Ok(Self { segments })
    }

    /// Parse a `/`-separated key such as `session/abc123`
    pub fn parse(s: &str) -> Result<Self> {
        Self::new(s.split(SEPARATOR))
    }

    /// The key's segments, in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (never zero)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The final segment, which names the document file
    pub fn last(&self) -> &str {
        // Non-empty by construction
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Segments before the last one (the document's directory)
    pub fn parent(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// A new key with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let segment = segment.into();
        validate_directory_segments(&[self.last()])?;
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// True if `prefix` is a leading run of this key's segments
    pub fn starts_with<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        prefix.len() <= self.segments.len()
            && prefix
                .iter()
                .zip(&self.segments)
                .all(|(p, s)| p.as_ref() == s)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl AsRef<[String]> for StorageKey {
    fn as_ref(&self) -> &[String] {
        &self.segments
    }
}

impl TryFrom<Vec<String>> for StorageKey {
    type Error = VaultError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::new(segments)
    }
}

impl TryFrom<&[&str]> for StorageKey {
    type Error = VaultError;

    fn try_from(segments: &[&str]) -> Result<Self> {
        Self::new(segments.iter().copied())
    }
}

impl std::str::FromStr for StorageKey {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for StorageKey {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error> {
        self.segments.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StorageKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let segments = Vec::<String>::deserialize(deserializer)?;
        Self::new(segments).map_err(serde::de::Error::custom)
    }
}
