//! Release version derived from the triggering git ref.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version published by continuous (untagged) builds. Never becomes `latest`.
pub const DEV_VERSION: &str = "0.0.1-master";

const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_PREFIX: &str = "refs/heads/";

/// Branches whose builds are published as [`DEV_VERSION`].
pub const DEV_BRANCHES: &[&str] = &["master", "main"];

/// Errors that can occur when deriving a [`ReleaseVersion`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ReleaseError {
    /// The ref or explicit version was empty after trimming.
    #[error("Release version is empty")]
    Empty,

    /// The version contains a character that cannot appear in an object key
    /// or file name.
    #[error("Release version {version:?} contains invalid character {ch:?}")]
    InvalidChar {
        /// The rejected version string.
        version: String,
        /// The offending character.
        ch: char,
    },

    /// A branch ref other than the dev branches. Publishing it would
    /// overwrite the dev build with unrelated work.
    #[error("Branch {0:?} is not published; push a tag or build master/main")]
    UnpublishedBranch(String),
}

/// The version string for one publish run (e.g. `"1.2.3"`).
///
/// Constructed once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// Validate an explicit version string.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Empty`] for blank input, or
    /// [`ReleaseError::InvalidChar`] if the version contains a path separator
    /// or whitespace.
    pub fn new(version: impl Into<String>) -> Result<Self, ReleaseError> {
        let version = version.into().trim().to_string();
        if version.is_empty() {
            return Err(ReleaseError::Empty);
        }
        if let Some(ch) = version
            .chars()
            .find(|c| *c == '/' || *c == '\\' || c.is_whitespace())
        {
            return Err(ReleaseError::InvalidChar { version, ch });
        }
        Ok(Self(version))
    }

    /// Derive the version from a git ref such as `refs/tags/2.0.0`.
    ///
    /// Tag refs yield the bare tag. The dev branches ([`DEV_BRANCHES`]) map
    /// to [`DEV_VERSION`]. Anything else is taken verbatim.
    ///
    /// # Errors
    ///
    /// Same as [`ReleaseVersion::new`], plus
    /// [`ReleaseError::UnpublishedBranch`] for any other branch ref.
    pub fn from_git_ref(git_ref: &str) -> Result<Self, ReleaseError> {
        let git_ref = git_ref.trim();
        if let Some(tag) = git_ref.strip_prefix(TAG_PREFIX) {
            Self::new(tag)
        } else if let Some(branch) = git_ref.strip_prefix(BRANCH_PREFIX) {
            if DEV_BRANCHES.contains(&branch) {
                Ok(Self::dev())
            } else {
                Err(ReleaseError::UnpublishedBranch(branch.to_string()))
            }
        } else {
            Self::new(git_ref)
        }
    }

    /// The dev sentinel version.
    pub fn dev() -> Self {
        Self(DEV_VERSION.to_string())
    }

    /// Whether this is the dev sentinel, which must never become `latest`.
    pub fn is_dev(&self) -> bool {
        self.0 == DEV_VERSION
    }

    /// Borrow the version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReleaseVersion> for String {
    fn from(value: ReleaseVersion) -> Self {
        value.0
    }
}

impl AsRef<str> for ReleaseVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
