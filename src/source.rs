use crate::{
    definition::VersionDefinition,
    error::SourceError,
    version::Version,
};
use std::{fs, io, path::Path};
use tracing::debug;

/// Supplies the version of a project: a base version read from a file, suffixed with build
/// metadata (`<base>+<metadata>`).
///
/// The metadata is an explicit value, typically the current commit hash. Nothing is read from the
/// process environment.
///
/// ```no_run
/// use vershape::{VersionDefinition, VersionSource};
///
/// let source = VersionSource::new("ab4d");
/// let version = source
///     .load("VERSION", &VersionDefinition::semver().unwrap())
///     .unwrap();
/// println!("{}", version.to_tag());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSource {
    metadata: String,
    default_base: String,
}

impl Default for VersionSource {
    /// Metadata `LOCAL`, base `0.0.0` when no version file exists.
    fn default() -> Self {
        Self {
            metadata: "LOCAL".to_owned(),
            default_base: "0.0.0".to_owned(),
        }
    }
}

impl VersionSource {
    /// A source appending `metadata` to the base version.
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            ..Self::default()
        }
    }

    /// Uses `base` when the version file does not exist.
    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = base.into();
        self
    }

    /// Reads the base version from `path` (surrounding whitespace trimmed) and appends the
    /// metadata. A missing file yields the default base.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Io`] if the file exists but cannot be read.
    pub fn compose(&self, path: impl AsRef<Path>) -> Result<String, SourceError> {
        let path = path.as_ref();
        let base = match fs::read_to_string(path) {
            Ok(contents) => contents.trim().to_owned(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no version file, using default base");
                self.default_base.clone()
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        Ok(format!("{base}+{}", self.metadata))
    }

    /// Composes the version string like [`VersionSource::compose`] and parses it with
    /// `definition`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Io`] if the file exists but cannot be read.
    /// - [`SourceError::Version`] if the composed string does not satisfy `definition`.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        definition: &VersionDefinition,
    ) -> Result<Version, SourceError> {
        let version_str = self.compose(path)?;
        Ok(definition.parse(&version_str)?)
    }
}
