use std::path::PathBuf;

/// Errors that occur while building a [`VersionDefinition`](crate::VersionDefinition), i.e. while
/// declaring parts and composing a template.
#[derive(thiserror::Error, Debug)]
pub enum DefinitionError {
    /// The template referenced a part name that was never declared.
    #[error("Part `{name}` is referenced in template but not declared")]
    UnknownPart {
        /// The undeclared name
        name: String,
    },

    /// A static part was declared without the literal text it should match.
    #[error("Static part `{name}` should have a value")]
    MissingStaticValue {
        /// The static part's name
        name: String,
    },

    /// A recursive section was declared inside another recursive section.
    #[error("Recursive section `{inner}` cannot be nested inside recursive section `{outer}`")]
    NestedRecursive {
        /// The enclosing recursive section
        outer: String,
        /// The nested recursive section
        inner: String,
    },

    /// A recursive section is missing its `first` or `rest` sub-template.
    #[error("Recursive section `{name}` should declare both `first` and `rest`, but `{missing}` is missing")]
    IncompleteRecursive {
        /// The recursive section's name
        name: String,
        /// Which of `first`/`rest` was not declared
        missing: &'static str,
    },

    /// A recursive section's name is already used by a part or another recursive section.
    #[error("Recursive section name `{name}` is already used by a part or another section")]
    ConflictingSpanName {
        /// The conflicting name
        name: String,
    },

    /// A definition document could not be deserialized.
    #[error("Definition document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The compiled template could not be turned into a regular expression.
    #[error("Template compiled to an invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors that occur while parsing a version string against a definition.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum VersionError {
    /// The version string does not satisfy the definition's template.
    #[error("Version string `{version_string}` does not satisfy expected format")]
    FormatMismatch {
        /// The offending version string
        version_string: String,
    },
}

impl VersionError {
    pub(crate) fn mismatch(version_string: &str) -> Self {
        VersionError::FormatMismatch {
            version_string: version_string.to_owned(),
        }
    }
}

/// Errors that occur while loading a version from a [`VersionSource`](crate::VersionSource).
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The version file exists but could not be read.
    #[error("Could not read version file `{}`: {source}", path.display())]
    Io {
        /// The version file path
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// The composed version string did not parse.
    #[error("{0}")]
    Version(#[from] VersionError),
}
