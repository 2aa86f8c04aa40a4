use crate::{
    error::{DefinitionError, VersionError},
    extract::extract,
    matcher::CompiledMatcher,
    part::{catalog, PartCatalog, PartSpec},
    template::{Composer, Template},
    version::Version,
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// A VersionDefinition binds a catalog of parts to a template describing how they compose, and
/// parses version strings into [`Version`]s.
///
/// The template is compiled once, when the definition is built, and reused by every
/// [`parse`](VersionDefinition::parse) call. Definitions are immutable and can be shared between
/// threads.
///
/// # Examples
///
/// ```
/// use vershape::{PartSpec, Value, VersionDefinition};
///
/// let definition = VersionDefinition::new(
///     [
///         ("major", PartSpec::numeric()),
///         ("minor", PartSpec::numeric()),
///         ("identifier", PartSpec::alphanumeric().multivalued()),
///         ("dot", PartSpec::literal(".")),
///         ("hyphen", PartSpec::literal("-")),
///     ],
///     |v| {
///         v.elements(&["major", "dot", "minor"])?;
///         v.optional(|o| {
///             o.recursive("prerelease", |r| {
///                 r.first(|f| {
///                     f.elements(&["hyphen", "identifier"])?;
///                     Ok(())
///                 })?;
///                 r.rest(|s| {
///                     s.elements(&["dot", "identifier"])?;
///                     Ok(())
///                 })?;
///                 Ok(())
///             })?;
///             Ok(())
///         })?;
///         Ok(())
///     },
/// )
/// .unwrap();
///
/// let version = definition.parse("1.2-alpha.beta").unwrap();
/// assert_eq!(Some(&Value::Number(1)), version.get("major"));
/// assert_eq!(Some(&Value::list(["alpha", "beta"])), version.get("identifier"));
/// assert!(definition.parse("1.2-").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct VersionDefinition {
    parts: Arc<PartCatalog>,
    template: Arc<Template>,
    matcher: Arc<CompiledMatcher>,
}

impl VersionDefinition {
    /// Builds a definition from part declarations and a composition function that lays them out.
    ///
    /// # Errors
    ///
    /// - [`DefinitionError::MissingStaticValue`] if a static part has no value.
    /// - [`DefinitionError::UnknownPart`] if the composition function references an undeclared
    ///   part.
    /// - [`DefinitionError::IncompleteRecursive`], [`DefinitionError::NestedRecursive`] or
    ///   [`DefinitionError::ConflictingSpanName`] if a recursive section is malformed.
    pub fn new<I, N, F>(parts: I, compose: F) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = (N, PartSpec)>,
        N: Into<String>,
        F: for<'p> FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        let parts = catalog(parts)?;
        let root = Composer::compose(&parts, compose)?;
        Self::from_parts(parts, Template { root })
    }

    fn from_parts(parts: PartCatalog, template: Template) -> Result<Self, DefinitionError> {
        let matcher = CompiledMatcher::compile(&parts, &template)?;
        Ok(Self {
            parts: Arc::new(parts),
            template: Arc::new(template),
            matcher: Arc::new(matcher),
        })
    }

    /// Builds a definition from a JSON document.
    ///
    /// ```
    /// use vershape::{Value, VersionDefinition};
    ///
    /// let definition = VersionDefinition::from_json(r#"{
    ///     "parts": {
    ///         "major": { "type": "numeric" },
    ///         "build": { "type": "numeric" },
    ///         "hyphen": { "type": "static", "value": "-" }
    ///     },
    ///     "template": ["major", { "optional": ["hyphen", "build"] }]
    /// }"#).unwrap();
    ///
    /// assert_eq!(None, definition.parse("7").unwrap().get("build"));
    /// assert_eq!(Some(&Value::Number(3)), definition.parse("7-3").unwrap().get("build"));
    /// ```
    ///
    /// # Errors
    ///
    /// - [`DefinitionError::Malformed`] if the document does not deserialize, including when a
    ///   part has an unsupported type.
    /// - Any error [`VersionDefinition::new`] can return.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let document: DefinitionDocument = serde_json::from_str(json)?;
        document.build()
    }

    /// A definition for [semantic versions](https://semver.org/):
    /// `major.minor.patch[-prerelease][+build]`, where `prerelease` and `build` are multivalued,
    /// dot-separated identifiers.
    pub fn semver() -> Result<Self, DefinitionError> {
        Self::new(
            [
                ("major", PartSpec::numeric()),
                ("minor", PartSpec::numeric()),
                ("patch", PartSpec::numeric()),
                (
                    "prerelease",
                    PartSpec::alphanumeric_or_hyphen().multivalued(),
                ),
                ("build", PartSpec::alphanumeric_or_hyphen().multivalued()),
                ("dot", PartSpec::literal(".")),
                ("hyphen", PartSpec::literal("-")),
                ("plus", PartSpec::literal("+")),
            ],
            |v| {
                v.elements(&["major", "dot", "minor", "dot", "patch"])?;
                dotted_identifiers(v, "prerelease_identifiers", "hyphen", "prerelease")?;
                dotted_identifiers(v, "build_identifiers", "plus", "build")?;
                Ok(())
            },
        )
    }

    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// - [`VersionError::FormatMismatch`] if `version_str` does not satisfy the template, in
    ///   whole or in any present optional or recursive section.
    pub fn parse(&self, version_str: &str) -> Result<Version, VersionError> {
        let extraction = extract(&self.parts, &self.matcher, version_str)?;
        Ok(Version::new(
            Arc::clone(&self.parts),
            Arc::clone(&self.template),
            extraction.values,
            extraction.markers,
        ))
    }

    /// Returns true if `version_str` parses.
    pub fn is_valid(&self, version_str: &str) -> bool {
        self.parse(version_str).is_ok()
    }

    /// The declared parts.
    pub fn parts(&self) -> &PartCatalog {
        &self.parts
    }

    /// The template.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The whole-string regular expression the template compiled to.
    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }
}

impl PartialEq for VersionDefinition {
    // the compiled matcher is derived from the other two fields
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts && self.template == other.template
    }
}

impl Eq for VersionDefinition {}

impl Hash for VersionDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
        self.template.hash(state);
    }
}

/// A definition as written in a JSON document.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DefinitionDocument {
    /// The declared parts, keyed by name
    pub parts: BTreeMap<String, PartSpec>,

    /// The template, as a sequence of entries
    pub template: Vec<TemplateEntry>,
}

/// An entry of a [`DefinitionDocument`] template.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum TemplateEntry {
    /// A part name
    Element(String),

    /// `{ "optional": [...] }`
    Optional(OptionalEntry),

    /// `{ "recursive": { "name": ..., "first": [...], "rest": [...] } }`
    Recursive(RecursiveSection),
}

/// An optional [`TemplateEntry`].
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct OptionalEntry {
    /// The optional sequence
    pub optional: Vec<TemplateEntry>,
}

/// A recursive [`TemplateEntry`].
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RecursiveSection {
    /// The recursive section
    pub recursive: RecursiveEntry,
}

/// The body of a recursive [`TemplateEntry`].
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RecursiveEntry {
    /// The name of the whole span
    pub name: String,
    /// The first repetition
    pub first: Vec<TemplateEntry>,
    /// Every following repetition
    pub rest: Vec<TemplateEntry>,
}

impl DefinitionDocument {
    /// Builds the definition this document describes.
    pub fn build(self) -> Result<VersionDefinition, DefinitionError> {
        let template = self.template;
        VersionDefinition::new(self.parts, |v| compose_entries(v, &template))
    }
}

/// An optional recursive section: `lead` and one `part`, then any number of `.` and `part`.
fn dotted_identifiers(
    v: &mut Composer<'_>,
    span: &str,
    lead: &str,
    part: &str,
) -> Result<(), DefinitionError> {
    v.optional(|o| {
        o.recursive(span, |r| {
            r.first(|f| {
                f.elements(&[lead, part])?;
                Ok(())
            })?;
            r.rest(|s| {
                s.elements(&["dot", part])?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn compose_entries(
    v: &mut Composer<'_>,
    entries: &[TemplateEntry],
) -> Result<(), DefinitionError> {
    for entry in entries {
        match entry {
            TemplateEntry::Element(name) => {
                v.element(name)?;
            }
            TemplateEntry::Optional(OptionalEntry { optional }) => {
                v.optional(|o| compose_entries(o, optional))?;
            }
            TemplateEntry::Recursive(RecursiveSection { recursive }) => {
                v.recursive(&recursive.name, |r| {
                    r.first(|f| compose_entries(f, &recursive.first))?;
                    r.rest(|s| compose_entries(s, &recursive.rest))?;
                    Ok(())
                })?;
            }
        }
    }
    Ok(())
}
