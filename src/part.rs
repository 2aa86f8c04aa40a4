use crate::{error::DefinitionError, version::Value};
use serde::Deserialize;
use std::{collections::BTreeMap, num::ParseIntError};

/// All the parts declared for a definition, keyed by name.
pub type PartCatalog = BTreeMap<String, Part>;

/// The declared type of a part, as it appears in a definition document.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    /// A non-negative integer without leading zeros, up to `u128::MAX`.
    Numeric,
    /// One or more ASCII letters or digits.
    Alphanumeric,
    /// One or more ASCII letters, digits, or hyphens.
    AlphanumericOrHyphen,
    /// Fixed literal text. Never captured.
    Static,
}

/// A trait a part can be declared with.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PartTrait {
    /// Repeated captures inside a recursive section accumulate into an ordered list instead of
    /// overwriting each other.
    Multivalued,
}

/// The declaration of a part: its type, its literal value (for static parts), and its traits.
///
/// ```
/// use vershape::PartSpec;
///
/// let major = PartSpec::numeric();
/// let separator = PartSpec::literal(".");
/// let identifier = PartSpec::alphanumeric().multivalued();
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartSpec {
    /// The part's type
    #[serde(rename = "type")]
    pub type_: PartType,

    /// The literal text of a static part. Ignored for other types.
    #[serde(default)]
    pub value: Option<String>,

    /// The part's traits
    #[serde(default)]
    pub traits: Vec<PartTrait>,
}

impl PartSpec {
    fn of(type_: PartType) -> Self {
        Self {
            type_,
            value: None,
            traits: Vec::new(),
        }
    }

    /// A numeric part.
    pub fn numeric() -> Self {
        Self::of(PartType::Numeric)
    }

    /// An alphanumeric part.
    pub fn alphanumeric() -> Self {
        Self::of(PartType::Alphanumeric)
    }

    /// An alphanumeric part that may also contain hyphens.
    pub fn alphanumeric_or_hyphen() -> Self {
        Self::of(PartType::AlphanumericOrHyphen)
    }

    /// A static part matching `value` literally.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::of(PartType::Static)
        }
    }

    /// Adds the [`PartTrait::Multivalued`] trait.
    pub fn multivalued(mut self) -> Self {
        if !self.traits.contains(&PartTrait::Multivalued) {
            self.traits.push(PartTrait::Multivalued);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PartKind {
    Numeric,
    Alphanumeric,
    AlphanumericOrHyphen,
    Static(String),
}

/// A raw captured string, or several of them once a multivalued part has been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Raw {
    Single(String),
    Many(Vec<String>),
}

impl Raw {
    fn into_vec(self) -> Vec<String> {
        match self {
            Raw::Single(value) => vec![value],
            Raw::Many(values) => values,
        }
    }
}

/// An atomic token of a version string. Built from a [`PartSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part {
    pub(crate) kind: PartKind,
    multivalued: bool,
}

impl Part {
    pub(crate) fn from_spec(name: &str, spec: PartSpec) -> Result<Self, DefinitionError> {
        let kind = match spec.type_ {
            PartType::Numeric => PartKind::Numeric,
            PartType::Alphanumeric => PartKind::Alphanumeric,
            PartType::AlphanumericOrHyphen => PartKind::AlphanumericOrHyphen,
            PartType::Static => match spec.value {
                Some(value) => PartKind::Static(value),
                None => {
                    return Err(DefinitionError::MissingStaticValue {
                        name: name.to_owned(),
                    })
                }
            },
        };
        Ok(Self {
            kind,
            multivalued: spec.traits.contains(&PartTrait::Multivalued),
        })
    }

    /// The regex fragment matching one occurrence of this part. It contains no capture groups and
    /// is safe to concatenate with other fragments.
    pub fn pattern(&self) -> String {
        match &self.kind {
            // grouped so the alternation does not leak into neighbouring fragments
            PartKind::Numeric => r"(?:0|[1-9][0-9]*)".to_owned(),
            PartKind::Alphanumeric => r"[a-zA-Z0-9]+".to_owned(),
            PartKind::AlphanumericOrHyphen => r"[a-zA-Z0-9-]+".to_owned(),
            PartKind::Static(value) => regex::escape(value),
        }
    }

    /// Whether this part's matched text is surfaced as a value. Only static parts are not.
    pub fn capturable(&self) -> bool {
        !matches!(self.kind, PartKind::Static(_))
    }

    /// Whether repeated captures of this part accumulate into a list.
    pub fn multivalued(&self) -> bool {
        self.multivalued
    }

    /// The literal text of a static part.
    pub fn literal(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Static(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Combines a previously captured value with a newly captured one.
    pub(crate) fn merge(&self, existing: Option<Raw>, new: Raw) -> Raw {
        if !self.multivalued {
            return new;
        }
        let mut merged = existing.map(Raw::into_vec).unwrap_or_default();
        merged.extend(new.into_vec());
        Raw::Many(merged)
    }

    /// Converts raw captured text into a typed value. Fails only when a numeric part does not fit
    /// in a `u128`.
    pub(crate) fn convert(&self, raw: &Raw) -> Result<Value, ParseIntError> {
        match raw {
            Raw::Single(text) => self.convert_one(text),
            Raw::Many(texts) => texts
                .iter()
                .map(|text| self.convert_one(text))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn convert_one(&self, text: &str) -> Result<Value, ParseIntError> {
        match self.kind {
            PartKind::Numeric => text.parse().map(Value::Number),
            _ => Ok(Value::Text(text.to_owned())),
        }
    }
}

/// Builds a catalog from part declarations.
pub(crate) fn catalog<I, N>(specs: I) -> Result<PartCatalog, DefinitionError>
where
    I: IntoIterator<Item = (N, PartSpec)>,
    N: Into<String>,
{
    let mut parts = PartCatalog::new();
    for (name, spec) in specs {
        let name = name.into();
        let part = Part::from_spec(&name, spec)?;
        parts.insert(name, part);
    }
    Ok(parts)
}
