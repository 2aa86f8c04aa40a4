use crate::{
    part::PartCatalog,
    template::{Node, Template},
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// For each optional section without captures of its own, keyed by its ordinal in the template,
/// whether it matched. One entry per time the section was matched against, in match order.
pub(crate) type Markers = BTreeMap<usize, Vec<bool>>;

/// A typed value resolved from a version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// The value of a numeric part.
    Number(u128),
    /// The value of an alphanumeric part.
    Text(String),
    /// The values of a multivalued part, in the order they appeared.
    List(Vec<Value>),
}

impl Value {
    /// Returns the number if this is a [`Value::Number`].
    pub fn as_number(&self) -> Option<u128> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the text if this is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the items if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Builds a [`Value::List`].
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<u64> for Value {
    fn from(number: u64) -> Self {
        Value::Number(number.into())
    }
}

impl From<u128> for Value {
    fn from(number: u128) -> Self {
        Value::Number(number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

/// A Version is the immutable result of parsing a version string with a
/// [`VersionDefinition`](crate::VersionDefinition): the definition's parts and template along with
/// the value resolved for each captured part.
///
/// Two versions are equal when their parts, templates and values are equal, no matter which
/// definition object produced them. Which value-less optional sections matched only affects
/// rendering.
///
/// # Examples
///
/// ```
/// use vershape::{Value, VersionDefinition};
///
/// let semver = VersionDefinition::semver().unwrap();
/// let version = semver.parse("1.2.3-rc.1+CAFE").unwrap();
///
/// assert_eq!(Some(&Value::Number(2)), version.get("minor"));
/// assert_eq!(Some(&Value::list(["rc", "1"])), version.get("prerelease"));
/// assert_eq!("1.2.3-rc.1+CAFE", version.to_string());
/// assert_eq!("1.2.3-rc.1_cafe", version.to_tag());
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    parts: Arc<PartCatalog>,
    template: Arc<Template>,
    values: BTreeMap<String, Value>,
    markers: Markers,
}

impl Version {
    pub(crate) fn new(
        parts: Arc<PartCatalog>,
        template: Arc<Template>,
        values: BTreeMap<String, Value>,
        markers: Markers,
    ) -> Self {
        Self {
            parts,
            template,
            values,
            markers,
        }
    }

    /// Returns the value of the part called `name`, or `None` if that part did not appear (or is
    /// not a captured part at all).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// All resolved values, keyed by part name.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// The parts this version was parsed with.
    pub fn parts(&self) -> &PartCatalog {
        &self.parts
    }

    /// The template this version was parsed with.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Renders this version back into a string shaped by its template.
    ///
    /// Optional sections are rendered only when one of their captured parts has a value, or, for
    /// sections made of static parts alone, when they were matched. A recursive section repeats
    /// its `rest` for as long as a multivalued part in it has values left.
    pub fn render(&self) -> String {
        let mut renderer = Renderer {
            version: self,
            cursors: HashMap::new(),
            next_optional: 0,
            marker_cursors: HashMap::new(),
            out: String::new(),
        };
        renderer.node(self.template.root());
        renderer.out
    }

    /// Renders this version into a form usable as a container image tag: `+` becomes `_` and
    /// everything is lowercased.
    pub fn to_tag(&self) -> String {
        self.render().replace('+', "_").to_lowercase()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts && self.template == other.template && self.values == other.values
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
        self.template.hash(state);
        self.values.hash(state);
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

struct Renderer<'v> {
    version: &'v Version,

    /// How many items of each multivalued part have been rendered so far.
    cursors: HashMap<&'v str, usize>,

    /// Ordinal of the next optional section, counted in template order.
    next_optional: usize,

    /// How many markers of each optional section have been consumed so far.
    marker_cursors: HashMap<usize, usize>,

    out: String,
}

impl<'v> Renderer<'v> {
    fn node(&mut self, node: &'v Node) {
        match node {
            Node::Element(name) => self.element(name),
            Node::Sequence(nodes) => nodes.iter().for_each(|node| self.node(node)),
            Node::Optional(inner) => {
                let ordinal = self.next_optional;
                self.next_optional += 1;
                let shown = if inner.capture_free(&self.version.parts) {
                    self.matched(ordinal)
                } else {
                    self.present(inner)
                };
                if shown {
                    self.node(inner);
                } else {
                    self.skip(inner);
                }
            }
            Node::Recursive { first, rest, .. } => {
                self.node(first);
                let ordinals = self.next_optional;
                while self.pending(rest) {
                    self.next_optional = ordinals;
                    self.node(rest);
                }
                self.next_optional = ordinals + rest.optional_count();
            }
        }
    }

    /// Passes over a node that is not rendered, consuming the markers recorded for it.
    fn skip(&mut self, node: &'v Node) {
        match node {
            Node::Element(_) => {}
            Node::Sequence(nodes) => nodes.iter().for_each(|node| self.skip(node)),
            Node::Optional(inner) => {
                let ordinal = self.next_optional;
                self.next_optional += 1;
                if inner.capture_free(&self.version.parts) {
                    self.matched(ordinal);
                }
                self.skip(inner);
            }
            // an absent recursive section is never decomposed, so it recorded nothing
            Node::Recursive { first, rest, .. } => {
                self.next_optional += first.optional_count() + rest.optional_count();
            }
        }
    }

    /// Consumes the next marker of the optional section `ordinal`.
    fn matched(&mut self, ordinal: usize) -> bool {
        let cursor = self.marker_cursors.entry(ordinal).or_default();
        let matched = self
            .version
            .markers
            .get(&ordinal)
            .and_then(|markers| markers.get(*cursor))
            .copied()
            .unwrap_or(false);
        *cursor += 1;
        matched
    }

    fn element(&mut self, name: &'v str) {
        let Some(part) = self.version.parts.get(name) else {
            return;
        };
        if let Some(literal) = part.literal() {
            self.out.push_str(literal);
            return;
        }
        let value = self.peek(name);
        if let Some(Value::List(_)) = self.version.values.get(name) {
            *self.cursors.entry(name).or_default() += 1;
        }
        match value {
            Some(Value::Number(number)) => self.out.push_str(&number.to_string()),
            Some(Value::Text(text)) => self.out.push_str(text),
            Some(Value::List(_)) | None => {}
        }
    }

    /// The value the next rendering of `name` would emit.
    fn peek(&self, name: &str) -> Option<&'v Value> {
        match self.version.values.get(name)? {
            Value::List(items) => items.get(self.cursors.get(name).copied().unwrap_or(0)),
            value => Some(value),
        }
    }

    /// Whether any captured part under `node` has a value to render.
    fn present(&self, node: &'v Node) -> bool {
        let mut names = Vec::new();
        node.element_names(&mut names);
        names.into_iter().any(|name| {
            self.version
                .parts
                .get(name)
                .is_some_and(|part| part.capturable())
                && self.peek(name).is_some()
        })
    }

    /// Whether a multivalued part under `node` still has items left.
    fn pending(&self, node: &'v Node) -> bool {
        let mut names = Vec::new();
        node.element_names(&mut names);
        names.into_iter().any(|name| {
            matches!(self.version.values.get(name), Some(Value::List(_)))
                && self.peek(name).is_some()
        })
    }
}
