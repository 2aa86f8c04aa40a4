use crate::{error::DefinitionError, part::PartCatalog};

/// A node of a [`Template`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// A single part, referenced by name.
    Element(String),

    /// Nodes expected one after the other, left to right.
    Sequence(Vec<Node>),

    /// A node that may be absent.
    Optional(Box<Node>),

    /// A repeated section. `first` matches the first repetition and `rest` each one after it. The
    /// whole matched span is known by `name`.
    Recursive {
        /// The name of the whole span
        name: String,
        /// The first repetition
        first: Box<Node>,
        /// Every following repetition
        rest: Box<Node>,
    },
}

impl Node {
    /// Collects the part names referenced anywhere under this node, in template order.
    pub(crate) fn element_names<'n>(&'n self, names: &mut Vec<&'n str>) {
        match self {
            Node::Element(name) => names.push(name),
            Node::Sequence(nodes) => nodes.iter().for_each(|node| node.element_names(names)),
            Node::Optional(inner) => inner.element_names(names),
            Node::Recursive { first, rest, .. } => {
                first.element_names(names);
                rest.element_names(names);
            }
        }
    }

    /// Whether nothing under this node yields a value: only static parts, no recursive sections.
    pub(crate) fn capture_free(&self, parts: &PartCatalog) -> bool {
        match self {
            Node::Element(name) => parts.get(name).is_some_and(|part| !part.capturable()),
            Node::Sequence(nodes) => nodes.iter().all(|node| node.capture_free(parts)),
            Node::Optional(inner) => inner.capture_free(parts),
            Node::Recursive { .. } => false,
        }
    }

    /// The number of optional sections under this node, itself included.
    pub(crate) fn optional_count(&self) -> usize {
        match self {
            Node::Element(_) => 0,
            Node::Sequence(nodes) => nodes.iter().map(Node::optional_count).sum(),
            Node::Optional(inner) => 1 + inner.optional_count(),
            Node::Recursive { first, rest, .. } => first.optional_count() + rest.optional_count(),
        }
    }
}

/// The shape of a version string: how parts compose into sequences, optional sections and
/// recursive sections.
///
/// Templates are built with a [`Composer`] when constructing a
/// [`VersionDefinition`](crate::VersionDefinition).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    pub(crate) root: Node,
}

impl Template {
    /// The root node. Always a [`Node::Sequence`].
    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// The builder surface handed to a definition's composition function. Each call appends to the
/// current sequence.
///
/// ```
/// use vershape::{PartSpec, VersionDefinition};
///
/// let definition = VersionDefinition::new(
///     [
///         ("major", PartSpec::numeric()),
///         ("minor", PartSpec::numeric()),
///         ("dot", PartSpec::literal(".")),
///     ],
///     |v| {
///         v.element("major")?;
///         v.optional(|o| {
///             o.elements(&["dot", "minor"])?;
///             Ok(())
///         })?;
///         Ok(())
///     },
/// )
/// .unwrap();
/// assert!(definition.is_valid("1"));
/// assert!(definition.is_valid("1.2"));
/// ```
#[derive(Debug)]
pub struct Composer<'p> {
    parts: &'p PartCatalog,
    nodes: Vec<Node>,
}

impl<'p> Composer<'p> {
    pub(crate) fn new(parts: &'p PartCatalog) -> Self {
        Self {
            parts,
            nodes: Vec::new(),
        }
    }

    /// Runs a composition function in a fresh sequence and returns that sequence.
    pub(crate) fn compose<F>(parts: &'p PartCatalog, compose: F) -> Result<Node, DefinitionError>
    where
        F: FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        let mut composer = Composer::new(parts);
        compose(&mut composer)?;
        Ok(Node::Sequence(composer.nodes))
    }

    /// Appends the part called `name`.
    ///
    /// # Errors
    ///
    /// - [`DefinitionError::UnknownPart`] if no part called `name` was declared.
    pub fn element(&mut self, name: &str) -> Result<&mut Self, DefinitionError> {
        if !self.parts.contains_key(name) {
            return Err(DefinitionError::UnknownPart {
                name: name.to_owned(),
            });
        }
        self.nodes.push(Node::Element(name.to_owned()));
        Ok(self)
    }

    /// Appends each named part in order. Shorthand for repeated [`Composer::element`] calls.
    pub fn elements(&mut self, names: &[&str]) -> Result<&mut Self, DefinitionError> {
        for name in names {
            self.element(name)?;
        }
        Ok(self)
    }

    /// Appends a section that may be absent as a whole.
    pub fn optional<F>(&mut self, compose: F) -> Result<&mut Self, DefinitionError>
    where
        F: FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        let inner = Composer::compose(self.parts, compose)?;
        self.nodes.push(Node::Optional(Box::new(inner)));
        Ok(self)
    }

    /// Appends a recursive section called `name`. The composition function must declare both the
    /// first repetition and the repeated rest.
    ///
    /// # Errors
    ///
    /// - [`DefinitionError::IncompleteRecursive`] if `first` or `rest` was not declared.
    pub fn recursive<F>(&mut self, name: &str, compose: F) -> Result<&mut Self, DefinitionError>
    where
        F: FnOnce(&mut RecursiveComposer<'p>) -> Result<(), DefinitionError>,
    {
        let mut recursive = RecursiveComposer {
            parts: self.parts,
            first: None,
            rest: None,
        };
        compose(&mut recursive)?;

        let missing = |missing: &'static str| DefinitionError::IncompleteRecursive {
            name: name.to_owned(),
            missing,
        };
        let first = recursive.first.ok_or_else(|| missing("first"))?;
        let rest = recursive.rest.ok_or_else(|| missing("rest"))?;

        self.nodes.push(Node::Recursive {
            name: name.to_owned(),
            first: Box::new(first),
            rest: Box::new(rest),
        });
        Ok(self)
    }
}

/// The builder surface handed to [`Composer::recursive`].
#[derive(Debug)]
pub struct RecursiveComposer<'p> {
    parts: &'p PartCatalog,
    first: Option<Node>,
    rest: Option<Node>,
}

impl<'p> RecursiveComposer<'p> {
    /// Declares the first repetition.
    pub fn first<F>(&mut self, compose: F) -> Result<&mut Self, DefinitionError>
    where
        F: FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        self.first = Some(Composer::compose(self.parts, compose)?);
        Ok(self)
    }

    /// Declares a single repetition following the first one. It may occur any number of times.
    pub fn rest<F>(&mut self, compose: F) -> Result<&mut Self, DefinitionError>
    where
        F: FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        self.rest = Some(Composer::compose(self.parts, compose)?);
        Ok(self)
    }
}
