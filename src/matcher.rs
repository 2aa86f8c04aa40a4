use crate::{
    error::DefinitionError,
    part::PartCatalog,
    template::{Node, Template},
};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Name of the group in a recursive section's `first` pattern that holds the unconsumed remainder
/// of the span. Generated part groups are always `p<index>`, so this never collides.
pub(crate) const REMAINDER_GROUP: &str = "rest";

/// What a generated capture group stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// The text of a part or of a recursive section's span.
    Capture(String),

    /// Whether the optional section with this ordinal matched. Only optional sections without
    /// any capture of their own get one.
    Marker(usize),
}

/// Maps a generated capture group name back to what it captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) group: String,
    pub(crate) target: Target,
}

/// A compiled regex along with what each of its capture groups holds.
#[derive(Debug, Clone)]
pub(crate) struct Capturer {
    pub(crate) regex: Regex,
    pub(crate) slots: Vec<Slot>,
}

impl Capturer {
    fn new(pattern: &str, slots: Vec<Slot>) -> Result<Self, DefinitionError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            slots,
        })
    }

    pub(crate) fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// How to decompose the span matched by one recursive section into its repetitions.
#[derive(Debug, Clone)]
pub(crate) struct ChildDescriptor {
    pub(crate) span_name: String,

    /// Matches the whole span: the first repetition's groups plus [`REMAINDER_GROUP`].
    pub(crate) first: Capturer,

    /// Matches exactly one of the following repetitions. Scanned over the remainder.
    pub(crate) rest: Capturer,
}

/// The result of compiling a [`Template`]: the whole-string pattern and one descriptor per
/// recursive section, in template order.
#[derive(Debug, Clone)]
pub(crate) struct CompiledMatcher {
    pub(crate) parent: Capturer,
    pub(crate) children: Vec<ChildDescriptor>,
}

impl CompiledMatcher {
    pub(crate) fn compile(
        parts: &PartCatalog,
        template: &Template,
    ) -> Result<Self, DefinitionError> {
        let mut compiler = Compiler {
            parts,
            spans: BTreeSet::new(),
            children: Vec::new(),
            next_optional: 0,
        };
        let mut slots = Vec::new();
        let body = compiler.emit(&template.root, Context::TOP, &mut slots)?;
        let parent = Capturer::new(&format!(r"\A{body}\z"), slots)?;

        debug!(
            pattern = parent.pattern(),
            recursive_sections = compiler.children.len(),
            "compiled template"
        );

        Ok(Self {
            parent,
            children: compiler.children,
        })
    }

    pub(crate) fn pattern(&self) -> &str {
        self.parent.pattern()
    }
}

#[derive(Debug, Clone, Copy)]
struct Context<'t> {
    /// Whether capturable elements get their own group.
    capture: bool,

    /// The recursive section being compiled, if any.
    within: Option<&'t str>,
}

impl Context<'_> {
    const TOP: Context<'static> = Context {
        capture: true,
        within: None,
    };
}

struct Compiler<'p> {
    parts: &'p PartCatalog,
    spans: BTreeSet<String>,
    children: Vec<ChildDescriptor>,

    /// Ordinal of the next optional section, counted in template order.
    next_optional: usize,
}

impl<'p> Compiler<'p> {
    fn emit(
        &mut self,
        node: &Node,
        cx: Context<'_>,
        slots: &mut Vec<Slot>,
    ) -> Result<String, DefinitionError> {
        match node {
            Node::Element(name) => {
                let part = self
                    .parts
                    .get(name)
                    .ok_or_else(|| DefinitionError::UnknownPart { name: name.clone() })?;
                let pattern = part.pattern();
                if cx.capture && part.capturable() {
                    Ok(group(slots, Target::Capture(name.clone()), &pattern))
                } else {
                    Ok(pattern)
                }
            }

            Node::Sequence(nodes) => {
                let mut pattern = String::new();
                for node in nodes {
                    pattern.push_str(&self.emit(node, cx, slots)?);
                }
                Ok(pattern)
            }

            Node::Optional(inner) => {
                let ordinal = self.next_optional;
                self.next_optional += 1;
                let pattern = self.emit(inner, cx, slots)?;
                if cx.capture && inner.capture_free(self.parts) {
                    let marked = group(slots, Target::Marker(ordinal), &pattern);
                    Ok(format!("(?:{marked})?"))
                } else {
                    Ok(format!("(?:{pattern})?"))
                }
            }

            Node::Recursive { name, first, rest } => {
                if let Some(outer) = cx.within {
                    return Err(DefinitionError::NestedRecursive {
                        outer: outer.to_owned(),
                        inner: name.clone(),
                    });
                }
                if self.parts.contains_key(name) || !self.spans.insert(name.clone()) {
                    return Err(DefinitionError::ConflictingSpanName { name: name.clone() });
                }

                let plain = Context {
                    capture: false,
                    within: Some(name.as_str()),
                };
                let captured = Context {
                    capture: true,
                    within: Some(name.as_str()),
                };
                // both passes walk the same optional sections
                let ordinals = self.next_optional;
                let mut unused = Vec::new();
                let first_plain = self.emit(first, plain, &mut unused)?;
                let rest_plain = self.emit(rest, plain, &mut unused)?;
                self.next_optional = ordinals;

                let mut first_slots = Vec::new();
                let first_captured = self.emit(first, captured, &mut first_slots)?;
                let mut rest_slots = Vec::new();
                let rest_captured = self.emit(rest, captured, &mut rest_slots)?;

                let child = ChildDescriptor {
                    span_name: name.clone(),
                    first: Capturer::new(
                        &format!(
                            r"\A{first_captured}(?P<{REMAINDER_GROUP}>(?:{rest_plain})*)\z"
                        ),
                        first_slots,
                    )?,
                    rest: Capturer::new(&rest_captured, rest_slots)?,
                };
                self.children.push(child);

                Ok(group(
                    slots,
                    Target::Capture(name.clone()),
                    &format!("{first_plain}(?:{rest_plain})*"),
                ))
            }
        }
    }
}

/// Wraps `pattern` in a fresh named group and records what it captures.
fn group(slots: &mut Vec<Slot>, target: Target, pattern: &str) -> String {
    let group = format!("p{}", slots.len());
    let wrapped = format!("(?P<{group}>{pattern})");
    slots.push(Slot { group, target });
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        part::{catalog, PartSpec},
        template::Composer,
    };
    use rstest::*;

    const NUM: &str = r"(?:0|[1-9][0-9]*)";
    const ALNUM: &str = r"[a-zA-Z0-9]+";

    #[fixture]
    fn parts() -> PartCatalog {
        catalog([
            ("first", PartSpec::numeric()),
            ("second", PartSpec::numeric()),
            ("third", PartSpec::alphanumeric()),
            ("id", PartSpec::alphanumeric().multivalued()),
            ("separator", PartSpec::literal(".")),
            ("hyphen", PartSpec::literal("-")),
        ])
        .unwrap()
    }

    fn compile<F>(parts: &PartCatalog, compose: F) -> Result<CompiledMatcher, DefinitionError>
    where
        F: for<'p> FnOnce(&mut Composer<'p>) -> Result<(), DefinitionError>,
    {
        let root = Composer::compose(parts, compose)?;
        CompiledMatcher::compile(parts, &Template { root })
    }

    fn slot_names(capturer: &Capturer) -> Vec<&str> {
        capturer
            .slots
            .iter()
            .filter_map(|s| match &s.target {
                Target::Capture(name) => Some(name.as_str()),
                Target::Marker(_) => None,
            })
            .collect()
    }

    #[rstest]
    fn test_plain_sequence(parts: PartCatalog) {
        let matcher = compile(&parts, |v| {
            v.elements(&["first", "separator", "second", "separator", "third"])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            format!(r"\A(?P<p0>{NUM})\.(?P<p1>{NUM})\.(?P<p2>{ALNUM})\z"),
            matcher.pattern()
        );
        assert_eq!(vec!["first", "second", "third"], slot_names(&matcher.parent));
        assert!(matcher.children.is_empty());
    }

    #[rstest]
    fn test_optional_sections(parts: PartCatalog) {
        let matcher = compile(&parts, |v| {
            v.element("first")?;
            v.optional(|o| {
                o.elements(&["separator", "second"])?;
                o.optional(|o| {
                    o.elements(&["hyphen", "third"])?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            format!(r"\A(?P<p0>{NUM})(?:\.(?P<p1>{NUM})(?:\-(?P<p2>{ALNUM}))?)?\z"),
            matcher.pattern()
        );
        assert_eq!(vec!["first", "second", "third"], slot_names(&matcher.parent));
    }

    #[rstest]
    fn test_recursive_section(parts: PartCatalog) {
        let matcher = compile(&parts, |v| {
            v.element("first")?;
            v.recursive("prerelease", |r| {
                r.first(|f| {
                    f.elements(&["separator", "id"])?;
                    Ok(())
                })?;
                r.rest(|s| {
                    s.elements(&["separator", "id"])?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            format!(r"\A(?P<p0>{NUM})(?P<p1>\.{ALNUM}(?:\.{ALNUM})*)\z"),
            matcher.pattern()
        );
        assert_eq!(vec!["first", "prerelease"], slot_names(&matcher.parent));

        assert_eq!(1, matcher.children.len());
        let child = &matcher.children[0];
        assert_eq!("prerelease", child.span_name);
        assert_eq!(
            format!(r"\A\.(?P<p0>{ALNUM})(?P<rest>(?:\.{ALNUM})*)\z"),
            child.first.pattern()
        );
        assert_eq!(vec!["id"], slot_names(&child.first));
        assert_eq!(format!(r"\.(?P<p0>{ALNUM})"), child.rest.pattern());
        assert_eq!(vec!["id"], slot_names(&child.rest));
    }

    #[rstest]
    fn test_recursive_in_optional_propagates(parts: PartCatalog) {
        let matcher = compile(&parts, |v| {
            v.element("first")?;
            v.optional(|o| {
                o.recursive("prerelease", |r| {
                    r.first(|f| {
                        f.elements(&["hyphen", "id"])?;
                        Ok(())
                    })?;
                    r.rest(|s| {
                        s.elements(&["separator", "id"])?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            format!(r"\A(?P<p0>{NUM})(?:(?P<p1>\-{ALNUM}(?:\.{ALNUM})*))?\z"),
            matcher.pattern()
        );
        assert_eq!(1, matcher.children.len());
        assert_eq!("prerelease", matcher.children[0].span_name);
    }

    #[test]
    fn test_static_only_optional_gets_marker() {
        let parts = catalog([
            ("major", PartSpec::numeric()),
            ("id", PartSpec::alphanumeric().multivalued()),
            ("prefix", PartSpec::literal("v")),
            ("dot", PartSpec::literal(".")),
            ("bang", PartSpec::literal("!")),
        ])
        .unwrap();
        let matcher = compile(&parts, |v| {
            v.optional(|o| {
                o.element("prefix")?;
                Ok(())
            })?;
            v.element("major")?;
            v.recursive("ids", |r| {
                r.first(|f| {
                    f.elements(&["dot", "id"])?;
                    Ok(())
                })?;
                r.rest(|s| {
                    s.elements(&["dot", "id"])?;
                    s.optional(|o| {
                        o.element("bang")?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            format!(r"\A(?:(?P<p0>v))?(?P<p1>{NUM})(?P<p2>\.{ALNUM}(?:\.{ALNUM}(?:!)?)*)\z"),
            matcher.pattern()
        );
        assert_eq!(Target::Marker(0), matcher.parent.slots[0].target);
        assert_eq!(vec!["major", "ids"], slot_names(&matcher.parent));

        let child = &matcher.children[0];
        assert_eq!(format!(r"\.(?P<p0>{ALNUM})(?:(?P<p1>!))?"), child.rest.pattern());
        assert_eq!(Target::Marker(1), child.rest.slots[1].target);
    }

    #[rstest]
    fn test_repeated_part_gets_distinct_groups(parts: PartCatalog) {
        let matcher = compile(&parts, |v| {
            v.elements(&["first", "separator", "first"])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            format!(r"\A(?P<p0>{NUM})\.(?P<p1>{NUM})\z"),
            matcher.pattern()
        );
        assert_eq!(vec!["first", "first"], slot_names(&matcher.parent));
    }

    #[rstest]
    fn test_nested_recursive(parts: PartCatalog) {
        let result = compile(&parts, |v| {
            v.recursive("outer", |r| {
                r.first(|f| {
                    f.recursive("inner", |r| {
                        r.first(|f| {
                            f.element("id")?;
                            Ok(())
                        })?;
                        r.rest(|s| {
                            s.elements(&["separator", "id"])?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                r.rest(|s| {
                    s.elements(&["hyphen", "id"])?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(DefinitionError::NestedRecursive { outer, inner })
                if outer == "outer" && inner == "inner"
        ));
    }

    fn section(v: &mut Composer<'_>, name: &str) -> Result<(), DefinitionError> {
        v.recursive(name, |r| {
            r.first(|f| {
                f.element("id")?;
                Ok(())
            })?;
            r.rest(|s| {
                s.elements(&["separator", "id"])?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    }

    #[rstest]
    #[case("id")] // same as a part
    #[case("twice")] // same as another section
    fn test_conflicting_span_name(parts: PartCatalog, #[case] second_name: &str) {
        let result = compile(&parts, |v| {
            section(v, "twice")?;
            v.element("hyphen")?;
            section(v, second_name)?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(DefinitionError::ConflictingSpanName { name }) if name == second_name
        ));
    }
}
