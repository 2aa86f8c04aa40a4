use crate::{
    error::VersionError,
    matcher::{Capturer, ChildDescriptor, CompiledMatcher, Target, REMAINDER_GROUP},
    part::{PartCatalog, Raw},
    version::{Markers, Value},
};
use regex::Captures;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Raw captured text keyed by part or span name. A missing key means the part did not
/// participate in the match.
type RawCaptures = BTreeMap<String, Raw>;

/// Each capture group of one match, paired with what it stands for. `None` when the group did
/// not participate.
type Participation<'a, 's> = Vec<(&'a Target, Option<&'s str>)>;

/// What a successful extraction yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extraction {
    /// The typed value of every capturable part that participated.
    pub(crate) values: BTreeMap<String, Value>,

    /// Whether each capture-free optional section matched, in match order.
    pub(crate) markers: Markers,
}

/// Matches `version_str` against `matcher` and resolves the typed value of every capturable part
/// that participated.
///
/// Either every step succeeds or the whole extraction fails with
/// [`VersionError::FormatMismatch`]. Nothing partial is ever returned.
pub(crate) fn extract(
    parts: &PartCatalog,
    matcher: &CompiledMatcher,
    version_str: &str,
) -> Result<Extraction, VersionError> {
    let mismatch = || {
        debug!(version = version_str, "version does not satisfy format");
        VersionError::mismatch(version_str)
    };

    let captures = matcher
        .parent
        .regex
        .captures(version_str)
        .ok_or_else(mismatch)?;

    let mut raw = RawCaptures::new();
    let mut markers = Markers::new();
    for (target, text) in participating(&matcher.parent, &captures) {
        match (target, text) {
            // outside of recursive sections, a later occurrence simply wins
            (Target::Capture(name), Some(text)) => {
                raw.insert(name.clone(), Raw::Single(text.to_owned()));
            }
            (Target::Capture(_), None) => {}
            (Target::Marker(ordinal), text) => {
                markers.entry(*ordinal).or_default().push(text.is_some());
            }
        }
    }
    trace!(version = version_str, captured = raw.len(), "matched parent pattern");

    for child in &matcher.children {
        let span = match raw.get(&child.span_name) {
            Some(Raw::Single(span)) => span.clone(),
            _ => continue,
        };
        let repetitions = repetitions(child, &span).ok_or_else(mismatch)?;
        trace!(
            span = child.span_name.as_str(),
            repetitions = repetitions.len(),
            "decomposed recursive section"
        );
        for repetition in repetitions {
            for (target, text) in repetition {
                match target {
                    Target::Capture(name) => merge(parts, &mut raw, name, text),
                    Target::Marker(ordinal) => {
                        markers.entry(*ordinal).or_default().push(text.is_some());
                    }
                }
            }
        }
    }

    let mut values = BTreeMap::new();
    for (name, part) in parts.iter().filter(|(_, part)| part.capturable()) {
        if let Some(raw) = raw.get(name) {
            let value = part.convert(raw).map_err(|_| mismatch())?;
            values.insert(name.clone(), value);
        }
    }
    Ok(Extraction { values, markers })
}

/// Splits a recursive section's span into the captures of each repetition, in order. Returns
/// `None` if the span cannot be tiled by one `first` followed by any number of `rest`.
fn repetitions<'s>(
    child: &'s ChildDescriptor,
    span: &'s str,
) -> Option<Vec<Participation<'s, 's>>> {
    let first = child.first.regex.captures(span)?;
    let remainder = first.name(REMAINDER_GROUP).map_or("", |m| m.as_str());

    let mut repetitions = vec![participating(&child.first, &first)];

    let mut cursor = 0;
    for rest in child.rest.regex.captures_iter(remainder) {
        let whole = rest.get(0)?;
        if whole.start() != cursor {
            return None;
        }
        if whole.is_empty() {
            continue;
        }
        cursor = whole.end();
        repetitions.push(participating(&child.rest, &rest));
    }
    if cursor != remainder.len() {
        return None;
    }

    Some(repetitions)
}

fn participating<'a, 's>(
    capturer: &'a Capturer,
    captures: &Captures<'s>,
) -> Participation<'a, 's> {
    capturer
        .slots
        .iter()
        .map(|slot| (&slot.target, captures.name(&slot.group).map(|m| m.as_str())))
        .collect()
}

/// Folds one repetition's capture of `name` into the map. A single-valued part that a later
/// repetition leaves out is cleared; a multivalued one keeps what it has.
fn merge(parts: &PartCatalog, raw: &mut RawCaptures, name: &str, text: Option<&str>) {
    let Some(part) = parts.get(name) else {
        return;
    };
    match text {
        Some(text) => {
            let existing = raw.remove(name);
            let merged = part.merge(existing, Raw::Single(text.to_owned()));
            raw.insert(name.to_owned(), merged);
        }
        None if !part.multivalued() => {
            raw.remove(name);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        part::{catalog, PartSpec},
        template::{Composer, Template},
    };
    use rstest::*;

    fn setup<F>(specs: Vec<(&str, PartSpec)>, compose: F) -> (PartCatalog, CompiledMatcher)
    where
        F: for<'p> FnOnce(&mut Composer<'p>) -> Result<(), crate::DefinitionError>,
    {
        let parts = catalog(specs).unwrap();
        let root = Composer::compose(&parts, compose).unwrap();
        let matcher = CompiledMatcher::compile(&parts, &Template { root }).unwrap();
        (parts, matcher)
    }

    #[fixture]
    fn dotted() -> (PartCatalog, CompiledMatcher) {
        setup(
            vec![
                ("major", PartSpec::numeric()),
                ("id", PartSpec::alphanumeric().multivalued()),
                ("single", PartSpec::alphanumeric()),
                ("dot", PartSpec::literal(".")),
                ("hyphen", PartSpec::literal("-")),
            ],
            |v| {
                v.element("major")?;
                v.optional(|o| {
                    o.recursive("ids", |r| {
                        r.first(|f| {
                            f.elements(&["hyphen", "id"])?;
                            Ok(())
                        })?;
                        r.rest(|s| {
                            s.elements(&["dot", "id"])?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        )
    }

    fn text_list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::Text((*s).to_owned())).collect())
    }

    #[rstest]
    fn test_recursive_keeps_every_repetition(dotted: (PartCatalog, CompiledMatcher)) {
        let (parts, matcher) = dotted;
        let values = extract(&parts, &matcher, "1-a.b.c.d").unwrap().values;
        assert_eq!(Some(&Value::Number(1)), values.get("major"));
        assert_eq!(Some(&text_list(&["a", "b", "c", "d"])), values.get("id"));
    }

    #[rstest]
    fn test_single_repetition_is_still_a_list(dotted: (PartCatalog, CompiledMatcher)) {
        let (parts, matcher) = dotted;
        let values = extract(&parts, &matcher, "1-a").unwrap().values;
        assert_eq!(Some(&text_list(&["a"])), values.get("id"));
    }

    #[rstest]
    fn test_absent_recursive(dotted: (PartCatalog, CompiledMatcher)) {
        let (parts, matcher) = dotted;
        let values = extract(&parts, &matcher, "1").unwrap().values;
        assert_eq!(None, values.get("id"));
        // span names and static parts are never surfaced
        assert_eq!(vec!["major"], values.keys().collect::<Vec<_>>());
    }

    #[rstest]
    #[case("1-")]
    #[case("1-a.")]
    #[case("1-a..b")]
    #[case("1.a")]
    #[case("-a")]
    #[case("1-a.b-c")]
    fn test_mismatch(dotted: (PartCatalog, CompiledMatcher), #[case] version_str: &str) {
        let (parts, matcher) = dotted;
        assert_eq!(
            Err(VersionError::FormatMismatch {
                version_string: version_str.to_owned()
            }),
            extract(&parts, &matcher, version_str)
        );
    }

    #[test]
    fn test_single_valued_in_recursive_keeps_last() {
        let (parts, matcher) = setup(
            vec![
                ("single", PartSpec::alphanumeric()),
                ("dot", PartSpec::literal(".")),
            ],
            |v| {
                v.recursive("ids", |r| {
                    r.first(|f| {
                        f.element("single")?;
                        Ok(())
                    })?;
                    r.rest(|s| {
                        s.elements(&["dot", "single"])?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        );
        let values = extract(&parts, &matcher, "x.y.z").unwrap().values;
        assert_eq!(Some(&Value::Text("z".to_owned())), values.get("single"));
    }

    #[rstest]
    #[case("a.b-7", 2, Some(7))]
    #[case("a.b-7.c", 3, None)]
    #[case("a.b-7.c-8", 3, Some(8))]
    #[case("a-1.b.c", 3, None)]
    fn test_single_valued_absent_from_last_repetition(
        #[case] version_str: &str,
        #[case] ids: usize,
        #[case] tag: Option<u128>,
    ) {
        let (parts, matcher) = setup(
            vec![
                ("id", PartSpec::alphanumeric().multivalued()),
                ("tag", PartSpec::numeric()),
                ("dot", PartSpec::literal(".")),
                ("hyphen", PartSpec::literal("-")),
            ],
            |v| {
                v.recursive("ids", |r| {
                    r.first(|f| {
                        f.element("id")?;
                        f.optional(|o| {
                            o.elements(&["hyphen", "tag"])?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    r.rest(|s| {
                        s.elements(&["dot", "id"])?;
                        s.optional(|o| {
                            o.elements(&["hyphen", "tag"])?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        );
        let values = extract(&parts, &matcher, version_str).unwrap().values;
        assert_eq!(tag.map(Value::Number), values.get("tag").cloned());
        // multivalued parts are never cleared by a repetition
        assert_eq!(
            Some(ids),
            values.get("id").and_then(Value::as_list).map(|ids| ids.len())
        );
    }

    #[test]
    fn test_numeric_multivalued() {
        let (parts, matcher) = setup(
            vec![
                ("n", PartSpec::numeric().multivalued()),
                ("dot", PartSpec::literal(".")),
            ],
            |v| {
                v.recursive("numbers", |r| {
                    r.first(|f| {
                        f.element("n")?;
                        Ok(())
                    })?;
                    r.rest(|s| {
                        s.elements(&["dot", "n"])?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        );
        let values = extract(&parts, &matcher, "3.1.4").unwrap().values;
        assert_eq!(
            Some(&Value::List(vec![
                Value::Number(3),
                Value::Number(1),
                Value::Number(4)
            ])),
            values.get("n")
        );
    }

    #[test]
    fn test_numeric_overflow_is_mismatch() {
        let (parts, matcher) = setup(vec![("n", PartSpec::numeric())], |v| {
            v.element("n")?;
            Ok(())
        });
        assert_eq!(
            Some(&Value::Number(20240101123045123456789)),
            extract(&parts, &matcher, "20240101123045123456789")
                .unwrap()
                .values
                .get("n")
        );
        assert!(extract(&parts, &matcher, "340282366920938463463374607431768211455").is_ok());
        assert!(matches!(
            extract(&parts, &matcher, "340282366920938463463374607431768211456"),
            Err(VersionError::FormatMismatch { .. })
        ));
    }
}
