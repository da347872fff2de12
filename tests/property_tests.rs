//! Property-based tests for label parsing, duplicate detection, call scope
//! checking and URL building.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, BTreeSet};

use fragmux::definition::{load_definitions, parse_label, ArgPath, DefinitionError};
use fragmux::router::PathMatcher;
use fragmux::template::{Fragment, FragmentSet};
use fragmux::{Error, SourceLocation};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Seg {
    Literal(String),
    Param,
}

fn method() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
}

fn segments() -> impl Strategy<Value = Vec<Seg>> {
    prop::collection::vec(
        prop_oneof![
            "[a-z][a-z0-9_-]{0,7}".prop_map(Seg::Literal),
            Just(Seg::Param),
        ],
        0..6,
    )
}

/// Render segments as a path; parameters are named `p0`, `p1`, ...
fn render_path(segments: &[Seg], trailing_slash: bool) -> String {
    let mut path = String::new();
    let mut params = 0;
    for segment in segments {
        path.push('/');
        match segment {
            Seg::Literal(text) => path.push_str(text),
            Seg::Param => {
                path.push_str(&format!("{{p{params}}}"));
                params += 1;
            }
        }
    }
    if trailing_slash || segments.is_empty() {
        path.push('/');
    }
    path
}

fn fragment_set(labels: &[String]) -> FragmentSet {
    let mut set = FragmentSet::new();
    for label in labels {
        set.push(Fragment::new(label.clone(), Vec::new()));
    }
    set
}

proptest! {
    /// Re-parsing a normalized pattern yields the same pattern.
    #[test]
    fn prop_normalized_pattern_is_idempotent(
        method in prop::option::of(method()),
        host in prop::option::of("[a-z]{1,8}\\.(com|org)"),
        segs in segments(),
        trailing in any::<bool>(),
        gap in "[ \t]{1,3}",
    ) {
        let path = format!("{}{}", host.unwrap_or_default(), render_path(&segs, trailing));
        let label = match method {
            Some(method) => format!("{method}{gap}{path}"),
            None => path,
        };
        let first = parse_label(&label, SourceLocation::programmatic())
            .unwrap()
            .unwrap()
            .normalized_pattern();
        let second = parse_label(&first, SourceLocation::programmatic())
            .unwrap()
            .unwrap()
            .normalized_pattern();
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.contains("  "));
    }

    /// A duplicate is reported wherever it appears in the set.
    #[test]
    fn prop_duplicates_found_in_any_order(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..8),
        pick in any::<prop::sample::Index>(),
        at in any::<prop::sample::Index>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let mut labels: Vec<String> = names.iter().map(|n| format!("GET /{n}")).collect();
        let duplicated = pick.get(&names);
        let position = at.index(labels.len() + 1);
        labels.insert(position, format!("GET   /{duplicated}"));

        let err = load_definitions(&fragment_set(&labels)).unwrap_err();
        let issues = err.issues();
        prop_assert_eq!(issues.len(), 1);
        match issues[0] {
            Error::DuplicatePattern { pattern, .. } => {
                prop_assert_eq!(pattern, &format!("GET /{duplicated}"));
            }
            other => prop_assert!(false, "unexpected issue: {}", other),
        }
    }

    /// Unknown identifiers are rejected at any nesting depth, with the
    /// position of the offending argument.
    #[test]
    fn prop_scope_checked_at_any_depth(depth in 0usize..6, known in any::<bool>()) {
        let name = if known { "id" } else { "bogus" };
        let mut call = format!("F{depth}(ctx, {name})");
        for level in (0..depth).rev() {
            call = format!("F{level}({call})");
        }
        let label = format!("GET /items/{{id}} {call}");
        let result = parse_label(&label, SourceLocation::programmatic());
        if known {
            prop_assert!(result.unwrap().is_some());
        } else {
            let mut path = vec![0; depth];
            path.push(1);
            match result {
                Err(DefinitionError::UnknownIdentifier { name, path: at, .. }) => {
                    prop_assert_eq!(name, "bogus");
                    prop_assert_eq!(at, ArgPath(path));
                }
                other => prop_assert!(false, "unexpected result: {:?}", other),
            }
        }
    }

    /// Paths built from a definition are matched by that definition, and the
    /// captured values are the ones that went in, reserved characters
    /// included.
    #[test]
    fn prop_built_paths_match_their_pattern(
        segs in segments(),
        trailing in any::<bool>(),
        values in prop::collection::vec("[A-Za-z0-9 ._~/?#%&+=é-]{1,10}", 6),
    ) {
        let label = format!("GET {}", render_path(&segs, trailing));
        let definition = parse_label(&label, SourceLocation::programmatic())
            .unwrap()
            .unwrap();
        let expected: BTreeMap<String, String> = definition
            .params()
            .into_iter()
            .zip(&values)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        let path = definition.build_path(&expected);
        let matcher = PathMatcher::new(&definition).unwrap();
        prop_assert_eq!(matcher.captures(&path), Some(expected));
    }

    /// A wildcard value keeps its slashes through building and matching.
    #[test]
    fn prop_wildcard_values_round_trip(value in "[a-z %?/]{0,12}") {
        let definition = parse_label("GET /files/{rest...}", SourceLocation::programmatic())
            .unwrap()
            .unwrap();
        let values = BTreeMap::from([("rest".to_string(), value)]);
        let path = definition.build_path(&values);
        let matcher = PathMatcher::new(&definition).unwrap();
        prop_assert_eq!(matcher.captures(&path), Some(values));
    }
}

#[test]
fn test_distinct_patterns_load_in_order() {
    let labels: Vec<String> = ["GET /", "POST /", "GET /a", "GET example.com/a", "/a/{$}"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let definitions = load_definitions(&fragment_set(&labels)).unwrap();
    let patterns: BTreeSet<String> = definitions.iter().map(|d| d.normalized_pattern()).collect();
    assert_eq!(patterns.len(), labels.len());
    assert_eq!(definitions[3].normalized_pattern(), "GET example.com/a");
}
