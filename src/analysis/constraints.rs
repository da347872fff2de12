//! Declarative input constraints found in fragment markup.
//!
//! `<input name="age" type="number" min="18" max="130">` constrains the form
//! field `age`. Included fragments are scanned too, and the first element
//! declaring a given name wins.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::template::{FragmentSet, Node};

static FORM_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:input|textarea|select)\b([^>]*)>")
        .expect("form element regex should be valid")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute regex should be valid")
});

/// Constraints declared on one named input. Values are kept as written and
/// interpreted against the bound field type when guards are generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputConstraint {
    pub min: Option<String>,
    pub max: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<String>,
    pub max_length: Option<String>,
}

impl InputConstraint {
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// Constraints for every named input reachable from fragment `name`.
pub fn scan_constraints(name: &str, fragments: &FragmentSet) -> BTreeMap<String, InputConstraint> {
    let mut found = BTreeMap::new();
    let mut visited = HashSet::new();
    scan_fragment(name, fragments, &mut visited, &mut found);
    found
}

fn scan_fragment(
    name: &str,
    fragments: &FragmentSet,
    visited: &mut HashSet<String>,
    found: &mut BTreeMap<String, InputConstraint>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    if let Some(fragment) = fragments.get(name) {
        scan_nodes(&fragment.body, fragments, visited, found);
    }
}

fn scan_nodes(
    nodes: &[Node],
    fragments: &FragmentSet,
    visited: &mut HashSet<String>,
    found: &mut BTreeMap<String, InputConstraint>,
) {
    // Outputs inside a tag (`value="{{ x }}"`) split its text; rejoin the run
    // with a placeholder so the tag is seen whole.
    let mut markup = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => markup.push_str(text),
            Node::Output(_) => markup.push('_'),
            Node::If {
                branches,
                otherwise,
            } => {
                scan_markup(&std::mem::take(&mut markup), found);
                for (_, body) in branches {
                    scan_nodes(body, fragments, visited, found);
                }
                scan_nodes(otherwise, fragments, visited, found);
            }
            Node::For { body, otherwise, .. } => {
                scan_markup(&std::mem::take(&mut markup), found);
                scan_nodes(body, fragments, visited, found);
                scan_nodes(otherwise, fragments, visited, found);
            }
            Node::With { body, .. } => {
                scan_markup(&std::mem::take(&mut markup), found);
                scan_nodes(body, fragments, visited, found);
            }
            Node::Include { name, .. } => {
                scan_markup(&std::mem::take(&mut markup), found);
                scan_fragment(name, fragments, visited, found);
            }
        }
    }
    scan_markup(&markup, found);
}

fn scan_markup(markup: &str, found: &mut BTreeMap<String, InputConstraint>) {
    for element in FORM_ELEMENT.captures_iter(markup) {
        let mut name = None;
        let mut constraint = InputConstraint::default();
        for attr in ATTRIBUTE.captures_iter(&element[1]) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| m.as_str().to_string());
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "min" => constraint.min = value,
                "max" => constraint.max = value,
                "pattern" => constraint.pattern = value,
                "minlength" => constraint.min_length = value,
                "maxlength" => constraint.max_length = value,
                _ => {}
            }
        }
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if !constraint.is_empty() {
                found.entry(name).or_insert(constraint);
            }
        }
    }
}
