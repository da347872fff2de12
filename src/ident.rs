//! Generated identifiers for endpoint definitions.
//!
//! A definition with a call is named after its callee. A definition without
//! one is named after its route: `GET /user/{id}/posts` becomes
//! `ReadUserPostsById`. Names are allocated once, in definition order, into
//! an [`IdentifierTable`] before any code is emitted.

use std::collections::HashSet;

use http::Method;
use tracing::warn;

use crate::definition::{EndpointDefinition, PathSegment, RUST_KEYWORDS};

/// Identifiers keyed by definition index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierTable {
    names: Vec<String>,
}

impl IdentifierTable {
    /// Allocate a unique identifier for every definition.
    ///
    /// A callee name already taken by an earlier definition is prefixed with
    /// the route identifier of the later definition, the one being named now:
    /// `GET /a Page(ctx)` keeps `Page` and `GET /b Page(ctx)` becomes
    /// `ReadB_Page`. The earlier definition's name never changes. Anything
    /// still colliding gets a numeric suffix.
    pub fn allocate(definitions: &[EndpointDefinition]) -> Self {
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let route = route_identifier(definition);
            let name = match &definition.call {
                Some(call) if seen.contains(&call.callee) => {
                    unique_identifier(&mut seen, &format!("{route}_{}", call.callee))
                }
                Some(call) => unique_identifier(&mut seen, &call.callee),
                None => unique_identifier(&mut seen, &route),
            };
            names.push(name);
        }
        Self { names }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write each identifier into its definition.
    pub fn apply(&self, definitions: &mut [EndpointDefinition]) {
        for (definition, name) in definitions.iter_mut().zip(&self.names) {
            definition.identifier = name.clone();
        }
    }
}

fn unique_identifier(seen: &mut HashSet<String>, name: &str) -> String {
    if seen.insert(name.to_string()) {
        return name.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{name}_{counter}");
        if seen.insert(candidate.clone()) {
            warn!(name, candidate = %candidate, "duplicate identifier, using suffix");
            return candidate;
        }
        counter += 1;
    }
}

/// Identifier derived from a definition's method and path.
pub fn route_identifier(definition: &EndpointDefinition) -> String {
    let mut out = match &definition.method {
        Some(m) if *m == Method::GET => "Read".to_string(),
        Some(m) if *m == Method::POST => "Create".to_string(),
        Some(m) if *m == Method::PUT => "Replace".to_string(),
        Some(m) if *m == Method::PATCH => "Update".to_string(),
        Some(m) if *m == Method::DELETE => "Delete".to_string(),
        Some(m) => capitalize(&m.as_str().to_ascii_lowercase()),
        None => String::new(),
    };

    let mut params = Vec::new();
    for segment in &definition.segments {
        match segment {
            PathSegment::Literal(text) => out.push_str(&pascal_case(text)),
            PathSegment::End => out.push_str("Index"),
            PathSegment::Param(name) | PathSegment::Wildcard(name) => params.push(capitalize(name)),
        }
    }
    if !params.is_empty() {
        out.push_str("By");
        out.push_str(&params.join("And"));
    }

    if out.is_empty() {
        return "Index".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) || RUST_KEYWORDS.contains(&out.as_str()) {
        out.insert_str(0, "Route");
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn pascal_case(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(capitalize)
        .collect()
}
