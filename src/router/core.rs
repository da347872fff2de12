use std::cmp::Reverse;
use std::collections::BTreeMap;

use http::Method;
use regex::Regex;
use tracing::debug;

use crate::definition::{EndpointDefinition, PathSegment};

/// Anchored regex for one definition's path.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
    param_names: Vec<String>,
}

impl PathMatcher {
    /// Compile the path of `definition`.
    ///
    /// Transforms `/users/{id}/files/{rest...}` into
    /// `^/users/([^/]+)/files/(.*)$` and records `["id", "rest"]`.
    pub fn new(definition: &EndpointDefinition) -> Result<Self, regex::Error> {
        let mut pattern = String::with_capacity(definition.path().len() + 8);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(definition.segments.len());

        for segment in &definition.segments {
            pattern.push('/');
            match segment {
                PathSegment::Literal(text) => pattern.push_str(&regex::escape(text)),
                PathSegment::Param(name) => {
                    pattern.push_str("([^/]+)");
                    param_names.push(name.clone());
                }
                PathSegment::Wildcard(name) => {
                    pattern.push_str("(.*)");
                    param_names.push(name.clone());
                }
                PathSegment::End => {}
            }
        }
        if definition.trailing_slash || definition.segments.is_empty() {
            pattern.push_str("/.*");
        }
        pattern.push('$');

        Ok(Self {
            regex: Regex::new(&pattern)?,
            param_names,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Decoded path parameter values when `path` matches.
    ///
    /// A value that is not valid percent-encoded UTF-8 is kept as written.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let mut params = BTreeMap::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = captures.get(i + 1) {
                let raw = value.as_str();
                let decoded = urlencoding::decode(raw)
                    .map_or_else(|_| raw.to_string(), |value| value.into_owned());
                params.insert(name.clone(), decoded);
            }
        }
        Some(params)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Result of matching a request against the definition set.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub index: usize,
    pub definition: &'a EndpointDefinition,
    pub path_params: BTreeMap<String, String>,
}

/// Matches requests against a set of endpoint definitions.
#[derive(Debug, Clone)]
pub struct Router<'a> {
    /// Sorted most specific first.
    routes: Vec<(usize, &'a EndpointDefinition, PathMatcher)>,
}

impl<'a> Router<'a> {
    pub fn new(definitions: &'a [EndpointDefinition]) -> Result<Self, regex::Error> {
        let mut routes = Vec::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            routes.push((i, def, PathMatcher::new(def)?));
        }
        routes.sort_by_key(|(i, def, _)| {
            let literals = def
                .segments
                .iter()
                .filter(|s| matches!(s, PathSegment::Literal(_) | PathSegment::End))
                .count();
            let open_ended = def.trailing_slash
                || def.segments.is_empty()
                || matches!(def.segments.last(), Some(PathSegment::Wildcard(_)));
            (
                def.host.is_empty(),
                open_ended,
                Reverse(literals),
                Reverse(def.segments.len()),
                def.method.is_none(),
                *i,
            )
        });
        debug!(routes_count = routes.len(), "route table built");
        Ok(Self { routes })
    }

    /// The definition serving `method host path`, if any.
    pub fn route(&self, method: &Method, host: &str, path: &str) -> Option<RouteMatch<'a>> {
        let host = host.to_ascii_lowercase();
        for (index, definition, matcher) in &self.routes {
            if definition.method.as_ref().is_some_and(|m| m != method) {
                continue;
            }
            if !definition.host.is_empty() && definition.host != host {
                continue;
            }
            if let Some(path_params) = matcher.captures(path) {
                debug!(
                    method = %method,
                    path = %path,
                    route = %definition.normalized_pattern(),
                    path_params = ?path_params,
                    "route matched"
                );
                return Some(RouteMatch {
                    index: *index,
                    definition: *definition,
                    path_params,
                });
            }
        }
        debug!(method = %method, path = %path, "no route matched");
        None
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
