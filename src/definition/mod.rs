//! # Definition Module
//!
//! Route labels and the endpoint definitions parsed from them.
//!
//! A fragment name such as `GET example.com/user/{id} 200 GetUser(ctx, id)`
//! is a route label:
//!
//! ```text
//! route   ::= [method " "] [host] path [" " status] [" " call]
//! method  ::= GET | POST | PUT | PATCH | DELETE
//! path    ::= "/" {segment "/"} [segment]
//! segment ::= literal | "{" ident "}" | "{" ident "...}" | "{$}"
//! status  ::= integer | qualified-constant-name
//! call    ::= ident "(" [arg {"," arg}] ")"
//! arg     ::= ident | call
//! ```
//!
//! Names that do not look like a route are ordinary fragments and are left
//! alone. Labels that do look like a route but break a rule are errors.
//!
//! Definitions are created here and enriched in place by the later passes
//! (identifier allocation, signature resolution, redirect analysis and
//! constraint scanning) before the generator reads them.

mod call;
mod load;
mod parse;

pub use call::{ArgPath, CallArg, CallExpr};
pub use load::load_definitions;
pub use parse::parse_label;

use std::collections::BTreeMap;
use std::fmt;

use http::Method;
use thiserror::Error;

use crate::analysis::InputConstraint;
use crate::error::SourceLocation;
use crate::resolve::ResolvedCall;
use crate::types::HostType;

/// HTTP verbs a route label may name.
pub const METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Argument names with engine-defined bindings.
pub const RESERVED_SCOPE: &[&str] = &["ctx", "request", "response", "form"];

/// Words that cannot name a path parameter in emitted code.
pub(crate) const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// A reserved-scope argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeName {
    /// `ctx`, the request context.
    Context,
    /// `request`
    Request,
    /// `response`, the writer; handlers receiving it answer the request themselves.
    Response,
    /// `form`, the parsed form values or a form struct.
    Form,
}

impl ScopeName {
    pub fn from_ident(name: &str) -> Option<ScopeName> {
        match name {
            "ctx" => Some(ScopeName::Context),
            "request" => Some(ScopeName::Request),
            "response" => Some(ScopeName::Response),
            "form" => Some(ScopeName::Form),
            _ => None,
        }
    }

    /// Type used when the callee's signature is synthesized.
    pub fn default_type(self) -> HostType {
        match self {
            ScopeName::Context => HostType::Context,
            ScopeName::Request => HostType::Request,
            ScopeName::Response => HostType::Writer,
            ScopeName::Form => HostType::Form,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("unsupported method {0:?}; expected one of GET, POST, PUT, PATCH, DELETE")]
    UnsupportedMethod(String),
    #[error("path {path:?} contains an empty segment")]
    EmptySegment { path: String },
    #[error("invalid path segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },
    #[error("path parameter {0:?} is not a valid identifier")]
    InvalidParamName(String),
    #[error("path parameter {0:?} is declared more than once")]
    DuplicateParam(String),
    #[error("path parameter {0:?} shadows a reserved name (ctx, request, response, form)")]
    ReservedParam(String),
    #[error("unknown status {0:?}")]
    InvalidStatus(String),
    #[error("invalid call {call:?} at offset {offset}: {message}")]
    CallSyntax {
        call: String,
        offset: usize,
        message: String,
    },
    #[error("unknown identifier {name:?} at argument {path} of {call}")]
    UnknownIdentifier {
        name: String,
        path: ArgPath,
        call: String,
    },
    #[error("an explicit status cannot be combined with a `response` argument")]
    StatusWithResponse,
}

/// One piece of a route path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Literal(String),
    /// `{name}`, exactly one segment.
    Param(String),
    /// `{name...}`, the rest of the path.
    Wildcard(String),
    /// `{$}`, the path ends here with a trailing slash.
    End,
}

impl PathSegment {
    pub fn param_name(&self) -> Option<&str> {
        match self {
            PathSegment::Param(name) | PathSegment::Wildcard(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Literal(text) => write!(f, "{text}"),
            PathSegment::Param(name) => write!(f, "{{{name}}}"),
            PathSegment::Wildcard(name) => write!(f, "{{{name}...}}"),
            PathSegment::End => write!(f, "{{$}}"),
        }
    }
}

/// The parsed and enriched form of one routable fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDefinition {
    /// Raw fragment name.
    pub label: String,
    pub location: SourceLocation,
    /// `None` matches any method.
    pub method: Option<Method>,
    /// Lower-cased; empty when the route applies to every host.
    pub host: String,
    pub segments: Vec<PathSegment>,
    /// The path ends in `/` and matches the whole subtree below it.
    pub trailing_slash: bool,
    /// Explicit status from the label.
    pub status: Option<u16>,
    pub call: Option<CallExpr>,

    /// Name used for this definition in emitted code.
    pub identifier: String,
    pub resolved: Option<ResolvedCall>,
    /// Path parameters in path order with their resolved types.
    pub param_types: Vec<(String, HostType)>,
    pub can_redirect: bool,
    /// Input constraints found in the fragment markup, keyed by input name.
    pub constraints: BTreeMap<String, InputConstraint>,
}

impl EndpointDefinition {
    /// Path as written, rebuilt from its segments.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(&segment.to_string());
        }
        if self.trailing_slash || self.segments.is_empty() {
            path.push('/');
        }
        path
    }

    /// `METHOD host/path` with single spaces; the key for duplicate detection.
    pub fn normalized_pattern(&self) -> String {
        let route = format!("{}{}", self.host, self.path());
        match &self.method {
            Some(method) => format!("{method} {route}"),
            None => route,
        }
    }

    /// Path parameter names in path order.
    pub fn params(&self) -> Vec<&str> {
        self.segments.iter().filter_map(PathSegment::param_name).collect()
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params().contains(&name)
    }

    /// Whether a `response` argument appears anywhere in the call tree.
    pub fn has_response_writer(&self) -> bool {
        self.call.as_ref().is_some_and(|call| call.uses("response"))
    }

    /// Status used when nothing else sets one.
    pub fn default_status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// Resolved type of a path parameter; `String` until resolution says otherwise.
    pub fn param_type(&self, name: &str) -> HostType {
        self.param_types
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, ty)| ty.clone())
            .unwrap_or(HostType::String)
    }

    /// Fill in path parameter values. Missing values render as empty segments.
    ///
    /// Values are percent-encoded; a wildcard keeps its slashes.
    pub fn build_path(&self, values: &BTreeMap<String, String>) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                PathSegment::Literal(text) => path.push_str(text),
                PathSegment::Param(name) => {
                    let value = values.get(name).map(String::as_str).unwrap_or_default();
                    path.push_str(&urlencoding::encode(value));
                }
                PathSegment::Wildcard(name) => {
                    let value = values.get(name).map(String::as_str).unwrap_or_default();
                    let encoded: Vec<_> = value.split('/').map(urlencoding::encode).collect();
                    path.push_str(&encoded.join("/"));
                }
                PathSegment::End => {}
            }
        }
        if self.trailing_slash || self.segments.is_empty() {
            path.push('/');
        }
        path
    }
}
