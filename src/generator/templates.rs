use askama::Template;

use super::paths::PathHelper;

/// A method of the capability interface trait.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    /// Full parameter list including `&self`.
    pub params: String,
    pub result: String,
}

/// One `mux.handle` registration.
#[derive(Debug, Clone)]
pub struct HandlerBlock {
    /// Fragment label, flattened to one line for the leading comment.
    pub label: String,
    /// Pattern passed to the multiplexer as a Rust string literal.
    pub pattern_literal: String,
    /// Closure body, already indented.
    pub body: String,
}

/// Template data for the emitted routes module
#[derive(Template)]
#[template(path = "routes.rs.txt", escape = "none")]
pub struct RoutesTemplate {
    /// Number of registered routes, for the header
    pub route_count: usize,
    /// `use` paths for host types
    pub imports: Vec<String>,
    /// Capability interface trait name
    pub interface: String,
    /// Registration function name
    pub routes_function: String,
    /// Interface methods sorted by name
    pub methods: Vec<MethodDecl>,
    /// Dispatch closures in definition order
    pub handlers: Vec<HandlerBlock>,
    /// URL builders in definition order
    pub paths: Vec<PathHelper>,
}
