//! # Generator Module
//!
//! Turns a [`FragmentSet`] into the Rust source of a routes module.
//!
//! ## Pipeline
//!
//! ```text
//! fragments → definitions → identifiers → signatures → analysis → emission
//! ```
//!
//! 1. **Definitions** - route labels are parsed and checked for duplicates
//! 2. **Identifiers** - one name per definition, allocated before emission
//! 3. **Signatures** - every call is bound to the host's types or synthesized
//! 4. **Analysis** - redirect capability and form input constraints
//! 5. **Emission** - handler bodies, validation guards and URL builders are
//!    rendered through the `routes.rs.txt` Askama template
//!
//! Every stage collects all of its issues before failing, and nothing is
//! returned (or written) when any issue exists. Emission is deterministic:
//! the same fragments and types always produce byte-identical source.
//!
//! ## Generated module
//!
//! The module contains a fixed runtime support section (`Request`,
//! `ResponseWriter`, `Mux`, `Renderer`, `TemplateData`, the `TextDecode` /
//! `TextEncode` / `StatusCoder` hooks and a few helpers), the capability
//! interface trait, the registration function and `RoutePaths`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fragmux::generator::{generate, GenerateOptions};
//! use fragmux::template::FragmentSet;
//! use fragmux::types::NoTypes;
//!
//! let fragments = FragmentSet::load_dir("templates".as_ref())?;
//! let source = generate(&fragments, &NoTypes, &GenerateOptions::default())?;
//! std::fs::write("src/template_routes.rs", source)?;
//! ```

mod convert;
mod format;
mod handler;
mod output;
mod paths;
mod source;
mod templates;
mod validation;

pub use format::format_file;
pub use output::write_if_changed;
pub use paths::PathHelper;
pub use templates::{HandlerBlock, MethodDecl, RoutesTemplate};

use askama::Template;
use tracing::debug;

use crate::analysis::analyze;
use crate::definition::{load_definitions, EndpointDefinition};
use crate::error::Error;
use crate::ident::IdentifierTable;
use crate::resolve::{resolve_definitions, CapabilityInterface};
use crate::template::FragmentSet;
use crate::types::{HostType, TypeOracle};

/// Problems found while emitting code for one definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("{attribute}={value:?} on input {field:?} is not a valid `{ty}`")]
    InvalidBound {
        field: String,
        attribute: &'static str,
        value: String,
        ty: HostType,
    },
    #[error("{attribute} on input {field:?} does not apply to `{ty}`")]
    UnsupportedConstraint {
        field: String,
        attribute: &'static str,
        ty: HostType,
    },
    #[error("pattern {pattern:?} on input {field:?} is not a valid regex: {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },
    #[error("{attribute}={value:?} on input {field:?} is not a valid length")]
    InvalidLength {
        field: String,
        attribute: &'static str,
        value: String,
    },
}

/// Naming choices for the emitted module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Host type whose methods calls are bound to first.
    pub receiver: Option<String>,
    /// Name of the capability interface trait.
    pub interface: String,
    /// Name of the registration function.
    pub routes_function: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            receiver: None,
            interface: "RoutesReceiver".to_string(),
            routes_function: "routes".to_string(),
        }
    }
}

/// Definitions after every pass, ready for emission.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub definitions: Vec<EndpointDefinition>,
    pub interface: CapabilityInterface,
}

/// Run every pass up to, but not including, emission.
pub fn analyze_fragments(
    fragments: &FragmentSet,
    oracle: &dyn TypeOracle,
    options: &GenerateOptions,
) -> Result<Analysis, Error> {
    let mut definitions = load_definitions(fragments)?;
    IdentifierTable::allocate(&definitions).apply(&mut definitions);
    let interface = resolve_definitions(&mut definitions, oracle, options.receiver.as_deref())?;
    analyze(&mut definitions, fragments);
    debug!(
        definitions = definitions.len(),
        interface_methods = interface.len(),
        "analysis complete"
    );
    Ok(Analysis {
        definitions,
        interface,
    })
}

/// Generate the routes module source for `fragments`.
pub fn generate(
    fragments: &FragmentSet,
    oracle: &dyn TypeOracle,
    options: &GenerateOptions,
) -> Result<String, Error> {
    let analysis = analyze_fragments(fragments, oracle, options)?;
    render_module(&analysis, oracle, options)
}

/// Emit source for an analyzed definition set.
pub fn render_module(
    analysis: &Analysis,
    oracle: &dyn TypeOracle,
    options: &GenerateOptions,
) -> Result<String, Error> {
    let mut issues = Vec::new();
    let mut handlers = Vec::with_capacity(analysis.definitions.len());
    let mut helpers = Vec::with_capacity(analysis.definitions.len());

    for definition in &analysis.definitions {
        match handler::emit_handler(definition) {
            Ok(body) => handlers.push(HandlerBlock {
                label: definition.label.replace(['\r', '\n'], " "),
                pattern_literal: format!("{:?}", definition.normalized_pattern()),
                body,
            }),
            Err(source) => issues.push(Error::Generate {
                location: definition.location.clone(),
                label: definition.label.clone(),
                source,
            }),
        }
        helpers.push(paths::path_helper(definition, oracle));
    }
    Error::from_issues(issues)?;

    let methods = analysis
        .interface
        .methods()
        .map(|(name, signature)| {
            let params = signature.rust_params();
            MethodDecl {
                name: name.to_string(),
                params: if params.is_empty() {
                    "&self".to_string()
                } else {
                    format!("&self, {params}")
                },
                result: signature.result.rust_type(),
            }
        })
        .collect();

    let mut imports = oracle.imports();
    imports.sort();
    imports.dedup();

    let rendered = RoutesTemplate {
        route_count: analysis.definitions.len(),
        imports,
        interface: options.interface.clone(),
        routes_function: options.routes_function.clone(),
        methods,
        handlers,
        paths: helpers,
    }
    .render()?;
    debug!(bytes = rendered.len(), "rendered routes module");
    Ok(rendered)
}
