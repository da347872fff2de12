//! # Analysis Module
//!
//! Read-only passes over fragment trees that annotate endpoint definitions:
//!
//! - [`redirect`] decides whether rendering can end in a redirect, so the
//!   generated handler only checks for one where it is possible.
//! - [`constraints`] collects `min`/`max`/`pattern`/`minlength`/`maxlength`
//!   attributes from form inputs for the validation guards.

pub mod constraints;
pub mod redirect;

pub use constraints::{scan_constraints, InputConstraint};
pub use redirect::{fragment_can_redirect, SAFE_ACCESSORS};

use std::collections::HashSet;

use tracing::debug;

use crate::definition::EndpointDefinition;
use crate::template::FragmentSet;

/// Annotate every definition with its redirect flag and input constraints.
pub fn analyze(definitions: &mut [EndpointDefinition], fragments: &FragmentSet) {
    for definition in definitions.iter_mut() {
        let mut visited = HashSet::new();
        definition.can_redirect = fragment_can_redirect(&definition.label, fragments, &mut visited);
        definition.constraints = scan_constraints(&definition.label, fragments);
        debug!(
            route = %definition.normalized_pattern(),
            can_redirect = definition.can_redirect,
            constrained_inputs = definition.constraints.len(),
            "analyzed fragment"
        );
    }
}
