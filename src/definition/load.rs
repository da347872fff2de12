use std::collections::HashMap;

use tracing::debug;

use super::{parse_label, EndpointDefinition};
use crate::error::{Error, SourceLocation};
use crate::template::FragmentSet;

/// Parse every routable fragment in `fragments`, in fragment order.
///
/// All label errors and duplicate patterns are collected; any issue fails
/// the whole pass.
pub fn load_definitions(fragments: &FragmentSet) -> Result<Vec<EndpointDefinition>, Error> {
    let mut definitions = Vec::new();
    let mut issues = Vec::new();
    let mut seen: HashMap<String, SourceLocation> = HashMap::new();

    for fragment in fragments.iter() {
        let definition = match parse_label(&fragment.name, fragment.location.clone()) {
            Ok(Some(definition)) => definition,
            Ok(None) => continue,
            Err(source) => {
                issues.push(Error::Definition {
                    location: fragment.location.clone(),
                    label: fragment.name.clone(),
                    source,
                });
                continue;
            }
        };

        let pattern = definition.normalized_pattern();
        if let Some(first) = seen.get(&pattern) {
            issues.push(Error::DuplicatePattern {
                pattern,
                first: first.clone(),
                second: definition.location.clone(),
            });
            continue;
        }
        seen.insert(pattern, definition.location.clone());
        definitions.push(definition);
    }

    Error::from_issues(issues)?;
    debug!(count = definitions.len(), "parsed endpoint definitions");
    Ok(definitions)
}
