//! URL builders emitted on `RoutePaths`.
//!
//! Each definition gets one method named by its identifier. Parameters keep
//! path order. `String` parameters are taken as `&str`, scalars by value and
//! host types by reference. A parameter whose type implements `TextEncode`
//! is encoded through it, which makes the builder return
//! `Result<String, Error>`; other values are formatted with `Display`.
//!
//! Everything except numbers and booleans is percent-encoded on the way in:
//! `encode_segment` for `{name}` so the value stays one segment, and
//! `encode_path` for `{name...}` so its slashes survive.

use crate::definition::{EndpointDefinition, PathSegment};
use crate::types::{Capability, HostType, TypeOracle};

/// One emitted `RoutePaths` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHelper {
    pub identifier: String,
    /// Parameter list after `&self`, each entry prefixed with `, `.
    pub params: String,
    pub returns: String,
    pub body: String,
    /// The helper can fail because a parameter is encoded with `TextEncode`.
    pub fallible: bool,
}

pub(crate) fn path_helper(definition: &EndpointDefinition, oracle: &dyn TypeOracle) -> PathHelper {
    let mut format_string = String::from("{}");
    let mut params = String::new();
    let mut values = vec!["self.prefix".to_string()];
    let mut fallible = false;

    for segment in &definition.segments {
        format_string.push('/');
        match segment {
            PathSegment::Literal(text) => {
                format_string.push_str(&text.replace('{', "{{").replace('}', "}}"))
            }
            PathSegment::Param(name) | PathSegment::Wildcard(name) => {
                format_string.push_str("{}");
                let ty = definition.param_type(name);
                let encoded = !ty.is_scalar() && oracle.implements(&ty, Capability::TextEncode);
                params.push_str(&format!(", {name}: {}", param_type(&ty)));
                let escape = match segment {
                    PathSegment::Wildcard(_) => "encode_path",
                    _ => "encode_segment",
                };
                let value = if encoded {
                    fallible = true;
                    format!("{escape}(&{name}.encode_text()?)")
                } else if ty == HostType::String {
                    format!("{escape}({name})")
                } else if ty.is_copy() {
                    name.clone()
                } else {
                    format!("{escape}(&{name}.to_string())")
                };
                values.push(value);
            }
            PathSegment::End => {}
        }
    }
    if definition.trailing_slash || definition.segments.is_empty() {
        format_string.push('/');
    }

    let expr = format!("format!({format_string:?}, {})", values.join(", "));
    let (returns, body) = if fallible {
        ("Result<String, Error>".to_string(), format!("Ok({expr})"))
    } else {
        ("String".to_string(), expr)
    };
    PathHelper {
        identifier: definition.identifier.clone(),
        params,
        returns,
        body,
        fallible,
    }
}

fn param_type(ty: &HostType) -> String {
    match ty {
        HostType::String => "&str".to_string(),
        ty if ty.is_copy() => ty.rust_type(),
        ty => format!("&{}", ty.rust_type()),
    }
}
