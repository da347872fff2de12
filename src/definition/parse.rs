use std::collections::{BTreeMap, HashSet};

use http::{Method, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    ArgPath, CallArg, CallExpr, DefinitionError, EndpointDefinition, PathSegment, METHODS,
    RESERVED_SCOPE, RUST_KEYWORDS,
};
use crate::error::SourceLocation;
use crate::template::is_identifier;

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<method>[A-Za-z]+)\s+)?(?P<host>[^/\s]+)?(?P<path>/\S*)(?:\s+(?P<status>\d+|(?:[A-Za-z_]\w*::)+[A-Za-z_]\w*))?(?:\s+(?P<call>\S.*?))?\s*$",
    )
    .expect("route label regex should be valid")
});

/// Named status constants accepted after `StatusCode::` or `http::StatusCode::`.
const STATUS_CONSTANTS: &[(&str, StatusCode)] = &[
    ("OK", StatusCode::OK),
    ("CREATED", StatusCode::CREATED),
    ("ACCEPTED", StatusCode::ACCEPTED),
    ("NO_CONTENT", StatusCode::NO_CONTENT),
    ("MOVED_PERMANENTLY", StatusCode::MOVED_PERMANENTLY),
    ("FOUND", StatusCode::FOUND),
    ("SEE_OTHER", StatusCode::SEE_OTHER),
    ("NOT_MODIFIED", StatusCode::NOT_MODIFIED),
    ("TEMPORARY_REDIRECT", StatusCode::TEMPORARY_REDIRECT),
    ("PERMANENT_REDIRECT", StatusCode::PERMANENT_REDIRECT),
    ("BAD_REQUEST", StatusCode::BAD_REQUEST),
    ("UNAUTHORIZED", StatusCode::UNAUTHORIZED),
    ("FORBIDDEN", StatusCode::FORBIDDEN),
    ("NOT_FOUND", StatusCode::NOT_FOUND),
    ("METHOD_NOT_ALLOWED", StatusCode::METHOD_NOT_ALLOWED),
    ("CONFLICT", StatusCode::CONFLICT),
    ("GONE", StatusCode::GONE),
    ("UNPROCESSABLE_ENTITY", StatusCode::UNPROCESSABLE_ENTITY),
    ("TOO_MANY_REQUESTS", StatusCode::TOO_MANY_REQUESTS),
    ("INTERNAL_SERVER_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
    ("NOT_IMPLEMENTED", StatusCode::NOT_IMPLEMENTED),
    ("SERVICE_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE),
];

/// Parse a fragment name as a route label.
///
/// Returns `Ok(None)` for names that are not route labels at all.
pub fn parse_label(
    label: &str,
    location: SourceLocation,
) -> Result<Option<EndpointDefinition>, DefinitionError> {
    let Some(caps) = LABEL.captures(label) else {
        return Ok(None);
    };

    let method = match caps.name("method") {
        Some(m) => Some(parse_method(m.as_str())?),
        None => None,
    };
    let host = caps
        .name("host")
        .map(|h| h.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let (segments, trailing_slash) = parse_path(&caps["path"])?;
    check_params(&segments)?;

    let status = caps.name("status").map(|s| parse_status(s.as_str())).transpose()?;
    let call = caps.name("call").map(|c| CallExpr::parse(c.as_str())).transpose()?;

    let definition = EndpointDefinition {
        label: label.to_string(),
        location,
        method,
        host,
        segments,
        trailing_slash,
        status,
        call,
        identifier: String::new(),
        resolved: None,
        param_types: Vec::new(),
        can_redirect: false,
        constraints: BTreeMap::new(),
    };

    if let Some(call) = &definition.call {
        check_scope(call, &definition)?;
        if definition.status.is_some() && definition.has_response_writer() {
            return Err(DefinitionError::StatusWithResponse);
        }
    }
    Ok(Some(definition))
}

fn parse_method(text: &str) -> Result<Method, DefinitionError> {
    let upper = text.to_ascii_uppercase();
    METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| DefinitionError::UnsupportedMethod(text.to_string()))
}

fn parse_path(path: &str) -> Result<(Vec<PathSegment>, bool), DefinitionError> {
    let rest = &path[1..];
    if rest.is_empty() {
        return Ok((Vec::new(), true));
    }
    let mut parts: Vec<&str> = rest.split('/').collect();
    let trailing_slash = parts.last() == Some(&"");
    if trailing_slash {
        parts.pop();
    }

    let mut segments = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Err(DefinitionError::EmptySegment {
                path: path.to_string(),
            });
        }
        let segment = parse_segment(part)?;
        let last = i + 1 == parts.len() && !trailing_slash;
        if matches!(segment, PathSegment::Wildcard(_) | PathSegment::End) && !last {
            return Err(DefinitionError::InvalidSegment {
                segment: part.to_string(),
                reason: "must be the final segment".to_string(),
            });
        }
        segments.push(segment);
    }
    Ok((segments, trailing_slash))
}

fn parse_segment(part: &str) -> Result<PathSegment, DefinitionError> {
    let invalid = |reason: &str| DefinitionError::InvalidSegment {
        segment: part.to_string(),
        reason: reason.to_string(),
    };
    match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        Some("$") => Ok(PathSegment::End),
        Some(inner) if inner.contains(['{', '}']) => Err(invalid("nested braces")),
        Some(inner) => match inner.strip_suffix("...") {
            Some(name) => Ok(PathSegment::Wildcard(name.to_string())),
            None => Ok(PathSegment::Param(inner.to_string())),
        },
        None if part.contains(['{', '}']) => {
            Err(invalid("a parameter must occupy the whole segment"))
        }
        None => Ok(PathSegment::Literal(part.to_string())),
    }
}

fn check_params(segments: &[PathSegment]) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for name in segments.iter().filter_map(PathSegment::param_name) {
        if !is_identifier(name) || RUST_KEYWORDS.contains(&name) {
            return Err(DefinitionError::InvalidParamName(name.to_string()));
        }
        if RESERVED_SCOPE.contains(&name) {
            return Err(DefinitionError::ReservedParam(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(DefinitionError::DuplicateParam(name.to_string()));
        }
    }
    Ok(())
}

fn parse_status(text: &str) -> Result<u16, DefinitionError> {
    let invalid = || DefinitionError::InvalidStatus(text.to_string());
    if let Ok(code) = text.parse::<u16>() {
        return StatusCode::from_u16(code)
            .map(|s| s.as_u16())
            .map_err(|_| invalid());
    }
    let name = text
        .strip_prefix("http::StatusCode::")
        .or_else(|| text.strip_prefix("StatusCode::"))
        .ok_or_else(invalid)?;
    STATUS_CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, status)| status.as_u16())
        .ok_or_else(invalid)
}

/// Every identifier argument, at any depth, must be reserved or a path parameter.
fn check_scope(call: &CallExpr, definition: &EndpointDefinition) -> Result<(), DefinitionError> {
    check_scope_at(call, definition, &ArgPath::default())
}

fn check_scope_at(
    call: &CallExpr,
    definition: &EndpointDefinition,
    at: &ArgPath,
) -> Result<(), DefinitionError> {
    for (i, arg) in call.args.iter().enumerate() {
        match arg {
            CallArg::Ident(name) => {
                if !RESERVED_SCOPE.contains(&name.as_str()) && !definition.is_param(name) {
                    return Err(DefinitionError::UnknownIdentifier {
                        name: name.clone(),
                        path: at.child(i),
                        call: call.to_string(),
                    });
                }
            }
            CallArg::Call(inner) => check_scope_at(inner, definition, &at.child(i))?,
        }
    }
    Ok(())
}
