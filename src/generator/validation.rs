//! Validation guards for bound form fields.
//!
//! Guards come from the `min`, `max`, `pattern`, `minlength` and `maxlength`
//! attributes of the input named like the field, and are emitted in that
//! order. Each guard pushes a field-qualified message onto the handler's
//! `errors`, sharing the 400 path with conversion failures. Bounds and
//! patterns are checked here, so a bad attribute fails generation instead of
//! every request.

use regex::Regex;

use super::source::Source;
use super::GenerateError;
use crate::analysis::InputConstraint;
use crate::types::HostType;

/// Emit every guard present in `constraint`.
///
/// `value` names the converted value and `text` the raw string it came from.
/// Range checks compare `value`; pattern and length checks read `text`.
/// A `String` field is never converted, so its `value` is the `&str` itself
/// and compares directly against a string literal bound.
pub(crate) fn emit_guards(
    out: &mut Source,
    field: &str,
    ty: &HostType,
    value: &str,
    text: &str,
    constraint: &InputConstraint,
) -> Result<(), GenerateError> {
    if let Some(min) = &constraint.min {
        let bound = bound_literal(field, "min", min, ty)?;
        emit_check(
            out,
            &format!("{value} < {bound}"),
            field,
            &format!("must be at least {}", min.trim()),
        );
    }
    if let Some(max) = &constraint.max {
        let bound = bound_literal(field, "max", max, ty)?;
        emit_check(
            out,
            &format!("{value} > {bound}"),
            field,
            &format!("must be at most {}", max.trim()),
        );
    }
    if let Some(pattern) = &constraint.pattern {
        let anchored = format!("^(?:{pattern})$");
        if let Err(err) = Regex::new(&anchored) {
            return Err(GenerateError::InvalidPattern {
                field: field.to_string(),
                pattern: pattern.clone(),
                message: err.to_string(),
            });
        }
        out.open("{");
        out.line("static PATTERN: OnceLock<Option<regex::Regex>> = OnceLock::new();");
        out.line(format!(
            "let pattern = PATTERN.get_or_init(|| regex::Regex::new({anchored:?}).ok());"
        ));
        emit_check(
            out,
            &format!("!pattern.as_ref().is_some_and(|re| re.is_match({text}))"),
            field,
            &format!("must match pattern {pattern}"),
        );
        out.close("}");
    }
    if let Some(min_length) = &constraint.min_length {
        let n = length(field, "minlength", min_length)?;
        emit_check(
            out,
            &format!("{text}.chars().count() < {n}"),
            field,
            &format!("must be at least {n} characters"),
        );
    }
    if let Some(max_length) = &constraint.max_length {
        let n = length(field, "maxlength", max_length)?;
        emit_check(
            out,
            &format!("{text}.chars().count() > {n}"),
            field,
            &format!("must be at most {n} characters"),
        );
    }
    Ok(())
}

fn emit_check(out: &mut Source, condition: &str, field: &str, message: &str) {
    out.open(format!("if {condition} {{"));
    out.line(format!("errors.push(field_error({field:?}, {message:?}));"));
    out.close("}");
}

/// A `min`/`max` attribute as a literal of the field's type.
fn bound_literal(
    field: &str,
    attribute: &'static str,
    bound: &str,
    ty: &HostType,
) -> Result<String, GenerateError> {
    let invalid = || GenerateError::InvalidBound {
        field: field.to_string(),
        attribute,
        value: bound.to_string(),
        ty: ty.clone(),
    };
    let text = bound.trim();
    match ty {
        HostType::Int { signed: true, bits } => {
            let n: i128 = text.parse().map_err(|_| invalid())?;
            let bits = u32::from(bits.unwrap_or(64));
            if bits < 128 {
                let limit = 1i128 << (bits - 1);
                if n < -limit || n >= limit {
                    return Err(invalid());
                }
            }
            Ok(n.to_string())
        }
        HostType::Int { signed: false, bits } => {
            let n: u128 = text.parse().map_err(|_| invalid())?;
            let bits = u32::from(bits.unwrap_or(64));
            if bits < 128 && n >> bits != 0 {
                return Err(invalid());
            }
            Ok(n.to_string())
        }
        HostType::Float { .. } => {
            let n: f64 = text.parse().map_err(|_| invalid())?;
            if !n.is_finite() {
                return Err(invalid());
            }
            Ok(format!("{n:?}"))
        }
        HostType::String => Ok(format!("{bound:?}")),
        other => Err(GenerateError::UnsupportedConstraint {
            field: field.to_string(),
            attribute,
            ty: other.clone(),
        }),
    }
}

fn length(field: &str, attribute: &'static str, value: &str) -> Result<usize, GenerateError> {
    value
        .trim()
        .parse()
        .map_err(|_| GenerateError::InvalidLength {
            field: field.to_string(),
            attribute,
            value: value.to_string(),
        })
}
