//! String to typed-value conversions used by generated handlers.

use crate::types::HostType;

/// How a `&str` from the path or form becomes a value of a bound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Conversion {
    /// `String`: copied as is, cannot fail.
    Direct,
    /// An expression of type `Result<T, E>` with `E: Display`.
    Fallible(String),
}

/// Conversion of the `&str` expression `text` into `ty`.
///
/// Integers and floats use `str::parse` with their explicit width, `bool`
/// uses the generated `parse_bool`, and every other type goes through its
/// `TextDecode` implementation.
pub(crate) fn conversion(ty: &HostType, text: &str) -> Conversion {
    match ty {
        HostType::String => Conversion::Direct,
        HostType::Bool => Conversion::Fallible(format!("parse_bool({text})")),
        HostType::Int { .. } | HostType::Float { .. } => {
            Conversion::Fallible(format!("{text}.parse::<{}>()", ty.rust_type()))
        }
        other => Conversion::Fallible(format!(
            "<{} as TextDecode>::decode_text({text})",
            other.rust_type()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(conversion(&HostType::String, "text"), Conversion::Direct);
        assert_eq!(
            conversion(&HostType::Bool, "text"),
            Conversion::Fallible("parse_bool(text)".into())
        );
        assert_eq!(
            conversion(&HostType::parse("u16"), "text"),
            Conversion::Fallible("text.parse::<u16>()".into())
        );
        assert_eq!(
            conversion(&HostType::parse("f32"), "text"),
            Conversion::Fallible("text.parse::<f32>()".into())
        );
        assert_eq!(
            conversion(&HostType::parse("Slug"), "text"),
            Conversion::Fallible("<Slug as TextDecode>::decode_text(text)".into())
        );
    }
}
