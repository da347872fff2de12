//! # Types Module
//!
//! The host type system as seen by the engine.
//!
//! Resolution never inspects host source code directly. It asks a
//! [`TypeOracle`] for method sets, free functions, struct fields and
//! capability checks, and works with the small [`HostType`] vocabulary
//! below. [`TypeRegistry`] is the oracle backed by a YAML type description;
//! [`NoTypes`] is the empty oracle used when no description is supplied.

mod registry;

pub use registry::{RegistryError, TypeRegistry};

use std::fmt;

use serde::{Deserialize, Serialize};

/// A type as the engine understands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostType {
    String,
    Bool,
    /// `bits` is `None` for the pointer-sized `isize`/`usize`.
    Int { signed: bool, bits: Option<u8> },
    Float { bits: u8 },
    /// `&Context`
    Context,
    /// `&Request`
    Request,
    /// `&mut dyn ResponseWriter`
    Writer,
    /// `&FormValues`
    Form,
    /// The universal top type, `serde_json::Value`.
    Any,
    Unit,
    /// The generated `Error` alias.
    Error,
    Vec(Box<HostType>),
    Named(String),
}

impl HostType {
    /// Parse a Rust-style type string as written in a type description.
    pub fn parse(text: &str) -> HostType {
        let text = text.trim();
        let bare = text
            .trim_start_matches('&')
            .trim_start_matches("mut ")
            .trim_start_matches("dyn ")
            .trim();
        match bare {
            "String" | "str" => return HostType::String,
            "bool" => return HostType::Bool,
            "isize" => return HostType::Int { signed: true, bits: None },
            "usize" => return HostType::Int { signed: false, bits: None },
            "f32" => return HostType::Float { bits: 32 },
            "f64" => return HostType::Float { bits: 64 },
            "Context" => return HostType::Context,
            "Request" => return HostType::Request,
            "ResponseWriter" => return HostType::Writer,
            "FormValues" => return HostType::Form,
            "serde_json::Value" | "Value" => return HostType::Any,
            "()" => return HostType::Unit,
            "Error" => return HostType::Error,
            _ => {}
        }
        if let Some(int) = parse_int(bare) {
            return int;
        }
        if let Some(inner) = bare.strip_prefix("Vec<").and_then(|s| s.strip_suffix('>')) {
            return HostType::Vec(Box::new(HostType::parse(inner)));
        }
        HostType::Named(bare.to_string())
    }

    /// Type as written in emitted parameter position.
    pub fn rust_type(&self) -> String {
        match self {
            HostType::String => "String".to_string(),
            HostType::Bool => "bool".to_string(),
            HostType::Int { signed, bits } => {
                let prefix = if *signed { 'i' } else { 'u' };
                match bits {
                    Some(bits) => format!("{prefix}{bits}"),
                    None => format!("{prefix}size"),
                }
            }
            HostType::Float { bits } => format!("f{bits}"),
            HostType::Context => "&Context".to_string(),
            HostType::Request => "&Request".to_string(),
            HostType::Writer => "&mut dyn ResponseWriter".to_string(),
            HostType::Form => "&FormValues".to_string(),
            HostType::Any => "serde_json::Value".to_string(),
            HostType::Unit => "()".to_string(),
            HostType::Error => "Error".to_string(),
            HostType::Vec(inner) => format!("Vec<{}>", inner.rust_type()),
            HostType::Named(name) => name.clone(),
        }
    }

    /// Values of this type can be used more than once without cloning.
    pub fn is_copy(&self) -> bool {
        matches!(
            self,
            HostType::Bool | HostType::Int { .. } | HostType::Float { .. } | HostType::Unit
        )
    }

    /// Built-in scalars with a fixed string conversion.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            HostType::String | HostType::Bool | HostType::Int { .. } | HostType::Float { .. }
        )
    }

    /// Borrowed runtime handles bound from the reserved scope.
    pub fn is_scope_handle(&self) -> bool {
        matches!(
            self,
            HostType::Context | HostType::Request | HostType::Writer | HostType::Form
        )
    }

    pub fn named(&self) -> Option<&str> {
        match self {
            HostType::Named(name) => Some(name),
            _ => None,
        }
    }
}

fn parse_int(text: &str) -> Option<HostType> {
    let signed = match text.chars().next()? {
        'i' => true,
        'u' => false,
        _ => return None,
    };
    let bits: u8 = text[1..].parse().ok()?;
    matches!(bits, 8 | 16 | 32 | 64 | 128).then_some(HostType::Int {
        signed,
        bits: Some(bits),
    })
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rust_type())
    }
}

/// Interfaces a named type may satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can be decoded from a path or form string (`TextDecode`).
    TextDecode,
    /// Can be encoded into a path segment (`TextEncode`).
    TextEncode,
    /// Is an error value (converts into the generated `Error`).
    Error,
    /// Exposes its own HTTP status (`StatusCoder`).
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: HostType,
}

impl Param {
    pub fn new(name: Option<String>, ty: HostType) -> Self {
        Self { name, ty }
    }
}

/// What a call yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// Exactly one value.
    Single(HostType),
    /// `Result<T, E>`; an `Err` fails the request.
    WithError(HostType, HostType),
    /// `(T, bool)`; `false` means the handler already answered the request.
    WithFlag(HostType),
}

impl ResultShape {
    /// The value type carried on success.
    pub fn value(&self) -> &HostType {
        match self {
            ResultShape::Single(ty) | ResultShape::WithError(ty, _) | ResultShape::WithFlag(ty) => {
                ty
            }
        }
    }

    pub fn rust_type(&self) -> String {
        match self {
            ResultShape::Single(ty) => ty.rust_type(),
            ResultShape::WithError(ty, err) => {
                format!("Result<{}, {}>", ty.rust_type(), err.rust_type())
            }
            ResultShape::WithFlag(ty) => format!("({}, bool)", ty.rust_type()),
        }
    }
}

/// Ordered parameter types plus a result shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub result: ResultShape,
}

impl Signature {
    /// Build a signature from a result list of one or two types.
    ///
    /// A second result must be `bool` or satisfy [`Capability::Error`].
    pub fn from_results(
        params: Vec<Param>,
        results: &[HostType],
        oracle: &dyn TypeOracle,
    ) -> Result<Self, String> {
        let result = match results {
            [value] => ResultShape::Single(value.clone()),
            [value, HostType::Bool] => ResultShape::WithFlag(value.clone()),
            [value, err] if oracle.implements(err, Capability::Error) => {
                ResultShape::WithError(value.clone(), err.clone())
            }
            [_, other] => {
                return Err(format!(
                    "second result `{other}` must be `bool` or an error type"
                ))
            }
            _ => {
                return Err(format!(
                    "expected one or two results, found {}",
                    results.len()
                ))
            }
        };
        Ok(Self { params, result })
    }

    /// Same parameter types and result, ignoring parameter names.
    pub fn same_shape(&self, other: &Signature) -> bool {
        self.result == other.result
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Parameter list as emitted in a trait method, e.g. `ctx: &Context, id: i64`.
    pub fn rust_params(&self) -> String {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let name = p.name.clone().unwrap_or_else(|| format!("arg{i}"));
                format!("{name}: {}", p.ty.rust_type())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.rust_type()).collect();
        write!(f, "({}) -> {}", params.join(", "), self.result.rust_type())
    }
}

/// A free function callable from generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Path used at the call site, e.g. `crate::ids::parse_id`.
    pub path: String,
    pub signature: Signature,
}

/// One field of a form struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// External name looked up in the form data.
    pub form_name: String,
    pub ty: HostType,
}

/// Read-only view of the host application's types.
pub trait TypeOracle {
    /// A method on `receiver` named `name`.
    fn method(&self, receiver: &str, name: &str) -> Option<Signature>;

    /// A free function visible to generated code.
    fn function(&self, name: &str) -> Option<FunctionDef>;

    /// Fields of a struct type, in declaration order.
    fn struct_fields(&self, ty: &str) -> Option<Vec<FieldDef>>;

    /// Whether `ty` satisfies `capability`.
    fn implements(&self, ty: &HostType, capability: Capability) -> bool;

    /// `use` paths the generated module needs for the host's types.
    fn imports(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Oracle that knows no host types; every call is synthesized.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTypes;

impl TypeOracle for NoTypes {
    fn method(&self, _receiver: &str, _name: &str) -> Option<Signature> {
        None
    }

    fn function(&self, _name: &str) -> Option<FunctionDef> {
        None
    }

    fn struct_fields(&self, _ty: &str) -> Option<Vec<FieldDef>> {
        None
    }

    fn implements(&self, ty: &HostType, capability: Capability) -> bool {
        builtin_implements(ty, capability)
    }
}

/// Capabilities every oracle grants to built-in types.
pub(crate) fn builtin_implements(ty: &HostType, capability: Capability) -> bool {
    matches!((ty, capability), (HostType::Error, Capability::Error))
}
