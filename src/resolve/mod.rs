//! # Resolve Module
//!
//! Attaches a signature to every call in every endpoint definition.
//!
//! Calls are resolved innermost first. A callee is looked up, in order, as a
//! method on the configured receiver type, then as a free function. A callee
//! found in neither place gets a synthesized signature: reserved arguments
//! take their default types, path parameters are `String` (or the type
//! another bound call in the same label gives them), nested calls contribute
//! their result type, and the result is `serde_json::Value`.
//!
//! Receiver methods and synthesized methods form the
//! [`CapabilityInterface`] the host must implement. Free functions are
//! called by path and stay out of it.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use tracing::debug;

use crate::definition::{CallArg, CallExpr, EndpointDefinition, ScopeName};
use crate::error::Error;
use crate::types::{Capability, HostType, Param, ResultShape, Signature, TypeOracle};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("argument count mismatch: expected {expected}, found {actual}")]
    ArgumentCount { expected: String, actual: String },
    #[error("argument {index} ({arg}) of {call}: expected `{expected}`, found `{found}`")]
    ArgumentType {
        call: String,
        index: usize,
        arg: String,
        expected: HostType,
        found: HostType,
    },
    #[error("{callee} is used with two different signatures: {first} and {second}")]
    ConflictingSignature {
        callee: String,
        first: String,
        second: String,
    },
    #[error("path parameter {name:?} is used as both `{first}` and `{second}`")]
    ConflictingParamType {
        name: String,
        first: HostType,
        second: HostType,
    },
    #[error("path parameter {name:?} has unsupported type `{ty}`")]
    UnsupportedParamType { name: String, ty: HostType },
    #[error("form argument type `{ty}` is neither FormValues nor a struct with known fields")]
    FormType { ty: HostType },
    #[error("field {field:?} of form struct `{ty}` has unsupported type `{field_ty}`")]
    UnsupportedFieldType {
        ty: String,
        field: String,
        field_ty: HostType,
    },
}

/// How a resolved callee is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    /// A method on the receiver, part of the capability interface.
    Method,
    /// A free function called through `path`.
    Function { path: String },
    /// Not found anywhere; required from the receiver.
    Synthesized,
}

/// One field of a form struct argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub form_name: String,
    /// Element type; for sequences this is the type of one value.
    pub ty: HostType,
    /// The field is a `Vec` and collects every value under `form_name`.
    pub many: bool,
}

/// Where an argument's value comes from at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgBinding {
    Context,
    Request,
    Response,
    FormValues,
    FormStruct {
        type_name: String,
        fields: Vec<FormField>,
    },
    PathParam {
        name: String,
        ty: HostType,
    },
    Call(Box<ResolvedCall>),
}

/// A call with its signature and argument bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub callee: String,
    pub kind: CallKind,
    pub signature: Signature,
    pub args: Vec<ArgBinding>,
    /// Source text of the call, for diagnostics.
    pub text: String,
    /// The success value implements [`Capability::Status`].
    pub value_has_status: bool,
    /// The error value implements [`Capability::Status`].
    pub error_has_status: bool,
}

impl ResolvedCall {
    /// Nested calls in evaluation order (innermost first), excluding `self`.
    pub fn nested(&self) -> Vec<&ResolvedCall> {
        let mut out = Vec::new();
        for arg in &self.args {
            if let ArgBinding::Call(inner) = arg {
                out.extend(inner.nested());
                out.push(inner.as_ref());
            }
        }
        out
    }

    /// Path parameters and form structs bound anywhere in this tree.
    pub fn bindings(&self) -> Vec<&ArgBinding> {
        let mut out = Vec::new();
        for arg in &self.args {
            match arg {
                ArgBinding::Call(inner) => out.extend(inner.bindings()),
                other => out.push(other),
            }
        }
        out
    }
}

/// Every method the host receiver must implement, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityInterface {
    methods: BTreeMap<String, Signature>,
}

impl CapabilityInterface {
    pub fn methods(&self) -> impl Iterator<Item = (&str, &Signature)> {
        self.methods.iter().map(|(name, sig)| (name.as_str(), sig))
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Resolves calls against a [`TypeOracle`], memoizing signatures per callee.
pub struct Resolver<'a> {
    oracle: &'a dyn TypeOracle,
    receiver: Option<String>,
    memo: BTreeMap<String, Signature>,
    interface: CapabilityInterface,
}

impl<'a> Resolver<'a> {
    pub fn new(oracle: &'a dyn TypeOracle, receiver: Option<&str>) -> Self {
        Self {
            oracle,
            receiver: receiver.map(str::to_string),
            memo: BTreeMap::new(),
            interface: CapabilityInterface::default(),
        }
    }

    /// Resolve the call of `definition` and record its parameter types.
    pub fn resolve(&mut self, definition: &mut EndpointDefinition) -> Result<(), ResolveError> {
        let mut param_types = BTreeMap::new();
        if let Some(call) = &definition.call {
            self.seed_param_types(call, definition, &mut param_types)?;
            let resolved = self.resolve_call(call, definition, &param_types)?;
            definition.resolved = Some(resolved);
        }
        definition.param_types = definition
            .params()
            .into_iter()
            .map(|name| {
                let ty = param_types.get(name).cloned().unwrap_or(HostType::String);
                (name.to_string(), ty)
            })
            .collect();
        Ok(())
    }

    pub fn finish(self) -> CapabilityInterface {
        self.interface
    }

    fn lookup(&self, callee: &str) -> Option<(CallKind, Signature)> {
        if let Some(sig) = self
            .receiver
            .as_deref()
            .and_then(|receiver| self.oracle.method(receiver, callee))
        {
            return Some((CallKind::Method, sig));
        }
        self.oracle
            .function(callee)
            .map(|f| (CallKind::Function { path: f.path }, f.signature))
    }

    /// Path parameters passed straight into bound callees take the callee's
    /// parameter type everywhere in the label.
    fn seed_param_types(
        &self,
        call: &CallExpr,
        definition: &EndpointDefinition,
        types: &mut BTreeMap<String, HostType>,
    ) -> Result<(), ResolveError> {
        let bound = self
            .lookup(&call.callee)
            .map(|(_, sig)| sig)
            .filter(|sig| sig.params.len() == call.args.len());
        for (i, arg) in call.args.iter().enumerate() {
            match arg {
                CallArg::Call(inner) => self.seed_param_types(inner, definition, types)?,
                CallArg::Ident(name) if definition.is_param(name) => {
                    let Some(sig) = &bound else { continue };
                    let ty = sig.params[i].ty.clone();
                    match types.get(name) {
                        Some(first) if *first != ty => {
                            return Err(ResolveError::ConflictingParamType {
                                name: name.clone(),
                                first: first.clone(),
                                second: ty,
                            });
                        }
                        _ => {
                            types.insert(name.clone(), ty);
                        }
                    }
                }
                CallArg::Ident(_) => {}
            }
        }
        Ok(())
    }

    fn resolve_call(
        &mut self,
        call: &CallExpr,
        definition: &EndpointDefinition,
        param_types: &BTreeMap<String, HostType>,
    ) -> Result<ResolvedCall, ResolveError> {
        let mut nested = BTreeMap::new();
        for (i, arg) in call.args.iter().enumerate() {
            if let CallArg::Call(inner) = arg {
                nested.insert(i, self.resolve_call(inner, definition, param_types)?);
            }
        }

        let (kind, signature, args) = match self.lookup(&call.callee) {
            Some((kind, signature)) => {
                if signature.params.len() != call.args.len() {
                    let expected: Vec<String> =
                        signature.params.iter().map(|p| p.ty.rust_type()).collect();
                    return Err(ResolveError::ArgumentCount {
                        expected: format!("{}({})", call.callee, expected.join(", ")),
                        actual: call.to_string(),
                    });
                }
                let mut args = Vec::with_capacity(call.args.len());
                for (i, arg) in call.args.iter().enumerate() {
                    let expected = &signature.params[i].ty;
                    args.push(self.bind(call, i, arg, expected, &mut nested)?);
                }
                (kind, signature, args)
            }
            None => {
                let (signature, args) = self.synthesize(call, definition, param_types, &mut nested)?;
                (CallKind::Synthesized, signature, args)
            }
        };

        match self.memo.get(&call.callee) {
            Some(first) if !first.same_shape(&signature) => {
                return Err(ResolveError::ConflictingSignature {
                    callee: call.callee.clone(),
                    first: first.to_string(),
                    second: signature.to_string(),
                });
            }
            Some(_) => {}
            None => {
                debug!(callee = %call.callee, signature = %signature, kind = ?kind, "resolved call");
                self.memo.insert(call.callee.clone(), signature.clone());
            }
        }
        if !matches!(kind, CallKind::Function { .. }) {
            self.interface
                .methods
                .entry(call.callee.clone())
                .or_insert_with(|| signature.clone());
        }

        let value_has_status = self
            .oracle
            .implements(signature.result.value(), Capability::Status);
        let error_has_status = match &signature.result {
            ResultShape::WithError(_, err) => self.oracle.implements(err, Capability::Status),
            _ => false,
        };

        Ok(ResolvedCall {
            callee: call.callee.clone(),
            kind,
            signature,
            args,
            text: call.to_string(),
            value_has_status,
            error_has_status,
        })
    }

    fn bind(
        &self,
        call: &CallExpr,
        index: usize,
        arg: &CallArg,
        expected: &HostType,
        nested: &mut BTreeMap<usize, ResolvedCall>,
    ) -> Result<ArgBinding, ResolveError> {
        let mismatch = |arg: String, found: HostType| ResolveError::ArgumentType {
            call: call.to_string(),
            index,
            arg,
            expected: expected.clone(),
            found,
        };

        let name = match arg {
            CallArg::Call(inner) => {
                let Some(resolved) = nested.remove(&index) else {
                    return Err(mismatch(inner.to_string(), HostType::Unit));
                };
                let found = resolved.signature.result.value().clone();
                if found != *expected && *expected != HostType::Any {
                    return Err(mismatch(inner.to_string(), found));
                }
                return Ok(ArgBinding::Call(Box::new(resolved)));
            }
            CallArg::Ident(name) => name,
        };

        match ScopeName::from_ident(name) {
            Some(ScopeName::Form) => self.bind_form(expected),
            Some(scope) => {
                let found = scope.default_type();
                if found != *expected {
                    return Err(mismatch(name.clone(), found));
                }
                Ok(match scope {
                    ScopeName::Context => ArgBinding::Context,
                    ScopeName::Request => ArgBinding::Request,
                    _ => ArgBinding::Response,
                })
            }
            None => {
                self.check_decodable(name, expected)?;
                Ok(ArgBinding::PathParam {
                    name: name.clone(),
                    ty: expected.clone(),
                })
            }
        }
    }

    fn bind_form(&self, expected: &HostType) -> Result<ArgBinding, ResolveError> {
        let type_name = match expected {
            HostType::Form => return Ok(ArgBinding::FormValues),
            HostType::Named(name) => name,
            other => return Err(ResolveError::FormType { ty: other.clone() }),
        };
        let Some(defs) = self.oracle.struct_fields(type_name) else {
            return Err(ResolveError::FormType {
                ty: expected.clone(),
            });
        };

        let mut fields = Vec::with_capacity(defs.len());
        for field in defs {
            let (ty, many) = match field.ty {
                HostType::Vec(inner) => (*inner, true),
                ty => (ty, false),
            };
            if !self.is_decodable(&ty) {
                return Err(ResolveError::UnsupportedFieldType {
                    ty: type_name.clone(),
                    field: field.name,
                    field_ty: ty,
                });
            }
            fields.push(FormField {
                name: field.name,
                form_name: field.form_name,
                ty,
                many,
            });
        }
        Ok(ArgBinding::FormStruct {
            type_name: type_name.clone(),
            fields,
        })
    }

    fn synthesize(
        &self,
        call: &CallExpr,
        definition: &EndpointDefinition,
        param_types: &BTreeMap<String, HostType>,
        nested: &mut BTreeMap<usize, ResolvedCall>,
    ) -> Result<(Signature, Vec<ArgBinding>), ResolveError> {
        let mut params: Vec<Param> = Vec::with_capacity(call.args.len());
        let mut args = Vec::with_capacity(call.args.len());

        for (i, arg) in call.args.iter().enumerate() {
            let (name, ty, binding) = match arg {
                CallArg::Call(_) => {
                    let Some(resolved) = nested.remove(&i) else {
                        continue;
                    };
                    let ty = resolved.signature.result.value().clone();
                    (None, ty, ArgBinding::Call(Box::new(resolved)))
                }
                CallArg::Ident(name) => match ScopeName::from_ident(name) {
                    Some(scope) => {
                        let binding = match scope {
                            ScopeName::Context => ArgBinding::Context,
                            ScopeName::Request => ArgBinding::Request,
                            ScopeName::Response => ArgBinding::Response,
                            ScopeName::Form => ArgBinding::FormValues,
                        };
                        (Some(name.clone()), scope.default_type(), binding)
                    }
                    None if definition.is_param(name) => {
                        let ty = param_types.get(name).cloned().unwrap_or(HostType::String);
                        self.check_decodable(name, &ty)?;
                        let binding = ArgBinding::PathParam {
                            name: name.clone(),
                            ty: ty.clone(),
                        };
                        (Some(name.clone()), ty, binding)
                    }
                    None => continue,
                },
            };
            let taken = params.iter().any(|p| p.name.is_some() && p.name == name);
            params.push(Param::new(if taken { None } else { name }, ty));
            args.push(binding);
        }

        let signature = Signature {
            params,
            result: ResultShape::Single(HostType::Any),
        };
        Ok((signature, args))
    }

    fn is_decodable(&self, ty: &HostType) -> bool {
        ty.is_scalar() || self.oracle.implements(ty, Capability::TextDecode)
    }

    fn check_decodable(&self, name: &str, ty: &HostType) -> Result<(), ResolveError> {
        if self.is_decodable(ty) {
            Ok(())
        } else {
            Err(ResolveError::UnsupportedParamType {
                name: name.to_string(),
                ty: ty.clone(),
            })
        }
    }
}

/// Resolve every definition, collecting all issues before failing.
pub fn resolve_definitions(
    definitions: &mut [EndpointDefinition],
    oracle: &dyn TypeOracle,
    receiver: Option<&str>,
) -> Result<CapabilityInterface, Error> {
    let mut resolver = Resolver::new(oracle, receiver);
    let mut issues = Vec::new();
    for definition in definitions.iter_mut() {
        if let Err(source) = resolver.resolve(definition) {
            issues.push(Error::Resolve {
                location: definition.location.clone(),
                label: definition.label.clone(),
                source,
            });
        }
    }
    Error::from_issues(issues)?;
    let interface = resolver.finish();
    debug!(methods = interface.len(), "resolved capability interface");
    Ok(interface)
}
