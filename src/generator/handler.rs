//! Emits the body of one dispatch closure.
//!
//! The closure runs inside `routes` with `receiver: Arc<R>`,
//! `templates: Arc<V>`, `config: Arc<RoutesConfig>` captured and
//! `request: &Request`, `response: &mut dyn ResponseWriter` as arguments.
//! Binding and invocation live in a `'dispatch` block so any failure can
//! jump straight to rendering with the errors collected so far.

use std::collections::{HashMap, HashSet};

use super::convert::{conversion, Conversion};
use super::source::Source;
use super::validation::emit_guards;
use super::GenerateError;
use crate::analysis::InputConstraint;
use crate::definition::EndpointDefinition;
use crate::resolve::{ArgBinding, CallKind, FormField, ResolvedCall};
use crate::types::{HostType, ResultShape};

/// Indentation of the closure body inside the emitted `routes` function.
const BODY_INDENT: usize = 4;

pub(crate) fn emit_handler(definition: &EndpointDefinition) -> Result<String, GenerateError> {
    HandlerEmitter::new(definition).emit()
}

struct HandlerEmitter<'a> {
    definition: &'a EndpointDefinition,
    out: Source,
    /// Remaining uses of each non-`Copy` binding, keyed by local name.
    uses: HashMap<String, usize>,
    /// Form struct type names and their locals, in binding order.
    forms: Vec<(String, String)>,
    next_call: usize,
}

impl<'a> HandlerEmitter<'a> {
    fn new(definition: &'a EndpointDefinition) -> Self {
        Self {
            definition,
            out: Source::with_indent(BODY_INDENT),
            uses: HashMap::new(),
            forms: Vec::new(),
            next_call: 0,
        }
    }

    fn emit(mut self) -> Result<String, GenerateError> {
        let definition = self.definition;
        self.out.line("let receiver: &R = &*receiver;");
        let Some(call) = &definition.resolved else {
            self.out.line("let errors: Vec<Error> = Vec::new();");
            self.out.line("let error_status: Option<u16> = None;");
            self.out.line("let result: Option<()> = Some(());");
            self.emit_response(false);
            return Ok(self.out.finish());
        };

        self.out.line("let mut errors: Vec<Error> = Vec::new();");
        self.out.line("let mut error_status: Option<u16> = None;");
        self.out.line(format!(
            "let mut result: Option<{}> = None;",
            call.signature.result.value().rust_type()
        ));
        self.out.open("'dispatch: {");
        self.emit_scope(call);
        self.emit_bindings(call)?;
        self.count_uses(call);
        self.emit_call(call, true);
        self.out.close("}");
        self.emit_response(call.value_has_status);
        Ok(self.out.finish())
    }

    /// Reserved-scope values the call tree needs.
    fn emit_scope(&mut self, call: &ResolvedCall) {
        let bindings = call.bindings();
        if bindings.iter().any(|b| matches!(b, ArgBinding::Context)) {
            self.out.line("let ctx = request.context();");
        }
        if bindings
            .iter()
            .any(|b| matches!(b, ArgBinding::FormValues | ArgBinding::FormStruct { .. }))
        {
            self.out.line("let form = request.form();");
        }
    }

    /// Convert path parameters and build form structs, left to right.
    fn emit_bindings(&mut self, call: &ResolvedCall) -> Result<(), GenerateError> {
        let definition = self.definition;
        let mut pending = Vec::new();
        let mut fallible = false;
        let mut params = HashSet::new();
        let mut structs: Vec<(String, &[FormField])> = Vec::new();

        for binding in call.bindings() {
            match binding {
                ArgBinding::PathParam { name, ty } if params.insert(name.as_str()) => {
                    let local = format!("path_{name}");
                    let text = format!("request.path_value({name:?})");
                    fallible |= self.emit_value(&local, name, &text, ty, None)?;
                    pending.push(local);
                }
                ArgBinding::FormStruct { type_name, fields }
                    if !self.forms.iter().any(|(ty, _)| ty == type_name) =>
                {
                    let local = format!("form_{}", self.forms.len());
                    self.forms.push((type_name.clone(), local.clone()));
                    for field in fields {
                        let field_local = format!("{local}_{}", field.name);
                        let constraint = definition.constraints.get(&field.form_name);
                        if field.many {
                            fallible |= self.emit_many(&field_local, field, constraint)?;
                        } else {
                            let text = format!("form.value({:?}).unwrap_or(\"\")", field.form_name);
                            fallible |= self.emit_value(
                                &field_local,
                                &field.form_name,
                                &text,
                                &field.ty,
                                constraint,
                            )?;
                            pending.push(field_local);
                        }
                    }
                    structs.push((type_name.clone(), fields.as_slice()));
                }
                _ => {}
            }
        }

        if fallible {
            self.out.open("if !errors.is_empty() {");
            self.out.line("error_status = Some(400);");
            self.out.line("break 'dispatch;");
            self.out.close("}");
        }
        match pending.as_slice() {
            [] => {}
            [single] => self
                .out
                .line(format!("let Some({single}) = {single} else {{ break 'dispatch; }};")),
            many => {
                let patterns: Vec<String> = many.iter().map(|l| format!("Some({l})")).collect();
                self.out.line(format!(
                    "let ({}) = ({}) else {{ break 'dispatch; }};",
                    patterns.join(", "),
                    many.join(", ")
                ));
            }
        }

        for (type_name, fields) in structs {
            let local = self.form_local(&type_name);
            self.out.open(format!("let {local} = {type_name} {{"));
            for field in fields {
                self.out.line(format!("{}: {local}_{},", field.name, field.name));
            }
            self.out.close("};");
        }
        Ok(())
    }

    /// Bind one converted value as an `Option`; returns whether it can fail.
    fn emit_value(
        &mut self,
        local: &str,
        field: &str,
        text: &str,
        ty: &HostType,
        constraint: Option<&InputConstraint>,
    ) -> Result<bool, GenerateError> {
        self.out.open(format!("let {local} = {{"));
        self.out.line(format!("let text: &str = {text};"));
        let fallible = match conversion(ty, "text") {
            Conversion::Direct => {
                if let Some(constraint) = constraint {
                    emit_guards(&mut self.out, field, ty, "text", "text", constraint)?;
                }
                self.out.line("Some(text.to_string())");
                constraint.is_some_and(|c| !c.is_empty())
            }
            Conversion::Fallible(expr) => {
                self.out.open(format!("match {expr} {{"));
                self.out.open("Ok(value) => {");
                if let Some(constraint) = constraint {
                    emit_guards(&mut self.out, field, ty, "value", "text", constraint)?;
                }
                self.out.line("Some(value)");
                self.out.close("}");
                self.out.open("Err(err) => {");
                self.out
                    .line(format!("errors.push(field_error({field:?}, err));"));
                self.out.line("None");
                self.out.close("}");
                self.out.close("}");
                true
            }
        };
        self.out.close("};");
        Ok(fallible)
    }

    /// Bind every value of a sequence field into a `Vec`.
    fn emit_many(
        &mut self,
        local: &str,
        field: &FormField,
        constraint: Option<&InputConstraint>,
    ) -> Result<bool, GenerateError> {
        let name = &field.form_name;
        self.out.line(format!("let mut {local} = Vec::new();"));
        self.out.open(format!("for text in form.values({name:?}) {{"));
        let fallible = match conversion(&field.ty, "text") {
            Conversion::Direct => {
                if let Some(constraint) = constraint {
                    emit_guards(&mut self.out, name, &field.ty, "text", "text", constraint)?;
                }
                self.out.line(format!("{local}.push(text.to_string());"));
                constraint.is_some_and(|c| !c.is_empty())
            }
            Conversion::Fallible(expr) => {
                self.out.open(format!("match {expr} {{"));
                self.out.open("Ok(value) => {");
                if let Some(constraint) = constraint {
                    emit_guards(&mut self.out, name, &field.ty, "value", "text", constraint)?;
                }
                self.out.line(format!("{local}.push(value);"));
                self.out.close("}");
                self.out
                    .line(format!("Err(err) => errors.push(field_error({name:?}, err)),"));
                self.out.close("}");
                true
            }
        };
        self.out.close("}");
        Ok(fallible)
    }

    fn form_local(&self, type_name: &str) -> String {
        self.forms
            .iter()
            .find(|(ty, _)| ty == type_name)
            .map(|(_, local)| local.clone())
            .unwrap_or_default()
    }

    /// Count how often each movable binding is passed anywhere in the tree.
    fn count_uses(&mut self, call: &ResolvedCall) {
        for arg in &call.args {
            let local = match arg {
                ArgBinding::Call(inner) => {
                    self.count_uses(inner);
                    continue;
                }
                ArgBinding::PathParam { name, ty } if !ty.is_copy() => format!("path_{name}"),
                ArgBinding::FormStruct { type_name, .. } => self.form_local(type_name),
                _ => continue,
            };
            *self.uses.entry(local).or_insert(0) += 1;
        }
    }

    /// Pass a binding by value; every use but the last gets a clone.
    fn take(&mut self, local: String) -> String {
        match self.uses.get_mut(&local) {
            Some(remaining) if *remaining > 1 => {
                *remaining -= 1;
                format!("{local}.clone()")
            }
            _ => local,
        }
    }

    fn arg_expr(&mut self, binding: &ArgBinding) -> String {
        match binding {
            ArgBinding::Context => "ctx".to_string(),
            ArgBinding::Request => "request".to_string(),
            ArgBinding::Response => "&mut *response".to_string(),
            ArgBinding::FormValues => "&form".to_string(),
            ArgBinding::FormStruct { type_name, .. } => {
                let local = self.form_local(type_name);
                self.take(local)
            }
            ArgBinding::PathParam { name, ty } if ty.is_copy() => format!("path_{name}"),
            ArgBinding::PathParam { name, .. } => self.take(format!("path_{name}")),
            ArgBinding::Call(_) => String::new(),
        }
    }

    /// Emit `call` after its nested calls; returns the local holding a
    /// nested call's value.
    fn emit_call(&mut self, call: &ResolvedCall, top: bool) -> String {
        let mut nested = Vec::new();
        for arg in &call.args {
            if let ArgBinding::Call(inner) = arg {
                nested.push(self.emit_call(inner, false));
            }
        }
        let mut nested = nested.into_iter();
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            match arg {
                ArgBinding::Call(_) => args.push(nested.next().unwrap_or_default()),
                other => {
                    let expr = self.arg_expr(other);
                    args.push(expr);
                }
            }
        }

        let invocation = match &call.kind {
            CallKind::Function { path } => format!("{path}({})", args.join(", ")),
            CallKind::Method | CallKind::Synthesized => {
                format!("receiver.{}({})", call.callee, args.join(", "))
            }
        };
        let failure_status = if call.error_has_status {
            "Some(StatusCoder::status_code(&err))"
        } else {
            "Some(500)"
        };

        if top {
            match &call.signature.result {
                ResultShape::Single(_) => self.out.line(format!("result = Some({invocation});")),
                ResultShape::WithError(..) => {
                    self.out.open(format!("match {invocation} {{"));
                    self.out.line("Ok(value) => result = Some(value),");
                    self.emit_error_arm(failure_status);
                    self.out.close("}");
                }
                ResultShape::WithFlag(_) => {
                    self.out.line(format!("let (value, proceed) = {invocation};"));
                    self.emit_stop_unless_proceed();
                    self.out.line("result = Some(value);");
                }
            }
            return String::new();
        }

        let local = format!("call_{}", self.next_call);
        self.next_call += 1;
        match &call.signature.result {
            ResultShape::Single(_) => self.out.line(format!("let {local} = {invocation};")),
            ResultShape::WithError(..) => {
                self.out.open(format!("let {local} = match {invocation} {{"));
                self.out.line("Ok(value) => value,");
                self.emit_error_arm(failure_status);
                self.out.close("};");
            }
            ResultShape::WithFlag(_) => {
                self.out.line(format!("let ({local}, proceed) = {invocation};"));
                self.emit_stop_unless_proceed();
            }
        }
        local
    }

    fn emit_error_arm(&mut self, status: &str) {
        self.out.open("Err(err) => {");
        self.out.line(format!("error_status = {status};"));
        self.out.line("errors.push(err.into());");
        self.out.line("break 'dispatch;");
        self.out.close("}");
    }

    /// `false` means the callee already answered the request.
    fn emit_stop_unless_proceed(&mut self) {
        self.out.open("if !proceed {");
        self.out.line("return;");
        self.out.close("}");
    }

    /// Render the body and write the response.
    ///
    /// Headers set while rendering go out with a redirect as well.
    fn emit_response(&mut self, value_has_status: bool) {
        let definition = self.definition;
        let default_status = definition.default_status();
        self.out.line("let paths = route_paths(&config.path_prefix);");
        if value_has_status {
            self.out.line("let base_status = error_status");
            self.out
                .line("    .or_else(|| result.as_ref().map(StatusCoder::status_code))");
            self.out.line(format!("    .unwrap_or({default_status});"));
        } else {
            self.out.line(format!(
                "let base_status = error_status.unwrap_or({default_status});"
            ));
        }
        self.out.line(
            "let data = TemplateData::new(receiver, request, result, errors, paths, base_status);",
        );
        self.out.open("let body = match data.err() {");
        self.out
            .open(format!("None => match templates.render({:?}, &data) {{", definition.label));
        self.out.line("Ok(body) => body,");
        self.out.open("Err(err) => {");
        self.out.line(format!(
            "log_render_failure(&config, {:?}, &err);",
            definition.normalized_pattern()
        ));
        self.out.line("write_internal_error(response);");
        self.out.line("return;");
        self.out.close("}");
        self.out.close("},");
        self.out.open("Some(err) => {");
        self.out
            .line("set_header(response, \"content-type\", \"text/plain; charset=utf-8\");");
        self.out.line("err.to_string().into_bytes()");
        self.out.close("}");
        self.out.close("};");
        self.out.open("for (name, value) in data.response_headers() {");
        self.out.line("set_header(response, &name, &value);");
        self.out.close("}");
        if definition.can_redirect {
            self.out
                .open("if let Some((location, code)) = data.redirect_target() {");
            self.out.line("write_redirect(response, &location, code);");
            self.out.line("return;");
            self.out.close("}");
        }
        self.out.line("flush(response, data.status(), &body);");
    }
}
