use std::fmt;

use super::{DefinitionError, RUST_KEYWORDS};
use crate::template::is_identifier;

/// `Callee(arg, Nested(arg))` from the tail of a route label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Ident(String),
    Call(CallExpr),
}

/// Position of an argument inside a call tree: one index per nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgPath(pub Vec<usize>);

impl ArgPath {
    pub fn child(&self, index: usize) -> ArgPath {
        let mut path = self.0.clone();
        path.push(index);
        ArgPath(path)
    }
}

impl fmt::Display for ArgPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

impl CallExpr {
    /// Parse a call expression. Only identifiers and nested calls are
    /// accepted as arguments.
    pub fn parse(text: &str) -> Result<CallExpr, DefinitionError> {
        let mut parser = CallParser { text, pos: 0 };
        let call = parser.call()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("unexpected text after call"));
        }
        Ok(call)
    }

    /// Every identifier argument with its position, depth first.
    pub fn idents(&self) -> Vec<(&str, ArgPath)> {
        let mut out = Vec::new();
        self.collect_idents(&ArgPath::default(), &mut out);
        out
    }

    fn collect_idents<'a>(&'a self, at: &ArgPath, out: &mut Vec<(&'a str, ArgPath)>) {
        for (i, arg) in self.args.iter().enumerate() {
            match arg {
                CallArg::Ident(name) => out.push((name, at.child(i))),
                CallArg::Call(inner) => inner.collect_idents(&at.child(i), out),
            }
        }
    }

    /// Whether `name` is passed anywhere in the tree.
    pub fn uses(&self, name: &str) -> bool {
        self.idents().iter().any(|(ident, _)| *ident == name)
    }

    /// The call at `path`, where the empty path is `self`.
    pub fn call_at(&self, path: &ArgPath) -> Option<&CallExpr> {
        let mut call = self;
        for &index in &path.0 {
            match call.args.get(index)? {
                CallArg::Call(inner) => call = inner,
                CallArg::Ident(_) => return None,
            }
        }
        Some(call)
    }
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.callee)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match arg {
                CallArg::Ident(name) => write!(f, "{name}")?,
                CallArg::Call(inner) => write!(f, "{inner}")?,
            }
        }
        write!(f, ")")
    }
}

struct CallParser<'a> {
    text: &'a str,
    pos: usize,
}

impl CallParser<'_> {
    fn error(&self, message: &str) -> DefinitionError {
        DefinitionError::CallSyntax {
            call: self.text.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String, DefinitionError> {
        self.skip_ws();
        let rest = &self.text[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..len];
        if !is_identifier(word) || RUST_KEYWORDS.contains(&word) {
            return Err(self.error("expected an identifier"));
        }
        self.pos += len;
        Ok(word.to_string())
    }

    fn call(&mut self) -> Result<CallExpr, DefinitionError> {
        let callee = self.ident()?;
        if !self.eat('(') {
            return Err(self.error("expected '(' after callee"));
        }
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(CallExpr { callee, args });
        }
        loop {
            args.push(self.arg()?);
            if self.eat(',') {
                continue;
            }
            if self.eat(')') {
                break;
            }
            return Err(self.error("expected ',' or ')'"));
        }
        Ok(CallExpr { callee, args })
    }

    fn arg(&mut self) -> Result<CallArg, DefinitionError> {
        let start = self.pos;
        let name = self.ident()?;
        if self.eat('(') {
            self.pos = start;
            return self.call().map(CallArg::Call);
        }
        Ok(CallArg::Ident(name))
    }
}
