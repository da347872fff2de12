//! Markup parser for fragment source units.
//!
//! Splits a source into text, `{{ … }}` outputs and `{% … %}` tags, then
//! builds the render-instruction tree of every `{% fragment %}` declaration.

use super::ast::{BinaryOp, Expr, Literal, Node, UnaryOp};
use super::{Fragment, TemplateError};
use crate::error::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
enum Chunk {
    Text(String),
    Output { content: String, line: usize },
    Tag { content: String, line: usize },
}

/// Parse every fragment declared in `source`.
pub fn parse_source(group: &str, source: &str) -> Result<Vec<Fragment>, TemplateError> {
    let chunks = scan(group, source)?;
    let mut parser = Parser {
        group,
        chunks,
        pos: 0,
    };
    parser.parse_fragments()
}

/// Parse a fragment body without a surrounding declaration.
pub fn parse_body(group: &str, source: &str) -> Result<Vec<Node>, TemplateError> {
    let chunks = scan(group, source)?;
    let mut parser = Parser {
        group,
        chunks,
        pos: 0,
    };
    let (nodes, end) = parser.parse_nodes(&[])?;
    if let Some((keyword, line)) = end {
        return Err(parser.error(line, format!("unexpected {{% {keyword} %}}")));
    }
    Ok(nodes)
}

fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Find the closing delimiter of a tag, skipping quoted strings.
fn find_close(source: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if bytes[i..].starts_with(close.as_bytes()) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn scan(group: &str, source: &str) -> Result<Vec<Chunk>, TemplateError> {
    let mut chunks = Vec::new();
    let mut rest_start = 0;
    let mut trim_next = false;

    while rest_start < source.len() {
        let rest = &source[rest_start..];
        let open = ["{{", "{%", "{#"]
            .iter()
            .filter_map(|d| rest.find(d).map(|i| (i, *d)))
            .min_by_key(|(i, _)| *i);

        let Some((rel, delim)) = open else {
            push_text(&mut chunks, rest, trim_next, false);
            break;
        };

        let start = rest_start + rel;
        let inner_start = start + 2;
        let trim_before = source[inner_start..].starts_with('-');
        push_text(&mut chunks, &rest[..rel], trim_next, trim_before);

        let line = line_at(source, start);
        let close = match delim {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let end = if delim == "{#" {
            source[inner_start..].find(close).map(|i| inner_start + i)
        } else {
            find_close(source, inner_start, close)
        };
        let Some(end) = end else {
            return Err(TemplateError::Syntax {
                location: SourceLocation::new(group, line),
                message: format!("unclosed {delim}"),
            });
        };

        let mut content = &source[inner_start..end];
        if let Some(stripped) = content.strip_prefix('-') {
            content = stripped;
        }
        trim_next = content.ends_with('-');
        if trim_next {
            content = &content[..content.len() - 1];
        }
        let content = content.trim().to_string();

        match delim {
            "{{" => chunks.push(Chunk::Output { content, line }),
            "{%" => chunks.push(Chunk::Tag { content, line }),
            _ => {}
        }
        rest_start = end + close.len();
    }
    Ok(chunks)
}

fn push_text(chunks: &mut Vec<Chunk>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        chunks.push(Chunk::Text(text.to_string()));
    }
}

struct Parser<'a> {
    group: &'a str,
    chunks: Vec<Chunk>,
    pos: usize,
}

type BlockEnd = Option<(String, usize)>;

impl Parser<'_> {
    fn error(&self, line: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            location: SourceLocation::new(self.group, line),
            message: message.into(),
        }
    }

    fn parse_fragments(&mut self) -> Result<Vec<Fragment>, TemplateError> {
        let mut fragments = Vec::new();
        while self.pos < self.chunks.len() {
            let chunk = self.chunks[self.pos].clone();
            self.pos += 1;
            match chunk {
                Chunk::Text(_) => {}
                Chunk::Output { line, .. } => {
                    return Err(self.error(line, "output outside of a fragment declaration"));
                }
                Chunk::Tag { content, line } => {
                    let (keyword, rest) = split_keyword(&content);
                    if keyword != "fragment" {
                        return Err(self.error(
                            line,
                            format!("expected {{% fragment \"…\" %}}, found {{% {keyword} %}}"),
                        ));
                    }
                    let name = self.parse_quoted(rest, line)?;
                    let (body, end) = self.parse_nodes(&["endfragment"])?;
                    if end.is_none() {
                        return Err(self.error(line, format!("fragment {name:?} is never closed")));
                    }
                    fragments.push(Fragment {
                        name,
                        location: SourceLocation::new(self.group, line),
                        body,
                    });
                }
            }
        }
        Ok(fragments)
    }

    fn parse_quoted(&self, text: &str, line: usize) -> Result<String, TemplateError> {
        let mut lexer = Lexer::new(text);
        match lexer.next_token() {
            Ok(Some(Token::Str(s))) => {
                if lexer.next_token().ok().flatten().is_some() {
                    return Err(self.error(line, "unexpected tokens after name"));
                }
                Ok(s)
            }
            _ => Err(self.error(line, "expected a quoted name")),
        }
    }

    /// Parse nodes until one of `terminators` (or the end of input when empty).
    fn parse_nodes(&mut self, terminators: &[&str]) -> Result<(Vec<Node>, BlockEnd), TemplateError> {
        let mut nodes = Vec::new();
        while self.pos < self.chunks.len() {
            let chunk = self.chunks[self.pos].clone();
            self.pos += 1;
            match chunk {
                Chunk::Text(text) => nodes.push(Node::Text(text)),
                Chunk::Output { content, line } => {
                    nodes.push(Node::Output(self.parse_expr(&content, line)?));
                }
                Chunk::Tag { content, line } => {
                    let (keyword, rest) = split_keyword(&content);
                    if terminators.contains(&keyword) {
                        return Ok((nodes, Some((content, line))));
                    }
                    match keyword {
                        "if" => nodes.push(self.parse_if(rest, line)?),
                        "for" => nodes.push(self.parse_for(rest, line)?),
                        "with" => nodes.push(self.parse_with(rest, line)?),
                        "include" => nodes.push(self.parse_include(rest, line)?),
                        other => {
                            return Err(self.error(line, format!("unexpected {{% {other} %}}")));
                        }
                    }
                }
            }
        }
        if terminators.is_empty() {
            Ok((nodes, None))
        } else {
            Err(self.error(
                self.last_line(),
                format!("unexpected end of input, expected {{% {} %}}", terminators.join(" | ")),
            ))
        }
    }

    fn last_line(&self) -> usize {
        self.chunks
            .iter()
            .rev()
            .find_map(|c| match c {
                Chunk::Tag { line, .. } | Chunk::Output { line, .. } => Some(*line),
                Chunk::Text(_) => None,
            })
            .unwrap_or(1)
    }

    fn parse_if(&mut self, cond: &str, line: usize) -> Result<Node, TemplateError> {
        let mut branches = vec![];
        let mut otherwise = vec![];
        let mut cond = self.parse_expr(cond, line)?;
        loop {
            let (body, end) = self.parse_nodes(&["elif", "else", "endif"])?;
            branches.push((cond, body));
            let Some((tag, tag_line)) = end else { break };
            let (keyword, rest) = split_keyword(&tag);
            match keyword {
                "elif" => cond = self.parse_expr(rest, tag_line)?,
                "else" => {
                    let (body, _) = self.parse_nodes(&["endif"])?;
                    otherwise = body;
                    break;
                }
                _ => break,
            }
        }
        Ok(Node::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self, header: &str, line: usize) -> Result<Node, TemplateError> {
        let Some((targets, iter)) = header.split_once(" in ") else {
            return Err(self.error(line, "expected {% for name in expr %}"));
        };
        let targets: Vec<String> = targets.split(',').map(|t| t.trim().to_string()).collect();
        if targets.iter().any(|t| !is_identifier(t)) {
            return Err(self.error(line, format!("invalid loop variable in {header:?}")));
        }
        let iter = self.parse_expr(iter, line)?;
        let (body, end) = self.parse_nodes(&["else", "endfor"])?;
        let mut otherwise = vec![];
        if let Some((tag, _)) = end {
            if split_keyword(&tag).0 == "else" {
                otherwise = self.parse_nodes(&["endfor"])?.0;
            }
        }
        Ok(Node::For {
            targets,
            iter,
            body,
            otherwise,
        })
    }

    fn parse_with(&mut self, header: &str, line: usize) -> Result<Node, TemplateError> {
        let Some((name, value)) = header.split_once('=') else {
            return Err(self.error(line, "expected {% with name = expr %}"));
        };
        let name = name.trim();
        if !is_identifier(name) {
            return Err(self.error(line, format!("invalid variable name {name:?}")));
        }
        let value = self.parse_expr(value, line)?;
        let (body, _) = self.parse_nodes(&["endwith"])?;
        Ok(Node::With {
            name: name.to_string(),
            value,
            body,
        })
    }

    fn parse_include(&mut self, header: &str, line: usize) -> Result<Node, TemplateError> {
        let mut lexer = Lexer::new(header);
        let name = match lexer.next_token() {
            Ok(Some(Token::Str(s))) => s,
            _ => return Err(self.error(line, "expected {% include \"name\" %}")),
        };
        let rest = lexer.remaining().trim();
        let arg = if rest.is_empty() {
            None
        } else if let Some(expr) = rest.strip_prefix("with ") {
            Some(self.parse_expr(expr, line)?)
        } else {
            return Err(self.error(line, format!("unexpected {rest:?} after include name")));
        };
        Ok(Node::Include { name, arg })
    }

    fn parse_expr(&self, text: &str, line: usize) -> Result<Expr, TemplateError> {
        let tokens = Lexer::new(text)
            .collect_tokens()
            .map_err(|message| self.error(line, message))?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(|message| self.error(line, message))?;
        if parser.pos != parser.tokens.len() {
            return Err(self.error(line, format!("unexpected trailing input in {text:?}")));
        }
        Ok(expr)
    }
}

fn split_keyword(content: &str) -> (&str, &str) {
    match content.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (content, ""),
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    LParen,
    RParen,
    Minus,
    Op(BinaryOp),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn collect_tokens(mut self) -> Result<Vec<Token>, String> {
        let mut out = Vec::new();
        while let Some(token) = self.next_token()? {
            out.push(token);
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        let Some(c) = trimmed.chars().next() else {
            return Ok(None);
        };

        let two = trimmed.get(..2).unwrap_or("");
        let (token, len) = match c {
            '.' => (Token::Dot, 1),
            ',' => (Token::Comma, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '-' => (Token::Minus, 1),
            '=' if two == "==" => (Token::Op(BinaryOp::Eq), 2),
            '!' if two == "!=" => (Token::Op(BinaryOp::Ne), 2),
            '<' if two == "<=" => (Token::Op(BinaryOp::Le), 2),
            '>' if two == ">=" => (Token::Op(BinaryOp::Ge), 2),
            '<' => (Token::Op(BinaryOp::Lt), 1),
            '>' => (Token::Op(BinaryOp::Gt), 1),
            '"' | '\'' => return self.lex_string(c).map(Some),
            c if c.is_ascii_digit() => return self.lex_number().map(Some),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = trimmed
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(trimmed.len());
                let word = &trimmed[..len];
                let token = match word {
                    "and" => Token::Op(BinaryOp::And),
                    "or" => Token::Op(BinaryOp::Or),
                    _ => Token::Ident(word.to_string()),
                };
                (token, len)
            }
            other => return Err(format!("unexpected character {other:?}")),
        };
        self.pos += len;
        Ok(Some(token))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, String> {
        let body = &self.remaining()[1..];
        let mut out = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c if c == quote => {
                    self.pos += 1 + i + c.len_utf8();
                    return Ok(Token::Str(out));
                }
                c => out.push(c),
            }
        }
        Err("unterminated string literal".to_string())
    }

    fn lex_number(&mut self) -> Result<Token, String> {
        let rest = self.remaining();
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let text = &rest[..len];
        self.pos += len;
        if text.contains('.') {
            text.parse()
                .map(Token::Float)
                .map_err(|_| format!("invalid number {text:?}"))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| format!("invalid number {text:?}"))
        }
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.bump() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(format!("expected {expected:?}, found {t:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Op(BinaryOp::Or)) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some(&Token::Op(BinaryOp::And)) {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == "not") {
            self.pos += 1;
            let expr = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_unary()?;
        match self.peek() {
            Some(Token::Op(op))
                if !matches!(op, BinaryOp::And | BinaryOp::Or) =>
            {
                let op = *op;
                self.pos += 1;
                let rhs = self.parse_unary()?;
                Ok(binary(op, lhs, rhs))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.bump() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected a name after '.', found {other:?}")),
            };
            if self.peek() == Some(&Token::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Method {
                    recv: Box::new(expr),
                    name,
                    args,
                };
            } else {
                expr = Expr::Field {
                    recv: Box::new(expr),
                    name,
                };
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Ident(name)) => match name.as_str() {
                "data" => Ok(Expr::Root),
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                _ if self.peek() == Some(&Token::LParen) => {
                    let args = self.parse_args()?;
                    Ok(Expr::Call { func: name, args })
                }
                _ => Ok(Expr::Var(name)),
            },
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::Int(n)) => Ok(Expr::Literal(Literal::Int(n))),
            Some(Token::Float(n)) => Ok(Expr::Literal(Literal::Float(n))),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(other) => Err(format!("unexpected {other:?}")),
            None => Err("empty expression".to_string()),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, String> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => return Err(format!("expected ',' or ')', found {other:?}")),
            }
        }
        Ok(args)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
