use std::fmt;

/// One node of a fragment's render-instruction tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal markup copied to the output.
    Text(String),
    /// `{{ expr }}`
    Output(Expr),
    /// `{% if %}` with any number of `{% elif %}` branches and an optional `{% else %}`.
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    /// `{% for a, b in expr %}` with an optional `{% else %}` for empty iterations.
    For {
        targets: Vec<String>,
        iter: Expr,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    /// `{% with name = expr %}`
    With {
        name: String,
        value: Expr,
        body: Vec<Node>,
    },
    /// `{% include "name" [with expr] %}`; without an argument the current data is passed.
    Include { name: String, arg: Option<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Expressions that can appear inside a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `data`, the per-request data carrier.
    Root,
    /// A variable bound by `for` or `with`, or any other free name.
    Var(String),
    /// `recv.name`
    Field { recv: Box<Expr>, name: String },
    /// `recv.name(args)`
    Method {
        recv: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `name(args)`, a function supplied by the renderer.
    Call { func: String, args: Vec<Expr> },
    Literal(Literal),
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// The first accessor applied to the root data carrier, if this
    /// expression is an access chain that starts at the root.
    ///
    /// `is_root` decides whether a variable aliases the root.
    pub fn root_accessor<'a>(&'a self, is_root: &dyn Fn(&Expr) -> bool) -> Option<&'a str> {
        match self {
            Expr::Field { recv, name } | Expr::Method { recv, name, .. } => {
                if is_root(recv) {
                    Some(name)
                } else {
                    recv.root_accessor(is_root)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Root => write!(f, "data"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Field { recv, name } => write!(f, "{recv}.{name}"),
            Expr::Method { recv, name, args } => {
                write!(f, "{recv}.{name}")?;
                write_args(f, args)
            }
            Expr::Call { func, args } => {
                write!(f, "{func}")?;
                write_args(f, args)
            }
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Unary { op: UnaryOp::Not, expr } => write!(f, "not {expr}"),
            Expr::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{expr}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}
