//! Can rendering a fragment divert the response into a redirect?
//!
//! The answer is conservative. Anything the walk cannot prove harmless
//! counts as a possible redirect: calling `redirect`, calling any data
//! accessor outside [`SAFE_ACCESSORS`], handing the data carrier to a
//! function or method, and including a fragment that is itself
//! redirect-capable or unknown.

use std::collections::HashSet;

use crate::template::{Expr, FragmentSet, Node};

/// Data-carrier accessors that cannot redirect.
pub const SAFE_ACCESSORS: &[&str] = &[
    "result", "err", "errors", "request", "receiver", "status", "header", "path",
];

/// Whether the fragment named `name` can reach a redirect.
///
/// `visited` holds fragments already on the walk; revisiting one adds
/// nothing, which keeps cyclic includes finite.
pub fn fragment_can_redirect(
    name: &str,
    fragments: &FragmentSet,
    visited: &mut HashSet<String>,
) -> bool {
    if !visited.insert(name.to_string()) {
        return false;
    }
    match fragments.get(name) {
        Some(fragment) => nodes_can_redirect(&fragment.body, &Scope::root(), fragments, visited),
        None => true,
    }
}

/// Names bound to the data carrier in the current block.
#[derive(Debug, Clone, Default)]
struct Scope {
    aliases: HashSet<String>,
}

impl Scope {
    fn root() -> Self {
        Self::default()
    }

    fn is_root(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Root => true,
            Expr::Var(name) => self.aliases.contains(name),
            _ => false,
        }
    }

    fn with_alias(&self, name: &str, aliased: bool) -> Self {
        let mut scope = self.clone();
        if aliased {
            scope.aliases.insert(name.to_string());
        } else {
            scope.aliases.remove(name);
        }
        scope
    }
}

fn nodes_can_redirect(
    nodes: &[Node],
    scope: &Scope,
    fragments: &FragmentSet,
    visited: &mut HashSet<String>,
) -> bool {
    nodes
        .iter()
        .any(|node| node_can_redirect(node, scope, fragments, visited))
}

fn node_can_redirect(
    node: &Node,
    scope: &Scope,
    fragments: &FragmentSet,
    visited: &mut HashSet<String>,
) -> bool {
    match node {
        Node::Text(_) => false,
        Node::Output(expr) => expr_can_redirect(expr, scope),
        Node::If {
            branches,
            otherwise,
        } => {
            branches.iter().any(|(cond, body)| {
                expr_can_redirect(cond, scope)
                    || nodes_can_redirect(body, scope, fragments, visited)
            }) || nodes_can_redirect(otherwise, scope, fragments, visited)
        }
        Node::For {
            targets,
            iter,
            body,
            otherwise,
        } => {
            if expr_can_redirect(iter, scope) {
                return true;
            }
            let inner = targets
                .iter()
                .fold(scope.clone(), |s, target| s.with_alias(target, false));
            nodes_can_redirect(body, &inner, fragments, visited)
                || nodes_can_redirect(otherwise, scope, fragments, visited)
        }
        Node::With { name, value, body } => {
            if expr_can_redirect(value, scope) {
                return true;
            }
            let inner = scope.with_alias(name, scope.is_root(value));
            nodes_can_redirect(body, &inner, fragments, visited)
        }
        Node::Include { name, arg } => {
            if arg.as_ref().is_some_and(|a| expr_can_redirect(a, scope)) {
                return true;
            }
            fragment_can_redirect(name, fragments, visited)
        }
    }
}

fn expr_can_redirect(expr: &Expr, scope: &Scope) -> bool {
    match expr {
        Expr::Root | Expr::Var(_) | Expr::Literal(_) => false,
        Expr::Field { recv, name } => {
            (scope.is_root(recv) && !SAFE_ACCESSORS.contains(&name.as_str()))
                || expr_can_redirect(recv, scope)
        }
        Expr::Method { recv, name, args } => {
            if scope.is_root(recv) && !SAFE_ACCESSORS.contains(&name.as_str()) {
                return true;
            }
            expr_can_redirect(recv, scope) || args_can_redirect(args, scope)
        }
        Expr::Call { args, .. } => args_can_redirect(args, scope),
        Expr::Unary { expr, .. } => expr_can_redirect(expr, scope),
        Expr::Binary { lhs, rhs, .. } => {
            expr_can_redirect(lhs, scope) || expr_can_redirect(rhs, scope)
        }
    }
}

/// Passing the data carrier anywhere counts as a possible redirect.
fn args_can_redirect(args: &[Expr], scope: &Scope) -> bool {
    args.iter()
        .any(|arg| scope.is_root(arg) || expr_can_redirect(arg, scope))
}
