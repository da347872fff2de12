//! # Router Module
//!
//! Matches concrete requests against endpoint definitions.
//!
//! The generated code leaves routing to the host's multiplexer; this module
//! exists so the generator can answer "which definition serves
//! `GET /user/42`?" itself. The CLI uses it for `routes --match`, and the
//! tests use it to check that URL builders produce paths their own pattern
//! accepts.
//!
//! ## Matching rules
//!
//! - `{name}` matches one non-empty segment, `{name...}` matches the rest
//!   of the path (possibly empty).
//! - A trailing `/` matches the whole subtree below it; `{$}` matches only
//!   the path ending in that slash.
//! - A definition without a method matches every method; one without a
//!   host matches every host.
//! - When several definitions match, the most specific wins: host-specific
//!   over host-less, exact paths over subtrees and wildcards, more literal
//!   segments over fewer, and method-specific over any-method.
//!
//! ## Example
//!
//! ```rust,ignore
//! let router = Router::new(&definitions)?;
//! if let Some(m) = router.route(&Method::GET, "", "/user/42") {
//!     println!("{} id={}", m.definition.identifier, m.path_params["id"]);
//! }
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{PathMatcher, RouteMatch, Router};
