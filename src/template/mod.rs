//! # Template Module
//!
//! Fragments and their render-instruction trees.
//!
//! A *fragment* is a named unit of markup. Fragments whose name is a route
//! label become endpoints; every other fragment is only reachable through
//! `{% include %}`. The engine reads the tree (control flow, includes and
//! access chains on the data carrier) but never renders it.
//!
//! ## Source syntax
//!
//! ```text
//! {% fragment "GET /user/{id} GetUser(ctx, id)" %}
//!   {% if data.err() %}{{ data.err() }}{% else %}
//!     <h1>{{ data.result().name }}</h1>
//!     {% include "user-links" %}
//!   {% endif %}
//! {% endfragment %}
//! ```
//!
//! Text outside a `{% fragment %}` declaration is ignored, so a source unit
//! may carry commentary or several fragments.

mod ast;
mod parser;

pub use ast::{BinaryOp, Expr, Literal, Node, UnaryOp};
pub use parser::{parse_body, parse_source};
pub(crate) use parser::is_identifier;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::SourceLocation;

/// File extensions recognised as fragment source units.
pub const SOURCE_EXTENSIONS: &[&str] = &["html", "tmpl", "jinja", "txt"];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{location}: {message}")]
    Syntax {
        location: SourceLocation,
        message: String,
    },
    #[error("failed to read template source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A named, renderable unit of markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub location: SourceLocation,
    pub body: Vec<Node>,
}

impl Fragment {
    /// Register a fragment programmatically; it has no source group.
    pub fn new(name: impl Into<String>, body: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::programmatic(),
            body,
        }
    }

    /// Parse `source` as the body of a programmatically registered fragment.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(name, parse_body("", source)?))
    }

    /// Group identifier of the originating source unit (empty when programmatic).
    pub fn group(&self) -> &str {
        &self.location.group
    }
}

/// Ordered collection of fragments with lookup by name.
///
/// Order is the order fragments were added. Names are not required to be
/// unique; lookups return the first fragment with a given name, and route
/// duplicates are reported later by the definition pass.
#[derive(Debug, Clone, Default)]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
    by_name: HashMap<String, usize>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.by_name
            .entry(fragment.name.clone())
            .or_insert(self.fragments.len());
        self.fragments.push(fragment);
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.by_name.get(name).map(|&i| &self.fragments[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Parse one source unit and append its fragments.
    pub fn add_source(&mut self, group: &str, source: &str) -> Result<usize, TemplateError> {
        let parsed = parse_source(group, source)?;
        let count = parsed.len();
        for fragment in parsed {
            self.push(fragment);
        }
        debug!(group, count, "parsed fragment source");
        Ok(count)
    }

    /// Load every source unit under `dir`, visiting files in sorted order so
    /// the resulting set is the same on every run.
    pub fn load_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut set = Self::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|err| TemplateError::Io {
                path: dir.to_path_buf(),
                source: err.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_source_file(path) {
                continue;
            }
            let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let group = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            set.add_source(&group, &source)?;
        }
        Ok(set)
    }
}

impl FromIterator<Fragment> for FragmentSet {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        let mut set = Self::new();
        for fragment in iter {
            set.push(fragment);
        }
        set
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
