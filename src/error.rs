//! Generation-time error taxonomy.
//!
//! Each pass owns an error enum describing what went wrong inside that pass;
//! [`Error`] ties them to the [`SourceLocation`] of the fragment that caused
//! them. Passes collect every issue they find before failing, so a single run
//! reports all problems at once through [`Error::Many`].

use std::fmt;

use thiserror::Error;

use crate::definition::DefinitionError;
use crate::generator::GenerateError;
use crate::resolve::ResolveError;
use crate::template::TemplateError;

/// Where a fragment came from.
///
/// `group` is empty for fragments registered programmatically rather than
/// parsed from a named source unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub group: String,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(group: impl Into<String>, line: usize) -> Self {
        Self {
            group: group.into(),
            line,
        }
    }

    /// Location of a fragment that has no source unit.
    pub fn programmatic() -> Self {
        Self::default()
    }

    pub fn is_programmatic(&self) -> bool {
        self.group.is_empty()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_programmatic() {
            write!(f, "<programmatic>")
        } else if self.line == 0 {
            write!(f, "{}", self.group)
        } else {
            write!(f, "{}:{}", self.group, self.line)
        }
    }
}

/// Any error that aborts generation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{location}: fragment {label:?}: {source}")]
    Definition {
        location: SourceLocation,
        label: String,
        #[source]
        source: DefinitionError,
    },

    #[error("duplicate route pattern {pattern:?} declared at {first} and {second}")]
    DuplicatePattern {
        pattern: String,
        first: SourceLocation,
        second: SourceLocation,
    },

    #[error("{location}: fragment {label:?}: {source}")]
    Resolve {
        location: SourceLocation,
        label: String,
        #[source]
        source: ResolveError,
    },

    #[error("{location}: fragment {label:?}: {source}")]
    Generate {
        location: SourceLocation,
        label: String,
        #[source]
        source: GenerateError,
    },

    #[error("failed to render output: {0}")]
    Render(#[from] askama::Error),

    #[error("{}", Issues(.0))]
    Many(Vec<Error>),
}

impl Error {
    /// Collapse a list of issues into one error, or `Ok(())` when empty.
    pub fn from_issues(mut issues: Vec<Error>) -> Result<(), Error> {
        match issues.len() {
            0 => Ok(()),
            1 => Err(issues.remove(0)),
            _ => Err(Error::Many(issues)),
        }
    }

    /// Flattened view over every issue contained in this error.
    pub fn issues(&self) -> Vec<&Error> {
        match self {
            Error::Many(all) => all.iter().flat_map(Error::issues).collect(),
            other => vec![other],
        }
    }
}

struct Issues<'a>(&'a [Error]);

impl fmt::Display for Issues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} generation error(s):", self.0.len())?;
        for issue in self.0 {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}
