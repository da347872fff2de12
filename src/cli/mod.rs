//! # CLI Module
//!
//! Command-line interface for the `fragmux-gen` code generator.
//!
//! ## Commands
//!
//! ### `generate`
//!
//! Load fragments and host types, run every pass and write the routes
//! module:
//!
//! ```bash
//! fragmux-gen generate --templates ui --types types.yaml --receiver Server \
//!     --output src/template_routes.rs
//! ```
//!
//! The output file is only rewritten when its contents change. `--dry-run`
//! prints the module to stdout instead, and `--format` runs `rustfmt` on the
//! written file.
//!
//! ### `check`
//!
//! Run every pass without writing anything and print each issue found:
//!
//! ```bash
//! fragmux-gen check --templates ui --types types.yaml
//! ```
//!
//! ### `routes`
//!
//! List every endpoint definition with its identifier, resolved signature
//! and redirect flag, or show which definition serves a request:
//!
//! ```bash
//! fragmux-gen routes --templates ui
//! fragmux-gen routes --templates ui --match "GET /user/42"
//! ```
//!
//! ## Configuration
//!
//! Every command reads `fragmux.toml` from the working directory (or the
//! file named by `--config`). Flags override file values; see
//! [`crate::config`].
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use clap::Parser;
//! use fragmux::cli::{run, Cli};
//!
//! let cli = Cli::parse();
//! run(&cli, &mut std::io::stdout())?;
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run, run_cli, Cli, Commands, SourceArgs};
