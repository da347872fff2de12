//! # fragmux
//!
//! **fragmux** turns route-labelled template fragments into a Rust module of
//! typed, deterministic request handlers.
//!
//! ## Overview
//!
//! A fragment whose name is a route label such as
//! `GET /user/{id} GetUser(ctx, id)` becomes an endpoint. The generator
//! binds the call to the host application's types (or synthesizes a
//! signature when none exists), decodes and validates request inputs,
//! invokes the call, and hands the result to the host's renderer. Every
//! route also gets a URL builder, so links stay in sync with patterns.
//!
//! ## Architecture
//!
//! - **[`template`]** - fragments, their source syntax and render-instruction trees
//! - **[`definition`]** - route label parsing, call expressions and duplicate detection
//! - **[`ident`]** - identifier allocation for emitted names
//! - **[`types`]** - the host type oracle and the YAML/JSON type description
//! - **[`resolve`]** - call binding, signature synthesis and the capability interface
//! - **[`analysis`]** - redirect analysis and form input constraints
//! - **[`generator`]** - handler, guard and path helper emission
//! - **[`router`]** - matching concrete requests against definitions
//! - **[`config`]** - `fragmux.toml` loading
//! - **[`cli`]** - the `fragmux-gen` command line
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Generation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant User
//!     participant CLI as CLI<br/>(fragmux-gen)
//!     participant Tpl as template::FragmentSet
//!     participant Def as definition
//!     participant Res as resolve
//!     participant Ana as analysis
//!     participant Gen as generator
//!     participant FS as File System
//!
//!     User->>CLI: fragmux-gen generate
//!     CLI->>Tpl: load_dir("templates")
//!     Tpl-->>CLI: FragmentSet
//!     CLI->>Def: load_definitions(&fragments)
//!     Def-->>CLI: Vec<EndpointDefinition>
//!     CLI->>Res: resolve_definitions(&mut defs, &oracle)
//!     Res-->>CLI: CapabilityInterface
//!     CLI->>Ana: analyze(&mut defs, &fragments)
//!     CLI->>Gen: render_module(&analysis)
//!     Gen-->>CLI: module source
//!     CLI->>FS: write_if_changed("template_routes.rs")
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin fragmux-gen -- generate \
//!     --templates ui --types types.yaml --receiver Server \
//!     --output src/template_routes.rs
//! ```
//!
//! Or from code:
//!
//! ```rust,ignore
//! use fragmux::generator::{generate, GenerateOptions};
//! use fragmux::template::FragmentSet;
//! use fragmux::types::TypeRegistry;
//!
//! let fragments = FragmentSet::load_dir("ui".as_ref())?;
//! let types = TypeRegistry::load("types.yaml".as_ref())?;
//! let options = GenerateOptions {
//!     receiver: Some("Server".to_string()),
//!     ..GenerateOptions::default()
//! };
//! let source = generate(&fragments, &types, &options)?;
//! ```
//!
//! ## Generated module
//!
//! The emitted module depends on `regex`, `serde`, `serde_json`, `tracing`
//! and `url` in the host crate. The host implements the capability
//! interface trait on its receiver, provides a `Mux` and a `Renderer`, and
//! calls the registration function once at startup.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod generator;
pub mod ident;
pub mod logging;
pub mod resolve;
pub mod router;
pub mod template;
pub mod types;

pub use error::{Error, SourceLocation};
pub use generator::{generate, GenerateOptions};
