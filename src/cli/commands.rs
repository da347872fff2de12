use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use http::Method;
use tracing::{info, warn};

use crate::config::{load_config, resolve_config_path, FileConfig, Settings};
use crate::generator::{
    analyze_fragments, format_file, generate, render_module, write_if_changed, Analysis,
};
use crate::router::Router;
use crate::template::FragmentSet;
use crate::types::{NoTypes, TypeOracle, TypeRegistry};

/// Command-line interface for fragmux
///
/// Generates typed request handlers from route-labelled template fragments.
#[derive(Debug, Parser)]
#[command(name = "fragmux-gen")]
#[command(about = "Generate Rust request handlers from template fragments", long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Configuration file (default: ./fragmux.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding fragment sources
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Host type description (YAML or JSON)
    #[arg(long)]
    pub types: Option<PathBuf>,

    /// Receiver type whose methods calls bind to
    #[arg(long)]
    pub receiver: Option<String>,

    /// Name of the capability interface trait
    #[arg(long)]
    pub interface: Option<String>,

    /// Name of the registration function
    #[arg(long)]
    pub routes_function: Option<String>,
}

impl SourceArgs {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            templates: self.templates.clone(),
            types: self.types.clone(),
            receiver: self.receiver.clone(),
            interface: self.interface.clone(),
            routes_function: self.routes_function.clone(),
            ..FileConfig::default()
        }
    }
}

/// Available fragmux-gen commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate the routes module
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        /// Path of the generated module
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the module to stdout instead of writing it
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Run rustfmt on the written module
        #[arg(long, default_value_t = false)]
        format: bool,
    },
    /// Run every pass and report issues without writing anything
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List endpoint definitions, or show which one serves a request
    Routes {
        #[command(flatten)]
        source: SourceArgs,

        /// Request to match, e.g. "GET /user/42" or "GET example.com/"
        #[arg(long = "match", value_name = "REQUEST")]
        request: Option<String>,
    },
}

/// Parse arguments, initialize logging and execute the command.
///
/// # Errors
///
/// Returns an error if configuration, fragments or types cannot be loaded,
/// if generation reports issues, or if the output cannot be written.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    crate::logging::init_logging(cli.log_level.as_deref())?;
    run(&cli, &mut std::io::stdout().lock())
}

/// Execute `cli`, writing command output to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Generate {
            source,
            output,
            dry_run,
            format,
        } => {
            let overrides = FileConfig {
                output: output.clone(),
                format: format.then_some(true),
                ..source.overrides()
            };
            let settings = load_settings(source.config.as_deref(), overrides)?;
            let fragments = load_fragments(&settings)?;
            let oracle = load_oracle(&settings)?;
            let module = generate(&fragments, oracle.as_ref(), &settings.generate_options())?;

            if *dry_run {
                out.write_all(module.as_bytes())?;
                return Ok(());
            }
            let written = write_if_changed(&settings.output, &module).with_context(|| {
                format!("Failed to write {}", settings.output.display())
            })?;
            if written && settings.format {
                if let Err(err) = format_file(&settings.output) {
                    warn!(path = %settings.output.display(), error = %err, "rustfmt failed; leaving output unformatted");
                }
            }
            Ok(())
        }
        Commands::Check { source } => {
            let settings = load_settings(source.config.as_deref(), source.overrides())?;
            let fragments = load_fragments(&settings)?;
            let oracle = load_oracle(&settings)?;
            let options = settings.generate_options();
            let result = analyze_fragments(&fragments, oracle.as_ref(), &options).and_then(
                |analysis| {
                    render_module(&analysis, oracle.as_ref(), &options).map(|_| analysis)
                },
            );
            match result {
                Ok(analysis) => {
                    writeln!(
                        out,
                        "ok: {} route(s), {} interface method(s)",
                        analysis.definitions.len(),
                        analysis.interface.len()
                    )?;
                    Ok(())
                }
                Err(err) => {
                    let issues = err.issues();
                    for issue in &issues {
                        writeln!(out, "error: {issue}")?;
                    }
                    anyhow::bail!("{} issue(s) found", issues.len())
                }
            }
        }
        Commands::Routes { source, request } => {
            let settings = load_settings(source.config.as_deref(), source.overrides())?;
            let fragments = load_fragments(&settings)?;
            let oracle = load_oracle(&settings)?;
            let analysis =
                analyze_fragments(&fragments, oracle.as_ref(), &settings.generate_options())?;
            match request {
                Some(request) => print_match(&analysis, request, out),
                None => print_routes(&analysis, out),
            }
        }
    }
}

fn load_settings(config: Option<&Path>, overrides: FileConfig) -> anyhow::Result<Settings> {
    let file = match resolve_config_path(config, Path::new("."))? {
        Some(path) => {
            info!(path = %path.display(), "using config file");
            load_config(&path)?.unwrap_or_default()
        }
        None => FileConfig::default(),
    };
    Ok(Settings::from_config(file.merge(overrides)))
}

fn load_fragments(settings: &Settings) -> anyhow::Result<FragmentSet> {
    let fragments = FragmentSet::load_dir(&settings.templates)?;
    info!(
        dir = %settings.templates.display(),
        fragments = fragments.len(),
        "loaded fragments"
    );
    Ok(fragments)
}

fn load_oracle(settings: &Settings) -> anyhow::Result<Box<dyn TypeOracle>> {
    match &settings.types {
        Some(path) => Ok(Box::new(TypeRegistry::load(path)?)),
        None => Ok(Box::new(NoTypes)),
    }
}

fn print_routes(analysis: &Analysis, out: &mut dyn Write) -> anyhow::Result<()> {
    let rows: Vec<[String; 4]> = analysis
        .definitions
        .iter()
        .map(|definition| {
            let signature = definition
                .resolved
                .as_ref()
                .map(|call| format!("{}{}", call.callee, call.signature))
                .unwrap_or_else(|| "-".to_string());
            let redirect = if definition.can_redirect { "redirect" } else { "" };
            [
                definition.normalized_pattern(),
                definition.identifier.clone(),
                signature,
                redirect.to_string(),
            ]
        })
        .collect();

    let pattern_width = rows.iter().map(|row| row[0].len()).max().unwrap_or(0);
    let ident_width = rows.iter().map(|row| row[1].len()).max().unwrap_or(0);
    for [pattern, identifier, signature, redirect] in &rows {
        let line = format!("{pattern:<pattern_width$}  {identifier:<ident_width$}  {signature}  {redirect}");
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn print_match(analysis: &Analysis, request: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let (method, host, path) = parse_request(request)?;
    let router = Router::new(&analysis.definitions)?;
    let Some(matched) = router.route(&method, &host, &path) else {
        anyhow::bail!("no route matches {request:?}");
    };
    writeln!(
        out,
        "{} -> {}",
        matched.definition.normalized_pattern(),
        matched.definition.identifier
    )?;
    for (name, value) in &matched.path_params {
        writeln!(out, "  {name} = {value}")?;
    }
    Ok(())
}

/// Split `"[METHOD ][host]/path"` into its parts; the method defaults to GET.
pub(crate) fn parse_request(request: &str) -> anyhow::Result<(Method, String, String)> {
    let request = request.trim();
    let (method, target) = match request.split_once(char::is_whitespace) {
        Some((method, rest)) => {
            let method = Method::from_bytes(method.as_bytes())
                .with_context(|| format!("invalid method in {request:?}"))?;
            (method, rest.trim())
        }
        None => (Method::GET, request),
    };
    let Some(slash) = target.find('/') else {
        anyhow::bail!("request target {target:?} has no path");
    };
    Ok((
        method,
        target[..slash].to_string(),
        target[slash..].to_string(),
    ))
}
