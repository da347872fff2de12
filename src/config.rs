//! `fragmux.toml` configuration for `fragmux-gen`.
//!
//! ```toml
//! templates = "templates"
//! types = "types.yaml"
//! receiver = "Server"
//! output = "src/template_routes.rs"
//! interface = "RoutesReceiver"
//! routes_function = "routes"
//! format = true
//! ```
//!
//! Every key is optional. Command-line flags override file values, and
//! relative paths in the file are taken relative to the file itself.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::generator::GenerateOptions;

pub const CONFIG_FILE_NAME: &str = "fragmux.toml";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
pub const DEFAULT_OUTPUT: &str = "template_routes.rs";

/// Values from `fragmux.toml`, or from command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Directory holding fragment sources
    pub templates: Option<PathBuf>,
    /// Host type description (YAML or JSON)
    pub types: Option<PathBuf>,
    /// Receiver type whose methods calls bind to
    pub receiver: Option<String>,
    /// Generated module path
    pub output: Option<PathBuf>,
    /// Capability interface trait name
    pub interface: Option<String>,
    /// Registration function name
    pub routes_function: Option<String>,
    /// Run rustfmt on the written file
    pub format: Option<bool>,
}

impl FileConfig {
    /// Resolve relative paths against `dir`.
    fn rebase(mut self, dir: &Path) -> Self {
        let join = |p: PathBuf| if p.is_relative() { dir.join(p) } else { p };
        self.templates = self.templates.map(join);
        self.types = self.types.map(join);
        self.output = self.output.map(join);
        self
    }

    /// Take every value set in `overrides`, keeping ours otherwise.
    pub fn merge(self, overrides: FileConfig) -> Self {
        Self {
            templates: overrides.templates.or(self.templates),
            types: overrides.types.or(self.types),
            receiver: overrides.receiver.or(self.receiver),
            output: overrides.output.or(self.output),
            interface: overrides.interface.or(self.interface),
            routes_function: overrides.routes_function.or(self.routes_function),
            format: overrides.format.or(self.format),
        }
    }
}

/// Load a configuration file.
///
/// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but
/// cannot be read or parsed.
pub fn load_config(config_path: &Path) -> anyhow::Result<Option<FileConfig>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
    let config: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;

    let dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    Ok(Some(config.rebase(dir)))
}

/// Resolve the configuration file path
///
/// Priority:
/// 1. Explicitly provided path (via CLI), which must exist
/// 2. `fragmux.toml` in `dir`
/// 3. None (no config)
pub fn resolve_config_path(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }
    let detected = dir.join(CONFIG_FILE_NAME);
    Ok(detected.exists().then_some(detected))
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub templates: PathBuf,
    pub types: Option<PathBuf>,
    pub receiver: Option<String>,
    pub output: PathBuf,
    pub interface: String,
    pub routes_function: String,
    pub format: bool,
}

impl Settings {
    pub fn from_config(config: FileConfig) -> Self {
        let defaults = GenerateOptions::default();
        Self {
            templates: config
                .templates
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR)),
            types: config.types,
            receiver: config.receiver,
            output: config.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            interface: config.interface.unwrap_or(defaults.interface),
            routes_function: config.routes_function.unwrap_or(defaults.routes_function),
            format: config.format.unwrap_or(false),
        }
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            receiver: self.receiver.clone(),
            interface: self.interface.clone(),
            routes_function: self.routes_function.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_missing_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(&dir.path().join(CONFIG_FILE_NAME)).unwrap(), None);
        assert_eq!(resolve_config_path(None, dir.path()).unwrap(), None);
        assert!(resolve_config_path(Some(&dir.path().join("nope.toml")), dir.path()).is_err());
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "templates = \"ui\"\noutput = \"/abs/routes.rs\"\nreceiver = \"Server\"\nformat = true\n",
        )
        .unwrap();
        assert_eq!(
            resolve_config_path(None, dir.path()).unwrap(),
            Some(path.clone())
        );

        let config = load_config(&path).unwrap().unwrap();
        assert_eq!(config.templates, Some(dir.path().join("ui")));
        assert_eq!(config.output, Some(PathBuf::from("/abs/routes.rs")));
        assert_eq!(config.receiver.as_deref(), Some("Server"));
        assert_eq!(config.format, Some(true));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "templtes = \"ui\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_flags_override_file_and_defaults_fill_in() {
        let file = FileConfig {
            templates: Some("ui".into()),
            interface: Some("App".into()),
            ..Default::default()
        };
        let flags = FileConfig {
            interface: Some("Handlers".into()),
            ..Default::default()
        };
        let settings = Settings::from_config(file.merge(flags));
        assert_eq!(settings.templates, PathBuf::from("ui"));
        assert_eq!(settings.interface, "Handlers");
        assert_eq!(settings.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(settings.routes_function, "routes");
        assert!(!settings.format);
        assert_eq!(settings.generate_options().interface, "Handlers");
    }
}
