//! Host type description loaded from YAML or JSON.
//!
//! ```yaml
//! imports: ["crate::model::*"]
//! types:
//!   Server:
//!     methods:
//!       GetUser: { params: ["&Context", "i64"], results: ["User", "Error"] }
//!   Slug: { capabilities: [text_decode, text_encode] }
//!   CreateUserForm:
//!     fields:
//!       - { name: name, type: String }
//!       - { name: age, type: i64, form: Age }
//! functions:
//!   parse_id: { path: "crate::ids::parse_id", params: ["String"], results: ["i64", "Error"] }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{
    builtin_implements, Capability, FieldDef, FunctionDef, HostType, Param, Signature,
    TypeOracle,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read type description {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML type description: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON type description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{owner}::{name}: {message}")]
    InvalidSignature {
        owner: String,
        name: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    functions: BTreeMap<String, FunctionDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TypeDecl {
    #[serde(default)]
    methods: BTreeMap<String, SignatureDecl>,
    #[serde(default)]
    fields: Vec<FieldDecl>,
    #[serde(default)]
    capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SignatureDecl {
    #[serde(default)]
    params: Vec<String>,
    results: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionDecl {
    #[serde(default)]
    path: Option<String>,
    #[serde(flatten)]
    signature: SignatureDecl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    form: Option<String>,
}

/// A [`TypeOracle`] built from a type description file.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    imports: Vec<String>,
    methods: BTreeMap<(String, String), Signature>,
    functions: BTreeMap<String, FunctionDef>,
    fields: BTreeMap<String, Vec<FieldDef>>,
    capabilities: BTreeMap<String, BTreeSet<Capability>>,
}

impl TypeRegistry {
    pub fn from_yaml_str(source: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(source)?;
        Self::from_file(file)
    }

    pub fn from_json_str(source: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(source)?;
        Self::from_file(file)
    }

    /// Load a description, choosing JSON for `.json` files and YAML otherwise.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source)?,
            _ => Self::from_yaml_str(&source)?,
        };
        debug!(
            path = %path.display(),
            methods = registry.methods.len(),
            functions = registry.functions.len(),
            "loaded type description"
        );
        Ok(registry)
    }

    fn from_file(file: RegistryFile) -> Result<Self, RegistryError> {
        // Capabilities first: converting signatures asks whether result types are errors.
        let mut registry = TypeRegistry {
            imports: file.imports,
            capabilities: file
                .types
                .iter()
                .map(|(name, decl)| (name.clone(), decl.capabilities.clone()))
                .collect(),
            ..Default::default()
        };

        for (type_name, decl) in &file.types {
            for (method, sig) in &decl.methods {
                let signature = registry.convert(type_name, method, sig)?;
                registry
                    .methods
                    .insert((type_name.clone(), method.clone()), signature);
            }
            if !decl.fields.is_empty() {
                let fields = decl
                    .fields
                    .iter()
                    .map(|f| FieldDef {
                        name: f.name.clone(),
                        form_name: f.form.clone().unwrap_or_else(|| f.name.clone()),
                        ty: HostType::parse(&f.ty),
                    })
                    .collect();
                registry.fields.insert(type_name.clone(), fields);
            }
        }

        for (name, decl) in &file.functions {
            let signature = registry.convert("functions", name, &decl.signature)?;
            registry.functions.insert(
                name.clone(),
                FunctionDef {
                    path: decl.path.clone().unwrap_or_else(|| name.clone()),
                    signature,
                },
            );
        }
        Ok(registry)
    }

    fn convert(
        &self,
        owner: &str,
        name: &str,
        decl: &SignatureDecl,
    ) -> Result<Signature, RegistryError> {
        let params = decl
            .params
            .iter()
            .map(|p| Param::new(None, HostType::parse(p)))
            .collect();
        let results: Vec<HostType> = decl.results.iter().map(|r| HostType::parse(r)).collect();
        Signature::from_results(params, &results, self).map_err(|message| {
            RegistryError::InvalidSignature {
                owner: owner.to_string(),
                name: name.to_string(),
                message,
            }
        })
    }
}

impl TypeOracle for TypeRegistry {
    fn method(&self, receiver: &str, name: &str) -> Option<Signature> {
        self.methods
            .get(&(receiver.to_string(), name.to_string()))
            .cloned()
    }

    fn function(&self, name: &str) -> Option<FunctionDef> {
        self.functions.get(name).cloned()
    }

    fn struct_fields(&self, ty: &str) -> Option<Vec<FieldDef>> {
        self.fields.get(ty).cloned()
    }

    fn implements(&self, ty: &HostType, capability: Capability) -> bool {
        if builtin_implements(ty, capability) {
            return true;
        }
        ty.named()
            .and_then(|name| self.capabilities.get(name))
            .is_some_and(|caps| caps.contains(&capability))
    }

    fn imports(&self) -> Vec<String> {
        self.imports.clone()
    }
}
