//! Manifest parsing for Omnia projects (omnia.toml)

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::interpreter::DEFAULT_ENTRY;

/// File name looked up next to the program and in the working directory
pub const MANIFEST_FILE: &str = "omnia.toml";

/// Omnia project manifest; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Manifest {
    /// Package information
    #[serde(default)]
    pub package: Package,

    /// Module resolution
    #[serde(default)]
    pub modules: Modules,

    /// Interpreter settings
    #[serde(default)]
    pub runtime: Runtime,
}

/// Package information
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: Option<String>,

    /// Program run by `omnia run` when no file is given
    #[serde(default)]
    pub main: Option<String>,
}

/// Module resolution settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Modules {
    /// Extra module directories, relative to the manifest
    #[serde(default)]
    pub search_paths: Vec<String>,
}

/// Interpreter settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Runtime {
    /// Function called after the top-level statements
    #[serde(default)]
    pub entry: Option<String>,
}

impl Manifest {
    /// Load a manifest from a file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::Io(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse and validate a manifest from a TOML string
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if let Some(name) = &self.package.name {
            if name.trim().is_empty() {
                return Err(ManifestError::Validation(
                    "package.name must not be empty".to_string(),
                ));
            }
        }
        if let Some(entry) = &self.runtime.entry {
            let mut chars = entry.chars();
            let valid = chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_');
            if !valid {
                return Err(ManifestError::Validation(format!(
                    "runtime.entry `{}` is not a valid function name",
                    entry
                )));
            }
        }
        Ok(())
    }

    /// Entry function name
    pub fn entry(&self) -> &str {
        self.runtime.entry.as_deref().unwrap_or(DEFAULT_ENTRY)
    }
}

/// A manifest together with the directory it was found in
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub root: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Find `omnia.toml` next to `program` (when given), else in `cwd`
    pub fn discover(program: Option<&Path>, cwd: &Path) -> Result<Option<Self>, ManifestError> {
        let program_dir = program
            .and_then(Path::parent)
            .map(|dir| if dir.as_os_str().is_empty() { cwd } else { dir });

        for dir in program_dir.into_iter().chain(std::iter::once(cwd)) {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "using manifest");
                return Ok(Some(Self {
                    root: dir.to_path_buf(),
                    manifest: Manifest::load(&candidate)?,
                }));
            }
        }
        Ok(None)
    }

    /// `package.main`, resolved against the project root
    pub fn main_file(&self) -> Option<PathBuf> {
        self.manifest
            .package
            .main
            .as_ref()
            .map(|main| self.root.join(main))
    }

    /// The project root followed by the configured module directories
    pub fn search_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.root.clone())
            .chain(
                self.manifest
                    .modules
                    .search_paths
                    .iter()
                    .map(|p| self.root.join(p)),
            )
            .collect()
    }
}

/// Manifest errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests;
