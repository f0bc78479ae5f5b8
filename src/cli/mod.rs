//! Command-line interface for the Omnia interpreter
//!
//! Provides commands: run, check, tokens

mod check_cmd;
pub(crate) mod run_cmd;

#[cfg(test)]
mod tests;

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::manifest::ManifestError;
use crate::parser::SyntaxError;

/// Source file extension for Omnia programs and modules
pub const SOURCE_EXTENSION: &str = "omn";

/// Omnia - structs, traits, actors and threads in a small interpreted language
#[derive(Parser, Debug)]
#[command(name = "omnia")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log interpreter internals to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an Omnia program
    Run {
        /// File to run (defaults to `package.main` from omnia.toml)
        file: Option<PathBuf>,

        /// Function called after the top-level statements
        #[arg(long)]
        entry: Option<String>,
    },

    /// Parse files and report syntax errors without running them
    Check {
        /// Files or directories to check
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Print the parsed AST as JSON
        #[arg(long)]
        ast: bool,
    },

    /// Print the token stream of a file
    Tokens {
        /// File to tokenize
        file: PathBuf,
    },
}

impl Cli {
    /// Execute the parsed command
    pub fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Command::Run { file, entry } => {
                run_cmd::run_program(file.as_deref(), entry.as_deref())
            }
            Command::Check { paths, json, ast } => {
                check_cmd::run_check(paths, *json, *ast, self.quiet)
            }
            Command::Tokens { file } => check_cmd::run_tokens(file),
        }
    }
}

/// Errors surfaced by CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A lex or parse error, already rendered with source context
    #[error("{rendered}")]
    Syntax { rendered: String },

    /// An uncaught runtime error, formatted as `Kind: message` plus location
    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("{0}")]
    Usage(String),

    #[error("found {errors} error(s) in {files} file(s)")]
    Failed { errors: usize, files: usize },
}

impl CliError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        CliError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Whether the message is already fully formatted for the terminal
    pub fn is_rendered(&self) -> bool {
        matches!(self, CliError::Syntax { .. })
    }
}

/// Render a syntax error with a source excerpt.
/// Colors are used only when stderr is a terminal.
pub fn render_syntax_error(error: &SyntaxError, source: &str) -> String {
    let report = error.diagnostic().to_report(source);
    let theme = if std::io::stderr().is_terminal() {
        miette::GraphicalTheme::unicode()
    } else {
        miette::GraphicalTheme::unicode_nocolor()
    };
    let handler = miette::GraphicalReportHandler::new_themed(theme);
    let mut rendered = String::new();
    match handler.render_report(&mut rendered, &report) {
        Ok(()) => rendered,
        Err(_) => error.diagnostic().to_human_readable(source),
    }
}

/// Collect `.omn` files from files and directories, sorted per directory
pub(crate) fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_file() {
            sources.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = walkdir(path)?
                .into_iter()
                .filter(|entry| entry.extension().is_some_and(|ext| ext == SOURCE_EXTENSION))
                .collect();
            found.sort();
            sources.extend(found);
        } else {
            return Err(CliError::Io {
                path: path.clone(),
                message: "no such file or directory".to_string(),
            });
        }
    }
    Ok(sources)
}

/// Recursively list files under a directory, skipping hidden entries
fn walkdir(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut results = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| CliError::io(path, e))? {
        let entry = entry.map_err(|e| CliError::io(path, e))?;
        let entry_path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry_path.is_file() {
            results.push(entry_path);
        } else if entry_path.is_dir() {
            results.extend(walkdir(&entry_path)?);
        }
    }
    Ok(results)
}
