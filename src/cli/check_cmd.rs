//! Handlers for the `omnia check` and `omnia tokens` subcommands.

use std::path::{Path, PathBuf};

use crate::diagnostics::DiagnosticBag;
use crate::parser::{parse_source, tokenize, Program, SyntaxError, Token, TokenKind};

use super::{collect_sources, render_syntax_error, CliError};

/// Outcome of checking one file
pub(crate) enum FileCheck {
    Ok(Program),
    Failed { source: String, error: SyntaxError },
}

pub(crate) fn check_file(path: &Path) -> Result<FileCheck, CliError> {
    let source = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    Ok(match parse_source(&source, path) {
        Ok(program) => FileCheck::Ok(program),
        Err(error) => FileCheck::Failed { source, error },
    })
}

pub(crate) fn run_check(
    paths: &[PathBuf],
    json: bool,
    ast: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let files = collect_sources(paths)?;
    let mut bag = DiagnosticBag::new();

    for path in &files {
        match check_file(path)? {
            FileCheck::Ok(program) => {
                if ast {
                    let text = serde_json::to_string_pretty(&program)
                        .map_err(|e| CliError::Runtime(format!("could not serialize AST: {}", e)))?;
                    println!("{}", text);
                }
            }
            FileCheck::Failed { source, error } => {
                if !json {
                    eprintln!("{}", render_syntax_error(&error, &source));
                }
                bag.push(error.diagnostic().clone());
            }
        }
    }

    if json {
        println!("{}", bag.to_json());
    }
    if bag.has_errors() {
        return Err(CliError::Failed {
            errors: bag.error_count(),
            files: files.len(),
        });
    }
    if !quiet && !json && !ast {
        println!("Checked {} file(s), no errors found", files.len());
    }
    Ok(())
}

pub(crate) fn run_tokens(file: &Path) -> Result<(), CliError> {
    let source = std::fs::read_to_string(file).map_err(|e| CliError::io(file, e))?;
    let tokens = tokenize(&source, file).map_err(|e| CliError::Syntax {
        rendered: render_syntax_error(&e, &source),
    })?;
    print!("{}", format_tokens(&tokens));
    Ok(())
}

/// One `line:col  token` row per token; `Eof` is left out
pub(crate) fn format_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Eof)
        .map(|token| {
            format!(
                "{:>4}:{:<4} {}\n",
                token.span.start_line, token.span.start_col, token.kind
            )
        })
        .collect()
}
