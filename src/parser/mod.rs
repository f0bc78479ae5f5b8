//! Parser for the Omnia programming language
//!
//! This module provides:
//! - Lexer (tokenization)
//! - Parser (AST construction)
//! - AST definitions
//! - Span tracking

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod span;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use span::SourceFile;

use crate::diagnostics::{syntax, Diagnostic, Span};
use std::path::Path;

/// A failure to turn source text into a program
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyntaxError {
    #[error("lex error: {}", .0.message)]
    Lex(Diagnostic),
    #[error("parse error: {}", .0.message)]
    Parse(Diagnostic),
}

impl SyntaxError {
    /// The underlying diagnostic, with code and span
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            SyntaxError::Lex(d) | SyntaxError::Parse(d) => d,
        }
    }
}

/// Read and parse a source file, returning the text alongside the program
pub fn parse_file(path: &Path) -> Result<(String, Program), SyntaxError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyntaxError::Parse(
            Diagnostic::error(syntax::UNREADABLE_FILE)
                .message(format!("Could not read file: {}", e))
                .span(Span::file(path))
                .build(),
        )
    })?;
    let program = parse_source(&content, path)?;
    Ok((content, program))
}

/// Tokenize source code; the result always ends with `Eof`
pub fn tokenize(source: &str, path: &Path) -> Result<Vec<Token>, SyntaxError> {
    let source_file = SourceFile::new(path, source);
    Lexer::new(&source_file).tokenize().map_err(SyntaxError::Lex)
}

/// Parse source code into an AST
#[tracing::instrument(level = "debug", skip(source), fields(bytes = source.len()))]
pub fn parse_source(source: &str, path: &Path) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source, path)?;
    tracing::debug!(tokens = tokens.len(), "lexed");
    Parser::new(tokens)
        .parse_program()
        .map_err(SyntaxError::Parse)
}

#[cfg(test)]
mod tests;
