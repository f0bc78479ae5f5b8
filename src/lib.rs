//! Omnia Programming Language
//!
//! A small dynamically typed language with structs, traits, actors and
//! threads, run by a tree-walking interpreter.

pub mod cli;
pub mod diagnostics;
pub mod interpreter;
pub mod manifest;
pub mod parser;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::diagnostics::{Diagnostic, Span};
    pub use crate::interpreter::{Interpreter, RuntimeError, Value};
    pub use crate::parser::{parse_source, SyntaxError};
}
