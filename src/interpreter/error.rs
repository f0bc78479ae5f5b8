//! Runtime error types for the Omnia interpreter.

use std::fmt;

use crate::diagnostics::{runtime, Span};

use super::value::Value;

/// Category of a runtime error, visible to programs as `e.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArityError,
    TypeError,
    FieldError,
    NameError,
    ImmutableAssignError,
    DefinitionError,
    ImportError,
    /// Raised by `throw` or built with `error(...)`
    Error,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::ArityError,
        ErrorKind::TypeError,
        ErrorKind::FieldError,
        ErrorKind::NameError,
        ErrorKind::ImmutableAssignError,
        ErrorKind::DefinitionError,
        ErrorKind::ImportError,
        ErrorKind::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::ArityError => "ArityError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::FieldError => "FieldError",
            ErrorKind::NameError => "NameError",
            ErrorKind::ImmutableAssignError => "ImmutableAssignError",
            ErrorKind::DefinitionError => "DefinitionError",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::Error => "Error",
        }
    }

    /// Stable diagnostic code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ArityError => runtime::ARITY,
            ErrorKind::TypeError => runtime::TYPE,
            ErrorKind::FieldError => runtime::FIELD,
            ErrorKind::NameError => runtime::NAME,
            ErrorKind::ImmutableAssignError => runtime::IMMUTABLE_ASSIGN,
            ErrorKind::DefinitionError => runtime::DEFINITION,
            ErrorKind::ImportError => runtime::IMPORT,
            ErrorKind::Error => runtime::THROWN,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime error with kind, message and the innermost known location
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl RuntimeError {
    /// Create a new runtime error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    /// Attach a source location
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a source location unless one is already known
    pub fn or_span(mut self, span: &Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span.clone());
        }
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// `Kind: message`, followed by `at file:line:col` when located
    pub fn report(&self) -> String {
        match &self.span {
            Some(span) => format!("{}\n  at {}", self, span.location()),
            None => self.to_string(),
        }
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn type_mismatch(expected: &str, got: &Value) -> Self {
        Self::type_error(format!("expected {}, got {}", expected, got.type_name()))
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::NameError, format!("undefined variable `{}`", name))
    }

    pub fn immutable_assign(name: &str) -> Self {
        Self::new(
            ErrorKind::ImmutableAssignError,
            format!("cannot assign twice to immutable binding `{}`", name),
        )
    }

    pub fn unknown_field(owner: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::FieldError,
            format!("`{}` has no field or method `{}`", owner, field),
        )
    }

    pub fn not_visible(kind: &str, owner: &str, name: &str) -> Self {
        Self::new(
            ErrorKind::FieldError,
            format!("{} `{}.{}` is not accessible here", kind, owner, name),
        )
    }

    pub fn not_callable(value: &Value) -> Self {
        Self::type_error(format!("value of type {} is not callable", value.type_name()))
    }

    pub fn arity_mismatch(name: &str, expected: &str, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityError,
            format!("`{}` expects {} arguments, got {}", name, expected, got),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::type_error("division by zero")
    }

    pub fn overflow(op: &str) -> Self {
        Self::type_error(format!("integer overflow in `{}`", op))
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::type_error(format!("index {} out of bounds for length {}", index, len))
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DefinitionError, message)
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImportError, message)
    }
}

/// Non-local exits carried on the error side of evaluation results
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(RuntimeError),
    Return(Value),
    Break,
    Continue,
}

impl Unwind {
    /// Locate an error at `span` if it has no location yet
    pub fn or_span(self, span: &Span) -> Self {
        match self {
            Unwind::Error(e) => Unwind::Error(e.or_span(span)),
            other => other,
        }
    }

    /// Collapse a signal that escaped its construct into a plain error
    pub fn into_error(self) -> RuntimeError {
        match self {
            Unwind::Error(e) => e,
            Unwind::Return(_) => RuntimeError::type_error("`return` outside of a function"),
            Unwind::Break => RuntimeError::type_error("`break` outside of a loop"),
            Unwind::Continue => RuntimeError::type_error("`continue` outside of a loop"),
        }
    }
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

/// Result of evaluating a statement or expression
pub type EvalResult<T = Value> = Result<T, Unwind>;

/// Check that `args` has exactly `expected` elements, returning an arity error if not.
pub fn check_arity<T>(name: &str, args: &[T], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        Err(RuntimeError::arity_mismatch(
            name,
            &expected.to_string(),
            args.len(),
        ))
    } else {
        Ok(())
    }
}
