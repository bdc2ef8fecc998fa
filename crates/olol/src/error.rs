use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Classification of runtime failures surfaced to the embedder.
///
/// The string form matches the variant name (strum), which is what the JSON
/// compatibility shim and error messages print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An `OOPS` (or division by zero) that no `MAYB` caught.
    Exception,
    /// Undefined variable, function, class, or member.
    NameError,
    /// Type mismatch, including writes to a `LOCKD` variable.
    TypeError,
    /// A failed `AS` conversion.
    CastError,
    /// Wrong number of call arguments.
    ArityError,
    /// Access to a private member from outside its owning class.
    VisibilityError,
    /// A module path that resolves to no file.
    ModuleNotFound,
    /// A module that fails to lex or parse.
    ModuleParseError,
    /// An import of a module that is currently executing.
    CircularImport,
    /// Any other import failure (unknown builtin, bad selection).
    ImportError,
}

/// A runtime failure: what went wrong and where it unwound from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// A single lexer or parser diagnostic with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{}: {}", self.line, self.column, self.message)
    }
}

/// Aggregated lexer/parser errors for one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    pub errors: Vec<SyntaxError>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} syntax error(s):", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Every failure mode the embedding API can report.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Source failed to lex or parse.
    Compile(CompileError),
    /// Execution failed; includes uncaught user exceptions.
    Runtime(RuntimeError),
    /// Execution exceeded the configured time bound.
    Timeout { elapsed: Duration },
    /// A host value could not cross the embedding boundary.
    Conversion(String),
    /// The VM configuration was rejected.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => write!(f, "compile error: {err}"),
            Self::Runtime(err) => write!(f, "runtime error: {err}"),
            Self::Timeout { elapsed } => write!(f, "execution timed out after {elapsed:?}"),
            Self::Conversion(msg) => write!(f, "conversion error: {msg}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}
