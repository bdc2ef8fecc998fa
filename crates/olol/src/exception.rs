use std::time::Duration;

use crate::{
    error::{ErrorKind, RuntimeError},
    value::Value,
};

/// A user-catchable exception: `OOPS expr` or division by zero.
///
/// Only the message survives into the `OOPSIE` handler, which binds it as a
/// STRIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Exception {
    pub message: String,
}

impl Exception {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Non-local control flow, propagated through `Result::Err`.
///
/// `Return` is recovered by the nearest function call, `Throw` by the nearest
/// `MAYB`, and the remaining variants unwind all the way to the embedder.
/// This is the signal union the evaluator threads through every `eval_*`
/// call; plain `Ok(value)` is normal completion.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    /// `GIVEZ` - carries the (not yet return-type-cast) value.
    Return(Value),
    /// `OOPS` - catchable by `MAYB`.
    Throw(Exception),
    /// Unrecoverable runtime failure.
    Fatal(RuntimeError),
    /// Deadline or cancellation observed; never catchable in-language.
    Timeout { elapsed: Duration },
}

pub(crate) type EvalResult<T> = Result<T, Flow>;

impl Flow {
    /// Fatal error constructor used throughout the evaluator.
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Fatal(RuntimeError::new(kind, message))
    }

    pub fn throw(message: impl Into<String>) -> Self {
        Self::Throw(Exception::new(message))
    }
}

impl From<RuntimeError> for Flow {
    fn from(err: RuntimeError) -> Self {
        Self::Fatal(err)
    }
}
