use std::{fmt, sync::Arc};

use crate::{
    ast::{Block, Param, TypeName},
    env::EnvId,
    exception::EvalResult,
    heap::ObjectId,
    interp::Interp,
    value::Value,
};

/// Signature of a native (host- or stdlib-provided) callable.
///
/// Receives the interpreter context, the receiver for method calls, and the
/// already-evaluated argument values.
pub(crate) type NativeFn = Arc<dyn Fn(&mut Interp, Option<ObjectId>, Vec<Value>) -> EvalResult<Value> + Send + Sync>;

/// A function body: user AST or a native callable.
#[derive(Clone)]
pub(crate) enum FuncBody {
    Ast(Arc<Block>),
    Native(NativeFn),
}

impl fmt::Debug for FuncBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ast(block) => f.debug_tuple("Ast").field(&block.stmts.len()).finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A callable function or method, ready for invocation.
///
/// For AST bodies, `captured_env` is the environment in effect at the
/// definition site; calls chain their frame off it (lexical scope). Native
/// bodies ignore it.
#[derive(Debug)]
pub(crate) struct FunctionDef {
    pub name: String,
    pub return_type: Option<TypeName>,
    pub params: Vec<Param>,
    pub body: FuncBody,
    /// Class-level (one copy per class) rather than per-instance.
    pub shared: bool,
    /// Qualified name of the declaring class for methods; `None` for free
    /// functions.
    pub owner_class: Option<String>,
    pub captured_env: EnvId,
    /// Accepts any argument count; parameters are not bound by name, the
    /// call instead exposes `ARGC` and `ARG1..ARGN`.
    pub variadic: bool,
    pub docs: Vec<String>,
}

impl FunctionDef {
    /// A native function with a fixed arity. Parameter names are synthesized
    /// since natives never look them up.
    pub(crate) fn native(name: &str, arity: usize, env: EnvId, body: NativeFn) -> Self {
        let params = (0..arity)
            .map(|i| Param {
                name: format!("ARG{}", i + 1),
                type_name: TypeName::Nothin,
            })
            .collect();
        Self {
            name: name.to_owned(),
            return_type: None,
            params,
            body: FuncBody::Native(body),
            shared: false,
            owner_class: None,
            captured_env: env,
            variadic: false,
            docs: Vec::new(),
        }
    }

    /// A native function accepting any number of arguments.
    pub(crate) fn native_variadic(name: &str, env: EnvId, body: NativeFn) -> Self {
        Self {
            variadic: true,
            ..Self::native(name, 0, env, body)
        }
    }
}
