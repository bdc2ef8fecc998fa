//! Builtin modules, importable with `I CAN HAS NAME?`.
//!
//! Each module exposes an installer that defines its functions into the
//! importing environment, honoring the selective-import list. The resolver
//! keeps the registry; [`register_defaults`] seeds it with the stock modules.

use crate::resolver::Resolver;

pub(crate) mod math;
pub(crate) mod stdio;
pub(crate) mod string_mod;
pub(crate) mod time;

pub(crate) fn register_defaults(resolver: &mut Resolver) {
    resolver.register_builtin("STDIO", std::sync::Arc::new(stdio::install));
    resolver.register_builtin("MATH", std::sync::Arc::new(math::install));
    resolver.register_builtin("STRING", std::sync::Arc::new(string_mod::install));
    resolver.register_builtin("TIME", std::sync::Arc::new(time::install));
}

/// True when `name` survives the selective-import list (empty list = all).
pub(crate) fn wanted(selected: &[String], name: &str) -> bool {
    selected.is_empty() || selected.iter().any(|s| s == name)
}
