//! Built-in object types installed in every root environment.

pub(crate) mod baskit;
pub(crate) mod bukkit;
