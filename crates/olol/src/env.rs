use std::sync::Arc;

use ahash::AHashMap;

use crate::{ast::TypeName, class::ClassId, function::FunctionDef, value::Value};

/// Identifier of a scope frame in [`Environments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EnvId(u32);

impl EnvId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("environment arena overflow"))
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    /// A placeholder id for unit tests that never dereference it.
    #[cfg(test)]
    pub(crate) fn default_for_tests() -> Self {
        Self(0)
    }
}

/// A variable binding: declared type, current value, and the locked flag.
///
/// `locked` bindings reject every assignment after their declaration
/// initialized them.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub type_name: TypeName,
    pub value: Value,
    pub locked: bool,
}

/// One scope frame: three disjoint uppercase-keyed tables plus a parent link.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    parent: Option<EnvId>,
    pub variables: AHashMap<String, Binding>,
    pub functions: AHashMap<String, Arc<FunctionDef>>,
    pub classes: AHashMap<String, ClassId>,
}

/// Arena of scope frames.
///
/// Frames are address-stable through ids rather than parent pointers, the
/// same central-storage pattern the interpreter uses for instances. Module
/// environments and environments captured by function definitions outlive the
/// call that created them, so frames are never freed; they vanish together
/// at reset.
#[derive(Debug, Default)]
pub(crate) struct Environments {
    frames: Vec<Frame>,
}

impl Environments {
    /// Creates a new frame; `parent` is `None` only for root environments.
    pub fn new_env(&mut self, parent: Option<EnvId>) -> EnvId {
        let id = EnvId::new(self.frames.len());
        self.frames.push(Frame {
            parent,
            ..Frame::default()
        });
        id
    }

    pub fn frame(&self, id: EnvId) -> &Frame {
        &self.frames[id.index()]
    }

    pub fn frame_mut(&mut self, id: EnvId) -> &mut Frame {
        &mut self.frames[id.index()]
    }

    pub fn parent(&self, id: EnvId) -> Option<EnvId> {
        self.frames[id.index()].parent
    }

    /// Defines a variable in `env` itself, replacing any same-name binding in
    /// that frame (shadowing of outer frames is implicit).
    pub fn define_variable(&mut self, env: EnvId, name: &str, binding: Binding) {
        self.frame_mut(env).variables.insert(name.to_owned(), binding);
    }

    pub fn define_function(&mut self, env: EnvId, name: &str, def: Arc<FunctionDef>) {
        self.frame_mut(env).functions.insert(name.to_owned(), def);
    }

    pub fn define_class(&mut self, env: EnvId, name: &str, class: ClassId) {
        self.frame_mut(env).classes.insert(name.to_owned(), class);
    }

    /// Finds the frame (searching `env` and its parents) that binds `name`
    /// as a variable.
    pub fn resolve_variable(&self, env: EnvId, name: &str) -> Option<EnvId> {
        let mut current = Some(env);
        while let Some(id) = current {
            if self.frame(id).variables.contains_key(name) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn lookup_variable(&self, env: EnvId, name: &str) -> Option<&Binding> {
        let frame = self.resolve_variable(env, name)?;
        self.frame(frame).variables.get(name)
    }

    pub fn lookup_function(&self, env: EnvId, name: &str) -> Option<Arc<FunctionDef>> {
        let mut current = Some(env);
        while let Some(id) = current {
            if let Some(def) = self.frame(id).functions.get(name) {
                return Some(def.clone());
            }
            current = self.parent(id);
        }
        None
    }

    pub fn lookup_class(&self, env: EnvId, name: &str) -> Option<ClassId> {
        let mut current = Some(env);
        while let Some(id) = current {
            if let Some(class) = self.frame(id).classes.get(name) {
                return Some(*class);
            }
            current = self.parent(id);
        }
        None
    }
}
