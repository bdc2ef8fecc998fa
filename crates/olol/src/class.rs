use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    ast::TypeName,
    exception::EvalResult,
    function::{FunctionDef, NativeFn},
    heap::ObjectId,
    interp::Interp,
    value::Value,
};

/// Identifier of a class in the [`ClassTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClassId(u32);

impl ClassId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("class table overflow"))
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handler invoked when method lookup fails on a host-defined class.
///
/// Receives the receiver, the requested method name, and the evaluated
/// arguments.
pub(crate) type UnknownHandler = Arc<dyn Fn(&mut Interp, ObjectId, &str, Vec<Value>) -> EvalResult<Value> + Send + Sync>;

/// Optional host accessors attached to a member variable of a host class.
///
/// When present, reads go through `getter` and writes through `setter`
/// instead of the stored slot.
#[derive(Clone, Default)]
pub(crate) struct PropertyHooks {
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
}

impl std::fmt::Debug for PropertyHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyHooks")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Template for one per-instance member variable.
///
/// The initial `value` is evaluated once at class registration and copied
/// into each new instance; scalar values copy by value, object references
/// share the referenced instance.
#[derive(Debug, Clone)]
pub(crate) struct VarTemplate {
    pub type_name: TypeName,
    pub value: Value,
    pub locked: bool,
    pub public: bool,
    pub hooks: PropertyHooks,
    pub docs: Vec<String>,
}

/// A class-level (`SHARD`) variable: exactly one live slot per class.
#[derive(Debug, Clone)]
pub(crate) struct SharedVar {
    pub type_name: TypeName,
    pub value: Value,
    pub locked: bool,
    pub public: bool,
    pub docs: Vec<String>,
}

/// A method with its visibility.
#[derive(Debug, Clone)]
pub(crate) struct MethodEntry {
    pub public: bool,
    pub def: Arc<FunctionDef>,
}

/// A registered class.
///
/// Identity is the qualified name (`module-key::SIMPLE`); the simple name is
/// ambiguous across modules. The MRO is fixed at registration: this class
/// first, then the parent chain outward.
pub(crate) struct ClassDef {
    pub name: String,
    pub qualified: String,
    pub parent: Option<ClassId>,
    pub mro: Vec<ClassId>,
    pub instance_vars: IndexMap<String, VarTemplate>,
    pub shared_vars: IndexMap<String, SharedVar>,
    pub methods: AHashMap<String, MethodEntry>,
    pub docs: Vec<String>,
    pub unknown_handler: Option<UnknownHandler>,
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("qualified", &self.qualified)
            .field("parent", &self.parent)
            .field("mro", &self.mro)
            .field("instance_vars", &self.instance_vars.keys().collect::<Vec<_>>())
            .field("shared_vars", &self.shared_vars.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("unknown_handler", &self.unknown_handler.is_some())
            .finish()
    }
}

impl ClassDef {
    /// An empty class shell; callers fill the member tables before
    /// registration.
    pub fn new(name: &str, qualified: &str) -> Self {
        Self {
            name: name.to_owned(),
            qualified: qualified.to_owned(),
            parent: None,
            mro: Vec::new(),
            instance_vars: IndexMap::new(),
            shared_vars: IndexMap::new(),
            methods: AHashMap::new(),
            docs: Vec::new(),
            unknown_handler: None,
        }
    }
}

/// Registry of every class the VM knows, user-defined and host-defined.
#[derive(Debug, Default)]
pub(crate) struct ClassTable {
    classes: Vec<ClassDef>,
    by_qualified: AHashMap<String, ClassId>,
}

impl ClassTable {
    /// Registers a class, computing its MRO from the (already registered)
    /// parent. Re-registering a qualified name replaces the previous entry
    /// in the name index but never invalidates existing `ClassId`s.
    pub fn register(&mut self, mut def: ClassDef) -> ClassId {
        let id = ClassId::new(self.classes.len());
        let mut mro = vec![id];
        if let Some(parent) = def.parent {
            mro.extend(self.get(parent).mro.iter().copied());
        }
        def.mro = mro;
        self.by_qualified.insert(def.qualified.clone(), id);
        self.classes.push(def);
        id
    }

    pub fn get(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.index()]
    }

    pub fn get_mut(&mut self, id: ClassId) -> &mut ClassDef {
        &mut self.classes[id.index()]
    }

    pub fn by_qualified(&self, qualified: &str) -> Option<ClassId> {
        self.by_qualified.get(qualified).copied()
    }

    /// The MRO as qualified names, most specific first (embedding
    /// introspection surface).
    pub fn mro_names(&self, id: ClassId) -> Vec<String> {
        self.get(id)
            .mro
            .iter()
            .map(|c| self.get(*c).qualified.clone())
            .collect()
    }

    /// Walks the MRO of `class` for a method, returning the declaring class
    /// and entry of the most specific match.
    pub fn find_method(&self, class: ClassId, name: &str) -> Option<(ClassId, &MethodEntry)> {
        for owner in &self.get(class).mro {
            if let Some(entry) = self.get(*owner).methods.get(name) {
                return Some((*owner, entry));
            }
        }
        None
    }

    /// Walks the MRO for a per-instance member variable template.
    pub fn find_instance_var(&self, class: ClassId, name: &str) -> Option<(ClassId, &VarTemplate)> {
        for owner in &self.get(class).mro {
            if let Some(template) = self.get(*owner).instance_vars.get(name) {
                return Some((*owner, template));
            }
        }
        None
    }

    /// Walks the MRO for a shared (class-level) variable.
    pub fn find_shared_var(&self, class: ClassId, name: &str) -> Option<ClassId> {
        for owner in &self.get(class).mro {
            if self.get(*owner).shared_vars.contains_key(name) {
                return Some(*owner);
            }
        }
        None
    }

    /// True when `class` is `target` or inherits from it.
    pub fn is_instance_of(&self, class: ClassId, target: ClassId) -> bool {
        self.get(class).mro.contains(&target)
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.by_qualified.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mro_is_linear_most_specific_first() {
        let mut table = ClassTable::default();
        let a = table.register(ClassDef::new("A", "<main>::A"));
        let mut b_def = ClassDef::new("B", "<main>::B");
        b_def.parent = Some(a);
        let b = table.register(b_def);
        let mut c_def = ClassDef::new("C", "<main>::C");
        c_def.parent = Some(b);
        let c = table.register(c_def);
        assert_eq!(table.mro_names(c), vec!["<main>::C", "<main>::B", "<main>::A"]);
        assert!(table.is_instance_of(c, a));
        assert!(!table.is_instance_of(a, c));
    }

    #[test]
    fn method_lookup_prefers_most_specific() {
        let mut table = ClassTable::default();
        let mut a_def = ClassDef::new("A", "<main>::A");
        a_def.methods.insert(
            "SPEAK".to_owned(),
            MethodEntry {
                public: true,
                def: Arc::new(crate::function::FunctionDef::native(
                    "SPEAK",
                    0,
                    crate::env::EnvId::default_for_tests(),
                    Arc::new(|_, _, _| Ok(Value::Int(1))),
                )),
            },
        );
        let a = table.register(a_def);
        let mut b_def = ClassDef::new("B", "<main>::B");
        b_def.parent = Some(a);
        b_def.methods.insert(
            "SPEAK".to_owned(),
            MethodEntry {
                public: true,
                def: Arc::new(crate::function::FunctionDef::native(
                    "SPEAK",
                    0,
                    crate::env::EnvId::default_for_tests(),
                    Arc::new(|_, _, _| Ok(Value::Int(2))),
                )),
            },
        );
        let b = table.register(b_def);
        let (owner, _) = table.find_method(b, "SPEAK").unwrap();
        assert_eq!(owner, b);
        let (owner, _) = table.find_method(a, "SPEAK").unwrap();
        assert_eq!(owner, a);
    }
}
