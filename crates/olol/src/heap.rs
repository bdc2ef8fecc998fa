use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{class::ClassId, value::Value};

/// Identifier of an object instance in the [`Heap`].
///
/// Ids are never reused, so an `ObjectId` (and the string handle derived from
/// it) stays valid for the life of the VM, until `reset`. This is the opaque
/// identity the embedding layer hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ObjectId(u32);

impl ObjectId {
    pub fn new(index: usize) -> Self {
        Self(index.try_into().expect("instance arena overflow"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Stable string identity used by the embedding layer and the JSON shim.
    pub fn handle(self) -> String {
        format!("0x{:08x}", self.0)
    }

    /// Parses a handle previously produced by [`ObjectId::handle`].
    pub fn parse_handle(handle: &str) -> Option<Self> {
        let hex = handle.strip_prefix("0x")?;
        u32::from_str_radix(hex, 16).ok().map(Self)
    }
}

/// Built-in payload carried by BUKKIT and BASKIT instances.
///
/// These two container types are ordinary object instances whose methods are
/// native; the payload holds the actual elements.
#[derive(Debug, Clone)]
pub(crate) enum NativeData {
    /// Ordered list of values.
    Bukkit(Vec<Value>),
    /// String-keyed map with insertion order.
    Baskit(IndexMap<String, Value>),
}

/// One object instance.
///
/// Per-instance member variables are keyed first by the qualified name of the
/// declaring class, then by member name, so a member shadowed along the MRO
/// keeps one slot per declaring class. Shared members are not stored here;
/// they live on the class.
#[derive(Debug)]
pub(crate) struct Instance {
    pub class: ClassId,
    pub vars: AHashMap<String, AHashMap<String, Value>>,
    pub native: Option<NativeData>,
}

/// Arena of object instances.
///
/// Instances are allocated for `NEW`, host conversions, and BUKKIT/BASKIT
/// construction, and stay alive until [`Heap::clear`] (driven by VM reset).
/// Index stability is what makes embedding handles work.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    objects: Vec<Instance>,
}

impl Heap {
    pub fn allocate(&mut self, instance: Instance) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.objects.push(instance);
        id
    }

    pub fn get(&self, id: ObjectId) -> &Instance {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut Instance {
        &mut self.objects[id.index()]
    }

    /// Checks a host-supplied id without panicking on stale handles.
    pub fn contains(&self, id: ObjectId) -> bool {
        id.index() < self.objects.len()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_round_trip() {
        let id = ObjectId::new(42);
        assert_eq!(ObjectId::parse_handle(&id.handle()), Some(id));
        assert_eq!(ObjectId::parse_handle("not-a-handle"), None);
    }
}
