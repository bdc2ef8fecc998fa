use indexmap::IndexMap;
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    heap::{NativeData, ObjectId},
    interp::Interp,
    value::Value,
};

/// JSON object key marking a marshalled object reference.
///
/// The name is preserved for compatibility with existing hosts of the
/// original runtime.
pub const OBJECT_REF_KEY: &str = "__GoValue_id";

/// A value crossing the embedding boundary.
///
/// This is the public, self-contained counterpart of the interpreter's
/// internal value type: it owns all its data and needs no heap to inspect.
/// Containers convert structurally (`Bukkit` ↔ ordered list, `Baskit` ↔
/// string-keyed map); any other object instance crosses as an opaque
/// [`HostValue::Object`] handle that stays valid until VM reset.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// The unit value `NOTHIN`.
    Nothin,
    Bool(bool),
    Int(i64),
    Dubble(f64),
    Strin(String),
    /// An ordered list, converted element-wise.
    Bukkit(Vec<HostValue>),
    /// A string-keyed map, converted entry-wise in insertion order.
    Baskit(IndexMap<String, HostValue>),
    /// An opaque instance handle (see [`crate::Vm`] introspection methods).
    Object(String),
}

impl From<()> for HostValue {
    fn from((): ()) -> Self {
        Self::Nothin
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Dubble(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::Strin(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::Strin(value)
    }
}

impl HostValue {
    /// Natural JSON rendering, with object handles as
    /// `{"__GoValue_id": "<handle>"}`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Nothin => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::Number((*i).into()),
            Self::Dubble(d) => Number::from_f64(*d).map_or(JsonValue::Null, JsonValue::Number),
            Self::Strin(s) => JsonValue::String(s.clone()),
            Self::Bukkit(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Baskit(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
            Self::Object(handle) => {
                let mut map = Map::new();
                map.insert(OBJECT_REF_KEY.to_owned(), JsonValue::String(handle.clone()));
                JsonValue::Object(map)
            }
        }
    }

    /// The reverse of [`HostValue::to_json`]. JSON objects whose single key
    /// is the object-reference marker become handles; every other object
    /// becomes a `Baskit` keyed by field name.
    pub fn from_json(json: &JsonValue) -> Result<Self, String> {
        match json {
            JsonValue::Null => Ok(Self::Nothin),
            JsonValue::Bool(b) => Ok(Self::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(d) = n.as_f64() {
                    Ok(Self::Dubble(d))
                } else {
                    Err(format!("number {n} does not fit INTEGR or DUBBLE"))
                }
            }
            JsonValue::String(s) => Ok(Self::Strin(s.clone())),
            JsonValue::Array(items) => {
                let converted: Result<Vec<Self>, String> = items.iter().map(Self::from_json).collect();
                Ok(Self::Bukkit(converted?))
            }
            JsonValue::Object(map) => {
                if map.len() == 1
                    && let Some(JsonValue::String(handle)) = map.get(OBJECT_REF_KEY)
                {
                    return Ok(Self::Object(handle.clone()));
                }
                let mut entries = IndexMap::new();
                for (key, value) in map {
                    entries.insert(key.clone(), Self::from_json(value)?);
                }
                Ok(Self::Baskit(entries))
            }
        }
    }
}

/// Converts a host value into a runtime value, allocating containers on the
/// interpreter's heap.
pub(crate) fn host_to_value(interp: &mut Interp, host: &HostValue) -> Result<Value, String> {
    match host {
        HostValue::Nothin => Ok(Value::Nothin),
        HostValue::Bool(b) => Ok(Value::Bool(*b)),
        HostValue::Int(i) => Ok(Value::Int(*i)),
        HostValue::Dubble(d) => Ok(Value::Dubble(*d)),
        HostValue::Strin(s) => Ok(Value::strin(s)),
        HostValue::Bukkit(items) => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                converted.push(host_to_value(interp, item)?);
            }
            Ok(Value::Object(interp.new_bukkit(converted)))
        }
        HostValue::Baskit(entries) => {
            let mut converted = IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                converted.insert(key.clone(), host_to_value(interp, value)?);
            }
            Ok(Value::Object(interp.new_baskit(converted)))
        }
        HostValue::Object(handle) => {
            let id = ObjectId::parse_handle(handle)
                .filter(|id| interp.heap.contains(*id))
                .ok_or_else(|| format!("unknown object handle {handle}"))?;
            Ok(Value::Object(id))
        }
    }
}

/// Converts a runtime value back into a host value.
///
/// BUKKIT and BASKIT instances convert structurally; a self-referential
/// container is a conversion error rather than an infinite loop. Other
/// instances become opaque handles.
pub(crate) fn value_to_host(interp: &Interp, value: &Value) -> Result<HostValue, String> {
    let mut visited = Vec::new();
    value_to_host_inner(interp, value, &mut visited)
}

fn value_to_host_inner(interp: &Interp, value: &Value, visited: &mut Vec<ObjectId>) -> Result<HostValue, String> {
    match value {
        Value::Nothin => Ok(HostValue::Nothin),
        Value::Bool(b) => Ok(HostValue::Bool(*b)),
        Value::Int(i) => Ok(HostValue::Int(*i)),
        Value::Dubble(d) => Ok(HostValue::Dubble(*d)),
        Value::Strin(s) => Ok(HostValue::Strin(s.to_string())),
        Value::Object(id) => {
            if visited.contains(id) {
                return Err("cannot convert a self-referential container".to_owned());
            }
            match &interp.heap.get(*id).native {
                Some(NativeData::Bukkit(items)) => {
                    visited.push(*id);
                    let mut converted = Vec::with_capacity(items.len());
                    for item in items {
                        converted.push(value_to_host_inner(interp, item, visited)?);
                    }
                    visited.pop();
                    Ok(HostValue::Bukkit(converted))
                }
                Some(NativeData::Baskit(entries)) => {
                    visited.push(*id);
                    let mut converted = IndexMap::with_capacity(entries.len());
                    for (key, item) in entries {
                        converted.insert(key.clone(), value_to_host_inner(interp, item, visited)?);
                    }
                    visited.pop();
                    Ok(HostValue::Baskit(converted))
                }
                None => Ok(HostValue::Object(id.handle())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn json_round_trips_scalars_and_containers() {
        let value = HostValue::Baskit(IndexMap::from_iter([
            ("N".to_owned(), HostValue::Int(1)),
            ("D".to_owned(), HostValue::Dubble(1.5)),
            ("S".to_owned(), HostValue::Strin("hi".to_owned())),
            ("B".to_owned(), HostValue::Bool(true)),
            ("NIL".to_owned(), HostValue::Nothin),
            (
                "LIST".to_owned(),
                HostValue::Bukkit(vec![HostValue::Int(1), HostValue::Int(2)]),
            ),
        ]));
        let json = value.to_json();
        assert_eq!(HostValue::from_json(&json).unwrap(), value);
    }

    #[test]
    fn object_refs_marshal_with_the_marker_key() {
        let value = HostValue::Object("0x0000002a".to_owned());
        let json = value.to_json();
        assert_eq!(json.to_string(), r#"{"__GoValue_id":"0x0000002a"}"#);
        assert_eq!(HostValue::from_json(&json).unwrap(), value);
    }

    #[test]
    fn plain_json_objects_become_baskits() {
        let json: JsonValue = serde_json::from_str(r#"{"a": 1, "b": [true, null]}"#).unwrap();
        let value = HostValue::from_json(&json).unwrap();
        let HostValue::Baskit(entries) = value else {
            panic!("expected a BASKIT");
        };
        assert_eq!(entries["a"], HostValue::Int(1));
        assert_eq!(
            entries["b"],
            HostValue::Bukkit(vec![HostValue::Bool(true), HostValue::Nothin])
        );
    }
}
