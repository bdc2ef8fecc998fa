use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    class::{ClassDef, ClassId, ClassTable, MethodEntry},
    env::{EnvId, Environments},
    error::ErrorKind,
    exception::{EvalResult, Flow},
    function::FunctionDef,
    heap::{NativeData, ObjectId},
    interp::Interp,
    value::Value,
};

/// Qualified name of the builtin map class.
pub(crate) const QUALIFIED: &str = "<builtin>::BASKIT";

/// Registers the BASKIT class and binds its simple name in `env`.
pub(crate) fn register(classes: &mut ClassTable, envs: &mut Environments, env: EnvId) -> ClassId {
    let mut def = ClassDef::new("BASKIT", QUALIFIED);
    let mut method = |name: &str, arity: usize, body: fn(&mut Interp, Option<ObjectId>, Vec<Value>) -> EvalResult<Value>| {
        def.methods.insert(
            name.to_owned(),
            MethodEntry {
                public: true,
                def: Arc::new(FunctionDef::native(name, arity, env, Arc::new(body))),
            },
        );
    };
    method("PUT", 2, put);
    method("GET", 1, get);
    method("HAS", 1, has);
    method("REMOVE", 1, remove);
    method("SIZ", 0, siz);
    let id = classes.register(def);
    envs.define_class(env, "BASKIT", id);
    id
}

fn entries_mut<'a>(interp: &'a mut Interp, recv: Option<ObjectId>) -> EvalResult<&'a mut IndexMap<String, Value>> {
    let id = recv.ok_or_else(|| Flow::fatal(ErrorKind::TypeError, "BASKIT method called without a receiver"))?;
    match &mut interp.heap.get_mut(id).native {
        Some(NativeData::Baskit(entries)) => Ok(entries),
        _ => Err(Flow::fatal(ErrorKind::TypeError, "receiver is not a BASKIT")),
    }
}

fn key_arg(value: &Value) -> EvalResult<String> {
    value
        .scalar_to_strin()
        .ok_or_else(|| Flow::fatal(ErrorKind::TypeError, "BASKIT keys must be scalar values"))
}

fn put(interp: &mut Interp, recv: Option<ObjectId>, mut args: Vec<Value>) -> EvalResult<Value> {
    let value = args.pop().expect("arity checked");
    let key = key_arg(&args[0])?;
    entries_mut(interp, recv)?.insert(key, value);
    Ok(Value::Nothin)
}

fn get(interp: &mut Interp, recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let key = key_arg(&args[0])?;
    entries_mut(interp, recv)?
        .get(&key)
        .cloned()
        .ok_or_else(|| Flow::throw(format!("Key not found: {key}")))
}

fn has(interp: &mut Interp, recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let key = key_arg(&args[0])?;
    let present = entries_mut(interp, recv)?.contains_key(&key);
    Ok(Value::Bool(present))
}

fn remove(interp: &mut Interp, recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let key = key_arg(&args[0])?;
    entries_mut(interp, recv)?
        .shift_remove(&key)
        .ok_or_else(|| Flow::throw(format!("Key not found: {key}")))
}

fn siz(interp: &mut Interp, recv: Option<ObjectId>, _args: Vec<Value>) -> EvalResult<Value> {
    let len = entries_mut(interp, recv)?.len();
    Ok(Value::Int(len as i64))
}
