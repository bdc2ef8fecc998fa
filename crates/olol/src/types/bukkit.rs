use std::sync::Arc;

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

/// Qualified name of the builtin list class.
pub(crate) const QUALIFIED: &str = "<builtin>::BUKKIT";

/// Registers the BUKKIT class and binds its simple name in `env`.
pub(crate) fn register(classes: &mut ClassTable, envs: &mut Environments, env: EnvId) -> ClassId {
    let mut def = ClassDef::new("BUKKIT", QUALIFIED);
    let mut method = |name: &str, arity: usize, body: fn(&mut Interp, Option<ObjectId>, Vec<Value>) -> EvalResult<Value>| {
        def.methods.insert(
            name.to_owned(),
            MethodEntry {
                public: true,
                def: Arc::new(FunctionDef::native(name, arity, env, Arc::new(body))),
            },
        );
    };
    method("PUSH", 1, push);
    method("POP", 0, pop);
    method("AT", 1, at);
    method("SET", 2, set);
    method("SIZ", 0, siz);
    let id = classes.register(def);
    envs.define_class(env, "BUKKIT", id);
    id
}

fn items_mut<'a>(interp: &'a mut Interp, recv: Option<ObjectId>) -> EvalResult<&'a mut Vec<Value>> {
    let id = recv.ok_or_else(|| Flow::fatal(ErrorKind::TypeError, "BUKKIT method called without a receiver"))?;
    match &mut interp.heap.get_mut(id).native {
        Some(NativeData::Bukkit(items)) => Ok(items),
        _ => Err(Flow::fatal(ErrorKind::TypeError, "receiver is not a BUKKIT")),
    }
}

fn index_arg(items_len: usize, arg: &Value) -> EvalResult<usize> {
    let index = arg
        .cast_to_int()
        .map_err(|msg| Flow::fatal(ErrorKind::TypeError, msg))?;
    let valid = usize::try_from(index).ok().filter(|i| *i < items_len);
    valid.ok_or_else(|| Flow::throw(format!("Index {index} out of range")))
}

fn push(interp: &mut Interp, recv: Option<ObjectId>, mut args: Vec<Value>) -> EvalResult<Value> {
    let value = args.pop().expect("arity checked");
    items_mut(interp, recv)?.push(value);
    Ok(Value::Nothin)
}

fn pop(interp: &mut Interp, recv: Option<ObjectId>, _args: Vec<Value>) -> EvalResult<Value> {
    items_mut(interp, recv)?
        .pop()
        .ok_or_else(|| Flow::throw("Cannot POP an empty BUKKIT"))
}

fn at(interp: &mut Interp, recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let items = items_mut(interp, recv)?;
    let index = index_arg(items.len(), &args[0])?;
    Ok(items[index].clone())
}

fn set(interp: &mut Interp, recv: Option<ObjectId>, mut args: Vec<Value>) -> EvalResult<Value> {
    let value = args.pop().expect("arity checked");
    let items = items_mut(interp, recv)?;
    let index = index_arg(items.len(), &args[0])?;
    items[index] = value;
    Ok(Value::Nothin)
}

fn siz(interp: &mut Interp, recv: Option<ObjectId>, _args: Vec<Value>) -> EvalResult<Value> {
    let len = items_mut(interp, recv)?.len();
    Ok(Value::Int(len as i64))
}
