use std::sync::Arc;

use crate::{
    env::EnvId,
    exception::EvalResult,
    function::FunctionDef,
    heap::ObjectId,
    interp::Interp,
    modules::wanted,
    value::Value,
};

/// Installs `SAY`, `SAYZ`, and `GIMME` into `env`.
pub(crate) fn install(interp: &mut Interp, env: EnvId, selected: &[String]) -> EvalResult<()> {
    if wanted(selected, "SAY") {
        let def = FunctionDef::native("SAY", 1, env, Arc::new(say));
        interp.envs.define_function(env, "SAY", Arc::new(def));
    }
    if wanted(selected, "SAYZ") {
        let def = FunctionDef::native("SAYZ", 1, env, Arc::new(sayz));
        interp.envs.define_function(env, "SAYZ", Arc::new(def));
    }
    if wanted(selected, "GIMME") {
        let def = FunctionDef::native("GIMME", 0, env, Arc::new(gimme));
        interp.envs.define_function(env, "GIMME", Arc::new(def));
    }
    Ok(())
}

fn say(interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let text = interp.display_value(&args[0]);
    interp.out.write(&text);
    Ok(Value::Nothin)
}

fn sayz(interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let text = interp.display_value(&args[0]);
    interp.out.write(&text);
    interp.out.push_newline();
    Ok(Value::Nothin)
}

fn gimme(interp: &mut Interp, _recv: Option<ObjectId>, _args: Vec<Value>) -> EvalResult<Value> {
    let line = interp.input.read_line().unwrap_or_default();
    Ok(Value::strin(line))
}
