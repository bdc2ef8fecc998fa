use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    env::EnvId,
    exception::EvalResult,
    function::FunctionDef,
    heap::ObjectId,
    interp::Interp,
    modules::wanted,
    value::Value,
};

/// Installs `NOW` (seconds since the Unix epoch) into `env`.
pub(crate) fn install(interp: &mut Interp, env: EnvId, selected: &[String]) -> EvalResult<()> {
    if wanted(selected, "NOW") {
        let def = FunctionDef::native("NOW", 0, env, Arc::new(now));
        interp.envs.define_function(env, "NOW", Arc::new(def));
    }
    Ok(())
}

fn now(_interp: &mut Interp, _recv: Option<ObjectId>, _args: Vec<Value>) -> EvalResult<Value> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(Value::Int(seconds as i64))
}
