use std::sync::Arc;

use crate::{
    env::EnvId,
    error::ErrorKind,
    exception::{EvalResult, Flow},
    function::FunctionDef,
    heap::ObjectId,
    interp::Interp,
    modules::wanted,
    value::Value,
};

/// Installs `ABS`, `MAX`, `MIN`, `SQRT`, and `POW` into `env`.
pub(crate) fn install(interp: &mut Interp, env: EnvId, selected: &[String]) -> EvalResult<()> {
    let table: [(&str, usize, fn(&mut Interp, Option<ObjectId>, Vec<Value>) -> EvalResult<Value>); 5] = [
        ("ABS", 1, abs),
        ("MAX", 2, max),
        ("MIN", 2, min),
        ("SQRT", 1, sqrt),
        ("POW", 2, pow),
    ];
    for (name, arity, body) in table {
        if wanted(selected, name) {
            let def = FunctionDef::native(name, arity, env, Arc::new(body));
            interp.envs.define_function(env, name, Arc::new(def));
        }
    }
    Ok(())
}

fn numeric(value: &Value, func: &str) -> EvalResult<f64> {
    value
        .cast_to_dubble()
        .map_err(|_| Flow::fatal(ErrorKind::TypeError, format!("{func} expects a number, got {}", value.type_of())))
}

fn abs(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        other => Ok(Value::Dubble(numeric(other, "ABS")?.abs())),
    }
}

fn max(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
        return Ok(Value::Int(*a.max(b)));
    }
    let a = numeric(&args[0], "MAX")?;
    let b = numeric(&args[1], "MAX")?;
    Ok(Value::Dubble(a.max(b)))
}

fn min(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
        return Ok(Value::Int(*a.min(b)));
    }
    let a = numeric(&args[0], "MIN")?;
    let b = numeric(&args[1], "MIN")?;
    Ok(Value::Dubble(a.min(b)))
}

fn sqrt(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let x = numeric(&args[0], "SQRT")?;
    if x < 0.0 {
        return Err(Flow::throw("Cannot SQRT a negative number"));
    }
    Ok(Value::Dubble(x.sqrt()))
}

fn pow(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let base = numeric(&args[0], "POW")?;
    let exponent = numeric(&args[1], "POW")?;
    Ok(Value::Dubble(base.powf(exponent)))
}
