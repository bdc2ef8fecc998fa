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

/// Installs `LEN`, `UPPER`, `LOWER`, `TRIM`, `CONTAINS`, and `SPLIT` into
/// `env`.
pub(crate) fn install(interp: &mut Interp, env: EnvId, selected: &[String]) -> EvalResult<()> {
    let table: [(&str, usize, fn(&mut Interp, Option<ObjectId>, Vec<Value>) -> EvalResult<Value>); 6] = [
        ("LEN", 1, len),
        ("UPPER", 1, upper),
        ("LOWER", 1, lower),
        ("TRIM", 1, trim),
        ("CONTAINS", 2, contains),
        ("SPLIT", 2, split),
    ];
    for (name, arity, body) in table {
        if wanted(selected, name) {
            let def = FunctionDef::native(name, arity, env, Arc::new(body));
            interp.envs.define_function(env, name, Arc::new(def));
        }
    }
    Ok(())
}

fn text_arg(value: &Value, func: &str) -> EvalResult<String> {
    value
        .scalar_to_strin()
        .ok_or_else(|| Flow::fatal(ErrorKind::TypeError, format!("{func} expects a STRIN, got {}", value.type_of())))
}

fn len(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let text = text_arg(&args[0], "LEN")?;
    Ok(Value::Int(text.chars().count() as i64))
}

fn upper(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::strin(text_arg(&args[0], "UPPER")?.to_uppercase()))
}

fn lower(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::strin(text_arg(&args[0], "LOWER")?.to_lowercase()))
}

fn trim(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::strin(text_arg(&args[0], "TRIM")?.trim()))
}

fn contains(_interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let haystack = text_arg(&args[0], "CONTAINS")?;
    let needle = text_arg(&args[1], "CONTAINS")?;
    Ok(Value::Bool(haystack.contains(&needle)))
}

/// Splits on a separator into a BUKKIT of STRINs. An empty separator splits
/// into individual characters.
fn split(interp: &mut Interp, _recv: Option<ObjectId>, args: Vec<Value>) -> EvalResult<Value> {
    let text = text_arg(&args[0], "SPLIT")?;
    let separator = text_arg(&args[1], "SPLIT")?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::strin(c.to_string())).collect()
    } else {
        text.split(&separator).map(Value::strin).collect()
    };
    Ok(Value::Object(interp.new_bukkit(parts)))
}
