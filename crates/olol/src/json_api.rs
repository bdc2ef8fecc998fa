use std::sync::{Arc, RwLock};

use serde_json::{Value as JsonValue, json};

use crate::{
    convert::HostValue,
    error::Error,
    vm::{
        HostClassSpec, HostFunction, HostGetter, HostMethod, HostMethodSpec, HostSetter, HostUnknownMethod,
        HostVarSpec, Vm, VmConfig,
    },
};

/// Host callback bridge: receives `(callback_id, json_args_array)` and must
/// return a JSON object `{"result": <value>, "error": <string|null>}`.
pub type JsonCallbackDispatcher = Arc<dyn Fn(u64, &str) -> String + Send + Sync>;

/// JSON-encoded driving of a [`Vm`], for foreign-language hosts without
/// native bindings.
///
/// Every operation takes a JSON array of arguments and returns a JSON object
/// `{"result": …, "error": …}` with exactly one of the two fields non-null.
/// Object references are marshalled as `{"__GoValue_id": "<handle>"}`.
pub struct JsonApi {
    vm: Vm,
    dispatcher: Arc<RwLock<Option<JsonCallbackDispatcher>>>,
}

impl JsonApi {
    pub fn new(config: VmConfig) -> Result<Self, Error> {
        Ok(Self::from_vm(Vm::new(config)?))
    }

    #[must_use]
    pub fn from_vm(vm: Vm) -> Self {
        Self {
            vm,
            dispatcher: Arc::new(RwLock::new(None)),
        }
    }

    /// The wrapped VM, for mixed native/JSON hosts.
    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Installs the callback bridge used by `define_function` requests.
    pub fn set_dispatcher(&self, dispatcher: JsonCallbackDispatcher) {
        *self.dispatcher.write().expect("dispatcher lock poisoned") = Some(dispatcher);
    }

    /// Performs one operation. Never panics on malformed input; problems
    /// come back in the `error` field.
    pub fn request(&self, op: &str, args_json: &str) -> String {
        match self.dispatch(op, args_json) {
            Ok(result) => json!({ "result": result, "error": null }).to_string(),
            Err(err) => json!({ "result": null, "error": err.to_string() }).to_string(),
        }
    }

    fn dispatch(&self, op: &str, args_json: &str) -> Result<JsonValue, Error> {
        let args: Vec<JsonValue> =
            serde_json::from_str(args_json).map_err(|err| Error::Conversion(format!("malformed arguments: {err}")))?;
        match op {
            "execute" => {
                let source = str_arg(&args, 0)?;
                let outcome = self.vm.execute(source)?;
                Ok(json!({ "value": outcome.value.to_json(), "output": outcome.output }))
            }
            "call" => {
                let name = str_arg(&args, 0)?;
                let call_args = host_args(&args[1..])?;
                let value = self.vm.call(name, &call_args)?;
                Ok(value.to_json())
            }
            "call_method" => {
                let handle = str_arg(&args, 0)?;
                let name = str_arg(&args, 1)?;
                let call_args = host_args(&args[2..])?;
                let value = self.vm.call_method(handle, name, &call_args)?;
                Ok(value.to_json())
            }
            "get_variable" => {
                let name = str_arg(&args, 0)?;
                Ok(self.vm.get_variable(name)?.to_json())
            }
            "set_variable" => {
                let name = str_arg(&args, 0)?;
                let value = value_arg(&args, 1)?;
                self.vm.set_variable(name, &value)?;
                Ok(JsonValue::Null)
            }
            "define_variable" => {
                let name = str_arg(&args, 0)?;
                let value = value_arg(&args, 1)?;
                let locked = args.get(2).and_then(JsonValue::as_bool).unwrap_or(false);
                self.vm.define_variable(name, &value, locked)?;
                Ok(JsonValue::Null)
            }
            "define_function" => {
                let name = str_arg(&args, 0)?;
                let arity = args
                    .get(1)
                    .and_then(JsonValue::as_i64)
                    .ok_or_else(|| Error::Conversion("define_function needs an arity".to_owned()))?;
                let callback_id = args
                    .get(2)
                    .and_then(JsonValue::as_u64)
                    .ok_or_else(|| Error::Conversion("define_function needs a callback id".to_owned()))?;
                let handler = self.callback_handler(callback_id);
                let arity = i32::try_from(arity).map_err(|_| Error::Conversion(format!("invalid arity {arity}")))?;
                self.vm.define_function(name, arity, handler)?;
                Ok(JsonValue::Null)
            }
            "define_class" => {
                let spec = args
                    .first()
                    .and_then(JsonValue::as_object)
                    .ok_or_else(|| Error::Conversion("define_class needs a class object".to_owned()))?;
                self.vm.define_class(self.class_spec_from_json(spec)?)?;
                Ok(JsonValue::Null)
            }
            "object_mro" => {
                let handle = str_arg(&args, 0)?;
                Ok(json!(self.vm.object_mro(handle)?))
            }
            "object_variables" => {
                let handle = str_arg(&args, 0)?;
                Ok(json!(self.vm.object_variables(handle)?))
            }
            "object_functions" => {
                let handle = str_arg(&args, 0)?;
                Ok(json!(self.vm.object_functions(handle)?))
            }
            "object_add_variable" => {
                let handle = str_arg(&args, 0)?;
                let name = str_arg(&args, 1)?;
                let value = value_arg(&args, 2)?;
                self.vm.object_add_variable(handle, name, &value)?;
                Ok(JsonValue::Null)
            }
            "reset" => {
                self.vm.reset();
                Ok(JsonValue::Null)
            }
            other => Err(Error::Conversion(format!("unknown operation {other}"))),
        }
    }

    /// Builds a host function that round-trips through the registered
    /// dispatcher.
    fn callback_handler(&self, callback_id: u64) -> HostFunction {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |args| {
            let json_args: Vec<JsonValue> = args.iter().map(HostValue::to_json).collect();
            dispatch_callback(&dispatcher, callback_id, json_args)
        })
    }

    /// Builds a class from its JSON description.
    ///
    /// Shape: `{"name", "parent"?, "variables": [{"name", "value", "locked"?,
    /// "public"?, "shared"?, "getter_id"?, "setter_id"?}], "methods":
    /// [{"name", "arity", "callback_id"}], "unknown_method_id"?}`. Method,
    /// accessor, and unknown-method callbacks receive the receiver marshalled
    /// as an object reference in the first argument slot (the unknown-method
    /// callback gets the requested name second).
    fn class_spec_from_json(&self, spec: &serde_json::Map<String, JsonValue>) -> Result<HostClassSpec, Error> {
        let name = spec
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Conversion("class needs a name".to_owned()))?;
        let mut class = HostClassSpec::new(name);
        class.parent = spec.get("parent").and_then(JsonValue::as_str).map(str::to_owned);
        for var in spec.get("variables").and_then(JsonValue::as_array).unwrap_or(&Vec::new()) {
            let var_name = var
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| Error::Conversion("class variable needs a name".to_owned()))?;
            let value = HostValue::from_json(var.get("value").unwrap_or(&JsonValue::Null)).map_err(Error::Conversion)?;
            class.variables.push(HostVarSpec {
                locked: var.get("locked").and_then(JsonValue::as_bool).unwrap_or(false),
                public: var.get("public").and_then(JsonValue::as_bool).unwrap_or(true),
                shared: var.get("shared").and_then(JsonValue::as_bool).unwrap_or(false),
                getter: var.get("getter_id").and_then(JsonValue::as_u64).map(|id| self.getter_handler(id)),
                setter: var.get("setter_id").and_then(JsonValue::as_u64).map(|id| self.setter_handler(id)),
                ..HostVarSpec::new(var_name, value)
            });
        }
        for method in spec.get("methods").and_then(JsonValue::as_array).unwrap_or(&Vec::new()) {
            let method_name = method
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| Error::Conversion("class method needs a name".to_owned()))?;
            let arity = method.get("arity").and_then(JsonValue::as_i64).unwrap_or(0);
            let callback_id = method
                .get("callback_id")
                .and_then(JsonValue::as_u64)
                .ok_or_else(|| Error::Conversion(format!("method {method_name} needs a callback id")))?;
            class.methods.push(HostMethodSpec {
                name: method_name.to_owned(),
                arity: i32::try_from(arity).map_err(|_| Error::Conversion(format!("invalid arity {arity}")))?,
                handler: self.method_handler(callback_id),
            });
        }
        if let Some(callback_id) = spec.get("unknown_method_id").and_then(JsonValue::as_u64) {
            class.unknown_method = Some(self.unknown_handler(callback_id));
        }
        Ok(class)
    }

    fn method_handler(&self, callback_id: u64) -> HostMethod {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |handle, args| {
            let mut json_args = vec![object_ref(handle)];
            json_args.extend(args.iter().map(HostValue::to_json));
            dispatch_callback(&dispatcher, callback_id, json_args)
        })
    }

    fn unknown_handler(&self, callback_id: u64) -> HostUnknownMethod {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |handle, name, args| {
            let mut json_args = vec![object_ref(handle), JsonValue::String(name.to_owned())];
            json_args.extend(args.iter().map(HostValue::to_json));
            dispatch_callback(&dispatcher, callback_id, json_args)
        })
    }

    fn getter_handler(&self, callback_id: u64) -> HostGetter {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |handle| dispatch_callback(&dispatcher, callback_id, vec![object_ref(handle)]))
    }

    fn setter_handler(&self, callback_id: u64) -> HostSetter {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |handle, value| {
            dispatch_callback(&dispatcher, callback_id, vec![object_ref(handle), value.to_json()]).map(|_| ())
        })
    }
}

fn object_ref(handle: &str) -> JsonValue {
    HostValue::Object(handle.to_owned()).to_json()
}

/// Invokes the host callback and decodes its `{"result", "error"}` reply.
fn dispatch_callback(
    dispatcher: &RwLock<Option<JsonCallbackDispatcher>>,
    callback_id: u64,
    args: Vec<JsonValue>,
) -> Result<HostValue, String> {
    let Some(dispatcher) = dispatcher.read().expect("dispatcher lock poisoned").clone() else {
        return Err("no callback dispatcher registered".to_owned());
    };
    let json_args = JsonValue::Array(args).to_string();
    let reply = dispatcher(callback_id, &json_args);
    let parsed: JsonValue = serde_json::from_str(&reply).map_err(|err| format!("malformed callback reply: {err}"))?;
    if let Some(error) = parsed.get("error")
        && !error.is_null()
    {
        return Err(error.as_str().map_or_else(|| error.to_string(), str::to_owned));
    }
    HostValue::from_json(parsed.get("result").unwrap_or(&JsonValue::Null))
}

fn str_arg<'a>(args: &'a [JsonValue], index: usize) -> Result<&'a str, Error> {
    args.get(index)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::Conversion(format!("argument {index} must be a string")))
}

fn value_arg(args: &[JsonValue], index: usize) -> Result<HostValue, Error> {
    let json = args
        .get(index)
        .ok_or_else(|| Error::Conversion(format!("argument {index} is missing")))?;
    HostValue::from_json(json).map_err(Error::Conversion)
}

fn host_args(args: &[JsonValue]) -> Result<Vec<HostValue>, Error> {
    args.iter()
        .map(|json| HostValue::from_json(json).map_err(Error::Conversion))
        .collect()
}
