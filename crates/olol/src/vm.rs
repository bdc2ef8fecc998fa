use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    class::{ClassDef, MethodEntry, PropertyHooks, SharedVar, VarTemplate},
    convert::{HostValue, host_to_value, value_to_host},
    env::Binding,
    error::{CompileError, Error, ErrorKind, RuntimeError},
    exception::{EvalResult, Exception, Flow},
    function::{FunctionDef, NativeFn},
    heap::ObjectId,
    interp::{HOST_MODULE_KEY, Interp},
    io::{CollectStringPrint, InputReader, NoInput, PrintWriter, StdInput, StdPrint},
    parser,
    resource::CancelFlag,
    trace::StderrTracer,
    value::Value,
};

/// A host-registered global function: receives converted argument values,
/// returns a value or an error message (raised as a catchable exception).
pub type HostFunction = Arc<dyn Fn(&[HostValue]) -> Result<HostValue, String> + Send + Sync>;

/// A host-registered method: receives the receiver's handle and the
/// converted arguments.
pub type HostMethod = Arc<dyn Fn(&str, &[HostValue]) -> Result<HostValue, String> + Send + Sync>;

/// Fallback invoked when method lookup fails on a host class: receives the
/// receiver's handle, the requested method name, and the arguments.
pub type HostUnknownMethod = Arc<dyn Fn(&str, &str, &[HostValue]) -> Result<HostValue, String> + Send + Sync>;

/// Computed read accessor for a host class variable.
pub type HostGetter = Arc<dyn Fn(&str) -> Result<HostValue, String> + Send + Sync>;

/// Write accessor for a host class variable.
pub type HostSetter = Arc<dyn Fn(&str, &HostValue) -> Result<(), String> + Send + Sync>;

/// Variadic arity marker for [`Vm::define_function`].
pub const VARIADIC: i32 = -1;

/// One member variable of a host-defined class.
pub struct HostVarSpec {
    pub name: String,
    /// Initial value (also fixes the member's declared type).
    pub value: HostValue,
    pub locked: bool,
    pub public: bool,
    pub shared: bool,
    /// Optional computed read accessor.
    pub getter: Option<HostGetter>,
    /// Optional write accessor.
    pub setter: Option<HostSetter>,
}

impl HostVarSpec {
    /// A plain public, unlocked, per-instance variable.
    #[must_use]
    pub fn new(name: &str, value: HostValue) -> Self {
        Self {
            name: name.to_owned(),
            value,
            locked: false,
            public: true,
            shared: false,
            getter: None,
            setter: None,
        }
    }
}

/// One method of a host-defined class.
pub struct HostMethodSpec {
    pub name: String,
    /// Argument count; [`VARIADIC`] accepts any.
    pub arity: i32,
    pub handler: HostMethod,
}

/// A host-defined class for [`Vm::define_class`].
pub struct HostClassSpec {
    pub name: String,
    /// Simple name of an already-defined class (host or user).
    pub parent: Option<String>,
    pub variables: Vec<HostVarSpec>,
    pub methods: Vec<HostMethodSpec>,
    /// Fallback for calls to undeclared methods.
    pub unknown_method: Option<HostUnknownMethod>,
}

impl HostClassSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            variables: Vec::new(),
            methods: Vec::new(),
            unknown_method: None,
        }
    }
}

/// VM construction options.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Base directory for resolving relative module imports.
    pub base_dir: PathBuf,
    /// Default time bound applied by [`Vm::execute`]; `None` means no bound.
    pub timeout: Option<Duration>,
    /// Capture program output and return it from `execute` (the default)
    /// instead of passing it through to the process stdout.
    pub capture_output: bool,
    /// Let `GIMME` read the process stdin instead of always reporting end of
    /// input.
    pub use_stdin: bool,
    /// Report execution events on stderr.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            timeout: None,
            capture_output: true,
            use_stdin: false,
            trace: false,
        }
    }
}

/// Result of one `execute`: the `MAIN` return value and the captured output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub value: HostValue,
    pub output: String,
}

#[derive(Debug)]
struct VmState {
    interp: Interp,
}

/// The embedding facade: one configured interpreter behind a
/// shared/exclusive operation gate.
///
/// Read-style operations (`call`, `call_method`, `get_variable`, handle
/// introspection) take the gate shared; mutating operations (`execute`,
/// `set_variable`, `define_*`, `reset`) take it exclusively, so a writer
/// excludes every reader. The gate orders host threads; the interpreter
/// state itself sits behind its own mutex and is never observed mid-write.
#[derive(Debug)]
pub struct Vm {
    gate: RwLock<()>,
    state: Mutex<VmState>,
    config: VmConfig,
}

impl Vm {
    /// Creates a VM, validating the configuration.
    pub fn new(config: VmConfig) -> Result<Self, Error> {
        if config.base_dir.as_os_str().is_empty() {
            return Err(Error::Config("base_dir must not be empty".to_owned()));
        }
        if config.timeout == Some(Duration::ZERO) {
            return Err(Error::Config("timeout must be positive".to_owned()));
        }
        let interp = build_interp(&config);
        Ok(Self {
            gate: RwLock::new(()),
            state: Mutex::new(VmState { interp }),
            config,
        })
    }

    /// A VM with default configuration.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(VmConfig::default())
    }

    fn lock_state(&self) -> MutexGuard<'_, VmState> {
        self.state.lock().expect("VM state lock poisoned")
    }

    // ---- execution ----

    /// Parses and evaluates `source`, applying the configured timeout.
    ///
    /// Returns the `MAIN` return value (or `NOTHIN`) converted to a host
    /// value, together with the captured output.
    pub fn execute(&self, source: &str) -> Result<ExecOutcome, Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        execute_locked(&mut state, source, self.config.timeout, None)
    }

    /// Like [`Vm::execute`] with an explicit time bound.
    pub fn execute_with_timeout(&self, source: &str, timeout: Duration) -> Result<ExecOutcome, Error> {
        if timeout == Duration::ZERO {
            return Err(Error::Config("timeout must be positive".to_owned()));
        }
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        execute_locked(&mut state, source, Some(timeout), None)
    }

    /// Like [`Vm::execute`], aborting when `cancel` becomes true.
    pub fn execute_with_cancellation(&self, source: &str, cancel: CancelFlag) -> Result<ExecOutcome, Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        execute_locked(&mut state, source, self.config.timeout, Some(cancel))
    }

    // ---- calls ----

    /// Invokes a global function by (case-insensitive) name.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let name = name.to_uppercase();
        let interp = &mut state.interp;
        let global = interp.global_env;
        let Some(def) = interp.envs.lookup_function(global, &name) else {
            return Err(Error::Runtime(RuntimeError::new(
                ErrorKind::NameError,
                format!("undefined function {name}"),
            )));
        };
        let argv = convert_args(interp, args)?;
        interp.tracker = crate::resource::Tracker::unbounded();
        let result = interp.call_function(def, None, argv);
        finish_value(interp, result)
    }

    /// Invokes a method on an object handle.
    pub fn call_method(&self, handle: &str, name: &str, args: &[HostValue]) -> Result<HostValue, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let id = lookup_handle(interp, handle)?;
        let argv = convert_args(interp, args)?;
        interp.tracker = crate::resource::Tracker::unbounded();
        let result = interp.call_method(id, &name.to_uppercase(), argv);
        finish_value(interp, result)
    }

    // ---- globals ----

    /// Reads a global variable.
    pub fn get_variable(&self, name: &str) -> Result<HostValue, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let state = self.lock_state();
        let interp = &state.interp;
        let Some(binding) = interp.envs.lookup_variable(interp.global_env, &name.to_uppercase()) else {
            return Err(Error::Runtime(RuntimeError::new(
                ErrorKind::NameError,
                format!("undefined variable {name}"),
            )));
        };
        value_to_host(interp, &binding.value).map_err(Error::Conversion)
    }

    /// Assigns an existing global variable (cast to its declared type,
    /// locked bindings rejected).
    pub fn set_variable(&self, name: &str, value: &HostValue) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let converted = host_to_value(interp, value).map_err(Error::Conversion)?;
        let global = interp.global_env;
        let result = interp.assign_identifier(&name.to_uppercase(), converted, global);
        map_unit(result)
    }

    /// Defines (or redefines) a global variable; its declared type is taken
    /// from the value.
    pub fn define_variable(&self, name: &str, value: &HostValue, locked: bool) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let converted = host_to_value(interp, value).map_err(Error::Conversion)?;
        let type_name = interp.dynamic_type_of(&converted);
        let global = interp.global_env;
        interp.envs.define_variable(
            global,
            &name.to_uppercase(),
            Binding {
                type_name,
                value: converted,
                locked,
            },
        );
        Ok(())
    }

    // ---- host definitions ----

    /// Registers a host function in the global environment. `arity` of
    /// [`VARIADIC`] accepts any argument count.
    pub fn define_function(&self, name: &str, arity: i32, handler: HostFunction) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let name = name.to_uppercase();
        let global = interp.global_env;
        let native = wrap_host_function(handler);
        let def = if arity == VARIADIC {
            FunctionDef::native_variadic(&name, global, native)
        } else {
            let arity = usize::try_from(arity)
                .map_err(|_| Error::Config(format!("invalid arity {arity} for function {name}")))?;
            FunctionDef::native(&name, arity, global, native)
        };
        interp.envs.define_function(global, &name, Arc::new(def));
        Ok(())
    }

    /// Registers a host class: variables (with optional accessors), methods,
    /// and an optional unknown-method fallback.
    pub fn define_class(&self, spec: HostClassSpec) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let name = spec.name.to_uppercase();
        let qualified = format!("{HOST_MODULE_KEY}::{name}");
        let global = interp.global_env;

        let mut def = ClassDef::new(&name, &qualified);
        if let Some(parent) = &spec.parent {
            let parent_name = parent.to_uppercase();
            let Some(parent_id) = interp.envs.lookup_class(global, &parent_name) else {
                return Err(Error::Runtime(RuntimeError::new(
                    ErrorKind::NameError,
                    format!("unknown parent class {parent_name}"),
                )));
            };
            def.parent = Some(parent_id);
        }
        for var in spec.variables {
            let value = host_to_value(interp, &var.value).map_err(Error::Conversion)?;
            let type_name = interp.dynamic_type_of(&value);
            let var_name = var.name.to_uppercase();
            if var.shared {
                def.shared_vars.insert(
                    var_name,
                    SharedVar {
                        type_name,
                        value,
                        locked: var.locked,
                        public: var.public,
                        docs: Vec::new(),
                    },
                );
            } else {
                def.instance_vars.insert(
                    var_name,
                    VarTemplate {
                        type_name,
                        value,
                        locked: var.locked,
                        public: var.public,
                        hooks: PropertyHooks {
                            getter: var.getter.map(wrap_host_getter),
                            setter: var.setter.map(wrap_host_setter),
                        },
                        docs: Vec::new(),
                    },
                );
            }
        }
        for method in spec.methods {
            let method_name = method.name.to_uppercase();
            let native = wrap_host_method(method.handler);
            let fdef = if method.arity == VARIADIC {
                FunctionDef::native_variadic(&method_name, global, native)
            } else {
                let arity = usize::try_from(method.arity).map_err(|_| {
                    Error::Config(format!("invalid arity {} for method {method_name}", method.arity))
                })?;
                FunctionDef::native(&method_name, arity, global, native)
            };
            def.methods.insert(
                method_name,
                MethodEntry {
                    public: true,
                    def: Arc::new(fdef),
                },
            );
        }
        if let Some(handler) = spec.unknown_method {
            def.unknown_handler = Some(Arc::new(move |interp, recv, name, args| {
                let handle = recv.handle();
                let host_args = args_to_host(interp, &args)?;
                let result = handler(&handle, name, &host_args).map_err(|msg| Flow::Throw(Exception::new(msg)))?;
                host_to_value(interp, &result).map_err(conversion_flow)
            }));
        }
        let id = interp.classes.register(def);
        interp.envs.define_class(global, &name, id);
        Ok(())
    }

    /// Registers a builtin module made of host functions, importable with
    /// `I CAN HAS name?`.
    pub fn register_module(&self, name: &str, functions: Vec<(String, i32, HostFunction)>) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let functions: Vec<(String, i32, HostFunction)> = functions
            .into_iter()
            .map(|(fname, arity, handler)| (fname.to_uppercase(), arity, handler))
            .collect();
        state.interp.resolver.register_builtin(
            name,
            Arc::new(move |interp, env, selected| {
                for (fname, arity, handler) in &functions {
                    if !crate::modules::wanted(selected, fname) {
                        continue;
                    }
                    let native = wrap_host_function(handler.clone());
                    let def = if *arity == VARIADIC {
                        FunctionDef::native_variadic(fname, env, native)
                    } else {
                        FunctionDef::native(fname, usize::try_from(*arity).unwrap_or(0), env, native)
                    };
                    interp.envs.define_function(env, fname, Arc::new(def));
                }
                Ok(())
            }),
        );
        Ok(())
    }

    /// Clears all state and reinitializes from the configuration: globals,
    /// instances, module caches, and host definitions are all dropped.
    pub fn reset(&self) {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        state.interp = build_interp(&self.config);
    }

    // ---- object handle introspection ----

    /// The MRO of the object's class, as qualified names.
    pub fn object_mro(&self, handle: &str) -> Result<Vec<String>, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let state = self.lock_state();
        let interp = &state.interp;
        let id = lookup_handle(interp, handle)?;
        let class = interp.heap.get(id).class;
        Ok(interp.classes.mro_names(class))
    }

    /// Immediate member variables: the object's own class declarations plus
    /// host-added extras.
    pub fn object_variables(&self, handle: &str) -> Result<Vec<String>, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let state = self.lock_state();
        let interp = &state.interp;
        let id = lookup_handle(interp, handle)?;
        let instance = interp.heap.get(id);
        let def = interp.classes.get(instance.class);
        let mut names: Vec<String> = def.instance_vars.keys().cloned().collect();
        names.extend(def.shared_vars.keys().cloned());
        if let Some(extras) = instance.vars.get(&def.qualified) {
            for name in extras.keys() {
                if !def.instance_vars.contains_key(name) {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Immediate methods declared by the object's own class.
    pub fn object_functions(&self, handle: &str) -> Result<Vec<String>, Error> {
        let _gate = self.gate.read().expect("VM gate poisoned");
        let state = self.lock_state();
        let interp = &state.interp;
        let id = lookup_handle(interp, handle)?;
        let class = interp.heap.get(id).class;
        Ok(interp.classes.get(class).methods.keys().cloned().collect())
    }

    /// Attaches a new variable directly to one object.
    pub fn object_add_variable(&self, handle: &str, name: &str, value: &HostValue) -> Result<(), Error> {
        let _gate = self.gate.write().expect("VM gate poisoned");
        let mut state = self.lock_state();
        let interp = &mut state.interp;
        let id = lookup_handle(interp, handle)?;
        let converted = host_to_value(interp, value).map_err(Error::Conversion)?;
        let qualified = {
            let class = interp.heap.get(id).class;
            interp.classes.get(class).qualified.clone()
        };
        interp
            .heap
            .get_mut(id)
            .vars
            .entry(qualified)
            .or_default()
            .insert(name.to_uppercase(), converted);
        Ok(())
    }
}

fn build_interp(config: &VmConfig) -> Interp {
    let out: Box<dyn PrintWriter> = if config.capture_output {
        Box::new(CollectStringPrint::new())
    } else {
        Box::new(StdPrint)
    };
    let input: Box<dyn InputReader> = if config.use_stdin {
        Box::new(StdInput)
    } else {
        Box::new(NoInput)
    };
    let mut interp = Interp::new(config.base_dir.clone(), out, input);
    if config.trace {
        interp.tracer = Box::new(StderrTracer);
    }
    interp
}

/// Compiles and runs one source under the already-held exclusive gate.
///
/// With a time bound, evaluation runs on a worker thread racing the timer;
/// the cancellation flag makes the interpreter stop at its next poll point,
/// so the join below is prompt. The timeout is reported as soon as the timer
/// fires, regardless of how the worker eventually concluded.
fn execute_locked(
    state: &mut VmState,
    source: &str,
    timeout: Option<Duration>,
    cancel: Option<CancelFlag>,
) -> Result<ExecOutcome, Error> {
    let (program, errors) = parser::parse(source);
    if !errors.is_empty() {
        return Err(Error::Compile(CompileError { errors }));
    }

    let interp = &mut state.interp;
    let env = interp.global_env;
    let Some(limit) = timeout else {
        interp.tracker = crate::resource::Tracker::new(None, cancel);
        let result = interp.run_program(&program, env);
        return finish_outcome(interp, result);
    };

    let cancel = cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    interp.tracker = crate::resource::Tracker::new(Some(limit), Some(cancel.clone()));
    let started = Instant::now();
    let (result, timer_fired) = thread::scope(|scope| {
        let worker = scope.spawn(move || interp.run_program(&program, env));
        let mut fired = false;
        while !worker.is_finished() {
            if started.elapsed() >= limit {
                cancel.store(true, Ordering::Relaxed);
                fired = true;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        (worker.join().expect("evaluation worker panicked"), fired)
    });
    if timer_fired {
        return Err(Error::Timeout {
            elapsed: started.elapsed(),
        });
    }
    finish_outcome(&mut state.interp, result)
}

fn finish_outcome(interp: &mut Interp, result: EvalResult<Value>) -> Result<ExecOutcome, Error> {
    match result {
        Ok(value) => {
            let value = value_to_host(interp, &value).map_err(Error::Conversion)?;
            let output = interp.out.take_output().unwrap_or_default();
            Ok(ExecOutcome { value, output })
        }
        Err(flow) => Err(map_flow(flow)),
    }
}

fn finish_value(interp: &mut Interp, result: EvalResult<Value>) -> Result<HostValue, Error> {
    match result {
        Ok(value) => value_to_host(interp, &value).map_err(Error::Conversion),
        Err(flow) => Err(map_flow(flow)),
    }
}

fn map_unit(result: EvalResult<()>) -> Result<(), Error> {
    result.map_err(map_flow)
}

fn map_flow(flow: Flow) -> Error {
    match flow {
        Flow::Return(_) => Error::Runtime(RuntimeError::new(
            ErrorKind::TypeError,
            "GIVEZ outside of any function".to_owned(),
        )),
        Flow::Throw(exc) => Error::Runtime(RuntimeError::new(ErrorKind::Exception, exc.message)),
        Flow::Fatal(err) => Error::Runtime(err),
        Flow::Timeout { elapsed } => Error::Timeout { elapsed },
    }
}

fn lookup_handle(interp: &Interp, handle: &str) -> Result<ObjectId, Error> {
    ObjectId::parse_handle(handle)
        .filter(|id| interp.heap.contains(*id))
        .ok_or_else(|| Error::Conversion(format!("unknown object handle {handle}")))
}

fn convert_args(interp: &mut Interp, args: &[HostValue]) -> Result<Vec<Value>, Error> {
    let mut converted = Vec::with_capacity(args.len());
    for arg in args {
        converted.push(host_to_value(interp, arg).map_err(Error::Conversion)?);
    }
    Ok(converted)
}

fn args_to_host(interp: &Interp, args: &[Value]) -> EvalResult<Vec<HostValue>> {
    let mut converted = Vec::with_capacity(args.len());
    for arg in args {
        converted.push(value_to_host(interp, arg).map_err(conversion_flow)?);
    }
    Ok(converted)
}

fn conversion_flow(message: String) -> Flow {
    Flow::fatal(ErrorKind::TypeError, message)
}

fn wrap_host_function(handler: HostFunction) -> NativeFn {
    Arc::new(move |interp, _recv, args| {
        let host_args = args_to_host(interp, &args)?;
        let result = handler(&host_args).map_err(|msg| Flow::Throw(Exception::new(msg)))?;
        host_to_value(interp, &result).map_err(conversion_flow)
    })
}

fn wrap_host_method(handler: HostMethod) -> NativeFn {
    Arc::new(move |interp, recv, args| {
        let recv = recv.ok_or_else(|| conversion_flow("host method called without a receiver".to_owned()))?;
        let handle = recv.handle();
        let host_args = args_to_host(interp, &args)?;
        let result = handler(&handle, &host_args).map_err(|msg| Flow::Throw(Exception::new(msg)))?;
        host_to_value(interp, &result).map_err(conversion_flow)
    })
}

fn wrap_host_getter(getter: HostGetter) -> NativeFn {
    Arc::new(move |interp, recv, _args| {
        let recv = recv.ok_or_else(|| conversion_flow("getter called without a receiver".to_owned()))?;
        let result = getter(&recv.handle()).map_err(|msg| Flow::Throw(Exception::new(msg)))?;
        host_to_value(interp, &result).map_err(conversion_flow)
    })
}

fn wrap_host_setter(setter: HostSetter) -> NativeFn {
    Arc::new(move |interp, recv, mut args| {
        let recv = recv.ok_or_else(|| conversion_flow("setter called without a receiver".to_owned()))?;
        let value = args.pop().unwrap_or(Value::Nothin);
        let host = value_to_host(interp, &value).map_err(conversion_flow)?;
        setter(&recv.handle(), &host).map_err(|msg| Flow::Throw(Exception::new(msg)))?;
        Ok(Value::Nothin)
    })
}
