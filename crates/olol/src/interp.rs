use std::{path::PathBuf, sync::Arc};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    ast::{BinOp, Block, Callee, ClassDecl, Expr, FuncDecl, Literal, MemberKind, Program, Stmt, TypeName, VarDecl},
    class::{ClassDef, ClassId, ClassTable, MethodEntry, SharedVar, VarTemplate},
    env::{Binding, EnvId, Environments},
    error::ErrorKind,
    exception::{EvalResult, Exception, Flow},
    function::{FuncBody, FunctionDef},
    heap::{Heap, Instance, NativeData, ObjectId},
    io::{InputReader, PrintWriter},
    modules,
    resolver::{self, Resolver},
    resource::Tracker,
    trace::{ExecTracer, NoopTracer},
    types,
    value::{self, Value},
};

/// Module key used for directly executed source (as opposed to imports).
pub(crate) const MAIN_MODULE_KEY: &str = "<main>";

/// Module key prefix for host-defined classes.
pub(crate) const HOST_MODULE_KEY: &str = "<host>";

/// The tree-walking evaluator and all runtime state behind one VM.
///
/// The environment layering is:
///
/// ```text
/// stdlib_env            BUKKIT/BASKIT classes, nothing else
///   ├── global_env      host definitions + executed programs
///   └── module envs     one per imported file, cached by the resolver
/// ```
///
/// `current_class`/`current_object` are the method-call context used by
/// visibility checks and bare-identifier member resolution; they are saved
/// and restored around every call.
pub(crate) struct Interp {
    pub heap: Heap,
    pub envs: Environments,
    pub classes: ClassTable,
    pub resolver: Resolver,
    pub out: Box<dyn PrintWriter>,
    pub input: Box<dyn InputReader>,
    pub tracer: Box<dyn ExecTracer>,
    pub tracker: Tracker,
    pub stdlib_env: EnvId,
    pub global_env: EnvId,
    pub bukkit_class: ClassId,
    pub baskit_class: ClassId,
    current_class: Option<String>,
    current_object: Option<ObjectId>,
    module_key: String,
}

impl std::fmt::Debug for Interp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp")
            .field("module_key", &self.module_key)
            .field("current_class", &self.current_class)
            .field("current_object", &self.current_object)
            .finish_non_exhaustive()
    }
}

impl Interp {
    pub fn new(base_dir: PathBuf, out: Box<dyn PrintWriter>, input: Box<dyn InputReader>) -> Self {
        let mut envs = Environments::default();
        let mut classes = ClassTable::default();
        let stdlib_env = envs.new_env(None);
        let bukkit_class = types::bukkit::register(&mut classes, &mut envs, stdlib_env);
        let baskit_class = types::baskit::register(&mut classes, &mut envs, stdlib_env);
        let global_env = envs.new_env(Some(stdlib_env));
        let mut resolver = Resolver::new(base_dir);
        modules::register_defaults(&mut resolver);
        Self {
            heap: Heap::default(),
            envs,
            classes,
            resolver,
            out,
            input,
            tracer: Box::new(NoopTracer),
            tracker: Tracker::unbounded(),
            stdlib_env,
            global_env,
            bukkit_class,
            baskit_class,
            current_class: None,
            current_object: None,
            module_key: MAIN_MODULE_KEY.to_owned(),
        }
    }

    // ---- program driving ----

    /// Runs a program in `env`: the three declaration passes, then `MAIN`.
    ///
    /// A top-level `GIVEZ` ends the program early with its value.
    pub fn run_program(&mut self, program: &Program, env: EnvId) -> EvalResult<Value> {
        match self.run_passes(program, env, MAIN_MODULE_KEY) {
            Ok(()) => {}
            Err(Flow::Return(value)) => return Ok(value),
            Err(other) => return Err(other),
        }
        if let Some(main) = self.envs.lookup_function(env, "MAIN") {
            return self.call_function(main, None, Vec::new());
        }
        Ok(Value::Nothin)
    }

    /// Runs an imported module: the three passes without `MAIN` invocation.
    pub fn run_module(&mut self, program: &Program, env: EnvId, module_key: &str) -> EvalResult<()> {
        self.run_passes(program, env, module_key)
    }

    /// The three-pass top-level evaluation order that realizes forward
    /// references: imports first, then function and class registration, then
    /// the remaining statements.
    fn run_passes(&mut self, program: &Program, env: EnvId, module_key: &str) -> EvalResult<()> {
        let saved_key = std::mem::replace(&mut self.module_key, module_key.to_owned());
        let result = self.run_passes_inner(program, env);
        self.module_key = saved_key;
        result
    }

    fn run_passes_inner(&mut self, program: &Program, env: EnvId) -> EvalResult<()> {
        for stmt in &program.stmts {
            if let Stmt::Import(decl) = stmt {
                resolver::exec_import(self, decl, env)?;
            }
        }
        for stmt in &program.stmts {
            if let Stmt::FuncDecl(decl) = stmt {
                self.register_function(decl, env);
            }
        }
        for stmt in &program.stmts {
            if let Stmt::ClassDecl(decl) = stmt {
                self.register_class(decl, env)?;
            }
        }
        for stmt in &program.stmts {
            match stmt {
                Stmt::Import(_) | Stmt::FuncDecl(_) | Stmt::ClassDecl(_) => {}
                other => self.exec_stmt(other, env)?,
            }
        }
        Ok(())
    }

    // ---- registration ----

    fn register_function(&mut self, decl: &FuncDecl, env: EnvId) {
        let def = FunctionDef {
            name: decl.name.clone(),
            return_type: decl.return_type.clone(),
            params: decl.params.clone(),
            body: FuncBody::Ast(decl.body.clone()),
            shared: false,
            owner_class: None,
            captured_env: env,
            variadic: false,
            docs: decl.docs.clone(),
        };
        self.envs.define_function(env, &decl.name, Arc::new(def));
    }

    /// Registers a class: resolves the parent, evaluates member-variable
    /// initializers once (they become per-instance templates, or the live
    /// slot for `SHARD` members), and fixes the MRO.
    fn register_class(&mut self, decl: &ClassDecl, env: EnvId) -> EvalResult<()> {
        let qualified = format!("{}::{}", self.module_key, decl.name);
        let parent = match &decl.parent {
            Some(name) => Some(self.lookup_class_named(env, name).ok_or_else(|| {
                Flow::fatal(ErrorKind::NameError, format!("unknown parent class {name}"))
            })?),
            None => None,
        };
        let mut def = ClassDef::new(&decl.name, &qualified);
        def.parent = parent;
        def.docs = decl.docs.clone();
        for member in &decl.members {
            match &member.kind {
                MemberKind::Variable(var) => {
                    let init = match &var.init {
                        Some(expr) => self.eval_expr(expr, env)?,
                        None => Value::Nothin,
                    };
                    let value = self.cast_value(init, &var.type_name, env)?;
                    if member.shared {
                        def.shared_vars.insert(
                            var.name.clone(),
                            SharedVar {
                                type_name: var.type_name.clone(),
                                value,
                                locked: var.locked,
                                public: member.public,
                                docs: var.docs.clone(),
                            },
                        );
                    } else {
                        def.instance_vars.insert(
                            var.name.clone(),
                            VarTemplate {
                                type_name: var.type_name.clone(),
                                value,
                                locked: var.locked,
                                public: member.public,
                                hooks: crate::class::PropertyHooks::default(),
                                docs: var.docs.clone(),
                            },
                        );
                    }
                }
                MemberKind::Function(func) => {
                    let fdef = FunctionDef {
                        name: func.name.clone(),
                        return_type: func.return_type.clone(),
                        params: func.params.clone(),
                        body: FuncBody::Ast(func.body.clone()),
                        shared: func.shared.unwrap_or(member.shared),
                        owner_class: Some(qualified.clone()),
                        captured_env: env,
                        variadic: false,
                        docs: func.docs.clone(),
                    };
                    def.methods.insert(
                        func.name.clone(),
                        MethodEntry {
                            public: member.public,
                            def: Arc::new(fdef),
                        },
                    );
                }
            }
        }
        let id = self.classes.register(def);
        self.envs.define_class(env, &decl.name, id);
        Ok(())
    }

    fn lookup_class_named(&self, env: EnvId, name: &str) -> Option<ClassId> {
        self.envs
            .lookup_class(env, name)
            .or_else(|| self.classes.by_qualified(name))
    }

    // ---- statements ----

    fn exec_stmts(&mut self, stmts: &[Stmt], env: EnvId) -> EvalResult<()> {
        for stmt in stmts {
            self.tracer.on_statement(stmt_line(stmt));
            self.exec_stmt(stmt, env)?;
        }
        Ok(())
    }

    /// Executes a block in a fresh child scope.
    fn exec_block(&mut self, block: &Block, parent: EnvId) -> EvalResult<()> {
        let env = self.envs.new_env(Some(parent));
        self.exec_stmts(&block.stmts, env)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: EnvId) -> EvalResult<()> {
        match stmt {
            Stmt::Import(decl) => resolver::exec_import(self, decl, env),
            Stmt::VarDecl(decl) => self.exec_var_decl(decl, env),
            Stmt::FuncDecl(decl) => {
                self.register_function(decl, env);
                Ok(())
            }
            Stmt::ClassDecl(decl) => self.register_class(decl, env),
            Stmt::Assign { target, value, .. } => {
                let value = self.eval_expr(value, env)?;
                match target {
                    Expr::Identifier { name, .. } => self.assign_identifier(name, value, env),
                    Expr::Member { object, member, .. } => self.assign_member(object, member, value, env),
                    _ => unreachable!("parser only emits identifier or member targets"),
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_block(then_block, env)
                } else if let Some(block) = else_block {
                    self.exec_block(block, env)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body, .. } => {
                loop {
                    self.tracker.tick()?;
                    if !self.eval_expr(cond, env)?.is_truthy() {
                        return Ok(());
                    }
                    self.exec_block(body, env)?;
                }
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nothin,
                };
                Err(Flow::Return(value))
            }
            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally_body,
                ..
            } => self.exec_try(body, catch_var, catch_body, finally_body.as_ref(), env),
            Stmt::Throw { value, .. } => {
                let value = self.eval_expr(value, env)?;
                let message = self.display_value(&value);
                Err(Flow::Throw(Exception::new(message)))
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, env)?;
                Ok(())
            }
        }
    }

    fn exec_var_decl(&mut self, decl: &VarDecl, env: EnvId) -> EvalResult<()> {
        let init = match &decl.init {
            Some(expr) => self.eval_expr(expr, env)?,
            None => Value::Nothin,
        };
        let value = self.cast_value(init, &decl.type_name, env)?;
        self.envs.define_variable(
            env,
            &decl.name,
            Binding {
                type_name: decl.type_name.clone(),
                value,
                locked: decl.locked,
            },
        );
        Ok(())
    }

    /// `MAYB`: the catch body sees the exception message bound as a STRIN;
    /// the finally body always runs and wins if it raises itself.
    fn exec_try(
        &mut self,
        body: &Block,
        catch_var: &str,
        catch_body: &Block,
        finally_body: Option<&Block>,
        env: EnvId,
    ) -> EvalResult<()> {
        let result = match self.exec_block(body, env) {
            Err(Flow::Throw(exc)) => {
                let catch_env = self.envs.new_env(Some(env));
                self.envs.define_variable(
                    catch_env,
                    catch_var,
                    Binding {
                        type_name: TypeName::Strin,
                        value: Value::strin(exc.message),
                        locked: false,
                    },
                );
                self.exec_stmts(&catch_body.stmts, catch_env)
            }
            other => other,
        };
        if let Some(block) = finally_body {
            let finally_result = self.exec_block(block, env);
            if finally_result.is_err() {
                return finally_result;
            }
        }
        result
    }

    // ---- assignment ----

    pub(crate) fn assign_identifier(&mut self, name: &str, value: Value, env: EnvId) -> EvalResult<()> {
        if let Some(obj) = self.current_object
            && self.member_exists(obj, name)
        {
            return self.write_member(obj, name, value, env);
        }
        let Some(frame) = self.envs.resolve_variable(env, name) else {
            return Err(Flow::fatal(ErrorKind::NameError, format!("undefined variable {name}")));
        };
        let binding = self.envs.frame(frame).variables.get(name).expect("resolved");
        if binding.locked {
            return Err(Flow::fatal(
                ErrorKind::TypeError,
                format!("cannot assign to locked variable {name}"),
            ));
        }
        let type_name = binding.type_name.clone();
        let value = self.cast_value(value, &type_name, env)?;
        self.envs
            .frame_mut(frame)
            .variables
            .get_mut(name)
            .expect("resolved")
            .value = value;
        Ok(())
    }

    fn assign_member(&mut self, object: &Expr, member: &str, value: Value, env: EnvId) -> EvalResult<()> {
        if let Some(class) = self.class_named_by_expr(object, env) {
            return self.write_shared(class, member, value, env);
        }
        let target = self.eval_expr(object, env)?;
        let Value::Object(id) = target else {
            return Err(Flow::fatal(
                ErrorKind::TypeError,
                format!("cannot assign member {member} of {}", target.type_of()),
            ));
        };
        self.write_member(id, member, value, env)
    }

    // ---- member access ----

    /// When a `Member`/method-call object expression is a bare identifier
    /// that names a class (and nothing shadows it as a value), the access
    /// targets the class's shared members.
    fn class_named_by_expr(&mut self, object: &Expr, env: EnvId) -> Option<ClassId> {
        let Expr::Identifier { name, .. } = object else {
            return None;
        };
        if self.envs.lookup_variable(env, name).is_some() {
            return None;
        }
        if let Some(obj) = self.current_object
            && self.member_exists(obj, name)
        {
            return None;
        }
        self.envs.lookup_class(env, name)
    }

    fn member_visible(&self, public: bool, owner: ClassId) -> bool {
        public || self.current_class.as_deref() == Some(self.classes.get(owner).qualified.as_str())
    }

    /// True when `name` is any kind of member (template, shared, or
    /// host-added) visible from the current class context.
    fn member_exists(&self, obj: ObjectId, name: &str) -> bool {
        let class = self.heap.get(obj).class;
        if let Some((owner, template)) = self.classes.find_instance_var(class, name) {
            return self.member_visible(template.public, owner);
        }
        if let Some(owner) = self.classes.find_shared_var(class, name) {
            let shared = &self.classes.get(owner).shared_vars[name];
            return self.member_visible(shared.public, owner);
        }
        self.find_extra_var(obj, name).is_some()
    }

    /// Host-added per-object variables have no class template; they live
    /// directly in the instance maps.
    fn find_extra_var(&self, obj: ObjectId, name: &str) -> Option<String> {
        let instance = self.heap.get(obj);
        for owner in &self.classes.get(instance.class).mro {
            let qualified = &self.classes.get(*owner).qualified;
            if self.classes.get(*owner).instance_vars.contains_key(name) {
                return None; // template-backed, not extra
            }
            if instance.vars.get(qualified).is_some_and(|m| m.contains_key(name)) {
                return Some(qualified.clone());
            }
        }
        None
    }

    fn read_member(&mut self, obj: ObjectId, member: &str) -> EvalResult<Value> {
        let class = self.heap.get(obj).class;
        if let Some((owner, template)) = self.classes.find_instance_var(class, member) {
            if !self.member_visible(template.public, owner) {
                return Err(self.visibility_error(member, owner));
            }
            if let Some(getter) = template.hooks.getter.clone() {
                return getter(self, Some(obj), Vec::new());
            }
            let qualified = self.classes.get(owner).qualified.clone();
            return Ok(self.heap.get(obj).vars[&qualified][member].clone());
        }
        if let Some(owner) = self.classes.find_shared_var(class, member) {
            let shared = &self.classes.get(owner).shared_vars[member];
            if !self.member_visible(shared.public, owner) {
                return Err(self.visibility_error(member, owner));
            }
            return Ok(shared.value.clone());
        }
        if let Some(qualified) = self.find_extra_var(obj, member) {
            return Ok(self.heap.get(obj).vars[&qualified][member].clone());
        }
        let class_name = self.classes.get(class).name.clone();
        Err(Flow::fatal(
            ErrorKind::NameError,
            format!("{class_name} has no member {member}"),
        ))
    }

    fn write_member(&mut self, obj: ObjectId, member: &str, value: Value, env: EnvId) -> EvalResult<()> {
        let class = self.heap.get(obj).class;
        if let Some((owner, template)) = self.classes.find_instance_var(class, member) {
            if !self.member_visible(template.public, owner) {
                return Err(self.visibility_error(member, owner));
            }
            if template.locked {
                return Err(Flow::fatal(
                    ErrorKind::TypeError,
                    format!("cannot assign to locked member {member}"),
                ));
            }
            let type_name = template.type_name.clone();
            if let Some(setter) = template.hooks.setter.clone() {
                let value = self.cast_value(value, &type_name, env)?;
                setter(self, Some(obj), vec![value])?;
                return Ok(());
            }
            let qualified = self.classes.get(owner).qualified.clone();
            let value = self.cast_value(value, &type_name, env)?;
            self.heap
                .get_mut(obj)
                .vars
                .get_mut(&qualified)
                .expect("instance slot map")
                .insert(member.to_owned(), value);
            return Ok(());
        }
        if let Some(owner) = self.classes.find_shared_var(class, member) {
            return self.write_shared_slot(owner, member, value, env);
        }
        if let Some(qualified) = self.find_extra_var(obj, member) {
            self.heap
                .get_mut(obj)
                .vars
                .get_mut(&qualified)
                .expect("instance slot map")
                .insert(member.to_owned(), value);
            return Ok(());
        }
        let class_name = self.classes.get(class).name.clone();
        Err(Flow::fatal(
            ErrorKind::NameError,
            format!("{class_name} has no member {member}"),
        ))
    }

    fn read_shared(&mut self, class: ClassId, member: &str) -> EvalResult<Value> {
        let Some(owner) = self.classes.find_shared_var(class, member) else {
            let name = self.classes.get(class).name.clone();
            return Err(Flow::fatal(
                ErrorKind::NameError,
                format!("class {name} has no shared member {member}"),
            ));
        };
        let shared = &self.classes.get(owner).shared_vars[member];
        if !self.member_visible(shared.public, owner) {
            return Err(self.visibility_error(member, owner));
        }
        Ok(shared.value.clone())
    }

    fn write_shared(&mut self, class: ClassId, member: &str, value: Value, env: EnvId) -> EvalResult<()> {
        let Some(owner) = self.classes.find_shared_var(class, member) else {
            let name = self.classes.get(class).name.clone();
            return Err(Flow::fatal(
                ErrorKind::NameError,
                format!("class {name} has no shared member {member}"),
            ));
        };
        self.write_shared_slot(owner, member, value, env)
    }

    fn write_shared_slot(&mut self, owner: ClassId, member: &str, value: Value, env: EnvId) -> EvalResult<()> {
        let shared = &self.classes.get(owner).shared_vars[member];
        if !self.member_visible(shared.public, owner) {
            return Err(self.visibility_error(member, owner));
        }
        if shared.locked {
            return Err(Flow::fatal(
                ErrorKind::TypeError,
                format!("cannot assign to locked member {member}"),
            ));
        }
        let type_name = shared.type_name.clone();
        let value = self.cast_value(value, &type_name, env)?;
        self.classes.get_mut(owner).shared_vars[member].value = value;
        Ok(())
    }

    fn visibility_error(&self, member: &str, owner: ClassId) -> Flow {
        Flow::fatal(
            ErrorKind::VisibilityError,
            format!(
                "member {member} of {} is not visible here",
                self.classes.get(owner).name
            ),
        )
    }

    // ---- expressions ----

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: EnvId) -> EvalResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Nothin => Value::Nothin,
                Literal::Int(i) => Value::Int(*i),
                Literal::Dubble(d) => Value::Dubble(*d),
                Literal::Strin(s) => Value::strin(s),
                Literal::Bool(b) => Value::Bool(*b),
            }),
            Expr::Identifier { name, .. } => self.eval_identifier(name, env),
            Expr::Member { object, member, .. } => {
                if let Some(class) = self.class_named_by_expr(object, env) {
                    return self.read_shared(class, member);
                }
                let value = self.eval_expr(object, env)?;
                let Value::Object(id) = value else {
                    return Err(Flow::fatal(
                        ErrorKind::TypeError,
                        format!("cannot access member {member} of {}", value.type_of()),
                    ));
                };
                self.read_member(id, member)
            }
            Expr::Binary { op, left, right, .. } => self.eval_binary(*op, left, right, env),
            Expr::Not { operand, .. } => {
                let value = self.eval_expr(operand, env)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
            Expr::Cast { expr, target, .. } => {
                let value = self.eval_expr(expr, env)?;
                self.cast_value(value, target, env)
            }
            Expr::Call { callee, args, .. } => {
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval_expr(arg, env)?);
                }
                match callee {
                    Callee::Name(name) => self.call_named(name, argv, env),
                    Callee::Method { object, name } => {
                        if let Some(class) = self.class_named_by_expr(object, env) {
                            return self.call_shared_method(class, name, argv);
                        }
                        let target = self.eval_expr(object, env)?;
                        let Value::Object(id) = target else {
                            return Err(Flow::fatal(
                                ErrorKind::TypeError,
                                format!("cannot call method {name} on {}", target.type_of()),
                            ));
                        };
                        self.call_method(id, name, argv)
                    }
                }
            }
            Expr::New { class_name, args, .. } => {
                let Some(class) = self.lookup_class_named(env, class_name) else {
                    return Err(Flow::fatal(
                        ErrorKind::NameError,
                        format!("unknown class {class_name}"),
                    ));
                };
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval_expr(arg, env)?);
                }
                self.instantiate(class, argv)
            }
        }
    }

    /// Bare-identifier resolution order: accessible member variable of the
    /// receiver, then environment variable, then function (invoked with no
    /// arguments), then `NameError`.
    fn eval_identifier(&mut self, name: &str, env: EnvId) -> EvalResult<Value> {
        if let Some(obj) = self.current_object
            && self.member_exists(obj, name)
        {
            return self.read_member(obj, name);
        }
        if let Some(binding) = self.envs.lookup_variable(env, name) {
            return Ok(binding.value.clone());
        }
        if let Some(def) = self.envs.lookup_function(env, name) {
            return self.call_function(def, None, Vec::new());
        }
        Err(Flow::fatal(ErrorKind::NameError, format!("undefined name {name}")))
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, env: EnvId) -> EvalResult<Value> {
        // short-circuit forms first
        match op {
            BinOp::Or => {
                if self.eval_expr(left, env)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let right = self.eval_expr(right, env)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            BinOp::An => {
                if !self.eval_expr(left, env)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let right = self.eval_expr(right, env)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            _ => {}
        }
        let lhs = self.eval_expr(left, env)?;
        let rhs = self.eval_expr(right, env)?;
        let type_error = |msg: String| Flow::fatal(ErrorKind::TypeError, msg);
        match op {
            BinOp::SaemAs => Ok(Value::Bool(lhs.saem_as(&rhs))),
            BinOp::BiggrThan => value::op_compare(&lhs, &rhs, true).map_err(type_error),
            BinOp::SmallrThan => value::op_compare(&lhs, &rhs, false).map_err(type_error),
            BinOp::Moar => value::op_moar(&lhs, &rhs).map_err(type_error),
            BinOp::Les => value::op_les(&lhs, &rhs).map_err(type_error),
            BinOp::Tiemz => value::op_tiemz(&lhs, &rhs).map_err(type_error),
            BinOp::Dividez => value::op_dividez(&lhs, &rhs),
            BinOp::Or | BinOp::An => unreachable!("handled above"),
        }
    }

    // ---- calls ----

    /// `NAME WIT args`: a sibling method of the current receiver wins over
    /// environment functions, mirroring bare-identifier member resolution.
    fn call_named(&mut self, name: &str, args: Vec<Value>, env: EnvId) -> EvalResult<Value> {
        if let Some(obj) = self.current_object {
            let class = self.heap.get(obj).class;
            if self.classes.find_method(class, name).is_some() {
                return self.call_method(obj, name, args);
            }
        }
        let Some(def) = self.envs.lookup_function(env, name) else {
            return Err(Flow::fatal(ErrorKind::NameError, format!("undefined function {name}")));
        };
        self.call_function(def, None, args)
    }

    /// Method dispatch: walk the receiver's MRO, check visibility, fall back
    /// to the class's unknown-method handler.
    pub(crate) fn call_method(&mut self, recv: ObjectId, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let class = self.heap.get(recv).class;
        if let Some((owner, entry)) = self.classes.find_method(class, name) {
            if !self.member_visible(entry.public, owner) {
                return Err(Flow::fatal(
                    ErrorKind::VisibilityError,
                    format!("method {name} of {} is not visible here", self.classes.get(owner).name),
                ));
            }
            let def = entry.def.clone();
            return self.call_function(def, Some(recv), args);
        }
        let handler = self
            .classes
            .get(class)
            .mro
            .clone()
            .into_iter()
            .find_map(|owner| self.classes.get(owner).unknown_handler.clone());
        if let Some(handler) = handler {
            return handler(self, recv, name, args);
        }
        let class_name = self.classes.get(class).name.clone();
        Err(Flow::fatal(
            ErrorKind::NameError,
            format!("{class_name} has no method {name}"),
        ))
    }

    /// `CLASSNAME DO METHOD`: only `SHARD` methods are callable without an
    /// instance.
    fn call_shared_method(&mut self, class: ClassId, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let Some((owner, entry)) = self.classes.find_method(class, name) else {
            let class_name = self.classes.get(class).name.clone();
            return Err(Flow::fatal(
                ErrorKind::NameError,
                format!("class {class_name} has no method {name}"),
            ));
        };
        if !entry.def.shared {
            return Err(Flow::fatal(
                ErrorKind::TypeError,
                format!("method {name} requires an instance"),
            ));
        }
        if !self.member_visible(entry.public, owner) {
            return Err(Flow::fatal(
                ErrorKind::VisibilityError,
                format!("method {name} of {} is not visible here", self.classes.get(owner).name),
            ));
        }
        let def = entry.def.clone();
        self.call_function(def, None, args)
    }

    /// Invokes a function or method.
    ///
    /// For AST bodies: arity check, per-parameter casts, fresh call frame
    /// chained off the captured (definition) environment, `Return` recovery,
    /// return-type cast. Variadic functions bind `ARGC`/`ARG1..N` instead of
    /// named parameters. Natives receive the raw values.
    pub(crate) fn call_function(
        &mut self,
        def: Arc<FunctionDef>,
        recv: Option<ObjectId>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        self.tracker.tick()?;
        self.tracer.on_call(&def.name);
        if !def.variadic && args.len() != def.params.len() {
            return Err(Flow::fatal(
                ErrorKind::ArityError,
                format!(
                    "{} expects {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    args.len()
                ),
            ));
        }
        let saved_object = std::mem::replace(&mut self.current_object, recv);
        let saved_class = std::mem::replace(&mut self.current_class, def.owner_class.clone());
        let result = self.call_function_inner(&def, recv, args);
        self.current_object = saved_object;
        self.current_class = saved_class;
        result
    }

    fn call_function_inner(
        &mut self,
        def: &Arc<FunctionDef>,
        recv: Option<ObjectId>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        match &def.body {
            FuncBody::Native(body) => {
                let body = body.clone();
                body(self, recv, args)
            }
            FuncBody::Ast(block) => {
                let block = block.clone();
                let call_env = self.envs.new_env(Some(def.captured_env));
                if def.variadic {
                    self.envs.define_variable(
                        call_env,
                        "ARGC",
                        Binding {
                            type_name: TypeName::Integr,
                            value: Value::Int(args.len() as i64),
                            locked: true,
                        },
                    );
                    for (i, value) in args.into_iter().enumerate() {
                        let type_name = self.dynamic_type_of(&value);
                        self.envs.define_variable(
                            call_env,
                            &format!("ARG{}", i + 1),
                            Binding {
                                type_name,
                                value,
                                locked: false,
                            },
                        );
                    }
                } else {
                    for (param, value) in def.params.iter().zip(args) {
                        let value = self.cast_value(value, &param.type_name, def.captured_env)?;
                        self.envs.define_variable(
                            call_env,
                            &param.name,
                            Binding {
                                type_name: param.type_name.clone(),
                                value,
                                locked: false,
                            },
                        );
                    }
                }
                let value = match self.exec_stmts(&block.stmts, call_env) {
                    Ok(()) => Value::Nothin,
                    Err(Flow::Return(value)) => value,
                    Err(other) => return Err(other),
                };
                match &def.return_type {
                    Some(target) => self.cast_value(value, target, def.captured_env),
                    None => Ok(value),
                }
            }
        }
    }

    /// The declared type that best describes a runtime value; used when
    /// binding `ARGN` names and host definitions, which have no declared
    /// type.
    pub(crate) fn dynamic_type_of(&self, value: &Value) -> TypeName {
        match value {
            Value::Nothin => TypeName::Nothin,
            Value::Int(_) => TypeName::Integr,
            Value::Dubble(_) => TypeName::Dubble,
            Value::Strin(_) => TypeName::Strin,
            Value::Bool(_) => TypeName::Bool,
            Value::Object(id) => {
                let class = self.heap.get(*id).class;
                TypeName::Class(self.classes.get(class).name.clone())
            }
        }
    }

    // ---- instantiation ----

    /// Allocates an instance: one slot map per MRO class from the variable
    /// templates, native payload for BUKKIT/BASKIT descendants, then the
    /// constructor (the method named like the class) when present.
    pub(crate) fn instantiate(&mut self, class: ClassId, args: Vec<Value>) -> EvalResult<Value> {
        self.tracker.tick()?;
        let id = self.allocate_instance(class);
        let simple = self.classes.get(class).name.clone();
        if let Some((owner, entry)) = self.classes.find_method(class, &simple) {
            if !self.member_visible(entry.public, owner) {
                return Err(Flow::fatal(
                    ErrorKind::VisibilityError,
                    format!("constructor of {simple} is not visible here"),
                ));
            }
            let def = entry.def.clone();
            self.call_function(def, Some(id), args)?;
        } else if !args.is_empty() {
            return Err(Flow::fatal(
                ErrorKind::ArityError,
                format!("class {simple} has no constructor taking arguments"),
            ));
        }
        Ok(Value::Object(id))
    }

    pub(crate) fn allocate_instance(&mut self, class: ClassId) -> ObjectId {
        let mro = self.classes.get(class).mro.clone();
        let mut vars = AHashMap::new();
        for owner in &mro {
            let def = self.classes.get(*owner);
            let slots: AHashMap<String, Value> = def
                .instance_vars
                .iter()
                .map(|(name, template)| (name.clone(), template.value.clone()))
                .collect();
            vars.insert(def.qualified.clone(), slots);
        }
        let native = if mro.contains(&self.bukkit_class) {
            Some(NativeData::Bukkit(Vec::new()))
        } else if mro.contains(&self.baskit_class) {
            Some(NativeData::Baskit(IndexMap::new()))
        } else {
            None
        };
        self.heap.allocate(Instance { class, vars, native })
    }

    /// Allocates a BUKKIT holding `items`.
    pub(crate) fn new_bukkit(&mut self, items: Vec<Value>) -> ObjectId {
        let id = self.allocate_instance(self.bukkit_class);
        self.heap.get_mut(id).native = Some(NativeData::Bukkit(items));
        id
    }

    /// Allocates a BASKIT holding `entries`.
    pub(crate) fn new_baskit(&mut self, entries: IndexMap<String, Value>) -> ObjectId {
        let id = self.allocate_instance(self.baskit_class);
        self.heap.get_mut(id).native = Some(NativeData::Baskit(entries));
        id
    }

    // ---- casting ----

    /// `value AS target`. Class targets succeed only for `NOTHIN` and
    /// instances whose MRO contains the target class.
    pub(crate) fn cast_value(&mut self, value: Value, target: &TypeName, env: EnvId) -> EvalResult<Value> {
        let cast_error = |msg: String| Flow::fatal(ErrorKind::CastError, msg);
        match target {
            TypeName::Nothin => Ok(Value::Nothin),
            TypeName::Integr => value.cast_to_int().map(Value::Int).map_err(cast_error),
            TypeName::Dubble => value.cast_to_dubble().map(Value::Dubble).map_err(cast_error),
            TypeName::Bool => value.cast_to_bool().map(Value::Bool).map_err(cast_error),
            TypeName::Strin => match value.scalar_to_strin() {
                Some(text) => Ok(Value::strin(text)),
                None => Ok(Value::strin(self.display_value(&value))),
            },
            TypeName::Bukkit => self.cast_to_class(value, self.bukkit_class),
            TypeName::Baskit => self.cast_to_class(value, self.baskit_class),
            TypeName::Class(name) => {
                let Some(class) = self.lookup_class_named(env, name) else {
                    return Err(cast_error(format!("unknown type {name}")));
                };
                self.cast_to_class(value, class)
            }
        }
    }

    fn cast_to_class(&self, value: Value, target: ClassId) -> EvalResult<Value> {
        match value {
            Value::Nothin => Ok(Value::Nothin),
            Value::Object(id) if self.classes.is_instance_of(self.heap.get(id).class, target) => {
                Ok(Value::Object(id))
            }
            other => Err(Flow::fatal(
                ErrorKind::CastError,
                format!(
                    "cannot cast {} to {}",
                    self.describe_type(&other),
                    self.classes.get(target).name
                ),
            )),
        }
    }

    // ---- rendering ----

    pub(crate) fn describe_type(&self, value: &Value) -> String {
        match value {
            Value::Object(id) => {
                let class = self.heap.get(*id).class;
                self.classes.get(class).name.clone()
            }
            other => other.type_of().to_owned(),
        }
    }

    /// Canonical display text: scalar canonical forms, rendered containers,
    /// `<CLASS handle>` for other instances. Self-referential containers
    /// render as `...` at the point of the cycle.
    pub(crate) fn display_value(&self, value: &Value) -> String {
        let mut visited = Vec::new();
        self.display_inner(value, &mut visited)
    }

    fn display_inner(&self, value: &Value, visited: &mut Vec<ObjectId>) -> String {
        if let Some(text) = value.scalar_to_strin() {
            return text;
        }
        let Value::Object(id) = value else {
            unreachable!("non-scalar values are objects");
        };
        if visited.contains(id) {
            return "...".to_owned();
        }
        visited.push(*id);
        let instance = self.heap.get(*id);
        let text = match &instance.native {
            Some(NativeData::Bukkit(items)) => {
                let parts: Vec<String> = items.iter().map(|item| self.display_inner(item, visited)).collect();
                format!("[{}]", parts.join(", "))
            }
            Some(NativeData::Baskit(entries)) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, item)| format!("{key}: {}", self.display_inner(item, visited)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            None => {
                let class = self.classes.get(instance.class);
                format!("<{} {}>", class.name, id.handle())
            }
        };
        visited.pop();
        text
    }
}

fn stmt_line(stmt: &Stmt) -> u32 {
    match stmt {
        Stmt::Import(decl) => decl.pos.line,
        Stmt::VarDecl(decl) => decl.pos.line,
        Stmt::FuncDecl(decl) => decl.pos.line,
        Stmt::ClassDecl(decl) => decl.pos.line,
        Stmt::Assign { pos, .. }
        | Stmt::If { pos, .. }
        | Stmt::While { pos, .. }
        | Stmt::Return { pos, .. }
        | Stmt::Try { pos, .. }
        | Stmt::Throw { pos, .. } => pos.line,
        Stmt::Expr(expr) => expr.pos().line,
    }
}
