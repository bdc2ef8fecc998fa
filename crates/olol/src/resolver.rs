use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::AHashMap;

use crate::{
    ast::{ImportDecl, ImportSource, Program},
    env::EnvId,
    error::ErrorKind,
    exception::{EvalResult, Flow},
    interp::Interp,
    parser,
};

/// Source file extension, matched case-insensitively.
const EXTENSION: &str = ".olol";

/// Installer for a builtin module: defines the module's declarations into the
/// importing environment, honoring the selective-import list.
pub(crate) type BuiltinInit = Arc<dyn Fn(&mut Interp, EnvId, &[String]) -> EvalResult<()> + Send + Sync>;

/// Module loading state: path resolution, parse and execution caches, the
/// executing-stack used for cycle detection, and the builtin registry.
///
/// The caches guarantee module identity: one absolute path maps to exactly
/// one AST and, once execution completed, exactly one environment. Side
/// effects of a module therefore run at most once per VM.
pub(crate) struct Resolver {
    base_dir: PathBuf,
    ast_cache: AHashMap<PathBuf, Arc<Program>>,
    env_cache: AHashMap<PathBuf, EnvId>,
    executing: Vec<PathBuf>,
    builtins: AHashMap<String, BuiltinInit>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("base_dir", &self.base_dir)
            .field("ast_cache", &self.ast_cache.len())
            .field("env_cache", &self.env_cache.len())
            .field("executing", &self.executing)
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Resolver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            ast_cache: AHashMap::new(),
            env_cache: AHashMap::new(),
            executing: Vec::new(),
            builtins: AHashMap::new(),
        }
    }

    pub fn register_builtin(&mut self, name: &str, init: BuiltinInit) {
        self.builtins.insert(name.to_uppercase(), init);
    }

    pub fn builtin(&self, name: &str) -> Option<BuiltinInit> {
        self.builtins.get(name).cloned()
    }

    /// Resolves a module path spec to the canonical absolute path used as the
    /// cache key.
    ///
    /// The extension is appended when missing; relative paths resolve against
    /// the directory of the currently executing module, falling back to the
    /// resolver's base directory.
    pub fn resolve_path(&self, spec: &str) -> Result<PathBuf, Flow> {
        let mut spec = spec.to_owned();
        if !spec.to_lowercase().ends_with(EXTENSION) {
            spec.push_str(EXTENSION);
        }
        let candidate = Path::new(&spec);
        let full = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.current_dir().join(candidate)
        };
        fs::canonicalize(&full).map_err(|_| {
            Flow::fatal(
                ErrorKind::ModuleNotFound,
                format!("module file not found: {}", full.display()),
            )
        })
    }

    fn current_dir(&self) -> PathBuf {
        self.executing
            .last()
            .and_then(|p| p.parent())
            .map_or_else(|| self.base_dir.clone(), Path::to_path_buf)
    }

    pub fn cached_env(&self, path: &Path) -> Option<EnvId> {
        self.env_cache.get(path).copied()
    }

    pub fn is_executing(&self, path: &Path) -> bool {
        self.executing.iter().any(|p| p == path)
    }

    /// The import chain for circular-import diagnostics.
    fn executing_chain(&self, tail: &Path) -> String {
        let mut parts: Vec<String> = self.executing.iter().map(|p| p.display().to_string()).collect();
        parts.push(tail.display().to_string());
        parts.join(" -> ")
    }

    pub fn clear(&mut self) {
        self.ast_cache.clear();
        self.env_cache.clear();
        self.executing.clear();
    }
}

/// Executes an import declaration against `env`.
pub(crate) fn exec_import(interp: &mut Interp, decl: &ImportDecl, env: EnvId) -> EvalResult<()> {
    interp.tracker.tick()?;
    match &decl.source {
        ImportSource::Builtin(name) => {
            interp.tracer.on_import(name);
            let Some(init) = interp.resolver.builtin(name) else {
                return Err(Flow::fatal(
                    ErrorKind::ImportError,
                    format!("unknown builtin module {name}"),
                ));
            };
            init(interp, env, &decl.names)
        }
        ImportSource::File(spec) => {
            interp.tracer.on_import(spec);
            let path = interp.resolver.resolve_path(spec)?;
            let program = load_ast(interp, &path)?;
            let module_env = execute_module(interp, &path, &program)?;
            merge_declarations(interp, module_env, env, &decl.names, spec)
        }
    }
}

/// Returns the cached AST for `path`, parsing (and caching) on first load.
///
/// The cache holds the `Arc` itself, so every import of the same resolved
/// path observes the identical AST instance.
pub(crate) fn load_ast(interp: &mut Interp, path: &Path) -> EvalResult<Arc<Program>> {
    if let Some(program) = interp.resolver.ast_cache.get(path) {
        return Ok(program.clone());
    }
    let source = fs::read_to_string(path).map_err(|err| {
        Flow::fatal(
            ErrorKind::ModuleNotFound,
            format!("cannot read module {}: {err}", path.display()),
        )
    })?;
    let (program, errors) = parser::parse(&source);
    if !errors.is_empty() {
        let joined = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        return Err(Flow::fatal(
            ErrorKind::ModuleParseError,
            format!("module {} has syntax errors: {joined}", path.display()),
        ));
    }
    let program = Arc::new(program);
    interp.resolver.ast_cache.insert(path.to_path_buf(), program.clone());
    Ok(program)
}

/// Runs a module to completion once, returning its environment.
///
/// Importing a path that is still on the executing-stack is a circular
/// import; a path with a cached environment is returned without re-running
/// its top level.
fn execute_module(interp: &mut Interp, path: &Path, program: &Arc<Program>) -> EvalResult<EnvId> {
    if interp.resolver.is_executing(path) {
        return Err(Flow::fatal(
            ErrorKind::CircularImport,
            format!("circular import detected: {}", interp.resolver.executing_chain(path)),
        ));
    }
    if let Some(env) = interp.resolver.cached_env(path) {
        return Ok(env);
    }
    let module_env = interp.envs.new_env(Some(interp.stdlib_env));
    interp.resolver.executing.push(path.to_path_buf());
    let key = path.display().to_string();
    let result = interp.run_module(program, module_env, &key);
    interp.resolver.executing.pop();
    result?;
    interp.resolver.env_cache.insert(path.to_path_buf(), module_env);
    Ok(module_env)
}

/// Merges declarations from a module environment into the importer.
///
/// Public means the simple name does not start with `_`. With a selection
/// list, every requested name must exist (and be public) in the module's own
/// frame; without one, everything public is merged.
fn merge_declarations(
    interp: &mut Interp,
    from: EnvId,
    to: EnvId,
    names: &[String],
    module_desc: &str,
) -> EvalResult<()> {
    let is_public = |name: &str| !name.starts_with('_');

    let frame = interp.envs.frame(from);
    let mut variables = Vec::new();
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    if names.is_empty() {
        variables.extend(frame.variables.iter().filter(|(n, _)| is_public(n)).map(|(n, b)| (n.clone(), b.clone())));
        functions.extend(frame.functions.iter().filter(|(n, _)| is_public(n)).map(|(n, f)| (n.clone(), f.clone())));
        classes.extend(frame.classes.iter().filter(|(n, _)| is_public(n)).map(|(n, c)| (n.clone(), *c)));
    } else {
        for name in names {
            if !is_public(name) {
                return Err(Flow::fatal(
                    ErrorKind::ImportError,
                    format!("cannot import private declaration {name} from {module_desc}"),
                ));
            }
            if let Some(binding) = frame.variables.get(name) {
                variables.push((name.clone(), binding.clone()));
            } else if let Some(def) = frame.functions.get(name) {
                functions.push((name.clone(), def.clone()));
            } else if let Some(class) = frame.classes.get(name) {
                classes.push((name.clone(), *class));
            } else {
                return Err(Flow::fatal(
                    ErrorKind::ImportError,
                    format!("module {module_desc} does not declare {name}"),
                ));
            }
        }
    }

    for (name, binding) in variables {
        interp.envs.define_variable(to, &name, binding);
    }
    for (name, def) in functions {
        interp.envs.define_function(to, &name, def);
    }
    for (name, class) in classes {
        interp.envs.define_class(to, &name, class);
    }
    Ok(())
}
