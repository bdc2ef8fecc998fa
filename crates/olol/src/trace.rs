/// Observation hooks for a running evaluation.
///
/// The interpreter reports coarse progress events; implementations decide
/// what to do with them. The default is [`NoopTracer`]. This is deliberately
/// not a logging facade - embedders wanting logs wire their own tracer.
pub trait ExecTracer: Send {
    /// A statement is about to execute at `line`.
    fn on_statement(&mut self, line: u32) {
        let _ = line;
    }

    /// A function or method named `name` is about to be invoked.
    fn on_call(&mut self, name: &str) {
        let _ = name;
    }

    /// A module is about to be imported.
    fn on_import(&mut self, module: &str) {
        let _ = module;
    }
}

/// Tracer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl ExecTracer for NoopTracer {}

/// Tracer that prints every event to stderr; handy when debugging embeddings.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl ExecTracer for StderrTracer {
    fn on_statement(&mut self, line: u32) {
        eprintln!("[olol] stmt line {line}");
    }

    fn on_call(&mut self, name: &str) {
        eprintln!("[olol] call {name}");
    }

    fn on_import(&mut self, module: &str) {
        eprintln!("[olol] import {module}");
    }
}
