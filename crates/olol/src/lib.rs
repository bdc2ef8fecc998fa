#![doc = include_str!("../../../README.md")]

mod ast;
mod class;
mod convert;
mod env;
mod error;
mod exception;
mod function;
mod heap;
mod interp;
mod io;
mod json_api;
mod lexer;
mod modules;
mod parser;
mod resolver;
mod resource;
mod trace;
mod types;
mod value;
mod vm;

pub use crate::{
    convert::{HostValue, OBJECT_REF_KEY},
    error::{CompileError, Error, ErrorKind, RuntimeError, SyntaxError},
    io::{CollectStringPrint, InputReader, NoInput, NoPrint, PrintWriter, StdInput, StdPrint},
    json_api::{JsonApi, JsonCallbackDispatcher},
    resource::CancelFlag,
    trace::{ExecTracer, NoopTracer, StderrTracer},
    vm::{
        ExecOutcome, HostClassSpec, HostFunction, HostGetter, HostMethod, HostMethodSpec, HostSetter,
        HostUnknownMethod, HostVarSpec, VARIADIC, Vm, VmConfig,
    },
};
