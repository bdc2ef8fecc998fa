use olol::{Error, ErrorKind, HostValue, Vm, VmConfig};
use pretty_assertions::assert_eq;

fn vm() -> Vm {
    Vm::new(VmConfig::default()).unwrap()
}

#[test]
fn hello_world_captures_output() {
    let vm = vm();
    let outcome = vm
        .execute(r#"I CAN HAS STDIO? HAI ME TEH FUNCSHUN MAIN SAYZ WIT "Hello, World!" KTHXBAI"#)
        .unwrap();
    assert_eq!(outcome.output, "Hello, World!\n");
    assert_eq!(outcome.value, HostValue::Nothin);
}

#[test]
fn main_return_value_converts_to_host_integer() {
    let vm = vm();
    let outcome = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ 42 KTHXBAI")
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(42));
}

#[test]
fn arithmetic_precedence_from_source() {
    let vm = vm();
    let outcome = vm
        .execute(
            "HAI ME TEH VARIABLE RESULT TEH INTEGR ITZ 10 MOAR 5 TIEMZ 2\n\
             HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ RESULT KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(20));
}

#[test]
fn try_catch_finally_prints_and_terminates_normally() {
    let vm = vm();
    let outcome = vm
        .execute(
            "I CAN HAS STDIO?\n\
             HAI ME TEH FUNCSHUN MAIN\n\
             MAYB\n\
             OOPS \"boom\"\n\
             OOPSIE E\n\
             SAYZ WIT E\n\
             ALWAYZ\n\
             SAYZ WIT \"end\"\n\
             KTHX\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.output, "boom\nend\n");
}

#[test]
fn compile_errors_aggregate_with_line_numbers() {
    let vm = vm();
    let err = vm.execute("HAI ME TEH GARBAGE\nHAI ME TEH NONSENSE").unwrap_err();
    let Error::Compile(compile) = err else {
        panic!("expected a compile error, got {err:?}");
    };
    assert_eq!(compile.errors.len(), 2);
    assert_eq!(compile.errors[0].line, 1);
    assert_eq!(compile.errors[1].line, 2);
}

#[test]
fn uncaught_exception_is_a_runtime_error_with_the_message() {
    let vm = vm();
    let err = vm.execute("HAI ME TEH FUNCSHUN MAIN OOPS \"kaput\" KTHXBAI").unwrap_err();
    let Error::Runtime(runtime) = err else {
        panic!("expected a runtime error, got {err:?}");
    };
    assert_eq!(runtime.kind, ErrorKind::Exception);
    assert_eq!(runtime.message, "kaput");
}

#[test]
fn locked_variable_keeps_its_value_after_failed_write() {
    let vm = vm();
    let err = vm
        .execute(
            "HAI ME TEH LOCKD VARIABLE LIMIT TEH INTEGR ITZ 10\n\
             HAI ME TEH FUNCSHUN MAIN LIMIT ITZ 11 KTHXBAI",
        )
        .unwrap_err();
    let Error::Runtime(runtime) = err else {
        panic!("expected a runtime error, got {err:?}");
    };
    assert_eq!(runtime.kind, ErrorKind::TypeError);
    assert_eq!(vm.get_variable("LIMIT").unwrap(), HostValue::Int(10));
}

#[test]
fn globals_persist_across_executes() {
    let vm = vm();
    vm.execute("HAI ME TEH VARIABLE COUNT TEH INTEGR ITZ 1").unwrap();
    let outcome = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ COUNT MOAR 1 KTHXBAI")
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(2));
}

#[test]
fn case_permutations_behave_identically() {
    for source in [
        "HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ 5 KTHXBAI",
        "hai me teh funcshun main teh integr givez 5 kthxbai",
        "Hai Me Teh Funcshun Main Teh Integr Givez 5 Kthxbai",
    ] {
        let vm = vm();
        let outcome = vm.execute(source).unwrap();
        assert_eq!(outcome.value, HostValue::Int(5), "source: {source}");
    }
}

#[test]
fn reset_clears_globals() {
    let vm = vm();
    vm.execute("HAI ME TEH VARIABLE COUNT TEH INTEGR ITZ 1").unwrap();
    vm.reset();
    let err = vm.get_variable("COUNT").unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::NameError));
}

#[test]
fn bukkit_and_baskit_convert_structurally() {
    let vm = vm();
    let outcome = vm
        .execute(
            "HAI ME TEH FUNCSHUN MAIN TEH BUKKIT\n\
             I HAS A VARIABLE B TEH BUKKIT ITZ NEW BUKKIT\n\
             B DO PUSH WIT 1\n\
             B DO PUSH WIT \"two\"\n\
             GIVEZ B\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(
        outcome.value,
        HostValue::Bukkit(vec![HostValue::Int(1), HostValue::Strin("two".to_owned())])
    );
}
