use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use olol::{Error, ErrorKind, HostValue, VARIADIC, Vm, VmConfig};
use pretty_assertions::assert_eq;

fn vm() -> Vm {
    Vm::new(VmConfig::default()).unwrap()
}

#[test]
fn call_a_script_function_with_argument_casts() {
    let vm = vm();
    vm.execute(
        "HAI ME TEH FUNCSHUN ADD TEH INTEGR WIT X TEH INTEGR AN WIT Y TEH INTEGR\n\
         GIVEZ X MOAR Y\n\
         KTHXBAI",
    )
    .unwrap();
    // names are case-insensitive at the embedding boundary too
    assert_eq!(
        vm.call("add", &[HostValue::Int(10), HostValue::Int(5)]).unwrap(),
        HostValue::Int(15)
    );
    // DUBBLE arguments are cast to the INTEGR parameters
    assert_eq!(
        vm.call("add", &[HostValue::Dubble(5.7), HostValue::Dubble(2.3)]).unwrap(),
        HostValue::Int(7)
    );
}

#[test]
fn call_unknown_function_is_a_name_error() {
    let vm = vm();
    let err = vm.call("MISSING", &[]).unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::NameError));
}

#[test]
fn call_with_wrong_arity_is_an_arity_error() {
    let vm = vm();
    vm.execute("HAI ME TEH FUNCSHUN ONE TEH INTEGR WIT X TEH INTEGR GIVEZ X KTHXBAI")
        .unwrap();
    let err = vm.call("ONE", &[]).unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::ArityError));
}

#[test]
fn get_set_and_define_variables() {
    let vm = vm();
    vm.execute("HAI ME TEH VARIABLE COUNT TEH INTEGR ITZ 1").unwrap();
    assert_eq!(vm.get_variable("count").unwrap(), HostValue::Int(1));

    // assignment casts to the declared type
    vm.set_variable("COUNT", &HostValue::Strin("5".to_owned())).unwrap();
    assert_eq!(vm.get_variable("COUNT").unwrap(), HostValue::Int(5));

    let err = vm.set_variable("MISSING", &HostValue::Int(1)).unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::NameError));

    vm.define_variable("GREETING", &HostValue::Strin("hi".to_owned()), false)
        .unwrap();
    assert_eq!(vm.get_variable("GREETING").unwrap(), HostValue::Strin("hi".to_owned()));
}

#[test]
fn locked_definitions_reject_writes() {
    let vm = vm();
    vm.define_variable("K", &HostValue::Int(1), true).unwrap();
    let err = vm.set_variable("K", &HostValue::Int(2)).unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::TypeError));
    assert_eq!(vm.get_variable("K").unwrap(), HostValue::Int(1));
}

#[test]
fn host_function_is_callable_from_script() {
    let vm = vm();
    vm.define_function(
        "TWICE",
        1,
        Arc::new(|args| match &args[0] {
            HostValue::Int(i) => Ok(HostValue::Int(i * 2)),
            other => Err(format!("TWICE expects an INTEGR, got {other:?}")),
        }),
    )
    .unwrap();
    let outcome = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ TWICE WIT 21 KTHXBAI")
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(42));
}

#[test]
fn host_function_error_is_catchable_in_script() {
    let vm = vm();
    vm.define_function("FAIL", 0, Arc::new(|_| Err("host says no".to_owned())))
        .unwrap();
    let outcome = vm
        .execute(
            "HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             MAYB\n\
             FAIL\n\
             GIVEZ \"unreachable\"\n\
             OOPSIE E\n\
             GIVEZ E\n\
             KTHX\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Strin("host says no".to_owned()));
}

#[test]
fn variadic_host_function_accepts_any_count() {
    let vm = vm();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_handler = seen.clone();
    vm.define_function(
        "SUM",
        VARIADIC,
        Arc::new(move |args| {
            seen_in_handler.store(args.len(), Ordering::SeqCst);
            let mut total = 0i64;
            for arg in args {
                let HostValue::Int(i) = arg else {
                    return Err("SUM expects INTEGRs".to_owned());
                };
                total += i;
            }
            Ok(HostValue::Int(total))
        }),
    )
    .unwrap();
    let outcome = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ SUM WIT 1 AN WIT 2 AN WIT 3 KTHXBAI")
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(6));
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[test]
fn host_container_values_round_trip() {
    let vm = vm();
    vm.execute(
        "HAI ME TEH FUNCSHUN FIRST TEH INTEGR WIT B TEH BUKKIT\n\
         GIVEZ B DO AT WIT 0\n\
         KTHXBAI",
    )
    .unwrap();
    let list = HostValue::Bukkit(vec![HostValue::Int(7), HostValue::Int(8)]);
    assert_eq!(vm.call("FIRST", &[list]).unwrap(), HostValue::Int(7));
}

#[test]
fn registered_module_is_importable() {
    let vm = vm();
    vm.register_module(
        "EXTRAS",
        vec![(
            "TRIPLE".to_owned(),
            1,
            Arc::new(|args: &[HostValue]| match &args[0] {
                HostValue::Int(i) => Ok(HostValue::Int(i * 3)),
                _ => Err("TRIPLE expects an INTEGR".to_owned()),
            }) as olol::HostFunction,
        )],
    )
    .unwrap();
    let outcome = vm
        .execute(
            "I CAN HAS EXTRAS?\n\
             HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ TRIPLE WIT 14 KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(42));
}

#[test]
fn string_module_functions() {
    let vm = vm();
    let outcome = vm
        .execute(
            "I CAN HAS STRING?\n\
             HAI ME TEH FUNCSHUN MAIN TEH INTEGR\n\
             I HAS A VARIABLE PARTS TEH BUKKIT ITZ SPLIT WIT \"a,b,c\" AN WIT \",\"\n\
             IZ (UPPER WIT \"ok\") SAEM AS \"OK\" ?\n\
             GIVEZ (LEN WIT TRIM WIT \"  four  \") MOAR (PARTS DO SIZ)\n\
             KTHX\n\
             GIVEZ 0\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(7));
}

#[test]
fn math_module_selective_import() {
    let vm = vm();
    let outcome = vm
        .execute(
            "I CAN HAS ABS AN MAX FROM MATH?\n\
             HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ MAX WIT (ABS WIT -3) AN WIT 2 KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(3));

    // SQRT was not selected
    let err = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH DUBBLE GIVEZ SQRT WIT 4 KTHXBAI")
        .unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::NameError));
}
