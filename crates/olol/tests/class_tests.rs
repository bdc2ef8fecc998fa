use std::sync::{Arc, Mutex};

use olol::{Error, ErrorKind, HostClassSpec, HostMethodSpec, HostValue, HostVarSpec, Vm, VmConfig};
use pretty_assertions::assert_eq;

fn vm() -> Vm {
    Vm::new(VmConfig::default()).unwrap()
}

const ANIMALS: &str = "HAI ME TEH CLAS ANIMAL\n\
     DIS TEH FUNCSHUN GET_NAME TEH STRIN\n\
     GIVEZ \"animal\"\n\
     KTHXBAI\n\
     KTHXBAI\n\
     HAI ME TEH CLAS DOG KITTEH OF ANIMAL\n\
     DIS TEH FUNCSHUN GET_NAME TEH STRIN\n\
     GIVEZ \"dog\"\n\
     KTHXBAI\n\
     KTHXBAI\n";

#[test]
fn override_dispatches_to_the_most_specific_class() {
    let vm = vm();
    let source = format!(
        "{ANIMALS}\
         HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
         I HAS A VARIABLE D TEH DOG ITZ NEW DOG\n\
         GIVEZ D DO GET_NAME\n\
         KTHXBAI"
    );
    let outcome = vm.execute(&source).unwrap();
    assert_eq!(outcome.value, HostValue::Strin("dog".to_owned()));
}

#[test]
fn returned_instances_are_opaque_handles_with_introspection() {
    let vm = vm();
    let source = format!(
        "{ANIMALS}\
         HAI ME TEH FUNCSHUN MAIN TEH DOG\n\
         GIVEZ NEW DOG\n\
         KTHXBAI"
    );
    let outcome = vm.execute(&source).unwrap();
    let HostValue::Object(handle) = outcome.value else {
        panic!("expected an object handle, got {:?}", outcome.value);
    };

    let mro = vm.object_mro(&handle).unwrap();
    assert_eq!(mro, vec!["<main>::DOG".to_owned(), "<main>::ANIMAL".to_owned()]);
    assert_eq!(vm.object_functions(&handle).unwrap(), vec!["GET_NAME".to_owned()]);

    // the handle stays callable
    assert_eq!(
        vm.call_method(&handle, "GET_NAME", &[]).unwrap(),
        HostValue::Strin("dog".to_owned())
    );
}

#[test]
fn object_add_variable_is_readable_from_script() {
    let vm = vm();
    let source = format!(
        "{ANIMALS}\
         HAI ME TEH FUNCSHUN MAIN TEH DOG\n\
         GIVEZ NEW DOG\n\
         KTHXBAI"
    );
    let outcome = vm.execute(&source).unwrap();
    let HostValue::Object(handle) = outcome.value else {
        panic!("expected an object handle");
    };
    vm.object_add_variable(&handle, "NICKNAME", &HostValue::Strin("rex".to_owned()))
        .unwrap();
    assert!(vm.object_variables(&handle).unwrap().contains(&"NICKNAME".to_owned()));

    vm.define_variable("PET", &HostValue::Object(handle), false).unwrap();
    let outcome = vm
        .execute("HAI ME TEH FUNCSHUN MAIN TEH STRIN GIVEZ PET NICKNAME KTHXBAI")
        .unwrap();
    assert_eq!(outcome.value, HostValue::Strin("rex".to_owned()));
}

#[test]
fn host_class_with_methods_and_variables() {
    let vm = vm();
    vm.define_class(HostClassSpec {
        name: "ROBOT".to_owned(),
        parent: None,
        variables: vec![HostVarSpec::new("BATTERY", HostValue::Int(100))],
        methods: vec![HostMethodSpec {
            name: "GREET".to_owned(),
            arity: 1,
            handler: Arc::new(|_handle, args| {
                let HostValue::Strin(name) = &args[0] else {
                    return Err("GREET expects a STRIN".to_owned());
                };
                Ok(HostValue::Strin(format!("beep {name}")))
            }),
        }],
        unknown_method: None,
    })
    .unwrap();
    let outcome = vm
        .execute(
            "HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             I HAS A VARIABLE R TEH ROBOT ITZ NEW ROBOT\n\
             R BATTERY ITZ 50\n\
             GIVEZ (R DO GREET WIT \"ada\") MOAR (R BATTERY AS STRIN)\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Strin("beep ada50".to_owned()));
}

#[test]
fn host_class_getter_computes_reads() {
    let vm = vm();
    vm.define_class(HostClassSpec {
        name: "CLOCK".to_owned(),
        parent: None,
        variables: vec![HostVarSpec {
            getter: Some(Arc::new(|_handle| Ok(HostValue::Int(1234)))),
            ..HostVarSpec::new("TICKS", HostValue::Int(0))
        }],
        methods: vec![],
        unknown_method: None,
    })
    .unwrap();
    let outcome = vm
        .execute(
            "HAI ME TEH FUNCSHUN MAIN TEH INTEGR\n\
             I HAS A VARIABLE C TEH CLOCK ITZ NEW CLOCK\n\
             GIVEZ C TICKS\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Int(1234));
}

#[test]
fn host_class_setter_observes_writes() {
    let written = Arc::new(Mutex::new(None::<HostValue>));
    let sink = written.clone();
    let vm = vm();
    vm.define_class(HostClassSpec {
        name: "SINK".to_owned(),
        parent: None,
        variables: vec![HostVarSpec {
            setter: Some(Arc::new(move |_handle, value| {
                *sink.lock().unwrap() = Some(value.clone());
                Ok(())
            })),
            ..HostVarSpec::new("LEVEL", HostValue::Int(0))
        }],
        methods: vec![],
        unknown_method: None,
    })
    .unwrap();
    vm.execute(
        "HAI ME TEH FUNCSHUN MAIN\n\
         I HAS A VARIABLE S TEH SINK ITZ NEW SINK\n\
         S LEVEL ITZ 9\n\
         KTHXBAI",
    )
    .unwrap();
    assert_eq!(*written.lock().unwrap(), Some(HostValue::Int(9)));
}

#[test]
fn unknown_method_handler_receives_the_name() {
    let vm = vm();
    vm.define_class(HostClassSpec {
        name: "ECHO".to_owned(),
        parent: None,
        variables: vec![],
        methods: vec![],
        unknown_method: Some(Arc::new(|_handle, name, args| {
            Ok(HostValue::Strin(format!("{name}/{}", args.len())))
        })),
    })
    .unwrap();
    let outcome = vm
        .execute(
            "HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             I HAS A VARIABLE E TEH ECHO ITZ NEW ECHO\n\
             GIVEZ E DO ANYTHING WIT 1 AN WIT 2\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Strin("ANYTHING/2".to_owned()));
}

#[test]
fn script_class_can_extend_a_host_class() {
    let vm = vm();
    vm.define_class(HostClassSpec {
        name: "BASE".to_owned(),
        parent: None,
        variables: vec![],
        methods: vec![HostMethodSpec {
            name: "KIND".to_owned(),
            arity: 0,
            handler: Arc::new(|_, _| Ok(HostValue::Strin("base".to_owned()))),
        }],
        unknown_method: None,
    })
    .unwrap();
    let outcome = vm
        .execute(
            "HAI ME TEH CLAS CHILD KITTEH OF BASE\n\
             KTHXBAI\n\
             HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             I HAS A VARIABLE C TEH CHILD ITZ NEW CHILD\n\
             GIVEZ C DO KIND\n\
             KTHXBAI",
        )
        .unwrap();
    assert_eq!(outcome.value, HostValue::Strin("base".to_owned()));
}

#[test]
fn private_members_stay_private_at_the_embedding_boundary() {
    let vm = vm();
    vm.execute(
        "HAI ME TEH CLAS VAULT\n\
         MAHSELF\n\
         DIS TEH FUNCSHUN COMBO TEH INTEGR GIVEZ 1234 KTHXBAI\n\
         KTHXBAI\n\
         HAI ME TEH FUNCSHUN MAKE TEH VAULT GIVEZ NEW VAULT KTHXBAI",
    )
    .unwrap();
    let HostValue::Object(handle) = vm.call("MAKE", &[]).unwrap() else {
        panic!("expected an object handle");
    };
    let err = vm.call_method(&handle, "COMBO", &[]).unwrap_err();
    assert!(matches!(err, Error::Runtime(r) if r.kind == ErrorKind::VisibilityError));
}
