use std::{
    sync::{Arc, atomic::AtomicBool, atomic::Ordering},
    thread,
    time::{Duration, Instant},
};

use olol::{Error, Vm, VmConfig};

const SPIN: &str = "HAI ME TEH VARIABLE X TEH INTEGR ITZ 0\n\
     HAI ME TEH FUNCSHUN MAIN\n\
     WHILE YEZ\n\
     X ITZ X MOAR 1\n\
     KTHX\n\
     KTHXBAI";

#[test]
fn infinite_loop_times_out_within_bounds() {
    let vm = Vm::new(VmConfig::default()).unwrap();
    let limit = Duration::from_millis(100);
    let started = Instant::now();
    let err = vm.execute_with_timeout(SPIN, limit).unwrap_err();
    let wall = started.elapsed();
    let Error::Timeout { elapsed } = err else {
        panic!("expected a timeout, got {err:?}");
    };
    assert!(elapsed >= limit, "elapsed {elapsed:?} < limit");
    assert!(elapsed <= Duration::from_millis(200), "elapsed {elapsed:?} too long");
    assert!(wall <= Duration::from_millis(500), "wall {wall:?} too long");
}

#[test]
fn configured_timeout_applies_to_execute() {
    let vm = Vm::new(VmConfig {
        timeout: Some(Duration::from_millis(50)),
        ..VmConfig::default()
    })
    .unwrap();
    let err = vm.execute(SPIN).unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
}

#[test]
fn fast_programs_beat_the_timeout() {
    let vm = Vm::new(VmConfig::default()).unwrap();
    let outcome = vm
        .execute_with_timeout("HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ 1 KTHXBAI", Duration::from_secs(5))
        .unwrap();
    assert_eq!(outcome.value, olol::HostValue::Int(1));
}

#[test]
fn cancellation_flag_aborts_execution() {
    let vm = Vm::new(VmConfig::default()).unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    let trigger = cancel.clone();
    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        trigger.store(true, Ordering::Relaxed);
    });
    let err = vm.execute_with_cancellation(SPIN, cancel).unwrap_err();
    setter.join().unwrap();
    let Error::Timeout { elapsed } = err else {
        panic!("expected a timeout, got {err:?}");
    };
    assert!(elapsed >= Duration::from_millis(50));
}

#[test]
fn zero_timeout_is_a_config_error() {
    let vm = Vm::new(VmConfig::default()).unwrap();
    let err = vm.execute_with_timeout(SPIN, Duration::ZERO).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let err = Vm::new(VmConfig {
        timeout: Some(Duration::ZERO),
        ..VmConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn empty_base_dir_is_a_config_error() {
    let err = Vm::new(VmConfig {
        base_dir: std::path::PathBuf::new(),
        ..VmConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn readers_share_the_vm_across_threads() {
    let vm = Arc::new(Vm::new(VmConfig::default()).unwrap());
    vm.execute(
        "HAI ME TEH FUNCSHUN SQUARE TEH INTEGR WIT X TEH INTEGR\n\
         GIVEZ X TIEMZ X\n\
         KTHXBAI",
    )
    .unwrap();
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let vm = vm.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let result = vm.call("SQUARE", &[olol::HostValue::Int(i)]).unwrap();
                    assert_eq!(result, olol::HostValue::Int(i * i));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}
