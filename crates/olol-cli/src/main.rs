use std::{env, fs, path::Path, process::ExitCode};

use olol::{Vm, VmConfig};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: olol <file.olol>");
        return ExitCode::FAILURE;
    };
    if !file_path.to_lowercase().ends_with(".olol") {
        eprintln!("error: {file_path} is not an .olol file");
        return ExitCode::FAILURE;
    }
    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let base_dir = Path::new(file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| ".".into(), Path::to_path_buf);
    let config = VmConfig {
        base_dir,
        capture_output: false,
        use_stdin: true,
        ..VmConfig::default()
    };
    let vm = match Vm::new(config) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match vm.execute(&source) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
