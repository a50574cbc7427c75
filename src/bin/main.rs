use std::{env, error::Error, fs, process::ExitCode};

use cmc::{pipeline, util::fmt};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("failed to run: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool, Box<dyn Error>> {
    let mut args = env::args().skip(1).peekable();
    let tree = args.next_if(|arg| arg == "--tree").is_some();
    let (Some(path), None) = (args.next(), args.next()) else {
        eprintln!("usage: cmc [--tree] <source-file>");
        return Ok(false);
    };

    let src = fs::read_to_string(&path)?;
    if tree {
        return match pipeline::analyze(&src) {
            Ok(program) => {
                print!("{}", fmt::print_program_string(&program));
                Ok(true)
            }
            Err(diagnostics) => report(&path, &diagnostics),
        };
    }
    match pipeline::compile(&src) {
        Ok(code) => {
            print!("{code}");
            Ok(true)
        }
        Err(diagnostics) => report(&path, &diagnostics),
    }
}

fn report(path: &str, diagnostics: &[pipeline::Diagnostic]) -> Result<bool, Box<dyn Error>> {
    for diagnostic in diagnostics {
        eprintln!("{path}: {diagnostic}");
    }
    Ok(false)
}
