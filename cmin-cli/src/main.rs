//! Entrypoint for CLI
use std::{env, error::Error, fs, io::Write, path::Path};

use cmin::prelude::*;
use log::{error, info};

static USAGE: &str = r#"
usage: cmin CMD [OPTIONS] FILE

commands:
    run     Compile (or load) the target program and execute it
    build   Compile the target source file into a word image
    ast     Print the typed syntax tree of the target source file

options:
    -d      After `run', dump the registers and the program image

examples:
    cmin run fib.c
    cmin run -d fib.c
    cmin build fib.c
    cmin ast fib.c
"#;

/// Step budget guarding against runaway programs.
const STEP_BUDGET: usize = 1_000_000;

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Run { filepath, dump }) => run_program(filepath, dump)?,
        Some(Cmd::Build { filepath }) => build_program(filepath)?,
        Some(Cmd::Ast { filepath }) => print_ast(filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn run_program(filepath: String, dump: bool) -> Result<(), Box<dyn Error>> {
    let words = load_words(&filepath)?;
    let image_len = words.len();

    let mut cpu = Processor::new(Memory::with_image(&words));

    info!("executing {filepath}");
    let halt = cpu.run(STEP_BUDGET).cloned();

    if dump {
        print!("{}", cpu.dump_registers()?);
        print!("{}", cpu.memory().dump(0, image_len)?);
    }

    match halt {
        Some(Halt::Exit(status)) => {
            println!("exit status #{status:04X} = {status}");
            Ok(())
        }
        Some(Halt::EmptyStack) => {
            println!("halted: return with empty stack");
            Ok(())
        }
        Some(Halt::Fault(message)) => {
            // Runtime faults go to the error stream.
            error!("{message}");
            Err(Box::new(CminError::Runtime(message)))
        }
        None => {
            error!("step budget of {STEP_BUDGET} exhausted; stopping");
            Ok(())
        }
    }
}

fn build_program(filepath: String) -> Result<(), Box<dyn Error>> {
    let source_code = fs::read_to_string(&filepath)?;
    let words = report(compile_str(filepath.as_str(), source_code))?;

    let outpath = Path::new(&filepath).with_extension("bin");
    let mut outfile = fs::File::create(&outpath)?;
    for word in &words {
        outfile.write_all(&word.to_le_bytes())?;
    }
    info!("wrote {} words to {}", words.len(), outpath.display());

    dump_words(&words);
    Ok(())
}

fn print_ast(filepath: String) -> Result<(), Box<dyn Error>> {
    let source_code = fs::read_to_string(&filepath)?;
    let program = report(Parser::new(filepath.as_str(), source_code).parse())?;
    print!("{}", Printer::new().print(&program)?);
    Ok(())
}

/// A `.c` file is compiled; anything else is loaded as a prebuilt
/// word image, little-endian, mapped verbatim at address 0.
fn load_words(filepath: &str) -> Result<Vec<Word>, Box<dyn Error>> {
    if filepath.ends_with(".c") {
        let source_code = fs::read_to_string(filepath)?;
        Ok(report(compile_str(filepath, source_code))?)
    } else {
        let bytes = fs::read(filepath)?;
        Ok(bytes
            .chunks(2)
            .map(|pair| Word::from_le_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect())
    }
}

/// Route front end diagnostics to the error stream before giving up.
fn report<T>(result: CminResult<T>) -> Result<T, CminError> {
    result.map_err(|err| {
        error!("{err}");
        err
    })
}

fn dump_words(words: &[Word]) {
    for (position, word) in words.iter().enumerate() {
        println!("{position:04X}: {word:04X}");
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;

    match cmd.as_str() {
        "run" => {
            let mut dump = false;
            let mut filepath = None;
            for arg in args {
                if arg == "-d" {
                    dump = true;
                } else {
                    filepath = Some(arg);
                }
            }
            Some(Cmd::Run {
                filepath: filepath?,
                dump,
            })
        }
        "build" => Some(Cmd::Build {
            filepath: args.next()?,
        }),
        "ast" => Some(Cmd::Ast {
            filepath: args.next()?,
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("{USAGE}");
}

enum Cmd {
    /// Compile and execute
    Run { filepath: String, dump: bool },
    /// Compile to a word image
    Build { filepath: String },
    /// Print the syntax tree
    Ast { filepath: String },
}
