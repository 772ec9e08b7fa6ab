//! Bytecode VM runner.
//!
//! Loads one or more compiled code objects and executes them, starting at
//! offset 0 of the first object.
//!
//! # Usage
//! ```text
//! bytevm [OPTIONS] <object> [object ...]
//! ```
//!
//! # Arguments
//! - `object`: Code object files, loaded in command-line order; their
//!   indices are the targets of long jumps and calls
//!
//! # Options
//! - `-d <size>`: Data stack capacity in bytes (defaults to 1024)
//! - `-c <size>`: Call stack capacity in entries (defaults to 256)
//! - `--debug`: Start with the debug flag set (END dumps the data stack)
//! - `--strict`: Treat undefined opcodes as fatal instead of warnings
//!
//! # Exit status
//! 0 on a clean END, 1/2 for usage errors, 3 when an object fails to load,
//! 4 when execution faults.

use bytevm::error;
use bytevm::virtual_machine::object::ObjectTable;
use bytevm::virtual_machine::vm::{VM, VmConfig};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut config = VmConfig::default();
    let mut files: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("-d" | "-c") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                let size = args[i].parse::<u32>().unwrap_or_else(|_| {
                    error!("Invalid size for {k}: '{}' is not a valid number", args[i]);
                    process::exit(1);
                });
                if k == "-d" {
                    config.data_stack_capacity = size;
                } else {
                    config.call_stack_capacity = size;
                }
                i += 1;
            }
            "--debug" => {
                config.debug = true;
                i += 1;
            }
            "--strict" => {
                config.strict_undefined = true;
                i += 1;
            }
            other if other.starts_with('-') => {
                error!("Unexpected argument: {}", other);
                print_usage(&args[0]);
                process::exit(1);
            }
            file => {
                files.push(file.to_string());
                i += 1;
            }
        }
    }

    if files.is_empty() {
        error!("No code objects given");
        print_usage(&args[0]);
        process::exit(2);
    }

    let objects = match ObjectTable::load(&files) {
        Ok(objects) => objects,
        Err(e) => {
            error!("{e}");
            process::exit(3);
        }
    };

    let mut vm = VM::new(config, objects);
    if let Err(e) = vm.run() {
        match vm.current_instruction() {
            Some((opcode, arg)) => error!(
                "fault at {} (opcode {opcode:#04x}, arg {arg:#04x}): {e}",
                vm.current_ip()
            ),
            None => error!("fault at {}: {e}", vm.current_ip()),
        }
        process::exit(4);
    }
}

const USAGE: &str = "\
Bytecode VM

USAGE:
    {program} [OPTIONS] <object> [object ...]

ARGS:
    <object>    Code object files, loaded in command-line order; long jumps
                and calls address them by that order

OPTIONS:
    -d <size>    Data stack capacity in bytes (default 1024)
    -c <size>    Call stack capacity in entries (default 256)
    --debug      Start with the debug flag set (END dumps the data stack)
    --strict     Treat undefined opcodes as fatal
    -h, --help   Print this help message

EXAMPLES:
    # Run a single object
    {program} program.bin

    # Run with a larger data stack and a second object for long calls
    {program} -d 4096 main.bin library.bin
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
