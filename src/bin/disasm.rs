//! Bytecode disassembler CLI.
//!
//! Decodes code object files into mnemonics for human inspection. Performs
//! no execution; it shares only the opcode and stdcall name tables with the
//! engine.
//!
//! # Usage
//! ```text
//! disasm <object> [object ...]
//! ```
//!
//! # Output
//! One instruction per line as `mnemonic argument`. STDCALL arguments are
//! resolved to standard-library function names, LOAD immediates are appended
//! as hex, and unassigned opcode values print as `ndf`.

use bytevm::error;
use bytevm::virtual_machine::disasm::disassemble;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let files: Vec<&String> = args[1..].iter().collect();
    for file in files {
        let bytes = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read '{}': {}", file, e);
                process::exit(2);
            }
        };

        println!("; BEGIN FILE {file}");
        for instruction in disassemble(&bytes) {
            println!("{instruction}");
        }
        println!("; END FILE {file}");
    }
}

const USAGE: &str = "\
Bytecode Disassembler

USAGE:
    {program} <object> [object ...]

ARGS:
    <object>    Code object files to disassemble

OPTIONS:
    -h, --help    Print this help message
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
