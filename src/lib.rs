//! bytevm library.
//!
//! A stack-based bytecode virtual machine with a two-byte instruction
//! encoding, plus the decoding layer its disassembler is built on.

#[cfg(test)]
mod test_utils;
pub mod utils;
pub mod virtual_machine;
