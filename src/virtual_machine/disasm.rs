//! Instruction decoding for tooling.
//!
//! A pure decode layer over the instruction stream: no execution, no VM
//! state. The `disasm` binary renders its output; anything else that wants
//! to inspect bytecode (tests, debuggers) can reuse the decoder. Mnemonics
//! come from the ISA's [`MNEMONIC_TABLE`]; stdcall slot names from the
//! standard library.

use crate::virtual_machine::isa::{MNEMONIC_TABLE, Opcode};
use crate::virtual_machine::stdlib::StdLib;
use std::fmt::Display;

/// One decoded instruction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DecodedInstruction<'a> {
    /// Byte offset of the instruction header.
    pub offset: u32,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Mnemonic, or `"ndf"` for an unassigned opcode value.
    pub mnemonic: &'static str,
    /// Raw argument byte.
    pub arg: u8,
    /// Immediate bytes following a LOAD header; `None` for anything else.
    /// Clamped to the end of the buffer when the stream is truncated.
    pub immediates: Option<&'a [u8]>,
}

impl DecodedInstruction<'_> {
    /// Offset of the instruction after this one.
    pub fn next_offset(&self) -> u32 {
        self.offset + 2 + self.immediates.map_or(0, |b| b.len() as u32)
    }
}

impl Display for DecodedInstruction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.opcode == Opcode::Stdcall as u8 {
            return write!(f, "{} {}", self.mnemonic, StdLib::name(self.arg));
        }
        write!(f, "{} {}", self.mnemonic, self.arg)?;
        if let Some(immediates) = self.immediates {
            write!(f, ", 0x")?;
            for byte in immediates {
                write!(f, "{byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Decodes the instruction at `offset`.
///
/// Returns `None` when fewer than two bytes remain: a dangling byte at the
/// end of an object is not an instruction.
pub fn decode_at(bytes: &[u8], offset: u32) -> Option<DecodedInstruction<'_>> {
    let header = offset as usize;
    if header + 2 > bytes.len() {
        return None;
    }
    let opcode = bytes[header];
    let arg = bytes[header + 1];
    let immediates = (opcode == Opcode::Load as u8).then(|| {
        let start = header + 2;
        let end = (start + arg as usize).min(bytes.len());
        &bytes[start..end]
    });
    Some(DecodedInstruction {
        offset,
        opcode,
        mnemonic: MNEMONIC_TABLE[opcode as usize],
        arg,
        immediates,
    })
}

/// Iterates over every instruction in a code buffer, in address order.
pub fn disassemble(bytes: &[u8]) -> Disassembler<'_> {
    Disassembler { bytes, offset: 0 }
}

/// Iterator produced by [`disassemble`].
pub struct Disassembler<'a> {
    bytes: &'a [u8],
    offset: u32,
}

impl<'a> Iterator for Disassembler<'a> {
    type Item = DecodedInstruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let instruction = decode_at(self.bytes, self.offset)?;
        self.offset = instruction.next_offset();
        Some(instruction)
    }
}
