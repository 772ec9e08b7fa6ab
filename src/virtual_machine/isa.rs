//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_opcode!`](crate::for_each_opcode)
//! macro holds the canonical opcode definitions and invokes a callback macro
//! for code generation. This enables multiple modules to generate
//! instruction-related code without duplicating definitions.
//!
//! This module generates:
//! - The [`Opcode`] enum with opcode values
//! - `TryFrom<u8>` for decoding opcode bytes
//! - [`DISPATCH_TABLE`]: 256 [`Handler`] entries with an explicit
//!   [`Handler::Undefined`] sentinel for unassigned opcode values
//! - [`MNEMONIC_TABLE`]: 256 mnemonics for the disassembler, `"ndf"` for
//!   unassigned values
//!
//! # Bytecode Format
//!
//! Every instruction is two bytes: `(opcode: u8, arg: u8)`. The single
//! exception is `LOAD`, whose `arg` names a count of raw immediate bytes that
//! follow the header and are consumed by the instruction itself.

use crate::virtual_machine::errors::VMError;

/// Mnemonic reported for opcode values with no assigned instruction.
pub const UNDEFINED_MNEMONIC: &str = "ndf";

/// Invokes a callback macro with the complete opcode definition list.
///
/// This macro enables code generation for instructions in multiple modules
/// without duplicating the opcode definitions.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // General
            // =========================
            /// NOP ; no operation
            Nop = 0x00, "nop" => Nop,
            /// END ; terminate cleanly, releasing all VM resources
            End = 0x01, "end" => End,
            /// DEBUG arg ; set the debug flag when arg is nonzero, clear it otherwise
            Debug = 0x02, "debug" => Debug,
            /// STDCALL index ; invoke the standard-library function at the given table slot
            Stdcall = 0x03, "stdcall" => Stdcall,
            // =========================
            // Stack
            // =========================
            /// LOAD count ; push the next count code bytes onto the data stack
            /// (decoded by the fetch loop, never dispatched)
            Load = 0x10, "load" => Load,
            /// DUP width ; pop width bytes, push them back twice
            Dup = 0x11, "dup" => Stack,
            /// GET width ; pop a 4-byte position, push a copy of the width bytes stored there
            Get = 0x12, "get" => Stack,
            /// DROP width ; pop width bytes and discard them
            Drop = 0x13, "drop" => Stack,
            // =========================
            // Arithmetic
            // =========================
            /// ADD_UI width ; pop rhs, pop lhs, push lhs + rhs (unsigned, wrapping)
            AddUi = 0x20, "add" => Arith,
            /// ADD_SI width ; pop rhs, pop lhs, push lhs + rhs (signed, wrapping)
            AddSi = 0x21, "sadd" => Arith,
            /// ADD_UF kind ; pop rhs, pop lhs, push lhs + rhs (IEEE)
            AddUf = 0x22, "addf" => Arith,
            /// ADD_SF kind ; pop rhs, pop lhs, push lhs + rhs (IEEE)
            AddSf = 0x23, "saddf" => Arith,
            /// SUB_UI width ; pop rhs, pop lhs, push lhs - rhs (unsigned, wrapping)
            SubUi = 0x24, "sub" => Arith,
            /// SUB_SI width ; pop rhs, pop lhs, push lhs - rhs (signed, wrapping)
            SubSi = 0x25, "ssub" => Arith,
            /// SUB_UF kind ; pop rhs, pop lhs, push lhs - rhs (IEEE)
            SubUf = 0x26, "subf" => Arith,
            /// SUB_SF kind ; pop rhs, pop lhs, push lhs - rhs (IEEE)
            SubSf = 0x27, "ssubf" => Arith,
            /// MUL_UI width ; pop rhs, pop lhs, push lhs * rhs (unsigned, wrapping)
            MulUi = 0x28, "mul" => Arith,
            /// MUL_SI width ; pop rhs, pop lhs, push lhs * rhs (signed, wrapping)
            MulSi = 0x29, "smul" => Arith,
            /// MUL_UF kind ; pop rhs, pop lhs, push lhs * rhs (IEEE)
            MulUf = 0x2A, "mulf" => Arith,
            /// MUL_SF kind ; pop rhs, pop lhs, push lhs * rhs (IEEE)
            MulSf = 0x2B, "smulf" => Arith,
            /// DIV_UI width ; pop rhs, pop lhs, push lhs / rhs (faults on rhs == 0)
            DivUi = 0x2C, "div" => Arith,
            /// DIV_SI width ; pop rhs, pop lhs, push lhs / rhs (faults on rhs == 0)
            DivSi = 0x2D, "sdiv" => Arith,
            /// DIV_UF kind ; pop rhs, pop lhs, push lhs / rhs (IEEE)
            DivUf = 0x2E, "divf" => Arith,
            /// DIV_SF kind ; pop rhs, pop lhs, push lhs / rhs (IEEE)
            DivSf = 0x2F, "sdivf" => Arith,
            /// MOD_UI width ; pop rhs, pop lhs, push lhs % rhs (faults on rhs == 0)
            ModUi = 0x30, "mod" => Arith,
            /// MOD_SI width ; pop rhs, pop lhs, push lhs % rhs (faults on rhs == 0)
            ModSi = 0x31, "smod" => Arith,
            // =========================
            // Bitwise / logical
            // =========================
            /// AND ; pop two bytes, push their bitwise AND
            And = 0x32, "and" => Logic,
            /// AND_L ; pop two bytes, push 1 when both are nonzero, else 0
            AndL = 0x33, "land" => Logic,
            /// OR ; pop two bytes, push their bitwise OR
            Or = 0x34, "or" => Logic,
            /// OR_L ; pop two bytes, push 1 when either is nonzero, else 0
            OrL = 0x35, "lor" => Logic,
            /// XOR ; pop two bytes, push their bitwise XOR
            Xor = 0x36, "xor" => Logic,
            /// XOR_L ; pop two bytes, push 1 when exactly one is nonzero, else 0
            XorL = 0x37, "lxor" => Logic,
            /// NOT ; pop one byte, push its bitwise complement
            Not = 0x38, "not" => Logic,
            /// NOT_L ; pop one byte, push 1 when it is zero, else 0
            NotL = 0x39, "lnot" => Logic,
            /// SHL count ; pop one byte, push it shifted left by count bits
            Shl = 0x3A, "shl" => Shift,
            /// SHR count ; pop one byte, push it shifted right by count bits
            Shr = 0x3B, "shr" => Shift,
            /// ROTL count ; pop one byte, push it rotated left by count bits
            Rotl = 0x3C, "rotl" => Shift,
            /// ROTR count ; pop one byte, push it rotated right by count bits
            Rotr = 0x3D, "rotr" => Shift,
            // =========================
            // Jumps and calls
            // =========================
            /// JMP mode ; pop an offset (mode 0) or address (mode 1), branch within the object
            Jmp = 0x40, "jmp" => Jump,
            /// JMP_L ; pop an address, pop an object index, branch into that object
            JmpL = 0x41, "ljmp" => Jump,
            /// CALL mode ; push the return address, then branch like JMP
            Call = 0x42, "call" => Jump,
            /// CALL_L ; push the return address, then branch like JMP_L
            CallL = 0x43, "lcall" => Jump,
            /// RET levels ; unwind that many call levels, resuming at the last one popped
            Ret = 0x44, "ret" => Ret,
            // =========================
            // Comparison and conditional skips
            // =========================
            /// CMP kind ; pop rhs, pop lhs, set the LT/GT flags (both clear = equal)
            Cmp = 0x50, "cmp" => Cmp,
            /// IFEQ ; skip the next instruction unless the last CMP was equal
            IfEq = 0x51, "ife" => Cond,
            /// IFNEQ ; skip the next instruction unless the last CMP was unequal
            IfNe = 0x52, "ifne" => Cond,
            /// IFGT ; skip the next instruction unless the last CMP set GT
            IfGt = 0x53, "ifgt" => Cond,
            /// IFGE ; skip the next instruction if the last CMP set LT
            IfGe = 0x54, "ifge" => Cond,
            /// IFLT ; skip the next instruction unless the last CMP set LT
            IfLt = 0x55, "iflt" => Cond,
            /// IFLE ; skip the next instruction if the last CMP set GT
            IfLe = 0x56, "ifle" => Cond,
        }
    };
}

/// Handler family an opcode dispatches to.
///
/// Several opcodes share one handler and are disambiguated by the opcode
/// value passed in. `Undefined` is the explicit sentinel for opcode values
/// with no assigned instruction; it is a real table entry, not a null.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handler {
    Nop,
    End,
    Debug,
    Stdcall,
    /// Immediate loads are decoded by the fetch loop and never dispatched;
    /// this entry exists so the table stays total over all 256 values.
    Load,
    Stack,
    Arith,
    Logic,
    Shift,
    Jump,
    Ret,
    Cmp,
    Cond,
    Undefined,
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $family:ident
        ),* $(,)?
    ) => {
        /// A defined instruction opcode.
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::UndefinedOpcode { opcode: value }),
                }
            }
        }

        impl Opcode {
            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the handler family this opcode dispatches to.
            pub const fn handler(&self) -> Handler {
                match self {
                    $( Opcode::$name => Handler::$family, )*
                }
            }
        }

        /// Dispatch table indexed by opcode byte.
        pub const DISPATCH_TABLE: [Handler; 256] = {
            let mut table = [Handler::Undefined; 256];
            $( table[$opcode as usize] = Handler::$family; )*
            table
        };

        /// Mnemonic table indexed by opcode byte, for disassembly.
        pub const MNEMONIC_TABLE: [&str; 256] = {
            let mut table = [UNDEFINED_MNEMONIC; 256];
            $( table[$opcode as usize] = $mnemonic; )*
            table
        };
    };
}

for_each_opcode!(define_opcodes);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_valid() {
        assert_eq!(Opcode::try_from(0x00).unwrap(), Opcode::Nop);
        assert_eq!(Opcode::try_from(0x10).unwrap(), Opcode::Load);
        assert_eq!(Opcode::try_from(0x2C).unwrap(), Opcode::DivUi);
        assert_eq!(Opcode::try_from(0x56).unwrap(), Opcode::IfLe);
    }

    #[test]
    fn opcode_try_from_invalid() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(VMError::UndefinedOpcode { opcode: 0xFF })
        ));
        assert!(matches!(
            Opcode::try_from(0x57),
            Err(VMError::UndefinedOpcode { opcode: 0x57 })
        ));
    }

    #[test]
    fn mnemonics_match_table() {
        assert_eq!(Opcode::AddUi.mnemonic(), "add");
        assert_eq!(Opcode::AddSi.mnemonic(), "sadd");
        assert_eq!(MNEMONIC_TABLE[Opcode::CallL as usize], "lcall");
        assert_eq!(MNEMONIC_TABLE[0xFF], UNDEFINED_MNEMONIC);
    }

    #[test]
    fn dispatch_table_families() {
        assert_eq!(DISPATCH_TABLE[Opcode::Nop as usize], Handler::Nop);
        assert_eq!(DISPATCH_TABLE[Opcode::Load as usize], Handler::Load);
        assert_eq!(DISPATCH_TABLE[Opcode::ModSi as usize], Handler::Arith);
        assert_eq!(DISPATCH_TABLE[Opcode::Rotr as usize], Handler::Shift);
        assert_eq!(DISPATCH_TABLE[0x04], Handler::Undefined);
        assert_eq!(DISPATCH_TABLE[0xFE], Handler::Undefined);
    }

    #[test]
    fn every_defined_opcode_round_trips() {
        let mut defined = 0;
        for value in 0..=255u8 {
            if let Ok(opcode) = Opcode::try_from(value) {
                assert_eq!(opcode as u8, value);
                assert_ne!(DISPATCH_TABLE[value as usize], Handler::Undefined);
                assert_ne!(MNEMONIC_TABLE[value as usize], UNDEFINED_MNEMONIC);
                defined += 1;
            } else {
                assert_eq!(DISPATCH_TABLE[value as usize], Handler::Undefined);
                assert_eq!(MNEMONIC_TABLE[value as usize], UNDEFINED_MNEMONIC);
            }
        }
        assert_eq!(defined, 50);
    }
}
