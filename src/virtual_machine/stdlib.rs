//! The standard-library call table.
//!
//! STDCALL selects a host function by an 8-bit index into a 256-slot table.
//! A host function receives a [`HostContext`] handle onto the VM's data
//! stack, pops its own typed arguments, and performs its I/O synchronously
//! before the fetch loop resumes. Empty slots fault as
//! [`VMError::UnknownStdcall`].
//!
//! Calling convention: every function's stream descriptor is pushed first,
//! so it is the last argument popped. Descriptor 1 is stdout, 2 is stderr;
//! anything else faults. For `print_str` the caller pushes the payload, then
//! its byte count; the function pops count, payload, descriptor in that
//! order. This field order is fixed: existing compiled objects depend on it.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::stack::ByteStack;
use std::io::Write;

/// Handle a host function receives onto VM state.
///
/// Host functions may pop and push the data stack but see nothing else of
/// the VM; they cannot reenter the fetch loop.
pub struct HostContext<'vm> {
    pub stack: &'vm mut ByteStack,
}

/// A host function invocable through STDCALL.
pub type HostFn = fn(&mut HostContext) -> Result<(), VMError>;

/// Names of the occupied stdlib slots, for the disassembler.
const NAMES: [(u8, &str); 5] = [
    (1, "print_str"),
    (2, "print_int"),
    (3, "print_uint"),
    (4, "print_float"),
    (5, "print_double"),
];

/// The 256-slot standard-library function table.
pub struct StdLib {
    table: [Option<HostFn>; 256],
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new()
    }
}

impl StdLib {
    /// Builds the table with the built-in printing functions at slots 1-5.
    pub fn new() -> Self {
        let mut table: [Option<HostFn>; 256] = [None; 256];
        table[1] = Some(print_str as HostFn);
        table[2] = Some(print_int as HostFn);
        table[3] = Some(print_uint as HostFn);
        table[4] = Some(print_float as HostFn);
        table[5] = Some(print_double as HostFn);
        Self { table }
    }

    /// Returns the function at `index`, if the slot is occupied.
    pub fn get(&self, index: u8) -> Option<HostFn> {
        self.table[index as usize]
    }

    /// Returns the name of the function at `index`, or `"undefined"`.
    pub fn name(index: u8) -> &'static str {
        NAMES
            .iter()
            .find(|(slot, _)| *slot == index)
            .map(|(_, name)| *name)
            .unwrap_or("undefined")
    }
}

/// Writes to the stream named by a descriptor popped off the stack.
///
/// Write errors are not surfaced to the program, matching the source
/// engine; an unknown descriptor is a fault.
fn write_stream(descriptor: i32, bytes: &[u8]) -> Result<(), VMError> {
    match descriptor {
        1 => {
            let _ = std::io::stdout().write_all(bytes);
            Ok(())
        }
        2 => {
            let _ = std::io::stderr().write_all(bytes);
            Ok(())
        }
        _ => Err(VMError::InvalidStreamDescriptor { descriptor }),
    }
}

/// Slot 1: pops a byte count, that many payload bytes, and a stream
/// descriptor; writes the payload verbatim.
fn print_str(context: &mut HostContext) -> Result<(), VMError> {
    let size = context.stack.pop_u32()?;
    let payload = context.stack.pop(size)?;
    let descriptor = context.stack.pop_i32()?;
    write_stream(descriptor, &payload)
}

/// Slot 2: pops a signed 32-bit value and a stream descriptor.
fn print_int(context: &mut HostContext) -> Result<(), VMError> {
    let value = context.stack.pop_i32()?;
    let descriptor = context.stack.pop_i32()?;
    write_stream(descriptor, value.to_string().as_bytes())
}

/// Slot 3: pops an unsigned 32-bit value and a stream descriptor.
fn print_uint(context: &mut HostContext) -> Result<(), VMError> {
    let value = context.stack.pop_u32()?;
    let descriptor = context.stack.pop_i32()?;
    write_stream(descriptor, value.to_string().as_bytes())
}

/// Slot 4: pops a 1-byte precision, an f32, and a stream descriptor.
fn print_float(context: &mut HostContext) -> Result<(), VMError> {
    let precision = context.stack.pop_u8()? as i8;
    let value = context.stack.pop_f32()?;
    let descriptor = context.stack.pop_i32()?;
    let text = format!("{:.*}", precision.max(0) as usize, value);
    write_stream(descriptor, text.as_bytes())
}

/// Slot 5: pops a 1-byte precision, an f64, and a stream descriptor.
fn print_double(context: &mut HostContext) -> Result<(), VMError> {
    let precision = context.stack.pop_u8()? as i8;
    let value = context.stack.pop_f64()?;
    let descriptor = context.stack.pop_i32()?;
    let text = format!("{:.*}", precision.max(0) as usize, value);
    write_stream(descriptor, text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with(chunks: &[&[u8]]) -> ByteStack {
        let mut stack = ByteStack::new(256);
        for chunk in chunks {
            stack.push(chunk).unwrap();
        }
        stack
    }

    #[test]
    fn occupied_slots() {
        let stdlib = StdLib::new();
        for index in 1..=5 {
            assert!(stdlib.get(index).is_some());
        }
        assert!(stdlib.get(0).is_none());
        assert!(stdlib.get(6).is_none());
        assert!(stdlib.get(255).is_none());
    }

    #[test]
    fn slot_names() {
        assert_eq!(StdLib::name(1), "print_str");
        assert_eq!(StdLib::name(5), "print_double");
        assert_eq!(StdLib::name(0), "undefined");
        assert_eq!(StdLib::name(200), "undefined");
    }

    #[test]
    fn print_str_pops_count_payload_then_descriptor() {
        let mut stack = stack_with(&[
            &1i32.to_le_bytes(), // stream descriptor, pushed first
            b"hello",
            &5u32.to_le_bytes(), // byte count on top
        ]);
        let mut context = HostContext { stack: &mut stack };
        print_str(&mut context).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn print_int_pops_value_then_descriptor() {
        let mut stack = stack_with(&[&2i32.to_le_bytes(), &(-42i32).to_le_bytes()]);
        let mut context = HostContext { stack: &mut stack };
        print_int(&mut context).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn print_float_pops_precision_value_then_descriptor() {
        let mut stack = stack_with(&[
            &1i32.to_le_bytes(),
            &1.5f32.to_le_bytes(),
            &[3u8], // precision on top
        ]);
        let mut context = HostContext { stack: &mut stack };
        print_float(&mut context).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn unknown_descriptor_faults() {
        let mut stack = stack_with(&[&7i32.to_le_bytes(), &1u32.to_le_bytes()]);
        let mut context = HostContext { stack: &mut stack };
        let err = print_uint(&mut context).unwrap_err();
        assert_eq!(err, VMError::InvalidStreamDescriptor { descriptor: 7 });
    }

    #[test]
    fn print_str_underflow_propagates() {
        let mut stack = stack_with(&[&100u32.to_le_bytes()]);
        let mut context = HostContext { stack: &mut stack };
        assert!(matches!(
            print_str(&mut context),
            Err(VMError::StackUnderflow { .. })
        ));
    }
}
