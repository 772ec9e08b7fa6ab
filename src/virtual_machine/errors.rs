use bytevm_derive::Error;

/// Errors that can occur while loading objects or executing bytecode.
///
/// Every variant is local to a single instruction step and fatal to the
/// current run; the fetch-execute loop never retries. [`VMError::UndefinedOpcode`]
/// alone may be downgraded to a warning via
/// [`VmConfig::strict_undefined`](crate::virtual_machine::vm::VmConfig).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VMError {
    /// Push would grow the data stack past its fixed capacity.
    #[error("stack overflow: pushing {requested} bytes onto {used} of {capacity}")]
    StackOverflow {
        requested: u32,
        used: u32,
        capacity: u32,
    },
    /// Pop or peek asked for more bytes than the data stack holds.
    #[error("stack underflow: popping {requested} bytes of {available}")]
    StackUnderflow { requested: u32, available: u32 },
    /// CALL with the return stack already at its fixed capacity.
    #[error("return stack overflow: call depth limit {capacity} reached")]
    ReturnStackOverflow { capacity: u32 },
    /// RET with fewer pending calls than levels to unwind.
    #[error("return stack underflow: unwinding {requested} levels of {available}")]
    ReturnStackUnderflow { requested: u32, available: u32 },
    /// Object index out of range on a long jump or call.
    #[error("illegal reference to object {object}, only {available} loaded")]
    InvalidObjectReference { object: u32, available: u32 },
    /// Instruction or immediate data extends past the end of its object.
    #[error("fetch of {requested} bytes at offset {offset:#x} runs past the end of object {object} ({size} bytes)")]
    CodeOutOfBounds {
        object: u32,
        offset: u32,
        requested: u32,
        size: u32,
    },
    /// Unrecognized width, kind, or mode selector in an instruction argument.
    #[error("instruction {instruction} does not accept argument {tag:#04x}")]
    InvalidOperandTag {
        instruction: &'static str,
        tag: u8,
    },
    /// Integer division or modulo with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// Opcode value with no assigned instruction.
    #[error("undefined opcode {opcode:#04x}")]
    UndefinedOpcode { opcode: u8 },
    /// STDCALL index with no function in the standard-library table.
    #[error("unknown stdcall function {index}")]
    UnknownStdcall { index: u8 },
    /// Standard-library output to a stream descriptor other than stdout/stderr.
    #[error("invalid stream descriptor {descriptor}")]
    InvalidStreamDescriptor { descriptor: i32 },
    /// A code object could not be read into memory.
    #[error("failed to load object {name}: {reason}")]
    ObjectLoadFailure { name: String, reason: String },
}
