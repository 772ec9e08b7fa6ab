//! Core virtual machine implementation.
//!
//! The VM executes two-byte instructions from one or more loaded code
//! objects, using a byte-addressable operand stack and a bounded call stack.
//! Integer arithmetic wraps at its operand width; floats follow IEEE 754.
//!
//! One step of the fetch-execute loop:
//! 1. fetch `(opcode, arg)` at the next instruction pointer, faulting when
//!    the read runs past the object,
//! 2. LOAD is decoded inline: its `arg` immediate bytes are pushed straight
//!    from the code object,
//! 3. for everything else next-IP is first advanced to `current + 2`, so
//!    relative branch targets are measured from the following instruction,
//!    and the opcode is dispatched through [`DISPATCH_TABLE`],
//! 4. the step commits: current-IP becomes the executed address, next-IP
//!    keeps whatever a branch handler wrote into it.
//!
//! END halts the loop cleanly; every fault stops it with the error.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{DISPATCH_TABLE, Handler, Opcode};
use crate::virtual_machine::object::{InstructionPointer, ObjectTable};
use crate::virtual_machine::operand::{AddressMode, CmpKind, FloatKind, IntWidth};
use crate::virtual_machine::stack::{ByteStack, ReturnStack};
use crate::virtual_machine::stdlib::{HostContext, StdLib};
use crate::{info, warn};

pub mod flags;

use flags::Flags;

/// Engine construction parameters.
///
/// Capacities are fixed for the life of the VM; there is no growth.
#[derive(Copy, Clone, Debug)]
pub struct VmConfig {
    /// Data stack capacity in bytes.
    pub data_stack_capacity: u32,
    /// Call stack capacity in return-address entries.
    pub call_stack_capacity: u32,
    /// Treat undefined opcodes as fatal instead of warn-and-continue.
    pub strict_undefined: bool,
    /// Start with the debug flag set.
    pub debug: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            data_stack_capacity: 1024,
            call_stack_capacity: 256,
            strict_undefined: false,
            debug: false,
        }
    }
}

/// Outcome of one fetch-decode-execute step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Keep stepping.
    Continue,
    /// END was executed; shut down cleanly.
    Halt,
}

/// Arithmetic operation shared by the `*_UI`/`*_SI`/`*_UF`/`*_SF` opcodes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Numeric class an arithmetic opcode operates on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum NumericClass {
    Unsigned,
    Signed,
    /// Both float variants: IEEE has no unsigned type, so the `*_UF`
    /// opcodes alias the signed operation.
    Float,
}

/// Splits an arithmetic opcode into its operation and numeric class.
fn arith_kind(opcode: Opcode) -> Option<(ArithOp, NumericClass)> {
    use NumericClass::*;
    let kind = match opcode {
        Opcode::AddUi => (ArithOp::Add, Unsigned),
        Opcode::AddSi => (ArithOp::Add, Signed),
        Opcode::AddUf | Opcode::AddSf => (ArithOp::Add, Float),
        Opcode::SubUi => (ArithOp::Sub, Unsigned),
        Opcode::SubSi => (ArithOp::Sub, Signed),
        Opcode::SubUf | Opcode::SubSf => (ArithOp::Sub, Float),
        Opcode::MulUi => (ArithOp::Mul, Unsigned),
        Opcode::MulSi => (ArithOp::Mul, Signed),
        Opcode::MulUf | Opcode::MulSf => (ArithOp::Mul, Float),
        Opcode::DivUi => (ArithOp::Div, Unsigned),
        Opcode::DivSi => (ArithOp::Div, Signed),
        Opcode::DivUf | Opcode::DivSf => (ArithOp::Div, Float),
        Opcode::ModUi => (ArithOp::Mod, Unsigned),
        Opcode::ModSi => (ArithOp::Mod, Signed),
        _ => return None,
    };
    Some(kind)
}

/// Sign-extends the low `width` bytes of `value` to an `i64`.
fn sign_extend(value: u64, width: IntWidth) -> i64 {
    let shift = 64 - width.bits();
    ((value << shift) as i64) >> shift
}

/// Bytecode virtual machine.
///
/// Owns its stacks and object table exclusively; a run mutates nothing
/// outside this value apart from stdlib host I/O.
pub struct VM {
    /// Instruction just executed.
    current: InstructionPointer,
    /// Where execution resumes.
    next: InstructionPointer,
    /// Operand stack.
    data_stack: ByteStack,
    /// Return-address stack for CALL/RET.
    call_stack: ReturnStack,
    /// Loaded code objects; indices are long-branch targets.
    objects: ObjectTable,
    /// Comparison results and the debug bit.
    flags: Flags,
    /// Standard-library call table.
    stdlib: StdLib,
    /// Fault on undefined opcodes instead of warning.
    strict_undefined: bool,
}

impl VM {
    /// Creates a VM over the given objects. Execution starts at offset 0 of
    /// object 0.
    pub fn new(config: VmConfig, objects: ObjectTable) -> Self {
        let mut flags = Flags::new();
        flags.set_debug(config.debug);
        Self {
            current: InstructionPointer::default(),
            next: InstructionPointer::default(),
            data_stack: ByteStack::new(config.data_stack_capacity),
            call_stack: ReturnStack::new(config.call_stack_capacity),
            objects,
            flags,
            stdlib: StdLib::new(),
            strict_undefined: config.strict_undefined,
        }
    }

    /// Address of the instruction just executed.
    pub fn current_ip(&self) -> InstructionPointer {
        self.current
    }

    /// Address execution resumes from.
    pub fn next_ip(&self) -> InstructionPointer {
        self.next
    }

    /// Opcode and argument bytes at the current instruction pointer, when
    /// still addressable. Used for fault diagnostics.
    pub fn current_instruction(&self) -> Option<(u8, u8)> {
        let object = self.objects.get(self.current.object).ok()?;
        let header = object
            .slice(self.current.object, self.current.offset, 2)
            .ok()?;
        Some((header[0], header[1]))
    }

    /// Runs until END or a fault.
    ///
    /// A clean END returns `Ok(())`; with the debug flag set it also dumps
    /// the data stack first. Faults propagate with the failing step's error.
    pub fn run(&mut self) -> Result<(), VMError> {
        loop {
            match self.step()? {
                Step::Continue => {}
                Step::Halt => break,
            }
        }
        if self.flags.debug() {
            info!("data stack at exit:\n{}", self.data_stack.dump());
        }
        Ok(())
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> Result<Step, VMError> {
        let ip = self.next;
        let object = self.objects.get(ip.object)?;
        let header = object.slice(ip.object, ip.offset, 2)?;
        let (opcode, arg) = (header[0], header[1]);

        if opcode == Opcode::Load as u8 {
            let immediates = object.slice(ip.object, ip.offset + 2, arg as u32)?;
            self.data_stack.push(immediates)?;
            self.current = ip;
            self.next.offset = ip.offset + 2 + arg as u32;
            return Ok(Step::Continue);
        }

        // Branch handlers see next-IP already at current + 2 and may
        // overwrite it.
        self.current = ip;
        self.next.offset = ip.offset + 2;
        self.dispatch(opcode, arg)
    }

    /// Dispatches a non-LOAD opcode through the handler table.
    fn dispatch(&mut self, opcode: u8, arg: u8) -> Result<Step, VMError> {
        if DISPATCH_TABLE[opcode as usize] == Handler::Undefined {
            return self.op_undefined(opcode);
        }
        let op = Opcode::try_from(opcode)?;
        match op.handler() {
            Handler::Nop => {}
            Handler::End => return Ok(Step::Halt),
            Handler::Debug => self.flags.set_debug(arg != 0),
            Handler::Stdcall => self.op_stdcall(arg)?,
            // The fetch loop consumes LOAD before dispatch.
            Handler::Load => return Err(VMError::UndefinedOpcode { opcode }),
            Handler::Stack => self.op_stack(op, arg)?,
            Handler::Arith => self.op_arith(op, arg)?,
            Handler::Logic => self.op_logic(op)?,
            Handler::Shift => self.op_shift(op, arg)?,
            Handler::Jump => self.op_jump(op, arg)?,
            Handler::Ret => self.op_ret(arg)?,
            Handler::Cmp => self.op_cmp(arg)?,
            Handler::Cond => self.op_cond(op),
            Handler::Undefined => return self.op_undefined(opcode),
        }
        Ok(Step::Continue)
    }

    /// Sentinel for the 206 unassigned opcode values: a warning and no state
    /// change, or a fault under strict mode.
    fn op_undefined(&mut self, opcode: u8) -> Result<Step, VMError> {
        if self.strict_undefined {
            return Err(VMError::UndefinedOpcode { opcode });
        }
        warn!("undefined opcode {opcode:#04x} at {}", self.current);
        Ok(Step::Continue)
    }

    fn op_stdcall(&mut self, index: u8) -> Result<(), VMError> {
        let function = self
            .stdlib
            .get(index)
            .ok_or(VMError::UnknownStdcall { index })?;
        let mut context = HostContext {
            stack: &mut self.data_stack,
        };
        function(&mut context)
    }

    fn op_stack(&mut self, op: Opcode, arg: u8) -> Result<(), VMError> {
        let width = arg as u32;
        match op {
            Opcode::Dup => {
                let bytes = self.data_stack.pop(width)?;
                self.data_stack.push(&bytes)?;
                self.data_stack.push(&bytes)
            }
            Opcode::Get => {
                let pos = self.data_stack.pop_u32()?;
                let bytes = self.data_stack.peek_at(width, pos)?;
                self.data_stack.push(&bytes)
            }
            Opcode::Drop => self.data_stack.pop(width).map(|_| ()),
            _ => Err(VMError::UndefinedOpcode { opcode: op as u8 }),
        }
    }

    fn op_arith(&mut self, op: Opcode, arg: u8) -> Result<(), VMError> {
        let Some((operation, class)) = arith_kind(op) else {
            return Err(VMError::UndefinedOpcode { opcode: op as u8 });
        };
        match class {
            NumericClass::Unsigned => self.int_arith(op.mnemonic(), operation, arg, false),
            NumericClass::Signed => self.int_arith(op.mnemonic(), operation, arg, true),
            NumericClass::Float => self.float_arith(op.mnemonic(), operation, arg),
        }
    }

    /// Integer arithmetic at any width and signedness.
    ///
    /// Operands are widened to 64 bits, combined with wrapping semantics,
    /// and truncated back to `width` on push; sign handling is confined to
    /// the widening step.
    fn int_arith(
        &mut self,
        instruction: &'static str,
        op: ArithOp,
        tag: u8,
        signed: bool,
    ) -> Result<(), VMError> {
        let width = IntWidth::decode(tag, instruction)?;
        let rhs = self.data_stack.pop_uint(width)?;
        let lhs = self.data_stack.pop_uint(width)?;

        // Operands are consumed before the zero check: the stack shrinks by
        // both widths even on fault.
        if matches!(op, ArithOp::Div | ArithOp::Mod) && rhs == 0 {
            return Err(VMError::DivisionByZero);
        }

        let result = if signed {
            let lhs = sign_extend(lhs, width);
            let rhs = sign_extend(rhs, width);
            let value = match op {
                ArithOp::Add => lhs.wrapping_add(rhs),
                ArithOp::Sub => lhs.wrapping_sub(rhs),
                ArithOp::Mul => lhs.wrapping_mul(rhs),
                ArithOp::Div => lhs.wrapping_div(rhs),
                ArithOp::Mod => lhs.wrapping_rem(rhs),
            };
            value as u64
        } else {
            match op {
                ArithOp::Add => lhs.wrapping_add(rhs),
                ArithOp::Sub => lhs.wrapping_sub(rhs),
                ArithOp::Mul => lhs.wrapping_mul(rhs),
                ArithOp::Div => lhs / rhs,
                ArithOp::Mod => lhs % rhs,
            }
        };
        self.data_stack.push_uint(width, result)
    }

    /// Float arithmetic, computed at the operand's own width. Division by
    /// zero follows IEEE 754 (infinity or NaN), not the integer fault path.
    fn float_arith(
        &mut self,
        instruction: &'static str,
        op: ArithOp,
        tag: u8,
    ) -> Result<(), VMError> {
        match FloatKind::decode(tag, instruction)? {
            FloatKind::Single => {
                let rhs = self.data_stack.pop_f32()?;
                let lhs = self.data_stack.pop_f32()?;
                let value = match op {
                    ArithOp::Add => lhs + rhs,
                    ArithOp::Sub => lhs - rhs,
                    ArithOp::Mul => lhs * rhs,
                    ArithOp::Div => lhs / rhs,
                    ArithOp::Mod => lhs % rhs,
                };
                self.data_stack.push(&value.to_le_bytes())
            }
            FloatKind::Double => {
                let rhs = self.data_stack.pop_f64()?;
                let lhs = self.data_stack.pop_f64()?;
                let value = match op {
                    ArithOp::Add => lhs + rhs,
                    ArithOp::Sub => lhs - rhs,
                    ArithOp::Mul => lhs * rhs,
                    ArithOp::Div => lhs / rhs,
                    ArithOp::Mod => lhs % rhs,
                };
                self.data_stack.push(&value.to_le_bytes())
            }
        }
    }

    fn op_logic(&mut self, op: Opcode) -> Result<(), VMError> {
        let result = match op {
            Opcode::Not => !self.data_stack.pop_u8()?,
            Opcode::NotL => (self.data_stack.pop_u8()? == 0) as u8,
            _ => {
                let a = self.data_stack.pop_u8()?;
                let b = self.data_stack.pop_u8()?;
                match op {
                    Opcode::And => a & b,
                    Opcode::AndL => (a != 0 && b != 0) as u8,
                    Opcode::Or => a | b,
                    Opcode::OrL => (a != 0 || b != 0) as u8,
                    Opcode::Xor => a ^ b,
                    Opcode::XorL => ((a != 0) ^ (b != 0)) as u8,
                    _ => return Err(VMError::UndefinedOpcode { opcode: op as u8 }),
                }
            }
        };
        self.data_stack.push(&[result])
    }

    fn op_shift(&mut self, op: Opcode, arg: u8) -> Result<(), VMError> {
        let value = self.data_stack.pop_u8()?;
        let result = match op {
            // Shift counts of 8 or more clear the byte.
            Opcode::Shl => {
                if arg >= 8 {
                    0
                } else {
                    value << arg
                }
            }
            Opcode::Shr => {
                if arg >= 8 {
                    0
                } else {
                    value >> arg
                }
            }
            // Rotations wrap over the 8 bits.
            Opcode::Rotl => value.rotate_left(arg as u32),
            Opcode::Rotr => value.rotate_right(arg as u32),
            _ => return Err(VMError::UndefinedOpcode { opcode: op as u8 }),
        };
        self.data_stack.push(&[result])
    }

    fn op_jump(&mut self, op: Opcode, arg: u8) -> Result<(), VMError> {
        match op {
            Opcode::Jmp | Opcode::Call => {
                let target = match AddressMode::decode(arg, op.mnemonic())? {
                    AddressMode::Relative => {
                        let offset = self.data_stack.pop_i32()?;
                        self.next.offset.wrapping_add_signed(offset)
                    }
                    AddressMode::Absolute => self.data_stack.pop_u32()?,
                };
                if op == Opcode::Call {
                    // The pre-jump next-IP is the return address.
                    self.call_stack.push(self.next)?;
                }
                self.next.offset = target;
            }
            Opcode::JmpL | Opcode::CallL => {
                let offset = self.data_stack.pop_u32()?;
                let object = self.data_stack.pop_u32()?;
                if !self.objects.contains(object) {
                    return Err(VMError::InvalidObjectReference {
                        object,
                        available: self.objects.len(),
                    });
                }
                if op == Opcode::CallL {
                    self.call_stack.push(self.next)?;
                }
                self.next = InstructionPointer::new(object, offset);
            }
            _ => return Err(VMError::UndefinedOpcode { opcode: op as u8 }),
        }
        Ok(())
    }

    fn op_ret(&mut self, levels: u8) -> Result<(), VMError> {
        if levels == 0 {
            return Err(VMError::InvalidOperandTag {
                instruction: Opcode::Ret.mnemonic(),
                tag: 0,
            });
        }
        if levels as u32 > self.call_stack.len() {
            return Err(VMError::ReturnStackUnderflow {
                requested: levels as u32,
                available: self.call_stack.len(),
            });
        }
        let mut target = self.call_stack.pop()?;
        for _ in 1..levels {
            target = self.call_stack.pop()?;
        }
        self.next = target;
        Ok(())
    }

    fn op_cmp(&mut self, tag: u8) -> Result<(), VMError> {
        let instruction = Opcode::Cmp.mnemonic();
        let ordering = match CmpKind::decode(tag, instruction)? {
            CmpKind::UnsignedInt => {
                let rhs = self.data_stack.pop_u8()?;
                let lhs = self.data_stack.pop_u8()?;
                Some(lhs.cmp(&rhs))
            }
            CmpKind::SignedInt => {
                let rhs = self.data_stack.pop_u8()? as i8;
                let lhs = self.data_stack.pop_u8()? as i8;
                Some(lhs.cmp(&rhs))
            }
            CmpKind::Float => {
                let rhs = self.data_stack.pop_f32()?;
                let lhs = self.data_stack.pop_f32()?;
                lhs.partial_cmp(&rhs)
            }
            CmpKind::Double => {
                let rhs = self.data_stack.pop_f64()?;
                let lhs = self.data_stack.pop_f64()?;
                lhs.partial_cmp(&rhs)
            }
        };
        self.flags.set_comparison(ordering);
        Ok(())
    }

    fn op_cond(&mut self, op: Opcode) {
        let take = match op {
            Opcode::IfEq => self.flags.eq(),
            Opcode::IfNe => !self.flags.eq(),
            Opcode::IfGt => self.flags.gt(),
            Opcode::IfGe => !self.flags.lt(),
            Opcode::IfLt => self.flags.lt(),
            Opcode::IfLe => !self.flags.gt(),
            _ => true,
        };
        if !take {
            // Always a fixed two-byte skip. A LOAD following a conditional
            // cannot be skipped over correctly; its immediates would be
            // decoded as instructions.
            self.next.offset = self.next.offset.wrapping_add(2);
        }
    }
}
