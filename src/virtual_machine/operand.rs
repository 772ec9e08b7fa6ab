//! Operand selectors decoded from the instruction argument byte.
//!
//! The second byte of an instruction is not itself data; it selects how the
//! handler interprets the operands it pops. Integer arithmetic reads it as a
//! byte width, float arithmetic as a float kind, CMP as a comparison kind,
//! and JMP/CALL as an addressing mode. Each selector decodes with the
//! instruction mnemonic in hand so a bad tag faults with usable context.

use crate::virtual_machine::errors::VMError;

/// Integer operand width in bytes.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IntWidth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl IntWidth {
    /// Decodes a width selector, faulting on anything but 1, 2, or 4.
    pub fn decode(tag: u8, instruction: &'static str) -> Result<Self, VMError> {
        match tag {
            1 => Ok(IntWidth::One),
            2 => Ok(IntWidth::Two),
            4 => Ok(IntWidth::Four),
            _ => Err(VMError::InvalidOperandTag { instruction, tag }),
        }
    }

    /// Width in bytes.
    pub const fn bytes(self) -> u32 {
        self as u32
    }

    /// Bit position just past the operand's most significant bit.
    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

/// Floating-point operand kind. The tag is the operand width in bytes.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FloatKind {
    /// IEEE 754 binary32.
    Single = 4,
    /// IEEE 754 binary64.
    Double = 8,
}

impl FloatKind {
    /// Decodes a float-kind selector, faulting on anything but 4 or 8.
    pub fn decode(tag: u8, instruction: &'static str) -> Result<Self, VMError> {
        match tag {
            4 => Ok(FloatKind::Single),
            8 => Ok(FloatKind::Double),
            _ => Err(VMError::InvalidOperandTag { instruction, tag }),
        }
    }
}

/// Comparison kind selected by the CMP argument.
///
/// Operand widths are fixed per kind: one byte for the integer kinds, the
/// IEEE width for the float kinds.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CmpKind {
    UnsignedInt = 0,
    SignedInt = 1,
    Float = 2,
    Double = 3,
}

impl CmpKind {
    /// Decodes a comparison-kind selector.
    pub fn decode(tag: u8, instruction: &'static str) -> Result<Self, VMError> {
        match tag {
            0 => Ok(CmpKind::UnsignedInt),
            1 => Ok(CmpKind::SignedInt),
            2 => Ok(CmpKind::Float),
            3 => Ok(CmpKind::Double),
            _ => Err(VMError::InvalidOperandTag { instruction, tag }),
        }
    }
}

/// Addressing mode for JMP and CALL within the current object.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddressMode {
    /// Pop a signed 32-bit offset and add it to the next instruction pointer.
    Relative = 0,
    /// Pop an unsigned 32-bit address and jump to it.
    Absolute = 1,
}

impl AddressMode {
    /// Decodes an addressing-mode selector.
    pub fn decode(tag: u8, instruction: &'static str) -> Result<Self, VMError> {
        match tag {
            0 => Ok(AddressMode::Relative),
            1 => Ok(AddressMode::Absolute),
            _ => Err(VMError::InvalidOperandTag { instruction, tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_width_decode_valid() {
        assert_eq!(IntWidth::decode(1, "add").unwrap(), IntWidth::One);
        assert_eq!(IntWidth::decode(2, "add").unwrap(), IntWidth::Two);
        assert_eq!(IntWidth::decode(4, "add").unwrap(), IntWidth::Four);
    }

    #[test]
    fn int_width_decode_invalid() {
        for tag in [0u8, 3, 5, 8, 255] {
            let err = IntWidth::decode(tag, "add").unwrap_err();
            assert!(matches!(
                err,
                VMError::InvalidOperandTag {
                    instruction: "add",
                    tag: t
                } if t == tag
            ));
        }
    }

    #[test]
    fn int_width_bits() {
        assert_eq!(IntWidth::One.bits(), 8);
        assert_eq!(IntWidth::Two.bits(), 16);
        assert_eq!(IntWidth::Four.bits(), 32);
    }

    #[test]
    fn float_kind_decode() {
        assert_eq!(FloatKind::decode(4, "addf").unwrap(), FloatKind::Single);
        assert_eq!(FloatKind::decode(8, "addf").unwrap(), FloatKind::Double);
        assert!(FloatKind::decode(2, "addf").is_err());
        assert!(FloatKind::decode(0, "addf").is_err());
    }

    #[test]
    fn cmp_kind_decode() {
        assert_eq!(CmpKind::decode(0, "cmp").unwrap(), CmpKind::UnsignedInt);
        assert_eq!(CmpKind::decode(1, "cmp").unwrap(), CmpKind::SignedInt);
        assert_eq!(CmpKind::decode(2, "cmp").unwrap(), CmpKind::Float);
        assert_eq!(CmpKind::decode(3, "cmp").unwrap(), CmpKind::Double);
        assert!(CmpKind::decode(4, "cmp").is_err());
    }

    #[test]
    fn address_mode_decode() {
        assert_eq!(AddressMode::decode(0, "jmp").unwrap(), AddressMode::Relative);
        assert_eq!(AddressMode::decode(1, "jmp").unwrap(), AddressMode::Absolute);
        assert!(AddressMode::decode(2, "jmp").is_err());
    }
}
