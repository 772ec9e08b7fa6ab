//! The 8-bit flags register.

use std::cmp::Ordering;

/// Comparison result: less-than.
const COMP_LT: u8 = 1 << 0;
/// Comparison result: greater-than.
const COMP_GT: u8 = 1 << 1;
/// Debug mode; toggled by the DEBUG instruction.
const DEBUG: u8 = 1 << 7;

/// Flags register holding the last comparison result and the debug bit.
///
/// Only CMP writes the comparison bits; the conditional-skip instructions
/// read them. Both comparison bits clear means the last comparison was equal.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Flags(u8);

impl Flags {
    /// Creates a cleared register.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Records a comparison result, clearing the previous one first.
    pub fn set_comparison(&mut self, ordering: Option<Ordering>) {
        self.0 &= !(COMP_LT | COMP_GT);
        match ordering {
            Some(Ordering::Less) => self.0 |= COMP_LT,
            Some(Ordering::Greater) => self.0 |= COMP_GT,
            // Equal, or an unordered float comparison: both bits stay clear.
            Some(Ordering::Equal) | None => {}
        }
    }

    /// Last comparison was less-than.
    pub const fn lt(self) -> bool {
        self.0 & COMP_LT != 0
    }

    /// Last comparison was greater-than.
    pub const fn gt(self) -> bool {
        self.0 & COMP_GT != 0
    }

    /// Last comparison was equal (neither LT nor GT).
    pub const fn eq(self) -> bool {
        !self.lt() && !self.gt()
    }

    /// Sets or clears the debug bit.
    pub fn set_debug(&mut self, enabled: bool) {
        if enabled {
            self.0 |= DEBUG;
        } else {
            self.0 &= !DEBUG;
        }
    }

    /// Debug mode is enabled.
    pub const fn debug(self) -> bool {
        self.0 & DEBUG != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_register_reads_equal() {
        let flags = Flags::new();
        assert!(flags.eq());
        assert!(!flags.lt());
        assert!(!flags.gt());
    }

    #[test]
    fn comparison_sets_exactly_one_bit() {
        let mut flags = Flags::new();

        flags.set_comparison(Some(Ordering::Less));
        assert!(flags.lt() && !flags.gt() && !flags.eq());

        flags.set_comparison(Some(Ordering::Greater));
        assert!(flags.gt() && !flags.lt() && !flags.eq());

        flags.set_comparison(Some(Ordering::Equal));
        assert!(flags.eq() && !flags.lt() && !flags.gt());
    }

    #[test]
    fn unordered_comparison_reads_equal() {
        let mut flags = Flags::new();
        flags.set_comparison(Some(Ordering::Less));
        flags.set_comparison(None);
        assert!(flags.eq());
    }

    #[test]
    fn debug_bit_is_independent_of_comparisons() {
        let mut flags = Flags::new();
        flags.set_debug(true);
        flags.set_comparison(Some(Ordering::Less));
        assert!(flags.debug());
        assert!(flags.lt());

        flags.set_comparison(Some(Ordering::Equal));
        assert!(flags.debug());

        flags.set_debug(false);
        assert!(!flags.debug());
        assert!(flags.eq());
    }
}
