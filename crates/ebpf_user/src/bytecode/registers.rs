//! Register identifiers.
//!
//! The virtual machine has 11 64-bit registers. R0 carries return
//! values, R1-R5 are function arguments (R1 is the context pointer at
//! entry), R6-R9 are callee-saved, and R10 is the read-only frame
//! pointer.

use std::fmt;

/// One of the 11 registers, valid by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// Return value / scratch
    R0 = 0,
    /// Argument 1 (context pointer at entry)
    R1 = 1,
    /// Argument 2
    R2 = 2,
    /// Argument 3
    R3 = 3,
    /// Argument 4
    R4 = 4,
    /// Argument 5
    R5 = 5,
    /// Callee-saved
    R6 = 6,
    /// Callee-saved
    R7 = 7,
    /// Callee-saved
    R8 = 8,
    /// Callee-saved
    R9 = 9,
    /// Frame pointer (read-only)
    R10 = 10,
}

impl Register {
    /// Total number of registers.
    pub const COUNT: usize = 11;

    /// Try to create a register from a raw field value.
    ///
    /// Returns `None` for values >= 11.
    #[inline]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::R0),
            1 => Some(Self::R1),
            2 => Some(Self::R2),
            3 => Some(Self::R3),
            4 => Some(Self::R4),
            5 => Some(Self::R5),
            6 => Some(Self::R6),
            7 => Some(Self::R7),
            8 => Some(Self::R8),
            9 => Some(Self::R9),
            10 => Some(Self::R10),
            _ => None,
        }
    }

    /// Raw register number as encoded in the instruction nibble.
    #[inline]
    pub const fn as_raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", *self as u8)
    }
}

impl TryFrom<u8> for Register {
    type Error = InvalidRegister;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_raw(value).ok_or(InvalidRegister(value))
    }
}

/// Error returned when a raw value does not name a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRegister(pub u8);

impl fmt::Display for InvalidRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid register: {}", self.0)
    }
}

impl std::error::Error for InvalidRegister {}
