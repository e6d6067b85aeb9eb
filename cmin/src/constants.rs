//! Constant values of the target architecture.

/// Native machine word. Memory cells, registers, instructions and
/// addresses are all 16 bits wide.
pub type Word = u16;

/// Number of addressable words.
pub const MEM_SIZE: usize = 0x10000; // 65536

/// Total registers: GR0-GR7, SP, PC and FR.
pub const REGISTER_COUNT: usize = 11;

/// Placeholder written into operand words that still await backpatching.
pub const UNRESOLVED: Word = 0xFFFF;
