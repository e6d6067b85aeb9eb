//! Fetch-decode-execute core.
use std::fmt::{self, Write};

use crate::{
    constants::{Word, REGISTER_COUNT},
    isa::{self, op, Register, FLAG_OVERFLOW, FLAG_SIGN, FLAG_ZERO, SVC_EXIT},
    memory::Memory,
};

/// Reason the processor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Exit system call. Carries the exit status taken from GR1.
    Exit(Word),
    /// RET executed with the stack in its initial empty state.
    EmptyStack,
    /// Unknown instruction or system call. Carries a diagnostic line.
    Fault(String),
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exit(status) => write!(f, "exit status #{:04X} = {}", status, status),
            Self::EmptyStack => write!(f, "return with empty stack"),
            Self::Fault(message) => write!(f, "{}", message),
        }
    }
}

/// Register file plus one memory, executing one instruction per `step`.
///
/// All registers start at zero: execution begins at address 0 and the
/// stack pointer sits at its empty sentinel, wrapping to the top of
/// memory on the first push.
pub struct Processor {
    memory: Memory,
    registers: [Word; REGISTER_COUNT],
    halt: Option<Halt>,
}

impl Processor {
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            registers: [0; REGISTER_COUNT],
            halt: None,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn register(&self, reg: Register) -> Word {
        self.registers[reg.as_word() as usize]
    }

    pub fn set_register(&mut self, reg: Register, value: Word) {
        self.registers[reg.as_word() as usize] = value;
    }

    /// Why the processor halted, if it has.
    pub fn halt(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }

    /// Execute one fetch-decode-execute cycle.
    ///
    /// Returns `true` while the machine can continue, `false` once it
    /// has halted. Calling `step` on a halted processor stays halted.
    pub fn step(&mut self) -> bool {
        if self.halt.is_some() {
            return false;
        }

        let instruction = self.fetch();
        let operation = isa::op_code(instruction);
        let (r1, r2) = isa::op_registers(instruction);

        self.trace(instruction);

        match operation {
            op::NOP => {}

            // ----------------------------------------------------------------
            // Load, store, load-address
            op::LD_ADR => {
                let address = self.effective_address(r2);
                let value = self.memory.read(address as usize);
                self.set_general(r1, value);
                self.set_flags(value, false);
            }
            op::LD_R => {
                let value = self.general(r2);
                self.set_general(r1, value);
                self.set_flags(value, false);
            }
            op::ST => {
                let address = self.effective_address(r2);
                self.memory.write(address as usize, self.general(r1));
            }
            op::LAD => {
                // Address computation alone does not touch the flags.
                let address = self.effective_address(r2);
                self.set_general(r1, address);
            }

            // ----------------------------------------------------------------
            // Add and subtract; the arithmetic forms detect signed
            // overflow, the logical forms never set the overflow flag.
            op::ADDA_ADR | op::ADDL_ADR | op::SUBA_ADR | op::SUBL_ADR => {
                let address = self.effective_address(r2);
                let operand = self.memory.read(address as usize);
                self.execute_addsub(operation, r1, operand);
            }
            op::ADDA_R | op::ADDL_R | op::SUBA_R | op::SUBL_R => {
                let operand = self.general(r2);
                // The register form shares the semantics of its
                // address form, opcode bit 10 aside.
                self.execute_addsub(operation & !0x0400, r1, operand);
            }

            // ----------------------------------------------------------------
            // Bitwise
            op::AND_ADR | op::OR_ADR | op::XOR_ADR => {
                let address = self.effective_address(r2);
                let operand = self.memory.read(address as usize);
                self.execute_bitwise(operation, r1, operand);
            }
            op::AND_R | op::OR_R | op::XOR_R => {
                let operand = self.general(r2);
                self.execute_bitwise(operation & !0x0400, r1, operand);
            }

            // ----------------------------------------------------------------
            // Compare: flags of the matching subtraction, no write-back.
            op::CPA_ADR | op::CPL_ADR => {
                let address = self.effective_address(r2);
                let operand = self.memory.read(address as usize);
                self.execute_compare(operation, r1, operand);
            }
            op::CPA_R | op::CPL_R => {
                let operand = self.general(r2);
                self.execute_compare(operation & !0x0400, r1, operand);
            }

            // ----------------------------------------------------------------
            // Shifts. The shift count is the effective address.
            op::SLA | op::SRA | op::SLL | op::SRL => {
                let count = self.effective_address(r2);
                self.execute_shift(operation, r1, count);
            }

            // ----------------------------------------------------------------
            // Jumps
            op::JMI => self.jump_if(r2, self.flag(FLAG_SIGN)),
            op::JNZ => self.jump_if(r2, !self.flag(FLAG_ZERO)),
            op::JZE => self.jump_if(r2, self.flag(FLAG_ZERO)),
            op::JUMP => self.jump_if(r2, true),
            op::JPL => self.jump_if(r2, !self.flag(FLAG_ZERO) && !self.flag(FLAG_SIGN)),
            op::JOV => self.jump_if(r2, self.flag(FLAG_OVERFLOW)),

            // ----------------------------------------------------------------
            // Stack. PUSH stores the effective address itself as a value.
            op::PUSH => {
                let value = self.effective_address(r2);
                self.push(value);
            }
            op::POP => {
                let value = self.memory.read(self.stack_pointer() as usize);
                self.set_stack_pointer(self.stack_pointer().wrapping_add(1));
                self.set_general(r1, value);
            }

            // ----------------------------------------------------------------
            // Subroutines
            op::CALL => {
                let target = self.effective_address(r2);
                let return_address = self.program_counter();
                self.push(return_address);
                self.set_program_counter(target);
            }
            op::RET => {
                // The stack pointer resting at its initial value means
                // there is no frame to return to; halt instead of
                // underflowing.
                if self.stack_pointer() == 0 {
                    self.halt = Some(Halt::EmptyStack);
                    return false;
                }
                let return_address = self.memory.read(self.stack_pointer() as usize);
                self.set_stack_pointer(self.stack_pointer().wrapping_add(1));
                self.set_program_counter(return_address);
            }

            // ----------------------------------------------------------------
            // Supervisor call
            op::SVC => {
                let code = self.effective_address(r2);
                if code == SVC_EXIT {
                    let status = self.register(Register::Gr1);
                    self.halt = Some(Halt::Exit(status));
                } else {
                    self.halt = Some(Halt::Fault(format!(
                        "invalid system call #{:04X}.",
                        code
                    )));
                }
                return false;
            }

            // ----------------------------------------------------------------
            // Unimplemented instruction words are a fatal halt,
            // never a silent no-op.
            _ => {
                self.halt = Some(Halt::Fault(format!(
                    "unknown instruction word #{:04X}.",
                    instruction
                )));
                return false;
            }
        }

        true
    }

    /// Step until halted or the step budget runs out.
    ///
    /// Returns the halt reason, or `None` when the budget was exhausted
    /// with the machine still running.
    pub fn run(&mut self, step_limit: usize) -> Option<&Halt> {
        for _ in 0..step_limit {
            if !self.step() {
                break;
            }
        }
        self.halt()
    }

    /// One line per register: `{name} = #{hex4} = {decimal}`.
    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        for reg in Register::ALL {
            let value = self.register(reg);
            writeln!(buf, "{:>3} = #{:04X} = {}", reg.name(), value, value)?;
        }
        Ok(buf)
    }
}

/// Decode and execute helpers.
impl Processor {
    #[inline]
    fn general(&self, index: Word) -> Word {
        self.registers[(index & 0x07) as usize]
    }

    #[inline]
    fn set_general(&mut self, index: Word, value: Word) {
        self.registers[(index & 0x07) as usize] = value;
    }

    #[inline]
    fn program_counter(&self) -> Word {
        self.registers[Register::Pc.as_word() as usize]
    }

    #[inline]
    fn set_program_counter(&mut self, value: Word) {
        self.registers[Register::Pc.as_word() as usize] = value;
    }

    #[inline]
    fn stack_pointer(&self) -> Word {
        self.registers[Register::Sp.as_word() as usize]
    }

    #[inline]
    fn set_stack_pointer(&mut self, value: Word) {
        self.registers[Register::Sp.as_word() as usize] = value;
    }

    /// Read the word at the program counter and advance it.
    #[inline]
    fn fetch(&mut self) -> Word {
        let value = self.memory.read(self.program_counter() as usize);
        self.set_program_counter(self.program_counter().wrapping_add(1));
        value
    }

    /// Fetch the operand word and add the index register.
    #[inline]
    fn effective_address(&mut self, index_register: Word) -> Word {
        let address = self.fetch();
        address.wrapping_add(self.general(index_register))
    }

    #[inline]
    fn flag(&self, mask: Word) -> bool {
        self.registers[Register::Fr.as_word() as usize] & mask != 0
    }

    /// Set the zero and sign flags from a result; the caller decides
    /// the overflow bit.
    fn set_flags(&mut self, result: Word, overflow: bool) {
        let mut flags = 0;
        if result == 0 {
            flags |= FLAG_ZERO;
        }
        if result & 0x8000 != 0 {
            flags |= FLAG_SIGN;
        }
        if overflow {
            flags |= FLAG_OVERFLOW;
        }
        self.registers[Register::Fr.as_word() as usize] = flags;
    }

    fn jump_if(&mut self, index_register: Word, condition: bool) {
        let target = self.effective_address(index_register);
        if condition {
            self.set_program_counter(target);
        }
    }

    fn push(&mut self, value: Word) {
        let sp = self.stack_pointer().wrapping_sub(1);
        self.set_stack_pointer(sp);
        self.memory.write(sp as usize, value);
    }

    /// ADDA/SUBA/ADDL/SUBL with the operand already resolved.
    /// `operation` is normalized to the `_ADR` opcode.
    fn execute_addsub(&mut self, operation: Word, r1: Word, operand: Word) {
        let a = self.general(r1);
        let b = operand;

        let (result, overflow) = match operation {
            op::ADDA_ADR => (a.wrapping_add(b), add_overflows(a, b)),
            op::SUBA_ADR => (a.wrapping_sub(b), sub_overflows(a, b)),
            op::ADDL_ADR => (a.wrapping_add(b), false),
            op::SUBL_ADR => (a.wrapping_sub(b), false),
            _ => unreachable!("not an add/subtract opcode"),
        };

        self.set_general(r1, result);
        self.set_flags(result, overflow);
    }

    /// AND/OR/XOR with the operand already resolved.
    fn execute_bitwise(&mut self, operation: Word, r1: Word, operand: Word) {
        let a = self.general(r1);

        let result = match operation {
            op::AND_ADR => a & operand,
            op::OR_ADR => a | operand,
            op::XOR_ADR => a ^ operand,
            _ => unreachable!("not a bitwise opcode"),
        };

        self.set_general(r1, result);
        self.set_flags(result, false);
    }

    /// CPA/CPL: flags of the matching subtraction, register untouched.
    fn execute_compare(&mut self, operation: Word, r1: Word, operand: Word) {
        let a = self.general(r1);
        let result = a.wrapping_sub(operand);

        let overflow = match operation {
            op::CPA_ADR => sub_overflows(a, operand),
            op::CPL_ADR => false,
            _ => unreachable!("not a compare opcode"),
        };

        self.set_flags(result, overflow);
    }

    /// Shifts write back and report the last bit shifted out as overflow.
    /// The arithmetic forms keep the sign bit in place.
    fn execute_shift(&mut self, operation: Word, r1: Word, count: Word) {
        let a = self.general(r1);
        let n = count as u32;

        let (result, last_out) = match operation {
            op::SLA => {
                let sign = a & 0x8000;
                let shifted = if n < 16 { (a << n) & 0x7FFF } else { 0 };
                let out = match n {
                    0 => false,
                    1..=15 => (a >> (15 - n)) & 1 != 0,
                    _ => false,
                };
                (sign | shifted, out)
            }
            op::SRA => {
                let shifted = ((a as i16) >> n.min(15)) as Word;
                let out = match n {
                    0 => false,
                    _ => ((a as i16) >> (n - 1).min(15)) & 1 != 0,
                };
                (shifted, out)
            }
            op::SLL => {
                let shifted = if n < 16 { a << n } else { 0 };
                let out = match n {
                    0 => false,
                    1..=16 => (a >> (16 - n)) & 1 != 0,
                    _ => false,
                };
                (shifted, out)
            }
            op::SRL => {
                let shifted = if n < 16 { a >> n } else { 0 };
                let out = match n {
                    0 => false,
                    1..=16 => (a >> (n - 1)) & 1 != 0,
                    _ => false,
                };
                (shifted, out)
            }
            _ => unreachable!("not a shift opcode"),
        };

        self.set_general(r1, result);
        self.set_flags(result, last_out);
    }

    #[cfg(feature = "op_trace")]
    fn trace(&self, instruction: Word) {
        // The program counter already points past the instruction word.
        let pc = self.program_counter().wrapping_sub(1);
        println!("{:04X}: {:4}", pc, isa::mnemonic(instruction));
    }

    #[cfg(not(feature = "op_trace"))]
    #[inline]
    fn trace(&self, _instruction: Word) {}
}

/// Signed overflow of `a + b` in two's complement.
#[inline]
fn add_overflows(a: Word, b: Word) -> bool {
    let result = a.wrapping_add(b);
    (!(a ^ b) & (a ^ result)) & 0x8000 != 0
}

/// Signed overflow of `a - b` in two's complement.
#[inline]
fn sub_overflows(a: Word, b: Word) -> bool {
    let result = a.wrapping_sub(b);
    ((a ^ b) & (a ^ result)) & 0x8000 != 0
}
