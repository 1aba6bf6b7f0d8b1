use core::fmt;

use num_traits::{PrimInt, Signed, WrappingNeg};

use crate::{AddressSize, Instruction, Operand};

/// write `value` as `+0x..` or `-0x..`.
fn signed_hex<T: PrimInt + Signed + WrappingNeg + fmt::LowerHex>(f: &mut fmt::Formatter, value: T) -> fmt::Result {
    if value.is_negative() {
        // for the minimum value this wraps back to itself, whose two's complement digits are
        // still its magnitude
        write!(f, "-0x{:x}", value.wrapping_neg())
    } else {
        write!(f, "+0x{:x}", value)
    }
}

impl Instruction {
    /// the instruction as text, as `Display` writes it.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_memory(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(segment) = self.prefixes.segment() {
            write!(f, "{}:", segment)?;
        }
        let mem = self.memory();
        f.write_str("[")?;
        let mut wrote_term = false;
        if let Some(base) = mem.base() {
            write!(f, "{}", base)?;
            wrote_term = true;
        }
        if let Some(index) = mem.index() {
            if wrote_term {
                f.write_str("+")?;
            }
            write!(f, "{}", index)?;
            if mem.scale() != 1 {
                write!(f, "*{}", mem.scale())?;
            }
            wrote_term = true;
        }
        if wrote_term {
            if mem.displacement() != 0 {
                signed_hex(f, mem.displacement())?;
            }
        } else {
            let address = match self.address_size() {
                AddressSize::Bits16 => mem.displacement() as u32 & 0xffff,
                AddressSize::Bits32 => mem.displacement() as u32,
            };
            write!(f, "{:#x}", address)?;
        }
        f.write_str("]")
    }

    fn write_operand(&self, f: &mut fmt::Formatter, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::Nothing => Ok(()),
            Operand::Register { reg } => write!(f, "{}", reg),
            Operand::Memory { .. } => self.write_memory(f),
            Operand::ImmB { imm } => write!(f, "{:#x}", imm),
            Operand::ImmW { imm } => write!(f, "{:#x}", imm),
            Operand::ImmD { imm } => write!(f, "{:#x}", imm),
            Operand::Relative { disp } => {
                f.write_str("$")?;
                signed_hex(f, *disp)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_error() {
            return f.write_str("(bad)");
        }
        let prefixes = self.prefixes();
        if prefixes.lock() {
            f.write_str("lock ")?;
        }
        if prefixes.repe() {
            f.write_str("rep ")?;
        }
        if prefixes.repne() {
            f.write_str("repne ")?;
        }
        f.write_str(self.mnemonic())?;
        let ops = self.operands();
        if let Some(op) = ops.first() {
            f.write_str(" ")?;
            self.write_operand(f, op)?;
        }
        for op in ops.iter().skip(1) {
            f.write_str(", ")?;
            self.write_operand(f, op)?;
        }
        Ok(())
    }
}
