use core::fmt;

/// width class of a register, expressed as the left-shift applied to its base identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegWidth {
    Byte = 0,
    Word = 4,
    Dword = 8,
    Segment = 12,
}

impl RegWidth {
    #[inline]
    pub fn shift(&self) -> u32 {
        *self as u32
    }

    /// size in bytes of a register of this width. segment registers are 16 bits wide.
    pub fn bytes(&self) -> u8 {
        match self {
            RegWidth::Byte => 1,
            RegWidth::Word => 2,
            RegWidth::Dword => 4,
            RegWidth::Segment => 2,
        }
    }

    /// the general-purpose width for an operand of `bytes` bytes.
    pub(crate) fn for_gpr_bytes(bytes: u8) -> RegWidth {
        match bytes {
            1 => RegWidth::Byte,
            2 => RegWidth::Word,
            _ => RegWidth::Dword,
        }
    }
}

/// a register, packed as `base << width.shift()`.
///
/// `base` is `1..=8` for general-purpose registers, in ModRM order (`al, cl, dl, bl, ah, ch, dh,
/// bh` at byte width, `eax, ecx, edx, ebx, esp, ebp, esi, edi` at dword width) and `1..=6` for
/// segment registers (`es, cs, ss, ds, fs, gs`). the same base at a different width is the
/// same slot:
/// ```
/// use yaxpeax_ia32::{RegSpec, RegWidth};
///
/// assert_eq!(RegSpec::CL.with_width(RegWidth::Dword), Some(RegSpec::ECX));
/// assert_eq!(RegSpec::ECX.base_of(), 2);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RegSpec {
    code: u32,
}

impl RegSpec {
    /// the packed code reserved for "no register".
    pub const NONE_CODE: u32 = 0xffff_ffff;

    pub const AL: RegSpec = RegSpec { code: 1 };
    pub const CL: RegSpec = RegSpec { code: 2 };
    pub const DL: RegSpec = RegSpec { code: 3 };
    pub const BL: RegSpec = RegSpec { code: 4 };
    pub const AH: RegSpec = RegSpec { code: 5 };
    pub const CH: RegSpec = RegSpec { code: 6 };
    pub const DH: RegSpec = RegSpec { code: 7 };
    pub const BH: RegSpec = RegSpec { code: 8 };

    pub const AX: RegSpec = RegSpec { code: 1 << 4 };
    pub const CX: RegSpec = RegSpec { code: 2 << 4 };
    pub const DX: RegSpec = RegSpec { code: 3 << 4 };
    pub const BX: RegSpec = RegSpec { code: 4 << 4 };
    pub const SP: RegSpec = RegSpec { code: 5 << 4 };
    pub const BP: RegSpec = RegSpec { code: 6 << 4 };
    pub const SI: RegSpec = RegSpec { code: 7 << 4 };
    pub const DI: RegSpec = RegSpec { code: 8 << 4 };

    pub const EAX: RegSpec = RegSpec { code: 1 << 8 };
    pub const ECX: RegSpec = RegSpec { code: 2 << 8 };
    pub const EDX: RegSpec = RegSpec { code: 3 << 8 };
    pub const EBX: RegSpec = RegSpec { code: 4 << 8 };
    pub const ESP: RegSpec = RegSpec { code: 5 << 8 };
    pub const EBP: RegSpec = RegSpec { code: 6 << 8 };
    pub const ESI: RegSpec = RegSpec { code: 7 << 8 };
    pub const EDI: RegSpec = RegSpec { code: 8 << 8 };

    pub const ES: RegSpec = RegSpec { code: 1 << 12 };
    pub const CS: RegSpec = RegSpec { code: 2 << 12 };
    pub const SS: RegSpec = RegSpec { code: 3 << 12 };
    pub const DS: RegSpec = RegSpec { code: 4 << 12 };
    pub const FS: RegSpec = RegSpec { code: 5 << 12 };
    pub const GS: RegSpec = RegSpec { code: 6 << 12 };

    /// pack `base` at `width`. `None` if `base` is not a register slot of that width.
    pub fn widen(base: u8, width: RegWidth) -> Option<RegSpec> {
        let limit = if width == RegWidth::Segment { 6 } else { 8 };
        if base == 0 || base > limit {
            return None;
        }
        Some(RegSpec { code: (base as u32) << width.shift() })
    }

    /// the register named by a three-bit ModRM/SIB/opcode register number.
    pub fn gpr(num: u8, width: RegWidth) -> RegSpec {
        debug_assert!(width != RegWidth::Segment);
        RegSpec { code: (((num & 0b111) + 1) as u32) << width.shift() }
    }

    /// validate a packed code. the "no register" sentinel, and anything that is not exactly one
    /// base at one width, is `None`.
    pub fn from_code(code: u32) -> Option<RegSpec> {
        if code == Self::NONE_CODE {
            return None;
        }
        let width = match code {
            0x0001..=0x000f => RegWidth::Byte,
            0x0010..=0x00ff if code & 0xf == 0 => RegWidth::Word,
            0x0100..=0x0fff if code & 0xff == 0 => RegWidth::Dword,
            0x1000..=0xffff if code & 0xfff == 0 => RegWidth::Segment,
            _ => return None,
        };
        RegSpec::widen((code >> width.shift()) as u8, width)
    }

    #[inline]
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn width(&self) -> RegWidth {
        if self.code & 0xf != 0 {
            RegWidth::Byte
        } else if self.code & 0xf0 != 0 {
            RegWidth::Word
        } else if self.code & 0xf00 != 0 {
            RegWidth::Dword
        } else {
            RegWidth::Segment
        }
    }

    /// base identity, stable across widths.
    pub fn base_of(&self) -> u8 {
        ((self.code >> self.width().shift()) & 0xf) as u8
    }

    /// the same base slot at another width.
    ///
    /// this is a re-pack of the base identity, so `ah.with_width(Dword)` is `esp`, and bases 7
    /// and 8 have no segment register.
    pub fn with_width(&self, width: RegWidth) -> Option<RegSpec> {
        RegSpec::widen(self.base_of(), width)
    }

    /// the three-bit number this register is encoded as.
    pub fn num(&self) -> u8 {
        self.base_of() - 1
    }

    pub fn name(&self) -> &'static str {
        const NAMES: [[&str; 8]; 4] = [
            ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"],
            ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"],
            ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"],
            ["es", "cs", "ss", "ds", "fs", "gs", "BUG", "BUG"],
        ];
        let row = (self.width().shift() / 4) as usize;
        NAMES[row][self.num() as usize & 0b111]
    }
}

impl fmt::Display for RegSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

impl Segment {
    /// segment override prefix byte to segment.
    pub fn from_prefix(byte: u8) -> Option<Segment> {
        match byte {
            0x26 => Some(Segment::ES),
            0x2e => Some(Segment::CS),
            0x36 => Some(Segment::SS),
            0x3e => Some(Segment::DS),
            0x64 => Some(Segment::FS),
            0x65 => Some(Segment::GS),
            _ => None,
        }
    }

    /// segment register number as encoded in a ModRM `reg` field.
    pub fn from_num(num: u8) -> Option<Segment> {
        match num {
            0 => Some(Segment::ES),
            1 => Some(Segment::CS),
            2 => Some(Segment::SS),
            3 => Some(Segment::DS),
            4 => Some(Segment::FS),
            5 => Some(Segment::GS),
            _ => None,
        }
    }

    pub fn reg(&self) -> RegSpec {
        match self {
            Segment::ES => RegSpec::ES,
            Segment::CS => RegSpec::CS,
            Segment::SS => RegSpec::SS,
            Segment::DS => RegSpec::DS,
            Segment::FS => RegSpec::FS,
            Segment::GS => RegSpec::GS,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.reg(), f)
    }
}
