//! ModRM and SIB decoding.

use yaxpeax_arch::{Reader, StandardDecodeError};

use crate::reg::{RegSpec, RegWidth};
use crate::{ByteWindow, DecodeHandler};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AddressSize {
    Bits16,
    Bits32,
}

impl AddressSize {
    pub fn bytes(&self) -> u8 {
        match self {
            AddressSize::Bits16 => 2,
            AddressSize::Bits32 => 4,
        }
    }
}

/// a raw ModRM byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ModRM(pub u8);

impl ModRM {
    #[inline]
    pub fn mode(&self) -> u8 {
        self.0 >> 6
    }

    #[inline]
    pub fn reg(&self) -> u8 {
        (self.0 >> 3) & 0b111
    }

    #[inline]
    pub fn rm(&self) -> u8 {
        self.0 & 0b111
    }

    #[inline]
    pub fn is_register(&self) -> bool {
        self.mode() == 0b11
    }
}

/// a raw SIB byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Sib(pub u8);

impl Sib {
    #[inline]
    pub fn scale(&self) -> u8 {
        self.0 >> 6
    }

    #[inline]
    pub fn index(&self) -> u8 {
        (self.0 >> 3) & 0b111
    }

    #[inline]
    pub fn base(&self) -> u8 {
        self.0 & 0b111
    }

    /// `1 << scale`: 1, 2, 4 or 8.
    #[inline]
    pub fn scale_factor(&self) -> u8 {
        1 << self.scale()
    }
}

/// the effective address of an instruction's memory operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemoryAddress {
    base: Option<RegSpec>,
    index: Option<RegSpec>,
    scale: u8,
    disp: i32,
    disp_size: u8,
}

impl MemoryAddress {
    /// an address made only of an absolute displacement.
    pub(crate) fn absolute(disp: i32, disp_size: u8) -> MemoryAddress {
        MemoryAddress { base: None, index: None, scale: 1, disp, disp_size }
    }

    pub fn base(&self) -> Option<RegSpec> {
        self.base
    }

    pub fn index(&self) -> Option<RegSpec> {
        self.index
    }

    /// scale applied to `index`; 1 when there is no index.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// displacement, sign-extended from `disp_size()` bytes.
    pub fn displacement(&self) -> i32 {
        self.disp
    }

    /// number of displacement bytes in the encoding: 0, 1, 2 or 4.
    pub fn disp_size(&self) -> u8 {
        self.disp_size
    }
}

/// what a ModRM byte (and any SIB/displacement after it) resolved to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// `mod == 11`: the `rm` field is a register number.
    Direct { rm: u8 },
    Memory { address: MemoryAddress, sib: Option<Sib> },
}

// bx+si, bx+di, bp+si, bp+di, si, di, bp, bx
const ADDR16: [(RegSpec, Option<RegSpec>); 8] = [
    (RegSpec::BX, Some(RegSpec::SI)),
    (RegSpec::BX, Some(RegSpec::DI)),
    (RegSpec::BP, Some(RegSpec::SI)),
    (RegSpec::BP, Some(RegSpec::DI)),
    (RegSpec::SI, None),
    (RegSpec::DI, None),
    (RegSpec::BP, None),
    (RegSpec::BX, None),
];

/// resolve `modrm`, reading the SIB byte and displacement it calls for and nothing else.
pub(crate) fn resolve<T: Reader<u32, u8>, H: DecodeHandler<T>>(
    handler: &mut H,
    window: &mut ByteWindow<'_, T>,
    modrm: ModRM,
    size: AddressSize,
) -> Result<Addressing, StandardDecodeError> {
    if modrm.is_register() {
        return Ok(Addressing::Direct { rm: modrm.rm() });
    }

    match size {
        AddressSize::Bits16 => {
            if modrm.mode() == 0b00 && modrm.rm() == 0b110 {
                let disp = handler.read_u16(window)? as i16 as i32;
                return Ok(Addressing::Memory { address: MemoryAddress::absolute(disp, 2), sib: None });
            }
            let (base, index) = ADDR16[modrm.rm() as usize];
            let (disp, disp_size) = read_disp(handler, window, modrm.mode(), size)?;
            let address = MemoryAddress { base: Some(base), index, scale: 1, disp, disp_size };
            Ok(Addressing::Memory { address, sib: None })
        }
        AddressSize::Bits32 => {
            if modrm.rm() == 0b100 {
                let sib = Sib(handler.read_u8(window)?);
                let index = if sib.index() == 0b100 {
                    // esp cannot be an index; this encoding means "no index"
                    None
                } else {
                    Some(RegSpec::gpr(sib.index(), RegWidth::Dword))
                };
                let scale = if index.is_some() { sib.scale_factor() } else { 1 };
                if sib.base() == 0b101 && modrm.mode() == 0b00 {
                    let disp = handler.read_u32(window)? as i32;
                    let address = MemoryAddress { base: None, index, scale, disp, disp_size: 4 };
                    return Ok(Addressing::Memory { address, sib: Some(sib) });
                }
                let base = RegSpec::gpr(sib.base(), RegWidth::Dword);
                let (disp, disp_size) = read_disp(handler, window, modrm.mode(), size)?;
                let address = MemoryAddress { base: Some(base), index, scale, disp, disp_size };
                return Ok(Addressing::Memory { address, sib: Some(sib) });
            }

            if modrm.rm() == 0b101 && modrm.mode() == 0b00 {
                let disp = handler.read_u32(window)? as i32;
                return Ok(Addressing::Memory { address: MemoryAddress::absolute(disp, 4), sib: None });
            }

            let base = RegSpec::gpr(modrm.rm(), RegWidth::Dword);
            let (disp, disp_size) = read_disp(handler, window, modrm.mode(), size)?;
            let address = MemoryAddress { base: Some(base), index: None, scale: 1, disp, disp_size };
            Ok(Addressing::Memory { address, sib: None })
        }
    }
}

fn read_disp<T: Reader<u32, u8>, H: DecodeHandler<T>>(
    handler: &mut H,
    window: &mut ByteWindow<'_, T>,
    mode: u8,
    size: AddressSize,
) -> Result<(i32, u8), StandardDecodeError> {
    match mode {
        0b00 => Ok((0, 0)),
        0b01 => Ok((handler.read_u8(window)? as i8 as i32, 1)),
        _ => {
            debug_assert!(mode == 0b10, "register-direct is handled before displacement");
            match size {
                AddressSize::Bits16 => Ok((handler.read_u16(window)? as i16 as i32, 2)),
                AddressSize::Bits32 => Ok((handler.read_u32(window)? as i32, 4)),
            }
        }
    }
}
