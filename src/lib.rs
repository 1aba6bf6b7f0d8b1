//! a table-driven decoder for 16- and 32-bit x86.
//!
//! instructions are matched against a [`Catalog`] of opcode templates, longest opcode first, and
//! their operands are materialized from the ModRM, SIB, displacement and immediate bytes that
//! follow. [`InstDecoder::decode_at`] never fails: undecodable bytes produce an instruction
//! flagged [`DecodeOutcome::ERROR`] with length 1, so callers can always make progress. the
//! `yaxpeax_arch::Decoder` implementation reports the same failures as `StandardDecodeError`.

use bitflags::bitflags;
use yaxpeax_arch::{AddressDiff, Arch, Decoder, LengthedInstruction, Reader, StandardDecodeError, U8Reader};

mod catalog;
mod display;
mod modrm;
mod prefix;
mod reg;
mod stream;

pub use catalog::{Catalog, CatalogError, LookupError, OperandKind, Template, TemplateMode};
pub use modrm::{AddressSize, MemoryAddress, ModRM, Sib};
pub use prefix::{PrefixFlags, Prefixes};
pub use reg::{RegSpec, RegWidth, Segment};
pub use stream::Disassembly;

use modrm::Addressing;

/// the architectural limit on instruction length, prefixes included.
pub const MAX_INSTRUCTION_LEN: usize = 15;

#[derive(Debug)]
pub struct IA32;

impl Arch for IA32 {
    type Address = u32;
    type Word = u8;
    type Instruction = Instruction;
    type DecodeError = StandardDecodeError;
    type Decoder = InstDecoder<'static>;
    type Operand = Operand;
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DecodeOutcome: u8 {
        /// an operand addressed memory.
        const USED_MEMORY = 1 << 0;
        /// a SIB byte was consumed.
        const USED_SIB = 1 << 1;
        /// the bytes did not decode; nothing else in the instruction is meaningful.
        const ERROR = 1 << 2;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand {
    Nothing,
    Register { reg: RegSpec },
    /// a memory operand of `size` bytes, or 0 if the instruction does not say. where it points
    /// is [`Instruction::memory`].
    Memory { size: u8 },
    ImmB { imm: u8 },
    ImmW { imm: u16 },
    ImmD { imm: u32 },
    /// branch displacement from the end of the instruction.
    Relative { disp: i32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Instruction {
    mnemonic: &'static str,
    operands: [Operand; 3],
    operand_count: u8,
    prefixes: Prefixes,
    operand_size: u8,
    address_size: AddressSize,
    modrm: Option<ModRM>,
    sib: Option<Sib>,
    memory: MemoryAddress,
    outcome: DecodeOutcome,
    length: u8,
}

impl Instruction {
    /// the mnemonic, empty if decoding failed.
    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.operand_count as usize]
    }

    pub fn prefixes(&self) -> Prefixes {
        self.prefixes
    }

    /// effective operand size in bytes, 2 or 4.
    pub fn operand_size(&self) -> u8 {
        self.operand_size
    }

    pub fn address_size(&self) -> AddressSize {
        self.address_size
    }

    pub fn modrm(&self) -> Option<ModRM> {
        self.modrm
    }

    pub fn sib(&self) -> Option<Sib> {
        self.sib
    }

    /// the address of this instruction's memory operand. meaningless unless
    /// `outcome()` contains [`DecodeOutcome::USED_MEMORY`].
    pub fn memory(&self) -> &MemoryAddress {
        &self.memory
    }

    pub fn outcome(&self) -> DecodeOutcome {
        self.outcome
    }

    pub fn is_error(&self) -> bool {
        self.outcome.contains(DecodeOutcome::ERROR)
    }

    /// bytes consumed, always at least 1.
    pub fn length(&self) -> u8 {
        self.length
    }

    fn mark_error(&mut self) {
        *self = Instruction::default();
    }
}

/// the default instruction is the error instruction: one undecodable byte.
impl Default for Instruction {
    fn default() -> Instruction {
        Instruction {
            mnemonic: "",
            operands: [Operand::Nothing, Operand::Nothing, Operand::Nothing],
            operand_count: 0,
            prefixes: Prefixes::default(),
            operand_size: 4,
            address_size: AddressSize::Bits32,
            modrm: None,
            sib: None,
            memory: MemoryAddress::default(),
            outcome: DecodeOutcome::ERROR,
            length: 1,
        }
    }
}

impl LengthedInstruction for Instruction {
    type Unit = AddressDiff<<IA32 as Arch>::Address>;
    fn min_size() -> Self::Unit {
        AddressDiff::from_const(1)
    }
    fn len(&self) -> Self::Unit {
        AddressDiff::from_const(self.length as u32)
    }
}

impl yaxpeax_arch::Instruction for Instruction {
    fn well_defined(&self) -> bool { !self.is_error() }
}

/// default operand and address size of a decoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    Bits16,
    Bits32,
}

impl DecodeMode {
    /// the effective size when a size-override prefix is (`flipped`) or is not present.
    fn effective(&self, flipped: bool) -> AddressSize {
        match (self, flipped) {
            (DecodeMode::Bits32, false) | (DecodeMode::Bits16, true) => AddressSize::Bits32,
            _ => AddressSize::Bits16,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct InstDecoder<'c> {
    catalog: &'c Catalog,
    mode: DecodeMode,
}

impl Default for InstDecoder<'static> {
    fn default() -> Self {
        InstDecoder::bits32()
    }
}

impl InstDecoder<'static> {
    pub fn bits32() -> Self {
        InstDecoder { catalog: Catalog::standard(), mode: DecodeMode::Bits32 }
    }

    pub fn bits16() -> Self {
        InstDecoder { catalog: Catalog::standard(), mode: DecodeMode::Bits16 }
    }
}

impl<'c> InstDecoder<'c> {
    pub fn with_catalog(catalog: &'c Catalog, mode: DecodeMode) -> Self {
        InstDecoder { catalog, mode }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// decode the instruction starting at `bytes[position]`.
    ///
    /// this never fails; an unknown opcode, an operand the encoding does not allow, running out
    /// of bytes, or a `position` past the end of `bytes` all produce the error instruction,
    /// which is one byte long.
    pub fn decode_at(&self, bytes: &[u8], position: usize) -> Instruction {
        let mut inst = Instruction::default();
        let rest = bytes.get(position..).unwrap_or(&[]);
        // on failure `decode_into` has already left `inst` as the error instruction
        let _ = self.decode_into(&mut inst, &mut U8Reader::new(rest));
        inst
    }

    pub fn decode_slice(&self, bytes: &[u8]) -> Instruction {
        self.decode_at(bytes, 0)
    }
}

/// after `decode_into` returns, the reader's position is unspecified: opcode lookup may have read
/// bytes past the end of the instruction (or past the one byte of an error instruction). callers
/// decoding a stream from one reader should reposition by `len()` rather than keep reading.
impl<'c> Decoder<IA32> for InstDecoder<'c> {
    fn decode_into<T: Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>>(&self, inst: &mut Instruction, words: &mut T) -> Result<(), <IA32 as Arch>::DecodeError> {
        let mut window = ByteWindow::new(words);
        let res = decode_inst(self, inst, &mut window);
        if res.is_err() {
            inst.mark_error();
        }
        res
    }
}

/// bytes of the instruction being decoded.
///
/// catalog lookup has to look at opcode and ModRM bytes before deciding how many of them belong
/// to the opcode, and a `Reader` can't give bytes back. bytes are pulled from the reader into
/// `buf` as they are first looked at and only count toward the instruction once consumed.
pub(crate) struct ByteWindow<'w, T> {
    words: &'w mut T,
    buf: [u8; MAX_INSTRUCTION_LEN],
    fetched: usize,
    consumed: usize,
}

impl<'w, T: Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>> ByteWindow<'w, T> {
    fn new(words: &'w mut T) -> Self {
        ByteWindow { words, buf: [0u8; MAX_INSTRUCTION_LEN], fetched: 0, consumed: 0 }
    }

    /// the byte `ahead` bytes past the next unconsumed one.
    pub(crate) fn peek(&mut self, ahead: usize) -> Result<u8, <IA32 as Arch>::DecodeError> {
        let at = self.consumed + ahead;
        if at >= MAX_INSTRUCTION_LEN {
            return Err(StandardDecodeError::InvalidOpcode);
        }
        while self.fetched <= at {
            self.buf[self.fetched] = self.words.next()?;
            self.fetched += 1;
        }
        Ok(self.buf[at])
    }

    pub(crate) fn next(&mut self) -> Result<u8, <IA32 as Arch>::DecodeError> {
        let b = self.peek(0)?;
        self.consumed += 1;
        Ok(b)
    }
}

pub(crate) trait DecodeHandler<T: Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>> {
    #[inline(always)]
    fn read_u8(&mut self, window: &mut ByteWindow<'_, T>) -> Result<u8, <IA32 as Arch>::DecodeError> {
        let b = window.next()?;
        self.on_word_read(b);
        Ok(b)
    }
    #[inline(always)]
    fn read_u16(&mut self, window: &mut ByteWindow<'_, T>) -> Result<u16, <IA32 as Arch>::DecodeError> {
        let mut buf = [0u8; 2];
        for b in buf.iter_mut() {
            *b = self.read_u8(window)?;
        }
        Ok(u16::from_le_bytes(buf))
    }
    #[inline(always)]
    fn read_u32(&mut self, window: &mut ByteWindow<'_, T>) -> Result<u32, <IA32 as Arch>::DecodeError> {
        let mut buf = [0u8; 4];
        for b in buf.iter_mut() {
            *b = self.read_u8(window)?;
        }
        Ok(u32::from_le_bytes(buf))
    }
    fn on_decode_start(&mut self) {}
    fn on_decode_end(&mut self) {}
    fn on_prefixes_decoded(&mut self, _prefixes: Prefixes, _operand_size: AddressSize, _address_size: AddressSize) {}
    fn on_opcode_decoded(&mut self, _template: &Template) -> Result<(), <IA32 as Arch>::DecodeError> { Ok(()) }
    fn on_modrm_decoded(&mut self, _modrm: ModRM) {}
    fn on_memory_decoded(&mut self, _address: MemoryAddress, _sib: Option<Sib>) {}
    fn on_operand_decoded(&mut self, _number: u8, _operand: Operand) -> Result<(), <IA32 as Arch>::DecodeError> { Ok(()) }
    fn on_word_read(&mut self, _word: <IA32 as Arch>::Word) {}
}

impl<T: yaxpeax_arch::Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>> DecodeHandler<T> for Instruction {
    fn on_decode_start(&mut self) {
        *self = Instruction::default();
        self.outcome = DecodeOutcome::empty();
        self.length = 0;
    }
    fn on_prefixes_decoded(&mut self, prefixes: Prefixes, operand_size: AddressSize, address_size: AddressSize) {
        self.prefixes = prefixes;
        self.operand_size = operand_size.bytes();
        self.address_size = address_size;
    }
    fn on_opcode_decoded(&mut self, template: &Template) -> Result<(), <IA32 as Arch>::DecodeError> {
        self.mnemonic = template.mnemonic();
        self.operand_count = template.operands().len() as u8;
        Ok(())
    }
    fn on_modrm_decoded(&mut self, modrm: ModRM) {
        self.modrm = Some(modrm);
    }
    fn on_memory_decoded(&mut self, address: MemoryAddress, sib: Option<Sib>) {
        self.memory = address;
        self.outcome |= DecodeOutcome::USED_MEMORY;
        if sib.is_some() {
            self.outcome |= DecodeOutcome::USED_SIB;
        }
        self.sib = sib;
    }
    fn on_operand_decoded(&mut self, number: u8, operand: Operand) -> Result<(), <IA32 as Arch>::DecodeError> {
        self.operands[number as usize] = operand;
        Ok(())
    }
    fn on_word_read(&mut self, _word: <IA32 as Arch>::Word) {
        self.length += 1;
    }
}

fn decode_inst<
    T: Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>,
    H: DecodeHandler<T>,
>(decoder: &InstDecoder<'_>, handler: &mut H, window: &mut ByteWindow<'_, T>) -> Result<(), <IA32 as Arch>::DecodeError> {
    handler.on_decode_start();

    let mut prefixes = Prefixes::default();
    while prefixes.apply(window.peek(0)?) {
        handler.read_u8(window)?;
    }
    let operand_size = decoder.mode.effective(prefixes.operand_size());
    let address_size = decoder.mode.effective(prefixes.address_size());
    handler.on_prefixes_decoded(prefixes, operand_size, address_size);

    let mut starved = None;
    let found = decoder.catalog.find(|ahead| {
        match window.peek(ahead) {
            Ok(b) => Some(b),
            Err(e) => {
                starved = Some(e);
                None
            }
        }
    });
    let template = match found {
        Ok(template) => template,
        Err(LookupError::Truncated) => {
            return Err(starved.unwrap_or(StandardDecodeError::ExhaustedInput));
        }
        Err(LookupError::UnknownOpcode) => {
            return Err(StandardDecodeError::InvalidOpcode);
        }
    };

    let mut opcode_reg = 0;
    for _ in template.opcode() {
        opcode_reg = handler.read_u8(window)? & 0b111;
    }
    handler.on_opcode_decoded(template)?;

    let (modrm, addressing) = if template.mode().has_modrm() {
        let modrm = ModRM(handler.read_u8(window)?);
        handler.on_modrm_decoded(modrm);
        let addressing = modrm::resolve(handler, window, modrm, address_size)?;
        if let Addressing::Memory { address, sib } = addressing {
            handler.on_memory_decoded(address, sib);
        }
        (Some(modrm), Some(addressing))
    } else {
        (None, None)
    };

    let operand_bytes = operand_size.bytes();
    let operands = OperandContext {
        operand_bytes,
        address_size,
        opcode_reg,
        modrm,
        addressing,
        dest_width: template.operands().first().and_then(|kind| kind.width(operand_bytes)),
    };
    for (i, kind) in template.operands().iter().enumerate() {
        let operand = read_operand(handler, window, &operands, i as u8, *kind)?;
        handler.on_operand_decoded(i as u8, operand)?;
    }

    handler.on_decode_end();
    Ok(())
}

/// what operand decoding needs to know about the rest of the instruction.
struct OperandContext {
    operand_bytes: u8,
    address_size: AddressSize,
    // low three bits of the last opcode byte
    opcode_reg: u8,
    modrm: Option<ModRM>,
    addressing: Option<Addressing>,
    dest_width: Option<u8>,
}

fn read_operand<
    T: Reader<<IA32 as Arch>::Address, <IA32 as Arch>::Word>,
    H: DecodeHandler<T>,
>(handler: &mut H, window: &mut ByteWindow<'_, T>, ctx: &OperandContext, slot: u8, kind: OperandKind) -> Result<Operand, <IA32 as Arch>::DecodeError> {
    let width = kind.width(ctx.operand_bytes);
    let reg_width = RegWidth::for_gpr_bytes(width.unwrap_or(ctx.operand_bytes));

    let operand = match kind {
        OperandKind::Nothing => Operand::Nothing,
        OperandKind::Rm8 | OperandKind::Rm16 | OperandKind::Rm16_32 |
        OperandKind::Mem8 | OperandKind::Mem16 | OperandKind::Mem16_32 => {
            match ctx.addressing {
                Some(Addressing::Direct { rm }) => {
                    if matches!(kind, OperandKind::Mem8 | OperandKind::Mem16 | OperandKind::Mem16_32) {
                        return Err(StandardDecodeError::InvalidOperand);
                    }
                    Operand::Register { reg: RegSpec::gpr(rm, reg_width) }
                }
                Some(Addressing::Memory { .. }) => Operand::Memory { size: width.unwrap_or(0) },
                None => {
                    return Err(StandardDecodeError::InvalidOperand);
                }
            }
        }
        OperandKind::Reg8 | OperandKind::Reg16 | OperandKind::Reg16_32 | OperandKind::Reg32 => {
            let modrm = ctx.modrm.ok_or(StandardDecodeError::InvalidOperand)?;
            Operand::Register { reg: RegSpec::gpr(modrm.reg(), reg_width) }
        }
        OperandKind::Sreg => {
            let modrm = ctx.modrm.ok_or(StandardDecodeError::InvalidOperand)?;
            let segment = Segment::from_num(modrm.reg()).ok_or(StandardDecodeError::InvalidOperand)?;
            Operand::Register { reg: segment.reg() }
        }
        OperandKind::MemOffset => {
            let address = match ctx.address_size {
                AddressSize::Bits16 => MemoryAddress::absolute(handler.read_u16(window)? as i16 as i32, 2),
                AddressSize::Bits32 => MemoryAddress::absolute(handler.read_u32(window)? as i32, 4),
            };
            handler.on_memory_decoded(address, None);
            Operand::Memory { size: 0 }
        }
        OperandKind::Imm8 => {
            let imm = handler.read_u8(window)?;
            // a leading imm8 (`push imm8`) is as wide as the operand size
            let target = if slot == 0 { Some(ctx.operand_bytes) } else { ctx.dest_width };
            match target {
                Some(2) => Operand::ImmW { imm: imm as i8 as i16 as u16 },
                Some(4) => Operand::ImmD { imm: imm as i8 as i32 as u32 },
                _ => Operand::ImmB { imm },
            }
        }
        OperandKind::UImm8 => Operand::ImmB { imm: handler.read_u8(window)? },
        OperandKind::Imm16 => Operand::ImmW { imm: handler.read_u16(window)? },
        OperandKind::Imm16_32 => {
            if ctx.operand_bytes == 2 {
                Operand::ImmW { imm: handler.read_u16(window)? }
            } else {
                Operand::ImmD { imm: handler.read_u32(window)? }
            }
        }
        OperandKind::OpcodeReg8 | OperandKind::OpcodeReg16_32 | OperandKind::OpcodeReg32 => {
            Operand::Register { reg: RegSpec::gpr(ctx.opcode_reg, reg_width) }
        }
        OperandKind::Rel8 => Operand::Relative { disp: handler.read_u8(window)? as i8 as i32 },
        OperandKind::Rel16_32 => {
            let disp = if ctx.operand_bytes == 2 {
                handler.read_u16(window)? as i16 as i32
            } else {
                handler.read_u32(window)? as i32
            };
            Operand::Relative { disp }
        }
        OperandKind::Al => Operand::Register { reg: RegSpec::AL },
        OperandKind::Ax => Operand::Register { reg: RegSpec::AX },
        OperandKind::Eax => Operand::Register { reg: RegSpec::EAX },
        OperandKind::Acc16_32 => Operand::Register { reg: RegSpec::gpr(0, reg_width) },
        OperandKind::Cl => Operand::Register { reg: RegSpec::CL },
        OperandKind::Dx => Operand::Register { reg: RegSpec::DX },
        OperandKind::One => Operand::ImmB { imm: 1 },
    };
    Ok(operand)
}
