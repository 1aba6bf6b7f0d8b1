//! the instruction catalog: opcode templates, and the rules for finding the template a byte
//! sequence encodes.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use thiserror::Error;

/// how an operand slot of a [`Template`] is filled in.
///
/// `_16_32` kinds are 16 bits wide when the effective operand size is 16, and 32 bits wide
/// otherwise.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Nothing,
    /// register or memory, decided by the ModRM `mod` field.
    Rm8,
    Rm16,
    Rm16_32,
    /// register selected by the ModRM `reg` field.
    Reg8,
    Reg16,
    Reg16_32,
    Reg32,
    /// memory only; a register-direct ModRM is an invalid operand.
    Mem8,
    Mem16,
    Mem16_32,
    /// memory addressed by an absolute offset of address-size width, no ModRM.
    MemOffset,
    /// eight-bit immediate, sign-extended to the width of the first operand, or to the operand
    /// size when it is the first operand itself.
    Imm8,
    /// eight-bit immediate that is never extended: shift counts, ports, vectors, bit indices.
    UImm8,
    Imm16,
    Imm16_32,
    /// segment register selected by the ModRM `reg` field.
    Sreg,
    /// register selected by the low three bits of the last opcode byte.
    OpcodeReg8,
    OpcodeReg16_32,
    OpcodeReg32,
    /// signed branch displacement, relative to the end of the instruction.
    Rel8,
    Rel16_32,
    Al,
    Ax,
    Eax,
    /// `ax` or `eax`, by operand size.
    Acc16_32,
    Cl,
    Dx,
    /// the constant `1` of the `D0`-`D3` shift forms.
    One,
}

impl OperandKind {
    /// kinds that are decoded from the ModRM `mod` and `rm` fields.
    pub fn uses_rm_field(&self) -> bool {
        matches!(
            self,
            OperandKind::Rm8 | OperandKind::Rm16 | OperandKind::Rm16_32 |
            OperandKind::Mem8 | OperandKind::Mem16 | OperandKind::Mem16_32
        )
    }

    /// kinds that are decoded from the ModRM `reg` field.
    pub fn uses_reg_field(&self) -> bool {
        matches!(
            self,
            OperandKind::Reg8 | OperandKind::Reg16 | OperandKind::Reg16_32 | OperandKind::Reg32 |
            OperandKind::Sreg
        )
    }

    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            OperandKind::Imm8 | OperandKind::UImm8 | OperandKind::Imm16 | OperandKind::Imm16_32
        )
    }

    /// width in bytes of this operand, given the effective operand size. `None` for kinds with no
    /// inherent width (nothing, `MemOffset`, relative targets, the constant one).
    pub fn width(&self, operand_bytes: u8) -> Option<u8> {
        match self {
            OperandKind::Rm8 | OperandKind::Reg8 | OperandKind::Mem8 |
            OperandKind::Imm8 | OperandKind::UImm8 | OperandKind::OpcodeReg8 |
            OperandKind::Al | OperandKind::Cl => Some(1),
            OperandKind::Rm16 | OperandKind::Reg16 | OperandKind::Mem16 |
            OperandKind::Imm16 | OperandKind::Sreg | OperandKind::Ax | OperandKind::Dx => Some(2),
            OperandKind::Reg32 | OperandKind::OpcodeReg32 | OperandKind::Eax => Some(4),
            OperandKind::Rm16_32 | OperandKind::Reg16_32 | OperandKind::Mem16_32 |
            OperandKind::Imm16_32 | OperandKind::OpcodeReg16_32 |
            OperandKind::Acc16_32 => Some(operand_bytes),
            OperandKind::Nothing | OperandKind::MemOffset | OperandKind::Rel8 |
            OperandKind::Rel16_32 | OperandKind::One => None,
        }
    }
}

/// how the byte after a template's opcode is interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TemplateMode {
    /// no ModRM byte follows the opcode.
    NoAddressingByte,
    /// a ModRM byte follows; its `reg` field names a register operand (or is ignored).
    RegisterExtension,
    /// a ModRM byte follows; its `reg` field is this `/digit` and selects the template.
    Digit(u8),
}

impl TemplateMode {
    pub fn has_modrm(&self) -> bool {
        *self != TemplateMode::NoAddressingByte
    }
}

/// one catalog entry. templates are never modified once built; decoding copies what it needs out
/// of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Template {
    mnemonic: &'static str,
    opcode: [u8; 3],
    opcode_len: u8,
    operands: [OperandKind; 3],
    operand_count: u8,
    mode: TemplateMode,
}

const fn pack_opcode(opcode: &[u8]) -> ([u8; 3], u8) {
    let mut bytes = [0u8; 3];
    let mut i = 0;
    while i < opcode.len() && i < 3 {
        bytes[i] = opcode[i];
        i += 1;
    }
    let len = if opcode.len() > u8::MAX as usize { u8::MAX } else { opcode.len() as u8 };
    (bytes, len)
}

const fn pack_operands(operands: &[OperandKind]) -> ([OperandKind; 3], u8) {
    let mut kinds = [OperandKind::Nothing; 3];
    let mut i = 0;
    while i < operands.len() && i < 3 {
        kinds[i] = operands[i];
        i += 1;
    }
    let len = if operands.len() > u8::MAX as usize { u8::MAX } else { operands.len() as u8 };
    (kinds, len)
}

impl Template {
    const fn build(mnemonic: &'static str, opcode: &[u8], operands: &[OperandKind], mode: TemplateMode) -> Template {
        let (opcode, opcode_len) = pack_opcode(opcode);
        let (operands, operand_count) = pack_operands(operands);
        Template { mnemonic, opcode, opcode_len, operands, operand_count, mode }
    }

    /// an opcode with no ModRM byte.
    pub const fn no_modrm(mnemonic: &'static str, opcode: &[u8], operands: &[OperandKind]) -> Template {
        Template::build(mnemonic, opcode, operands, TemplateMode::NoAddressingByte)
    }

    /// an opcode followed by a ModRM byte whose `reg` field is an operand register.
    pub const fn modrm(mnemonic: &'static str, opcode: &[u8], operands: &[OperandKind]) -> Template {
        Template::build(mnemonic, opcode, operands, TemplateMode::RegisterExtension)
    }

    /// an `opcode /digit` form.
    pub const fn digit(mnemonic: &'static str, opcode: &[u8], digit: u8, operands: &[OperandKind]) -> Template {
        Template::build(mnemonic, opcode, operands, TemplateMode::Digit(digit))
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn opcode(&self) -> &[u8] {
        &self.opcode[..(self.opcode_len as usize).min(3)]
    }

    /// declared operand kinds, destination first.
    pub fn operands(&self) -> &[OperandKind] {
        &self.operands[..(self.operand_count as usize).min(3)]
    }

    pub fn mode(&self) -> TemplateMode {
        self.mode
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.opcode_len == 0 || self.opcode_len > 3 {
            return Err(CatalogError::BadOpcodeLength { mnemonic: self.mnemonic, len: self.opcode_len as usize });
        }
        if self.operand_count > 3 {
            return Err(CatalogError::TooManyOperands { mnemonic: self.mnemonic, count: self.operand_count as usize });
        }
        let kinds = self.operands();
        match self.mode {
            TemplateMode::NoAddressingByte => {
                if kinds.iter().any(|k| k.uses_rm_field() || k.uses_reg_field()) {
                    return Err(CatalogError::NeedsAddressingByte { mnemonic: self.mnemonic });
                }
            }
            TemplateMode::RegisterExtension => {}
            TemplateMode::Digit(digit) => {
                if digit > 7 {
                    return Err(CatalogError::DigitOutOfRange { mnemonic: self.mnemonic, digit });
                }
                if kinds.iter().any(|k| k.uses_reg_field()) {
                    return Err(CatalogError::RegisterFieldTaken { mnemonic: self.mnemonic });
                }
            }
        }
        if self.mode.has_modrm() && kinds.contains(&OperandKind::MemOffset) {
            return Err(CatalogError::MisplacedOffset { mnemonic: self.mnemonic });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("`{mnemonic}`: opcode must be 1 to 3 bytes, got {len}")]
    BadOpcodeLength { mnemonic: &'static str, len: usize },
    #[error("`{mnemonic}`: at most three operands, got {count}")]
    TooManyOperands { mnemonic: &'static str, count: usize },
    #[error("`{mnemonic}`: /{digit} is not a ModRM reg value")]
    DigitOutOfRange { mnemonic: &'static str, digit: u8 },
    #[error("`{mnemonic}`: operands need a ModRM byte the template does not have")]
    NeedsAddressingByte { mnemonic: &'static str },
    #[error("`{mnemonic}`: /digit templates cannot take a register from the ModRM reg field")]
    RegisterFieldTaken { mnemonic: &'static str },
    #[error("`{mnemonic}`: offset-only memory operands cannot be combined with a ModRM byte")]
    MisplacedOffset { mnemonic: &'static str },
    #[error("`{mnemonic}` conflicts with `{existing}` at opcode {opcode:02x?}")]
    Conflict { mnemonic: &'static str, existing: &'static str, opcode: Vec<u8> },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no template matches")]
    UnknownOpcode,
    #[error("ran out of bytes before an opcode matched")]
    Truncated,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct OpcodeKey {
    len: u8,
    bytes: [u8; 3],
}

impl OpcodeKey {
    fn of(bytes: &[u8]) -> OpcodeKey {
        let (bytes, len) = pack_opcode(bytes);
        OpcodeKey { len, bytes }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Single(usize),
    Group([Option<usize>; 8]),
}

/// a validated, read-only opcode table.
///
/// build one with [`Catalog::new`], or share the base integer instruction set through
/// [`Catalog::standard`].
#[derive(Debug, Clone)]
pub struct Catalog {
    templates: Vec<Template>,
    slots: HashMap<OpcodeKey, Slot>,
    // lead bytes of 2- and 3-byte opcodes; lookup only reads past an opcode byte for these
    two_byte_leads: HashSet<u8>,
    three_byte_leads: HashSet<[u8; 2]>,
}

static STANDARD: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new(standard_templates()).expect("standard catalog is well-formed")
});

impl Catalog {
    pub fn new<I: IntoIterator<Item = Template>>(templates: I) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog {
            templates: Vec::new(),
            slots: HashMap::new(),
            two_byte_leads: HashSet::new(),
            three_byte_leads: HashSet::new(),
        };
        for template in templates {
            catalog.insert(template)?;
        }
        Ok(catalog)
    }

    /// the base integer instruction set, built on first use.
    pub fn standard() -> &'static Catalog {
        &STANDARD
    }

    fn insert(&mut self, template: Template) -> Result<(), CatalogError> {
        template.validate()?;
        let idx = self.templates.len();
        let opcode = template.opcode();
        let key = OpcodeKey::of(opcode);

        let conflict = |existing: usize, templates: &[Template]| CatalogError::Conflict {
            mnemonic: template.mnemonic,
            existing: templates[existing].mnemonic,
            opcode: opcode.to_vec(),
        };

        match (self.slots.get_mut(&key), template.mode) {
            (None, TemplateMode::Digit(digit)) => {
                let mut group = [None; 8];
                group[digit as usize] = Some(idx);
                self.slots.insert(key, Slot::Group(group));
            }
            (None, _) => {
                self.slots.insert(key, Slot::Single(idx));
            }
            (Some(Slot::Group(group)), TemplateMode::Digit(digit)) => {
                if let Some(existing) = group[digit as usize] {
                    return Err(conflict(existing, &self.templates));
                }
                group[digit as usize] = Some(idx);
            }
            (Some(Slot::Group(group)), _) => {
                let existing = group.iter().flatten().next().copied().unwrap_or(0);
                return Err(conflict(existing, &self.templates));
            }
            (Some(Slot::Single(existing)), _) => {
                let existing = *existing;
                return Err(conflict(existing, &self.templates));
            }
        }

        match opcode.len() {
            2 => {
                self.two_byte_leads.insert(opcode[0]);
            }
            3 => {
                self.two_byte_leads.insert(opcode[0]);
                self.three_byte_leads.insert([opcode[0], opcode[1]]);
            }
            _ => {}
        }
        self.templates.push(template);
        Ok(())
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// find the template encoded at the start of `bytes`, which should begin just past any
    /// prefixes.
    ///
    /// longer opcodes are tried first. for `/digit` groups the ModRM byte after the opcode is
    /// inspected but not considered part of the match.
    pub fn lookup(&self, bytes: &[u8]) -> Result<&Template, LookupError> {
        self.find(|at| bytes.get(at).copied())
    }

    /// `lookup`, over any source of bytes that can be peeked at an offset from the current
    /// position. `peek` is only called for offsets the lookup actually needs.
    pub(crate) fn find<F: FnMut(usize) -> Option<u8>>(&self, mut peek: F) -> Result<&Template, LookupError> {
        let lead = peek(0).ok_or(LookupError::Truncated)?;
        let mut starved = false;

        if self.two_byte_leads.contains(&lead) {
            match peek(1) {
                Some(second) => {
                    if self.three_byte_leads.contains(&[lead, second]) {
                        match peek(2) {
                            Some(third) => {
                                if let Some(slot) = self.slots.get(&OpcodeKey::of(&[lead, second, third])) {
                                    return self.select(slot, 3, &mut peek);
                                }
                            }
                            None => { starved = true; }
                        }
                    }
                    if let Some(slot) = self.slots.get(&OpcodeKey::of(&[lead, second])) {
                        return self.select(slot, 2, &mut peek);
                    }
                }
                None => { starved = true; }
            }
        }

        if let Some(slot) = self.slots.get(&OpcodeKey::of(&[lead])) {
            return self.select(slot, 1, &mut peek);
        }

        if starved {
            Err(LookupError::Truncated)
        } else {
            Err(LookupError::UnknownOpcode)
        }
    }

    fn select<F: FnMut(usize) -> Option<u8>>(&self, slot: &Slot, opcode_len: usize, peek: &mut F) -> Result<&Template, LookupError> {
        match slot {
            Slot::Single(idx) => Ok(&self.templates[*idx]),
            Slot::Group(group) => {
                let modrm = peek(opcode_len).ok_or(LookupError::Truncated)?;
                let digit = (modrm >> 3) & 0b111;
                match group[digit as usize] {
                    Some(idx) => Ok(&self.templates[idx]),
                    None => Err(LookupError::UnknownOpcode),
                }
            }
        }
    }
}

// condition codes in encoding order, `o` through `g`
const JCC: [&str; 16] = [
    "jo", "jno", "jb", "jae", "je", "jne", "jbe", "ja",
    "js", "jns", "jp", "jnp", "jl", "jge", "jle", "jg",
];
const SETCC: [&str; 16] = [
    "seto", "setno", "setb", "setae", "sete", "setne", "setbe", "seta",
    "sets", "setns", "setp", "setnp", "setl", "setge", "setle", "setg",
];
const CMOVCC: [&str; 16] = [
    "cmovo", "cmovno", "cmovb", "cmovae", "cmove", "cmovne", "cmovbe", "cmova",
    "cmovs", "cmovns", "cmovp", "cmovnp", "cmovl", "cmovge", "cmovle", "cmovg",
];

fn standard_templates() -> Vec<Template> {
    use OperandKind::*;

    let mut t = Vec::with_capacity(400);

    const ALU: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];
    for (i, &name) in ALU.iter().enumerate() {
        let base = (i as u8) << 3;
        let digit = i as u8;
        t.push(Template::modrm(name, &[base], &[Rm8, Reg8]));
        t.push(Template::modrm(name, &[base + 1], &[Rm16_32, Reg16_32]));
        t.push(Template::modrm(name, &[base + 2], &[Reg8, Rm8]));
        t.push(Template::modrm(name, &[base + 3], &[Reg16_32, Rm16_32]));
        t.push(Template::no_modrm(name, &[base + 4], &[Al, Imm8]));
        t.push(Template::no_modrm(name, &[base + 5], &[Acc16_32, Imm16_32]));
        t.push(Template::digit(name, &[0x80], digit, &[Rm8, Imm8]));
        t.push(Template::digit(name, &[0x81], digit, &[Rm16_32, Imm16_32]));
        t.push(Template::digit(name, &[0x83], digit, &[Rm16_32, Imm8]));
    }

    t.push(Template::no_modrm("daa", &[0x27], &[]));
    t.push(Template::no_modrm("das", &[0x2f], &[]));
    t.push(Template::no_modrm("aaa", &[0x37], &[]));
    t.push(Template::no_modrm("aas", &[0x3f], &[]));

    for r in 0..8u8 {
        t.push(Template::no_modrm("inc", &[0x40 + r], &[OpcodeReg16_32]));
        t.push(Template::no_modrm("dec", &[0x48 + r], &[OpcodeReg16_32]));
        t.push(Template::no_modrm("push", &[0x50 + r], &[OpcodeReg16_32]));
        t.push(Template::no_modrm("pop", &[0x58 + r], &[OpcodeReg16_32]));
        t.push(Template::no_modrm("mov", &[0xb0 + r], &[OpcodeReg8, Imm8]));
        t.push(Template::no_modrm("mov", &[0xb8 + r], &[OpcodeReg16_32, Imm16_32]));
        t.push(Template::no_modrm("bswap", &[0x0f, 0xc8 + r], &[OpcodeReg32]));
        if r != 0 {
            // 90 is `nop`, not `xchg eax, eax`
            t.push(Template::no_modrm("xchg", &[0x90 + r], &[OpcodeReg16_32, Acc16_32]));
        }
    }

    t.push(Template::no_modrm("pusha", &[0x60], &[]));
    t.push(Template::no_modrm("popa", &[0x61], &[]));
    t.push(Template::modrm("bound", &[0x62], &[Reg16_32, Mem16_32]));
    t.push(Template::modrm("arpl", &[0x63], &[Rm16, Reg16]));
    t.push(Template::no_modrm("push", &[0x68], &[Imm16_32]));
    t.push(Template::modrm("imul", &[0x69], &[Reg16_32, Rm16_32, Imm16_32]));
    t.push(Template::no_modrm("push", &[0x6a], &[Imm8]));
    t.push(Template::modrm("imul", &[0x6b], &[Reg16_32, Rm16_32, Imm8]));
    t.push(Template::no_modrm("insb", &[0x6c], &[]));
    t.push(Template::no_modrm("insd", &[0x6d], &[]));
    t.push(Template::no_modrm("outsb", &[0x6e], &[]));
    t.push(Template::no_modrm("outsd", &[0x6f], &[]));

    for cc in 0..16u8 {
        t.push(Template::no_modrm(JCC[cc as usize], &[0x70 + cc], &[Rel8]));
        t.push(Template::no_modrm(JCC[cc as usize], &[0x0f, 0x80 + cc], &[Rel16_32]));
        t.push(Template::modrm(SETCC[cc as usize], &[0x0f, 0x90 + cc], &[Rm8]));
        t.push(Template::modrm(CMOVCC[cc as usize], &[0x0f, 0x40 + cc], &[Reg16_32, Rm16_32]));
    }

    t.push(Template::modrm("test", &[0x84], &[Rm8, Reg8]));
    t.push(Template::modrm("test", &[0x85], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("xchg", &[0x86], &[Rm8, Reg8]));
    t.push(Template::modrm("xchg", &[0x87], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("mov", &[0x88], &[Rm8, Reg8]));
    t.push(Template::modrm("mov", &[0x89], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("mov", &[0x8a], &[Reg8, Rm8]));
    t.push(Template::modrm("mov", &[0x8b], &[Reg16_32, Rm16_32]));
    t.push(Template::modrm("mov", &[0x8c], &[Rm16, Sreg]));
    t.push(Template::modrm("lea", &[0x8d], &[Reg16_32, Mem16_32]));
    t.push(Template::modrm("mov", &[0x8e], &[Sreg, Rm16]));
    t.push(Template::digit("pop", &[0x8f], 0, &[Rm16_32]));

    t.push(Template::no_modrm("nop", &[0x90], &[]));
    t.push(Template::no_modrm("cwde", &[0x98], &[]));
    t.push(Template::no_modrm("cdq", &[0x99], &[]));
    t.push(Template::no_modrm("wait", &[0x9b], &[]));
    t.push(Template::no_modrm("pushfd", &[0x9c], &[]));
    t.push(Template::no_modrm("popfd", &[0x9d], &[]));
    t.push(Template::no_modrm("sahf", &[0x9e], &[]));
    t.push(Template::no_modrm("lahf", &[0x9f], &[]));

    t.push(Template::no_modrm("mov", &[0xa0], &[Al, MemOffset]));
    t.push(Template::no_modrm("mov", &[0xa1], &[Acc16_32, MemOffset]));
    t.push(Template::no_modrm("mov", &[0xa2], &[MemOffset, Al]));
    t.push(Template::no_modrm("mov", &[0xa3], &[MemOffset, Acc16_32]));
    t.push(Template::no_modrm("movsb", &[0xa4], &[]));
    t.push(Template::no_modrm("movsd", &[0xa5], &[]));
    t.push(Template::no_modrm("cmpsb", &[0xa6], &[]));
    t.push(Template::no_modrm("cmpsd", &[0xa7], &[]));
    t.push(Template::no_modrm("test", &[0xa8], &[Al, Imm8]));
    t.push(Template::no_modrm("test", &[0xa9], &[Acc16_32, Imm16_32]));
    t.push(Template::no_modrm("stosb", &[0xaa], &[]));
    t.push(Template::no_modrm("stosd", &[0xab], &[]));
    t.push(Template::no_modrm("lodsb", &[0xac], &[]));
    t.push(Template::no_modrm("lodsd", &[0xad], &[]));
    t.push(Template::no_modrm("scasb", &[0xae], &[]));
    t.push(Template::no_modrm("scasd", &[0xaf], &[]));

    // /6 is an undocumented alias of /4 and is left out
    const SHIFTS: [(u8, &str); 7] = [
        (0, "rol"), (1, "ror"), (2, "rcl"), (3, "rcr"), (4, "shl"), (5, "shr"), (7, "sar"),
    ];
    for &(digit, name) in SHIFTS.iter() {
        t.push(Template::digit(name, &[0xc0], digit, &[Rm8, UImm8]));
        t.push(Template::digit(name, &[0xc1], digit, &[Rm16_32, UImm8]));
        t.push(Template::digit(name, &[0xd0], digit, &[Rm8, One]));
        t.push(Template::digit(name, &[0xd1], digit, &[Rm16_32, One]));
        t.push(Template::digit(name, &[0xd2], digit, &[Rm8, Cl]));
        t.push(Template::digit(name, &[0xd3], digit, &[Rm16_32, Cl]));
    }

    t.push(Template::no_modrm("ret", &[0xc2], &[Imm16]));
    t.push(Template::no_modrm("ret", &[0xc3], &[]));
    t.push(Template::modrm("les", &[0xc4], &[Reg16_32, Mem16_32]));
    t.push(Template::modrm("lds", &[0xc5], &[Reg16_32, Mem16_32]));
    t.push(Template::digit("mov", &[0xc6], 0, &[Rm8, Imm8]));
    t.push(Template::digit("mov", &[0xc7], 0, &[Rm16_32, Imm16_32]));
    t.push(Template::no_modrm("enter", &[0xc8], &[Imm16, UImm8]));
    t.push(Template::no_modrm("leave", &[0xc9], &[]));
    t.push(Template::no_modrm("retf", &[0xca], &[Imm16]));
    t.push(Template::no_modrm("retf", &[0xcb], &[]));
    t.push(Template::no_modrm("int3", &[0xcc], &[]));
    t.push(Template::no_modrm("int", &[0xcd], &[UImm8]));
    t.push(Template::no_modrm("into", &[0xce], &[]));
    t.push(Template::no_modrm("iretd", &[0xcf], &[]));
    t.push(Template::no_modrm("aam", &[0xd4], &[UImm8]));
    t.push(Template::no_modrm("aad", &[0xd5], &[UImm8]));
    t.push(Template::no_modrm("xlatb", &[0xd7], &[]));

    t.push(Template::no_modrm("loopne", &[0xe0], &[Rel8]));
    t.push(Template::no_modrm("loope", &[0xe1], &[Rel8]));
    t.push(Template::no_modrm("loop", &[0xe2], &[Rel8]));
    t.push(Template::no_modrm("jecxz", &[0xe3], &[Rel8]));
    t.push(Template::no_modrm("in", &[0xe4], &[Al, UImm8]));
    t.push(Template::no_modrm("in", &[0xe5], &[Acc16_32, UImm8]));
    t.push(Template::no_modrm("out", &[0xe6], &[UImm8, Al]));
    t.push(Template::no_modrm("out", &[0xe7], &[UImm8, Acc16_32]));
    t.push(Template::no_modrm("call", &[0xe8], &[Rel16_32]));
    t.push(Template::no_modrm("jmp", &[0xe9], &[Rel16_32]));
    t.push(Template::no_modrm("jmp", &[0xeb], &[Rel8]));
    t.push(Template::no_modrm("in", &[0xec], &[Al, Dx]));
    t.push(Template::no_modrm("in", &[0xed], &[Acc16_32, Dx]));
    t.push(Template::no_modrm("out", &[0xee], &[Dx, Al]));
    t.push(Template::no_modrm("out", &[0xef], &[Dx, Acc16_32]));

    t.push(Template::no_modrm("hlt", &[0xf4], &[]));
    t.push(Template::no_modrm("cmc", &[0xf5], &[]));
    t.push(Template::digit("test", &[0xf6], 0, &[Rm8, Imm8]));
    t.push(Template::digit("test", &[0xf7], 0, &[Rm16_32, Imm16_32]));
    const UNARY: [(u8, &str); 6] = [
        (2, "not"), (3, "neg"), (4, "mul"), (5, "imul"), (6, "div"), (7, "idiv"),
    ];
    for &(digit, name) in UNARY.iter() {
        t.push(Template::digit(name, &[0xf6], digit, &[Rm8]));
        t.push(Template::digit(name, &[0xf7], digit, &[Rm16_32]));
    }
    t.push(Template::no_modrm("clc", &[0xf8], &[]));
    t.push(Template::no_modrm("stc", &[0xf9], &[]));
    t.push(Template::no_modrm("cli", &[0xfa], &[]));
    t.push(Template::no_modrm("sti", &[0xfb], &[]));
    t.push(Template::no_modrm("cld", &[0xfc], &[]));
    t.push(Template::no_modrm("std", &[0xfd], &[]));
    t.push(Template::digit("inc", &[0xfe], 0, &[Rm8]));
    t.push(Template::digit("dec", &[0xfe], 1, &[Rm8]));
    t.push(Template::digit("inc", &[0xff], 0, &[Rm16_32]));
    t.push(Template::digit("dec", &[0xff], 1, &[Rm16_32]));
    t.push(Template::digit("call", &[0xff], 2, &[Rm16_32]));
    t.push(Template::digit("callf", &[0xff], 3, &[Mem16_32]));
    t.push(Template::digit("jmp", &[0xff], 4, &[Rm16_32]));
    t.push(Template::digit("jmpf", &[0xff], 5, &[Mem16_32]));
    t.push(Template::digit("push", &[0xff], 6, &[Rm16_32]));

    t.push(Template::no_modrm("clts", &[0x0f, 0x06], &[]));
    t.push(Template::no_modrm("invd", &[0x0f, 0x08], &[]));
    t.push(Template::no_modrm("wbinvd", &[0x0f, 0x09], &[]));
    t.push(Template::no_modrm("ud2", &[0x0f, 0x0b], &[]));
    t.push(Template::no_modrm("wrmsr", &[0x0f, 0x30], &[]));
    t.push(Template::no_modrm("rdtsc", &[0x0f, 0x31], &[]));
    t.push(Template::no_modrm("rdmsr", &[0x0f, 0x32], &[]));
    t.push(Template::no_modrm("rdpmc", &[0x0f, 0x33], &[]));
    t.push(Template::no_modrm("sysenter", &[0x0f, 0x34], &[]));
    t.push(Template::no_modrm("sysexit", &[0x0f, 0x35], &[]));
    t.push(Template::no_modrm("cpuid", &[0x0f, 0xa2], &[]));

    t.push(Template::modrm("bt", &[0x0f, 0xa3], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("shld", &[0x0f, 0xa4], &[Rm16_32, Reg16_32, UImm8]));
    t.push(Template::modrm("shld", &[0x0f, 0xa5], &[Rm16_32, Reg16_32, Cl]));
    t.push(Template::modrm("bts", &[0x0f, 0xab], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("shrd", &[0x0f, 0xac], &[Rm16_32, Reg16_32, UImm8]));
    t.push(Template::modrm("shrd", &[0x0f, 0xad], &[Rm16_32, Reg16_32, Cl]));
    t.push(Template::modrm("imul", &[0x0f, 0xaf], &[Reg16_32, Rm16_32]));
    t.push(Template::modrm("cmpxchg", &[0x0f, 0xb0], &[Rm8, Reg8]));
    t.push(Template::modrm("cmpxchg", &[0x0f, 0xb1], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("btr", &[0x0f, 0xb3], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("movzx", &[0x0f, 0xb6], &[Reg16_32, Rm8]));
    t.push(Template::modrm("movzx", &[0x0f, 0xb7], &[Reg32, Rm16]));
    t.push(Template::digit("bt", &[0x0f, 0xba], 4, &[Rm16_32, UImm8]));
    t.push(Template::digit("bts", &[0x0f, 0xba], 5, &[Rm16_32, UImm8]));
    t.push(Template::digit("btr", &[0x0f, 0xba], 6, &[Rm16_32, UImm8]));
    t.push(Template::digit("btc", &[0x0f, 0xba], 7, &[Rm16_32, UImm8]));
    t.push(Template::modrm("btc", &[0x0f, 0xbb], &[Rm16_32, Reg16_32]));
    t.push(Template::modrm("bsf", &[0x0f, 0xbc], &[Reg16_32, Rm16_32]));
    t.push(Template::modrm("bsr", &[0x0f, 0xbd], &[Reg16_32, Rm16_32]));
    t.push(Template::modrm("movsx", &[0x0f, 0xbe], &[Reg16_32, Rm8]));
    t.push(Template::modrm("movsx", &[0x0f, 0xbf], &[Reg32, Rm16]));
    t.push(Template::modrm("xadd", &[0x0f, 0xc0], &[Rm8, Reg8]));
    t.push(Template::modrm("xadd", &[0x0f, 0xc1], &[Rm16_32, Reg16_32]));

    t.push(Template::modrm("movbe", &[0x0f, 0x38, 0xf0], &[Reg16_32, Mem16_32]));
    t.push(Template::modrm("movbe", &[0x0f, 0x38, 0xf1], &[Mem16_32, Reg16_32]));

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperandKind::*;

    #[test]
    fn standard_builds() {
        let catalog = Catalog::standard();
        assert!(catalog.len() > 300);
        assert!(catalog.templates().iter().all(|t| !t.mnemonic().is_empty()));
    }

    #[test]
    fn template_accessors() {
        let t = Template::digit("bts", &[0x0f, 0xba], 5, &[Rm16_32, UImm8]);
        assert_eq!(t.opcode(), &[0x0f, 0xba]);
        assert_eq!(t.operands(), &[Rm16_32, UImm8]);
        assert_eq!(t.mode(), TemplateMode::Digit(5));
        assert!(t.mode().has_modrm());
        assert!(!Template::no_modrm("clc", &[0xf8], &[]).mode().has_modrm());
    }

    #[test]
    fn widths() {
        assert_eq!(Rm16_32.width(2), Some(2));
        assert_eq!(Rm16_32.width(4), Some(4));
        assert_eq!(Reg32.width(2), Some(4));
        assert_eq!(Imm8.width(4), Some(1));
        assert_eq!(Sreg.width(4), Some(2));
        assert_eq!(MemOffset.width(4), None);
    }

    #[test]
    fn kind_classes() {
        assert!(Imm8.is_immediate());
        assert!(UImm8.is_immediate());
        assert!(Imm16_32.is_immediate());
        assert!(!One.is_immediate());
        assert!(!Rel8.is_immediate());
        assert!(Rm8.uses_rm_field());
        assert!(!Reg8.uses_rm_field());
        assert!(Sreg.uses_reg_field());
        assert!(!Mem16.uses_reg_field());
    }

    #[test]
    fn lookup_does_not_read_past_one_byte_opcodes() {
        let catalog = Catalog::standard();
        let mut reads = Vec::new();
        let t = catalog.find(|at| {
            reads.push(at);
            [0xf8u8, 0x0f, 0x0f].get(at).copied()
        }).unwrap();
        assert_eq!(t.mnemonic(), "clc");
        assert_eq!(reads, vec![0]);
    }
}
