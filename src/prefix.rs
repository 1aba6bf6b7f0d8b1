use bitflags::bitflags;

use crate::reg::Segment;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PrefixFlags: u8 {
        const LOCK = 1 << 0;
        const REPE = 1 << 1;
        const REPNE = 1 << 2;
        const SEGMENT = 1 << 3;
        const OPERAND_SIZE = 1 << 4;
        const ADDRESS_SIZE = 1 << 5;
    }
}

/// legacy prefixes seen before an opcode.
///
/// `flags` only records that a segment override was present; the segment it selected is kept
/// alongside so operands can be rendered with it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Prefixes {
    flags: PrefixFlags,
    segment: Option<Segment>,
}

impl Prefixes {
    /// scan the prefix run of `bytes` starting at `cursor`, returning the prefixes and the
    /// position of the first non-prefix byte. an empty run is just `(Prefixes::default(),
    /// cursor)`.
    pub fn scan(bytes: &[u8], cursor: usize) -> (Prefixes, usize) {
        let mut prefixes = Prefixes::default();
        let mut cursor = cursor;
        while let Some(&b) = bytes.get(cursor) {
            if !prefixes.apply(b) {
                break;
            }
            cursor += 1;
        }
        (prefixes, cursor)
    }

    /// record `byte` if it is a legacy prefix. returns `false`, leaving `self` untouched, if it
    /// is not one.
    pub fn apply(&mut self, byte: u8) -> bool {
        match byte {
            0xf0 => self.flags |= PrefixFlags::LOCK,
            0xf3 => self.flags |= PrefixFlags::REPE,
            0xf2 => self.flags |= PrefixFlags::REPNE,
            0x66 => self.flags |= PrefixFlags::OPERAND_SIZE,
            0x67 => self.flags |= PrefixFlags::ADDRESS_SIZE,
            _ => {
                match Segment::from_prefix(byte) {
                    Some(segment) => {
                        // a later override replaces an earlier one
                        self.flags |= PrefixFlags::SEGMENT;
                        self.segment = Some(segment);
                    }
                    None => {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub fn flags(&self) -> PrefixFlags {
        self.flags
    }

    /// the overriding segment, if any.
    pub fn segment(&self) -> Option<Segment> {
        self.segment
    }

    #[inline]
    pub fn lock(&self) -> bool {
        self.flags.contains(PrefixFlags::LOCK)
    }

    #[inline]
    pub fn repe(&self) -> bool {
        self.flags.contains(PrefixFlags::REPE)
    }

    #[inline]
    pub fn repne(&self) -> bool {
        self.flags.contains(PrefixFlags::REPNE)
    }

    #[inline]
    pub fn operand_size(&self) -> bool {
        self.flags.contains(PrefixFlags::OPERAND_SIZE)
    }

    #[inline]
    pub fn address_size(&self) -> bool {
        self.flags.contains(PrefixFlags::ADDRESS_SIZE)
    }
}
