use tracing::debug;

use crate::{InstDecoder, Instruction};

/// instructions of a byte buffer, in order, paired with their offsets.
///
/// every step advances by at least one byte, so undecodable bytes are reported as error
/// instructions and skipped rather than ending the iteration.
#[derive(Debug, Clone)]
pub struct Disassembly<'d, 'c> {
    decoder: InstDecoder<'c>,
    bytes: &'d [u8],
    offset: usize,
}

impl<'c> InstDecoder<'c> {
    pub fn disassemble<'d>(&self, bytes: &'d [u8]) -> Disassembly<'d, 'c> {
        Disassembly { decoder: *self, bytes, offset: 0 }
    }
}

impl<'d, 'c> Disassembly<'d, 'c> {
    /// offset of the next instruction to be decoded.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'d, 'c> Iterator for Disassembly<'d, 'c> {
    type Item = (usize, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let offset = self.offset;
        let inst = self.decoder.decode_at(self.bytes, offset);
        if inst.is_error() {
            debug!(offset, byte = self.bytes[offset], "undecodable instruction, skipping one byte");
        }
        self.offset += inst.length() as usize;
        Some((offset, inst))
    }
}

#[cfg(test)]
mod tests {
    use crate::InstDecoder;

    #[test]
    fn skips_bad_bytes() {
        let bytes: [u8; 4] = [0x0f, 0xff, 0x90, 0x53];
        let items: Vec<(usize, String)> = InstDecoder::bits32()
            .disassemble(&bytes)
            .map(|(offset, inst)| (offset, inst.to_string()))
            .collect();
        assert_eq!(items, vec![
            (0, "(bad)".to_string()),
            (1, "(bad)".to_string()),
            (2, "nop".to_string()),
            (3, "push ebx".to_string()),
        ]);
    }

    #[test]
    fn offset_tracks_progress() {
        let bytes: [u8; 4] = [0x8b, 0x4d, 0x0c, 0xf8];
        let mut insts = InstDecoder::bits32().disassemble(&bytes);
        assert_eq!(insts.offset(), 0);
        assert_eq!(insts.next().map(|(offset, _)| offset), Some(0));
        assert_eq!(insts.offset(), 3);
        assert_eq!(insts.next().map(|(_, inst)| inst.to_string()), Some("clc".to_string()));
        assert_eq!(insts.offset(), 4);
        assert!(insts.next().is_none());
    }

    #[test]
    fn empty_input() {
        assert_eq!(InstDecoder::bits32().disassemble(&[]).count(), 0);
    }
}
