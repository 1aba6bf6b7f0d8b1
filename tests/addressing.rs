use yaxpeax_ia32::{AddressSize, DecodeOutcome, InstDecoder, Operand, RegSpec};

fn disp_bytes_32(mode: u8, rm: u8, sib_base: u8) -> usize {
    match mode {
        0b00 if rm == 0b101 => 4,
        0b00 if rm == 0b100 && sib_base == 0b101 => 4,
        0b00 => 0,
        0b01 => 1,
        _ => 4,
    }
}

fn disp_bytes_16(mode: u8, rm: u8) -> usize {
    match mode {
        0b00 if rm == 0b110 => 2,
        0b00 => 0,
        0b01 => 1,
        _ => 2,
    }
}

#[test]
fn lengths_follow_mode_and_rm_32() {
    let decoder = InstDecoder::bits32();
    for sib in [0x00u8, 0x05, 0x25] {
        for mode in 0..3u8 {
            for rm in 0..8u8 {
                let mut bytes = vec![0x8b, (mode << 6) | (0b001 << 3) | rm, sib];
                bytes.extend_from_slice(&[0x11; 8]);
                let inst = decoder.decode_slice(&bytes);
                assert!(!inst.is_error(), "{:02x?}", bytes);

                let has_sib = rm == 0b100;
                let expected = 2 + has_sib as usize + disp_bytes_32(mode, rm, sib & 0b111);
                assert_eq!(inst.length() as usize, expected, "{:02x?}", bytes);
                assert_eq!(inst.memory().disp_size() as usize, disp_bytes_32(mode, rm, sib & 0b111));
                assert_eq!(inst.outcome().contains(DecodeOutcome::USED_SIB), has_sib);
                assert_eq!(inst.sib().is_some(), has_sib);
                assert!(inst.outcome().contains(DecodeOutcome::USED_MEMORY));
            }
        }
    }
}

#[test]
fn lengths_follow_mode_and_rm_16() {
    let decoder = InstDecoder::bits16();
    for mode in 0..3u8 {
        for rm in 0..8u8 {
            let mut bytes = vec![0x8b, (mode << 6) | rm];
            bytes.extend_from_slice(&[0x11; 8]);
            let inst = decoder.decode_slice(&bytes);
            assert!(!inst.is_error(), "{:02x?}", bytes);
            assert_eq!(inst.address_size(), AddressSize::Bits16);
            assert_eq!(inst.length() as usize, 2 + disp_bytes_16(mode, rm), "{:02x?}", bytes);
            assert!(inst.sib().is_none());
            assert!(!inst.outcome().contains(DecodeOutcome::USED_SIB));
        }
    }
}

#[test]
fn register_direct_reads_nothing_more() {
    let decoder = InstDecoder::bits32();
    for rm in 0..8u8 {
        let inst = decoder.decode_slice(&[0x8b, 0xc0 | rm, 0x24, 0x11, 0x11, 0x11, 0x11]);
        assert_eq!(inst.length(), 2);
        assert!(inst.outcome().is_empty());
        assert_eq!(inst.operands()[1], Operand::Register { reg: RegSpec::gpr(rm, yaxpeax_ia32::RegWidth::Dword) });
        assert_eq!(inst.modrm().map(|m| m.rm()), Some(rm));
    }
}

#[test]
fn sib_fields() {
    let inst = InstDecoder::bits32().decode_slice(&[0x8b, 0x4c, 0x58, 0x04]);
    let mem = inst.memory();
    assert_eq!(mem.base(), Some(RegSpec::EAX));
    assert_eq!(mem.index(), Some(RegSpec::EBX));
    assert_eq!(mem.scale(), 2);
    assert_eq!(mem.displacement(), 4);
    assert_eq!(mem.disp_size(), 1);
    assert_eq!(inst.outcome(), DecodeOutcome::USED_MEMORY | DecodeOutcome::USED_SIB);
    let sib = inst.sib().expect("sib consumed");
    assert_eq!((sib.scale(), sib.index(), sib.base()), (1, 3, 0));
    assert_eq!(inst.operands(), &[
        Operand::Register { reg: RegSpec::ECX },
        Operand::Memory { size: 4 },
    ]);
}

#[test]
fn no_index_and_no_base() {
    // sib index 100 is "no index", sib base 101 under mod 00 is "no base"
    let inst = InstDecoder::bits32().decode_slice(&[0x8b, 0x04, 0x25, 0x78, 0x56, 0x34, 0x12]);
    let mem = inst.memory();
    assert_eq!(mem.base(), None);
    assert_eq!(mem.index(), None);
    assert_eq!(mem.scale(), 1);
    assert_eq!(mem.displacement(), 0x12345678);
    assert_eq!(inst.to_string(), "mov eax, [0x12345678]");

    // with mod 01 the same base is ebp
    let inst = InstDecoder::bits32().decode_slice(&[0x8b, 0x44, 0x25, 0xf0]);
    assert_eq!(inst.memory().base(), Some(RegSpec::EBP));
    assert_eq!(inst.memory().displacement(), -0x10);
    assert_eq!(inst.to_string(), "mov eax, [ebp-0x10]");
}

#[test]
fn displacements_are_signed() {
    let inst = InstDecoder::bits32().decode_slice(&[0x8b, 0x80, 0x00, 0x00, 0x00, 0x80]);
    assert_eq!(inst.memory().displacement(), i32::MIN);
    assert_eq!(inst.to_string(), "mov eax, [eax-0x80000000]");

    let inst = InstDecoder::bits16().decode_slice(&[0x8b, 0x80, 0x00, 0x80]);
    assert_eq!(inst.memory().displacement(), -0x8000);
    assert_eq!(inst.to_string(), "mov ax, [bx+si-0x8000]");
}

#[test]
fn truncated_displacement_is_an_error() {
    let decoder = InstDecoder::bits32();
    assert!(decoder.decode_slice(&[0x8b, 0x05, 0x00, 0x00, 0x00]).is_error());
    assert!(decoder.decode_slice(&[0x8b, 0x04]).is_error());
    assert!(decoder.decode_slice(&[0x8b, 0x44, 0x24]).is_error());
}
