use yaxpeax_arch::Decoder;

use yaxpeax_ia32::InstDecoder;

fn test_display(bytes: &[u8], text: &str) {
    test_display_under(InstDecoder::bits32(), bytes, text);
}

fn test_display_under(decoder: InstDecoder, bytes: &[u8], text: &str) {
    let inst = decoder.decode(&mut yaxpeax_arch::U8Reader::new(bytes)).expect("decode succeeds");
    let rendered = format!("{}", inst);
    assert_eq!(rendered, text);
    assert_eq!(inst.length() as usize, bytes.len(), "{} consumed the wrong number of bytes", text);
    assert_eq!(decoder.decode_slice(bytes), inst);
}

#[test]
fn sample_stream() {
    test_display(&[0x8b, 0x4d, 0x0c], "mov ecx, [ebp+0xc]");
    test_display(&[0x83, 0xc1, 0x20], "add ecx, 0x20");
    test_display(&[0x0f, 0xb6, 0xc0], "movzx eax, al");
    test_display(&[0x85, 0xc0], "test eax, eax");
    test_display(&[0xc1, 0xeb, 0x03], "shr ebx, 0x3");
    test_display(&[0x0f, 0xba, 0xea, 0x14], "bts edx, 0x14");
    test_display(&[0xf8], "clc");
    test_display(&[0x2c, 0x06], "sub al, 0x6");
    test_display(&[0x53], "push ebx");
    test_display(&[0x3d, 0x78, 0x56, 0x34, 0x12], "cmp eax, 0x12345678");
    test_display(&[0x66, 0x49], "dec cx");
    test_display(&[0x8b, 0x4c, 0x58, 0x04], "mov ecx, [eax+ebx*2+0x4]");
}

#[test]
fn whole_sample_stream_decodes() {
    let stream: &[u8] = &[
        0x8b, 0x4d, 0x0c,
        0x83, 0xc1, 0x20,
        0x0f, 0xb6, 0xc0,
        0x85, 0xc0,
        0xc1, 0xeb, 0x03,
        0x0f, 0xba, 0xea, 0x14,
        0xf8,
        0x2c, 0x06,
        0x53,
        0x3d, 0x78, 0x56, 0x34, 0x12,
        0x66, 0x49,
        0x8b, 0x4c, 0x58, 0x04,
    ];
    let decoder = InstDecoder::bits32();
    let offsets: Vec<usize> = decoder.disassemble(stream)
        .map(|(offset, inst)| {
            assert!(!inst.is_error(), "error at offset {}", offset);
            offset
        })
        .collect();
    assert_eq!(offsets, vec![0, 3, 6, 9, 11, 14, 18, 19, 21, 22, 27, 29]);
}

#[test]
fn immediates_sign_extend_into_wide_destinations() {
    test_display(&[0x83, 0xc1, 0xff], "add ecx, 0xffffffff");
    test_display(&[0x66, 0x83, 0xc1, 0xff], "add cx, 0xffff");
    test_display(&[0x6b, 0xc0, 0xff], "imul eax, eax, 0xffffffff");
    test_display(&[0x80, 0xc1, 0xff], "add cl, 0xff");
    // a lone imm8 extends to the operand size
    test_display(&[0x6a, 0xff], "push 0xffffffff");
    test_display(&[0x66, 0x6a, 0xff], "push 0xffff");
    test_display(&[0x6a, 0x7f], "push 0x7f");
    test_display_under(InstDecoder::bits16(), &[0x6a, 0xff], "push 0xffff");
    test_display_under(InstDecoder::bits16(), &[0x66, 0x6a, 0x80], "push 0xffffff80");
    // shift counts are never extended
    test_display(&[0xc1, 0xe0, 0xff], "shl eax, 0xff");
}

#[test]
fn memory_forms() {
    test_display(&[0x8b, 0x45, 0xfc], "mov eax, [ebp-0x4]");
    test_display(&[0x8b, 0x04, 0x24], "mov eax, [esp]");
    test_display(&[0x8b, 0x04, 0x8d, 0x00, 0x10, 0x00, 0x00], "mov eax, [ecx*4+0x1000]");
    test_display(&[0x8b, 0x05, 0x78, 0x56, 0x34, 0x12], "mov eax, [0x12345678]");
    test_display(&[0xa1, 0x00, 0x10, 0x00, 0x00], "mov eax, [0x1000]");
    test_display(&[0xa2, 0x00, 0x10, 0x00, 0x00], "mov [0x1000], al");
    test_display(&[0xc7, 0x45, 0xfc, 0x01, 0x00, 0x00, 0x00], "mov [ebp-0x4], 0x1");
    test_display(&[0x8d, 0x84, 0x88, 0x00, 0x01, 0x00, 0x00], "lea eax, [eax+ecx*4+0x100]");
}

#[test]
fn segment_overrides() {
    test_display(&[0x64, 0xa1, 0x00, 0x00, 0x00, 0x00], "mov eax, fs:[0x0]");
    test_display(&[0x2e, 0x26, 0x8b, 0x00], "mov eax, es:[eax]");
    test_display(&[0x8c, 0xd8], "mov ax, ds");
    test_display(&[0x8e, 0xe0], "mov fs, ax");
}

#[test]
fn repeat_and_lock() {
    test_display(&[0xf3, 0xa4], "rep movsb");
    test_display(&[0xf2, 0xae], "repne scasb");
    test_display(&[0xf0, 0x0f, 0xb1, 0x0a], "lock cmpxchg [edx], ecx");
}

#[test]
fn sixteen_bit_addressing() {
    test_display(&[0x67, 0x8b, 0x00], "mov eax, [bx+si]");
    test_display(&[0x67, 0x8b, 0x06, 0x34, 0x12], "mov eax, [0x1234]");

    let decoder = InstDecoder::bits16();
    test_display_under(decoder, &[0x8b, 0x47, 0x02], "mov ax, [bx+0x2]");
    test_display_under(decoder, &[0x8b, 0x43, 0xfe], "mov ax, [bp+di-0x2]");
    test_display_under(decoder, &[0x8b, 0x86, 0x00, 0x01], "mov ax, [bp+0x100]");
    test_display_under(decoder, &[0x8b, 0x06, 0xfe, 0xff], "mov ax, [0xfffe]");
    test_display_under(decoder, &[0xa1, 0x00, 0x80], "mov ax, [0x8000]");
    test_display_under(decoder, &[0x66, 0x8b, 0x00], "mov eax, [bx+si]");
    test_display_under(decoder, &[0x66, 0x67, 0x8b, 0x00], "mov eax, [eax]");
    test_display_under(decoder, &[0xb8, 0x34, 0x12], "mov ax, 0x1234");
}

#[test]
fn branches() {
    test_display(&[0xe8, 0x10, 0x00, 0x00, 0x00], "call $+0x10");
    test_display(&[0xeb, 0xfe], "jmp $-0x2");
    test_display(&[0x74, 0x00], "je $+0x0");
    test_display(&[0x0f, 0x85, 0x00, 0xff, 0xff, 0xff], "jne $-0x100");
    test_display(&[0xff, 0xd0], "call eax");
    test_display(&[0xff, 0x25, 0x00, 0x20, 0x00, 0x00], "jmp [0x2000]");
    test_display_under(InstDecoder::bits16(), &[0xe9, 0xfd, 0xff], "jmp $-0x3");
}

#[test]
fn miscellany() {
    test_display(&[0x90], "nop");
    test_display(&[0xcd, 0x80], "int 0x80");
    test_display(&[0xd1, 0xe0], "shl eax, 0x1");
    test_display(&[0xd3, 0xf8], "sar eax, cl");
    test_display(&[0xe4, 0x60], "in al, 0x60");
    test_display(&[0xef], "out dx, eax");
    test_display(&[0x0f, 0xc9], "bswap ecx");
    test_display(&[0x93], "xchg ebx, eax");
    test_display(&[0x0f, 0x44, 0xc1], "cmove eax, ecx");
    test_display(&[0x0f, 0x94, 0xc0], "sete al");
    test_display(&[0x0f, 0xa4, 0xc2, 0x04], "shld edx, eax, 0x4");
    test_display(&[0x0f, 0xbf, 0xc1], "movsx eax, cx");
    test_display(&[0x0f, 0x38, 0xf0, 0x00], "movbe eax, [eax]");
    test_display(&[0xc8, 0x10, 0x00, 0x01], "enter 0x10, 0x1");
    test_display(&[0x0f, 0xa2], "cpuid");
}

#[test]
fn errors_render_as_bad() {
    let decoder = InstDecoder::bits32();
    for bytes in [&[0x0f][..], &[0x0f, 0xff][..], &[0x8d, 0xc0][..], &[0x8e, 0xf8][..], &[0x8b, 0x4d][..], &[][..]] {
        let inst = decoder.decode_slice(bytes);
        assert!(inst.is_error(), "{:02x?} should not decode", bytes);
        assert_eq!(inst.to_string(), "(bad)");
        assert_eq!(inst.render(), "(bad)");
        assert_eq!(inst.length(), 1);
    }
}
