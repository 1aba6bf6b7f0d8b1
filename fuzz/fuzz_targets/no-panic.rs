#![no_main]
use libfuzzer_sys::fuzz_target;

use std::fmt::Write;

fuzz_target!(|data: &[u8]| {

    let decoders = [
        yaxpeax_ia32::InstDecoder::bits16(),
        yaxpeax_ia32::InstDecoder::bits32(),
    ];

    for decoder in decoders {
        // never fails, but should not panic either
        for (_offset, inst) in decoder.disassemble(data) {
            assert!(inst.length() >= 1);
            write!(&mut String::new(), "{}", inst).expect("formatting does not panic either");
        }
    }
});
