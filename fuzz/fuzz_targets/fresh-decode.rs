//! decoding into a pre-existing instruction should not result in different outcomes compared to
//! decoding into a fresh instruction, whether or not decoding succeeds.

#![no_main]
use libfuzzer_sys::fuzz_target;

use yaxpeax_arch::Decoder;

fuzz_target!(|data: &[u8]| {

    let decoders = [
        yaxpeax_ia32::InstDecoder::bits16(),
        yaxpeax_ia32::InstDecoder::bits32(),
    ];

    let mut reused_inst = yaxpeax_ia32::Instruction::default();

    for decoder in decoders {
        let mut words = yaxpeax_arch::U8Reader::new(data);
        let res = decoder.decode_into(&mut reused_inst, &mut words);
        let fresh_inst = decoder.decode_slice(data);
        assert_eq!(res.is_err(), fresh_inst.is_error());
        assert_eq!(reused_inst, fresh_inst);
    }
});
