//! The total instruction decoder.
//!
//! Decoding is a pure function over the 32-bit word: the primary opcode
//! (top 6 bits) selects the format, and the format's `decode` extracts the
//! fields. Every word maps to some `Decoded` value; unallocated primary
//! opcodes map to `Decoded::Reserved` and the execution loop raises the
//! reserved-instruction trap when one reaches dispatch.

use crate::formats::{Branch, Decoded, FpOperate, MemFunc, MemRef, Operate, Pal};
use crate::opcodes::Opcode;

/// Decode one instruction word.
pub fn decode(word: u32) -> Decoded {
    let primary = (word >> 26) as u8;
    let Some(op) = Opcode::from_primary(primary) else {
        return Decoded::Reserved(word);
    };

    match op {
        Opcode::CallPal => Decoded::Pal(Pal::decode(word)),

        Opcode::Lda
        | Opcode::Ldah
        | Opcode::Ldbu
        | Opcode::LdqU
        | Opcode::Ldwu
        | Opcode::Stw
        | Opcode::Stb
        | Opcode::StqU
        | Opcode::Jsr
        | Opcode::Ldf
        | Opcode::Ldg
        | Opcode::Lds
        | Opcode::Ldt
        | Opcode::Stf
        | Opcode::Stg
        | Opcode::Sts
        | Opcode::Stt
        | Opcode::Ldl
        | Opcode::Ldq
        | Opcode::LdlL
        | Opcode::LdqL
        | Opcode::Stl
        | Opcode::Stq
        | Opcode::StlC
        | Opcode::StqC => Decoded::MemRef(MemRef::decode(op, word)),

        Opcode::Misc => Decoded::MemFunc(MemFunc::decode(op, word)),

        Opcode::IntA | Opcode::IntL | Opcode::IntS | Opcode::IntM => {
            Decoded::Operate(Operate::decode(op, word))
        }

        Opcode::Fpti => Decoded::Vector(Operate::decode(op, word)),

        Opcode::Itfp | Opcode::FltV | Opcode::FltI | Opcode::FltL => {
            Decoded::FpOperate(FpOperate::decode(op, word))
        }

        Opcode::Br
        | Opcode::Fbeq
        | Opcode::Fblt
        | Opcode::Fble
        | Opcode::Bsr
        | Opcode::Fbne
        | Opcode::Fbge
        | Opcode::Fbgt
        | Opcode::Blbc
        | Opcode::Beq
        | Opcode::Blt
        | Opcode::Ble
        | Opcode::Blbs
        | Opcode::Bne
        | Opcode::Bge
        | Opcode::Bgt => Decoded::Branch(Branch::decode(op, word)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::InstrFormat;

    #[test]
    fn decode_is_total_and_round_trips() {
        // A spread of words covering every primary opcode plus the
        // reserved slots; encode(decode(w)) must reproduce w exactly.
        let mut words = Vec::new();
        for primary in 0u32..64 {
            words.push(primary << 26);
            words.push((primary << 26) | 0x03FF_FFFF);
            words.push((primary << 26) | 0x0155_5555);
            words.push((primary << 26) | 0x02AA_AAAA);
        }
        for word in words {
            let decoded = decode(word);
            assert_eq!(decoded.encode(), word, "word {word:#010x}");
        }
    }

    #[test]
    fn formats_by_primary() {
        assert_eq!(decode(0x0000_0083).format(), InstrFormat::Pal);
        // LDA R1, 0x100(R0)
        assert_eq!(decode(0x2020_0100).format(), InstrFormat::MemRef);
        // ADDQ R2, R3, R4
        assert_eq!(decode(0x4043_0404).format(), InstrFormat::Operate);
        // ADDT F1, F2, F3
        assert_eq!(decode(0x5822_1403).format(), InstrFormat::FpOperate);
        // BNE R5, -1
        assert_eq!(decode(0xF4BF_FFFF).format(), InstrFormat::Branch);
        // MB
        assert_eq!(decode(0x6000_4000).format(), InstrFormat::MemFunc);
        // SEXTB under the vector-extension primary
        assert_eq!(decode(0x73E1_0001).format(), InstrFormat::Vector);
        // Unallocated primary 0x07
        assert_eq!(decode(0x1C00_0000).format(), InstrFormat::Reserved);
    }
}
