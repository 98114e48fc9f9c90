//! Alpha AXP primary opcodes and per-format function codes.
//!
//! The primary opcode is the top 6 bits of every 32-bit instruction word and
//! selects the instruction format. Within the `Operate`, `FpOperate`,
//! `MemFunc` and `Vector` formats a secondary function code selects the
//! concrete operation; those codes live in [`funcs`].

use std::fmt;

/// Primary opcodes (bits [31:26] of the instruction word).
///
/// Only allocated opcodes appear here; anything else decodes to the
/// `Reserved` format and raises a reserved-instruction trap when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// CALL_PAL: privileged architecture library call
    CallPal = 0x00,

    /// Load address
    Lda = 0x08,
    /// Load address high (displacement shifted left 16)
    Ldah = 0x09,
    /// Load zero-extended byte
    Ldbu = 0x0A,
    /// Load unaligned quadword
    LdqU = 0x0B,
    /// Load zero-extended word
    Ldwu = 0x0C,
    /// Store word
    Stw = 0x0D,
    /// Store byte
    Stb = 0x0E,
    /// Store unaligned quadword
    StqU = 0x0F,

    /// Integer arithmetic (add/sub/cmp families)
    IntA = 0x10,
    /// Integer logical (and/or/xor/cmov families)
    IntL = 0x11,
    /// Integer shift and byte manipulation (ext/ins/msk/zap/shifts)
    IntS = 0x12,
    /// Integer multiply
    IntM = 0x13,
    /// Integer-to-FP register moves and square roots
    Itfp = 0x14,
    /// VAX floating point (F/G/D precision)
    FltV = 0x15,
    /// IEEE floating point (S/T precision)
    FltI = 0x16,
    /// FP operate common subset (copy-sign, FCMOV, FPCR moves, L/Q converts)
    FltL = 0x17,

    /// Memory format miscellany (barriers, RPCC, FETCH, RS/RC)
    Misc = 0x18,
    /// Computed jumps (JMP/JSR/RET/JSR_COROUTINE)
    Jsr = 0x1A,
    /// Integer vector extensions (sign-extend, counts, packed min/max, FP moves)
    Fpti = 0x1C,

    /// Load VAX F_floating
    Ldf = 0x20,
    /// Load VAX G_floating
    Ldg = 0x21,
    /// Load IEEE S_floating
    Lds = 0x22,
    /// Load IEEE T_floating
    Ldt = 0x23,
    /// Store VAX F_floating
    Stf = 0x24,
    /// Store VAX G_floating
    Stg = 0x25,
    /// Store IEEE S_floating
    Sts = 0x26,
    /// Store IEEE T_floating
    Stt = 0x27,

    /// Load sign-extended longword
    Ldl = 0x28,
    /// Load quadword
    Ldq = 0x29,
    /// Load longword locked
    LdlL = 0x2A,
    /// Load quadword locked
    LdqL = 0x2B,
    /// Store longword
    Stl = 0x2C,
    /// Store quadword
    Stq = 0x2D,
    /// Store longword conditional
    StlC = 0x2E,
    /// Store quadword conditional
    StqC = 0x2F,

    /// Unconditional branch
    Br = 0x30,
    /// FP branch if equal to zero
    Fbeq = 0x31,
    /// FP branch if less than zero
    Fblt = 0x32,
    /// FP branch if less than or equal to zero
    Fble = 0x33,
    /// Branch to subroutine
    Bsr = 0x34,
    /// FP branch if not equal to zero
    Fbne = 0x35,
    /// FP branch if greater than or equal to zero
    Fbge = 0x36,
    /// FP branch if greater than zero
    Fbgt = 0x37,
    /// Branch if low bit clear
    Blbc = 0x38,
    /// Branch if equal to zero
    Beq = 0x39,
    /// Branch if less than zero
    Blt = 0x3A,
    /// Branch if less than or equal to zero
    Ble = 0x3B,
    /// Branch if low bit set
    Blbs = 0x3C,
    /// Branch if not equal to zero
    Bne = 0x3D,
    /// Branch if greater than or equal to zero
    Bge = 0x3E,
    /// Branch if greater than zero
    Bgt = 0x3F,
}

impl Opcode {
    /// Numeric value of the primary opcode.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Decode the primary opcode field, returning `None` for unallocated
    /// slots (which the decoder maps to the `Reserved` format).
    pub fn from_primary(primary: u8) -> Option<Self> {
        Some(match primary {
            0x00 => Opcode::CallPal,
            0x08 => Opcode::Lda,
            0x09 => Opcode::Ldah,
            0x0A => Opcode::Ldbu,
            0x0B => Opcode::LdqU,
            0x0C => Opcode::Ldwu,
            0x0D => Opcode::Stw,
            0x0E => Opcode::Stb,
            0x0F => Opcode::StqU,
            0x10 => Opcode::IntA,
            0x11 => Opcode::IntL,
            0x12 => Opcode::IntS,
            0x13 => Opcode::IntM,
            0x14 => Opcode::Itfp,
            0x15 => Opcode::FltV,
            0x16 => Opcode::FltI,
            0x17 => Opcode::FltL,
            0x18 => Opcode::Misc,
            0x1A => Opcode::Jsr,
            0x1C => Opcode::Fpti,
            0x20 => Opcode::Ldf,
            0x21 => Opcode::Ldg,
            0x22 => Opcode::Lds,
            0x23 => Opcode::Ldt,
            0x24 => Opcode::Stf,
            0x25 => Opcode::Stg,
            0x26 => Opcode::Sts,
            0x27 => Opcode::Stt,
            0x28 => Opcode::Ldl,
            0x29 => Opcode::Ldq,
            0x2A => Opcode::LdlL,
            0x2B => Opcode::LdqL,
            0x2C => Opcode::Stl,
            0x2D => Opcode::Stq,
            0x2E => Opcode::StlC,
            0x2F => Opcode::StqC,
            0x30 => Opcode::Br,
            0x31 => Opcode::Fbeq,
            0x32 => Opcode::Fblt,
            0x33 => Opcode::Fble,
            0x34 => Opcode::Bsr,
            0x35 => Opcode::Fbne,
            0x36 => Opcode::Fbge,
            0x37 => Opcode::Fbgt,
            0x38 => Opcode::Blbc,
            0x39 => Opcode::Beq,
            0x3A => Opcode::Blt,
            0x3B => Opcode::Ble,
            0x3C => Opcode::Blbs,
            0x3D => Opcode::Bne,
            0x3E => Opcode::Bge,
            0x3F => Opcode::Bgt,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, self.value())
    }
}

/// Function codes within the multi-operation formats.
///
/// `Operate` and `Vector` function codes are the 7-bit field at bits [11:5];
/// `MemFunc` codes are the 16-bit displacement field; `Jsr` codes are bits
/// [15:14] of the displacement field.
pub mod funcs {
    // Integer arithmetic, primary 0x10.
    pub const ADDL: u8 = 0x00;
    pub const S4ADDL: u8 = 0x02;
    pub const SUBL: u8 = 0x09;
    pub const S4SUBL: u8 = 0x0B;
    pub const CMPBGE: u8 = 0x0F;
    pub const S8ADDL: u8 = 0x12;
    pub const S8SUBL: u8 = 0x1B;
    pub const CMPULT: u8 = 0x1D;
    pub const ADDQ: u8 = 0x20;
    pub const S4ADDQ: u8 = 0x22;
    pub const SUBQ: u8 = 0x29;
    pub const S4SUBQ: u8 = 0x2B;
    pub const CMPEQ: u8 = 0x2D;
    pub const S8ADDQ: u8 = 0x32;
    pub const S8SUBQ: u8 = 0x3B;
    pub const CMPULE: u8 = 0x3D;
    pub const ADDL_V: u8 = 0x40;
    pub const SUBL_V: u8 = 0x49;
    pub const CMPLT: u8 = 0x4D;
    pub const ADDQ_V: u8 = 0x60;
    pub const SUBQ_V: u8 = 0x69;
    pub const CMPLE: u8 = 0x6D;

    // Integer logical, primary 0x11.
    pub const AND: u8 = 0x00;
    pub const BIC: u8 = 0x08;
    pub const CMOVLBS: u8 = 0x14;
    pub const CMOVLBC: u8 = 0x16;
    pub const BIS: u8 = 0x20;
    pub const CMOVEQ: u8 = 0x24;
    pub const CMOVNE: u8 = 0x26;
    pub const ORNOT: u8 = 0x28;
    pub const XOR: u8 = 0x40;
    pub const CMOVLT: u8 = 0x44;
    pub const CMOVGE: u8 = 0x46;
    pub const EQV: u8 = 0x48;
    pub const AMASK: u8 = 0x61;
    pub const CMOVLE: u8 = 0x64;
    pub const CMOVGT: u8 = 0x66;
    pub const IMPLVER: u8 = 0x6C;

    // Shift and byte manipulation, primary 0x12.
    pub const MSKBL: u8 = 0x02;
    pub const EXTBL: u8 = 0x06;
    pub const INSBL: u8 = 0x0B;
    pub const MSKWL: u8 = 0x12;
    pub const EXTWL: u8 = 0x16;
    pub const INSWL: u8 = 0x1B;
    pub const MSKLL: u8 = 0x22;
    pub const EXTLL: u8 = 0x26;
    pub const INSLL: u8 = 0x2B;
    pub const ZAP: u8 = 0x30;
    pub const ZAPNOT: u8 = 0x31;
    pub const MSKQL: u8 = 0x32;
    pub const SRL: u8 = 0x34;
    pub const EXTQL: u8 = 0x36;
    pub const SLL: u8 = 0x39;
    pub const INSQL: u8 = 0x3B;
    pub const SRA: u8 = 0x3C;
    pub const MSKWH: u8 = 0x52;
    pub const INSWH: u8 = 0x57;
    pub const EXTWH: u8 = 0x5A;
    pub const MSKLH: u8 = 0x62;
    pub const INSLH: u8 = 0x67;
    pub const EXTLH: u8 = 0x6A;
    pub const MSKQH: u8 = 0x72;
    pub const INSQH: u8 = 0x77;
    pub const EXTQH: u8 = 0x7A;

    // Integer multiply, primary 0x13.
    pub const MULL: u8 = 0x00;
    pub const MULQ: u8 = 0x20;
    pub const UMULH: u8 = 0x30;
    pub const MULL_V: u8 = 0x40;
    pub const MULQ_V: u8 = 0x60;

    // Integer vector extensions, primary 0x1C.
    pub const SEXTB: u8 = 0x00;
    pub const SEXTW: u8 = 0x01;
    pub const CTPOP: u8 = 0x30;
    pub const PERR: u8 = 0x31;
    pub const CTLZ: u8 = 0x32;
    pub const CTTZ: u8 = 0x33;
    pub const UNPKBW: u8 = 0x34;
    pub const UNPKBL: u8 = 0x35;
    pub const PKWB: u8 = 0x36;
    pub const PKLB: u8 = 0x37;
    pub const MINSB8: u8 = 0x38;
    pub const MINSW4: u8 = 0x39;
    pub const MINUB8: u8 = 0x3A;
    pub const MINUW4: u8 = 0x3B;
    pub const MAXUB8: u8 = 0x3C;
    pub const MAXUW4: u8 = 0x3D;
    pub const MAXSB8: u8 = 0x3E;
    pub const MAXSW4: u8 = 0x3F;
    pub const FTOIT: u8 = 0x70;
    pub const FTOIS: u8 = 0x78;

    // FP operate common subset, primary 0x17 (full 11-bit codes).
    pub const CVTLQ: u16 = 0x010;
    pub const CPYS: u16 = 0x020;
    pub const CPYSN: u16 = 0x021;
    pub const CPYSE: u16 = 0x022;
    pub const MT_FPCR: u16 = 0x024;
    pub const MF_FPCR: u16 = 0x025;
    pub const FCMOVEQ: u16 = 0x02A;
    pub const FCMOVNE: u16 = 0x02B;
    pub const FCMOVLT: u16 = 0x02C;
    pub const FCMOVGE: u16 = 0x02D;
    pub const FCMOVLE: u16 = 0x02E;
    pub const FCMOVGT: u16 = 0x02F;
    pub const CVTQL: u16 = 0x030;

    // Memory miscellany, primary 0x18 (16-bit function field).
    pub const TRAPB: u16 = 0x0000;
    pub const EXCB: u16 = 0x0400;
    pub const MB: u16 = 0x4000;
    pub const WMB: u16 = 0x4400;
    pub const FETCH: u16 = 0x8000;
    pub const FETCH_M: u16 = 0xA000;
    pub const RPCC: u16 = 0xC000;
    pub const RC: u16 = 0xE000;
    pub const ECB: u16 = 0xE800;
    pub const RS: u16 = 0xF000;
    pub const WH64: u16 = 0xF800;

    // Computed jumps, primary 0x1A (bits [15:14] of the displacement).
    pub const JMP: u8 = 0;
    pub const JSR: u8 = 1;
    pub const RET: u8 = 2;
    pub const JSR_COROUTINE: u8 = 3;
}
