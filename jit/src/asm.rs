//! The x86-64 assembler.
//!
//! An append-only code buffer with byte-level emission for host code and
//! bit-level emission for composing guest instruction words in test
//! fixtures, plus the label/fixup machinery the emitters hang branches on.
//!
//! REX and ModR/M construction is centralized in [`encode_rex`] and
//! [`encode_modrm`]; no emitter open-codes a prefix byte. Every helper
//! below emits one host instruction in the 64-bit operand form the JIT
//! works in.

use thiserror::Error;

use crate::regs::{Cc, Gpr, Xmm};

/// Assembler failures. These are core bugs, not guest-visible conditions;
/// the execution loop treats them as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("label {0} referenced but never bound")]
    UnresolvedLabel(u32),
}

/// A label identifier allocated by [`Assembler::create_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

/// Encode a REX prefix from the W/R/X/B extension bits.
#[inline]
pub fn encode_rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | (b as u8)
}

/// Encode a ModR/M byte.
#[inline]
pub fn encode_modrm(m0d: u8, reg: u8, rm: u8) -> u8 {
    debug_assert!(m0d < 4);
    debug_assert!(reg < 8);
    debug_assert!(rm < 8);
    (m0d << 6) | (reg << 3) | rm
}

/// The append-only code buffer with labels and pending fixups.
pub struct Assembler {
    buf: Vec<u8>,
    /// Label id to bound offset, once bound.
    labels: Vec<Option<usize>>,
    /// (rel32 window offset, label) pairs awaiting a bind.
    fixups: Vec<(usize, Label)>,
    /// Bit-emission accumulator, LSB first.
    bit_acc: u32,
    bit_count: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { buf: Vec::new(), labels: Vec::new(), fixups: Vec::new(), bit_acc: 0, bit_count: 0 }
    }

    /// Bytes emitted so far.
    pub fn code_size(&self) -> usize {
        self.buf.len()
    }

    /// Finished code. Call [`Assembler::resolve_fixups`] first.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    // --- raw emission ---------------------------------------------------

    #[inline]
    pub fn put1(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    #[inline]
    pub fn put2(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put4(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put8(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append `count` bits of `value`, LSB first. Whole bytes are flushed
    /// to the buffer as they fill; [`Assembler::align_bits`] pads the
    /// remainder. Used to compose guest instruction words in fixtures.
    pub fn put_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32);
        let mask = if count == 32 { u64::MAX } else { (1u64 << count) - 1 };
        let mut acc = self.bit_acc as u64 | ((value as u64 & mask) << self.bit_count);
        let mut total = self.bit_count + count;
        while total >= 8 {
            self.buf.push(acc as u8);
            acc >>= 8;
            total -= 8;
        }
        self.bit_acc = acc as u32;
        self.bit_count = total;
    }

    /// Flush a partial bit-emission byte, zero padded.
    pub fn align_bits(&mut self) {
        if self.bit_count > 0 {
            self.buf.push(self.bit_acc as u8);
            self.bit_acc = 0;
            self.bit_count = 0;
        }
    }

    // --- labels and fixups ----------------------------------------------

    /// Allocate a fresh, unbound label.
    pub fn create_label(&mut self) -> Label {
        let id = self.labels.len() as u32;
        self.labels.push(None);
        Label(id)
    }

    /// Bind `label` to the current offset and patch every fixup pending
    /// against it.
    pub fn bind_label(&mut self, label: Label) {
        let target = self.buf.len();
        debug_assert!(
            self.labels[label.0 as usize].is_none(),
            "label {} bound twice",
            label.0
        );
        self.labels[label.0 as usize] = Some(target);

        let mut i = 0;
        while i < self.fixups.len() {
            if self.fixups[i].1 == label {
                let (offset, _) = self.fixups.swap_remove(i);
                self.patch_rel32(offset, target);
            } else {
                i += 1;
            }
        }
    }

    /// Reserve a rel32 window referring to `label`. If the label is
    /// already bound the displacement is written immediately; otherwise
    /// four zero bytes are reserved and a fixup recorded.
    pub fn emit_label_ref(&mut self, label: Label) {
        match self.labels[label.0 as usize] {
            Some(target) => {
                let offset = self.buf.len();
                self.put4(0);
                self.patch_rel32(offset, target);
            }
            None => {
                self.fixups.push((self.buf.len(), label));
                self.put4(0);
            }
        }
    }

    /// Verify no fixup is left against an unbound label.
    pub fn resolve_fixups(&self) -> Result<(), AsmError> {
        match self.fixups.first() {
            None => Ok(()),
            Some(&(_, label)) => Err(AsmError::UnresolvedLabel(label.0)),
        }
    }

    /// rel32 is measured from the end of the 4-byte window.
    fn patch_rel32(&mut self, offset: usize, target: usize) {
        debug_assert!(offset + 4 <= self.buf.len());
        let rel = target as i64 - (offset as i64 + 4);
        self.buf[offset..offset + 4].copy_from_slice(&(rel as i32).to_le_bytes());
    }

    // --- prefixes and addressing ----------------------------------------

    /// REX.W with extension bits taken from the reg-field and rm-field
    /// operands.
    fn rex_w(&mut self, reg_ext: bool, rm_ext: bool) {
        self.put1(encode_rex(true, reg_ext, false, rm_ext));
    }

    /// Optional REX (no W) for 32-bit or 8-bit forms.
    fn rex_opt(&mut self, reg_ext: bool, rm_ext: bool, force: bool) {
        if reg_ext || rm_ext || force {
            self.put1(encode_rex(false, reg_ext, false, rm_ext));
        }
    }

    /// ModR/M (+SIB, +disp) for a register-direct rm operand.
    fn modrm_reg(&mut self, reg_low3: u8, rm: u8) {
        self.put1(encode_modrm(0b11, reg_low3, rm));
    }

    /// ModR/M (+SIB, +disp) for a `[base + disp]` rm operand.
    fn modrm_mem(&mut self, reg_low3: u8, base: Gpr, disp: i32) {
        let base3 = base.low3();
        // RSP-class bases need a SIB byte; RBP-class bases cannot use the
        // no-displacement mod.
        let m0d = if disp == 0 && base3 != 5 {
            0b00
        } else if (-128..=127).contains(&disp) {
            0b01
        } else {
            0b10
        };
        self.put1(encode_modrm(m0d, reg_low3, base3));
        if base3 == 4 {
            self.put1(0x24);
        }
        match m0d {
            0b01 => self.put1(disp as i8 as u8),
            0b10 => self.put4(disp as u32),
            _ => {}
        }
    }

    // --- 64-bit register/register ALU -----------------------------------

    fn alu_rr(&mut self, opcode: u8, src: Gpr, dst: Gpr) {
        self.rex_w(src.is_extended(), dst.is_extended());
        self.put1(opcode);
        self.modrm_reg(src.low3(), dst.low3());
    }

    pub fn mov_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x89, src, dst);
    }

    pub fn add_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x01, src, dst);
    }

    pub fn sub_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x29, src, dst);
    }

    pub fn and_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x21, src, dst);
    }

    pub fn or_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x09, src, dst);
    }

    pub fn xor_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x31, src, dst);
    }

    pub fn cmp_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x39, src, dst);
    }

    pub fn test_rr(&mut self, dst: Gpr, src: Gpr) {
        self.alu_rr(0x85, src, dst);
    }

    /// 32-bit test, for values produced in EAX by extern calls.
    pub fn test_rr32(&mut self, dst: Gpr, src: Gpr) {
        self.rex_opt(src.is_extended(), dst.is_extended(), false);
        self.put1(0x85);
        self.modrm_reg(src.low3(), dst.low3());
    }

    /// 32-bit add, for longword-width flags.
    pub fn add_rr32(&mut self, dst: Gpr, src: Gpr) {
        self.rex_opt(src.is_extended(), dst.is_extended(), false);
        self.put1(0x01);
        self.modrm_reg(src.low3(), dst.low3());
    }

    /// 32-bit sub.
    pub fn sub_rr32(&mut self, dst: Gpr, src: Gpr) {
        self.rex_opt(src.is_extended(), dst.is_extended(), false);
        self.put1(0x29);
        self.modrm_reg(src.low3(), dst.low3());
    }

    /// 32-bit imul (two-operand).
    pub fn imul_rr32(&mut self, dst: Gpr, src: Gpr) {
        self.rex_opt(dst.is_extended(), src.is_extended(), false);
        self.put1(0x0F);
        self.put1(0xAF);
        self.modrm_reg(dst.low3(), src.low3());
    }

    pub fn not_r(&mut self, r: Gpr) {
        self.rex_w(false, r.is_extended());
        self.put1(0xF7);
        self.modrm_reg(2, r.low3());
    }

    pub fn neg_r(&mut self, r: Gpr) {
        self.rex_w(false, r.is_extended());
        self.put1(0xF7);
        self.modrm_reg(3, r.low3());
    }

    /// Zero a register via the 32-bit xor idiom.
    pub fn zero_r(&mut self, r: Gpr) {
        self.rex_opt(r.is_extended(), r.is_extended(), false);
        self.put1(0x31);
        self.modrm_reg(r.low3(), r.low3());
    }

    // --- immediates ------------------------------------------------------

    /// mov r64, imm64.
    pub fn mov_ri64(&mut self, dst: Gpr, imm: u64) {
        self.put1(encode_rex(true, false, false, dst.is_extended()));
        self.put1(0xB8 + dst.low3());
        self.put8(imm);
    }

    /// mov r32, imm32, zero-extended.
    pub fn mov_ri32(&mut self, dst: Gpr, imm: u32) {
        self.rex_opt(false, dst.is_extended(), false);
        self.put1(0xB8 + dst.low3());
        self.put4(imm);
    }

    fn alu_ri(&mut self, ext: u8, dst: Gpr, imm: i32) {
        self.rex_w(false, dst.is_extended());
        self.put1(0x81);
        self.modrm_reg(ext, dst.low3());
        self.put4(imm as u32);
    }

    pub fn add_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(0, dst, imm);
    }

    pub fn sub_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(5, dst, imm);
    }

    pub fn and_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(4, dst, imm);
    }

    pub fn or_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(1, dst, imm);
    }

    pub fn xor_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(6, dst, imm);
    }

    pub fn cmp_ri(&mut self, dst: Gpr, imm: i32) {
        self.alu_ri(7, dst, imm);
    }

    // --- shifts ----------------------------------------------------------

    fn shift_ri(&mut self, ext: u8, dst: Gpr, amount: u8) {
        self.rex_w(false, dst.is_extended());
        self.put1(0xC1);
        self.modrm_reg(ext, dst.low3());
        self.put1(amount & 63);
    }

    pub fn shl_ri(&mut self, dst: Gpr, amount: u8) {
        self.shift_ri(4, dst, amount);
    }

    pub fn shr_ri(&mut self, dst: Gpr, amount: u8) {
        self.shift_ri(5, dst, amount);
    }

    pub fn sar_ri(&mut self, dst: Gpr, amount: u8) {
        self.shift_ri(7, dst, amount);
    }

    fn shift_cl(&mut self, ext: u8, dst: Gpr) {
        self.rex_w(false, dst.is_extended());
        self.put1(0xD3);
        self.modrm_reg(ext, dst.low3());
    }

    /// Shift left by CL.
    pub fn shl_cl(&mut self, dst: Gpr) {
        self.shift_cl(4, dst);
    }

    /// Logical shift right by CL.
    pub fn shr_cl(&mut self, dst: Gpr) {
        self.shift_cl(5, dst);
    }

    /// Arithmetic shift right by CL.
    pub fn sar_cl(&mut self, dst: Gpr) {
        self.shift_cl(7, dst);
    }

    // --- extensions, counts, conditional ops ------------------------------

    /// movzx r64, r/m8.
    pub fn movzx_b(&mut self, dst: Gpr, src: Gpr) {
        self.rex_w(dst.is_extended(), src.is_extended());
        self.put1(0x0F);
        self.put1(0xB6);
        self.modrm_reg(dst.low3(), src.low3());
    }

    /// movsxd r64, r/m32: sign-extend the low longword.
    pub fn movsxd(&mut self, dst: Gpr, src: Gpr) {
        self.rex_w(dst.is_extended(), src.is_extended());
        self.put1(0x63);
        self.modrm_reg(dst.low3(), src.low3());
    }

    pub fn cmovcc(&mut self, cc: Cc, dst: Gpr, src: Gpr) {
        self.rex_w(dst.is_extended(), src.is_extended());
        self.put1(0x0F);
        self.put1(0x40 + cc.nibble());
        self.modrm_reg(dst.low3(), src.low3());
    }

    /// setcc on the low byte of `dst`. The REX prefix is forced for the
    /// SPL/BPL/SIL/DIL encodings.
    pub fn setcc(&mut self, cc: Cc, dst: Gpr) {
        self.rex_opt(false, dst.is_extended(), dst.low3() >= 4 && !dst.is_extended());
        self.put1(0x0F);
        self.put1(0x90 + cc.nibble());
        self.modrm_reg(0, dst.low3());
    }

    fn f3_0f_rr(&mut self, opcode: u8, dst: Gpr, src: Gpr) {
        self.put1(0xF3);
        self.rex_w(dst.is_extended(), src.is_extended());
        self.put1(0x0F);
        self.put1(opcode);
        self.modrm_reg(dst.low3(), src.low3());
    }

    pub fn lzcnt(&mut self, dst: Gpr, src: Gpr) {
        self.f3_0f_rr(0xBD, dst, src);
    }

    pub fn tzcnt(&mut self, dst: Gpr, src: Gpr) {
        self.f3_0f_rr(0xBC, dst, src);
    }

    pub fn popcnt(&mut self, dst: Gpr, src: Gpr) {
        self.f3_0f_rr(0xB8, dst, src);
    }

    // --- multiplies -------------------------------------------------------

    /// Two-operand signed multiply, low 64 bits.
    pub fn imul_rr(&mut self, dst: Gpr, src: Gpr) {
        self.rex_w(dst.is_extended(), src.is_extended());
        self.put1(0x0F);
        self.put1(0xAF);
        self.modrm_reg(dst.low3(), src.low3());
    }

    /// Unsigned RDX:RAX = RAX * r.
    pub fn mul_r(&mut self, src: Gpr) {
        self.rex_w(false, src.is_extended());
        self.put1(0xF7);
        self.modrm_reg(4, src.low3());
    }

    /// Signed RDX:RAX = RAX * r.
    pub fn imul_r(&mut self, src: Gpr) {
        self.rex_w(false, src.is_extended());
        self.put1(0xF7);
        self.modrm_reg(5, src.low3());
    }

    // --- loads and stores -------------------------------------------------

    /// mov r64, [base + disp].
    pub fn load(&mut self, dst: Gpr, base: Gpr, disp: i32) {
        self.rex_w(dst.is_extended(), base.is_extended());
        self.put1(0x8B);
        self.modrm_mem(dst.low3(), base, disp);
    }

    /// mov [base + disp], r64.
    pub fn store(&mut self, base: Gpr, disp: i32, src: Gpr) {
        self.rex_w(src.is_extended(), base.is_extended());
        self.put1(0x89);
        self.modrm_mem(src.low3(), base, disp);
    }

    /// lea r64, [base + disp].
    pub fn lea(&mut self, dst: Gpr, base: Gpr, disp: i32) {
        self.rex_w(dst.is_extended(), base.is_extended());
        self.put1(0x8D);
        self.modrm_mem(dst.low3(), base, disp);
    }

    // --- scalar and packed SSE --------------------------------------------

    fn sse_rr(&mut self, prefix: Option<u8>, opcode: u8, reg_ext: bool, reg3: u8, rm_ext: bool, rm3: u8) {
        if let Some(p) = prefix {
            self.put1(p);
        }
        self.rex_opt(reg_ext, rm_ext, false);
        self.put1(0x0F);
        self.put1(opcode);
        self.modrm_reg(reg3, rm3);
    }

    /// movq xmm, r64.
    pub fn movq_xr(&mut self, dst: Xmm, src: Gpr) {
        self.put1(0x66);
        self.put1(encode_rex(true, dst.is_extended(), false, src.is_extended()));
        self.put1(0x0F);
        self.put1(0x6E);
        self.modrm_reg(dst.low3(), src.low3());
    }

    /// movq r64, xmm.
    pub fn movq_rx(&mut self, dst: Gpr, src: Xmm) {
        self.put1(0x66);
        self.put1(encode_rex(true, src.is_extended(), false, dst.is_extended()));
        self.put1(0x0F);
        self.put1(0x7E);
        self.modrm_reg(src.low3(), dst.low3());
    }

    fn scalar_sd(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF2), opcode, dst.is_extended(), dst.low3(), src.is_extended(), src.low3());
    }

    fn scalar_ss(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0xF3), opcode, dst.is_extended(), dst.low3(), src.is_extended(), src.low3());
    }

    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x58, dst, src);
    }

    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x5C, dst, src);
    }

    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x59, dst, src);
    }

    pub fn divsd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x5E, dst, src);
    }

    pub fn sqrtsd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x51, dst, src);
    }

    pub fn movsd_xx(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x10, dst, src);
    }

    pub fn addss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x58, dst, src);
    }

    pub fn subss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x5C, dst, src);
    }

    pub fn mulss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x59, dst, src);
    }

    pub fn divss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x5E, dst, src);
    }

    pub fn sqrtss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x51, dst, src);
    }

    /// cvtss2sd xmm, xmm.
    pub fn cvtss2sd(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_ss(0x5A, dst, src);
    }

    /// cvtsd2ss xmm, xmm.
    pub fn cvtsd2ss(&mut self, dst: Xmm, src: Xmm) {
        self.scalar_sd(0x5A, dst, src);
    }

    /// cvtsi2sd xmm, r64.
    pub fn cvtsi2sd(&mut self, dst: Xmm, src: Gpr) {
        self.put1(0xF2);
        self.put1(encode_rex(true, dst.is_extended(), false, src.is_extended()));
        self.put1(0x0F);
        self.put1(0x2A);
        self.modrm_reg(dst.low3(), src.low3());
    }

    /// cvttsd2si r64, xmm (truncating).
    pub fn cvttsd2si(&mut self, dst: Gpr, src: Xmm) {
        self.put1(0xF2);
        self.put1(encode_rex(true, dst.is_extended(), false, src.is_extended()));
        self.put1(0x0F);
        self.put1(0x2C);
        self.modrm_reg(dst.low3(), src.low3());
    }

    fn packed_66(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.sse_rr(Some(0x66), opcode, dst.is_extended(), dst.low3(), src.is_extended(), src.low3());
    }

    /// Packed unsigned byte minimum.
    pub fn pminub(&mut self, dst: Xmm, src: Xmm) {
        self.packed_66(0xDA, dst, src);
    }

    /// Packed byte equality compare.
    pub fn pcmpeqb(&mut self, dst: Xmm, src: Xmm) {
        self.packed_66(0x74, dst, src);
    }

    /// Byte-mask extraction into a GPR.
    pub fn pmovmskb(&mut self, dst: Gpr, src: Xmm) {
        self.put1(0x66);
        self.rex_opt(dst.is_extended(), src.is_extended(), false);
        self.put1(0x0F);
        self.put1(0xD7);
        self.modrm_reg(dst.low3(), src.low3());
    }

    // --- control flow -----------------------------------------------------

    /// jcc rel32 to a label.
    pub fn jcc(&mut self, cc: Cc, label: Label) {
        self.put1(0x0F);
        self.put1(0x80 + cc.nibble());
        self.emit_label_ref(label);
    }

    /// jmp rel32 to a label.
    pub fn jmp(&mut self, label: Label) {
        self.put1(0xE9);
        self.emit_label_ref(label);
    }

    /// call through a register.
    pub fn call_r(&mut self, target: Gpr) {
        self.rex_opt(false, target.is_extended(), false);
        self.put1(0xFF);
        self.modrm_reg(2, target.low3());
    }

    /// call through a `[base + disp]` slot.
    pub fn call_m(&mut self, base: Gpr, disp: i32) {
        self.rex_opt(false, base.is_extended(), false);
        self.put1(0xFF);
        self.modrm_mem(2, base, disp);
    }

    pub fn push_r(&mut self, r: Gpr) {
        self.rex_opt(false, r.is_extended(), false);
        self.put1(0x50 + r.low3());
    }

    pub fn pop_r(&mut self, r: Gpr) {
        self.rex_opt(false, r.is_extended(), false);
        self.put1(0x58 + r.low3());
    }

    /// sub rsp, imm8.
    pub fn sub_rsp8(&mut self, imm: u8) {
        self.put1(encode_rex(true, false, false, false));
        self.put1(0x83);
        self.modrm_reg(5, Gpr::Rsp.low3());
        self.put1(imm);
    }

    /// add rsp, imm8.
    pub fn add_rsp8(&mut self, imm: u8) {
        self.put1(encode_rex(true, false, false, false));
        self.put1(0x83);
        self.modrm_reg(0, Gpr::Rsp.low3());
        self.put1(imm);
    }

    pub fn ret(&mut self) {
        self.put1(0xC3);
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(f: impl FnOnce(&mut Assembler)) -> Vec<u8> {
        let mut asm = Assembler::new();
        f(&mut asm);
        asm.into_bytes()
    }

    #[test]
    fn rex_and_modrm_construction() {
        assert_eq!(encode_rex(true, false, false, false), 0x48);
        assert_eq!(encode_rex(true, false, false, true), 0x49);
        assert_eq!(encode_rex(false, true, false, true), 0x45);
        assert_eq!(encode_modrm(0b11, 1, 0), 0xC8);
        assert_eq!(encode_modrm(0b01, 0, 7), 0x47);
    }

    #[test]
    fn alu_encodings() {
        assert_eq!(bytes_of(|a| a.mov_rr(Gpr::Rax, Gpr::Rcx)), [0x48, 0x89, 0xC8]);
        assert_eq!(bytes_of(|a| a.add_rr(Gpr::Rax, Gpr::Rcx)), [0x48, 0x01, 0xC8]);
        assert_eq!(bytes_of(|a| a.sub_rr(Gpr::R8, Gpr::Rax)), [0x49, 0x29, 0xC0]);
        assert_eq!(bytes_of(|a| a.test_rr(Gpr::Rax, Gpr::Rax)), [0x48, 0x85, 0xC0]);
        assert_eq!(bytes_of(|a| a.not_r(Gpr::Rax)), [0x48, 0xF7, 0xD0]);
        assert_eq!(bytes_of(|a| a.neg_r(Gpr::Rax)), [0x48, 0xF7, 0xD8]);
        assert_eq!(bytes_of(|a| a.zero_r(Gpr::Rax)), [0x31, 0xC0]);
    }

    #[test]
    fn memory_encodings() {
        // mov rax, [r15 + 0x10]
        assert_eq!(bytes_of(|a| a.load(Gpr::Rax, Gpr::R15, 0x10)), [0x49, 0x8B, 0x47, 0x10]);
        // mov [r15], rax: no displacement needed for r15 (low3 = 7)
        assert_eq!(bytes_of(|a| a.store(Gpr::R15, 0, Gpr::Rax)), [0x49, 0x89, 0x07]);
        // mov [r13], rax: RBP-class base forces a zero disp8
        assert_eq!(bytes_of(|a| a.store(Gpr::R13, 0, Gpr::Rax)), [0x49, 0x89, 0x45, 0x00]);
        // mov [rsp + 8], rax: SIB byte
        assert_eq!(bytes_of(|a| a.store(Gpr::Rsp, 8, Gpr::Rax)), [0x48, 0x89, 0x44, 0x24, 0x08]);
        // disp32 form
        assert_eq!(
            bytes_of(|a| a.load(Gpr::Rcx, Gpr::R14, 0x118)),
            [0x49, 0x8B, 0x8E, 0x18, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn immediate_and_shift_encodings() {
        assert_eq!(
            bytes_of(|a| a.mov_ri64(Gpr::Rax, 0x1122_3344_5566_7788)),
            [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(bytes_of(|a| a.shl_ri(Gpr::Rax, 5)), [0x48, 0xC1, 0xE0, 0x05]);
        assert_eq!(bytes_of(|a| a.sar_ri(Gpr::Rcx, 63)), [0x48, 0xC1, 0xF9, 0x3F]);
        assert_eq!(
            bytes_of(|a| a.and_ri(Gpr::Rax, 0xFF)),
            [0x48, 0x81, 0xE0, 0xFF, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn conditional_and_count_encodings() {
        assert_eq!(bytes_of(|a| a.cmovcc(Cc::Ne, Gpr::Rax, Gpr::Rcx)), [0x48, 0x0F, 0x45, 0xC1]);
        assert_eq!(bytes_of(|a| a.setcc(Cc::E, Gpr::Rax)), [0x0F, 0x94, 0xC0]);
        assert_eq!(bytes_of(|a| a.popcnt(Gpr::Rax, Gpr::Rcx)), [0xF3, 0x48, 0x0F, 0xB8, 0xC1]);
        assert_eq!(bytes_of(|a| a.imul_rr(Gpr::Rax, Gpr::Rcx)), [0x48, 0x0F, 0xAF, 0xC1]);
        assert_eq!(bytes_of(|a| a.mul_r(Gpr::Rcx)), [0x48, 0xF7, 0xE1]);
        assert_eq!(bytes_of(|a| a.movsxd(Gpr::Rax, Gpr::Rcx)), [0x48, 0x63, 0xC1]);
    }

    #[test]
    fn sse_encodings() {
        assert_eq!(
            bytes_of(|a| a.movq_xr(Xmm::Xmm0, Gpr::Rax)),
            [0x66, 0x48, 0x0F, 0x6E, 0xC0]
        );
        assert_eq!(bytes_of(|a| a.addsd(Xmm::Xmm0, Xmm::Xmm1)), [0xF2, 0x0F, 0x58, 0xC1]);
        assert_eq!(bytes_of(|a| a.pminub(Xmm::Xmm0, Xmm::Xmm1)), [0x66, 0x0F, 0xDA, 0xC1]);
        assert_eq!(bytes_of(|a| a.pmovmskb(Gpr::Rax, Xmm::Xmm0)), [0x66, 0x0F, 0xD7, 0xC0]);
    }

    #[test]
    fn stack_and_call_encodings() {
        assert_eq!(bytes_of(|a| a.push_r(Gpr::R14)), [0x41, 0x56]);
        assert_eq!(bytes_of(|a| a.pop_r(Gpr::R14)), [0x41, 0x5E]);
        assert_eq!(bytes_of(|a| a.call_r(Gpr::Rax)), [0xFF, 0xD0]);
        assert_eq!(bytes_of(|a| a.sub_rsp8(8)), [0x48, 0x83, 0xEC, 0x08]);
        assert_eq!(bytes_of(|a| a.ret()), [0xC3]);
    }

    #[test]
    fn code_size_counts_bytes() {
        let mut asm = Assembler::new();
        for _ in 0..17 {
            asm.put1(0x90);
        }
        assert_eq!(asm.code_size(), 17);
    }

    #[test]
    fn fixup_forward_reference() {
        // JZ to a label bound at offset 16: the rel32 window sits at
        // offset 2, so the patched value is 16 - (2 + 4) = 10.
        let mut asm = Assembler::new();
        let label = asm.create_label();
        asm.jcc(Cc::E, label);
        for _ in 0..10 {
            asm.put1(0x90);
        }
        assert_eq!(asm.code_size(), 16);
        asm.bind_label(label);
        asm.resolve_fixups().unwrap();
        let bytes = asm.into_bytes();
        assert_eq!(&bytes[2..6], &10i32.to_le_bytes());
    }

    #[test]
    fn backward_reference_patches_immediately() {
        let mut asm = Assembler::new();
        let top = asm.create_label();
        asm.bind_label(top);
        asm.put1(0x90);
        asm.jmp(top);
        asm.resolve_fixups().unwrap();
        let bytes = asm.into_bytes();
        // Window at offset 2, target 0: rel32 = -6.
        assert_eq!(&bytes[2..6], &(-6i32).to_le_bytes());
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let mut asm = Assembler::new();
        let label = asm.create_label();
        asm.jmp(label);
        assert_eq!(asm.resolve_fixups(), Err(AsmError::UnresolvedLabel(0)));
    }

    #[test]
    fn bit_emission_composes_words() {
        // Compose ADDQ R2, R3, R4 field by field, LSB first.
        let mut asm = Assembler::new();
        asm.put_bits(4, 5); // Rc
        asm.put_bits(0x20, 7); // function
        asm.put_bits(0, 1); // literal flag
        asm.put_bits(0, 3); // SBZ
        asm.put_bits(3, 5); // Rb
        asm.put_bits(2, 5); // Ra
        asm.put_bits(0x10, 6); // primary opcode
        asm.align_bits();
        let bytes = asm.into_bytes();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 0x4043_0404);
    }
}
