//! The guest register file.
//!
//! Thirty-one writable integer and floating-point registers; index 31 of
//! either file reads as zero and discards writes, represented implicitly
//! rather than as storage so no handler can ever observe a dirty zero
//! register. The file also owns PC, PS, FPCR and the load-locked
//! reservation. Every operation is total.

use crate::fpcr::Fpcr;
use crate::ps::Ps;
use crate::{INSTR_BYTES, ZERO_REG};

/// Load-locked / store-conditional reservation: a valid flag and the
/// locked physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reservation {
    pub valid: bool,
    pub address: u64,
}

/// Reservation granularity: one 16-byte aligned line.
const LOCK_LINE_MASK: u64 = !0xF;

impl Reservation {
    /// Arm the reservation for the line containing `va`.
    pub fn arm(&mut self, va: u64) {
        self.valid = true;
        self.address = va & LOCK_LINE_MASK;
    }

    /// Whether a store-conditional to `va` may proceed.
    pub fn covers(&self, va: u64) -> bool {
        self.valid && self.address == va & LOCK_LINE_MASK
    }

    /// Whether a write to `va` by another agent invalidates this
    /// reservation.
    pub fn intersects(&self, va: u64) -> bool {
        self.valid && self.address == va & LOCK_LINE_MASK
    }

    pub fn clear(&mut self) {
        self.valid = false;
    }
}

/// The architectural register state of one guest CPU.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    gpr: [u64; 31],
    fpr: [u64; 31],
    pc: u64,
    pub ps: Ps,
    pub fpcr: Fpcr,
    pub reservation: Reservation,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            gpr: [0; 31],
            fpr: [0; 31],
            pc: 0,
            ps: Ps::reset(),
            fpcr: Fpcr::default(),
            reservation: Reservation::default(),
        }
    }

    /// Read an integer register; R31 reads as zero.
    #[inline]
    pub fn read_int(&self, idx: usize) -> u64 {
        if idx >= ZERO_REG {
            0
        } else {
            self.gpr[idx]
        }
    }

    /// Write an integer register; writes to R31 are discarded.
    #[inline]
    pub fn write_int(&mut self, idx: usize, value: u64) {
        if idx < ZERO_REG {
            self.gpr[idx] = value;
        }
    }

    /// Read a floating-point register's bit pattern; F31 reads as zero,
    /// which is +0.0 in every supported precision.
    #[inline]
    pub fn read_fp(&self, idx: usize) -> u64 {
        if idx >= ZERO_REG {
            0
        } else {
            self.fpr[idx]
        }
    }

    /// Write a floating-point register's bit pattern; writes to F31 are
    /// discarded.
    #[inline]
    pub fn write_fp(&mut self, idx: usize, bits: u64) {
        if idx < ZERO_REG {
            self.fpr[idx] = bits;
        }
    }

    #[inline]
    pub fn read_pc(&self) -> u64 {
        self.pc
    }

    /// Set PC. Instruction addresses are longword aligned; the low two
    /// bits are cleared here so computed jumps need no masking of their
    /// own.
    #[inline]
    pub fn write_pc(&mut self, pc: u64) {
        self.pc = pc & !3;
    }

    /// Advance PC past the instruction just executed.
    #[inline]
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(INSTR_BYTES);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_all_indices() {
        let mut regs = RegisterFile::new();
        for idx in 0..32 {
            let value = 0xDEAD_0000 + idx as u64;
            regs.write_int(idx, value);
            let expect = if idx == 31 { 0 } else { value };
            assert_eq!(regs.read_int(idx), expect, "integer register {idx}");

            regs.write_fp(idx, value);
            assert_eq!(regs.read_fp(idx), expect, "fp register {idx}");
        }
    }

    #[test]
    fn pc_alignment_and_advance() {
        let mut regs = RegisterFile::new();
        regs.write_pc(0x1003);
        assert_eq!(regs.read_pc(), 0x1000);
        regs.advance_pc();
        assert_eq!(regs.read_pc(), 0x1004);
    }

    #[test]
    fn reservation_line_semantics() {
        let mut res = Reservation::default();
        res.arm(0x2008);
        assert!(res.covers(0x2000));
        assert!(res.covers(0x200F));
        assert!(!res.covers(0x2010));
        assert!(res.intersects(0x2004));
        res.clear();
        assert!(!res.covers(0x2008));
    }
}
