//! Trap taxonomy and the exception frame.
//!
//! Handlers never return errors as host values: they set a pending trap on
//! the CPU and the execution loop delivers it at the instruction boundary,
//! before PC has advanced, so the faulting instruction is architecturally
//! not executed.

use crate::mem::MemFault;
use crate::ps::Ps;

/// Every architectural trap the core can raise or deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trap {
    // Decode
    ReservedInstruction,

    // Arithmetic
    IntegerOverflow,
    FpInvalidOperation,
    FpDivisionByZero,
    FpOverflow,
    FpUnderflow,
    FpInexact,

    // Memory
    UnalignedAccess,
    AccessViolation,
    TranslationNotValid,
    FaultOnRead,
    FaultOnWrite,

    // Privilege
    PrivilegedInstruction,
    FpDisabled,

    // Synchronous
    Breakpoint,
    BugCheck,
    GenericTrap,
    Syscall,

    // Asynchronous
    MachineCheck,
    ProcessorInterrupt,
    InterprocessorInterrupt,
    ClockInterrupt,
}

/// The entry-point class a trap is delivered through (see the PAL layer's
/// entry vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapClass {
    Interrupt,
    Arithmetic,
    MemoryManagement,
    InstructionFault,
    Unaligned,
    Syscall,
}

impl Trap {
    /// The delivery class of this trap.
    pub fn class(&self) -> TrapClass {
        match self {
            Trap::IntegerOverflow
            | Trap::FpInvalidOperation
            | Trap::FpDivisionByZero
            | Trap::FpOverflow
            | Trap::FpUnderflow
            | Trap::FpInexact => TrapClass::Arithmetic,

            Trap::AccessViolation | Trap::TranslationNotValid | Trap::FaultOnRead
            | Trap::FaultOnWrite => TrapClass::MemoryManagement,

            Trap::UnalignedAccess => TrapClass::Unaligned,

            Trap::ReservedInstruction
            | Trap::PrivilegedInstruction
            | Trap::FpDisabled
            | Trap::Breakpoint
            | Trap::BugCheck
            | Trap::GenericTrap => TrapClass::InstructionFault,

            Trap::Syscall => TrapClass::Syscall,

            Trap::MachineCheck
            | Trap::ProcessorInterrupt
            | Trap::InterprocessorInterrupt
            | Trap::ClockInterrupt => TrapClass::Interrupt,
        }
    }

    /// The IPL execution is raised to while handling this trap.
    pub fn delivery_ipl(&self) -> u8 {
        match self.class() {
            TrapClass::Interrupt => 31,
            _ => 0,
        }
    }

    /// Map a memory fault on a data access to its trap.
    pub fn from_mem_fault(fault: MemFault, is_write: bool) -> Trap {
        match fault {
            MemFault::Unaligned { .. } => Trap::UnalignedAccess,
            MemFault::Unmapped { .. } => {
                if is_write {
                    Trap::FaultOnWrite
                } else {
                    Trap::FaultOnRead
                }
            }
            MemFault::ProtectionViolation { .. } => Trap::AccessViolation,
            MemFault::TlbMiss { .. } => Trap::TranslationNotValid,
        }
    }
}

/// A raised trap with its parameters, parked in the CPU's pending slot
/// until the execution loop delivers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapInfo {
    pub trap: Trap,
    /// PC of the faulting instruction.
    pub pc: u64,
    /// Faulting virtual address, for memory traps.
    pub va: Option<u64>,
    /// The offending instruction word, for decode traps.
    pub word: Option<u32>,
    /// FP exception summary: the sticky flags raised by the faulting
    /// operation, in FPCR sticky-field order.
    pub fp_summary: u8,
}

impl TrapInfo {
    pub fn new(trap: Trap, pc: u64) -> Self {
        TrapInfo { trap, pc, va: None, word: None, fp_summary: 0 }
    }

    pub fn with_va(mut self, va: u64) -> Self {
        self.va = Some(va);
        self
    }

    pub fn with_word(mut self, word: u32) -> Self {
        self.word = Some(word);
        self
    }

    pub fn with_fp_summary(mut self, summary: u8) -> Self {
        self.fp_summary = summary;
        self
    }
}

/// Exception frame size on the exception stack.
pub const EXCEPTION_FRAME_BYTES: u64 = 128;

/// Exception-stack frame alignment.
pub const EXCEPTION_FRAME_ALIGN: u64 = 64;

/// The register context saved on trap delivery and restored by the PAL
/// exit instructions.
///
/// Stack image, low address first: PC, PS, exception summary, R16..R21,
/// RA (R26), PV (R27), SP (R30), FPCR, then padding to 128 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionFrame {
    pub pc: u64,
    pub ps: u64,
    pub exc_summary: u64,
    pub arg_regs: [u64; 6],
    pub ra: u64,
    pub pv: u64,
    pub sp: u64,
    pub fpcr: u64,
}

/// Quadwords of payload in the frame; the rest of the 128 bytes is pad.
const FRAME_QUADWORDS: usize = 13;

static_assertions::const_assert!(FRAME_QUADWORDS as u64 * 8 <= EXCEPTION_FRAME_BYTES);
static_assertions::const_assert!(EXCEPTION_FRAME_BYTES % EXCEPTION_FRAME_ALIGN == 0);

impl ExceptionFrame {
    /// Serialize to the in-memory stack image.
    pub fn to_quadwords(&self) -> [u64; FRAME_QUADWORDS] {
        let mut q = [0u64; FRAME_QUADWORDS];
        q[0] = self.pc;
        q[1] = self.ps;
        q[2] = self.exc_summary;
        q[3..9].copy_from_slice(&self.arg_regs);
        q[9] = self.ra;
        q[10] = self.pv;
        q[11] = self.sp;
        q[12] = self.fpcr;
        q
    }

    /// Rebuild from the in-memory stack image.
    pub fn from_quadwords(q: &[u64; FRAME_QUADWORDS]) -> Self {
        let mut arg_regs = [0u64; 6];
        arg_regs.copy_from_slice(&q[3..9]);
        ExceptionFrame {
            pc: q[0],
            ps: q[1],
            exc_summary: q[2],
            arg_regs,
            ra: q[9],
            pv: q[10],
            sp: q[11],
            fpcr: q[12],
        }
    }

    pub fn saved_ps(&self) -> Ps {
        Ps(self.ps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_image_round_trip() {
        let frame = ExceptionFrame {
            pc: 0x1_0000,
            ps: 0x1F00,
            exc_summary: 0x4,
            arg_regs: [1, 2, 3, 4, 5, 6],
            ra: 0xAA,
            pv: 0xBB,
            sp: 0x8000,
            fpcr: 0x20_0000_0000_0000,
        };
        assert_eq!(ExceptionFrame::from_quadwords(&frame.to_quadwords()), frame);
    }

    #[test]
    fn trap_classes() {
        assert_eq!(Trap::IntegerOverflow.class(), TrapClass::Arithmetic);
        assert_eq!(Trap::FaultOnRead.class(), TrapClass::MemoryManagement);
        assert_eq!(Trap::UnalignedAccess.class(), TrapClass::Unaligned);
        assert_eq!(Trap::ReservedInstruction.class(), TrapClass::InstructionFault);
        assert_eq!(Trap::ClockInterrupt.class(), TrapClass::Interrupt);
        assert_eq!(Trap::ClockInterrupt.delivery_ipl(), 31);
        assert_eq!(
            Trap::from_mem_fault(MemFault::Unmapped { va: 0 }, true),
            Trap::FaultOnWrite
        );
    }
}
