//! CALL_PAL execution and trap delivery.
//!
//! Trap delivery saves the exception frame on the kernel stack, raises
//! PS to kernel at the trap's priority, and redirects PC through the
//! active personality's entry vector. The PAL exit calls (RTI, RETSYS,
//! REI) pop the top frame and restore the interrupted context.
//!
//! Synchronous traps generated by a CALL_PAL itself (breakpoint,
//! bugcheck, syscall, gentrap) carry the address of the next instruction:
//! the call completes architecturally, so its exit instruction resumes
//! after it.

use evax_core::{
    ExceptionFrame, GuestMemory, Mode, Pal, PalFunction, Trap, TrapClass, TrapInfo,
    EXCEPTION_FRAME_ALIGN, EXCEPTION_FRAME_BYTES,
};
use tracing::trace;

use crate::cpu::{Cpu, CpuState, EmuError};
use crate::smp::Interrupt;

// Integer register assignments in the PAL calling convention.
const V0: usize = 0;
const A0: usize = 16;
const A1: usize = 17;
const A2: usize = 18;
const RA: usize = 26;
const PV: usize = 27;
const SP: usize = 30;

/// Execute one CALL_PAL instruction.
pub(crate) fn call_pal(cpu: &mut Cpu, mem: &mut dyn GuestMemory, p: &Pal) {
    let Some(function) = cpu.pal.lookup(p.fnc) else {
        cpu.raise_reserved(p.encode());
        return;
    };
    if function.privileged() && cpu.regs.ps.mode() != Mode::Kernel {
        cpu.raise_trap(Trap::PrivilegedInstruction);
        return;
    }
    trace!(fnc = p.fnc, ?function, "call_pal");

    let a0 = cpu.regs.read_int(A0);
    let next_pc = cpu.regs.read_pc().wrapping_add(4);

    match function {
        PalFunction::Halt => cpu.state = CpuState::Halted,
        PalFunction::CacheFlush | PalFunction::DrainAborts => {}
        PalFunction::ConsoleService => cpu.regs.write_int(V0, 0),

        PalFunction::SwapPalBase => {
            cpu.pal = evax_core::PalTable::new(cpu.pal.personality(), a0);
        }

        PalFunction::WriteIpir => {
            // Only the local queue is reachable from here; cross-CPU
            // routing belongs to the SMP manager.
            if a0 == cpu.id as u64 {
                cpu.smp.post_interrupt(Interrupt::Interprocessor);
            }
        }

        PalFunction::ReadMces => cpu.regs.write_int(V0, cpu.mces),
        PalFunction::WriteMces => cpu.mces = a0,
        PalFunction::WriteFen => {
            let on = a0 & 1 != 0;
            cpu.regs.ps.set_fen(on);
        }
        PalFunction::ClearFen => cpu.regs.ps.set_fen(false),
        PalFunction::WriteVptPtr => cpu.vptptr = a0,

        PalFunction::SwapContext => {
            let old = cpu.kernel_sp;
            cpu.kernel_sp = a0;
            cpu.regs.reservation.clear();
            cpu.regs.write_int(V0, old);
        }

        PalFunction::WriteSysValue => cpu.sysvalue = a0,
        PalFunction::ReadSysValue => cpu.regs.write_int(V0, cpu.sysvalue),

        PalFunction::TbInvalidate => {
            // No TLB is modeled; the reservation still dies with the
            // mapping change.
            cpu.regs.reservation.clear();
        }

        PalFunction::WriteEntry => {
            let class = match cpu.regs.read_int(A1) {
                0 => TrapClass::Interrupt,
                1 => TrapClass::Arithmetic,
                2 => TrapClass::MemoryManagement,
                3 => TrapClass::InstructionFault,
                4 => TrapClass::Unaligned,
                5 => TrapClass::Syscall,
                _ => {
                    cpu.raise_reserved(p.encode());
                    return;
                }
            };
            cpu.pal.write_entry(class, a0);
        }

        PalFunction::SwapIpl => {
            let old = cpu.regs.ps.ipl();
            cpu.regs.ps.set_ipl(a0 as u8);
            cpu.regs.write_int(V0, old as u64);
        }
        PalFunction::ReadPs => cpu.regs.write_int(V0, cpu.regs.ps.0),
        PalFunction::WriteKgp => cpu.kgp = a0,
        PalFunction::WriteUsp => cpu.usp = a0,
        PalFunction::ReadUsp => cpu.regs.write_int(V0, cpu.usp),
        PalFunction::WhoAmI => cpu.regs.write_int(V0, cpu.id as u64),

        PalFunction::WaitForInterrupt => {
            cpu.state = CpuState::WaitingForInterrupt;
            cpu.regs.write_int(V0, 0);
        }

        PalFunction::ReturnFromTrap | PalFunction::ReturnFromSyscall => {
            exit_exception(cpu, mem);
        }

        PalFunction::Breakpoint => cpu.raise(TrapInfo::new(Trap::Breakpoint, next_pc)),
        PalFunction::BugCheck => cpu.raise(TrapInfo::new(Trap::BugCheck, next_pc)),
        PalFunction::Syscall => cpu.raise(TrapInfo::new(Trap::Syscall, next_pc)),
        PalFunction::GenerateTrap => cpu.raise(TrapInfo::new(Trap::GenericTrap, next_pc)),

        PalFunction::InstructionMemoryBarrier => {
            cpu.invalidate_jit();
            mem.fence(false);
        }

        PalFunction::ReadUnique => cpu.regs.write_int(V0, cpu.unique),
        PalFunction::WriteUnique => cpu.unique = a0,
    }
}

/// Deliver the pending trap: push the exception frame and enter the PAL
/// handler for its class.
pub(crate) fn deliver_trap(cpu: &mut Cpu, mem: &mut dyn GuestMemory) -> Result<(), EmuError> {
    let info = cpu.pending.take().expect("no trap pending");
    trace!(trap = ?info.trap, pc = info.pc, va = ?info.va, "delivering trap");

    let frame = ExceptionFrame {
        pc: info.pc,
        ps: cpu.regs.ps.0,
        exc_summary: info.fp_summary as u64,
        arg_regs: [
            cpu.regs.read_int(A0),
            cpu.regs.read_int(A1),
            cpu.regs.read_int(A2),
            cpu.regs.read_int(19),
            cpu.regs.read_int(20),
            cpu.regs.read_int(21),
        ],
        ra: cpu.regs.read_int(RA),
        pv: cpu.regs.read_int(PV),
        sp: cpu.regs.read_int(SP),
        fpcr: cpu.regs.fpcr.0,
    };

    let from_user = cpu.regs.ps.mode() != Mode::Kernel;
    let base_sp = if from_user { cpu.kernel_sp } else { cpu.regs.read_int(SP) };
    let new_sp = (base_sp & !(EXCEPTION_FRAME_ALIGN - 1)).wrapping_sub(EXCEPTION_FRAME_BYTES);

    for (i, quad) in frame.to_quadwords().iter().enumerate() {
        if let Err(fault) = mem.write_va(cpu.id, new_sp + 8 * i as u64, *quad, 8) {
            return Err(cpu.fatal(format!(
                "exception frame push failed at {:#x}: {fault}",
                new_sp + 8 * i as u64
            )));
        }
    }

    if from_user {
        cpu.usp = cpu.regs.read_int(SP);
    }
    cpu.regs.write_int(SP, new_sp);

    // Handler arguments: the faulting address, the offending word and
    // the exception summary.
    cpu.regs.write_int(A0, info.va.unwrap_or(0));
    cpu.regs.write_int(A1, info.word.unwrap_or(0) as u64);
    cpu.regs.write_int(A2, info.fp_summary as u64);

    cpu.regs.ps.set_mode(Mode::Kernel);
    let ipl = cpu.regs.ps.ipl().max(info.trap.delivery_ipl());
    cpu.regs.ps.set_ipl(ipl);

    cpu.branch_to(cpu.pal.entry(info.trap.class()));
    cpu.state = CpuState::ExceptionHandling;
    Ok(())
}

/// Pop the top exception frame (the RTI/RETSYS/REI path).
fn exit_exception(cpu: &mut Cpu, mem: &mut dyn GuestMemory) {
    let sp = cpu.regs.read_int(SP);
    let mut quads = [0u64; 13];
    for (i, slot) in quads.iter_mut().enumerate() {
        match mem.read_va(cpu.id, sp + 8 * i as u64, 8) {
            Ok(v) => *slot = v,
            Err(fault) => {
                cpu.raise_mem(fault, false);
                return;
            }
        }
    }
    let frame = ExceptionFrame::from_quadwords(&quads);

    cpu.regs.ps = frame.saved_ps();
    cpu.regs.fpcr.0 = frame.fpcr;
    for (i, value) in frame.arg_regs.iter().enumerate() {
        cpu.regs.write_int(A0 + i, *value);
    }
    cpu.regs.write_int(RA, frame.ra);
    cpu.regs.write_int(PV, frame.pv);
    cpu.regs.write_int(SP, frame.sp);
    cpu.branch_to(frame.pc);
    cpu.state = CpuState::Running;
}
