//! Memory-function format, primary 0x18: barriers, the cycle counter,
//! prefetch and cache hints, and the intra-processor interrupt flag.

use evax_core::{funcs, GuestMemory, MemFunc};

use super::Dispatch;
use crate::cpu::Cpu;

pub(super) fn register(d: &mut Dispatch) {
    d.memfunc(funcs::TRAPB, trapb);
    d.memfunc(funcs::EXCB, excb);
    d.memfunc(funcs::MB, mb);
    d.memfunc(funcs::WMB, wmb);
    d.memfunc(funcs::FETCH, fetch);
    d.memfunc(funcs::FETCH_M, fetch_m);
    d.memfunc(funcs::RPCC, rpcc);
    d.memfunc(funcs::RC, rc);
    d.memfunc(funcs::RS, rs);
    d.memfunc(funcs::ECB, ecb);
    d.memfunc(funcs::WH64, wh64);
}

/// TRAPB/EXCB: trap barriers. Traps here are delivered synchronously at
/// instruction boundaries, so the barrier is already satisfied.
fn trapb(_: &mut Cpu, _: &mut dyn GuestMemory, _: &MemFunc) {}

fn excb(_: &mut Cpu, _: &mut dyn GuestMemory, _: &MemFunc) {}

fn mb(_: &mut Cpu, mem: &mut dyn GuestMemory, _: &MemFunc) {
    mem.fence(false);
}

fn wmb(_: &mut Cpu, mem: &mut dyn GuestMemory, _: &MemFunc) {
    mem.fence(true);
}

/// FETCH/FETCH_M: touch the line for a later read or modify. Hints never
/// fault.
fn fetch(cpu: &mut Cpu, mem: &mut dyn GuestMemory, f: &MemFunc) {
    let va = cpu.regs.read_int(f.rb as usize);
    let _ = mem.atomic_fetch(cpu.id, va);
}

fn fetch_m(cpu: &mut Cpu, mem: &mut dyn GuestMemory, f: &MemFunc) {
    let va = cpu.regs.read_int(f.rb as usize);
    let _ = mem.atomic_fetch_modify(cpu.id, va);
}

/// RPCC: the monotonically non-decreasing cycle counter.
fn rpcc(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &MemFunc) {
    let cycles = cpu.rpcc();
    cpu.regs.write_int(f.ra as usize, cycles);
}

/// RC: read and clear the intra-processor flag.
fn rc(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &MemFunc) {
    let old = cpu.take_intr_flag(false);
    cpu.regs.write_int(f.ra as usize, old as u64);
}

/// RS: read and set the intra-processor flag.
fn rs(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &MemFunc) {
    let old = cpu.take_intr_flag(true);
    cpu.regs.write_int(f.ra as usize, old as u64);
}

/// ECB/WH64: cache hints, architecturally no-ops.
fn ecb(_: &mut Cpu, _: &mut dyn GuestMemory, _: &MemFunc) {}

fn wh64(_: &mut Cpu, _: &mut dyn GuestMemory, _: &MemFunc) {}
