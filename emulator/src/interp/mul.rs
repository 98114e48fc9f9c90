//! Integer multiply, primary 0x13.
//!
//! Products update N/Z; the `/V` forms own V and the integer-overflow
//! trap. UMULH returns the high 64 bits of the unsigned 128-bit product.

use evax_core::{funcs, GuestMemory, Operate, Trap};

use super::{sext32, Dispatch};
use crate::cpu::Cpu;

pub(super) fn register(d: &mut Dispatch) {
    d.intm(funcs::MULL, mull);
    d.intm(funcs::MULQ, mulq);
    d.intm(funcs::UMULH, umulh);
    d.intm(funcs::MULL_V, mull_v);
    d.intm(funcs::MULQ_V, mulq_v);
}

fn mull(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize) as u32;
    let b = o.operand2(&cpu.regs) as u32;
    let result = sext32(a.wrapping_mul(b) as u64);
    cpu.regs.ps.update_nz(result);
    cpu.regs.write_int(o.rc as usize, result);
}

fn mulq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize);
    let b = o.operand2(&cpu.regs);
    let result = a.wrapping_mul(b);
    cpu.regs.ps.update_nz(result);
    cpu.regs.write_int(o.rc as usize, result);
}

fn umulh(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize) as u128;
    let b = o.operand2(&cpu.regs) as u128;
    let result = ((a * b) >> 64) as u64;
    cpu.regs.ps.update_nz(result);
    cpu.regs.write_int(o.rc as usize, result);
}

fn mull_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize) as u32 as i32;
    let b = o.operand2(&cpu.regs) as u32 as i32;
    let (low, overflow) = a.overflowing_mul(b);
    if overflow && cpu.regs.ps.iov() {
        cpu.raise_trap(Trap::IntegerOverflow);
        return;
    }
    let result = sext32(low as u32 as u64);
    cpu.regs.ps.update_nzvc(result, overflow, cpu.regs.ps.c());
    cpu.regs.write_int(o.rc as usize, result);
}

fn mulq_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize) as i64;
    let b = o.operand2(&cpu.regs) as i64;
    let (result, overflow) = a.overflowing_mul(b);
    if overflow && cpu.regs.ps.iov() {
        cpu.raise_trap(Trap::IntegerOverflow);
        return;
    }
    cpu.regs.ps.update_nzvc(result as u64, overflow, cpu.regs.ps.c());
    cpu.regs.write_int(o.rc as usize, result as u64);
}
