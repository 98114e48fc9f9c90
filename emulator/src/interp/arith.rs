//! Integer arithmetic, primary 0x10: add/subtract families, compares and
//! the byte-vector compare.
//!
//! Plain adds and subtracts update N/Z and the carry; the `/V` forms also
//! own the V bit and raise the integer-overflow trap when PS enables it.
//! Compares write a 0/1 result with a logical-style N/Z update, leaving
//! V and C alone.

use evax_core::{funcs, GuestMemory, Operate, Trap};

use super::{sext32, Dispatch};
use crate::cpu::Cpu;

pub(super) fn register(d: &mut Dispatch) {
    d.inta(funcs::ADDL, addl);
    d.inta(funcs::S4ADDL, s4addl);
    d.inta(funcs::S8ADDL, s8addl);
    d.inta(funcs::SUBL, subl);
    d.inta(funcs::S4SUBL, s4subl);
    d.inta(funcs::S8SUBL, s8subl);
    d.inta(funcs::ADDQ, addq);
    d.inta(funcs::S4ADDQ, s4addq);
    d.inta(funcs::S8ADDQ, s8addq);
    d.inta(funcs::SUBQ, subq);
    d.inta(funcs::S4SUBQ, s4subq);
    d.inta(funcs::S8SUBQ, s8subq);
    d.inta(funcs::ADDL_V, addl_v);
    d.inta(funcs::SUBL_V, subl_v);
    d.inta(funcs::ADDQ_V, addq_v);
    d.inta(funcs::SUBQ_V, subq_v);
    d.inta(funcs::CMPEQ, cmpeq);
    d.inta(funcs::CMPLT, cmplt);
    d.inta(funcs::CMPLE, cmple);
    d.inta(funcs::CMPULT, cmpult);
    d.inta(funcs::CMPULE, cmpule);
    d.inta(funcs::CMPBGE, cmpbge);
}

/// Longword add/sub core: 32-bit wrap, sign-extended result, carry out of
/// bit 31.
fn longword(cpu: &mut Cpu, o: &Operate, shift: u32, sub: bool) {
    let a = (cpu.regs.read_int(o.ra as usize) << shift) as u32;
    let b = o.operand2(&cpu.regs) as u32;
    let (low, carry) = if sub { a.overflowing_sub(b) } else { a.overflowing_add(b) };
    let result = sext32(low as u64);
    cpu.regs.ps.update_nzc(result, carry);
    cpu.regs.write_int(o.rc as usize, result);
}

fn quadword(cpu: &mut Cpu, o: &Operate, shift: u32, sub: bool) {
    let a = cpu.regs.read_int(o.ra as usize) << shift;
    let b = o.operand2(&cpu.regs);
    let (result, carry) = if sub { a.overflowing_sub(b) } else { a.overflowing_add(b) };
    cpu.regs.ps.update_nzc(result, carry);
    cpu.regs.write_int(o.rc as usize, result);
}

fn addl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 0, false);
}

fn s4addl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 2, false);
}

fn s8addl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 3, false);
}

fn subl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 0, true);
}

fn s4subl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 2, true);
}

fn s8subl(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword(cpu, o, 3, true);
}

fn addq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 0, false);
}

fn s4addq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 2, false);
}

fn s8addq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 3, false);
}

fn subq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 0, true);
}

fn s4subq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 2, true);
}

fn s8subq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword(cpu, o, 3, true);
}

/// `/V` longword form: signed 32-bit overflow raises the arithmetic trap
/// when PS enables it; otherwise the result wraps and V records it.
fn longword_v(cpu: &mut Cpu, o: &Operate, sub: bool) {
    let a = cpu.regs.read_int(o.ra as usize) as u32;
    let b = o.operand2(&cpu.regs) as u32;
    let (low, overflow) = if sub {
        (a as i32).overflowing_sub(b as i32)
    } else {
        (a as i32).overflowing_add(b as i32)
    };
    if overflow && cpu.regs.ps.iov() {
        cpu.raise_trap(Trap::IntegerOverflow);
        return;
    }
    let (_, carry) = if sub { a.overflowing_sub(b) } else { a.overflowing_add(b) };
    let result = sext32(low as u32 as u64);
    cpu.regs.ps.update_nzvc(result, overflow, carry);
    cpu.regs.write_int(o.rc as usize, result);
}

fn quadword_v(cpu: &mut Cpu, o: &Operate, sub: bool) {
    let a = cpu.regs.read_int(o.ra as usize);
    let b = o.operand2(&cpu.regs);
    let (result, overflow) = if sub {
        (a as i64).overflowing_sub(b as i64)
    } else {
        (a as i64).overflowing_add(b as i64)
    };
    if overflow && cpu.regs.ps.iov() {
        cpu.raise_trap(Trap::IntegerOverflow);
        return;
    }
    let (_, carry) = if sub { a.overflowing_sub(b) } else { a.overflowing_add(b) };
    cpu.regs.ps.update_nzvc(result as u64, overflow, carry);
    cpu.regs.write_int(o.rc as usize, result as u64);
}

fn addl_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword_v(cpu, o, false);
}

fn subl_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    longword_v(cpu, o, true);
}

fn addq_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword_v(cpu, o, false);
}

fn subq_v(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    quadword_v(cpu, o, true);
}

/// Compares: a 0/1 result with a logical-style condition update.
fn compare(cpu: &mut Cpu, o: &Operate, predicate: impl Fn(u64, u64) -> bool) {
    let a = cpu.regs.read_int(o.ra as usize);
    let b = o.operand2(&cpu.regs);
    let result = predicate(a, b) as u64;
    cpu.regs.ps.update_nz(result);
    cpu.regs.write_int(o.rc as usize, result);
}

fn cmpeq(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    compare(cpu, o, |a, b| a == b);
}

fn cmplt(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    compare(cpu, o, |a, b| (a as i64) < (b as i64));
}

fn cmple(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    compare(cpu, o, |a, b| (a as i64) <= (b as i64));
}

fn cmpult(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    compare(cpu, o, |a, b| a < b);
}

fn cmpule(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    compare(cpu, o, |a, b| a <= b);
}

/// CMPBGE: per-byte unsigned >= across the eight lanes.
fn cmpbge(cpu: &mut Cpu, _: &mut dyn GuestMemory, o: &Operate) {
    let a = cpu.regs.read_int(o.ra as usize);
    let b = o.operand2(&cpu.regs);
    let mut result = 0u64;
    for lane in 0..8 {
        let abyte = (a >> (8 * lane)) as u8;
        let bbyte = (b >> (8 * lane)) as u8;
        if abyte >= bbyte {
            result |= 1 << lane;
        }
    }
    cpu.regs.ps.update_nz(result);
    cpu.regs.write_int(o.rc as usize, result);
}
