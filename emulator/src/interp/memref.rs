//! Memory-reference format: address generation, loads, stores, the
//! load-locked/store-conditional pair, FP loads/stores and the computed
//! jumps that share the format.
//!
//! Every effective address is Rb plus the sign-extended displacement,
//! modulo 2^64. A memory fault becomes the matching trap before any
//! destination is written.

use evax_core::{
    f64_to_vax_f, f64_to_vax_g, funcs, vax_f_to_f64, vax_g_to_f64, GuestMemory, MemRef, Opcode,
    Trap,
};

use super::sext32;
use crate::cpu::Cpu;

pub(super) fn execute(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, word: u32) {
    match m.op {
        Opcode::Lda => {
            let ea = m.effective_address(&cpu.regs);
            cpu.regs.write_int(m.ra as usize, ea);
        }
        Opcode::Ldah => {
            let base = cpu.regs.read_int(m.rb as usize);
            let value = base.wrapping_add(((m.disp as i64) << 16) as u64);
            cpu.regs.write_int(m.ra as usize, value);
        }

        Opcode::Ldbu => int_load(cpu, mem, m, 1, false),
        Opcode::Ldwu => int_load(cpu, mem, m, 2, false),
        Opcode::Ldl => int_load(cpu, mem, m, 4, true),
        Opcode::Ldq => int_load(cpu, mem, m, 8, false),

        Opcode::Stb => int_store(cpu, mem, m, 1),
        Opcode::Stw => int_store(cpu, mem, m, 2),
        Opcode::Stl => int_store(cpu, mem, m, 4),
        Opcode::Stq => int_store(cpu, mem, m, 8),

        Opcode::LdqU => {
            let ea = m.effective_address(&cpu.regs) & !7;
            match mem.read_va(cpu.id, ea, 8) {
                Ok(value) => cpu.regs.write_int(m.ra as usize, value),
                Err(fault) => cpu.raise_mem(fault, false),
            }
        }
        Opcode::StqU => {
            let ea = m.effective_address(&cpu.regs) & !7;
            let value = cpu.regs.read_int(m.ra as usize);
            match mem.write_va(cpu.id, ea, value, 8) {
                Ok(()) => cpu.note_store(mem, ea),
                Err(fault) => cpu.raise_mem(fault, true),
            }
        }

        Opcode::LdlL => load_locked(cpu, mem, m, 4),
        Opcode::LdqL => load_locked(cpu, mem, m, 8),
        Opcode::StlC => store_conditional(cpu, mem, m, 4),
        Opcode::StqC => store_conditional(cpu, mem, m, 8),

        Opcode::Lds => fp_load(cpu, mem, m, FpWidth::S),
        Opcode::Ldt => fp_load(cpu, mem, m, FpWidth::T),
        Opcode::Ldf => fp_load(cpu, mem, m, FpWidth::F),
        Opcode::Ldg => fp_load(cpu, mem, m, FpWidth::G),
        Opcode::Sts => fp_store(cpu, mem, m, FpWidth::S),
        Opcode::Stt => fp_store(cpu, mem, m, FpWidth::T),
        Opcode::Stf => fp_store(cpu, mem, m, FpWidth::F),
        Opcode::Stg => fp_store(cpu, mem, m, FpWidth::G),

        Opcode::Jsr => jump(cpu, m),

        _ => cpu.raise_reserved(word),
    }
}

fn int_load(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: u8, sign: bool) {
    let ea = m.effective_address(&cpu.regs);
    match mem.read_va(cpu.id, ea, width) {
        Ok(raw) => {
            let value = if sign { sext32(raw) } else { raw };
            cpu.regs.write_int(m.ra as usize, value);
        }
        Err(fault) => cpu.raise_mem(fault, false),
    }
}

fn int_store(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: u8) {
    let ea = m.effective_address(&cpu.regs);
    let value = cpu.regs.read_int(m.ra as usize);
    match mem.write_va(cpu.id, ea, value, width) {
        Ok(()) => cpu.note_store(mem, ea),
        Err(fault) => cpu.raise_mem(fault, true),
    }
}

fn load_locked(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: u8) {
    let ea = m.effective_address(&cpu.regs);
    match mem.read_va(cpu.id, ea, width) {
        Ok(raw) => {
            let value = if width == 4 { sext32(raw) } else { raw };
            cpu.regs.reservation.arm(ea);
            cpu.regs.write_int(m.ra as usize, value);
        }
        Err(fault) => cpu.raise_mem(fault, false),
    }
}

/// Store-conditional: the store happens only under a still-valid
/// reservation for the same line; Ra reports success. Either way the
/// reservation dies.
fn store_conditional(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: u8) {
    let ea = m.effective_address(&cpu.regs);
    if cpu.regs.reservation.covers(ea) {
        let value = cpu.regs.read_int(m.ra as usize);
        match mem.write_va(cpu.id, ea, value, width) {
            Ok(()) => {
                cpu.regs.reservation.clear();
                mem.invalidate_reservations(cpu.id, ea);
                cpu.regs.write_int(m.ra as usize, 1);
            }
            Err(fault) => cpu.raise_mem(fault, true),
        }
    } else {
        cpu.regs.reservation.clear();
        cpu.regs.write_int(m.ra as usize, 0);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FpWidth {
    S,
    T,
    F,
    G,
}

fn fp_load(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: FpWidth) {
    if !cpu.regs.ps.fen() {
        cpu.raise_trap(Trap::FpDisabled);
        return;
    }
    let ea = m.effective_address(&cpu.regs);
    let bytes = match width {
        FpWidth::S | FpWidth::F => 4,
        FpWidth::T | FpWidth::G => 8,
    };
    let raw = match mem.read_va(cpu.id, ea, bytes) {
        Ok(raw) => raw,
        Err(fault) => {
            cpu.raise_mem(fault, false);
            return;
        }
    };
    let bits = match width {
        // S is widened to the register T form on load.
        FpWidth::S => (f32::from_bits(raw as u32) as f64).to_bits(),
        FpWidth::T => raw,
        FpWidth::F => match vax_f_to_f64(raw as u32) {
            Ok(v) => v.to_bits(),
            Err(_) => {
                cpu.raise_fp_invalid();
                return;
            }
        },
        FpWidth::G => match vax_g_to_f64(raw) {
            Ok(v) => v.to_bits(),
            Err(_) => {
                cpu.raise_fp_invalid();
                return;
            }
        },
    };
    cpu.regs.write_fp(m.ra as usize, bits);
}

fn fp_store(cpu: &mut Cpu, mem: &mut dyn GuestMemory, m: &MemRef, width: FpWidth) {
    if !cpu.regs.ps.fen() {
        cpu.raise_trap(Trap::FpDisabled);
        return;
    }
    let ea = m.effective_address(&cpu.regs);
    let bits = cpu.regs.read_fp(m.ra as usize);
    let value = f64::from_bits(bits);
    let (raw, bytes) = match width {
        FpWidth::S => ((value as f32).to_bits() as u64, 4),
        FpWidth::T => (bits, 8),
        FpWidth::F => match f64_to_vax_f(value) {
            Ok(image) => (image as u64, 4),
            Err(_) => {
                cpu.raise_fp_invalid();
                return;
            }
        },
        FpWidth::G => match f64_to_vax_g(value) {
            Ok(image) => (image, 8),
            Err(_) => {
                cpu.raise_fp_invalid();
                return;
            }
        },
    };
    match mem.write_va(cpu.id, ea, raw, bytes) {
        Ok(()) => cpu.note_store(mem, ea),
        Err(fault) => cpu.raise_mem(fault, true),
    }
}

/// Computed jumps share the memory format under primary 0x1A: the jump
/// kind rides in bits [15:14] of the displacement, the rest is a branch
/// prediction hint with no architectural effect.
fn jump(cpu: &mut Cpu, m: &MemRef) {
    let pc = cpu.regs.read_pc();
    // Read Rb before any Ra write; they may be the same register.
    let target = cpu.regs.read_int(m.rb as usize) & !3;
    let kind = ((m.disp as u16) >> 14) as u8;
    if kind != funcs::RET {
        cpu.regs.write_int(m.ra as usize, pc.wrapping_add(4));
    }
    cpu.branch_to(target);
}

