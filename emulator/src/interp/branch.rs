//! Branch format, primaries 0x30-0x3F.
//!
//! Target = updated PC plus the 21-bit displacement in instruction units.
//! Integer branches test Ra as a signed quadword; FP branches test Fa's
//! value with NaN unordered (only the not-equal relation holds).

use evax_core::{Branch, GuestMemory, Opcode, Trap};

use crate::cpu::Cpu;

pub(super) fn execute(cpu: &mut Cpu, _mem: &mut dyn GuestMemory, b: &Branch) {
    let pc = cpu.regs.read_pc();
    let target = b.target(pc);

    let taken = match b.op {
        Opcode::Br => true,
        Opcode::Bsr => {
            cpu.regs.write_int(b.ra as usize, pc.wrapping_add(4));
            true
        }

        Opcode::Beq => int_test(cpu, b, |a| a == 0),
        Opcode::Bne => int_test(cpu, b, |a| a != 0),
        Opcode::Blt => int_test(cpu, b, |a| a < 0),
        Opcode::Ble => int_test(cpu, b, |a| a <= 0),
        Opcode::Bge => int_test(cpu, b, |a| a >= 0),
        Opcode::Bgt => int_test(cpu, b, |a| a > 0),
        Opcode::Blbs => int_test(cpu, b, |a| a & 1 != 0),
        Opcode::Blbc => int_test(cpu, b, |a| a & 1 == 0),

        Opcode::Fbeq | Opcode::Fbne | Opcode::Fblt | Opcode::Fble | Opcode::Fbge
        | Opcode::Fbgt => {
            if !cpu.regs.ps.fen() {
                cpu.raise_trap(Trap::FpDisabled);
                return;
            }
            let a = f64::from_bits(cpu.regs.read_fp(b.ra as usize));
            match b.op {
                Opcode::Fbeq => a == 0.0,
                Opcode::Fbne => a != 0.0,
                Opcode::Fblt => a < 0.0,
                Opcode::Fble => a <= 0.0,
                Opcode::Fbge => a >= 0.0,
                _ => a > 0.0,
            }
        }

        _ => unreachable!("branch primary"),
    };

    if taken {
        cpu.branch_to(target);
    }
}

fn int_test(cpu: &Cpu, b: &Branch, predicate: impl Fn(i64) -> bool) -> bool {
    predicate(cpu.regs.read_int(b.ra as usize) as i64)
}
