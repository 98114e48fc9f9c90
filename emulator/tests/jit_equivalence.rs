//! The JIT path must reproduce the interpreter's architectural effect on
//! the same program.

#![cfg(all(unix, target_arch = "x86_64"))]

use evax_core::{funcs, Branch, FlatMemory, GuestMemory, MemRef, Opcode, Operate};
use evaxemu::{Cpu, CpuState, EmuConfig};

const CODE: u64 = 0x1000;

/// Sum 1..=100 through a counted loop, store the result, halt.
fn program() -> Vec<u32> {
    vec![
        MemRef { op: Opcode::Lda, ra: 1, rb: 31, disp: 100 }.encode(),
        MemRef { op: Opcode::Lda, ra: 3, rb: 31, disp: 1 }.encode(),
        MemRef { op: Opcode::Lda, ra: 2, rb: 31, disp: 0 }.encode(),
        // loop:
        Operate::with_regs(Opcode::IntA, funcs::ADDQ, 2, 1, 2).encode(),
        Operate::with_regs(Opcode::IntA, funcs::SUBQ, 1, 3, 1).encode(),
        Branch { op: Opcode::Bne, ra: 1, disp: -3 }.encode(),
        MemRef { op: Opcode::Stq, ra: 2, rb: 31, disp: 0x2000 }.encode(),
        // CALL_PAL halt
        0x0000_0000,
    ]
}

fn run_with(config: EmuConfig) -> (Cpu, FlatMemory) {
    let mut cpu = Cpu::new(0, config);
    cpu.regs.write_pc(CODE);
    cpu.regs.write_int(30, 0xF000);
    cpu.kernel_sp = 0xF000;
    let mut mem = FlatMemory::new(0, 0x1_0000);
    for (i, word) in program().iter().enumerate() {
        mem.write_va(0, CODE + 4 * i as u64, *word as u64, 4).unwrap();
    }
    cpu.run(&mut mem, Some(10_000)).unwrap();
    (cpu, mem)
}

#[test]
fn jit_matches_interpreter() {
    let (interp_cpu, mut interp_mem) = run_with(EmuConfig::default());

    let mut jit_config = EmuConfig { jit_enabled: true, jit_threshold: 1, ..EmuConfig::default() };
    jit_config.jit_optimization_level = 0;
    let (jit_cpu, mut jit_mem) = run_with(jit_config);

    assert_eq!(interp_cpu.state, CpuState::Halted);
    assert_eq!(jit_cpu.state, CpuState::Halted);
    assert_eq!(interp_cpu.regs.read_int(2), 5050);

    for i in 0..32 {
        assert_eq!(
            jit_cpu.regs.read_int(i),
            interp_cpu.regs.read_int(i),
            "integer register {i}"
        );
    }
    assert_eq!(jit_cpu.regs.ps.0, interp_cpu.regs.ps.0, "condition codes");
    assert_eq!(
        jit_mem.read_va(0, 0x2000, 8).unwrap(),
        interp_mem.read_va(0, 0x2000, 8).unwrap()
    );
    assert_eq!(jit_mem.read_va(0, 0x2000, 8).unwrap(), 5050);
}

#[test]
fn jit_matches_at_every_optimization_level() {
    let (reference, _) = run_with(EmuConfig::default());
    for level in 0..=2 {
        let config = EmuConfig {
            jit_enabled: true,
            jit_threshold: 1,
            jit_optimization_level: level,
            ..EmuConfig::default()
        };
        let (cpu, mut mem) = run_with(config);
        assert_eq!(cpu.state, CpuState::Halted, "level {level}");
        for i in 0..32 {
            assert_eq!(cpu.regs.read_int(i), reference.regs.read_int(i), "level {level} r{i}");
        }
        assert_eq!(mem.read_va(0, 0x2000, 8).unwrap(), 5050, "level {level}");
    }
}
