//! End-to-end single-instruction and short-sequence scenarios against the
//! interpreter.

use evax_core::{funcs, Branch, FlatMemory, GuestMemory, MemRef, Opcode, Operate};
use evaxemu::{Cpu, EmuConfig};

const CODE: u64 = 0x1000;

fn setup() -> (Cpu, FlatMemory) {
    let mut cpu = Cpu::new(0, EmuConfig::default());
    cpu.regs.write_pc(CODE);
    cpu.kernel_sp = 0xF000;
    cpu.regs.write_int(30, 0xF000);
    let mem = FlatMemory::new(0, 0x1_0000);
    (cpu, mem)
}

fn put_instr(mem: &mut FlatMemory, pc: u64, word: u32) {
    mem.write_va(0, pc, word as u64, 4).unwrap();
}

#[test]
fn lda_computes_effective_address() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(0, 0x0000_0000_1000_0000);
    let word = MemRef { op: Opcode::Lda, ra: 1, rb: 0, disp: 0x100 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(1), 0x0000_0000_1000_0100);
    assert_eq!(cpu.regs.read_pc(), CODE + 4);
    assert!(cpu.pending_trap().is_none());
}

#[test]
fn addq_wraps_without_overflow_trap() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(2, 0x7FFF_FFFF_FFFF_FFFF);
    cpu.regs.write_int(3, 1);
    let word = Operate::with_regs(Opcode::IntA, funcs::ADDQ, 2, 3, 4).encode();
    put_instr(&mut mem, CODE, word);

    let v_before = cpu.regs.ps.v();
    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(4), 0x8000_0000_0000_0000);
    assert!(cpu.pending_trap().is_none());
    assert_eq!(cpu.regs.ps.v(), v_before, "plain ADDQ must leave V alone");
    assert!(cpu.regs.ps.n(), "negative result sets N");
}

#[test]
fn addq_v_traps_when_enabled() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.ps.set_iov(true);
    cpu.regs.write_int(2, 0x7FFF_FFFF_FFFF_FFFF);
    cpu.regs.write_int(3, 1);
    let word = Operate::with_regs(Opcode::IntA, funcs::ADDQ_V, 2, 3, 4).encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    // The trap was delivered: the destination is untouched and control
    // sits at the arithmetic entry point.
    assert_eq!(cpu.regs.read_int(4), 0);
    assert_eq!(cpu.regs.read_pc(), cpu.pal.entry(evax_core::TrapClass::Arithmetic));
}

#[test]
fn bne_taken_backward_loops_to_itself() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(5, 1);
    let word = Branch { op: Opcode::Bne, ra: 5, disp: -1 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_pc(), CODE, "target = PC + 4 + (-1) * 4");
}

#[test]
fn bne_not_taken_falls_through() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(5, 0);
    let word = Branch { op: Opcode::Bne, ra: 5, disp: -1 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_pc(), CODE + 4);
}

#[test]
fn ldq_l_stq_c_success_on_same_cpu() {
    let (mut cpu, mut mem) = setup();
    mem.write_va(0, 0x2000, 0xAA, 8).unwrap();
    cpu.regs.write_int(0, 0x2000);

    let ldq_l = MemRef { op: Opcode::LdqL, ra: 1, rb: 0, disp: 0 }.encode();
    let stq_c = MemRef { op: Opcode::StqC, ra: 1, rb: 0, disp: 0 }.encode();
    put_instr(&mut mem, CODE, ldq_l);
    put_instr(&mut mem, CODE + 4, stq_c);

    cpu.step(&mut mem).unwrap();
    assert_eq!(cpu.regs.read_int(1), 0xAA);
    assert!(cpu.regs.reservation.valid);

    cpu.regs.write_int(1, 0xBB);
    cpu.step(&mut mem).unwrap();

    assert_eq!(mem.read_va(0, 0x2000, 8).unwrap(), 0xBB);
    assert_eq!(cpu.regs.read_int(1), 1, "store-conditional reports success");
    assert!(!cpu.regs.reservation.valid);
}

#[test]
fn stq_c_fails_after_intervening_store() {
    let (mut cpu, mut mem) = setup();
    mem.write_va(0, 0x2000, 0xAA, 8).unwrap();
    cpu.regs.write_int(0, 0x2000);

    let ldq_l = MemRef { op: Opcode::LdqL, ra: 1, rb: 0, disp: 0 }.encode();
    // STQ R2, 8(R0) hits the same reservation line.
    let stq = MemRef { op: Opcode::Stq, ra: 2, rb: 0, disp: 8 }.encode();
    let stq_c = MemRef { op: Opcode::StqC, ra: 1, rb: 0, disp: 0 }.encode();
    put_instr(&mut mem, CODE, ldq_l);
    put_instr(&mut mem, CODE + 4, stq);
    put_instr(&mut mem, CODE + 8, stq_c);

    cpu.step(&mut mem).unwrap();
    cpu.step(&mut mem).unwrap();
    assert!(!cpu.regs.reservation.valid, "write to the locked line clears it");

    cpu.regs.write_int(1, 0xBB);
    cpu.step(&mut mem).unwrap();

    assert_eq!(mem.read_va(0, 0x2000, 8).unwrap(), 0xAA, "store must not happen");
    assert_eq!(cpu.regs.read_int(1), 0, "store-conditional reports failure");
}

#[test]
fn cmpbge_byte_lanes() {
    let (mut cpu, mut mem) = setup();
    // Lanes 0..3 (from the least significant byte) hold 01..04 against
    // 01 01 01 01; lanes 4..7 hold 05..08 against 09s.
    cpu.regs.write_int(6, 0x0807_0605_0403_0201);
    cpu.regs.write_int(7, 0x0909_0909_0101_0101);
    let word = Operate::with_regs(Opcode::IntA, funcs::CMPBGE, 6, 7, 8).encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(8) & 0xFF, 0b0000_1111);
}

#[test]
fn addq_only_sequence_is_modular_sum() {
    let (mut cpu, mut mem) = setup();
    let values = [u64::MAX, 17, 0x8000_0000_0000_0000, 12345];
    let mut pc = CODE;
    cpu.regs.write_int(1, 0);
    for (i, v) in values.iter().enumerate() {
        cpu.regs.write_int(2 + i, *v);
        let word = Operate::with_regs(Opcode::IntA, funcs::ADDQ, 1, (2 + i) as u8, 1).encode();
        put_instr(&mut mem, pc, word);
        pc += 4;
    }
    for _ in 0..values.len() {
        cpu.step(&mut mem).unwrap();
    }
    let expected = values.iter().fold(0u64, |acc, v| acc.wrapping_add(*v));
    assert_eq!(cpu.regs.read_int(1), expected);
}

#[test]
fn computed_jump_saves_return_address() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(2, 0x3001); // low bits cleared by the jump
    let word = MemRef { op: Opcode::Jsr, ra: 26, rb: 2, disp: (1 << 14) as i16 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_pc(), 0x3000);
    assert_eq!(cpu.regs.read_int(26), CODE + 4);
}

#[test]
fn ret_does_not_write_ra() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(26, 0x3000);
    cpu.regs.write_int(9, 0xDEAD);
    let disp = (funcs::RET as u16) << 14;
    let word = MemRef { op: Opcode::Jsr, ra: 9, rb: 26, disp: disp as i16 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_pc(), 0x3000);
    assert_eq!(cpu.regs.read_int(9), 0xDEAD, "RET leaves Ra untouched");
}

#[test]
fn zap_zapnot_partition() {
    let (mut cpu, mut mem) = setup();
    let x = 0x1122_3344_5566_7788u64;
    let m = 0x5Au8;
    cpu.regs.write_int(1, x);

    let zapnot = Operate::with_literal(Opcode::IntS, funcs::ZAPNOT, 1, m, 2).encode();
    let zap = Operate::with_literal(Opcode::IntS, funcs::ZAP, 2, m, 3).encode();
    put_instr(&mut mem, CODE, zapnot);
    put_instr(&mut mem, CODE + 4, zap);

    cpu.step(&mut mem).unwrap();
    cpu.step(&mut mem).unwrap();

    // Keeping lanes m and then clearing lanes m leaves nothing.
    assert_eq!(cpu.regs.read_int(3), 0);
}

#[test]
fn amask_clears_present_extensions() {
    let (mut cpu, mut mem) = setup();
    // Probe BWX/FIX/CIX/MVI plus an unimplemented bit 9.
    cpu.regs.write_int(1, 0x307);
    let word = Operate::with_regs(Opcode::IntL, funcs::AMASK, 31, 1, 2).encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(2), 0x200, "only the absent extension survives");
}

#[test]
fn extqh_zero_byte_offset_clears() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(1, 0x1122_3344_5566_7788);
    let zero = Operate::with_literal(Opcode::IntS, funcs::EXTQH, 1, 0, 2).encode();
    let three = Operate::with_literal(Opcode::IntS, funcs::EXTQH, 1, 3, 3).encode();
    put_instr(&mut mem, CODE, zero);
    put_instr(&mut mem, CODE + 4, three);

    cpu.step(&mut mem).unwrap();
    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(2), 0, "aligned extract has no spill-over");
    assert_eq!(cpu.regs.read_int(3), 0x6677_8800_0000_0000);
}

#[test]
fn cpys_is_idempotent() {
    use evax_core::FpOperate;
    let (mut cpu, mut mem) = setup();
    let x = (-3.5f64).to_bits();
    let y = 7.25f64.to_bits();
    cpu.regs.write_fp(1, x);
    cpu.regs.write_fp(2, y);

    let first = FpOperate { op: Opcode::FltL, fa: 1, fb: 2, fnc: funcs::CPYS, fc: 3 }.encode();
    let second = FpOperate { op: Opcode::FltL, fa: 1, fb: 3, fnc: funcs::CPYS, fc: 4 }.encode();
    put_instr(&mut mem, CODE, first);
    put_instr(&mut mem, CODE + 4, second);

    cpu.step(&mut mem).unwrap();
    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_fp(4), cpu.regs.read_fp(3));
    assert_eq!(cpu.regs.read_fp(3), (-7.25f64).to_bits());
}

#[test]
fn unaligned_load_raises_trap() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(0, 0x2001);
    let word = MemRef { op: Opcode::Ldq, ra: 1, rb: 0, disp: 0 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    // Delivered through the unaligned entry; the load never completed.
    assert_eq!(cpu.regs.read_int(1), 0);
    assert_eq!(cpu.regs.read_pc(), cpu.pal.entry(evax_core::TrapClass::Unaligned));
}

#[test]
fn ldl_sign_extends() {
    let (mut cpu, mut mem) = setup();
    mem.write_va(0, 0x2000, 0xFFFF_FFFF, 4).unwrap();
    cpu.regs.write_int(0, 0x2000);
    let word = MemRef { op: Opcode::Ldl, ra: 1, rb: 0, disp: 0 }.encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(1), u64::MAX);
}

#[test]
fn writes_to_r31_are_discarded_by_execution() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(2, 40);
    cpu.regs.write_int(3, 2);
    let word = Operate::with_regs(Opcode::IntA, funcs::ADDQ, 2, 3, 31).encode();
    put_instr(&mut mem, CODE, word);

    cpu.step(&mut mem).unwrap();

    assert_eq!(cpu.regs.read_int(31), 0);
    // The computation still ran: condition codes reflect 42.
    assert!(!cpu.regs.ps.z());
    assert!(!cpu.regs.ps.n());
}
