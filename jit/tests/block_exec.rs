//! Execute compiled blocks against a bare environment and check guest
//! register and PS effects.

#![cfg(all(unix, target_arch = "x86_64"))]

use evax_core::{funcs, Branch, MemRef, Opcode, Operate};
use evax_jit::{block_exit, compile_block, JitEnv};

extern "C" fn counting_fallback(env: *mut JitEnv, word: u32) -> u32 {
    // Records the fallback invocation; pretends the instruction wrote
    // R9 with its word and completed.
    unsafe {
        let env = &mut *env;
        let hits = &mut *(env.host as *mut u32);
        *hits += 1;
        env.gpr[9] = word as u64;
        env.pc += 4;
    }
    0
}

fn fresh_env(hits: *mut u32) -> JitEnv {
    JitEnv {
        gpr: [0; 32],
        pc: 0,
        ps: 0,
        trap: 0,
        _pad: 0,
        host: hits as *mut core::ffi::c_void,
        fallback: counting_fallback,
    }
}

fn run_words(entry: u64, words: &[u32], env: &mut JitEnv) -> usize {
    let block = compile_block(entry, words, 0).unwrap();
    env.pc = entry;
    // SAFETY: block compiled for this host by compile_block.
    unsafe { block.run(env) };
    block.native_count
}

const PS_N: u64 = 1 << 63;
const PS_Z: u64 = 1 << 62;
const PS_C: u64 = 1 << 60;

#[test]
fn addq_register_form() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = 5;
    env.gpr[2] = 7;
    let words = [Operate::with_regs(Opcode::IntA, funcs::ADDQ, 1, 2, 3).encode()];
    run_words(0x1000, &words, &mut env);

    let exit = block_exit(&env);
    assert_eq!(env.gpr[3], 12);
    assert_eq!(exit.pc, 0x1004, "fallthrough exit past the block");
    assert!(!exit.trapped);
    assert_eq!(hits, 0, "no fallback for a covered instruction");
}

#[test]
fn addq_sets_carry_and_zero() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = u64::MAX;
    env.gpr[2] = 1;
    let words = [Operate::with_regs(Opcode::IntA, funcs::ADDQ, 1, 2, 3).encode()];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[3], 0);
    assert!(env.ps & PS_Z != 0, "zero result sets Z");
    assert!(env.ps & PS_C != 0, "wraparound sets C");
    assert!(env.ps & PS_N == 0);
}

#[test]
fn addl_sign_extends() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = 0x7FFF_FFFF;
    env.gpr[2] = 1;
    let words = [Operate::with_regs(Opcode::IntA, funcs::ADDL, 1, 2, 3).encode()];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[3], 0xFFFF_FFFF_8000_0000);
    assert!(env.ps & PS_N != 0);
}

#[test]
fn literal_operand_and_zero_register() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    let words = [
        // ADDQ R31, #200, R1
        Operate::with_literal(Opcode::IntA, funcs::ADDQ, 31, 200, 1).encode(),
        // SUBQ R1, #1, R31: result discarded
        Operate::with_literal(Opcode::IntA, funcs::SUBQ, 1, 1, 31).encode(),
    ];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[1], 200);
    assert_eq!(env.gpr[31], 0, "zero register stays zero");
}

#[test]
fn compare_and_cmov() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = 3;
    env.gpr[2] = 9;
    env.gpr[4] = 0xAAAA;
    let words = [
        // CMPLT R1, R2, R3: 1
        Operate::with_regs(Opcode::IntA, funcs::CMPLT, 1, 2, 3).encode(),
        // CMOVNE R3, R4, R5: R3 != 0, so R5 <- R4
        Operate::with_regs(Opcode::IntL, funcs::CMOVNE, 3, 4, 5).encode(),
        // CMOVEQ R3, R4, R6: not taken
        Operate::with_regs(Opcode::IntL, funcs::CMOVEQ, 3, 4, 6).encode(),
    ];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[3], 1);
    assert_eq!(env.gpr[5], 0xAAAA);
    assert_eq!(env.gpr[6], 0);
}

#[test]
fn cmpbge_packed_compare() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[6] = 0x0807_0605_0403_0201;
    env.gpr[7] = 0x0909_0909_0101_0101;
    let words = [Operate::with_regs(Opcode::IntA, funcs::CMPBGE, 6, 7, 8).encode()];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[8], 0b0000_1111);
}

#[test]
fn shifts_and_extracts() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = 0x1122_3344_5566_7788;
    let words = [
        // SLL R1, #8, R2
        Operate::with_literal(Opcode::IntS, funcs::SLL, 1, 8, 2).encode(),
        // SRA R1, #32, R3
        Operate::with_literal(Opcode::IntS, funcs::SRA, 1, 32, 3).encode(),
        // EXTBL R1, #2, R4 -> byte 2 = 0x66
        Operate::with_literal(Opcode::IntS, funcs::EXTBL, 1, 2, 4).encode(),
        // ZAPNOT R1, #0x0F, R5 -> low longword
        Operate::with_literal(Opcode::IntS, funcs::ZAPNOT, 1, 0x0F, 5).encode(),
    ];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[2], 0x2233_4455_6677_8800);
    assert_eq!(env.gpr[3], 0x1122_3344);
    assert_eq!(env.gpr[4], 0x66);
    assert_eq!(env.gpr[5], 0x5566_7788);
}

#[test]
fn multiplies() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[1] = u64::MAX;
    env.gpr[2] = u64::MAX;
    let words = [
        Operate::with_regs(Opcode::IntM, funcs::UMULH, 1, 2, 3).encode(),
        Operate::with_regs(Opcode::IntM, funcs::MULQ, 1, 2, 4).encode(),
        Operate::with_literal(Opcode::IntM, funcs::MULL, 1, 3, 5).encode(),
    ];
    run_words(0x1000, &words, &mut env);

    // (2^64-1)^2 = 2^128 - 2^65 + 1
    assert_eq!(env.gpr[3], 0xFFFF_FFFF_FFFF_FFFE);
    assert_eq!(env.gpr[4], 1);
    // MULL: low32(-1) * 3 sign-extended
    assert_eq!(env.gpr[5], (-3i64) as u64);
}

#[test]
fn conditional_branch_exits() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[5] = 1;
    let words = [Branch { op: Opcode::Bne, ra: 5, disp: -1 }.encode()];
    run_words(0x1000, &words, &mut env);
    assert_eq!(block_exit(&env).pc, 0x1000, "taken backward branch");

    env.gpr[5] = 0;
    run_words(0x1000, &words, &mut env);
    assert_eq!(block_exit(&env).pc, 0x1004, "not taken falls through");
}

#[test]
fn bsr_saves_return_address() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    let words = [Branch { op: Opcode::Bsr, ra: 26, disp: 10 }.encode()];
    run_words(0x1000, &words, &mut env);

    assert_eq!(env.gpr[26], 0x1004);
    assert_eq!(block_exit(&env).pc, 0x1004 + 40);
}

#[test]
fn computed_jump_exits() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.gpr[2] = 0x2003;
    let word = MemRef { op: Opcode::Jsr, ra: 26, rb: 2, disp: (1 << 14) as i16 }.encode();
    run_words(0x1000, &[word], &mut env);

    assert_eq!(block_exit(&env).pc, 0x2000, "low bits cleared");
    assert_eq!(env.gpr[26], 0x1004);
}

#[test]
fn uncovered_instruction_falls_back() {
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    let ldq = MemRef { op: Opcode::Ldq, ra: 1, rb: 2, disp: 0 }.encode();
    let words = [ldq, Operate::with_literal(Opcode::IntA, funcs::ADDQ, 9, 1, 10).encode()];
    run_words(0x1000, &words, &mut env);

    assert_eq!(hits, 1, "exactly one fallback call");
    assert_eq!(env.gpr[9], ldq as u64, "fallback saw the raw word");
    // The native instruction after the fallback still ran.
    assert_eq!(env.gpr[10], ldq as u64 + 1);
}

#[test]
fn lda_chain_folds_under_optimization() {
    let words = [
        MemRef { op: Opcode::Ldah, ra: 1, rb: 31, disp: 0x1234 }.encode(),
        MemRef { op: Opcode::Lda, ra: 1, rb: 1, disp: 0x5678 }.encode(),
    ];
    let block = compile_block(0x1000, &words, 1).unwrap();
    let mut hits = 0u32;
    let mut env = fresh_env(&mut hits);
    env.pc = 0x1000;
    // SAFETY: block compiled for this host.
    unsafe { block.run(&mut env) };

    assert_eq!(env.gpr[1], 0x1234_5678);
    assert_eq!(block.native_count, 2);
}
