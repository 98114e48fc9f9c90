//! Per-instruction x86-64 emitters and the block compiler.
//!
//! A block is a straight line of guest instructions ending at the first
//! branch, computed jump, PAL call or reserved word. Covered instructions
//! are emitted natively against the pinned register base; everything else
//! becomes a host call through the environment's fallback hook into the
//! interpreter, for exactly that one instruction.
//!
//! Register convention inside a block: R14 holds the environment pointer,
//! R15 the guest register array base (the same address; the array is the
//! environment's first field). RAX/RCX/RDX/RSI and R8-R11 are scratch,
//! caller-saved, so fallback calls need no spills.

use evax_core::{funcs, Branch, Decoded, MemRef, Opcode, Operate, AMASK_VALUE, IMPLVER_VALUE};

use crate::asm::Assembler;
use crate::opt::{optimize, BlockOp};
use crate::regs::{Cc, Gpr, Xmm};
use crate::runtime::{
    CompiledBlock, ExecBuffer, JitError, ENV_FALLBACK_OFFSET, ENV_PC_OFFSET, ENV_PS_OFFSET,
};

/// The architectural zero register.
pub const ZERO: u8 = 31;

/// Longest block in guest instructions.
pub const MAX_BLOCK_LEN: usize = 64;

const ENV: Gpr = Gpr::R14;
const REGS: Gpr = Gpr::R15;

/// PS condition-code bit positions (carry, overflow, zero, negative).
const PS_CC_C: u8 = 60;
const PS_CC_Z: u8 = 62;
const PS_CC_N: u8 = 63;

/// Whether the body emitters cover this instruction.
pub fn is_native_body(dec: &Decoded) -> bool {
    match dec {
        Decoded::MemRef(m) => matches!(m.op, Opcode::Lda | Opcode::Ldah),
        Decoded::Operate(o) => match o.op {
            Opcode::IntA => matches!(
                o.fnc,
                funcs::ADDL
                    | funcs::S4ADDL
                    | funcs::SUBL
                    | funcs::S4SUBL
                    | funcs::CMPBGE
                    | funcs::S8ADDL
                    | funcs::S8SUBL
                    | funcs::CMPULT
                    | funcs::ADDQ
                    | funcs::S4ADDQ
                    | funcs::SUBQ
                    | funcs::S4SUBQ
                    | funcs::CMPEQ
                    | funcs::S8ADDQ
                    | funcs::S8SUBQ
                    | funcs::CMPULE
                    | funcs::CMPLT
                    | funcs::CMPLE
            ),
            Opcode::IntL => matches!(
                o.fnc,
                funcs::AND
                    | funcs::BIC
                    | funcs::BIS
                    | funcs::ORNOT
                    | funcs::XOR
                    | funcs::EQV
                    | funcs::CMOVLBS
                    | funcs::CMOVLBC
                    | funcs::CMOVEQ
                    | funcs::CMOVNE
                    | funcs::CMOVLT
                    | funcs::CMOVGE
                    | funcs::CMOVLE
                    | funcs::CMOVGT
                    | funcs::AMASK
                    | funcs::IMPLVER
            ),
            Opcode::IntS => match o.fnc {
                funcs::SLL | funcs::SRL | funcs::SRA => true,
                funcs::EXTBL | funcs::EXTWL | funcs::EXTLL | funcs::EXTQL => true,
                // Dynamic byte masks go through the interpreter.
                funcs::ZAP | funcs::ZAPNOT => o.lit,
                _ => false,
            },
            Opcode::IntM => matches!(o.fnc, funcs::MULL | funcs::MULQ | funcs::UMULH),
            _ => false,
        },
        _ => false,
    }
}

/// Whether this instruction ends a block.
fn is_block_ender(dec: &Decoded) -> bool {
    match dec {
        Decoded::Branch(_) | Decoded::Pal(_) | Decoded::Reserved(_) => true,
        Decoded::MemRef(m) => m.op == Opcode::Jsr,
        _ => false,
    }
}

/// Compile one block starting at `entry_pc` from the fetched words.
///
/// The slice is scanned up to the first block ender or [`MAX_BLOCK_LEN`]
/// instructions, whichever comes first.
pub fn compile_block(entry_pc: u64, words: &[u32], opt_level: u8) -> Result<CompiledBlock, JitError> {
    let mut body: Vec<BlockOp> = Vec::new();
    let mut ender: Option<(u64, u32, Decoded)> = None;
    let mut guest_len = 0usize;

    for (i, &word) in words.iter().enumerate().take(MAX_BLOCK_LEN) {
        let pc = entry_pc + 4 * i as u64;
        let dec = evax_core::decode(word);
        guest_len = i + 1;
        if is_block_ender(&dec) {
            ender = Some((pc, word, dec));
            break;
        }
        if is_native_body(&dec) {
            body.push(BlockOp::Native { pc, dec });
        } else {
            body.push(BlockOp::Fallback { pc, word });
        }
    }

    optimize(&mut body, opt_level);

    let mut asm = Assembler::new();
    let exit = asm.create_label();

    emit_prologue(&mut asm);
    let mut native_count = 0usize;
    for op in &body {
        match op {
            BlockOp::Native { dec, .. } => {
                emit_native(&mut asm, dec);
                native_count += 1;
            }
            BlockOp::Fallback { pc, word } => emit_fallback(&mut asm, *pc, *word, exit),
            BlockOp::LoadConst { rc, value } => {
                asm.mov_ri64(Gpr::Rax, *value);
                store_guest(&mut asm, *rc, Gpr::Rax);
                native_count += 1;
            }
        }
    }

    match ender {
        Some((pc, word, dec)) => emit_ender(&mut asm, pc, word, &dec, exit),
        None => {
            // Fallthrough exit past the last body instruction.
            emit_set_pc(&mut asm, entry_pc + 4 * guest_len as u64);
        }
    }

    asm.bind_label(exit);
    emit_epilogue(&mut asm);
    asm.resolve_fixups()?;

    let code = ExecBuffer::new(asm.into_bytes())?;
    Ok(CompiledBlock::new(entry_pc, guest_len, native_count, code))
}

fn emit_prologue(asm: &mut Assembler) {
    asm.push_r(ENV);
    asm.push_r(REGS);
    // Keep RSP 16-byte aligned at emitted call sites.
    asm.sub_rsp8(8);
    asm.mov_rr(ENV, Gpr::Rdi);
    asm.mov_rr(REGS, Gpr::Rdi);
}

fn emit_epilogue(asm: &mut Assembler) {
    asm.add_rsp8(8);
    asm.pop_r(REGS);
    asm.pop_r(ENV);
    asm.ret();
}

/// Read guest register `idx` into `dst`.
fn load_guest(asm: &mut Assembler, dst: Gpr, idx: u8) {
    if idx == ZERO {
        asm.zero_r(dst);
    } else {
        asm.load(dst, REGS, idx as i32 * 8);
    }
}

/// Write `src` to guest register `idx`; the zero register swallows it.
fn store_guest(asm: &mut Assembler, idx: u8, src: Gpr) {
    if idx != ZERO {
        asm.store(REGS, idx as i32 * 8, src);
    }
}

/// Materialize operand 2 of an operate instruction into `dst`.
fn load_operand2(asm: &mut Assembler, dst: Gpr, o: &Operate) {
    if o.lit {
        asm.mov_ri32(dst, o.literal() as u32);
    } else {
        load_guest(asm, dst, o.rb());
    }
}

fn emit_set_pc(asm: &mut Assembler, pc: u64) {
    asm.mov_ri64(Gpr::Rax, pc);
    asm.store(ENV, ENV_PC_OFFSET, Gpr::Rax);
}

/// Host call into the interpreter for one guest instruction, exiting the
/// block early if it raised a trap.
fn emit_fallback(asm: &mut Assembler, pc: u64, word: u32, exit: crate::asm::Label) {
    emit_set_pc(asm, pc);
    asm.mov_rr(Gpr::Rdi, ENV);
    asm.mov_ri32(Gpr::Rsi, word);
    asm.call_m(ENV, ENV_FALLBACK_OFFSET);
    asm.test_rr32(Gpr::Rax, Gpr::Rax);
    asm.jcc(Cc::Ne, exit);
}

/// Capture host SF/ZF/CF (set by the instruction just emitted) into the
/// guest PS condition codes N/Z/C. V is owned by the /V-qualified forms,
/// which are not emitted natively.
fn emit_cc_capture_nzc(asm: &mut Assembler) {
    asm.setcc(Cc::S, Gpr::R8);
    asm.setcc(Cc::E, Gpr::R9);
    asm.setcc(Cc::B, Gpr::R10);
    asm.movzx_b(Gpr::R8, Gpr::R8);
    asm.movzx_b(Gpr::R9, Gpr::R9);
    asm.movzx_b(Gpr::R10, Gpr::R10);
    asm.shl_ri(Gpr::R8, PS_CC_N);
    asm.shl_ri(Gpr::R9, PS_CC_Z);
    asm.shl_ri(Gpr::R10, PS_CC_C);
    asm.load(Gpr::Rsi, ENV, ENV_PS_OFFSET);
    asm.mov_ri64(Gpr::Rdx, !((1u64 << PS_CC_N) | (1u64 << PS_CC_Z) | (1u64 << PS_CC_C)));
    asm.and_rr(Gpr::Rsi, Gpr::Rdx);
    asm.or_rr(Gpr::Rsi, Gpr::R8);
    asm.or_rr(Gpr::Rsi, Gpr::R9);
    asm.or_rr(Gpr::Rsi, Gpr::R10);
    asm.store(ENV, ENV_PS_OFFSET, Gpr::Rsi);
}

/// Capture N/Z only (logical-class update), from SF/ZF.
fn emit_cc_capture_nz(asm: &mut Assembler) {
    asm.setcc(Cc::S, Gpr::R8);
    asm.setcc(Cc::E, Gpr::R9);
    asm.movzx_b(Gpr::R8, Gpr::R8);
    asm.movzx_b(Gpr::R9, Gpr::R9);
    asm.shl_ri(Gpr::R8, PS_CC_N);
    asm.shl_ri(Gpr::R9, PS_CC_Z);
    asm.load(Gpr::Rsi, ENV, ENV_PS_OFFSET);
    asm.mov_ri64(Gpr::Rdx, !((1u64 << PS_CC_N) | (1u64 << PS_CC_Z)));
    asm.and_rr(Gpr::Rsi, Gpr::Rdx);
    asm.or_rr(Gpr::Rsi, Gpr::R8);
    asm.or_rr(Gpr::Rsi, Gpr::R9);
    asm.store(ENV, ENV_PS_OFFSET, Gpr::Rsi);
}

/// Result in RAX: set N/Z from it and store to `rc`.
fn finish_logical(asm: &mut Assembler, rc: u8) {
    asm.test_rr(Gpr::Rax, Gpr::Rax);
    emit_cc_capture_nz(asm);
    store_guest(asm, rc, Gpr::Rax);
}

fn emit_native(asm: &mut Assembler, dec: &Decoded) {
    match dec {
        Decoded::MemRef(m) => emit_lda(asm, m),
        Decoded::Operate(o) => match o.op {
            Opcode::IntA => emit_inta(asm, o),
            Opcode::IntL => emit_intl(asm, o),
            Opcode::IntS => emit_ints(asm, o),
            Opcode::IntM => emit_intm(asm, o),
            _ => unreachable!("not a native operate primary"),
        },
        _ => unreachable!("not a native body instruction"),
    }
}

fn emit_lda(asm: &mut Assembler, m: &MemRef) {
    load_guest(asm, Gpr::Rax, m.rb);
    let disp = if m.op == Opcode::Ldah {
        (m.disp as i32) << 16
    } else {
        m.disp as i32
    };
    if disp != 0 {
        asm.add_ri(Gpr::Rax, disp);
    }
    store_guest(asm, m.ra, Gpr::Rax);
}

fn emit_inta(asm: &mut Assembler, o: &Operate) {
    load_guest(asm, Gpr::Rax, o.ra);
    load_operand2(asm, Gpr::Rcx, o);

    match o.fnc {
        funcs::ADDL | funcs::S4ADDL | funcs::S8ADDL | funcs::SUBL | funcs::S4SUBL
        | funcs::S8SUBL => {
            match o.fnc {
                funcs::S4ADDL | funcs::S4SUBL => asm.shl_ri(Gpr::Rax, 2),
                funcs::S8ADDL | funcs::S8SUBL => asm.shl_ri(Gpr::Rax, 3),
                _ => {}
            }
            if matches!(o.fnc, funcs::ADDL | funcs::S4ADDL | funcs::S8ADDL) {
                asm.add_rr32(Gpr::Rax, Gpr::Rcx);
            } else {
                asm.sub_rr32(Gpr::Rax, Gpr::Rcx);
            }
            emit_cc_capture_nzc(asm);
            asm.movsxd(Gpr::Rax, Gpr::Rax);
            store_guest(asm, o.rc, Gpr::Rax);
        }

        funcs::ADDQ | funcs::S4ADDQ | funcs::S8ADDQ | funcs::SUBQ | funcs::S4SUBQ
        | funcs::S8SUBQ => {
            match o.fnc {
                funcs::S4ADDQ | funcs::S4SUBQ => asm.shl_ri(Gpr::Rax, 2),
                funcs::S8ADDQ | funcs::S8SUBQ => asm.shl_ri(Gpr::Rax, 3),
                _ => {}
            }
            if matches!(o.fnc, funcs::ADDQ | funcs::S4ADDQ | funcs::S8ADDQ) {
                asm.add_rr(Gpr::Rax, Gpr::Rcx);
            } else {
                asm.sub_rr(Gpr::Rax, Gpr::Rcx);
            }
            emit_cc_capture_nzc(asm);
            store_guest(asm, o.rc, Gpr::Rax);
        }

        funcs::CMPEQ | funcs::CMPLT | funcs::CMPLE | funcs::CMPULT | funcs::CMPULE => {
            let cc = match o.fnc {
                funcs::CMPEQ => Cc::E,
                funcs::CMPLT => Cc::L,
                funcs::CMPLE => Cc::Le,
                funcs::CMPULT => Cc::B,
                _ => Cc::Be,
            };
            asm.cmp_rr(Gpr::Rax, Gpr::Rcx);
            asm.setcc(cc, Gpr::Rax);
            asm.movzx_b(Gpr::Rax, Gpr::Rax);
            finish_logical(asm, o.rc);
        }

        funcs::CMPBGE => {
            asm.movq_xr(Xmm::Xmm0, Gpr::Rax);
            asm.movq_xr(Xmm::Xmm1, Gpr::Rcx);
            // min(a, b) == b per byte lane exactly when a >= b unsigned.
            asm.pminub(Xmm::Xmm0, Xmm::Xmm1);
            asm.pcmpeqb(Xmm::Xmm0, Xmm::Xmm1);
            asm.pmovmskb(Gpr::Rax, Xmm::Xmm0);
            asm.and_ri(Gpr::Rax, 0xFF);
            finish_logical(asm, o.rc);
        }

        _ => unreachable!("uncovered IntA function {:#x}", o.fnc),
    }
}

fn emit_intl(asm: &mut Assembler, o: &Operate) {
    match o.fnc {
        funcs::AND | funcs::BIC | funcs::BIS | funcs::ORNOT | funcs::XOR | funcs::EQV => {
            load_guest(asm, Gpr::Rax, o.ra);
            load_operand2(asm, Gpr::Rcx, o);
            match o.fnc {
                funcs::AND => asm.and_rr(Gpr::Rax, Gpr::Rcx),
                funcs::BIS => asm.or_rr(Gpr::Rax, Gpr::Rcx),
                funcs::XOR => asm.xor_rr(Gpr::Rax, Gpr::Rcx),
                funcs::BIC => {
                    asm.not_r(Gpr::Rcx);
                    asm.and_rr(Gpr::Rax, Gpr::Rcx);
                }
                funcs::ORNOT => {
                    asm.not_r(Gpr::Rcx);
                    asm.or_rr(Gpr::Rax, Gpr::Rcx);
                }
                funcs::EQV => {
                    asm.xor_rr(Gpr::Rax, Gpr::Rcx);
                    asm.not_r(Gpr::Rax);
                }
                _ => unreachable!(),
            }
            finish_logical(asm, o.rc);
        }

        funcs::CMOVLBS | funcs::CMOVLBC | funcs::CMOVEQ | funcs::CMOVNE | funcs::CMOVLT
        | funcs::CMOVGE | funcs::CMOVLE | funcs::CMOVGT => {
            load_guest(asm, Gpr::Rax, o.ra);
            let cc = match o.fnc {
                funcs::CMOVLBS => {
                    asm.and_ri(Gpr::Rax, 1);
                    Cc::Ne
                }
                funcs::CMOVLBC => {
                    asm.and_ri(Gpr::Rax, 1);
                    Cc::E
                }
                other => {
                    asm.test_rr(Gpr::Rax, Gpr::Rax);
                    match other {
                        funcs::CMOVEQ => Cc::E,
                        funcs::CMOVNE => Cc::Ne,
                        funcs::CMOVLT => Cc::S,
                        funcs::CMOVGE => Cc::Ns,
                        funcs::CMOVLE => Cc::Le,
                        _ => Cc::G,
                    }
                }
            };
            load_operand2(asm, Gpr::Rcx, o);
            load_guest(asm, Gpr::Rdx, o.rc);
            asm.cmovcc(cc, Gpr::Rdx, Gpr::Rcx);
            store_guest(asm, o.rc, Gpr::Rdx);
        }

        funcs::AMASK => {
            load_operand2(asm, Gpr::Rax, o);
            asm.mov_ri64(Gpr::Rcx, !AMASK_VALUE);
            asm.and_rr(Gpr::Rax, Gpr::Rcx);
            store_guest(asm, o.rc, Gpr::Rax);
        }

        funcs::IMPLVER => {
            asm.mov_ri64(Gpr::Rax, IMPLVER_VALUE);
            store_guest(asm, o.rc, Gpr::Rax);
        }

        _ => unreachable!("uncovered IntL function {:#x}", o.fnc),
    }
}

fn emit_ints(asm: &mut Assembler, o: &Operate) {
    load_guest(asm, Gpr::Rax, o.ra);
    match o.fnc {
        funcs::SLL | funcs::SRL | funcs::SRA => {
            if o.lit {
                let amount = o.literal() & 63;
                match o.fnc {
                    funcs::SLL => asm.shl_ri(Gpr::Rax, amount),
                    funcs::SRL => asm.shr_ri(Gpr::Rax, amount),
                    _ => asm.sar_ri(Gpr::Rax, amount),
                }
            } else {
                load_guest(asm, Gpr::Rcx, o.rb());
                match o.fnc {
                    funcs::SLL => asm.shl_cl(Gpr::Rax),
                    funcs::SRL => asm.shr_cl(Gpr::Rax),
                    _ => asm.sar_cl(Gpr::Rax),
                }
            }
            finish_logical(asm, o.rc);
        }

        funcs::EXTBL | funcs::EXTWL | funcs::EXTLL | funcs::EXTQL => {
            // Byte shift from the low three bits of operand 2.
            if o.lit {
                asm.shr_ri(Gpr::Rax, (o.literal() & 7) * 8);
            } else {
                load_guest(asm, Gpr::Rcx, o.rb());
                asm.and_ri(Gpr::Rcx, 7);
                asm.shl_ri(Gpr::Rcx, 3);
                asm.shr_cl(Gpr::Rax);
            }
            match o.fnc {
                funcs::EXTBL => asm.and_ri(Gpr::Rax, 0xFF),
                funcs::EXTWL => asm.and_ri(Gpr::Rax, 0xFFFF),
                funcs::EXTLL => {
                    asm.mov_ri32(Gpr::Rdx, u32::MAX);
                    asm.and_rr(Gpr::Rax, Gpr::Rdx);
                }
                _ => {}
            }
            finish_logical(asm, o.rc);
        }

        funcs::ZAP | funcs::ZAPNOT => {
            debug_assert!(o.lit, "register-form ZAP is interpreted");
            let mut mask = byte_mask(o.literal());
            if o.fnc == funcs::ZAP {
                mask = !mask;
            }
            asm.mov_ri64(Gpr::Rcx, mask);
            asm.and_rr(Gpr::Rax, Gpr::Rcx);
            finish_logical(asm, o.rc);
        }

        _ => unreachable!("uncovered IntS function {:#x}", o.fnc),
    }
}

fn emit_intm(asm: &mut Assembler, o: &Operate) {
    load_guest(asm, Gpr::Rax, o.ra);
    load_operand2(asm, Gpr::Rcx, o);
    match o.fnc {
        funcs::MULL => {
            asm.imul_rr32(Gpr::Rax, Gpr::Rcx);
            asm.movsxd(Gpr::Rax, Gpr::Rax);
        }
        funcs::MULQ => {
            asm.imul_rr(Gpr::Rax, Gpr::Rcx);
        }
        funcs::UMULH => {
            asm.mul_r(Gpr::Rcx);
            asm.mov_rr(Gpr::Rax, Gpr::Rdx);
        }
        _ => unreachable!("uncovered IntM function {:#x}", o.fnc),
    }
    finish_logical(asm, o.rc);
}

/// Expand a ZAPNOT-style byte-lane selector into a 64-bit mask.
fn byte_mask(selector: u8) -> u64 {
    let mut mask = 0u64;
    for lane in 0..8 {
        if selector & (1 << lane) != 0 {
            mask |= 0xFFu64 << (8 * lane);
        }
    }
    mask
}

fn emit_ender(asm: &mut Assembler, pc: u64, word: u32, dec: &Decoded, exit: crate::asm::Label) {
    match dec {
        Decoded::Branch(b) if is_int_branch(b.op) => emit_cond_branch(asm, pc, b),
        Decoded::Branch(b) if matches!(b.op, Opcode::Br | Opcode::Bsr) => {
            if b.op == Opcode::Bsr {
                asm.mov_ri64(Gpr::Rax, pc.wrapping_add(4));
                store_guest(asm, b.ra, Gpr::Rax);
            }
            emit_set_pc(asm, b.target(pc));
        }
        Decoded::MemRef(m) if m.op == Opcode::Jsr => emit_jump(asm, pc, m),
        // FP branches, CALL_PAL and reserved words exit through the
        // interpreter, which leaves PC fully resolved.
        _ => emit_fallback(asm, pc, word, exit),
    }
}

fn is_int_branch(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::Blbc
            | Opcode::Beq
            | Opcode::Blt
            | Opcode::Ble
            | Opcode::Blbs
            | Opcode::Bne
            | Opcode::Bge
            | Opcode::Bgt
    )
}

fn emit_cond_branch(asm: &mut Assembler, pc: u64, b: &Branch) {
    load_guest(asm, Gpr::Rax, b.ra);
    let cc = match b.op {
        Opcode::Blbs => {
            asm.and_ri(Gpr::Rax, 1);
            Cc::Ne
        }
        Opcode::Blbc => {
            asm.and_ri(Gpr::Rax, 1);
            Cc::E
        }
        other => {
            asm.test_rr(Gpr::Rax, Gpr::Rax);
            match other {
                Opcode::Beq => Cc::E,
                Opcode::Bne => Cc::Ne,
                Opcode::Blt => Cc::S,
                Opcode::Bge => Cc::Ns,
                Opcode::Ble => Cc::Le,
                Opcode::Bgt => Cc::G,
                _ => unreachable!(),
            }
        }
    };
    asm.mov_ri64(Gpr::Rax, pc.wrapping_add(4));
    asm.mov_ri64(Gpr::Rcx, b.target(pc));
    asm.cmovcc(cc, Gpr::Rax, Gpr::Rcx);
    asm.store(ENV, ENV_PC_OFFSET, Gpr::Rax);
}

fn emit_jump(asm: &mut Assembler, pc: u64, m: &MemRef) {
    // Target before any Ra write: Ra and Rb may be the same register.
    load_guest(asm, Gpr::Rcx, m.rb);
    asm.and_ri(Gpr::Rcx, -4);
    let kind = ((m.disp as u16) >> 14) as u8;
    if kind != funcs::RET {
        asm.mov_ri64(Gpr::Rax, pc.wrapping_add(4));
        store_guest(asm, m.ra, Gpr::Rax);
    }
    asm.store(ENV, ENV_PC_OFFSET, Gpr::Rcx);
}

/// Retire-time bookkeeping the runtime needs from a finished block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExit {
    /// Next guest PC.
    pub pc: u64,
    /// Whether a trap was raised inside the block.
    pub trapped: bool,
}

/// Read the exit state out of an environment after a run.
pub fn block_exit(env: &crate::runtime::JitEnv) -> BlockExit {
    BlockExit { pc: env.pc, trapped: env.trap != 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mask_expansion() {
        assert_eq!(byte_mask(0x00), 0);
        assert_eq!(byte_mask(0x01), 0xFF);
        assert_eq!(byte_mask(0x81), 0xFF00_0000_0000_00FF);
        assert_eq!(byte_mask(0xFF), u64::MAX);
    }

    #[test]
    fn coverage_classification() {
        use evax_core::decode;
        // ADDQ R2, R3, R4 is native.
        assert!(is_native_body(&decode(0x4043_0404)));
        // ADDQ/V is not.
        let v = Operate::with_regs(Opcode::IntA, funcs::ADDQ_V, 2, 3, 4).encode();
        assert!(!is_native_body(&decode(v)));
        // LDQ goes through the interpreter.
        assert!(!is_native_body(&decode(
            MemRef { op: Opcode::Ldq, ra: 1, rb: 2, disp: 0 }.encode()
        )));
        // Branches end blocks.
        assert!(is_block_ender(&decode(0xF4BF_FFFF)));
    }
}
