//! Block IR and the optional optimization passes.
//!
//! A block body is a straight line of guest instructions; the passes fold
//! the LDA/LDAH constant-materialization idiom into immediate loads and
//! drop materializations whose destination is overwritten before any use.
//! Ops with condition-code or memory effects are never touched.

use std::collections::{HashMap, HashSet};

use evax_core::{Decoded, Opcode};

use crate::emitters::ZERO;

/// One body operation of a block under compilation.
#[derive(Debug, Clone, Copy)]
pub enum BlockOp {
    /// Emitted natively from the decoded fields.
    Native { pc: u64, dec: Decoded },
    /// Emitted as a host call into the interpreter.
    Fallback { pc: u64, word: u32 },
    /// A folded constant materialization.
    LoadConst { rc: u8, value: u64 },
}

/// Apply the passes selected by `level`: 0 none, 1 constant folding,
/// 2 constant folding plus dead-materialization elimination.
pub fn optimize(ops: &mut Vec<BlockOp>, level: u8) {
    if level >= 1 {
        fold_address_constants(ops);
    }
    if level >= 2 {
        eliminate_dead_materializations(ops);
    }
}

/// Fold LDA/LDAH chains rooted at R31 (or at an already-folded register)
/// into `LoadConst`.
fn fold_address_constants(ops: &mut [BlockOp]) {
    let mut known: HashMap<u8, u64> = HashMap::new();

    for op in ops.iter_mut() {
        match *op {
            BlockOp::Native { dec: Decoded::MemRef(m), .. }
                if matches!(m.op, Opcode::Lda | Opcode::Ldah) =>
            {
                let base = if m.rb == ZERO {
                    Some(0)
                } else {
                    known.get(&m.rb).copied()
                };
                let shift = if m.op == Opcode::Ldah { 16 } else { 0 };
                match base {
                    Some(base) => {
                        let value = base.wrapping_add(((m.disp as i64) << shift) as u64);
                        known.insert(m.ra, value);
                        *op = BlockOp::LoadConst { rc: m.ra, value };
                    }
                    None => {
                        known.remove(&m.ra);
                    }
                }
            }
            BlockOp::Native { dec, .. } => {
                for written in writes(&dec) {
                    known.remove(&written);
                }
            }
            BlockOp::LoadConst { rc, value } => {
                known.insert(rc, value);
            }
            // The interpreter may write any register.
            BlockOp::Fallback { .. } => known.clear(),
        }
    }
}

/// Remove materializations (`LoadConst`, native LDA/LDAH) whose
/// destination is overwritten before any read. Only those ops qualify:
/// they have no condition-code or memory side effects.
fn eliminate_dead_materializations(ops: &mut Vec<BlockOp>) {
    let mut dead: HashSet<u8> = HashSet::new();
    // R31 is permanently dead storage.
    dead.insert(ZERO);

    let mut keep = vec![true; ops.len()];
    for (i, op) in ops.iter().enumerate().rev() {
        match op {
            BlockOp::LoadConst { rc, .. } => {
                if dead.contains(rc) {
                    keep[i] = false;
                    continue;
                }
                dead.insert(*rc);
            }
            BlockOp::Native { dec, .. } => {
                let is_materialization = matches!(
                    dec,
                    Decoded::MemRef(m) if matches!(m.op, Opcode::Lda | Opcode::Ldah)
                );
                let ws = writes(dec);
                if is_materialization && !ws.is_empty() && ws.iter().all(|w| dead.contains(w)) {
                    keep[i] = false;
                    continue;
                }
                for w in ws {
                    dead.insert(w);
                }
                for r in reads(dec) {
                    if r != ZERO {
                        dead.remove(&r);
                    }
                }
            }
            BlockOp::Fallback { .. } => {
                dead.clear();
                dead.insert(ZERO);
            }
        }
    }

    let mut idx = 0;
    ops.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

/// Registers a decoded body instruction writes.
fn writes(dec: &Decoded) -> Vec<u8> {
    match dec {
        Decoded::Operate(o) | Decoded::Vector(o) => vec![o.rc],
        Decoded::MemRef(m) => match m.op {
            Opcode::Lda | Opcode::Ldah => vec![m.ra],
            _ => vec![m.ra],
        },
        _ => Vec::new(),
    }
}

/// Registers a decoded body instruction reads.
fn reads(dec: &Decoded) -> Vec<u8> {
    match dec {
        Decoded::Operate(o) | Decoded::Vector(o) => {
            let mut r = vec![o.ra];
            if !o.lit {
                r.push(o.rb());
            }
            // Conditional moves read the current destination.
            if o.op == Opcode::IntL
                && matches!(o.fnc, 0x14 | 0x16 | 0x24 | 0x26 | 0x44 | 0x46 | 0x64 | 0x66)
            {
                r.push(o.rc);
            }
            r
        }
        Decoded::MemRef(m) => vec![m.rb],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evax_core::{decode, MemRef};

    fn lda(ra: u8, rb: u8, disp: i16) -> BlockOp {
        let word = MemRef { op: Opcode::Lda, ra, rb, disp }.encode();
        BlockOp::Native { pc: 0, dec: decode(word) }
    }

    fn ldah(ra: u8, rb: u8, disp: i16) -> BlockOp {
        let word = MemRef { op: Opcode::Ldah, ra, rb, disp }.encode();
        BlockOp::Native { pc: 0, dec: decode(word) }
    }

    #[test]
    fn folds_ldah_lda_pairs() {
        // The canonical address idiom: LDAH R1, 0x1234(R31); LDA R1, 0x5678(R1).
        let mut ops = vec![ldah(1, ZERO, 0x1234), lda(1, 1, 0x5678)];
        optimize(&mut ops, 1);
        assert!(matches!(ops[0], BlockOp::LoadConst { rc: 1, value: 0x1234_0000 }));
        assert!(
            matches!(ops[1], BlockOp::LoadConst { rc: 1, value: 0x1234_5678 }),
            "{:?}",
            ops[1]
        );
    }

    #[test]
    fn fold_stops_at_unknown_base() {
        let mut ops = vec![lda(1, 2, 8)];
        optimize(&mut ops, 1);
        assert!(matches!(ops[0], BlockOp::Native { .. }));
    }

    #[test]
    fn dse_removes_overwritten_materialization() {
        let mut ops = vec![lda(1, ZERO, 1), lda(1, ZERO, 2)];
        optimize(&mut ops, 2);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], BlockOp::LoadConst { rc: 1, value: 2 }));
    }

    #[test]
    fn dse_keeps_read_materialization() {
        // LDA R1, 1(R31); LDA R2, 0(R1): the first is read by the second.
        let mut ops = vec![lda(1, ZERO, 1), lda(2, 1, 0)];
        optimize(&mut ops, 2);
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn fallback_is_a_barrier() {
        let mut ops = vec![lda(1, ZERO, 1), BlockOp::Fallback { pc: 4, word: 0 }, lda(1, ZERO, 2)];
        optimize(&mut ops, 2);
        // The first materialization stays: the fallback may read R1.
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn zero_register_materialization_is_dropped() {
        let mut ops = vec![lda(ZERO, ZERO, 4)];
        optimize(&mut ops, 2);
        assert!(ops.is_empty());
    }
}
