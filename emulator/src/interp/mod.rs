//! Interpreter dispatch.
//!
//! Each multi-operation format owns a table from function code to handler,
//! built once at startup. Registration of a duplicate function code is a
//! construction-time panic, never a silent overwrite. Dispatch is one
//! table index plus one indirect call.

mod arith;
mod branch;
mod fp;
mod logical;
mod memfunc;
mod memref;
mod mul;
mod shift;
mod vector;

use std::collections::HashMap;
use std::sync::OnceLock;

use evax_core::{Decoded, FpOperate, GuestMemory, MemFunc, Opcode, Operate, Trap};

use crate::cpu::Cpu;
use crate::pal_dispatch;

pub(crate) type OperateHandler = fn(&mut Cpu, &mut dyn GuestMemory, &Operate);
pub(crate) type FpHandler = fn(&mut Cpu, &mut dyn GuestMemory, &FpOperate);
pub(crate) type MemFuncHandler = fn(&mut Cpu, &mut dyn GuestMemory, &MemFunc);

/// Sign-extend the low 32 bits.
#[inline]
pub(crate) fn sext32(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}

/// The per-format dispatch tables.
pub(crate) struct Dispatch {
    inta: [Option<OperateHandler>; 128],
    intl: [Option<OperateHandler>; 128],
    ints: [Option<OperateHandler>; 128],
    intm: [Option<OperateHandler>; 128],
    vector: [Option<OperateHandler>; 128],
    /// FP operate common subset, keyed on the full 11-bit function code.
    fltl: HashMap<u16, FpHandler>,
    memfunc: HashMap<u16, MemFuncHandler>,
}

fn register_op(table: &mut [Option<OperateHandler>; 128], fnc: u8, handler: OperateHandler) {
    assert!(table[fnc as usize].is_none(), "duplicate operate function {fnc:#x}");
    table[fnc as usize] = Some(handler);
}

impl Dispatch {
    fn new() -> Self {
        let mut d = Dispatch {
            inta: [None; 128],
            intl: [None; 128],
            ints: [None; 128],
            intm: [None; 128],
            vector: [None; 128],
            fltl: HashMap::new(),
            memfunc: HashMap::new(),
        };
        arith::register(&mut d);
        logical::register(&mut d);
        shift::register(&mut d);
        mul::register(&mut d);
        vector::register(&mut d);
        fp::register_fltl(&mut d);
        memfunc::register(&mut d);
        d
    }

    pub(crate) fn inta(&mut self, fnc: u8, handler: OperateHandler) {
        register_op(&mut self.inta, fnc, handler);
    }

    pub(crate) fn intl(&mut self, fnc: u8, handler: OperateHandler) {
        register_op(&mut self.intl, fnc, handler);
    }

    pub(crate) fn ints(&mut self, fnc: u8, handler: OperateHandler) {
        register_op(&mut self.ints, fnc, handler);
    }

    pub(crate) fn intm(&mut self, fnc: u8, handler: OperateHandler) {
        register_op(&mut self.intm, fnc, handler);
    }

    pub(crate) fn vector(&mut self, fnc: u8, handler: OperateHandler) {
        register_op(&mut self.vector, fnc, handler);
    }

    pub(crate) fn fltl(&mut self, fnc: u16, handler: FpHandler) {
        let prev = self.fltl.insert(fnc, handler);
        assert!(prev.is_none(), "duplicate FP function {fnc:#x}");
    }

    pub(crate) fn memfunc(&mut self, fnc: u16, handler: MemFuncHandler) {
        let prev = self.memfunc.insert(fnc, handler);
        assert!(prev.is_none(), "duplicate memory function {fnc:#x}");
    }
}

fn dispatch() -> &'static Dispatch {
    static DISPATCH: OnceLock<Dispatch> = OnceLock::new();
    DISPATCH.get_or_init(Dispatch::new)
}

/// Execute one decoded instruction against the CPU and memory.
///
/// The handler either completes (leaving PC for the loop to advance, or
/// setting it for branches) or parks exactly one trap on the CPU.
pub(crate) fn execute(cpu: &mut Cpu, mem: &mut dyn GuestMemory, dec: &Decoded, word: u32) {
    let tables = dispatch();
    match dec {
        Decoded::Operate(o) => {
            let table = match o.op {
                Opcode::IntA => &tables.inta,
                Opcode::IntL => &tables.intl,
                Opcode::IntS => &tables.ints,
                Opcode::IntM => &tables.intm,
                _ => unreachable!("operate primary"),
            };
            match table[o.fnc as usize] {
                Some(handler) => handler(cpu, mem, o),
                None => cpu.raise_reserved(word),
            }
        }

        Decoded::Vector(o) => match tables.vector[o.fnc as usize] {
            Some(handler) => handler(cpu, mem, o),
            None => cpu.raise_reserved(word),
        },

        Decoded::FpOperate(f) => {
            if !cpu.regs.ps.fen() {
                cpu.raise_trap(Trap::FpDisabled);
                return;
            }
            match f.op {
                Opcode::Itfp => fp::exec_itfp(cpu, mem, f, word),
                Opcode::FltV => fp::exec_vax(cpu, mem, f, word),
                Opcode::FltI => fp::exec_ieee(cpu, mem, f, word),
                Opcode::FltL => match tables.fltl.get(&f.fnc) {
                    Some(handler) => handler(cpu, mem, f),
                    None => cpu.raise_reserved(word),
                },
                _ => unreachable!("fp primary"),
            }
        }

        Decoded::MemRef(m) => memref::execute(cpu, mem, m, word),

        Decoded::Branch(b) => branch::execute(cpu, mem, b),

        Decoded::MemFunc(mf) => {
            // The hint bits of FETCH/ECB/WH64 ride in the low function
            // bits; dispatch on the architected high bits.
            let key = mf.fnc & 0xFC00;
            match tables.memfunc.get(&key) {
                Some(handler) => handler(cpu, mem, mf),
                None => cpu.raise_reserved(word),
            }
        }

        Decoded::Pal(p) => pal_dispatch::call_pal(cpu, mem, p),

        Decoded::Reserved(w) => cpu.raise_reserved(*w),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evax_core::funcs;

    #[test]
    fn dispatch_tables_build() {
        let d = dispatch();
        assert!(d.inta[funcs::ADDQ as usize].is_some());
        assert!(d.intl[funcs::BIS as usize].is_some());
        assert!(d.ints[funcs::SLL as usize].is_some());
        assert!(d.intm[funcs::MULQ as usize].is_some());
        assert!(d.vector[funcs::CTPOP as usize].is_some());
        assert!(d.fltl.contains_key(&funcs::CPYS));
        assert!(d.memfunc.contains_key(&funcs::MB));
    }

    #[test]
    #[should_panic(expected = "duplicate operate function")]
    fn duplicate_registration_panics() {
        let mut d = Dispatch::new();
        d.inta(funcs::ADDQ, |_, _, _| {});
    }
}
