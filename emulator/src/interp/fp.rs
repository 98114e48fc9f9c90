//! Floating-point operate groups, primaries 0x14-0x17.
//!
//! IEEE S and T run on the host float types with explicit flag synthesis;
//! directed rounding is applied by residue sign (exact for add/sub via
//! two-sum and for mul/div/sqrt via fused multiply-add). VAX F, G and D
//! values live in registers as their numeric doubles and are range-checked
//! against the target format after each operation; D rides the G path.
//!
//! Registers hold the T-format (double) image for every precision; S is
//! narrowed on the way out. F31 reads as +0.0 everywhere.

use evax_core::{
    f64_to_vax_f, f64_to_vax_g, funcs, FpCc, FpFlag, FpFunction, FpOp, FpOperate, FpRounding,
    FpSource, GuestMemory, Trap,
};

use super::{sext32, Dispatch};
use crate::cpu::Cpu;

/// Canonical true value written by the FP compares.
const FP_TRUE: u64 = 0x4000_0000_0000_0000;

/// Fully resolved rounding mode (the dynamic FPCR encoding includes
/// round-to-plus-infinity, which no instruction field can name directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    Chopped,
    MinusInf,
    Nearest,
    PlusInf,
}

fn resolve_rounding(cpu: &Cpu, mode: FpRounding) -> Round {
    match mode {
        FpRounding::Chopped => Round::Chopped,
        FpRounding::MinusInfinity => Round::MinusInf,
        FpRounding::Normal => Round::Nearest,
        FpRounding::Dynamic => match cpu.regs.fpcr.dynamic_rounding() {
            FpRounding::Chopped => Round::Chopped,
            FpRounding::MinusInfinity => Round::MinusInf,
            FpRounding::Normal => Round::Nearest,
            FpRounding::Dynamic => Round::PlusInf,
        },
    }
}

/// Exception outcome of one operation, in FPCR sticky-flag order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    invalid: bool,
    dbz: bool,
    overflow: bool,
    underflow: bool,
    inexact: bool,
    int_overflow: bool,
}

impl Flags {
    fn summary_bits(&self) -> u8 {
        (self.invalid as u8)
            | (self.dbz as u8) << 1
            | (self.overflow as u8) << 2
            | (self.underflow as u8) << 3
            | (self.inexact as u8) << 4
            | (self.int_overflow as u8) << 5
    }
}

/// Write the destination, fold the flags into FPCR and raise the
/// arithmetic trap if the qualifier and trap enables call for one.
/// Destination first: FP traps complete imprecisely.
fn finish(cpu: &mut Cpu, f: &FpOperate, bits: u64, flags: Flags) {
    cpu.regs.write_fp(f.fc as usize, bits);
    deliver_flags(cpu, f, flags);
}

fn deliver_flags(cpu: &mut Cpu, f: &FpOperate, flags: Flags) {
    let qualifier = f.function().qualifier;
    let mut trap: Option<Trap> = None;

    let mut consider = |cpu: &mut Cpu, raised: bool, flag: FpFlag, kind: Trap, trap: &mut Option<Trap>| {
        if !raised {
            return;
        }
        let newly = cpu.regs.fpcr.raise(flag);
        let inexact_ok = !matches!(flag, FpFlag::Inexact) || qualifier.traps_inexact();
        if newly && qualifier.traps_enabled() && inexact_ok && cpu.regs.fpcr.trap_enabled(flag) && trap.is_none() {
            *trap = Some(kind);
        }
    };

    consider(cpu, flags.invalid, FpFlag::InvalidOperation, Trap::FpInvalidOperation, &mut trap);
    consider(cpu, flags.dbz, FpFlag::DivisionByZero, Trap::FpDivisionByZero, &mut trap);
    consider(cpu, flags.overflow, FpFlag::Overflow, Trap::FpOverflow, &mut trap);
    consider(cpu, flags.underflow, FpFlag::Underflow, Trap::FpUnderflow, &mut trap);
    consider(cpu, flags.inexact, FpFlag::Inexact, Trap::FpInexact, &mut trap);
    consider(cpu, flags.int_overflow, FpFlag::IntegerOverflow, Trap::IntegerOverflow, &mut trap);

    if let Some(kind) = trap {
        cpu.raise_fp_trap(kind, flags.summary_bits());
    }
}

// --- IEEE arithmetic ------------------------------------------------------

macro_rules! ieee_arith {
    ($name:ident, $ty:ty) => {
        /// Compute one IEEE operation with directed rounding and flag
        /// synthesis. Returns the rounded value and its flags.
        fn $name(op: FpOp, a: $ty, b: $ty, round: Round) -> ($ty, Flags) {
            let mut flags = Flags::default();

            let invalid = match op {
                FpOp::Add => a.is_infinite() && b.is_infinite() && a.signum() != b.signum(),
                FpOp::Sub => a.is_infinite() && b.is_infinite() && a.signum() == b.signum(),
                FpOp::Mul => {
                    (a == 0.0 && b.is_infinite()) || (a.is_infinite() && b == 0.0)
                }
                FpOp::Div => {
                    (a == 0.0 && b == 0.0) || (a.is_infinite() && b.is_infinite())
                }
                FpOp::Sqrt => b < 0.0,
                _ => false,
            };
            if invalid {
                flags.invalid = true;
                return (<$ty>::NAN, flags);
            }
            if a.is_nan() || b.is_nan() {
                // Quiet NaN propagation, no flag.
                return (if a.is_nan() { a } else { b }, flags);
            }

            if op == FpOp::Div && b == 0.0 && a != 0.0 && a.is_finite() {
                flags.dbz = true;
                let inf = if (a < 0.0) != b.is_sign_negative() { <$ty>::NEG_INFINITY } else { <$ty>::INFINITY };
                return (inf, flags);
            }

            let (mut result, err_sign) = match op {
                FpOp::Add => {
                    let s = a + b;
                    let err = two_sum_err(a, b, s);
                    (s, sign_of(err))
                }
                FpOp::Sub => {
                    let s = a - b;
                    let err = two_sum_err(a, -b, s);
                    (s, sign_of(err))
                }
                FpOp::Mul => {
                    let p = a * b;
                    let err = if p.is_finite() { a.mul_add(b, -p) } else { 0.0 };
                    (p, sign_of(err))
                }
                FpOp::Div => {
                    let q = a / b;
                    let err_sign = if q.is_finite() && b.is_finite() {
                        let r = q.mul_add(b, -a);
                        // true = q - r/b
                        if b > 0.0 { -sign_of(r) } else { sign_of(r) }
                    } else {
                        0
                    };
                    (q, err_sign)
                }
                FpOp::Sqrt => {
                    let s = b.sqrt();
                    let err_sign = if s.is_finite() {
                        let r = s.mul_add(s, -b);
                        -sign_of(r)
                    } else {
                        0
                    };
                    (s, err_sign)
                }
                _ => unreachable!("not an arithmetic op"),
            };

            if err_sign != 0 {
                flags.inexact = true;
                result = apply_direction(result, err_sign, round);
            }

            if result.is_infinite() {
                flags.overflow = true;
                flags.inexact = true;
                result = overflow_value(result, round);
            } else if result.is_subnormal() {
                flags.underflow = true;
                flags.inexact = true;
            } else if result == 0.0 && flags.inexact {
                flags.underflow = true;
            }

            (result, flags)
        }
    };
}

ieee_arith!(ieee_arith_f64, f64);
ieee_arith!(ieee_arith_f32, f32);

/// Exact error term of a rounded sum (two-sum).
fn two_sum_err<T: Float>(a: T, b: T, s: T) -> T {
    let bb = s.sub(a);
    a.sub(s.sub(bb)).add(b.sub(bb))
}

/// Minimal float abstraction for the shared error-term helpers.
trait Float: Copy {
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
}

impl Float for f64 {
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
}

impl Float for f32 {
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
}

trait Directed: Copy {
    fn next_up_(self) -> Self;
    fn next_down_(self) -> Self;
    fn max_finite() -> Self;
    fn is_zero(self) -> bool;
}

impl Directed for f64 {
    fn next_up_(self) -> Self {
        self.next_up()
    }
    fn next_down_(self) -> Self {
        self.next_down()
    }
    fn max_finite() -> Self {
        f64::MAX
    }
    fn is_zero(self) -> bool {
        self == 0.0
    }
}

impl Directed for f32 {
    fn next_up_(self) -> Self {
        self.next_up()
    }
    fn next_down_(self) -> Self {
        self.next_down()
    }
    fn max_finite() -> Self {
        f32::MAX
    }
    fn is_zero(self) -> bool {
        self == 0.0
    }
}

fn sign_of<T: PartialOrd + Default>(v: T) -> i8 {
    let zero = T::default();
    if v > zero {
        1
    } else if v < zero {
        -1
    } else {
        0
    }
}

/// Nudge a round-to-nearest result to the directed modes. `err_sign` is
/// the sign of (true value - rounded value).
fn apply_direction<T: Directed + PartialOrd + Default>(result: T, err_sign: i8, round: Round) -> T {
    match round {
        Round::Nearest => result,
        Round::Chopped => {
            let zero = T::default();
            if result > zero && err_sign < 0 {
                result.next_down_()
            } else if result < zero && err_sign > 0 {
                result.next_up_()
            } else {
                result
            }
        }
        Round::MinusInf => {
            if err_sign < 0 {
                result.next_down_()
            } else {
                result
            }
        }
        Round::PlusInf => {
            if err_sign > 0 {
                result.next_up_()
            } else {
                result
            }
        }
    }
}

/// Directed rounding of an overflowed magnitude: the modes that cannot
/// round away from zero produce the largest finite value instead.
fn overflow_value<T: Directed + PartialOrd + Default + std::ops::Neg<Output = T>>(
    inf: T,
    round: Round,
) -> T {
    let positive = inf > T::default();
    match round {
        Round::Nearest => inf,
        Round::Chopped => {
            if positive {
                T::max_finite()
            } else {
                -T::max_finite()
            }
        }
        Round::MinusInf => {
            if positive {
                T::max_finite()
            } else {
                inf
            }
        }
        Round::PlusInf => {
            if positive {
                inf
            } else {
                -T::max_finite()
            }
        }
    }
}

// --- primary 0x16: IEEE ---------------------------------------------------

pub(super) fn exec_ieee(cpu: &mut Cpu, _mem: &mut dyn GuestMemory, f: &FpOperate, word: u32) {
    // CVTST hides under a qualifier pattern of the CVTTS code.
    if f.fnc == 0x2AC || f.fnc == 0x6AC {
        let value = f64::from_bits(cpu.regs.read_fp(f.fb as usize));
        finish(cpu, f, value.to_bits(), Flags::default());
        return;
    }

    let func = f.function();
    let round = resolve_rounding(cpu, func.rounding);
    let a = f64::from_bits(cpu.regs.read_fp(f.fa as usize));
    let b = f64::from_bits(cpu.regs.read_fp(f.fb as usize));

    match func.op {
        FpOp::Add | FpOp::Sub | FpOp::Mul | FpOp::Div => match func.src {
            FpSource::Single => {
                let (value, flags) = ieee_arith_f32(func.op, a as f32, b as f32, round);
                finish(cpu, f, (value as f64).to_bits(), flags);
            }
            FpSource::Double => {
                let (value, flags) = ieee_arith_f64(func.op, a, b, round);
                finish(cpu, f, value.to_bits(), flags);
            }
            _ => cpu.raise_reserved(word),
        },

        FpOp::CmpUn | FpOp::CmpEq | FpOp::CmpLt | FpOp::CmpLe => {
            ieee_compare(cpu, f, func, a, b)
        }

        // CVTTS and CVTQS.
        FpOp::CvtNarrow => match func.src {
            FpSource::Double => cvt_to_s(cpu, f, b, round),
            FpSource::Quad => {
                let q = cpu.regs.read_fp(f.fb as usize) as i64;
                cvt_to_s(cpu, f, q as f64, round)
            }
            _ => cpu.raise_reserved(word),
        },

        // CVTQT.
        FpOp::CvtFromQuad => match func.src {
            FpSource::Quad => {
                let q = cpu.regs.read_fp(f.fb as usize) as i64;
                let value = q as f64;
                let flags =
                    Flags { inexact: value as i128 != q as i128, ..Flags::default() };
                finish(cpu, f, value.to_bits(), flags);
            }
            _ => cpu.raise_reserved(word),
        },

        // CVTTQ.
        FpOp::CvtToQuad => match func.src {
            FpSource::Double => cvt_to_quad(cpu, f, b, round),
            _ => cpu.raise_reserved(word),
        },

        _ => cpu.raise_reserved(word),
    }
}

fn ieee_compare(cpu: &mut Cpu, f: &FpOperate, func: FpFunction, a: f64, b: f64) {
    let unordered = a.is_nan() || b.is_nan();
    let mut flags = Flags::default();

    // The ordered relations on an unordered pair are an invalid
    // operation; equality and the unordered test are quiet.
    if unordered && matches!(func.op, FpOp::CmpLt | FpOp::CmpLe) {
        flags.invalid = true;
    }

    let result = match func.op {
        FpOp::CmpUn => unordered,
        FpOp::CmpEq => a == b,
        FpOp::CmpLt => a < b,
        FpOp::CmpLe => a <= b,
        _ => unreachable!(),
    };

    if unordered {
        cpu.regs.fpcr.set_condition(FpCc::Un);
    } else if a < b {
        cpu.regs.fpcr.set_condition(FpCc::Lt);
    } else if a == b {
        cpu.regs.fpcr.set_condition(FpCc::Eq);
    } else {
        cpu.regs.fpcr.set_condition(FpCc::Gt);
    }

    finish(cpu, f, if result { FP_TRUE } else { 0 }, flags);
}

/// Narrow to S precision with flags against the S range.
fn cvt_to_s(cpu: &mut Cpu, f: &FpOperate, value: f64, round: Round) {
    let mut flags = Flags::default();
    if value.is_nan() {
        finish(cpu, f, f64::NAN.to_bits(), flags);
        return;
    }
    let mut narrow = value as f32;
    if narrow as f64 != value {
        flags.inexact = true;
        // The narrowing rounded to nearest; steer it for directed modes.
        let err_sign = sign_of(value - narrow as f64);
        narrow = apply_direction(narrow, err_sign, round);
    }
    if narrow.is_infinite() && value.is_finite() {
        flags.overflow = true;
        flags.inexact = true;
        narrow = overflow_value(narrow, round);
    } else if narrow.is_subnormal() {
        flags.underflow = true;
        flags.inexact = true;
    } else if narrow.is_zero() && value != 0.0 {
        flags.underflow = true;
        flags.inexact = true;
    }
    finish(cpu, f, (narrow as f64).to_bits(), flags);
}

/// Convert to a signed quadword under the active rounding mode.
fn cvt_to_quad(cpu: &mut Cpu, f: &FpOperate, value: f64, round: Round) {
    let mut flags = Flags::default();
    if value.is_nan() {
        flags.invalid = true;
        finish(cpu, f, 0, flags);
        return;
    }
    let rounded = match round {
        Round::Chopped => value.trunc(),
        Round::MinusInf => value.floor(),
        Round::PlusInf => value.ceil(),
        Round::Nearest => value.round_ties_even(),
    };
    if rounded != value {
        flags.inexact = true;
    }
    if rounded >= 2f64.powi(63) || rounded < -(2f64.powi(63)) {
        flags.int_overflow = true;
        flags.inexact = true;
    }
    finish(cpu, f, (rounded as i64) as u64, flags);
}

// --- primary 0x15: VAX ----------------------------------------------------

pub(super) fn exec_vax(cpu: &mut Cpu, _mem: &mut dyn GuestMemory, f: &FpOperate, word: u32) {
    let func = f.function();
    let round = resolve_rounding(cpu, func.rounding);
    let a = f64::from_bits(cpu.regs.read_fp(f.fa as usize));
    let b = f64::from_bits(cpu.regs.read_fp(f.fb as usize));

    // VAX formats have no NaNs or infinities; seeing one means a reserved
    // operand reached arithmetic.
    if a.is_nan() || b.is_nan() || a.is_infinite() || b.is_infinite() {
        cpu.raise_fp_invalid();
        return;
    }

    match func.op {
        FpOp::Add | FpOp::Sub | FpOp::Mul | FpOp::Div => {
            if func.op == FpOp::Div && b == 0.0 {
                if a == 0.0 {
                    cpu.raise_fp_invalid();
                } else {
                    let flags = Flags { dbz: true, ..Flags::default() };
                    finish(cpu, f, 0, flags);
                }
                return;
            }
            let (value, mut flags) = ieee_arith_f64(func.op, a, b, round);
            vax_range_finish(cpu, f, func.src, value, &mut flags);
        }

        FpOp::CmpEq | FpOp::CmpLt | FpOp::CmpLe => {
            let result = match func.op {
                FpOp::CmpEq => a == b,
                FpOp::CmpLt => a < b,
                FpOp::CmpLe => a <= b,
                _ => unreachable!(),
            };
            if a < b {
                cpu.regs.fpcr.set_condition(FpCc::Lt);
            } else if a == b {
                cpu.regs.fpcr.set_condition(FpCc::Eq);
            } else {
                cpu.regs.fpcr.set_condition(FpCc::Gt);
            }
            finish(cpu, f, if result { FP_TRUE } else { 0 }, Flags::default());
        }

        // Converts to F: CVTGF and CVTQF.
        FpOp::CvtNarrow => match func.src {
            FpSource::Double => {
                let mut flags = Flags::default();
                if b as f32 as f64 != b {
                    flags.inexact = true;
                }
                vax_range_finish(cpu, f, FpSource::Single, b, &mut flags);
            }
            FpSource::Quad => {
                let q = cpu.regs.read_fp(f.fb as usize) as i64;
                let mut flags =
                    Flags { inexact: (q as f64) as i128 != q as i128, ..Flags::default() };
                vax_range_finish(cpu, f, FpSource::Single, q as f64, &mut flags);
            }
            _ => cpu.raise_reserved(word),
        },

        // Converts to G (or D): CVTQG and CVTDG.
        FpOp::CvtFromQuad => match func.src {
            FpSource::Quad => {
                let q = cpu.regs.read_fp(f.fb as usize) as i64;
                let mut flags =
                    Flags { inexact: (q as f64) as i128 != q as i128, ..Flags::default() };
                vax_range_finish(cpu, f, FpSource::Double, q as f64, &mut flags);
            }
            FpSource::DFloat => {
                let mut flags = Flags::default();
                vax_range_finish(cpu, f, FpSource::Double, b, &mut flags);
            }
            _ => cpu.raise_reserved(word),
        },

        // CVTGD.
        FpOp::Other(0xD) if func.src == FpSource::Double => {
            let mut flags = Flags::default();
            vax_range_finish(cpu, f, FpSource::DFloat, b, &mut flags);
        }

        // CVTGQ.
        FpOp::CvtToQuad => match func.src {
            FpSource::Double => cvt_to_quad(cpu, f, b, round),
            _ => cpu.raise_reserved(word),
        },

        // VAX square roots arrive through the 0x14 primary; anything else
        // here is unallocated.
        _ => cpu.raise_reserved(word),
    }
}

/// Range-check a VAX result against its destination format, then write.
fn vax_range_finish(cpu: &mut Cpu, f: &FpOperate, target: FpSource, value: f64, flags: &mut Flags) {
    let checked = match target {
        FpSource::Single => f64_to_vax_f(value).map(|_| value),
        _ => f64_to_vax_g(value).map(|_| value),
    };
    let bits = match checked {
        Ok(v) => v.to_bits(),
        Err(evax_core::VaxFpError::Overflow) => {
            flags.overflow = true;
            value.to_bits()
        }
        Err(evax_core::VaxFpError::Underflow) => {
            flags.underflow = true;
            0f64.to_bits()
        }
        Err(evax_core::VaxFpError::ReservedOperand) => {
            flags.invalid = true;
            0f64.to_bits()
        }
    };
    finish(cpu, f, bits, *flags);
}

// --- primary 0x14: ITOF and square roots ----------------------------------

pub(super) fn exec_itfp(cpu: &mut Cpu, _mem: &mut dyn GuestMemory, f: &FpOperate, word: u32) {
    match f.fnc {
        // ITOFS: the low longword of Ra as an S image, widened.
        0x004 => {
            let raw = cpu.regs.read_int(f.fa as usize) as u32;
            let value = f32::from_bits(raw) as f64;
            cpu.regs.write_fp(f.fc as usize, value.to_bits());
        }
        // ITOFF: the low longword of Ra as an F memory image.
        0x014 => {
            let raw = cpu.regs.read_int(f.fa as usize) as u32;
            match evax_core::vax_f_to_f64(raw) {
                Ok(value) => cpu.regs.write_fp(f.fc as usize, value.to_bits()),
                Err(_) => cpu.raise_fp_invalid(),
            }
        }
        // ITOFT: raw quadword move.
        0x024 => {
            let raw = cpu.regs.read_int(f.fa as usize);
            cpu.regs.write_fp(f.fc as usize, raw);
        }

        _ => {
            let func = f.function();
            let round = resolve_rounding(cpu, func.rounding);
            let b = f64::from_bits(cpu.regs.read_fp(f.fb as usize));
            match func.op {
                // IEEE square root, S or T.
                FpOp::Sqrt => match func.src {
                    FpSource::Single => {
                        let (value, flags) = ieee_arith_f32(FpOp::Sqrt, 0.0, b as f32, round);
                        finish(cpu, f, (value as f64).to_bits(), flags);
                    }
                    FpSource::Double => {
                        let (value, flags) = ieee_arith_f64(FpOp::Sqrt, 0.0, b, round);
                        finish(cpu, f, value.to_bits(), flags);
                    }
                    _ => cpu.raise_reserved(word),
                },
                // VAX square root, F or G.
                FpOp::Other(0xA) => {
                    if b.is_nan() || b.is_infinite() || b < 0.0 {
                        cpu.raise_fp_invalid();
                        return;
                    }
                    let (value, mut flags) = ieee_arith_f64(FpOp::Sqrt, 0.0, b, round);
                    let target = if func.src == FpSource::Single {
                        FpSource::Single
                    } else {
                        FpSource::Double
                    };
                    vax_range_finish(cpu, f, target, value, &mut flags);
                }
                _ => cpu.raise_reserved(word),
            }
        }
    }
}

// --- primary 0x17: the operate common subset ------------------------------

pub(super) fn register_fltl(d: &mut Dispatch) {
    d.fltl(funcs::CVTLQ, cvtlq);
    d.fltl(funcs::CPYS, cpys);
    d.fltl(funcs::CPYSN, cpysn);
    d.fltl(funcs::CPYSE, cpyse);
    d.fltl(funcs::MT_FPCR, mt_fpcr);
    d.fltl(funcs::MF_FPCR, mf_fpcr);
    d.fltl(funcs::FCMOVEQ, |c, m, f| fcmov(c, m, f, |a| a == 0.0));
    d.fltl(funcs::FCMOVNE, |c, m, f| fcmov(c, m, f, |a| a != 0.0));
    d.fltl(funcs::FCMOVLT, |c, m, f| fcmov(c, m, f, |a| a < 0.0));
    d.fltl(funcs::FCMOVGE, |c, m, f| fcmov(c, m, f, |a| a >= 0.0));
    d.fltl(funcs::FCMOVLE, |c, m, f| fcmov(c, m, f, |a| a <= 0.0));
    d.fltl(funcs::FCMOVGT, |c, m, f| fcmov(c, m, f, |a| a > 0.0));
    // CVTQL and its trapping variants.
    d.fltl(funcs::CVTQL, cvtql);
    d.fltl(0x130, cvtql);
    d.fltl(0x530, cvtql);
}

const SIGN: u64 = 1 << 63;
/// Sign and 11-bit exponent.
const SIGN_EXP: u64 = 0xFFF0_0000_0000_0000;

fn cpys(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let a = cpu.regs.read_fp(f.fa as usize);
    let b = cpu.regs.read_fp(f.fb as usize);
    cpu.regs.write_fp(f.fc as usize, (a & SIGN) | (b & !SIGN));
}

fn cpysn(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let a = cpu.regs.read_fp(f.fa as usize);
    let b = cpu.regs.read_fp(f.fb as usize);
    cpu.regs.write_fp(f.fc as usize, ((a ^ SIGN) & SIGN) | (b & !SIGN));
}

fn cpyse(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let a = cpu.regs.read_fp(f.fa as usize);
    let b = cpu.regs.read_fp(f.fb as usize);
    cpu.regs.write_fp(f.fc as usize, (a & SIGN_EXP) | (b & !SIGN_EXP));
}

fn fcmov(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate, predicate: impl Fn(f64) -> bool) {
    let a = f64::from_bits(cpu.regs.read_fp(f.fa as usize));
    if predicate(a) {
        let b = cpu.regs.read_fp(f.fb as usize);
        cpu.regs.write_fp(f.fc as usize, b);
    }
}

fn mt_fpcr(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    cpu.regs.fpcr.0 = cpu.regs.read_fp(f.fa as usize);
}

fn mf_fpcr(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let bits = cpu.regs.fpcr.0;
    cpu.regs.write_fp(f.fc as usize, bits);
}

/// CVTLQ: sign-extend the longword held in Fb.
fn cvtlq(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let b = cpu.regs.read_fp(f.fb as usize);
    cpu.regs.write_fp(f.fc as usize, sext32(b));
}

/// CVTQL: narrow the quadword in Fb to a longword; the trapping variants
/// raise integer overflow when the value does not fit.
fn cvtql(cpu: &mut Cpu, _: &mut dyn GuestMemory, f: &FpOperate) {
    let b = cpu.regs.read_fp(f.fb as usize);
    let narrowed = sext32(b);
    let mut flags = Flags::default();
    if narrowed != b && f.fnc != funcs::CVTQL {
        flags.int_overflow = true;
    }
    finish(cpu, f, b & 0xFFFF_FFFF, flags);
}
