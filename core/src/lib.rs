//! EVAX architectural core: instruction formats, the total decoder, the
//! guest register file, the memory interface consumed by the execution
//! engines, and the trap/PAL definitions shared by the interpreter and the
//! JIT.
//!
//! This crate holds no execution policy. Everything here is state and pure
//! functions over it; the `evaxemu` crate drives the state and the
//! `evax-jit` crate compiles against it.

mod decoder;
mod formats;
mod fpcr;
mod mem;
mod opcodes;
mod pal;
mod ps;
mod registers;
mod trap;
mod vaxfp;

pub use decoder::decode;
pub use formats::{
    Branch, Decoded, FpFunction, FpOp, FpOperate, FpRounding, FpSource, FpTrapQualifier,
    InstrFormat, MemFunc, MemRef, Operate, Pal,
};
pub use fpcr::{FpCc, FpFlag, Fpcr};
pub use mem::{FlatMemory, GuestMemory, MemFault, MemResult};
pub use opcodes::{funcs, Opcode};
pub use pal::{PalFunction, PalPersonality, PalTable};
pub use ps::{Mode, Ps};
pub use registers::{RegisterFile, Reservation};
pub use trap::{
    ExceptionFrame, Trap, TrapClass, TrapInfo, EXCEPTION_FRAME_ALIGN, EXCEPTION_FRAME_BYTES,
};
pub use vaxfp::{f64_to_vax_f, f64_to_vax_g, vax_f_to_f64, vax_g_to_f64, VaxFpError};

/// Architecture extensions this implementation reports present: BWX
/// (bit 0), FIX (bit 1), CIX (bit 2) and MVI (bit 8). `AMASK` clears
/// these bits from its operand, so a result bit that survives names an
/// absent extension.
pub const AMASK_VALUE: u64 = 0x107;

/// Implementation identifier returned by `IMPLVER` (2 = EV6 generation).
pub const IMPLVER_VALUE: u64 = 2;

/// Number of architectural integer registers, including the zero register.
pub const NUM_INT_REGS: usize = 32;

/// Number of architectural floating-point registers, including F31.
pub const NUM_FP_REGS: usize = 32;

/// Index of the integer and floating-point zero registers.
pub const ZERO_REG: usize = 31;

/// Guest instruction words are always four bytes.
pub const INSTR_BYTES: u64 = 4;
