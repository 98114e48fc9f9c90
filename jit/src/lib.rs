//! EVAX x86-64 code-emission layer.
//!
//! Three pieces: the [`asm::Assembler`] (append-only code buffer, labels,
//! rel32 fixups, host-primitive emitters), the per-instruction emitters
//! and block compiler in [`emitters`], and the [`runtime`] that maps
//! compiled bytes executable and caches blocks by guest PC.
//!
//! The JIT covers a curated subset of the integer instruction set; every
//! uncovered instruction is emitted as a host call back into the
//! interpreter through the block environment's fallback hook, so a block
//! always reproduces the interpreter's architectural effect exactly.

pub mod asm;
pub mod emitters;
pub mod opt;
pub mod regs;
pub mod runtime;

pub use asm::{encode_modrm, encode_rex, AsmError, Assembler, Label};
pub use emitters::{block_exit, compile_block, is_native_body, BlockExit, MAX_BLOCK_LEN};
pub use regs::{Cc, Gpr, Xmm};
pub use runtime::{
    BlockCache, CompiledBlock, ExecBuffer, FallbackFn, JitEnv, JitError, ENV_FALLBACK_OFFSET,
    ENV_GPR_OFFSET, ENV_PC_OFFSET, ENV_PS_OFFSET, ENV_TRAP_OFFSET,
};
