//! EVAX execution engine: the interpreter, the execution loop, PAL
//! dispatch and the JIT driver for one guest Alpha CPU.
//!
//! `evax-core` owns the architectural state and pure decode;
//! `evax-jit` owns code emission. This crate makes them run: the
//! [`cpu::Cpu`] fetch/decode/dispatch loop, the per-format handler
//! tables, trap delivery through the PAL personalities, and the
//! boundary-polled SMP handles.

pub mod config;
pub mod cpu;
mod interp;
mod pal_dispatch;
pub mod smp;

pub use config::{EmuConfig, Personality};
pub use cpu::{Cpu, CpuState, EmuError};
pub use smp::{Interrupt, SmpHandles};
