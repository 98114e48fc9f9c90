//! The guest CPU: register state, the pending-trap slot, the state
//! machine and the execution loop that ties fetch, decode, dispatch, trap
//! delivery and the JIT together.

use std::collections::HashMap;

use evax_core::{
    decode, GuestMemory, MemFault, PalTable, RegisterFile, Trap, TrapInfo,
};
use evax_jit::{block_exit, compile_block, BlockCache, JitEnv, JitError, MAX_BLOCK_LEN};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::EmuConfig;
use crate::interp;
use crate::pal_dispatch;
use crate::smp::SmpHandles;

/// Fatal, non-architectural failures. Architectural conditions never
/// surface here; they are delivered to the guest as traps.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("cpu {cpu}: {reason}")]
    Fatal { cpu: usize, reason: String },

    #[error("jit: {0}")]
    Jit(#[from] JitError),
}

/// Execution states of one guest CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    Halted,
    Paused,
    WaitingForInterrupt,
    ExceptionHandling,
}

/// One guest CPU.
pub struct Cpu {
    pub id: usize,
    pub regs: RegisterFile,
    pub state: CpuState,
    pub pal: PalTable,
    pub config: EmuConfig,
    pub smp: SmpHandles,

    pub(crate) pending: Option<TrapInfo>,
    pub(crate) pc_written: bool,
    /// State to restore when an SMP barrier pause lifts.
    resume_state: CpuState,
    cycle: u64,
    intr_flag: bool,

    // PAL scratch state.
    pub unique: u64,
    pub sysvalue: u64,
    pub usp: u64,
    pub kgp: u64,
    pub vptptr: u64,
    pub mces: u64,
    /// Kernel stack pointer used for exception frames when trapping out
    /// of a less privileged mode.
    pub kernel_sp: u64,

    // JIT state.
    hot: HashMap<u64, u32>,
    blocks: BlockCache,
}

impl Cpu {
    pub fn new(id: usize, config: EmuConfig) -> Self {
        let pal = PalTable::new(config.pal_personality.into(), config.pal_base);
        Cpu {
            id,
            regs: RegisterFile::new(),
            state: CpuState::Running,
            pal,
            config,
            smp: SmpHandles::new(),
            pending: None,
            pc_written: false,
            resume_state: CpuState::Running,
            cycle: 0,
            intr_flag: false,
            unique: 0,
            sysvalue: 0,
            usp: 0,
            kgp: 0,
            vptptr: 0,
            mces: 0,
            kernel_sp: 0,
            hot: HashMap::new(),
            blocks: BlockCache::new(),
        }
    }

    // --- trap plumbing ---------------------------------------------------

    /// Park a trap for delivery at this instruction boundary.
    pub fn raise(&mut self, info: TrapInfo) {
        debug_assert!(self.pending.is_none(), "handler raised two traps");
        self.pending = Some(info);
    }

    pub fn raise_trap(&mut self, trap: Trap) {
        let pc = self.regs.read_pc();
        self.raise(TrapInfo::new(trap, pc));
    }

    pub fn raise_reserved(&mut self, word: u32) {
        let pc = self.regs.read_pc();
        self.raise(TrapInfo::new(Trap::ReservedInstruction, pc).with_word(word));
    }

    pub fn raise_mem(&mut self, fault: MemFault, is_write: bool) {
        let pc = self.regs.read_pc();
        let trap = Trap::from_mem_fault(fault, is_write);
        self.raise(TrapInfo::new(trap, pc).with_va(fault.va()));
    }

    pub fn raise_fp_invalid(&mut self) {
        let pc = self.regs.read_pc();
        self.raise(TrapInfo::new(Trap::FpInvalidOperation, pc).with_fp_summary(1));
    }

    pub fn raise_fp_trap(&mut self, trap: Trap, summary: u8) {
        let pc = self.regs.read_pc();
        self.raise(TrapInfo::new(trap, pc).with_fp_summary(summary));
    }

    pub fn pending_trap(&self) -> Option<&TrapInfo> {
        self.pending.as_ref()
    }

    // --- handler services ------------------------------------------------

    /// Redirect PC; the loop will not advance past it this step.
    pub fn branch_to(&mut self, target: u64) {
        self.regs.write_pc(target);
        self.pc_written = true;
    }

    /// The monotonically non-decreasing cycle counter behind RPCC.
    pub fn rpcc(&self) -> u64 {
        self.cycle
    }

    /// Read-and-set / read-and-clear of the intra-processor flag.
    pub fn take_intr_flag(&mut self, set: bool) -> bool {
        std::mem::replace(&mut self.intr_flag, set)
    }

    /// Post-store bookkeeping: a write to the locked line kills the local
    /// reservation, and other CPUs hear about it through the memory
    /// system.
    pub fn note_store(&mut self, mem: &mut dyn GuestMemory, ea: u64) {
        if self.regs.reservation.intersects(ea) {
            self.regs.reservation.clear();
        }
        mem.invalidate_reservations(self.id, ea);
    }

    /// Drop compiled code, e.g. on IMB.
    pub fn invalidate_jit(&mut self) {
        self.blocks.invalidate_all();
        self.hot.clear();
    }

    // --- the execution loop ----------------------------------------------

    /// Deliver a queued interrupt if the state and IPL allow it at this
    /// boundary. Returns true when one was delivered (consuming the
    /// boundary).
    fn poll_interrupts(&mut self, mem: &mut dyn GuestMemory) -> Result<bool, EmuError> {
        match self.state {
            CpuState::WaitingForInterrupt => {
                if let Some(interrupt) = self.smp.poll_interrupt() {
                    self.state = CpuState::Running;
                    self.raise_trap(interrupt.trap());
                    self.deliver_pending(mem)?;
                    return Ok(true);
                }
                Ok(false)
            }
            CpuState::Running if self.regs.ps.ipl() < 31 && self.smp.interrupt_pending() => {
                if let Some(interrupt) = self.smp.poll_interrupt() {
                    self.raise_trap(interrupt.trap());
                    self.deliver_pending(mem)?;
                    return Ok(true);
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// One instruction boundary: accept an interrupt or fetch, decode,
    /// execute and deliver any trap. A no-op in the halted, paused and
    /// (interrupt-less) waiting states.
    pub fn step(&mut self, mem: &mut dyn GuestMemory) -> Result<(), EmuError> {
        if self.poll_interrupts(mem)? {
            return Ok(());
        }
        match self.state {
            CpuState::Running | CpuState::ExceptionHandling => {}
            _ => return Ok(()),
        }

        self.cycle = self.cycle.wrapping_add(1);
        self.pc_written = false;

        let pc = self.regs.read_pc();
        let word = match mem.read_va(self.id, pc, 4) {
            Ok(raw) => raw as u32,
            Err(fault) => {
                self.raise_mem(fault, false);
                return self.deliver_pending(mem);
            }
        };

        let dec = decode(word);
        interp::execute(self, mem, &dec, word);

        if self.pending.is_some() {
            return self.deliver_pending(mem);
        }
        if !self.pc_written {
            self.regs.advance_pc();
        }
        Ok(())
    }

    fn deliver_pending(&mut self, mem: &mut dyn GuestMemory) -> Result<(), EmuError> {
        if self.pending.is_some() {
            pal_dispatch::deliver_trap(self, mem)?;
        }
        Ok(())
    }

    /// Run until halt, a stop request, or `max_steps` instruction
    /// boundaries. Returns the number of instructions retired.
    pub fn run(&mut self, mem: &mut dyn GuestMemory, max_steps: Option<u64>) -> Result<u64, EmuError> {
        let mut steps = 0u64;
        let mut boundaries = 0u64;
        loop {
            if self.smp.stop_requested() {
                return Ok(steps);
            }
            if let Some(limit) = max_steps {
                if boundaries >= limit {
                    return Ok(steps);
                }
            }
            boundaries += 1;

            if self.smp.barrier_raised() {
                if self.state != CpuState::Paused {
                    self.resume_state = self.state;
                    self.state = CpuState::Paused;
                }
                std::thread::yield_now();
                continue;
            }
            if self.state == CpuState::Paused {
                self.state = self.resume_state;
            }
            if self.state == CpuState::Halted {
                return Ok(steps);
            }

            if self.poll_interrupts(mem)? {
                continue;
            }

            if self.config.jit_enabled && matches!(self.state, CpuState::Running | CpuState::ExceptionHandling) {
                if let Some(executed) = self.jit_step(mem)? {
                    steps += executed;
                    continue;
                }
            }

            let executing = matches!(self.state, CpuState::Running | CpuState::ExceptionHandling);
            self.step(mem)?;
            if executing {
                steps += 1;
            } else {
                std::thread::yield_now();
            }
        }
    }

    // --- JIT driving -----------------------------------------------------

    /// Execute or warm up the block at the current PC. Returns the number
    /// of guest instructions a block retired, or None to interpret.
    fn jit_step(&mut self, mem: &mut dyn GuestMemory) -> Result<Option<u64>, EmuError> {
        let pc = self.regs.read_pc();

        if self.blocks.get(pc).is_some() {
            return self.run_block(mem, pc).map(Some);
        }

        let count = self.hot.entry(pc).or_insert(0);
        *count += 1;
        if *count == self.config.jit_threshold.max(1) {
            self.compile_at(mem, pc)?;
        }
        Ok(None)
    }

    fn compile_at(&mut self, mem: &mut dyn GuestMemory, pc: u64) -> Result<(), EmuError> {
        let mut words = Vec::with_capacity(MAX_BLOCK_LEN);
        for i in 0..MAX_BLOCK_LEN as u64 {
            match mem.read_va(self.id, pc + 4 * i, 4) {
                Ok(raw) => words.push(raw as u32),
                Err(_) => break,
            }
        }
        if words.is_empty() {
            // The fetch itself will fault; let the interpreter raise it.
            return Ok(());
        }
        let block = compile_block(pc, &words, self.config.jit_optimization_level)?;
        debug!(
            pc,
            guest_len = block.guest_len,
            native = block.native_count,
            code_bytes = block.code_bytes().len(),
            "compiled block"
        );
        self.blocks.insert(block);
        Ok(())
    }

    fn run_block(&mut self, mem: &mut dyn GuestMemory, pc: u64) -> Result<u64, EmuError> {
        // The block is removed for the duration of the run so the
        // fallback hook can borrow the CPU mutably.
        let block = self.blocks.take(pc).expect("block checked above");

        let mut env = JitEnv {
            gpr: [0; 32],
            pc,
            ps: self.regs.ps.0,
            trap: 0,
            _pad: 0,
            host: std::ptr::null_mut(),
            fallback: jit_fallback,
        };
        for i in 0..31 {
            env.gpr[i] = self.regs.read_int(i);
        }

        let mut ctx = FallbackCtx { cpu: self as *mut Cpu, mem: mem as *mut dyn GuestMemory };
        env.host = &mut ctx as *mut FallbackCtx as *mut core::ffi::c_void;

        let guest_len = block.guest_len as u64;
        // SAFETY: the block was produced by compile_block for this
        // architecture, and env/ctx outlive the call.
        unsafe { block.run(&mut env) };

        let exit = block_exit(&env);
        for i in 0..31 {
            self.regs.write_int(i, env.gpr[i]);
        }
        self.regs.ps.0 = env.ps;
        self.regs.write_pc(exit.pc);
        self.blocks.insert(block);

        if exit.trapped {
            // The fallback hook left the pending trap on the CPU.
            self.deliver_pending(mem)?;
        }
        self.cycle = self.cycle.wrapping_add(guest_len);
        Ok(guest_len)
    }
}

struct FallbackCtx<'a> {
    cpu: *mut Cpu,
    mem: *mut (dyn GuestMemory + 'a),
}

/// Interpreter re-entry for one instruction, called from generated code.
/// Syncs the environment into the CPU, executes, and syncs back. Returns
/// nonzero when a trap is pending and the block must exit.
extern "C" fn jit_fallback(env: *mut JitEnv, word: u32) -> u32 {
    // SAFETY: generated blocks pass the env they were entered with; its
    // host pointer was set by run_block just before the call.
    unsafe {
        let env = &mut *env;
        let ctx = &mut *(env.host as *mut FallbackCtx);
        let cpu = &mut *ctx.cpu;
        let mem = &mut *ctx.mem;

        for i in 0..31 {
            cpu.regs.write_int(i, env.gpr[i]);
        }
        cpu.regs.ps.0 = env.ps;
        cpu.regs.write_pc(env.pc);
        cpu.pc_written = false;

        let dec = decode(word);
        interp::execute(cpu, mem, &dec, word);

        let trapped = cpu.pending.is_some();
        if !trapped && !cpu.pc_written {
            cpu.regs.advance_pc();
        }

        for i in 0..31 {
            env.gpr[i] = cpu.regs.read_int(i);
        }
        env.gpr[31] = 0;
        env.ps = cpu.regs.ps.0;
        env.pc = cpu.regs.read_pc();
        env.trap = trapped as u32;
        if trapped {
            trace!(word, pc = env.pc, "fallback instruction trapped");
        }
        trapped as u32
    }
}

impl Cpu {
    /// Halt with a fatal, non-architectural error.
    pub(crate) fn fatal(&mut self, reason: impl Into<String>) -> EmuError {
        let reason = reason.into();
        warn!(cpu = self.id, %reason, "fatal core error; halting");
        self.state = CpuState::Halted;
        EmuError::Fatal { cpu: self.id, reason }
    }
}
