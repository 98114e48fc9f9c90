//! JIT runtime: the block environment, executable code memory and the
//! per-CPU block cache.
//!
//! Compiled blocks are `extern "C"` functions taking a single pointer to
//! [`JitEnv`]. The environment starts with the guest integer register
//! array so the pinned base register addresses guest registers at
//! `[r15 + 8 * index]`; PC, PS and the fallback hook live behind it at
//! fixed offsets.

use std::collections::HashMap;
use std::mem::offset_of;

use thiserror::Error;

/// Fatal JIT failures. These halt the CPU; they are never guest-visible
/// architectural conditions.
#[derive(Debug, Error)]
pub enum JitError {
    #[error("assembler error: {0}")]
    Asm(#[from] crate::asm::AsmError),

    #[error("executable mapping failed: {0}")]
    Map(String),

    #[error("JIT is unsupported on this host")]
    Unsupported,
}

/// Hook back into the interpreter for one instruction. Returns nonzero
/// when the instruction raised a trap and the block must exit.
pub type FallbackFn = extern "C" fn(env: *mut JitEnv, word: u32) -> u32;

/// The register context a compiled block executes against.
///
/// `gpr[31]` is the zero register's slot: the runtime clears it before
/// entry and emitters never store to it, preserving the read-as-zero
/// contract even for raw array accesses.
#[repr(C)]
pub struct JitEnv {
    /// Guest integer registers, R31 pinned to zero.
    pub gpr: [u64; 32],
    /// Guest PC, updated by block exits and by the fallback hook.
    pub pc: u64,
    /// Guest PS image, maintained by the condition-code updates.
    pub ps: u64,
    /// Set nonzero by the fallback hook when a trap is pending.
    pub trap: u32,
    pub _pad: u32,
    /// Host-side context the fallback hook recovers its state from.
    pub host: *mut core::ffi::c_void,
    /// The interpreter re-entry hook.
    pub fallback: FallbackFn,
}

/// Field offsets the emitters hard-code into generated addressing.
pub const ENV_GPR_OFFSET: i32 = offset_of!(JitEnv, gpr) as i32;
pub const ENV_PC_OFFSET: i32 = offset_of!(JitEnv, pc) as i32;
pub const ENV_PS_OFFSET: i32 = offset_of!(JitEnv, ps) as i32;
pub const ENV_TRAP_OFFSET: i32 = offset_of!(JitEnv, trap) as i32;
pub const ENV_FALLBACK_OFFSET: i32 = offset_of!(JitEnv, fallback) as i32;

// The register array must sit at the very front so the env pointer
// doubles as the register base.
const _: () = {
    assert!(offset_of!(JitEnv, gpr) == 0);
    assert!(offset_of!(JitEnv, pc) == 256);
};

/// A page-aligned, executable copy of an emitted code buffer.
pub struct ExecBuffer {
    #[cfg(all(unix, target_arch = "x86_64"))]
    ptr: *mut u8,
    #[cfg(all(unix, target_arch = "x86_64"))]
    len: usize,
    /// The original bytes, kept for inspection and tests.
    bytes: Vec<u8>,
}

impl ExecBuffer {
    /// Map `bytes` into executable memory.
    #[cfg(all(unix, target_arch = "x86_64"))]
    pub fn new(bytes: Vec<u8>) -> Result<Self, JitError> {
        use std::ptr;

        let len = bytes.len().max(1);
        // SAFETY: anonymous private mapping, no existing memory touched.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(JitError::Map("mmap failed".into()));
        }
        // SAFETY: the mapping above is at least `bytes.len()` long.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
            if libc::mprotect(ptr, len, libc::PROT_READ | libc::PROT_EXEC) != 0 {
                libc::munmap(ptr, len);
                return Err(JitError::Map("mprotect failed".into()));
            }
        }
        Ok(ExecBuffer { ptr: ptr as *mut u8, len, bytes })
    }

    #[cfg(not(all(unix, target_arch = "x86_64")))]
    pub fn new(_bytes: Vec<u8>) -> Result<Self, JitError> {
        Err(JitError::Unsupported)
    }

    /// The emitted bytes backing this mapping.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Run the block against `env`.
    ///
    /// # Safety
    ///
    /// The mapping must contain a complete block emitted by this crate's
    /// compiler, and `env` must be a valid, exclusive environment.
    #[cfg(all(unix, target_arch = "x86_64"))]
    pub unsafe fn run(&self, env: *mut JitEnv) {
        let entry: extern "C" fn(*mut JitEnv) = std::mem::transmute(self.ptr);
        entry(env);
    }

    #[cfg(not(all(unix, target_arch = "x86_64")))]
    pub unsafe fn run(&self, _env: *mut JitEnv) {
        unreachable!("ExecBuffer cannot be constructed on this host");
    }
}

#[cfg(all(unix, target_arch = "x86_64"))]
impl Drop for ExecBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr/len come from the successful mmap in `new`.
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

// SAFETY: the mapping is immutable after construction.
unsafe impl Send for ExecBuffer {}

/// One compiled guest block.
pub struct CompiledBlock {
    /// Guest PC of the first instruction.
    pub entry_pc: u64,
    /// Guest instructions covered.
    pub guest_len: usize,
    /// How many of those were emitted natively (the rest fall back).
    pub native_count: usize,
    code: ExecBuffer,
}

impl CompiledBlock {
    pub(crate) fn new(
        entry_pc: u64,
        guest_len: usize,
        native_count: usize,
        code: ExecBuffer,
    ) -> Self {
        CompiledBlock { entry_pc, guest_len, native_count, code }
    }

    pub fn code_bytes(&self) -> &[u8] {
        self.code.bytes()
    }

    /// Execute the block. See [`ExecBuffer::run`] for the contract.
    ///
    /// # Safety
    ///
    /// `env` must be valid and exclusive for the duration of the call.
    pub unsafe fn run(&self, env: *mut JitEnv) {
        self.code.run(env)
    }
}

/// Compiled blocks keyed by entry PC.
#[derive(Default)]
pub struct BlockCache {
    blocks: HashMap<u64, CompiledBlock>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pc: u64) -> Option<&CompiledBlock> {
        self.blocks.get(&pc)
    }

    /// Remove a block, e.g. for the duration of a run that needs the
    /// cache borrowable elsewhere.
    pub fn take(&mut self, pc: u64) -> Option<CompiledBlock> {
        self.blocks.remove(&pc)
    }

    pub fn insert(&mut self, block: CompiledBlock) {
        self.blocks.insert(block.entry_pc, block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drop every compiled block (the IMB / self-modified-code path).
    pub fn invalidate_all(&mut self) {
        self.blocks.clear();
    }

    /// Drop blocks whose guest range may contain `va`.
    pub fn invalidate_containing(&mut self, va: u64) {
        self.blocks
            .retain(|&pc, block| !(pc..pc + 4 * block.guest_len as u64).contains(&va));
    }
}
