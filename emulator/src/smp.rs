//! The SMP-facing interfaces the core consumes.
//!
//! The outer SMP manager owns threads, scheduling and interrupt routing;
//! the core only polls these handles at instruction boundaries. All of
//! them are cheap atomics or a locked queue, safe to share across the
//! per-CPU host threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use evax_core::Trap;

/// An interrupt deliverable to a CPU at an instruction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Clock,
    Device,
    Interprocessor,
}

impl Interrupt {
    pub fn trap(self) -> Trap {
        match self {
            Interrupt::Clock => Trap::ClockInterrupt,
            Interrupt::Device => Trap::ProcessorInterrupt,
            Interrupt::Interprocessor => Trap::InterprocessorInterrupt,
        }
    }
}

/// Per-CPU handles the execution loop polls between instructions.
#[derive(Clone, Default)]
pub struct SmpHandles {
    stop: Arc<AtomicBool>,
    barrier: Arc<AtomicBool>,
    interrupts: Arc<Mutex<VecDeque<Interrupt>>>,
}

impl SmpHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the CPU to exit its run loop at the next boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Hold all CPUs at a consistent boundary while set.
    pub fn raise_barrier(&self) {
        self.barrier.store(true, Ordering::Release);
    }

    pub fn drop_barrier(&self) {
        self.barrier.store(false, Ordering::Release);
    }

    pub fn barrier_raised(&self) -> bool {
        self.barrier.load(Ordering::Acquire)
    }

    /// Queue an interrupt for delivery at the next boundary.
    pub fn post_interrupt(&self, interrupt: Interrupt) {
        self.interrupts.lock().unwrap().push_back(interrupt);
    }

    /// Non-blocking poll, consumed by the execution loop.
    pub fn poll_interrupt(&self) -> Option<Interrupt> {
        self.interrupts.lock().unwrap().pop_front()
    }

    /// Whether an interrupt is waiting, without consuming it.
    pub fn interrupt_pending(&self) -> bool {
        !self.interrupts.lock().unwrap().is_empty()
    }
}
