//! Emulator configuration.

use evax_core::PalPersonality;
use serde::Deserialize;

/// Knobs the core recognizes. Everything else (device models, firmware
/// paths, CPU counts) belongs to the surrounding system.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmuConfig {
    /// Select the JIT path over pure interpretation.
    pub jit_enabled: bool,
    /// Executions of a PC before its block is compiled.
    pub jit_threshold: u32,
    /// 0 = none, 1 = constant folding, 2 = plus dead-store elimination.
    pub jit_optimization_level: u8,
    /// Which PAL dispatch table the guest runs under.
    pub pal_personality: Personality,
    /// Base address of the PAL image (entry vectors live above it).
    pub pal_base: u64,
}

impl Default for EmuConfig {
    fn default() -> Self {
        EmuConfig {
            jit_enabled: false,
            jit_threshold: 16,
            jit_optimization_level: 1,
            pal_personality: Personality::Tru64,
            pal_base: 0x4000,
        }
    }
}

/// Serde-facing personality name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Alpha,
    Tru64,
    Vax,
}

impl From<Personality> for PalPersonality {
    fn from(p: Personality) -> Self {
        match p {
            Personality::Alpha => PalPersonality::Alpha,
            Personality::Tru64 => PalPersonality::Tru64,
            Personality::Vax => PalPersonality::Vax,
        }
    }
}
