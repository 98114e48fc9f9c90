//! Flat-image runner: load a little-endian Alpha code image, run one CPU
//! until it halts or the instruction budget runs out, and dump state.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use evax_core::FlatMemory;
use evaxemu::{Cpu, CpuState, EmuConfig, Personality};

#[derive(Parser, Debug)]
#[command(name = "evaxemu", about = "EVAX Alpha AXP core emulator")]
struct Args {
    /// Raw little-endian code image.
    image: PathBuf,

    /// Load and entry address of the image.
    #[arg(long, default_value_t = 0x1_0000, value_parser = parse_u64)]
    base: u64,

    /// Guest memory size in bytes.
    #[arg(long, default_value_t = 16 * 1024 * 1024, value_parser = parse_u64)]
    mem_size: u64,

    /// Instruction budget; unlimited when omitted.
    #[arg(long)]
    max_steps: Option<u64>,

    /// JSON configuration file (CLI flags below override it).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable the JIT path.
    #[arg(long)]
    jit: bool,

    /// Executions of a PC before its block compiles.
    #[arg(long)]
    jit_threshold: Option<u32>,

    /// JIT optimization level (0-2).
    #[arg(long)]
    jit_opt: Option<u8>,

    /// PAL personality: alpha, tru64 or vax.
    #[arg(long)]
    personality: Option<String>,
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<EmuConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EmuConfig::default(),
    };
    if args.jit {
        config.jit_enabled = true;
    }
    if let Some(threshold) = args.jit_threshold {
        config.jit_threshold = threshold;
    }
    if let Some(level) = args.jit_opt {
        config.jit_optimization_level = level;
    }
    if let Some(name) = &args.personality {
        config.pal_personality = match name.as_str() {
            "alpha" => Personality::Alpha,
            "tru64" => Personality::Tru64,
            "vax" => Personality::Vax,
            other => anyhow::bail!("unknown personality {other:?}"),
        };
    }

    let image = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    anyhow::ensure!(
        image.len() as u64 <= args.mem_size,
        "image larger than guest memory"
    );

    let mut backing = vec![0u8; args.mem_size as usize];
    backing[..image.len()].copy_from_slice(&image);
    let mut mem = FlatMemory::with_image(args.base, backing);

    let mut cpu = Cpu::new(0, config);
    cpu.regs.write_pc(args.base);
    cpu.kernel_sp = args.base + args.mem_size;

    let steps = cpu.run(&mut mem, args.max_steps)?;

    println!("retired {steps} instructions, state {:?}", cpu.state);
    for i in 0..32 {
        print!("r{i:02} {:016x}", cpu.regs.read_int(i));
        if i % 4 == 3 {
            println!();
        } else {
            print!("  ");
        }
    }
    println!("pc  {:016x}  ps  {:016x}", cpu.regs.read_pc(), cpu.regs.ps.0);
    if cpu.state != CpuState::Halted {
        println!("(stopped before halt)");
    }
    Ok(())
}
