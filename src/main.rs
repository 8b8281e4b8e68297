//! CLI front end: load a program, optionally run it to completion, and print
//! CPU/board state. There is no interactive debugger shell; `-d`/`--debug`
//! only selects a post-load inspection dump instead of running.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use rx_virt_mcu::{Emu, StopReason, DEFAULT_PCLKB};

/// RX65N microcontroller virtual emulator.
#[derive(Parser, Debug)]
#[command(name = "rx-virt-mcu", version, about)]
struct Cli {
    /// Program file to load (ELF, S-Record, Intel HEX, or raw binary).
    program: Option<PathBuf>,

    /// Start in debug mode: print post-load state and exit instead of running.
    #[arg(short, long)]
    debug: bool,

    /// Run the loaded program immediately.
    #[arg(short, long)]
    run: bool,

    /// Load address override for raw binary files (hex, e.g. 0xFFE00000).
    #[arg(short = 'a', long, value_parser = parse_hex_u32)]
    address: Option<u32>,

    /// Load the built-in LED-blink demo program instead of a file.
    #[arg(long)]
    demo: bool,

    /// Verbose output (prints loaded symbol count).
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16)
}

const MAX_RUN_STEPS: u64 = 1_000_000;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    println!("RX65N Virtual Emulator v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "=".repeat(40));

    let mut emu = Emu::new(DEFAULT_PCLKB);

    if cli.demo {
        println!("Loading demo program...");
        emu.load_demo();
        println!("Demo program loaded");
    } else if let Some(program) = &cli.program {
        if !program.exists() {
            bail!("file not found: {}", program.display());
        }
        println!("Loading: {}", program.display());
        let result = emu.load_file(program, cli.address);
        if result.success {
            if let Some(entry) = result.entry_point {
                println!("Entry point: {:#010x}", entry);
                emu.add_breakpoint(entry);
            }
            for section in &result.loaded_sections {
                println!("  Section: {} @ {:#010x} ({} bytes)", section.name, section.address, section.length);
            }
            if cli.verbose && !result.symbols.is_empty() {
                println!("Loaded {} symbols", result.symbols.len());
            }
        } else {
            for err in &result.errors {
                eprintln!("Load failed: {}", err);
            }
            std::process::exit(1);
        }
    }

    if cli.run {
        println!("\nRunning program...");
        let (executed, reason) = emu.run(MAX_RUN_STEPS);
        info!("stopped after {} steps: {:?}", executed, reason);
        println!("Executed {} instructions", executed);
        let snap = emu.cpu_snapshot();
        println!("Final PC: {:#010x}", snap.pc);
        match reason {
            StopReason::Exception { pc, opcode } => {
                println!("Stopped on undefined instruction {:#04x} at {:#010x}", opcode, pc)
            }
            StopReason::Breakpoint => println!("Stopped at breakpoint"),
            StopReason::Waiting => println!("Stopped: WAIT with no pending interrupt"),
            StopReason::StepLimitReached => println!("Stopped: step limit reached"),
        }
        println!("\nBoard state:");
        print!("  LEDs: ");
        for led in emu.led_states() {
            print!("{}={:?} ", led.name, led.state);
        }
        println!();
        println!("  UART: {}", emu.uart_tx_log());
    } else if cli.debug {
        println!("\nLoaded state:");
        let snap = emu.cpu_snapshot();
        println!("  PC: {:#010x}  SP: {:#010x}  PSW: {:#010x}", snap.pc, snap.sp, snap.psw);
        println!("  State: {:?}", snap.state);
        for (i, reg) in snap.registers.iter().enumerate() {
            println!("  R{}: {:#010x}", i, reg);
        }
    }

    if cli.program.is_none() && !cli.demo && !cli.run && !cli.debug {
        println!("\nNo program loaded. Pass a file, --demo, -r, or -d.");
    }

    println!("\nEmulator terminated.");
    Ok(())
}
