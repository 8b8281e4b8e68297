//! Integration façade: wires the CPU, memory controller, and board model
//! together and exposes step/run/reset plus the inspection surface.

use std::path::Path;

use log::info;

use crate::board::{Board, LedInfo, SwitchInfo};
use crate::cpu::{Cpu, CpuState, RESET_SP};
use crate::error::{EmuError, EmuResult};
use crate::interrupt::InterruptInfo;
use crate::loader::{self, LoadResult};
use crate::memory::{MemoryController, MemoryMapEntry};
use crate::peripherals::timer::CmtChannelInfo;
use crate::reset::ResetSource;

/// Default peripheral clock (PCLKB), used only by the timer's
/// frequency-reporting API.
pub const DEFAULT_PCLKB: u32 = 60_000_000;

/// Number of entries in the PC/opcode history ring buffer kept for crash
/// diagnostics.
const HISTORY_SIZE: usize = 64;

#[derive(Clone, Copy, Default)]
struct HistoryEntry {
    pc: u32,
    opcode: [u8; 6],
    opcode_len: u8,
}

struct ExecutionHistory {
    entries: [HistoryEntry; HISTORY_SIZE],
    write_idx: usize,
    count: usize,
}

impl ExecutionHistory {
    fn new() -> Self {
        Self { entries: [HistoryEntry::default(); HISTORY_SIZE], write_idx: 0, count: 0 }
    }

    fn record(&mut self, pc: u32, opcode: &[u8]) {
        let mut entry = HistoryEntry { pc, opcode: [0; 6], opcode_len: opcode.len().min(6) as u8 };
        for (i, &byte) in opcode.iter().take(6).enumerate() {
            entry.opcode[i] = byte;
        }
        self.entries[self.write_idx] = entry;
        self.write_idx = (self.write_idx + 1) % HISTORY_SIZE;
        if self.count < HISTORY_SIZE {
            self.count += 1;
        }
    }

    fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        let start = if self.count < HISTORY_SIZE { 0 } else { self.write_idx };
        (0..self.count).map(move |i| &self.entries[(start + i) % HISTORY_SIZE])
    }

    fn clear(&mut self) {
        self.write_idx = 0;
        self.count = 0;
    }
}

/// Why a `run` call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exception { pc: u32, opcode: u8 },
    Waiting,
    StepLimitReached,
    Breakpoint,
}

/// Snapshot of CPU register state, for the inspection surface.
#[derive(Debug, Clone, Copy)]
pub struct CpuSnapshot {
    pub pc: u32,
    pub sp: u32,
    pub psw: u32,
    pub registers: [u32; 16],
    pub flag_c: bool,
    pub flag_z: bool,
    pub flag_s: bool,
    pub flag_o: bool,
    pub flag_i: bool,
    pub ipl: u8,
    pub cycles: u64,
    pub instructions: u64,
    pub state: CpuState,
}

/// The virtual microcontroller: CPU, memory (with its bound peripherals),
/// and the thin board model, run one step or one bounded loop at a time.
pub struct Emu {
    cpu: Cpu,
    mem: MemoryController,
    board: Board,
    pclkb: u32,
    history: ExecutionHistory,
    reset_source: ResetSource,
}

impl Emu {
    /// Construct an emulator. `pclkb` is the peripheral clock fed to the
    /// timer's frequency-reporting API; pass [`DEFAULT_PCLKB`] unless the
    /// target firmware configures a different clock tree.
    pub fn new(pclkb: u32) -> Self {
        let mut emu = Self {
            cpu: Cpu::new(),
            mem: MemoryController::new(),
            board: Board::new(),
            pclkb,
            history: ExecutionHistory::new(),
            reset_source: ResetSource::PowerOn,
        };
        emu.reset(ResetSource::PowerOn);
        emu
    }

    /// Reinitialize CPU, memory, interrupts, timer, GPIO, and the board
    /// model; record `source` for the inspection surface.
    pub fn reset(&mut self, source: ResetSource) {
        self.mem.reset();
        self.cpu.reset(&mut self.mem);
        self.board.reset();
        self.history.clear();
        self.reset_source = source;
        info!("reset ({:?}), PC={:#010x} SP={:#010x}", source, self.cpu.pc, RESET_SP);
    }

    /// Load a program file by extension; see `crate::loader` for format
    /// details. Does not reset the emulator first — call [`Emu::reset`]
    /// beforehand if a clean slate is required.
    pub fn load_file(&mut self, path: &Path, address_override: Option<u32>) -> LoadResult {
        loader::load_file(&mut self.mem, path, address_override)
    }

    /// Load the built-in LED-blink demo program at the default Flash base
    /// and point the reset vector and SP at it.
    pub fn load_demo(&mut self) {
        const DEMO: &[u8] = &[
            0xFB, 0x01, 0x00, 0x00, 0x00, 0x00, // MOV.L #0,R1
            0xFB, 0x02, 0x2D, 0xC0, 0x08, 0x00, // MOV.L #PORTD_PODR,R2
            0xFB, 0x03, 0x0D, 0xC0, 0x08, 0x00, // MOV.L #PORTD_PDR,R3
            0xFB, 0x04, 0xC0, 0x00, 0x00, 0x00, // MOV.L #0xC0,R4
            0xC0, 0x43, // MOV.B R4,[R3]
            0xFB, 0x05, 0x40, 0x00, 0x00, 0x00, // MOV.L #0x40,R5
            0xC0, 0x52, // MOV.B R5,[R2]
            0x62, 0x11, // ADD #1,R1
            0xFB, 0x05, 0x80, 0x00, 0x00, 0x00, // MOV.L #0x80,R5
            0xC0, 0x52, // MOV.B R5,[R2]
            0x62, 0x11, // ADD #1,R1
            0x38, 0xD5, 0xFF, // BRA.W -43, back to the PORTD_PODR reload
            0x03, 0x03, 0x03, // NOP padding
        ];
        const LOAD_ADDRESS: u32 = 0xFFE0_0000;
        self.mem.load(LOAD_ADDRESS, DEMO);
        self.mem.write32(crate::cpu::RESET_VECTOR_ADDR, LOAD_ADDRESS);
        self.cpu.reset(&mut self.mem);
    }

    /// Execute exactly one `Cpu::step`, ticking the timer by the cycles
    /// that step consumed. Returns `Err` only when the step lands on an
    /// undefined opcode.
    pub fn step(&mut self) -> EmuResult<u32> {
        let pc = self.cpu.pc;
        let opcode = self.mem.read8(pc);
        let cycles = self.cpu.step(&mut self.mem);
        self.history.record(pc, &[opcode]);
        self.mem.tick_timer(cycles);
        if let Some((fault_pc, fault_opcode)) = self.cpu.fault() {
            return Err(EmuError::Execution { pc: fault_pc, opcode: fault_opcode });
        }
        Ok(cycles)
    }

    /// Run until EXCEPTION, an unresolvable WAIT, a breakpoint, or
    /// `max_steps` steps have executed, whichever comes first.
    pub fn run(&mut self, max_steps: u64) -> (u64, StopReason) {
        for executed in 0..max_steps {
            let state_before = self.cpu.state();
            match self.step() {
                Err(EmuError::Execution { pc, opcode }) => return (executed + 1, StopReason::Exception { pc, opcode }),
                Err(_) => unreachable!("step only ever returns Execution errors"),
                Ok(_) => {}
            }
            if self.cpu.state() == CpuState::Stopped && state_before == CpuState::Running {
                return (executed + 1, StopReason::Breakpoint);
            }
            if self.cpu.state() == CpuState::Waiting
                && self.mem.interrupts().highest_pending_enabled().is_none()
            {
                return (executed + 1, StopReason::Waiting);
            }
        }
        (max_steps, StopReason::StepLimitReached)
    }

    pub fn add_breakpoint(&mut self, addr: u32) {
        self.cpu.add_breakpoint(addr);
    }

    pub fn remove_breakpoint(&mut self, addr: u32) {
        self.cpu.remove_breakpoint(addr);
    }

    pub fn cpu_snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: self.cpu.pc,
            sp: self.cpu.get_reg(0),
            psw: self.cpu.psw,
            registers: self.cpu.registers(),
            flag_c: self.cpu.flag(crate::cpu::flags::C),
            flag_z: self.cpu.flag(crate::cpu::flags::Z),
            flag_s: self.cpu.flag(crate::cpu::flags::S),
            flag_o: self.cpu.flag(crate::cpu::flags::O),
            flag_i: self.cpu.flag(crate::cpu::flags::I),
            ipl: crate::cpu::flags::ipl(self.cpu.psw),
            cycles: self.cpu.cycles,
            instructions: self.cpu.instructions,
            state: self.cpu.state(),
        }
    }

    pub fn gpio_ports(&self) -> Vec<crate::peripherals::gpio::GpioPortInfo> {
        self.mem.gpio().all_port_info()
    }

    pub fn timer_channels(&self) -> Vec<CmtChannelInfo> {
        self.mem.timer_channel_info(self.pclkb)
    }

    pub fn pending_interrupts(&self) -> Vec<InterruptInfo> {
        self.mem.interrupts().pending()
    }

    pub fn enabled_interrupts(&self) -> Vec<InterruptInfo> {
        self.mem.interrupts().enabled()
    }

    pub fn nest_depth(&self) -> usize {
        self.mem.interrupts().nest_depth()
    }

    pub fn led_states(&self) -> Vec<LedInfo> {
        self.board.led_states(self.mem.gpio())
    }

    pub fn switch_states(&self) -> Vec<SwitchInfo> {
        self.board.switch_states(self.mem.gpio())
    }

    pub fn press_switch(&mut self, name: &str) {
        self.board.press_switch(self.mem.gpio_mut(), name);
    }

    pub fn release_switch(&mut self, name: &str) {
        self.board.release_switch(self.mem.gpio_mut(), name);
    }

    pub fn uart_tx_log(&self) -> &str {
        self.mem.uart().tx_log_tail()
    }

    pub fn uart_receive(&mut self, byte: u8) {
        self.mem.uart_mut().receive(byte);
    }

    pub fn reset_source(&self) -> ResetSource {
        self.reset_source
    }

    pub fn memory_map(&self) -> Vec<MemoryMapEntry> {
        self.mem.memory_map()
    }

    pub fn set_access_log_enabled(&mut self, enabled: bool) {
        self.mem.set_log_enabled(enabled);
    }

    /// Last few instructions executed, newest last, for crash diagnostics.
    pub fn dump_history(&self) -> String {
        let mut out = String::new();
        for entry in self.history.iter() {
            let opcode_str: String = entry.opcode[..entry.opcode_len as usize]
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!("  PC={:#010x}  {}\n", entry.pc, opcode_str));
        }
        out
    }
}
