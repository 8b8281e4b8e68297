//! RX65N-style memory controller: a sorted list of backing-store blocks plus
//! a peripheral window that intercepts byte-width accesses before they reach
//! any block's backing buffer.
//!
//! Memory map constants and the default block list.
pub mod addr {
    /// Internal RAM start address.
    pub const RAM_START: u32 = 0x0000_0000;
    /// Internal RAM size (256 KiB).
    pub const RAM_SIZE: u32 = 0x0004_0000;
    /// Peripheral register window start address.
    pub const PERIPHERAL_START: u32 = 0x0008_0000;
    /// Peripheral register window size (512 KiB).
    pub const PERIPHERAL_SIZE: u32 = 0x0008_0000;
    /// Internal Flash start address.
    pub const FLASH_START: u32 = 0xFFE0_0000;
    /// Internal Flash size (2 MiB).
    pub const FLASH_SIZE: u32 = 0x0020_0000;
    /// Fixed vector table start address.
    pub const FIXED_VECTOR_START: u32 = 0xFFFF_FF80;
    /// Fixed vector table size (128 B).
    pub const FIXED_VECTOR_SIZE: u32 = 0x80;
}

use log::{trace, warn};

use crate::board::Board;
use crate::interrupt::InterruptController;
use crate::peripherals::gpio::Gpio;
use crate::peripherals::timer::Cmt;
use crate::peripherals::uart::Uart;

/// Coarse classification of a memory block, for the inspection surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    Ram,
    Flash,
    Peripheral,
    Reserved,
}

/// A named, contiguous, disjoint region of address space with its own
/// backing byte buffer.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub name: &'static str,
    pub start: u32,
    pub size: u32,
    pub region: MemoryRegion,
    pub readonly: bool,
    data: Vec<u8>,
}

impl MemoryBlock {
    fn new(name: &'static str, start: u32, size: u32, region: MemoryRegion, readonly: bool) -> Self {
        Self { name, start, size, region, readonly, data: vec![0u8; size as usize] }
    }

    fn end(&self) -> u32 {
        self.start.wrapping_add(self.size).wrapping_sub(1)
    }

    fn contains(&self, address: u32) -> bool {
        address >= self.start && address <= self.end()
    }
}

/// A single recorded access, kept only while logging is enabled.
#[derive(Debug, Clone, Copy)]
pub struct AccessLogEntry {
    pub address: u32,
    pub write: bool,
    pub value: u8,
    pub unmapped: bool,
    pub readonly_violation: bool,
}

/// Memory map entry as reported by the diagnostic listing.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapEntry {
    pub name: &'static str,
    pub start: u32,
    pub end: u32,
    pub region: MemoryRegion,
    pub readonly: bool,
}

/// Region-dispatch memory controller: RAM/Flash/FixedVector backing blocks
/// plus the GPIO, UART, timer, and interrupt peripherals bound into the
/// peripheral window.
#[derive(Debug, Clone)]
pub struct MemoryController {
    blocks: Vec<MemoryBlock>,
    gpio: Gpio,
    uart: Uart,
    cmt: Cmt,
    interrupts: InterruptController,
    log_enabled: bool,
    access_log: Vec<AccessLogEntry>,
}

impl MemoryController {
    pub fn new() -> Self {
        let blocks = vec![
            MemoryBlock::new("RAM", addr::RAM_START, addr::RAM_SIZE, MemoryRegion::Ram, false),
            MemoryBlock::new("Peripheral", addr::PERIPHERAL_START, addr::PERIPHERAL_SIZE, MemoryRegion::Peripheral, false),
            MemoryBlock::new("Flash", addr::FLASH_START, addr::FLASH_SIZE, MemoryRegion::Flash, false),
            MemoryBlock::new("FixedVector", addr::FIXED_VECTOR_START, addr::FIXED_VECTOR_SIZE, MemoryRegion::Flash, false),
        ];
        Self {
            blocks,
            gpio: Gpio::new(),
            uart: Uart::new(),
            cmt: Cmt::new(),
            interrupts: InterruptController::new(),
            log_enabled: false,
            access_log: Vec::new(),
        }
    }

    pub fn set_log_enabled(&mut self, enabled: bool) {
        self.log_enabled = enabled;
    }

    pub fn access_log(&self) -> &[AccessLogEntry] {
        &self.access_log
    }

    pub fn clear_access_log(&mut self) {
        self.access_log.clear();
    }

    fn find_block_mut(&mut self, address: u32) -> Option<&mut MemoryBlock> {
        self.blocks.iter_mut().find(|b| b.contains(address))
    }

    fn find_block(&self, address: u32) -> Option<&MemoryBlock> {
        self.blocks.iter().find(|b| b.contains(address))
    }

    fn log(&mut self, entry: AccessLogEntry) {
        if self.log_enabled {
            self.access_log.push(entry);
        }
    }

    /// Route a byte access to a bound peripheral, if any address in the
    /// peripheral window claims it. Returns `None` if no peripheral handles
    /// this address.
    fn peripheral_read(&mut self, address: u32) -> Option<u8> {
        if Gpio::handles(address) {
            return Some(self.gpio.read8(address));
        }
        if Uart::handles(address) {
            return Some(self.uart.read8(address));
        }
        if Cmt::handles(address) {
            return Some(self.cmt.read8(address));
        }
        if let Some(value) = self.interrupt_register_read(address) {
            return Some(value);
        }
        None
    }

    fn peripheral_write(&mut self, address: u32, value: u8) -> bool {
        if Gpio::handles(address) {
            self.gpio.write8(address, value);
            return true;
        }
        if Uart::handles(address) {
            self.uart.write8(address, value);
            return true;
        }
        if Cmt::handles(address) {
            self.cmt.write8(address, value);
            return true;
        }
        if self.interrupt_register_write(address, value) {
            return true;
        }
        false
    }

    fn interrupt_register_read(&self, address: u32) -> Option<u8> {
        use crate::interrupt::{ICU_BASE, IER_OFFSET, IPR_OFFSET, IR_OFFSET};
        if address < ICU_BASE {
            return None;
        }
        let offset = address - ICU_BASE;
        if (IR_OFFSET..IR_OFFSET + 256).contains(&offset) {
            Some(self.interrupts.read_ir((offset - IR_OFFSET) as u8))
        } else if (IER_OFFSET..IER_OFFSET + 32).contains(&offset) {
            Some(self.interrupts.read_ier((offset - IER_OFFSET) as u8))
        } else if (IPR_OFFSET..IPR_OFFSET + 256).contains(&offset) {
            Some(self.interrupts.read_ipr((offset - IPR_OFFSET) as u8))
        } else {
            None
        }
    }

    fn interrupt_register_write(&mut self, address: u32, value: u8) -> bool {
        use crate::interrupt::{ICU_BASE, IER_OFFSET, IPR_OFFSET, IR_OFFSET};
        if address < ICU_BASE {
            return false;
        }
        let offset = address - ICU_BASE;
        if (IR_OFFSET..IR_OFFSET + 256).contains(&offset) {
            self.interrupts.write_ir((offset - IR_OFFSET) as u8, value);
            true
        } else if (IER_OFFSET..IER_OFFSET + 32).contains(&offset) {
            self.interrupts.write_ier((offset - IER_OFFSET) as u8, value);
            true
        } else if (IPR_OFFSET..IPR_OFFSET + 256).contains(&offset) {
            self.interrupts.write_ipr((offset - IPR_OFFSET) as u8, value);
            true
        } else {
            false
        }
    }

    pub fn read8(&mut self, address: u32) -> u8 {
        if let Some(value) = self.peripheral_read(address) {
            self.log(AccessLogEntry { address, write: false, value, unmapped: false, readonly_violation: false });
            return value;
        }
        let Some(block) = self.find_block(address) else {
            self.log(AccessLogEntry { address, write: false, value: 0xFF, unmapped: true, readonly_violation: false });
            return 0xFF;
        };
        let value = block.data[(address - block.start) as usize];
        self.log(AccessLogEntry { address, write: false, value, unmapped: false, readonly_violation: false });
        value
    }

    pub fn read16(&mut self, address: u32) -> u16 {
        let lo = self.read8(address) as u16;
        let hi = self.read8(address.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn read32(&mut self, address: u32) -> u32 {
        let b0 = self.read8(address) as u32;
        let b1 = self.read8(address.wrapping_add(1)) as u32;
        let b2 = self.read8(address.wrapping_add(2)) as u32;
        let b3 = self.read8(address.wrapping_add(3)) as u32;
        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }

    pub fn write8(&mut self, address: u32, value: u8) {
        if self.peripheral_write(address, value) {
            self.log(AccessLogEntry { address, write: true, value, unmapped: false, readonly_violation: false });
            return;
        }
        let Some(block) = self.find_block_mut(address) else {
            trace!("write to unmapped address {:#010x}", address);
            self.log(AccessLogEntry { address, write: true, value, unmapped: true, readonly_violation: false });
            return;
        };
        if block.readonly {
            warn!("write to read-only block {} at {:#010x}", block.name, address);
            self.log(AccessLogEntry { address, write: true, value, unmapped: false, readonly_violation: true });
            return;
        }
        let offset = (address - block.start) as usize;
        block.data[offset] = value;
        self.log(AccessLogEntry { address, write: true, value, unmapped: false, readonly_violation: false });
    }

    pub fn write16(&mut self, address: u32, value: u16) {
        self.write8(address, (value & 0xFF) as u8);
        self.write8(address.wrapping_add(1), (value >> 8) as u8);
    }

    pub fn write32(&mut self, address: u32, value: u32) {
        self.write8(address, (value & 0xFF) as u8);
        self.write8(address.wrapping_add(1), ((value >> 8) & 0xFF) as u8);
        self.write8(address.wrapping_add(2), ((value >> 16) & 0xFF) as u8);
        self.write8(address.wrapping_add(3), ((value >> 24) & 0xFF) as u8);
    }

    /// Write `bytes` starting at `address`, one byte dispatch at a time, so
    /// peripheral side effects fire the same way they would for firmware
    /// writes issued during normal execution.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.write8(address.wrapping_add(i as u32), *byte);
        }
    }

    /// Read `len` bytes starting at `start`, through the same dispatch used
    /// by normal reads.
    pub fn dump(&mut self, start: u32, len: u32) -> Vec<u8> {
        (0..len).map(|i| self.read8(start.wrapping_add(i))).collect()
    }

    /// Clear RAM contents; peripheral bindings, Flash contents, and the block
    /// list itself are untouched.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            if block.region == MemoryRegion::Ram {
                block.data.fill(0);
            }
        }
        self.gpio.reset();
        self.uart.reset();
        self.cmt.reset();
        self.interrupts.reset();
    }

    pub fn memory_map(&self) -> Vec<MemoryMapEntry> {
        self.blocks
            .iter()
            .map(|b| MemoryMapEntry { name: b.name, start: b.start, end: b.end(), region: b.region, readonly: b.readonly })
            .collect()
    }

    pub fn gpio(&self) -> &Gpio {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut Gpio {
        &mut self.gpio
    }

    pub fn uart(&self) -> &Uart {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut Uart {
        &mut self.uart
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.interrupts
    }

    /// Advance the timer by `cycles` CPU cycles, wired directly to the
    /// interrupt controller owned by this same memory controller.
    pub fn tick_timer(&mut self, cycles: u32) {
        self.cmt.tick(cycles, &mut self.interrupts);
    }

    pub fn timer_channel_info(&self, pclkb: u32) -> Vec<crate::peripherals::timer::CmtChannelInfo> {
        self.cmt.channel_info(pclkb)
    }
}

impl Default for MemoryController {
    fn default() -> Self {
        Self::new()
    }
}

/// Board-level wiring is kept separate from `MemoryController` (boards own
/// no registers of their own) but is re-exported here for convenience at the
/// integration-facade call site.
pub type BoardModel = Board;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_in_ram() {
        let mut mem = MemoryController::new();
        mem.write32(0x1000, 0xDEAD_BEEF);
        assert_eq!(mem.read32(0x1000), 0xDEAD_BEEF);
    }

    #[test]
    fn unmapped_read_returns_0xff_and_write_is_discarded() {
        let mut mem = MemoryController::new();
        assert_eq!(mem.read8(0x0050_0000), 0xFF);
        mem.write8(0x0050_0000, 0x42);
        assert_eq!(mem.read8(0x0050_0000), 0xFF);
    }

    #[test]
    fn gpio_registers_round_trip_through_the_peripheral_window() {
        let mut mem = MemoryController::new();
        mem.write8(0x0008_C000, 0xFF);
        mem.write8(0x0008_C020, 0x55);
        assert_eq!(mem.read8(0x0008_C000), 0xFF);
        assert_eq!(mem.read8(0x0008_C020), 0x55);
    }

    #[test]
    fn sixteen_bit_peripheral_reads_compose_little_endian_bytes() {
        let mut mem = MemoryController::new();
        mem.write8(crate::peripherals::timer::UNIT0_BASE + 0x06, 0x34);
        mem.write8(crate::peripherals::timer::UNIT0_BASE + 0x07, 0x12);
        assert_eq!(mem.read16(crate::peripherals::timer::UNIT0_BASE + 0x06), 0x1234);
    }

    #[test]
    fn load_writes_through_the_same_dispatch_as_individual_writes() {
        let mut mem = MemoryController::new();
        mem.load(0x2000, &[1, 2, 3, 4]);
        assert_eq!(mem.dump(0x2000, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn reset_clears_ram_but_preserves_flash_and_bindings() {
        let mut mem = MemoryController::new();
        mem.write8(0x1000, 0xAB);
        mem.write8(addr::FLASH_START, 0xCD);
        mem.reset();
        assert_eq!(mem.read8(0x1000), 0x00);
        assert_eq!(mem.read8(addr::FLASH_START), 0xCD);
    }

    #[test]
    fn flash_and_fixed_vector_blocks_accept_writes_for_program_loading() {
        let mut mem = MemoryController::new();
        mem.write32(0xFFFF_FFFC, 0xFFE0_0000);
        assert_eq!(mem.read32(0xFFFF_FFFC), 0xFFE0_0000);
    }
}
