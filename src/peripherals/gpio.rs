//! GPIO: fifteen 8-pin ports (PORT0..PORTE), each with direction (PDR),
//! driven-output (PODR), sampled-input (PIDR), peripheral-mux (PMR), and
//! pullup (PCR) registers.
//!
//! Register windows, all relative to [`PORT_BASE`]: PDR at `+0x0000+n`, PODR
//! at `+0x0020+n`, PIDR at `+0x0040+n`, PMR at `+0x0060+n`, PCR at
//! `+0x00C0+n`, where `n` is the port number 0..14.

pub const PORT_BASE: u32 = 0x0008_C000;
pub const NUM_PORTS: usize = 15;

const PDR_OFFSET: u32 = 0x0000;
const PODR_OFFSET: u32 = 0x0020;
const PIDR_OFFSET: u32 = 0x0040;
const PMR_OFFSET: u32 = 0x0060;
const PCR_OFFSET: u32 = 0x00C0;

#[derive(Debug, Clone, Copy, Default)]
struct Pin {
    output: bool,
    input: bool,
}

/// One 8-pin GPIO port and its five registers.
#[derive(Debug, Clone)]
pub struct GpioPort {
    pdr: u8,
    podr: u8,
    pmr: u8,
    pcr: u8,
    pins: [Pin; 8],
}

impl GpioPort {
    fn new() -> Self {
        Self { pdr: 0, podr: 0, pmr: 0, pcr: 0, pins: [Pin::default(); 8] }
    }

    fn is_output(&self, bit: usize) -> bool {
        self.pdr & (1 << bit) != 0
    }

    /// PIDR: pins configured as output read back their driven value.
    fn read_pidr(&self) -> u8 {
        let mut value = 0u8;
        for bit in 0..8 {
            let driven = if self.is_output(bit) { self.pins[bit].output } else { self.pins[bit].input };
            if driven {
                value |= 1 << bit;
            }
        }
        value
    }

    fn write_pdr(&mut self, value: u8) {
        self.pdr = value;
    }

    fn write_podr(&mut self, value: u8) {
        self.podr = value;
        for bit in 0..8 {
            self.pins[bit].output = value & (1 << bit) != 0;
        }
    }

    fn write_pmr(&mut self, value: u8) {
        self.pmr = value;
    }

    fn write_pcr(&mut self, value: u8) {
        self.pcr = value;
    }

    fn set_external_input(&mut self, bit: usize, value: bool) {
        self.pins[bit].input = value;
    }
}

impl Default for GpioPort {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of one port's registers, for the inspection surface.
#[derive(Debug, Clone, Copy)]
pub struct GpioPortInfo {
    pub port: u8,
    pub pdr: u8,
    pub podr: u8,
    pub pidr: u8,
    pub pmr: u8,
    pub pcr: u8,
}

/// All fifteen GPIO ports (PORT0..PORTE).
#[derive(Debug, Clone)]
pub struct Gpio {
    ports: [GpioPort; NUM_PORTS],
}

impl Gpio {
    pub fn new() -> Self {
        Self { ports: std::array::from_fn(|_| GpioPort::new()) }
    }

    pub fn reset(&mut self) {
        self.ports = std::array::from_fn(|_| GpioPort::new());
    }

    pub fn handles(addr: u32) -> bool {
        addr >= PORT_BASE && addr < PORT_BASE + PCR_OFFSET + NUM_PORTS as u32
    }

    pub fn read8(&self, addr: u32) -> u8 {
        let Some((window, port)) = Self::decode(addr) else { return 0xFF };
        let Some(p) = self.ports.get(port) else { return 0xFF };
        match window {
            Window::Pdr => p.pdr,
            Window::Podr => p.podr,
            Window::Pidr => p.read_pidr(),
            Window::Pmr => p.pmr,
            Window::Pcr => p.pcr,
        }
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        let Some((window, port)) = Self::decode(addr) else { return };
        let Some(p) = self.ports.get_mut(port) else { return };
        match window {
            Window::Pdr => p.write_pdr(value),
            Window::Podr => p.write_podr(value),
            Window::Pidr => {} // read-only
            Window::Pmr => p.write_pmr(value),
            Window::Pcr => p.write_pcr(value),
        }
    }

    fn decode(addr: u32) -> Option<(Window, usize)> {
        if addr < PORT_BASE {
            return None;
        }
        let offset = addr - PORT_BASE;
        let windows = [
            (PDR_OFFSET, Window::Pdr),
            (PODR_OFFSET, Window::Podr),
            (PIDR_OFFSET, Window::Pidr),
            (PMR_OFFSET, Window::Pmr),
            (PCR_OFFSET, Window::Pcr),
        ];
        for (base, window) in windows {
            if offset >= base && offset < base + NUM_PORTS as u32 {
                return Some((window, (offset - base) as usize));
            }
        }
        None
    }

    /// Drive a pin's external input level (e.g. a board switch).
    pub fn set_external_input(&mut self, port: usize, bit: usize, value: bool) {
        if let Some(p) = self.ports.get_mut(port) {
            p.set_external_input(bit, value);
        }
    }

    /// Whether `port`/`bit` is configured as an output pin.
    pub fn is_output(&self, port: usize, bit: usize) -> bool {
        self.ports.get(port).is_some_and(|p| p.is_output(bit))
    }

    /// The driven output level of `port`/`bit`, regardless of direction.
    pub fn output_level(&self, port: usize, bit: usize) -> bool {
        self.ports.get(port).is_some_and(|p| p.pins[bit].output)
    }

    /// The same value PIDR would report for this pin: the driven output
    /// value if configured as output, otherwise the sampled input value.
    pub fn pin_level(&self, port: usize, bit: usize) -> bool {
        self.ports.get(port).is_some_and(|p| {
            if p.is_output(bit) { p.pins[bit].output } else { p.pins[bit].input }
        })
    }

    pub fn port_info(&self, port: usize) -> Option<GpioPortInfo> {
        self.ports.get(port).map(|p| GpioPortInfo {
            port: port as u8,
            pdr: p.pdr,
            podr: p.podr,
            pidr: p.read_pidr(),
            pmr: p.pmr,
            pcr: p.pcr,
        })
    }

    pub fn all_port_info(&self) -> Vec<GpioPortInfo> {
        (0..NUM_PORTS).filter_map(|p| self.port_info(p)).collect()
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Window {
    Pdr,
    Podr,
    Pidr,
    Pmr,
    Pcr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdr_and_podr_round_trip_at_distinct_offsets() {
        let mut gpio = Gpio::new();
        gpio.write8(PORT_BASE, 0xFF); // PORT0 PDR
        gpio.write8(PORT_BASE + 0x20, 0x55); // PORT0 PODR
        assert_eq!(gpio.read8(PORT_BASE), 0xFF);
        assert_eq!(gpio.read8(PORT_BASE + 0x20), 0x55);
    }

    #[test]
    fn pidr_reflects_driven_output_for_output_pins() {
        let mut gpio = Gpio::new();
        gpio.write8(PORT_BASE, 0x01); // PORT0 bit0 = output
        gpio.write8(PORT_BASE + 0x20, 0x01); // drive bit0 high
        assert_eq!(gpio.read8(PORT_BASE + 0x40), 0x01);
    }

    #[test]
    fn pidr_reflects_external_input_for_input_pins() {
        let mut gpio = Gpio::new();
        gpio.set_external_input(0, 2, true);
        assert_eq!(gpio.read8(PORT_BASE + 0x40), 0x04);
    }

    #[test]
    fn pidr_is_read_only() {
        let mut gpio = Gpio::new();
        gpio.write8(PORT_BASE + 0x40, 0xFF);
        assert_eq!(gpio.read8(PORT_BASE + 0x40), 0x00);
    }

    #[test]
    fn ports_are_independently_addressed() {
        let mut gpio = Gpio::new();
        gpio.write8(PORT_BASE + 4, 0xAA); // PORT4 PDR
        assert_eq!(gpio.read8(PORT_BASE + 4), 0xAA);
        assert_eq!(gpio.read8(PORT_BASE), 0x00);
    }
}
