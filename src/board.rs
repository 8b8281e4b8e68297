//! Supplemental RX65N target board model: four LEDs, two switches, a virtual
//! UART, and a reset button — thin wrappers over GPIO port registers and the
//! UART peripheral, not an interactive front end (see `crate::emu`).
//!
//! LED/switch state is computed on demand from the live GPIO pin values
//! rather than pushed via change callbacks, keeping ownership one-directional
//! (board reads GPIO; nothing reads back into the board from GPIO).

use crate::peripherals::gpio::Gpio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy)]
struct LedWiring {
    name: &'static str,
    port: usize,
    bit: usize,
    active_low: bool,
}

#[derive(Debug, Clone, Copy)]
struct SwitchWiring {
    name: &'static str,
    port: usize,
    bit: usize,
    active_low: bool,
}

const LEDS: [LedWiring; 4] = [
    LedWiring { name: "LED0", port: 0x0D, bit: 6, active_low: true },
    LedWiring { name: "LED1", port: 0x0D, bit: 7, active_low: true },
    LedWiring { name: "LED2", port: 0x0E, bit: 0, active_low: true },
    LedWiring { name: "LED3", port: 0x0E, bit: 1, active_low: true },
];

const SWITCHES: [SwitchWiring; 2] = [
    SwitchWiring { name: "SW1", port: 0x00, bit: 5, active_low: true },
    SwitchWiring { name: "SW2", port: 0x00, bit: 7, active_low: true },
];

#[derive(Debug, Clone, Copy)]
pub struct LedInfo {
    pub name: &'static str,
    pub state: LedState,
}

#[derive(Debug, Clone, Copy)]
pub struct SwitchInfo {
    pub name: &'static str,
    pub state: SwitchState,
}

/// RX65N Target Board peripherals not themselves part of the CPU core: LEDs,
/// switches, and a reset button. The UART lives in `MemoryController`
/// alongside the rest of the peripheral window; this struct only tracks the
/// switch/reset state that the GPIO model doesn't already own.
#[derive(Debug, Clone, Default)]
pub struct Board {
    reset_pressed: bool,
}

impl Board {
    pub fn new() -> Self {
        Self { reset_pressed: false }
    }

    pub fn reset(&mut self) {
        self.reset_pressed = false;
    }

    /// Compute every LED's logical state from the live GPIO pin values.
    pub fn led_states(&self, gpio: &Gpio) -> Vec<LedInfo> {
        LEDS.iter()
            .map(|led| {
                let pin_high = gpio.pin_level(led.port, led.bit);
                let on = pin_high != led.active_low;
                LedInfo { name: led.name, state: if on { LedState::On } else { LedState::Off } }
            })
            .collect()
    }

    pub fn switch_states(&self, gpio: &Gpio) -> Vec<SwitchInfo> {
        SWITCHES
            .iter()
            .map(|sw| {
                let pressed = gpio.pin_level(sw.port, sw.bit) != sw.active_low;
                SwitchInfo { name: sw.name, state: if pressed { SwitchState::Pressed } else { SwitchState::Released } }
            })
            .collect()
    }

    fn find_switch(name: &str) -> Option<&'static SwitchWiring> {
        SWITCHES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Drive `name`'s GPIO pin to its pressed level.
    pub fn press_switch(&mut self, gpio: &mut Gpio, name: &str) {
        if let Some(sw) = Self::find_switch(name) {
            gpio.set_external_input(sw.port, sw.bit, !sw.active_low);
        }
    }

    /// Drive `name`'s GPIO pin back to its released level.
    pub fn release_switch(&mut self, gpio: &mut Gpio, name: &str) {
        if let Some(sw) = Self::find_switch(name) {
            gpio.set_external_input(sw.port, sw.bit, sw.active_low);
        }
    }

    /// Record the reset button as pressed. Wiring this to an actual
    /// `Emu::reset(ResetSource::External)` call is the host's job.
    pub fn press_reset(&mut self) {
        self.reset_pressed = true;
    }

    pub fn release_reset(&mut self) {
        self.reset_pressed = false;
    }

    pub fn reset_pressed(&self) -> bool {
        self.reset_pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::gpio::PORT_BASE;

    #[test]
    fn led_is_on_when_active_low_pin_is_driven_low() {
        let mut gpio = Gpio::new();
        let board = Board::new();
        // LED0 = PD6 (port 0x0D, bit 6), active_low: driven low -> ON.
        gpio.write8(PORT_BASE + 0x0D, 0x40); // PDR: bit6 output
        gpio.write8(PORT_BASE + 0x20 + 0x0D, 0x00); // PODR: bit6 low
        let leds = board.led_states(&gpio);
        assert_eq!(leds[0].state, LedState::On);
    }

    #[test]
    fn led_is_off_when_active_low_pin_is_driven_high() {
        let mut gpio = Gpio::new();
        let board = Board::new();
        gpio.write8(PORT_BASE + 0x0D, 0x40);
        gpio.write8(PORT_BASE + 0x20 + 0x0D, 0x40);
        let leds = board.led_states(&gpio);
        assert_eq!(leds[0].state, LedState::Off);
    }

    #[test]
    fn press_switch_drives_pin_low_and_reads_back_as_pressed() {
        let mut gpio = Gpio::new();
        let mut board = Board::new();
        board.press_switch(&mut gpio, "SW1");
        assert_eq!(gpio.read8(PORT_BASE + 0x40), 0x00); // PIDR bit5 low
        board.release_switch(&mut gpio, "SW1");
        assert_eq!(gpio.read8(PORT_BASE + 0x40) & (1 << 5), 1 << 5);
    }

    #[test]
    fn reset_button_state_is_tracked_but_not_wired_to_reset() {
        let mut board = Board::new();
        assert!(!board.reset_pressed());
        board.press_reset();
        assert!(board.reset_pressed());
        board.release_reset();
        assert!(!board.reset_pressed());
    }
}
