//! The two input backends behind one [`InputSource`] capability.
//!
//! Direct GPIO buttons read active-low through pull-ups; a pin left
//! unassigned always reads released. The remote variant is the platform
//! crate's [`RemoteLink`] fed from a buffered UART with zero-wait polls.

use embassy_rp::{gpio::Input, uart::BufferedUartRx};
use embedded_io::{Read, ReadReady};
use picodoom_platform::{Buttons, BytePort, InputSource, RemoteLink};

/// Board wiring for the direct variant. `None` means no pin assigned.
#[derive(Default)]
pub struct GpioInput {
    pub left: Option<Input<'static>>,
    pub right: Option<Input<'static>>,
    pub up: Option<Input<'static>>,
    pub down: Option<Input<'static>>,
    pub fire: Option<Input<'static>>,
    pub start: Option<Input<'static>>,
}

impl GpioInput {
    fn asserted(pin: &Option<Input<'static>>) -> bool {
        pin.as_ref().is_some_and(|pin| pin.is_low())
    }
}

impl InputSource for GpioInput {
    fn poll(&mut self, _now_ms: u64) -> Buttons {
        let mut buttons = Buttons::empty();
        for (pin, signal) in [
            (&self.left, Buttons::LEFT),
            (&self.right, Buttons::RIGHT),
            (&self.up, Buttons::UP),
            (&self.down, Buttons::DOWN),
            (&self.fire, Buttons::FIRE),
            (&self.start, Buttons::START),
        ] {
            if Self::asserted(pin) {
                buttons.insert(signal);
            }
        }
        buttons
    }
}

/// Zero-wait single-byte receive over the companion-MCU UART.
pub struct UartPort {
    rx: BufferedUartRx<'static>,
}

impl UartPort {
    pub fn new(rx: BufferedUartRx<'static>) -> Self {
        Self { rx }
    }
}

impl BytePort for UartPort {
    fn read_byte(&mut self) -> Option<u8> {
        if !self.rx.read_ready().unwrap_or(false) {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.rx.read(&mut byte) {
            Ok(n) if n > 0 => Some(byte[0]),
            _ => None,
        }
    }
}

/// Backend selected once at startup; both sides answer the same poll.
pub enum InputBackend {
    Gpio(GpioInput),
    Remote(RemoteLink<UartPort>),
}

impl InputSource for InputBackend {
    fn poll(&mut self, now_ms: u64) -> Buttons {
        match self {
            InputBackend::Gpio(gpio) => gpio.poll(now_ms),
            InputBackend::Remote(link) => link.poll(now_ms),
        }
    }
}
