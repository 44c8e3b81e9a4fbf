//! Remote-link input: single-byte commands from the companion MCU.
//!
//! Wire format is bare ASCII, one byte per complete command, no framing.
//! Keypad digits map to movement and fire; the rest of the keypad is
//! recognized but unmapped and only logged. Until the literal `AUTH_OK`
//! token has appeared in the receive stream, no byte moves any signal.

use heapless::Vec;

use crate::input::{Buttons, InputSource};

/// Token the companion must send before any input is honored.
pub const AUTH_TOKEN: &[u8] = b"AUTH_OK";

/// How long a decoded signal stays asserted after its last byte.
pub const HOLD_WINDOW_MS: u64 = 100;

const AUTH_BUF_CAP: usize = 64;

/// Zero-wait single-byte receive, the only capability the link needs from
/// the serial hardware.
pub trait BytePort {
    fn read_byte(&mut self) -> Option<u8>;
}

pub struct RemoteLink<P: BytePort> {
    port: P,
    authenticated: bool,
    auth_buf: Vec<u8, AUTH_BUF_CAP>,
    held: Buttons,
    last_command_ms: u64,
}

impl<P: BytePort> RemoteLink<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            authenticated: false,
            auth_buf: Vec::new(),
            held: Buttons::empty(),
            last_command_ms: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Accumulate pre-auth bytes and watch for the token. The buffer is
    /// zeroed when full and on a successful match.
    fn feed_auth(&mut self, byte: u8) {
        if self.auth_buf.is_full() {
            self.auth_buf.clear();
        }
        let _ = self.auth_buf.push(byte);
        if self
            .auth_buf
            .windows(AUTH_TOKEN.len())
            .any(|w| w == AUTH_TOKEN)
        {
            self.authenticated = true;
            self.auth_buf.clear();
            #[cfg(feature = "defmt")]
            defmt::info!("remote link authenticated");
        }
    }

    fn decode(&mut self, byte: u8, now_ms: u64) {
        // Any traffic keeps the hold window open; the companion repeats
        // bytes faster than the window either way.
        self.last_command_ms = now_ms;
        let signal = match byte {
            b'2' => Some(Buttons::UP),
            b'8' => Some(Buttons::DOWN),
            b'4' => Some(Buttons::LEFT),
            b'6' => Some(Buttons::RIGHT),
            b'5' => Some(Buttons::FIRE),
            b'*' => Some(Buttons::START),
            // Rest of the keypad: recognized, unmapped.
            b'0'..=b'9' | b'#' | b'A'..=b'D' => {
                #[cfg(feature = "defmt")]
                defmt::debug!("unmapped command byte {}", byte);
                None
            }
            b' ' | b'\r' | b'\n' => None,
            _byte => {
                #[cfg(feature = "defmt")]
                defmt::debug!("unknown command byte {}", _byte);
                None
            }
        };
        if let Some(signal) = signal {
            self.held.insert(signal);
        }
    }
}

impl<P: BytePort> InputSource for RemoteLink<P> {
    fn poll(&mut self, now_ms: u64) -> Buttons {
        while let Some(byte) = self.port.read_byte() {
            if self.authenticated {
                self.decode(byte, now_ms);
            } else {
                self.feed_auth(byte);
            }
        }
        // Remote buttons have no release byte; they expire instead.
        if !self.held.is_empty()
            && now_ms.saturating_sub(self.last_command_ms) > HOLD_WINDOW_MS
        {
            self.held = Buttons::empty();
        }
        self.held
    }
}
