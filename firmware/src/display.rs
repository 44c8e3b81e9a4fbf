//! Display transport: panel bring-up and the bulk frame transfer.
//!
//! The transport walks Uninitialized -> Initializing -> Ready; any failed
//! init step logs and leaves it short of Ready, after which `flush` is a
//! safe no-op and the game keeps running blind. The ST7365P driver queues
//! the transfer over DMA SPI, and waiting for a still-in-flight transfer is
//! folded into the next `flush` by the exclusive bus device.

use embassy_rp::{
    gpio::{Level, Output},
    peripherals::{PIN_13, PIN_14, PIN_15, SPI1},
    spi::{Async, Spi},
    Peri,
};
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use picodoom_platform::{DisplayError, FrameBuffer};
use st7365p_lcd::ST7365P;

/// Panel is 320x320; the engine renders 4:3 and the remainder stays black.
pub const FB_WIDTH: usize = 320;
pub const FB_HEIGHT: usize = 240;

type Panel = ST7365P<
    ExclusiveDevice<Spi<'static, SPI1, Async>, Output<'static>, Delay>,
    Output<'static>,
    Output<'static>,
    Delay,
>;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    Initializing,
    Ready,
}

pub struct DisplayTransport {
    state: TransportState,
    panel: Option<Panel>,
    backlight: Output<'static>,
    backlight_active_low: bool,
}

impl DisplayTransport {
    pub fn new(backlight: Output<'static>, backlight_active_low: bool) -> Self {
        Self {
            state: TransportState::Uninitialized,
            panel: None,
            backlight,
            backlight_active_low,
        }
    }

    /// Bus config, panel reset + init sequence, orientation, panel on,
    /// backlight on. Stops where it fails; never retries on its own.
    pub async fn init(
        &mut self,
        spi: Spi<'static, SPI1, Async>,
        cs: Peri<'static, PIN_13>,
        data: Peri<'static, PIN_14>,
        reset: Peri<'static, PIN_15>,
    ) -> Result<(), DisplayError> {
        self.state = TransportState::Initializing;

        let spi_device = ExclusiveDevice::new(spi, Output::new(cs, Level::Low), Delay)
            .map_err(|_| DisplayError::Bus)?;
        let mut panel = ST7365P::new(
            spi_device,
            Output::new(data, Level::Low),
            Some(Output::new(reset, Level::High)),
            false,
            true,
            Delay,
        );
        panel.init().await.map_err(|_| DisplayError::Panel)?;
        panel
            .set_custom_orientation(0x60)
            .await
            .map_err(|_| DisplayError::Panel)?;
        panel.set_on().await.map_err(|_| DisplayError::Panel)?;

        self.panel = Some(panel);
        self.state = TransportState::Ready;
        self.set_backlight(true);
        #[cfg(feature = "defmt")]
        defmt::info!("display transport ready");
        Ok(())
    }

    /// Fire-and-forget GPIO write, polarity per the board.
    pub fn set_backlight(&mut self, on: bool) {
        let level = if on != self.backlight_active_low {
            Level::High
        } else {
            Level::Low
        };
        self.backlight.set_level(level);
    }

    /// Bulk transfer of the completed frame. Not ready means no-op by
    /// contract, so rendering failures degrade instead of crashing.
    pub async fn flush(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        if self.state != TransportState::Ready {
            return Ok(());
        }
        let Some(panel) = self.panel.as_mut() else {
            return Ok(());
        };
        panel
            .set_pixels_buffered(
                0,
                0,
                frame.width() as u16 - 1,
                frame.height() as u16 - 1,
                frame.as_pixels(),
            )
            .await
            .map_err(|_| DisplayError::Bus)
    }
}
