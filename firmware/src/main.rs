#![no_std]
#![no_main]

extern crate alloc;

use embassy_executor::Spawner;
use embassy_rp::{
    Peri,
    gpio::{Input, Level, Output, Pull},
    peripherals::{
        DMA_CH0, DMA_CH1, PIN_2, PIN_3, PIN_4, PIN_5, PIN_6, PIN_7, PIN_8, PIN_9, PIN_10, PIN_11,
        PIN_12, PIN_13, PIN_14, PIN_15, PIN_16, PIN_17, PIN_18, PIN_19, PIN_20, PIN_22, SPI0,
        SPI1, UART1,
    },
    spi::{self, Spi},
    uart::{self, BufferedUart},
    watchdog::{ResetReason, Watchdog},
};
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard as SdmmcSdCard;
use picodoom_platform::{
    FatalError, FrameBuffer, InputState, Platform, RemoteLink, Storage, TickDriver,
    tick::TICK_PERIOD_MS,
};
use static_cell::StaticCell;
use talc::*;
use {defmt_rtt as _, panic_probe as _};

use crate::{
    abi::CEngine,
    display::{DisplayTransport, FB_HEIGHT, FB_WIDTH},
    input::{GpioInput, InputBackend, UartPort},
    storage::{SdBackend, WAD_PATH},
};

mod abi;
mod display;
mod input;
mod storage;

embassy_rp::bind_interrupts!(struct Irqs {
    UART1_IRQ => uart::BufferedInterruptHandler<UART1>;
});

static mut ARENA: [u8; 250 * 1024] = [0; 250 * 1024];

#[global_allocator]
static ALLOCATOR: Talck<spin::Mutex<()>, ClaimOnOom> =
    Talc::new(unsafe { ClaimOnOom::new(Span::from_array(core::ptr::addr_of!(ARENA).cast_mut())) })
        .lock();

#[embassy_executor::task]
async fn watchdog_task(mut watchdog: Watchdog) {
    if let Some(reason) = watchdog.reset_reason() {
        let _reason = match reason {
            ResetReason::Forced => "forced",
            ResetReason::TimedOut => "timed out",
        };
        #[cfg(feature = "defmt")]
        defmt::error!("Watchdog reset reason: {}", _reason);
    }

    watchdog.start(Duration::from_secs(3));

    let mut ticker = Ticker::every(Duration::from_secs(2));
    loop {
        watchdog.feed();
        ticker.next().await;
    }
}

/// Which input wiring this build talks to. The companion MCU on the link
/// header is the default; flip to `Gpio` for boards with soldered buttons.
#[allow(dead_code)]
#[derive(Clone, Copy, PartialEq, Eq)]
enum InputConfig {
    Gpio,
    Remote,
}
const INPUT_CONFIG: InputConfig = InputConfig::Remote;

struct Display {
    spi: Peri<'static, SPI1>,
    clk: Peri<'static, PIN_10>,
    mosi: Peri<'static, PIN_11>,
    miso: Peri<'static, PIN_12>,
    dma1: Peri<'static, DMA_CH0>,
    dma2: Peri<'static, DMA_CH1>,
    cs: Peri<'static, PIN_13>,
    data: Peri<'static, PIN_14>,
    reset: Peri<'static, PIN_15>,
    backlight: Peri<'static, PIN_20>,
}
struct Sd {
    spi: Peri<'static, SPI0>,
    clk: Peri<'static, PIN_18>,
    mosi: Peri<'static, PIN_19>,
    miso: Peri<'static, PIN_16>,
    cs: Peri<'static, PIN_17>,
    det: Peri<'static, PIN_22>,
}
struct Link {
    uart: Peri<'static, UART1>,
    tx: Peri<'static, PIN_4>,
    rx: Peri<'static, PIN_5>,
}
struct Pad {
    left: Peri<'static, PIN_2>,
    right: Peri<'static, PIN_3>,
    up: Peri<'static, PIN_6>,
    down: Peri<'static, PIN_7>,
    fire: Peri<'static, PIN_8>,
    start: Peri<'static, PIN_9>,
}

async fn setup_display(display: Display) -> DisplayTransport {
    let mut config = spi::Config::default();
    config.frequency = 64_000_000;
    let spi = Spi::new(
        display.spi,
        display.clk,
        display.mosi,
        display.miso,
        display.dma1,
        display.dma2,
        config,
    );
    let mut transport = DisplayTransport::new(Output::new(display.backlight, Level::Low), false);
    if let Err(err) = transport
        .init(spi, display.cs, display.data, display.reset)
        .await
    {
        fatal(FatalError::DisplayInit(err)).await;
    }
    transport
}

fn setup_sd(sd: Sd) -> SdBackend {
    let mut config = spi::Config::default();
    config.frequency = 400_000;
    let spi = Spi::new_blocking(sd.spi, sd.clk, sd.mosi, sd.miso, config.clone());
    let cs = Output::new(sd.cs, Level::High);
    let det = Input::new(sd.det, Pull::None);

    let device = ExclusiveDevice::new(spi, cs, Delay).unwrap();
    let sdcard = SdmmcSdCard::new(device, Delay);

    config.frequency = 32_000_000;
    sdcard.spi(|dev| dev.bus_mut().set_config(&config));
    SdBackend::new(sdcard, det)
}

fn setup_input(link: Link, pad: Pad) -> InputBackend {
    match INPUT_CONFIG {
        InputConfig::Remote => {
            static TX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
            static RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
            let mut config = uart::Config::default();
            config.baudrate = 115_200;
            let uart = BufferedUart::new(
                link.uart,
                link.tx,
                link.rx,
                Irqs,
                TX_BUF.init([0; 64]),
                RX_BUF.init([0; 64]),
                config,
            );
            let (_tx, rx) = uart.split();
            InputBackend::Remote(RemoteLink::new(UartPort::new(rx)))
        }
        InputConfig::Gpio => InputBackend::Gpio(GpioInput {
            left: Some(Input::new(pad.left, Pull::Up)),
            right: Some(Input::new(pad.right, Pull::Up)),
            up: Some(Input::new(pad.up, Pull::Up)),
            down: Some(Input::new(pad.down, Pull::Up)),
            fire: Some(Input::new(pad.fire, Pull::Up)),
            start: Some(Input::new(pad.start, Pull::Up)),
        }),
    }
}

/// Unrecoverable bring-up failure. Log it, hold long enough for the message
/// to land somewhere useful, then reset the chip and try again from scratch.
async fn fatal(_err: FatalError) -> ! {
    #[cfg(feature = "defmt")]
    defmt::error!("fatal: {}, restarting", _err);
    Timer::after_secs(5).await;
    cortex_m::peripheral::SCB::sys_reset()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    spawner
        .spawn(watchdog_task(Watchdog::new(p.WATCHDOG)))
        .unwrap();

    let display = Display {
        spi: p.SPI1,
        clk: p.PIN_10,
        mosi: p.PIN_11,
        miso: p.PIN_12,
        dma1: p.DMA_CH0,
        dma2: p.DMA_CH1,
        cs: p.PIN_13,
        data: p.PIN_14,
        reset: p.PIN_15,
        backlight: p.PIN_20,
    };
    let sd = Sd {
        spi: p.SPI0,
        clk: p.PIN_18,
        mosi: p.PIN_19,
        miso: p.PIN_16,
        cs: p.PIN_17,
        det: p.PIN_22,
    };
    let link = Link {
        uart: p.UART1,
        tx: p.PIN_4,
        rx: p.PIN_5,
    };
    let pad = Pad {
        left: p.PIN_2,
        right: p.PIN_3,
        up: p.PIN_6,
        down: p.PIN_7,
        fire: p.PIN_8,
        start: p.PIN_9,
    };

    let mut transport = setup_display(display).await;

    let mut storage = Storage::new(setup_sd(sd));
    if let Err(err) = storage.mount() {
        fatal(FatalError::StorageMount(err)).await;
    }
    // Probe the game data now; the engine only discovers it mid-load.
    match storage.open(WAD_PATH) {
        Ok(fd) => storage.close(fd),
        Err(_err) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("game data missing at {}: {}", WAD_PATH, _err);
        }
    }

    let Some(framebuffer) = FrameBuffer::allocate(FB_WIDTH, FB_HEIGHT) else {
        fatal(FatalError::FramebufferAlloc).await
    };

    let mut source = setup_input(link, pad);

    let platform = Platform {
        framebuffer,
        input: InputState::new(),
        storage,
    };
    let mut driver = TickDriver::new(
        CEngine::new(),
        platform,
        TICK_PERIOD_MS * 1_000,
        Instant::now().as_micros(),
    );

    #[cfg(feature = "defmt")]
    defmt::info!("platform up, entering tick loop");

    loop {
        let frame = driver.tick(&mut source, Instant::now().as_micros());
        if transport.flush(frame).await.is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("frame flush failed");
        }
        let wake = driver.next_wake(Instant::now().as_micros());
        Timer::at(Instant::from_micros(wake)).await;
    }
}
