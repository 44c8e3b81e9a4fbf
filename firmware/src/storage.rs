//! SD-over-SPI backend for the platform storage adapter.
//!
//! A FAT volume on an SPI SD card, driven by `embedded-sdmmc`'s raw handles
//! so open files carry no lifetime back into the volume manager. Mounting is
//! opening volume 0 plus the root directory; the card-detect switch gates it.

use embassy_rp::{
    gpio::{Input, Output},
    peripherals::SPI0,
    spi::{Blocking, Spi},
};
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::{
    Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp, VolumeIdx,
    VolumeManager,
};
use picodoom_platform::{StorageBackend, StorageError};

pub const MAX_DIRS: usize = 4;
pub const MAX_FILES: usize = 8;
pub const MAX_VOLUMES: usize = 1;

/// Slots the engine may hold open at once, sized to the asset loader's worst
/// case and kept below the FAT layer's own file limit.
pub const MAX_OPEN_FILES: usize = 6;

/// Where the loader expects the game data.
pub const WAD_PATH: &str = "GAMES/E1M1.DAT";

type Device = ExclusiveDevice<Spi<'static, SPI0, Blocking>, Output<'static>, Delay>;
type Sd = SdCard<Device, Delay>;
type VolMgr = VolumeManager<Sd, DummyTimeSource, MAX_DIRS, MAX_FILES, MAX_VOLUMES>;

pub struct DummyTimeSource;

impl TimeSource for DummyTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp::from_calendar(2022, 1, 1, 0, 0, 0).unwrap()
    }
}

pub struct SdBackend {
    det: Input<'static>,
    volume_mgr: VolMgr,
    volume: Option<RawVolume>,
    root: Option<RawDirectory>,
}

impl SdBackend {
    pub fn new(sdcard: Sd, det: Input<'static>) -> Self {
        let volume_mgr = VolumeManager::new_with_limits(sdcard, DummyTimeSource, 5000);
        Self {
            det,
            volume_mgr,
            volume: None,
            root: None,
        }
    }

    /// The DET pin is active-low via the mechanical switch in the socket.
    pub fn is_attached(&self) -> bool {
        self.det.is_low()
    }

    /// Walks `path` from the root, opening and closing intermediate
    /// directories; the final component is the file.
    fn open_at(&mut self, path: &str) -> Result<RawFile, StorageError> {
        let root = self.root.ok_or(StorageError::NotMounted)?;
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        let mut dir = root;
        let mut dir_is_root = true;
        loop {
            let Some(component) = components.next() else {
                break Err(StorageError::NotFound);
            };
            if components.peek().is_none() {
                let file = self
                    .volume_mgr
                    .open_file_in_dir(dir, component, Mode::ReadOnly)
                    .map_err(|_| StorageError::NotFound);
                if !dir_is_root {
                    let _ = self.volume_mgr.close_dir(dir);
                }
                break file;
            }
            match self.volume_mgr.open_dir(dir, component) {
                Ok(next) => {
                    if !dir_is_root {
                        let _ = self.volume_mgr.close_dir(dir);
                    }
                    dir = next;
                    dir_is_root = false;
                }
                Err(_) => {
                    if !dir_is_root {
                        let _ = self.volume_mgr.close_dir(dir);
                    }
                    break Err(StorageError::NotFound);
                }
            }
        }
    }
}

impl StorageBackend for SdBackend {
    type File = RawFile;

    fn mount(&mut self) -> Result<(), StorageError> {
        if !self.is_attached() {
            return Err(StorageError::NoMedium);
        }
        let volume = self
            .volume_mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Device)?;
        match self.volume_mgr.open_root_dir(volume) {
            Ok(root) => {
                self.volume = Some(volume);
                self.root = Some(root);
                Ok(())
            }
            Err(_) => {
                let _ = self.volume_mgr.close_volume(volume);
                Err(StorageError::Device)
            }
        }
    }

    fn unmount(&mut self) {
        if let Some(root) = self.root.take() {
            let _ = self.volume_mgr.close_dir(root);
        }
        if let Some(volume) = self.volume.take() {
            let _ = self.volume_mgr.close_volume(volume);
        }
    }

    fn open(&mut self, path: &str) -> Result<RawFile, StorageError> {
        self.open_at(path)
    }

    fn close(&mut self, file: RawFile) {
        let _ = self.volume_mgr.close_file(file);
    }

    fn read(&mut self, file: &mut RawFile, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.volume_mgr
            .read(*file, buf)
            .map_err(|_| StorageError::Device)
    }

    fn seek(&mut self, file: &mut RawFile, offset: u32) -> Result<(), StorageError> {
        self.volume_mgr
            .file_seek_from_start(*file, offset)
            .map_err(|_| StorageError::Device)
    }

    fn length(&mut self, file: &RawFile) -> Result<u32, StorageError> {
        self.volume_mgr
            .file_length(*file)
            .map_err(|_| StorageError::Device)
    }
}
