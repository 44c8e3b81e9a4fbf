//! Block-storage adapter: mount state, the descriptor table and the
//! POSIX-ish file surface the engine's asset loader expects.
//!
//! The backend trait is the narrow waist between this logic and the real
//! SD/FAT stack in the firmware crate; tests drive it with an in-memory
//! volume. Handles carry a generation tag so a use-after-close shows up as
//! `BadHandle` instead of silently hitting a recycled slot.

use alloc::vec::Vec;

use crate::error::StorageError;

pub trait StorageBackend {
    type File;

    fn mount(&mut self) -> Result<(), StorageError>;
    fn unmount(&mut self);
    fn open(&mut self, path: &str) -> Result<Self::File, StorageError>;
    fn close(&mut self, file: Self::File);
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, StorageError>;
    fn seek(&mut self, file: &mut Self::File, offset: u32) -> Result<(), StorageError>;
    fn length(&mut self, file: &Self::File) -> Result<u32, StorageError>;
}

/// Small integer handle plus the generation of the slot it was issued from.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handle {
    index: u8,
    generation: u16,
}

impl Handle {
    /// Packed form for the engine's C surface, which wants a plain int with
    /// a negative sentinel for "invalid".
    pub fn into_raw(self) -> i32 {
        (self.generation as i32) << 8 | self.index as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        if raw < 0 {
            return None;
        }
        Some(Self {
            index: (raw & 0xff) as u8,
            generation: (raw >> 8) as u16,
        })
    }
}

struct Slot<F> {
    file: Option<F>,
    generation: u16,
}

/// Fixed-capacity arena of open-file slots. The engine never holds more
/// than `N` files at once; exceeding that is a caller bug surfaced as
/// `TableFull`.
pub struct FdTable<F, const N: usize> {
    slots: [Slot<F>; N],
}

impl<F, const N: usize> FdTable<F, N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot {
                file: None,
                generation: 0,
            }),
        }
    }

    fn insert(&mut self, file: F) -> Result<Handle, F> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.file.is_none() {
                slot.file = Some(file);
                return Ok(Handle {
                    index: index as u8,
                    generation: slot.generation,
                });
            }
        }
        Err(file)
    }

    fn get_mut(&mut self, handle: Handle) -> Option<&mut F> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.file.as_mut()
    }

    fn remove(&mut self, handle: Handle) -> Option<F> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let file = slot.file.take();
        if file.is_some() {
            // Retire every handle issued for this slot so far.
            slot.generation = slot.generation.wrapping_add(1);
        }
        file
    }

    fn drain(&mut self) -> impl Iterator<Item = F> + '_ {
        self.slots.iter_mut().filter_map(|slot| {
            let file = slot.file.take();
            if file.is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            file
        })
    }
}

impl<F, const N: usize> Default for FdTable<F, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Storage<B: StorageBackend, const N: usize> {
    backend: B,
    mounted: bool,
    files: FdTable<B::File, N>,
}

impl<B: StorageBackend, const N: usize> Storage<B, N> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            mounted: false,
            files: FdTable::new(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Idempotent: a second mount while mounted touches no hardware and
    /// reports the same success. Failure logs and stays unmounted; the
    /// caller decides whether storage is mandatory.
    pub fn mount(&mut self) -> Result<(), StorageError> {
        if self.mounted {
            return Ok(());
        }
        match self.backend.mount() {
            Ok(()) => {
                self.mounted = true;
                #[cfg(feature = "defmt")]
                defmt::info!("storage mounted");
                Ok(())
            }
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::error!("storage mount failed: {}", _err);
                Err(_err)
            }
        }
    }

    /// No-op when not mounted. Open files are closed first.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        for file in self.files.drain() {
            self.backend.close(file);
        }
        self.backend.unmount();
        self.mounted = false;
    }

    pub fn open(&mut self, path: &str) -> Result<Handle, StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let file = self.backend.open(path)?;
        self.files.insert(file).map_err(|file| {
            self.backend.close(file);
            StorageError::TableFull
        })
    }

    /// Reads into the whole of `buf`. A short read is logged and reported
    /// through the return value, never retried here; the asset loader treats
    /// it as missing or corrupt data.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, StorageError> {
        let file = self.files.get_mut(handle).ok_or(StorageError::BadHandle)?;
        let got = self.backend.read(file, buf)?;
        if got != buf.len() {
            #[cfg(feature = "defmt")]
            defmt::error!("short read: wanted {} bytes, got {}", buf.len(), got);
        }
        Ok(got)
    }

    pub fn seek(&mut self, handle: Handle, offset: u32) -> Result<(), StorageError> {
        let file = self.files.get_mut(handle).ok_or(StorageError::BadHandle)?;
        self.backend.seek(file, offset)
    }

    pub fn length(&mut self, handle: Handle) -> Result<u32, StorageError> {
        let file = self.files.get_mut(handle).ok_or(StorageError::BadHandle)?;
        self.backend.length(file)
    }

    pub fn close(&mut self, handle: Handle) {
        if let Some(file) = self.files.remove(handle) {
            self.backend.close(file);
        }
    }

    /// mmap stand-in: seek + one synchronous read into a heap buffer sized
    /// exactly `length`, ownership handed to the caller. Unlike [`read`],
    /// a short read here is an error; a partially mapped asset is useless.
    ///
    /// [`read`]: Storage::read
    pub fn mmap(&mut self, handle: Handle, length: usize, offset: u32) -> Result<Vec<u8>, StorageError> {
        self.seek(handle, offset)?;
        let mut buf: Vec<u8> = Vec::new();
        if buf.try_reserve_exact(length).is_err() {
            return Err(StorageError::OutOfMemory);
        }
        buf.resize(length, 0);
        let file = self.files.get_mut(handle).ok_or(StorageError::BadHandle)?;
        let got = self.backend.read(file, &mut buf)?;
        if got != length {
            return Err(StorageError::ShortRead {
                wanted: length,
                got,
            });
        }
        Ok(buf)
    }
}

/// The unmap half of the emulation: the mapping is plain owned memory, so
/// freeing it is just dropping it. Kept as a named operation for the engine
/// shim's mmap/munmap symmetry.
pub fn munmap(buffer: Vec<u8>) {
    drop(buffer);
}

#[cfg(test)]
pub(crate) mod mem {
    //! In-memory backend used by the unit and integration tests.

    use super::*;
    use alloc::string::String;
    use alloc::vec::Vec;

    pub struct MemFile {
        data: Vec<u8>,
        pos: usize,
        /// When set, reads stop early at this many bytes per call.
        pub truncate_reads_at: Option<usize>,
    }

    #[derive(Default)]
    pub struct MemBackend {
        pub files: Vec<(String, Vec<u8>)>,
        pub fail_mount: bool,
        pub mounts: usize,
        pub unmounts: usize,
        pub open_files: usize,
        pub short_read_at: Option<usize>,
    }

    impl MemBackend {
        pub fn with_file(path: &str, data: &[u8]) -> Self {
            Self {
                files: alloc::vec![(String::from(path), data.to_vec())],
                ..Self::default()
            }
        }
    }

    impl StorageBackend for MemBackend {
        type File = MemFile;

        fn mount(&mut self) -> Result<(), StorageError> {
            if self.fail_mount {
                return Err(StorageError::NoMedium);
            }
            self.mounts += 1;
            Ok(())
        }

        fn unmount(&mut self) {
            self.unmounts += 1;
        }

        fn open(&mut self, path: &str) -> Result<MemFile, StorageError> {
            let (_, data) = self
                .files
                .iter()
                .find(|(name, _)| name == path)
                .ok_or(StorageError::NotFound)?;
            self.open_files += 1;
            Ok(MemFile {
                data: data.clone(),
                pos: 0,
                truncate_reads_at: self.short_read_at,
            })
        }

        fn close(&mut self, _file: MemFile) {
            self.open_files -= 1;
        }

        fn read(&mut self, file: &mut MemFile, buf: &mut [u8]) -> Result<usize, StorageError> {
            let avail = file.data.len().saturating_sub(file.pos);
            let mut n = buf.len().min(avail);
            if let Some(cap) = file.truncate_reads_at {
                n = n.min(cap);
            }
            buf[..n].copy_from_slice(&file.data[file.pos..file.pos + n]);
            file.pos += n;
            Ok(n)
        }

        fn seek(&mut self, file: &mut MemFile, offset: u32) -> Result<(), StorageError> {
            if offset as usize > file.data.len() {
                return Err(StorageError::Device);
            }
            file.pos = offset as usize;
            Ok(())
        }

        fn length(&mut self, file: &MemFile) -> Result<u32, StorageError> {
            Ok(file.data.len() as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mem::MemBackend;
    use super::*;

    const WAD: &[u8] = b"IWAD\x0c\x00\x00\x00payload-bytes";

    fn mounted() -> Storage<MemBackend, 4> {
        let mut storage = Storage::new(MemBackend::with_file("E1M1.DAT", WAD));
        storage.mount().unwrap();
        storage
    }

    #[test]
    fn remount_touches_no_hardware() {
        let mut storage = mounted();
        assert!(storage.mount().is_ok());
        assert!(storage.mount().is_ok());
        assert_eq!(storage.backend.mounts, 1);
    }

    #[test]
    fn mount_failure_leaves_state_unmounted() {
        let mut storage: Storage<MemBackend, 4> = Storage::new(MemBackend {
            fail_mount: true,
            ..Default::default()
        });
        assert_eq!(storage.mount(), Err(StorageError::NoMedium));
        assert!(!storage.is_mounted());
        // Not retried behind the caller's back.
        assert_eq!(storage.backend.mounts, 0);
    }

    #[test]
    fn unmount_when_not_mounted_is_a_no_op() {
        let mut storage: Storage<MemBackend, 4> = Storage::new(MemBackend::default());
        storage.unmount();
        assert_eq!(storage.backend.unmounts, 0);

        let mut storage = mounted();
        storage.unmount();
        storage.unmount();
        assert_eq!(storage.backend.unmounts, 1);
    }

    #[test]
    fn short_read_is_reported_not_fatal() {
        let mut backend = MemBackend::with_file("E1M1.DAT", WAD);
        backend.short_read_at = Some(4);
        let mut storage: Storage<MemBackend, 4> = Storage::new(backend);
        storage.mount().unwrap();
        let fd = storage.open("E1M1.DAT").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(storage.read(fd, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"IWAD");
    }

    #[test]
    fn open_fails_when_table_is_full() {
        let mut storage: Storage<MemBackend, 2> =
            Storage::new(MemBackend::with_file("E1M1.DAT", WAD));
        storage.mount().unwrap();
        let a = storage.open("E1M1.DAT").unwrap();
        let _b = storage.open("E1M1.DAT").unwrap();
        assert_eq!(storage.open("E1M1.DAT"), Err(StorageError::TableFull));
        // The spilled backend file was closed again, not leaked.
        assert_eq!(storage.backend.open_files, 2);
        storage.close(a);
        assert!(storage.open("E1M1.DAT").is_ok());
    }

    #[test]
    fn stale_handle_is_rejected_after_close() {
        let mut storage = mounted();
        let fd = storage.open("E1M1.DAT").unwrap();
        storage.close(fd);
        let reused = storage.open("E1M1.DAT").unwrap();
        // Same slot, new generation.
        assert_ne!(fd, reused);
        let mut buf = [0u8; 4];
        assert_eq!(storage.read(fd, &mut buf), Err(StorageError::BadHandle));
        assert!(storage.read(reused, &mut buf).is_ok());
    }

    #[test]
    fn handle_survives_the_raw_round_trip() {
        let mut storage = mounted();
        let fd = storage.open("E1M1.DAT").unwrap();
        let raw = fd.into_raw();
        assert!(raw >= 0);
        assert_eq!(Handle::from_raw(raw), Some(fd));
        assert_eq!(Handle::from_raw(-1), None);
    }

    #[test]
    fn mmap_copies_the_requested_window() {
        let mut storage = mounted();
        let fd = storage.open("E1M1.DAT").unwrap();
        let map = storage.mmap(fd, 13, 8).unwrap();
        assert_eq!(&map[..], b"payload-bytes");
        munmap(map);
        // The descriptor is still usable after the mapping is gone.
        assert_eq!(storage.length(fd), Ok(WAD.len() as u32));
    }

    #[test]
    fn mmap_of_a_truncated_asset_is_an_error() {
        let mut storage = mounted();
        let fd = storage.open("E1M1.DAT").unwrap();
        assert_eq!(
            storage.mmap(fd, 64, 0),
            Err(StorageError::ShortRead {
                wanted: 64,
                got: WAD.len(),
            })
        );
    }

    #[test]
    fn open_requires_a_mounted_volume() {
        let mut storage: Storage<MemBackend, 4> =
            Storage::new(MemBackend::with_file("E1M1.DAT", WAD));
        assert_eq!(storage.open("E1M1.DAT"), Err(StorageError::NotMounted));
        storage.mount().unwrap();
        assert_eq!(storage.open("E2M1.DAT"), Err(StorageError::NotFound));
    }
}
